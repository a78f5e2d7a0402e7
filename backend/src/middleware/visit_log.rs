//! Visit logging middleware.
//!
//! Records one row per request after the response is produced. Static
//! assets and probes are skipped, and a failed write is logged and
//! swallowed so it never changes the response.

use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_session::SessionExt;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::USER_AGENT;
use actix_web::{Error, HttpRequest};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use mockable::{Clock, DefaultClock};
use tracing::warn;

use crate::domain::UserId;
use crate::domain::ports::Visits;
use crate::domain::visit::{NewVisit, client_ip, is_skipped_path};
use crate::inbound::http::session::USER_ID_KEY;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Middleware factory recording visits through the [`Visits`] port.
#[derive(Clone)]
pub struct VisitLog {
    visits: Arc<dyn Visits>,
    clock: Arc<dyn Clock>,
}

impl VisitLog {
    pub fn new(visits: Arc<dyn Visits>) -> Self {
        Self {
            visits,
            clock: Arc::new(DefaultClock),
        }
    }

    /// Timestamp visits with `clock` instead of the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl<S, B> Transform<S, ServiceRequest> for VisitLog
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = VisitLogMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(VisitLogMiddleware {
            service: Rc::new(service),
            visits: Arc::clone(&self.visits),
            clock: Arc::clone(&self.clock),
        }))
    }
}

/// Service wrapper produced by [`VisitLog`].
pub struct VisitLogMiddleware<S> {
    service: Rc<S>,
    visits: Arc<dyn Visits>,
    clock: Arc<dyn Clock>,
}

fn session_user(req: &HttpRequest) -> Option<UserId> {
    req.get_session()
        .get::<String>(USER_ID_KEY)
        .ok()
        .flatten()
        .and_then(|raw| UserId::new(raw).ok())
}

fn visit_for(req: &HttpRequest, clock: &dyn Clock) -> NewVisit {
    let headers = req.headers();
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok());
    let peer = req.peer_addr().map(|addr| addr.ip().to_string());
    let ip = client_ip(forwarded, peer.as_deref());
    let agent = headers.get(USER_AGENT).and_then(|value| value.to_str().ok());
    NewVisit::from_request(clock.utc(), req.path(), session_user(req), ip.as_deref(), agent)
}

impl<S, B> Service<ServiceRequest> for VisitLogMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if is_skipped_path(req.path()) {
            return Box::pin(self.service.call(req));
        }
        let service = Rc::clone(&self.service);
        let visits = Arc::clone(&self.visits);
        let clock = Arc::clone(&self.clock);
        Box::pin(async move {
            let res = service.call(req).await?;
            // Read after the handler so a login in this request is attributed.
            let visit = visit_for(res.request(), clock.as_ref());
            if let Err(error) = visits.record(visit).await {
                warn!(%error, "failed to record visit");
            }
            Ok(res)
        })
    }
}
