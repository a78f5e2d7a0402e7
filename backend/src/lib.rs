//! AIT Platform backend: accounts, subject enrollment, gateway checkout,
//! the Loss & Adaptation assessment and the school fee ledger.

pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod settings;

/// Public OpenAPI surface used by Swagger UI and tooling.
pub use doc::ApiDoc;
pub use domain::TraceId;
pub use middleware::Trace;
