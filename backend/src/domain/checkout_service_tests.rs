//! Tests for the checkout service.

use super::*;
use crate::domain::fixture_clock::{FixtureClock, fixture_timestamp};
use crate::domain::payments::payfast::sign_fields;
use crate::domain::payments::stripe::{CreatedCheckoutSession, compute_signature};
use crate::domain::ports::{
    FixtureSubjectRepository, MockEnrollments, MockPayFastValidator, MockPaymentRepository,
    MockPricing, MockStripeGateway, MockUserRepository,
};
use crate::domain::pricing::{Quote, QuoteSource, price_with_vat};
use crate::domain::subject_service::SubjectService;
use crate::domain::{Enrollment, EnrollmentStatus, ErrorCode, Role, Subject};
use rstest::{fixture, rstest};
use url::form_urlencoded;

const WEBHOOK_SECRET: &str = "whsec_test";

struct Mocks {
    payments: MockPaymentRepository,
    users: MockUserRepository,
    validator: MockPayFastValidator,
    stripe: MockStripeGateway,
    pricing: MockPricing,
    enrollments: MockEnrollments,
}

#[fixture]
fn mocks() -> Mocks {
    Mocks {
        payments: MockPaymentRepository::new(),
        users: MockUserRepository::new(),
        validator: MockPayFastValidator::new(),
        stripe: MockStripeGateway::new(),
        pricing: MockPricing::new(),
        enrollments: MockEnrollments::new(),
    }
}

type Service = CheckoutService<
    MockPaymentRepository,
    MockUserRepository,
    MockPayFastValidator,
    MockStripeGateway,
>;

fn settings() -> CheckoutSettings {
    CheckoutSettings {
        payfast: Some(PayFastMerchant {
            merchant_id: "10000100".to_owned(),
            merchant_key: "46f0cd694581a".to_owned(),
            passphrase: Some(Zeroizing::new("jt7NOE43FZPn".to_owned())),
            sandbox: true,
        }),
        verify_payfast_source: false,
        stripe_webhook_secret: Some(Zeroizing::new(WEBHOOK_SECRET.to_owned())),
        public_base_url: "https://ait.example/".to_owned(),
    }
}

fn service(mocks: Mocks, settings: CheckoutSettings) -> Service {
    CheckoutService::new(
        Arc::new(mocks.payments),
        Arc::new(mocks.users),
        Arc::new(mocks.validator),
        Arc::new(mocks.stripe),
        CheckoutCollaborators {
            pricing: Arc::new(mocks.pricing),
            enrollments: Arc::new(mocks.enrollments),
            subjects: Arc::new(SubjectService::new(Arc::new(FixtureSubjectRepository))),
        },
        settings,
        Arc::new(FixtureClock::at(fixture_timestamp())),
    )
}

fn loss() -> Subject {
    Subject {
        id: 1,
        slug: "loss".to_owned(),
        name: "Loss and Adaptation".to_owned(),
        active: true,
        sort_order: 1,
    }
}

fn zar_quote() -> Quote {
    price_with_vat(1, "ZA", "ZAR".to_owned(), 5000, QuoteSource::Fallback)
}

fn enrollment(user_id: UserId, status: EnrollmentStatus) -> Enrollment {
    Enrollment {
        id: 7,
        user_id,
        subject_id: 1,
        status,
        payment_pending: status == EnrollmentStatus::Pending,
        quote: None,
        created_at: fixture_timestamp(),
        updated_at: fixture_timestamp(),
    }
}

fn request(user_id: UserId, country_code: &str) -> CheckoutRequest {
    CheckoutRequest {
        user_id,
        email: EmailAddress::parse("learner@example.com").expect("email"),
        role: Role::User,
        subject_key: "loss".to_owned(),
        country_code: country_code.to_owned(),
    }
}

fn log_entry(
    provider: PaymentProvider,
    reference: &str,
    user_id: Option<UserId>,
    amount_cents: i64,
) -> PaymentLogEntry {
    PaymentLogEntry {
        id: 3,
        user_id,
        subject_id: user_id.map(|_| 1),
        amount_cents,
        currency: "ZAR".to_owned(),
        status: PaymentStatus::Pending,
        provider,
        external_ref: reference.to_owned(),
        purpose: ENROLLMENT_PURPOSE.to_owned(),
        meta: None,
        created_at: fixture_timestamp(),
    }
}

/// Encode fields in key order and sign them the way PayFast does.
fn payfast_body(pairs: &[(&str, &str)]) -> String {
    let mut fields: Vec<(String, String)> = pairs
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect();
    fields.sort_by(|left, right| left.0.cmp(&right.0));
    let signature = sign_fields(&fields, Some("jt7NOE43FZPn"));
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in &fields {
        serializer.append_pair(key, value);
    }
    serializer.append_pair("signature", &signature);
    serializer.finish()
}

fn notification(user_id: UserId, status: &str, amount: &str) -> PayFastNotificationRequest {
    let user = user_id.to_string();
    PayFastNotificationRequest {
        raw_body: payfast_body(&[
            ("amount_gross", amount),
            ("custom_str1", "loss"),
            ("custom_str2", &user),
            ("m_payment_id", "AIT-0000beef"),
            ("payment_status", status),
            ("pf_payment_id", "1089250"),
        ]),
        source_ip: None,
    }
}

fn webhook(payload: &serde_json::Value) -> StripeWebhookRequest {
    let payload = payload.to_string();
    let timestamp = fixture_timestamp().timestamp();
    let signature = compute_signature(WEBHOOK_SECRET, timestamp, &payload);
    StripeWebhookRequest {
        payload,
        signature_header: format!("t={timestamp},v1={signature}"),
    }
}

fn completed_event(user_id: UserId, payment_status: &str) -> serde_json::Value {
    json!({
        "id": "evt_1",
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": "cs_test_1",
            "payment_intent": "pi_1",
            "amount_total": 5750,
            "currency": "zar",
            "payment_status": payment_status,
            "customer_email": "learner@example.com",
            "metadata": { "subject": "loss", "user_id": user_id.to_string() }
        }}
    })
}

#[rstest]
#[tokio::test]
async fn payfast_requires_merchant_settings(mocks: Mocks) {
    let svc = service(
        mocks,
        CheckoutSettings {
            payfast: None,
            ..settings()
        },
    );
    let err = svc
        .start_payfast(request(UserId::random(), "ZA"))
        .await
        .expect_err("unconfigured");
    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}

#[rstest]
#[tokio::test]
async fn payfast_checkout_logs_pending_row_and_signs_form(mut mocks: Mocks) {
    let user_id = UserId::random();
    mocks
        .pricing
        .expect_quote()
        .withf(|request| request.country_code == "ZA" && request.subject_key == "loss")
        .returning(|_| {
            Ok(SubjectQuote {
                subject: loss(),
                quote: zar_quote(),
            })
        });
    mocks
        .enrollments
        .expect_begin_checkout()
        .withf(|_, subject_id, quote| *subject_id == 1 && quote.total_cents == 5750)
        .times(1)
        .returning(|user_id, _, _| Ok(enrollment(*user_id, EnrollmentStatus::Pending)));
    mocks
        .payments
        .expect_record()
        .withf(move |entry| {
            entry.provider == PaymentProvider::PayFast
                && entry.amount_cents == 5750
                && entry.user_id == Some(user_id)
                && entry.external_ref.starts_with("AIT-")
        })
        .times(1)
        .returning(|entry| {
            Ok(log_entry(
                entry.provider,
                &entry.external_ref,
                entry.user_id,
                entry.amount_cents,
            ))
        });

    let started = service(mocks, settings())
        .start_payfast(request(user_id, "US"))
        .await
        .expect("checkout started");

    let field = |name: &str| {
        started
            .form
            .fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };
    assert_eq!(field("amount").as_deref(), Some("57.50"));
    assert_eq!(field("m_payment_id"), Some(started.reference.clone()));
    assert_eq!(
        field("notify_url").as_deref(),
        Some("https://ait.example/api/v1/payments/payfast/notify")
    );
    assert_eq!(field("custom_str1").as_deref(), Some("loss"));
    assert!(field("signature").is_some());
    assert_eq!(started.enrollment.status, EnrollmentStatus::Pending);
}

#[rstest]
#[tokio::test]
async fn payfast_refuses_foreign_currency_quotes(mut mocks: Mocks) {
    mocks.pricing.expect_quote().returning(|_| {
        Ok(SubjectQuote {
            subject: loss(),
            quote: price_with_vat(1, "US", "USD".to_owned(), 5000, QuoteSource::CountryPrice),
        })
    });
    mocks.enrollments.expect_begin_checkout().times(0);

    let err = service(mocks, settings())
        .start_payfast(request(UserId::random(), "ZA"))
        .await
        .expect_err("rand only");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn complete_notification_settles_enrollment(mut mocks: Mocks) {
    let user_id = UserId::random();
    mocks.validator.expect_validate().times(1).returning(|_| Ok(true));
    mocks
        .payments
        .expect_find_by_reference()
        .withf(|provider, reference| *provider == PaymentProvider::PayFast && reference == "AIT-0000beef")
        .returning(move |provider, reference| {
            Ok(Some(log_entry(provider, reference, Some(user_id), 5750)))
        });
    mocks
        .enrollments
        .expect_settle()
        .withf(move |user, subject_id, event| {
            *user == user_id && *subject_id == 1 && *event == EnrollmentEvent::PaymentSettled
        })
        .times(1)
        .returning(|user_id, _, _| Ok(enrollment(*user_id, EnrollmentStatus::Active)));
    mocks
        .payments
        .expect_set_status()
        .withf(|_, reference, status, meta| {
            reference == "AIT-0000beef"
                && *status == PaymentStatus::Paid
                && meta.as_ref().is_some_and(|meta| meta["pf_payment_id"] == "1089250")
        })
        .times(1)
        .returning(|_, _, _, _| Ok(true));

    let outcome = service(mocks, settings())
        .handle_payfast_notification(notification(user_id, "COMPLETE", "57.50"))
        .await
        .expect("settled");
    match outcome {
        CallbackOutcome::Settled { reference, enrollment } => {
            assert_eq!(reference, "AIT-0000beef");
            assert_eq!(enrollment.status, EnrollmentStatus::Active);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[rstest]
#[tokio::test]
async fn tampered_notification_is_rejected_before_validation(mut mocks: Mocks) {
    mocks.validator.expect_validate().times(0);
    mocks.payments.expect_find_by_reference().times(0);
    let mut request = notification(UserId::random(), "COMPLETE", "57.50");
    request.raw_body = request.raw_body.replace("57.50", "1.00");

    let err = service(mocks, settings())
        .handle_payfast_notification(request)
        .await
        .expect_err("bad signature");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[case(None)]
#[case(Some("203.0.113.9"))]
#[tokio::test]
async fn untrusted_sources_are_forbidden(mut mocks: Mocks, #[case] source: Option<&str>) {
    mocks.validator.expect_validate().times(0);
    let mut request = notification(UserId::random(), "COMPLETE", "57.50");
    request.source_ip = source.map(|ip| ip.parse().expect("ip"));

    let err = service(
        mocks,
        CheckoutSettings {
            verify_payfast_source: true,
            ..settings()
        },
    )
    .handle_payfast_notification(request)
    .await
    .expect_err("untrusted");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn amount_mismatch_does_not_settle(mut mocks: Mocks) {
    let user_id = UserId::random();
    mocks.validator.expect_validate().returning(|_| Ok(true));
    mocks
        .payments
        .expect_find_by_reference()
        .returning(move |provider, reference| {
            Ok(Some(log_entry(provider, reference, Some(user_id), 5750)))
        });
    mocks.enrollments.expect_settle().times(0);
    mocks.payments.expect_set_status().times(0);

    let err = service(mocks, settings())
        .handle_payfast_notification(notification(user_id, "COMPLETE", "10.00"))
        .await
        .expect_err("amount mismatch");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn unconfirmed_notifications_are_rejected(mut mocks: Mocks) {
    mocks.validator.expect_validate().returning(|_| Ok(false));
    mocks.payments.expect_find_by_reference().times(0);

    let err = service(mocks, settings())
        .handle_payfast_notification(notification(UserId::random(), "COMPLETE", "57.50"))
        .await
        .expect_err("not confirmed");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[case("FAILED", PaymentStatus::Failed)]
#[case("CANCELLED", PaymentStatus::Canceled)]
#[tokio::test]
async fn unsuccessful_notifications_are_recorded(
    mut mocks: Mocks,
    #[case] raw_status: &str,
    #[case] expected: PaymentStatus,
) {
    let user_id = UserId::random();
    mocks.validator.expect_validate().returning(|_| Ok(true));
    mocks
        .payments
        .expect_find_by_reference()
        .returning(move |provider, reference| {
            Ok(Some(log_entry(provider, reference, Some(user_id), 5750)))
        });
    mocks.enrollments.expect_settle().times(0);
    mocks
        .payments
        .expect_set_status()
        .withf(move |_, _, status, _| *status == expected)
        .times(1)
        .returning(|_, _, _, _| Ok(true));

    let outcome = service(mocks, settings())
        .handle_payfast_notification(notification(user_id, raw_status, "57.50"))
        .await
        .expect("recorded");
    assert_eq!(
        outcome,
        CallbackOutcome::Recorded {
            reference: "AIT-0000beef".to_owned(),
            status: expected,
        }
    );
}

#[rstest]
#[tokio::test]
async fn stripe_checkout_records_open_session(mut mocks: Mocks) {
    let user_id = UserId::random();
    mocks
        .pricing
        .expect_quote()
        .withf(|request| request.country_code == "US")
        .returning(|_| {
            Ok(SubjectQuote {
                subject: loss(),
                quote: price_with_vat(1, "US", "USD".to_owned(), 1000, QuoteSource::CountryPrice),
            })
        });
    mocks
        .enrollments
        .expect_begin_checkout()
        .returning(|user_id, _, _| Ok(enrollment(*user_id, EnrollmentStatus::Pending)));
    mocks
        .stripe
        .expect_create_checkout_session()
        .withf(|request| {
            request.currency == "USD"
                && request.amount_cents == 1150
                && request.cancel_url == "https://ait.example/checkout/stripe/cancel"
        })
        .times(1)
        .returning(|_| {
            Ok(CreatedCheckoutSession {
                id: "cs_test_1".to_owned(),
                url: Some("https://checkout.stripe.com/c/pay/cs_test_1".to_owned()),
            })
        });
    mocks
        .payments
        .expect_upsert_stripe_payment()
        .withf(|record| record.session_id == "cs_test_1" && record.status == "open")
        .times(1)
        .returning(|record| {
            Ok(crate::domain::payments::stripe::StripePayment {
                id: 1,
                session_id: record.session_id.clone(),
                user_id: record.user_id,
                payment_intent_id: None,
                customer_id: None,
                email: record.email.clone(),
                amount_total_cents: record.amount_total_cents,
                currency: record.currency.clone(),
                status: record.status.clone(),
                purpose: record.purpose.clone(),
                receipt_url: None,
                paid_at: None,
                created_at: fixture_timestamp(),
                updated_at: fixture_timestamp(),
            })
        });
    mocks
        .payments
        .expect_record()
        .withf(|entry| entry.provider == PaymentProvider::Stripe && entry.external_ref == "cs_test_1")
        .times(1)
        .returning(|entry| {
            Ok(log_entry(
                entry.provider,
                &entry.external_ref,
                entry.user_id,
                entry.amount_cents,
            ))
        });

    let started = service(mocks, settings())
        .start_stripe(request(user_id, "US"))
        .await
        .expect("stripe checkout");
    assert_eq!(started.session_id, "cs_test_1");
    assert!(started.checkout_url.is_some());
    assert!(started.reference.starts_with("AIT-"));
}

#[rstest]
#[tokio::test]
async fn gateway_outage_is_service_unavailable(mut mocks: Mocks) {
    mocks.pricing.expect_quote().returning(|_| {
        Ok(SubjectQuote {
            subject: loss(),
            quote: zar_quote(),
        })
    });
    mocks
        .enrollments
        .expect_begin_checkout()
        .returning(|user_id, _, _| Ok(enrollment(*user_id, EnrollmentStatus::Pending)));
    mocks
        .stripe
        .expect_create_checkout_session()
        .returning(|_| Err(PaymentGatewayError::unavailable("timeout")));
    mocks.payments.expect_record().times(0);

    let err = service(mocks, settings())
        .start_stripe(request(UserId::random(), "ZA"))
        .await
        .expect_err("gateway down");
    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}

#[rstest]
#[tokio::test]
async fn completed_session_settles_enrollment(mut mocks: Mocks) {
    let user_id = UserId::random();
    mocks
        .payments
        .expect_find_by_reference()
        .returning(move |provider, reference| {
            Ok(Some(log_entry(provider, reference, Some(user_id), 5750)))
        });
    mocks.users.expect_find_credentials().times(0);
    mocks
        .payments
        .expect_upsert_stripe_payment()
        .withf(move |record| {
            record.user_id == Some(user_id)
                && record.status == "paid"
                && record.paid_at == Some(fixture_timestamp())
        })
        .times(1)
        .returning(|record| {
            Ok(crate::domain::payments::stripe::StripePayment {
                id: 1,
                session_id: record.session_id.clone(),
                user_id: record.user_id,
                payment_intent_id: record.payment_intent_id.clone(),
                customer_id: None,
                email: record.email.clone(),
                amount_total_cents: record.amount_total_cents,
                currency: record.currency.clone(),
                status: record.status.clone(),
                purpose: record.purpose.clone(),
                receipt_url: None,
                paid_at: record.paid_at,
                created_at: fixture_timestamp(),
                updated_at: fixture_timestamp(),
            })
        });
    mocks
        .enrollments
        .expect_settle()
        .withf(move |user, subject_id, _| *user == user_id && *subject_id == 1)
        .times(1)
        .returning(|user_id, _, _| Ok(enrollment(*user_id, EnrollmentStatus::Active)));
    mocks
        .payments
        .expect_set_status()
        .withf(|provider, reference, status, _| {
            *provider == PaymentProvider::Stripe
                && reference == "cs_test_1"
                && *status == PaymentStatus::Paid
        })
        .times(1)
        .returning(|_, _, _, _| Ok(true));

    let outcome = service(mocks, settings())
        .handle_stripe_webhook(webhook(&completed_event(user_id, "paid")))
        .await
        .expect("settled");
    assert!(matches!(outcome, CallbackOutcome::Settled { .. }));
}

#[rstest]
#[tokio::test]
async fn webhook_with_bad_signature_is_rejected(mut mocks: Mocks) {
    mocks.payments.expect_find_by_reference().times(0);
    let mut request = webhook(&completed_event(UserId::random(), "paid"));
    request.signature_header = "t=1,v1=deadbeef".to_owned();

    let err = service(mocks, settings())
        .handle_stripe_webhook(request)
        .await
        .expect_err("bad signature");
    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

#[rstest]
#[tokio::test]
async fn webhook_without_secret_is_unavailable(mocks: Mocks) {
    let err = service(
        mocks,
        CheckoutSettings {
            stripe_webhook_secret: None,
            ..settings()
        },
    )
    .handle_stripe_webhook(webhook(&completed_event(UserId::random(), "paid")))
    .await
    .expect_err("not configured");
    assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
}

#[rstest]
#[tokio::test]
async fn other_events_are_ignored(mut mocks: Mocks) {
    mocks.payments.expect_find_by_reference().times(0);
    let event = json!({ "id": "evt_2", "type": "invoice.paid", "data": { "object": {} } });

    let outcome = service(mocks, settings())
        .handle_stripe_webhook(webhook(&event))
        .await
        .expect("ignored");
    assert!(matches!(outcome, CallbackOutcome::Ignored { .. }));
}

#[rstest]
#[tokio::test]
async fn cancel_requires_an_open_session(mut mocks: Mocks) {
    mocks
        .payments
        .expect_cancel_stripe_payment()
        .returning(|_, _, _| Ok(false));
    mocks.payments.expect_set_status().times(0);

    let err = service(mocks, settings())
        .cancel_stripe(UserId::random(), "cs_missing".to_owned())
        .await
        .expect_err("nothing to cancel");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn cancel_is_scoped_to_the_session_owner(mut mocks: Mocks) {
    let owner = UserId::random();
    let other = UserId::random();
    mocks
        .payments
        .expect_cancel_stripe_payment()
        .withf(|session_id, _, at| session_id == "cs_test_1" && *at == fixture_timestamp())
        .times(2)
        .returning(move |_, user_id, _| Ok(*user_id == owner));
    mocks
        .payments
        .expect_set_status()
        .withf(|provider, reference, status, _| {
            *provider == PaymentProvider::Stripe
                && reference == "cs_test_1"
                && *status == PaymentStatus::Canceled
        })
        .times(1)
        .returning(|_, _, _, _| Ok(true));
    let svc = service(mocks, settings());

    let err = svc
        .cancel_stripe(other, "cs_test_1".to_owned())
        .await
        .expect_err("someone else's session");
    assert_eq!(err.code(), ErrorCode::NotFound);
    svc.cancel_stripe(owner, "cs_test_1".to_owned())
        .await
        .expect("owner cancels");
}

#[rstest]
#[case("COMPLETE")]
#[case("FAILED")]
#[tokio::test]
async fn redelivered_payfast_notifications_leave_a_paid_payment_alone(
    mut mocks: Mocks,
    #[case] status: &str,
) {
    let user_id = UserId::random();
    mocks.validator.expect_validate().returning(|_| Ok(true));
    mocks
        .payments
        .expect_find_by_reference()
        .returning(move |provider, reference| {
            Ok(Some(PaymentLogEntry {
                status: PaymentStatus::Paid,
                ..log_entry(provider, reference, Some(user_id), 5750)
            }))
        });
    mocks.enrollments.expect_settle().times(0);
    mocks.payments.expect_set_status().times(0);

    let outcome = service(mocks, settings())
        .handle_payfast_notification(notification(user_id, status, "57.50"))
        .await
        .expect("acknowledged");
    assert_eq!(
        outcome,
        CallbackOutcome::Ignored {
            reason: "payment already settled".to_owned()
        }
    );
}

#[rstest]
#[tokio::test]
async fn retried_stripe_events_leave_a_paid_payment_alone(mut mocks: Mocks) {
    let user_id = UserId::random();
    mocks
        .payments
        .expect_find_by_reference()
        .returning(move |provider, reference| {
            Ok(Some(PaymentLogEntry {
                status: PaymentStatus::Paid,
                ..log_entry(provider, reference, Some(user_id), 5750)
            }))
        });
    mocks.payments.expect_upsert_stripe_payment().times(0);
    mocks.enrollments.expect_settle().times(0);
    mocks.payments.expect_set_status().times(0);

    let outcome = service(mocks, settings())
        .handle_stripe_webhook(webhook(&completed_event(user_id, "paid")))
        .await
        .expect("acknowledged");
    assert!(matches!(outcome, CallbackOutcome::Ignored { .. }));
}

#[rstest]
#[case(0, 1)]
#[case(50, 50)]
#[case(10_000, PAYMENT_LIST_MAX)]
#[tokio::test]
async fn payment_listing_clamps_limit(mut mocks: Mocks, #[case] requested: i64, #[case] expected: i64) {
    mocks
        .payments
        .expect_list()
        .withf(move |limit| *limit == expected)
        .times(1)
        .returning(|_| Ok(Vec::new()));

    let rows = service(mocks, settings())
        .list_payments(requested)
        .await
        .expect("listed");
    assert!(rows.is_empty());
}
