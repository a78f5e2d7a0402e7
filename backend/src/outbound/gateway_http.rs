//! Transport helpers shared by the payment gateway adapters.

use reqwest::StatusCode;

use crate::domain::ports::PaymentGatewayError;

pub(crate) fn map_transport_error(error: &reqwest::Error) -> PaymentGatewayError {
    if error.is_timeout() {
        PaymentGatewayError::unavailable(format!("request timed out: {error}"))
    } else {
        PaymentGatewayError::unavailable(error.to_string())
    }
}

pub(crate) fn map_status_error(status: StatusCode, body: &[u8]) -> PaymentGatewayError {
    let preview = body_preview(body);
    if status.is_server_error() {
        return PaymentGatewayError::unavailable(format!("status {}: {preview}", status.as_u16()));
    }
    PaymentGatewayError::rejected(status.as_u16(), preview)
}

/// Single-line, bounded rendering of a response body for error messages.
pub(crate) fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(400);
        let preview = body_preview(body.as_bytes());
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 163);
    }

    #[rstest]
    #[case(StatusCode::BAD_GATEWAY, true)]
    #[case(StatusCode::UNAUTHORIZED, false)]
    fn server_errors_are_unavailable(#[case] status: StatusCode, #[case] unavailable: bool) {
        let error = map_status_error(status, b"{\"error\":\"nope\"}");
        assert_eq!(
            matches!(error, PaymentGatewayError::Unavailable { .. }),
            unavailable
        );
    }
}
