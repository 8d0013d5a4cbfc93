//! HTTP plumbing shared by the reqwest adapters.

use std::time::Duration;

use reqwest::{Client, StatusCode};

use crate::domain::ports::NetworkError;

pub(crate) const USER_AGENT: &str = concat!("map-engine/", env!("CARGO_PKG_VERSION"));

/// Build a client with the engine's user agent and a request timeout.
pub(crate) fn client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Join `path` onto `base`, tolerating a trailing slash on either side.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

pub(crate) fn map_transport_error(error: reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        NetworkError::timeout(error.to_string())
    } else if error.is_decode() {
        NetworkError::decode(error.to_string())
    } else {
        NetworkError::transport(error.to_string())
    }
}

pub(crate) fn map_status_error(status: StatusCode, body: &[u8]) -> NetworkError {
    let preview = body_preview(body);
    let message = if preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        preview
    };

    match status {
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => NetworkError::timeout(message),
        _ if status.is_server_error() => NetworkError::server_error(status.as_u16(), message),
        _ => NetworkError::rejected(status.as_u16(), message),
    }
}

/// Read the body of a response, mapping non-success statuses to errors.
pub(crate) async fn success_body(response: reqwest::Response) -> Result<Vec<u8>, NetworkError> {
    let status = response.status();
    let body = response.bytes().await.map_err(map_transport_error)?;
    if !status.is_success() {
        return Err(map_status_error(status, body.as_ref()));
    }
    Ok(body.to_vec())
}

fn body_preview(body: &[u8]) -> String {
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
    #[case::request_timeout(StatusCode::REQUEST_TIMEOUT, true, "Timeout")]
    #[case::gateway_timeout(StatusCode::GATEWAY_TIMEOUT, true, "Timeout")]
    #[case::unavailable(StatusCode::SERVICE_UNAVAILABLE, true, "ServerError")]
    #[case::internal(StatusCode::INTERNAL_SERVER_ERROR, true, "ServerError")]
    #[case::bad_request(StatusCode::BAD_REQUEST, false, "Rejected")]
    #[case::rate_limited(StatusCode::TOO_MANY_REQUESTS, false, "Rejected")]
    fn maps_http_statuses_to_network_errors(
        #[case] status: StatusCode,
        #[case] retryable: bool,
        #[case] variant: &str,
    ) {
        let error = map_status_error(status, b"{\"error\": \"upstream unhappy\"}");

        assert_eq!(error.is_retryable(), retryable);
        let matched = match variant {
            "Timeout" => matches!(error, NetworkError::Timeout { .. }),
            "ServerError" => matches!(error, NetworkError::ServerError { .. }),
            "Rejected" => matches!(error, NetworkError::Rejected { .. }),
            _ => panic!("unsupported test expectation: {variant}"),
        };
        assert!(matched, "{status} mapped to {error:?}");
    }

    #[rstest]
    fn previews_are_compacted_and_truncated() {
        let long = format!("  line one\n\n{}", "x".repeat(200));
        let preview = body_preview(long.as_bytes());
        assert!(preview.starts_with("line one x"));
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 163);
    }

    #[rstest]
    #[case("https://nominatim.example/", "/search", "https://nominatim.example/search")]
    #[case("http://localhost:8080/api", "poi/nearby", "http://localhost:8080/api/poi/nearby")]
    fn joins_endpoints(#[case] base: &str, #[case] path: &str, #[case] expected: &str) {
        assert_eq!(endpoint(base, path), expected);
    }
}
