//! Status fetch against a device's admin API.
//!
//! One bounded-timeout GET of `/admin/api.php`. No retries happen here;
//! confirmation re-polls are driven by the state machine.

use std::future::Future;
use std::time::Duration;

use http_body_util::BodyExt;
use thiserror::Error;
use tracing::debug;

use holewatch_core::socket_address;

/// Fixed path of the status endpoint.
pub const STATUS_PATH: &str = "/admin/api.php";

/// Parsed JSON body of the status endpoint.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Why a status fetch produced no payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, protocol error or timeout.
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// The device answered, but not with a JSON object.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Source of device status payloads.
pub trait StatusFetcher: Send + Sync {
    fn fetch(
        &self,
        address: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<Payload, FetchError>> + Send;
}

/// Plain HTTP/1.1 fetcher used in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpFetcher;

impl StatusFetcher for HttpFetcher {
    async fn fetch(&self, address: &str, timeout: Duration) -> Result<Payload, FetchError> {
        fetch_status(address, timeout).await
    }
}

/// GET `http://<address>/admin/api.php` within `timeout`.
pub async fn fetch_status(address: &str, timeout: Duration) -> Result<Payload, FetchError> {
    let target = socket_address(address);
    let uri = format!("http://{target}{STATUS_PATH}");

    let body = tokio::time::timeout(timeout, async {
        let stream = tokio::net::TcpStream::connect(&target).await.map_err(|e| {
            debug!(error = %e, %uri, "status fetch connection failed");
            FetchError::Unreachable(e.to_string())
        })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| {
                debug!(error = %e, %uri, "status fetch handshake failed");
                FetchError::Unreachable(e.to_string())
            })?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(STATUS_PATH)
            .header("host", &target)
            .header("user-agent", "holewatch/0.1")
            .header("accept", "application/json")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| FetchError::Unreachable(e.to_string()))?;

        let resp = sender.send_request(req).await.map_err(|e| {
            debug!(error = %e, %uri, "status fetch request failed");
            FetchError::Unreachable(e.to_string())
        })?;

        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| FetchError::Unreachable(e.to_string()))?
            .to_bytes();

        if !status.is_success() {
            debug!(%status, %uri, "status fetch non-2xx");
            return Err(FetchError::MalformedResponse(format!("HTTP {status}")));
        }
        Ok::<_, FetchError>(bytes)
    })
    .await
    .map_err(|_| {
        debug!(%uri, "status fetch timed out");
        FetchError::Unreachable(format!("timed out after {timeout:?}"))
    })??;

    parse_payload(&body)
}

/// Decode a response body into a payload.
///
/// Empty bodies, invalid JSON and JSON that is not an object are all
/// `MalformedResponse`, never `Unreachable`.
pub fn parse_payload(body: &[u8]) -> Result<Payload, FetchError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(FetchError::MalformedResponse("empty body".to_string()));
    }
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(FetchError::MalformedResponse(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
        Err(e) => Err(FetchError::MalformedResponse(e.to_string())),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_object_body() {
        let payload = parse_payload(br#"{"status":"enabled","domains_being_blocked":1}"#).unwrap();
        assert_eq!(payload["status"], "enabled");
    }

    #[test]
    fn empty_body_is_malformed() {
        assert!(matches!(parse_payload(b""), Err(FetchError::MalformedResponse(_))));
        assert!(matches!(parse_payload(b" \r\n"), Err(FetchError::MalformedResponse(_))));
    }

    #[test]
    fn html_body_is_malformed() {
        let err = parse_payload(b"<html>lighttpd</html>").unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn non_object_json_is_malformed() {
        let err = parse_payload(b"[]").unwrap_err();
        assert_eq!(
            err,
            FetchError::MalformedResponse("expected a JSON object, got an array".to_string())
        );
    }

    #[tokio::test]
    async fn fetch_from_closed_port_is_unreachable() {
        let result = fetch_status("127.0.0.1:1", Duration::from_millis(200)).await;
        assert!(matches!(result, Err(FetchError::Unreachable(_))));
    }
}
