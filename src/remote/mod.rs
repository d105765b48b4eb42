//! The seam to the messaging platform's HTTP API.
//!
//! The reconciler only ever talks to a [`RemoteClient`]; production code uses
//! [`http::HttpRemoteClient`] while tests script a fake. Rate limiting is
//! handled here, at the seam: [`call_api`] retries any single call until it
//! succeeds or fails with something other than [`RemoteError::RateLimited`].

pub mod auth;
pub mod http;
pub mod types;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::cancel::CancelToken;

/// Distinguishable failure modes of a remote call.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The platform asked us to back off for `wait` before retrying.
    #[error("rate limited for the next {wait:?}")]
    RateLimited { wait: Duration },
    /// The platform rejected the call with an error code.
    #[error("remote call failed: {code} (warnings: {warnings:?})")]
    Api { code: String, warnings: Vec<String> },
    /// The request never produced a usable response.
    #[error("transport error: {0}")]
    Transport(String),
    /// The response body did not decode into the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// A back-off sleep was interrupted by cancellation.
    #[error("cancelled while waiting for the remote")]
    Cancelled,
}

/// Issues authenticated JSON calls against the platform API.
pub trait RemoteClient {
    /// Call `method` with `payload`, returning the raw response document.
    fn call_method(&self, method: &str, payload: Value) -> Result<Value, RemoteError>;
}

/// Call `method`, retrying transparently on rate limits, and decode the
/// response into `T`.
///
/// Sleeps are cancellable; a cancelled sleep aborts with
/// [`RemoteError::Cancelled`].
pub fn call_api<T: DeserializeOwned>(
    client: &dyn RemoteClient,
    cancel: &CancelToken,
    method: &str,
    payload: Value,
) -> Result<T, RemoteError> {
    loop {
        match client.call_method(method, payload.clone()) {
            Ok(value) => {
                return serde_json::from_value(value)
                    .map_err(|e| RemoteError::Decode(format!("{method}: {e}")))
            }
            Err(RemoteError::RateLimited { wait }) => {
                debug!(method, ?wait, "rate limited, backing off");
                if !cancel.sleep(wait) {
                    return Err(RemoteError::Cancelled);
                }
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeRemote;
    use serde_json::json;

    #[test]
    fn call_api_retries_through_rate_limits() {
        let remote = FakeRemote::new();
        let wait = Duration::from_millis(10);
        remote.fail("conversations.archive", RemoteError::RateLimited { wait });
        remote.fail("conversations.archive", RemoteError::RateLimited { wait });
        remote.respond("conversations.archive", json!({"ok": true}));

        let cancel = CancelToken::new();
        let _: Value = call_api(&remote, &cancel, "conversations.archive", json!({}))
            .expect("eventual success");
        assert_eq!(remote.call_count("conversations.archive"), 3);
    }

    #[test]
    fn call_api_surfaces_api_errors() {
        let remote = FakeRemote::new();
        remote.fail(
            "conversations.rename",
            RemoteError::Api {
                code: "name_taken".to_string(),
                warnings: vec![],
            },
        );
        let cancel = CancelToken::new();
        let err = call_api::<Value>(&remote, &cancel, "conversations.rename", json!({}))
            .expect_err("api error");
        assert!(matches!(err, RemoteError::Api { code, .. } if code == "name_taken"));
        assert_eq!(remote.call_count("conversations.rename"), 1);
    }

    #[test]
    fn cancelled_backoff_aborts_the_call() {
        let remote = FakeRemote::new();
        remote.fail(
            "usergroups.list",
            RemoteError::RateLimited {
                wait: Duration::from_secs(3600),
            },
        );
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = call_api::<Value>(&remote, &cancel, "usergroups.list", json!({}))
            .expect_err("cancelled");
        assert!(matches!(err, RemoteError::Cancelled));
    }
}
