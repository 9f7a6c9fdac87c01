//! HTTP retry helpers for provider calls.
//!
//! Adapters should use [`send_json`] (keyless providers) or
//! [`send_json_with_credentials`] (keyed providers) instead of calling
//! `reqwest::RequestBuilder::send()` directly, so every outbound request
//! gets the same backoff and rotation policy.
//!
//! ```ignore
//! use citypulse_provider::retry;
//!
//! let body = retry::send_json("open_meteo", &policy, || client.get(&url)).await?;
//!
//! let body = retry::send_json_with_credentials(&pool, &policy, |key| {
//!     client.get(&url).query(&[("apikey", key)])
//! })
//! .await?;
//! ```

use citypulse_config::ProvidersConfig;
use reqwest::StatusCode;

use crate::ProviderError;
use crate::credentials::{CheckoutError, CredentialPool};

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 500;

/// How a response status should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx/3xx: decode the body.
    Success,
    /// The credential was refused or throttled: rotate and retry.
    RateLimited,
    /// Worth retrying with the same credential after a backoff.
    Transient,
    /// Permanent failure.
    Fatal,
}

/// Classifies `status` for the retry loop.
///
/// With credentials, 401 and 403 count as rate limiting because providers
/// use them for exhausted or revoked quota on a single key. Without
/// credentials they are permanent.
#[must_use]
pub fn classify_status(status: StatusCode, credentialed: bool) -> StatusClass {
    if status == StatusCode::TOO_MANY_REQUESTS {
        if credentialed {
            StatusClass::RateLimited
        } else {
            StatusClass::Transient
        }
    } else if credentialed && (status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN)
    {
        StatusClass::RateLimited
    } else if status.is_server_error() {
        StatusClass::Transient
    } else if status.is_client_error() {
        StatusClass::Fatal
    } else {
        StatusClass::Success
    }
}

/// Sends a keyless request, retrying transient failures with exponential
/// backoff, and parses the body as JSON.
///
/// The `build_request` closure is called on each attempt because request
/// builders are consumed by `.send()`.
///
/// # Errors
///
/// Returns [`ProviderError`] for a permanent status, an undecodable body,
/// or when attempts are exhausted ([`ProviderError::RateLimited`] if the
/// last failure was a 429).
pub async fn send_json<F>(
    provider: &str,
    policy: &ProvidersConfig,
    build_request: F,
) -> Result<serde_json::Value, ProviderError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_error: Option<ProviderError> = None;

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            let delay = policy.backoff(attempt - 1);
            log::warn!(
                "{provider}: retry {}/{} in {delay:?}...",
                attempt - 1,
                policy.max_attempts - 1
            );
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) {
                    log::warn!("{provider}: transient error: {e}");
                    last_error = Some(ProviderError::Http(e));
                    continue;
                }
                return Err(ProviderError::Http(e));
            }
            Ok(response) => match classify_status(response.status(), false) {
                StatusClass::Success => return decode_json(provider, response).await,
                StatusClass::Transient => {
                    let status = response.status();
                    log::warn!("{provider}: HTTP {status}");
                    last_error = Some(if status == StatusCode::TOO_MANY_REQUESTS {
                        ProviderError::RateLimited {
                            provider: provider.to_string(),
                            attempts: attempt,
                        }
                    } else {
                        ProviderError::Status {
                            provider: provider.to_string(),
                            status: status.as_u16(),
                        }
                    });
                }
                StatusClass::RateLimited | StatusClass::Fatal => {
                    return Err(ProviderError::Status {
                        provider: provider.to_string(),
                        status: response.status().as_u16(),
                    });
                }
            },
        }
    }

    Err(last_error.unwrap_or_else(|| ProviderError::RateLimited {
        provider: provider.to_string(),
        attempts: policy.max_attempts,
    }))
}

/// Sends a keyed request using credentials from `pool`.
///
/// Each attempt checks out a key and passes it to `build_request`. A 429,
/// 401, or 403 marks that key rate limited and the next attempt uses the
/// next key after an exponential backoff. Transient failures release the
/// key and retry.
///
/// # Errors
///
/// Returns [`ProviderError::NoCredentials`] for an empty pool,
/// [`ProviderError::RateLimited`] once `max_attempts` are spent on rate
/// limits, or the underlying error for permanent failures.
pub async fn send_json_with_credentials<F>(
    pool: &CredentialPool,
    policy: &ProvidersConfig,
    build_request: F,
) -> Result<serde_json::Value, ProviderError>
where
    F: Fn(&str) -> reqwest::RequestBuilder,
{
    let provider = pool.provider();
    let mut last_error: Option<ProviderError> = None;

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 {
            let delay = policy.backoff(attempt - 1);
            log::warn!(
                "{provider}: retry {}/{} in {delay:?}...",
                attempt - 1,
                policy.max_attempts - 1
            );
            tokio::time::sleep(delay).await;
        }

        let lease = match pool.checkout() {
            Ok(lease) => lease,
            Err(CheckoutError::Empty) => {
                return Err(ProviderError::NoCredentials {
                    provider: provider.to_string(),
                });
            }
            Err(CheckoutError::Exhausted { retry_after }) => {
                log::warn!("{provider}: all credentials busy (retry after {retry_after:?})");
                last_error = Some(ProviderError::RateLimited {
                    provider: provider.to_string(),
                    attempts: attempt,
                });
                continue;
            }
        };

        match build_request(lease.key()).send().await {
            Err(e) => {
                pool.release(lease);
                if is_transient(&e) {
                    log::warn!("{provider}: transient error: {e}");
                    last_error = Some(ProviderError::Http(e));
                    continue;
                }
                return Err(ProviderError::Http(e));
            }
            Ok(response) => {
                let status = response.status();
                match classify_status(status, true) {
                    StatusClass::Success => {
                        pool.release(lease);
                        return decode_json(provider, response).await;
                    }
                    StatusClass::RateLimited => {
                        log::warn!(
                            "{provider}: HTTP {status} on credential #{}, rotating",
                            lease.index()
                        );
                        pool.mark_rate_limited(lease);
                        last_error = Some(ProviderError::RateLimited {
                            provider: provider.to_string(),
                            attempts: attempt,
                        });
                    }
                    StatusClass::Transient => {
                        pool.release(lease);
                        log::warn!("{provider}: HTTP {status} (server error)");
                        last_error = Some(ProviderError::Status {
                            provider: provider.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    StatusClass::Fatal => {
                        pool.release(lease);
                        return Err(ProviderError::Status {
                            provider: provider.to_string(),
                            status: status.as_u16(),
                        });
                    }
                }
            }
        }
    }

    Err(match last_error {
        Some(ProviderError::RateLimited { .. }) | None => ProviderError::RateLimited {
            provider: provider.to_string(),
            attempts: policy.max_attempts,
        },
        Some(other) => other,
    })
}

/// Reads the body as text and parses it, logging a preview on failure.
async fn decode_json(
    provider: &str,
    response: reqwest::Response,
) -> Result<serde_json::Value, ProviderError> {
    let url = response.url().to_string();
    let status = response.status();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        let preview: String = text.chars().take(BODY_PREVIEW_LEN).collect();
        log::error!(
            "{provider}: JSON parse failed\n  \
             url: {url}\n  \
             status: {status}\n  \
             received: {} bytes\n  \
             parse error: {e}\n  \
             body preview: {preview}",
            text.len(),
        );
        ProviderError::Json(e)
    })
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_request()
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;

    /// Serves on loopback, answering 429 to keys starting with `bad` and
    /// `{"ok":true}` to everything else. Returns the base URL and the keys
    /// seen, in order.
    fn key_server() -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { continue };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                loop {
                    let mut header = String::new();
                    if reader.read_line(&mut header).unwrap() == 0 || header == "\r\n" {
                        break;
                    }
                }

                let key = request_line
                    .split_whitespace()
                    .nth(1)
                    .and_then(|target| target.split("key=").nth(1))
                    .unwrap_or_default()
                    .to_string();
                let (status, body) = if key.starts_with("bad") {
                    ("429 Too Many Requests", "{}")
                } else {
                    ("200 OK", r#"{"ok":true}"#)
                };
                log.lock().unwrap().push(key);

                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
        });

        (url, seen)
    }

    fn loopback_client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn fast_policy() -> ProvidersConfig {
        ProvidersConfig {
            max_attempts: 4,
            base_backoff_ms: 1,
            max_backoff_ms: 2,
            credential_cooldown_secs: 60,
        }
    }

    fn keyed_pool(keys: &[&str]) -> CredentialPool {
        CredentialPool::new(
            "loopback",
            keys.iter().map(ToString::to_string).collect(),
            Duration::from_secs(60),
        )
    }

    #[test]
    fn credentialed_auth_failures_rotate() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, true),
            StatusClass::RateLimited
        );
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, true),
            StatusClass::RateLimited
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN, true),
            StatusClass::RateLimited
        );
    }

    #[test]
    fn keyless_auth_failures_are_permanent() {
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED, false),
            StatusClass::Fatal
        );
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, false),
            StatusClass::Transient
        );
    }

    #[test]
    fn server_errors_are_transient_and_success_passes() {
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY, true),
            StatusClass::Transient
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND, true),
            StatusClass::Fatal
        );
        assert_eq!(classify_status(StatusCode::OK, false), StatusClass::Success);
    }

    #[tokio::test]
    async fn empty_pool_fails_without_sending() {
        let pool = CredentialPool::new("empty", Vec::new(), Duration::from_secs(1));
        let client = reqwest::Client::new();
        let err = send_json_with_credentials(&pool, &ProvidersConfig::default(), |key| {
            client.get(format!("http://127.0.0.1:9/?key={key}"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProviderError::NoCredentials { .. }), "{err}");
    }

    #[tokio::test]
    async fn rate_limited_keys_rotate_to_a_working_key() {
        let (url, seen) = key_server();
        let pool = keyed_pool(&["bad1", "bad2", "good"]);
        let client = loopback_client();

        let body = send_json_with_credentials(&pool, &fast_policy(), |key| {
            client.get(format!("{url}?key={key}"))
        })
        .await
        .unwrap();

        assert_eq!(body, serde_json::json!({ "ok": true }));
        assert_eq!(*seen.lock().unwrap(), ["bad1", "bad2", "good"]);

        // Both refused keys are cooling; only "good" is handed out.
        let lease = pool.checkout().unwrap();
        assert_eq!(lease.key(), "good");
        assert!(pool.checkout().is_err());
    }

    #[tokio::test]
    async fn all_keys_rate_limited_exhausts_attempts() {
        let (url, seen) = key_server();
        let pool = keyed_pool(&["bad1", "bad2"]);
        let client = loopback_client();

        let err = send_json_with_credentials(&pool, &fast_policy(), |key| {
            client.get(format!("{url}?key={key}"))
        })
        .await
        .unwrap_err();

        assert!(
            matches!(err, ProviderError::RateLimited { attempts: 4, .. }),
            "{err}"
        );
        assert_eq!(*seen.lock().unwrap(), ["bad1", "bad2"]);
    }
}
