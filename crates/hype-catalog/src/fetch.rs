//! The HTTP seam and the eventually-consistent retry policy.
//!
//! The catalog answers a request for a large or uncached export with
//! [`PROCESSING_STATUS`] instead of data. Callers poll at a fixed interval
//! until the export is ready or the attempt bound runs out.

use std::{future::Future, time::Duration};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// The catalog's "still preparing, try later" status.
pub const PROCESSING_STATUS: u16 = 202;

// ─── Requests ────────────────────────────────────────────────────────────────

/// An outbound GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
  pub url:     String,
  pub headers: Vec<(String, String)>,
}

impl FetchRequest {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      url:     url.into(),
      headers: Vec::new(),
    }
  }

  pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Attach `Authorization: Bearer <token>` when a token is configured.
  pub fn bearer(self, token: Option<&str>) -> Self {
    match token {
      Some(t) if !t.is_empty() => self.header("Authorization", format!("Bearer {t}")),
      _ => self,
    }
  }
}

/// Status code and body text of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
  pub status: u16,
  pub body:   String,
}

impl FetchResponse {
  pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Minimal HTTP capability the adapters need.
///
/// Implementations return [`Error::Transport`] for network-level failures and
/// a [`FetchResponse`] for every completed exchange, whatever its status.
pub trait HttpFetch: Send + Sync {
  fn fetch(
    &self,
    request: FetchRequest,
  ) -> impl Future<Output = Result<FetchResponse>> + Send + '_;
}

/// [`HttpFetch`] over a shared [`reqwest::Client`].
///
/// Cheap to clone; the inner client is `Arc`-based.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
  client: reqwest::Client,
}

impl ReqwestFetcher {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| Error::Transport(Box::new(e)))?;
    Ok(Self { client })
  }

  pub fn from_client(client: reqwest::Client) -> Self { Self { client } }
}

impl HttpFetch for ReqwestFetcher {
  async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
    let mut builder = self.client.get(&request.url);
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }

    let resp = builder
      .send()
      .await
      .map_err(|e| Error::Transport(Box::new(e)))?;
    let status = resp.status().as_u16();
    let body = resp
      .text()
      .await
      .map_err(|e| Error::Transport(Box::new(e)))?;
    Ok(FetchResponse { status, body })
  }
}

// ─── Retry policy ────────────────────────────────────────────────────────────

/// A fixed-interval poll: at most `max_attempts` requests, `delay` apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub max_attempts: u32,
  pub delay:        Duration,
}

impl RetryPolicy {
  /// Used by the relay when it calls the catalog.
  pub const RELAY: Self = Self {
    max_attempts: 5,
    delay:        Duration::from_secs(2),
  };

  /// Used by clients calling through the relay, or directly.
  pub const CALLER: Self = Self {
    max_attempts: 6,
    delay:        Duration::from_secs(3),
  };
}

impl Default for RetryPolicy {
  fn default() -> Self { Self::CALLER }
}

/// Issue `request` under `policy` and return the body of the first success.
///
/// - [`PROCESSING_STATUS`] sleeps `policy.delay` and retries; once the bound
///   is spent the result is [`Error::NotReady`].
/// - Any other non-success status is [`Error::Upstream`] at once.
/// - Transport errors are retried immediately up to the same bound; the last
///   one is returned as-is.
pub async fn fetch_with_retry<F>(
  fetcher: &F,
  request: &FetchRequest,
  policy: RetryPolicy,
) -> Result<String>
where
  F: HttpFetch + ?Sized,
{
  let max_attempts = policy.max_attempts.max(1);
  let mut attempt = 0;

  loop {
    attempt += 1;
    let last = attempt >= max_attempts;

    match fetcher.fetch(request.clone()).await {
      Ok(resp) if resp.status == PROCESSING_STATUS => {
        if last {
          warn!(url = %request.url, attempts = attempt, "catalog still processing; giving up");
          return Err(Error::NotReady);
        }
        debug!(url = %request.url, attempt, "catalog processing; retrying after delay");
        tokio::time::sleep(policy.delay).await;
      }
      Ok(resp) if resp.is_success() => return Ok(resp.body),
      Ok(resp) => return Err(Error::Upstream { status: resp.status }),
      Err(e) => {
        if last {
          return Err(e);
        }
        debug!(url = %request.url, attempt, error = %e, "catalog request failed; retrying");
      }
    }
  }
}


#[cfg(test)]
mod tests {
  use tokio::time::Instant;

  use super::{testing::*, *};

  fn policy() -> RetryPolicy {
    RetryPolicy {
      max_attempts: 6,
      delay:        Duration::from_secs(3),
    }
  }

  #[tokio::test(start_paused = true)]
  async fn processing_then_success() {
    let fetcher = ScriptedFetcher::new(vec![
      status(202, ""),
      status(202, ""),
      status(202, ""),
      status(202, ""),
      status(200, "<items/>"),
    ]);
    let started = Instant::now();

    let body = fetch_with_retry(&fetcher, &FetchRequest::new("u"), policy())
      .await
      .unwrap();

    assert_eq!(body, "<items/>");
    assert_eq!(fetcher.calls(), 5);
    assert_eq!(started.elapsed(), Duration::from_secs(12));
  }

  #[tokio::test(start_paused = true)]
  async fn exhausted_processing_is_not_ready() {
    let fetcher = ScriptedFetcher::new((0..5).map(|_| status(202, "")).collect());
    let err = fetch_with_retry(&fetcher, &FetchRequest::new("u"), RetryPolicy::RELAY)
      .await
      .unwrap_err();
    assert!(err.is_not_ready());
    assert_eq!(fetcher.calls(), 5);
  }

  #[tokio::test(start_paused = true)]
  async fn other_status_is_terminal() {
    let fetcher = ScriptedFetcher::new(vec![status(202, ""), status(429, "slow down")]);
    let err = fetch_with_retry(&fetcher, &FetchRequest::new("u"), policy())
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Upstream { status: 429 }));
    assert_eq!(fetcher.calls(), 2);
  }

  #[tokio::test(start_paused = true)]
  async fn transport_errors_retry_then_surface_last() {
    let fetcher = ScriptedFetcher::new(vec![
      Err(Error::Transport("reset 1".into())),
      Err(Error::Transport("reset 2".into())),
      Err(Error::Transport("reset 3".into())),
    ]);
    let policy = RetryPolicy {
      max_attempts: 3,
      delay:        Duration::from_secs(2),
    };
    let err = fetch_with_retry(&fetcher, &FetchRequest::new("u"), policy)
      .await
      .unwrap_err();
    assert_eq!(err.to_string(), "transport error: reset 3");
    assert_eq!(fetcher.calls(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn transport_error_then_success() {
    let fetcher = ScriptedFetcher::new(vec![
      Err(Error::Transport("dns".into())),
      status(200, "ok"),
    ]);
    let body = fetch_with_retry(&fetcher, &FetchRequest::new("u"), policy())
      .await
      .unwrap();
    assert_eq!(body, "ok");
  }

  #[test]
  fn bearer_only_with_token() {
    let req = FetchRequest::new("u").bearer(Some("abc"));
    assert_eq!(req.headers, vec![("Authorization".to_string(), "Bearer abc".to_string())]);
    assert!(FetchRequest::new("u").bearer(None).headers.is_empty());
    assert!(FetchRequest::new("u").bearer(Some("")).headers.is_empty());
  }
}
