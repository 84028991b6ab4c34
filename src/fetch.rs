//! HTTP fetching with bounded timeouts and exponential backoff.
//!
//! The source sites drop connections and rate-limit without warning, so
//! every network call in the collectors goes through the retrying client
//! here rather than bare `reqwest::get`.
//!
//! # Architecture
//!
//! - [`FetchAsync`]: core trait for one attempt at a request
//! - [`RetryFetch`]: decorator adding retry logic to any `FetchAsync`
//! - [`Client`]: the crate-wide wrapper combining both with a shared
//!   `reqwest::Client`
//!
//! # Retry Strategy
//!
//! - Maximum 3 retry attempts
//! - Exponential backoff starting at 500ms
//! - Maximum delay capped at 10 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd
//!
//! Retries cover transport failures and HTTP error statuses; they never
//! cover extraction failures, which are a different error kind entirely
//! (see [`crate::extract::ExtractError`]).

use rand::{rng, Rng};
use std::error::Error;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, instrument, warn};

/// Request timeout; the original left some navigations unbounded, which is
/// a hang risk this client does not reproduce.
const REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(30);
const MAX_RETRIES: usize = 3;
const BASE_DELAY: StdDuration = StdDuration::from_millis(500);
const MAX_DELAY: StdDuration = StdDuration::from_secs(10);

/// Browser-shaped headers the KRX data endpoint requires before it will
/// answer; requests without them get an empty payload.
pub const KRX_HEADERS: &[(&str, &str)] = &[
    ("Accept", "application/json, text/plain, */*"),
    ("Content-Type", "application/x-www-form-urlencoded"),
    ("Origin", "https://data.krx.co.kr"),
    ("Referer", "https://data.krx.co.kr"),
    (
        "User-Agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/113.0.0.0 Safari/537.36",
    ),
];

/// Trait for one async fetch attempt producing a response body.
pub trait FetchAsync {
    type Response;

    async fn fetch(&self) -> Result<Self::Response, Box<dyn Error>>;
}

/// Wrapper that adds exponential backoff retry logic to any [`FetchAsync`]
/// implementation.
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: FetchAsync,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: MAX_DELAY,
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> FetchAsync for RetryFetch<T>
where
    T: FetchAsync,
{
    type Response = T::Response;

    async fn fetch(&self) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.fetch().await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                            elapsed_ms_total = total_dt.as_millis() as u128,
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    // backoff calc
                    let mut delay = self.base_delay.saturating_mul(1 << (attempt - 1));
                    if delay > self.max_delay {
                        delay = self.max_delay;
                    }
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u128,
                        elapsed_ms_total = total_dt.as_millis() as u128,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// One GET attempt against `url` with optional extra headers.
struct GetOnce<'a> {
    http: &'a reqwest::Client,
    url: &'a str,
    headers: &'a [(&'a str, &'a str)],
}

impl FetchAsync for GetOnce<'_> {
    type Response = String;

    async fn fetch(&self) -> Result<Self::Response, Box<dyn Error>> {
        let mut req = self.http.get(self.url);
        for (name, value) in self.headers {
            req = req.header(*name, *value);
        }
        let body = req.send().await?.error_for_status()?.text().await?;
        Ok(body)
    }
}

/// One POST attempt with a url-encoded form body.
struct PostFormOnce<'a> {
    http: &'a reqwest::Client,
    url: &'a str,
    form: &'a [(&'a str, &'a str)],
}

impl FetchAsync for PostFormOnce<'_> {
    type Response = String;

    async fn fetch(&self) -> Result<Self::Response, Box<dyn Error>> {
        let body = self
            .http
            .post(self.url)
            .form(self.form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

/// One GET attempt for a binary body (logo images).
struct GetBytesOnce<'a> {
    http: &'a reqwest::Client,
    url: &'a str,
}

impl FetchAsync for GetBytesOnce<'_> {
    type Response = Vec<u8>;

    async fn fetch(&self) -> Result<Self::Response, Box<dyn Error>> {
        let bytes = self
            .http
            .get(self.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

/// Crate-wide HTTP client: one `reqwest::Client` per run, every request
/// bounded and retried.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
}

impl Client {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Client { http })
    }

    /// GET `url` and return the body text.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn get_text(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let once = GetOnce {
            http: &self.http,
            url,
            headers: &[],
        };
        RetryFetch::new(once, MAX_RETRIES, BASE_DELAY).fetch().await
    }

    /// GET `url` with the KRX browser-shaped header set.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn get_text_krx(&self, url: &str) -> Result<String, Box<dyn Error>> {
        let once = GetOnce {
            http: &self.http,
            url,
            headers: KRX_HEADERS,
        };
        RetryFetch::new(once, MAX_RETRIES, BASE_DELAY).fetch().await
    }

    /// POST a url-encoded form and return the body text.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<String, Box<dyn Error>> {
        let once = PostFormOnce {
            http: &self.http,
            url,
            form,
        };
        RetryFetch::new(once, MAX_RETRIES, BASE_DELAY).fetch().await
    }

    /// GET a binary body (images).
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, Box<dyn Error>> {
        let once = GetBytesOnce {
            http: &self.http,
            url,
        };
        RetryFetch::new(once, MAX_RETRIES, BASE_DELAY).fetch().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    /// Fails a fixed number of times, then succeeds.
    struct Flaky {
        failures_left: RefCell<usize>,
        calls: RefCell<usize>,
    }

    impl FetchAsync for Flaky {
        type Response = &'static str;

        async fn fetch(&self) -> Result<Self::Response, Box<dyn Error>> {
            *self.calls.borrow_mut() += 1;
            let mut left = self.failures_left.borrow_mut();
            if *left > 0 {
                *left -= 1;
                Err("transient".into())
            } else {
                Ok("body")
            }
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let flaky = Flaky {
            failures_left: RefCell::new(2),
            calls: RefCell::new(0),
        };
        let retry = RetryFetch::new(flaky, 3, StdDuration::from_millis(1));
        let out = retry.fetch().await.unwrap();
        assert_eq!(out, "body");
        assert_eq!(*retry.inner.calls.borrow(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let flaky = Flaky {
            failures_left: RefCell::new(usize::MAX),
            calls: RefCell::new(0),
        };
        let retry = RetryFetch::new(flaky, 2, StdDuration::from_millis(1));
        assert!(retry.fetch().await.is_err());
        // initial attempt plus two retries
        assert_eq!(*retry.inner.calls.borrow(), 3);
    }
}
