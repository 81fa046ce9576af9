use crate::error::Result;
use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Trims and collapses runs of whitespace (including newlines) to one space.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// `base` plus a random extra delay of up to `jitter`.
pub fn jittered(base: Duration, jitter: Duration) -> Duration {
    if jitter.is_zero() {
        return base;
    }
    let extra = rand::rng().random_range(0..=jitter.as_millis() as u64);
    base + Duration::from_millis(extra)
}

/// Calls `check` every `interval` until it returns `Some` or `timeout`
/// elapses. The check always runs at least once.
pub async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(value) = check().await? {
            return Ok(Some(value));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        sleep(interval.min(deadline - now)).await;
    }
}

/// `google_reviews_20240131_174501.csv`
pub fn timestamped_filename(prefix: &str, extension: &str, at: DateTime<Local>) -> String {
    format!("{}_{}.{}", prefix, at.format("%Y%m%d_%H%M%S"), extension)
}
