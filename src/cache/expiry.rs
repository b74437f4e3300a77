//! Clock abstraction and expiry derived from `Cache-Control` headers

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::header::{CACHE_CONTROL, HeaderMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::debug;

const MAX_AGE: &str = "max-age";

/// Source of "now" for expiry, pending and sweep decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock, shared between clones
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Saturating `std` to `chrono` duration conversion
pub fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

pub fn saturating_add(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    at.checked_add_signed(to_delta(duration))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

pub fn saturating_sub(at: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    at.checked_sub_signed(to_delta(duration))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Extract `max-age` delta-seconds from a Cache-Control value.
///
/// Only the first directive starting with `max-age` is considered. Its name
/// must be exactly `max-age` and its value a base-10 integer that is either
/// literally `0` or strictly between zero and `i32::MAX`.
pub fn max_age_from_cache_control(cache_control: &str) -> Option<u32> {
    let directive = cache_control
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .find(|token| token.starts_with(MAX_AGE))?;

    let mut parts = directive.split('=').filter(|part| !part.is_empty());

    if parts.next()?.trim() != MAX_AGE {
        return None;
    }

    let value = parts.next()?.trim();
    if value == "0" {
        return Some(0);
    }

    match value.parse::<i32>() {
        Ok(seconds) if seconds > 0 && seconds < i32::MAX => u32::try_from(seconds).ok(),
        _ => None,
    }
}

/// Absolute expiry from a Cache-Control value, if it carries a usable max-age
pub fn expiration_from_cache_control(
    cache_control: Option<&str>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let max_age = max_age_from_cache_control(cache_control?)?;
    Some(saturating_add(now, Duration::from_secs(u64::from(max_age))))
}

/// Absolute expiry for a lookup response, `default_expiry` from now when the
/// header is missing or malformed
pub fn name_expiration(
    cache_control: Option<&str>,
    now: DateTime<Utc>,
    default_expiry: Duration,
) -> DateTime<Utc> {
    match expiration_from_cache_control(cache_control, now) {
        Some(expires) => {
            debug!(
                "expires based on cache control in {} seconds",
                (expires - now).num_seconds()
            );
            expires
        }
        None => {
            debug!(
                "default expiration in {} seconds",
                default_expiry.as_secs()
            );
            saturating_add(now, default_expiry)
        }
    }
}

/// [`name_expiration`] reading `cache-control` out of a response header map
pub fn name_expiration_from_headers(
    headers: &HeaderMap,
    now: DateTime<Utc>,
    default_expiry: Duration,
) -> DateTime<Utc> {
    let cache_control = headers
        .get(CACHE_CONTROL)
        .and_then(|value| value.to_str().ok());
    name_expiration(cache_control, now, default_expiry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_max_age_simple() {
        assert_eq!(max_age_from_cache_control("max-age=120"), Some(120));
        assert_eq!(max_age_from_cache_control("  max-age = 60 "), Some(60));
    }

    #[test]
    fn test_max_age_in_directive_list() {
        assert_eq!(max_age_from_cache_control("no-cache, max-age=0"), Some(0));
        assert_eq!(
            max_age_from_cache_control("private ,max-age=3600, must-revalidate"),
            Some(3600)
        );
    }

    #[test]
    fn test_max_age_rejections() {
        assert_eq!(max_age_from_cache_control("max-age=abc"), None);
        assert_eq!(max_age_from_cache_control("private"), None);
        assert_eq!(max_age_from_cache_control(""), None);
        assert_eq!(max_age_from_cache_control("max-age"), None);
        assert_eq!(max_age_from_cache_control("max-age="), None);
        assert_eq!(max_age_from_cache_control("max-age=-5"), None);
        assert_eq!(max_age_from_cache_control("max-age=2147483647"), None);
        assert_eq!(max_age_from_cache_control("max-age=99999999999"), None);
        // prefix match picks the directive, exact name check rejects it
        assert_eq!(max_age_from_cache_control("max-agex=10, max-age=5"), None);
    }

    #[test]
    fn test_expiration_uses_max_age() {
        let now = Utc::now();
        assert_eq!(
            name_expiration(Some("max-age=120"), now, HOUR),
            now + TimeDelta::seconds(120)
        );
        assert_eq!(name_expiration(Some("no-cache, max-age=0"), now, HOUR), now);
    }

    #[test]
    fn test_expiration_falls_back_to_default() {
        let now = Utc::now();
        let default = now + TimeDelta::hours(1);
        assert_eq!(name_expiration(Some("max-age=abc"), now, HOUR), default);
        assert_eq!(name_expiration(Some("private"), now, HOUR), default);
        assert_eq!(name_expiration(None, now, HOUR), default);
    }

    #[test]
    fn test_expiration_from_headers_case_insensitive() {
        let now = Utc::now();
        let mut headers = HeaderMap::new();
        headers.insert("Cache-Control", HeaderValue::from_static("max-age=30"));
        assert_eq!(
            name_expiration_from_headers(&headers, now, HOUR),
            now + TimeDelta::seconds(30)
        );
        assert_eq!(
            name_expiration_from_headers(&HeaderMap::new(), now, HOUR),
            now + TimeDelta::hours(1)
        );
    }

    #[test]
    fn test_manual_clock_advances_shared() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        let other = clock.clone();
        other.advance(Duration::from_secs(90));
        assert_eq!(
            clock.now().timestamp_millis(),
            (start + TimeDelta::seconds(90)).timestamp_millis()
        );
    }

    #[test]
    fn test_saturating_helpers() {
        let now = Utc::now();
        assert_eq!(
            saturating_add(now, Duration::from_secs(u64::MAX)),
            DateTime::<Utc>::MAX_UTC
        );
        assert_eq!(
            saturating_sub(now, Duration::from_secs(u64::MAX)),
            DateTime::<Utc>::MIN_UTC
        );
    }
}
