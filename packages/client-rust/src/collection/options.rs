//! Per-call options for the collection verbs.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use kvwire_core::DurabilityLevel;
use tokio_util::sync::CancellationToken;

/// Relative expiries longer than this are sent as absolute unix times.
pub const RELATIVE_EXPIRY_LIMIT: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Options every verb accepts.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Per-call deadline; `None` or zero uses the client default.
    pub timeout: Option<Duration>,
    /// Caller-driven cancellation.
    pub cancel: Option<CancellationToken>,
}

impl RequestOptions {
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Options for whole-document writes.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Only write if the document still carries this CAS.
    pub cas: Option<u64>,
    pub expiry: Option<Duration>,
    pub durability: DurabilityLevel,
    /// Opaque user flags stored next to the document.
    pub flags: u32,
    pub request: RequestOptions,
}

impl StoreOptions {
    #[must_use]
    pub fn cas(mut self, cas: u64) -> Self {
        self.cas = Some(cas);
        self
    }

    #[must_use]
    pub fn expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }

    #[must_use]
    pub fn durability(mut self, level: DurabilityLevel) -> Self {
        self.durability = level;
        self
    }

    #[must_use]
    pub fn flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request.timeout = Some(timeout);
        self
    }
}

/// Options for touch and get-and-touch.
#[derive(Debug, Clone, Default)]
pub struct TouchOptions {
    pub durability: DurabilityLevel,
    pub request: RequestOptions,
}

impl TouchOptions {
    #[must_use]
    pub fn durability(mut self, level: DurabilityLevel) -> Self {
        self.durability = level;
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.request.timeout = Some(timeout);
        self
    }
}

/// Options for increment and decrement.
#[derive(Debug, Clone)]
pub struct CounterOptions {
    pub delta: u64,
    /// Value to create the counter with when it does not exist. With `None`
    /// a missing counter is a `NotFound` failure.
    pub initial: Option<u64>,
    pub expiry: Option<Duration>,
    pub durability: DurabilityLevel,
    pub request: RequestOptions,
}

impl Default for CounterOptions {
    fn default() -> Self {
        Self {
            delta: 1,
            initial: None,
            expiry: None,
            durability: DurabilityLevel::None,
            request: RequestOptions::default(),
        }
    }
}

impl CounterOptions {
    #[must_use]
    pub fn delta(mut self, delta: u64) -> Self {
        self.delta = delta;
        self
    }

    #[must_use]
    pub fn initial(mut self, initial: u64) -> Self {
        self.initial = Some(initial);
        self
    }

    #[must_use]
    pub fn expiry(mut self, expiry: Duration) -> Self {
        self.expiry = Some(expiry);
        self
    }
}

/// Encodes an expiry as the server expects it: whole seconds when within
/// [`RELATIVE_EXPIRY_LIMIT`], otherwise an absolute unix timestamp.
#[must_use]
pub fn encode_expiry(expiry: Duration) -> u32 {
    if expiry <= RELATIVE_EXPIRY_LIMIT {
        #[allow(clippy::cast_possible_truncation)]
        return expiry.as_secs() as u32;
    }
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    u32::try_from((now + expiry).as_secs()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn relative_expiry_keeps_whole_seconds(secs in 0u64..=RELATIVE_EXPIRY_LIMIT.as_secs(), millis in 0u64..1000) {
            let expiry = Duration::from_secs(secs) + Duration::from_millis(millis);
            if expiry <= RELATIVE_EXPIRY_LIMIT {
                prop_assert_eq!(u64::from(encode_expiry(expiry)), secs);
            }
        }
    }

    #[test]
    fn short_expiry_is_relative_seconds() {
        assert_eq!(encode_expiry(Duration::from_secs(10)), 10);
        assert_eq!(encode_expiry(Duration::from_millis(1500)), 1);
        assert_eq!(
            encode_expiry(RELATIVE_EXPIRY_LIMIT),
            30 * 24 * 60 * 60
        );
    }

    #[test]
    fn long_expiry_is_absolute() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let encoded = u64::from(encode_expiry(RELATIVE_EXPIRY_LIMIT + Duration::from_secs(60)));
        let expected = now + RELATIVE_EXPIRY_LIMIT.as_secs() + 60;
        assert!(encoded >= expected && encoded <= expected + 5);
    }

    #[test]
    fn counter_defaults_to_delta_one_without_create() {
        let options = CounterOptions::default();
        assert_eq!(options.delta, 1);
        assert!(options.initial.is_none());
        assert_eq!(options.durability, DurabilityLevel::None);
    }

    #[test]
    fn builders_set_fields() {
        let options = StoreOptions::default()
            .cas(3)
            .flags(0x0200_0006)
            .durability(DurabilityLevel::Majority)
            .timeout(Duration::from_millis(100));
        assert_eq!(options.cas, Some(3));
        assert_eq!(options.flags, 0x0200_0006);
        assert_eq!(options.durability, DurabilityLevel::Majority);
        assert_eq!(options.request.timeout, Some(Duration::from_millis(100)));
    }
}
