//! Business time. Every timestamp the service stores or compares is
//! expressed in the fixed +05:30 offset.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use mockable::Clock;
use std::sync::Arc;

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

pub type SharedClock = Arc<dyn Clock + Send + Sync>;

pub fn ist_offset() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Current time in the business offset.
pub fn business_now(clock: &dyn Clock) -> DateTime<FixedOffset> {
    clock.utc().with_timezone(&ist_offset())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn local(&self) -> DateTime<chrono::Local> {
            self.0.with_timezone(&chrono::Local)
        }

        fn utc(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn business_now_carries_the_ist_offset() {
        let clock = FixedClock(Utc.with_ymd_and_hms(2025, 3, 1, 4, 30, 0).unwrap());
        let now = business_now(&clock);
        assert_eq!(now.offset().local_minus_utc(), IST_OFFSET_SECS);
        assert_eq!(now.to_rfc3339(), "2025-03-01T10:00:00+05:30");
    }
}
