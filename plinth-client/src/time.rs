use crate::api::Time;

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// Compact age of `then`, eg. `5m` or `3w`; timestamps in the future count as `0s`
pub fn time_ago(then: Time, now: Time) -> String {
    let secs = (now - then).num_seconds().max(0);
    match secs {
        s if s < MINUTE => format!("{s}s"),
        s if s < HOUR => format!("{}m", s / MINUTE),
        s if s < DAY => format!("{}h", s / HOUR),
        s if s < WEEK => format!("{}d", s / DAY),
        s if s < MONTH => format!("{}w", s / WEEK),
        s if s < YEAR => format!("{}mo", s / MONTH),
        s => format!("{}y", s / YEAR),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn buckets() {
        let now = Utc::now();
        let ago = |secs| time_ago(now - Duration::seconds(secs), now);
        assert_eq!(ago(0), "0s");
        assert_eq!(ago(59), "59s");
        assert_eq!(ago(60), "1m");
        assert_eq!(ago(HOUR - 1), "59m");
        assert_eq!(ago(5 * HOUR + 59), "5h");
        assert_eq!(ago(DAY), "1d");
        assert_eq!(ago(WEEK + DAY), "1w");
        assert_eq!(ago(29 * DAY), "4w");
        assert_eq!(ago(MONTH), "1mo");
        assert_eq!(ago(364 * DAY), "12mo");
        assert_eq!(ago(2 * YEAR + DAY), "2y");
    }

    #[test]
    fn future_is_now() {
        let now = Utc::now();
        assert_eq!(time_ago(now + Duration::minutes(3), now), "0s");
    }
}
