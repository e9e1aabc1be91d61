//! Attendance session math.
//!
//! A session opens at sign-in and closes at sign-out. Closing computes the
//! elapsed duration twice: whole minutes (floor) and hours rounded to two
//! decimals. Member sign-outs shorter than one minute are discarded.

use chrono::{DateTime, Duration, Utc};

/// Sessions shorter than this many milliseconds are dropped on sign-out.
pub const MIN_SESSION_MS: i64 = MS_PER_MINUTE;

const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_HOUR: f64 = 3_600_000.0;

/// Outcome of closing an open attendance session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionClose {
    /// Too short to keep; the row should be deleted
    Discard,
    /// Store these durations and the sign-out timestamp
    Complete { minutes: i64, hours: f64 },
}

/// Close a session opened at `signin_at` on a member's own sign-out.
///
/// Clock skew can make `now` earlier than `signin_at`; such sessions count as
/// shorter than the minimum and are discarded.
pub fn close_session(signin_at: DateTime<Utc>, now: DateTime<Utc>) -> SessionClose {
    let elapsed = now - signin_at;
    if elapsed.num_milliseconds() < MIN_SESSION_MS {
        return SessionClose::Discard;
    }
    complete(elapsed)
}

/// Close a session on behalf of a manager. Never discards; negative elapsed
/// time is clamped to zero.
pub fn force_close(signin_at: DateTime<Utc>, now: DateTime<Utc>) -> SessionClose {
    let elapsed = (now - signin_at).max(Duration::zero());
    complete(elapsed)
}

fn complete(elapsed: Duration) -> SessionClose {
    let ms = elapsed.num_milliseconds();
    SessionClose::Complete {
        minutes: ms / MS_PER_MINUTE,
        hours: round_hours(ms as f64 / MS_PER_HOUR),
    }
}

/// Round to two decimal places, half away from zero.
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn short_session_is_discarded() {
        assert_eq!(close_session(at(0), at(59)), SessionClose::Discard);
        assert_eq!(close_session(at(0), at(0)), SessionClose::Discard);
    }

    #[test]
    fn negative_elapsed_is_discarded() {
        assert_eq!(close_session(at(100), at(0)), SessionClose::Discard);
    }

    #[test]
    fn exactly_one_minute_is_kept() {
        assert_eq!(
            close_session(at(0), at(60)),
            SessionClose::Complete {
                minutes: 1,
                hours: 0.02
            }
        );
    }

    #[test]
    fn ninety_minutes() {
        assert_eq!(
            close_session(at(0), at(90 * 60 + 30)),
            SessionClose::Complete {
                minutes: 90,
                hours: 1.51
            }
        );
    }

    #[test]
    fn force_close_keeps_short_sessions() {
        assert_eq!(
            force_close(at(0), at(10)),
            SessionClose::Complete {
                minutes: 0,
                hours: 0.0
            }
        );
        assert_eq!(
            force_close(at(50), at(0)),
            SessionClose::Complete {
                minutes: 0,
                hours: 0.0
            }
        );
    }

    #[test]
    fn rounding() {
        assert_eq!(round_hours(1.234), 1.23);
        assert_eq!(round_hours(1.235_000_1), 1.24);
        assert_eq!(round_hours(2.0), 2.0);
    }
}
