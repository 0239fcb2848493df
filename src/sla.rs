//! SLA clock: how much of an item's response window is left.
//!
//! Pure functions of `(deadline, received_at, now)`. Nothing here stores
//! state; a live countdown is driven by [`crate::countdown`].

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::policy::{Cadence, SlaThresholds, TriagePolicy};

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// The interval between receipt and the mandated response deadline.
/// Always non-empty: `deadline > received_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowRecord")]
pub struct SlaWindow {
    received_at: DateTime<Utc>,
    #[serde(rename = "sla_deadline")]
    deadline: DateTime<Utc>,
}

#[derive(Deserialize)]
struct WindowRecord {
    received_at: DateTime<Utc>,
    sla_deadline: DateTime<Utc>,
}

impl TryFrom<WindowRecord> for SlaWindow {
    type Error = Error;

    fn try_from(raw: WindowRecord) -> Result<Self> {
        Self::new(raw.received_at, raw.sla_deadline)
    }
}

impl SlaWindow {
    pub fn new(received_at: DateTime<Utc>, deadline: DateTime<Utc>) -> Result<Self> {
        if deadline <= received_at {
            return Err(Error::InvalidTimeRange {
                received_at,
                deadline,
            });
        }
        Ok(Self {
            received_at,
            deadline,
        })
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Share of the window still ahead of `now`, clamped to `[0, 1]`.
    pub fn fraction_remaining(&self, now: DateTime<Utc>) -> f64 {
        let total = nanos(self.deadline - self.received_at);
        if total <= 0.0 {
            return 0.0;
        }
        (nanos(self.deadline - now) / total).clamp(0.0, 1.0)
    }

    /// The instant at which `fraction` of the window is left.
    fn point_with_remaining(&self, fraction: f64) -> DateTime<Utc> {
        let total = self.deadline - self.received_at;
        let before = match total.num_nanoseconds() {
            Some(ns) => TimeDelta::nanoseconds((ns as f64 * fraction) as i64),
            None => TimeDelta::milliseconds((total.num_milliseconds() as f64 * fraction) as i64),
        };
        self.deadline - before
    }
}

// Sub-millisecond windows are valid, so ratios work in nanoseconds.
fn nanos(delta: TimeDelta) -> f64 {
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64,
        None => delta.num_milliseconds() as f64 * 1e6,
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaBucket {
    Green,
    Yellow,
    Red,
    Breached,
}

impl SlaBucket {
    /// Buckets that need second-level countdown accuracy.
    pub fn is_live(self) -> bool {
        matches!(self, SlaBucket::Red | SlaBucket::Breached)
    }
}

impl std::fmt::Display for SlaBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SlaBucket::Green => "green",
            SlaBucket::Yellow => "yellow",
            SlaBucket::Red => "red",
            SlaBucket::Breached => "breached",
        };
        write!(f, "{s}")
    }
}

/// Display tuple for one item at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlaStatus {
    pub remaining_label: String,
    pub bucket: SlaBucket,
    pub is_breached: bool,
    pub fraction_remaining: f64,
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Evaluates SLA windows against a set of bucket thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlaClock {
    thresholds: SlaThresholds,
    cadence: Cadence,
}

impl SlaClock {
    pub fn new(thresholds: SlaThresholds, cadence: Cadence) -> Self {
        Self {
            thresholds,
            cadence,
        }
    }

    pub fn from_policy(policy: &TriagePolicy) -> Self {
        Self::new(policy.sla, policy.cadence)
    }

    /// Evaluate raw timestamps. Fails with [`Error::InvalidTimeRange`] when
    /// the deadline is not after receipt.
    pub fn evaluate(
        &self,
        deadline: DateTime<Utc>,
        received_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<SlaStatus> {
        let window = SlaWindow::new(received_at, deadline)?;
        Ok(self.evaluate_window(&window, now))
    }

    pub fn evaluate_window(&self, window: &SlaWindow, now: DateTime<Utc>) -> SlaStatus {
        let fraction_remaining = window.fraction_remaining(now);
        let is_breached = now >= window.deadline();
        let bucket = if is_breached {
            SlaBucket::Breached
        } else if fraction_remaining <= self.thresholds.red {
            SlaBucket::Red
        } else if fraction_remaining <= self.thresholds.yellow {
            SlaBucket::Yellow
        } else {
            SlaBucket::Green
        };

        SlaStatus {
            remaining_label: format_time_remaining(window.deadline() - now),
            bucket,
            is_breached,
            fraction_remaining,
        }
    }

    /// How long a live display may wait before recomputing.
    pub fn refresh_interval(&self, bucket: SlaBucket) -> Duration {
        if bucket.is_live() {
            self.cadence.live()
        } else {
            self.cadence.idle()
        }
    }

    /// Time until the window next changes bucket, if it still will.
    pub fn until_next_bucket(&self, window: &SlaWindow, now: DateTime<Utc>) -> Option<Duration> {
        [
            window.point_with_remaining(self.thresholds.yellow),
            window.point_with_remaining(self.thresholds.red),
            window.deadline(),
        ]
        .into_iter()
        .filter(|at| *at > now)
        .min()
        .and_then(|at| (at - now).to_std().ok())
    }

    /// Delay before the next recomputation: the bucket's cadence, cut short
    /// if a bucket boundary comes first.
    pub fn next_refresh(&self, window: &SlaWindow, now: DateTime<Utc>) -> Duration {
        let status = self.evaluate_window(window, now);
        let cadence = self.refresh_interval(status.bucket);
        match self.until_next_bucket(window, now) {
            Some(boundary) if boundary < cadence => boundary,
            _ => cadence,
        }
    }
}

/// Evaluate with the default thresholds.
pub fn evaluate(
    deadline: DateTime<Utc>,
    received_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<SlaStatus> {
    SlaClock::default().evaluate(deadline, received_at, now)
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

/// Render time left until (positive) or past (negative) a deadline.
///
/// Uses the largest unit the value reaches, truncated. From one hour up the
/// next-smaller unit is appended ("2h 15m", "3d 4h"). Negative durations get
/// an "overdue" suffix; positive ones are left bare.
pub fn format_time_remaining(remaining: TimeDelta) -> String {
    let overdue = remaining < TimeDelta::zero();
    let secs = remaining.num_seconds().abs();

    let label = if secs >= DAY {
        format!("{}d {}h", secs / DAY, (secs % DAY) / HOUR)
    } else if secs >= HOUR {
        format!("{}h {}m", secs / HOUR, (secs % HOUR) / MINUTE)
    } else if secs >= MINUTE {
        format!("{}m", secs / MINUTE)
    } else {
        format!("{secs}s")
    };

    if overdue {
        format!("{label} overdue")
    } else {
        label
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_under_a_minute() {
        assert_eq!(format_time_remaining(TimeDelta::seconds(59)), "59s");
        assert_eq!(format_time_remaining(TimeDelta::zero()), "0s");
    }

    #[test]
    fn minutes_truncate() {
        assert_eq!(format_time_remaining(TimeDelta::seconds(119)), "1m");
        assert_eq!(format_time_remaining(TimeDelta::minutes(10)), "10m");
    }

    #[test]
    fn overdue_uses_largest_unit() {
        assert_eq!(format_time_remaining(TimeDelta::seconds(-125)), "2m overdue");
        assert_eq!(format_time_remaining(TimeDelta::seconds(-5)), "5s overdue");
    }

    #[test]
    fn hours_show_minutes() {
        let d = TimeDelta::hours(2) + TimeDelta::minutes(15) + TimeDelta::seconds(40);
        assert_eq!(format_time_remaining(d), "2h 15m");
        assert_eq!(format_time_remaining(TimeDelta::hours(1)), "1h 0m");
    }

    #[test]
    fn days_show_hours() {
        let d = TimeDelta::days(3) + TimeDelta::hours(4);
        assert_eq!(format_time_remaining(d), "3d 4h");
        assert_eq!(format_time_remaining(-d), "3d 4h overdue");
    }

    #[test]
    fn sub_second_overdue_keeps_suffix() {
        assert_eq!(
            format_time_remaining(TimeDelta::milliseconds(-400)),
            "0s overdue"
        );
    }

    #[test]
    fn next_refresh_stops_at_bucket_boundary() {
        let t0 = DateTime::parse_from_rfc3339("2026-03-02T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let window = SlaWindow::new(t0, t0 + TimeDelta::minutes(60)).unwrap();
        let clock = SlaClock::default();

        // Yellow starts at T+30m; 20s before it the idle cadence is cut short.
        let now = t0 + TimeDelta::minutes(30) - TimeDelta::seconds(20);
        assert_eq!(clock.next_refresh(&window, now), Duration::from_secs(20));

        // Far from any boundary: idle cadence.
        assert_eq!(clock.next_refresh(&window, t0), Duration::from_secs(60));

        // Past the deadline there are no more boundaries.
        let late = t0 + TimeDelta::minutes(90);
        assert_eq!(clock.until_next_bucket(&window, late), None);
        assert_eq!(clock.next_refresh(&window, late), Duration::from_secs(1));
    }

    #[test]
    fn refresh_interval_follows_bucket() {
        let clock = SlaClock::default();
        assert_eq!(clock.refresh_interval(SlaBucket::Red), Duration::from_secs(1));
        assert_eq!(
            clock.refresh_interval(SlaBucket::Breached),
            Duration::from_secs(1)
        );
        assert_eq!(
            clock.refresh_interval(SlaBucket::Green),
            Duration::from_secs(60)
        );
        assert_eq!(
            clock.refresh_interval(SlaBucket::Yellow),
            Duration::from_secs(60)
        );
    }
}
