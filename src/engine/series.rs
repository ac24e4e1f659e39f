use chrono::{DateTime, DurationRound, TimeDelta, Utc};

use crate::domain::{Decimal, IndexSegment, IndexSeries, PRICE_DP};

const MS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Default volatility cap: 1% of the live value per elapsed hour.
pub const DEFAULT_MAX_HOURLY_CHANGE: &str = "0.01";

/// Result of applying one observation to a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Value recorded on the live segment after clamping.
    pub applied: Decimal,
    /// True if the observation was pulled back by the rate limit.
    pub clamped: bool,
    /// Number of segments closed by hourly segmentation.
    pub segments_closed: usize,
}

/// Applies rate-limited observations to an index series.
#[derive(Debug, Clone, Copy)]
pub struct SeriesUpdater {
    max_hourly_change: Decimal,
}

impl SeriesUpdater {
    pub fn new(max_hourly_change: Decimal) -> Self {
        Self { max_hourly_change }
    }

    /// Largest permitted move away from `current` after `elapsed`.
    ///
    /// Negative elapsed time (clock skew) permits no movement. `None` when the
    /// bound exceeds the decimal range, which leaves the move unbounded.
    pub fn max_change(&self, current: Decimal, elapsed: TimeDelta) -> Option<Decimal> {
        let elapsed_ms = elapsed.num_milliseconds().max(0);
        let hours = Decimal::from_i64(elapsed_ms) / Decimal::from_i64(MS_PER_HOUR);
        current
            .abs()
            .checked_mul(self.max_hourly_change)?
            .checked_mul(hours)
    }

    /// Clamp `observed` toward `current` so the move stays within the cap.
    ///
    /// The observation is rounded to price precision first. A clamped move is
    /// truncated toward `current`.
    pub fn clamp(
        &self,
        current: Decimal,
        observed: Decimal,
        elapsed: TimeDelta,
    ) -> (Decimal, bool) {
        let observed = observed.round_price();
        let delta = observed - current;

        match self.max_change(current, elapsed) {
            Some(max_change) if delta.abs() > max_change => {
                let step = max_change.truncate_dp(PRICE_DP);
                if delta.is_positive() {
                    (current + step, true)
                } else {
                    (current - step, true)
                }
            }
            _ => (observed, false),
        }
    }

    /// Apply one observation at `now`: clamp, segment, record.
    pub fn apply(
        &self,
        series: &mut IndexSeries,
        observed: Decimal,
        now: DateTime<Utc>,
    ) -> UpdateOutcome {
        let Some(current) = series.current_value() else {
            let initial = observed.round_price();
            series.segments.push(IndexSegment::initial(initial));
            series.last_updated_at = now;
            return UpdateOutcome {
                applied: initial,
                clamped: false,
                segments_closed: 0,
            };
        };

        let (applied, clamped) = self.clamp(current, observed, now - series.last_updated_at);
        let segments_closed = roll_segments(series, now);

        if let Some(live) = series.live_mut() {
            live.record(applied);
        }
        series.last_updated_at = now;

        UpdateOutcome {
            applied,
            clamped,
            segments_closed,
        }
    }
}

impl Default for SeriesUpdater {
    fn default() -> Self {
        let rate = Decimal::from_str_canonical(DEFAULT_MAX_HOURLY_CHANGE).unwrap_or_default();
        Self::new(rate)
    }
}

/// Start of the UTC wall-clock hour containing `at`.
pub fn hour_start(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(TimeDelta::hours(1)).unwrap_or(at)
}

/// Close the live segment at each hour boundary between its start and `now`.
///
/// The initial segment has no `started_at`; its start is the series'
/// `last_updated_at`, which cannot have left the initial hour without a cut.
/// Returns the number of segments closed.
pub fn roll_segments(series: &mut IndexSeries, now: DateTime<Utc>) -> usize {
    let Some(live) = series.live() else {
        return 0;
    };

    let mut start = live.started_at.unwrap_or(series.last_updated_at);
    let now_hour = hour_start(now);
    let mut closed = 0;

    while hour_start(start) < now_hour {
        let boundary = hour_start(start) + TimeDelta::hours(1);
        let Some(live) = series.live_mut() else {
            break;
        };
        live.ended_at = Some(boundary);
        let closing_value = live.value;

        series
            .segments
            .push(IndexSegment::opened_at(closing_value, boundary));
        start = boundary;
        closed += 1;
    }

    closed
}
