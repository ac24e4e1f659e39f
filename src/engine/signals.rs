//! Instrument catalog and the activity formulas that drive each index.

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::{Decimal, InstrumentName};

/// Base level every activity formula is scaled to.
pub const BASE_VALUE: i64 = 1000;

/// Bound of the per-refresh log-return of the random-walk index.
pub const MAX_SHOCK: f64 = 0.01;

const MS_PER_MINUTE: i64 = 60 * 1000;

/// The listed instruments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instrument {
    /// Voice-channel occupancy.
    Furall,
    /// Message cadence.
    Furat,
    /// Random walk.
    Furom,
    /// Ledger velocity.
    Furey,
}

impl Instrument {
    pub const ALL: [Instrument; 4] = [
        Instrument::Furall,
        Instrument::Furat,
        Instrument::Furom,
        Instrument::Furey,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Instrument::Furall => "FURALL",
            Instrument::Furat => "FURAT",
            Instrument::Furom => "FUROM",
            Instrument::Furey => "FUREY",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Instrument::Furall => {
                "Tracks how many people are in voice channels. (1000 * sqrt(members + 1))"
            }
            Instrument::Furat => {
                "Tracks how fast messages flow on the server. (1000 / ln(gap in minutes + 2))"
            }
            Instrument::Furom => {
                "Tracks random events. (value * exp(random[-0.01, 0.01]), starts at 1000)"
            }
            Instrument::Furey => {
                "Tracks how often money changes hands. (1000 / ln(gap in minutes + 2))"
            }
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.name() == name)
    }

    pub fn instrument_name(&self) -> InstrumentName {
        InstrumentName::new(self.name())
    }
}

/// Community activity observed at refresh time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySnapshot {
    /// Members currently connected to any voice channel.
    pub voice_members: u32,
    /// When the most recent chat message was sent.
    pub last_message_at: Option<DateTime<Utc>>,
}

/// `1000 * sqrt(members + 1)`.
pub fn occupancy_observation(voice_members: u32) -> Decimal {
    let members = Decimal::from_i64(i64::from(voice_members) + 1);
    let root = members.sqrt().unwrap_or_else(Decimal::zero);
    (Decimal::from_i64(BASE_VALUE) * root).round_price()
}

/// `1000 / ln(idle minutes + 2)`; negative idle time counts as zero.
pub fn cadence_observation(idle: TimeDelta) -> Decimal {
    let idle_ms = idle.num_milliseconds().max(0);
    let minutes = Decimal::from_i64(idle_ms) / Decimal::from_i64(MS_PER_MINUTE);
    let base = Decimal::from_i64(BASE_VALUE);

    // ln(x + 2) >= ln 2, so the division is always defined.
    (minutes + Decimal::from_i64(2))
        .checked_ln()
        .and_then(|ln| base.checked_div(ln))
        .unwrap_or(base)
        .round_price()
}

/// `current * exp(shock)`; `current` unchanged if the product overflows.
pub fn random_walk_observation(current: Decimal, shock: f64) -> Decimal {
    Decimal::from_f64(shock)
        .and_then(|s| s.checked_exp())
        .and_then(|factor| current.checked_mul(factor))
        .unwrap_or(current)
        .round_price()
}

/// Draw a log-return uniformly from `[-MAX_SHOCK, MAX_SHOCK]`.
pub fn draw_shock<R: Rng>(rng: &mut R) -> f64 {
    rng.random_range(-MAX_SHOCK..=MAX_SHOCK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_catalog_lookup() {
        assert_eq!(Instrument::from_name("FUROM"), Some(Instrument::Furom));
        assert_eq!(Instrument::from_name("furom"), None);
        assert_eq!(Instrument::Furey.instrument_name().as_str(), "FUREY");
    }

    #[test]
    fn test_occupancy_empty_channel_is_base() {
        assert_eq!(occupancy_observation(0), d("1000"));
        assert_eq!(occupancy_observation(3), d("2000"));
        assert_eq!(occupancy_observation(1), d("1414.2136"));
    }

    #[test]
    fn test_cadence_decreases_with_idle_time() {
        let busy = cadence_observation(TimeDelta::zero());
        let quiet = cadence_observation(TimeDelta::minutes(60));
        // 1000 / ln 2
        assert_eq!(busy, d("1442.6950"));
        assert!(quiet < busy);
        assert_eq!(cadence_observation(TimeDelta::minutes(-5)), busy);
    }

    #[test]
    fn test_random_walk_stays_within_shock_band() {
        let base = d("1000");
        assert_eq!(random_walk_observation(base, 0.0), base);

        let up = random_walk_observation(base, MAX_SHOCK);
        let down = random_walk_observation(base, -MAX_SHOCK);
        assert_eq!(up, d("1010.0502"));
        assert_eq!(down, d("990.0498"));
    }

    #[test]
    fn test_draw_shock_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let shock = draw_shock(&mut rng);
            assert!((-MAX_SHOCK..=MAX_SHOCK).contains(&shock));
        }
    }
}
