//! Pure computation engine(s) for deterministic pricing and ledger logic.

pub mod cost_basis;
pub mod series;
pub mod signals;
pub mod velocity;

pub use series::{hour_start, roll_segments, SeriesUpdater, UpdateOutcome};
pub use signals::{ActivitySnapshot, Instrument};
pub use velocity::VelocityTracker;
