//! Index series and hourly segments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Decimal, InstrumentName};

/// Price evolution of an instrument within one hourly bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSegment {
    pub value: Decimal,
    pub min: Decimal,
    pub max: Decimal,
    /// Closing value of the predecessor segment (or the first observation).
    pub open_value: Decimal,
    /// `None` only for the very first segment of a series.
    pub started_at: Option<DateTime<Utc>>,
    /// Set exactly when the segment is closed.
    pub ended_at: Option<DateTime<Utc>>,
}

impl IndexSegment {
    /// The first segment of a new series.
    pub fn initial(value: Decimal) -> Self {
        Self {
            value,
            min: value,
            max: value,
            open_value: value,
            started_at: None,
            ended_at: None,
        }
    }

    /// A successor segment opened at `at` with the predecessor's closing value.
    pub fn opened_at(open_value: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            value: open_value,
            min: open_value,
            max: open_value,
            open_value,
            started_at: Some(at),
            ended_at: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Set the live value, extending the observed extremes.
    pub fn record(&mut self, value: Decimal) {
        self.value = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }
}

/// Full price history of one instrument. The last segment is the live one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSeries {
    pub name: InstrumentName,
    pub last_updated_at: DateTime<Utc>,
    pub segments: Vec<IndexSegment>,
}

impl IndexSeries {
    /// Create a series from its first observation.
    pub fn new(name: InstrumentName, initial: Decimal, at: DateTime<Utc>) -> Self {
        Self {
            name,
            last_updated_at: at,
            segments: vec![IndexSegment::initial(initial)],
        }
    }

    pub fn live(&self) -> Option<&IndexSegment> {
        self.segments.last()
    }

    pub fn live_mut(&mut self) -> Option<&mut IndexSegment> {
        self.segments.last_mut()
    }

    /// Current tradable price, if any segment exists.
    pub fn current_value(&self) -> Option<Decimal> {
        self.live().map(|segment| segment.value)
    }

    pub fn closed_segments(&self) -> usize {
        self.segments.iter().filter(|s| s.is_closed()).count()
    }
}
