//! Age Bucketizer
//!
//! Five half-open ordinal bands with inclusive lower bounds. Ages of 100
//! and above fall in the top band; negative ages have no band.

use serde::ser::{Serialize, SerializeMap, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgeBand {
    Under25,
    From25To34,
    From35To44,
    From45To54,
    From55,
}

impl AgeBand {
    pub const ORDERED: [AgeBand; 5] = [
        AgeBand::Under25,
        AgeBand::From25To34,
        AgeBand::From35To44,
        AgeBand::From45To54,
        AgeBand::From55,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AgeBand::Under25 => "<25",
            AgeBand::From25To34 => "25-34",
            AgeBand::From35To44 => "35-44",
            AgeBand::From45To54 => "45-54",
            AgeBand::From55 => "55+",
        }
    }

    /// Band for `age`, or `None` for negative or non-finite ages.
    pub fn of(age: f64) -> Option<AgeBand> {
        if !age.is_finite() || age < 0.0 {
            return None;
        }
        Some(if age < 25.0 {
            AgeBand::Under25
        } else if age < 35.0 {
            AgeBand::From25To34
        } else if age < 45.0 {
            AgeBand::From35To44
        } else if age < 55.0 {
            AgeBand::From45To54
        } else {
            AgeBand::From55
        })
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Counts per age band. Serializes as a `label -> count` object in band
/// order, leaving out empty bands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgeHistogram {
    counts: [usize; 5],
}

impl AgeHistogram {
    pub fn from_ages(ages: impl IntoIterator<Item = Option<f64>>) -> Self {
        let mut hist = AgeHistogram::default();
        for band in ages.into_iter().flatten().filter_map(AgeBand::of) {
            hist.counts[band.index()] += 1;
        }
        hist
    }

    pub fn count(&self, band: AgeBand) -> usize {
        self.counts[band.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Non-empty bands in ordinal order.
    pub fn iter(&self) -> impl Iterator<Item = (AgeBand, usize)> + '_ {
        AgeBand::ORDERED
            .into_iter()
            .map(|band| (band, self.count(band)))
            .filter(|(_, n)| *n > 0)
    }
}

impl Serialize for AgeHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (band, n) in self.iter() {
            map.serialize_entry(band.label(), &n)?;
        }
        map.end()
    }
}
