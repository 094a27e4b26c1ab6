use serde::{Deserialize, Serialize};

use crate::vocabulary::Grade;

/// A point in degrees. `(0.0, 0.0)` means "no coordinate available".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub const UNKNOWN: Coordinates = Coordinates {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_known(&self) -> bool {
        !(self.latitude == 0.0 && self.longitude == 0.0)
    }
}

/// One enriched course-offering row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOffer {
    pub province: String,
    pub locality: String,
    pub center: String,
    pub regime: String,
    pub grade: Grade,
    pub family: String,
    pub cycle: String,
    pub shift: String,
    pub unit_count: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub comarca: String,
}

impl TrainingOffer {
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetKind {
    /// Básico, Medio and Superior cycles
    Standard,
    /// Specialization courses, Medio or Superior only
    Specialization,
}

impl DatasetKind {
    pub fn label(self) -> &'static str {
        match self {
            DatasetKind::Standard => "standard",
            DatasetKind::Specialization => "specialization",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub kind: DatasetKind,
    pub offers: Vec<TrainingOffer>,
}

impl Dataset {
    /// Enriched schema, in export order.
    pub const COLUMNS: [&'static str; 12] = [
        "province",
        "locality",
        "center",
        "regime",
        "grade",
        "family",
        "cycle",
        "shift",
        "unit_count",
        "latitude",
        "longitude",
        "comarca",
    ];

    pub fn empty(kind: DatasetKind) -> Self {
        Self {
            kind,
            offers: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}

/// Both datasets produced at start-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Datasets {
    pub standard: Dataset,
    pub specialization: Dataset,
}

impl Datasets {
    pub fn get(&self, kind: DatasetKind) -> &Dataset {
        match kind {
            DatasetKind::Standard => &self.standard,
            DatasetKind::Specialization => &self.specialization,
        }
    }
}
