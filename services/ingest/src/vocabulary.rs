//! Closed vocabularies for provinces and grades.
//!
//! Every function here is pure and total: unknown inputs either pass through
//! (provinces) or map to `None` (grades), they never fail.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed anchor used to scatter simulated coordinates inside a province.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProvinceAnchor {
    pub lat: f64,
    pub lon: f64,
    pub delta_lat: f64,
    pub delta_lon: f64,
}

/// The three provinces covered by the offer datasets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Province {
    Alacant,
    Valencia,
    Castello,
}

impl Province {
    pub const ALL: [Province; 3] = [Province::Alacant, Province::Valencia, Province::Castello];

    pub fn label(self) -> &'static str {
        match self {
            Province::Alacant => "ALACANT",
            Province::Valencia => "VALÈNCIA",
            Province::Castello => "CASTELLÓ",
        }
    }

    /// Exact match against a canonical label.
    pub fn from_label(label: &str) -> Option<Province> {
        Self::ALL.into_iter().find(|p| p.label() == label)
    }

    /// Canonicalize free text and keep it only if it names a known province.
    pub fn canonical(raw: &str) -> Option<Province> {
        Self::from_label(&canonicalize_province(raw))
    }

    pub fn anchor(self) -> ProvinceAnchor {
        match self {
            Province::Alacant => ProvinceAnchor {
                lat: 38.3452,
                lon: -0.4810,
                delta_lat: 0.15,
                delta_lon: 0.2,
            },
            Province::Valencia => ProvinceAnchor {
                lat: 39.4699,
                lon: -0.3763,
                delta_lat: 0.15,
                delta_lon: 0.15,
            },
            Province::Castello => ProvinceAnchor {
                lat: 39.9871,
                lon: -0.0381,
                delta_lat: 0.15,
                delta_lon: 0.2,
            },
        }
    }
}

impl fmt::Display for Province {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Spellings seen in the offer exports and the center catalog, upper-cased.
const PROVINCE_ALIASES: &[(&str, Province)] = &[
    ("ALACANT", Province::Alacant),
    ("ALICANTE", Province::Alacant),
    ("ALACANT.", Province::Alacant),
    ("ALICANTE.", Province::Alacant),
    ("ALACANT/ALICANTE", Province::Alacant),
    ("ALICANTE/ALACANT", Province::Alacant),
    ("ALACANT - ALICANTE", Province::Alacant),
    ("VALÈNCIA", Province::Valencia),
    ("VALENCIA", Province::Valencia),
    ("VALÈNCIA.", Province::Valencia),
    ("VALENCIA.", Province::Valencia),
    ("VALÈNCIA/VALENCIA", Province::Valencia),
    ("VALENCIA/VALÈNCIA", Province::Valencia),
    ("VALÈNCIA - VALENCIA", Province::Valencia),
    ("CASTELLÓ", Province::Castello),
    ("CASTELLO", Province::Castello),
    ("CASTELLÓN", Province::Castello),
    ("CASTELLON", Province::Castello),
    ("CASTELLÓ.", Province::Castello),
    ("CASTELLÓN.", Province::Castello),
    ("CASTELLÓ/CASTELLÓN", Province::Castello),
    ("CASTELLO/CASTELLON", Province::Castello),
    ("CASTELLÓ - CASTELLÓN", Province::Castello),
    ("CASTELLO - CASTELLON", Province::Castello),
    ("CASTELLÓ DE LA PLANA", Province::Castello),
    ("CASTELLO DE LA PLANA", Province::Castello),
    ("CASTELLÓN DE LA PLANA", Province::Castello),
    ("CASTELLON DE LA PLANA", Province::Castello),
    ("CASTELLÓ/CASTELLÓN DE LA PLANA", Province::Castello),
    ("CASTELLO/CASTELLON DE LA PLANA", Province::Castello),
];

/// Map a free-text province to its canonical label.
///
/// Unrecognized values come back upper-cased and trimmed rather than
/// rejected, so callers can still display them.
pub fn canonicalize_province(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();

    if let Some((_, province)) = PROVINCE_ALIASES.iter().find(|(alias, _)| *alias == upper) {
        return province.label().to_string();
    }

    if upper.contains("ALACANT") || upper.contains("ALICANT") {
        Province::Alacant.label().to_string()
    } else if upper.contains("VALÈNCIA") || upper.contains("VALENCIA") {
        Province::Valencia.label().to_string()
    } else if upper.contains("CASTELL") {
        Province::Castello.label().to_string()
    } else {
        upper
    }
}

/// Canonical training level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "BÁSICO")]
    Basico,
    #[serde(rename = "BÁSICO 2A OPORTUNIDAD")]
    BasicoSegunda,
    #[serde(rename = "MEDIO")]
    Medio,
    #[serde(rename = "SUPERIOR")]
    Superior,
}

impl Grade {
    pub const ALL: [Grade; 4] = [Grade::Basico, Grade::BasicoSegunda, Grade::Medio, Grade::Superior];

    pub fn label(self) -> &'static str {
        match self {
            Grade::Basico => "BÁSICO",
            Grade::BasicoSegunda => "BÁSICO 2A OPORTUNIDAD",
            Grade::Medio => "MEDIO",
            Grade::Superior => "SUPERIOR",
        }
    }

    pub fn from_label(label: &str) -> Option<Grade> {
        let upper = label.trim().to_uppercase();
        Self::ALL.into_iter().find(|g| g.label() == upper)
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Grade of a standard-offer row, `None` when it fits no canonical level.
pub fn canonicalize_grade_standard(raw: Option<&str>) -> Option<Grade> {
    let upper = raw?.trim().to_uppercase();

    // Both ordinal spellings show up in the exports
    if upper.contains("BÁSICO 2A OPORT") || upper.contains("BÁSICO 2ª OPORT") {
        Some(Grade::BasicoSegunda)
    } else if upper.contains("BÁSICO") {
        Some(Grade::Basico)
    } else if upper.contains("MEDIO") {
        Some(Grade::Medio)
    } else if upper.contains("SUPERIOR") {
        Some(Grade::Superior)
    } else {
        None
    }
}

/// Grade of a specialization-course row: only MEDIO or SUPERIOR.
pub fn canonicalize_grade_specialization(raw: Option<&str>) -> Option<Grade> {
    let upper = raw?.trim().to_uppercase();

    if upper.contains("SUPERIOR") {
        Some(Grade::Superior)
    } else if upper.contains("MEDIO") {
        Some(Grade::Medio)
    } else {
        None
    }
}

/// Row predicate for specialization datasets.
pub fn is_classifiable(raw: Option<&str>) -> bool {
    canonicalize_grade_specialization(raw).is_some()
}

/// Trim and upper-case a text cell; a stringified missing value becomes empty.
pub fn clean_field(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    if upper == "NAN" {
        String::new()
    } else {
        upper
    }
}
