//! Coordinates for training centers.
//!
//! Real coordinates come from the center catalog when it has the center.
//! Most centers are missing there, so the fallback scatters them inside
//! their province from an MD5 of the center's identity: the same center
//! always lands on the same point, and centers of one locality cluster
//! around a shared locality-level offset.

use std::collections::HashMap;
use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::model::Coordinates;
use crate::reference::{field, ReferenceSheet, Role};
use crate::vocabulary::{canonicalize_province, Province};

const CENTER_ROLE: Role = ("center", &["dlibre", "centro", "nombre_centro"]);
const LOCALITY_ROLE: Role = ("locality", &["noms_mun", "localidad", "localidad_oficial", "municipio"]);
const PROVINCE_ROLE: Role = ("province", &["provincia"]);
const LATITUDE_ROLE: Role = ("latitude", &["latitud", "lat", "latitude"]);
const LONGITUDE_ROLE: Role = ("longitude", &["longitud", "lon", "lng", "longitude"]);

/// Locality clustering scale used by the current loader.
pub const LOCALITY_SCALE: f64 = 0.2;
/// Wider clustering scale used by an earlier loader variant.
pub const LOCALITY_SCALE_WIDE: f64 = 0.3;

/// Spread of the center-level offset, in province deltas.
const CENTER_SPREAD: f64 = 1.5;

/// Cache key for a center: `PROVINCE_LOCALITY_CENTER`.
pub fn composite_key(province: &str, locality: &str, center: &str) -> String {
    format!("{}_{}_{}", province, locality, center)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSource {
    /// Read from the center catalog
    Reference,
    /// Derived from the key hash
    Simulated,
}

/// Real coordinates keyed like [`composite_key`].
#[derive(Debug, Clone, Default)]
pub struct ReferenceCoordinates {
    points: HashMap<String, Coordinates>,
}

impl ReferenceCoordinates {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let sheet = ReferenceSheet::read(path)?;
        Self::from_sheet(&sheet, &path.display().to_string())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let sheet = ReferenceSheet::from_bytes(bytes)?;
        Self::from_sheet(&sheet, "<memory>")
    }

    fn from_sheet(sheet: &ReferenceSheet, file: &str) -> Result<Self> {
        let cols = sheet.resolve_roles(
            file,
            &[CENTER_ROLE, LOCALITY_ROLE, PROVINCE_ROLE, LATITUDE_ROLE, LONGITUDE_ROLE],
        )?;

        let mut points = HashMap::new();
        let mut dropped = 0usize;
        for record in &sheet.records {
            let (Some(lat), Some(lon)) = (
                parse_degrees(field(record, cols[3])),
                parse_degrees(field(record, cols[4])),
            ) else {
                dropped += 1;
                continue;
            };

            let key = composite_key(
                &canonicalize_province(field(record, cols[2])),
                &field(record, cols[1]).to_uppercase(),
                &field(record, cols[0]).to_uppercase(),
            );
            points.entry(key).or_insert(Coordinates::new(lat, lon));
        }

        if dropped > 0 {
            warn!(file, dropped, "catalog rows without numeric coordinates dropped");
        }
        Ok(Self { points })
    }

    pub fn get(&self, key: &str) -> Option<Coordinates> {
        self.points.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn parse_degrees(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignerSettings {
    /// Scale of the shared per-locality offset, in province deltas
    pub locality_scale: f64,
}

impl Default for AssignerSettings {
    fn default() -> Self {
        Self {
            locality_scale: LOCALITY_SCALE,
        }
    }
}

/// Memoizing coordinate lookup: catalog first, hash simulation second.
#[derive(Debug, Clone, Default)]
pub struct CoordinateAssigner {
    settings: AssignerSettings,
    cache: HashMap<String, (Coordinates, CoordinateSource)>,
    reference_len: usize,
}

impl CoordinateAssigner {
    pub fn new(settings: AssignerSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Seed the cache with catalog coordinates.
    pub fn with_reference(mut self, reference: ReferenceCoordinates) -> Self {
        for (key, coords) in reference.points {
            if let std::collections::hash_map::Entry::Vacant(slot) = self.cache.entry(key) {
                slot.insert((coords, CoordinateSource::Reference));
                self.reference_len += 1;
            }
        }
        self
    }

    /// Seed from a catalog file; a missing or malformed catalog only logs.
    pub fn load_reference(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!(file = %path.display(), "center catalog not found, simulating all coordinates");
            return self;
        }

        match ReferenceCoordinates::load(path) {
            Ok(reference) => {
                info!(file = %path.display(), centers = reference.len(), "loaded center coordinates");
                self.with_reference(reference)
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "cannot load center coordinates, simulating all");
                self
            }
        }
    }

    pub fn settings(&self) -> AssignerSettings {
        self.settings
    }

    pub fn resolve(&mut self, province: &str, locality: &str, center: &str) -> Coordinates {
        let key = composite_key(province, locality, center);
        if let Some((coords, _)) = self.cache.get(&key) {
            return *coords;
        }

        let Some(known) = Province::from_label(province) else {
            return Coordinates::UNKNOWN;
        };

        let coords = simulate(known, locality, &key, self.settings.locality_scale);
        self.cache.insert(key, (coords, CoordinateSource::Simulated));
        coords
    }

    pub fn source_of(&self, key: &str) -> Option<CoordinateSource> {
        self.cache.get(key).map(|(_, source)| *source)
    }

    pub fn reference_len(&self) -> usize {
        self.reference_len
    }

    pub fn simulated_len(&self) -> usize {
        self.cache.len() - self.reference_len
    }
}

/// Hash-derived point for `key` inside `province`.
pub fn simulate(province: Province, locality: &str, key: &str, locality_scale: f64) -> Coordinates {
    let anchor = province.anchor();

    let (norm_lat, norm_lon) = hash_unit_pair(key);
    let mut lat = anchor.lat + (norm_lat - 0.5) * anchor.delta_lat * CENTER_SPREAD;
    let mut lon = anchor.lon + (norm_lon - 0.5) * anchor.delta_lon * CENTER_SPREAD;

    // One value drives both axes, so a locality's centers shift together
    let (norm_locality, _) = hash_unit_pair(&format!("{}_{}", province.label(), locality));
    lat += (norm_locality - 0.5) * anchor.delta_lat * locality_scale;
    lon += (norm_locality - 0.5) * anchor.delta_lon * locality_scale;

    Coordinates::new(lat, lon)
}

/// The first two big-endian u32 words of the MD5 digest, scaled to [0, 1].
fn hash_unit_pair(input: &str) -> (f64, f64) {
    let digest = md5::compute(input.as_bytes()).0;
    let first = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    let second = u32::from_be_bytes([digest[4], digest[5], digest[6], digest[7]]);
    let max = u32::MAX as f64;
    (first as f64 / max, second as f64 / max)
}
