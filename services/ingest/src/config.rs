use std::path::PathBuf;

use crate::coords::LOCALITY_SCALE;

/// Where the offer exports and the center catalog live, and how to read them.
///
/// The library never reads the environment; binaries fill this in.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderSettings {
    pub standard_file: PathBuf,
    pub specialization_file: PathBuf,
    /// Center catalog with real coordinates
    pub coordinates_file: PathBuf,
    /// Locality → comarca list; usually the same catalog
    pub comarcas_file: PathBuf,
    pub standard_skip_rows: usize,
    pub specialization_skip_rows: usize,
    pub delimiter: u8,
    pub locality_scale: f64,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            standard_file: PathBuf::from("oferta_fp_25_26.csv"),
            specialization_file: PathBuf::from("oferta_fp_especialitzacio.csv"),
            coordinates_file: PathBuf::from("a.csv"),
            comarcas_file: PathBuf::from("a.csv"),
            standard_skip_rows: 4,
            specialization_skip_rows: 3,
            delimiter: b',',
            locality_scale: LOCALITY_SCALE,
        }
    }
}
