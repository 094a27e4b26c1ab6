//! Turns one offer export into an enriched dataset.
//!
//! Pipeline per file: normalize → clean text → canonical province and grade
//! → unit count → grade filter → coordinates → comarca. A file that cannot
//! be loaded yields an empty dataset instead of an error, so consumers can
//! show a "no data" state.

use std::path::{Path, PathBuf};

use tracing::{error, info};

use crate::comarca::ComarcaResolver;
use crate::config::LoaderSettings;
use crate::coords::{AssignerSettings, CoordinateAssigner};
use crate::error::Result;
use crate::model::{Dataset, DatasetKind, Datasets, TrainingOffer};
use crate::normalizer::{normalize_file, NormalizedTable, TableLayout};
use crate::vocabulary::{
    canonicalize_grade_specialization, canonicalize_grade_standard, canonicalize_province, clean_field,
};

/// An offer export and how to read it.
#[derive(Debug, Clone, PartialEq)]
pub struct OfferSource {
    pub path: PathBuf,
    pub kind: DatasetKind,
    pub skip_rows: usize,
    pub delimiter: u8,
}

impl OfferSource {
    /// Standard FP offer export (four title rows).
    pub fn standard(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: DatasetKind::Standard,
            skip_rows: 4,
            delimiter: b',',
        }
    }

    /// Specialization course export (three title rows).
    pub fn specialization(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: DatasetKind::Specialization,
            skip_rows: 3,
            delimiter: b',',
        }
    }

    pub fn skip_rows(mut self, rows: usize) -> Self {
        self.skip_rows = rows;
        self
    }

    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn layout(&self) -> TableLayout {
        TableLayout::offers(self.skip_rows).delimiter(self.delimiter)
    }
}

/// Coerce a unit count; anything non-numeric or negative counts as zero.
pub fn parse_units(raw: &str) -> u32 {
    let raw = raw.trim();
    if let Ok(n) = raw.parse::<i64>() {
        return n.clamp(0, u32::MAX as i64) as u32;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v.trunc().min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

/// Owns the lookup state shared by every file of one run.
pub struct OfferDatasetBuilder {
    comarcas: ComarcaResolver,
    coords: CoordinateAssigner,
}

impl OfferDatasetBuilder {
    pub fn new(comarcas: ComarcaResolver, coords: CoordinateAssigner) -> Self {
        Self { comarcas, coords }
    }

    /// Load both reference tables; a missing catalog only degrades lookups.
    pub fn from_settings(settings: &LoaderSettings) -> Self {
        let coords = CoordinateAssigner::new(AssignerSettings {
            locality_scale: settings.locality_scale,
        })
        .load_reference(&settings.coordinates_file);
        let comarcas = ComarcaResolver::load_or_default(&settings.comarcas_file);
        Self::new(comarcas, coords)
    }

    pub fn comarcas(&self) -> &ComarcaResolver {
        &self.comarcas
    }

    pub fn coordinates(&self) -> &CoordinateAssigner {
        &self.coords
    }

    /// Build a dataset, degrading to an empty one on any file-level error.
    pub fn build(&mut self, source: &OfferSource) -> Dataset {
        match self.try_build(source) {
            Ok(dataset) => dataset,
            Err(e) => {
                error!(
                    file = %source.path.display(),
                    kind = source.kind.label(),
                    error = %e,
                    "cannot load offers, continuing with an empty dataset"
                );
                Dataset::empty(source.kind)
            }
        }
    }

    pub fn try_build(&mut self, source: &OfferSource) -> Result<Dataset> {
        let table = normalize_file(&source.path, &source.layout())?;
        let offers = self.build_rows(source.kind, &table);

        info!(
            file = %source.path.display(),
            kind = source.kind.label(),
            read = table.len(),
            kept = offers.len(),
            skipped = table.warnings.len(),
            "loaded offers"
        );

        Ok(Dataset {
            kind: source.kind,
            offers,
        })
    }

    /// Enrich already-normalized rows laid out as the offer schema.
    pub fn build_rows(&mut self, kind: DatasetKind, table: &NormalizedTable) -> Vec<TrainingOffer> {
        let text = |row: &[String], name: &str| clean_field(table.value(row, name).unwrap_or(""));

        let mut offers = Vec::with_capacity(table.len());
        for row in &table.rows {
            let row = row.as_slice();
            let raw_grade = table.value(row, "GRADO");
            let grade = match kind {
                DatasetKind::Standard => canonicalize_grade_standard(raw_grade),
                DatasetKind::Specialization => canonicalize_grade_specialization(raw_grade),
            };
            let Some(grade) = grade else {
                continue;
            };

            let province = canonicalize_province(&text(row, "PROVINCIA"));
            let locality = text(row, "LOCALIDAD");
            let center = text(row, "CENTRO");

            let coords = self.coords.resolve(&province, &locality, &center);
            let comarca = self.comarcas.resolve(&province, &locality);

            offers.push(TrainingOffer {
                regime: text(row, "RÉGIMEN"),
                family: text(row, "FAMILIA"),
                cycle: text(row, "CICLO"),
                shift: text(row, "TURNO"),
                unit_count: parse_units(table.value(row, "UNIDADES").unwrap_or("")),
                grade,
                latitude: coords.latitude,
                longitude: coords.longitude,
                comarca,
                province,
                locality,
                center,
            });
        }
        offers
    }
}

/// Build both datasets from the configured files.
pub fn load_all(settings: &LoaderSettings) -> Datasets {
    let mut builder = OfferDatasetBuilder::from_settings(settings);
    load_with(&mut builder, settings)
}

/// Build both datasets with an existing builder (shared caches).
pub fn load_with(builder: &mut OfferDatasetBuilder, settings: &LoaderSettings) -> Datasets {
    let standard = OfferSource::standard(&settings.standard_file)
        .skip_rows(settings.standard_skip_rows)
        .delimiter(settings.delimiter);
    let specialization = OfferSource::specialization(&settings.specialization_file)
        .skip_rows(settings.specialization_skip_rows)
        .delimiter(settings.delimiter);

    Datasets {
        standard: builder.build(&standard),
        specialization: builder.build(&specialization),
    }
}

/// Convenience for a single export with default lookups and no catalog.
pub fn build_file(path: impl AsRef<Path>, kind: DatasetKind) -> Dataset {
    let source = match kind {
        DatasetKind::Standard => OfferSource::standard(path.as_ref()),
        DatasetKind::Specialization => OfferSource::specialization(path.as_ref()),
    };
    OfferDatasetBuilder::new(ComarcaResolver::default(), CoordinateAssigner::default()).build(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comarca::{ComarcaTable, DEFAULT_ARTICLES};
    use crate::normalizer::normalize_bytes;
    use crate::vocabulary::Grade;
    use std::io::Write;

    const STANDARD: &str = "OFERTA FORMATIVA FP 2025-2026
Conselleria d'Educació
,,,,,,,,
PROVINCIA,LOCALIDAD,CENTRO,RÉGIMEN,GRADO,FAMILIA,CICLO,TURNO,UNIDADES
Valencia,Gandia,IES Example,Público,Grado Medio,Sanidad,Cuidados Auxiliares,Matinal,2
Alicante/Alacant,Elx,IES La Torreta,Público,FP Básico 2ª Oportunidad,Informática,Informática de Oficina,Vespertino,1
Castellón de la Plana,Vinaròs,IES Leopoldo Querol,Público,Grado Superior,Informática,DAM,Matinal,n/a
Valencia,Gandia,IES Example,Público,Curso de especialización,Sanidad,X,Matinal,1
Murcia,Cartagena,IES Fuera,Privado,Grado Medio,Sanidad,Y,Matinal,3
";

    const SPECIALIZATION: &str = "CURSOS DE ESPECIALIZACIÓN
2025-2026
PROVINCIA,LOCALIDAD,CENTRO_REGIMEN,GRADO,FAMILIA,CICLO,TURNO,UNIDADES
Valencia,Gandia,IES Example Público,Superior,Sanidad,Curso A,Matinal,1
Valencia,Gandia,IES Example Público,Medio,Sanidad,Curso B,Matinal,1
Valencia,Gandia,IES Example Público,,Sanidad,Curso C,Matinal,1
Valencia,Gandia,IES Example Público,Especialización,Sanidad,Curso D,Matinal,1
";

    const CATALOG: &str = "dlibre,noms_mun,provincia,latitud,longitud,comarca
IES Leopoldo Querol,Vinaròs,Castellón,40.4700,0.4740,El Baix Maestrat
,Gandia,Valencia,,,La Safor
";

    fn builder() -> OfferDatasetBuilder {
        let table = ComarcaTable::from_bytes(CATALOG.as_bytes(), DEFAULT_ARTICLES).unwrap();
        let reference = crate::coords::ReferenceCoordinates::from_bytes(CATALOG.as_bytes()).unwrap();
        OfferDatasetBuilder::new(
            ComarcaResolver::new(table),
            CoordinateAssigner::default().with_reference(reference),
        )
    }

    fn standard_offers() -> Vec<TrainingOffer> {
        let table = normalize_bytes(STANDARD.as_bytes(), &TableLayout::offers(4)).unwrap();
        builder().build_rows(DatasetKind::Standard, &table)
    }

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    // -------------------------------------------------------------------------
    // STANDARD DATASET TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_standard_rows_cleaned_and_canonicalized() {
        let offers = standard_offers();
        let first = &offers[0];
        assert_eq!(first.province, "VALÈNCIA");
        assert_eq!(first.locality, "GANDIA");
        assert_eq!(first.center, "IES EXAMPLE");
        assert_eq!(first.regime, "PÚBLICO");
        assert_eq!(first.grade, Grade::Medio);
        assert_eq!(first.cycle, "CUIDADOS AUXILIARES");
        assert_eq!(first.unit_count, 2);
        assert_eq!(first.comarca, "SAFOR");

        assert_eq!(offers[1].province, "ALACANT");
        assert_eq!(offers[1].grade, Grade::BasicoSegunda);
        assert_eq!(offers[1].comarca, "ALACANTÍ");
    }

    #[test]
    fn test_standard_grade_invariant() {
        let offers = standard_offers();
        // The specialization-course row is dropped
        assert_eq!(offers.len(), 4);
        assert!(offers.iter().all(|o| Grade::ALL.contains(&o.grade)));
    }

    #[test]
    fn test_non_numeric_units_default_to_zero() {
        let offers = standard_offers();
        assert_eq!(offers[2].center, "IES LEOPOLDO QUEROL");
        assert_eq!(offers[2].unit_count, 0);
    }

    #[test]
    fn test_reference_coordinates_used() {
        let offers = standard_offers();
        assert_eq!(offers[2].latitude, 40.47);
        assert_eq!(offers[2].longitude, 0.474);
        assert_eq!(offers[2].comarca, "BAIX MAESTRAT");
    }

    #[test]
    fn test_unknown_province_passes_through_with_sentinels() {
        let offers = standard_offers();
        let outsider = &offers[3];
        assert_eq!(outsider.province, "MURCIA");
        assert_eq!((outsider.latitude, outsider.longitude), (0.0, 0.0));
        assert_eq!(outsider.comarca, "NO DEFINIDA - MURCIA");
    }

    // -------------------------------------------------------------------------
    // SPECIALIZATION DATASET TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_specialization_keeps_only_medio_and_superior() {
        let table = normalize_bytes(SPECIALIZATION.as_bytes(), &TableLayout::offers(3)).unwrap();
        let offers = builder().build_rows(DatasetKind::Specialization, &table);
        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].grade, Grade::Superior);
        assert_eq!(offers[1].grade, Grade::Medio);
        assert!(offers
            .iter()
            .all(|o| matches!(o.grade, Grade::Medio | Grade::Superior)));
    }

    #[test]
    fn test_specialization_merged_center_split() {
        let table = normalize_bytes(SPECIALIZATION.as_bytes(), &TableLayout::offers(3)).unwrap();
        let offers = builder().build_rows(DatasetKind::Specialization, &table);
        assert_eq!(offers[0].center, "IES EXAMPLE");
        assert_eq!(offers[0].regime, "PÚBLICO");
    }

    // -------------------------------------------------------------------------
    // CROSS-FILE TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_same_center_in_both_files_gets_same_point() {
        let std_file = write_temp(STANDARD);
        let esp_file = write_temp(SPECIALIZATION);

        let mut shared = builder();
        let standard = shared.build(&OfferSource::standard(std_file.path()));
        let specialization = shared.build(&OfferSource::specialization(esp_file.path()));
        assert_eq!(standard.offers[0].coordinates(), specialization.offers[0].coordinates());

        // Independently built datasets agree too
        let alone = build_file(esp_file.path(), DatasetKind::Specialization);
        assert_eq!(standard.offers[0].coordinates(), alone.offers[0].coordinates());
    }

    #[test]
    fn test_build_is_deterministic() {
        let file = write_temp(STANDARD);
        let a = builder().build(&OfferSource::standard(file.path()));
        let b = builder().build(&OfferSource::standard(file.path()));
        assert_eq!(a, b);
    }

    // -------------------------------------------------------------------------
    // FAILURE TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_missing_file_yields_empty_dataset() {
        let dataset = builder().build(&OfferSource::standard("/nonexistent/oferta.csv"));
        assert!(dataset.is_empty());
        assert_eq!(dataset.kind, DatasetKind::Standard);
    }

    #[test]
    fn test_schema_mismatch_yields_empty_dataset() {
        let file = write_temp("t\nt\nt\nt\nValencia,Gandia,IES A\n");
        let mut b = builder();
        assert!(b.try_build(&OfferSource::standard(file.path())).is_err());
        let dataset = b.build(&OfferSource::standard(file.path()));
        assert!(dataset.is_empty());
    }

    #[test]
    fn test_load_all_with_missing_files() {
        let settings = LoaderSettings {
            standard_file: "/nonexistent/a.csv".into(),
            specialization_file: "/nonexistent/b.csv".into(),
            coordinates_file: "/nonexistent/c.csv".into(),
            comarcas_file: "/nonexistent/c.csv".into(),
            ..LoaderSettings::default()
        };
        let datasets = load_all(&settings);
        assert!(datasets.standard.is_empty());
        assert!(datasets.specialization.is_empty());
        assert_eq!(datasets.specialization.kind, DatasetKind::Specialization);
    }

    #[test]
    fn test_load_all_from_files() {
        let std_file = write_temp(STANDARD);
        let esp_file = write_temp(SPECIALIZATION);
        let catalog = write_temp(CATALOG);
        let settings = LoaderSettings {
            standard_file: std_file.path().to_path_buf(),
            specialization_file: esp_file.path().to_path_buf(),
            coordinates_file: catalog.path().to_path_buf(),
            comarcas_file: catalog.path().to_path_buf(),
            ..LoaderSettings::default()
        };
        let datasets = load_all(&settings);
        assert_eq!(datasets.standard.len(), 4);
        assert_eq!(datasets.get(DatasetKind::Specialization).len(), 2);
        assert_eq!(datasets.standard.offers[2].comarca, "BAIX MAESTRAT");
    }

    // -------------------------------------------------------------------------
    // UNIT PARSING TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("3"), 3);
        assert_eq!(parse_units(" 12 "), 12);
        assert_eq!(parse_units("2.0"), 2);
        assert_eq!(parse_units("2.7"), 2);
        assert_eq!(parse_units(""), 0);
        assert_eq!(parse_units("dos"), 0);
        assert_eq!(parse_units("-4"), 0);
        assert_eq!(parse_units("NaN"), 0);
    }
}
