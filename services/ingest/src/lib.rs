//! Ingestion core for the Valencian FP course-offering exports.
//!
//! Reads the yearly offer CSVs, normalizes their drifting layouts, maps
//! provinces and grades onto closed vocabularies, and enriches every row
//! with a comarca and a deterministic coordinate. Loading never aborts a
//! run: a broken file becomes an empty dataset and a log line.

pub mod builder;
pub mod comarca;
pub mod config;
pub mod coords;
pub mod error;
pub mod model;
pub mod normalizer;
pub mod reference;
pub mod view;
pub mod vocabulary;

pub use builder::{load_all, OfferDatasetBuilder, OfferSource};
pub use comarca::{ComarcaResolver, ComarcaTable};
pub use config::LoaderSettings;
pub use coords::{AssignerSettings, CoordinateAssigner};
pub use error::{IngestError, Result, RowWarning};
pub use model::{Coordinates, Dataset, DatasetKind, Datasets, TrainingOffer};
pub use normalizer::{NormalizedTable, TableLayout};
pub use view::{FilterOptions, MapView, OfferField, OfferFilter};
pub use vocabulary::{Grade, Province};
