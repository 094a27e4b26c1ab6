//! Explorer - command-line browser for the FP course offering
//!
//! Commands:
//! - summary - dataset sizes, units and lookup coverage
//! - search  - filtered offers in display order
//! - options - values available for a selector given the current filters
//! - map     - OpenStreetMap link for the filtered set or a single center
//! - export  - write the filtered enriched dataset as CSV or JSON
//!
//! File locations come from the environment (or a .env file) and can be
//! overridden per invocation.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ingest::builder::{load_with, OfferDatasetBuilder};
use ingest::view::{self, display_order, distinct_values, total_units, DISPLAY_LIMIT};
use ingest::vocabulary::{canonicalize_province, clean_field};
use ingest::{
    DatasetKind, Datasets, FilterOptions, Grade, LoaderSettings, MapView, OfferField, OfferFilter,
    TrainingOffer,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "explorer", about = "Explore the FP course offering of the Comunitat Valenciana")]
struct Args {
    /// Standard offer export (overrides FP_FILE)
    #[arg(long, global = true)]
    fp_file: Option<PathBuf>,

    /// Specialization course export (overrides ESP_FILE)
    #[arg(long, global = true)]
    esp_file: Option<PathBuf>,

    /// Center catalog with coordinates (overrides CENTER_COORDS_FILE)
    #[arg(long, global = true)]
    coords_file: Option<PathBuf>,

    /// Locality to comarca table (overrides COMARCAS_FILE)
    #[arg(long, global = true)]
    comarcas_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rows, units and lookup coverage per dataset
    Summary,

    /// List offers matching the filters
    Search {
        #[command(flatten)]
        filter: FilterArgs,

        /// Print JSON instead of a table
        #[arg(long, default_value = "false")]
        json: bool,
    },

    /// Values a selector can take under the current filters
    Options {
        #[arg(long, value_enum)]
        field: FieldArg,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Map link for the filtered offers
    Map {
        #[command(flatten)]
        filter: FilterArgs,

        /// Zoom on a single center instead
        #[arg(long)]
        center: Option<String>,
    },

    /// Write the filtered offers to a file
    Export {
        #[arg(long)]
        output: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,

        /// JSON instead of CSV
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
struct FilterArgs {
    #[arg(long, value_enum, default_value = "standard")]
    dataset: DatasetArg,

    #[arg(long)]
    province: Option<String>,

    #[arg(long)]
    comarca: Option<String>,

    #[arg(long)]
    locality: Option<String>,

    /// BÁSICO, "BÁSICO 2A OPORTUNIDAD", MEDIO or SUPERIOR
    #[arg(long)]
    grade: Option<String>,

    #[arg(long)]
    cycle: Option<String>,
}

impl FilterArgs {
    /// Free text is cleaned the same way the datasets are.
    fn to_filter(&self) -> Result<OfferFilter> {
        let grade = match &self.grade {
            Some(raw) => Some(
                Grade::from_label(raw)
                    .with_context(|| format!("unknown grade '{}'", raw))?,
            ),
            None => None,
        };

        Ok(OfferFilter {
            province: self.province.as_deref().map(canonicalize_province),
            comarca: self.comarca.as_deref().map(clean_field),
            locality: self.locality.as_deref().map(clean_field),
            grade,
            cycle: self.cycle.as_deref().map(clean_field),
        })
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq)]
enum DatasetArg {
    #[default]
    Standard,
    Specialization,
}

impl From<DatasetArg> for DatasetKind {
    fn from(arg: DatasetArg) -> Self {
        match arg {
            DatasetArg::Standard => DatasetKind::Standard,
            DatasetArg::Specialization => DatasetKind::Specialization,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq)]
enum FieldArg {
    Province,
    Comarca,
    Locality,
    Grade,
    Cycle,
    Family,
    Regime,
    Shift,
}

impl From<FieldArg> for OfferField {
    fn from(arg: FieldArg) -> Self {
        match arg {
            FieldArg::Province => OfferField::Province,
            FieldArg::Comarca => OfferField::Comarca,
            FieldArg::Locality => OfferField::Locality,
            FieldArg::Grade => OfferField::Grade,
            FieldArg::Cycle => OfferField::Cycle,
            FieldArg::Family => OfferField::Family,
            FieldArg::Regime => OfferField::Regime,
            FieldArg::Shift => OfferField::Shift,
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
struct Config {
    settings: LoaderSettings,
    /// Unset means "same file as the coordinates"
    comarcas_file: Option<PathBuf>,
}

impl Config {
    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = LoaderSettings::default();
        let settings = LoaderSettings {
            standard_file: var("FP_FILE").map(PathBuf::from).unwrap_or(defaults.standard_file),
            specialization_file: var("ESP_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.specialization_file),
            coordinates_file: var("CENTER_COORDS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.coordinates_file),
            standard_skip_rows: var("FP_SKIP_ROWS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.standard_skip_rows),
            specialization_skip_rows: var("ESP_SKIP_ROWS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.specialization_skip_rows),
            locality_scale: var("FP_LOCALITY_SCALE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.locality_scale),
            ..defaults
        };

        Self {
            settings,
            comarcas_file: var("COMARCAS_FILE").map(PathBuf::from),
        }
    }

    /// Command-line paths win over the environment.
    fn with_overrides(mut self, args: &Args) -> LoaderSettings {
        if let Some(path) = &args.fp_file {
            self.settings.standard_file = path.clone();
        }
        if let Some(path) = &args.esp_file {
            self.settings.specialization_file = path.clone();
        }
        if let Some(path) = &args.coords_file {
            self.settings.coordinates_file = path.clone();
        }
        if let Some(path) = &args.comarcas_file {
            self.comarcas_file = Some(path.clone());
        }

        self.settings.comarcas_file = self
            .comarcas_file
            .unwrap_or_else(|| self.settings.coordinates_file.clone());
        self.settings
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Logs go to stderr so piped output stays clean
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// =============================================================================
// Commands
// =============================================================================

fn filtered<'a>(datasets: &'a Datasets, filter: &FilterArgs) -> Result<Vec<&'a TrainingOffer>> {
    let dataset = datasets.get(filter.dataset.into());
    Ok(filter.to_filter()?.apply(&dataset.offers))
}

fn print_summary(builder: &OfferDatasetBuilder, datasets: &Datasets) {
    println!("=== FP Offer Explorer ===");
    for kind in [DatasetKind::Standard, DatasetKind::Specialization] {
        let dataset = datasets.get(kind);
        println!(
            "{:<15} {:>6} offers  {:>8} units",
            kind.label(),
            dataset.len(),
            format_thousands(total_units(&dataset.offers))
        );
    }

    let coords = builder.coordinates();
    println!(
        "Coordinates: {} from catalog, {} simulated",
        coords.reference_len(),
        coords.simulated_len()
    );
    let table = builder.comarcas().table();
    println!(
        "Comarcas: {} localities in {} comarcas",
        table.len(),
        table.comarcas().len()
    );
}

fn print_search(offers: &[&TrainingOffer], json: bool) -> Result<()> {
    let (rows, truncated) = display_order(offers, DISPLAY_LIMIT);

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for o in &rows {
        println!(
            "{} | {} | {} | {} | {} | {} | {} u. | {}",
            o.locality, o.center, o.regime, o.grade, o.cycle, o.shift, o.unit_count, o.comarca
        );
    }
    if truncated {
        println!("Showing the first {} of {} offers.", DISPLAY_LIMIT, offers.len());
    }

    println!();
    println!("Offers found: {}", offers.len());
    println!("Units offered: {}", format_thousands(total_units(offers.iter().copied())));
    println!("Map: {}", MapView::all_centers(offers.iter().copied()).embed_url());
    Ok(())
}

fn option_values(datasets: &Datasets, field: FieldArg, filter: &FilterArgs) -> Result<Vec<String>> {
    let offers = &datasets.get(filter.dataset.into()).offers;
    let options = FilterOptions::cascade(offers, &filter.to_filter()?);

    Ok(match field {
        FieldArg::Province => options.provinces,
        FieldArg::Comarca => options.comarcas,
        FieldArg::Locality => options.localities,
        FieldArg::Grade => options.grades,
        FieldArg::Cycle => options.cycles,
        other => distinct_values(filtered(datasets, filter)?, other.into()),
    })
}

fn map_link(offers: &[&TrainingOffer], center: Option<&str>) -> Result<String> {
    let Some(name) = center else {
        return Ok(MapView::all_centers(offers.iter().copied()).embed_url());
    };

    let wanted = clean_field(name);
    let offer = offers
        .iter()
        .find(|o| o.center == wanted)
        .with_context(|| format!("no offer found for center '{}'", name))?;

    println!("Search: {}", view::search_url(offer));
    Ok(MapView::single_center(offer.coordinates(), &offer.province).embed_url())
}

fn export(offers: &[&TrainingOffer], output: &Path, json: bool) -> Result<()> {
    let file = File::create(output).with_context(|| format!("Failed to create {}", output.display()))?;

    if json {
        serde_json::to_writer_pretty(BufWriter::new(file), offers).context("Failed to write JSON")?;
    } else {
        let mut writer = csv::Writer::from_writer(file);
        for offer in offers {
            writer.serialize(offer).context("Failed to write CSV row")?;
        }
        writer.flush()?;
    }

    info!(file = %output.display(), rows = offers.len(), "exported offers");
    Ok(())
}

/// Group digits with '.', the Spanish thousands separator.
fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let settings = Config::from_env().with_overrides(&args);

    let mut builder = OfferDatasetBuilder::from_settings(&settings);
    let datasets = load_with(&mut builder, &settings);

    match &args.command {
        Command::Summary => print_summary(&builder, &datasets),
        Command::Search { filter, json } => {
            let offers = filtered(&datasets, filter)?;
            print_search(&offers, *json)?;
        }
        Command::Options { field, filter } => {
            for value in option_values(&datasets, *field, filter)? {
                println!("{}", value);
            }
        }
        Command::Map { filter, center } => {
            let offers = filtered(&datasets, filter)?;
            println!("{}", map_link(&offers, center.as_deref())?);
        }
        Command::Export { output, filter, json } => {
            let offers = filtered(&datasets, filter)?;
            if offers.is_empty() {
                bail!("No offers match the filter criteria");
            }
            export(&offers, output, *json)?;
            println!("Wrote {} offers to {}", offers.len(), output.display());
        }
    }

    Ok(())
}
