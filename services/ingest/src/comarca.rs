//! Locality → comarca resolution.
//!
//! The table comes from the center catalog when it carries a comarca
//! column. Lookups degrade step by step (exact, accent-folded, suffix
//! stripped) and finally fall back to a per-province default, so every
//! query gets an answer even with no table at all.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::reference::{field, ReferenceSheet, Role};
use crate::vocabulary::{canonicalize_province, Province};

const LOCALITY_ROLE: Role = ("locality", &["localidad_oficial", "noms_mun", "localidad"]);
const COMARCA_ROLE: Role = ("comarca", &["comarca"]);
const PROVINCE_ROLE: Role = ("province", &["provincia"]);

/// Leading articles dropped from comarca names ("L'Alacantí" → "ALACANTÍ").
pub const DEFAULT_ARTICLES: &[&str] = &["el ", "la ", "l'", "l’", "els ", "les "];

/// Province label → (upper-cased locality → comarca).
#[derive(Debug, Clone, Default)]
pub struct ComarcaTable {
    provinces: BTreeMap<String, BTreeMap<String, String>>,
}

impl ComarcaTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let sheet = ReferenceSheet::read(path)?;
        Self::from_sheet(&sheet, &path.display().to_string(), DEFAULT_ARTICLES)
    }

    pub fn from_bytes(bytes: &[u8], articles: &[&str]) -> Result<Self> {
        let sheet = ReferenceSheet::from_bytes(bytes)?;
        Self::from_sheet(&sheet, "<memory>", articles)
    }

    fn from_sheet(sheet: &ReferenceSheet, file: &str, articles: &[&str]) -> Result<Self> {
        let cols = sheet.resolve_roles(file, &[LOCALITY_ROLE, COMARCA_ROLE, PROVINCE_ROLE])?;
        let (locality_col, comarca_col, province_col) = (cols[0], cols[1], cols[2]);

        let mut table = Self::empty();
        for record in &sheet.records {
            let Some(province) = Province::canonical(field(record, province_col)) else {
                continue;
            };
            let locality = field(record, locality_col).to_uppercase();
            let comarca = strip_article(field(record, comarca_col), articles)
                .trim()
                .to_uppercase();

            if locality.is_empty() || comarca.is_empty() {
                continue;
            }
            table.insert(province.label(), &locality, &comarca);
        }

        Ok(table)
    }

    /// Register a locality; the first comarca seen for it is kept.
    ///
    /// "TOWN (DISTRICT)" is also reachable as "TOWN".
    pub fn insert(&mut self, province: &str, locality: &str, comarca: &str) -> bool {
        let localities = self.provinces.entry(province.to_string()).or_default();
        if localities.contains_key(locality) {
            return false;
        }
        localities.insert(locality.to_string(), comarca.to_string());

        if let Some((prefix, _)) = locality.split_once('(') {
            let prefix = prefix.trim();
            if !prefix.is_empty() && prefix != locality && !localities.contains_key(prefix) {
                localities.insert(prefix.to_string(), comarca.to_string());
            }
        }
        true
    }

    pub fn get(&self, province: &str, locality: &str) -> Option<&str> {
        self.provinces
            .get(province)
            .and_then(|l| l.get(locality))
            .map(String::as_str)
    }

    pub fn localities_in(&self, province: &str) -> usize {
        self.provinces.get(province).map_or(0, BTreeMap::len)
    }

    /// Total localities across provinces.
    pub fn len(&self) -> usize {
        self.provinces.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct comarca names, sorted.
    pub fn comarcas(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .provinces
            .values()
            .flat_map(|l| l.values().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    fn localities(&self, province: &str) -> Option<&BTreeMap<String, String>> {
        self.provinces.get(province)
    }
}

/// Case-insensitive removal of one leading article.
fn strip_article<'a>(comarca: &'a str, articles: &[&str]) -> &'a str {
    for article in articles {
        let n = article.chars().count();
        let end = comarca
            .char_indices()
            .nth(n)
            .map_or(comarca.len(), |(i, _)| i);
        let head = &comarca[..end];
        if head.chars().count() == n && head.to_lowercase() == article.to_lowercase() {
            return &comarca[end..];
        }
    }
    comarca
}

/// Fold the accented capitals found in Valencian and Spanish place names.
pub fn fold_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'À' | 'Á' | 'Â' => 'A',
            'È' | 'É' | 'Ê' => 'E',
            'Ì' | 'Í' | 'Î' => 'I',
            'Ò' | 'Ó' | 'Ô' => 'O',
            'Ù' | 'Ú' | 'Û' => 'U',
            'Ç' => 'C',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

/// Comarca used when a locality cannot be matched.
pub fn default_comarca(province: &str) -> String {
    match Province::from_label(province) {
        Some(Province::Valencia) => "CIUTAT DE VALÈNCIA".to_string(),
        Some(Province::Alacant) => "ALACANTÍ".to_string(),
        Some(Province::Castello) => "PLANA ALTA".to_string(),
        None => format!("NO DEFINIDA - {}", province),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComarcaResolver {
    table: ComarcaTable,
}

impl ComarcaResolver {
    pub fn new(table: ComarcaTable) -> Self {
        Self { table }
    }

    /// Load the table from `path`; any failure leaves an empty table so that
    /// every lookup lands on the province default.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!(file = %path.display(), "comarca table not found, using province defaults");
            return Self::default();
        }

        match ComarcaTable::load(path) {
            Ok(table) => {
                info!(
                    file = %path.display(),
                    localities = table.len(),
                    comarcas = table.comarcas().len(),
                    "loaded comarca table"
                );
                for province in Province::ALL {
                    info!("  {}: {} localities", province, table.localities_in(province.label()));
                }
                Self::new(table)
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "cannot load comarca table, using province defaults");
                Self::default()
            }
        }
    }

    pub fn table(&self) -> &ComarcaTable {
        &self.table
    }

    pub fn resolve(&self, province: &str, locality: &str) -> String {
        let province = province.trim().to_uppercase();
        let locality = locality.trim().to_uppercase();

        if let Some(localities) = self.table.localities(&province) {
            if let Some(comarca) = localities.get(&locality) {
                return comarca.clone();
            }

            if let Some(comarca) = fuzzy_match(localities, &locality) {
                return comarca.to_string();
            }

            if locality.contains("DE LA PLANA") {
                let simple = locality.replace("DE LA PLANA", "");
                if let Some(comarca) = localities.get(simple.trim()) {
                    return comarca.clone();
                }
            }
        }

        default_comarca(&province)
    }
}

/// Accent-insensitive match where either name may contain the other.
///
/// Folded equality beats containment; among containments the key closest
/// in length to the query wins, and `BTreeMap` order settles exact ties on
/// the smallest key.
fn fuzzy_match<'a>(localities: &'a BTreeMap<String, String>, locality: &str) -> Option<&'a str> {
    let query = fold_accents(locality);
    if query.is_empty() {
        return None;
    }
    let query_len = query.chars().count();

    let mut best: Option<((bool, usize), &'a str)> = None;
    for (key, comarca) in localities {
        let folded = fold_accents(key);
        if folded.is_empty() {
            continue;
        }
        let equal = folded == query;
        if !(equal || folded.contains(&query) || query.contains(&folded)) {
            continue;
        }

        let rank = (!equal, query_len.abs_diff(folded.chars().count()));
        match best {
            Some((current, _)) if current <= rank => {}
            _ => best = Some((rank, comarca.as_str())),
        }
    }

    best.map(|(_, comarca)| comarca)
}
