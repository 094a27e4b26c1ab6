//! Read-only views over an enriched dataset: cascading filters, option
//! lists, display ordering and map links.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::model::{Coordinates, TrainingOffer};
use crate::vocabulary::{Grade, Province};

/// Rows shown in a result list before truncating.
pub const DISPLAY_LIMIT: usize = 1000;
/// Offers scanned for map markers.
pub const MARKER_LIMIT: usize = 100;

const FALLBACK_CENTER: Coordinates = Coordinates {
    latitude: 39.4699,
    longitude: -0.3763,
};

/// Exact-match filters, all optional, combined with AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferFilter {
    pub province: Option<String>,
    pub comarca: Option<String>,
    pub locality: Option<String>,
    pub grade: Option<Grade>,
    pub cycle: Option<String>,
}

impl OfferFilter {
    pub fn matches(&self, offer: &TrainingOffer) -> bool {
        fn eq(wanted: &Option<String>, actual: &str) -> bool {
            wanted.as_deref().map_or(true, |w| w == actual)
        }

        eq(&self.province, &offer.province)
            && eq(&self.comarca, &offer.comarca)
            && eq(&self.locality, &offer.locality)
            && self.grade.map_or(true, |g| g == offer.grade)
            && eq(&self.cycle, &offer.cycle)
    }

    pub fn apply<'a>(&self, offers: &'a [TrainingOffer]) -> Vec<&'a TrainingOffer> {
        offers.iter().filter(|o| self.matches(o)).collect()
    }
}

/// Column an option list can be built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferField {
    Province,
    Comarca,
    Locality,
    Grade,
    Cycle,
    Family,
    Regime,
    Shift,
}

impl OfferField {
    pub fn value<'a>(self, offer: &'a TrainingOffer) -> &'a str {
        match self {
            OfferField::Province => &offer.province,
            OfferField::Comarca => &offer.comarca,
            OfferField::Locality => &offer.locality,
            OfferField::Grade => offer.grade.label(),
            OfferField::Cycle => &offer.cycle,
            OfferField::Family => &offer.family,
            OfferField::Regime => &offer.regime,
            OfferField::Shift => &offer.shift,
        }
    }
}

/// Sorted distinct non-empty values of `field`.
pub fn distinct_values<'a, I>(offers: I, field: OfferField) -> Vec<String>
where
    I: IntoIterator<Item = &'a TrainingOffer>,
{
    offers
        .into_iter()
        .map(|o| field.value(o).trim())
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Option lists for dependent selectors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub provinces: Vec<String>,
    pub comarcas: Vec<String>,
    pub localities: Vec<String>,
    pub grades: Vec<String>,
    pub cycles: Vec<String>,
}

impl FilterOptions {
    /// Comarcas narrow by province, localities by province and comarca,
    /// cycles by province and grade.
    pub fn cascade(offers: &[TrainingOffer], filter: &OfferFilter) -> Self {
        let by_province = OfferFilter {
            province: filter.province.clone(),
            ..OfferFilter::default()
        };
        let by_comarca = OfferFilter {
            comarca: filter.comarca.clone(),
            ..by_province.clone()
        };
        let by_grade = OfferFilter {
            grade: filter.grade,
            ..by_province.clone()
        };

        Self {
            provinces: distinct_values(offers, OfferField::Province),
            comarcas: distinct_values(by_province.apply(offers), OfferField::Comarca),
            localities: distinct_values(by_comarca.apply(offers), OfferField::Locality),
            grades: distinct_values(offers, OfferField::Grade),
            cycles: distinct_values(by_grade.apply(offers), OfferField::Cycle),
        }
    }
}

pub fn total_units<'a, I>(offers: I) -> u64
where
    I: IntoIterator<Item = &'a TrainingOffer>,
{
    offers.into_iter().map(|o| u64::from(o.unit_count)).sum()
}

/// Sort by (locality, center) and keep the first `limit` rows.
///
/// The flag is set when rows were cut.
pub fn display_order<'a>(offers: &[&'a TrainingOffer], limit: usize) -> (Vec<&'a TrainingOffer>, bool) {
    let mut sorted = offers.to_vec();
    sorted.sort_by(|a, b| (&a.locality, &a.center).cmp(&(&b.locality, &b.center)));
    let truncated = sorted.len() > limit;
    sorted.truncate(limit);
    (sorted, truncated)
}

/// A square map window with optional markers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapView {
    pub center: Coordinates,
    pub delta: f64,
    pub markers: Vec<Coordinates>,
}

impl MapView {
    /// Window covering every located offer.
    pub fn all_centers<'a, I>(offers: I) -> Self
    where
        I: IntoIterator<Item = &'a TrainingOffer>,
    {
        let offers: Vec<&TrainingOffer> = offers.into_iter().collect();
        let located: Vec<Coordinates> = offers
            .iter()
            .map(|o| o.coordinates())
            .filter(Coordinates::is_known)
            .collect();

        let markers = offers
            .iter()
            .take(MARKER_LIMIT)
            .map(|o| o.coordinates())
            .filter(Coordinates::is_known)
            .collect();

        let Some(first) = located.first() else {
            return Self {
                center: FALLBACK_CENTER,
                delta: 0.5,
                markers,
            };
        };

        let (mut lat_min, mut lat_max) = (first.latitude, first.latitude);
        let (mut lon_min, mut lon_max) = (first.longitude, first.longitude);
        for c in &located[1..] {
            lat_min = lat_min.min(c.latitude);
            lat_max = lat_max.max(c.latitude);
            lon_min = lon_min.min(c.longitude);
            lon_max = lon_max.max(c.longitude);
        }

        let lat_range = (lat_max - lat_min).max(0.05);
        let lon_range = (lon_max - lon_min).max(0.05);

        Self {
            center: Coordinates::new((lat_min + lat_max) / 2.0, (lon_min + lon_max) / 2.0),
            delta: lat_range.max(lon_range).max(0.1) * 1.2,
            markers,
        }
    }

    /// Close-up on one center, or its province when it has no coordinates.
    pub fn single_center(coords: Coordinates, province: &str) -> Self {
        let (center, delta) = if coords.is_known() {
            (coords, 0.01)
        } else {
            let fallback = Province::from_label(province)
                .map(|p| {
                    let a = p.anchor();
                    Coordinates::new(a.lat, a.lon)
                })
                .unwrap_or(FALLBACK_CENTER);
            (fallback, 0.1)
        };

        Self {
            center,
            delta,
            markers: vec![center],
        }
    }

    /// OpenStreetMap embed link for this window.
    pub fn embed_url(&self) -> String {
        let (lat, lon, d) = (self.center.latitude, self.center.longitude, self.delta);
        let mut url = format!(
            "https://www.openstreetmap.org/export/embed.html?bbox={}%2C{}%2C{}%2C{}&layer=mapnik",
            lon - d,
            lat - d,
            lon + d,
            lat + d
        );
        for m in &self.markers {
            url.push_str(&format!("&marker={}%2C{}", m.latitude, m.longitude));
        }
        url
    }
}

/// External map search for a center by name.
pub fn search_url(offer: &TrainingOffer) -> String {
    let query = format!("{}, {}, {}", offer.center, offer.locality, offer.province);
    format!(
        "https://www.google.com/maps/search/?api=1&query={}",
        query.replace(' ', "+")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(province: &str, comarca: &str, locality: &str, center: &str, grade: Grade, cycle: &str) -> TrainingOffer {
        TrainingOffer {
            province: province.to_string(),
            locality: locality.to_string(),
            center: center.to_string(),
            regime: "PÚBLICO".to_string(),
            grade,
            family: "INFORMÁTICA".to_string(),
            cycle: cycle.to_string(),
            shift: "MATINAL".to_string(),
            unit_count: 1,
            latitude: 0.0,
            longitude: 0.0,
            comarca: comarca.to_string(),
        }
    }

    fn located(mut o: TrainingOffer, lat: f64, lon: f64) -> TrainingOffer {
        o.latitude = lat;
        o.longitude = lon;
        o
    }

    fn sample() -> Vec<TrainingOffer> {
        vec![
            offer("VALÈNCIA", "SAFOR", "GANDIA", "IES B", Grade::Medio, "SMR"),
            offer("VALÈNCIA", "SAFOR", "OLIVA", "IES A", Grade::Superior, "DAM"),
            offer("VALÈNCIA", "RIBERA ALTA", "ALZIRA", "IES C", Grade::Medio, "SMR"),
            offer("ALACANT", "BAIX VINALOPÓ", "ELX", "IES D", Grade::Basico, "OFIMÀTICA"),
            offer("VALÈNCIA", "SAFOR", "GANDIA", "IES A", Grade::Superior, "ASIR"),
        ]
    }

    // -------------------------------------------------------------------------
    // FILTER TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_empty_filter_matches_all() {
        let offers = sample();
        assert_eq!(OfferFilter::default().apply(&offers).len(), offers.len());
    }

    #[test]
    fn test_filters_combine() {
        let offers = sample();
        let filter = OfferFilter {
            province: Some("VALÈNCIA".to_string()),
            comarca: Some("SAFOR".to_string()),
            grade: Some(Grade::Superior),
            ..OfferFilter::default()
        };
        let hits = filter.apply(&offers);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|o| o.grade == Grade::Superior));
    }

    #[test]
    fn test_filter_is_exact_match() {
        let offers = sample();
        let filter = OfferFilter {
            locality: Some("GAND".to_string()),
            ..OfferFilter::default()
        };
        assert!(filter.apply(&offers).is_empty());
    }

    // -------------------------------------------------------------------------
    // OPTION LIST TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_distinct_values_sorted_and_non_empty() {
        let mut offers = sample();
        offers.push(offer("VALÈNCIA", "", " ", "IES Z", Grade::Medio, "SMR"));
        assert_eq!(
            distinct_values(&offers, OfferField::Locality),
            vec!["ALZIRA", "ELX", "GANDIA", "OLIVA"]
        );
        assert_eq!(
            distinct_values(&offers, OfferField::Grade),
            vec!["BÁSICO", "MEDIO", "SUPERIOR"]
        );
    }

    #[test]
    fn test_cascade_narrows_dependents() {
        let offers = sample();
        let filter = OfferFilter {
            province: Some("VALÈNCIA".to_string()),
            comarca: Some("SAFOR".to_string()),
            grade: Some(Grade::Medio),
            ..OfferFilter::default()
        };
        let options = FilterOptions::cascade(&offers, &filter);
        assert_eq!(options.provinces, vec!["ALACANT", "VALÈNCIA"]);
        assert_eq!(options.comarcas, vec!["RIBERA ALTA", "SAFOR"]);
        assert_eq!(options.localities, vec!["GANDIA", "OLIVA"]);
        // Cycles ignore the comarca
        assert_eq!(options.cycles, vec!["SMR"]);
        assert_eq!(options.grades.len(), 3);
    }

    // -------------------------------------------------------------------------
    // LISTING TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_total_units() {
        let mut offers = sample();
        offers[0].unit_count = u32::MAX;
        offers[1].unit_count = 3;
        assert_eq!(total_units(&offers), u32::MAX as u64 + 3 + 3);
    }

    #[test]
    fn test_display_order_sorts_by_locality_then_center() {
        let offers = sample();
        let all: Vec<&TrainingOffer> = offers.iter().collect();
        let (rows, truncated) = display_order(&all, DISPLAY_LIMIT);
        assert!(!truncated);
        let order: Vec<(&str, &str)> = rows.iter().map(|o| (o.locality.as_str(), o.center.as_str())).collect();
        assert_eq!(
            order,
            vec![
                ("ALZIRA", "IES C"),
                ("ELX", "IES D"),
                ("GANDIA", "IES A"),
                ("GANDIA", "IES B"),
                ("OLIVA", "IES A"),
            ]
        );
    }

    #[test]
    fn test_display_order_truncates() {
        let offers = sample();
        let all: Vec<&TrainingOffer> = offers.iter().collect();
        let (rows, truncated) = display_order(&all, 2);
        assert!(truncated);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].locality, "ALZIRA");
    }

    // -------------------------------------------------------------------------
    // MAP TESTS
    // -------------------------------------------------------------------------

    #[test]
    fn test_all_centers_without_coordinates_defaults_to_valencia() {
        let view = MapView::all_centers(&sample());
        assert_eq!(view.center, Coordinates::new(39.4699, -0.3763));
        assert_eq!(view.delta, 0.5);
        assert!(view.markers.is_empty());

        let empty: Vec<TrainingOffer> = Vec::new();
        assert_eq!(MapView::all_centers(&empty).delta, 0.5);
    }

    #[test]
    fn test_all_centers_bounding_box() {
        let offers = sample();
        let offers = vec![
            located(offers[0].clone(), 39.0, -0.5),
            located(offers[1].clone(), 39.4, -0.2),
            offers[2].clone(),
        ];
        let view = MapView::all_centers(&offers);
        assert!((view.center.latitude - 39.2).abs() < 1e-9);
        assert!((view.center.longitude + 0.35).abs() < 1e-9);
        assert!((view.delta - 0.4 * 1.2).abs() < 1e-9);
        assert_eq!(view.markers.len(), 2);
    }

    #[test]
    fn test_all_centers_single_point_uses_minimum_span() {
        let offers = vec![located(sample()[0].clone(), 39.0, -0.5)];
        let view = MapView::all_centers(&offers);
        assert!((view.delta - 0.12).abs() < 1e-9);
    }

    #[test]
    fn test_markers_taken_from_head_of_list() {
        let base = sample()[0].clone();
        let mut offers: Vec<TrainingOffer> = (0..MARKER_LIMIT).map(|_| base.clone()).collect();
        offers.push(located(base.clone(), 39.0, -0.5));
        let view = MapView::all_centers(&offers);
        // The only located offer sits past the marker window
        assert!(view.markers.is_empty());
        assert_eq!(view.center, Coordinates::new(39.0, -0.5));
    }

    #[test]
    fn test_single_center() {
        let view = MapView::single_center(Coordinates::new(38.5, -0.4), "ALACANT");
        assert_eq!(view.delta, 0.01);
        assert_eq!(view.center, Coordinates::new(38.5, -0.4));

        let view = MapView::single_center(Coordinates::UNKNOWN, "CASTELLÓ");
        assert_eq!(view.delta, 0.1);
        assert_eq!(view.center, Coordinates::new(39.9871, -0.0381));

        let view = MapView::single_center(Coordinates::UNKNOWN, "MURCIA");
        assert_eq!(view.center, Coordinates::new(39.4699, -0.3763));
    }

    #[test]
    fn test_embed_url() {
        let view = MapView {
            center: Coordinates::new(39.5, -0.5),
            delta: 0.25,
            markers: vec![Coordinates::new(39.5, -0.5)],
        };
        assert_eq!(
            view.embed_url(),
            "https://www.openstreetmap.org/export/embed.html?bbox=-0.75%2C39.25%2C-0.25%2C39.75&layer=mapnik&marker=39.5%2C-0.5"
        );
    }

    #[test]
    fn test_search_url() {
        let o = offer("VALÈNCIA", "SAFOR", "GANDIA", "IES MARIA ENRÍQUEZ", Grade::Medio, "SMR");
        assert_eq!(
            search_url(&o),
            "https://www.google.com/maps/search/?api=1&query=IES+MARIA+ENRÍQUEZ,+GANDIA,+VALÈNCIA"
        );
    }
}
