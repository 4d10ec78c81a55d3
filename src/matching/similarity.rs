// src/matching/similarity.rs

use once_cell::sync::Lazy;
use std::collections::HashMap;
use strsim::jaro_winkler;

use crate::models::{NormalizedRecord, NpiComparison, SimilarityScores};
use crate::utils::constants::{
    EARTH_RADIUS_MILES, FIRST_NAME_WEIGHT, LAST_NAME_WEIGHT, LOCATION_WEIGHT, NAME_WEIGHT,
    NPI_MATCH_SCORE, SPECIALTY_WEIGHT,
};

/// Canonical specialty -> accepted variants (upper-case).
const SPECIALTY_SYNONYMS: [(&str, &[&str]); 9] = [
    ("INTERNAL MEDICINE", &["INTERNAL MED", "INT MEDICINE", "IM"]),
    ("FAMILY MEDICINE", &["FAMILY MED", "FAMILY PRACTICE", "FP"]),
    ("CARDIOLOGY", &["CARDIOVASCULAR DISEASE", "CARDIOVASCULAR MED", "CV"]),
    ("ORTHOPEDIC SURGERY", &["ORTHOPAEDIC SURGERY", "ORTHOPEDICS", "ORTHO"]),
    ("GENERAL SURGERY", &["SURGERY", "GEN SURGERY"]),
    ("PEDIATRICS", &["PEDIATRIC MEDICINE", "PEDS"]),
    (
        "OBSTETRICS & GYNECOLOGY",
        &["OB/GYN", "OB-GYN", "OBSTETRICS AND GYNECOLOGY"],
    ),
    ("GASTROENTEROLOGY", &["GI", "GASTRO", "GI MEDICINE"]),
    ("EMERGENCY MEDICINE", &["ER", "EMERGENCY MED", "EM"]),
];

static SPECIALTY_CANONICAL: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (canonical, variants) in SPECIALTY_SYNONYMS.iter() {
        map.insert(*canonical, *canonical);
        for variant in variants.iter() {
            map.insert(*variant, *canonical);
        }
    }
    map
});

/// Upper-cased, trimmed specialty mapped onto its synonym group when it has one.
pub fn canonical_specialty(specialty: &str) -> String {
    let upper = specialty.trim().to_uppercase();
    match SPECIALTY_CANONICAL.get(upper.as_str()) {
        Some(canonical) => canonical.to_string(),
        None => upper,
    }
}

/// Jaro-Winkler evaluated on a fixed argument order so that the result does
/// not depend on which record came first.
fn ordered_jaro_winkler(a: &str, b: &str) -> f64 {
    if a <= b {
        jaro_winkler(a, b)
    } else {
        jaro_winkler(b, a)
    }
}

pub fn compare_npi(a: Option<&str>, b: Option<&str>) -> NpiComparison {
    match (
        crate::models::well_formed_npi(a),
        crate::models::well_formed_npi(b),
    ) {
        (Some(x), Some(y)) if x == y => NpiComparison::Match,
        (Some(_), Some(_)) => NpiComparison::Conflict,
        _ => NpiComparison::Unknown,
    }
}

fn strip_last_name(last: &str) -> String {
    last.trim()
        .to_uppercase()
        .chars()
        .filter(|c| !matches!(c, '\'' | '-' | ' '))
        .collect()
}

/// Missing last name on either side scores 0.0.
pub fn last_name_similarity(a: Option<&str>, b: Option<&str>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };
    let (a, b) = (strip_last_name(a), strip_last_name(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }
    ordered_jaro_winkler(&a, &b)
}

/// Missing first name on either side is neutral (0.5).
pub fn first_name_similarity(a: Option<&str>, b: Option<&str>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.5;
    };
    let (a, b) = (a.trim().to_uppercase(), b.trim().to_uppercase());
    if a.is_empty() || b.is_empty() {
        return 0.5;
    }
    if a == b {
        return 1.0;
    }
    // Initial match: "J" vs "JOHN"
    if (a.chars().count() == 1 && b.starts_with(a.as_str()))
        || (b.chars().count() == 1 && a.starts_with(b.as_str()))
    {
        return 0.8;
    }
    ordered_jaro_winkler(&a, &b)
}

pub fn name_similarity(a: &NormalizedRecord, b: &NormalizedRecord) -> f64 {
    let last = last_name_similarity(a.last_name(), b.last_name());
    let first = first_name_similarity(a.first_name(), b.first_name());
    last * LAST_NAME_WEIGHT + first * FIRST_NAME_WEIGHT
}

/// Great-circle distance in miles.
pub fn haversine_miles(from: (f64, f64), to: (f64, f64)) -> f64 {
    // Fixed argument order keeps the float result symmetric
    let (p1, p2) = if from <= to { (from, to) } else { (to, from) };
    let (lat1, lon1) = (p1.0.to_radians(), p1.1.to_radians());
    let (lat2, lon2) = (p2.0.to_radians(), p2.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().min(1.0).asin()
}

pub fn location_score(a: &NormalizedRecord, b: &NormalizedRecord) -> f64 {
    if let (Some(pa), Some(pb)) = (a.coordinates(), b.coordinates()) {
        let distance = haversine_miles(pa, pb);
        return if distance < 0.5 {
            1.0
        } else if distance < 10.0 {
            0.8
        } else if distance < 50.0 {
            0.5
        } else if distance < 100.0 {
            0.3
        } else {
            0.1
        };
    }
    match (a.state(), b.state()) {
        (Some(sa), Some(sb)) if sa.eq_ignore_ascii_case(sb) => 0.3,
        (Some(_), Some(_)) => 0.1,
        _ => 0.2,
    }
}

/// Indel similarity: `2 * LCS / (len_a + len_b)` over chars.
fn indel_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let mut row = vec![0usize; b.len() + 1];
    for &ca in &a {
        let mut diagonal = 0;
        for (j, &cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    2.0 * row[b.len()] as f64 / total as f64
}

/// `None` when either specialty is absent.
pub fn specialty_similarity(a: Option<&str>, b: Option<&str>) -> Option<f64> {
    let a = crate::models::core::non_blank(a)?;
    let b = crate::models::core::non_blank(b)?;
    let (ua, ub) = (a.to_uppercase(), b.to_uppercase());
    if ua == ub || canonical_specialty(&ua) == canonical_specialty(&ub) {
        return Some(1.0);
    }
    let ratio = indel_ratio(&ua, &ub);
    if ratio > 0.8 {
        Some(ratio)
    } else {
        Some(0.0)
    }
}

fn overall_score(
    npi: NpiComparison,
    name: f64,
    location: f64,
    specialty: Option<f64>,
) -> f64 {
    match npi {
        NpiComparison::Match => NPI_MATCH_SCORE,
        NpiComparison::Conflict => 0.0,
        NpiComparison::Unknown => {
            let mut score = name * NAME_WEIGHT + location * LOCATION_WEIGHT;
            score += match specialty {
                Some(s) => s * SPECIALTY_WEIGHT,
                // Redistribute the specialty weight onto the name
                None => name * SPECIALTY_WEIGHT,
            };
            score.clamp(0.0, 1.0)
        }
    }
}

/// Scores a record pair. Total: missing fields degrade to neutral values.
pub fn score(a: &NormalizedRecord, b: &NormalizedRecord) -> SimilarityScores {
    let npi_match = compare_npi(a.npi.as_deref(), b.npi.as_deref());
    let name = name_similarity(a, b);
    let location = location_score(a, b);
    let specialty = specialty_similarity(a.specialty.as_deref(), b.specialty.as_deref());

    SimilarityScores {
        npi_match,
        name_similarity: name,
        specialty_match: specialty,
        location_score: location,
        overall_score: overall_score(npi_match, name, location, specialty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;

    fn record(id: &str, last: &str, first: &str) -> NormalizedRecord {
        NormalizedRecord::new(SourceType::Claims, id, last).with_first_name(first)
    }

    #[test]
    fn test_npi_comparison() {
        assert_eq!(compare_npi(Some("1234567890"), Some("1234567890")), NpiComparison::Match);
        assert_eq!(compare_npi(Some("1234567890"), Some("0987654321")), NpiComparison::Conflict);
        assert_eq!(compare_npi(Some("1234567890"), None), NpiComparison::Unknown);
        assert_eq!(compare_npi(Some("12345"), Some("12345")), NpiComparison::Unknown);
        assert_eq!(compare_npi(Some("123456789X"), Some("1234567890")), NpiComparison::Unknown);
    }

    #[test]
    fn test_last_name_normalization() {
        assert_eq!(last_name_similarity(Some("O'Brien"), Some("OBRIEN")), 1.0);
        assert_eq!(last_name_similarity(Some("Smith-Jones"), Some("smith jones")), 1.0);
        assert_eq!(last_name_similarity(None, Some("Smith")), 0.0);
        let typo = last_name_similarity(Some("Smith"), Some("Smyth"));
        assert!(typo > 0.8 && typo < 1.0, "typo score {}", typo);
    }

    #[test]
    fn test_first_name_initials_and_missing() {
        assert_eq!(first_name_similarity(Some("J"), Some("John")), 0.8);
        assert_eq!(first_name_similarity(Some("john"), Some("J")), 0.8);
        assert_eq!(first_name_similarity(Some("John"), Some("JOHN")), 1.0);
        assert_eq!(first_name_similarity(None, Some("John")), 0.5);
        assert_eq!(first_name_similarity(Some(" "), Some("John")), 0.5);
    }

    #[test]
    fn test_location_bands() {
        let a = record("a", "Smith", "John").with_coordinates(40.7128, -74.0060);
        let same_spot = record("b", "Smith", "John").with_coordinates(40.7130, -74.0062);
        let nearby = record("c", "Smith", "John").with_coordinates(40.7580, -73.9855);
        let far = record("d", "Smith", "John").with_coordinates(34.0522, -118.2437);
        // One degree of latitude is about 69 miles
        let regional = record("i", "Smith", "John").with_coordinates(41.0128, -74.0060);
        let outer = record("j", "Smith", "John").with_coordinates(41.7128, -74.0060);
        assert_eq!(location_score(&a, &same_spot), 1.0);
        assert_eq!(location_score(&a, &nearby), 0.8);
        assert_eq!(location_score(&a, &regional), 0.5);
        assert_eq!(location_score(&a, &outer), 0.3);
        assert_eq!(location_score(&a, &far), 0.1);

        let ny = record("e", "Smith", "John").with_state("NY");
        let ny_lower = record("f", "Smith", "John").with_state("ny");
        let ca = record("g", "Smith", "John").with_state("CA");
        let nowhere = record("h", "Smith", "John");
        assert_eq!(location_score(&ny, &ny_lower), 0.3);
        assert_eq!(location_score(&ny, &ca), 0.1);
        assert_eq!(location_score(&ny, &nowhere), 0.2);
    }

    #[test]
    fn test_haversine_known_distance() {
        // New York to Los Angeles is roughly 2445 miles
        let d = haversine_miles((40.7128, -74.0060), (34.0522, -118.2437));
        assert!((d - 2445.0).abs() < 15.0, "distance {}", d);
        assert_eq!(haversine_miles((1.0, 2.0), (1.0, 2.0)), 0.0);
    }

    #[test]
    fn test_specialty_synonyms() {
        assert_eq!(specialty_similarity(Some("Internal Medicine"), Some("IM")), Some(1.0));
        assert_eq!(specialty_similarity(Some("ob/gyn"), Some("OB-GYN")), Some(1.0));
        assert_eq!(specialty_similarity(Some("Cardiology"), Some("Dermatology")), Some(0.0));
        assert_eq!(specialty_similarity(None, Some("Cardiology")), None);
        let fuzzy = specialty_similarity(Some("Cardiology"), Some("Cardiolgy")).unwrap();
        assert!((fuzzy - 18.0 / 19.0).abs() < 1e-12, "{}", fuzzy);
        assert_eq!(canonical_specialty(" family practice "), "FAMILY MEDICINE");
    }

    #[test]
    fn test_specialty_fuzzy_uses_indel_ratio() {
        // LCS "NEROLOGY" is 8 chars over 9 + 10
        let close = specialty_similarity(Some("Neurology"), Some("Nephrology")).unwrap();
        assert!((close - 16.0 / 19.0).abs() < 1e-12, "{}", close);
        assert_eq!(
            specialty_similarity(Some("Nephrology"), Some("Neurology")),
            Some(close)
        );
        assert_eq!(indel_ratio("ABC", "ABC"), 1.0);
        assert_eq!(indel_ratio("ABC", "XYZ"), 0.0);
        assert_eq!(indel_ratio("", ""), 1.0);
    }

    #[test]
    fn test_npi_overrides_overall_score() {
        let a = record("a", "Smith", "John").with_npi("1234567890");
        let b = record("b", "Jones", "Mary").with_npi("1234567890");
        let scores = score(&a, &b);
        assert_eq!(scores.npi_match, NpiComparison::Match);
        assert_eq!(scores.overall_score, 0.95);

        let c = record("c", "Smith", "John").with_npi("1111111111");
        let d = record("d", "Smith", "John").with_npi("2222222222");
        let scores = score(&c, &d);
        assert_eq!(scores.npi_match, NpiComparison::Conflict);
        assert_eq!(scores.overall_score, 0.0);
    }

    #[test]
    fn test_weighted_overall_without_npi() {
        let a = record("a", "Smith", "John").with_state("NY");
        let b = record("b", "Smith", "John").with_state("NY");
        let scores = score(&a, &b);
        // name 1.0 * (0.5 + 0.2) + location 0.3 * 0.3
        assert!((scores.overall_score - 0.79).abs() < 1e-9);
        assert!(scores.specialty_match.is_none());

        let a = a.with_specialty("Cardiology");
        let b = b.with_specialty("Dermatology");
        let scores = score(&a, &b);
        assert!((scores.overall_score - 0.59).abs() < 1e-9);
    }

    #[test]
    fn test_score_is_symmetric() {
        let a = record("a", "Martinez", "Jon")
            .with_specialty("Cardiology")
            .with_coordinates(41.88, -87.63);
        let b = record("b", "Martines", "John")
            .with_specialty("Cardiovascular Disease")
            .with_coordinates(41.95, -87.70);
        assert_eq!(score(&a, &b), score(&b, &a));
    }
}
