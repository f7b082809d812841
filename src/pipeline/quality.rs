//! Extraction quality scoring.
//!
//! A 0–100 heuristic combining the model's self-reported image quality and
//! classification confidence with hard evidence from the parsed fields
//! (sentinel markers, missing essentials). The resulting tier drives one
//! decision: a FAIBLE extraction triggers the recovery pass.

use crate::pipeline::transcript::ParsedTranscript;
use crate::record::{has_sentinel, Confidence, DocumentRecord, ImageQuality};
use serde::{Deserialize, Serialize};

/// Qualitative tier derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QualityTier {
    Excellent,
    Good,
    Average,
    #[default]
    Poor,
}

impl QualityTier {
    /// Stable label used in reports and progress output. The French tier
    /// names are the domain vocabulary shared with the wire format.
    pub fn label(&self) -> &'static str {
        match self {
            QualityTier::Excellent => "EXCELLENT",
            QualityTier::Good => "BON",
            QualityTier::Average => "MOYEN",
            QualityTier::Poor => "FAIBLE",
        }
    }

    fn from_score(score: u8) -> Self {
        match score {
            90..=100 => QualityTier::Excellent,
            70..=89 => QualityTier::Good,
            50..=69 => QualityTier::Average,
            _ => QualityTier::Poor,
        }
    }
}

/// Quality verdict for one extraction pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// 0–100; starts at 100, penalties applied, clamped.
    pub score: u8,
    pub tier: QualityTier,
    /// Fields whose value carried a sentinel marker.
    pub flagged_fields: usize,
    /// Human-readable notes on what cost points.
    pub notes: Vec<String>,
}

/// Score one extraction.
///
/// Penalties: −30 / −15 for self-reported FAIBLE / MOYENNE image quality,
/// −25 / −10 for FAIBLE / MOYENNE classification confidence, −12 per
/// sentinel-marked field, −15 per missing essential field (full name, first
/// name — evaluated on the mapped record, so a payslip's `nom_employe`
/// satisfies the full-name requirement).
pub fn evaluate(parsed: &ParsedTranscript, record: &DocumentRecord) -> QualityAssessment {
    let mut score: i32 = 100;
    let mut notes = Vec::new();

    match parsed.image_quality {
        ImageQuality::Poor => {
            score -= 30;
            notes.push("image quality reported poor".to_string());
        }
        ImageQuality::Medium => score -= 15,
        _ => {}
    }

    match parsed.classification {
        Confidence::Low => {
            score -= 25;
            notes.push("document type classification is uncertain".to_string());
        }
        Confidence::Medium => score -= 10,
        Confidence::High => {}
    }

    let flagged_fields = parsed
        .fields
        .values()
        .filter(|value| has_sentinel(value))
        .count();
    if flagged_fields > 0 {
        score -= (flagged_fields as i32) * 12;
        notes.push(format!("{flagged_fields} field(s) flagged as unreadable or uncertain"));
    }

    let mut missing = Vec::new();
    if blank(record.full_name.as_deref()) {
        missing.push("full name");
    }
    if blank(record.first_name.as_deref()) {
        missing.push("first name");
    }
    if !missing.is_empty() {
        score -= (missing.len() as i32) * 15;
        notes.push(format!("missing essential field(s): {}", missing.join(", ")));
    }

    let score = score.clamp(0, 100) as u8;
    QualityAssessment {
        score,
        tier: QualityTier::from_score(score),
        flagged_fields,
        notes,
    }
}

fn blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::transcript::parse;
    use crate::pipeline::extract::map_record;

    fn assess(text: &str) -> QualityAssessment {
        let parsed = parse(text);
        let record = map_record(&parsed);
        evaluate(&parsed, &record)
    }

    #[test]
    fn clean_extraction_scores_excellent() {
        let q = assess(
            "TYPE_DOCUMENT: CIN\nCONFIANCE_CLASSIFICATION: HAUTE\nQUALITE_IMAGE: BONNE\nINFORMATIONS_EXTRAITES:\n- nom_complet: BENANI AHMED\n- prenom: Ahmed",
        );
        assert_eq!(q.score, 100);
        assert_eq!(q.tier, QualityTier::Excellent);
        assert_eq!(q.flagged_fields, 0);
    }

    #[test]
    fn sentinel_fields_cost_twelve_each() {
        let q = assess(
            "TYPE_DOCUMENT: CIN\nCONFIANCE_CLASSIFICATION: HAUTE\nQUALITE_IMAGE: BONNE\nINFORMATIONS_EXTRAITES:\n- nom_complet: ILLISIBLE\n- prenom: Ahmed",
        );
        // One sentinel field (−12); full_name maps to the sentinel string so
        // it is present, not missing.
        assert_eq!(q.score, 88);
        assert_eq!(q.flagged_fields, 1);
        assert_eq!(q.tier, QualityTier::Good);
    }

    #[test]
    fn missing_essentials_cost_fifteen_each() {
        let q = assess(
            "TYPE_DOCUMENT: FACTURE_ELECTRICITE\nCONFIANCE_CLASSIFICATION: HAUTE\nQUALITE_IMAGE: BONNE\nINFORMATIONS_EXTRAITES:\n- fournisseur: ONE",
        );
        assert_eq!(q.score, 70);
        assert_eq!(q.tier, QualityTier::Good);
    }

    #[test]
    fn poor_image_and_low_confidence_reach_poor_tier() {
        let q = assess(
            "TYPE_DOCUMENT: AUTRE\nCONFIANCE_CLASSIFICATION: FAIBLE\nQUALITE_IMAGE: FAIBLE\nINFORMATIONS_EXTRAITES:\n- nom_complet: X\n- prenom: Y",
        );
        // 100 − 30 − 25 = 45
        assert_eq!(q.score, 45);
        assert_eq!(q.tier, QualityTier::Poor);
    }

    #[test]
    fn score_is_clamped_at_zero() {
        let q = assess(
            "TYPE_DOCUMENT: AUTRE\nCONFIANCE_CLASSIFICATION: FAIBLE\nQUALITE_IMAGE: FAIBLE\nINFORMATIONS_EXTRAITES:\n- a: ILLISIBLE\n- b: ILLISIBLE\n- c: ILLISIBLE\n- d: ILLISIBLE\n- e: ILLISIBLE",
        );
        // 100 − 30 − 25 − 60 − 30 < 0 → clamped
        assert_eq!(q.score, 0);
        assert_eq!(q.tier, QualityTier::Poor);
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(QualityTier::from_score(90), QualityTier::Excellent);
        assert_eq!(QualityTier::from_score(89), QualityTier::Good);
        assert_eq!(QualityTier::from_score(70), QualityTier::Good);
        assert_eq!(QualityTier::from_score(69), QualityTier::Average);
        assert_eq!(QualityTier::from_score(50), QualityTier::Average);
        assert_eq!(QualityTier::from_score(49), QualityTier::Poor);
    }
}
