//! Transcript parsing: deterministic line-scanner for the capability reply.
//!
//! The extraction prompt demands a fixed structured layout:
//!
//! ```text
//! TYPE_DOCUMENT: CIN
//! CONFIANCE_CLASSIFICATION: HAUTE
//! QUALITE_IMAGE: BONNE
//!
//! INFORMATIONS_EXTRAITES:
//! - nom_complet: BENANI AHMED
//! - prenom: Ahmed
//!
//! OBSERVATIONS:
//! - Document net, aucune zone douteuse
//! ```
//!
//! Parsing is purely textual: scan line by line, switch the current section
//! on header lines, accumulate dash-prefixed `key: value` pairs into the
//! field map and dash-prefixed free text into observations. No semantic
//! validation happens here, and the parser is total — garbage input yields
//! a transcript with [`recognized`](ParsedTranscript::recognized) false,
//! which the extractor degrades to an error-tagged record.

use crate::record::{Confidence, ImageQuality};
use std::collections::BTreeMap;

/// Structured view of one capability reply, before field mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTranscript {
    /// Raw wire label from the `TYPE_DOCUMENT:` line (e.g. `CIN`).
    pub type_label: String,
    /// Self-reported classification confidence.
    pub classification: Confidence,
    /// Self-reported image quality.
    pub image_quality: ImageQuality,
    /// Extracted `key: value` pairs from the `INFORMATIONS_EXTRAITES:` block.
    pub fields: BTreeMap<String, String>,
    /// Free-text notes from the `OBSERVATIONS:` block.
    pub observations: Vec<String>,
    /// True iff a `TYPE_DOCUMENT:` header was present at all. A reply with
    /// no recognisable structure is not an error here, but the extractor
    /// tags its record as ERREUR.
    pub recognized: bool,
}

#[derive(PartialEq)]
enum Section {
    None,
    Fields,
    Observations,
}

/// Parse one capability reply. Total: never fails, never panics.
pub fn parse(text: &str) -> ParsedTranscript {
    let mut parsed = ParsedTranscript::default();
    let mut section = Section::None;

    for raw_line in text.lines() {
        let line = raw_line.trim();

        if let Some(rest) = line.strip_prefix("TYPE_DOCUMENT:") {
            parsed.type_label = rest.trim().to_string();
            parsed.recognized = true;
        } else if let Some(rest) = line.strip_prefix("CONFIANCE_CLASSIFICATION:") {
            parsed.classification = Confidence::from_wire(rest);
        } else if let Some(rest) = line.strip_prefix("QUALITE_IMAGE:") {
            parsed.image_quality = ImageQuality::from_wire(rest);
        } else if line == "INFORMATIONS_EXTRAITES:" {
            section = Section::Fields;
        } else if line == "OBSERVATIONS:" {
            section = Section::Observations;
        } else if let Some(item) = line.strip_prefix("- ") {
            match section {
                Section::Fields => {
                    if let Some((key, value)) = item.split_once(':') {
                        let key = key.trim();
                        let value = value.trim();
                        if !key.is_empty() && !value.is_empty() {
                            parsed.fields.insert(key.to_string(), value.to_string());
                        }
                    }
                }
                Section::Observations => {
                    if !item.trim().is_empty() {
                        parsed.observations.push(item.trim().to_string());
                    }
                }
                Section::None => {}
            }
        }
        // Anything else (blank lines, stray fences, prose) is ignored.
    }

    parsed
}
