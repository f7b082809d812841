//! Field extraction: turn one page image into a [`DocumentRecord`].
//!
//! Per image, the protocol is:
//!
//! 1. read + base64-encode the image (failure → filename-based fallback);
//! 2. call the vision capability with the extraction prompt, bounded by the
//!    configured timeout (failure → error-tagged record, batch continues);
//! 3. parse the structured transcript and score its quality;
//! 4. on a FAIBLE tier, make one recovery call with the degraded prompt and
//!    merge the two passes — the recovery value wins only where the normal
//!    value was marked ILLISIBLE or PARTIEL;
//! 5. map the wire field vocabulary onto the canonical record shape.
//!
//! There is exactly one recovery attempt and no other automatic retry —
//! callers needing resilience wrap the provider with their own policy.
//!
//! Extraction calls for different images are independent, so the stage fans
//! them out (`buffer_unordered`) and merges results in a single-threaded
//! reduction afterwards.

use crate::config::AnalysisConfig;
use crate::error::DocError;
use crate::pipeline::encode::encode_image_file;
use crate::pipeline::quality::{evaluate, QualityAssessment, QualityTier};
use crate::pipeline::transcript::{self, ParsedTranscript};
use crate::pipeline::validate::display_name;
use crate::prompts::{EXTRACTION_PROMPT, RECOVERY_PROMPT};
use crate::provider::{EncodedImage, VisionProvider};
use crate::record::{DocumentRecord, DocumentType};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How the record for one image was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMode {
    /// Single normal-pass extraction.
    Normal,
    /// Normal pass rated FAIBLE; recovery pass merged in.
    Recovery,
    /// Recovery was attempted but the call failed; normal pass kept.
    RecoveryFailed,
    /// Vision capability unavailable for this image; classified from the
    /// source filename only.
    FilenameFallback,
    /// Capability call or response parsing failed entirely.
    Error,
}

/// Everything the extractor produced for one source image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub record: DocumentRecord,
    pub quality: QualityAssessment,
    pub mode: ExtractionMode,
    /// Raw normal-pass transcript (empty when the call never succeeded).
    pub transcript: String,
    /// Raw recovery-pass transcript, when one was made.
    pub recovery_transcript: Option<String>,
    /// Model observations from the transcript, plus extractor notes.
    pub observations: Vec<String>,
}

/// Extract records for all images, fanning calls out up to
/// `config.concurrency` at a time.
///
/// Returns the outcome map (every input image gets an entry — failures
/// produce error-tagged or fallback records) plus the per-document errors
/// for the pipeline error list.
pub async fn extract_all(
    provider: &Arc<dyn VisionProvider>,
    images: &[PathBuf],
    config: &AnalysisConfig,
) -> (BTreeMap<PathBuf, ExtractionOutcome>, Vec<DocError>) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(images.len());
    }

    let results: Vec<(PathBuf, ExtractionOutcome, Option<DocError>)> =
        stream::iter(images.iter().cloned().map(|path| {
            let provider = Arc::clone(provider);
            let config = config.clone();
            async move {
                let (outcome, err) = extract_one(&provider, &path, &config).await;
                if let Some(ref cb) = config.progress_callback {
                    match &err {
                        None => cb.on_document_complete(
                            &display_name(&path),
                            outcome.quality.tier.label(),
                        ),
                        Some(e) => cb.on_document_error(&display_name(&path), &e.to_string()),
                    }
                }
                (path, outcome, err)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    // Single-threaded reduction: the fan-out tasks never touch shared state.
    let mut outcomes = BTreeMap::new();
    let mut errors = Vec::new();
    for (path, outcome, err) in results {
        if let Some(e) = err {
            errors.push(e);
        }
        outcomes.insert(path, outcome);
    }

    info!(
        "extracted {} document(s), {} with errors",
        outcomes.len(),
        errors.len()
    );
    (outcomes, errors)
}

/// Extract one image. Total: always returns an outcome.
pub async fn extract_one(
    provider: &Arc<dyn VisionProvider>,
    image_path: &Path,
    config: &AnalysisConfig,
) -> (ExtractionOutcome, Option<DocError>) {
    let name = display_name(image_path);

    let image = match encode_image_file(image_path) {
        Ok(img) => img,
        Err(e) => {
            warn!("encoding failed for {name}: {e}, falling back to filename analysis");
            let record = classify_from_filename(image_path);
            let outcome = ExtractionOutcome {
                record,
                quality: QualityAssessment::default(),
                mode: ExtractionMode::FilenameFallback,
                transcript: String::new(),
                recovery_transcript: None,
                observations: vec!["classified from filename only".to_string()],
            };
            return (
                outcome,
                Some(DocError::EncodingFailed {
                    name,
                    detail: e.to_string(),
                }),
            );
        }
    };

    let prompt = config.extraction_prompt.as_deref().unwrap_or(EXTRACTION_PROMPT);
    let text = match call_capability(provider, &image, prompt, config.api_timeout_secs, &name).await
    {
        Ok(text) => text,
        Err(doc_err) => {
            let outcome = ExtractionOutcome {
                record: DocumentRecord::error(doc_err.to_string()),
                quality: QualityAssessment::default(),
                mode: ExtractionMode::Error,
                transcript: String::new(),
                recovery_transcript: None,
                observations: Vec::new(),
            };
            return (outcome, Some(doc_err));
        }
    };

    let parsed = transcript::parse(&text);
    if !parsed.recognized {
        debug!("unstructured capability reply for {name}");
        let outcome = ExtractionOutcome {
            record: DocumentRecord::error("capability reply had no recognisable structure"),
            quality: QualityAssessment::default(),
            mode: ExtractionMode::Error,
            transcript: text,
            recovery_transcript: None,
            observations: vec!["unstructured capability reply".to_string()],
        };
        return (outcome, None);
    }

    let record = map_record(&parsed);
    let quality = evaluate(&parsed, &record);

    if quality.tier != QualityTier::Poor {
        let outcome = ExtractionOutcome {
            observations: parsed.observations.clone(),
            record,
            quality,
            mode: ExtractionMode::Normal,
            transcript: text,
            recovery_transcript: None,
        };
        return (outcome, None);
    }

    // Recovery: one degraded second attempt for low-quality scans.
    info!("quality FAIBLE for {name}, attempting recovery pass");
    let recovery_prompt = config.recovery_prompt.as_deref().unwrap_or(RECOVERY_PROMPT);
    match call_capability(provider, &image, recovery_prompt, config.api_timeout_secs, &name).await {
        Ok(recovery_text) => {
            let recovery_parsed = transcript::parse(&recovery_text);
            let merged = merge_recovery(&parsed, &recovery_parsed);
            let record = map_record(&merged);
            let quality = evaluate(&merged, &record);
            let outcome = ExtractionOutcome {
                observations: merged.observations.clone(),
                record,
                quality,
                mode: ExtractionMode::Recovery,
                transcript: text,
                recovery_transcript: Some(recovery_text),
            };
            (outcome, None)
        }
        Err(doc_err) => {
            warn!("recovery pass failed for {name}: {doc_err}");
            let outcome = ExtractionOutcome {
                observations: parsed.observations.clone(),
                record,
                quality,
                mode: ExtractionMode::RecoveryFailed,
                transcript: text,
                recovery_transcript: None,
            };
            // The normal-pass record stands; the failed recovery is only a
            // warning in the error list.
            (outcome, Some(doc_err))
        }
    }
}

/// One capability call bounded by the configured timeout.
async fn call_capability(
    provider: &Arc<dyn VisionProvider>,
    image: &EncodedImage,
    prompt: &str,
    timeout_secs: u64,
    name: &str,
) -> Result<String, DocError> {
    match tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        provider.extract(image, prompt),
    )
    .await
    {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(DocError::ExtractionFailed {
            name: name.to_string(),
            detail: e.to_string(),
        }),
        Err(_) => Err(DocError::ExtractionTimeout {
            name: name.to_string(),
            secs: timeout_secs,
        }),
    }
}

// ── Field mapping ────────────────────────────────────────────────────────

/// Wire keys that feed each canonical slot, in priority order
/// (first non-empty wins).
const FULL_NAME_KEYS: &[&str] = &["nom_complet", "nom_employe", "nom_titulaire"];
const FIRST_NAME_KEYS: &[&str] = &["prenom", "prenom_employe"];
const NUMBER_KEYS: &[&str] = &[
    "numero_cin",
    "numero_passeport",
    "numero_client",
    "numero_compte",
];
const ADDRESS_KEYS: &[&str] = &["adresse_complete", "adresse_facturation"];

/// Map a parsed transcript onto the canonical record shape. Wire keys with
/// a dedicated slot are consumed; everything else lands in `extra_fields`.
pub fn map_record(parsed: &ParsedTranscript) -> DocumentRecord {
    let mut record = DocumentRecord {
        document_type: DocumentType::from_wire(&parsed.type_label),
        classification_confidence: parsed.classification,
        ..Default::default()
    };

    let mut consumed: Vec<&str> = Vec::new();
    let mut take = |keys: &[&'static str]| -> Option<String> {
        for key in keys {
            if let Some(value) = parsed.fields.get(*key) {
                if !value.trim().is_empty() {
                    consumed.push(*key);
                    return Some(value.clone());
                }
            }
        }
        None
    };

    record.full_name = take(FULL_NAME_KEYS);
    record.first_name = take(FIRST_NAME_KEYS);
    record.birth_date = take(&["date_naissance"]);
    record.document_number = take(NUMBER_KEYS);
    record.address = take(ADDRESS_KEYS);
    record.issue_date = take(&["date_emission"]);
    record.expiry_date = take(&["date_expiration"]);

    for (key, value) in &parsed.fields {
        if !consumed.contains(&key.as_str()) {
            record.extra_fields.insert(key.clone(), value.clone());
        }
    }

    // A type outside the closed vocabulary keeps its raw label for reports.
    if record.document_type == DocumentType::Other
        && !parsed.type_label.is_empty()
        && !parsed.type_label.eq_ignore_ascii_case("AUTRE")
    {
        record
            .extra_fields
            .insert("type_detail".to_string(), parsed.type_label.clone());
    }

    record
}

// ── Recovery merge ───────────────────────────────────────────────────────

/// True when a normal-pass value should yield to a clean recovery value.
/// Only ILLISIBLE and PARTIEL qualify — an INCERTAIN guess from the normal
/// pass is still a guess worth keeping over a degraded-mode answer.
fn yields_to_recovery(value: &str) -> bool {
    let upper = value.to_uppercase();
    upper.contains("ILLISIBLE") || upper.contains("PARTIEL")
}

/// Merge the recovery pass into the normal pass, field by field.
///
/// For every field where the normal value carries an ILLISIBLE/PARTIEL
/// marker and the recovery value does not, the recovery value wins;
/// otherwise the normal value is kept. Fields the recovery pass invented
/// from nothing are not added. Headers (type, confidence, image quality)
/// stay those of the normal pass.
pub fn merge_recovery(normal: &ParsedTranscript, recovery: &ParsedTranscript) -> ParsedTranscript {
    let mut merged = normal.clone();

    for (key, recovery_value) in &recovery.fields {
        let Some(normal_value) = normal.fields.get(key) else {
            continue;
        };
        if yields_to_recovery(normal_value) && !yields_to_recovery(recovery_value) {
            merged.fields.insert(key.clone(), recovery_value.clone());
        }
    }

    merged
        .observations
        .extend(recovery.observations.iter().cloned());
    merged
}

// ── Filename fallback classifier ─────────────────────────────────────────

/// Keyword → document type, checked against the lowercased filename.
const FILENAME_KEYWORDS: &[(&str, DocumentType)] = &[
    ("cin", DocumentType::NationalId),
    ("identite", DocumentType::NationalId),
    ("piece", DocumentType::NationalId),
    ("passeport", DocumentType::Passport),
    ("passport", DocumentType::Passport),
    ("electricite", DocumentType::UtilityBill),
    ("facture", DocumentType::UtilityBill),
    ("bancaire", DocumentType::BankStatement),
    ("releve", DocumentType::BankStatement),
    ("salaire", DocumentType::Payslip),
    ("bulletin", DocumentType::Payslip),
    ("paie", DocumentType::Payslip),
    ("domicile", DocumentType::Other),
    ("justificatif", DocumentType::Other),
];

static NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"([A-Za-z]+)_([A-Za-z]+)_", // NAME_FIRSTNAME_
        r"_([A-Za-z]+)_([A-Za-z]+)", // _NAME_FIRSTNAME
        r"([A-Za-z]+)-([A-Za-z]+)",  // NAME-FIRSTNAME
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static pattern"))
    .collect()
});

/// Lightweight classifier used when the vision capability is entirely
/// unavailable for an image: a keyword match on the source filename plus
/// `NAME_FIRSTNAME`-style patterns. Best-effort by design — a record from
/// this path carries no field beyond type and (maybe) a name.
pub fn classify_from_filename(path: &Path) -> DocumentRecord {
    let filename = display_name(path).to_lowercase();
    let mut record = DocumentRecord::default();

    for (keyword, doc_type) in FILENAME_KEYWORDS {
        if filename.contains(keyword) {
            record.document_type = *doc_type;
            break;
        }
    }

    for pattern in NAME_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&filename) {
            record.full_name = Some(caps[1].to_uppercase());
            record.first_name = Some(capitalize(&caps[2]));
            break;
        }
    }

    record
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
