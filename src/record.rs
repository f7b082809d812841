//! Extracted-document data model.
//!
//! [`DocumentRecord`] is the closed primary schema for one scanned document:
//! a fixed set of optional string fields plus one open [`extra_fields`] map
//! for everything the extraction prompt returns that has no dedicated slot
//! (employer, account number, billing period, …). Field values are kept as
//! the raw strings the vision model produced — birth dates in particular are
//! never parsed into a date type, because OCR output formats are unreliable.
//!
//! ## Sentinel markers
//!
//! The extraction prompt instructs the model to mark problem fields with
//! literal markers rather than guessing:
//!
//! * `ILLISIBLE` — the field is visible but unreadable
//! * `PARTIEL: <text>` — only part of the field is readable
//! * `INCERTAIN: <guess>` — readable but the model is unsure
//!
//! These are first-class values: the quality scorer counts them and the
//! concordance engine treats them as "no signal" (see [`usable`]). They are
//! recognised by substring match, exactly as the wire format defines them.
//!
//! [`extra_fields`]: DocumentRecord::extra_fields

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Field marker for an unreadable value.
pub const MARKER_ILLEGIBLE: &str = "ILLISIBLE";
/// Field marker prefix for a partially readable value.
pub const MARKER_PARTIAL: &str = "PARTIEL";
/// Field marker prefix for an uncertain value.
pub const MARKER_UNCERTAIN: &str = "INCERTAIN";

/// Document classification, from the fixed vocabulary the extraction prompt
/// offers the model.
///
/// Wire labels are French (the prompt language): `CIN`, `PASSEPORT`,
/// `FACTURE_ELECTRICITE`, `BULLETIN_SALAIRE`, `RELEVE_BANCAIRE`, `AUTRE`.
/// Anything unrecognised maps to [`Other`](DocumentType::Other);
/// [`Error`](DocumentType::Error) tags records produced by failure paths
/// (capability call failed, unparseable response).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentType {
    NationalId,
    Passport,
    UtilityBill,
    Payslip,
    BankStatement,
    Other,
    Error,
}

impl DocumentType {
    /// Map a wire label from the transcript to the closed vocabulary.
    pub fn from_wire(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "CIN" => DocumentType::NationalId,
            "PASSEPORT" => DocumentType::Passport,
            "FACTURE_ELECTRICITE" => DocumentType::UtilityBill,
            "BULLETIN_SALAIRE" => DocumentType::Payslip,
            "RELEVE_BANCAIRE" => DocumentType::BankStatement,
            "ERREUR" => DocumentType::Error,
            _ => DocumentType::Other,
        }
    }

    /// Stable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            DocumentType::NationalId => "NATIONAL_ID",
            DocumentType::Passport => "PASSPORT",
            DocumentType::UtilityBill => "UTILITY_BILL",
            DocumentType::Payslip => "PAYSLIP",
            DocumentType::BankStatement => "BANK_STATEMENT",
            DocumentType::Other => "OTHER",
            DocumentType::Error => "ERROR",
        }
    }
}

/// Classification confidence tier self-reported by the vision model.
///
/// Wire values: `HAUTE` / `MOYENNE` / `FAIBLE`. Anything else defaults to
/// [`Low`](Confidence::Low) — an unreadable confidence line is itself a sign
/// the response is shaky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

impl Confidence {
    pub fn from_wire(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "HAUTE" => Confidence::High,
            "MOYENNE" => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

/// Image quality tier self-reported by the vision model.
///
/// Wire values: `BONNE` / `MOYENNE` / `FAIBLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageQuality {
    Good,
    Medium,
    Poor,
    #[default]
    Unknown,
}

impl ImageQuality {
    pub fn from_wire(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "BONNE" => ImageQuality::Good,
            "MOYENNE" => ImageQuality::Medium,
            "FAIBLE" => ImageQuality::Poor,
            _ => ImageQuality::Unknown,
        }
    }
}

/// Structured data extracted from one source image.
///
/// Created once by the field extractor and immutable afterwards; consumed by
/// the concordance engine and the report builder. `None` means "not
/// applicable or not found" — never a default. Present values may still be
/// sentinel markers; use [`usable`] before comparing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_type: DocumentType,
    pub classification_confidence: Confidence,
    pub full_name: Option<String>,
    pub first_name: Option<String>,
    pub birth_date: Option<String>,
    pub document_number: Option<String>,
    pub address: Option<String>,
    pub issue_date: Option<String>,
    pub expiry_date: Option<String>,
    /// Document-type-specific fields with no dedicated slot above.
    pub extra_fields: BTreeMap<String, String>,
}

impl Default for DocumentType {
    fn default() -> Self {
        DocumentType::Other
    }
}

impl DocumentRecord {
    /// A minimal record tagging a failed extraction, with the cause kept in
    /// `extra_fields["error"]` so it survives serialisation.
    pub fn error(message: impl Into<String>) -> Self {
        let mut extra = BTreeMap::new();
        extra.insert("error".to_string(), message.into());
        DocumentRecord {
            document_type: DocumentType::Error,
            extra_fields: extra,
            ..Default::default()
        }
    }

    /// National-ID number signal: the document number of an identity card,
    /// or an explicitly labelled `numero_cin` on any other document type.
    pub fn national_id(&self) -> Option<&str> {
        if self.document_type == DocumentType::NationalId {
            if let Some(v) = usable(self.document_number.as_deref()) {
                return Some(v);
            }
        }
        usable(self.extra_fields.get("numero_cin").map(String::as_str))
    }

    /// Social-security number, where the document carries one.
    pub fn social_security(&self) -> Option<&str> {
        usable(self.extra_fields.get("numero_cnss").map(String::as_str))
            .or_else(|| usable(self.extra_fields.get("numero_securite_sociale").map(String::as_str)))
    }

    /// Phone number, where the document carries one.
    pub fn phone(&self) -> Option<&str> {
        usable(self.extra_fields.get("telephone").map(String::as_str))
    }

    /// Bank account / IBAN signal: the document number of a bank statement,
    /// or an explicitly labelled account field elsewhere.
    pub fn bank_account(&self) -> Option<&str> {
        if self.document_type == DocumentType::BankStatement {
            if let Some(v) = usable(self.document_number.as_deref()) {
                return Some(v);
            }
        }
        usable(self.extra_fields.get("rib").map(String::as_str))
            .or_else(|| usable(self.extra_fields.get("iban").map(String::as_str)))
            .or_else(|| usable(self.extra_fields.get("numero_compte").map(String::as_str)))
    }

    /// Employer name, where the document carries one.
    pub fn employer(&self) -> Option<&str> {
        usable(self.extra_fields.get("entreprise").map(String::as_str))
            .or_else(|| usable(self.extra_fields.get("employeur").map(String::as_str)))
    }
}

/// True if the value carries one of the ILLISIBLE / PARTIEL / INCERTAIN
/// markers (case-insensitive substring, matching the wire convention).
pub fn has_sentinel(value: &str) -> bool {
    let upper = value.to_uppercase();
    upper.contains(MARKER_ILLEGIBLE)
        || upper.contains(MARKER_PARTIAL)
        || upper.contains(MARKER_UNCERTAIN)
}

/// Filter a field down to a comparable value: `None` for absent, empty, or
/// sentinel-marked values. Concordance checks compare only usable values —
/// a sentinel is "no signal", not a mismatch.
pub fn usable(value: Option<&str>) -> Option<&str> {
    match value {
        Some(v) if !v.trim().is_empty() && !has_sentinel(v) => Some(v),
        _ => None,
    }
}

/// All records of one applicant's folder, keyed by source image path.
///
/// The unit over which concordance is evaluated. Keys are unique; the
/// BTreeMap iteration order (lexicographic by path) keeps report output and
/// test fixtures reproducible, though no check depends on it.
pub type CaseBundle = BTreeMap<PathBuf, DocumentRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_labels_map_to_vocabulary() {
        assert_eq!(DocumentType::from_wire("CIN"), DocumentType::NationalId);
        assert_eq!(DocumentType::from_wire("  passeport "), DocumentType::Passport);
        assert_eq!(
            DocumentType::from_wire("FACTURE_ELECTRICITE"),
            DocumentType::UtilityBill
        );
        assert_eq!(
            DocumentType::from_wire("JUSTIFICATIF_DOMICILE"),
            DocumentType::Other
        );
        assert_eq!(DocumentType::from_wire("ERREUR"), DocumentType::Error);
    }

    #[test]
    fn confidence_defaults_to_low() {
        assert_eq!(Confidence::from_wire("HAUTE"), Confidence::High);
        assert_eq!(Confidence::from_wire("moyenne"), Confidence::Medium);
        assert_eq!(Confidence::from_wire("???"), Confidence::Low);
    }

    #[test]
    fn sentinel_detection() {
        assert!(has_sentinel("ILLISIBLE"));
        assert!(has_sentinel("PARTIEL: BEN"));
        assert!(has_sentinel("incertain: Ahmed"));
        assert!(!has_sentinel("Ahmed Benani"));
    }

    #[test]
    fn usable_filters_sentinels_and_blanks() {
        assert_eq!(usable(Some("Ahmed")), Some("Ahmed"));
        assert_eq!(usable(Some("ILLISIBLE")), None);
        assert_eq!(usable(Some("   ")), None);
        assert_eq!(usable(None), None);
    }

    #[test]
    fn national_id_prefers_identity_card_number() {
        let mut rec = DocumentRecord {
            document_type: DocumentType::NationalId,
            document_number: Some("AB 123456".into()),
            ..Default::default()
        };
        assert_eq!(rec.national_id(), Some("AB 123456"));

        rec.document_number = Some("ILLISIBLE".into());
        rec.extra_fields
            .insert("numero_cin".into(), "AB123456".into());
        assert_eq!(rec.national_id(), Some("AB123456"));
    }

    #[test]
    fn bank_account_from_statement_or_labelled_field() {
        let statement = DocumentRecord {
            document_type: DocumentType::BankStatement,
            document_number: Some("007 810 0012345678".into()),
            ..Default::default()
        };
        assert!(statement.bank_account().is_some());

        let mut payslip = DocumentRecord {
            document_type: DocumentType::Payslip,
            ..Default::default()
        };
        payslip.extra_fields.insert("rib".into(), "007810".into());
        assert_eq!(payslip.bank_account(), Some("007810"));
    }

    #[test]
    fn error_record_keeps_message() {
        let rec = DocumentRecord::error("connection refused");
        assert_eq!(rec.document_type, DocumentType::Error);
        assert_eq!(
            rec.extra_fields.get("error").map(String::as_str),
            Some("connection refused")
        );
    }
}
