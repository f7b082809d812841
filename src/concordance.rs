//! Cross-document concordance analysis.
//!
//! Given the extracted records of one applicant's folder, decide whether
//! the documents agree with each other and produce a scored, actionable
//! verdict. This is where fraud and data-entry inconsistency surface: a
//! payslip naming a different employee than the identity card, two
//! addresses that cannot be the same household, issue dates months apart.
//!
//! ## Matching model
//!
//! OCR output is noisy, so raw equality is useless. Text fields are
//! normalised (lowercase, accents folded, punctuation stripped, whitespace
//! collapsed) and then compared either exactly or by Jaccard similarity of
//! their word sets. Identifier fields are compared after stripping spaces,
//! hyphens and periods. The tolerances (0.8 generic, 0.7 for addresses,
//! which carry more incidental formatting noise) are tuned constants —
//! changing them changes which real-world bundles pass.
//!
//! Missing and sentinel-marked values are "no signal", never a mismatch.
//!
//! ## Verdict
//!
//! `is_concordant` is true iff the discrepancy list is empty. The
//! confidence score is informational only and never gates the verdict.

use crate::record::{usable, CaseBundle, DocumentRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Jaccard tolerance for generic text fields (employers, …).
pub const TEXT_TOLERANCE: f64 = 0.8;
/// Jaccard tolerance for addresses.
pub const ADDRESS_TOLERANCE: f64 = 0.7;
/// Maximum acceptable spread between document issue dates.
pub const ISSUE_DATE_WINDOW_DAYS: i64 = 180;

/// Date formats tried in priority order by the temporal check.
const DATE_FORMATS: &[&str] = &[
    "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y",
    "%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d",
    "%d/%m/%y", "%d-%m-%y", "%d.%m.%y",
];

/// Per-field coverage counts over the bundle, used for scoring and
/// reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCoverage {
    pub total_documents: usize,
    pub with_full_name: usize,
    pub with_first_name: usize,
    pub with_birth_date: usize,
    pub with_address: usize,
    pub with_national_id: usize,
    pub with_phone: usize,
    pub with_bank_account: usize,
    /// Count per document-type label.
    pub document_types: BTreeMap<String, usize>,
}

/// Output of one full concordance analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConcordanceResult {
    /// True iff `discrepancies` is empty.
    pub is_concordant: bool,
    /// One human-readable line per detected inconsistency, naming the
    /// conflicting values and their source documents.
    pub discrepancies: Vec<String>,
    /// 0–100 heuristic combining discrepancy count and field coverage.
    /// Informational; never gates `is_concordant`.
    pub confidence_score: f32,
    /// Remediation suggestions, in rule-declaration order.
    pub recommendations: Vec<String>,
    pub coverage: FieldCoverage,
}

/// Run the full analysis over one case bundle.
///
/// Bundles with fewer than two records are trivially concordant — there is
/// nothing to compare — but coverage, score and recommendations are still
/// produced.
pub fn analyze(bundle: &CaseBundle) -> ConcordanceResult {
    let coverage = field_coverage(bundle);

    let discrepancies = if bundle.len() < 2 {
        debug!("fewer than 2 records, trivially concordant");
        Vec::new()
    } else {
        let mut problems = Vec::new();
        problems.extend(check_identity(bundle));
        problems.extend(check_official_ids(bundle));
        problems.extend(check_residence_contact(bundle));
        problems.extend(check_financial(bundle));
        problems.extend(check_temporal(bundle));
        problems.extend(check_cross_type(bundle));
        problems
    };

    let confidence_score = confidence(discrepancies.len(), &coverage);
    let is_concordant = discrepancies.is_empty();
    let recommendations = recommend(&coverage, is_concordant, confidence_score);

    ConcordanceResult {
        is_concordant,
        discrepancies,
        confidence_score,
        recommendations,
        coverage,
    }
}

// ── Normalisation ────────────────────────────────────────────────────────

/// Normalise free text for OCR-tolerant comparison: lowercase, fold
/// accents to their base letter, replace punctuation with spaces, collapse
/// whitespace runs, trim.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        let c = fold_accent(c);
        if c.is_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalise identifiers (ID numbers, phone numbers, accounts) by removing
/// spaces, hyphens and periods — the characters that vary across
/// formatting conventions.
pub fn normalize_number(number: &str) -> String {
    number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '.')
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'â' | 'ä' | 'á' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'î' | 'ï' | 'í' | 'ì' => 'i',
        'ô' | 'ö' | 'ó' | 'ò' | 'õ' => 'o',
        'û' | 'ü' | 'ú' | 'ù' => 'u',
        'ÿ' | 'ý' => 'y',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// OCR-tolerant comparison: equal after normalisation, or Jaccard word-set
/// similarity ≥ `tolerance`. Empty values never match anything.
pub fn fuzzy_match(a: &str, b: &str, tolerance: f64) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }

    let norm_a = normalize_text(a);
    let norm_b = normalize_text(b);
    if norm_a == norm_b {
        return true;
    }

    let words_a: std::collections::BTreeSet<&str> = norm_a.split_whitespace().collect();
    let words_b: std::collections::BTreeSet<&str> = norm_b.split_whitespace().collect();
    if words_a.is_empty() || words_b.is_empty() {
        return false;
    }

    let intersection = words_a.intersection(&words_b).count();
    let union = words_a.union(&words_b).count();
    (intersection as f64 / union as f64) >= tolerance
}

// ── Value collection ─────────────────────────────────────────────────────

/// `(source basename, value)` pairs for one field across the bundle,
/// sentinel-marked and empty values excluded.
fn collect<'a>(
    bundle: &'a CaseBundle,
    accessor: impl Fn(&'a DocumentRecord) -> Option<&'a str>,
) -> Vec<(String, &'a str)> {
    bundle
        .iter()
        .filter_map(|(path, record)| accessor(record).map(|value| (basename(path), value)))
        .collect()
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// `"v1 (src1), v2 (src2)"` — every collected value with its source.
fn listing(values: &[(String, &str)]) -> String {
    values
        .iter()
        .map(|(source, value)| format!("{value} ({source})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Number of distinct groups after normalising every value.
fn distinct_groups(values: &[(String, &str)], normalizer: impl Fn(&str) -> String) -> usize {
    let groups: std::collections::BTreeSet<String> = values
        .iter()
        .map(|(_, value)| normalizer(value))
        .collect();
    groups.len()
}

/// Emit one discrepancy line when ≥2 values exist and they do not all
/// normalise to the same group.
fn grouped_check(
    values: &[(String, &str)],
    normalizer: impl Fn(&str) -> String,
    label: &str,
) -> Option<String> {
    if values.len() >= 2 && distinct_groups(values, normalizer) > 1 {
        Some(format!("{label}: {}", listing(values)))
    } else {
        None
    }
}

/// Greedy clustering by fuzzy equality: each value joins the first cluster
/// whose representative it matches at `tolerance`, else starts a new one.
fn cluster_fuzzy<'a>(
    values: &[(String, &'a str)],
    tolerance: f64,
) -> Vec<Vec<(String, &'a str)>> {
    let mut clusters: Vec<Vec<(String, &'a str)>> = Vec::new();
    for (source, value) in values {
        let value: &'a str = value;
        match clusters
            .iter_mut()
            .find(|cluster| fuzzy_match(cluster[0].1, value, tolerance))
        {
            Some(cluster) => cluster.push((source.clone(), value)),
            None => clusters.push(vec![(source.clone(), value)]),
        }
    }
    clusters
}

/// One representative (the first member) per cluster, with its source.
fn cluster_listing(clusters: &[Vec<(String, &str)>]) -> String {
    clusters
        .iter()
        .map(|cluster| format!("{} ({})", cluster[0].1, cluster[0].0))
        .collect::<Vec<_>>()
        .join(" / ")
}

// ── Checks (fixed order) ─────────────────────────────────────────────────

/// 1. Personal identity: full names, first names, birth dates.
fn check_identity(bundle: &CaseBundle) -> Vec<String> {
    let mut problems = Vec::new();

    let names = collect(bundle, |r| usable(r.full_name.as_deref()));
    if let Some(p) = grouped_check(&names, normalize_text, "Name mismatch") {
        problems.push(p);
    }

    let first_names = collect(bundle, |r| usable(r.first_name.as_deref()));
    if let Some(p) = grouped_check(&first_names, normalize_text, "First name mismatch") {
        problems.push(p);
    }

    let birth_dates = collect(bundle, |r| usable(r.birth_date.as_deref()));
    if let Some(p) = grouped_check(&birth_dates, normalize_number, "Birth date mismatch") {
        problems.push(p);
    }

    problems
}

/// 2. Official identifiers: national-ID and social-security numbers.
fn check_official_ids(bundle: &CaseBundle) -> Vec<String> {
    let mut problems = Vec::new();

    let national_ids = collect(bundle, |r| r.national_id());
    if let Some(p) = grouped_check(&national_ids, normalize_number, "National ID number mismatch")
    {
        problems.push(p);
    }

    let social = collect(bundle, |r| r.social_security());
    if let Some(p) = grouped_check(&social, normalize_number, "Social security number mismatch") {
        problems.push(p);
    }

    problems
}

/// 3. Domicile and contact: addresses (fuzzy clusters), phone numbers.
fn check_residence_contact(bundle: &CaseBundle) -> Vec<String> {
    let mut problems = Vec::new();

    let addresses = collect(bundle, |r| usable(r.address.as_deref()));
    if addresses.len() >= 2 {
        let clusters = cluster_fuzzy(&addresses, ADDRESS_TOLERANCE);
        if clusters.len() > 1 {
            problems.push(format!(
                "Address mismatch across {} distinct groups: {}",
                clusters.len(),
                cluster_listing(&clusters)
            ));
        }
    }

    let phones = collect(bundle, |r| r.phone());
    if let Some(p) = grouped_check(&phones, normalize_number, "Phone number mismatch") {
        problems.push(p);
    }

    problems
}

/// 4. Financial coherence: bank accounts, employers.
///
/// Salary-vs-transfer cross-checking is a declared extension point: the
/// fields are collected, but no comparison rule is defined for them yet.
fn check_financial(bundle: &CaseBundle) -> Vec<String> {
    let mut problems = Vec::new();

    let accounts = collect(bundle, |r| r.bank_account());
    if let Some(p) = grouped_check(&accounts, normalize_number, "Bank account mismatch") {
        problems.push(p);
    }

    let employers = collect(bundle, |r| r.employer());
    if employers.len() >= 2 {
        let clusters = cluster_fuzzy(&employers, TEXT_TOLERANCE);
        if clusters.len() > 1 {
            problems.push(format!("Employer mismatch: {}", listing(&employers)));
        }
    }

    let _salaries = collect(bundle, |r| {
        usable(r.extra_fields.get("salaire_net").map(String::as_str))
    });
    let _transfers = collect(bundle, |r| {
        usable(r.extra_fields.get("montant_virement").map(String::as_str))
    });
    // Extension point: no salary/transfer comparison rule is defined.

    problems
}

/// 5. Temporal coherence: issue-date spread across the bundle.
///
/// Dates that match none of the known formats are ignored for this check —
/// an unparseable date is an OCR artefact, not a fraud signal.
fn check_temporal(bundle: &CaseBundle) -> Vec<String> {
    let issue_dates = collect(bundle, |r| usable(r.issue_date.as_deref()));
    if issue_dates.len() < 2 {
        return Vec::new();
    }

    let parsed: Vec<NaiveDate> = issue_dates
        .iter()
        .filter_map(|(_, value)| parse_date_flexible(value))
        .collect();
    if parsed.len() < 2 {
        return Vec::new();
    }

    let min = parsed.iter().min().copied().unwrap_or_default();
    let max = parsed.iter().max().copied().unwrap_or_default();
    let span_days = (max - min).num_days();

    if span_days > ISSUE_DATE_WINDOW_DAYS {
        vec![format!(
            "Issue dates spread over {span_days} days (more than {ISSUE_DATE_WINDOW_DAYS} days apart)"
        )]
    } else {
        Vec::new()
    }
}

/// 6. Cross-type checks.
///
/// Declared extension point: identity-card + utility-bill address
/// cross-validation and payslip + bank-statement amount matching are
/// recognised pairings, but no comparison rule is defined for them. When
/// the relevant document-type pair is absent this contributes nothing, and
/// it never fabricates a discrepancy.
fn check_cross_type(bundle: &CaseBundle) -> Vec<String> {
    let _types: std::collections::BTreeSet<_> =
        bundle.values().map(|r| r.document_type).collect();
    Vec::new()
}

/// Parse a date using the prioritized format list; `None` if none match.
///
/// A `%Y` match that yields a year below 100 is rejected so that two-digit
/// years fall through to the `%y` variants (which pivot them into the
/// 1969–2068 window) instead of landing in the first century.
pub fn parse_date_flexible(value: &str) -> Option<NaiveDate> {
    use chrono::Datelike;

    let trimmed = value.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            if format.contains("%Y") && date.year() < 100 {
                continue;
            }
            return Some(date);
        }
    }
    None
}

// ── Scoring and recommendations ──────────────────────────────────────────

fn field_coverage(bundle: &CaseBundle) -> FieldCoverage {
    let mut coverage = FieldCoverage {
        total_documents: bundle.len(),
        ..Default::default()
    };

    for record in bundle.values() {
        if usable(record.full_name.as_deref()).is_some() {
            coverage.with_full_name += 1;
        }
        if usable(record.first_name.as_deref()).is_some() {
            coverage.with_first_name += 1;
        }
        if usable(record.birth_date.as_deref()).is_some() {
            coverage.with_birth_date += 1;
        }
        if usable(record.address.as_deref()).is_some() {
            coverage.with_address += 1;
        }
        if record.national_id().is_some() {
            coverage.with_national_id += 1;
        }
        if record.phone().is_some() {
            coverage.with_phone += 1;
        }
        if record.bank_account().is_some() {
            coverage.with_bank_account += 1;
        }
        *coverage
            .document_types
            .entry(record.document_type.label().to_string())
            .or_insert(0) += 1;
    }

    coverage
}

/// 100, minus 15 per discrepancy, plus completeness bonuses, clamped.
fn confidence(discrepancy_count: usize, coverage: &FieldCoverage) -> f32 {
    let mut score = 100.0_f32;
    score -= discrepancy_count as f32 * 15.0;
    if coverage.with_full_name >= 2 {
        score += 5.0;
    }
    if coverage.with_national_id >= 1 {
        score += 10.0;
    }
    if coverage.with_address >= 2 {
        score += 5.0;
    }
    score.clamp(0.0, 100.0)
}

/// Deterministic rule list; any subset may fire, in declaration order.
fn recommend(coverage: &FieldCoverage, is_concordant: bool, score: f32) -> Vec<String> {
    let mut recommendations = Vec::new();

    if coverage.with_national_id == 0 {
        recommendations.push(
            "No national ID number detected - check extraction quality on the identity document"
                .to_string(),
        );
    }
    if coverage.with_full_name < 2 {
        recommendations
            .push("Few documents carry the holder's name - extraction needs improvement".to_string());
    }
    if !is_concordant {
        recommendations.push("Discrepancies detected - manual verification recommended".to_string());
    }
    if score < 50.0 {
        recommendations.push("Low confidence score - revalidate the documents".to_string());
    }

    recommendations
}
