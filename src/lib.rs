//! # veridoc
//!
//! Cross-validate scanned identity and financial documents using Vision
//! Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! A loan or KYC application arrives as a folder of scans: an identity
//! card, a utility bill, a payslip, a bank statement. Each document alone
//! says little — the fraud and data-entry signal lives in the *disagreements
//! between them*: a payslip naming someone else, two different addresses,
//! issue dates months apart. veridoc extracts structured fields from every
//! scan via a vision model and runs OCR-tolerant cross-document concordance
//! checks, producing a discrepancy list, a 0–100 confidence score, and
//! actionable recommendations.
//!
//! ## Pipeline Overview
//!
//! ```text
//! case folder
//!  │
//!  ├─ 1. Load      enumerate *.pdf files
//!  ├─ 2. Validate  reject unreadable/empty PDFs (pdfium)
//!  ├─ 3. Render    rasterise each page to PNG at 300 DPI (spawn_blocking)
//!  ├─ 4. Extract   concurrent vision-model calls, structured transcript
//!  │               parsing, quality scoring, one recovery pass for FAIBLE
//!  │               scans
//!  ├─ 5. Check     cross-document concordance: identity, identifiers,
//!  │               addresses, financial, temporal
//!  └─ 6. Report    plain structured data + text/JSON rendering
//! ```
//!
//! Every stage is total: a corrupt PDF, a failed capability call, or an
//! unparseable reply is recorded as a per-document error and the batch
//! keeps going. Only a nonexistent case folder aborts the run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use veridoc::{analyze, AnalysisConfig, OpenAiVisionProvider, VisionProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider: Arc<dyn VisionProvider> =
//!         Arc::new(OpenAiVisionProvider::from_env()?);
//!     let config = AnalysisConfig::default();
//!
//!     let state = analyze("applications/req-42", provider, &config).await?;
//!     let report = state.report.as_ref().expect("reporting stage ran");
//!     println!("{}", report.render_text());
//!
//!     let concordance = state.concordance.as_ref().unwrap();
//!     eprintln!(
//!         "concordant: {} (score {:.0}/100)",
//!         concordance.is_concordant, concordance.confidence_score
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `veridoc` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! veridoc = { version = "0.4", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod concordance;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod record;
pub mod report;
pub mod state;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, run_pipeline};
pub use concordance::{ConcordanceResult, FieldCoverage};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{AnalysisError, DocError};
pub use pipeline::extract::{ExtractionMode, ExtractionOutcome};
pub use pipeline::quality::{QualityAssessment, QualityTier};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback};
pub use provider::{EncodedImage, OpenAiVisionProvider, ProviderError, VisionProvider};
pub use record::{CaseBundle, Confidence, DocumentRecord, DocumentType, ImageQuality};
pub use report::CaseReport;
pub use state::{PipelineCounters, PipelineState, PipelineStatus, RunOutcome};
