//! Pipeline orchestration: the stage state machine.
//!
//! One analysis run walks a strictly sequential chain of stages, each a
//! total function from [`PipelineState`] to [`PipelineState`]:
//!
//! ```text
//! INITIALIZED → LOADING → VALIDATING → RASTERIZING → EXTRACTING
//!             → CONCORDANCE_CHECK → REPORTING → DONE
//! ```
//!
//! No stage is skipped, and no stage aborts the run: an internal failure
//! records an error string and hands an empty result to the next stage.
//! The single exception is a malformed initial input — a case folder that
//! does not exist — which terminates immediately with status `Error`
//! before any stage executes.
//!
//! Each invocation starts from a fresh state, so running the pipeline
//! twice on the same folder is idempotent (rendered page images are
//! overwritten, not accumulated).

use crate::concordance;
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::pipeline::{extract, load, render, validate};
use crate::provider::VisionProvider;
use crate::report::CaseReport;
use crate::state::{PipelineState, PipelineStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Analyse one case folder end to end.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(PipelineState)` with status `Done` — even when some documents were
/// rejected or failed extraction (check `state.errors` and
/// `state.outcome()`).
///
/// # Errors
/// Returns `Err(AnalysisError)` only when the case folder itself is missing
/// or not a directory; every other failure is absorbed into the state.
pub async fn analyze(
    folder: impl AsRef<Path>,
    provider: Arc<dyn VisionProvider>,
    config: &AnalysisConfig,
) -> Result<PipelineState, AnalysisError> {
    let folder = folder.as_ref();

    if !folder.exists() {
        return Err(AnalysisError::FolderNotFound {
            path: folder.to_path_buf(),
        });
    }
    if !folder.is_dir() {
        return Err(AnalysisError::NotADirectory {
            path: folder.to_path_buf(),
        });
    }

    Ok(run_pipeline(PipelineState::new(folder), provider, config).await)
}

/// Drive a prepared state through every stage. Total: always returns the
/// final state, with status `Error` only when the root folder is invalid.
pub async fn run_pipeline(
    mut state: PipelineState,
    provider: Arc<dyn VisionProvider>,
    config: &AnalysisConfig,
) -> PipelineState {
    let start = Instant::now();
    info!("analysing case folder: {}", state.folder.display());

    if !state.folder.is_dir() {
        state.record_error(format!(
            "case folder does not exist: {}",
            state.folder.display()
        ));
        state.status = PipelineStatus::Error;
        return state;
    }

    let state = load_stage(state, config).await;
    let state = validate_stage(state, config).await;
    let state = render_stage(state, config).await;
    let state = extract_stage(state, &provider, config).await;
    let mut state = concordance_stage(state, config);

    // The report snapshots the state, so the duration must be known first.
    state.duration_ms = start.elapsed().as_millis() as u64;
    let mut state = report_stage(state, config);

    state.status = PipelineStatus::Done;
    info!(
        "analysis complete in {}ms: {} document(s), {} error(s)",
        state.duration_ms,
        state.counters.documents_analyzed,
        state.errors.len()
    );
    state
}

fn enter(state: &mut PipelineState, status: PipelineStatus, config: &AnalysisConfig) {
    state.status = status;
    info!("stage: {}", status.label());
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_change(status);
    }
}

// ── Stages ───────────────────────────────────────────────────────────────

async fn load_stage(mut state: PipelineState, config: &AnalysisConfig) -> PipelineState {
    enter(&mut state, PipelineStatus::Loading, config);

    let (pdfs, error) = load::list_pdfs(&state.folder);
    if let Some(err) = error {
        state.record_error(err);
    }
    if pdfs.is_empty() {
        state.record_error("no PDF documents found in the case folder");
    }
    state.counters.pdfs_found = pdfs.len();
    state.pdf_paths = pdfs;
    state
}

async fn validate_stage(mut state: PipelineState, config: &AnalysisConfig) -> PipelineState {
    enter(&mut state, PipelineStatus::Validating, config);

    let outcome = validate::partition_valid(std::mem::take(&mut state.pdf_paths)).await;
    state.pdf_paths = outcome.valid;
    for (path, err) in outcome.rejected {
        state.record_error(&err);
        state.rejected_pdfs.push(path);
    }
    state.counters.pdfs_rejected = state.rejected_pdfs.len();
    info!(
        "{} valid PDF(s), {} rejected",
        state.pdf_paths.len(),
        state.rejected_pdfs.len()
    );
    state
}

async fn render_stage(mut state: PipelineState, config: &AnalysisConfig) -> PipelineState {
    enter(&mut state, PipelineStatus::Rasterizing, config);

    let out_dir = match &config.image_output_dir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => state.folder.join(dir),
        None => state.folder.join("pages"),
    };

    let outcome = render::render_documents(
        &state.pdf_paths,
        &out_dir,
        config.dpi,
        config.render_timeout_secs,
    )
    .await;
    for err in outcome.errors {
        state.record_error(err);
    }
    state.counters.images_rendered = outcome.images.len();
    state.image_paths = outcome.images;
    state
}

async fn extract_stage(
    mut state: PipelineState,
    provider: &Arc<dyn VisionProvider>,
    config: &AnalysisConfig,
) -> PipelineState {
    enter(&mut state, PipelineStatus::Extracting, config);

    if state.image_paths.is_empty() {
        warn!("no page images to extract from");
        return state;
    }

    let (extractions, errors) = extract::extract_all(provider, &state.image_paths, config).await;
    for err in errors {
        state.record_error(err);
    }
    state.counters.documents_analyzed = extractions.len();
    state.extractions = extractions;
    state
}

fn concordance_stage(mut state: PipelineState, config: &AnalysisConfig) -> PipelineState {
    enter(&mut state, PipelineStatus::ConcordanceCheck, config);

    let bundle = state.bundle();
    let result = concordance::analyze(&bundle);
    info!(
        "concordance: {} ({} problem(s), score {:.1})",
        result.is_concordant,
        result.discrepancies.len(),
        result.confidence_score
    );
    state.concordance = Some(result);
    state
}

fn report_stage(mut state: PipelineState, config: &AnalysisConfig) -> PipelineState {
    enter(&mut state, PipelineStatus::Reporting, config);
    state.report = Some(CaseReport::from_state(&state));
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{EncodedImage, ProviderError};
    use async_trait::async_trait;

    struct NoProvider;

    #[async_trait]
    impl VisionProvider for NoProvider {
        async fn extract(
            &self,
            _image: &EncodedImage,
            _prompt: &str,
        ) -> Result<String, ProviderError> {
            Err(ProviderError::Unavailable("not under test".into()))
        }
    }

    #[tokio::test]
    async fn missing_folder_is_fatal() {
        let provider: Arc<dyn VisionProvider> = Arc::new(NoProvider);
        let result = analyze("/no/such/case", provider, &AnalysisConfig::default()).await;
        assert!(matches!(result, Err(AnalysisError::FolderNotFound { .. })));
    }

    #[tokio::test]
    async fn run_pipeline_flags_missing_folder_as_error_state() {
        let provider: Arc<dyn VisionProvider> = Arc::new(NoProvider);
        let state = run_pipeline(
            PipelineState::new("/no/such/case"),
            provider,
            &AnalysisConfig::default(),
        )
        .await;
        assert_eq!(state.status, PipelineStatus::Error);
        assert_eq!(state.errors.len(), 1);
        assert!(state.concordance.is_none());
    }

    #[tokio::test]
    async fn empty_folder_flows_through_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let provider: Arc<dyn VisionProvider> = Arc::new(NoProvider);
        let state = analyze(dir.path(), provider, &AnalysisConfig::default())
            .await
            .unwrap();

        assert_eq!(state.status, PipelineStatus::Done);
        assert_eq!(state.counters.pdfs_found, 0);
        // Concordance still ran: empty bundle is trivially concordant.
        let concordance = state.concordance.as_ref().unwrap();
        assert!(concordance.is_concordant);
        // The report was still built.
        assert!(state.report.is_some());
        // "no PDF documents" is recorded as a warning, not a failure.
        assert!(state.errors.iter().any(|e| e.contains("no PDF")));
        assert_eq!(state.outcome(), crate::state::RunOutcome::Empty);
    }

    #[tokio::test]
    async fn reruns_start_from_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let provider: Arc<dyn VisionProvider> = Arc::new(NoProvider);
        let config = AnalysisConfig::default();

        let first = analyze(dir.path(), Arc::clone(&provider), &config)
            .await
            .unwrap();
        let second = analyze(dir.path(), provider, &config).await.unwrap();

        // Errors do not accumulate across runs.
        assert_eq!(first.errors.len(), second.errors.len());
        assert_eq!(first.counters, second.counters);
    }
}
