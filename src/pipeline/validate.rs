//! PDF validation: partition candidates into readable and rejected.
//!
//! A PDF is valid iff pdfium can open it and it has at least one page.
//! A corrupt file is rejected, never fatal — processing continues with the
//! remaining candidates, and an all-rejected batch flows through the rest
//! of the pipeline as an empty set.
//!
//! pdfium wraps a C++ library with thread-local state, so the open calls
//! run inside `spawn_blocking` (same treatment as rasterisation).

use crate::error::DocError;
use crate::pipeline::bind_pdfium;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Validation verdict for one batch of candidate PDFs.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    /// Candidates pdfium opened with a page count > 0.
    pub valid: Vec<PathBuf>,
    /// Candidates rejected, with the reason.
    pub rejected: Vec<(PathBuf, DocError)>,
}

/// Validate candidates on the current thread (blocking).
///
/// When the pdfium library itself cannot be bound, every candidate is
/// rejected with the binding error — the caller records it once and the
/// downstream stages see an empty valid set.
pub fn partition_valid_blocking(candidates: &[PathBuf]) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    if candidates.is_empty() {
        return outcome;
    }

    let pdfium = match bind_pdfium() {
        Ok(p) => p,
        Err(detail) => {
            warn!("{detail}");
            for path in candidates {
                outcome
                    .rejected
                    .push((path.clone(), rejected(path, detail.clone())));
            }
            return outcome;
        }
    };

    for path in candidates {
        match pdfium.load_pdf_from_file(path, None) {
            Ok(document) => {
                let pages = document.pages().len();
                if pages > 0 {
                    debug!("valid PDF: {} ({} pages)", path.display(), pages);
                    outcome.valid.push(path.clone());
                } else {
                    warn!("empty PDF: {}", path.display());
                    outcome
                        .rejected
                        .push((path.clone(), rejected(path, "document has no pages".into())));
                }
            }
            Err(e) => {
                warn!("invalid PDF: {} — {e:?}", path.display());
                outcome
                    .rejected
                    .push((path.clone(), rejected(path, format!("{e:?}"))));
            }
        }
    }

    outcome
}

/// Validate candidates off the async executor.
pub async fn partition_valid(candidates: Vec<PathBuf>) -> ValidationOutcome {
    match tokio::task::spawn_blocking(move || partition_valid_blocking(&candidates)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!("validation task panicked: {e}");
            ValidationOutcome::default()
        }
    }
}

fn rejected(path: &Path, detail: String) -> DocError {
    DocError::Rejected {
        name: display_name(path),
        detail,
    }
}

/// Basename for error messages and reports.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_uses_basename() {
        assert_eq!(
            display_name(Path::new("/cases/req-42/cin.pdf")),
            "cin.pdf".to_string()
        );
    }

    // Validation against real PDFs needs a pdfium library; covered by the
    // env-gated integration tests.
}
