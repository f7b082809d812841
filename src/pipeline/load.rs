//! Document loading: enumerate the PDF files of one case folder.
//!
//! The lowest-level I/O collaborator. A nonexistent folder or a listing
//! failure is *not* fatal here — the loader returns an empty list and an
//! error string for the pipeline error list, and the stages downstream
//! handle the empty set. Only the orchestrator treats a missing case folder
//! as fatal, before any stage runs.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// List all `*.pdf` files (case-insensitive extension) directly under
/// `folder`, sorted lexicographically.
///
/// Directory-listing order is platform-dependent; sorting keeps report
/// output and test fixtures reproducible. Subdirectories are not descended
/// into — one case folder is one flat set of scans.
///
/// Returns the paths plus an optional error string when the folder could
/// not be listed at all.
pub fn list_pdfs(folder: &Path) -> (Vec<PathBuf>, Option<String>) {
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(e) => {
            return (
                Vec::new(),
                Some(format!("failed to list folder '{}': {e}", folder.display())),
            );
        }
    };

    let mut pdfs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .map(|ext| ext.eq_ignore_ascii_case("pdf"))
                    .unwrap_or(false)
        })
        .collect();
    pdfs.sort();

    for path in &pdfs {
        debug!("found PDF: {}", path.display());
    }
    info!("{} PDF(s) found in {}", pdfs.len(), folder.display());

    (pdfs, None)
}
