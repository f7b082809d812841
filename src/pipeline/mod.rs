//! Pipeline stages for document analysis.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different rendering backend) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! load ──▶ validate ──▶ render ──▶ encode ──▶ extract
//! (*.pdf)   (pdfium)    (pdfium)   (base64)   (vision capability)
//! ```
//!
//! 1. [`load`]       — enumerate the PDF files in the case folder
//! 2. [`validate`]   — reject unreadable or empty PDFs; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`render`]     — rasterise every page of every valid PDF to PNG
//! 4. [`encode`]     — read a page image and base64-wrap it for the
//!    capability request body
//! 5. [`transcript`] — deterministic line-scanner for the structured
//!    transcript the capability returns
//! 6. [`quality`]    — score the extraction 0–100 and map to a tier
//! 7. [`extract`]    — drive the capability call with the recovery
//!    protocol; the only stage with network I/O
//!
//! The orchestration that threads [`crate::state::PipelineState`] through
//! these stages lives in [`crate::analyze`].

pub mod encode;
pub mod extract;
pub mod load;
pub mod quality;
pub mod render;
pub mod transcript;
pub mod validate;

use pdfium_render::prelude::*;

/// Bind to the pdfium library.
///
/// Honours `PDFIUM_LIB_PATH` when set, otherwise falls back to the system
/// library search. Returns an error string rather than panicking so the
/// validation stage can reject the batch gracefully when no library is
/// available.
pub(crate) fn bind_pdfium() -> Result<Pdfium, String> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_system_library(),
    };
    bindings
        .map(Pdfium::new)
        .map_err(|e| format!("failed to bind pdfium library: {e:?}"))
}
