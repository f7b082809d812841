//! Configuration types for document analysis.
//!
//! All pipeline behaviour is controlled through [`AnalysisConfig`], built
//! via its [`AnalysisConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share configs across worker tasks, log them, and diff two
//! runs to understand why their reports differ.
//!
//! Concordance tolerances (0.8 generic, 0.7 address) and the 180-day
//! temporal window are deliberately *not* configurable — they encode tuned
//! matching behaviour and live as constants in [`crate::concordance`].

use crate::error::AnalysisError;
use crate::progress::AnalysisProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one case-folder analysis.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use veridoc::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .dpi(200)
///     .concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–600. Default: 300.
    ///
    /// Identity documents carry small print (document numbers, MRZ lines);
    /// 300 DPI keeps those legible to the vision model. Lower it for large,
    /// clean statements where upload size matters more than pixel density.
    pub dpi: u32,

    /// Number of concurrent vision-capability calls. Default: 4.
    ///
    /// Extraction calls are network-bound and independent per image, so
    /// fanning out cuts wall-clock time; the merge back into the pipeline
    /// state is a single-threaded reduction either way. Lower this if the
    /// capability rate-limits you.
    pub concurrency: usize,

    /// Per-extraction-call timeout in seconds. Default: 60.
    ///
    /// A timeout surfaces as a per-document extraction failure, never a
    /// pipeline-wide abort.
    pub api_timeout_secs: u64,

    /// Per-PDF rasterisation timeout in seconds. Default: 120.
    ///
    /// Bounds pathological PDFs (thousands of pages, huge embedded images)
    /// the same way: the file is skipped with an error, the batch continues.
    pub render_timeout_secs: u64,

    /// Output directory for rendered page images. Default: `<folder>/pages`.
    ///
    /// Created if absent. Relative values are resolved against the case
    /// folder.
    pub image_output_dir: Option<PathBuf>,

    /// Custom extraction prompt. If None, uses the built-in default.
    pub extraction_prompt: Option<String>,

    /// Custom recovery prompt for low-quality scans. If None, uses the
    /// built-in default.
    pub recovery_prompt: Option<String>,

    /// Progress callback for stage and per-document events. Default: none.
    pub progress_callback: Option<Arc<dyn AnalysisProgressCallback>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            concurrency: 4,
            api_timeout_secs: 60,
            render_timeout_secs: 120,
            image_output_dir: None,
            extraction_prompt: None,
            recovery_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("dpi", &self.dpi)
            .field("concurrency", &self.concurrency)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("image_output_dir", &self.image_output_dir)
            .field("extraction_prompt", &self.extraction_prompt.as_ref().map(|_| "<custom>"))
            .field("recovery_prompt", &self.recovery_prompt.as_ref().map(|_| "<custom>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 600);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs.max(1);
        self
    }

    pub fn image_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.image_output_dir = Some(dir.into());
        self
    }

    pub fn extraction_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.extraction_prompt = Some(prompt.into());
        self
    }

    pub fn recovery_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.recovery_prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn AnalysisProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnalysisConfig, AnalysisError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(AnalysisError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(AnalysisError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = AnalysisConfig::default();
        assert_eq!(c.dpi, 300);
        assert_eq!(c.concurrency, 4);
        assert_eq!(c.api_timeout_secs, 60);
    }

    #[test]
    fn builder_clamps_out_of_range_values() {
        let c = AnalysisConfig::builder()
            .dpi(10_000)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 600);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn builder_sets_prompts() {
        let c = AnalysisConfig::builder()
            .extraction_prompt("read the card")
            .build()
            .unwrap();
        assert_eq!(c.extraction_prompt.as_deref(), Some("read the card"));
    }
}
