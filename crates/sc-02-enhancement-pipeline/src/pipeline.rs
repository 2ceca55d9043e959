//! Pipeline execution.
//!
//! One run decodes the upload, applies every enabled filter in registry
//! order, and re-encodes to the original media type. Filter failures
//! (including panics) are isolated to the filter that raised them.

use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use tracing::{debug, warn};

use crate::codec::{decode, encode, MediaType};
use crate::error::{FilterError, MediaError};
use crate::registry::{Filter, FilterOutput, FilterRegistry, RunContext};

/// Client configuration: filter name → enabled.
pub type FilterConfig = HashMap<String, bool>;

/// Result of one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    /// Encoded output in `media_type`
    pub encoded: Vec<u8>,
    pub media_type: MediaType,
    /// Elapsed seconds per transform filter that produced an image
    pub durations: BTreeMap<String, f64>,
    /// Error message per filter that failed
    pub errors: BTreeMap<String, String>,
    pub width: u32,
    pub height: u32,
}

/// Runs enabled filters from a shared registry.
#[derive(Clone)]
pub struct EnhancementPipeline {
    registry: Arc<FilterRegistry>,
}

impl EnhancementPipeline {
    pub fn new(registry: Arc<FilterRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<FilterRegistry> {
        &self.registry
    }

    /// Run the pipeline once.
    ///
    /// Blocking and CPU-bound; call from a blocking context.
    pub fn run(
        &self,
        bytes: &[u8],
        mime_type: &str,
        config: &FilterConfig,
    ) -> Result<PipelineOutcome, MediaError> {
        let media_type = MediaType::from_mime(mime_type)?;
        let mut image = decode(bytes, media_type)?;

        for name in config.keys().filter(|n| !self.registry.contains(n)) {
            debug!(filter = %name, "Ignoring unknown filter in configuration");
        }

        let mut ctx = RunContext::default();
        let mut durations = BTreeMap::new();
        let mut errors = BTreeMap::new();

        for filter in self.registry.iter() {
            if !config.get(filter.name()).copied().unwrap_or(false) {
                continue;
            }

            let started = Instant::now();
            match apply_isolated(filter, &image, &ctx) {
                Ok((FilterOutput::Image(next), next_ctx)) => {
                    let elapsed = started.elapsed();
                    debug!(
                        filter = filter.name(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Filter applied"
                    );
                    durations.insert(filter.name().to_string(), elapsed.as_secs_f64());
                    image = next;
                    ctx = next_ctx;
                }
                Ok((FilterOutput::Measurement, next_ctx)) => {
                    ctx = next_ctx;
                }
                Err(e) => {
                    warn!(filter = filter.name(), error = %e, "Filter failed; skipping");
                    errors.insert(filter.name().to_string(), e.to_string());
                }
            }
        }

        let encoded = encode(&image, media_type)?;
        Ok(PipelineOutcome {
            encoded,
            media_type,
            durations,
            errors,
            width: image.width(),
            height: image.height(),
        })
    }
}

/// Apply one filter against a scratch copy of the context.
///
/// The context is only committed by the caller on success, so a filter that
/// fails halfway leaves no partial state behind.
fn apply_isolated(
    filter: &dyn Filter,
    image: &RgbImage,
    ctx: &RunContext,
) -> Result<(FilterOutput, RunContext), FilterError> {
    let mut scratch = ctx.clone();
    let result = panic::catch_unwind(AssertUnwindSafe(|| filter.apply(image, &mut scratch)));
    match result {
        Ok(Ok(output)) => Ok((output, scratch)),
        Ok(Err(e)) => Err(e),
        Err(payload) => Err(FilterError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
