//! # SC-02 Enhancement Pipeline
//!
//! Runs an ordered subset of registered image filters against one image.
//!
//! ## Architecture
//!
//! - `registry`: the `Filter` trait, `FilterDescriptor`, and the append-only
//!   `FilterRegistry` whose registration order is the execution order
//! - `pipeline`: `EnhancementPipeline::run` (decode → filters → encode)
//! - `codec`: JPEG/PNG decode and encode keyed by MIME type
//! - `filters`: the standard filter set
//!
//! ## Invariants
//!
//! - Filters run in registration order, never in configuration-map order.
//! - A failing filter is recorded in the error map and skipped; the run
//!   continues with the image as it was before that filter.
//! - Per-run derived state (e.g. sharpness) lives in a `RunContext` owned by
//!   the run, so concurrent runs never observe each other.
//! - Media errors (unsupported type, undecodable input, encoder failure)
//!   abort the whole run.
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use sc_02_enhancement_pipeline::{EnhancementPipeline, FilterConfig, FilterRegistry};
//!
//! let pipeline = EnhancementPipeline::new(Arc::new(FilterRegistry::standard()?));
//! let config = FilterConfig::from([("white_balance".to_string(), true)]);
//! let outcome = pipeline.run(&jpeg_bytes, "image/jpeg", &config)?;
//! println!("{:?} {:?}", outcome.durations, outcome.errors);
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod codec;
pub mod error;
pub mod filters;
pub mod pipeline;
pub mod registry;

pub use codec::{decode, encode, MediaType, JPEG_QUALITY};
pub use error::{FilterError, MediaError, RegistryError};
pub use filters::{
    ClaheFilter, DeconvolutionParams, LaplacianVarianceFilter, RichardsonLucyFilter,
    UpscaleFilter, WhiteBalanceFilter,
};
pub use pipeline::{EnhancementPipeline, FilterConfig, PipelineOutcome};
pub use registry::{Filter, FilterDescriptor, FilterOutput, FilterRegistry, RunContext};
