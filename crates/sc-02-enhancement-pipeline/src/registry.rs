//! Filter registry.
//!
//! Filters are registered by explicit calls at start-up. The registry is
//! append-only and its order is the pipeline's execution order.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, RegistryError};
use crate::filters::{
    ClaheFilter, LaplacianVarianceFilter, RichardsonLucyFilter, UpscaleFilter, WhiteBalanceFilter,
};

/// Client-facing metadata for one filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDescriptor {
    /// Unique key used in client configuration maps
    pub name: String,
    /// Short human-readable label
    pub label: String,
    /// One-sentence explanation shown next to the toggle
    pub description: String,
}

impl FilterDescriptor {
    pub fn new(
        name: impl Into<String>,
        label: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            description: description.into(),
        }
    }
}

/// Derived state shared between filters of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunContext {
    /// Laplacian variance of the image, if a measurement filter ran
    pub sharpness: Option<f64>,
}

/// What a filter produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutput {
    /// A transformed image that replaces the current one
    Image(RgbImage),
    /// No image; the filter only updated the run context
    Measurement,
}

/// A named unit of image transformation or measurement.
pub trait Filter: Send + Sync {
    fn descriptor(&self) -> &FilterDescriptor;

    fn apply(&self, image: &RgbImage, ctx: &mut RunContext) -> Result<FilterOutput, FilterError>;

    fn name(&self) -> &str {
        &self.descriptor().name
    }
}

/// Ordered, append-only filter catalog.
#[derive(Default)]
pub struct FilterRegistry {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard filter set in its canonical order.
    ///
    /// The sharpness measurement precedes deconvolution so the latter can
    /// adapt its iteration count.
    pub fn standard() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        registry.register(WhiteBalanceFilter::new())?;
        registry.register(LaplacianVarianceFilter::new())?;
        registry.register(RichardsonLucyFilter::new())?;
        registry.register(ClaheFilter::new())?;
        registry.register(UpscaleFilter::new())?;
        Ok(registry)
    }

    /// Append a filter. Names must be unique.
    pub fn register<F: Filter + 'static>(&mut self, filter: F) -> Result<(), RegistryError> {
        if self.get(filter.name()).is_some() {
            return Err(RegistryError::DuplicateFilter(filter.name().to_string()));
        }
        self.filters.push(Box::new(filter));
        Ok(())
    }

    /// Descriptors in registration order, for client discovery.
    pub fn list_available(&self) -> Vec<FilterDescriptor> {
        self.filters.iter().map(|f| f.descriptor().clone()).collect()
    }

    /// Filters in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Filter> {
        self.filters.iter().map(|f| f.as_ref())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Filter> {
        self.iter().find(|f| f.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}
