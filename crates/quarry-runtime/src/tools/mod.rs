//! Agent-facing tools
//!
//! Thin adapters that compose the registry, sources, transform pipeline and
//! chart renderer. They hold no state of their own; [`Toolbox`] bundles the
//! shared handles a caller injects.

mod chart;
mod fetch;

pub use chart::{chart, ChartArgs};
pub use fetch::{fetch, FetchArgs};

use crate::chart::{ChartArtifact, ChartRenderer, VegaLiteRenderer};
use crate::registry::SourceRegistry;
use quarry_core::{Result, TabularResult};
use std::sync::Arc;

/// Shared handles the tools operate on
#[derive(Clone)]
pub struct Toolbox {
    registry: Arc<SourceRegistry>,
    renderer: Arc<dyn ChartRenderer>,
}

impl Toolbox {
    pub fn new(registry: Arc<SourceRegistry>, renderer: Arc<dyn ChartRenderer>) -> Self {
        Self { registry, renderer }
    }

    /// Toolbox rendering charts as Vega-Lite
    pub fn with_vega_lite(registry: Arc<SourceRegistry>) -> Self {
        Self::new(registry, Arc::new(VegaLiteRenderer::new()))
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub async fn fetch(&self, args: &FetchArgs) -> Result<TabularResult> {
        fetch(&self.registry, args).await
    }

    pub async fn chart(&self, args: &ChartArgs) -> Result<ChartArtifact> {
        chart(&self.registry, self.renderer.as_ref(), args).await
    }
}
