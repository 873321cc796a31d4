//! Plot rendering for the plot function
//!
//! Renders a faceted scatter plot with per-facet regression lines to PNG
//! bytes, one facet per dataset.

pub mod glyphs;
pub mod mock;
pub mod renderer;

pub use mock::MockPlotRenderer;
pub use renderer::FacetPlotter;

use crate::dataset::Dataset;
use crate::Result;
use async_trait::async_trait;

#[async_trait]
pub trait PlotRenderer: Send + Sync {
    /// Render `datasets` and return the encoded PNG.
    async fn render(&self, datasets: &[Dataset]) -> Result<Vec<u8>>;
}
