//! Plot function: render the quartet, keep a local copy, store it in the bucket.

use crate::assets::AssetStore;
use crate::dataset::{anscombe, Dataset};
use crate::models::{validate_file_name, PlotConfig, PlotOutput};
use crate::plot::PlotRenderer;
use crate::Result;
use std::fs;
use std::path::PathBuf;
use tokio_retry::{strategy::FixedInterval, Retry};
use tracing::{info, warn};

pub const PNG_CONTENT_TYPE: &str = "image/png";

const UPLOAD_ATTEMPTS: usize = 3;
const UPLOAD_RETRY_INTERVAL_MS: u64 = 1000;

/// Injectable service bundle used to construct [`PlotHandler`].
pub struct PlotServices {
    pub renderer: Box<dyn PlotRenderer>,
    pub store: Box<dyn AssetStore>,
}

pub struct PlotHandler {
    renderer: Box<dyn PlotRenderer>,
    store: Box<dyn AssetStore>,
    datasets: Vec<Dataset>,
    file_name: String,
    output_dir: PathBuf,
    retry_interval_ms: u64,
}

impl PlotHandler {
    pub fn with_services(services: PlotServices, config: &PlotConfig) -> Self {
        Self {
            renderer: services.renderer,
            store: services.store,
            datasets: anscombe(),
            file_name: config.file_name.clone(),
            output_dir: config.output_dir.clone(),
            retry_interval_ms: UPLOAD_RETRY_INTERVAL_MS,
        }
    }

    pub fn with_retry_interval_ms(mut self, interval_ms: u64) -> Self {
        self.retry_interval_ms = interval_ms;
        self
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Handle one invocation. The event carries no input the plot depends on.
    pub async fn handle(&self, _event: serde_json::Value) -> Result<PlotOutput> {
        validate_file_name(&self.file_name)?;

        let png = self.renderer.render(&self.datasets).await?;
        info!(
            "Rendered {} datasets into {} bytes of PNG",
            self.datasets.len(),
            png.len()
        );

        fs::create_dir_all(&self.output_dir)?;
        let local_path = self.output_dir.join(&self.file_name);
        fs::write(&local_path, &png)?;
        info!("Saved plot locally at: {}", local_path.display());

        self.upload_with_retry(&png).await?;
        info!("Uploaded {} to the asset bucket", self.file_name);

        Ok(PlotOutput {
            file_name: self.file_name.clone(),
        })
    }

    async fn upload_with_retry(&self, png: &[u8]) -> Result<()> {
        let strategy =
            FixedInterval::from_millis(self.retry_interval_ms).take(UPLOAD_ATTEMPTS - 1);
        let key = self.file_name.as_str();

        Retry::spawn(strategy, || async move {
            self.store
                .put_object(key, png, PNG_CONTENT_TYPE)
                .await
                .map_err(|e| {
                    warn!("Upload of {} failed: {}. Will retry...", key, e);
                    e
                })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MockAssetStore;
    use crate::plot::{FacetPlotter, MockPlotRenderer};
    use tempfile::tempdir;

    fn config(output_dir: PathBuf) -> PlotConfig {
        PlotConfig {
            bucket_name: "assets".to_string(),
            file_name: "sample.png".to_string(),
            output_dir,
        }
    }

    #[tokio::test]
    async fn test_handle_renders_writes_and_uploads() {
        let dir = tempdir().unwrap();
        let renderer = MockPlotRenderer::new();
        let store = MockAssetStore::new();

        let handler = PlotHandler::with_services(
            PlotServices {
                renderer: Box::new(renderer.clone()),
                store: Box::new(store.clone()),
            },
            &config(dir.path().to_path_buf()),
        );

        let output = handler.handle(serde_json::json!({})).await.unwrap();

        assert_eq!(output.file_name, "sample.png");
        assert_eq!(renderer.get_render_count(), 1);
        assert!(dir.path().join("sample.png").exists());

        let object = store.get_object("sample.png").unwrap();
        assert_eq!(object.content_type, PNG_CONTENT_TYPE);
        assert_eq!(object.data, fs::read(dir.path().join("sample.png")).unwrap());
        assert_eq!(store.keys(), vec!["sample.png"]);
    }

    #[tokio::test]
    async fn test_handle_retries_transient_upload_failures() {
        let dir = tempdir().unwrap();
        let store = MockAssetStore::new().with_failures(2);

        let handler = PlotHandler::with_services(
            PlotServices {
                renderer: Box::new(MockPlotRenderer::new()),
                store: Box::new(store.clone()),
            },
            &config(dir.path().to_path_buf()),
        )
        .with_retry_interval_ms(1);

        handler.handle(serde_json::Value::Null).await.unwrap();
        assert_eq!(store.get_upload_count(), 3);
        assert!(store.get_object("sample.png").is_some());
    }

    #[tokio::test]
    async fn test_handle_gives_up_after_attempts() {
        let dir = tempdir().unwrap();
        let store = MockAssetStore::new().with_failures(5);

        let handler = PlotHandler::with_services(
            PlotServices {
                renderer: Box::new(MockPlotRenderer::new()),
                store: Box::new(store.clone()),
            },
            &config(dir.path().to_path_buf()),
        )
        .with_retry_interval_ms(1);

        let err = handler.handle(serde_json::Value::Null).await.unwrap_err();
        assert!(matches!(err, crate::Error::Storage(_)));
        assert_eq!(store.get_upload_count(), UPLOAD_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_render_failure_skips_upload() {
        let dir = tempdir().unwrap();
        let store = MockAssetStore::new();

        let handler = PlotHandler::with_services(
            PlotServices {
                renderer: Box::new(MockPlotRenderer::new().with_failure(true)),
                store: Box::new(store.clone()),
            },
            &config(dir.path().to_path_buf()),
        );

        assert!(handler.handle(serde_json::Value::Null).await.is_err());
        assert_eq!(store.get_upload_count(), 0);
    }

    #[tokio::test]
    async fn test_handle_with_real_renderer() {
        let dir = tempdir().unwrap();
        let store = MockAssetStore::new();

        let handler = PlotHandler::with_services(
            PlotServices {
                renderer: Box::new(FacetPlotter::default()),
                store: Box::new(store.clone()),
            },
            &config(dir.path().to_path_buf()),
        );

        handler.handle(serde_json::Value::Null).await.unwrap();

        let object = store.get_object("sample.png").unwrap();
        let img = image::load_from_memory(&object.data).unwrap();
        assert_eq!((img.width(), img.height()), (800, 800));
    }
}
