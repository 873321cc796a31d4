use super::PlotRenderer;
use crate::dataset::Dataset;
use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Placeholder 1x1 PNG returned by the mock; only the signature is meaningful.
pub const TINY_PNG: [u8; 69] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1 pixel
    0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, 0xDE, 0x00, 0x00, 0x00, 0x0C, 0x49, 0x44,
    0x41, // IDAT chunk
    0x54, 0x08, 0x99, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0xE2, 0x25,
    0x00, 0xBC, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, // IEND chunk
    0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[derive(Clone)]
pub struct MockPlotRenderer {
    render_count: Arc<Mutex<usize>>,
    datasets_seen: Arc<Mutex<Vec<String>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockPlotRenderer {
    pub fn new() -> Self {
        Self {
            render_count: Arc::new(Mutex::new(0)),
            datasets_seen: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_render_count(&self) -> usize {
        *self.render_count.lock().unwrap()
    }

    pub fn get_datasets_seen(&self) -> Vec<String> {
        self.datasets_seen.lock().unwrap().clone()
    }
}

impl Default for MockPlotRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlotRenderer for MockPlotRenderer {
    async fn render(&self, datasets: &[Dataset]) -> Result<Vec<u8>> {
        if *self.should_fail.lock().unwrap() {
            return Err(crate::Error::Image(image::ImageError::IoError(
                std::io::Error::other("Mock failure"),
            )));
        }

        *self.render_count.lock().unwrap() += 1;
        self.datasets_seen
            .lock()
            .unwrap()
            .extend(datasets.iter().map(|d| d.name.clone()));

        Ok(TINY_PNG.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::anscombe;

    #[tokio::test]
    async fn test_mock_renderer_returns_png() {
        let renderer = MockPlotRenderer::new();
        let png = renderer.render(&anscombe()).await.unwrap();

        assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(renderer.get_render_count(), 1);
        assert_eq!(renderer.get_datasets_seen(), vec!["I", "II", "III", "IV"]);
    }

    #[tokio::test]
    async fn test_mock_renderer_failure() {
        let renderer = MockPlotRenderer::new().with_failure(true);
        assert!(renderer.render(&anscombe()).await.is_err());
        assert_eq!(renderer.get_render_count(), 0);
    }
}
