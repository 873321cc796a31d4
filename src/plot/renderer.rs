use super::glyphs::{self, put_pixel, GLYPH_HEIGHT};
use super::PlotRenderer;
use crate::dataset::{Bounds, Dataset};
use crate::{Error, Result};
use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

/// Seaborn's "muted" qualitative palette.
pub const MUTED_PALETTE: [Rgb<u8>; 10] = [
    Rgb([0x48, 0x78, 0xD0]),
    Rgb([0xEE, 0x85, 0x4A]),
    Rgb([0x6A, 0xCC, 0x64]),
    Rgb([0xD6, 0x5F, 0x5F]),
    Rgb([0x95, 0x6C, 0xB4]),
    Rgb([0x8C, 0x61, 0x3C]),
    Rgb([0xDC, 0x7E, 0xC0]),
    Rgb([0x79, 0x79, 0x79]),
    Rgb([0xD5, 0xBB, 0x67]),
    Rgb([0x82, 0xC6, 0xE2]),
];

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([0x26, 0x26, 0x26]);

const MARGIN_LEFT: f64 = 56.0;
const MARGIN_RIGHT: f64 = 16.0;
const MARGIN_TOP: f64 = 44.0;
const MARGIN_BOTTOM: f64 = 36.0;
const TICK_LENGTH: f64 = 5.0;
const LABEL_SCALE: u32 = 2;
const TITLE_SCALE: u32 = 3;

/// Renders one facet per dataset in a wrapped grid with shared axes.
#[derive(Debug, Clone)]
pub struct FacetPlotter {
    facet_size: u32,
    col_wrap: usize,
    marker_radius: f64,
    line_width: f64,
}

impl Default for FacetPlotter {
    fn default() -> Self {
        // 4in facets at 100dpi, 50pt^2 markers.
        Self {
            facet_size: 400,
            col_wrap: 2,
            marker_radius: 4.9,
            line_width: 2.0,
        }
    }
}

/// A linear axis with "nice" tick spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axis {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Axis {
    pub fn nice(lo: f64, hi: f64, target_ticks: usize) -> Self {
        let span = (hi - lo).abs().max(f64::EPSILON);
        let raw = span / target_ticks.max(1) as f64;
        let magnitude = 10f64.powf(raw.log10().floor());
        let normalized = raw / magnitude;
        let factor = [1.0, 2.0, 2.5, 5.0, 10.0]
            .into_iter()
            .find(|f| *f >= normalized)
            .unwrap_or(10.0);
        let step = factor * magnitude;

        let min = (lo / step).floor() * step;
        let mut max = (hi / step).ceil() * step;
        if max <= min {
            max = min + step;
        }
        Self { min, max, step }
    }

    pub fn ticks(&self) -> Vec<f64> {
        let count = ((self.max - self.min) / self.step).round() as usize;
        (0..=count)
            .map(|i| self.min + i as f64 * self.step)
            .collect()
    }

    fn fraction(&self, value: f64) -> f64 {
        (value - self.min) / (self.max - self.min)
    }

    fn label(&self, value: f64) -> String {
        if self.step.fract().abs() < 1e-9 {
            format!("{}", value.round() as i64)
        } else {
            format!("{:.1}", value)
        }
    }
}

/// Pixel rectangle of one facet's plotting area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FacetArea {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl FacetArea {
    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Shared geometry for a render: canvas size, axes and facet placement.
#[derive(Debug, Clone)]
pub struct Layout {
    pub width: u32,
    pub height: u32,
    pub x_axis: Axis,
    pub y_axis: Axis,
    facet_size: u32,
    col_wrap: usize,
}

impl Layout {
    pub fn facet(&self, index: usize) -> FacetArea {
        let col = (index % self.col_wrap) as f64;
        let row = (index / self.col_wrap) as f64;
        let size = self.facet_size as f64;
        FacetArea {
            left: col * size + MARGIN_LEFT,
            top: row * size + MARGIN_TOP,
            width: size - MARGIN_LEFT - MARGIN_RIGHT,
            height: size - MARGIN_TOP - MARGIN_BOTTOM,
        }
    }

    /// Map a data coordinate into canvas pixels for facet `index`.
    pub fn project(&self, index: usize, x: f64, y: f64) -> (f64, f64) {
        let area = self.facet(index);
        (
            area.left + self.x_axis.fraction(x) * area.width,
            area.bottom() - self.y_axis.fraction(y) * area.height,
        )
    }
}

impl FacetPlotter {
    pub fn new(facet_size: u32, col_wrap: usize) -> Self {
        Self {
            facet_size: facet_size.max(160),
            col_wrap: col_wrap.max(1),
            ..Self::default()
        }
    }

    pub fn layout(&self, datasets: &[Dataset]) -> Result<Layout> {
        let bounds = Bounds::of(datasets)
            .ok_or_else(|| Error::Invariant("No data points to plot".to_string()))?;

        let cols = self.col_wrap.min(datasets.len()).max(1);
        let rows = datasets.len().div_ceil(self.col_wrap).max(1);

        Ok(Layout {
            width: cols as u32 * self.facet_size,
            height: rows as u32 * self.facet_size,
            x_axis: Axis::nice(bounds.x_min, bounds.x_max, 5),
            y_axis: Axis::nice(bounds.y_min, bounds.y_max, 5),
            facet_size: self.facet_size,
            col_wrap: self.col_wrap,
        })
    }

    pub fn render_sync(&self, datasets: &[Dataset]) -> Result<Vec<u8>> {
        let layout = self.layout(datasets)?;
        let mut img = RgbImage::from_pixel(layout.width, layout.height, BACKGROUND);

        for (index, dataset) in datasets.iter().enumerate() {
            let color = MUTED_PALETTE[index % MUTED_PALETTE.len()];
            self.draw_frame(&mut img, &layout, index, &dataset.name);

            if let (Some(fit), Some((x_lo, x_hi))) = (dataset.fit(), dataset.x_range()) {
                let from = layout.project(index, x_lo, fit.predict(x_lo));
                let to = layout.project(index, x_hi, fit.predict(x_hi));
                draw_segment(&mut img, from, to, self.line_width, color);
            } else {
                tracing::debug!("Dataset {} has no regression line", dataset.name);
            }

            for point in &dataset.points {
                let (cx, cy) = layout.project(index, point.x, point.y);
                fill_disc(&mut img, cx, cy, self.marker_radius, color);
            }
        }

        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn draw_frame(&self, img: &mut RgbImage, layout: &Layout, index: usize, title: &str) {
        let area = layout.facet(index);
        let bottom = area.bottom();
        let right = area.left + area.width;

        // Despined: only the left and bottom axis lines.
        draw_segment(img, (area.left, area.top), (area.left, bottom), 1.0, INK);
        draw_segment(img, (area.left, bottom), (right, bottom), 1.0, INK);

        let glyph_h = (GLYPH_HEIGHT * LABEL_SCALE) as f64;

        for tick in layout.x_axis.ticks() {
            let (x, _) = layout.project(index, tick, layout.y_axis.min);
            draw_segment(img, (x, bottom), (x, bottom + TICK_LENGTH), 1.0, INK);
            let label = layout.x_axis.label(tick);
            let w = glyphs::text_width(&label, LABEL_SCALE) as f64;
            glyphs::draw_text(
                img,
                &label,
                (x - w / 2.0).round() as i64,
                (bottom + TICK_LENGTH + 4.0).round() as i64,
                LABEL_SCALE,
                INK,
            );
        }

        for tick in layout.y_axis.ticks() {
            let (_, y) = layout.project(index, layout.x_axis.min, tick);
            draw_segment(img, (area.left - TICK_LENGTH, y), (area.left, y), 1.0, INK);
            let label = layout.y_axis.label(tick);
            let w = glyphs::text_width(&label, LABEL_SCALE) as f64;
            glyphs::draw_text(
                img,
                &label,
                (area.left - TICK_LENGTH - 4.0 - w).round() as i64,
                (y - glyph_h / 2.0).round() as i64,
                LABEL_SCALE,
                INK,
            );
        }

        let title_w = glyphs::text_width(title, TITLE_SCALE) as f64;
        let title_h = (GLYPH_HEIGHT * TITLE_SCALE) as f64;
        glyphs::draw_text(
            img,
            title,
            (area.left + (area.width - title_w) / 2.0).round() as i64,
            (area.top - title_h - 12.0).round() as i64,
            TITLE_SCALE,
            INK,
        );
    }
}

fn fill_disc(img: &mut RgbImage, cx: f64, cy: f64, radius: f64, color: Rgb<u8>) {
    let r2 = radius * radius;
    let (x0, x1) = ((cx - radius).floor() as i64, (cx + radius).ceil() as i64);
    let (y0, y1) = ((cy - radius).floor() as i64, (cy + radius).ceil() as i64);
    for y in y0..=y1 {
        for x in x0..=x1 {
            let (dx, dy) = (x as f64 - cx, y as f64 - cy);
            if dx * dx + dy * dy <= r2 {
                put_pixel(img, x, y, color);
            }
        }
    }
}

fn draw_segment(img: &mut RgbImage, from: (f64, f64), to: (f64, f64), width: f64, color: Rgb<u8>) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
    let radius = (width / 2.0).max(0.5);
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        fill_disc(img, from.0 + t * dx, from.1 + t * dy, radius, color);
    }
}

#[async_trait]
impl PlotRenderer for FacetPlotter {
    async fn render(&self, datasets: &[Dataset]) -> Result<Vec<u8>> {
        tokio::task::spawn_blocking({
            let plotter = self.clone();
            let datasets = datasets.to_vec();
            move || plotter.render_sync(&datasets)
        })
        .await
        .map_err(|e| Error::Invariant(format!("Plot rendering task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::anscombe;

    #[test]
    fn test_nice_axes_for_quartet() {
        let x = Axis::nice(4.0, 19.0, 5);
        assert_eq!((x.min, x.max, x.step), (0.0, 20.0, 5.0));
        assert_eq!(x.ticks(), vec![0.0, 5.0, 10.0, 15.0, 20.0]);

        let y = Axis::nice(3.10, 12.74, 5);
        assert_eq!((y.min, y.max, y.step), (2.0, 14.0, 2.0));
    }

    #[test]
    fn test_axis_labels() {
        let fractional = Axis::nice(0.0, 10.0, 4);
        assert_eq!(fractional.step, 2.5);
        assert_eq!(fractional.label(7.5), "7.5");
        assert_eq!(Axis::nice(0.0, 20.0, 4).label(5.0), "5");
    }

    #[test]
    fn test_layout_wraps_columns() {
        let plotter = FacetPlotter::default();
        let layout = plotter.layout(&anscombe()).unwrap();
        assert_eq!((layout.width, layout.height), (800, 800));

        let first = layout.facet(0);
        let last = layout.facet(3);
        assert_eq!(last.left - first.left, 400.0);
        assert_eq!(last.top - first.top, 400.0);
    }

    #[test]
    fn test_render_quartet_png() {
        let quartet = anscombe();
        let plotter = FacetPlotter::default();
        let png = plotter.render_sync(&quartet).unwrap();

        let img = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (800, 800));

        let layout = plotter.layout(&quartet).unwrap();
        for (index, dataset) in quartet.iter().enumerate() {
            let p = dataset.points[0];
            let (x, y) = layout.project(index, p.x, p.y);
            assert_eq!(
                *img.get_pixel(x.round() as u32, y.round() as u32),
                MUTED_PALETTE[index],
                "dataset {}",
                dataset.name
            );
        }

        assert_eq!(*img.get_pixel(0, 0), BACKGROUND);
    }

    #[test]
    fn test_render_single_facet() {
        let plotter = FacetPlotter::new(200, 2);
        let data = vec![Dataset::new("I", &[1.0, 2.0, 3.0], &[1.0, 2.0, 2.5])];
        let png = plotter.render_sync(&data).unwrap();

        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (200, 200));
    }

    #[test]
    fn test_render_without_points_fails() {
        let plotter = FacetPlotter::default();
        let err = plotter.render_sync(&[]).unwrap_err();
        assert!(matches!(err, Error::Invariant(_)));
    }

    #[tokio::test]
    async fn test_render_async_matches_sync() {
        let quartet = anscombe();
        let plotter = FacetPlotter::default();
        let async_png = plotter.render(&quartet).await.unwrap();
        assert_eq!(async_png, plotter.render_sync(&quartet).unwrap());
    }
}
