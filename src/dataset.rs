//! Anscombe's quartet and the least-squares fit drawn over each series.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Axis-aligned data bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    /// Bounds covering every point of every dataset; `None` when there are no points.
    pub fn of(datasets: &[Dataset]) -> Option<Self> {
        let mut points = datasets.iter().flat_map(|d| d.points.iter());
        let first = points.next()?;
        let init = Bounds {
            x_min: first.x,
            x_max: first.x,
            y_min: first.y,
            y_max: first.y,
        };
        Some(points.fold(init, |b, p| Bounds {
            x_min: b.x_min.min(p.x),
            x_max: b.x_max.max(p.x),
            y_min: b.y_min.min(p.y),
            y_max: b.y_max.max(p.y),
        }))
    }
}

impl Dataset {
    pub fn new(name: impl Into<String>, xs: &[f64], ys: &[f64]) -> Self {
        Self {
            name: name.into(),
            points: xs
                .iter()
                .zip(ys)
                .map(|(&x, &y)| Point { x, y })
                .collect(),
        }
    }

    pub fn x_range(&self) -> Option<(f64, f64)> {
        let mut xs = self.points.iter().map(|p| p.x);
        let first = xs.next()?;
        Some(xs.fold((first, first), |(lo, hi), x| (lo.min(x), hi.max(x))))
    }

    /// Ordinary least squares of y on x.
    pub fn fit(&self) -> Option<LinearFit> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        let n = n as f64;
        let mean_x = self.points.iter().map(|p| p.x).sum::<f64>() / n;
        let mean_y = self.points.iter().map(|p| p.y).sum::<f64>() / n;

        let (sxy, sxx) = self.points.iter().fold((0.0, 0.0), |(sxy, sxx), p| {
            let dx = p.x - mean_x;
            (sxy + dx * (p.y - mean_y), sxx + dx * dx)
        });

        if sxx.abs() < f64::EPSILON {
            return None;
        }

        let slope = sxy / sxx;
        Some(LinearFit {
            intercept: mean_y - slope * mean_x,
            slope,
        })
    }
}

const QUARTET_X: [f64; 11] = [10.0, 8.0, 13.0, 9.0, 11.0, 14.0, 6.0, 4.0, 12.0, 7.0, 5.0];
const QUARTET_X4: [f64; 11] = [8.0, 8.0, 8.0, 8.0, 8.0, 8.0, 8.0, 19.0, 8.0, 8.0, 8.0];

const QUARTET_Y1: [f64; 11] = [
    8.04, 6.95, 7.58, 8.81, 8.33, 9.96, 7.24, 4.26, 10.84, 4.82, 5.68,
];
const QUARTET_Y2: [f64; 11] = [
    9.14, 8.14, 8.74, 8.77, 9.26, 8.10, 6.13, 3.10, 9.13, 7.26, 4.74,
];
const QUARTET_Y3: [f64; 11] = [
    7.46, 6.77, 12.74, 7.11, 7.81, 8.84, 6.08, 5.39, 8.15, 6.42, 5.73,
];
const QUARTET_Y4: [f64; 11] = [
    6.58, 5.76, 7.71, 8.84, 8.47, 7.04, 5.25, 12.50, 5.56, 7.91, 6.89,
];

/// The four series of Anscombe's quartet, in order I to IV.
pub fn anscombe() -> Vec<Dataset> {
    vec![
        Dataset::new("I", &QUARTET_X, &QUARTET_Y1),
        Dataset::new("II", &QUARTET_X, &QUARTET_Y2),
        Dataset::new("III", &QUARTET_X, &QUARTET_Y3),
        Dataset::new("IV", &QUARTET_X4, &QUARTET_Y4),
    ]
}
