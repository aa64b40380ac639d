// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parametric center curves
//!
//! Segment center curves are non-uniform B-splines with unit weights. Each
//! curve records the knot vector and parameter domain it was built with, so
//! samplers address it by a normalized ratio and never assume where the knots
//! start or end.

use crate::error::{Error, Result};
use harness_model::{CenterCurve, SplineMode};
use nalgebra::{Point3, Vector3};

/// Samples used to approximate sub-curve lengths
const LENGTH_SAMPLES: usize = 32;

/// Relative step of the central-difference tangent
const TANGENT_STEP: f64 = 1e-4;

/// Curve addressed by a ratio in `[0, 1]`
pub trait ParametricCurve {
    /// Point at `ratio` (clamped to `[0, 1]`)
    fn point_at(&self, ratio: f64) -> Point3<f64>;

    /// Unit tangent at `ratio`; falls back to +X on degenerate curves
    fn tangent_at(&self, ratio: f64) -> Vector3<f64> {
        let ratio = ratio.clamp(0.0, 1.0);
        let lo = (ratio - TANGENT_STEP).max(0.0);
        let hi = (ratio + TANGENT_STEP).min(1.0);
        (self.point_at(hi) - self.point_at(lo))
            .try_normalize(1e-12)
            .unwrap_or_else(Vector3::x)
    }

    /// `steps + 1` evenly spaced points from start to end
    fn sample(&self, steps: usize) -> Vec<Point3<f64>> {
        let steps = steps.max(1);
        (0..=steps)
            .map(|i| self.point_at(i as f64 / steps as f64))
            .collect()
    }

    /// Polyline length over `samples` chords
    fn approximate_length(&self, samples: usize) -> f64 {
        self.sample(samples)
            .windows(2)
            .map(|w| (w[1] - w[0]).norm())
            .sum()
    }
}

/// Knot vector of length `degree + count + 1` for `count` control points
///
/// * `Unclamped` - sequential integers `1..=len`
/// * `Clamped` - `degree + 1` zeros, interior knots `1, 2, ...`, then
///   `degree + 1` copies of `len - 2 * degree`
pub fn knot_vector(mode: SplineMode, degree: usize, count: usize) -> Vec<f64> {
    let len = degree + count + 1;
    match mode {
        SplineMode::Unclamped => (1..=len).map(|k| k as f64).collect(),
        SplineMode::Clamped => {
            let end = len.saturating_sub(2 * degree) as f64;
            let interior = len.saturating_sub(2 * (degree + 1));
            std::iter::repeat(0.0)
                .take(degree + 1)
                .chain((1..=interior).map(|k| k as f64))
                .chain(std::iter::repeat(end).take(degree + 1))
                .collect()
        }
    }
}

/// B-spline curve with homogeneous weights
#[derive(Debug, Clone)]
pub struct NurbsCurve {
    degree: usize,
    control_points: Vec<Point3<f64>>,
    weights: Vec<f64>,
    knots: Vec<f64>,
}

impl NurbsCurve {
    /// Build a curve from a harness center curve
    ///
    /// The degree is lowered to `control_points - 1` when the curve has too
    /// few points for its declared degree.
    pub fn build(curve: &CenterCurve, mode: SplineMode) -> Result<Self> {
        if curve.control_points.is_empty() {
            return Err(Error::curve("center curve has no control points"));
        }
        if curve
            .control_points
            .iter()
            .flatten()
            .any(|c| !c.is_finite())
        {
            return Err(Error::curve("non-finite control point"));
        }

        let count = curve.control_points.len();
        let degree = if curve.degree >= count {
            log::warn!(
                "curve degree {} needs more than {} control points, using degree {}",
                curve.degree,
                count,
                count - 1
            );
            count - 1
        } else {
            curve.degree
        };

        let control_points = curve
            .control_points
            .iter()
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect();

        Ok(Self {
            degree,
            control_points,
            weights: vec![1.0; count],
            knots: knot_vector(mode, degree, count),
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn control_points(&self) -> &[Point3<f64>] {
        &self.control_points
    }

    /// Valid parameter range `[knots[degree], knots[count]]`
    pub fn domain(&self) -> (f64, f64) {
        (
            self.knots[self.degree],
            self.knots[self.control_points.len()],
        )
    }

    /// Map a ratio in `[0, 1]` onto the parameter domain
    pub fn parameter(&self, ratio: f64) -> f64 {
        let (start, end) = self.domain();
        start + (end - start) * ratio.clamp(0.0, 1.0)
    }

    /// Evaluate at parameter `t` with de Boor's basis functions
    pub fn evaluate(&self, t: f64) -> Point3<f64> {
        let (start, end) = self.domain();
        let t = t.clamp(start, end);
        let span = self.find_span(t);
        let basis = self.basis_functions(span, t);
        let p = self.degree;

        let mut sum = Vector3::zeros();
        let mut weight_sum = 0.0;
        for (i, b) in basis.iter().enumerate() {
            let index = span - p + i;
            let w = self.weights[index] * b;
            sum += self.control_points[index].coords * w;
            weight_sum += w;
        }

        if weight_sum.abs() < f64::EPSILON {
            return self.control_points[span];
        }
        Point3::from(sum / weight_sum)
    }

    /// Knot span index containing `t`
    fn find_span(&self, t: f64) -> usize {
        let n = self.control_points.len() - 1;
        let p = self.degree;

        if t >= self.knots[n + 1] {
            return n;
        }
        if t <= self.knots[p] {
            return p;
        }

        let mut low = p;
        let mut high = n + 1;
        let mut mid = (low + high) / 2;
        while t < self.knots[mid] || t >= self.knots[mid + 1] {
            if t < self.knots[mid] {
                high = mid;
            } else {
                low = mid;
            }
            mid = (low + high) / 2;
        }
        mid
    }

    /// Non-vanishing basis functions at `t` for the given span
    fn basis_functions(&self, span: usize, t: f64) -> Vec<f64> {
        let p = self.degree;
        let mut n_vals = vec![0.0; p + 1];
        let mut left = vec![0.0; p + 1];
        let mut right = vec![0.0; p + 1];

        n_vals[0] = 1.0;
        for j in 1..=p {
            left[j] = t - self.knots[span + 1 - j];
            right[j] = self.knots[span + j] - t;
            let mut saved = 0.0;
            for r in 0..j {
                let denom = right[r + 1] + left[j - r];
                let temp = if denom.abs() < f64::EPSILON {
                    0.0
                } else {
                    n_vals[r] / denom
                };
                n_vals[r] = saved + right[r + 1] * temp;
                saved = left[j - r] * temp;
            }
            n_vals[j] = saved;
        }
        n_vals
    }
}

impl ParametricCurve for NurbsCurve {
    fn point_at(&self, ratio: f64) -> Point3<f64> {
        self.evaluate(self.parameter(ratio))
    }
}

/// Sub-curves joined end-to-end
///
/// The global ratio is shared among sub-curves in proportion to their
/// approximate lengths, so sampling density follows the physical run.
#[derive(Debug, Clone)]
pub struct CompositeCurve {
    curves: Vec<NurbsCurve>,
    /// Cumulative length fraction at the end of each sub-curve
    breaks: Vec<f64>,
    length: f64,
}

impl CompositeCurve {
    pub fn new(curves: Vec<NurbsCurve>) -> Result<Self> {
        if curves.is_empty() {
            return Err(Error::curve("no center curves"));
        }

        let lengths: Vec<f64> = curves
            .iter()
            .map(|c| c.approximate_length(LENGTH_SAMPLES))
            .collect();
        let length: f64 = lengths.iter().sum();

        let breaks = if length > f64::EPSILON {
            lengths
                .iter()
                .scan(0.0, |acc, l| {
                    *acc += l / length;
                    Some(*acc)
                })
                .collect()
        } else {
            let n = curves.len() as f64;
            (1..=curves.len()).map(|i| i as f64 / n).collect()
        };

        Ok(Self {
            curves,
            breaks,
            length,
        })
    }

    /// Build every center curve of a segment with one knot policy
    pub fn build(curves: &[CenterCurve], mode: SplineMode) -> Result<Self> {
        let built = curves
            .iter()
            .map(|c| NurbsCurve::build(c, mode))
            .collect::<Result<Vec<_>>>()?;
        Self::new(built)
    }

    pub fn curves(&self) -> &[NurbsCurve] {
        &self.curves
    }

    /// Approximate total length
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Sub-curve index and its local ratio for a global ratio
    fn locate(&self, ratio: f64) -> (usize, f64) {
        let ratio = ratio.clamp(0.0, 1.0);
        let last = self.curves.len() - 1;
        let index = self
            .breaks
            .iter()
            .position(|&b| ratio <= b)
            .unwrap_or(last)
            .min(last);
        let start = if index == 0 { 0.0 } else { self.breaks[index - 1] };
        let width = self.breaks[index] - start;
        let local = if width > f64::EPSILON {
            (ratio - start) / width
        } else {
            0.0
        };
        (index, local.clamp(0.0, 1.0))
    }
}

impl ParametricCurve for CompositeCurve {
    fn point_at(&self, ratio: f64) -> Point3<f64> {
        let (index, local) = self.locate(ratio);
        self.curves[index].point_at(local)
    }
}

/// Uniform Catmull-Rom spline through a point list
///
/// Used to re-fit points sampled from several segment paths into one smooth
/// curve. End tangents repeat the end points.
#[derive(Debug, Clone)]
pub struct CatmullRom {
    points: Vec<Point3<f64>>,
}

impl CatmullRom {
    pub fn new(points: Vec<Point3<f64>>) -> Result<Self> {
        if points.len() < 2 {
            return Err(Error::curve("catmull-rom needs at least two points"));
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }
}

impl ParametricCurve for CatmullRom {
    fn point_at(&self, ratio: f64) -> Point3<f64> {
        let count = self.points.len();
        let spans = count - 1;
        let scaled = ratio.clamp(0.0, 1.0) * spans as f64;
        let i = (scaled.floor() as usize).min(spans - 1);
        let t = scaled - i as f64;

        let p0 = self.points[i.saturating_sub(1)].coords;
        let p1 = self.points[i].coords;
        let p2 = self.points[i + 1].coords;
        let p3 = self.points[(i + 2).min(count - 1)].coords;

        let t2 = t * t;
        let t3 = t2 * t;
        Point3::from(
            (p1 * 2.0
                + (p2 - p0) * t
                + (p0 * 2.0 - p1 * 5.0 + p2 * 4.0 - p3) * t2
                + (p1 * 3.0 - p0 - p2 * 3.0 + p3) * t3)
                * 0.5,
        )
    }
}
