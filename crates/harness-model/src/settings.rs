// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rendering and geometry settings

use serde::{Deserialize, Serialize};

/// Where occurrence shapes and placements come from
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeometryMode {
    /// Generated shapes placed by the default rules
    #[default]
    Default,
    /// Loaded part shapes and explicit placements
    Loaded,
}

/// Knot-vector policy for segment center curves
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SplineMode {
    /// Sequential integer knots; the curve does not reach its end control points
    #[default]
    Unclamped,
    /// End knots repeated `degree + 1` times; the curve interpolates its end points
    Clamped,
}

/// Session settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub geometry_mode: GeometryMode,
    pub spline_mode: SplineMode,
    /// Radial segments around a tube cross-section
    pub segment_count: u32,
    /// Tube steps per unit of virtual length
    pub curve_steps_factor: f64,
    /// Physical pixels per logical pixel, used to address the pick buffer
    pub pixel_ratio: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            geometry_mode: GeometryMode::Default,
            spline_mode: SplineMode::Unclamped,
            segment_count: 16,
            curve_steps_factor: 0.5,
            pixel_ratio: 1.0,
        }
    }
}

impl Settings {
    /// Radial segment count, never below a triangle
    pub fn radial_segments(&self) -> usize {
        self.segment_count.max(3) as usize
    }

    /// Whether switching from `other` to `self` requires recompiling geometry
    pub fn affects_geometry(&self, other: &Settings) -> bool {
        self.geometry_mode != other.geometry_mode
            || self.spline_mode != other.spline_mode
            || self.segment_count != other.segment_count
            || self.curve_steps_factor != other.curve_steps_factor
    }
}
