// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Default element colors and diff states

use harness_model::ElementKind;
use serde::{Deserialize, Serialize};

/// Linear RGBA color
pub type Rgba = [f32; 4];

/// Color of vertices no element claims
pub const NEUTRAL_COLOR: Rgba = [0.75, 0.72, 0.70, 1.0];

/// Shown for unchanged elements in the diff view
pub const UNCHANGED_COLOR: Rgba = [0.62, 0.62, 0.64, 1.0];

/// Get default color for an element kind
pub fn base_color(kind: ElementKind) -> Rgba {
    match kind {
        // Cable bundles - copper orange
        ElementKind::Segment => [0.80, 0.52, 0.25, 1.0],
        // Connectors - dark housing plastic
        ElementKind::Connector => [0.25, 0.27, 0.30, 1.0],
        // Fixings - black clips and ties
        ElementKind::Fixing => [0.12, 0.12, 0.13, 1.0],
        // Protection - dark blue-gray sleeve
        ElementKind::Protection => [0.28, 0.32, 0.38, 1.0],
        // Accessories - purple tint
        ElementKind::Accessory => [0.60, 0.50, 0.70, 1.0],
        ElementKind::Node => [0.45, 0.45, 0.48, 1.0],
        ElementKind::BuildingBlock | ElementKind::Other => NEUTRAL_COLOR,
    }
}

/// Color from 0-255 channels
pub fn rgb8(r: u8, g: u8, b: u8) -> Rgba {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0]
}

/// Darken toward gray for disabled elements
pub fn dimmed(color: Rgba) -> Rgba {
    const GRAY: f32 = 0.35;
    const KEEP: f32 = 0.25;
    [
        color[0] * KEEP + GRAY * (1.0 - KEEP),
        color[1] * KEEP + GRAY * (1.0 - KEEP),
        color[2] * KEEP + GRAY * (1.0 - KEEP),
        color[3],
    ]
}

/// Linear interpolation between two colors, `t` clamped to `[0, 1]`
pub fn lerp(low: Rgba, high: Rgba, t: f32) -> Rgba {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    [
        low[0] + (high[0] - low[0]) * t,
        low[1] + (high[1] - low[1]) * t,
        low[2] + (high[2] - low[2]) * t,
        low[3] + (high[3] - low[3]) * t,
    ]
}

/// Change status of an element against a reference harness
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiffState {
    #[default]
    Unchanged,
    Added,
    Removed,
    Modified,
}

impl DiffState {
    /// Per-vertex scalar written to the `diff_state` attribute
    pub fn scalar(self) -> f32 {
        match self {
            DiffState::Unchanged => 0.0,
            DiffState::Added => 1.0,
            DiffState::Removed => 2.0,
            DiffState::Modified => 3.0,
        }
    }

    pub fn from_scalar(value: f32) -> Self {
        match value.round() as i32 {
            1 => DiffState::Added,
            2 => DiffState::Removed,
            3 => DiffState::Modified,
            _ => DiffState::Unchanged,
        }
    }

    pub fn color(self) -> Rgba {
        match self {
            DiffState::Unchanged => UNCHANGED_COLOR,
            DiffState::Added => [0.30, 0.75, 0.35, 1.0],
            DiffState::Removed => [0.85, 0.25, 0.25, 1.0],
            DiffState::Modified => [0.95, 0.70, 0.20, 1.0],
        }
    }
}
