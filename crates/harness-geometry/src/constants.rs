// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry tunables

/// Box dimensions `(width, height, depth)`; depth runs along the attached segment
pub type BoxSize = (f64, f64, f64);

/// Dimensions and sampling densities for generated shapes
///
/// Lengths are in harness units.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryConstants {
    /// Added to the largest covered segment radius for protection sleeves
    pub protection_radius_increase: f64,
    /// Interpolation steps per covered segment of a protection area
    pub protection_steps: usize,
    /// Cavity-count thresholds separating the connector size buckets
    pub connector_thresholds: [u32; 2],
    /// Box size per connector bucket (small, medium, large)
    pub connector_sizes: [BoxSize; 3],
    /// Added to the segment radius for fixing rings
    pub fixing_radius_increase: f64,
    /// Length of a fixing ring along its segment
    pub fixing_length: f64,
    /// Fixing cylinder at an explicit placement
    pub fixing_radius: f64,
    pub accessory_radius: f64,
    pub accessory_length: f64,
    /// Bounds on tube steps derived from virtual length
    pub min_tube_steps: usize,
    pub max_tube_steps: usize,
}

impl Default for GeometryConstants {
    fn default() -> Self {
        Self {
            protection_radius_increase: 1.0,
            protection_steps: 20,
            connector_thresholds: [10, 20],
            connector_sizes: [(12.0, 8.0, 15.0), (20.0, 10.0, 20.0), (30.0, 15.0, 25.0)],
            fixing_radius_increase: 1.5,
            fixing_length: 4.0,
            fixing_radius: 3.0,
            accessory_radius: 4.0,
            accessory_length: 10.0,
            min_tube_steps: 2,
            max_tube_steps: 512,
        }
    }
}

impl GeometryConstants {
    /// Size bucket for a cavity count: 0 below the first threshold, 1 below
    /// the second, 2 otherwise
    pub fn connector_bucket(&self, cavity_count: u32) -> usize {
        let [small, medium] = self.connector_thresholds;
        if cavity_count < small {
            0
        } else if cavity_count < medium {
            1
        } else {
            2
        }
    }

    pub fn connector_size(&self, cavity_count: u32) -> BoxSize {
        self.connector_sizes[self.connector_bucket(cavity_count)]
    }

    /// Tube steps for a segment of `virtual_length`
    pub fn tube_steps(&self, virtual_length: f64, steps_per_unit: f64) -> usize {
        let raw = (virtual_length * steps_per_unit).ceil();
        if !raw.is_finite() || raw < self.min_tube_steps as f64 {
            return self.min_tube_steps;
        }
        (raw as usize).min(self.max_tube_steps)
    }
}
