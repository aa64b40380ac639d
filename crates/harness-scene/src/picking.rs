// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Color-encoded pick ids
//!
//! Every pickable element gets a 1-based integer; 0 is the background. The
//! integer is packed into the RGB channels of a vertex color, rendered
//! without shading into an off-screen target and decoded from the pixel read
//! back under the cursor.

use crate::observer::{ObserverId, Observers};
use harness_model::ElementId;
use rustc_hash::FxHashMap;

/// Largest id that fits into 24 bits
pub const MAX_PICK_ID: u32 = 0x00FF_FFFF;

/// Pack a pick id into `[r, g, b]`; the top byte is dropped
#[inline]
pub fn encode_pick_id(id: u32) -> [u8; 3] {
    [(id >> 16) as u8, (id >> 8) as u8, id as u8]
}

/// Unpack `(r << 16) | (g << 8) | b`
#[inline]
pub fn decode_pick_color(rgb: [u8; 3]) -> u32 {
    ((rgb[0] as u32) << 16) | ((rgb[1] as u32) << 8) | rgb[2] as u32
}

/// Pick id as a normalized vertex color with opaque alpha
pub fn pick_vertex_color(id: u32) -> [f32; 4] {
    let [r, g, b] = encode_pick_id(id);
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0]
}

/// Sequential pick numbering over every loaded harness
#[derive(Debug, Clone, Default)]
pub struct PickIndex {
    ids: Vec<ElementId>,
    numbers: FxHashMap<ElementId, u32>,
}

impl PickIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number an element, keeping the existing number of a known id
    ///
    /// Returns `None` once the 24-bit id space is exhausted.
    pub fn register(&mut self, id: &ElementId) -> Option<u32> {
        if let Some(&number) = self.numbers.get(id) {
            return Some(number);
        }
        let number = self.ids.len() as u32 + 1;
        if number > MAX_PICK_ID {
            log::warn!("pick id space exhausted, {} is not pickable", id);
            return None;
        }
        self.ids.push(id.clone());
        self.numbers.insert(id.clone(), number);
        Some(number)
    }

    pub fn extend<'a>(&mut self, ids: impl IntoIterator<Item = &'a ElementId>) {
        for id in ids {
            self.register(id);
        }
    }

    pub fn number_of(&self, id: &ElementId) -> Option<u32> {
        self.numbers.get(id).copied()
    }

    /// Element for a decoded pick number; 0 and unknown numbers are no pick
    pub fn resolve(&self, number: u32) -> Option<&ElementId> {
        let index = number.checked_sub(1)?;
        self.ids.get(index as usize)
    }

    /// Element for a pixel read from the pick buffer
    pub fn resolve_pixel(&self, rgba: [u8; 4]) -> Option<&ElementId> {
        self.resolve(decode_pick_color([rgba[0], rgba[1], rgba[2]]))
    }

    /// `(number, id)` pairs in numbering order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ElementId)> {
        self.ids.iter().enumerate().map(|(i, id)| (i as u32 + 1, id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.numbers.clear();
    }
}

/// Reads one pixel of the rendered pick buffer
///
/// Coordinates are physical pixels from the top-left corner.
pub trait PixelReader {
    fn read_pixel(&mut self, x: u32, y: u32) -> Option<[u8; 4]>;
}

/// Currently picked element, published to observers when it changes
#[derive(Debug, Default)]
pub struct PickStream {
    current: Option<ElementId>,
    observers: Observers<Option<ElementId>>,
}

impl PickStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&ElementId> {
        self.current.as_ref()
    }

    /// Store a new pick, notifying observers if it differs; returns whether it changed
    pub fn update(&mut self, picked: Option<ElementId>) -> bool {
        if picked == self.current {
            return false;
        }
        self.current = picked;
        self.observers.notify(&self.current);
        true
    }

    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&Option<ElementId>) + Send + Sync + 'static,
    ) -> ObserverId {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }
}
