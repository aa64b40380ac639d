// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session-scoped scene store
//!
//! [`HarnessSession`] owns everything derived from the loaded harnesses: the
//! merged mesh, vertex ranges, pick numbering, cached view properties and the
//! per-vertex overlay attributes. Overlay changes rewrite attributes through
//! the range table and never recompile geometry. [`HarnessSession::clear`]
//! releases all of it.

use crate::error::{Result, SceneError};
use crate::mapping::apply_mapping;
use crate::merge::{ElementToVertexMapping, MergedMesh, MeshMerger, RangeTable, VertexRange};
use crate::observer::ObserverId;
use crate::picking::{pick_vertex_color, PickIndex, PickStream, PixelReader};
use crate::settings::SettingsStore;
use crate::style::{base_color, rgb8, DiffState, Rgba, NEUTRAL_COLOR};
use crate::view::{
    display_colors, AttributeData, VertexAttributes, View, ViewPropertyCache, COLOR, DIFF_STATE,
    ENABLED, PICK_COLOR,
};
use harness_geometry::{GeometryCompiler, Mesh, PartLibrary, Vector3};
use harness_model::{preprocess, ElementId, ElementKind, Harness, Rejection, Settings};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// One entry of a color overlay request, channels in 0-255
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorRequest {
    pub id: ElementId,
    pub color_r: u8,
    pub color_g: u8,
    pub color_b: u8,
}

impl ColorRequest {
    pub fn new(id: impl Into<ElementId>, r: u8, g: u8, b: u8) -> Self {
        Self {
            id: id.into(),
            color_r: r,
            color_g: g,
            color_b: b,
        }
    }

    pub fn rgba(&self) -> Rgba {
        rgb8(self.color_r, self.color_g, self.color_b)
    }
}

/// Outcome of loading one harness
#[derive(Clone, Debug)]
pub struct LoadReport {
    pub harness_id: ElementId,
    /// Elements dropped by preprocessing
    pub rejections: Vec<Rejection>,
    /// Elements that produced geometry
    pub compiled: usize,
    /// Vertices appended for this harness
    pub vertex_range: Option<VertexRange>,
}

struct LoadedHarness {
    /// Preprocessed harness, kept for recompilation
    harness: Harness,
    mapping: ElementToVertexMapping,
}

/// Scene state for every loaded harness
pub struct HarnessSession {
    settings: SettingsStore,
    compiler: GeometryCompiler,
    merger: MeshMerger,
    library: PartLibrary,
    harnesses: Vec<LoadedHarness>,
    merged: MergedMesh,
    ranges: RangeTable,
    pick_index: PickIndex,
    properties: ViewPropertyCache,
    colors: FxHashMap<ElementId, Rgba>,
    disabled: FxHashSet<ElementId>,
    diff_states: FxHashMap<ElementId, DiffState>,
    view: View,
    attributes: VertexAttributes,
    picks: PickStream,
    revision: u64,
    geometry_revision: u64,
}

impl HarnessSession {
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self::with_compiler(settings, GeometryCompiler::with_default_processors())
    }

    /// Session using a custom compiler (own constants or processors)
    pub fn with_compiler(settings: Settings, compiler: GeometryCompiler) -> Self {
        Self {
            settings: SettingsStore::new(settings),
            compiler,
            merger: MeshMerger::new(),
            library: PartLibrary::new(),
            harnesses: Vec::new(),
            merged: MergedMesh::new(),
            ranges: RangeTable::new(),
            pick_index: PickIndex::new(),
            properties: ViewPropertyCache::new(),
            colors: FxHashMap::default(),
            disabled: FxHashSet::default(),
            diff_states: FxHashMap::default(),
            view: View::base(),
            attributes: VertexAttributes::default(),
            picks: PickStream::new(),
            revision: 0,
            geometry_revision: 0,
        }
    }

    /// Validate, compile and merge a harness into the scene
    pub fn load_harness(&mut self, raw: &Harness) -> Result<LoadReport> {
        if self.harnesses.iter().any(|h| h.harness.id == raw.id) {
            log::warn!("harness {} is already loaded", raw.id);
            return Err(SceneError::HarnessLoaded(raw.id.clone()));
        }

        let report = preprocess(raw);
        for rejection in &report.rejections {
            log::debug!("harness {}: {}", raw.id, rejection);
        }
        let harness = report.harness;

        let mapping = self.compile_and_merge(&harness);
        self.ranges.extend_from(&mapping, self.merged.vertex_count());
        self.pick_index.extend(harness.pickable_ids());
        self.properties.collect(&harness);

        let load = LoadReport {
            harness_id: harness.id.clone(),
            rejections: report.rejections,
            compiled: mapping.len(),
            vertex_range: mapping.span(),
        };
        log::info!(
            "loaded harness {}: {} elements compiled, {} rejected, {} vertices in scene",
            load.harness_id,
            load.compiled,
            load.rejections.len(),
            self.merged.vertex_count()
        );

        self.harnesses.push(LoadedHarness { harness, mapping });
        self.rebuild_attributes();
        self.geometry_revision += 1;
        self.touch();
        Ok(load)
    }

    fn compile_and_merge(&mut self, harness: &Harness) -> ElementToVertexMapping {
        let fragments = self
            .compiler
            .compile_harness(harness, self.settings.get(), &self.library);
        self.merger.merge(&mut self.merged, &harness.id, fragments)
    }

    /// Recompile every loaded harness in load order with the current settings
    fn rebuild_geometry(&mut self) {
        self.merged.clear();
        self.ranges.clear();

        let mut harnesses = std::mem::take(&mut self.harnesses);
        for loaded in &mut harnesses {
            loaded.mapping = self.compile_and_merge(&loaded.harness);
            self.ranges.extend_from(&loaded.mapping, self.merged.vertex_count());
        }
        self.harnesses = harnesses;

        self.rebuild_attributes();
        self.geometry_revision += 1;
    }

    /// Drop every harness and everything derived from it
    pub fn clear(&mut self) {
        self.harnesses.clear();
        self.merged.clear();
        self.ranges.clear();
        self.pick_index.clear();
        self.properties.clear();
        self.library.clear();
        self.colors.clear();
        self.disabled.clear();
        self.diff_states.clear();
        self.attributes.reset(0);
        self.picks.update(None);
        self.geometry_revision += 1;
        self.touch();
        log::debug!("session cleared");
    }

    pub fn settings(&self) -> &Settings {
        self.settings.get()
    }

    /// Replace the settings, recompiling loaded harnesses when geometry depends
    /// on the change; returns whether geometry was rebuilt
    pub fn update_settings(&mut self, settings: Settings) -> bool {
        let Some(previous) = self.settings.set(settings) else {
            return false;
        };
        self.touch();
        if self.harnesses.is_empty() || !previous.affects_geometry(self.settings.get()) {
            return false;
        }
        log::info!("geometry settings changed, recompiling {} harnesses", self.harnesses.len());
        self.rebuild_geometry();
        true
    }

    pub fn subscribe_settings(
        &mut self,
        callback: impl FnMut(&Settings) + Send + Sync + 'static,
    ) -> ObserverId {
        self.settings.subscribe(callback)
    }

    pub fn unsubscribe_settings(&mut self, id: ObserverId) -> bool {
        self.settings.unsubscribe(id)
    }

    pub fn library(&self) -> &PartLibrary {
        &self.library
    }

    /// Register a loaded part shape; used from the next compilation on
    pub fn register_part(&mut self, part_number: impl Into<String>, mesh: Mesh) {
        self.library.insert(part_number, mesh);
    }

    fn ensure_loaded(&self, operation: &str) -> Result<()> {
        if self.harnesses.is_empty() {
            log::warn!("{}: no harness loaded", operation);
            return Err(SceneError::NothingLoaded);
        }
        Ok(())
    }

    /// Override element colors; later requests for the same id win
    pub fn apply_colors(&mut self, requests: &[ColorRequest]) -> Result<()> {
        self.ensure_loaded("apply colors")?;
        for request in requests {
            self.colors.insert(request.id.clone(), request.rgba());
        }
        self.update_colors();
        self.touch();
        Ok(())
    }

    /// Back to the default per-kind colors
    pub fn reset_colors(&mut self) {
        if self.colors.is_empty() {
            return;
        }
        self.colors.clear();
        self.update_colors();
        self.touch();
    }

    pub fn set_enabled(&mut self, ids: &[ElementId], enabled: bool) -> Result<()> {
        self.ensure_loaded("set enabled")?;
        for id in ids {
            if enabled {
                self.disabled.remove(id);
            } else {
                self.disabled.insert(id.clone());
            }
        }
        self.update_enabled();
        self.touch();
        Ok(())
    }

    pub fn is_enabled(&self, id: &ElementId) -> bool {
        !self.disabled.contains(id)
    }

    /// Tag elements with diff states; `Unchanged` removes a tag
    pub fn set_diff_states(
        &mut self,
        states: impl IntoIterator<Item = (ElementId, DiffState)>,
    ) -> Result<()> {
        self.ensure_loaded("set diff states")?;
        for (id, state) in states {
            match state {
                DiffState::Unchanged => self.diff_states.remove(&id),
                _ => self.diff_states.insert(id, state),
            };
        }
        self.update_diff_states();
        self.touch();
        Ok(())
    }

    pub fn diff_state(&self, id: &ElementId) -> DiffState {
        self.diff_states.get(id).copied().unwrap_or_default()
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    /// Switch views, returning the previous one
    pub fn set_view(&mut self, view: View) -> Result<View> {
        view.validate()?;
        if let Some(name) = self.view.attribute_name() {
            self.attributes.remove(&name);
        }
        let previous = std::mem::replace(&mut self.view, view);
        self.update_view();
        self.touch();
        log::debug!("view {} -> {}", previous.name, self.view.name);
        Ok(previous)
    }

    /// Recompute the active view's attribute over all cached properties
    pub fn refresh_view(&mut self) {
        self.update_view();
        self.touch();
    }

    /// Vertex colors for the active view
    pub fn display_colors(&self) -> Vec<Rgba> {
        display_colors(&self.view, &self.attributes)
    }

    /// Resolve the element under a cursor position (logical pixels)
    pub fn pick(&mut self, reader: &mut impl PixelReader, x: f32, y: f32) -> Option<ElementId> {
        let ratio = self.settings.get().pixel_ratio;
        let px = (x * ratio).floor().max(0.0) as u32;
        let py = (y * ratio).floor().max(0.0) as u32;
        let pixel = reader.read_pixel(px, py);
        self.pick_pixel(pixel)
    }

    /// Resolve a pixel read from the pick buffer and publish the result
    pub fn pick_pixel(&mut self, pixel: Option<[u8; 4]>) -> Option<ElementId> {
        let picked = pixel.and_then(|rgba| self.pick_index.resolve_pixel(rgba).cloned());
        self.picks.update(picked.clone());
        picked
    }

    pub fn current_pick(&self) -> Option<&ElementId> {
        self.picks.current()
    }

    pub fn subscribe_picks(
        &mut self,
        callback: impl FnMut(&Option<ElementId>) + Send + Sync + 'static,
    ) -> ObserverId {
        self.picks.subscribe(callback)
    }

    pub fn unsubscribe_picks(&mut self, id: ObserverId) -> bool {
        self.picks.unsubscribe(id)
    }

    pub fn pick_index(&self) -> &PickIndex {
        &self.pick_index
    }

    pub fn mesh(&self) -> &MergedMesh {
        &self.merged
    }

    /// World offset of the merged mesh
    pub fn center(&self) -> Vector3<f64> {
        self.merged.center()
    }

    pub fn attributes(&self) -> &VertexAttributes {
        &self.attributes
    }

    pub fn vertex_mapping(&self, harness_id: &ElementId) -> Option<&ElementToVertexMapping> {
        self.harnesses
            .iter()
            .find(|h| &h.harness.id == harness_id)
            .map(|h| &h.mapping)
    }

    pub fn range_of(&self, id: &ElementId) -> Option<VertexRange> {
        self.ranges.get(id)
    }

    pub fn kind_of(&self, id: &ElementId) -> Option<ElementKind> {
        self.harnesses
            .iter()
            .rev()
            .find_map(|h| h.mapping.kind_of(id))
    }

    /// Preprocessed harness as it was compiled
    pub fn harness(&self, harness_id: &ElementId) -> Option<&Harness> {
        self.harnesses
            .iter()
            .find(|h| &h.harness.id == harness_id)
            .map(|h| &h.harness)
    }

    pub fn harness_ids(&self) -> impl Iterator<Item = &ElementId> {
        self.harnesses.iter().map(|h| &h.harness.id)
    }

    pub fn is_empty(&self) -> bool {
        self.harnesses.is_empty()
    }

    /// Bumped on every change a renderer has to pick up
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Bumped only when the merged mesh itself changes
    pub fn geometry_revision(&self) -> u64 {
        self.geometry_revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn rebuild_attributes(&mut self) {
        self.attributes.reset(self.merged.vertex_count());
        self.update_colors();
        self.update_enabled();
        self.update_diff_states();
        self.update_pick_colors();
        self.update_view();
    }

    fn store(&mut self, name: &str, data: AttributeData) {
        if let Err(e) = self.attributes.insert(name, data) {
            log::error!("{}", e);
        }
    }

    fn update_colors(&mut self) {
        let base = self
            .harnesses
            .iter()
            .flat_map(|h| h.mapping.iter())
            .map(|(id, kind, _)| (id, base_color(kind)));
        let overrides = self.colors.iter().map(|(id, c)| (id, *c));
        let colors = apply_mapping(NEUTRAL_COLOR, base.chain(overrides), &self.ranges);
        self.store(COLOR, AttributeData::Vec4(colors));
    }

    fn update_enabled(&mut self) {
        let enabled = apply_mapping(1.0, self.disabled.iter().map(|id| (id, 0.0)), &self.ranges);
        self.store(ENABLED, AttributeData::Scalar(enabled));
    }

    fn update_diff_states(&mut self) {
        let states = apply_mapping(
            DiffState::Unchanged.scalar(),
            self.diff_states.iter().map(|(id, s)| (id, s.scalar())),
            &self.ranges,
        );
        self.store(DIFF_STATE, AttributeData::Scalar(states));
    }

    fn update_pick_colors(&mut self) {
        let colors = apply_mapping(
            pick_vertex_color(0),
            self.pick_index.iter().map(|(number, id)| (id, pick_vertex_color(number))),
            &self.ranges,
        );
        self.store(PICK_COLOR, AttributeData::Vec4(colors));
    }

    fn update_view(&mut self) {
        let Some(name) = self.view.attribute_name() else {
            return;
        };
        match self.view.build_attribute(&self.properties, &self.ranges) {
            Some(data) => self.store(&name, data),
            None => log::error!("view {} has no property mapping", self.view.name),
        }
    }
}

impl Default for HarnessSession {
    fn default() -> Self {
        Self::new()
    }
}
