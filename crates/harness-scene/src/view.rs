// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Views: a shader variant plus an optional mapped element property
//!
//! A view never touches geometry. Switching views swaps the material and the
//! one view-specific vertex attribute; every other overlay attribute stays in
//! place.

use crate::error::{Result, SceneError};
use crate::mapping::apply_mapping;
use crate::merge::RangeTable;
use crate::style::{self, DiffState, Rgba};
use harness_model::{ElementId, Harness, ViewProperties};
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Per-element overlay colors (RGBA)
pub const COLOR: &str = "color";
/// 1.0 for enabled vertices, 0.0 for disabled ones
pub const ENABLED: &str = "enabled";
/// [`DiffState::scalar`] per vertex
pub const DIFF_STATE: &str = "diff_state";
/// Encoded pick ids (RGBA, alpha 1)
pub const PICK_COLOR: &str = "pick_color";

/// Per-vertex input a shader variant reads
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AttributeSlot {
    Color,
    Enabled,
    DiffState,
    PickColor,
    /// RGB produced by the active view's mapper
    ViewColor,
    /// Scalar produced by the active view's mapper
    ViewScalar,
}

/// Shader variants a renderer has to provide
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub enum ShaderKind {
    /// Lit, overlay colors
    #[default]
    Shaded,
    /// Lit, colored by diff state
    Diff,
    /// Lit, colored by a mapped RGB property
    PropertyColor,
    /// Lit, mapped scalar in `[0, 1]` blended from `low` to `high`
    PropertyRamp { low: Rgba, high: Rgba },
    /// Unlit encoded pick ids
    Picking,
}

impl ShaderKind {
    pub fn required_attributes(&self) -> &'static [AttributeSlot] {
        match self {
            ShaderKind::Shaded => &[AttributeSlot::Color, AttributeSlot::Enabled],
            ShaderKind::Diff => &[AttributeSlot::DiffState, AttributeSlot::Enabled],
            ShaderKind::PropertyColor => &[AttributeSlot::ViewColor, AttributeSlot::Enabled],
            ShaderKind::PropertyRamp { .. } => &[AttributeSlot::ViewScalar, AttributeSlot::Enabled],
            ShaderKind::Picking => &[AttributeSlot::PickColor],
        }
    }

    pub fn is_lit(&self) -> bool {
        !matches!(self, ShaderKind::Picking)
    }
}

/// Maps a property string to a vertex value
#[derive(Clone)]
pub enum PropertyMapper {
    Rgb(Arc<dyn Fn(&str) -> [f32; 3] + Send + Sync>),
    Scalar(Arc<dyn Fn(&str) -> f32 + Send + Sync>),
}

impl PropertyMapper {
    pub fn rgb(f: impl Fn(&str) -> [f32; 3] + Send + Sync + 'static) -> Self {
        Self::Rgb(Arc::new(f))
    }

    pub fn scalar(f: impl Fn(&str) -> f32 + Send + Sync + 'static) -> Self {
        Self::Scalar(Arc::new(f))
    }

    fn slot(&self) -> AttributeSlot {
        match self {
            PropertyMapper::Rgb(_) => AttributeSlot::ViewColor,
            PropertyMapper::Scalar(_) => AttributeSlot::ViewScalar,
        }
    }
}

impl fmt::Debug for PropertyMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyMapper::Rgb(_) => f.write_str("PropertyMapper::Rgb"),
            PropertyMapper::Scalar(_) => f.write_str("PropertyMapper::Scalar"),
        }
    }
}

/// Element property pushed into a view attribute
#[derive(Clone, Debug)]
pub struct PropertyMapping {
    pub key: String,
    /// Used for elements without the property and for unclaimed vertices
    pub default: String,
    pub mapper: PropertyMapper,
}

/// Named shader variant with an optional property overlay
#[derive(Clone, Debug)]
pub struct View {
    pub name: String,
    pub shader: ShaderKind,
    pub mapping: Option<PropertyMapping>,
}

impl View {
    pub fn new(name: impl Into<String>, shader: ShaderKind) -> Self {
        Self {
            name: name.into(),
            shader,
            mapping: None,
        }
    }

    pub fn with_mapping(
        mut self,
        key: impl Into<String>,
        default: impl Into<String>,
        mapper: PropertyMapper,
    ) -> Self {
        self.mapping = Some(PropertyMapping {
            key: key.into(),
            default: default.into(),
            mapper,
        });
        self
    }

    /// Plain overlay colors
    pub fn base() -> Self {
        Self::new("base", ShaderKind::Shaded)
    }

    pub fn diff() -> Self {
        Self::new("diff", ShaderKind::Diff)
    }

    /// Name of the vertex attribute this view writes
    pub fn attribute_name(&self) -> Option<String> {
        self.mapping.as_ref().map(|m| format!("view_{}", m.key))
    }

    /// Check that the mapper produces what the shader reads
    pub fn validate(&self) -> Result<()> {
        let needed = self
            .shader
            .required_attributes()
            .iter()
            .find(|slot| matches!(slot, AttributeSlot::ViewColor | AttributeSlot::ViewScalar));
        let Some(&needed) = needed else {
            return Ok(());
        };
        match &self.mapping {
            Some(m) if m.mapper.slot() == needed => Ok(()),
            Some(m) => Err(SceneError::attribute_format(
                format!("view_{}", m.key),
                format!("{:?}", needed),
                format!("{:?}", m.mapper.slot()),
            )),
            None => Err(SceneError::attribute_format(
                &self.name,
                format!("{:?}", needed),
                "no property mapping",
            )),
        }
    }

    /// Map the cached properties into a dense view attribute
    pub fn build_attribute(
        &self,
        cache: &ViewPropertyCache,
        ranges: &RangeTable,
    ) -> Option<AttributeData> {
        let mapping = self.mapping.as_ref()?;
        let values = cache.values(&mapping.key);
        let data = match &mapping.mapper {
            PropertyMapper::Rgb(f) => AttributeData::Vec3(apply_mapping(
                f(mapping.default.as_str()),
                values.map(|(id, v)| (id, f(v))),
                ranges,
            )),
            PropertyMapper::Scalar(f) => AttributeData::Scalar(apply_mapping(
                f(mapping.default.as_str()),
                values.map(|(id, v)| (id, f(v))),
                ranges,
            )),
        };
        Some(data)
    }
}

impl Default for View {
    fn default() -> Self {
        Self::base()
    }
}

/// View properties of every loaded element, collected once per harness load
#[derive(Debug, Clone, Default)]
pub struct ViewPropertyCache {
    entries: Vec<(ElementId, ViewProperties)>,
    index: FxHashMap<ElementId, usize>,
}

impl ViewPropertyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the properties of a harness; a known id takes the newer properties
    pub fn collect(&mut self, harness: &Harness) {
        for (id, properties) in harness.view_properties() {
            match self.index.get(id) {
                Some(&i) => self.entries[i].1 = properties.clone(),
                None => {
                    self.index.insert(id.clone(), self.entries.len());
                    self.entries.push((id.clone(), properties.clone()));
                }
            }
        }
    }

    pub fn get(&self, id: &ElementId) -> Option<&ViewProperties> {
        self.index.get(id).map(|&i| &self.entries[i].1)
    }

    /// `(id, value)` for every element carrying `key`, in load order
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = (&'a ElementId, &'a str)> + 'a {
        self.entries
            .iter()
            .filter_map(move |(id, props)| props.get(key).map(|v| (id, v.as_str())))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

/// Dense per-vertex values of one attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeData {
    Scalar(Vec<f32>),
    Vec3(Vec<[f32; 3]>),
    Vec4(Vec<[f32; 4]>),
}

impl AttributeData {
    pub fn len(&self) -> usize {
        match self {
            AttributeData::Scalar(v) => v.len(),
            AttributeData::Vec3(v) => v.len(),
            AttributeData::Vec4(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn components(&self) -> usize {
        match self {
            AttributeData::Scalar(_) => 1,
            AttributeData::Vec3(_) => 3,
            AttributeData::Vec4(_) => 4,
        }
    }
}

/// Named per-vertex attributes over the merged mesh
#[derive(Debug, Clone, Default)]
pub struct VertexAttributes {
    vertex_count: usize,
    data: FxHashMap<String, AttributeData>,
}

impl VertexAttributes {
    pub fn new(vertex_count: usize) -> Self {
        Self {
            vertex_count,
            data: FxHashMap::default(),
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Store an attribute; its length must match the vertex count
    pub fn insert(&mut self, name: impl Into<String>, data: AttributeData) -> Result<()> {
        let name = name.into();
        if data.len() != self.vertex_count {
            return Err(SceneError::attribute_format(
                name,
                format!("{} vertices", self.vertex_count),
                format!("{} vertices", data.len()),
            ));
        }
        self.data.insert(name, data);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<AttributeData> {
        self.data.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&AttributeData> {
        self.data.get(name)
    }

    pub fn scalar(&self, name: &str) -> Option<&[f32]> {
        match self.data.get(name)? {
            AttributeData::Scalar(v) => Some(v),
            _ => None,
        }
    }

    pub fn vec3(&self, name: &str) -> Option<&[[f32; 3]]> {
        match self.data.get(name)? {
            AttributeData::Vec3(v) => Some(v),
            _ => None,
        }
    }

    pub fn vec4(&self, name: &str) -> Option<&[[f32; 4]]> {
        match self.data.get(name)? {
            AttributeData::Vec4(v) => Some(v),
            _ => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.data.contains_key(name)
    }

    /// Drop every attribute and adopt a new vertex count
    pub fn reset(&mut self, vertex_count: usize) {
        self.data.clear();
        self.vertex_count = vertex_count;
    }
}

/// Final vertex colors for a view as a renderer without custom shaders shows them
///
/// Missing inputs fall back to the neutral color with an error log. Disabled
/// vertices are dimmed in every lit variant.
pub fn display_colors(view: &View, attributes: &VertexAttributes) -> Vec<Rgba> {
    let n = attributes.vertex_count();
    let missing = |name: &str| {
        log::error!("view {} needs attribute {}, which is not built", view.name, name);
        vec![style::NEUTRAL_COLOR; n]
    };

    let mut colors = match view.shader {
        ShaderKind::Shaded => match attributes.vec4(COLOR) {
            Some(c) => c.to_vec(),
            None => missing(COLOR),
        },
        ShaderKind::Diff => match attributes.scalar(DIFF_STATE) {
            Some(s) => s.iter().map(|&v| DiffState::from_scalar(v).color()).collect(),
            None => missing(DIFF_STATE),
        },
        ShaderKind::PropertyColor => {
            let name = view.attribute_name().unwrap_or_default();
            match attributes.vec3(&name) {
                Some(c) => c.iter().map(|&[r, g, b]| [r, g, b, 1.0]).collect(),
                None => missing(&name),
            }
        }
        ShaderKind::PropertyRamp { low, high } => {
            let name = view.attribute_name().unwrap_or_default();
            match attributes.scalar(&name) {
                Some(s) => s.iter().map(|&t| style::lerp(low, high, t)).collect(),
                None => missing(&name),
            }
        }
        ShaderKind::Picking => match attributes.vec4(PICK_COLOR) {
            Some(c) => c.to_vec(),
            None => missing(PICK_COLOR),
        },
    };

    if view.shader.is_lit() {
        if let Some(enabled) = attributes.scalar(ENABLED) {
            for (color, &on) in colors.iter_mut().zip(enabled) {
                if on < 0.5 {
                    *color = style::dimmed(*color);
                }
            }
        }
    }
    colors
}
