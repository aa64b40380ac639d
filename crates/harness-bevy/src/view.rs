//! View materials
//!
//! Every view is rendered through vertex colors, so a view switch only needs
//! the lit or the unlit material. Handles are created once and cached.

use crate::mesh::HarnessMesh;
use crate::{log, HarnessScene, SceneUpdateSet};
use bevy::prelude::*;
use harness_scene::ShaderKind;
use rustc_hash::FxHashMap;

/// View plugin
pub struct ViewPlugin;

impl Plugin for ViewPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ViewMaterials>()
            .add_systems(Update, apply_view_material_system.after(SceneUpdateSet));
    }
}

/// Material variant a shader kind renders with
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum MaterialKey {
    Lit,
    Unlit,
}

impl From<&ShaderKind> for MaterialKey {
    fn from(shader: &ShaderKind) -> Self {
        if shader.is_lit() {
            MaterialKey::Lit
        } else {
            MaterialKey::Unlit
        }
    }
}

/// Cached material handles per variant
#[derive(Resource, Default)]
pub struct ViewMaterials {
    handles: FxHashMap<MaterialKey, Handle<StandardMaterial>>,
}

impl ViewMaterials {
    /// Material for a shader kind, created on first use
    pub fn handle(
        &mut self,
        shader: &ShaderKind,
        materials: &mut Assets<StandardMaterial>,
    ) -> Handle<StandardMaterial> {
        let key = MaterialKey::from(shader);
        self.handles
            .entry(key)
            .or_insert_with(|| materials.add(material_for(key)))
            .clone()
    }

    pub fn get(&self, key: MaterialKey) -> Option<&Handle<StandardMaterial>> {
        self.handles.get(&key)
    }
}

/// Build the material for a variant
pub fn material_for(key: MaterialKey) -> StandardMaterial {
    match key {
        // Base color multiplies the vertex colors
        MaterialKey::Lit => StandardMaterial {
            base_color: Color::WHITE,
            metallic: 0.0,
            perceptual_roughness: 0.6,
            reflectance: 0.3,
            double_sided: true,
            cull_mode: None,
            ..default()
        },
        // Vertex colors pass through untouched
        MaterialKey::Unlit => StandardMaterial {
            base_color: Color::WHITE,
            unlit: true,
            double_sided: true,
            cull_mode: None,
            fog_enabled: false,
            ..default()
        },
    }
}

/// System to swap the display material when the view's shader changes
fn apply_view_material_system(
    mut commands: Commands,
    scene: Res<HarnessScene>,
    mut view_materials: ResMut<ViewMaterials>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    query: Query<(Entity, &MeshMaterial3d<StandardMaterial>), With<HarnessMesh>>,
) {
    if !scene.is_changed() {
        return;
    }

    let shader = &scene.session.view().shader;
    let handle = view_materials.handle(shader, &mut materials);
    for (entity, material) in query.iter() {
        if material.0 != handle {
            log(&format!(
                "[Harness] View {} uses {:?} material",
                scene.session.view().name,
                MaterialKey::from(shader)
            ));
            commands.entity(entity).insert(MeshMaterial3d(handle.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_key_follows_lighting() {
        assert_eq!(MaterialKey::from(&ShaderKind::Shaded), MaterialKey::Lit);
        assert_eq!(MaterialKey::from(&ShaderKind::Diff), MaterialKey::Lit);
        assert_eq!(MaterialKey::from(&ShaderKind::Picking), MaterialKey::Unlit);
    }

    #[test]
    fn test_handles_are_cached() {
        let mut assets = Assets::<StandardMaterial>::default();
        let mut view_materials = ViewMaterials::default();

        let a = view_materials.handle(&ShaderKind::Shaded, &mut assets);
        let b = view_materials.handle(&ShaderKind::Diff, &mut assets);
        let c = view_materials.handle(&ShaderKind::Picking, &mut assets);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(material_for(MaterialKey::Unlit).unlit);
        assert_eq!(view_materials.get(MaterialKey::Lit), Some(&a));
    }
}
