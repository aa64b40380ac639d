//! Mesh system for harness geometry
//!
//! The session already holds one merged buffer for every loaded harness, so
//! the scene is two entities sharing the same positions:
//! - Display mesh: vertex colors of the active view, lit or unlit material
//! - Pick mesh: encoded pick ids, unlit, on [`PICK_LAYER`] only
//!
//! Geometry changes rebuild both meshes. Overlay changes rewrite the vertex
//! attributes in place.

use crate::picking::PICK_LAYER;
use crate::view::ViewMaterials;
use crate::{log, HarnessScene, SceneUpdateSet};
use bevy::asset::RenderAssetUsages;
use bevy::camera::visibility::RenderLayers;
use bevy::mesh::{Indices, MeshVertexAttribute, PrimitiveTopology};
use bevy::prelude::*;
use bevy::render::render_resource::VertexFormat;
use harness_geometry::Vector3;
use harness_scene::view::{DIFF_STATE, ENABLED, PICK_COLOR};
use harness_scene::{HarnessSession, ShaderKind};

/// Per-vertex enabled flag for custom view shaders
pub const ATTRIBUTE_ENABLED: MeshVertexAttribute =
    MeshVertexAttribute::new("Harness_Enabled", 0x4841_524E_0001, VertexFormat::Float32);

/// Per-vertex diff state for custom view shaders
pub const ATTRIBUTE_DIFF_STATE: MeshVertexAttribute =
    MeshVertexAttribute::new("Harness_DiffState", 0x4841_524E_0002, VertexFormat::Float32);

/// Mesh plugin
pub struct MeshPlugin;

impl Plugin for MeshPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MeshSyncState>()
            .add_systems(Update, sync_scene_mesh_system.after(SceneUpdateSet));
    }
}

/// Session revisions the GPU meshes were last built from
#[derive(Resource, Default)]
pub struct MeshSyncState {
    pub geometry_revision: Option<u64>,
    pub revision: Option<u64>,
}

/// Marker for the displayed harness mesh
#[derive(Component)]
pub struct HarnessMesh;

/// Marker for the id-buffer mesh
#[derive(Component)]
pub struct PickMesh;

/// Convert a Z-up harness vector to Bevy Y-up
#[inline]
pub fn to_bevy_vec(v: Vector3<f64>) -> Vec3 {
    Vec3::new(v.x as f32, v.z as f32, -v.y as f32)
}

/// Convert flattened Z-up triples to Bevy Y-up
fn to_bevy_triples(values: &[f32]) -> Vec<[f32; 3]> {
    values
        .chunks_exact(3)
        .map(|c| [c[0], c[2], -c[1]])
        .collect()
}

fn base_mesh(session: &HarnessSession) -> Option<Mesh> {
    let source = session.mesh().mesh();
    if source.is_empty() {
        return None;
    }

    let positions = to_bevy_triples(&source.positions);
    let normals = if source.normals.len() == source.positions.len() {
        to_bevy_triples(&source.normals)
    } else {
        vec![[0.0, 1.0, 0.0]; positions.len()]
    };

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_indices(Indices::U32(source.indices.clone()));
    Some(mesh)
}

/// Build the displayed mesh with the active view's colors
pub fn build_display_mesh(session: &HarnessSession) -> Option<Mesh> {
    let mut mesh = base_mesh(session)?;
    write_display_attributes(&mut mesh, session);
    Some(mesh)
}

/// Build the id-buffer mesh
pub fn build_pick_mesh(session: &HarnessSession) -> Option<Mesh> {
    let mut mesh = base_mesh(session)?;
    write_pick_attributes(&mut mesh, session);
    Some(mesh)
}

/// Overwrite the view-dependent vertex attributes
pub fn write_display_attributes(mesh: &mut Mesh, session: &HarnessSession) {
    let attributes = session.attributes();
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, session.display_colors());
    if let Some(enabled) = attributes.scalar(ENABLED) {
        mesh.insert_attribute(ATTRIBUTE_ENABLED, enabled.to_vec());
    }
    if let Some(states) = attributes.scalar(DIFF_STATE) {
        mesh.insert_attribute(ATTRIBUTE_DIFF_STATE, states.to_vec());
    }
}

/// Overwrite the encoded pick colors
pub fn write_pick_attributes(mesh: &mut Mesh, session: &HarnessSession) {
    let colors = match session.attributes().vec4(PICK_COLOR) {
        Some(colors) => colors.to_vec(),
        None => {
            log::error!("[Harness] Pick colors missing, id buffer shows background");
            vec![[0.0, 0.0, 0.0, 1.0]; session.attributes().vertex_count()]
        }
    };
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colors);
}

/// System to keep the GPU meshes in step with the session
fn sync_scene_mesh_system(
    mut commands: Commands,
    scene: Res<HarnessScene>,
    mut sync: ResMut<MeshSyncState>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut view_materials: ResMut<ViewMaterials>,
    display: Query<(Entity, &Mesh3d), With<HarnessMesh>>,
    pick: Query<(Entity, &Mesh3d), With<PickMesh>>,
) {
    let session = &scene.session;

    if sync.geometry_revision != Some(session.geometry_revision()) {
        for (entity, _) in display.iter().chain(pick.iter()) {
            commands.entity(entity).despawn();
        }

        let translation = to_bevy_vec(session.center());
        if let (Some(display_mesh), Some(pick_mesh)) =
            (build_display_mesh(session), build_pick_mesh(session))
        {
            log(&format!(
                "[Harness] Uploading {} vertices, {} triangles",
                session.mesh().vertex_count(),
                session.mesh().mesh().triangle_count()
            ));

            let display_material = view_materials.handle(&session.view().shader, &mut materials);
            let pick_material = view_materials.handle(&ShaderKind::Picking, &mut materials);
            commands.spawn((
                Mesh3d(meshes.add(display_mesh)),
                MeshMaterial3d(display_material),
                Transform::from_translation(translation),
                HarnessMesh,
            ));
            commands.spawn((
                Mesh3d(meshes.add(pick_mesh)),
                MeshMaterial3d(pick_material),
                Transform::from_translation(translation),
                RenderLayers::layer(PICK_LAYER),
                PickMesh,
            ));
        }

        sync.geometry_revision = Some(session.geometry_revision());
        sync.revision = Some(session.revision());
        return;
    }

    if sync.revision == Some(session.revision()) {
        return;
    }

    for (_, handle) in display.iter() {
        if let Some(mut mesh) = meshes.get_mut(&handle.0) {
            write_display_attributes(&mut mesh, session);
        }
    }
    for (_, handle) in pick.iter() {
        if let Some(mut mesh) = meshes.get_mut(&handle.0) {
            write_pick_attributes(&mut mesh, session);
        }
    }
    sync.revision = Some(session.revision());
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::mesh::VertexAttributeValues;
    use harness_model::Harness;

    const HARNESS: &str = r#"{
        "id": "h-1",
        "buildingBlocks": [{
            "id": "bb-1",
            "position": [0.0, 0.0, 0.0],
            "rotation": { "u": [1.0, 0.0, 0.0], "v": [0.0, 1.0, 0.0], "w": [0.0, 0.0, 1.0] },
            "members": ["n-1", "n-2", "s-1"]
        }],
        "nodes": [
            { "id": "n-1", "position": [0.0, 0.0, 0.0], "buildingBlockId": "bb-1" },
            { "id": "n-2", "position": [100.0, 0.0, 0.0], "buildingBlockId": "bb-1" }
        ],
        "segments": [{
            "id": "s-1",
            "startNodeId": "n-1",
            "endNodeId": "n-2",
            "centerCurves": [{ "degree": 1, "controlPoints": [[0.0, 0.0, 0.0], [100.0, 0.0, 0.0]] }],
            "virtualLength": 100.0,
            "crossSectionArea": 3.141592653589793,
            "buildingBlockId": "bb-1"
        }]
    }"#;

    #[test]
    fn test_to_bevy_vec_is_y_up() {
        let v = to_bevy_vec(Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(v, Vec3::new(1.0, 3.0, -2.0));
        assert_eq!(to_bevy_triples(&[1.0, 2.0, 3.0, 4.0]), vec![[1.0, 3.0, -2.0]]);
    }

    #[test]
    fn test_empty_session_builds_nothing() {
        let session = HarnessSession::new();
        assert!(build_display_mesh(&session).is_none());
        assert!(build_pick_mesh(&session).is_none());
    }

    #[test]
    fn test_meshes_share_positions() {
        let harness: Harness = serde_json::from_str(HARNESS).unwrap();
        let mut session = HarnessSession::new();
        session.load_harness(&harness).unwrap();

        let display = build_display_mesh(&session).unwrap();
        let pick = build_pick_mesh(&session).unwrap();
        let vertex_count = session.mesh().vertex_count();

        assert_eq!(display.count_vertices(), vertex_count);
        assert_eq!(pick.count_vertices(), vertex_count);
        assert_eq!(
            display.attribute(Mesh::ATTRIBUTE_POSITION).map(|a| a.len()),
            pick.attribute(Mesh::ATTRIBUTE_POSITION).map(|a| a.len())
        );
        assert!(display.attribute(ATTRIBUTE_ENABLED).is_some());

        let Some(VertexAttributeValues::Float32x4(colors)) = pick.attribute(Mesh::ATTRIBUTE_COLOR)
        else {
            panic!("pick mesh has no vertex colors");
        };
        let number = session.pick_index().number_of(&"s-1".into()).unwrap();
        let expected = harness_scene::pick_vertex_color(number);
        assert!(colors.iter().all(|c| *c == expected));
    }
}
