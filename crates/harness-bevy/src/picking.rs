//! Id-buffer picking
//!
//! The pick mesh carries every element's pick number as an unlit vertex
//! color on its own render layer. A second camera follows the host camera and
//! renders just the pixel under the cursor into a 1x1 image, which is read
//! back from the GPU and decoded by the session.
//!
//! Cursor moves are debounced and at most one readback is in flight.

use crate::{log, HarnessCamera, HarnessScene, PickChanged};
use bevy::asset::RenderAssetUsages;
use bevy::camera::visibility::RenderLayers;
use bevy::camera::{ClearColorConfig, RenderTarget, SubCameraView};
use bevy::core_pipeline::tonemapping::{DebandDither, Tonemapping};
use bevy::prelude::*;
use bevy::render::gpu_readback::{Readback, ReadbackComplete};
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat, TextureUsages};
use bevy::render::view::Hdr;
use bevy::window::{CursorLeft, CursorMoved, PrimaryWindow};
use harness_model::ElementId;
use harness_scene::{Debounce, DEFAULT_DEBOUNCE_MS};

/// Render layer only the pick camera sees
pub const PICK_LAYER: usize = 31;

/// Picking plugin
pub struct PickingPlugin;

impl Plugin for PickingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PickingSettings>()
            .init_resource::<PickState>()
            .add_systems(Startup, setup_pick_camera)
            .add_systems(
                Update,
                (
                    follow_camera_system,
                    cursor_system,
                    request_pick_system,
                )
                    .chain(),
            );
    }
}

/// Picking settings
#[derive(Resource)]
pub struct PickingSettings {
    /// Whether picking is enabled
    pub enabled: bool,
    /// Quiet time after the last cursor move before a pick is rendered
    pub debounce_ms: f64,
}

impl Default for PickingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

/// Pending and in-flight pick requests
#[derive(Resource, Default)]
pub struct PickState {
    /// Cursor positions in logical pixels
    pub cursor: Debounce<Vec2>,
    /// Readback entity of the pick being resolved
    pub in_flight: Option<Entity>,
}

/// Marker for the off-screen id-buffer camera
#[derive(Component)]
pub struct PickCamera;

/// 1x1 render target of the pick camera
#[derive(Resource)]
pub struct PickTarget(pub Handle<Image>);

/// Create the pick target image
pub fn pick_target_image() -> Image {
    let mut image = Image::new_fill(
        Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        &[0, 0, 0, 255],
        // Linear target so bytes equal the encoded id
        TextureFormat::Rgba8Unorm,
        RenderAssetUsages::default(),
    );
    image.texture_descriptor.usage =
        TextureUsages::COPY_SRC | TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING;
    image
}

/// Sub view selecting the physical pixel under a logical cursor position
///
/// Returns `None` when the cursor is outside the window.
pub fn pick_sub_view(cursor: Vec2, scale_factor: f32, physical_size: UVec2) -> Option<SubCameraView> {
    let pixel = (cursor * scale_factor).floor();
    if pixel.x < 0.0
        || pixel.y < 0.0
        || pixel.x >= physical_size.x as f32
        || pixel.y >= physical_size.y as f32
    {
        return None;
    }
    Some(SubCameraView {
        full_size: physical_size,
        offset: pixel,
        size: UVec2::ONE,
    })
}

/// First RGBA pixel of a readback buffer
pub fn readback_pixel(data: &[u8]) -> Option<[u8; 4]> {
    data.get(..4)?.try_into().ok()
}

/// Startup system to spawn the inactive pick camera
fn setup_pick_camera(mut commands: Commands, mut images: ResMut<Assets<Image>>) {
    let target = images.add(pick_target_image());

    commands.spawn((
        Camera3d::default(),
        Camera {
            order: -1,
            is_active: false,
            // Background decodes to pick number 0
            clear_color: ClearColorConfig::Custom(Color::BLACK),
            ..default()
        },
        RenderTarget::Image(target.clone().into()),
        // Float intermediate target keeps the 8-bit ids exact
        Hdr,
        Tonemapping::None,
        DebandDither::Disabled,
        Msaa::Off,
        RenderLayers::layer(PICK_LAYER),
        Transform::default(),
        Projection::default(),
        PickCamera,
    ));
    commands.insert_resource(PickTarget(target));
}

/// System to keep the pick camera aligned with the host camera
fn follow_camera_system(
    host: Query<(&Transform, &Projection), (With<HarnessCamera>, Without<PickCamera>)>,
    mut pick: Query<(&mut Transform, &mut Projection), With<PickCamera>>,
) {
    let Ok((host_transform, host_projection)) = host.single() else {
        return;
    };
    for (mut transform, mut projection) in pick.iter_mut() {
        *transform = *host_transform;
        *projection = host_projection.clone();
    }
}

/// System to feed cursor moves into the debounce
fn cursor_system(
    mut moves: MessageReader<CursorMoved>,
    mut leaves: MessageReader<CursorLeft>,
    time: Res<Time<Real>>,
    settings: Res<PickingSettings>,
    mut state: ResMut<PickState>,
    mut scene: ResMut<HarnessScene>,
    mut picks: MessageWriter<PickChanged>,
) {
    if settings.is_changed() {
        state.cursor.set_delay_ms(settings.debounce_ms);
    }
    if !settings.enabled {
        moves.clear();
        leaves.clear();
        return;
    }

    let now_ms = time.elapsed_secs_f64() * 1000.0;
    for moved in moves.read() {
        state.cursor.push(moved.position, now_ms);
    }

    if leaves.read().count() > 0 {
        state.cursor.cancel();
        publish_pick(&mut scene, None, &mut picks);
    }
}

/// System to render the id buffer under the settled cursor
fn request_pick_system(
    mut commands: Commands,
    time: Res<Time<Real>>,
    mut state: ResMut<PickState>,
    mut scene: ResMut<HarnessScene>,
    target: Option<Res<PickTarget>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut cameras: Query<&mut Camera, With<PickCamera>>,
    mut picks: MessageWriter<PickChanged>,
) {
    if state.in_flight.is_some() {
        return;
    }
    let Some(cursor) = state.cursor.poll(time.elapsed_secs_f64() * 1000.0) else {
        return;
    };
    let (Some(target), Ok(window)) = (target, windows.single()) else {
        return;
    };

    if scene.session.is_empty() {
        publish_pick(&mut scene, None, &mut picks);
        return;
    }
    let Some(sub_view) = pick_sub_view(cursor, window.scale_factor(), window.physical_size())
    else {
        publish_pick(&mut scene, None, &mut picks);
        return;
    };

    for mut camera in cameras.iter_mut() {
        camera.sub_camera_view = Some(sub_view);
        camera.is_active = true;
    }

    let readback = commands
        .spawn(Readback::texture(target.0.clone()))
        .observe(on_pick_readback)
        .id();
    state.in_flight = Some(readback);
}

/// Observer decoding the read-back pixel
fn on_pick_readback(
    event: On<ReadbackComplete>,
    mut commands: Commands,
    mut state: ResMut<PickState>,
    mut scene: ResMut<HarnessScene>,
    mut cameras: Query<&mut Camera, With<PickCamera>>,
    mut picks: MessageWriter<PickChanged>,
) {
    // A readback repeats every frame until its entity is gone
    if state.in_flight != Some(event.entity) {
        return;
    }
    state.in_flight = None;
    commands.entity(event.entity).despawn();
    for mut camera in cameras.iter_mut() {
        camera.is_active = false;
    }

    let pixel = readback_pixel(&event.data);
    if pixel.is_none() {
        log::warn!("[Harness] Pick readback returned {} bytes", event.data.len());
    }
    publish_pick(&mut scene, pixel, &mut picks);
}

/// Resolve a pixel in the session and announce a changed pick
fn publish_pick(
    scene: &mut HarnessScene,
    pixel: Option<[u8; 4]>,
    picks: &mut MessageWriter<PickChanged>,
) -> Option<ElementId> {
    let before = scene.session.current_pick().cloned();
    let picked = scene.session.pick_pixel(pixel);
    if picked != before {
        log(&format!("[Harness] Picked {:?}", picked));
        picks.write(PickChanged { id: picked.clone() });
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_view_scales_to_physical_pixels() {
        let view = pick_sub_view(Vec2::new(10.4, 20.9), 2.0, UVec2::new(1600, 1200)).unwrap();
        assert_eq!(view.offset, Vec2::new(20.0, 41.0));
        assert_eq!(view.size, UVec2::ONE);
        assert_eq!(view.full_size, UVec2::new(1600, 1200));
    }

    #[test]
    fn test_sub_view_outside_window() {
        let size = UVec2::new(800, 600);
        assert!(pick_sub_view(Vec2::new(-1.0, 5.0), 1.0, size).is_none());
        assert!(pick_sub_view(Vec2::new(800.0, 5.0), 1.0, size).is_none());
        assert!(pick_sub_view(Vec2::new(799.0, 599.0), 1.0, size).is_some());
    }

    #[test]
    fn test_readback_pixel() {
        // Rows are padded, only the first pixel matters
        let mut data = vec![0u8; 256];
        data[..4].copy_from_slice(&[0, 1, 2, 255]);
        assert_eq!(readback_pixel(&data), Some([0, 1, 2, 255]));
        assert_eq!(readback_pixel(&[1, 2]), None);
    }

    #[test]
    fn test_target_is_linear_and_copyable() {
        let image = pick_target_image();
        assert_eq!(image.texture_descriptor.format, TextureFormat::Rgba8Unorm);
        assert!(image.texture_descriptor.usage.contains(TextureUsages::COPY_SRC));
        assert_eq!(image.texture_descriptor.size.width, 1);
    }
}
