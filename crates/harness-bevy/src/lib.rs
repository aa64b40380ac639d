//! Harness Bevy 3D Viewer
//!
//! Bevy renderer for a [`HarnessSession`]: uploads the merged mesh, shows the
//! active view through vertex colors and resolves the element under the
//! cursor with an off-screen id buffer.
//!
//! Camera controls, UI and file loading belong to the host app. It tags its
//! camera with [`HarnessCamera`] and talks to the plugin through messages.

pub mod mesh;
pub mod picking;
pub mod view;

use bevy::prelude::*;
use harness_model::{ElementId, Harness};
use harness_scene::{ColorRequest, DiffState, HarnessSession, View};
use std::sync::atomic::{AtomicBool, Ordering};

/// Global debug mode flag (set from the DEBUG env var)
static DEBUG_MODE: AtomicBool = AtomicBool::new(false);

/// Check if debug mode is enabled
pub fn is_debug() -> bool {
    DEBUG_MODE.load(Ordering::Relaxed)
}

/// Enable debug output when the DEBUG env var is set
pub fn init_debug_from_env() {
    if std::env::var("DEBUG").is_ok() {
        DEBUG_MODE.store(true, Ordering::Relaxed);
    }
}

// Re-exports
pub use mesh::{HarnessMesh, MeshPlugin};
pub use picking::{PickCamera, PickingPlugin, PickingSettings};
pub use view::{ViewMaterials, ViewPlugin};

/// Main harness viewer plugin - combines all subsystems
pub struct HarnessViewerPlugin;

impl Plugin for HarnessViewerPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<HarnessScene>()
            .add_message::<LoadHarness>()
            .add_message::<ClearHarnesses>()
            .add_message::<ApplyColors>()
            .add_message::<SetEnabled>()
            .add_message::<SetDiffStates>()
            .add_message::<SetView>()
            .add_message::<PickChanged>()
            .add_plugins((ViewPlugin, MeshPlugin, PickingPlugin))
            .add_systems(Update, handle_scene_messages.in_set(SceneUpdateSet));
    }
}

/// Systems that mutate the session; mesh sync runs after them
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SceneUpdateSet;

/// Session state shared by all harness systems
#[derive(Resource, Default)]
pub struct HarnessScene {
    pub session: HarnessSession,
}

/// Marker for the host camera the id buffer follows
#[derive(Component, Default)]
pub struct HarnessCamera;

/// Message to load a harness into the scene
#[derive(Message)]
pub struct LoadHarness {
    pub harness: Harness,
}

/// Message to drop every loaded harness
#[derive(Message)]
pub struct ClearHarnesses;

/// Message to override element colors; `reset` restores the kind colors first
#[derive(Message)]
pub struct ApplyColors {
    pub requests: Vec<ColorRequest>,
    pub reset: bool,
}

/// Message to enable or disable elements
#[derive(Message)]
pub struct SetEnabled {
    pub ids: Vec<ElementId>,
    pub enabled: bool,
}

/// Message to tag elements with diff states
#[derive(Message)]
pub struct SetDiffStates {
    pub states: Vec<(ElementId, DiffState)>,
}

/// Message to switch the active view
#[derive(Message)]
pub struct SetView(pub View);

/// Message emitted when the element under the cursor changes
#[derive(Message, Clone, Debug, PartialEq)]
pub struct PickChanged {
    pub id: Option<ElementId>,
}

/// System to apply scene messages to the session
fn handle_scene_messages(
    mut scene: ResMut<HarnessScene>,
    mut loads: MessageReader<LoadHarness>,
    mut clears: MessageReader<ClearHarnesses>,
    mut colors: MessageReader<ApplyColors>,
    mut enables: MessageReader<SetEnabled>,
    mut diffs: MessageReader<SetDiffStates>,
    mut views: MessageReader<SetView>,
) {
    if loads.is_empty()
        && clears.is_empty()
        && colors.is_empty()
        && enables.is_empty()
        && diffs.is_empty()
        && views.is_empty()
    {
        return;
    }
    let session = &mut scene.session;

    if clears.read().count() > 0 {
        session.clear();
        log_info("[Harness] Scene cleared");
    }

    for LoadHarness { harness } in loads.read() {
        match session.load_harness(harness) {
            Ok(report) => {
                log_info(&format!(
                    "[Harness] Loaded {}: {} elements, {} rejected",
                    report.harness_id,
                    report.compiled,
                    report.rejections.len()
                ));
                for rejection in &report.rejections {
                    log(&format!("[Harness]   {}", rejection));
                }
            }
            Err(e) => log::warn!("[Harness] Load failed: {}", e),
        }
    }

    for request in colors.read() {
        if request.reset {
            session.reset_colors();
        }
        if let Err(e) = session.apply_colors(&request.requests) {
            log::warn!("[Harness] Colors not applied: {}", e);
        }
    }

    for request in enables.read() {
        if let Err(e) = session.set_enabled(&request.ids, request.enabled) {
            log::warn!("[Harness] Enabled state not applied: {}", e);
        }
    }

    for request in diffs.read() {
        if let Err(e) = session.set_diff_states(request.states.iter().cloned()) {
            log::warn!("[Harness] Diff states not applied: {}", e);
        }
    }

    for SetView(view) in views.read() {
        match session.set_view(view.clone()) {
            Ok(previous) => log(&format!("[Harness] View {} -> {}", previous.name, view.name)),
            Err(e) => log::warn!("[Harness] View {} rejected: {}", view.name, e),
        }
    }
}

/// Log to stdout - only in debug mode
pub fn log(msg: &str) {
    if is_debug() {
        println!("{}", msg);
    }
}

/// Log info that should always be shown
pub fn log_info(msg: &str) {
    println!("{}", msg);
}

/// Run a native viewer window showing the given harnesses
pub fn run_native(harnesses: Vec<Harness>) {
    init_debug_from_env();

    let mut scene = HarnessScene::default();
    for harness in &harnesses {
        if let Err(e) = scene.session.load_harness(harness) {
            log::warn!("[Harness] Load failed: {}", e);
        }
    }

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Harness Viewer".to_string(),
                resolution: (1280u32, 720u32).into(),
                ..default()
            }),
            ..default()
        }))
        .insert_resource(ClearColor(Color::srgb(0.1, 0.1, 0.15)))
        .insert_resource(scene)
        .add_plugins(HarnessViewerPlugin)
        .add_systems(Startup, setup_viewer)
        .run();
}

/// Spawn a light and a camera framing the loaded scene
fn setup_viewer(mut commands: Commands, scene: Res<HarnessScene>) {
    let (target, distance) = match scene.session.mesh().bounds() {
        Some((min, max)) => {
            let center = mesh::to_bevy_vec((min + max) * 0.5);
            let diagonal = (max - min).norm() as f32;
            (center, diagonal.max(100.0))
        }
        None => (Vec3::ZERO, 500.0),
    };

    commands.spawn((
        DirectionalLight {
            illuminance: 8000.0,
            ..default()
        },
        Transform::from_xyz(1.0, 2.0, 1.5).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    commands.spawn((
        Camera3d::default(),
        Transform::from_translation(target + Vec3::new(0.6, 0.5, 0.6).normalize() * distance)
            .looking_at(target, Vec3::Y),
        HarnessCamera,
    ));
}
