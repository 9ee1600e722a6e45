use std::f32::consts::FRAC_PI_2;

use bevy::ecs::event::Events;
use bevy::ecs::system::RunSystemOnce;
use bevy::prelude::*;

use crate::animation::{Animator, DOOR_GRAPH, OPEN, PLAYER_GRAPH};
use crate::camera::{CameraRig, MainCamera};
use crate::components::{ExitDoor, GameplaySet, HeadlessMode, LevelEntity, Player, SfxEmitter, Tags};
use crate::config::GameConfig;
use crate::controller::{Locomotion, PlayerSchedule};
use crate::hint::HintDisplay;
use crate::level::LevelLoaded;
use crate::torch::{Torch, TorchFlame};
use crate::triggers::{TriggerSensor, TriggerVolume};
use crate::wiring::{wire_player_controller, ControllerLinks};

const CAMERA_OFFSET: Vec3 = Vec3::new(0.0, 9.0, 9.0);
const PLAYER_HALF_EXTENTS: Vec3 = Vec3::new(0.4, 1.0, 0.4);
const TORCH_ZONE_HALF_EXTENTS: Vec3 = Vec3::new(1.5, 1.5, 1.5);
const DOOR_ZONE_HALF_EXTENTS: Vec3 = Vec3::new(2.0, 2.0, 1.0);

/// Swinging part of the exit door, rotated about its hinge once `Open` is set.
#[derive(Component)]
pub struct DoorLeaf;

pub struct ScenePlugin;

impl Plugin for ScenePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_puzzle_level).add_systems(
            Update,
            (
                swing_exit_door.in_set(GameplaySet::Present),
                rebuild_level_on_load.after(GameplaySet::Present),
            ),
        );
    }
}

fn vec3(v: [f32; 3]) -> Vec3 {
    Vec3::from_array(v)
}

/// Meshes and materials are only available with the render plugins.
struct Palette<'a> {
    meshes: ResMut<'a, Assets<Mesh>>,
    materials: ResMut<'a, Assets<StandardMaterial>>,
}

impl Palette<'_> {
    fn solid(&mut self, mesh: impl Into<Mesh>, color: Color) -> (Mesh3d, MeshMaterial3d<StandardMaterial>) {
        (
            Mesh3d(self.meshes.add(mesh)),
            MeshMaterial3d(self.materials.add(color)),
        )
    }
}

fn spawn_puzzle_level(
    mut commands: Commands,
    config: Res<GameConfig>,
    headless: Option<Res<HeadlessMode>>,
    meshes: Option<ResMut<Assets<Mesh>>>,
    materials: Option<ResMut<Assets<StandardMaterial>>>,
) {
    let windowed = !headless.map_or(true, |h| h.0);
    let mut palette = match (windowed, meshes, materials) {
        (true, Some(meshes), Some(materials)) => Some(Palette { meshes, materials }),
        _ => None,
    };
    let layout = &config.layout;
    let names = &config.names;
    let tags = &config.tags;

    let spawn = vec3(layout.player_spawn);
    let mut player = commands.spawn((
        Name::new("Player"),
        Player,
        LevelEntity,
        Transform::from_translation(spawn),
        Locomotion::default(),
        PlayerSchedule::default(),
        Animator::new(PLAYER_GRAPH, "idle"),
        SfxEmitter::new("fire_ignite").with_cue("anim:fire_ignite"),
        TriggerSensor::new(PLAYER_HALF_EXTENTS),
    ));
    if let Some(p) = palette.as_mut() {
        player.insert(p.solid(Capsule3d::new(0.4, 1.0), Color::srgb(0.2, 0.4, 0.9)));
    }

    for (index, position) in layout.torches.iter().enumerate() {
        let mut torch = commands.spawn((
            Name::new(format!("Torch.{index:03}")),
            Torch::new(index as u32),
            LevelEntity,
            TriggerVolume::new(TORCH_ZONE_HALF_EXTENTS),
            Tags::new([tags.torch_zone.as_str()]),
            Transform::from_translation(vec3(*position)),
            Visibility::default(),
        ));
        if let Some(p) = palette.as_mut() {
            let post = p.solid(Cylinder::new(0.15, 1.5), Color::srgb(0.35, 0.25, 0.15));
            torch.with_children(|parent| {
                parent.spawn((post, Transform::from_xyz(0.0, 0.75, 0.0)));
                parent.spawn((
                    TorchFlame,
                    PointLight {
                        color: Color::srgb(1.0, 0.6, 0.2),
                        intensity: 80_000.0,
                        range: 8.0,
                        shadows_enabled: true,
                        ..default()
                    },
                    Transform::from_xyz(0.0, 1.7, 0.0),
                    Visibility::Hidden,
                ));
            });
        }
    }

    let mut door = commands.spawn((
        Name::new(names.exit_door.clone()),
        ExitDoor,
        LevelEntity,
        Animator::new(DOOR_GRAPH, "closed"),
        SfxEmitter::new("door_open"),
        TriggerVolume::new(DOOR_ZONE_HALF_EXTENTS),
        Tags::new([tags.door.as_str()]),
        Transform::from_translation(vec3(layout.exit_door)),
        Visibility::default(),
    ));
    let leaf = palette
        .as_mut()
        .map(|p| p.solid(Cuboid::new(2.0, 3.0, 0.2), Color::srgb(0.4, 0.3, 0.2)));
    door.with_children(|parent| {
        // hinge sits on the left edge; the leaf mesh is offset from it
        parent
            .spawn((
                DoorLeaf,
                Transform::from_xyz(-1.0, 0.0, 0.0),
                Visibility::default(),
            ))
            .with_children(|hinge| {
                if let Some(leaf) = leaf {
                    hinge.spawn((leaf, Transform::from_xyz(1.0, 1.5, 0.0)));
                }
            });
    });

    if let Some(zone) = &layout.hint_zone {
        commands.spawn((
            Name::new("HintZone"),
            LevelEntity,
            TriggerVolume::new(vec3(zone.half_extents)),
            Tags::new([tags.hint_zone.as_str()]),
            Transform::from_translation(vec3(zone.center)),
        ));
    }

    let mut hint = commands.spawn((
        Name::new(names.hint.clone()),
        LevelEntity,
        HintDisplay::new(layout.hint_text.clone()),
        Visibility::Hidden,
    ));
    if windowed {
        hint.insert((
            Text::new(layout.hint_text.clone()),
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(24.0),
                bottom: Val::Px(24.0),
                ..default()
            },
        ));
    }

    let mut camera = commands.spawn((
        Name::new(names.camera.clone()),
        MainCamera,
        LevelEntity,
        CameraRig::new(CAMERA_OFFSET),
        Transform::from_translation(spawn + CAMERA_OFFSET).looking_at(spawn, Vec3::Y),
    ));
    if windowed {
        camera.insert(Camera3d::default());
    }

    if let Some(p) = palette.as_mut() {
        commands.spawn((
            p.solid(Plane3d::default().mesh().size(40.0, 40.0), Color::srgb(0.15, 0.15, 0.17)),
            LevelEntity,
            Transform::default(),
        ));
        commands.spawn((
            DirectionalLight {
                illuminance: 1_500.0,
                ..default()
            },
            LevelEntity,
            Transform::from_xyz(4.0, 10.0, 6.0).looking_at(Vec3::ZERO, Vec3::Y),
        ));
    }

    info!(
        "[Torchbearer] level laid out with {} torches",
        layout.torches.len()
    );
}

/// Tear down the finished level and lay out the next one, then rewire the
/// controller so it starts from a fresh puzzle and reports the new level.
fn rebuild_level_on_load(world: &mut World) {
    let Some(loaded) = world
        .get_resource_mut::<Events<LevelLoaded>>()
        .and_then(|mut events| events.drain().last())
    else {
        return;
    };

    let stale: Vec<Entity> = world
        .query_filtered::<Entity, With<LevelEntity>>()
        .iter(world)
        .collect();
    for entity in stale {
        if world.entities().contains(entity) {
            world.entity_mut(entity).despawn_recursive();
        }
    }
    world.remove_resource::<ControllerLinks>();

    if let Err(e) = world.run_system_once(spawn_puzzle_level) {
        error!("[Torchbearer] could not lay out {}: {e}", loaded.level);
        return;
    }
    wire_player_controller(world);
    info!(
        "[Torchbearer] {} ready (level {})",
        loaded.level,
        loaded.index + 1
    );
}

fn swing_exit_door(
    time: Res<Time>,
    doors: Query<(&Animator, &Children), With<ExitDoor>>,
    mut leaves: Query<&mut Transform, With<DoorLeaf>>,
) {
    let t = (2.0 * time.delta_secs()).clamp(0.0, 1.0);
    for (animator, children) in doors.iter() {
        let goal = if animator.get_bool(OPEN) {
            Quat::from_rotation_y(FRAC_PI_2)
        } else {
            Quat::IDENTITY
        };
        for child in children.iter() {
            if let Ok(mut leaf) = leaves.get_mut(*child) {
                leaf.rotation = leaf.rotation.slerp(goal, t);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Analytics;
    use crate::animation::{default_animation_library, AnimationPlugin};
    use crate::audio::{AudioManager, AudioPlugin};
    use crate::controller::{PlayerControllerPlugin, PuzzleState};
    use crate::events::{GameEventBus, GameEventsPlugin};
    use crate::input::VirtualInput;
    use crate::level::{LevelLoader, LevelPlugin};
    use crate::triggers::TriggerPlugin;
    use crate::wiring::{resolve_links, ControllerLinks};
    use std::time::Duration;

    fn headless_app() -> App {
        let config = GameConfig::default();
        let mut app = App::new();
        app.insert_resource(HeadlessMode(true))
            .insert_resource(Time::<()>::default())
            .insert_resource(LevelLoader::from_config(&config))
            .insert_resource(AudioManager::from_config(&config))
            .insert_resource(config)
            .insert_resource(default_animation_library())
            .insert_resource(VirtualInput::default())
            .insert_resource(Analytics::default())
            .insert_resource(GameEventBus::default())
            .add_event::<AppExit>()
            .configure_sets(
                Update,
                (
                    GameplaySet::Sense,
                    GameplaySet::Control,
                    GameplaySet::Animate,
                    GameplaySet::Present,
                )
                    .chain(),
            )
            .add_plugins((ScenePlugin, TriggerPlugin, PlayerControllerPlugin));
        app
    }

    fn step(app: &mut App, secs: f32) {
        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(secs));
        app.update();
    }

    /// Headless scene plus the animation, audio, event frame and level
    /// transition loop.
    fn playable_app() -> App {
        let mut app = headless_app();
        app.add_plugins((GameEventsPlugin, AnimationPlugin, AudioPlugin, LevelPlugin));
        app.update();
        app
    }

    fn links(app: &App) -> ControllerLinks {
        app.world().resource::<ControllerLinks>().clone()
    }

    fn walk_player_to(app: &mut App, at: Vec3) {
        let player = links(app).player;
        app.world_mut()
            .get_mut::<Transform>(player)
            .unwrap()
            .translation = at;
        step(app, 0.0);
    }

    fn light_torch_at(app: &mut App, at: Vec3) {
        walk_player_to(app, at);
        app.world_mut()
            .resource_mut::<VirtualInput>()
            .activate_just_pressed = true;
        step(app, 0.0);
        step(app, 1.5);
    }

    #[test]
    fn default_layout_wires_cleanly() {
        let mut app = headless_app();
        app.update();
        let config = app.world().resource::<GameConfig>().clone();
        let links = resolve_links(app.world_mut(), &config).expect("scene satisfies wiring");
        assert_eq!(links.torches_required, 3);
        assert!(links.hint.is_some());
        assert!(app.world().get_resource::<ControllerLinks>().is_some());
    }

    #[test]
    fn walking_into_a_torch_zone_and_lighting_it() {
        let mut app = headless_app();
        app.update();
        let links = app.world().resource::<ControllerLinks>().clone();
        let torch_at = vec3(app.world().resource::<GameConfig>().layout.torches[0]);

        app.world_mut()
            .get_mut::<Transform>(links.player)
            .unwrap()
            .translation = torch_at + Vec3::new(0.0, 0.0, 1.0);
        step(&mut app, 0.0);
        app.world_mut()
            .resource_mut::<VirtualInput>()
            .activate_just_pressed = true;
        step(&mut app, 0.0);
        assert!(app.world().get::<PuzzleState>(links.player).unwrap().is_lighting_action);

        step(&mut app, 1.5);
        let puzzle = app.world().get::<PuzzleState>(links.player).unwrap();
        assert_eq!(puzzle.torches_lit(), 1);
        assert!(!puzzle.is_lighting_action);
    }

    #[test]
    fn open_door_swings_leaf() {
        let mut app = headless_app();
        app.update();
        let links = app.world().resource::<ControllerLinks>().clone();
        app.world_mut()
            .get_mut::<Animator>(links.exit_door)
            .unwrap()
            .set_bool(OPEN, true);
        step(&mut app, 1.0);

        let mut leaves = app
            .world_mut()
            .query_filtered::<&Transform, With<DoorLeaf>>();
        let leaf = leaves.single(app.world());
        assert!(leaf.rotation.angle_between(Quat::IDENTITY) > 0.1);
    }

    #[test]
    fn lighting_plays_the_player_ignite_clip() {
        let mut app = playable_app();
        let torch_at = vec3(app.world().resource::<GameConfig>().layout.torches[0]);
        light_torch_at(&mut app, torch_at);

        let puzzle = app.world().get::<PuzzleState>(links(&app).player).unwrap();
        assert_eq!(puzzle.torches_lit(), 1);
        let audio = app.world().resource::<AudioManager>();
        assert_eq!(audio.played("fire_ignite"), 1);
        assert_eq!(audio.played("door_open"), 0);
    }

    #[test]
    fn leaving_through_the_door_rebuilds_the_next_level() {
        let mut app = playable_app();
        let config = app.world().resource::<GameConfig>().clone();
        let first = links(&app);
        for torch in &config.layout.torches {
            light_torch_at(&mut app, vec3(*torch));
        }
        assert!(app
            .world()
            .get::<PuzzleState>(first.player)
            .unwrap()
            .is_complete());

        walk_player_to(&mut app, vec3(config.layout.exit_door));
        assert!(app.world().resource::<LevelLoader>().is_fading());
        step(&mut app, config.fade_duration_secs);

        let loader = app.world().resource::<LevelLoader>();
        assert_eq!(loader.current_level(), "Level2");
        assert!(!loader.is_fading());
        let analytics = app.world().resource::<Analytics>();
        assert_eq!(analytics.level.as_deref(), Some(loader.current_level()));
        assert_eq!(analytics.completions.len(), 1);
        assert_eq!(analytics.completions[0].level, "Level1");

        let next = links(&app);
        assert!(!app.world().entities().contains(first.player));
        assert_ne!(next.player, first.player);
        let puzzle = app.world().get::<PuzzleState>(next.player).unwrap();
        assert_eq!(puzzle.torches_lit(), 0);
        assert_eq!(puzzle.torches_required(), 3);
        assert!(!puzzle.level_completed);

        let world = app.world_mut();
        assert_eq!(world.query::<&Player>().iter(world).count(), 1);
        assert_eq!(world.query::<&MainCamera>().iter(world).count(), 1);
        assert_eq!(world.query::<&Torch>().iter(world).filter(|t| t.is_lit()).count(), 0);
        let rig = world.get::<CameraRig>(next.camera).unwrap();
        assert_eq!(rig.player, Some(next.player));
    }
}
