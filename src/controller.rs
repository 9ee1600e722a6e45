use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use serde_json::json;

use crate::analytics::Analytics;
use crate::animation::{AnimationLibrary, Animator, IS_WALKING, LIGHTING_TAG, LIGHT_TORCH, OPEN};
use crate::audio::AudioManager;
use crate::camera::{camera_yaw_degrees, CameraFocus, CameraRig, MainCamera};
use crate::components::{GameplaySet, Player, SfxEmitter};
use crate::config::{GameConfig, PlayerTuning};
use crate::events::GameEventBus;
use crate::hint::HintDisplay;
use crate::input::VirtualInput;
use crate::level::LevelLoader;
use crate::schedule::ScheduledActions;
use crate::torch::Torch;
use crate::triggers::{TriggerEvent, TriggerPhase};
use crate::wiring::{wire_player_controller, ControllerLinks};

/// Continuations the controller schedules on itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DelayedAction {
    LightTorch,
    FocusPlayer,
}

pub type PlayerSchedule = ScheduledActions<DelayedAction>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TorchInteraction {
    Idle,
    /// Standing in a torch zone with the torch captured.
    Armed(Entity),
    Lighting,
}

/// Torch puzzle progress and the torch-lighting state machine.
///
/// `torches_lit` never exceeds `torches_required`; the puzzle is complete
/// when they are equal.
#[derive(Component, Clone, Debug, PartialEq)]
pub struct PuzzleState {
    torches_required: u32,
    torches_lit: u32,
    pub torch_trigger_entered: bool,
    pub torch_in_range: Option<Entity>,
    pub is_lighting_action: bool,
    pub level_completed: bool,
}

impl PuzzleState {
    pub fn new(torches_required: u32) -> Self {
        Self {
            torches_required,
            torches_lit: 0,
            torch_trigger_entered: false,
            torch_in_range: None,
            is_lighting_action: false,
            level_completed: false,
        }
    }

    pub fn torches_required(&self) -> u32 {
        self.torches_required
    }

    pub fn torches_lit(&self) -> u32 {
        self.torches_lit
    }

    pub fn is_complete(&self) -> bool {
        self.torches_lit == self.torches_required
    }

    /// Count one more lit torch. Returns false once the puzzle is complete.
    pub fn record_lit(&mut self) -> bool {
        if self.torches_lit >= self.torches_required {
            return false;
        }
        self.torches_lit += 1;
        true
    }

    pub fn phase(&self) -> TorchInteraction {
        if self.is_lighting_action {
            return TorchInteraction::Lighting;
        }
        match self.torch_in_range {
            Some(torch) if self.torch_trigger_entered => TorchInteraction::Armed(torch),
            _ => TorchInteraction::Idle,
        }
    }

    fn arm(&mut self, torch: Entity) {
        self.torch_trigger_entered = true;
        self.torch_in_range = Some(torch);
    }

    fn disarm(&mut self) {
        self.torch_trigger_entered = false;
        self.torch_in_range = None;
    }
}

#[derive(Component, Clone, Debug)]
pub struct Locomotion {
    pub input: Vec2,
    pub angle_degrees: f32,
    pub target_rotation: Quat,
    pub walking: bool,
}

impl Default for Locomotion {
    fn default() -> Self {
        Self {
            input: Vec2::ZERO,
            angle_degrees: 0.0,
            target_rotation: Quat::IDENTITY,
            walking: false,
        }
    }
}

/// Both axes short of full deflection means standing still.
pub fn is_idle_input(input: Vec2) -> bool {
    input.x.abs() < 1.0 && input.y.abs() < 1.0
}

/// Heading in degrees for a stick input, relative to the camera yaw.
/// 0 is straight ahead (-Z under an unrotated camera), 90 is to the right.
pub fn heading_degrees(input: Vec2, camera_yaw_deg: f32) -> f32 {
    input.x.atan2(input.y).to_degrees() + camera_yaw_deg
}

pub fn heading_rotation(heading_deg: f32) -> Quat {
    Quat::from_rotation_y(-heading_deg.to_radians())
}

pub struct PlayerControllerPlugin;

impl Plugin for PlayerControllerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(PostStartup, wire_player_controller).add_systems(
            Update,
            (handle_trigger_events, drive_player, run_scheduled_actions)
                .chain()
                .in_set(GameplaySet::Control),
        );
    }
}

#[derive(SystemParam)]
struct TriggerResponders<'w, 's> {
    hints: Query<'w, 's, &'static mut HintDisplay>,
    analytics: ResMut<'w, Analytics>,
    levels: ResMut<'w, LevelLoader>,
    bus: ResMut<'w, GameEventBus>,
}

fn handle_trigger_events(
    mut reader: EventReader<TriggerEvent>,
    time: Res<Time>,
    config: Res<GameConfig>,
    links: Option<Res<ControllerLinks>>,
    torches: Query<(), With<Torch>>,
    mut players: Query<&mut PuzzleState, With<Player>>,
    mut responders: TriggerResponders,
) {
    let Some(links) = links else {
        reader.clear();
        return;
    };
    let tags = &config.tags;
    for event in reader.read() {
        let Ok(mut puzzle) = players.get_mut(event.sensor) else {
            continue;
        };
        match event.phase {
            TriggerPhase::Enter => {
                if event.has_tag(&tags.hint_zone) && !puzzle.is_complete() {
                    if let Some(mut hint) = links.hint.and_then(|e| responders.hints.get_mut(e).ok()) {
                        hint.show();
                    }
                }
                if event.has_tag(&tags.door) && puzzle.is_complete() && !puzzle.level_completed {
                    complete_level(&mut puzzle, &mut responders, time.elapsed_secs());
                }
                // the torch captured when lighting began stays the target
                if event.has_tag(&tags.torch_zone) && !puzzle.is_lighting_action {
                    if torches.contains(event.volume) {
                        puzzle.arm(event.volume);
                    } else {
                        warn!(
                            "[Torchbearer] torch zone {:?} has no Torch; ignoring",
                            event.volume
                        );
                    }
                }
            }
            TriggerPhase::Exit => {
                if event.has_tag(&tags.hint_zone) {
                    if let Some(mut hint) = links.hint.and_then(|e| responders.hints.get_mut(e).ok()) {
                        hint.hide();
                    }
                }
                if event.has_tag(&tags.torch_zone)
                    && !config.player.keep_torch_after_exit
                    && !puzzle.is_lighting_action
                    && puzzle.torch_in_range == Some(event.volume)
                {
                    puzzle.disarm();
                }
            }
        }
    }
}

fn complete_level(puzzle: &mut PuzzleState, responders: &mut TriggerResponders, now: f32) {
    puzzle.level_completed = true;
    let completion = responders.analytics.level_complete(now).clone();
    responders.bus.emit(
        "level_complete",
        json!({ "level": completion.level, "duration_secs": completion.duration_secs }),
        None,
    );
    if let Err(e) = responders.levels.fade_to_next_level() {
        warn!("[Torchbearer] level transition refused: {e}");
    }
}

fn drive_player(
    time: Res<Time>,
    config: Res<GameConfig>,
    library: Res<AnimationLibrary>,
    mut input: ResMut<VirtualInput>,
    cameras: Query<&Transform, (With<MainCamera>, Without<Player>)>,
    torches: Query<&Torch>,
    mut players: Query<
        (
            &mut Transform,
            &mut Locomotion,
            &mut PuzzleState,
            &mut Animator,
            &mut PlayerSchedule,
        ),
        With<Player>,
    >,
) {
    let activate = input.take_activate();
    let axes = input.axes;
    let dt = time.delta_secs();
    let tuning = &config.player;
    let camera_yaw = cameras.get_single().map(camera_yaw_degrees).unwrap_or(0.0);

    for (mut transform, mut locomotion, mut puzzle, mut animator, mut schedule) in players.iter_mut() {
        if puzzle.is_lighting_action || animator.is_in_tag(&library, LIGHTING_TAG) {
            continue;
        }
        if activate && try_start_lighting(&mut puzzle, &mut animator, &mut schedule, &torches, tuning) {
            continue;
        }
        step_locomotion(
            &mut transform,
            &mut locomotion,
            &mut animator,
            axes,
            camera_yaw,
            tuning,
            dt,
        );
    }
}

fn try_start_lighting(
    puzzle: &mut PuzzleState,
    animator: &mut Animator,
    schedule: &mut PlayerSchedule,
    torches: &Query<&Torch>,
    tuning: &PlayerTuning,
) -> bool {
    let TorchInteraction::Armed(torch_entity) = puzzle.phase() else {
        return false;
    };
    let Ok(torch) = torches.get(torch_entity) else {
        warn!("[Torchbearer] captured torch {torch_entity:?} no longer exists");
        puzzle.disarm();
        return false;
    };
    if torch.is_lit() {
        return false;
    }
    animator.set_trigger(LIGHT_TORCH);
    puzzle.is_lighting_action = true;
    schedule.schedule(tuning.lighting_delay_secs, DelayedAction::LightTorch);
    debug!("lighting torch {}", torch.id);
    true
}

fn step_locomotion(
    transform: &mut Transform,
    locomotion: &mut Locomotion,
    animator: &mut Animator,
    input: Vec2,
    camera_yaw_deg: f32,
    tuning: &PlayerTuning,
    dt: f32,
) {
    locomotion.input = input;
    if is_idle_input(input) {
        locomotion.walking = false;
        animator.set_bool(IS_WALKING, false);
        return;
    }
    locomotion.walking = true;
    animator.set_bool(IS_WALKING, true);

    locomotion.angle_degrees = heading_degrees(input, camera_yaw_deg);
    locomotion.target_rotation = heading_rotation(locomotion.angle_degrees);
    let t = (tuning.turn_speed * dt).clamp(0.0, 1.0);
    transform.rotation = transform.rotation.slerp(locomotion.target_rotation, t);

    let forward = *transform.forward();
    transform.translation += forward * tuning.velocity * dt;
}

#[derive(SystemParam)]
struct DoorFeedback<'w, 's> {
    cameras: Query<'w, 's, &'static mut CameraRig>,
    doors: Query<'w, 's, (&'static mut Animator, &'static SfxEmitter), Without<Player>>,
    torches: Query<'w, 's, &'static mut Torch>,
    audio: ResMut<'w, AudioManager>,
    analytics: ResMut<'w, Analytics>,
    bus: ResMut<'w, GameEventBus>,
}

fn run_scheduled_actions(
    time: Res<Time>,
    config: Res<GameConfig>,
    links: Option<Res<ControllerLinks>>,
    mut players: Query<(&mut PuzzleState, &mut PlayerSchedule), With<Player>>,
    mut feedback: DoorFeedback,
) {
    let Some(links) = links else {
        return;
    };
    let now = time.elapsed_secs();
    for (mut puzzle, mut schedule) in players.iter_mut() {
        for action in schedule.tick(time.delta()) {
            match action {
                DelayedAction::LightTorch => finish_lighting(
                    &mut puzzle,
                    &mut schedule,
                    &links,
                    &mut feedback,
                    &config.player,
                    now,
                ),
                DelayedAction::FocusPlayer => {
                    if let Ok(mut rig) = feedback.cameras.get_mut(links.camera) {
                        rig.set_focus(CameraFocus::Player);
                    }
                }
            }
        }
    }
}

fn finish_lighting(
    puzzle: &mut PuzzleState,
    schedule: &mut PlayerSchedule,
    links: &ControllerLinks,
    feedback: &mut DoorFeedback,
    tuning: &PlayerTuning,
    now: f32,
) {
    let torch_entity = puzzle.torch_in_range;
    puzzle.disarm();
    let mut advanced = false;
    match torch_entity.and_then(|e| feedback.torches.get_mut(e).ok()) {
        Some(mut torch) => {
            if torch.light_now() && puzzle.record_lit() {
                advanced = true;
                feedback.analytics.torch_lit(torch.id, now);
                feedback.bus.emit(
                    "torch_lit",
                    json!({
                        "torch_id": torch.id,
                        "lit": puzzle.torches_lit(),
                        "required": puzzle.torches_required(),
                    }),
                    None,
                );
            } else {
                warn!("[Torchbearer] torch {} was already lit", torch.id);
            }
        }
        None => warn!("[Torchbearer] torch disappeared before it could be lit"),
    }
    puzzle.is_lighting_action = false;

    if advanced && puzzle.is_complete() {
        open_exit_door(links, feedback);
        schedule.schedule(tuning.refocus_delay_secs, DelayedAction::FocusPlayer);
    }
}

fn open_exit_door(links: &ControllerLinks, feedback: &mut DoorFeedback) {
    if let Ok(mut rig) = feedback.cameras.get_mut(links.camera) {
        rig.set_focus(CameraFocus::ExitDoor);
    }
    let frame = feedback.bus.frame;
    match feedback.doors.get_mut(links.exit_door) {
        Ok((mut animator, emitter)) => {
            animator.set_bool(OPEN, true);
            if let Err(e) = feedback
                .audio
                .play_sfx(&emitter.clip, frame, Some("puzzle_solved".to_string()))
            {
                warn!("[Torchbearer] door sound: {e}");
            }
        }
        Err(_) => warn!("[Torchbearer] exit door {:?} is gone", links.exit_door),
    }
    feedback.bus.emit(
        "puzzle_solved",
        json!({}),
        Some(links.exit_door.to_bits()),
    );
}
