use std::collections::HashMap;

use bevy::audio::Volume;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::{GameplaySet, HeadlessMode, SfxEmitter};
use crate::config::GameConfig;
use crate::events::GameEventBus;

const MAX_AUDIO_EVENTS: usize = 256;

fn default_volume() -> f32 {
    1.0
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SfxDefinition {
    pub path: String,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

impl SfxDefinition {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            volume: 1.0,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AudioEventLog {
    pub frame: u64,
    pub name: String,
    pub volume: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_event: Option<String>,
}

/// Clip registry plus a log of what was played. Playback itself is handed
/// to Bevy's audio when a window is up.
#[derive(Resource)]
pub struct AudioManager {
    pub sfx: HashMap<String, SfxDefinition>,
    /// Game event name to sfx name
    pub triggers: HashMap<String, String>,
    pub master_volume: f32,
    pub recent_events: Vec<AudioEventLog>,
    pending_playback: Vec<(String, f32)>,
}

impl Default for AudioManager {
    fn default() -> Self {
        Self {
            sfx: HashMap::new(),
            triggers: HashMap::new(),
            master_volume: 1.0,
            recent_events: Vec::new(),
            pending_playback: Vec::new(),
        }
    }
}

impl AudioManager {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            sfx: config.sfx.clone(),
            triggers: config.audio_triggers.clone(),
            ..default()
        }
    }

    pub fn play_sfx(
        &mut self,
        name: &str,
        frame: u64,
        source_event: Option<String>,
    ) -> Result<(), String> {
        let Some(def) = self.sfx.get(name) else {
            return Err(format!("Unknown sfx: {name}"));
        };
        let volume = (def.volume * self.master_volume).clamp(0.0, 2.0);
        self.pending_playback.push((def.path.clone(), volume));
        self.recent_events.push(AudioEventLog {
            frame,
            name: name.to_string(),
            volume,
            source_event,
        });
        if self.recent_events.len() > MAX_AUDIO_EVENTS {
            let excess = self.recent_events.len() - MAX_AUDIO_EVENTS;
            self.recent_events.drain(0..excess);
        }
        Ok(())
    }

    pub fn played(&self, name: &str) -> usize {
        self.recent_events.iter().filter(|e| e.name == name).count()
    }

    fn take_pending(&mut self) -> Vec<(String, f32)> {
        std::mem::take(&mut self.pending_playback)
    }
}

#[derive(Resource, Default)]
struct AudioEventCursor {
    last_frame: u64,
}

pub struct AudioPlugin;

impl Plugin for AudioPlugin {
    fn build(&self, app: &mut App) {
        let manager = app
            .world()
            .get_resource::<GameConfig>()
            .map(AudioManager::from_config)
            .unwrap_or_default();
        app.insert_resource(manager)
            .insert_resource(AudioEventCursor::default())
            .add_systems(
                Update,
                (auto_audio_from_events, spawn_pending_playback)
                    .chain()
                    .after(GameplaySet::Animate),
            );
    }
}

/// Play clips for events emitted since the last frame seen: the config's
/// event-to-clip map first, then the cue of the emitter that raised it.
fn auto_audio_from_events(
    mut audio: ResMut<AudioManager>,
    bus: Res<GameEventBus>,
    mut cursor: ResMut<AudioEventCursor>,
    emitters: Query<&SfxEmitter>,
) {
    let mut newest_frame = cursor.last_frame;
    let fresh: Vec<(String, u64, Option<u64>)> = bus
        .after_frame(cursor.last_frame)
        .map(|ev| (ev.name.clone(), ev.frame, ev.source_entity))
        .collect();
    for (name, frame, source) in fresh {
        newest_frame = newest_frame.max(frame);
        if let Some(mapped) = audio.triggers.get(&name).cloned() {
            if let Err(e) = audio.play_sfx(&mapped, frame, Some(name.clone())) {
                warn!("[Torchbearer audio] {e}");
            }
        }
        let Some(emitter) = source
            .and_then(|bits| Entity::try_from_bits(bits).ok())
            .and_then(|entity| emitters.get(entity).ok())
        else {
            continue;
        };
        if emitter.cue.as_deref() == Some(name.as_str()) {
            if let Err(e) = audio.play_sfx(&emitter.clip, frame, Some(name)) {
                warn!("[Torchbearer audio] {e}");
            }
        }
    }
    cursor.last_frame = newest_frame;
}

fn spawn_pending_playback(
    mut commands: Commands,
    mut audio: ResMut<AudioManager>,
    headless: Option<Res<HeadlessMode>>,
    asset_server: Option<Res<AssetServer>>,
) {
    let pending = audio.take_pending();
    if headless.map_or(true, |h| h.0) {
        return;
    }
    let Some(asset_server) = asset_server else {
        return;
    };
    for (path, volume) in pending {
        commands.spawn((
            AudioPlayer::new(asset_server.load(path)),
            PlaybackSettings::DESPAWN.with_volume(Volume::new(volume)),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_sfx_records_event() {
        let mut audio = AudioManager::from_config(&GameConfig::default());
        audio.master_volume = 0.5;
        audio
            .play_sfx("door_open", 10, None)
            .expect("door_open is a default clip");
        assert_eq!(audio.recent_events.len(), 1);
        let ev = &audio.recent_events[0];
        assert_eq!(ev.name, "door_open");
        assert_eq!(ev.frame, 10);
        assert!((ev.volume - 0.5).abs() < 0.001);
    }

    #[test]
    fn unknown_sfx_rejected() {
        let mut audio = AudioManager::default();
        let err = audio
            .play_sfx("missing", 0, None)
            .expect_err("unknown clip should fail");
        assert!(err.contains("Unknown sfx"));
        assert!(audio.recent_events.is_empty());
    }

    fn audio_app() -> App {
        let mut app = App::new();
        app.insert_resource(GameConfig::default())
            .insert_resource(GameEventBus::default())
            .insert_resource(HeadlessMode(true))
            .add_plugins(AudioPlugin);
        app
    }

    #[test]
    fn mapped_event_plays_clip_once() {
        let mut app = audio_app();
        app.world_mut()
            .resource_mut::<AudioManager>()
            .triggers
            .insert("level_loaded".to_string(), "door_open".to_string());
        {
            let mut bus = app.world_mut().resource_mut::<GameEventBus>();
            bus.frame = 1;
            bus.emit("level_loaded", serde_json::json!({}), None);
        }
        app.update();
        app.update();
        let audio = app.world().resource::<AudioManager>();
        assert_eq!(audio.played("door_open"), 1);
        assert_eq!(
            audio.recent_events[0].source_event.as_deref(),
            Some("level_loaded")
        );
    }

    #[test]
    fn emitter_plays_its_clip_on_its_own_cue() {
        let mut app = audio_app();
        let player = app
            .world_mut()
            .spawn(SfxEmitter::new("fire_ignite").with_cue("anim:fire_ignite"))
            .id();
        let door = app.world_mut().spawn(SfxEmitter::new("door_open")).id();
        {
            let mut bus = app.world_mut().resource_mut::<GameEventBus>();
            bus.frame = 1;
            bus.emit("anim:fire_ignite", serde_json::json!({}), Some(player.to_bits()));
            bus.emit("anim:fire_ignite", serde_json::json!({}), Some(door.to_bits()));
            bus.emit("anim:fire_ignite", serde_json::json!({}), None);
        }
        app.update();
        app.update();
        let audio = app.world().resource::<AudioManager>();
        assert_eq!(audio.played("fire_ignite"), 1);
        assert_eq!(audio.played("door_open"), 0);
        assert_eq!(
            audio.recent_events[0].source_event.as_deref(),
            Some("anim:fire_ignite")
        );
    }
}
