use std::collections::HashMap;
use std::io::ErrorKind;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::SfxDefinition;

pub const CONFIG_ENV_VAR: &str = "TORCHBEARER_GAME_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "game.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read game config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse game config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid game config: {field} must be {requirement} (got {value})")]
    Invalid {
        field: &'static str,
        requirement: &'static str,
        value: f32,
    },
    #[error("invalid game config: level list is empty")]
    NoLevels,
    #[error("invalid game config: start_level {index} is out of range for {count} levels")]
    StartLevelOutOfRange { index: usize, count: usize },
}

/// Window settings read alongside the gameplay config.
#[derive(Deserialize, Default, Clone, Debug)]
#[serde(default)]
pub struct StartupConfig {
    pub window_title: Option<String>,
    pub window_width: Option<f32>,
    pub window_height: Option<f32>,
    pub background_color: Option<[f32; 3]>,
    pub assets_dir: Option<String>,
}

/// Shape of `game.json`.
#[derive(Deserialize, Default, Clone, Debug)]
#[serde(default)]
pub struct GameFile {
    pub window: StartupConfig,
    pub game: GameConfig,
}

/// Movement and timing tunables for the player controller.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    pub velocity: f32,
    /// Fraction of the remaining turn covered per second
    pub turn_speed: f32,
    pub lighting_delay_secs: f32,
    pub refocus_delay_secs: f32,
    /// Idle time before an idle variation would play. Carried for level
    /// designers; no idle variations ship yet.
    pub wait_to_idle_secs: f32,
    /// Keep the captured torch after walking out of its zone.
    pub keep_torch_after_exit: bool,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            velocity: 5.0,
            turn_speed: 10.0,
            lighting_delay_secs: 1.5,
            refocus_delay_secs: 1.5,
            wait_to_idle_secs: 5.0,
            keep_torch_after_exit: false,
        }
    }
}

/// Tags carried by trigger volumes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerTags {
    pub torch_zone: String,
    pub door: String,
    pub hint_zone: String,
}

impl Default for TriggerTags {
    fn default() -> Self {
        Self {
            torch_zone: "LightStickOpenDoor".to_string(),
            door: "Door".to_string(),
            hint_zone: "HintZone".to_string(),
        }
    }
}

/// Names used to resolve collaborators at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorNames {
    pub camera: String,
    pub hint: String,
    pub exit_door: String,
}

impl Default for CollaboratorNames {
    fn default() -> Self {
        Self {
            camera: "Main Camera".to_string(),
            hint: "HintCanvas".to_string(),
            exit_door: "Door.001".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneLayout {
    pub center: [f32; 3],
    pub half_extents: [f32; 3],
}

impl Default for ZoneLayout {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0, 2.0],
            half_extents: [2.0, 1.5, 1.0],
        }
    }
}

/// Where the demo level places its pieces.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelLayout {
    pub player_spawn: [f32; 3],
    pub torches: Vec<[f32; 3]>,
    pub exit_door: [f32; 3],
    pub hint_zone: Option<ZoneLayout>,
    pub hint_text: String,
}

impl Default for LevelLayout {
    fn default() -> Self {
        Self {
            player_spawn: [0.0, 0.0, 4.0],
            torches: vec![[-6.0, 0.0, -2.0], [6.0, 0.0, -2.0], [0.0, 0.0, -8.0]],
            exit_door: [0.0, 0.0, -14.0],
            hint_zone: Some(ZoneLayout::default()),
            hint_text: "Light every torch to open the door. Press Space next to a torch."
                .to_string(),
        }
    }
}

#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub player: PlayerTuning,
    pub tags: TriggerTags,
    pub names: CollaboratorNames,
    pub levels: Vec<String>,
    pub start_level: usize,
    pub fade_duration_secs: f32,
    pub layout: LevelLayout,
    pub sfx: HashMap<String, SfxDefinition>,
    /// Game event name to sfx name, for cues not owned by an emitter
    pub audio_triggers: HashMap<String, String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            player: PlayerTuning::default(),
            tags: TriggerTags::default(),
            names: CollaboratorNames::default(),
            levels: vec![
                "Level1".to_string(),
                "Level2".to_string(),
                "Level3".to_string(),
            ],
            start_level: 0,
            fade_duration_secs: 1.0,
            layout: LevelLayout::default(),
            sfx: HashMap::from([
                (
                    "fire_ignite".to_string(),
                    SfxDefinition::new("audio/fire_ignite.ogg"),
                ),
                (
                    "door_open".to_string(),
                    SfxDefinition::new("audio/door_open.ogg"),
                ),
            ]),
            audio_triggers: HashMap::new(),
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.player;
        check_at_least("player.velocity", p.velocity, 0.0)?;
        check_positive("player.turn_speed", p.turn_speed)?;
        check_at_least("player.lighting_delay_secs", p.lighting_delay_secs, 0.0)?;
        check_at_least("player.refocus_delay_secs", p.refocus_delay_secs, 0.0)?;
        check_at_least("player.wait_to_idle_secs", p.wait_to_idle_secs, 0.0)?;
        check_at_least("fade_duration_secs", self.fade_duration_secs, 0.0)?;
        if self.levels.is_empty() {
            return Err(ConfigError::NoLevels);
        }
        if self.start_level >= self.levels.len() {
            return Err(ConfigError::StartLevelOutOfRange {
                index: self.start_level,
                count: self.levels.len(),
            });
        }
        Ok(())
    }
}

fn check_at_least(field: &'static str, value: f32, min: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            requirement: "a finite non-negative number",
            value,
        })
    }
}

fn check_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            requirement: "a finite positive number",
            value,
        })
    }
}

pub fn config_path() -> String {
    std::env::var(CONFIG_ENV_VAR)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

/// Load `game.json`. A missing file yields the defaults.
pub fn load_game_file(path: &str) -> Result<GameFile, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_game_file(path, &contents),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(GameFile::default()),
        Err(source) => Err(ConfigError::Read {
            path: path.to_string(),
            source,
        }),
    }
}

pub fn parse_game_file(path: &str, contents: &str) -> Result<GameFile, ConfigError> {
    let file: GameFile = serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })?;
    file.game.validate()?;
    Ok(file)
}
