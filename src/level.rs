use bevy::prelude::*;

use crate::components::{GameplaySet, HeadlessMode};
use crate::config::GameConfig;
use crate::events::GameEventBus;

#[derive(Clone, Debug)]
struct LevelFade {
    to: usize,
    elapsed: f32,
}

/// Ordered level list with a fade-to-black between levels. Tracks which level
/// is current and announces each landing with `LevelLoaded`.
#[derive(Resource, Clone, Debug)]
pub struct LevelLoader {
    levels: Vec<String>,
    current: usize,
    fade_duration: f32,
    fade: Option<LevelFade>,
    finished: bool,
    pub transition_requests: u32,
}

impl Default for LevelLoader {
    fn default() -> Self {
        Self::from_config(&GameConfig::default())
    }
}

impl LevelLoader {
    pub fn from_config(config: &GameConfig) -> Self {
        let levels = if config.levels.is_empty() {
            vec!["Level1".to_string()]
        } else {
            config.levels.clone()
        };
        let current = config.start_level.min(levels.len() - 1);
        Self {
            levels,
            current,
            fade_duration: config.fade_duration_secs.max(0.0),
            fade: None,
            finished: false,
            transition_requests: 0,
        }
    }

    pub fn current_level(&self) -> &str {
        &self.levels[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fade progress in [0, 1] while a transition is running.
    pub fn fade_progress(&self) -> Option<f32> {
        self.fade.as_ref().map(|f| {
            if self.fade_duration <= 0.0 {
                1.0
            } else {
                (f.elapsed / self.fade_duration).clamp(0.0, 1.0)
            }
        })
    }

    pub fn fade_to_next_level(&mut self) -> Result<(), String> {
        if self.fade.is_some() {
            return Err("a level transition is already running".to_string());
        }
        if self.finished {
            return Err("no levels left to load".to_string());
        }
        self.transition_requests = self.transition_requests.saturating_add(1);
        self.fade = Some(LevelFade {
            to: self.current + 1,
            elapsed: 0.0,
        });
        info!(
            "[Torchbearer] fading out of {} ({:.2}s)",
            self.current_level(),
            self.fade_duration
        );
        Ok(())
    }

    /// Advance the fade. Returns the new level name when it completes.
    fn advance(&mut self, dt: f32) -> Option<String> {
        let fade = self.fade.as_mut()?;
        fade.elapsed += dt;
        if fade.elapsed < self.fade_duration {
            return None;
        }
        let to = fade.to;
        self.fade = None;
        if to >= self.levels.len() {
            self.finished = true;
            info!("[Torchbearer] last level completed");
            return None;
        }
        self.current = to;
        Some(self.levels[to].clone())
    }
}

/// Sent once a fade lands on a new level; the scene rebuilds itself on it.
#[derive(Event, Clone, Debug, PartialEq)]
pub struct LevelLoaded {
    pub level: String,
    pub index: usize,
}

/// Full-screen overlay darkened while a level fade runs.
#[derive(Component)]
pub struct FadeOverlay;

pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        let loader = app
            .world()
            .get_resource::<GameConfig>()
            .map(LevelLoader::from_config)
            .unwrap_or_default();
        app.insert_resource(loader)
            .add_event::<LevelLoaded>()
            .add_systems(Startup, spawn_fade_overlay)
            .add_systems(
                Update,
                (tick_level_fade, sync_fade_overlay)
                    .chain()
                    .in_set(GameplaySet::Present),
            );
    }
}

fn spawn_fade_overlay(mut commands: Commands, headless: Option<Res<HeadlessMode>>) {
    if headless.map_or(true, |h| h.0) {
        return;
    }
    commands.spawn((
        FadeOverlay,
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(0.0),
            top: Val::Px(0.0),
            width: Val::Percent(100.0),
            height: Val::Percent(100.0),
            ..default()
        },
        BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.0)),
        GlobalZIndex(10),
    ));
}

fn tick_level_fade(
    time: Res<Time>,
    mut loader: ResMut<LevelLoader>,
    mut bus: ResMut<GameEventBus>,
    mut loaded: EventWriter<LevelLoaded>,
) {
    if !loader.is_fading() {
        return;
    }
    if let Some(level) = loader.advance(time.delta_secs()) {
        info!("[Torchbearer] loaded {level}");
        let index = loader.current_index();
        bus.emit(
            "level_loaded",
            serde_json::json!({ "level": level, "index": index }),
            None,
        );
        loaded.send(LevelLoaded { level, index });
    }
}

fn sync_fade_overlay(
    loader: Res<LevelLoader>,
    mut overlays: Query<&mut BackgroundColor, With<FadeOverlay>>,
) {
    let alpha = if loader.is_finished() {
        1.0
    } else {
        loader.fade_progress().unwrap_or(0.0)
    };
    for mut bg in overlays.iter_mut() {
        bg.0 = Color::srgba(0.0, 0.0, 0.0, alpha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::event::Events;
    use std::time::Duration;

    fn config(levels: &[&str]) -> GameConfig {
        GameConfig {
            levels: levels.iter().map(|l| l.to_string()).collect(),
            fade_duration_secs: 1.0,
            ..default()
        }
    }

    #[test]
    fn second_request_during_fade_is_rejected() {
        let mut loader = LevelLoader::from_config(&config(&["A", "B"]));
        loader.fade_to_next_level().expect("first request");
        assert!(loader.fade_to_next_level().is_err());
        assert_eq!(loader.transition_requests, 1);
    }

    #[test]
    fn fade_completes_and_emits_level_loaded() {
        let mut app = App::new();
        app.insert_resource(Time::<()>::default())
            .insert_resource(GameEventBus::default())
            .insert_resource(config(&["A", "B"]))
            .add_plugins(LevelPlugin);
        app.world_mut()
            .resource_mut::<LevelLoader>()
            .fade_to_next_level()
            .expect("fade starts");

        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(0.5));
        app.update();
        {
            let loader = app.world().resource::<LevelLoader>();
            assert_eq!(loader.current_level(), "A");
            assert!((loader.fade_progress().unwrap() - 0.5).abs() < 0.001);
        }

        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(0.5));
        app.update();
        let loader = app.world().resource::<LevelLoader>();
        assert_eq!(loader.current_level(), "B");
        assert!(!loader.is_fading());
        let bus = app.world().resource::<GameEventBus>();
        let loaded = bus.named("level_loaded").next().expect("level_loaded event");
        assert_eq!(loaded.data["level"], "B");

        let sent: Vec<LevelLoaded> = app
            .world_mut()
            .resource_mut::<Events<LevelLoaded>>()
            .drain()
            .collect();
        assert_eq!(
            sent,
            vec![LevelLoaded {
                level: "B".to_string(),
                index: 1
            }]
        );
    }

    #[test]
    fn fading_past_last_level_marks_finished() {
        let mut loader = LevelLoader::from_config(&config(&["Only"]));
        loader.fade_to_next_level().expect("fade starts");
        assert_eq!(loader.advance(2.0), None);
        assert!(loader.is_finished());
        assert_eq!(loader.current_level(), "Only");
        assert!(loader.fade_to_next_level().is_err());
    }
}
