mod analytics;
mod animation;
mod audio;
mod camera;
mod components;
mod config;
mod controller;
mod events;
mod hint;
mod input;
mod level;
mod scene;
mod schedule;
mod torch;
mod triggers;
mod wiring;

use bevy::prelude::*;
use components::{GameplaySet, HeadlessMode};

fn main() -> AppExit {
    let args: Vec<String> = std::env::args().collect();
    let headless = args.iter().any(|a| a == "--headless");

    let path = config::config_path();
    let file = match config::load_game_file(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("[Torchbearer] {e}");
            return AppExit::error();
        }
    };
    println!("[Torchbearer] Using game config {path}");
    let startup = file.window;

    let mut app = App::new();
    app.insert_resource(HeadlessMode(headless))
        .insert_resource(file.game);

    if headless {
        // No window or renderer; gameplay runs on the minimal loop
        app.add_plugins(MinimalPlugins)
            .add_plugins(bevy::log::LogPlugin::default());
        println!("[Torchbearer] Starting in HEADLESS mode");
    } else {
        // Env vars override game.json values
        let assets_dir = std::env::var("TORCHBEARER_ASSETS_DIR")
            .ok()
            .filter(|s| !s.is_empty())
            .or(startup.assets_dir)
            .unwrap_or_else(|| "assets".to_string());
        if assets_dir != "assets" {
            println!("[Torchbearer] Using game assets dir: {}", assets_dir);
        }

        let window_title = startup
            .window_title
            .unwrap_or_else(|| "Torchbearer".to_string());
        let window_width = startup.window_width.unwrap_or(1280.0);
        let window_height = startup.window_height.unwrap_or(720.0);

        app.add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: window_title,
                        resolution: (window_width, window_height).into(),
                        present_mode: bevy::window::PresentMode::AutoVsync,
                        ..default()
                    }),
                    ..default()
                })
                .set(bevy::asset::AssetPlugin {
                    file_path: assets_dir,
                    ..default()
                }),
        );
        let bg = startup.background_color.unwrap_or([0.05, 0.05, 0.08]);
        app.insert_resource(ClearColor(Color::srgb(bg[0], bg[1], bg[2])));
        println!("[Torchbearer] Starting in WINDOWED mode");
    }

    app.configure_sets(
        Update,
        (
            GameplaySet::Sense,
            GameplaySet::Control,
            GameplaySet::Animate,
            GameplaySet::Present,
        )
            .chain(),
    )
    .add_plugins(events::GameEventsPlugin)
    .add_plugins(input::InputPlugin)
    .add_plugins(triggers::TriggerPlugin)
    .add_plugins(animation::AnimationPlugin)
    .add_plugins(audio::AudioPlugin)
    .add_plugins(camera::CameraPlugin)
    .add_plugins(hint::HintPlugin)
    .add_plugins(analytics::AnalyticsPlugin)
    .add_plugins(level::LevelPlugin)
    .add_plugins(torch::TorchPlugin)
    .add_plugins(scene::ScenePlugin)
    .add_plugins(controller::PlayerControllerPlugin);

    app.run()
}
