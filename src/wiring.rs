use bevy::prelude::*;
use thiserror::Error;

use crate::analytics::Analytics;
use crate::animation::Animator;
use crate::camera::{CameraFocus, CameraRig};
use crate::components::{Player, SfxEmitter, Tags};
use crate::config::GameConfig;
use crate::controller::{Locomotion, PlayerSchedule, PuzzleState};
use crate::hint::HintDisplay;
use crate::level::LevelLoader;
use crate::torch::Torch;
use crate::triggers::TriggerVolume;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WiringError {
    #[error("no player entity found (needs Player, Animator and SfxEmitter)")]
    MissingPlayer,
    #[error("found {0} player entities, expected exactly one")]
    MultiplePlayers(usize),
    #[error("no entity named \"{name}\" for the {role}")]
    MissingEntity { role: &'static str, name: String },
    #[error("entity \"{name}\" ({role}) has no {component} component")]
    MissingComponent {
        role: &'static str,
        name: String,
        component: &'static str,
    },
    #[error("no trigger volumes tagged \"{tag}\"; the puzzle needs at least one torch")]
    NoTorches { tag: String },
}

/// Collaborators the player controller talks to, resolved once at startup.
#[derive(Resource, Clone, Debug, PartialEq)]
pub struct ControllerLinks {
    pub player: Entity,
    pub camera: Entity,
    pub exit_door: Entity,
    pub hint: Option<Entity>,
    pub torches_required: u32,
}

fn find_named(world: &mut World, name: &str) -> Option<Entity> {
    let mut query = world.query::<(Entity, &Name)>();
    query
        .iter(world)
        .find(|(_, n)| n.as_str() == name)
        .map(|(e, _)| e)
}

fn require_named(world: &mut World, role: &'static str, name: &str) -> Result<Entity, WiringError> {
    find_named(world, name).ok_or_else(|| WiringError::MissingEntity {
        role,
        name: name.to_string(),
    })
}

fn require_component<C: Component>(
    world: &World,
    entity: Entity,
    role: &'static str,
    name: &str,
    component: &'static str,
) -> Result<(), WiringError> {
    if world.get::<C>(entity).is_some() {
        Ok(())
    } else {
        Err(WiringError::MissingComponent {
            role,
            name: name.to_string(),
            component,
        })
    }
}

fn count_torches(world: &mut World, tag: &str) -> Result<u32, WiringError> {
    let mut query = world
        .query_filtered::<(Entity, &Tags, Option<&Torch>, Option<&Name>), With<TriggerVolume>>();
    let mut count = 0u32;
    for (entity, tags, torch, name) in query.iter(world) {
        if !tags.contains(tag) {
            continue;
        }
        if torch.is_none() {
            return Err(WiringError::MissingComponent {
                role: "torch",
                name: name
                    .map(|n| n.as_str().to_string())
                    .unwrap_or_else(|| format!("{entity:?}")),
                component: "Torch",
            });
        }
        count += 1;
    }
    if count == 0 {
        return Err(WiringError::NoTorches {
            tag: tag.to_string(),
        });
    }
    Ok(count)
}

/// Find every collaborator the controller needs, failing on the first one
/// that is missing. The hint panel is optional.
pub fn resolve_links(world: &mut World, config: &GameConfig) -> Result<ControllerLinks, WiringError> {
    let players: Vec<Entity> = world
        .query_filtered::<Entity, (With<Player>, With<Animator>, With<SfxEmitter>)>()
        .iter(world)
        .collect();
    let player = match players.as_slice() {
        [] => return Err(WiringError::MissingPlayer),
        [one] => *one,
        many => return Err(WiringError::MultiplePlayers(many.len())),
    };

    let names = &config.names;
    let camera = require_named(world, "camera", &names.camera)?;
    require_component::<CameraRig>(world, camera, "camera", &names.camera, "CameraRig")?;

    let exit_door = require_named(world, "exit door", &names.exit_door)?;
    require_component::<Animator>(world, exit_door, "exit door", &names.exit_door, "Animator")?;
    require_component::<SfxEmitter>(world, exit_door, "exit door", &names.exit_door, "SfxEmitter")?;

    let hint = match find_named(world, &names.hint) {
        Some(entity) if world.get::<HintDisplay>(entity).is_some() => Some(entity),
        Some(_) => {
            warn!(
                "[Torchbearer] \"{}\" has no HintDisplay; running without hints",
                names.hint
            );
            None
        }
        None => None,
    };

    let torches_required = count_torches(world, &config.tags.torch_zone)?;

    Ok(ControllerLinks {
        player,
        camera,
        exit_door,
        hint,
        torches_required,
    })
}

/// Startup system: resolve collaborators, attach controller state to the
/// player and tell analytics which level is running. Exits the app with an
/// error when wiring fails.
pub fn wire_player_controller(world: &mut World) {
    let config = world
        .get_resource::<GameConfig>()
        .cloned()
        .unwrap_or_default();
    let links = match resolve_links(world, &config) {
        Ok(links) => links,
        Err(e) => {
            error!("[Torchbearer] player controller wiring failed: {e}");
            world.send_event(AppExit::error());
            return;
        }
    };

    let level = world
        .get_resource::<LevelLoader>()
        .map(|l| l.current_level().to_string())
        .unwrap_or_default();
    let now = world
        .get_resource::<Time>()
        .map(|t| t.elapsed_secs())
        .unwrap_or(0.0);
    if let Some(mut analytics) = world.get_resource_mut::<Analytics>() {
        analytics.set_level(level, now);
    }

    if let Some(mut rig) = world.get_mut::<CameraRig>(links.camera) {
        rig.player = Some(links.player);
        rig.exit_door = Some(links.exit_door);
        rig.set_focus(CameraFocus::Player);
    }

    let needs_locomotion = world.get::<Locomotion>(links.player).is_none();
    let needs_schedule = world.get::<PlayerSchedule>(links.player).is_none();
    let mut player = world.entity_mut(links.player);
    player.insert(PuzzleState::new(links.torches_required));
    if needs_locomotion {
        player.insert(Locomotion::default());
    }
    if needs_schedule {
        player.insert(PlayerSchedule::default());
    }

    info!(
        "[Torchbearer] controller wired: {} torches, hint panel {}",
        links.torches_required,
        if links.hint.is_some() { "present" } else { "absent" }
    );
    world.insert_resource(links);
}
