use std::collections::HashMap;

use bevy::prelude::*;

use crate::components::{GameplaySet, Tags};

/// A non-solid box that raises enter/exit events without blocking movement.
#[derive(Component, Clone, Debug)]
pub struct TriggerVolume {
    pub half_extents: Vec3,
}

impl TriggerVolume {
    pub fn new(half_extents: Vec3) -> Self {
        Self { half_extents }
    }
}

/// Box carried by an actor that wants to hear about trigger volumes.
#[derive(Component, Clone, Debug)]
pub struct TriggerSensor {
    pub half_extents: Vec3,
    overlapping: HashMap<Entity, Tags>,
}

impl TriggerSensor {
    pub fn new(half_extents: Vec3) -> Self {
        Self {
            half_extents,
            overlapping: HashMap::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerPhase {
    Enter,
    Exit,
}

/// Raised when a sensor starts or stops overlapping a volume. Tags are
/// captured on enter so an exit still carries them after the volume is gone.
#[derive(Event, Clone, Debug)]
pub struct TriggerEvent {
    pub phase: TriggerPhase,
    pub sensor: Entity,
    pub volume: Entity,
    pub tags: Tags,
}

impl TriggerEvent {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

pub struct TriggerPlugin;

impl Plugin for TriggerPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<TriggerEvent>().add_systems(
            Update,
            detect_trigger_overlaps.in_set(GameplaySet::Sense),
        );
    }
}

fn boxes_overlap(a_center: Vec3, a_half: Vec3, b_center: Vec3, b_half: Vec3) -> bool {
    let delta = (a_center - b_center).abs();
    let reach = a_half + b_half;
    delta.x <= reach.x && delta.y <= reach.y && delta.z <= reach.z
}

fn detect_trigger_overlaps(
    mut writer: EventWriter<TriggerEvent>,
    mut sensors: Query<(Entity, &Transform, &mut TriggerSensor)>,
    volumes: Query<(Entity, &Transform, &TriggerVolume, Option<&Tags>)>,
) {
    for (sensor_entity, sensor_transform, mut sensor) in sensors.iter_mut() {
        let mut now: HashMap<Entity, Tags> = HashMap::new();
        for (volume_entity, volume_transform, volume, tags) in volumes.iter() {
            if volume_entity == sensor_entity {
                continue;
            }
            if boxes_overlap(
                sensor_transform.translation,
                sensor.half_extents,
                volume_transform.translation,
                volume.half_extents,
            ) {
                now.insert(volume_entity, tags.cloned().unwrap_or_default());
            }
        }

        let mut exited: Vec<(Entity, Tags)> = sensor
            .overlapping
            .iter()
            .filter(|(e, _)| !now.contains_key(*e))
            .map(|(e, t)| (*e, t.clone()))
            .collect();
        exited.sort_by_key(|(e, _)| *e);
        let mut entered: Vec<(Entity, Tags)> = now
            .iter()
            .filter(|(e, _)| !sensor.overlapping.contains_key(*e))
            .map(|(e, t)| (*e, t.clone()))
            .collect();
        entered.sort_by_key(|(e, _)| *e);

        for (volume, tags) in exited {
            writer.send(TriggerEvent {
                phase: TriggerPhase::Exit,
                sensor: sensor_entity,
                volume,
                tags,
            });
        }
        for (volume, tags) in entered {
            writer.send(TriggerEvent {
                phase: TriggerPhase::Enter,
                sensor: sensor_entity,
                volume,
                tags,
            });
        }

        sensor.overlapping = now;
    }
}
