use std::collections::VecDeque;

use bevy::prelude::*;
use serde::Serialize;

const HISTORY_LEN: usize = 256;

/// A named gameplay event with a JSON payload, stamped with the frame it fired on.
#[derive(Serialize, Clone, Debug)]
pub struct GameEvent {
    pub name: String,
    pub data: serde_json::Value,
    pub frame: u64,
    pub source_entity: Option<u64>,
}

/// Rolling history of gameplay milestones (`torch_lit`, `puzzle_solved`,
/// `level_complete`, `level_loaded`) and animation clip events (`anim:*`).
/// Audio cues and the analytics log read from it; nothing writes back.
#[derive(Resource, Default)]
pub struct GameEventBus {
    history: VecDeque<GameEvent>,
    pub frame: u64,
    evicted: u64,
}

impl GameEventBus {
    pub fn emit(
        &mut self,
        name: impl Into<String>,
        data: serde_json::Value,
        source_entity: Option<u64>,
    ) {
        let event = GameEvent {
            name: name.into(),
            data,
            frame: self.frame,
            source_entity,
        };
        debug!("event {} on frame {}", event.name, event.frame);
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
            self.evicted += 1;
        }
        self.history.push_back(event);
    }

    /// Events with the given name, oldest first.
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a GameEvent> + 'a {
        self.history.iter().filter(move |ev| ev.name == name)
    }

    /// Events stamped strictly after `frame`, oldest first.
    pub fn after_frame(&self, frame: u64) -> impl Iterator<Item = &GameEvent> + '_ {
        self.history.iter().filter(move |ev| ev.frame > frame)
    }

    /// How many events fell off the front of the history.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

pub struct GameEventsPlugin;

impl Plugin for GameEventsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<GameEventBus>()
            .add_systems(First, advance_event_frame);
    }
}

fn advance_event_frame(mut bus: ResMut<GameEventBus>) {
    bus.frame += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn oldest_torch_events_are_evicted_first() {
        let mut bus = GameEventBus::default();
        for torch_id in 0..HISTORY_LEN + 3 {
            bus.emit("torch_lit", json!({ "torch_id": torch_id }), None);
        }
        assert_eq!(bus.evicted(), 3);
        assert_eq!(bus.named("torch_lit").count(), HISTORY_LEN);
        let oldest = bus.named("torch_lit").next().unwrap();
        assert_eq!(oldest.data["torch_id"], 3);
    }

    #[test]
    fn after_frame_skips_events_already_seen() {
        let mut app = App::new();
        app.add_plugins(GameEventsPlugin);
        app.update();
        app.world_mut()
            .resource_mut::<GameEventBus>()
            .emit("torch_lit", json!({ "torch_id": 0 }), None);
        app.update();
        let mut bus = app.world_mut().resource_mut::<GameEventBus>();
        bus.emit("puzzle_solved", json!({}), None);

        let fresh: Vec<&str> = bus.after_frame(1).map(|ev| ev.name.as_str()).collect();
        assert_eq!(fresh, vec!["puzzle_solved"]);
        assert_eq!(bus.named("puzzle_solved").next().unwrap().frame, 2);
    }
}
