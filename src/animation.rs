use std::collections::{HashMap, HashSet};

use bevy::prelude::*;

use crate::components::GameplaySet;
use crate::events::GameEventBus;

pub const PLAYER_GRAPH: &str = "torchbearer";
pub const DOOR_GRAPH: &str = "exit_door";

pub const IS_WALKING: &str = "IsWalking";
pub const LIGHT_TORCH: &str = "LightTorch";
pub const OPEN: &str = "Open";
pub const LIGHTING_TAG: &str = "Lighting";

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct AnimTimedEventDef {
    /// Seconds into the clip
    pub at: f32,
    pub event: String,
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct AnimationStateDef {
    #[serde(default)]
    pub tag: Option<String>,
    /// Clip length in seconds; zero holds the state until a transition fires.
    #[serde(default)]
    pub duration: f32,
    #[serde(default)]
    pub looping: bool,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub events: Vec<AnimTimedEventDef>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionCondition {
    Trigger { name: String },
    Bool { name: String, value: bool },
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct AnimationTransitionDef {
    /// `None` matches any state except `to`
    #[serde(default)]
    pub from: Option<String>,
    pub to: String,
    pub when: TransitionCondition,
}

#[derive(Clone, serde::Serialize, serde::Deserialize, Default)]
pub struct AnimationGraphDef {
    #[serde(default)]
    pub default_state: String,
    #[serde(default)]
    pub states: HashMap<String, AnimationStateDef>,
    #[serde(default)]
    pub transitions: Vec<AnimationTransitionDef>,
}

#[derive(Resource, Clone, serde::Serialize, serde::Deserialize, Default)]
pub struct AnimationLibrary {
    pub graphs: HashMap<String, AnimationGraphDef>,
}

/// Animator parameters and current state, in the shape of a state-machine
/// animator: bools persist, triggers stay armed until a transition consumes them.
#[derive(Component, Clone, Debug)]
pub struct Animator {
    pub graph: String,
    pub state: String,
    pub elapsed: f32,
    bools: HashMap<String, bool>,
    triggers: HashSet<String>,
}

impl Animator {
    pub fn new(graph: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            graph: graph.into(),
            state: state.into(),
            elapsed: 0.0,
            bools: HashMap::new(),
            triggers: HashSet::new(),
        }
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.bools.insert(name.to_string(), value);
    }

    pub fn get_bool(&self, name: &str) -> bool {
        self.bools.get(name).copied().unwrap_or(false)
    }

    pub fn set_trigger(&mut self, name: &str) {
        self.triggers.insert(name.to_string());
    }

    pub fn has_trigger(&self, name: &str) -> bool {
        self.triggers.contains(name)
    }

    pub fn current_tag<'a>(&self, library: &'a AnimationLibrary) -> Option<&'a str> {
        library
            .graphs
            .get(&self.graph)?
            .states
            .get(&self.state)?
            .tag
            .as_deref()
    }

    pub fn is_in_tag(&self, library: &AnimationLibrary, tag: &str) -> bool {
        self.current_tag(library) == Some(tag)
    }

    fn enter(&mut self, state: &str) {
        self.state = state.to_string();
        self.elapsed = 0.0;
    }

    fn condition_holds(&self, condition: &TransitionCondition) -> bool {
        match condition {
            TransitionCondition::Trigger { name } => self.triggers.contains(name),
            TransitionCondition::Bool { name, value } => self.get_bool(name) == *value,
        }
    }
}

pub struct AnimationPlugin;

impl Plugin for AnimationPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(default_animation_library()).add_systems(
            Update,
            (normalize_missing_animation_states, advance_animators)
                .chain()
                .in_set(GameplaySet::Animate),
        );
    }
}

fn looping_state(tag: Option<&str>) -> AnimationStateDef {
    AnimationStateDef {
        tag: tag.map(str::to_string),
        duration: 1.0,
        looping: true,
        next: None,
        events: Vec::new(),
    }
}

fn held_state() -> AnimationStateDef {
    AnimationStateDef {
        tag: None,
        duration: 0.0,
        looping: false,
        next: None,
        events: Vec::new(),
    }
}

fn bool_transition(from: &str, to: &str, name: &str, value: bool) -> AnimationTransitionDef {
    AnimationTransitionDef {
        from: Some(from.to_string()),
        to: to.to_string(),
        when: TransitionCondition::Bool {
            name: name.to_string(),
            value,
        },
    }
}

pub(crate) fn default_animation_library() -> AnimationLibrary {
    let mut graphs = HashMap::new();
    graphs.insert(
        PLAYER_GRAPH.to_string(),
        AnimationGraphDef {
            default_state: "idle".to_string(),
            states: HashMap::from([
                ("idle".to_string(), looping_state(None)),
                ("walk".to_string(), looping_state(None)),
                (
                    "light_torch".to_string(),
                    AnimationStateDef {
                        tag: Some(LIGHTING_TAG.to_string()),
                        duration: 1.2,
                        looping: false,
                        next: Some("idle".to_string()),
                        events: vec![AnimTimedEventDef {
                            at: 0.8,
                            event: "fire_ignite".to_string(),
                        }],
                    },
                ),
            ]),
            transitions: vec![
                AnimationTransitionDef {
                    from: None,
                    to: "light_torch".to_string(),
                    when: TransitionCondition::Trigger {
                        name: LIGHT_TORCH.to_string(),
                    },
                },
                bool_transition("idle", "walk", IS_WALKING, true),
                bool_transition("walk", "idle", IS_WALKING, false),
            ],
        },
    );
    graphs.insert(
        DOOR_GRAPH.to_string(),
        AnimationGraphDef {
            default_state: "closed".to_string(),
            states: HashMap::from([
                ("closed".to_string(), held_state()),
                ("open".to_string(), held_state()),
            ]),
            transitions: vec![
                bool_transition("closed", "open", OPEN, true),
                bool_transition("open", "closed", OPEN, false),
            ],
        },
    );
    AnimationLibrary { graphs }
}

fn normalize_missing_animation_states(
    library: Res<AnimationLibrary>,
    mut query: Query<&mut Animator>,
) {
    for mut anim in query.iter_mut() {
        let Some(graph) = library.graphs.get(&anim.graph) else {
            continue;
        };
        if graph.states.is_empty() || graph.states.contains_key(&anim.state) {
            continue;
        }
        if graph.states.contains_key(&graph.default_state) {
            let default_state = graph.default_state.clone();
            anim.enter(&default_state);
        } else if let Some(first) = graph.states.keys().min().cloned() {
            anim.enter(&first);
        }
    }
}

fn advance_animators(
    time: Res<Time>,
    library: Res<AnimationLibrary>,
    mut bus: ResMut<GameEventBus>,
    mut query: Query<(Entity, &mut Animator)>,
) {
    let dt = time.delta_secs();
    for (entity, mut anim) in query.iter_mut() {
        let Some(graph) = library.graphs.get(&anim.graph) else {
            continue;
        };

        let fired = graph.transitions.iter().find(|t| {
            let from_matches = match t.from.as_deref() {
                Some(from) => from == anim.state,
                None => t.to != anim.state,
            };
            from_matches && graph.states.contains_key(&t.to) && anim.condition_holds(&t.when)
        });
        if let Some(transition) = fired {
            if let TransitionCondition::Trigger { name } = &transition.when {
                anim.triggers.remove(name);
            }
            anim.enter(&transition.to);
        }

        let Some(clip) = graph.states.get(&anim.state) else {
            continue;
        };
        let before = anim.elapsed;
        anim.elapsed += dt;
        let after = anim.elapsed;
        emit_clip_events(&mut bus, entity, &anim, clip, before, after);

        if clip.duration <= 0.0 || after < clip.duration {
            continue;
        }
        if clip.looping {
            anim.elapsed = after % clip.duration;
        } else if let Some(next) = clip.next.as_deref() {
            if graph.states.contains_key(next) {
                anim.enter(next);
            }
        }
    }
}

fn emit_clip_events(
    bus: &mut GameEventBus,
    entity: Entity,
    anim: &Animator,
    clip: &AnimationStateDef,
    before: f32,
    after: f32,
) {
    for ev in clip.events.iter() {
        let crossed = ev.at > before && ev.at <= after || (before == 0.0 && ev.at == 0.0);
        let name = ev.event.trim();
        if !crossed || name.is_empty() {
            continue;
        }
        let full_name = if name.starts_with("anim:") {
            name.to_string()
        } else {
            format!("anim:{name}")
        };
        bus.emit(
            full_name,
            serde_json::json!({
                "entity": entity.to_bits(),
                "graph": anim.graph,
                "state": anim.state,
            }),
            Some(entity.to_bits()),
        );
    }
}
