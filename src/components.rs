use std::collections::HashSet;

use bevy::prelude::*;

/// Marks the player entity
#[derive(Component)]
pub struct Player;

/// Marks the door that opens once every torch is lit
#[derive(Component)]
pub struct ExitDoor;

/// Marks entities spawned for the current level
#[derive(Component)]
pub struct LevelEntity;

/// Whether the app runs without a window
#[derive(Resource, Clone, Copy, Default)]
pub struct HeadlessMode(pub bool);

/// Free-form tags, compared case-sensitively like scene tags
#[derive(Component, Clone, Debug, Default, PartialEq)]
pub struct Tags(pub HashSet<String>);

impl Tags {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tags.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }
}

/// Sound clip an entity plays through the audio manager. With a cue set,
/// the clip also plays whenever that entity raises the cue event.
#[derive(Component, Clone, Debug)]
pub struct SfxEmitter {
    pub clip: String,
    pub cue: Option<String>,
}

impl SfxEmitter {
    pub fn new(clip: impl Into<String>) -> Self {
        Self {
            clip: clip.into(),
            cue: None,
        }
    }

    pub fn with_cue(mut self, event: impl Into<String>) -> Self {
        self.cue = Some(event.into());
        self
    }
}

/// Ordering of gameplay work inside `Update`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameplaySet {
    /// Trigger overlaps and other world sensing
    Sense,
    /// Player controller and delayed actions
    Control,
    /// Animator graphs
    Animate,
    /// Camera, hint panel, fades and other visuals
    Present,
}
