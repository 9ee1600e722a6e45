use bevy::prelude::*;

use crate::components::GameplaySet;

/// A torch the player can light. Owned by the level; the controller only
/// holds its `Entity` while standing in its zone.
#[derive(Component, Clone, Debug)]
pub struct Torch {
    pub id: u32,
    lit: bool,
}

impl Torch {
    pub fn new(id: u32) -> Self {
        Self { id, lit: false }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// Light the torch. Returns false if it was already burning.
    pub fn light_now(&mut self) -> bool {
        if self.lit {
            return false;
        }
        self.lit = true;
        true
    }
}

/// Child light shown once the parent torch is lit.
#[derive(Component)]
pub struct TorchFlame;

pub struct TorchPlugin;

impl Plugin for TorchPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, sync_torch_flames.in_set(GameplaySet::Present));
    }
}

fn sync_torch_flames(
    torches: Query<(&Torch, &Children), Changed<Torch>>,
    mut flames: Query<&mut Visibility, With<TorchFlame>>,
) {
    for (torch, children) in torches.iter() {
        for child in children.iter() {
            if let Ok(mut visibility) = flames.get_mut(*child) {
                *visibility = if torch.is_lit() {
                    Visibility::Inherited
                } else {
                    Visibility::Hidden
                };
            }
        }
    }
}
