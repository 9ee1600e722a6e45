use bevy::prelude::*;

use crate::components::GameplaySet;

/// On-screen level hint. The controller only flips `visible`; when a window
/// is up the panel entity also carries a `Text` node kept in sync here.
#[derive(Component, Clone, Debug, Default)]
pub struct HintDisplay {
    pub text: String,
    pub visible: bool,
    pub times_shown: u32,
}

impl HintDisplay {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..default()
        }
    }

    pub fn show(&mut self) {
        if !self.visible {
            self.times_shown = self.times_shown.saturating_add(1);
        }
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }
}

pub struct HintPlugin;

impl Plugin for HintPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, sync_hint_panel.in_set(GameplaySet::Present));
    }
}

fn sync_hint_panel(
    mut panels: Query<(&HintDisplay, &mut Visibility, Option<&mut Text>), Changed<HintDisplay>>,
) {
    for (hint, mut visibility, text) in panels.iter_mut() {
        *visibility = if hint.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        };
        if let Some(mut text) = text {
            if text.0 != hint.text {
                text.0 = hint.text.clone();
            }
        }
    }
}
