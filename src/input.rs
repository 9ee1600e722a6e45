use bevy::prelude::*;

/// Abstraction layer between raw input and the player controller.
/// The keyboard (windowed) writes here; tests and headless drivers write directly.
#[derive(Resource, Default, Clone)]
pub struct VirtualInput {
    /// Raw axes in [-1, 1]: x is horizontal, y is forward.
    pub axes: Vec2,
    pub activate_just_pressed: bool,
}

impl VirtualInput {
    /// Consume this frame's activate edge.
    pub fn take_activate(&mut self) -> bool {
        std::mem::take(&mut self.activate_just_pressed)
    }

    pub fn clear_frame(&mut self) {
        self.activate_just_pressed = false;
    }
}

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(VirtualInput::default())
            .add_systems(
                PreUpdate,
                keyboard_to_virtual.run_if(resource_exists::<ButtonInput<KeyCode>>),
            )
            .add_systems(Last, clear_virtual_input);
    }
}

const LEFT_KEYS: [KeyCode; 2] = [KeyCode::KeyA, KeyCode::ArrowLeft];
const RIGHT_KEYS: [KeyCode; 2] = [KeyCode::KeyD, KeyCode::ArrowRight];
const FORWARD_KEYS: [KeyCode; 2] = [KeyCode::KeyW, KeyCode::ArrowUp];
const BACK_KEYS: [KeyCode; 2] = [KeyCode::KeyS, KeyCode::ArrowDown];

/// Unsmoothed axis: -1, 0 or 1.
fn raw_axis(keyboard: &ButtonInput<KeyCode>, negative: &[KeyCode], positive: &[KeyCode]) -> f32 {
    let neg = keyboard.any_pressed(negative.iter().copied());
    let pos = keyboard.any_pressed(positive.iter().copied());
    match (neg, pos) {
        (true, false) => -1.0,
        (false, true) => 1.0,
        _ => 0.0,
    }
}

fn keyboard_to_virtual(keyboard: Res<ButtonInput<KeyCode>>, mut vinput: ResMut<VirtualInput>) {
    vinput.axes = Vec2::new(
        raw_axis(&keyboard, &LEFT_KEYS, &RIGHT_KEYS),
        raw_axis(&keyboard, &BACK_KEYS, &FORWARD_KEYS),
    );
    if keyboard.just_pressed(KeyCode::Space) {
        vinput.activate_just_pressed = true;
    }
}

fn clear_virtual_input(mut vinput: ResMut<VirtualInput>) {
    vinput.clear_frame();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_keys_cancel_out() {
        let mut keyboard = ButtonInput::<KeyCode>::default();
        keyboard.press(KeyCode::KeyA);
        keyboard.press(KeyCode::ArrowRight);
        keyboard.press(KeyCode::KeyW);
        assert_eq!(raw_axis(&keyboard, &LEFT_KEYS, &RIGHT_KEYS), 0.0);
        assert_eq!(raw_axis(&keyboard, &BACK_KEYS, &FORWARD_KEYS), 1.0);
    }

    #[test]
    fn activate_edge_is_consumed_once() {
        let mut app = App::new();
        app.insert_resource(ButtonInput::<KeyCode>::default())
            .add_plugins(InputPlugin);
        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::Space);
        app.world_mut()
            .resource_mut::<ButtonInput<KeyCode>>()
            .press(KeyCode::KeyD);

        // Run only PreUpdate so the edge survives for inspection.
        app.world_mut().run_schedule(PreUpdate);
        {
            let mut vinput = app.world_mut().resource_mut::<VirtualInput>();
            assert_eq!(vinput.axes, Vec2::new(1.0, 0.0));
            assert!(vinput.take_activate());
            assert!(!vinput.take_activate());
        }
    }
}
