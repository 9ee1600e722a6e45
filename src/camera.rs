use bevy::prelude::*;

use crate::components::GameplaySet;

#[derive(Component)]
pub struct MainCamera;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CameraFocus {
    #[default]
    Player,
    ExitDoor,
}

/// Follow rig on the main camera. The camera keeps its orientation and
/// slides to keep `offset` from whichever entity it is focused on.
#[derive(Component, Clone, Debug)]
pub struct CameraRig {
    pub focus: CameraFocus,
    pub player: Option<Entity>,
    pub exit_door: Option<Entity>,
    pub offset: Vec3,
    pub follow_speed: f32,
}

impl CameraRig {
    pub fn new(offset: Vec3) -> Self {
        Self {
            focus: CameraFocus::Player,
            player: None,
            exit_door: None,
            offset,
            follow_speed: 0.1,
        }
    }

    pub fn set_focus(&mut self, focus: CameraFocus) {
        if self.focus != focus {
            debug!("camera focus -> {focus:?}");
        }
        self.focus = focus;
    }

    pub fn target_entity(&self) -> Option<Entity> {
        match self.focus {
            CameraFocus::Player => self.player,
            CameraFocus::ExitDoor => self.exit_door,
        }
    }
}

/// Camera heading in degrees, clockwise seen from above, zero looking down -Z.
pub fn camera_yaw_degrees(transform: &Transform) -> f32 {
    let (yaw, _, _) = transform.rotation.to_euler(EulerRot::YXZ);
    -yaw.to_degrees()
}

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, camera_follow.in_set(GameplaySet::Present));
    }
}

fn camera_follow(
    time: Res<Time>,
    mut cameras: Query<(&CameraRig, &mut Transform), With<MainCamera>>,
    targets: Query<&Transform, Without<MainCamera>>,
) {
    for (rig, mut cam_transform) in cameras.iter_mut() {
        let Some(target) = rig.target_entity().and_then(|e| targets.get(e).ok()) else {
            continue;
        };
        let goal = target.translation + rig.offset;
        let follow_speed = if rig.follow_speed.is_finite() {
            rig.follow_speed
        } else {
            1.0
        };
        let alpha = (follow_speed * time.delta_secs() * 60.0).clamp(0.0, 1.0);
        cam_transform.translation = cam_transform.translation.lerp(goal, alpha);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn yaw_is_clockwise_from_minus_z() {
        let straight = Transform::from_xyz(0.0, 10.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y);
        assert!(camera_yaw_degrees(&straight).abs() < 0.01);

        let turned = Transform::from_rotation(Quat::from_rotation_y(-90f32.to_radians()));
        assert!((camera_yaw_degrees(&turned) - 90.0).abs() < 0.01);
    }

    #[test]
    fn camera_slides_toward_focused_entity() {
        let mut app = App::new();
        app.insert_resource(Time::<()>::default())
            .add_plugins(CameraPlugin);
        let player = app.world_mut().spawn(Transform::from_xyz(0.0, 0.0, 0.0)).id();
        let door = app
            .world_mut()
            .spawn(Transform::from_xyz(0.0, 0.0, -20.0))
            .id();
        let mut rig = CameraRig::new(Vec3::new(0.0, 8.0, 8.0));
        rig.player = Some(player);
        rig.exit_door = Some(door);
        rig.follow_speed = 1.0;
        let camera = app
            .world_mut()
            .spawn((MainCamera, rig, Transform::from_xyz(0.0, 8.0, 8.0)))
            .id();

        app.world_mut()
            .get_mut::<CameraRig>(camera)
            .unwrap()
            .set_focus(CameraFocus::ExitDoor);
        app.world_mut()
            .resource_mut::<Time>()
            .advance_by(Duration::from_secs_f32(1.0 / 30.0));
        app.update();

        let cam = app.world().get::<Transform>(camera).unwrap();
        assert!((cam.translation - Vec3::new(0.0, 8.0, -12.0)).length() < 0.001);
    }
}
