//! Server-side player simulation.
//!
//! Movement is a plain kinematic step with no collision. The head looks along yaw and
//! pitch; yaw 0 faces `-Z`.

use std::collections::HashSet;

use cgmath::{Deg, InnerSpace, Point3, Quaternion, Rotation3, Vector3};

use crate::network::protocol::{PlayerAction, PlayerState};

/// Voxels per second.
pub const MOVE_SPEED: f32 = 4.5;
pub const EYE_HEIGHT: f32 = 1.6;
/// How far a player can break or place, in voxels.
pub const REACH: f32 = 5.0;
const PITCH_LIMIT: f32 = 89.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Player {
    pub position: Point3<f32>,
    /// Degrees
    pub yaw: f32,
    /// Degrees, clamped to +-89
    pub pitch: f32,
}

impl Player {
    pub fn new(position: Point3<f32>) -> Self {
        Player {
            position,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw = (self.yaw + yaw_delta).rem_euclid(360.0);
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Horizontal facing direction.
    pub fn forward(&self) -> Vector3<f32> {
        let yaw = self.yaw.to_radians();
        Vector3::new(-yaw.sin(), 0.0, -yaw.cos())
    }

    pub fn right(&self) -> Vector3<f32> {
        let yaw = self.yaw.to_radians();
        Vector3::new(yaw.cos(), 0.0, -yaw.sin())
    }

    /// Unit view direction of the head.
    pub fn look_direction(&self) -> Vector3<f32> {
        let pitch = self.pitch.to_radians();
        (self.forward() * pitch.cos() + Vector3::unit_y() * pitch.sin()).normalize()
    }

    pub fn eye(&self) -> Point3<f32> {
        self.position + Vector3::unit_y() * EYE_HEIGHT
    }

    /// Applies one tick of held movement keys. Non-movement actions are ignored.
    pub fn step(&mut self, actions: &HashSet<PlayerAction>, dt: f32) {
        let mut direction = Vector3::new(0.0, 0.0, 0.0);
        for action in actions {
            direction += match action {
                PlayerAction::MoveForward => self.forward(),
                PlayerAction::MoveBack => -self.forward(),
                PlayerAction::MoveLeft => -self.right(),
                PlayerAction::MoveRight => self.right(),
                PlayerAction::Jump => Vector3::unit_y(),
                PlayerAction::Break | PlayerAction::Place => continue,
            };
        }
        if direction.magnitude2() > 0.0 {
            self.position += direction.normalize() * MOVE_SPEED * dt;
        }
    }

    pub fn body_orientation(&self) -> Quaternion<f32> {
        Quaternion::from_angle_y(Deg(self.yaw))
    }

    pub fn head_orientation(&self) -> Quaternion<f32> {
        self.body_orientation() * Quaternion::from_angle_x(Deg(self.pitch))
    }

    pub fn state(&self, client_id: u16) -> PlayerState {
        PlayerState {
            client_id,
            position: self.position,
            body_orientation: self.body_orientation(),
            head_orientation: self.head_orientation(),
        }
    }
}

/// Walks the voxel grid from `origin` along `direction` for up to `reach` voxels.
///
/// # Returns
/// The first voxel for which `is_solid` holds, together with the voxel the ray was in
/// just before it, or `None` if nothing solid is in reach.
pub fn raycast(
    origin: Point3<f32>,
    direction: Vector3<f32>,
    reach: f32,
    mut is_solid: impl FnMut([i32; 3]) -> bool,
) -> Option<([i32; 3], [i32; 3])> {
    const STEP: f32 = 0.05;
    let voxel_of = |point: Point3<f32>| {
        [
            point.x.floor() as i32,
            point.y.floor() as i32,
            point.z.floor() as i32,
        ]
    };

    let direction = direction.normalize();
    let mut previous = voxel_of(origin);
    if is_solid(previous) {
        return Some((previous, previous));
    }
    let mut travelled = STEP;
    while travelled <= reach {
        let current = voxel_of(origin + direction * travelled);
        if current != previous {
            if is_solid(current) {
                return Some((current, previous));
            }
            previous = current;
        }
        travelled += STEP;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Rotation;

    #[test]
    fn test_forward_follows_yaw() {
        let mut player = Player::new(Point3::new(0.0, 0.0, 0.0));
        let actions: HashSet<_> = [PlayerAction::MoveForward].into_iter().collect();
        player.step(&actions, 1.0);
        assert!((player.position.z + MOVE_SPEED).abs() < 1e-5);

        let mut player = Player::new(Point3::new(0.0, 0.0, 0.0));
        player.rotate(-90.0, 0.0);
        player.step(&actions, 1.0);
        assert!((player.position.x - MOVE_SPEED).abs() < 1e-4);
    }

    #[test]
    fn test_opposite_keys_cancel() {
        let mut player = Player::new(Point3::new(1.0, 2.0, 3.0));
        let actions: HashSet<_> = [PlayerAction::MoveLeft, PlayerAction::MoveRight]
            .into_iter()
            .collect();
        player.step(&actions, 1.0);
        assert_eq!(player.position, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_pitch_is_clamped() {
        let mut player = Player::new(Point3::new(0.0, 0.0, 0.0));
        player.rotate(370.0, 200.0);
        assert!((player.yaw - 10.0).abs() < 1e-4);
        assert_eq!(player.pitch, 89.0);
    }

    #[test]
    fn test_head_orientation_matches_look_direction() {
        let mut player = Player::new(Point3::new(0.0, 0.0, 0.0));
        player.rotate(30.0, -20.0);
        let rotated = player.head_orientation().rotate_vector(-Vector3::unit_z());
        assert!((rotated - player.look_direction()).magnitude() < 1e-4);
    }

    #[test]
    fn test_raycast_reports_hit_and_previous() {
        let hit = raycast(
            Point3::new(0.5, 0.5, 0.5),
            Vector3::new(1.0, 0.0, 0.0),
            REACH,
            |voxel| voxel == [3, 0, 0],
        );
        assert_eq!(hit, Some(([3, 0, 0], [2, 0, 0])));

        let miss = raycast(
            Point3::new(0.5, 0.5, 0.5),
            Vector3::new(1.0, 0.0, 0.0),
            REACH,
            |voxel| voxel == [9, 0, 0],
        );
        assert_eq!(miss, None);
    }
}
