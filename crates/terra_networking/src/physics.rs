//! # Shared Movement Physics
//!
//! The server integrates players and mobs with these functions, and the
//! client predicts its own player with the very same code. Any divergence
//! between the two shows up as a reconciliation correction, so nothing here
//! may depend on wall-clock time, randomness, or iteration order.
//!
//! ## Collision
//!
//! Bodies are axis-aligned boxes (feet-centered). Each step moves Y, then X,
//! then Z, splitting the displacement into sub-steps no longer than
//! [`MAX_SUBSTEP`] so a fast body never tunnels through a one-block wall.

use terra_procedural::WorldStore;
use terra_shared::{BlockPos, Vec3};

use crate::protocol::InputFrame;

/// Player box width (X and Z).
pub const PLAYER_WIDTH: f32 = 0.6;
/// Player box height.
pub const PLAYER_HEIGHT: f32 = 1.8;
/// Eye height above the feet.
pub const EYE_HEIGHT: f32 = 1.6;
/// Downward acceleration, blocks/s².
pub const GRAVITY: f32 = 28.0;
/// Initial upward speed of a jump.
pub const JUMP_VELOCITY: f32 = 9.0;
/// Fall speed cap.
pub const TERMINAL_VELOCITY: f32 = 60.0;
/// Walking speed, blocks/s.
pub const WALK_SPEED: f32 = 4.3;
/// Sprinting speed, blocks/s.
pub const SPRINT_SPEED: f32 = 5.6;
/// How quickly horizontal velocity approaches the desired velocity, 1/s.
pub const ACCELERATION: f32 = 10.0;
/// Longest single collision sub-step.
pub const MAX_SUBSTEP: f32 = 0.45;

const SKIN: f32 = 1e-3;

/// Solid-cell lookup. The world store is the only production implementor.
pub trait VoxelQuery {
    /// Whether the cell blocks movement. Unloaded cells are open.
    fn is_solid(&self, x: i32, y: i32, z: i32) -> bool;
}

impl VoxelQuery for WorldStore {
    fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
        self.get_block(x, y, z).is_solid()
    }
}

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

#[allow(clippy::cast_possible_truncation)]
fn cell_floor(v: f32) -> i32 {
    v.floor() as i32
}

#[allow(clippy::cast_possible_truncation)]
fn cell_ceil(v: f32) -> i32 {
    v.ceil() as i32
}

impl Aabb {
    /// Box of a body standing at `feet`.
    #[must_use]
    pub fn around_feet(feet: Vec3, width: f32, height: f32) -> Self {
        let half = width / 2.0;
        Self {
            min: Vec3::new(feet.x - half, feet.y, feet.z - half),
            max: Vec3::new(feet.x + half, feet.y + height, feet.z + half),
        }
    }

    /// Whether the box overlaps the unit cell at `pos`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn intersects_cell(&self, pos: BlockPos) -> bool {
        let (x, y, z) = (pos.x as f32, pos.y as f32, pos.z as f32);
        self.min.x < x + 1.0
            && self.max.x > x
            && self.min.y < y + 1.0
            && self.max.y > y
            && self.min.z < z + 1.0
            && self.max.z > z
    }

    /// Whether any solid cell overlaps the box.
    #[must_use]
    pub fn collides(&self, world: &impl VoxelQuery) -> bool {
        for y in cell_floor(self.min.y)..cell_ceil(self.max.y) {
            for z in cell_floor(self.min.z)..cell_ceil(self.max.z) {
                for x in cell_floor(self.min.x)..cell_ceil(self.max.x) {
                    if world.is_solid(x, y, z) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

/// A moving box: players and mobs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    /// Feet position.
    pub position: Vec3,
    /// Velocity, blocks/s.
    pub velocity: Vec3,
    /// Resting on a solid cell after the last step.
    pub on_ground: bool,
    /// Box width.
    pub width: f32,
    /// Box height.
    pub height: f32,
}

impl Body {
    /// A player-sized body at rest.
    #[must_use]
    pub const fn player(position: Vec3) -> Self {
        Self::new(position, PLAYER_WIDTH, PLAYER_HEIGHT)
    }

    /// A body of the given size at rest.
    #[must_use]
    pub const fn new(position: Vec3, width: f32, height: f32) -> Self {
        Self { position, velocity: Vec3::ZERO, on_ground: false, width, height }
    }

    /// Current bounding box.
    #[must_use]
    pub fn aabb(&self) -> Aabb {
        Aabb::around_feet(self.position, self.width, self.height)
    }

    /// Eye position for a player-sized body.
    #[must_use]
    pub fn eye(&self) -> Vec3 {
        self.position + Vec3::new(0.0, EYE_HEIGHT, 0.0)
    }

    /// Moves to `position` and clears all motion.
    pub fn teleport(&mut self, position: Vec3) {
        self.position = position;
        self.velocity = Vec3::ZERO;
        self.on_ground = false;
    }
}

/// Movement intent for one step, before sequencing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MoveIntent {
    /// Strafe axis in `[-1, 1]`.
    pub move_x: f32,
    /// Forward axis in `[-1, 1]`.
    pub move_z: f32,
    /// Jump held.
    pub jump: bool,
    /// Sprint held.
    pub sprint: bool,
    /// Heading in degrees.
    pub yaw: f32,
    /// Look pitch in degrees.
    pub pitch: f32,
}

impl MoveIntent {
    /// World-space horizontal velocity this intent asks for.
    ///
    /// The local axes are rotated by yaw; yaw 0 walks toward +Z.
    #[must_use]
    pub fn desired_velocity(&self) -> Vec3 {
        let (sin, cos) = self.yaw.to_radians().sin_cos();
        let mut x = self.move_x * cos + self.move_z * sin;
        let mut z = self.move_z * cos - self.move_x * sin;
        let len = (x * x + z * z).sqrt();
        if len > 1.0 {
            x /= len;
            z /= len;
        }
        let speed = if self.sprint { SPRINT_SPEED } else { WALK_SPEED };
        Vec3::new(x * speed, 0.0, z * speed)
    }
}

impl From<&InputFrame> for MoveIntent {
    fn from(frame: &InputFrame) -> Self {
        Self {
            move_x: frame.move_x,
            move_z: frame.move_z,
            jump: frame.jump,
            sprint: frame.sprint,
            yaw: frame.yaw,
            pitch: frame.pitch,
        }
    }
}

/// What happened during a step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// X or Z movement was stopped by a wall.
    pub blocked_horizontal: bool,
    /// Y movement was stopped by a floor or ceiling.
    pub blocked_vertical: bool,
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
    Z,
}

/// Advances a body by `dt` toward a desired horizontal velocity.
pub fn step_body(
    body: &mut Body,
    desired: Vec3,
    jump: bool,
    dt: f32,
    world: &impl VoxelQuery,
) -> StepOutcome {
    let blend = (ACCELERATION * dt).min(1.0);
    body.velocity.x += (desired.x - body.velocity.x) * blend;
    body.velocity.z += (desired.z - body.velocity.z) * blend;

    if jump && body.on_ground {
        body.velocity.y = JUMP_VELOCITY;
    }
    body.velocity.y = (body.velocity.y - GRAVITY * dt).max(-TERMINAL_VELOCITY);

    let delta = body.velocity * dt;
    let longest = delta.x.abs().max(delta.y.abs()).max(delta.z.abs());
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let steps = ((longest / MAX_SUBSTEP).ceil() as u32).max(1);
    #[allow(clippy::cast_precision_loss)]
    let part = delta * (1.0 / steps as f32);

    body.on_ground = false;
    let mut outcome = StepOutcome::default();
    for _ in 0..steps {
        if move_axis(body, Axis::Y, part.y, world) {
            outcome.blocked_vertical = true;
        }
        if move_axis(body, Axis::X, part.x, world) {
            outcome.blocked_horizontal = true;
        }
        if move_axis(body, Axis::Z, part.z, world) {
            outcome.blocked_horizontal = true;
        }
    }
    outcome
}

/// Advances a player body by one input.
pub fn simulate_player(
    body: &mut Body,
    intent: &MoveIntent,
    dt: f32,
    world: &impl VoxelQuery,
) -> StepOutcome {
    step_body(body, intent.desired_velocity(), intent.jump, dt, world)
}

/// Moves along one axis. Returns true when the move was blocked.
#[allow(clippy::cast_precision_loss)]
fn move_axis(body: &mut Body, axis: Axis, amount: f32, world: &impl VoxelQuery) -> bool {
    if amount == 0.0 {
        return false;
    }
    let before = body.position;
    let half = body.width / 2.0;
    match axis {
        Axis::X => body.position.x += amount,
        Axis::Y => body.position.y += amount,
        Axis::Z => body.position.z += amount,
    }
    if !body.aabb().collides(world) {
        return false;
    }

    // Snap flush against the face that stopped us.
    match axis {
        Axis::X if amount > 0.0 => {
            body.position.x = cell_floor(body.position.x + half) as f32 - half - SKIN;
        }
        Axis::X => body.position.x = (cell_floor(body.position.x - half) + 1) as f32 + half + SKIN,
        Axis::Y if amount > 0.0 => {
            body.position.y = cell_floor(body.position.y + body.height) as f32 - body.height - SKIN;
        }
        Axis::Y => body.position.y = (cell_floor(body.position.y) + 1) as f32,
        Axis::Z if amount > 0.0 => {
            body.position.z = cell_floor(body.position.z + half) as f32 - half - SKIN;
        }
        Axis::Z => body.position.z = (cell_floor(body.position.z - half) + 1) as f32 + half + SKIN,
    }
    if body.aabb().collides(world) {
        body.position = before;
    }

    match axis {
        Axis::X => body.velocity.x = 0.0,
        Axis::Y => {
            if amount < 0.0 {
                body.on_ground = true;
            }
            body.velocity.y = 0.0;
        }
        Axis::Z => body.velocity.z = 0.0,
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Flat floor at y = 0 plus optional extra cells.
    struct Floor(HashSet<(i32, i32, i32)>);

    impl Floor {
        fn new() -> Self {
            Self(HashSet::new())
        }

        fn with(mut self, x: i32, y: i32, z: i32) -> Self {
            self.0.insert((x, y, z));
            self
        }
    }

    impl VoxelQuery for Floor {
        fn is_solid(&self, x: i32, y: i32, z: i32) -> bool {
            y <= 0 || self.0.contains(&(x, y, z))
        }
    }

    fn settle(body: &mut Body, world: &impl VoxelQuery) {
        for _ in 0..40 {
            step_body(body, Vec3::ZERO, false, 0.05, world);
        }
    }

    #[test]
    fn test_falls_and_lands() {
        let world = Floor::new();
        let mut body = Body::player(Vec3::new(0.5, 10.0, 0.5));
        settle(&mut body, &world);
        assert!(body.on_ground);
        assert!((body.position.y - 1.0).abs() < 1e-4);
        assert_eq!(body.velocity.y, 0.0);
    }

    #[test]
    fn test_jump_only_from_ground() {
        let world = Floor::new();
        let mut body = Body::player(Vec3::new(0.5, 5.0, 0.5));
        step_body(&mut body, Vec3::ZERO, true, 0.05, &world);
        assert!(body.velocity.y < 0.0);

        settle(&mut body, &world);
        step_body(&mut body, Vec3::ZERO, true, 0.05, &world);
        assert!(body.velocity.y > 0.0);
        assert!(body.position.y > 1.0);
    }

    #[test]
    fn test_wall_blocks_horizontal_movement() {
        let world = Floor::new().with(3, 1, 0).with(3, 2, 0);
        let mut body = Body::player(Vec3::new(0.5, 1.0, 0.5));
        settle(&mut body, &world);

        let mut blocked = false;
        for _ in 0..40 {
            let out = step_body(&mut body, Vec3::new(WALK_SPEED, 0.0, 0.0), false, 0.05, &world);
            blocked |= out.blocked_horizontal;
        }
        assert!(blocked);
        assert!(body.position.x + PLAYER_WIDTH / 2.0 <= 3.0);
        assert!(body.position.x > 2.5);
    }

    #[test]
    fn test_fast_fall_does_not_tunnel() {
        let world = Floor::new();
        let mut body = Body::player(Vec3::new(0.5, 3.0, 0.5));
        body.velocity.y = -TERMINAL_VELOCITY;
        step_body(&mut body, Vec3::ZERO, false, 0.2, &world);
        assert!(body.position.y >= 1.0);
        assert!(body.on_ground);
    }

    #[test]
    fn test_intent_rotation() {
        let forward = MoveIntent { move_z: 1.0, ..MoveIntent::default() };
        let v = forward.desired_velocity();
        assert!((v.z - WALK_SPEED).abs() < 1e-5 && v.x.abs() < 1e-5);

        let turned = MoveIntent { move_z: 1.0, yaw: 90.0, sprint: true, ..MoveIntent::default() };
        let v = turned.desired_velocity();
        assert!((v.x - SPRINT_SPEED).abs() < 1e-4 && v.z.abs() < 1e-4);

        let diagonal = MoveIntent { move_x: 1.0, move_z: 1.0, ..MoveIntent::default() };
        assert!((diagonal.desired_velocity().length() - WALK_SPEED).abs() < 1e-4);
    }

    #[test]
    fn test_cell_intersection() {
        let aabb = Aabb::around_feet(Vec3::new(0.5, 1.0, 0.5), PLAYER_WIDTH, PLAYER_HEIGHT);
        assert!(aabb.intersects_cell(BlockPos::new(0, 1, 0)));
        assert!(aabb.intersects_cell(BlockPos::new(0, 2, 0)));
        assert!(!aabb.intersects_cell(BlockPos::new(0, 0, 0)));
        assert!(!aabb.intersects_cell(BlockPos::new(1, 1, 0)));
    }
}
