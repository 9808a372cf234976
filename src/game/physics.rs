//! Character kinematics and movement constraints

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::config::GameplayTuning;

use super::world::World;

/// Horizontal acceleration available at full air control
const AIR_ACCELERATION: f32 = 2_048.0;

/// Kinematic state of a character capsule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Capsule centre
    pub position: Vec3,
    pub velocity: Vec3,
    /// Facing in radians around +Z; yaw 0 faces +X
    pub yaw: f32,
    /// Aim pitch in radians, positive looks up
    pub pitch: f32,
    pub grounded: bool,
    pub max_walk_speed: f32,
    /// Movement turns the character toward its input direction
    pub orient_to_movement: bool,
    pub collision_enabled: bool,
    /// Latest (forward, right) movement axes
    pub move_input: Vec2,
}

impl Body {
    /// A grounded body standing on `feet`
    pub fn standing_at(feet: Vec3, yaw: f32, tuning: &GameplayTuning) -> Self {
        Self {
            position: feet + Vec3::Z * tuning.capsule_half_height,
            velocity: Vec3::ZERO,
            yaw,
            pitch: 0.0,
            grounded: true,
            max_walk_speed: tuning.jog_speed,
            orient_to_movement: true,
            collision_enabled: true,
            move_input: Vec2::ZERO,
        }
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), self.yaw.sin(), 0.0)
    }

    /// Right-hand side of the facing direction
    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Z)
    }

    pub fn up(&self) -> Vec3 {
        Vec3::Z
    }

    /// Unit aim direction from yaw and pitch
    pub fn aim_direction(&self) -> Vec3 {
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(cp * self.yaw.cos(), cp * self.yaw.sin(), sp)
    }

    /// Convert a (forward, right, up) offset into world space
    pub fn local_to_world(&self, offset: Vec3) -> Vec3 {
        self.position + self.forward() * offset.x + self.right() * offset.y + self.up() * offset.z
    }

    pub fn is_moving(&self) -> bool {
        self.velocity != Vec3::ZERO
    }

    /// Replace the velocity outright and leave the ground
    pub fn launch(&mut self, velocity: Vec3) {
        self.velocity = velocity;
        self.grounded = false;
    }

    pub fn jump(&mut self, jump_velocity: f32) {
        self.velocity.z = jump_velocity;
        self.grounded = false;
    }
}

/// Result of one physics step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// Touched the ground after being airborne
    pub landed: bool,
    /// Dropped below the world's kill plane
    pub fell_out_of_world: bool,
}

/// Physics system for moving character bodies through the world
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Integrate one step of movement input, gravity and ground contact
    pub fn step(body: &mut Body, tuning: &GameplayTuning, world: &dyn World, dt: f32) -> StepOutcome {
        let mut outcome = StepOutcome::default();

        if !body.collision_enabled {
            return outcome;
        }

        let input = body.move_input.clamp_length_max(1.0);
        let wish = (body.forward() * input.x + body.right() * input.y) * body.max_walk_speed;

        if body.grounded {
            body.velocity.x = wish.x;
            body.velocity.y = wish.y;
            body.velocity.z = body.velocity.z.max(0.0);
        } else {
            let horizontal = Vec3::new(body.velocity.x, body.velocity.y, 0.0);
            let steer = (wish - horizontal).clamp_length_max(AIR_ACCELERATION * tuning.air_control * dt);
            body.velocity.x += steer.x;
            body.velocity.y += steer.y;
            body.velocity.z -= tuning.gravity * dt;
        }

        let mut next = body.position + body.velocity * dt;

        // Horizontal moves into level geometry are rejected
        let lateral = Vec3::new(next.x, next.y, body.position.z);
        if lateral != body.position && world.blocks_sphere(lateral, tuning.capsule_radius) {
            next.x = body.position.x;
            next.y = body.position.y;
            body.velocity.x = 0.0;
            body.velocity.y = 0.0;
        }

        let probe = Vec3::new(next.x, next.y, body.position.z - tuning.capsule_half_height);
        let next_feet = next.z - tuning.capsule_half_height;
        match world.ground_height(probe) {
            Some(ground) if body.velocity.z <= 0.0 && next_feet <= ground => {
                next.z = ground + tuning.capsule_half_height;
                body.velocity.z = 0.0;
                if !body.grounded {
                    outcome.landed = true;
                }
                body.grounded = true;
            }
            _ => body.grounded = false,
        }

        body.position = next;
        outcome.fell_out_of_world = body.position.z < world.kill_z();
        outcome
    }
}
