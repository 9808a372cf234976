//! Destructible arena props

use glam::Vec3;
use uuid::Uuid;

use super::combat::{DamageOutcome, Damageable, HitInfo};

/// A static object that soaks up damage until it breaks
#[derive(Debug, Clone, PartialEq)]
pub struct Prop {
    pub id: Uuid,
    pub position: Vec3,
    /// Hit sphere radius
    pub radius: f32,
    pub health: f32,
    pub destroyed: bool,
}

impl Prop {
    pub fn new(position: Vec3, radius: f32, health: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            radius,
            health,
            destroyed: false,
        }
    }
}

impl Damageable for Prop {
    fn take_damage(&mut self, amount: f32, _hit: &HitInfo, _instigator: Option<Uuid>) -> DamageOutcome {
        if self.destroyed {
            return DamageOutcome::AlreadyDead;
        }
        self.health -= amount;
        if self.health <= 0.0 {
            self.destroyed = true;
            return DamageOutcome::Killed;
        }
        DamageOutcome::Wounded
    }
}
