//! Health and energy pools

use serde::{Deserialize, Serialize};

use crate::config::GameplayTuning;

/// Health and energy of one character.
///
/// Health is only ever reduced by damage and may drop below zero on the
/// killing blow. Energy is clamped to `0..=energy_capacity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub health: f32,
    pub health_capacity: f32,
    pub energy: f32,
    pub energy_capacity: f32,
    /// Energy restored per regeneration tick
    pub energy_regen: f32,
    /// Energy drained per tick while sprinting
    pub sprint_drain: f32,
}

/// What a single energy tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyTick {
    Drained,
    Regenerated,
    /// Drained down to the exhaustion threshold while sprinting
    Exhausted,
}

/// Energy at or below which an active sprint is forced to stop
pub const EXHAUSTION_THRESHOLD: f32 = 1.0;

impl Vitals {
    pub fn full(tuning: &GameplayTuning) -> Self {
        Self {
            health: tuning.health_capacity,
            health_capacity: tuning.health_capacity,
            energy: tuning.energy_capacity,
            energy_capacity: tuning.energy_capacity,
            energy_regen: tuning.energy_regen,
            sprint_drain: tuning.sprint_drain,
        }
    }

    /// Spend `cost` energy if the pool holds at least that much.
    /// Returns false and leaves the pool untouched otherwise.
    pub fn use_energy(&mut self, cost: f32) -> bool {
        if self.energy < cost {
            return false;
        }
        self.energy = (self.energy - cost).max(0.0);
        true
    }

    /// One fixed-cadence energy step. Draining happens only while the owner
    /// is sprinting, not aiming and actually moving.
    pub fn tick_energy(&mut self, sprinting: bool, aiming: bool, moving: bool) -> EnergyTick {
        let result = if sprinting && !aiming && moving {
            self.energy = (self.energy - self.sprint_drain).max(0.0);
            EnergyTick::Drained
        } else {
            self.energy = (self.energy + self.energy_regen).min(self.energy_capacity);
            EnergyTick::Regenerated
        };

        if sprinting && self.energy <= EXHAUSTION_THRESHOLD {
            return EnergyTick::Exhausted;
        }
        result
    }

    pub fn drain_energy(&mut self) {
        self.energy = 0.0;
    }

    /// Subtract damage without clamping and report whether health is depleted
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        self.health -= amount;
        self.health <= 0.0
    }

    pub fn is_depleted(&self) -> bool {
        self.health <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vitals() -> Vitals {
        Vitals::full(&GameplayTuning::default())
    }

    #[test]
    fn use_energy_only_spends_what_is_there() {
        let mut v = vitals();
        v.energy = 12.0;

        assert!(v.use_energy(10.0));
        assert_eq!(v.energy, 2.0);

        assert!(!v.use_energy(10.0));
        assert_eq!(v.energy, 2.0);

        assert!(v.use_energy(2.0));
        assert_eq!(v.energy, 0.0);
    }

    #[test]
    fn energy_never_goes_negative_over_any_cost_sequence() {
        let mut v = vitals();
        let costs = [15.0, 10.0, 33.3, 0.5, 41.0, 7.0, 10.0, 100.0, 0.0, 2.2];
        for cost in costs.iter().cycle().take(60) {
            let before = v.energy;
            let spent = v.use_energy(*cost);
            assert_eq!(spent, before >= *cost);
            assert!(v.energy >= 0.0);
        }
    }

    #[test]
    fn regeneration_is_capped() {
        let mut v = vitals();
        v.energy = v.energy_capacity - 0.1;
        assert_eq!(v.tick_energy(false, false, true), EnergyTick::Regenerated);
        assert_eq!(v.energy, v.energy_capacity);
    }

    #[test]
    fn sprinting_while_aiming_or_standing_still_regenerates() {
        let mut v = vitals();
        v.energy = 50.0;
        v.tick_energy(true, true, true);
        assert!(v.energy > 50.0);

        let mut v = vitals();
        v.energy = 50.0;
        v.tick_energy(true, false, false);
        assert!(v.energy > 50.0);
    }

    #[test]
    fn sprint_drain_exhausts_at_threshold() {
        let mut v = vitals();
        v.energy = 3.0;
        assert_eq!(v.tick_energy(true, false, true), EnergyTick::Drained);
        assert_eq!(v.tick_energy(true, false, true), EnergyTick::Exhausted);
        assert_eq!(v.energy, 1.0);
    }

    #[test]
    fn damage_may_overshoot_below_zero() {
        let mut v = vitals();
        assert!(!v.apply_damage(40.0));
        assert!(v.apply_damage(110.0));
        assert_eq!(v.health, -50.0);
    }
}
