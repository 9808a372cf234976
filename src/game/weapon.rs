//! Weapons, ammo bookkeeping and the per-character loadout

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::combat::ProjectileKind;

/// Weapons a character carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponKind {
    /// Hit-scan automatic rifle
    Rifle,
    /// Slow-firing rocket projectiles
    RocketLauncher,
}

/// How a shot is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShootingMode {
    /// Resolved by an immediate trace
    Instant,
    /// Resolved by a travelling projectile
    Projectile,
}

/// Static weapon stats per weapon kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeaponStats {
    pub mode: ShootingMode,
    /// Damage per hit (instant weapons only, projectiles carry their own)
    pub damage: f32,
    /// Total rounds the weapon can hold, clip included
    pub ammo_capacity: u32,
    pub clip_capacity: u32,
    pub shots_per_second: u32,
    /// Seconds the reload takes
    pub reload_duration: f32,
    /// Muzzle position relative to the capsule centre, in (forward, right, up)
    pub muzzle_offset: Vec3,
    pub projectile: Option<ProjectileKind>,
}

impl WeaponStats {
    pub fn for_kind(kind: WeaponKind) -> Self {
        match kind {
            WeaponKind::Rifle => Self {
                mode: ShootingMode::Instant,
                damage: 12.0,
                ammo_capacity: 240,
                clip_capacity: 30,
                shots_per_second: 8,
                reload_duration: 2.0,
                muzzle_offset: Vec3::new(60.0, 20.0, 40.0),
                projectile: None,
            },
            WeaponKind::RocketLauncher => Self {
                mode: ShootingMode::Projectile,
                damage: 0.0,
                ammo_capacity: 16,
                clip_capacity: 4,
                shots_per_second: 1,
                reload_duration: 2.5,
                muzzle_offset: Vec3::new(80.0, 20.0, 50.0),
                projectile: Some(ProjectileKind::Rocket),
            },
        }
    }

    /// Seconds between two shots of a held trigger
    pub fn fire_interval(&self) -> f32 {
        1.0 / self.shots_per_second.max(1) as f32
    }
}

/// A weapon instance with its ammo state
#[derive(Debug, Clone, PartialEq)]
pub struct Weapon {
    pub kind: WeaponKind,
    pub stats: WeaponStats,
    pub ammo_in_clip: u32,
    /// Reserve rounds outside the clip
    pub remaining_ammo: u32,
    pub hidden: bool,
}

impl Weapon {
    /// A freshly issued weapon: full clip, full reserve
    pub fn new(kind: WeaponKind) -> Self {
        let stats = WeaponStats::for_kind(kind);
        Self {
            kind,
            stats,
            ammo_in_clip: stats.clip_capacity,
            remaining_ammo: stats.ammo_capacity.saturating_sub(stats.clip_capacity),
            hidden: false,
        }
    }

    /// Build a weapon with explicit ammo counts, clamped to the weapon's capacities
    pub fn with_ammo(kind: WeaponKind, ammo_in_clip: u32, remaining_ammo: u32) -> Self {
        let mut weapon = Self::new(kind);
        weapon.ammo_in_clip = ammo_in_clip.min(weapon.stats.clip_capacity);
        weapon.remaining_ammo = remaining_ammo.min(weapon.max_reserve());
        weapon
    }

    pub fn max_reserve(&self) -> u32 {
        self.stats
            .ammo_capacity
            .saturating_sub(self.stats.clip_capacity)
    }

    pub fn has_ammo_in_clip(&self) -> bool {
        self.ammo_in_clip > 0
    }

    pub fn clip_full(&self) -> bool {
        self.ammo_in_clip >= self.stats.clip_capacity
    }

    pub fn can_reload(&self) -> bool {
        !self.clip_full() && self.remaining_ammo > 0
    }

    /// Top the clip up from the reserve. No-op when the clip is full or the reserve is empty.
    pub fn reload(&mut self) {
        if !self.can_reload() {
            return;
        }
        let transfer = self
            .remaining_ammo
            .min(self.stats.clip_capacity - self.ammo_in_clip);
        self.ammo_in_clip += transfer;
        self.remaining_ammo -= transfer;
    }

    /// Spend one round from the clip. The caller checks `has_ammo_in_clip` first.
    pub fn consume_round(&mut self) {
        self.ammo_in_clip = self.ammo_in_clip.saturating_sub(1);
    }
}

/// The two weapons a character owns; exactly one is equipped
#[derive(Debug, Clone, PartialEq)]
pub struct Loadout {
    rifle: Weapon,
    rocket_launcher: Weapon,
    equipped: WeaponKind,
}

impl Loadout {
    /// Rifle in hand, rocket launcher carried hidden
    pub fn standard() -> Self {
        let mut rocket_launcher = Weapon::new(WeaponKind::RocketLauncher);
        rocket_launcher.hidden = true;
        Self {
            rifle: Weapon::new(WeaponKind::Rifle),
            rocket_launcher,
            equipped: WeaponKind::Rifle,
        }
    }

    pub fn equipped_kind(&self) -> WeaponKind {
        self.equipped
    }

    pub fn equipped(&self) -> &Weapon {
        self.get(self.equipped)
    }

    pub fn equipped_mut(&mut self) -> &mut Weapon {
        self.get_mut(self.equipped)
    }

    pub fn get(&self, kind: WeaponKind) -> &Weapon {
        match kind {
            WeaponKind::Rifle => &self.rifle,
            WeaponKind::RocketLauncher => &self.rocket_launcher,
        }
    }

    pub fn get_mut(&mut self, kind: WeaponKind) -> &mut Weapon {
        match kind {
            WeaponKind::Rifle => &mut self.rifle,
            WeaponKind::RocketLauncher => &mut self.rocket_launcher,
        }
    }

    /// Hide the weapon in hand and show `target` in its place
    pub fn swap_to(&mut self, target: WeaponKind) {
        self.equipped_mut().hidden = true;
        self.equipped = target;
        self.equipped_mut().hidden = false;
    }
}

impl Default for Loadout {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_fills_clip_from_large_reserve() {
        let mut rifle = Weapon::with_ammo(WeaponKind::Rifle, 10, 50);
        rifle.reload();
        assert_eq!(rifle.ammo_in_clip, 30);
        assert_eq!(rifle.remaining_ammo, 30);
    }

    #[test]
    fn reload_empties_small_reserve() {
        let mut rifle = Weapon::with_ammo(WeaponKind::Rifle, 10, 15);
        rifle.reload();
        assert_eq!(rifle.ammo_in_clip, 25);
        assert_eq!(rifle.remaining_ammo, 0);
    }

    #[test]
    fn reload_is_a_no_op_when_full_or_dry() {
        let mut full = Weapon::with_ammo(WeaponKind::Rifle, 30, 40);
        full.reload();
        assert_eq!((full.ammo_in_clip, full.remaining_ammo), (30, 40));

        let mut dry = Weapon::with_ammo(WeaponKind::Rifle, 3, 0);
        dry.reload();
        dry.reload();
        assert_eq!((dry.ammo_in_clip, dry.remaining_ammo), (3, 0));
    }

    #[test]
    fn consume_round_saturates() {
        let mut launcher = Weapon::with_ammo(WeaponKind::RocketLauncher, 1, 0);
        launcher.consume_round();
        launcher.consume_round();
        assert_eq!(launcher.ammo_in_clip, 0);
        assert!(!launcher.has_ammo_in_clip());
    }

    #[test]
    fn issued_weapons_respect_capacity() {
        for kind in [WeaponKind::Rifle, WeaponKind::RocketLauncher] {
            let weapon = Weapon::new(kind);
            assert!(weapon.ammo_in_clip <= weapon.stats.clip_capacity);
            assert!(weapon.remaining_ammo <= weapon.max_reserve());
        }
    }

    #[test]
    fn swap_keeps_exactly_one_weapon_visible() {
        let mut loadout = Loadout::standard();
        assert_eq!(loadout.equipped_kind(), WeaponKind::Rifle);
        assert!(loadout.get(WeaponKind::RocketLauncher).hidden);

        loadout.swap_to(WeaponKind::RocketLauncher);
        assert_eq!(loadout.equipped_kind(), WeaponKind::RocketLauncher);
        assert!(loadout.get(WeaponKind::Rifle).hidden);
        assert!(!loadout.get(WeaponKind::RocketLauncher).hidden);

        loadout.swap_to(WeaponKind::RocketLauncher);
        assert!(!loadout.get(WeaponKind::RocketLauncher).hidden);
    }
}
