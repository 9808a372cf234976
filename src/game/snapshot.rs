//! Snapshot building

use crate::replication::protocol::{ProjectileSnapshot, PropSnapshot, ServerMsg};

use super::arena::Arena;

/// Builds replicated-property snapshots at a fixed tick interval
pub struct SnapshotBuilder {
    /// Tick counter since last snapshot
    ticks_since_snapshot: u32,
    /// Snapshot interval in ticks
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force snapshot on next check (joins, deaths)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a full snapshot of the arena
    pub fn build(&self, arena: &Arena) -> ServerMsg {
        let mut characters: Vec<_> = arena
            .characters
            .values()
            .map(|c| {
                let last_seq = c
                    .owner
                    .and_then(|id| arena.controllers.get(&id))
                    .map_or(0, |p| p.last_intent_seq);
                c.snapshot(last_seq)
            })
            .collect();
        characters.sort_by_key(|c| c.character_id);

        let mut controllers: Vec<_> = arena.controllers.values().map(|p| p.snapshot()).collect();
        controllers.sort_by_key(|c| c.user_id);

        let props = arena
            .props
            .values()
            .map(|p| PropSnapshot {
                prop_id: p.id,
                position: p.position,
                health: p.health,
            })
            .collect();

        let projectiles = arena
            .projectiles
            .iter()
            .map(|p| ProjectileSnapshot {
                projectile_id: p.id,
                kind: p.kind,
                position: p.position,
                velocity: p.velocity,
            })
            .collect();

        ServerMsg::Snapshot {
            tick: arena.tick,
            characters,
            controllers,
            props,
            projectiles,
        }
    }
}
