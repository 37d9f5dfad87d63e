use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use bitflags::bitflags;
use glam::Vec2;

use super::types::{SpecialEvent, ThrownWeapon};

pub const MAX_WEAPONS: usize = 16;

bitflags! {
    /// One-shot notifications raised by the network thread.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct EventFlags: u32 {
        const GOAL_TOP = 1 << 0;
        const GOAL_BOTTOM = 1 << 1;
        const HALFTIME = 1 << 2;
        const REMATCH = 1 << 3;
        const REVIVE_HOME = 1 << 4;
        const REVIVE_AWAY = 1 << 5;
    }
}

#[derive(Debug, Default)]
struct WeaponSlot {
    thrown: AtomicBool,
    position: [AtomicU32; 2],
    velocity: [AtomicU32; 2],
}

/// Remote events handed from the network thread to the simulation thread.
///
/// Each field is its own atomic. A goal flag and the kickoff team that came
/// with it are two separate stores, so a reader may see one a tick before
/// the other.
#[derive(Debug)]
pub struct EventSignals {
    flags: AtomicU32,
    next_kickoff: AtomicU8,
    players_revived: AtomicU8,
    opponent_wants_rematch: AtomicBool,
    weapons: [WeaponSlot; MAX_WEAPONS],
}

impl Default for EventSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSignals {
    pub fn new() -> Self {
        Self {
            flags: AtomicU32::new(0),
            next_kickoff: AtomicU8::new(0),
            players_revived: AtomicU8::new(0),
            opponent_wants_rematch: AtomicBool::new(false),
            weapons: Default::default(),
        }
    }

    /// Stores the event's data and raises its signal. Returns `false` for a
    /// weapon throw whose index has no slot.
    pub fn apply(&self, event: &SpecialEvent) -> bool {
        match *event {
            SpecialEvent::GoalTop { next_kickoff } => {
                self.next_kickoff.swap(next_kickoff, Ordering::AcqRel);
                self.raise(EventFlags::GOAL_TOP);
            }
            SpecialEvent::GoalBottom { next_kickoff } => {
                self.next_kickoff.swap(next_kickoff, Ordering::AcqRel);
                self.raise(EventFlags::GOAL_BOTTOM);
            }
            SpecialEvent::WeaponThrow(weapon) => return self.record_weapon_throw(&weapon),
            SpecialEvent::Halftime => self.raise(EventFlags::HALFTIME),
            SpecialEvent::Rematch => {
                self.opponent_wants_rematch.store(true, Ordering::Release);
                self.raise(EventFlags::REMATCH);
            }
            SpecialEvent::ReviveHome { revived } => {
                self.players_revived.swap(revived, Ordering::AcqRel);
                self.raise(EventFlags::REVIVE_HOME);
            }
            SpecialEvent::ReviveAway { revived } => {
                self.players_revived.swap(revived, Ordering::AcqRel);
                self.raise(EventFlags::REVIVE_AWAY);
            }
        }
        true
    }

    pub fn raise(&self, flags: EventFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Clears `flag` and reports whether it was set.
    pub fn take(&self, flag: EventFlags) -> bool {
        let previous = self.flags.fetch_and(!flag.bits(), Ordering::AcqRel);
        EventFlags::from_bits_truncate(previous).contains(flag)
    }

    /// Clears and returns every raised flag at once.
    pub fn take_all(&self) -> EventFlags {
        EventFlags::from_bits_truncate(self.flags.swap(0, Ordering::AcqRel))
    }

    pub fn pending(&self) -> EventFlags {
        EventFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub fn next_kickoff(&self) -> u8 {
        self.next_kickoff.load(Ordering::Acquire)
    }

    pub fn players_revived(&self) -> u8 {
        self.players_revived.load(Ordering::Acquire)
    }

    pub fn opponent_wants_rematch(&self) -> bool {
        self.opponent_wants_rematch.load(Ordering::Acquire)
    }

    pub fn set_opponent_wants_rematch(&self, wants: bool) {
        self.opponent_wants_rematch.store(wants, Ordering::Release);
    }

    fn record_weapon_throw(&self, weapon: &ThrownWeapon) -> bool {
        let Some(slot) = usize::try_from(weapon.index)
            .ok()
            .and_then(|i| self.weapons.get(i))
        else {
            return false;
        };

        slot.position[0].store(weapon.position.x.to_bits(), Ordering::Relaxed);
        slot.position[1].store(weapon.position.y.to_bits(), Ordering::Relaxed);
        slot.velocity[0].store(weapon.velocity.x.to_bits(), Ordering::Relaxed);
        slot.velocity[1].store(weapon.velocity.y.to_bits(), Ordering::Relaxed);
        slot.thrown.store(true, Ordering::Release);
        true
    }

    /// Consumes the throw signal for weapon `index`.
    pub fn take_weapon_throw(&self, index: usize) -> Option<ThrownWeapon> {
        let slot = self.weapons.get(index)?;
        if !slot.thrown.swap(false, Ordering::AcqRel) {
            return None;
        }

        let load = |cell: &AtomicU32| f32::from_bits(cell.load(Ordering::Relaxed));
        Some(ThrownWeapon {
            index: index as i32,
            position: Vec2::new(load(&slot.position[0]), load(&slot.position[1])),
            velocity: Vec2::new(load(&slot.velocity[0]), load(&slot.velocity[1])),
        })
    }

    pub fn clear(&self) {
        self.flags.swap(0, Ordering::AcqRel);
        self.opponent_wants_rematch.store(false, Ordering::Release);
        for slot in &self.weapons {
            slot.thrown.store(false, Ordering::Release);
        }
    }
}
