use glam::Vec2;

use crate::net::MessageType;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrownWeapon {
    pub index: i32,
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Discrete gameplay events. Each one travels as its own reliable packet.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecialEvent {
    GoalTop { next_kickoff: u8 },
    GoalBottom { next_kickoff: u8 },
    WeaponThrow(ThrownWeapon),
    Halftime,
    Rematch,
    ReviveHome { revived: u8 },
    ReviveAway { revived: u8 },
}

impl SpecialEvent {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::GoalTop { .. } => MessageType::GoalTop,
            Self::GoalBottom { .. } => MessageType::GoalBottom,
            Self::WeaponThrow(_) => MessageType::WeaponThrow,
            Self::Halftime => MessageType::Halftime,
            Self::Rematch => MessageType::Rematch,
            Self::ReviveHome { .. } => MessageType::ReviveHome,
            Self::ReviveAway { .. } => MessageType::ReviveAway,
        }
    }
}
