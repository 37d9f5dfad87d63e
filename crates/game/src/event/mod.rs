mod queue;
mod signals;
mod types;

pub use queue::EventQueue;
pub use signals::{EventFlags, EventSignals, MAX_WEAPONS};
pub use types::{SpecialEvent, ThrownWeapon};
