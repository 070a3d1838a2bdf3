mod collect;
mod timers;
mod transfer;
mod types;

pub use collect::*;
pub use timers::*;
pub use transfer::*;
pub use types::*;
