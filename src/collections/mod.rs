//! Small owned data structures used by the matchmaking queue and the
//! session registry.

mod bimap;
mod ring;

pub use bimap::BiMap;
pub use ring::RingQueue;
