//! Utility modules for the backup mirror.

pub mod clock;
pub mod errors;
pub mod logger;
pub mod ordered_map;

pub use clock::{Clock, FixedClock, SystemClock};
pub use errors::{MirrorError, Result};
pub use ordered_map::OrderedMap;
