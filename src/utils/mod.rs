//! Commonly used utilities.

pub mod handle;

pub use self::handle::{Entity, HandleIndex, HandlePool};
