//! A tiny transform hierarchy for building scene graphs.
//!
//! `SceneGraph` stores and manipulates the position, rotation and scale of
//! objects, and keeps a tree relationship between them, so transform
//! properties are accessible in both local and world space.
//!
//! We use a right handed, y-up coordinate system where Z- is the forward
//! axis; positive rotations are counter clockwise.
//!
//! # Spaces
//!
//! Every node owns its _local_ position, rotation and scale, expressed
//! with respect to its parent. The _world_ properties are never stored;
//! they are derived by composing the local properties along the ancestor
//! chain on every read. The local space matrix is composed as
//! `T * S * R` and cached behind a dirty flag, so repeated reads are
//! cheap until a local property changes.
//!
//! # Hierarchy
//!
//! `attach` and `detach` are the only operations that rewrite the tree
//! links, and they always write both sides of the relation together. The
//! `Keep` options let a reparented node hold on to its world space pose
//! by rewriting its local properties.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

extern crate cgmath;
extern crate inlinable_string;
extern crate regex;
extern crate smallvec;

pub mod errors;
pub mod euler;
pub mod spatial;
pub mod utils;

pub mod prelude {
    pub use errors::{Error, Result};
    pub use euler::{Axis, RotationOrder};
    pub use spatial::prelude::*;
    pub use Entity;
}

pub use spatial::graph::{Keep, LayoutEntry, SceneGraph};
pub use spatial::transform::Transform;
pub use utils::handle::Entity;
