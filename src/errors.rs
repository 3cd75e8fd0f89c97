use utils::handle::Entity;

#[derive(Debug, Fail)]
pub enum Error {
    /// The `Entity` was not created by this scene graph, or has been
    /// removed from it already.
    #[fail(display = "{} does not have a node in this scene graph.", _0)]
    NodeNotFound(Entity),
    /// A node can not be attached to or detached from itself.
    #[fail(display = "{} can not set self as parent.", _0)]
    SelfParent(Entity),
    /// A rotation order must name every axis exactly once.
    #[fail(
        display = "\"{}\" is not a rotation order. Must be one of XYZ, XZY, YXZ, YZX, ZXY, ZYX.",
        _0
    )]
    InvalidRotationOrder(String),
    /// The name pattern is not a valid regular expression.
    #[fail(display = "invalid name pattern: {}.", _0)]
    InvalidPattern(String),
    /// The parent pointer and the children links disagree. The hierarchy
    /// has been modified outside of attach/detach; not recoverable.
    #[fail(
        display = "{} claims {} as parent, but is missing from its children. \
                   Avoid manual modifications of the hierarchy.",
        _0, _1
    )]
    CorruptedHierarchy(Entity, Entity),
}

pub type Result<T> = ::std::result::Result<T, Error>;
