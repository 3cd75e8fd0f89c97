use Entity;

/// `Node` records the tree relationship of a transform: at most one
/// parent, and an ordered sequence of children linked through siblings.
///
/// `Entity` handles are used to record the relationships instead of
/// references. Every access requires going through the arena, which can be
/// cumbersome and comes with some runtime overhead, but it keeps the
/// bookkeeping plain data and rules out owning pointers in both directions
/// between parent and child.
///
/// The link fields are crate private; `attach` and `detach` on the scene
/// graph are the only operations that rewrite them, always both sides of
/// the relation together.
#[derive(Debug, Default, Clone, Copy)]
pub struct Node {
    pub(crate) parent: Option<Entity>,
    pub(crate) next_sib: Option<Entity>,
    pub(crate) prev_sib: Option<Entity>,
    pub(crate) first_child: Option<Entity>,
}

impl Node {
    /// Returns the parent node.
    #[inline]
    pub fn parent(&self) -> Option<Entity> {
        self.parent
    }

    /// Returns true if this is the leaf of a hierarchy, aka. has no child.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.first_child.is_none()
    }

    /// Returns true if this is the root of a hierarchy, aka. has no parent.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}
