use std::collections::HashMap;
use std::fmt::Write;
use std::iter;

use cgmath::prelude::*;
use cgmath::{Deg, Matrix3, Matrix4, Quaternion, Rad, Vector3};
use inlinable_string::InlinableString;
use regex::Regex;
use smallvec::SmallVec;

use errors::{Error, Result};
use euler::{self, RotationOrder};
use utils::handle::HandlePool;
use Entity;

use super::node::Node;
use super::transform::Transform;

/// Options for `attach` and `detach`: which world space properties of the
/// moved node survive the reparenting. A set flag rewrites the matching
/// local property so the world space value is unchanged; an unset flag
/// carries the local value over untouched, letting the world pose change
/// with the new parent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Keep {
    pub position: bool,
    pub rotation: bool,
    pub scale: bool,
}

impl Keep {
    /// Local properties are carried over untouched.
    pub const NONE: Keep = Keep {
        position: false,
        rotation: false,
        scale: false,
    };

    /// The whole world space pose is preserved.
    pub const ALL: Keep = Keep {
        position: true,
        rotation: true,
        scale: true,
    };
}

/// An entry of the flattened tree layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry {
    pub entity: Entity,
    /// Visitation index in depth first order.
    pub index: usize,
    /// Distance from the root of the layout.
    pub depth: usize,
}

/// A scene graph that stores and manipulates the position, rotation and
/// scale of objects. A tree relationship between the objects is kept as
/// well, so transform properties are accessible in both local and world
/// space.
///
/// The local properties are the only authoritative state. The local space
/// matrix is cached per node and recomputed lazily after a local property
/// changed; world space values are never cached, since ancestors can
/// change without this node noticing, and are recomputed from the
/// ancestor chain on every read.
///
/// The graph is not designed for concurrent mutation; share it across
/// threads only behind external synchronization.
pub struct SceneGraph {
    handles: HandlePool,
    remap: HashMap<Entity, usize>,
    entities: Vec<Entity>,
    names: Vec<InlinableString>,
    nodes: Vec<Node>,
    local_transforms: Vec<Transform>,
}

impl SceneGraph {
    pub fn new() -> Self {
        SceneGraph {
            handles: HandlePool::new(),
            remap: HashMap::new(),
            entities: Vec::new(),
            names: Vec::new(),
            nodes: Vec::new(),
            local_transforms: Vec::new(),
        }
    }

    /// Creates a node with identity pose.
    pub fn create<T: Into<InlinableString>>(&mut self, name: T) -> Entity {
        self.create_with(name, Transform::default())
    }

    /// Creates a node from the given local pose.
    pub fn create_with<T: Into<InlinableString>>(&mut self, name: T, transform: Transform) -> Entity {
        let ent = self.handles.create();
        self.remap.insert(ent, self.entities.len());
        self.entities.push(ent);
        self.names.push(name.into());
        self.nodes.push(Node::default());
        self.local_transforms.push(transform);
        trace!("[SceneGraph] create {}.", ent);
        ent
    }

    /// Gets the number of nodes in this scene graph.
    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Checks if the `Entity` was created by this scene graph, and has not
    /// been removed yet.
    #[inline]
    pub fn contains(&self, ent: Entity) -> bool {
        self.remap.contains_key(&ent)
    }

    /// Gets the name of the node.
    #[inline]
    pub fn name(&self, ent: Entity) -> Option<&str> {
        self.remap.get(&ent).map(|&index| self.names[index].as_ref())
    }

    /// Sets the name of the node.
    #[inline]
    pub fn set_name<T: Into<InlinableString>>(&mut self, ent: Entity, name: T) {
        if let Some(&index) = self.remap.get(&ent) {
            self.names[index] = name.into();
        }
    }

    /// Removes a node and all of its descendants from the scene graph.
    /// Returns the removed entities in tree order.
    pub fn remove(&mut self, ent: Entity) -> Option<Vec<Entity>> {
        if !self.contains(ent) {
            return None;
        }

        self.unlink(ent);

        let removes: Vec<_> = iter::once(ent).chain(self.descendants(ent)).collect();
        for w in removes.iter() {
            let index = self.remap.remove(w).unwrap();
            self.handles.free(*w);
            self.entities.swap_remove(index);
            self.names.swap_remove(index);
            self.nodes.swap_remove(index);
            self.local_transforms.swap_remove(index);

            if self.entities.len() != index {
                *self.remap.get_mut(&self.entities[index]).unwrap() = index;
            }
        }

        trace!("[SceneGraph] remove {} and {} descendants.", ent, removes.len() - 1);
        Some(removes)
    }

    #[inline]
    fn index(&self, ent: Entity) -> Result<usize> {
        self.remap
            .get(&ent)
            .cloned()
            .ok_or_else(|| Error::NodeNotFound(ent))
    }
}

impl SceneGraph {
    /// Gets the parent node.
    #[inline]
    pub fn parent(&self, ent: Entity) -> Option<Entity> {
        self.remap.get(&ent).and_then(|&index| self.nodes[index].parent)
    }

    /// Returns true if this is the leaf of a hierarchy, aka. has no child.
    #[inline]
    pub fn is_leaf(&self, ent: Entity) -> bool {
        self.remap
            .get(&ent)
            .map(|&index| self.nodes[index].is_leaf())
            .unwrap_or(false)
    }

    /// Returns true if this is the root of a hierarchy, aka. has no parent.
    #[inline]
    pub fn is_root(&self, ent: Entity) -> bool {
        self.remap
            .get(&ent)
            .map(|&index| self.nodes[index].is_root())
            .unwrap_or(false)
    }

    #[inline]
    fn first_child(&self, ent: Entity) -> Option<Entity> {
        self.remap
            .get(&ent)
            .and_then(|&index| self.nodes[index].first_child)
    }

    #[inline]
    fn next_sib(&self, ent: Entity) -> Option<Entity> {
        self.remap
            .get(&ent)
            .and_then(|&index| self.nodes[index].next_sib)
    }

    /// Returns an iterator of references to its ancestors.
    #[inline]
    pub fn ancestors(&self, ent: Entity) -> Ancestors {
        Ancestors {
            graph: self,
            cursor: self.parent(ent),
        }
    }

    /// Return true if rhs is one of the ancestors of this node.
    #[inline]
    pub fn is_ancestor(&self, lhs: Entity, rhs: Entity) -> bool {
        self.ancestors(lhs).any(|v| v == rhs)
    }

    /// Returns an iterator of references to this node's children, in
    /// attachment order.
    #[inline]
    pub fn children(&self, ent: Entity) -> Children {
        Children {
            graph: self,
            cursor: self.first_child(ent),
        }
    }

    /// Returns an iterator of references to this node's descendants in
    /// tree order.
    #[inline]
    pub fn descendants(&self, ent: Entity) -> Descendants {
        Descendants {
            graph: self,
            root: ent,
            cursor: self.first_child(ent),
        }
    }
}

impl SceneGraph {
    /// Attaches `child` to `parent`, after the existing children.
    ///
    /// - An `Entity` that was not created by this scene graph is rejected,
    ///   and so is attaching a node to itself. Validation always happens
    ///   before any link is touched.
    /// - Nothing changes if `child` already is a direct child of `parent`.
    /// - If `child` currently has another parent, it is detached first,
    ///   passing `keep` through.
    /// - The `keep` options rewrite the child's local properties so the
    ///   matching world space properties are unchanged across the
    ///   reparenting.
    pub fn attach(&mut self, parent: Entity, child: Entity, keep: Keep) -> Result<()> {
        self.index(parent)?;
        let child_index = self.index(child)?;

        if parent == child {
            return Err(Error::SelfParent(parent));
        }

        if self.parent(child) == Some(parent) {
            return Ok(());
        }

        if let Some(v) = self.parent(child) {
            self.detach(v, child, keep)?;
        }

        self.link_last(parent, child);
        trace!("[SceneGraph] attach {} to {}.", child, parent);

        if keep.position {
            if let Some(inverse) = self.space_inverse(parent) {
                let position = self.local_transforms[child_index].position();
                self.local_transforms[child_index]
                    .set_position((inverse * position.extend(1.0)).truncate());
            } else {
                warn!(
                    "[SceneGraph] the space of {} is not invertible; the position of {} changes.",
                    parent, child
                );
            }
        }

        if keep.rotation {
            if let Some(rotation) = self.rotation(parent) {
                let local = self.local_transforms[child_index].rotation();
                self.local_transforms[child_index].set_rotation(rotation.invert() * local);
            }
        }

        if keep.scale {
            if let Some(scale) = self.scale(parent) {
                let local = self.local_transforms[child_index].scale();
                self.local_transforms[child_index].set_scale(local.div_element_wise(scale));
            }
        }

        Ok(())
    }

    /// Detaches `child` from `parent`.
    ///
    /// - An `Entity` that was not created by this scene graph is rejected,
    ///   and so is detaching a node from itself. A child whose parent
    ///   pointer names `parent` while the children links disagree signals
    ///   external corruption of the hierarchy and is rejected as well.
    /// - Nothing changes if `child` is not a child of `parent`.
    /// - The `keep` options rewrite the child's local properties from the
    ///   parent's world space, so the matching world space properties are
    ///   unchanged after losing the parent.
    pub fn detach(&mut self, parent: Entity, child: Entity, keep: Keep) -> Result<()> {
        self.index(parent)?;
        let child_index = self.index(child)?;

        if parent == child {
            return Err(Error::SelfParent(parent));
        }

        if self.nodes[child_index].parent == Some(parent)
            && !self.children(parent).any(|v| v == child)
        {
            return Err(Error::CorruptedHierarchy(child, parent));
        }

        if self.nodes[child_index].parent != Some(parent) {
            return Ok(());
        }

        if keep.position {
            if let Some(space) = self.space(parent) {
                let position = self.local_transforms[child_index].position();
                self.local_transforms[child_index]
                    .set_position((space * position.extend(1.0)).truncate());
            }
        }

        if keep.rotation {
            if let Some(rotation) = self.rotation(parent) {
                let local = self.local_transforms[child_index].rotation();
                self.local_transforms[child_index].set_rotation(rotation * local);
            }
        }

        if keep.scale {
            if let Some(scale) = self.scale(parent) {
                let local = self.local_transforms[child_index].scale();
                self.local_transforms[child_index].set_scale(local.mul_element_wise(scale));
            }
        }

        self.unlink(child);
        trace!("[SceneGraph] detach {} from {}.", child, parent);
        Ok(())
    }

    /// Detaches the node from its parent, if it has one.
    pub fn clear_parent(&mut self, ent: Entity, keep: Keep) -> Result<()> {
        match self.parent(ent) {
            Some(parent) => self.detach(parent, ent, keep),
            None => self.index(ent).map(|_| ()),
        }
    }

    /// Detaches all the children of this node.
    pub fn clear_children(&mut self, ent: Entity, keep: Keep) -> Result<()> {
        self.index(ent)?;

        let children: SmallVec<[Entity; 8]> = self.children(ent).collect();
        for child in children {
            self.detach(ent, child, keep)?;
        }

        Ok(())
    }

    /// Appends `child` at the tail of `parent`'s children and sets the
    /// back reference. Both sides of the relation are written together.
    fn link_last(&mut self, parent: Entity, child: Entity) {
        let tail = self.children(parent).last();
        let child_index = self.remap[&child];

        match tail {
            Some(tail) => {
                let tail_index = self.remap[&tail];
                self.nodes[tail_index].next_sib = Some(child);
                self.nodes[child_index].prev_sib = Some(tail);
            }
            None => {
                let parent_index = self.remap[&parent];
                self.nodes[parent_index].first_child = Some(child);
            }
        }

        self.nodes[child_index].parent = Some(parent);
    }

    /// Disconnects the node from its parent and siblings. Children are not
    /// affected.
    fn unlink(&mut self, ent: Entity) {
        let index = match self.remap.get(&ent) {
            Some(&index) => index,
            None => return,
        };

        let (parent, next_sib, prev_sib) = {
            let node = &mut self.nodes[index];
            (
                node.parent.take(),
                node.next_sib.take(),
                node.prev_sib.take(),
            )
        };

        if let Some(sib) = next_sib {
            let i = self.remap[&sib];
            self.nodes[i].prev_sib = prev_sib;
        }

        if let Some(sib) = prev_sib {
            let i = self.remap[&sib];
            self.nodes[i].next_sib = next_sib;
        } else if let Some(parent) = parent {
            // The node was the first child; promote its next sibling.
            let i = self.remap[&parent];
            self.nodes[i].first_child = next_sib;
        }
    }
}

impl SceneGraph {
    /// Gets the space matrix of the node, with local properties only. The
    /// matrix is cached, and recomputed only after a local property
    /// changed.
    #[inline]
    pub fn local_space(&self, ent: Entity) -> Option<Matrix4<f32>> {
        self.remap
            .get(&ent)
            .map(|&index| self.local_transforms[index].matrix())
    }

    /// Gets the space matrix of the node with respect to its ancestors,
    /// recomputed from the ancestor chain on every read.
    pub fn space(&self, ent: Entity) -> Option<Matrix4<f32>> {
        self.remap.get(&ent).map(|&index| {
            self.ancestors(ent)
                .fold(self.local_transforms[index].matrix(), |acc, v| {
                    self.local_transforms[self.remap[&v]].matrix() * acc
                })
        })
    }

    /// Gets the inverted world space matrix, which projects world space
    /// values into this node's local space. Returns `None` if the world
    /// space is not invertible, e.g. because of a degenerate scale.
    #[inline]
    pub fn space_inverse(&self, ent: Entity) -> Option<Matrix4<f32>> {
        self.space(ent).and_then(|m| m.invert())
    }

    #[inline]
    fn parent_space(&self, ent: Entity) -> Matrix4<f32> {
        self.parent(ent)
            .and_then(|v| self.space(v))
            .unwrap_or_else(Matrix4::identity)
    }

    /// Gets position of the node in world space.
    #[inline]
    pub fn position(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.remap.get(&ent).map(|&index| {
            let position = self.local_transforms[index].position();
            (self.parent_space(ent) * position.extend(1.0)).truncate()
        })
    }

    /// Sets position of the node in world space, by projecting the value
    /// through the parent's inverted world space. The position is left
    /// untouched if that space is not invertible.
    pub fn set_position<T>(&mut self, ent: Entity, position: T)
    where
        T: Into<Vector3<f32>>,
    {
        if let Some(&index) = self.remap.get(&ent) {
            let inverse = match self.parent(ent) {
                Some(v) => self.space_inverse(v),
                None => Some(Matrix4::identity()),
            };

            if let Some(inverse) = inverse {
                let local = (inverse * position.into().extend(1.0)).truncate();
                self.local_transforms[index].set_position(local);
            } else {
                warn!("[SceneGraph] the space of {}'s parent is not invertible.", ent);
            }
        }
    }

    /// Gets position of the node in local space.
    #[inline]
    pub fn local_position(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.remap
            .get(&ent)
            .map(|&index| self.local_transforms[index].position())
    }

    /// Sets position of the node in local space.
    #[inline]
    pub fn set_local_position<T>(&mut self, ent: Entity, position: T)
    where
        T: Into<Vector3<f32>>,
    {
        if let Some(&index) = self.remap.get(&ent) {
            self.local_transforms[index].set_position(position);
        }
    }

    /// Gets rotation of the node in world space, composed along the
    /// ancestor chain.
    #[inline]
    pub fn rotation(&self, ent: Entity) -> Option<Quaternion<f32>> {
        self.remap.get(&ent).map(|&index| {
            self.ancestors(ent)
                .fold(self.local_transforms[index].rotation(), |acc, v| {
                    self.local_transforms[self.remap[&v]].rotation() * acc
                })
        })
    }

    /// Sets rotation of the node in world space.
    pub fn set_rotation<T>(&mut self, ent: Entity, rotation: T)
    where
        T: Into<Quaternion<f32>>,
    {
        if let Some(&index) = self.remap.get(&ent) {
            let ancestor = self
                .parent(ent)
                .and_then(|v| self.rotation(v))
                .unwrap_or_else(Quaternion::one);
            self.local_transforms[index].set_rotation(ancestor.invert() * rotation.into());
        }
    }

    /// Gets rotation of the node in local space.
    #[inline]
    pub fn local_rotation(&self, ent: Entity) -> Option<Quaternion<f32>> {
        self.remap
            .get(&ent)
            .map(|&index| self.local_transforms[index].rotation())
    }

    /// Sets rotation of the node in local space.
    #[inline]
    pub fn set_local_rotation<T>(&mut self, ent: Entity, rotation: T)
    where
        T: Into<Quaternion<f32>>,
    {
        if let Some(&index) = self.remap.get(&ent) {
            self.local_transforms[index].set_rotation(rotation);
        }
    }

    /// Gets scale of the node in world space, composed componentwise along
    /// the ancestor chain.
    #[inline]
    pub fn scale(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.remap.get(&ent).map(|&index| {
            self.ancestors(ent)
                .fold(self.local_transforms[index].scale(), |acc, v| {
                    self.local_transforms[self.remap[&v]].scale().mul_element_wise(acc)
                })
        })
    }

    /// Sets scale of the node in world space.
    pub fn set_scale<T>(&mut self, ent: Entity, scale: T)
    where
        T: Into<Vector3<f32>>,
    {
        if let Some(&index) = self.remap.get(&ent) {
            let ancestor = self
                .parent(ent)
                .and_then(|v| self.scale(v))
                .unwrap_or_else(|| Vector3::new(1.0, 1.0, 1.0));
            self.local_transforms[index].set_scale(scale.into().div_element_wise(ancestor));
        }
    }

    /// Gets scale of the node in local space.
    #[inline]
    pub fn local_scale(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.remap
            .get(&ent)
            .map(|&index| self.local_transforms[index].scale())
    }

    /// Sets scale of the node in local space.
    #[inline]
    pub fn set_local_scale<T>(&mut self, ent: Entity, scale: T)
    where
        T: Into<Vector3<f32>>,
    {
        if let Some(&index) = self.remap.get(&ent) {
            self.local_transforms[index].set_scale(scale);
        }
    }

    /// The world alignment of the local negative z-axis. Renormalized,
    /// since the composed rotation accumulates floating point error.
    #[inline]
    pub fn forward(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.rotation(ent)
            .map(|v| (v * Vector3::new(0.0, 0.0, -1.0)).normalize())
    }

    /// The world alignment of the local positive x-axis.
    #[inline]
    pub fn right(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.rotation(ent)
            .map(|v| (v * Vector3::new(1.0, 0.0, 0.0)).normalize())
    }

    /// The world alignment of the local positive y-axis.
    #[inline]
    pub fn up(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.rotation(ent)
            .map(|v| (v * Vector3::new(0.0, 1.0, 0.0)).normalize())
    }

    /// The local alignment of the negative z-axis.
    #[inline]
    pub fn local_forward(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.remap
            .get(&ent)
            .map(|&index| self.local_transforms[index].forward())
    }

    /// The local alignment of the positive x-axis.
    #[inline]
    pub fn local_right(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.remap
            .get(&ent)
            .map(|&index| self.local_transforms[index].right())
    }

    /// The local alignment of the positive y-axis.
    #[inline]
    pub fn local_up(&self, ent: Entity) -> Option<Vector3<f32>> {
        self.remap
            .get(&ent)
            .map(|&index| self.local_transforms[index].up())
    }
}

impl SceneGraph {
    /// Gets the local rotation as euler angles in degrees.
    pub fn euler_angles(
        &self,
        ent: Entity,
        order: RotationOrder,
        extrinsic: bool,
    ) -> Option<Vector3<f32>> {
        self.local_rotation(ent).map(|v| {
            let radians = euler::from_quat(v, order, extrinsic);
            Vector3::new(
                Deg::from(Rad(radians.x)).0,
                Deg::from(Rad(radians.y)).0,
                Deg::from(Rad(radians.z)).0,
            )
        })
    }

    /// Sets the local rotation from euler angles in degrees.
    pub fn set_euler_angles(
        &mut self,
        ent: Entity,
        degrees: Vector3<f32>,
        order: RotationOrder,
        extrinsic: bool,
    ) {
        let radians = Vector3::new(
            Rad::from(Deg(degrees.x)).0,
            Rad::from(Deg(degrees.y)).0,
            Rad::from(Deg(degrees.z)).0,
        );
        self.set_local_rotation(ent, euler::to_quat(radians, order, extrinsic));
    }

    /// Transforms a point in this node's local space to world space.
    #[inline]
    pub fn point_to_world<T>(&self, ent: Entity, point: T) -> Option<Vector3<f32>>
    where
        T: Into<Vector3<f32>>,
    {
        self.space(ent)
            .map(|m| (m * point.into().extend(1.0)).truncate())
    }

    /// Transforms a point in world space to this node's local space.
    /// Returns `None` if the node's world space is not invertible.
    #[inline]
    pub fn point_to_local<T>(&self, ent: Entity, point: T) -> Option<Vector3<f32>>
    where
        T: Into<Vector3<f32>>,
    {
        self.space_inverse(ent)
            .map(|m| (m * point.into().extend(1.0)).truncate())
    }

    /// Transforms a direction in this node's local space to world space.
    #[inline]
    pub fn direction_to_world<T>(&self, ent: Entity, direction: T) -> Option<Vector3<f32>>
    where
        T: Into<Vector3<f32>>,
    {
        self.rotation(ent).map(|v| v * direction.into())
    }

    /// Transforms a direction in world space to this node's local space.
    #[inline]
    pub fn direction_to_local<T>(&self, ent: Entity, direction: T) -> Option<Vector3<f32>>
    where
        T: Into<Vector3<f32>>,
    {
        self.rotation(ent).map(|v| v.invert() * direction.into())
    }

    /// Sets the local rotation so the forward axis aligns with the given
    /// direction, expressed in the parent's space.
    pub fn look_at_local<T1, T2>(&mut self, ent: Entity, direction: T1, up: T2)
    where
        T1: Into<Vector3<f32>>,
        T2: Into<Vector3<f32>>,
    {
        if !self.contains(ent) {
            return;
        }

        let direction = direction.into().normalize();

        // Looking almost straight up or down degenerates the default up
        // axis; fall back to the x-axis there.
        let up = if direction.dot(Vector3::new(0.0, 1.0, 0.0)).abs() < 0.999 {
            up.into()
        } else {
            Vector3::new(1.0, 0.0, 0.0)
        };

        let back = -direction;
        let side = up.cross(back).normalize();
        let up = back.cross(side).normalize();
        let rotation: Quaternion<f32> = Matrix3::from_cols(side, up, back).into();

        self.set_local_rotation(ent, rotation);
    }

    /// Sets the local rotation so the forward axis aligns with the given
    /// direction, expressed in world space.
    pub fn look_at<T1, T2>(&mut self, ent: Entity, direction: T1, up: T2)
    where
        T1: Into<Vector3<f32>>,
        T2: Into<Vector3<f32>>,
    {
        let ancestor = self
            .parent(ent)
            .and_then(|v| self.rotation(v))
            .unwrap_or_else(Quaternion::one);
        self.look_at_local(ent, ancestor.invert() * direction.into(), up);
    }

    /// Resets the local pose to position (0, 0, 0), identity rotation and
    /// scale (1, 1, 1).
    pub fn reset(&mut self, ent: Entity, recursive: bool) {
        if let Some(&index) = self.remap.get(&ent) {
            self.local_transforms[index] = Transform::default();

            if recursive {
                let children: SmallVec<[Entity; 8]> = self.children(ent).collect();
                for child in children {
                    self.reset(child, true);
                }
            }
        }
    }
}

impl SceneGraph {
    /// Changes the local position of the node, and compensates its
    /// children so their world position is unaffected.
    ///
    /// - With `None`, the node's local position is moved to the origin.
    /// - With a delta, the value is added to the current local position.
    /// - If `recursive`, every descendant applies the same change in turn,
    ///   each level fully compensating its own children.
    pub fn apply_position(
        &mut self,
        ent: Entity,
        position: Option<Vector3<f32>>,
        recursive: bool,
    ) -> Result<()> {
        self.index(ent)?;
        self.apply_position_impl(ent, position, recursive);
        Ok(())
    }

    fn apply_position_impl(&mut self, ent: Entity, position: Option<Vector3<f32>>, recursive: bool) {
        let index = self.remap[&ent];
        let (current, rotation, scale) = {
            let v = &self.local_transforms[index];
            (v.position(), v.rotation(), v.scale())
        };

        let change = position.unwrap_or(-current);

        // The children interpret their local position through this node's
        // rotation and scale before translation, so the compensation is
        // the change projected back through both, inverted.
        let inverse = rotation.invert() * (-change).div_element_wise(scale);

        self.local_transforms[index].set_position(current + change);

        let children: SmallVec<[Entity; 8]> = self.children(ent).collect();
        for child in children {
            let i = self.remap[&child];
            let v = self.local_transforms[i].position();
            self.local_transforms[i].set_position(v + inverse);

            if recursive {
                self.apply_position_impl(child, position, true);
            }
        }
    }

    /// Changes the local rotation of the node, and compensates its
    /// children so their world pose is unaffected. With `bake`, only the
    /// children's position is compensated: their world rotation absorbs
    /// the change while their world position stays fixed.
    ///
    /// - With `None`, the node's local rotation is reset to identity.
    /// - With a delta, the value is composed onto the current rotation.
    /// - If `recursive`, every descendant applies the same change in turn.
    pub fn apply_rotation(
        &mut self,
        ent: Entity,
        rotation: Option<Quaternion<f32>>,
        recursive: bool,
        bake: bool,
    ) -> Result<()> {
        self.index(ent)?;
        self.apply_rotation_impl(ent, rotation, recursive, bake);
        Ok(())
    }

    fn apply_rotation_impl(
        &mut self,
        ent: Entity,
        rotation: Option<Quaternion<f32>>,
        recursive: bool,
        bake: bool,
    ) {
        let index = self.remap[&ent];
        let current = self.local_transforms[index].rotation();

        let change = rotation.unwrap_or_else(|| current.invert());
        let inverse = change.invert();

        self.local_transforms[index].set_rotation(current * change);

        let children: SmallVec<[Entity; 8]> = self.children(ent).collect();
        for child in children {
            let i = self.remap[&child];
            let v = self.local_transforms[i].position();
            self.local_transforms[i].set_position(inverse * v);

            if !bake {
                let v = self.local_transforms[i].rotation();
                self.local_transforms[i].set_rotation(inverse * v);
            }

            if recursive {
                self.apply_rotation_impl(child, rotation, true, bake);
            }
        }
    }

    /// Changes the local scale of the node, and compensates its children
    /// so their world pose is unaffected. With `bake`, only the children's
    /// position is compensated: their world scale absorbs the change while
    /// their world position stays fixed.
    ///
    /// - With `None`, the node's local scale is reset to (1, 1, 1).
    /// - With a delta, the value is multiplied onto the current scale.
    /// - If `recursive`, every descendant applies the same change in turn.
    pub fn apply_scale(
        &mut self,
        ent: Entity,
        scale: Option<Vector3<f32>>,
        recursive: bool,
        bake: bool,
    ) -> Result<()> {
        self.index(ent)?;
        self.apply_scale_impl(ent, scale, recursive, bake);
        Ok(())
    }

    fn apply_scale_impl(
        &mut self,
        ent: Entity,
        scale: Option<Vector3<f32>>,
        recursive: bool,
        bake: bool,
    ) {
        let index = self.remap[&ent];
        let current = self.local_transforms[index].scale();

        let change = scale.unwrap_or_else(|| reciprocal(current));
        let inverse = reciprocal(change);

        self.local_transforms[index].set_scale(current.mul_element_wise(change));

        let children: SmallVec<[Entity; 8]> = self.children(ent).collect();
        for child in children {
            let i = self.remap[&child];
            let v = self.local_transforms[i].position();
            self.local_transforms[i].set_position(v.mul_element_wise(inverse));

            if !bake {
                let v = self.local_transforms[i].scale();
                self.local_transforms[i].set_scale(v.mul_element_wise(inverse));
            }

            if recursive {
                self.apply_scale_impl(child, scale, true, bake);
            }
        }
    }
}

impl SceneGraph {
    /// Flattens the node and its descendants in depth first order, tagging
    /// each entry with its visitation index, counted from `index`, and its
    /// depth, counted from `depth`.
    pub fn layout(&self, ent: Entity, index: usize, depth: usize) -> Vec<LayoutEntry> {
        let mut result = Vec::new();
        if self.contains(ent) {
            self.layout_into(ent, index, depth, &mut result);
        }
        result
    }

    fn layout_into(&self, ent: Entity, base: usize, depth: usize, out: &mut Vec<LayoutEntry>) {
        out.push(LayoutEntry {
            entity: ent,
            index: base + out.len(),
            depth: depth,
        });

        for child in self.children(ent) {
            self.layout_into(child, base, depth + 1, out);
        }
    }

    /// Collects the nodes of the subtree whose name contains the pattern,
    /// in depth first order. With `exact` the name has to be equal to the
    /// pattern instead.
    pub fn filter<T: AsRef<str>>(
        &self,
        ent: Entity,
        pattern: T,
        exact: bool,
        case_sensitive: bool,
    ) -> Vec<Entity> {
        if !self.contains(ent) {
            return Vec::new();
        }

        let pattern = if case_sensitive {
            pattern.as_ref().to_string()
        } else {
            pattern.as_ref().to_lowercase()
        };

        iter::once(ent)
            .chain(self.descendants(ent))
            .filter(|v| {
                let name: &str = self.names[self.remap[v]].as_ref();
                if case_sensitive {
                    (exact && name == pattern) || (!exact && name.contains(&pattern[..]))
                } else {
                    let name = name.to_lowercase();
                    (exact && name == pattern) || (!exact && name.contains(&pattern[..]))
                }
            })
            .collect()
    }

    /// Collects the nodes of the subtree whose name matches the regular
    /// expression at the start of the name, in depth first order.
    pub fn filter_regex<T: AsRef<str>>(&self, ent: Entity, pattern: T) -> Result<Vec<Entity>> {
        self.index(ent)?;

        let re = Regex::new(pattern.as_ref()).map_err(|v| Error::InvalidPattern(v.to_string()))?;

        Ok(iter::once(ent)
            .chain(self.descendants(ent))
            .filter(|v| {
                let name: &str = self.names[self.remap[v]].as_ref();
                re.find(name).map(|m| m.start() == 0).unwrap_or(false)
            })
            .collect())
    }

    /// Deep copies the node and its descendants into a new detached tree,
    /// and returns the copied root.
    pub fn duplicate(&mut self, ent: Entity) -> Option<Entity> {
        if !self.contains(ent) {
            return None;
        }

        let (name, transform) = {
            let index = self.remap[&ent];
            (self.names[index].clone(), self.local_transforms[index].clone())
        };

        let copy = self.create_with(name, transform);

        let children: SmallVec<[Entity; 8]> = self.children(ent).collect();
        for child in children {
            if let Some(v) = self.duplicate(child) {
                self.link_last(copy, v);
            }
        }

        Some(copy)
    }

    /// Renders the subtree as a human readable tree, one node per line.
    pub fn dump(&self, ent: Entity) -> String {
        let mut out = String::new();
        if self.contains(ent) {
            self.dump_into(ent, &mut Vec::new(), &mut out);
        }
        out
    }

    fn dump_into(&self, ent: Entity, markers: &mut Vec<bool>, out: &mut String) {
        if markers.len() > 1 {
            for &draw in &markers[..markers.len() - 1] {
                out.push_str(if draw { "|  " } else { "   " });
            }
        }

        if !markers.is_empty() {
            out.push_str("+- ");
        }

        let _ = writeln!(out, "{}", self.names[self.remap[&ent]]);

        let children: SmallVec<[Entity; 8]> = self.children(ent).collect();
        for (i, child) in children.iter().enumerate() {
            markers.push(i + 1 != children.len());
            self.dump_into(*child, markers, out);
            markers.pop();
        }
    }
}

#[inline]
fn reciprocal(v: Vector3<f32>) -> Vector3<f32> {
    Vector3::new(1.0 / v.x, 1.0 / v.y, 1.0 / v.z)
}

/// An iterator of references to its ancestors.
pub struct Ancestors<'a> {
    graph: &'a SceneGraph,
    cursor: Option<Entity>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = Entity;

    fn next(&mut self) -> Option<Self::Item> {
        let ent = self.cursor?;
        self.cursor = self.graph.parent(ent);
        Some(ent)
    }
}

/// An iterator of references to its children.
pub struct Children<'a> {
    graph: &'a SceneGraph,
    cursor: Option<Entity>,
}

impl<'a> Iterator for Children<'a> {
    type Item = Entity;

    fn next(&mut self) -> Option<Self::Item> {
        let ent = self.cursor?;
        self.cursor = self.graph.next_sib(ent);
        Some(ent)
    }
}

/// An iterator of references to its descendants, in tree order.
pub struct Descendants<'a> {
    graph: &'a SceneGraph,
    root: Entity,
    cursor: Option<Entity>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = Entity;

    fn next(&mut self) -> Option<Self::Item> {
        let ent = self.cursor?;

        // Deep first search when iterating descendants.
        if let Some(child) = self.graph.first_child(ent) {
            self.cursor = Some(child);
            return Some(ent);
        }

        // Travel back when we reach a leaf node.
        let mut v = ent;
        loop {
            if v == self.root {
                self.cursor = None;
                break;
            }

            if let Some(sib) = self.graph.next_sib(v) {
                self.cursor = Some(sib);
                break;
            }

            match self.graph.parent(v) {
                Some(parent) => v = parent,
                None => {
                    self.cursor = None;
                    break;
                }
            }
        }

        Some(ent)
    }
}
