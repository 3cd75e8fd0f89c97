#[macro_use]
extern crate approx;
extern crate cgmath;
extern crate env_logger;
extern crate rand;
extern crate scene_graph;

use cgmath::prelude::*;
use cgmath::{Quaternion, Rad, Vector3};
use rand::Rng;
use scene_graph::errors::Error;
use scene_graph::prelude::*;
use scene_graph::Transform;

const SAMPLES: usize = 32;

fn random_direction<T: Rng>(rng: &mut T) -> Vector3<f32> {
    loop {
        let v = Vector3::new(
            rng.gen_range(-1.0f32, 1.0),
            rng.gen_range(-1.0f32, 1.0),
            rng.gen_range(-1.0f32, 1.0),
        );

        if v.magnitude2() > 1.0e-3 {
            return v.normalize();
        }
    }
}

fn random_transform<T: Rng>(rng: &mut T) -> Transform {
    Transform::new(
        Vector3::new(
            rng.gen_range(-5.0f32, 5.0),
            rng.gen_range(-5.0f32, 5.0),
            rng.gen_range(-5.0f32, 5.0),
        ),
        Quaternion::from_axis_angle(random_direction(rng), Rad(rng.gen_range(-3.0f32, 3.0))),
        Vector3::new(
            rng.gen_range(0.5f32, 2.0),
            rng.gen_range(0.5f32, 2.0),
            rng.gen_range(0.5f32, 2.0),
        ),
    )
}

fn assert_same_rotation(lhs: Quaternion<f32>, rhs: Quaternion<f32>) {
    let v = lhs * rhs.invert();
    let angle = 2.0 * v.s.min(1.0).max(-1.0).acos();
    assert!(
        angle < 0.01 || angle > 2.0 * ::std::f32::consts::PI - 0.01,
        "rotations differ by {} radians",
        angle
    );
}

#[test]
fn attach() {
    let _ = env_logger::try_init();

    let mut scene = SceneGraph::new();
    let root = scene.create("root");
    let c1 = scene.create("c1");
    let c2 = scene.create("c2");
    let c3 = scene.create("c3");
    let c4 = scene.create("c4");

    scene.attach(root, c1, Keep::NONE).unwrap();
    assert_eq!(scene.parent(c1), Some(root));
    assert_eq!(scene.children(root).count(), 1);

    scene.attach(root, c2, Keep::NONE).unwrap();
    assert_eq!(scene.parent(c2), Some(root));
    assert_eq!(scene.children(root).count(), 2);

    scene.attach(root, c3, Keep::NONE).unwrap();
    scene.attach(root, c4, Keep::NONE).unwrap();
    assert_eq!(scene.parent(c3), Some(root));
    assert_eq!(scene.parent(c4), Some(root));
    assert_eq!(scene.children(root).count(), 4);

    // Attaching an existing direct child changes nothing, not even the
    // children order.
    scene.attach(root, c1, Keep::NONE).unwrap();
    let children: Vec<_> = scene.children(root).collect();
    assert_eq!(children, [c1, c2, c3, c4]);

    assert!(!scene.is_leaf(root));
    assert!(scene.is_root(root));
    assert!(scene.is_leaf(c1));
    assert!(!scene.is_root(c1));
}

#[test]
fn attach_moves_between_parents() {
    let mut scene = SceneGraph::new();
    let root = scene.create("root");
    let other = scene.create("other");
    let child = scene.create("child");

    scene.attach(root, child, Keep::NONE).unwrap();
    assert_eq!(scene.parent(child), Some(root));

    // The implicit detach keeps both sides of the relation in sync.
    scene.attach(other, child, Keep::NONE).unwrap();
    assert_eq!(scene.parent(child), Some(other));
    assert_eq!(scene.children(root).count(), 0);
    assert_eq!(scene.children(other).count(), 1);
}

#[test]
fn detach() {
    let mut scene = SceneGraph::new();
    let root = scene.create("root");
    let c1 = scene.create("c1");
    let c2 = scene.create("c2");

    scene.attach(root, c1, Keep::NONE).unwrap();
    scene.attach(root, c2, Keep::NONE).unwrap();

    scene.detach(root, c1, Keep::NONE).unwrap();
    assert_eq!(scene.parent(c1), None);
    assert_eq!(scene.children(root).count(), 1);

    scene.detach(root, c2, Keep::NONE).unwrap();
    assert_eq!(scene.parent(c2), None);
    assert_eq!(scene.children(root).count(), 0);

    // Detaching a node that is not a child is a no-op.
    let other = scene.create("other");
    scene.attach(other, c1, Keep::NONE).unwrap();
    scene.detach(root, c1, Keep::NONE).unwrap();
    assert_eq!(scene.parent(c1), Some(other));
    assert_eq!(scene.children(other).count(), 1);
}

#[test]
fn clear_children() {
    let mut scene = SceneGraph::new();
    let root = scene.create("root");
    let c1 = scene.create("c1");
    let c2 = scene.create("c2");

    scene.attach(root, c1, Keep::NONE).unwrap();
    scene.clear_children(root, Keep::NONE).unwrap();
    assert_eq!(scene.parent(c1), None);
    assert_eq!(scene.children(root).count(), 0);

    scene.attach(root, c1, Keep::NONE).unwrap();
    scene.attach(root, c2, Keep::NONE).unwrap();
    scene.clear_children(root, Keep::NONE).unwrap();
    assert_eq!(scene.parent(c1), None);
    assert_eq!(scene.parent(c2), None);
    assert_eq!(scene.children(root).count(), 0);

    // And again, on an empty node.
    scene.clear_children(root, Keep::NONE).unwrap();
    assert_eq!(scene.children(root).count(), 0);
}

#[test]
fn clear_parent() {
    let mut scene = SceneGraph::new();
    let root = scene.create("root");
    let c1 = scene.create("c1");
    let c2 = scene.create("c2");

    scene.attach(root, c1, Keep::NONE).unwrap();
    scene.attach(root, c2, Keep::NONE).unwrap();

    scene.clear_parent(c1, Keep::NONE).unwrap();
    assert_eq!(scene.parent(c1), None);
    assert_eq!(scene.children(root).count(), 1);

    scene.clear_parent(c2, Keep::NONE).unwrap();
    assert_eq!(scene.parent(c2), None);
    assert_eq!(scene.children(root).count(), 0);

    // A root without a parent stays untouched.
    scene.clear_parent(c2, Keep::NONE).unwrap();
    assert_eq!(scene.parent(c2), None);
}

#[test]
fn invalid_arguments() {
    let mut scene = SceneGraph::new();
    let root = scene.create("root");
    let child = scene.create("child");
    scene.attach(root, child, Keep::NONE).unwrap();

    // A node can not be attached to itself, and the tree is untouched by
    // the failure.
    match scene.attach(root, root, Keep::ALL) {
        Err(Error::SelfParent(_)) => {}
        v => panic!("unexpected {:?}", v),
    }
    assert_eq!(scene.children(root).count(), 1);
    assert_eq!(scene.parent(child), Some(root));

    match scene.detach(root, root, Keep::NONE) {
        Err(Error::SelfParent(_)) => {}
        v => panic!("unexpected {:?}", v),
    }

    // Handles that were never created, or have been removed already, are
    // rejected.
    match scene.attach(root, Entity::nil(), Keep::NONE) {
        Err(Error::NodeNotFound(_)) => {}
        v => panic!("unexpected {:?}", v),
    }

    let gone = scene.create("gone");
    scene.remove(gone).unwrap();
    match scene.attach(root, gone, Keep::NONE) {
        Err(Error::NodeNotFound(_)) => {}
        v => panic!("unexpected {:?}", v),
    }
    match scene.detach(root, gone, Keep::NONE) {
        Err(Error::NodeNotFound(_)) => {}
        v => panic!("unexpected {:?}", v),
    }
    assert_eq!(scene.children(root).count(), 1);
}

#[test]
fn attach_keeps_world_pose() {
    let mut rng = rand::thread_rng();

    for _ in 0..SAMPLES {
        let mut scene = SceneGraph::new();
        let root = scene.create_with("root", random_transform(&mut rng));
        let c1 = scene.create("c1");
        let c2 = scene.create("c2");

        // Without keep flags the identity-posed child is dragged along and
        // ends up wherever the parent is.
        for _ in 0..2 {
            scene.attach(root, c1, Keep::NONE).unwrap();
            assert_relative_eq!(
                scene.position(c1).unwrap(),
                scene.point_to_world(root, [0.0, 0.0, 0.0]).unwrap(),
                epsilon = 1.0e-4
            );
            assert_same_rotation(scene.rotation(c1).unwrap(), scene.rotation(root).unwrap());
            assert_relative_eq!(
                scene.scale(c1).unwrap(),
                scene.scale(root).unwrap(),
                epsilon = 1.0e-4
            );
        }

        // With keep flags the world pose survives the reparenting.
        for _ in 0..2 {
            scene.attach(root, c2, Keep::ALL).unwrap();
            assert_relative_eq!(
                scene.position(c2).unwrap(),
                Vector3::new(0.0, 0.0, 0.0),
                epsilon = 1.0e-4
            );
            assert_same_rotation(scene.rotation(c2).unwrap(), Quaternion::one());
            assert_relative_eq!(
                scene.scale(c2).unwrap(),
                Vector3::new(1.0, 1.0, 1.0),
                epsilon = 1.0e-4
            );
        }
    }
}

#[test]
fn detach_keeps_world_pose() {
    let mut rng = rand::thread_rng();

    for _ in 0..SAMPLES {
        let mut scene = SceneGraph::new();
        let root = scene.create_with("root", random_transform(&mut rng));
        let c1 = scene.create("c1");
        let c2 = scene.create("c2");
        scene.attach(root, c1, Keep::NONE).unwrap();
        scene.attach(root, c2, Keep::NONE).unwrap();

        // Without keep flags the local pose is carried over untouched, so
        // the detached node snaps back to identity.
        scene.detach(root, c1, Keep::NONE).unwrap();
        assert_relative_eq!(
            scene.position(c1).unwrap(),
            Vector3::new(0.0, 0.0, 0.0),
            epsilon = 1.0e-4
        );
        assert_same_rotation(scene.rotation(c1).unwrap(), Quaternion::one());

        // With keep flags the world pose survives losing the parent.
        let position = scene.position(c2).unwrap();
        let rotation = scene.rotation(c2).unwrap();
        let scale = scene.scale(c2).unwrap();

        scene.detach(root, c2, Keep::ALL).unwrap();
        assert_relative_eq!(scene.position(c2).unwrap(), position, epsilon = 1.0e-3);
        assert_same_rotation(scene.rotation(c2).unwrap(), rotation);
        assert_relative_eq!(scene.scale(c2).unwrap(), scale, epsilon = 1.0e-3);
    }
}

#[test]
fn reparenting_is_idempotent_on_world_pose() {
    let mut rng = rand::thread_rng();

    for _ in 0..SAMPLES {
        let mut scene = SceneGraph::new();
        let root = scene.create_with("root", random_transform(&mut rng));
        let other = scene.create_with("other", random_transform(&mut rng));
        let child = scene.create_with("child", random_transform(&mut rng));

        scene.attach(root, child, Keep::NONE).unwrap();

        let position = scene.position(child).unwrap();
        let rotation = scene.rotation(child).unwrap();
        let scale = scene.scale(child).unwrap();

        scene.detach(root, child, Keep::ALL).unwrap();
        assert_relative_eq!(scene.position(child).unwrap(), position, epsilon = 1.0e-3);
        assert_same_rotation(scene.rotation(child).unwrap(), rotation);
        assert_relative_eq!(scene.scale(child).unwrap(), scale, epsilon = 1.0e-3);

        scene.attach(other, child, Keep::ALL).unwrap();
        assert_relative_eq!(scene.position(child).unwrap(), position, epsilon = 1.0e-3);
        assert_same_rotation(scene.rotation(child).unwrap(), rotation);
        assert_relative_eq!(scene.scale(child).unwrap(), scale, epsilon = 1.0e-3);
    }
}

#[test]
fn remove() {
    let mut scene = SceneGraph::new();
    let root = scene.create("root");
    let c1 = scene.create("c1");
    let c2 = scene.create("c2");
    let c3 = scene.create("c3");

    scene.attach(root, c1, Keep::NONE).unwrap();
    scene.attach(c1, c2, Keep::NONE).unwrap();
    scene.attach(root, c3, Keep::NONE).unwrap();
    assert_eq!(scene.len(), 4);

    // The subtree goes away in tree order; the rest of the graph survives
    // the storage compaction.
    let removes = scene.remove(c1).unwrap();
    assert_eq!(removes, [c1, c2]);
    assert_eq!(scene.len(), 2);
    assert!(!scene.contains(c1));
    assert!(!scene.contains(c2));
    assert_eq!(scene.children(root).count(), 1);
    assert_eq!(scene.parent(c3), Some(root));
    assert_eq!(scene.name(c3), Some("c3"));

    assert_eq!(scene.remove(c1), None);
}
