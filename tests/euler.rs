#[macro_use]
extern crate approx;
extern crate cgmath;
extern crate rand;
extern crate scene_graph;

use cgmath::prelude::*;
use cgmath::{Quaternion, Rad, Vector3};
use rand::Rng;
use scene_graph::euler;
use scene_graph::euler::RotationOrder;

const SAMPLES: usize = 64;

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

fn random_rotation<T: Rng>(rng: &mut T) -> Quaternion<f32> {
    Quaternion::from_axis_angle(random_direction(rng), Rad(rng.gen_range(-3.0f32, 3.0)))
}

// The decomposition is ambiguous, so reconstructed angles are compared by
// the rotation they produce, not componentwise.
fn assert_same_rotation(lhs: Quaternion<f32>, rhs: Quaternion<f32>) {
    let v = lhs * rhs.invert();
    let angle = 2.0 * v.s.min(1.0).max(-1.0).acos();
    assert!(
        angle < 0.01 || angle > 2.0 * ::std::f32::consts::PI - 0.01,
        "rotations differ by {} radians ({:?} vs {:?})",
        angle,
        lhs,
        rhs
    );
}

#[test]
fn roundtrip_quat() {
    let mut rng = rand::thread_rng();

    for &order in &RotationOrder::ALL {
        for &extrinsic in &[true, false] {
            for _ in 0..SAMPLES {
                let q = random_rotation(&mut rng);
                let e = euler::from_quat(q, order, extrinsic);
                assert_same_rotation(q, euler::to_quat(e, order, extrinsic));
            }
        }
    }
}

#[test]
fn roundtrip_mat() {
    let mut rng = rand::thread_rng();

    for &order in &RotationOrder::ALL {
        for &extrinsic in &[true, false] {
            for _ in 0..SAMPLES {
                let q = random_rotation(&mut rng);
                let m = cgmath::Matrix3::from(q);
                let e = euler::from_mat3(m, order, extrinsic);
                assert_relative_eq!(euler::to_mat3(e, order, extrinsic), m, epsilon = 1.0e-4);
            }
        }
    }
}

#[test]
fn gimbal_lock() {
    // With the middle angle at +-90 degrees the first and third angle are
    // coupled; the extraction picks one of the valid solutions, and the
    // composed rotation has to survive the roundtrip regardless.
    let half_pi = ::std::f32::consts::FRAC_PI_2;

    for &order in &RotationOrder::ALL {
        for &middle in &[half_pi, -half_pi] {
            let radians = Vector3::new(0.3, middle, -0.8);
            let q = euler::to_quat(radians, order, false);
            let e = euler::from_quat(q, order, false);
            assert_same_rotation(q, euler::to_quat(e, order, false));
        }
    }
}

#[test]
fn extrinsic_is_reversed_intrinsic() {
    let mut rng = rand::thread_rng();

    for &order in &RotationOrder::ALL {
        for _ in 0..SAMPLES {
            let radians = Vector3::new(
                rng.gen_range(-3.0f32, 3.0),
                rng.gen_range(-3.0f32, 3.0),
                rng.gen_range(-3.0f32, 3.0),
            );

            let lhs = euler::to_quat(radians, order, true);
            let rhs = euler::to_quat(radians, order.reversed(), false);
            assert_relative_eq!(lhs, rhs, epsilon = 1.0e-6);
        }
    }
}

#[test]
fn quadrants() {
    let half_pi = ::std::f32::consts::FRAC_PI_2;
    let forward = Vector3::new(0.0, 0.0, -1.0);

    let q = euler::to_quat(Vector3::new(half_pi, 0.0, 0.0), RotationOrder::ZXY, true);
    assert_relative_eq!(q * forward, Vector3::new(0.0, 1.0, 0.0), epsilon = 1.0e-3);

    let q = euler::to_quat(Vector3::new(-half_pi, 0.0, 0.0), RotationOrder::ZXY, true);
    assert_relative_eq!(q * forward, Vector3::new(0.0, -1.0, 0.0), epsilon = 1.0e-3);

    let q = euler::to_quat(Vector3::new(0.0, half_pi, 0.0), RotationOrder::ZXY, true);
    assert_relative_eq!(q * forward, Vector3::new(-1.0, 0.0, 0.0), epsilon = 1.0e-3);

    let q = euler::to_quat(Vector3::new(0.0, -half_pi, 0.0), RotationOrder::ZXY, true);
    assert_relative_eq!(q * forward, Vector3::new(1.0, 0.0, 0.0), epsilon = 1.0e-3);

    // Rolling about the z-axis leaves the forward axis in place.
    let q = euler::to_quat(Vector3::new(0.0, 0.0, half_pi), RotationOrder::ZXY, true);
    assert_relative_eq!(q * forward, forward, epsilon = 1.0e-3);

    let q = euler::to_quat(Vector3::new(0.0, 0.0, -half_pi), RotationOrder::ZXY, true);
    assert_relative_eq!(q * forward, forward, epsilon = 1.0e-3);
}

#[test]
fn invalid_order() {
    for v in &["", "XY", "XYZW", "XXY", "ABC"] {
        let err = v.parse::<RotationOrder>().unwrap_err();
        let display = format!("{}", err);
        assert!(display.contains("XYZ") && display.contains("ZYX"));
    }
}
