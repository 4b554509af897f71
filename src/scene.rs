//! One-time world construction: random shapes, their colliders and the ground.
//!
//! Shape-to-collider mapping (`s` is the object's scale):
//!
//! | shape    | visual mesh                       | collider                          | fidelity      |
//! |----------|-----------------------------------|-----------------------------------|---------------|
//! | Box      | 1 × 1 × 1 box                     | cuboid, half extents `s/2`        | exact         |
//! | Sphere   | radius 0.7 sphere                 | ball, radius `0.7 s`              | exact         |
//! | Cone     | radius 0.5, height 1 cone         | cone, half height and radius `s/2`| exact         |
//! | Cylinder | radius 0.5, height 1 cylinder     | cylinder, half height and radius `s/2` | exact    |
//! | Torus    | ring radius 0.5, tube 0.2 (xy)    | cuboid `0.7 s, 0.7 s, 0.2 s`      | approximation |
//!
//! Rapier has no torus primitive, so the ring collides as the box that bounds it.

use anyhow::{bail, Context};
use cgmath::Vector3;
use rand::Rng;
use rapier3d::prelude::{Collider, ColliderBuilder, RigidBodyHandle};
use std::f32::consts::FRAC_PI_2;

use crate::config::DemoConfig;
use crate::physics::PhysicsWorld;

/// Rotation (axis-angle) of the ground body: it turns the +z facing
/// half-space, and the xy ground mesh drawn at the body's pose, to face +y.
pub const GROUND_ROTATION: Vector3<f32> = Vector3::new(-FRAC_PI_2, 0.0, 0.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Box,
    Sphere,
    Cone,
    Cylinder,
    Torus,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 5] = [
        ShapeKind::Box,
        ShapeKind::Sphere,
        ShapeKind::Cone,
        ShapeKind::Cylinder,
        ShapeKind::Torus,
    ];

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }

    /// Collider for a visual mesh of this shape scaled by `scale`.
    pub fn collider(self, scale: f32) -> Collider {
        let half = scale / 2.0;
        let builder = match self {
            ShapeKind::Box => ColliderBuilder::cuboid(half, half, half),
            ShapeKind::Sphere => ColliderBuilder::ball(0.7 * scale),
            ShapeKind::Cone => ColliderBuilder::cone(half, half),
            ShapeKind::Cylinder => ColliderBuilder::cylinder(half, half),
            ShapeKind::Torus => ColliderBuilder::cuboid(0.7 * scale, 0.7 * scale, 0.2 * scale),
        };
        builder.mass(1.0).build()
    }

    /// True when the collider only approximates the visual shape.
    pub fn is_approximate(self) -> bool {
        matches!(self, ShapeKind::Torus)
    }
}

/// Parameters drawn for one object before anything is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSpec {
    pub shape: ShapeKind,
    pub scale: f32,
    pub color: [f32; 3],
    pub position: Vector3<f32>,
    pub rotation_rate: Vector3<f32>,
}

impl ObjectSpec {
    pub fn random<R: Rng + ?Sized>(config: &DemoConfig, rng: &mut R) -> Self {
        let shape = ShapeKind::random(rng);
        let scale = rng.gen_range(config.scale_range.clone());
        let color = [rng.r#gen::<f32>(), rng.r#gen::<f32>(), rng.r#gen::<f32>()];

        let half = config.spawn_half_extent;
        let position = Vector3::new(
            rng.gen_range(-half..half),
            rng.gen_range(config.spawn_height.clone()),
            rng.gen_range(-half..half),
        );

        let max_rate = config.max_rotation_rate;
        let rotation_rate = Vector3::new(
            rng.r#gen::<f32>() * max_rate,
            rng.r#gen::<f32>() * max_rate,
            rng.r#gen::<f32>() * max_rate,
        );

        Self { shape, scale, color, position, rotation_rate }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            bail!("{:?} has invalid scale {}", self.shape, self.scale);
        }
        let p = self.position;
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            bail!("{:?} has non-finite position {:?}", self.shape, p);
        }
        Ok(())
    }
}

/// A render mesh paired with the rigid body that drives its position.
#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub shape: ShapeKind,
    pub scale: f32,
    pub color: [f32; 3],
    pub position: Vector3<f32>,
    pub rotation: Vector3<f32>, // euler xyz, radians, cosmetic only
    pub rotation_rate: Vector3<f32>,
    pub body: RigidBodyHandle,
}

/// Draw `config.object_count` specs from `rng`, reject the batch if any is
/// invalid, then create every body. The physics world is untouched on error.
pub fn populate<R: Rng + ?Sized>(
    config: &DemoConfig,
    physics: &mut PhysicsWorld,
    rng: &mut R,
) -> anyhow::Result<Vec<TrackedObject>> {
    let specs: Vec<ObjectSpec> = (0..config.object_count)
        .map(|_| ObjectSpec::random(config, rng))
        .collect();
    build_objects(physics, &specs)
}

pub fn build_objects(physics: &mut PhysicsWorld, specs: &[ObjectSpec]) -> anyhow::Result<Vec<TrackedObject>> {
    for (index, spec) in specs.iter().enumerate() {
        spec.validate().with_context(|| format!("object {} cannot be built", index))?;
    }

    let objects = specs
        .iter()
        .map(|spec| TrackedObject {
            shape: spec.shape,
            scale: spec.scale,
            color: spec.color,
            position: spec.position,
            rotation: Vector3::new(0.0, 0.0, 0.0),
            rotation_rate: spec.rotation_rate,
            body: physics.add_dynamic(spec.position, spec.shape.collider(spec.scale)),
        })
        .collect();
    Ok(objects)
}

/// The static ground plane through the origin, facing +y.
pub fn add_ground(physics: &mut PhysicsWorld) -> RigidBodyHandle {
    physics.add_plane(GROUND_ROTATION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Matrix3, Rad, Rotation};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn physics(config: &DemoConfig) -> PhysicsWorld {
        PhysicsWorld::new(config.gravity, config.fixed_step, config.max_substeps)
    }

    #[test]
    fn populates_fifty_objects_inside_the_spawn_volume() {
        let config = DemoConfig::default();
        let mut physics = physics(&config);
        let mut rng = StdRng::seed_from_u64(7);

        let objects = populate(&config, &mut physics, &mut rng).unwrap();
        add_ground(&mut physics);

        assert_eq!(objects.len(), 50);
        assert_eq!(physics.body_count(), 51);
        for object in &objects {
            assert!(config.scale_range.contains(&object.scale));
            assert!(object.position.x >= -25.0 && object.position.x < 25.0);
            assert!(object.position.z >= -25.0 && object.position.z < 25.0);
            assert!(config.spawn_height.contains(&object.position.y));
            assert!(object.color.iter().all(|c| (0.0..1.0).contains(c)));
            for rate in [object.rotation_rate.x, object.rotation_rate.y, object.rotation_rate.z] {
                assert!(rate >= 0.0 && rate <= 0.02);
            }
            let body = physics.get_body(object.body).unwrap();
            assert!(body.is_dynamic);
            assert_eq!(body.position, object.position);
        }
    }

    #[test]
    fn collider_sizes_are_positive_and_bounded_by_scale() {
        let config = DemoConfig::default();
        let mut physics = physics(&config);
        let mut rng = StdRng::seed_from_u64(42);
        let objects = populate(&config, &mut physics, &mut rng).unwrap();

        for object in &objects {
            let half = physics.collider_half_extents(object.body).unwrap();
            for extent in [half.x, half.y, half.z] {
                assert!(extent > 0.0, "{:?} has a flat collider", object.shape);
                // the widest collider (sphere) reaches 0.7 x scale from the center
                assert!(extent <= 0.7 * object.scale + 1e-4);
                assert!(extent <= 0.7 * 2.0);
            }
        }
    }

    #[test]
    fn same_seed_builds_the_same_scene() {
        let config = DemoConfig::default();
        let draw = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..10).map(|_| ObjectSpec::random(&config, &mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(draw(3), draw(3));
        assert_ne!(draw(3), draw(4));
    }

    #[test]
    fn every_shape_in_the_palette_gets_picked() {
        let mut rng = StdRng::seed_from_u64(11);
        let picked: std::collections::HashSet<_> = (0..200).map(|_| ShapeKind::random(&mut rng)).collect();
        assert_eq!(picked.len(), ShapeKind::ALL.len());
    }

    #[test]
    fn collider_table_matches_visual_sizes() {
        let scale = 2.0;
        let mut physics = PhysicsWorld::new(Vector3::new(0.0, 0.0, 0.0), 1.0 / 60.0, 10);
        let expected = [
            (ShapeKind::Box, Vector3::new(1.0, 1.0, 1.0)),
            (ShapeKind::Sphere, Vector3::new(1.4, 1.4, 1.4)),
            (ShapeKind::Cone, Vector3::new(1.0, 1.0, 1.0)),
            (ShapeKind::Cylinder, Vector3::new(1.0, 1.0, 1.0)),
            (ShapeKind::Torus, Vector3::new(1.4, 1.4, 0.4)),
        ];
        for (shape, half) in expected {
            let body = physics.add_dynamic(Vector3::new(0.0, 5.0, 0.0), shape.collider(scale));
            let actual = physics.collider_half_extents(body).unwrap();
            assert!((actual - half).magnitude() < 1e-4, "{:?}: {:?}", shape, actual);
        }
        assert!(ShapeKind::Torus.is_approximate());
        assert!(!ShapeKind::Cone.is_approximate());
    }

    #[test]
    fn invalid_spec_aborts_without_touching_the_world() {
        let config = DemoConfig::default();
        let mut physics = physics(&config);
        let mut rng = StdRng::seed_from_u64(5);
        let mut specs: Vec<_> = (0..5).map(|_| ObjectSpec::random(&config, &mut rng)).collect();
        specs[3].scale = 0.0;

        let result = build_objects(&mut physics, &specs);
        assert!(result.is_err());
        assert_eq!(physics.body_count(), 0);

        specs[3].scale = f32::NAN;
        assert!(build_objects(&mut physics, &specs).is_err());
        assert_eq!(physics.body_count(), 0);
    }

    #[test]
    fn ground_collider_and_mesh_share_orientation() {
        let mut physics = PhysicsWorld::new(Vector3::new(0.0, -9.82, 0.0), 1.0 / 60.0, 10);
        let ground = add_ground(&mut physics);

        // an xy plane turned by the same euler x angle
        let mesh_normal = Matrix3::from_angle_x(Rad(GROUND_ROTATION.x)) * Vector3::unit_z();
        let body = physics.get_body(ground).unwrap();
        let body_normal = body.rotation.rotate_vector(Vector3::unit_z());

        assert!((mesh_normal - Vector3::unit_y()).magnitude() < 1e-6);
        assert!((body_normal - mesh_normal).magnitude() < 1e-6);
    }
}
