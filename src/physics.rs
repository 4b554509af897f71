use rapier3d::prelude::*;
use cgmath::{Quaternion, Vector3};
use std::collections::HashMap;

/// Physics body data that can be easily extracted for syncing and rendering
#[derive(Debug, Clone)]
pub struct PhysicsBody {
    pub position: Vector3<f32>,
    pub rotation: Quaternion<f32>,
    pub is_dynamic: bool,
}

/// Wrapper around Rapier3D physics world for easy integration
pub struct PhysicsWorld {
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    physics_pipeline: PhysicsPipeline,
    island_manager: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    gravity: Vector<f32>,
    integration_parameters: IntegrationParameters,
    // Time not yet consumed by fixed steps
    accumulator: f32,
    max_substeps: u32,
    // Mapping from Rapier handle to our physics body data
    body_data: HashMap<RigidBodyHandle, PhysicsBody>,
}

impl PhysicsWorld {
    /// Create a physics world that advances in `fixed_step` second increments
    pub fn new(gravity: Vector3<f32>, fixed_step: f32, max_substeps: u32) -> Self {
        let integration_parameters = IntegrationParameters {
            dt: fixed_step,
            ..IntegrationParameters::default()
        };

        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            gravity: vector![gravity.x, gravity.y, gravity.z],
            integration_parameters,
            accumulator: 0.0,
            max_substeps,
            body_data: HashMap::new(),
        }
    }

    pub fn fixed_step(&self) -> f32 {
        self.integration_parameters.dt
    }

    /// Add a fixed infinite plane. The collider's local normal is +z; the body
    /// is rotated by `rotation` (axis-angle, radians) to orient it in the world.
    pub fn add_plane(&mut self, rotation: Vector3<f32>) -> RigidBodyHandle {
        let rigid_body = RigidBodyBuilder::fixed()
            .rotation(vector![rotation.x, rotation.y, rotation.z])
            .build();
        let handle = self.rigid_body_set.insert(rigid_body);

        let collider = ColliderBuilder::halfspace(Vector::z_axis()).build();
        self.collider_set.insert_with_parent(collider, handle, &mut self.rigid_body_set);

        self.record_body(handle, false);
        handle
    }

    /// Add a dynamic body carrying `collider` at the specified position
    pub fn add_dynamic(&mut self, position: Vector3<f32>, collider: Collider) -> RigidBodyHandle {
        let rigid_body = RigidBodyBuilder::dynamic()
            .translation(vector![position.x, position.y, position.z])
            .build();
        let handle = self.rigid_body_set.insert(rigid_body);

        self.collider_set.insert_with_parent(collider, handle, &mut self.rigid_body_set);

        self.record_body(handle, true);
        handle
    }

    fn record_body(&mut self, handle: RigidBodyHandle, is_dynamic: bool) {
        if let Some(rigid_body) = self.rigid_body_set.get(handle) {
            self.body_data.insert(handle, snapshot(rigid_body, is_dynamic));
        }
    }

    /// Feed `delta` seconds of wall time into the world. Whole fixed steps are
    /// run out of the accumulated time, at most `max_substeps` per call; time
    /// beyond that is dropped so a long stall does not snowball.
    /// Returns how many steps ran.
    pub fn step(&mut self, delta: f32) -> u32 {
        let fixed_step = self.fixed_step();
        self.accumulator += delta.max(0.0);

        let mut steps = 0;
        while self.accumulator >= fixed_step && steps < self.max_substeps {
            self.step_once();
            self.accumulator -= fixed_step;
            steps += 1;
        }
        if steps == self.max_substeps {
            self.accumulator = self.accumulator.min(fixed_step);
        }

        if steps > 0 {
            self.update_body_data();
        }
        steps
    }

    fn step_once(&mut self) {
        // Create a physics hooks object
        let physics_hooks = ();
        let event_handler = ();

        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &physics_hooks,
            &event_handler,
        );
    }

    /// Update our cached physics body data from Rapier
    fn update_body_data(&mut self) {
        for (handle, rigid_body) in self.rigid_body_set.iter() {
            if let Some(body_data) = self.body_data.get_mut(&handle) {
                *body_data = snapshot(rigid_body, body_data.is_dynamic);
            }
        }
    }

    /// Get a specific physics body by handle
    pub fn get_body(&self, handle: RigidBodyHandle) -> Option<&PhysicsBody> {
        self.body_data.get(&handle)
    }

    pub fn body_count(&self) -> usize {
        self.rigid_body_set.len()
    }

    /// Half extents of the world-space bounding box around a body's colliders
    pub fn collider_half_extents(&self, handle: RigidBodyHandle) -> Option<Vector3<f32>> {
        let rigid_body = self.rigid_body_set.get(handle)?;
        let collider = self.collider_set.get(*rigid_body.colliders().first()?)?;
        let half = collider.compute_aabb().half_extents();
        Some(Vector3::new(half.x, half.y, half.z))
    }
}

fn snapshot(rigid_body: &RigidBody, is_dynamic: bool) -> PhysicsBody {
    let position = rigid_body.translation();
    let rotation = rigid_body.rotation();
    PhysicsBody {
        position: Vector3::new(position.x, position.y, position.z),
        rotation: Quaternion::new(rotation.w, rotation.i, rotation.j, rotation.k),
        is_dynamic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Rotation, Zero};
    use std::f32::consts::FRAC_PI_2;

    fn world(gravity: f32) -> PhysicsWorld {
        PhysicsWorld::new(Vector3::new(0.0, gravity, 0.0), 1.0 / 60.0, 10)
    }

    #[test]
    fn zero_delta_runs_no_steps() {
        let mut physics = world(-9.82);
        let handle = physics.add_dynamic(Vector3::new(0.0, 10.0, 0.0), ColliderBuilder::ball(0.5).build());

        assert_eq!(physics.step(0.0), 0);
        assert_eq!(physics.get_body(handle).unwrap().position, Vector3::new(0.0, 10.0, 0.0));
    }

    #[test]
    fn accumulates_partial_frames_into_fixed_steps() {
        let mut physics = world(-9.82);
        assert_eq!(physics.step(0.01), 0);
        assert_eq!(physics.step(0.01), 1);
        assert_eq!(physics.step(0.05), 3);
    }

    #[test]
    fn long_stalls_are_capped() {
        let mut physics = world(-9.82);
        assert_eq!(physics.step(5.0), 10);
        assert!(physics.step(0.0) <= 1);
    }

    #[test]
    fn gravity_pulls_bodies_down() {
        let mut physics = world(-9.82);
        let handle = physics.add_dynamic(Vector3::new(0.0, 10.0, 0.0), ColliderBuilder::ball(0.5).build());
        physics.step(0.5);
        assert!(physics.get_body(handle).unwrap().position.y < 10.0);
    }

    #[test]
    fn plane_rotated_about_x_is_the_ground() {
        let mut physics = world(-9.82);
        let ground = physics.add_plane(Vector3::new(-FRAC_PI_2, 0.0, 0.0));
        let body = physics.get_body(ground).unwrap();
        assert!(!body.is_dynamic);
        assert_eq!(body.position, Vector3::zero());

        let normal = body.rotation.rotate_vector(Vector3::unit_z());
        assert!((normal - Vector3::unit_y()).magnitude2() < 1e-10);
    }

    #[test]
    fn bodies_come_to_rest_on_the_ground() {
        let mut physics = world(-9.82);
        physics.add_plane(Vector3::new(-FRAC_PI_2, 0.0, 0.0));
        let handle = physics.add_dynamic(Vector3::new(0.0, 3.0, 0.0), ColliderBuilder::ball(0.5).build());

        for _ in 0..300 {
            physics.step(1.0 / 60.0);
        }
        let y = physics.get_body(handle).unwrap().position.y;
        assert!(y > 0.4 && y < 0.6, "ball rests at {}", y);
    }

    #[test]
    fn collider_extents_follow_the_shape() {
        let mut physics = world(0.0);
        let handle = physics.add_dynamic(Vector3::new(1.0, 2.0, 3.0), ColliderBuilder::cuboid(0.5, 1.0, 1.5).build());
        let half = physics.collider_half_extents(handle).unwrap();
        assert!((half - Vector3::new(0.5, 1.0, 1.5)).magnitude() < 1e-5);
        assert_eq!(physics.body_count(), 1);
    }
}
