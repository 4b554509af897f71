use instant::Instant;
use rand::Rng;

use crate::config::DemoConfig;
use rapier3d::prelude::RigidBodyHandle;

use crate::physics::{PhysicsBody, PhysicsWorld};
use crate::scene::{self, TrackedObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

/// Measures wall time between frames.
pub struct FrameClock {
    last: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { last: None }
    }

    /// Seconds since the previous call; zero on the first call.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = match self.last {
            Some(last) => now.duration_since(last).as_secs_f32(),
            None => 0.0,
        };
        self.last = Some(now);
        delta
    }
}

/// The physics world and the meshes it drives.
pub struct Simulation {
    physics: PhysicsWorld,
    objects: Vec<TrackedObject>,
    ground: RigidBodyHandle,
    state: LoopState,
}

impl Simulation {
    /// Build the world: ground plus `config.object_count` random shapes.
    pub fn new<R: Rng + ?Sized>(config: &DemoConfig, rng: &mut R) -> anyhow::Result<Self> {
        let mut physics = PhysicsWorld::new(config.gravity, config.fixed_step, config.max_substeps);
        let objects = scene::populate(config, &mut physics, rng)?;
        let ground = scene::add_ground(&mut physics);
        let approximated = objects.iter().filter(|object| object.shape.is_approximate()).count();
        log::info!("Scene populated with {} objects ({} bodies)", objects.len(), physics.body_count());
        log::debug!("{} objects collide as a bounding box", approximated);
        Ok(Self::from_parts(physics, objects, ground))
    }

    pub fn from_parts(physics: PhysicsWorld, objects: Vec<TrackedObject>, ground: RigidBodyHandle) -> Self {
        Self {
            physics,
            objects,
            ground,
            state: LoopState::Idle,
        }
    }

    /// Step physics with `delta` seconds of frame time, then copy each body's
    /// position onto its mesh and spin the mesh by its cosmetic rate.
    pub fn advance(&mut self, delta: f32) {
        if self.state == LoopState::Idle {
            log::info!("Simulation running");
            self.state = LoopState::Running;
        }

        self.physics.step(delta);

        for object in &mut self.objects {
            let body = self
                .physics
                .get_body(object.body)
                .unwrap_or_else(|| panic!("tracked {:?} lost its rigid body {:?}", object.shape, object.body));
            object.position = body.position;
            object.rotation += object.rotation_rate;
        }
    }

    pub fn objects(&self) -> &[TrackedObject] {
        &self.objects
    }

    pub fn physics(&self) -> &PhysicsWorld {
        &self.physics
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Pose of the ground plane body.
    pub fn ground(&self) -> Option<&PhysicsBody> {
        self.physics.get_body(self.ground)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Rotation, Vector3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rapier3d::prelude::ColliderBuilder;

    fn simulation(config: &DemoConfig, seed: u64) -> Simulation {
        let mut rng = StdRng::seed_from_u64(seed);
        Simulation::new(config, &mut rng).unwrap()
    }

    #[test]
    fn starts_idle_and_runs_after_first_frame() {
        let mut sim = simulation(&DemoConfig::default(), 1);
        assert_eq!(sim.state(), LoopState::Idle);
        sim.advance(0.0);
        assert_eq!(sim.state(), LoopState::Running);
        sim.advance(1.0 / 60.0);
        assert_eq!(sim.state(), LoopState::Running);
    }

    #[test]
    fn mesh_positions_equal_body_positions_after_every_step() {
        let mut sim = simulation(&DemoConfig::default(), 2);
        for _ in 0..30 {
            sim.advance(1.0 / 60.0);
            for object in sim.objects() {
                let body = sim.physics().get_body(object.body).unwrap();
                assert_eq!(object.position, body.position);
            }
        }
    }

    #[test]
    fn falling_shapes_move_down() {
        let config = DemoConfig::default();
        let mut sim = simulation(&config, 3);
        let mean_height = |sim: &Simulation| {
            sim.objects().iter().map(|o| o.position.y).sum::<f32>() / sim.objects().len() as f32
        };
        let start = mean_height(&sim);
        for _ in 0..30 {
            sim.advance(1.0 / 60.0);
        }
        assert!(mean_height(&sim) < start);
    }

    #[test]
    fn cosmetic_rotation_accumulates_per_frame() {
        let mut sim = simulation(&DemoConfig::default(), 4);
        let initial: Vec<Vector3<f32>> = sim.objects().iter().map(|o| o.rotation).collect();
        let mut previous = initial.clone();

        let frames = 20;
        for _ in 0..frames {
            sim.advance(1.0 / 60.0);
            for (object, prev) in sim.objects().iter().zip(&previous) {
                if object.rotation_rate.x > 0.0 {
                    assert!(object.rotation.x > prev.x);
                }
                if object.rotation_rate.y > 0.0 {
                    assert!(object.rotation.y > prev.y);
                }
                if object.rotation_rate.z > 0.0 {
                    assert!(object.rotation.z > prev.z);
                }
            }
            previous = sim.objects().iter().map(|o| o.rotation).collect();
        }

        for (object, start) in sim.objects().iter().zip(initial) {
            let expected = start + object.rotation_rate * frames as f32;
            assert!((object.rotation.x - expected.x).abs() < 1e-5);
            assert!((object.rotation.y - expected.y).abs() < 1e-5);
            assert!((object.rotation.z - expected.z).abs() < 1e-5);
        }
    }

    #[test]
    fn frozen_world_keeps_positions_bit_identical() {
        let config = DemoConfig {
            gravity: Vector3::new(0.0, 0.0, 0.0),
            ..DemoConfig::default()
        };
        let mut sim = simulation(&config, 5);
        let positions: Vec<Vector3<f32>> = sim.objects().iter().map(|o| o.position).collect();
        let rotations: Vec<Vector3<f32>> = sim.objects().iter().map(|o| o.rotation).collect();

        for _ in 0..10 {
            sim.advance(0.0);
        }

        assert_eq!(sim.objects().len(), 50);
        for ((object, position), rotation) in sim.objects().iter().zip(positions).zip(rotations) {
            assert_eq!(object.position.x.to_bits(), position.x.to_bits());
            assert_eq!(object.position.y.to_bits(), position.y.to_bits());
            assert_eq!(object.position.z.to_bits(), position.z.to_bits());
            assert_ne!(object.rotation, rotation);
        }
    }

    #[test]
    fn body_count_is_fixed_after_setup() {
        let mut sim = simulation(&DemoConfig::default(), 6);
        assert_eq!(sim.physics().body_count(), 51);
        for _ in 0..10 {
            sim.advance(1.0 / 30.0);
        }
        assert_eq!(sim.physics().body_count(), 51);
    }

    #[test]
    #[should_panic(expected = "lost its rigid body")]
    fn missing_body_is_an_invariant_violation() {
        let config = DemoConfig::default();
        let mut other = PhysicsWorld::new(config.gravity, config.fixed_step, config.max_substeps);
        other.add_dynamic(Vector3::new(0.0, 1.0, 0.0), ColliderBuilder::ball(0.5).build());
        let stray = other.add_dynamic(Vector3::new(0.0, 2.0, 0.0), ColliderBuilder::ball(0.5).build());

        let object = TrackedObject {
            shape: scene::ShapeKind::Sphere,
            scale: 1.0,
            color: [1.0, 1.0, 1.0],
            position: Vector3::new(0.0, 2.0, 0.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            rotation_rate: Vector3::new(0.0, 0.0, 0.0),
            body: stray,
        };
        let empty = PhysicsWorld::new(config.gravity, config.fixed_step, config.max_substeps);
        let mut sim = Simulation::from_parts(empty, vec![object], RigidBodyHandle::invalid());
        sim.advance(0.0);
    }

    #[test]
    fn ground_body_stays_put_facing_up() {
        let mut sim = simulation(&DemoConfig::default(), 7);
        sim.advance(0.5);
        let ground = sim.ground().unwrap();
        assert!(!ground.is_dynamic);
        assert_eq!(ground.position, Vector3::new(0.0, 0.0, 0.0));
        let normal = ground.rotation.rotate_vector(Vector3::unit_z());
        assert!((normal - Vector3::unit_y()).magnitude() < 1e-6);
    }

    #[test]
    fn first_clock_tick_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(), 0.0);
        assert!(clock.tick() >= 0.0);
    }
}
