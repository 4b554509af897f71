use cgmath::{self, InnerSpace, Point3, Vector3, Zero};
use std::f32::consts::FRAC_PI_2;

use crate::config::DemoConfig;
use crate::input::{InputState, MovementKeys};

// Keeps the view direction from becoming parallel to the up vector.
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.001;

pub struct Camera {
    pub position: Point3<f32>,
    pub yaw: f32,   // radians, 0 looks down -z, positive turns left
    pub pitch: f32, // radians, positive looks up
    aspect: f32, //aspect ratio of the screen width/height
    fovy: f32,
    znear: f32,
    zfar: f32,
}

//webgpu space ranges from 0 to 1 whereas opengl is -1 to 1
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::from_cols(
    cgmath::Vector4::new(1.0, 0.0, 0.0, 0.0),
    cgmath::Vector4::new(0.0, 1.0, 0.0, 0.0),
    cgmath::Vector4::new(0.0, 0.0, 0.5, 0.0),
    cgmath::Vector4::new(0.0, 0.0, 0.5, 1.0),
);

impl Camera {
    pub fn new(config: &DemoConfig) -> Self {
        let p = config.camera_position;
        Self {
            position: Point3::new(p.x, p.y, p.z),
            yaw: 0.0,
            pitch: 0.0,
            aspect: 1.0, //default to 1 -> a NaN aspect would break the projection matrix
            fovy: config.fovy,
            znear: config.znear,
            zfar: config.zfar,
        }
    }

    /// Unit view direction.
    pub fn forward(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vector3::new(-sin_yaw * cos_pitch, sin_pitch, -cos_yaw * cos_pitch)
    }

    /// Unit local +x axis. There is no roll, so it always stays horizontal.
    pub fn right(&self) -> Vector3<f32> {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        Vector3::new(cos_yaw, 0.0, -sin_yaw)
    }

    /// Moves the camera along its own axes: `x` along local right, `z` along
    /// local +z, which points behind the view direction.
    pub fn translate_local(&mut self, local: Vector3<f32>) {
        self.position += self.right() * local.x - self.forward() * local.z;
    }

    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw += yaw_delta;
        self.pitch = (self.pitch + pitch_delta).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn update_aspect(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect = width as f32 / height as f32;
            log::debug!("Aspect ratio updated: {} / {} = {}", width, height, self.aspect);
        } else {
            log::warn!("Height is 0, keeping current aspect ratio");
        }
    }

    pub fn build_view_projection_matrix(&self) -> cgmath::Matrix4<f32> {
        //right handed view matrix looking from the eye along the forward vector
        let view = cgmath::Matrix4::look_to_rh(self.position, self.forward(), Vector3::unit_y());
        let proj = cgmath::perspective(cgmath::Deg(self.fovy), self.aspect, self.znear, self.zfar);
        OPENGL_TO_WGPU_MATRIX * proj * view
    }
}

// We need this for Rust to store our data correctly for the shaders
#[repr(C)]
// This is so we can store this in a buffer
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    // We can't use cgmath with bytemuck directly, so we'll have
    // to convert the Matrix4 into a 4x4 f32 array
    view_proj: [[f32; 4]; 4],
    eye: [f32; 4], // w unused, keeps 16 byte alignment
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_proj: cgmath::Matrix4::identity().into(),
            eye: [0.0; 4],
        }
    }

    pub fn update_view_proj(&mut self, camera: &Camera) {
        self.view_proj = camera.build_view_projection_matrix().into();
        self.eye = [camera.position.x, camera.position.y, camera.position.z, 1.0];
    }
}

/// Pointer-lock style look control.
///
/// While locked, mouse deltas are collected and turned into yaw/pitch once
/// per frame by [`LookControls::update`]. While unlocked they are dropped.
pub struct LookControls {
    locked: bool,
    sensitivity: f32,
    pending: (f32, f32),
}

impl LookControls {
    pub fn new(sensitivity: f32) -> Self {
        Self {
            locked: false,
            sensitivity,
            pending: (0.0, 0.0),
        }
    }

    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn unlock(&mut self) {
        self.locked = false;
        self.pending = (0.0, 0.0);
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn on_mouse_move(&mut self, dx: f32, dy: f32) {
        if self.locked {
            self.pending.0 += dx;
            self.pending.1 += dy;
        }
    }

    /// Applies the deltas gathered since the last frame.
    pub fn update(&mut self, camera: &mut Camera) {
        let (dx, dy) = std::mem::take(&mut self.pending);
        if dx != 0.0 || dy != 0.0 {
            camera.rotate(-dx * self.sensitivity, -dy * self.sensitivity);
        }
    }
}

pub struct CameraController {
    speed: f32,
    keys: MovementKeys,
}

impl CameraController {
    pub fn new(speed: f32) -> Self {
        Self {
            speed,
            keys: MovementKeys::default(),
        }
    }

    /// Camera-local movement direction for the held keys: unit length, or
    /// exactly zero when nothing (or only opposing keys) is held.
    pub fn movement_direction(&self, input: &InputState) -> Vector3<f32> {
        let axis = |negative: bool, positive: bool| positive as i32 as f32 - negative as i32 as f32;
        let direction = Vector3::new(
            axis(self.keys.left(input), self.keys.right(input)),
            0.0,
            axis(self.keys.forward(input), self.keys.backward(input)),
        );

        if direction.is_zero() {
            direction
        } else {
            direction.normalize()
        }
    }

    pub fn local_displacement(&self, input: &InputState, delta: f32) -> Vector3<f32> {
        self.movement_direction(input) * (self.speed * delta)
    }

    pub fn update_camera(&self, camera: &mut Camera, look: &LookControls, input: &InputState, delta: f32) {
        if !look.is_locked() {
            return;
        }
        let displacement = self.local_displacement(input, delta);
        if !displacement.is_zero() {
            camera.translate_local(displacement);
        }
    }
}

/// How a successful cursor grab takes effect. Desktop grabs apply at once;
/// the browser's pointer lock is asynchronous and may still be refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureGrant {
    Immediate,
    Deferred,
}

/// Everything that moves the camera: held keys, look capture and the
/// controller that turns them into motion.
pub struct CameraRig {
    pub camera: Camera,
    pub controller: CameraController,
    pub look: LookControls,
    pub input: InputState,
}

impl CameraRig {
    pub fn new(config: &DemoConfig) -> Self {
        Self {
            camera: Camera::new(config),
            controller: CameraController::new(config.move_speed),
            look: LookControls::new(config.mouse_sensitivity),
            input: InputState::new(),
        }
    }

    pub fn on_key(&mut self, code: &str, is_pressed: bool) {
        if is_pressed {
            self.input.key_down(code);
        } else {
            self.input.key_up(code);
        }
    }

    /// Record the host's answer to a capture request. Returns whether look
    /// capture is active now. A deferred grant stays unlocked until
    /// `sync_capture` sees the host report it.
    pub fn on_capture_result<E: std::fmt::Display>(&mut self, result: Result<CaptureGrant, E>) -> bool {
        match result {
            Ok(CaptureGrant::Immediate) => {
                self.look.lock();
                log::debug!("Pointer captured");
            }
            Ok(CaptureGrant::Deferred) => log::debug!("Pointer capture requested"),
            Err(e) => {
                self.look.unlock();
                log::debug!("Pointer capture refused: {}", e);
            }
        }
        self.look.is_locked()
    }

    /// Follow the host's view of the capture. Returns true when it changed.
    pub fn sync_capture(&mut self, host_locked: bool) -> bool {
        if host_locked == self.look.is_locked() {
            return false;
        }
        if host_locked {
            self.look.lock();
            log::debug!("Pointer captured");
        } else {
            self.look.unlock();
            log::debug!("Pointer released by host");
        }
        true
    }

    /// Drop held keys and the capture. Returns true if capture was active.
    pub fn on_focus_lost(&mut self) -> bool {
        self.input.release_all();
        let was_locked = self.look.is_locked();
        self.look.unlock();
        was_locked
    }

    /// Per-frame camera work: translate if captured, then apply look deltas.
    pub fn update(&mut self, delta: f32) {
        self.controller.update_camera(&mut self.camera, &self.look, &self.input, delta);
        self.look.update(&mut self.camera);
    }
}
