use cgmath::Vector3;
use std::ops::Range;

/// Every tunable constant of the demo in one place.
///
/// `Default` gives the values the demo ships with. Tests build modified
/// copies (zero gravity, fewer objects) instead of touching globals.
#[derive(Debug, Clone)]
pub struct DemoConfig {
    // scene
    pub object_count: usize,
    pub scale_range: Range<f32>,
    pub spawn_half_extent: f32, // x and z are drawn from [-half, half)
    pub spawn_height: Range<f32>,
    pub max_rotation_rate: f32, // radians per frame, per axis
    pub ground_size: f32,
    pub grid_size: f32,
    pub grid_divisions: u32,
    pub grid_center_color: [f32; 3],
    pub grid_color: [f32; 3],

    // physics
    pub gravity: Vector3<f32>,
    pub fixed_step: f32,
    pub max_substeps: u32,

    // camera
    pub move_speed: f32, // units per second
    pub mouse_sensitivity: f32, // radians per pixel
    pub camera_position: Vector3<f32>,
    pub fovy: f32, // degrees
    pub znear: f32,
    pub zfar: f32,

    // lighting
    pub light_position: Vector3<f32>,
    pub light_intensity: f32,
    pub ambient_color: [f32; 3],
    pub ground_color: [f32; 3],
    pub fog_color: [f32; 3],
    pub fog_near: f32,
    pub fog_far: f32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            object_count: 50,
            scale_range: 0.5..2.0,
            spawn_half_extent: 25.0,
            spawn_height: 5.0..15.0,
            max_rotation_rate: 0.02,
            ground_size: 200.0,
            grid_size: 200.0,
            grid_divisions: 50,
            grid_center_color: hex_to_rgb(0x444444),
            grid_color: hex_to_rgb(0x888888),

            gravity: Vector3::new(0.0, -9.82, 0.0),
            fixed_step: 1.0 / 60.0,
            max_substeps: 10,

            move_speed: 10.0,
            mouse_sensitivity: 0.002,
            camera_position: Vector3::new(0.0, 5.0, 20.0),
            fovy: 75.0,
            znear: 0.1,
            zfar: 200.0,

            light_position: Vector3::new(10.0, 20.0, 10.0),
            light_intensity: 1.0,
            ambient_color: hex_to_rgb(0x404040),
            ground_color: hex_to_rgb(0x111111),
            fog_color: [0.0, 0.0, 0.0],
            fog_near: 30.0,
            fog_far: 100.0,
        }
    }
}

/// Splits a `0xRRGGBB` color into normalized sRGB channels.
pub fn hex_to_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}
