use std::f32::consts::TAU;

/// Lit mesh vertex used by every shape and the ground.
#[repr(C)] //layout the struct in memory how a C compiler would
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress, //how many bytes the shader skips to reach the next vertex
            step_mode: wgpu::VertexStepMode::Vertex, //each element is per-vertex data, not per-instance
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3, //vec3<f32> in the shader
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Unlit colored vertex for the grid helper lines.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl LineVertex {
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Indexed triangle list. All generated meshes stay well under u16 indices.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u16>,
}

impl MeshData {
    fn push(&mut self, position: [f32; 3], normal: [f32; 3]) -> u16 {
        self.vertices.push(MeshVertex { position, normal });
        (self.vertices.len() - 1) as u16
    }

    fn quad(&mut self, a: u16, b: u16, c: u16, d: u16) {
        self.indices.extend_from_slice(&[a, b, d, b, c, d]);
    }

    fn base(&self) -> u16 {
        self.vertices.len() as u16
    }
}

fn normalized(v: [f32; 3]) -> [f32; 3] {
    let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if len == 0.0 {
        v
    } else {
        [v[0] / len, v[1] / len, v[2] / len]
    }
}

/// Axis aligned box centered on the origin.
pub fn cuboid(width: f32, height: f32, depth: f32) -> MeshData {
    let (hx, hy, hz) = (width / 2.0, height / 2.0, depth / 2.0);
    let mut mesh = MeshData::default();

    // normal, then the four corners counter clockwise seen from outside
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([1.0, 0.0, 0.0], [[hx, -hy, hz], [hx, -hy, -hz], [hx, hy, -hz], [hx, hy, hz]]),
        ([-1.0, 0.0, 0.0], [[-hx, -hy, -hz], [-hx, -hy, hz], [-hx, hy, hz], [-hx, hy, -hz]]),
        ([0.0, 1.0, 0.0], [[-hx, hy, hz], [hx, hy, hz], [hx, hy, -hz], [-hx, hy, -hz]]),
        ([0.0, -1.0, 0.0], [[-hx, -hy, -hz], [hx, -hy, -hz], [hx, -hy, hz], [-hx, -hy, hz]]),
        ([0.0, 0.0, 1.0], [[-hx, -hy, hz], [hx, -hy, hz], [hx, hy, hz], [-hx, hy, hz]]),
        ([0.0, 0.0, -1.0], [[hx, -hy, -hz], [-hx, -hy, -hz], [-hx, hy, -hz], [hx, hy, -hz]]),
    ];

    for (normal, corners) in faces {
        let a = mesh.push(corners[0], normal);
        let b = mesh.push(corners[1], normal);
        let c = mesh.push(corners[2], normal);
        let d = mesh.push(corners[3], normal);
        mesh.quad(a, b, c, d);
    }
    mesh
}

/// UV sphere centered on the origin.
pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let row = width_segments + 1;

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let (sin_theta, cos_theta) = (v * std::f32::consts::PI).sin_cos();
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let (sin_phi, cos_phi) = (u * TAU).sin_cos();
            let normal = [-cos_phi * sin_theta, cos_theta, sin_phi * sin_theta];
            mesh.push([normal[0] * radius, normal[1] * radius, normal[2] * radius], normal);
        }
    }

    for iy in 0..height_segments {
        for ix in 0..width_segments {
            let a = (iy * row + ix + 1) as u16;
            let b = (iy * row + ix) as u16;
            let c = ((iy + 1) * row + ix) as u16;
            let d = ((iy + 1) * row + ix + 1) as u16;
            // the pole rows collapse to a point, skip their degenerate halves
            if iy != 0 {
                mesh.indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments - 1 {
                mesh.indices.extend_from_slice(&[b, c, d]);
            }
        }
    }
    mesh
}

/// Capped cylinder or cone along the y axis, centered on the origin.
/// A zero `radius_top` makes a cone.
pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, radial_segments: u32) -> MeshData {
    let mut mesh = MeshData::default();
    let half = height / 2.0;
    let slope = (radius_bottom - radius_top) / height;

    // side
    let side = mesh.base();
    for (y, radius) in [(half, radius_top), (-half, radius_bottom)] {
        for i in 0..=radial_segments {
            let (sin, cos) = (i as f32 / radial_segments as f32 * TAU).sin_cos();
            mesh.push([radius * sin, y, radius * cos], normalized([sin, slope, cos]));
        }
    }
    let row = (radial_segments + 1) as u16;
    for i in 0..radial_segments as u16 {
        let top = side + i;
        let bottom = side + row + i;
        mesh.quad(top, bottom, bottom + 1, top + 1);
    }

    // caps
    for (y, radius, sign) in [(half, radius_top, 1.0f32), (-half, radius_bottom, -1.0)] {
        if radius <= 0.0 {
            continue;
        }
        let normal = [0.0, sign, 0.0];
        let center = mesh.push([0.0, y, 0.0], normal);
        let rim = mesh.base();
        for i in 0..=radial_segments {
            let (sin, cos) = (i as f32 / radial_segments as f32 * TAU).sin_cos();
            mesh.push([radius * sin, y, radius * cos], normal);
        }
        for i in 0..radial_segments as u16 {
            if sign > 0.0 {
                mesh.indices.extend_from_slice(&[center, rim + i, rim + i + 1]);
            } else {
                mesh.indices.extend_from_slice(&[center, rim + i + 1, rim + i]);
            }
        }
    }
    mesh
}

pub fn cone(radius: f32, height: f32, radial_segments: u32) -> MeshData {
    cylinder(0.0, radius, height, radial_segments)
}

/// Ring lying in the xy plane around the z axis.
pub fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> MeshData {
    let mut mesh = MeshData::default();

    for j in 0..=radial_segments {
        let (sin_v, cos_v) = (j as f32 / radial_segments as f32 * TAU).sin_cos();
        for i in 0..=tubular_segments {
            let (sin_u, cos_u) = (i as f32 / tubular_segments as f32 * TAU).sin_cos();
            let ring = radius + tube * cos_v;
            let position = [ring * cos_u, ring * sin_u, tube * sin_v];
            let normal = [cos_v * cos_u, cos_v * sin_u, sin_v];
            mesh.push(position, normal);
        }
    }

    let row = (tubular_segments + 1) as u16;
    for j in 1..=radial_segments as u16 {
        for i in 1..=tubular_segments as u16 {
            let a = row * j + i - 1;
            let b = row * (j - 1) + i - 1;
            let c = row * (j - 1) + i;
            let d = row * j + i;
            mesh.indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }
    mesh
}

/// Single quad in the xy plane facing +z.
pub fn plane(width: f32, height: f32) -> MeshData {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let normal = [0.0, 0.0, 1.0];
    let mut mesh = MeshData::default();
    let a = mesh.push([-hw, -hh, 0.0], normal);
    let b = mesh.push([hw, -hh, 0.0], normal);
    let c = mesh.push([hw, hh, 0.0], normal);
    let d = mesh.push([-hw, hh, 0.0], normal);
    mesh.quad(a, b, c, d);
    mesh
}

/// Square line grid on the xz plane; the two center lines use `center_color`.
pub fn grid(size: f32, divisions: u32, center_color: [f32; 3], color: [f32; 3]) -> Vec<LineVertex> {
    let step = size / divisions as f32;
    let half = size / 2.0;
    let center = divisions / 2;
    let mut lines = Vec::with_capacity(((divisions + 1) * 4) as usize);

    for i in 0..=divisions {
        let k = -half + i as f32 * step;
        let color = if i == center { center_color } else { color };
        lines.push(LineVertex { position: [-half, 0.0, k], color });
        lines.push(LineVertex { position: [half, 0.0, k], color });
        lines.push(LineVertex { position: [k, 0.0, -half], color });
        lines.push(LineVertex { position: [k, 0.0, half], color });
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_well_formed(mesh: &MeshData) {
        assert!(!mesh.indices.is_empty());
        assert_eq!(mesh.indices.len() % 3, 0);
        for &i in &mesh.indices {
            assert!((i as usize) < mesh.vertices.len(), "index {} out of range", i);
        }
        for v in &mesh.vertices {
            let n = v.normal;
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            assert!((len - 1.0).abs() < 1e-4, "normal {:?} is not unit length", n);
        }
    }

    fn extent(mesh: &MeshData, axis: usize) -> (f32, f32) {
        mesh.vertices.iter().fold((f32::MAX, f32::MIN), |(lo, hi), v| {
            (lo.min(v.position[axis]), hi.max(v.position[axis]))
        })
    }

    #[test]
    fn unit_box_spans_half_a_unit_each_way() {
        let mesh = cuboid(1.0, 1.0, 1.0);
        assert_well_formed(&mesh);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        for axis in 0..3 {
            assert_eq!(extent(&mesh, axis), (-0.5, 0.5));
        }
    }

    #[test]
    fn sphere_vertices_sit_on_the_radius() {
        let mesh = sphere(0.7, 32, 32);
        assert_well_formed(&mesh);
        for v in &mesh.vertices {
            let p = v.position;
            let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((r - 0.7).abs() < 1e-4);
        }
    }

    #[test]
    fn cone_has_apex_on_top_and_one_cap() {
        let mesh = cone(0.5, 1.0, 16);
        assert_well_formed(&mesh);
        let (lo, hi) = extent(&mesh, 1);
        assert_eq!((lo, hi), (-0.5, 0.5));
        let top: Vec<_> = mesh.vertices.iter().filter(|v| v.position[1] == 0.5).collect();
        assert!(top.iter().all(|v| v.position[0] == 0.0 && v.position[2] == 0.0));
        assert_eq!(mesh.vertices.len(), 2 * 17 + 1 + 17);
    }

    #[test]
    fn cylinder_has_two_caps() {
        let mesh = cylinder(0.5, 0.5, 1.0, 32);
        assert_well_formed(&mesh);
        assert_eq!(mesh.vertices.len(), 2 * 33 + 2 * (1 + 33));
        let (lo, hi) = extent(&mesh, 0);
        assert!((lo + 0.5).abs() < 1e-5 && (hi - 0.5).abs() < 1e-5);
    }

    #[test]
    fn torus_lies_flat_in_xy() {
        let mesh = torus(0.5, 0.2, 16, 100);
        assert_well_formed(&mesh);
        let (lo, hi) = extent(&mesh, 2);
        assert!((lo + 0.2).abs() < 1e-5 && (hi - 0.2).abs() < 1e-5);
        let (lo, hi) = extent(&mesh, 0);
        assert!((lo + 0.7).abs() < 1e-5 && (hi - 0.7).abs() < 1e-5);
    }

    #[test]
    fn plane_faces_positive_z() {
        let mesh = plane(200.0, 200.0);
        assert_well_formed(&mesh);
        assert!(mesh.vertices.iter().all(|v| v.position[2] == 0.0 && v.normal == [0.0, 0.0, 1.0]));
        assert_eq!(extent(&mesh, 0), (-100.0, 100.0));
    }

    #[test]
    fn grid_has_two_lines_per_division_edge() {
        let lines = grid(200.0, 50, [0.5; 3], [0.25; 3]);
        assert_eq!(lines.len(), 51 * 4);
        assert!(lines.iter().all(|v| v.position[1] == 0.0));
        assert_eq!(lines.iter().filter(|v| v.color == [0.5; 3]).count(), 4);
    }
}
