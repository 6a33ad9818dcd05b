//! Vector math and the perspective transform

use std::ops::{Add, Sub};
use serde::{Serialize, Deserialize};

use super::types::{Polygon, RasterError, Vertex};

/// 3D Vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

/// Linear interpolation between `a` and `b`
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Camera state
///
/// There's no rotation: the view always looks down +Z with the vanishing
/// point at the top center of the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
}

impl Camera {
    pub fn new(position: Vec3) -> Self {
        Self { position }
    }

    /// Move the camera by the given amounts
    pub fn translate(&mut self, delta: Vec3) {
        self.position = self.position + delta;
    }
}

/// Project a single vertex into screen space, in place.
///
/// Coordinates are rounded half away from zero. The vertex keeps the
/// camera-relative depth in `z` for depth sorting.
pub fn project_vertex(v: &mut Vertex, camera: &Camera, surface_width: usize) -> Result<(), RasterError> {
    let half_width = (surface_width / 2) as f32;
    let cam = camera.position;

    let depth = cam.z + v.pos.z;
    if depth == 0.0 {
        return Err(RasterError::ZeroDepth { x: v.pos.x, y: v.pos.y, z: v.pos.z });
    }

    v.pos.x = (half_width + (cam.x + v.pos.x - half_width) / depth).round();
    v.pos.y = ((cam.y + v.pos.y) / depth).round();
    v.pos.z = depth;

    Ok(())
}

/// Perspective-divide a polygon into screen space and decide its visibility.
///
/// The polygon counts as visible if any of its vertices lands on the surface
/// and none of them ends up behind the camera. Nothing gets clipped; rejected
/// polygons are just flagged.
pub fn transform_polygon(
    poly: &mut Polygon,
    camera: &Camera,
    surface_width: usize,
    surface_height: usize,
) -> Result<(), RasterError> {
    let mut visible = false;
    let mut behind = false;

    for v in poly.verts_mut() {
        project_vertex(v, camera, surface_width)?;
        visible |= on_surface(v, surface_width, surface_height);
        behind |= v.pos.z < 0.0;
    }

    poly.visible = visible && !behind;
    Ok(())
}

fn on_surface(v: &Vertex, width: usize, height: usize) -> bool {
    v.pos.x >= 0.0 && v.pos.x < width as f32 && v.pos.y >= 0.0 && v.pos.y < height as f32
}
