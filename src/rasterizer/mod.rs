//! Rally-Sport style software rasterizer
//!
//! Features:
//! - Perspective divide towards a vanishing point at the top center
//! - Scanline polygon fill, up to 16 vertices per polygon
//! - Affine 8.8 fixed point texture mapping (no perspective correction)
//! - Alpha-tested textures (palette index 0 is transparent)
//! - Coarse per-polygon 8-bit depth buffering

mod math;
mod types;
mod fill;
mod render;

pub use math::*;
pub use types::*;
pub use fill::*;
pub use render::*;

/// Screen dimensions (VGA mode 13h)
pub const WIDTH: usize = 320;
pub const HEIGHT: usize = 200;

/// Most vertices a polygon can have
pub const MAX_VERTEX_COUNT: usize = 16;
