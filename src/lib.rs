//! Rally Raster: a Rally-Sport style software polygon rasterizer
//!
//! Draws flat and textured polygons into an 8-bit palette-indexed surface
//! with a coarse per-polygon depth buffer:
//! - Perspective divide towards a vanishing point at the top center
//! - Scanline fill with affine 8.8 fixed point texture mapping
//! - Heightmap ground and prop scenes loaded from RON files

pub mod config;
pub mod present;
pub mod rasterizer;
pub mod stack;
pub mod world;

/// Version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
