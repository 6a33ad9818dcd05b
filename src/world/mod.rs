//! World module - Rally-Sport style track scenes
//!
//! - Heightmap ground with a tile texture per square, rebuilt around the view
//!   every frame
//! - Props: library meshes placed in the world, culled against the view window
//! - RON scene files

mod ground;
mod scene;

pub use ground::*;
pub use scene::*;
