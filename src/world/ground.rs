//! Heightmap ground
//!
//! The track surface is a square grid: one height per tile corner and one
//! texture id per tile. Every frame a fixed window of tiles around the view
//! offset is rebuilt into quads.

use serde::{Serialize, Deserialize};

use crate::rasterizer::{Fill, Polygon, Vec3, Vertex};
use crate::stack::GrowableStack;
use super::SceneError;

/// Default world size of a tile along X and Z
pub const TILE_SIZE: f32 = 128.0;

/// Tiles across the ground view
pub const VIEW_WIDTH: usize = 23;
/// Tile rows into the screen
pub const VIEW_DEPTH: usize = 24;

/// Extra quad drawn on top of tiles of a given kind (spectators, shrubs, bridges)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Billboard {
    /// Tile texture id that triggers the billboard
    pub tile: u8,
    /// Texture drawn on the billboard
    pub texture: usize,
    /// Lies flat at ground level instead of standing upright
    #[serde(default)]
    pub flat: bool,
}

fn default_tile_size() -> f32 {
    TILE_SIZE
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ground {
    /// Tiles per side; the grid is square
    pub width: usize,
    /// Corner heights, row-major, positive is up
    pub heights: Vec<i16>,
    /// Texture id per tile, row-major
    pub tiles: Vec<u8>,
    #[serde(default = "default_tile_size")]
    pub tile_width: f32,
    #[serde(default = "default_tile_size")]
    pub tile_depth: f32,
    /// Vertical size of upright billboards
    #[serde(default = "default_tile_size")]
    pub billboard_height: f32,
    #[serde(default)]
    pub billboards: Vec<Billboard>,
}

impl Ground {
    /// Flat ground of a single tile kind
    pub fn flat(width: usize, tile: u8) -> Self {
        Self {
            width,
            heights: vec![0; width * width],
            tiles: vec![tile; width * width],
            tile_width: TILE_SIZE,
            tile_depth: TILE_SIZE,
            billboard_height: TILE_SIZE,
            billboards: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        let expected = self.width * self.width;
        if self.heights.len() != expected {
            return Err(SceneError::InvalidGround(format!(
                "{} heights for a {}x{} ground", self.heights.len(), self.width, self.width
            )));
        }
        if self.tiles.len() != expected {
            return Err(SceneError::InvalidGround(format!(
                "{} tiles for a {}x{} ground", self.tiles.len(), self.width, self.width
            )));
        }
        if self.tile_width <= 0.0 || self.tile_depth <= 0.0 {
            return Err(SceneError::InvalidGround("tile size must be positive".to_string()));
        }
        Ok(())
    }

    fn grid_index(&self, x: i64, y: i64) -> Option<usize> {
        let w = self.width as i64;
        if x < 0 || y < 0 || x >= w || y >= w {
            return None;
        }
        Some((x + y * w) as usize)
    }

    /// Screen-space Y of a grid corner: heights grow upward, the surface's Y
    /// grows downward. Outside the grid the ground is at zero.
    pub fn height_at(&self, x: i64, y: i64) -> f32 {
        self.grid_index(x, y)
            .and_then(|i| self.heights.get(i))
            .map_or(0.0, |&h| -(h as f32))
    }

    /// Texture id of a tile, 0 outside the grid
    pub fn tile_at(&self, x: i64, y: i64) -> u8 {
        self.grid_index(x, y)
            .and_then(|i| self.tiles.get(i).copied())
            .unwrap_or(0)
    }

    fn billboard_for(&self, tile: u8) -> Option<&Billboard> {
        self.billboards.iter().find(|b| b.tile == tile)
    }

    /// Largest texture id the ground can reference
    pub fn max_texture_id(&self) -> usize {
        let tiles = self.tiles.iter().map(|&t| t as usize);
        let boards = self.billboards.iter().map(|b| b.texture);
        tiles.chain(boards).max().unwrap_or(0)
    }

    /// Rebuild the visible window of tiles into `out`.
    ///
    /// `out` is cleared first; its allocation carries over between frames.
    /// Row 0 is nearest the camera. `origin` is where the window's front left
    /// corner lands in world space.
    pub fn assemble(&self, view_x: i32, view_z: i32, origin: Vec3, out: &mut GrowableStack<Polygon>) {
        out.clear();

        let tw = self.tile_width;
        let td = self.tile_depth;

        for row in 0..VIEW_DEPTH {
            for col in 0..VIEW_WIDTH {
                let tx = col as i64 + view_x as i64;
                let ty = row as i64 + view_z as i64;

                let x0 = origin.x + col as f32 * tw;
                let x1 = x0 + tw;
                let front = origin.z + row as f32 * td;
                let back = front + td;

                let corners = [
                    Vertex::from_pos(x0, self.height_at(tx, ty), back),
                    Vertex::from_pos(x1, self.height_at(tx + 1, ty), back),
                    Vertex::from_pos(x1, self.height_at(tx + 1, ty - 1), front),
                    Vertex::from_pos(x0, self.height_at(tx, ty - 1), front),
                ];
                let tile = self.tile_at(tx, ty - 1);
                out.push(Polygon::quad(corners, Fill::Texture(tile as usize)));

                if let Some(board) = self.billboard_for(tile) {
                    let corners = if board.flat {
                        [
                            Vertex::from_pos(x0, 0.0, back),
                            Vertex::from_pos(x1, 0.0, back),
                            Vertex::from_pos(x1, 0.0, front),
                            Vertex::from_pos(x0, 0.0, front),
                        ]
                    } else {
                        let base = self.height_at(tx, ty);
                        let top = base - self.billboard_height;
                        [
                            Vertex::from_pos(x0, top, back),
                            Vertex::from_pos(x1, top, back),
                            Vertex::from_pos(x1, base, back),
                            Vertex::from_pos(x0, base, back),
                        ]
                    };
                    out.push(Polygon::quad(corners, Fill::Texture(board.texture)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_reads_zero() {
        let mut ground = Ground::flat(4, 7);
        ground.heights[0] = 50;
        assert_eq!(ground.height_at(0, 0), -50.0);
        assert_eq!(ground.height_at(-1, 0), 0.0);
        assert_eq!(ground.height_at(4, 0), 0.0);
        assert_eq!(ground.height_at(0, 4), 0.0);
        assert_eq!(ground.tile_at(3, 3), 7);
        assert_eq!(ground.tile_at(4, 3), 0);
    }

    #[test]
    fn test_validate_sizes() {
        let mut ground = Ground::flat(4, 1);
        assert!(ground.validate().is_ok());
        ground.tiles.pop();
        assert!(matches!(ground.validate(), Err(SceneError::InvalidGround(_))));
    }

    #[test]
    fn test_assemble_fills_view_window() {
        let ground = Ground::flat(64, 2);
        let mut out = GrowableStack::new(0);
        ground.assemble(0, 1, Vec3::ZERO, &mut out);

        assert_eq!(out.count(), VIEW_WIDTH * VIEW_DEPTH);
        let first = out.at(0);
        assert_eq!(first.fill, Fill::Texture(2));
        assert_eq!(first.num_verts(), 4);
        // Back corners sit one tile further in than the front ones.
        assert_eq!(first.verts()[0].pos.z, TILE_SIZE);
        assert_eq!(first.verts()[3].pos.z, 0.0);
    }

    #[test]
    fn test_assemble_reads_heights_and_tiles() {
        let mut ground = Ground::flat(8, 1);
        // Corner (2, 3) and tile (2, 2).
        ground.heights[2 + 3 * 8] = 40;
        ground.tiles[2 + 2 * 8] = 9;
        let mut out = GrowableStack::new(0);
        ground.assemble(2, 3, Vec3::ZERO, &mut out);

        let first = out.at(0);
        assert_eq!(first.verts()[0].pos.y, -40.0);
        assert_eq!(first.verts()[1].pos.y, 0.0);
        assert_eq!(first.fill, Fill::Texture(9));
    }

    #[test]
    fn test_assemble_reuses_staging_capacity() {
        let ground = Ground::flat(64, 1);
        let mut out = GrowableStack::new(0);

        ground.assemble(0, 0, Vec3::ZERO, &mut out);
        let capacity = out.capacity();
        ground.assemble(5, 7, Vec3::ZERO, &mut out);

        assert_eq!(out.count(), VIEW_WIDTH * VIEW_DEPTH);
        assert_eq!(out.capacity(), capacity);
    }

    #[test]
    fn test_billboards() {
        let mut ground = Ground::flat(64, 1);
        ground.tiles[10] = 240;
        ground.tiles[11] = 248;
        ground.billboards = vec![
            Billboard { tile: 240, texture: 236, flat: false },
            Billboard { tile: 248, texture: 177, flat: true },
        ];
        let mut out = GrowableStack::new(0);
        // The first row of the window reads tile row view_z - 1.
        ground.assemble(0, 1, Vec3::ZERO, &mut out);

        assert_eq!(out.count(), VIEW_WIDTH * VIEW_DEPTH + 2);

        let upright = out.at(11);
        assert_eq!(upright.fill, Fill::Texture(236));
        assert_eq!(upright.verts()[0].pos.y, -TILE_SIZE);
        assert!(upright.verts().iter().all(|v| v.pos.z == TILE_SIZE));

        let flat = out.at(13);
        assert_eq!(flat.fill, Fill::Texture(177));
        assert!(flat.verts().iter().all(|v| v.pos.y == 0.0));
    }

    #[test]
    fn test_max_texture_id() {
        let mut ground = Ground::flat(4, 3);
        assert_eq!(ground.max_texture_id(), 3);
        ground.billboards.push(Billboard { tile: 3, texture: 40, flat: false });
        assert_eq!(ground.max_texture_id(), 40);
    }
}
