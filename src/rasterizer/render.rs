//! Render surface and mesh drawing

use super::fill::{fill_polygon, FillSource};
use super::math::{transform_polygon, Camera, Vec3};
use super::types::{Fill, Mesh, Palette, Polygon, RasterError, RasterSettings, Texture};
use super::MAX_VERTEX_COUNT;

/// Indexed color buffer plus a parallel 8-bit depth buffer
///
/// Both buffers are row-major, `x + y * width`.
pub struct RenderSurface {
    pub width: usize,
    pub height: usize,
    pixels: Vec<u8>,
    depth: Vec<u8>,
}

impl RenderSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
            depth: vec![0; width * height],
        }
    }

    /// Reset every color and depth cell to 0
    pub fn clear(&mut self) {
        self.pixels.fill(0);
        self.depth.fill(0);
    }

    /// Buffer index of pixel (x, y)
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.width && y < self.height,
            "Pixel ({}, {}) is outside the {}x{} surface",
            x,
            y,
            self.width,
            self.height
        );
        x + y * self.width
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.pixels[self.index(x, y)]
    }

    pub fn depth(&self, x: usize, y: usize) -> u8 {
        self.depth[self.index(x, y)]
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn depths(&self) -> &[u8] {
        &self.depth
    }

    /// Write a pixel if it's nearer than what's there.
    ///
    /// A stored depth of 0 is empty, so anything drawn over it wins.
    /// Otherwise the candidate has to be strictly smaller.
    #[inline]
    pub fn plot(&mut self, x: usize, y: usize, color: u8, depth: u8) -> bool {
        let idx = self.index(x, y);
        let stored = self.depth[idx];

        if stored != 0 && depth >= stored {
            return false;
        }

        self.pixels[idx] = color;
        self.depth[idx] = depth;
        true
    }

    /// Expand the indexed pixels to RGBA through a palette
    pub fn to_rgba(&self, palette: &Palette, out: &mut Vec<u8>) {
        out.clear();
        out.reserve(self.pixels.len() * 4);
        for &index in &self.pixels {
            let [r, g, b] = palette.rgb(index);
            out.extend_from_slice(&[r, g, b, 255]);
        }
    }
}

/// Per-frame drawing statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub meshes: usize,
    pub polys_drawn: usize,
    pub polys_culled: usize,
}

/// Owns the render surface and drives transform + fill for whole meshes.
pub struct Renderer {
    pub surface: RenderSurface,
    pub camera: Camera,
    pub settings: RasterSettings,
    pub stats: FrameStats,
    /// Reused for every polygon so drawing doesn't allocate
    scratch: Polygon,
}

impl Renderer {
    pub fn new(width: usize, height: usize, camera: Camera, settings: RasterSettings) -> Self {
        Self {
            surface: RenderSurface::new(width, height),
            camera,
            settings,
            stats: FrameStats::default(),
            scratch: Polygon::with_capacity(MAX_VERTEX_COUNT),
        }
    }

    /// Clear both buffers and the frame statistics
    pub fn clear_buffers(&mut self) {
        self.surface.clear();
        self.stats = FrameStats::default();
    }

    /// Transform a polygon into screen space with the current camera
    pub fn transform_polygon(&self, poly: &mut Polygon) -> Result<(), RasterError> {
        transform_polygon(poly, &self.camera, self.surface.width, self.surface.height)
    }

    /// Fill a screen-space polygon, looking its texture up in `textures`
    pub fn fill_polygon(&mut self, poly: &mut Polygon, textures: &[Texture]) -> Result<(), RasterError> {
        let source = fill_source(poly.fill, textures)?;
        fill_polygon(&mut self.surface, poly, source, &self.settings);
        Ok(())
    }

    /// Draw every polygon of a mesh.
    ///
    /// Each polygon is copied to scratch storage and offset by the mesh's
    /// position, so the mesh itself is left untouched. With `apply_transform`
    /// off, the vertices are taken to be screen coordinates already.
    pub fn draw_mesh(&mut self, mesh: &Mesh, textures: &[Texture], apply_transform: bool) -> Result<(), RasterError> {
        self.draw_polygons(&mesh.polys, mesh.offset, textures, apply_transform)
    }

    /// Draw a loose batch of polygons as if they were one mesh placed at `offset`
    pub fn draw_polygons(
        &mut self,
        polys: &[Polygon],
        offset: Vec3,
        textures: &[Texture],
        apply_transform: bool,
    ) -> Result<(), RasterError> {
        self.stats.meshes += 1;

        for poly in polys {
            let scratch = &mut self.scratch;
            scratch.copy_from(poly);
            scratch.translate(offset);

            if apply_transform {
                transform_polygon(scratch, &self.camera, self.surface.width, self.surface.height)?;
            }

            if !scratch.visible {
                self.stats.polys_culled += 1;
                continue;
            }

            let source = fill_source(scratch.fill, textures)?;
            fill_polygon(&mut self.surface, scratch, source, &self.settings);
            self.stats.polys_drawn += 1;
        }

        Ok(())
    }
}

fn fill_source(fill: Fill, textures: &[Texture]) -> Result<FillSource<'_>, RasterError> {
    match fill {
        Fill::Color(c) => Ok(FillSource::Color(c)),
        Fill::Texture(id) => textures
            .get(id)
            .map(FillSource::Texture)
            .ok_or(RasterError::MissingTexture(id)),
    }
}
