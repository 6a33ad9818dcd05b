//! Core types for the rasterizer

use std::fmt;
use std::path::Path;
use serde::{Serialize, Deserialize};

use super::math::Vec3;
use super::MAX_VERTEX_COUNT;

/// Errors raised when the rasterizer's input contract is broken
#[derive(Debug)]
pub enum RasterError {
    /// A polygon was built with more vertices than the filler supports
    TooManyVertices(usize),
    /// A vertex sits in the camera's depth plane, so it can't be projected
    ZeroDepth { x: f32, y: f32, z: f32 },
    /// A polygon refers to a texture that isn't in the texture table
    MissingTexture(usize),
    InvalidTexture(String),
    InvalidPalette(String),
    ImageError(image::ImageError),
    IoError(std::io::Error),
}

impl From<image::ImageError> for RasterError {
    fn from(e: image::ImageError) -> Self {
        RasterError::ImageError(e)
    }
}

impl From<std::io::Error> for RasterError {
    fn from(e: std::io::Error) -> Self {
        RasterError::IoError(e)
    }
}

impl fmt::Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterError::TooManyVertices(n) => {
                write!(f, "Polygon has {} vertices, at most {} are supported", n, MAX_VERTEX_COUNT)
            }
            RasterError::ZeroDepth { x, y, z } => {
                write!(f, "Vertex ({}, {}, {}) lies in the camera's depth plane", x, y, z)
            }
            RasterError::MissingTexture(id) => write!(f, "No texture with id {}", id),
            RasterError::InvalidTexture(msg) => write!(f, "Invalid texture: {}", msg),
            RasterError::InvalidPalette(msg) => write!(f, "Invalid palette: {}", msg),
            RasterError::ImageError(e) => write!(f, "Image error: {}", e),
            RasterError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for RasterError {}

/// A vertex in world or screen space
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub pos: Vec3,
    /// Palette index carried along from the source asset
    #[serde(default)]
    pub color: Option<u8>,
}

impl Vertex {
    pub fn new(pos: Vec3) -> Self {
        Self { pos, color: None }
    }

    pub fn from_pos(x: f32, y: f32, z: f32) -> Self {
        Self::new(Vec3::new(x, y, z))
    }
}

/// How a polygon's pixels get their color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fill {
    /// A single palette index
    Color(u8),
    /// Index into the texture table
    Texture(usize),
}

/// Serialized form of a polygon; the closing vertex isn't stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolygonDef {
    verts: Vec<Vertex>,
    fill: Fill,
    #[serde(default = "default_visible")]
    visible: bool,
}

fn default_visible() -> bool {
    true
}

/// A convex polygon of up to `MAX_VERTEX_COUNT` vertices
///
/// Vertex storage always has one spare slot at the end. The filler writes
/// a copy of the first vertex there to close the loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolygonDef", into = "PolygonDef")]
pub struct Polygon {
    verts: Vec<Vertex>,
    pub fill: Fill,
    /// Polygons flagged invisible are skipped by the filler
    pub visible: bool,
}

impl Polygon {
    pub fn new(verts: &[Vertex], fill: Fill) -> Result<Self, RasterError> {
        let mut poly = Self { verts: Vec::with_capacity(verts.len() + 1), fill, visible: true };
        poly.set_verts(verts)?;
        Ok(poly)
    }

    /// A four-sided polygon. Always within the vertex cap, so it can't fail.
    pub fn quad(corners: [Vertex; 4], fill: Fill) -> Self {
        let verts = vec![corners[0], corners[1], corners[2], corners[3], corners[0]];
        Self { verts, fill, visible: true }
    }

    /// An empty polygon with room for `max_verts` vertices
    pub fn with_capacity(max_verts: usize) -> Self {
        let mut verts = Vec::with_capacity(max_verts + 1);
        verts.push(Vertex::default());
        Self { verts, fill: Fill::Color(0), visible: true }
    }

    /// Become a copy of `other`, reusing this polygon's vertex storage.
    pub fn copy_from(&mut self, other: &Polygon) {
        self.verts.clear();
        self.verts.extend_from_slice(&other.verts);
        self.fill = other.fill;
        self.visible = other.visible;
    }

    pub fn num_verts(&self) -> usize {
        self.verts.len() - 1
    }

    /// The polygon's vertices, without the closing slot
    pub fn verts(&self) -> &[Vertex] {
        &self.verts[..self.num_verts()]
    }

    pub fn verts_mut(&mut self) -> &mut [Vertex] {
        let n = self.num_verts();
        &mut self.verts[..n]
    }

    /// All vertex slots including the closing one
    pub(crate) fn closed_loop_mut(&mut self) -> &mut [Vertex] {
        &mut self.verts
    }

    /// Replace the vertices, reusing the existing allocation.
    pub fn set_verts(&mut self, verts: &[Vertex]) -> Result<(), RasterError> {
        if verts.len() > MAX_VERTEX_COUNT {
            return Err(RasterError::TooManyVertices(verts.len()));
        }

        self.verts.clear();
        self.verts.extend_from_slice(verts);
        self.verts.push(verts.first().copied().unwrap_or_default());
        Ok(())
    }

    /// Add an offset to every vertex
    pub fn translate(&mut self, offset: Vec3) {
        for v in self.verts_mut() {
            v.pos = v.pos + offset;
        }
    }
}

impl TryFrom<PolygonDef> for Polygon {
    type Error = RasterError;

    fn try_from(def: PolygonDef) -> Result<Self, Self::Error> {
        let mut poly = Polygon::new(&def.verts, def.fill)?;
        poly.visible = def.visible;
        Ok(poly)
    }
}

impl From<Polygon> for PolygonDef {
    fn from(poly: Polygon) -> Self {
        PolygonDef {
            verts: poly.verts().to_vec(),
            fill: poly.fill,
            visible: poly.visible,
        }
    }
}

/// RGB palette the indexed surface is displayed through
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub colors: Vec<[u8; 3]>,
}

impl Palette {
    /// Palettes with fewer entries than this are rejected
    pub const MIN_COLORS: usize = 32;
    pub const MAX_COLORS: usize = 256;

    pub fn new(colors: Vec<[u8; 3]>) -> Result<Self, RasterError> {
        if colors.len() < Self::MIN_COLORS || colors.len() > Self::MAX_COLORS {
            return Err(RasterError::InvalidPalette(format!(
                "expected {} to {} colors, got {}",
                Self::MIN_COLORS,
                Self::MAX_COLORS,
                colors.len()
            )));
        }
        Ok(Self { colors })
    }

    /// Decode VGA DAC palette bytes: RGB triples with 6 bits per channel.
    pub fn from_vga_bytes(bytes: &[u8]) -> Result<Self, RasterError> {
        if bytes.len() % 3 != 0 {
            return Err(RasterError::InvalidPalette(format!(
                "{} bytes is not a whole number of RGB triples",
                bytes.len()
            )));
        }

        let colors = bytes
            .chunks_exact(3)
            .map(|c| [scale_6bit(c[0]), scale_6bit(c[1]), scale_6bit(c[2])])
            .collect();

        Self::new(colors)
    }

    /// Load a raw VGA palette file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let bytes = std::fs::read(path)?;
        Self::from_vga_bytes(&bytes)
    }

    /// A generated palette for running without game assets: black, a grey
    /// ramp, then hue ramps.
    pub fn fallback() -> Self {
        let mut colors = Vec::with_capacity(Self::MAX_COLORS);
        colors.push([0, 0, 0]);
        for i in 1..32u32 {
            let v = (i * 255 / 31) as u8;
            colors.push([v, v, v]);
        }
        let hues: [[u32; 3]; 7] = [
            [255, 0, 0],
            [255, 160, 0],
            [255, 255, 0],
            [0, 200, 0],
            [0, 200, 255],
            [0, 0, 255],
            [200, 0, 255],
        ];
        for hue in &hues {
            for step in 1..=32u32 {
                colors.push([
                    (hue[0] * step / 32) as u8,
                    (hue[1] * step / 32) as u8,
                    (hue[2] * step / 32) as u8,
                ]);
            }
        }
        Self { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// RGB for a palette index; indices past the end are black
    pub fn rgb(&self, index: u8) -> [u8; 3] {
        self.colors.get(index as usize).copied().unwrap_or([0, 0, 0])
    }

    /// Index of the palette entry closest to the given color.
    ///
    /// Index 0 is left out when `skip_zero` is set, so opaque texels never
    /// turn into alpha-tested holes.
    pub fn nearest(&self, rgb: [u8; 3], skip_zero: bool) -> u8 {
        let start = if skip_zero { 1 } else { 0 };
        let mut best = start;
        let mut best_dist = u32::MAX;

        for (i, c) in self.colors.iter().enumerate().skip(start) {
            let dr = c[0] as i32 - rgb[0] as i32;
            let dg = c[1] as i32 - rgb[1] as i32;
            let db = c[2] as i32 - rgb[2] as i32;
            let dist = (dr * dr + dg * dg + db * db) as u32;
            if dist < best_dist {
                best = i;
                best_dist = dist;
            }
        }

        best as u8
    }
}

fn scale_6bit(c: u8) -> u8 {
    ((c.min(63) as u32 * 255) / 63) as u8
}

/// Palette-indexed texture
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub width: u8,
    pub height: u8,
    /// Row-major palette indices
    pub pixels: Vec<u8>,
    /// When set, index 0 is transparent
    pub alpha_test: bool,
    pub name: String,
}

impl Texture {
    pub fn new(width: u8, height: u8, pixels: Vec<u8>, alpha_test: bool) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidTexture(format!("zero-sized texture {}x{}", width, height)));
        }
        if pixels.len() != width as usize * height as usize {
            return Err(RasterError::InvalidTexture(format!(
                "{}x{} texture needs {} pixels, got {}",
                width,
                height,
                width as usize * height as usize,
                pixels.len()
            )));
        }

        Ok(Self { width, height, pixels, alpha_test, name: String::new() })
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Load a PNG and map it onto the palette.
    ///
    /// With `alpha_test` on, pixels with alpha below 128 become index 0 and
    /// every other pixel avoids index 0.
    pub fn from_file<P: AsRef<Path>>(path: P, palette: &Palette, alpha_test: bool) -> Result<Self, RasterError> {
        let path = path.as_ref();
        let img = image::open(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        Self::from_image(img, palette, alpha_test).map(|t| t.with_name(&name))
    }

    fn from_image(img: image::DynamicImage, palette: &Palette, alpha_test: bool) -> Result<Self, RasterError> {
        use image::GenericImageView;

        let (width, height) = img.dimensions();
        if width > u8::MAX as u32 || height > u8::MAX as u32 {
            return Err(RasterError::InvalidTexture(format!(
                "{}x{} is larger than 255x255",
                width, height
            )));
        }

        let rgba = img.to_rgba8();
        let pixels = rgba
            .pixels()
            .map(|p| {
                if alpha_test && p[3] < 128 {
                    0
                } else {
                    palette.nearest([p[0], p[1], p[2]], alpha_test)
                }
            })
            .collect();

        Self::new(width as u8, height as u8, pixels, alpha_test)
    }

    /// Load all PNG textures from a directory, sorted by file name
    pub fn load_directory<P: AsRef<Path>>(dir: P, palette: &Palette, alpha_test: bool) -> Vec<Self> {
        let dir = dir.as_ref();
        let mut textures = Vec::new();

        if let Ok(entries) = std::fs::read_dir(dir) {
            let mut paths: Vec<_> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.extension()
                        .map(|ext| ext.to_ascii_lowercase() == "png")
                        .unwrap_or(false)
                })
                .collect();

            paths.sort();

            for path in paths {
                match Self::from_file(&path, palette, alpha_test) {
                    Ok(tex) => {
                        log::info!("Loaded texture: {} ({}x{})", tex.name, tex.width, tex.height);
                        textures.push(tex);
                    }
                    Err(e) => {
                        log::warn!("Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        textures
    }

    /// Split a tile atlas of 16x16 textures, 256 bytes each.
    ///
    /// Rows are stored bottom-up, so each tile is flipped while copying.
    pub fn from_tile_atlas(bytes: &[u8], alpha_test: bool) -> Vec<Self> {
        const TILE_SIZE: usize = 16;
        const TILE_BYTES: usize = TILE_SIZE * TILE_SIZE;
        const MAX_TILES: usize = 251;

        bytes
            .chunks_exact(TILE_BYTES)
            .take(MAX_TILES)
            .enumerate()
            .map(|(i, tile)| {
                let mut pixels = vec![0u8; TILE_BYTES];
                for y in 0..TILE_SIZE {
                    let src = &tile[y * TILE_SIZE..(y + 1) * TILE_SIZE];
                    let dst_row = TILE_SIZE - y - 1;
                    pixels[dst_row * TILE_SIZE..(dst_row + 1) * TILE_SIZE].copy_from_slice(src);
                }
                Texture {
                    width: TILE_SIZE as u8,
                    height: TILE_SIZE as u8,
                    pixels,
                    alpha_test,
                    name: format!("tile{:03}", i),
                }
            })
            .collect()
    }

    /// Create a checkerboard test texture
    pub fn checkerboard(width: u8, height: u8, color1: u8, color2: u8) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height as usize {
            for x in 0..width as usize {
                let checker = ((x / 4) + (y / 4)) % 2 == 0;
                pixels.push(if checker { color1 } else { color2 });
            }
        }
        Self { width, height, pixels, alpha_test: false, name: "checkerboard".to_string() }
    }

    /// Sample the texel at column `u`, row `v`, clamped to the texture
    pub fn texel(&self, u: usize, v: usize) -> u8 {
        let u = u.min(self.width as usize - 1);
        let v = v.min(self.height as usize - 1);
        self.pixels[v * self.width as usize + u]
    }
}

/// Polygons positioned together in the world
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    #[serde(default)]
    pub name: String,
    pub polys: Vec<Polygon>,
    /// Added to copies of the vertices at draw time
    #[serde(default)]
    pub offset: Vec3,
}

impl Mesh {
    pub fn new(polys: Vec<Polygon>, offset: Vec3) -> Self {
        Self { name: String::new(), polys, offset }
    }

    /// The same mesh placed somewhere else
    pub fn placed_at(&self, offset: Vec3) -> Self {
        Self { name: self.name.clone(), polys: self.polys.clone(), offset }
    }
}

/// Rasterizer settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterSettings {
    /// Right shift turning a polygon's average depth into 8 bits
    pub depth_shift: u32,
    /// Honor textures' alpha-test flags (false = draw index 0 as a color)
    pub alpha_test: bool,
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            depth_shift: 4,
            alpha_test: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Vertex> {
        vec![
            Vertex::from_pos(0.0, 0.0, 1.0),
            Vertex::from_pos(10.0, 0.0, 1.0),
            Vertex::from_pos(10.0, 10.0, 1.0),
            Vertex::from_pos(0.0, 10.0, 1.0),
        ]
    }

    #[test]
    fn test_polygon_closing_slot() {
        let mut poly = Polygon::new(&square(), Fill::Color(7)).unwrap();
        assert_eq!(poly.num_verts(), 4);
        assert_eq!(poly.verts().len(), 4);
        let closed = poly.closed_loop_mut();
        assert_eq!(closed.len(), 5);
        assert_eq!(closed[4], closed[0]);
    }

    #[test]
    fn test_polygon_vertex_cap() {
        let verts = vec![Vertex::default(); MAX_VERTEX_COUNT];
        assert!(Polygon::new(&verts, Fill::Color(1)).is_ok());

        let verts = vec![Vertex::default(); MAX_VERTEX_COUNT + 1];
        assert!(matches!(
            Polygon::new(&verts, Fill::Color(1)),
            Err(RasterError::TooManyVertices(17))
        ));
    }

    #[test]
    fn test_empty_polygon() {
        let poly = Polygon::new(&[], Fill::Color(1)).unwrap();
        assert_eq!(poly.num_verts(), 0);
        assert!(poly.verts().is_empty());
    }

    #[test]
    fn test_set_verts_reuses_storage() {
        let mut poly = Polygon::with_capacity(MAX_VERTEX_COUNT);
        let before = poly.verts.capacity();

        let tri = [Vertex::from_pos(1.0, 2.0, 3.0), Vertex::from_pos(4.0, 5.0, 6.0), Vertex::from_pos(7.0, 8.0, 9.0)];
        poly.set_verts(&tri).unwrap();
        assert_eq!(poly.verts(), &tri);
        assert_eq!(poly.closed_loop_mut()[3], tri[0]);
        assert_eq!(poly.verts.capacity(), before);

        let too_many = vec![Vertex::default(); MAX_VERTEX_COUNT + 1];
        assert!(matches!(poly.set_verts(&too_many), Err(RasterError::TooManyVertices(17))));
        assert_eq!(poly.verts(), &tri);
    }

    #[test]
    fn test_polygon_ron_rejects_too_many_vertices() {
        let verts = vec![Vertex::default(); MAX_VERTEX_COUNT + 1];
        let def = PolygonDef { verts, fill: Fill::Color(1), visible: true };
        let text = ron::to_string(&def).unwrap();
        assert!(ron::from_str::<Polygon>(&text).is_err());
    }

    #[test]
    fn test_polygon_ron_round_trip() {
        let poly = Polygon::new(&square(), Fill::Texture(2)).unwrap();
        let text = ron::to_string(&poly).unwrap();
        let back: Polygon = ron::from_str(&text).unwrap();
        assert_eq!(back, poly);
    }

    #[test]
    fn test_texture_size_validation() {
        assert!(Texture::new(2, 2, vec![1, 2, 3, 4], false).is_ok());
        assert!(Texture::new(2, 2, vec![1, 2, 3], false).is_err());
        assert!(Texture::new(0, 2, vec![], false).is_err());
    }

    #[test]
    fn test_texel_clamps() {
        let tex = Texture::new(2, 2, vec![1, 2, 3, 4], false).unwrap();
        assert_eq!(tex.texel(1, 0), 2);
        assert_eq!(tex.texel(0, 1), 3);
        assert_eq!(tex.texel(9, 9), 4);
    }

    #[test]
    fn test_tile_atlas_flips_rows() {
        let mut bytes = vec![0u8; 512];
        // First row of the first tile, last row of the second.
        for b in &mut bytes[0..16] {
            *b = 5;
        }
        for b in &mut bytes[256 + 240..512] {
            *b = 9;
        }

        let tiles = Texture::from_tile_atlas(&bytes, false);
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].texel(3, 15), 5);
        assert_eq!(tiles[0].texel(3, 0), 0);
        assert_eq!(tiles[1].texel(3, 0), 9);
    }

    #[test]
    fn test_palette_scaling() {
        let mut bytes = vec![0u8; 32 * 3];
        bytes[3..6].copy_from_slice(&[63, 32, 1]);
        let palette = Palette::from_vga_bytes(&bytes).unwrap();
        assert_eq!(palette.len(), 32);
        assert_eq!(palette.rgb(0), [0, 0, 0]);
        assert_eq!(palette.rgb(1), [255, 129, 4]);
        assert_eq!(palette.rgb(200), [0, 0, 0]);
    }

    #[test]
    fn test_palette_too_small() {
        assert!(Palette::from_vga_bytes(&[0u8; 31 * 3]).is_err());
        assert!(Palette::from_vga_bytes(&[0u8; 100]).is_err());
    }

    #[test]
    fn test_palette_nearest() {
        let palette = Palette::fallback();
        assert_eq!(palette.nearest([0, 0, 0], false), 0);
        let idx = palette.nearest([0, 0, 0], true);
        assert_ne!(idx, 0);
        assert_eq!(palette.nearest([255, 255, 255], false), 31);
    }

    #[test]
    fn test_png_directory_quantizes_to_palette() {
        let dir = std::env::temp_dir().join(format!("rally_raster_png_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let mut img = image::RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        img.put_pixel(1, 0, image::Rgba([255, 0, 0, 0]));
        img.save(dir.join("b_red.png")).unwrap();
        image::RgbaImage::from_pixel(1, 1, image::Rgba([0, 0, 0, 255]))
            .save(dir.join("a_black.png"))
            .unwrap();
        std::fs::write(dir.join("notes.txt"), "not a texture").unwrap();

        let palette = Palette::fallback();
        let textures = Texture::load_directory(&dir, &palette, true);
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(textures.len(), 2);
        assert_eq!(textures[0].name, "a_black");
        // Opaque black must not become the transparent index.
        assert_ne!(textures[0].pixels[0], 0);
        assert_eq!(textures[1].name, "b_red");
        assert_eq!(textures[1].pixels, vec![63, 0]);
    }
}
