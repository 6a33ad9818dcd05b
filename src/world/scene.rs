//! Scene loading, saving and per-frame assembly
//!
//! Uses RON (Rusty Object Notation) for human-readable scene files.

use std::fs;
use std::path::Path;
use serde::{Serialize, Deserialize};

use crate::rasterizer::{Fill, Mesh, Polygon, RasterError, Renderer, Texture, Vec3, Vertex};
use crate::stack::GrowableStack;
use super::ground::{Billboard, Ground, VIEW_DEPTH, VIEW_WIDTH};

/// Most props a scene may hold
pub const MAX_PROPS: usize = 14;

/// Error type for scene loading
#[derive(Debug)]
pub enum SceneError {
    IoError(std::io::Error),
    ParseError(ron::error::SpannedError),
    SerializeError(ron::Error),
    InvalidGround(String),
    UnknownMesh(String),
    TooManyProps(usize),
}

impl From<std::io::Error> for SceneError {
    fn from(e: std::io::Error) -> Self {
        SceneError::IoError(e)
    }
}

impl From<ron::error::SpannedError> for SceneError {
    fn from(e: ron::error::SpannedError) -> Self {
        SceneError::ParseError(e)
    }
}

impl From<ron::Error> for SceneError {
    fn from(e: ron::Error) -> Self {
        SceneError::SerializeError(e)
    }
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneError::IoError(e) => write!(f, "IO error: {}", e),
            SceneError::ParseError(e) => write!(f, "Parse error: {}", e),
            SceneError::SerializeError(e) => write!(f, "Serialize error: {}", e),
            SceneError::InvalidGround(msg) => write!(f, "Invalid ground: {}", msg),
            SceneError::UnknownMesh(name) => write!(f, "Prop refers to unknown mesh '{}'", name),
            SceneError::TooManyProps(n) => write!(f, "{} props, at most {} allowed", n, MAX_PROPS),
        }
    }
}

impl std::error::Error for SceneError {}

/// A mesh from the scene's library placed in the world
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    pub mesh: String,
    /// World position. A Y of zero puts the prop on the ground.
    pub position: Vec3,
}

/// A prop that made it into the current view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PropInstance {
    /// Index into `Scene::meshes`
    pub mesh: usize,
    pub offset: Vec3,
}

/// Per-frame staging, refilled by `Scene::assemble_view`
#[derive(Debug, Default)]
pub struct SceneView {
    pub ground: GrowableStack<Polygon>,
    pub props: GrowableStack<PropInstance>,
}

impl SceneView {
    pub fn new() -> Self {
        Self {
            ground: GrowableStack::new(2 * VIEW_WIDTH * VIEW_DEPTH),
            props: GrowableStack::new(MAX_PROPS),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default)]
    pub name: String,
    pub ground: Ground,
    /// Where the ground view's front left corner lands in world space
    #[serde(default)]
    pub origin: Vec3,
    /// Mesh library props refer to by name
    #[serde(default)]
    pub meshes: Vec<Mesh>,
    #[serde(default)]
    pub props: Vec<Prop>,
}

impl Scene {
    pub fn validate(&self) -> Result<(), SceneError> {
        self.ground.validate()?;
        if self.props.len() > MAX_PROPS {
            return Err(SceneError::TooManyProps(self.props.len()));
        }
        for prop in &self.props {
            self.mesh_index(&prop.mesh)?;
        }
        Ok(())
    }

    fn mesh_index(&self, name: &str) -> Result<usize, SceneError> {
        self.meshes
            .iter()
            .position(|m| m.name == name)
            .ok_or_else(|| SceneError::UnknownMesh(name.to_string()))
    }

    /// How many textures the scene can reference
    pub fn texture_count(&self) -> usize {
        let mesh_max = self.meshes
            .iter()
            .flat_map(|m| m.polys.iter())
            .filter_map(|p| match p.fill {
                Fill::Texture(id) => Some(id),
                Fill::Color(_) => None,
            })
            .max()
            .unwrap_or(0);
        mesh_max.max(self.ground.max_texture_id()) + 1
    }

    /// Rebuild the ground quads and the list of props in view.
    ///
    /// Props more than a few tiles outside the ground window are left out.
    pub fn assemble_view(&self, view_x: i32, view_z: i32, view: &mut SceneView) -> Result<(), SceneError> {
        self.ground.assemble(view_x, view_z, self.origin, &mut view.ground);
        view.props.clear();

        let tw = self.ground.tile_width;
        let td = self.ground.tile_depth;
        let min_x = self.origin.x - 3.0 * tw;
        let max_x = self.origin.x + (VIEW_WIDTH + 3) as f32 * tw;
        let min_z = self.origin.z - td;
        let max_z = self.origin.z + (VIEW_DEPTH + 3) as f32 * td;

        for prop in &self.props {
            let x = prop.position.x - view_x as f32 * tw + self.origin.x;
            let z = prop.position.z - view_z as f32 * td + self.origin.z;
            if x < min_x || x > max_x || z < min_z || z > max_z {
                continue;
            }

            let y = if prop.position.y != 0.0 {
                prop.position.y
            } else {
                let tile_x = (prop.position.x / tw).floor() as i64;
                let tile_z = (prop.position.z / td).floor() as i64;
                self.ground.height_at(tile_x, tile_z)
            };

            view.props.push(PropInstance {
                mesh: self.mesh_index(&prop.mesh)?,
                offset: Vec3::new(x, y, z),
            });
        }

        Ok(())
    }

    /// Draw an assembled view: the ground first, then the props
    pub fn draw_view(&self, view: &SceneView, renderer: &mut Renderer, textures: &[Texture]) -> Result<(), RasterError> {
        renderer.draw_polygons(view.ground.as_slice(), Vec3::ZERO, textures, true)?;

        for prop in &view.props {
            if let Some(mesh) = self.meshes.get(prop.mesh) {
                renderer.draw_polygons(&mesh.polys, prop.offset, textures, true)?;
            }
        }

        Ok(())
    }

    /// Built-in scene used when no scene file is configured.
    ///
    /// A winding road through rolling hills with a few posts along it, scaled
    /// for a camera at (0, 12800, 64).
    pub fn demo() -> Self {
        const WIDTH: usize = 64;
        const ROAD: u8 = 1;
        const GRASS: u8 = 2;
        const VERGE: u8 = 3;
        const SPECTATORS: u8 = 4;
        const CROWD: usize = 5;

        let mut ground = Ground::flat(WIDTH, GRASS);
        ground.tile_width = 2048.0;
        ground.tile_depth = 16.0;
        ground.billboard_height = 3000.0;
        ground.billboards.push(Billboard { tile: SPECTATORS, texture: CROWD, flat: false });

        for y in 0..WIDTH {
            for x in 0..WIDTH {
                let fx = x as f32;
                let fy = y as f32;
                let hills = (fx * 0.35).sin() * 1500.0 + (fy * 0.2).cos() * 800.0;
                ground.heights[x + y * WIDTH] = hills as i16;
            }

            let centre = 31 + ((y as f32 * 0.15).sin() * 4.0).round() as i64;
            for x in (centre - 1)..=(centre + 1) {
                ground.tiles[x as usize + y * WIDTH] = ROAD;
            }
            ground.tiles[(centre - 2) as usize + y * WIDTH] = VERGE;
            ground.tiles[(centre + 2) as usize + y * WIDTH] = VERGE;
            if y % 9 == 4 {
                ground.tiles[(centre + 4) as usize + y * WIDTH] = SPECTATORS;
            }
        }

        let post = Mesh {
            name: "post".to_string(),
            polys: vec![
                Polygon::quad(
                    [
                        Vertex::from_pos(0.0, -4000.0, 0.0),
                        Vertex::from_pos(400.0, -4000.0, 0.0),
                        Vertex::from_pos(400.0, 0.0, 0.0),
                        Vertex::from_pos(0.0, 0.0, 0.0),
                    ],
                    Fill::Color(31),
                ),
                Polygon::quad(
                    [
                        Vertex::from_pos(-600.0, -5200.0, 0.0),
                        Vertex::from_pos(1000.0, -5200.0, 0.0),
                        Vertex::from_pos(1000.0, -4000.0, 0.0),
                        Vertex::from_pos(-600.0, -4000.0, 0.0),
                    ],
                    Fill::Color(40),
                ),
            ],
            offset: Vec3::ZERO,
        };

        let props = (0..6)
            .map(|i| Prop {
                mesh: "post".to_string(),
                position: Vec3::new(24.0 * 2048.0, 0.0, (6 + i * 10) as f32 * 16.0),
            })
            .collect();

        Self {
            name: "Demo".to_string(),
            ground,
            // Centres the 23 tile window on the surface's middle column.
            origin: Vec3::new(160.0 - (VIEW_WIDTH as f32 * 2048.0) / 2.0, 0.0, 0.0),
            meshes: vec![post],
            props,
        }
    }
}

/// Load a scene from a RON file
pub fn load_scene<P: AsRef<Path>>(path: P) -> Result<Scene, SceneError> {
    let contents = fs::read_to_string(path)?;
    load_scene_from_str(&contents)
}

/// Save a scene to a RON file
pub fn save_scene<P: AsRef<Path>>(scene: &Scene, path: P) -> Result<(), SceneError> {
    let config = ron::ser::PrettyConfig::new()
        .depth_limit(4)
        .indentor("  ".to_string());

    let contents = ron::ser::to_string_pretty(scene, config)?;
    fs::write(path, contents)?;
    Ok(())
}

/// Load a scene from a RON string (for embedded scenes or testing)
pub fn load_scene_from_str(s: &str) -> Result<Scene, SceneError> {
    let scene: Scene = ron::from_str(s)?;
    scene.validate()?;
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::{Camera, RasterSettings, HEIGHT, WIDTH};

    fn small_scene() -> Scene {
        let post = Mesh {
            name: "post".to_string(),
            polys: vec![Polygon::quad(
                [
                    Vertex::from_pos(0.0, -10.0, 0.0),
                    Vertex::from_pos(4.0, -10.0, 0.0),
                    Vertex::from_pos(4.0, 0.0, 0.0),
                    Vertex::from_pos(0.0, 0.0, 0.0),
                ],
                Fill::Color(5),
            )],
            offset: Vec3::ZERO,
        };
        Scene {
            name: "Small".to_string(),
            ground: Ground::flat(32, 1),
            origin: Vec3::ZERO,
            meshes: vec![post],
            props: vec![Prop { mesh: "post".to_string(), position: Vec3::new(256.0, 0.0, 640.0) }],
        }
    }

    #[test]
    fn test_ron_round_trip() {
        let scene = small_scene();
        let text = ron::ser::to_string_pretty(&scene, ron::ser::PrettyConfig::new()).unwrap();
        let loaded = load_scene_from_str(&text).unwrap();
        assert_eq!(loaded, scene);
    }

    #[test]
    fn test_defaults_fill_in_missing_fields() {
        let text = "(ground: (width: 1, heights: [0], tiles: [3]))";
        let scene = load_scene_from_str(text).unwrap();
        assert_eq!(scene.ground.tile_width, 128.0);
        assert!(scene.props.is_empty());
        assert_eq!(scene.texture_count(), 4);
    }

    #[test]
    fn test_unknown_mesh_is_rejected() {
        let mut scene = small_scene();
        scene.props[0].mesh = "tree".to_string();
        assert!(matches!(scene.validate(), Err(SceneError::UnknownMesh(_))));
    }

    #[test]
    fn test_too_many_props() {
        let mut scene = small_scene();
        let prop = scene.props[0].clone();
        scene.props = vec![prop; MAX_PROPS + 1];
        assert!(matches!(scene.validate(), Err(SceneError::TooManyProps(15))));
    }

    #[test]
    fn test_props_follow_the_view() {
        let scene = small_scene();
        let mut view = SceneView::new();

        scene.assemble_view(0, 0, &mut view).unwrap();
        assert_eq!(view.props.count(), 1);
        assert_eq!(view.props.at(0).offset, Vec3::new(256.0, 0.0, 640.0));

        scene.assemble_view(1, 2, &mut view).unwrap();
        assert_eq!(view.props.count(), 1);
        assert_eq!(view.props.at(0).offset, Vec3::new(128.0, 0.0, 384.0));
    }

    #[test]
    fn test_props_outside_the_window_are_skipped() {
        let mut scene = small_scene();
        scene.props[0].position = Vec3::new(256.0, 0.0, 128.0 * 30.0);
        let mut view = SceneView::new();
        scene.assemble_view(0, 0, &mut view).unwrap();
        assert!(view.props.is_empty());
    }

    #[test]
    fn test_prop_snaps_to_ground() {
        let mut scene = small_scene();
        scene.ground.heights[2 + 5 * 32] = 30;
        let mut view = SceneView::new();
        scene.assemble_view(0, 0, &mut view).unwrap();
        assert_eq!(view.props.at(0).offset.y, -30.0);

        scene.props[0].position.y = -7.0;
        scene.assemble_view(0, 0, &mut view).unwrap();
        assert_eq!(view.props.at(0).offset.y, -7.0);
    }

    #[test]
    fn test_staging_keeps_its_capacity() {
        let scene = small_scene();
        let mut view = SceneView::new();
        let ground_capacity = view.ground.capacity();
        let prop_capacity = view.props.capacity();

        for frame in 0..3 {
            scene.assemble_view(frame, frame, &mut view).unwrap();
        }
        assert_eq!(view.ground.capacity(), ground_capacity);
        assert_eq!(view.props.capacity(), prop_capacity);
    }

    #[test]
    fn test_demo_scene_is_valid() {
        let scene = Scene::demo();
        assert!(scene.validate().is_ok());
        assert!(scene.texture_count() >= 6);
    }

    #[test]
    fn test_demo_scene_draws_something() {
        let scene = Scene::demo();
        let textures: Vec<Texture> = (0..scene.texture_count())
            .map(|i| Texture::checkerboard(16, 16, 32 + i as u8, 64 + i as u8))
            .collect();
        let camera = Camera::new(Vec3::new(0.0, 12800.0, 64.0));
        let mut renderer = Renderer::new(WIDTH, HEIGHT, camera, RasterSettings::default());
        let mut view = SceneView::new();

        scene.assemble_view(20, 0, &mut view).unwrap();
        scene.draw_view(&view, &mut renderer, &textures).unwrap();

        assert!(renderer.stats.polys_drawn > 0);
        assert!(renderer.surface.pixels().iter().any(|&p| p != 0));
    }
}
