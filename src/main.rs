//! Rally Raster frame driver
//!
//! Loads the config, palette, textures and scene, then redraws the ground
//! view every frame.
//!
//! Keys: arrows scroll over the track, W/S raise and lower the camera,
//! F5 saves the scene, F6 saves the config, Escape quits.

use std::path::PathBuf;

use macroquad::prelude::*;
use rally_raster::config::Config;
use rally_raster::present::Presenter;
use rally_raster::rasterizer::{Palette, Renderer, Texture, Vec3};
use rally_raster::world::{load_scene, save_scene, Scene, SceneView};
use rally_raster::VERSION;

/// Camera height change per frame while W/S is held
const CAMERA_STEP: f32 = 64.0;

const SAVED_SCENE: &str = "saved_scene.ron";

fn config_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.ron"))
}

fn load_config() -> Config {
    let path = config_path();
    match Config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("Failed to load {}: {}, using defaults", path.display(), e);
            Config::default()
        }
    }
}

fn window_conf() -> Conf {
    let config = load_config();
    Conf {
        window_title: format!("Rally Raster v{}", VERSION),
        window_width: (config.width as u32 * config.scale) as i32,
        window_height: (config.height as u32 * config.scale) as i32,
        window_resizable: true,
        ..Default::default()
    }
}

fn load_palette(config: &Config) -> Palette {
    let Some(path) = &config.palette else {
        return Palette::fallback();
    };

    match Palette::from_file(path) {
        Ok(palette) => {
            log::info!("Loaded palette {} ({} colors)", path.display(), palette.len());
            palette
        }
        Err(e) => {
            log::warn!("Failed to load palette {}: {}, using the built-in one", path.display(), e);
            Palette::fallback()
        }
    }
}

fn load_scene_or_demo(config: &Config) -> Scene {
    let Some(path) = &config.scene else {
        return Scene::demo();
    };

    match load_scene(path) {
        Ok(scene) => {
            log::info!("Loaded scene '{}' with {} props", scene.name, scene.props.len());
            scene
        }
        Err(e) => {
            log::warn!("Failed to load scene {}: {}, using the demo scene", path.display(), e);
            Scene::demo()
        }
    }
}

/// PNG textures first, then the tile atlas, then checkerboards for any id
/// the scene uses that's still missing.
fn load_textures(config: &Config, palette: &Palette, needed: usize) -> Vec<Texture> {
    let mut textures = Texture::load_directory(&config.textures, palette, config.alpha_test);

    if let Some(path) = &config.atlas {
        match std::fs::read(path) {
            Ok(bytes) => {
                let tiles = Texture::from_tile_atlas(&bytes, config.alpha_test);
                log::info!("Loaded {} tiles from {}", tiles.len(), path.display());
                textures.extend(tiles);
            }
            Err(e) => log::warn!("Failed to read atlas {}: {}", path.display(), e),
        }
    }

    if textures.len() < needed {
        log::warn!("{} of {} textures missing, using checkerboards", needed - textures.len(), needed);
        let colors = palette.len().max(2);
        for id in textures.len()..needed {
            let light = (id * 7 % colors).max(1) as u8;
            let dark = (id * 13 % colors).max(1) as u8;
            textures.push(Texture::checkerboard(16, 16, light, dark).with_name(&format!("generated{:03}", id)));
        }
    }

    textures
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    println!("=== Rally Raster ===");

    let config = load_config();
    let palette = load_palette(&config);
    let scene = load_scene_or_demo(&config);
    let textures = load_textures(&config, &palette, scene.texture_count());

    println!("Surface: {}x{}, {} textures, scene '{}'", config.width, config.height, textures.len(), scene.name);

    let mut renderer = Renderer::new(config.width, config.height, config.camera(), config.raster_settings());
    let mut presenter = Presenter::new(config.width, config.height);
    let mut view = SceneView::new();

    let max_view = scene.ground.width as i32;
    let mut view_x = config.view_x;
    let mut view_z = config.view_z;

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }
        if is_key_pressed(KeyCode::Left) {
            view_x -= config.scroll_step;
        }
        if is_key_pressed(KeyCode::Right) {
            view_x += config.scroll_step;
        }
        if is_key_pressed(KeyCode::Up) {
            view_z += config.scroll_step;
        }
        if is_key_pressed(KeyCode::Down) {
            view_z -= config.scroll_step;
        }
        view_x = view_x.clamp(0, max_view);
        view_z = view_z.clamp(0, max_view);

        if is_key_down(KeyCode::W) {
            renderer.camera.translate(Vec3::new(0.0, -CAMERA_STEP, 0.0));
        }
        if is_key_down(KeyCode::S) {
            renderer.camera.translate(Vec3::new(0.0, CAMERA_STEP, 0.0));
        }

        if is_key_pressed(KeyCode::F5) {
            match save_scene(&scene, SAVED_SCENE) {
                Ok(()) => log::info!("Saved scene to {}", SAVED_SCENE),
                Err(e) => log::error!("Failed to save scene: {}", e),
            }
        }
        if is_key_pressed(KeyCode::F6) {
            let mut current = config.clone();
            current.camera = renderer.camera.position;
            current.view_x = view_x;
            current.view_z = view_z;
            let path = config_path();
            match current.save(&path) {
                Ok(()) => log::info!("Saved config to {}", path.display()),
                Err(e) => log::error!("Failed to save config: {}", e),
            }
        }

        renderer.clear_buffers();

        match scene.assemble_view(view_x, view_z, &mut view) {
            Ok(()) => {
                if let Err(e) = scene.draw_view(&view, &mut renderer, &textures) {
                    log::error!("Draw failed: {}", e);
                }
            }
            Err(e) => log::error!("Scene assembly failed: {}", e),
        }

        log::debug!(
            "view ({}, {}): {} meshes, {} polys drawn, {} culled",
            view_x,
            view_z,
            renderer.stats.meshes,
            renderer.stats.polys_drawn,
            renderer.stats.polys_culled
        );

        presenter.present(&renderer.surface, &palette);
        next_frame().await;
    }
}
