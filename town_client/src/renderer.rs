//! Camera and scene renderer.
//!
//! Draws one frame through a [`RenderBackend`]. The camera is centered on
//! the local player; world coordinates map to screen pixels as
//! `(world - camera) * tile_size`. Anything whose image has not loaded yet
//! is drawn with a flat-color fallback, so the renderer never waits.

use town_shared::{
    config::GameConfig,
    math::{Rect, Vec2},
    model::{Direction, Entity, Scene},
    render::{Color, RenderBackend, TextStyle},
};

use crate::{
    assets::{character_asset, floor_asset, item_asset},
    bubble::draw_bubble,
    collision::ImageWidths,
    overlay::MessageOverlay,
    player::LocalPlayer,
    sync::EntityTables,
};

/// Side of one sprite-sheet cell in source pixels.
pub const SPRITE_CELL: f32 = 32.0;
/// Label baseline offset above the sprite.
pub const LABEL_OFFSET: f32 = 5.0;
/// Bubble anchor offset above the sprite.
pub const BUBBLE_OFFSET: f32 = 10.0;

const LABEL_PX: f32 = 12.0;

pub const FLOOR_FALLBACK: Color = Color::rgb(0x2a, 0x4a, 0x2a);
pub const GRID_STROKE: Color = Color::rgb(0x1a, 0x3a, 0x1a);
pub const ITEM_FALLBACK: Color = Color::rgb(0x8b, 0x45, 0x13);
pub const ITEM_BORDER: Color = Color::rgb(0x65, 0x43, 0x21);
pub const ENTITY_FALLBACK: Color = Color::rgb(0xff, 0x66, 0x00);
pub const ENTITY_LABEL: Color = Color::rgb(0x00, 0xff, 0x88);
pub const SELF_FALLBACK: Color = Color::rgb(0x00, 0xff, 0x88);
pub const SELF_LABEL: Color = Color::rgb(0x00, 0xff, 0xff);

/// Maps tile-space coordinates to canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World coordinate of the canvas' top-left corner.
    pub origin: Vec2,
    pub tile_size: f32,
    pub view_width: u32,
    pub view_height: u32,
}

impl Camera {
    /// Centers the view on `focus`.
    pub fn centered_on(focus: Vec2, config: &GameConfig) -> Self {
        let (vw, vh) = (config.view_width as f32, config.view_height as f32);
        Self {
            origin: Vec2::new(focus.x - vw / 2.0, focus.y - vh / 2.0),
            tile_size: config.tile_size,
            view_width: config.view_width,
            view_height: config.view_height,
        }
    }

    pub fn to_screen(&self, world: Vec2) -> Vec2 {
        world.sub(self.origin).scale(self.tile_size)
    }

    /// Screen position of the viewport center, where the local player is drawn.
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.view_width as f32 / 2.0 * self.tile_size,
            self.view_height as f32 / 2.0 * self.tile_size,
        )
    }

    /// True unless a tile-sized box at `screen` lies fully outside the canvas.
    pub fn is_visible(&self, screen: Vec2, canvas: (f32, f32)) -> bool {
        let t = self.tile_size;
        screen.x > -t && screen.x < canvas.0 && screen.y > -t && screen.y < canvas.1
    }
}

/// Source cell of a walk-cycle frame in a 3×4 sprite sheet.
pub fn sprite_cell(direction: Direction, frame: u32) -> Rect {
    Rect::new(
        (frame % 3) as f32 * SPRITE_CELL,
        direction.sprite_row() as f32 * SPRITE_CELL,
        SPRITE_CELL,
        SPRITE_CELL,
    )
}

/// Everything one frame reads.
pub struct FrameView<'a> {
    pub config: &'a GameConfig,
    pub scene: Option<&'a Scene>,
    pub local: &'a LocalPlayer,
    /// Direction the local sprite faces this frame.
    pub facing: Direction,
    pub entities: &'a EntityTables,
    pub overlay: &'a MessageOverlay,
    pub images: &'a dyn ImageWidths,
}

impl FrameView<'_> {
    fn loaded(&self, asset: &str) -> bool {
        self.images.image_width(asset).is_some()
    }
}

/// Draws a full frame. Without a scene only the frame bracket is emitted.
pub fn draw_frame(backend: &mut dyn RenderBackend, view: &FrameView<'_>) {
    backend.begin_frame();
    if let Some(scene) = view.scene {
        let camera = Camera::centered_on(view.local.position.point(), view.config);
        draw_floor(backend, view, scene, &camera);
        draw_items(backend, view, scene, &camera);
        draw_entities(backend, view, &camera);
        draw_local_player(backend, view, &camera);
    }
    backend.end_frame();
}

fn draw_floor(backend: &mut dyn RenderBackend, view: &FrameView<'_>, scene: &Scene, camera: &Camera) {
    let t = camera.tile_size;
    let floor = scene
        .floor_texture
        .as_deref()
        .map(floor_asset)
        .filter(|a| view.loaded(a));

    let Some(floor) = floor else {
        let (w, h) = backend.size();
        backend.fill_rect(Rect::new(0.0, 0.0, w, h), FLOOR_FALLBACK);
        for row in 0..=camera.view_height {
            let y = row as f32 * t;
            backend.line(Vec2::new(0.0, y), Vec2::new(w, y), GRID_STROKE);
        }
        for col in 0..=camera.view_width {
            let x = col as f32 * t;
            backend.line(Vec2::new(x, 0.0), Vec2::new(x, h), GRID_STROKE);
        }
        return;
    };

    for row in 0..camera.view_height {
        for col in 0..camera.view_width {
            let world_x = (camera.origin.x + col as f32).floor();
            let world_y = (camera.origin.y + row as f32).floor();
            if scene.contains(world_x, world_y) {
                backend.draw_image(
                    &floor,
                    None,
                    Rect::square(Vec2::new(col as f32 * t, row as f32 * t), t),
                );
            }
        }
    }
}

fn draw_items(backend: &mut dyn RenderBackend, view: &FrameView<'_>, scene: &Scene, camera: &Camera) {
    let canvas = backend.size();
    let t = camera.tile_size;
    for item in &scene.items {
        let screen = camera.to_screen(item.point());
        if !camera.is_visible(screen, canvas) {
            continue;
        }
        let image = item.image.as_deref().map(item_asset).filter(|a| view.loaded(a));
        match image {
            Some(asset) => {
                backend.draw_image(&asset, None, Rect::square(screen, item.size * t));
            }
            None => {
                let body = Rect::square(screen, t);
                backend.fill_rect(body, ITEM_FALLBACK);
                backend.stroke_rect(body, ITEM_BORDER, 1.0);
            }
        }
        if let Some(text) = view.overlay.text(&item.name) {
            draw_bubble(backend, text, bubble_anchor(screen, t));
        }
    }
}

fn draw_entities(backend: &mut dyn RenderBackend, view: &FrameView<'_>, camera: &Camera) {
    let local_scene = &view.local.position.scene;
    let tables = view.entities;
    let humans = tables
        .players
        .iter()
        .filter(|(id, _)| !view.local.is_self(id))
        .map(|(_, e)| e);
    let everyone = humans
        .chain(tables.ai_players.values())
        .chain(tables.ai_characters.values())
        .filter(|e| &e.position.scene == local_scene);

    let canvas = backend.size();
    for entity in everyone {
        let screen = camera.to_screen(entity.position.point());
        if camera.is_visible(screen, canvas) {
            draw_entity(backend, view, camera, entity, screen);
        }
    }
}

fn draw_entity(
    backend: &mut dyn RenderBackend,
    view: &FrameView<'_>,
    camera: &Camera,
    entity: &Entity,
    screen: Vec2,
) {
    let t = camera.tile_size;
    let sprite = entity.sprite.as_deref().map(character_asset).filter(|a| view.loaded(a));
    match sprite {
        Some(asset) => backend.draw_image(
            &asset,
            Some(sprite_cell(entity.direction, entity.animation_frame)),
            Rect::square(screen, t),
        ),
        None => backend.fill_circle(tile_center(screen, t), t / 3.0, ENTITY_FALLBACK),
    }

    let name = entity.display_name();
    backend.fill_text(
        name,
        label_anchor(screen, t),
        TextStyle::new(LABEL_PX, ENTITY_LABEL).centered(),
    );
    if let Some(text) = view.overlay.text(name) {
        draw_bubble(backend, text, bubble_anchor(screen, t));
    }
}

fn draw_local_player(backend: &mut dyn RenderBackend, view: &FrameView<'_>, camera: &Camera) {
    let t = camera.tile_size;
    let screen = camera.center();
    let local = view.local;
    let asset = character_asset(&local.sprite);
    if view.loaded(&asset) {
        backend.draw_image(
            &asset,
            Some(sprite_cell(view.facing, local.animation_frame)),
            Rect::square(screen, t),
        );
    } else {
        backend.fill_circle(tile_center(screen, t), t / 3.0, SELF_FALLBACK);
    }

    backend.fill_text(
        &local.nickname,
        label_anchor(screen, t),
        TextStyle::new(LABEL_PX, SELF_LABEL).bold().centered(),
    );
    if let Some(text) = view.overlay.text(&local.nickname) {
        draw_bubble(backend, text, bubble_anchor(screen, t));
    }
}

fn tile_center(screen: Vec2, t: f32) -> Vec2 {
    Vec2::new(screen.x + t / 2.0, screen.y + t / 2.0)
}

fn label_anchor(screen: Vec2, t: f32) -> Vec2 {
    Vec2::new(screen.x + t / 2.0, screen.y - LABEL_OFFSET)
}

fn bubble_anchor(screen: Vec2, t: f32) -> Vec2 {
    Vec2::new(screen.x + t / 2.0, screen.y - BUBBLE_OFFSET)
}
