//! Movement resolution against scene bounds and obstacle items.
//!
//! Collision is a square-vs-square test in tile space: the player is a box
//! of half-extent [`PLAYER_HALF_EXTENT`], each obstacle a box sized from its
//! image. Boxes collide when they overlap on both axes.

use town_shared::{
    math::Vec2,
    model::{Item, Scene},
};

use crate::{
    assets::{item_asset, AssetCache},
    input::MoveIntent,
};

/// Tiles moved per tick along each axis.
pub const STEP: f32 = 0.1;
/// Half the side of the player's collision box, in tiles.
pub const PLAYER_HALF_EXTENT: f32 = 0.3;
/// Share of an obstacle's drawn size that blocks movement.
pub const COLLISION_SCALE: f32 = 0.7;

/// Widths of images that have finished loading.
pub trait ImageWidths {
    fn image_width(&self, asset: &str) -> Option<u32>;
}

impl ImageWidths for AssetCache {
    fn image_width(&self, asset: &str) -> Option<u32> {
        self.get(asset)
            .filter(|t| t.is_drawable())
            .map(|t| t.width())
    }
}

/// An obstacle's collision box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub center: Vec2,
    /// Full side length in tiles.
    pub extent: f32,
}

impl Obstacle {
    /// Sizes an obstacle from its loaded image, or its nominal size when the
    /// image is not available yet.
    pub fn from_item(item: &Item, images: &dyn ImageWidths, tile_size: f32) -> Self {
        let loaded_width = item
            .image
            .as_deref()
            .and_then(|image| images.image_width(&item_asset(image)));
        let extent = match loaded_width {
            Some(w) => (w as f32 / tile_size) * item.size * COLLISION_SCALE,
            None => item.size,
        };
        Self {
            center: item.point(),
            extent,
        }
    }

    /// Axis distance below which the player box overlaps this one.
    pub fn threshold(&self) -> f32 {
        self.extent / 2.0 + PLAYER_HALF_EXTENT
    }

    pub fn blocks(&self, point: Vec2) -> bool {
        let t = self.threshold();
        (point.x - self.center.x).abs() < t && (point.y - self.center.y).abs() < t
    }
}

/// Collision boxes of every obstacle item in `scene`, in item order.
pub fn obstacles<'a>(
    scene: &'a Scene,
    images: &'a dyn ImageWidths,
    tile_size: f32,
) -> impl Iterator<Item = Obstacle> + 'a {
    scene
        .items
        .iter()
        .filter(|item| item.obstacle)
        .map(move |item| Obstacle::from_item(item, images, tile_size))
}

/// True when a player centered at `point` overlaps any obstacle.
pub fn collides(point: Vec2, obstacles: impl IntoIterator<Item = Obstacle>) -> bool {
    obstacles.into_iter().any(|o| o.blocks(point))
}

/// Applies one tick of `intent` starting at `from`.
///
/// Each axis is dropped if it would leave the scene. The combined candidate
/// point is then tested once; a collision drops both axes.
pub fn resolve_step(
    from: Vec2,
    intent: &MoveIntent,
    scene: &Scene,
    images: &dyn ImageWidths,
    tile_size: f32,
) -> Vec2 {
    let candidate = Vec2::new(from.x + intent.dx * STEP, from.y + intent.dy * STEP);

    let mut move_x = scene.contains_x(candidate.x);
    let mut move_y = scene.contains_y(candidate.y);

    if (move_x || move_y) && collides(candidate, obstacles(scene, images, tile_size)) {
        move_x = false;
        move_y = false;
    }

    Vec2::new(
        if move_x { candidate.x } else { from.x },
        if move_y { candidate.y } else { from.y },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use town_shared::{math::Rect, model::Direction};

    struct Widths(HashMap<String, u32>);

    impl ImageWidths for Widths {
        fn image_width(&self, asset: &str) -> Option<u32> {
            self.0.get(asset).copied()
        }
    }

    fn no_images() -> Widths {
        Widths(HashMap::new())
    }

    fn item(x: f32, y: f32, size: f32, obstacle: bool) -> Item {
        Item {
            x,
            y,
            image: Some("rock.png".into()),
            size,
            obstacle,
            name: "rock".into(),
            interaction: None,
        }
    }

    fn scene(items: Vec<Item>) -> Scene {
        Scene {
            name: "campus".into(),
            width: 10.0,
            height: 10.0,
            floor_texture: None,
            items,
            spawn_points: Vec::new(),
        }
    }

    fn right() -> MoveIntent {
        MoveIntent {
            dx: 1.0,
            dy: 0.0,
            direction: Direction::Right,
        }
    }

    #[test]
    fn walking_into_obstacle_is_blocked() {
        let s = scene(vec![item(5.0, 5.0, 1.0, true)]);
        let from = Vec2::new(4.95, 5.0);
        let to = resolve_step(from, &right(), &s, &no_images(), 64.0);
        assert_eq!(to, from);
    }

    #[test]
    fn non_obstacle_items_do_not_block() {
        let s = scene(vec![item(5.0, 5.0, 1.0, false)]);
        let to = resolve_step(Vec2::new(4.95, 5.0), &right(), &s, &no_images(), 64.0);
        assert!((to.x - 5.05).abs() < 1e-5);
    }

    #[test]
    fn loaded_image_shrinks_collision_box() {
        let it = item(5.0, 5.0, 1.0, true);
        let nominal = Obstacle::from_item(&it, &no_images(), 64.0);
        assert_eq!(nominal.extent, 1.0);

        let widths = Widths(HashMap::from([("items/rock.png".to_string(), 64)]));
        let sized = Obstacle::from_item(&it, &widths, 64.0);
        assert!((sized.extent - 0.7).abs() < 1e-6);
        assert!((sized.threshold() - 0.65).abs() < 1e-6);

        // 0.7 away: blocked by the nominal box, clear of the image-sized one.
        let p = Vec2::new(5.7, 5.0);
        assert!(nominal.blocks(p));
        assert!(!sized.blocks(p));
    }

    #[test]
    fn collides_matches_box_overlap() {
        let obstacles = [
            Obstacle {
                center: Vec2::new(3.0, 3.0),
                extent: 1.0,
            },
            Obstacle {
                center: Vec2::new(6.5, 2.0),
                extent: 2.0,
            },
        ];
        let mut y = 0.05;
        while y < 8.0 {
            let mut x = 0.05;
            while x < 10.0 {
                let p = Vec2::new(x, y);
                let player = Rect::new(
                    x - PLAYER_HALF_EXTENT,
                    y - PLAYER_HALF_EXTENT,
                    PLAYER_HALF_EXTENT * 2.0,
                    PLAYER_HALF_EXTENT * 2.0,
                );
                let overlap = obstacles.iter().any(|o| {
                    let half = o.extent / 2.0;
                    player.overlaps(&Rect::new(
                        o.center.x - half,
                        o.center.y - half,
                        o.extent,
                        o.extent,
                    ))
                });
                assert_eq!(collides(p, obstacles), overlap, "at {p:?}");
                x += 0.13;
            }
            y += 0.17;
        }
    }

    #[test]
    fn diagonal_step_is_tested_as_one_point() {
        // Moving right alone or down alone is clear; the diagonal corner is not.
        let s = scene(vec![item(5.0, 5.0, 1.0, true)]);
        let from = Vec2::new(4.15, 4.15);
        let diag = MoveIntent {
            dx: 1.0,
            dy: 1.0,
            direction: Direction::Right,
        };
        assert!(!collides(Vec2::new(4.25, 4.15), obstacles(&s, &no_images(), 64.0)));
        assert!(!collides(Vec2::new(4.15, 4.25), obstacles(&s, &no_images(), 64.0)));
        let to = resolve_step(from, &diag, &s, &no_images(), 64.0);
        assert_eq!(to, from);
    }

    #[test]
    fn out_of_bounds_axis_is_dropped_independently() {
        let s = scene(Vec::new());
        let from = Vec2::new(9.95, 5.0);
        let diag = MoveIntent {
            dx: 1.0,
            dy: 1.0,
            direction: Direction::Right,
        };
        let to = resolve_step(from, &diag, &s, &no_images(), 64.0);
        assert_eq!(to.x, 9.95);
        assert!((to.y - 5.1).abs() < 1e-5);

        let to = resolve_step(
            Vec2::new(0.05, 0.05),
            &MoveIntent {
                dx: -1.0,
                dy: -1.0,
                direction: Direction::Left,
            },
            &s,
            &no_images(),
            64.0,
        );
        assert_eq!(to, Vec2::new(0.05, 0.05));
    }
}
