//! Proximity interaction trigger.

use town_shared::{
    math::Vec2,
    model::{Item, Position, Scene},
    net::ClientEvent,
};

/// First item, in scene order, within `distance` of `at` on both axes.
///
/// Scene order decides, not nearness: a closer item later in the list loses
/// to any earlier item that qualifies.
pub fn find_target<'a>(scene: &'a Scene, at: Vec2, distance: f32) -> Option<&'a Item> {
    scene
        .items
        .iter()
        .find(|item| (item.x - at.x).abs() <= distance && (item.y - at.y).abs() <= distance)
}

/// Builds the interaction request for the first qualifying item, if any.
pub fn interaction_request(
    scene: &Scene,
    position: &Position,
    user_id: &str,
    distance: f32,
) -> Option<ClientEvent> {
    let item = find_target(scene, position.point(), distance)?;
    Some(ClientEvent::InteractItem {
        user_id: user_id.to_string(),
        item: item.clone(),
        scene: position.scene.clone(),
    })
}
