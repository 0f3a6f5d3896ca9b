use eframe::egui::{Rect, Vec2, vec2};

use crate::graph::body_at;

/// Pushes a body of `size` at `candidate` out of every rectangle in
/// `obstacles` it overlaps, one obstacle at a time.
///
/// Each overlap is resolved along the axis where the overlap is greater,
/// away from the obstacle's centre. Coincident centres push towards +x/+y.
pub(crate) fn resolve_collisions<I>(candidate: Vec2, size: Vec2, obstacles: I) -> Vec2
where
    I: IntoIterator<Item = Rect>,
{
    let mut position = candidate;
    for obstacle in obstacles {
        let body = body_at(position, size);
        if !body.intersects(obstacle) {
            continue;
        }

        let overlap = body.intersect(obstacle);
        let (overlap_x, overlap_y) = (overlap.width(), overlap.height());
        if overlap_x <= 0.0 || overlap_y <= 0.0 {
            continue;
        }

        let away = position - obstacle.center().to_vec2();
        let sign = |value: f32| if value < 0.0 { -1.0 } else { 1.0 };
        let shift = if overlap_x >= overlap_y {
            vec2(sign(away.x) * overlap_x, 0.0)
        } else {
            vec2(0.0, sign(away.y) * overlap_y)
        };
        position += shift;
    }
    position
}
