use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

pub(super) const CANVAS_FILL: Color32 = Color32::from_rgb(19, 23, 29);
pub(super) const SELECTED_COLOR: Color32 = Color32::from_rgb(245, 206, 93);
pub(super) const GENERIC_HIGHLIGHT: Color32 = Color32::from_rgb(103, 196, 255);

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * amount) as u8;
    Color32::from_rgba_unmultiplied(
        mix(base.r(), overlay.r()),
        mix(base.g(), overlay.g()),
        mix(base.b(), overlay.b()),
        mix(base.a(), overlay.a()),
    )
}

pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

/// Grid behind the canvas plus the outline of the layout frame.
pub(super) fn draw_background(painter: &Painter, rect: Rect, frame: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(14, 17, 22));

    let frame_min = world_to_screen(rect, pan, zoom, frame.min.to_vec2());
    let frame_max = world_to_screen(rect, pan, zoom, frame.max.to_vec2());
    let frame_rect = Rect::from_min_max(frame_min, frame_max);
    painter.rect_filled(frame_rect, 0.0, CANVAS_FILL);

    let step = (56.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let grid = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));
    let visible = frame_rect.intersect(rect);

    let mut x = frame_rect.left();
    while x < visible.right() {
        if x >= visible.left() {
            painter.line_segment(
                [Pos2::new(x, visible.top()), Pos2::new(x, visible.bottom())],
                grid,
            );
        }
        x += step;
    }

    let mut y = frame_rect.top();
    while y < visible.bottom() {
        if y >= visible.top() {
            painter.line_segment(
                [Pos2::new(visible.left(), y), Pos2::new(visible.right(), y)],
                grid,
            );
        }
        y += step;
    }

    outline(
        painter,
        frame_rect,
        Stroke::new(1.5, Color32::from_rgb(72, 84, 98)),
    );
}

pub(super) fn outline(painter: &Painter, rect: Rect, stroke: Stroke) {
    let corners = [
        rect.left_top(),
        rect.right_top(),
        rect.right_bottom(),
        rect.left_bottom(),
    ];
    for index in 0..corners.len() {
        painter.line_segment([corners[index], corners[(index + 1) % corners.len()]], stroke);
    }
}

pub(super) fn edge_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    Rect::from_two_pos(start, end).expand(padding).intersects(rect)
}

pub(super) fn world_to_screen(rect: Rect, pan: Vec2, zoom: f32, world: Vec2) -> Pos2 {
    rect.center() + pan + world * zoom
}

pub(super) fn screen_to_world(rect: Rect, pan: Vec2, zoom: f32, screen: Pos2) -> Vec2 {
    (screen - rect.center() - pan) / zoom
}

/// Fill colour by relevance quartile; quartile 0 is the brightest.
pub(super) fn quartile_color(quartile: u8) -> Color32 {
    match quartile {
        0 => Color32::from_rgb(241, 146, 94),
        1 => Color32::from_rgb(205, 128, 110),
        2 => Color32::from_rgb(140, 118, 140),
        _ => Color32::from_rgb(88, 104, 138),
    }
}

/// Colour for a search hue in degrees.
pub(super) fn hue_color(hue: f32) -> Color32 {
    let (saturation, value) = (0.62_f32, 0.96_f32);
    let sector = hue.rem_euclid(360.0) / 60.0;
    let chroma = value * saturation;
    let x = chroma * (1.0 - (sector.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match sector as u8 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = value - chroma;
    let channel = |c: f32| ((c + m) * 255.0).round() as u8;
    Color32::from_rgb(channel(r), channel(g), channel(b))
}

pub(super) fn edge_width(strength: f64, zoom: f32) -> f32 {
    let base = 0.7 + (strength.max(0.0).ln_1p() as f32) * 1.4;
    (base * zoom.sqrt()).clamp(0.5, 7.0)
}
