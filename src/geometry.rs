/// Pure geometry for overlay positioning and viewer zoom/pan
///
/// Everything in this module is a stateless computation: panel clamping
/// against the viewport, minimum-zoom derivation from natural image size,
/// pointer-anchored zoom, and soft pan-offset clamping. The overlay manager
/// and image viewer call into these; nothing here touches UI state.

use cgmath::Vector2;

/// Gap kept between a floating panel and either viewport edge
pub const VIEWPORT_MARGIN: f32 = 8.0;

/// Fraction of the container allowed as pan overscroll past the strict edges
pub const SLACK_FRACTION: f32 = 0.10;

/// Tolerance when deciding whether a scaled image "fits" its container.
/// Absorbs layout rounding so a 900.4px image in a 900px box still centers.
pub const FIT_TOLERANCE: f32 = 1.0;

/// Clamp a panel's left offset so its box stays inside the viewport.
///
/// `anchor_left` is the trigger's left edge in viewport coordinates; the
/// result is document-space (translated by `scroll_x`) and guaranteed to keep
/// the panel within `[margin, viewport - panel - margin]`.
pub fn clamp_to_viewport(
    anchor_left: f32,
    panel_width: f32,
    viewport_width: f32,
    scroll_x: f32,
) -> f32 {
    let preferred = anchor_left + scroll_x;
    let min_left = VIEWPORT_MARGIN + scroll_x;
    // A panel wider than the viewport pins to the left margin rather than
    // overflowing on the right.
    let span = viewport_width.max(panel_width);
    let max_left = scroll_x + span - panel_width - VIEWPORT_MARGIN;
    preferred.clamp(min_left, max_left.max(min_left))
}

/// Scale at which the image exactly fits inside the container (contain)
pub fn fit_scale(natural: Vector2<f32>, container: Vector2<f32>) -> f32 {
    let nw = natural.x.max(1.0);
    let nh = natural.y.max(1.0);
    (container.x / nw).min(container.y / nh)
}

/// Scale at which the image fills the container on both axes (cover),
/// floored at 0.1 so degenerate dimensions never collapse the transform
fn fill_scale(natural: Vector2<f32>, container: Vector2<f32>) -> f32 {
    let nw = natural.x.max(1.0);
    let nh = natural.y.max(1.0);
    (container.x / nw).max(container.y / nh).max(0.1)
}

/// Minimum zoom for an image: the cover scale, capped at 1.0 so the user can
/// always zoom back out to natural size.
pub fn min_zoom_for(natural: Vector2<f32>, container: Vector2<f32>) -> f32 {
    fill_scale(natural, container).min(1.0)
}

/// Offset that centers the scaled image inside the container
pub fn centered_offset(
    natural: Vector2<f32>,
    zoom: f32,
    container: Vector2<f32>,
) -> Vector2<f32> {
    Vector2::new(
        (container.x - natural.x * zoom) / 2.0,
        (container.y - natural.y * zoom) / 2.0,
    )
}

/// Whether the image at this zoom fits the container on both axes
pub fn fits(natural: Vector2<f32>, zoom: f32, container: Vector2<f32>) -> bool {
    natural.x * zoom <= container.x + FIT_TOLERANCE
        && natural.y * zoom <= container.y + FIT_TOLERANCE
}

/// Pointer-anchored zoom step.
///
/// Returns the new `(zoom, offset)` pair, or `None` when the clamped zoom is
/// unchanged (already at a bound). The content-space point under `point`
/// before the scale change stays under `point` afterwards, so zoom reads as
/// anchored to the cursor rather than the image center.
pub fn zoom_about_point(
    zoom: f32,
    offset: Vector2<f32>,
    point: Vector2<f32>,
    factor: f32,
    min_zoom: f32,
    max_zoom: f32,
) -> Option<(f32, Vector2<f32>)> {
    let new_zoom = (zoom * factor).clamp(min_zoom, max_zoom);
    if new_zoom == zoom {
        return None;
    }
    let content = (point - offset) / zoom;
    let new_offset = point - content * new_zoom;
    Some((new_zoom, new_offset))
}

/// Soft clamp for pan offsets, axis by axis.
///
/// When the scaled image fits an axis the offset is pulled toward the
/// centered position but may drift up to `slack` away from it; when it
/// overflows, the edges are kept within `slack` of fully covering the
/// container. Either way the image can never be panned entirely out of view.
pub fn clamp_offsets(
    natural: Vector2<f32>,
    zoom: f32,
    container: Vector2<f32>,
    offset: Vector2<f32>,
    slack_fraction: f32,
) -> Vector2<f32> {
    Vector2::new(
        clamp_axis(natural.x * zoom, container.x, offset.x, slack_fraction),
        clamp_axis(natural.y * zoom, container.y, offset.y, slack_fraction),
    )
}

fn clamp_axis(scaled: f32, container: f32, offset: f32, slack_fraction: f32) -> f32 {
    let slack = container * slack_fraction;
    if scaled <= container {
        let center = (container - scaled) / 2.0;
        offset.clamp(center - slack, center + slack)
    } else {
        let min_offset = (container - scaled).min(0.0) - slack;
        let max_offset = slack;
        offset.clamp(min_offset, max_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec2(x: f32, y: f32) -> Vector2<f32> {
        Vector2::new(x, y)
    }

    #[test]
    fn test_clamp_to_viewport_keeps_margins() {
        // Anchors across the whole viewport, including far past either edge
        let viewport = 1280.0;
        let panel = 420.0;
        for anchor in [-500.0, -8.0, 0.0, 100.0, 860.0, 1200.0, 2000.0] {
            let left = clamp_to_viewport(anchor, panel, viewport, 0.0);
            assert!(left >= VIEWPORT_MARGIN, "left {} under margin", left);
            assert!(
                left + panel <= viewport - VIEWPORT_MARGIN,
                "right edge {} past viewport",
                left + panel
            );
        }
    }

    #[test]
    fn test_clamp_to_viewport_translates_by_scroll() {
        let left = clamp_to_viewport(100.0, 420.0, 1280.0, 300.0);
        assert_eq!(left, 400.0);
    }

    #[test]
    fn test_clamp_to_viewport_oversized_panel_pins_left() {
        let left = clamp_to_viewport(600.0, 2000.0, 1280.0, 0.0);
        assert_eq!(left, VIEWPORT_MARGIN);
    }

    #[test]
    fn test_min_zoom_capped_at_natural_size() {
        // A tiny image in a huge container would need zoom > 1 to cover it;
        // the cap keeps natural size reachable
        let z = min_zoom_for(vec2(100.0, 100.0), vec2(900.0, 700.0));
        assert_eq!(z, 1.0);
    }

    #[test]
    fn test_min_zoom_is_cover_scale_for_large_images() {
        let z = min_zoom_for(vec2(1800.0, 1400.0), vec2(900.0, 700.0));
        assert!((z - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_min_zoom_floor() {
        let z = min_zoom_for(vec2(100_000.0, 100_000.0), vec2(900.0, 700.0));
        assert_eq!(z, 0.1);
    }

    #[test]
    fn test_zoom_about_point_no_op_at_bound() {
        let r = zoom_about_point(5.0, vec2(0.0, 0.0), vec2(10.0, 10.0), 1.5, 0.5, 5.0);
        assert!(r.is_none());
    }

    #[test]
    fn test_zoom_about_point_keeps_anchor_fixed() {
        let zoom = 1.0;
        let offset = vec2(-20.0, -30.0);
        let point = vec2(450.0, 350.0);
        let (new_zoom, new_offset) =
            zoom_about_point(zoom, offset, point, 2.0, 0.5, 5.0).unwrap();
        // The content point under the cursor must not move
        let before = (point - offset) / zoom;
        let after = (point - new_offset) / new_zoom;
        assert!((before.x - after.x).abs() < 1e-3);
        assert!((before.y - after.y).abs() < 1e-3);
    }

    #[test]
    fn test_zoom_in_then_reciprocal_out_restores_state() {
        let point = vec2(300.0, 200.0);
        let (z1, o1) =
            zoom_about_point(1.0, vec2(5.0, 5.0), point, 1.12, 0.5, 5.0).unwrap();
        let (z2, o2) = zoom_about_point(z1, o1, point, 1.0 / 1.12, 0.5, 5.0).unwrap();
        assert!((z2 - 1.0).abs() < 1e-4);
        assert!((o2.x - 5.0).abs() < 1e-2);
        assert!((o2.y - 5.0).abs() < 1e-2);
    }

    #[test]
    fn test_zoom_stays_bounded_over_sequences() {
        let mut zoom = 1.0;
        let mut offset = vec2(0.0, 0.0);
        let point = vec2(100.0, 100.0);
        for factor in [1.12, 1.12, 0.9, 3.0, 0.1, 1.12, 0.9, 10.0, 0.01] {
            if let Some((z, o)) = zoom_about_point(zoom, offset, point, factor, 0.5, 5.0) {
                zoom = z;
                offset = o;
            }
            assert!((0.5..=5.0).contains(&zoom), "zoom {} escaped bounds", zoom);
        }
    }

    #[test]
    fn test_clamp_offsets_centers_fitting_image_with_slack() {
        let natural = vec2(400.0, 300.0);
        let container = vec2(900.0, 700.0);
        let center = centered_offset(natural, 1.0, container);
        // Far from center: pulled back to within the slack band
        let clamped = clamp_offsets(natural, 1.0, container, vec2(500.0, -400.0), 0.10);
        assert!((clamped.x - (center.x + 90.0)).abs() < 1e-3);
        assert!((clamped.y - (center.y - 70.0)).abs() < 1e-3);
        // Inside the band: untouched
        let near = vec2(center.x + 10.0, center.y - 10.0);
        let kept = clamp_offsets(natural, 1.0, container, near, 0.10);
        assert_eq!(kept, near);
    }

    #[test]
    fn test_clamp_offsets_keeps_overflowing_image_in_view() {
        let natural = vec2(3000.0, 2000.0);
        let container = vec2(900.0, 700.0);
        // Dragged way off to the bottom-right: clamped to slack past the edge
        let clamped = clamp_offsets(natural, 1.0, container, vec2(5000.0, 5000.0), 0.10);
        assert_eq!(clamped, vec2(90.0, 70.0));
        // Dragged way off to the top-left
        let clamped = clamp_offsets(natural, 1.0, container, vec2(-9000.0, -9000.0), 0.10);
        assert_eq!(clamped, vec2(900.0 - 3000.0 - 90.0, 700.0 - 2000.0 - 70.0));
    }
}
