//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Output dimensions for a [`Step::Resize`](super::params::Step::Resize).
///
/// - width only: scale so the width matches, height follows the aspect ratio
/// - height only: the same, the other way round
/// - both: fit inside the box, preserving the aspect ratio
/// - neither: unchanged
///
/// Results are rounded and never drop below 1px.
///
/// # Examples
/// ```
/// # use imageprinter::imaging::calculations::resize_dimensions;
/// assert_eq!(resize_dimensions((1600, 1200), Some(400), None), (400, 300));
/// assert_eq!(resize_dimensions((1600, 1200), None, Some(300)), (400, 300));
/// assert_eq!(resize_dimensions((1600, 1200), Some(400), Some(400)), (400, 300));
/// ```
pub fn resize_dimensions(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> (u32, u32) {
    let (src_w, src_h) = source;
    if src_w == 0 || src_h == 0 {
        return source;
    }
    let scale = |len: u32, ratio: f64| ((len as f64 * ratio).round() as u32).max(1);

    match (width, height) {
        (Some(w), None) => (w, scale(src_h, w as f64 / src_w as f64)),
        (None, Some(h)) => (scale(src_w, h as f64 / src_h as f64), h),
        (Some(w), Some(h)) => {
            let ratio = (w as f64 / src_w as f64).min(h as f64 / src_h as f64);
            (scale(src_w, ratio), scale(src_h, ratio))
        }
        (None, None) => source,
    }
}

/// Centered crop rectangle `(x, y, width, height)` for a target size.
///
/// The rectangle is clamped to the source, so it may be smaller than the
/// target; [`extent_offset`] places it on the target-sized canvas.
pub fn center_crop_rect(source: (u32, u32), target: (u32, u32)) -> (u32, u32, u32, u32) {
    let w = target.0.min(source.0);
    let h = target.1.min(source.1);
    ((source.0 - w) / 2, (source.1 - h) / 2, w, h)
}

/// Offset that centers `inner` on an `outer` canvas.
pub fn extent_offset(inner: (u32, u32), outer: (u32, u32)) -> (u32, u32) {
    (
        outer.0.saturating_sub(inner.0) / 2,
        outer.1.saturating_sub(inner.1) / 2,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_by_width_keeps_aspect() {
        assert_eq!(resize_dimensions((2000, 1000), Some(200), None), (200, 100));
    }

    #[test]
    fn resize_by_height_keeps_aspect() {
        assert_eq!(resize_dimensions((2000, 1000), None, Some(100)), (200, 100));
    }

    #[test]
    fn resize_box_fits_inside() {
        assert_eq!(
            resize_dimensions((1000, 2000), Some(300), Some(300)),
            (150, 300)
        );
    }

    #[test]
    fn resize_rounds_and_never_hits_zero() {
        assert_eq!(resize_dimensions((3000, 10), Some(30), None), (30, 1));
        assert_eq!(resize_dimensions((300, 200), Some(100), None), (100, 67));
    }

    #[test]
    fn resize_without_constraints_is_identity() {
        assert_eq!(resize_dimensions((640, 480), None, None), (640, 480));
    }

    #[test]
    fn resize_degenerate_source_is_untouched() {
        assert_eq!(resize_dimensions((0, 480), Some(10), None), (0, 480));
    }

    #[test]
    fn crop_rect_centers() {
        assert_eq!(center_crop_rect((400, 300), (200, 100)), (100, 100, 200, 100));
    }

    #[test]
    fn crop_rect_clamps_to_source() {
        assert_eq!(center_crop_rect((150, 100), (200, 100)), (0, 0, 150, 100));
    }

    #[test]
    fn extent_centers_smaller_image() {
        assert_eq!(extent_offset((150, 100), (200, 100)), (25, 0));
        assert_eq!(extent_offset((200, 100), (200, 100)), (0, 0));
    }
}
