//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::geometry::{Gravity, ResizeGeometry, ResizeModifier, ResizeSize};

/// A concrete pixel rectangle inside an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Shrink one edge of `dims` so the result has the `aspect` ratio.
///
/// If the requested ratio is wider than the image, the width is kept and the
/// height shrinks to `floor(width / ratio)`. If it is narrower, the height is
/// kept and the width shrinks to `floor(height * ratio)`. Equal ratios keep
/// both edges.
///
/// Returns `None` when the aspect or the image is degenerate, or when the
/// result would be zero in either dimension.
///
/// # Examples
/// ```
/// # use imgpipe::imaging::calculations::normalize_ratio;
/// // 1:1 on a 1000x500 landscape keeps the height
/// assert_eq!(normalize_ratio((1.0, 1.0), (1000, 500)), Some((500, 500)));
///
/// // 16:9 on a 1000x1000 square keeps the width
/// assert_eq!(normalize_ratio((16.0, 9.0), (1000, 1000)), Some((1000, 562)));
/// ```
pub fn normalize_ratio(aspect: (f64, f64), dims: (u32, u32)) -> Option<(u32, u32)> {
    let (aspect_w, aspect_h) = aspect;
    let (width, height) = dims;
    if !(aspect_w.is_finite() && aspect_h.is_finite()) || aspect_w <= 0.0 || aspect_h <= 0.0 {
        return None;
    }
    if width == 0 || height == 0 {
        return None;
    }

    let old_ratio = width as f64 / height as f64;
    let new_ratio = aspect_w / aspect_h;

    let (w, h) = if new_ratio > old_ratio {
        // Same width, shorter height
        (width, (width as f64 / new_ratio).floor() as u32)
    } else if new_ratio < old_ratio {
        // Shorter width, same height
        ((height as f64 * new_ratio).floor() as u32, height)
    } else {
        (width, height)
    };

    (w > 0 && h > 0).then_some((w, h))
}

/// Largest edge a resize will produce. Percent and area geometries can ask
/// for far more than any encoder accepts.
pub const MAX_RESIZE_EDGE: u32 = 65_535;

/// Target dimensions for a resize geometry applied to an image of `dims`.
///
/// Returns `None` when the resize is a no-op: the modifier forbids it
/// (`>` on a smaller image, `<` on a larger one), the target equals the
/// source, or an edge of the target exceeds [`MAX_RESIZE_EDGE`].
pub fn resize_dimensions(geometry: &ResizeGeometry, dims: (u32, u32)) -> Option<(u32, u32)> {
    let (src_w, src_h) = dims;
    if src_w == 0 || src_h == 0 {
        return None;
    }

    let target = match geometry.size {
        ResizeSize::Scale { x_percent, y_percent } => (
            scale_edge(src_w, x_percent / 100.0),
            scale_edge(src_h, y_percent / 100.0),
        ),
        ResizeSize::Area(area) => {
            let factor = (area as f64 / (src_w as f64 * src_h as f64)).sqrt();
            (scale_edge(src_w, factor), scale_edge(src_h, factor))
        }
        ResizeSize::Box { width, height } => box_dimensions(dims, width, height, geometry.modifier)?,
    };

    let shrinks = target.0 <= src_w && target.1 <= src_h;
    let enlarges = target.0 >= src_w && target.1 >= src_h;
    let allowed = match geometry.modifier {
        ResizeModifier::OnlyShrink => !enlarges,
        ResizeModifier::OnlyEnlarge => !shrinks,
        _ => true,
    };

    let in_range = target.0 <= MAX_RESIZE_EDGE && target.1 <= MAX_RESIZE_EDGE;
    (allowed && in_range && target != dims).then_some(target)
}

/// Dimensions for a `WxH` box. `Fit` scales inside the box, `Fill` covers it,
/// `Exact` takes the box as-is. A missing edge follows the aspect ratio.
fn box_dimensions(
    dims: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
    modifier: ResizeModifier,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = dims;
    let scale_w = width.map(|w| w as f64 / src_w as f64);
    let scale_h = height.map(|h| h as f64 / src_h as f64);

    if modifier == ResizeModifier::Exact
        && let (Some(w), Some(h)) = (width, height)
    {
        return Some((w.max(1), h.max(1)));
    }

    let factor = match (scale_w, scale_h) {
        (Some(sw), Some(sh)) if modifier == ResizeModifier::Fill => sw.max(sh),
        (Some(sw), Some(sh)) => sw.min(sh),
        (Some(s), None) | (None, Some(s)) => s,
        (None, None) => return None,
    };

    // The edge that decided the factor is taken verbatim, not re-derived through floats
    let w = match (width, scale_w) {
        (Some(w), Some(s)) if s == factor => w,
        _ => scale_edge(src_w, factor),
    };
    let h = match (height, scale_h) {
        (Some(h), Some(s)) if s == factor => h,
        _ => scale_edge(src_h, factor),
    };
    Some((w.max(1), h.max(1)))
}

fn scale_edge(edge: u32, factor: f64) -> u32 {
    ((edge as f64 * factor).round() as u32).max(1)
}

/// Place a `size` rectangle with `offset` inside an image of `dims`.
///
/// Without gravity the offset is the literal top-left corner. With gravity the
/// rectangle is anchored at that point and the offset moves it inward from the
/// anchored edges (centered axes shift by the raw offset). The placed
/// rectangle is clipped to the image; `None` means nothing is left.
///
/// # Examples
/// ```
/// # use imgpipe::imaging::calculations::{CropRect, place_crop};
/// # use imgpipe::imaging::Gravity;
/// let rect = place_crop((100, 100), (0, 0), Some(Gravity::Center), (300, 200)).unwrap();
/// assert_eq!(rect, CropRect { x: 100, y: 50, width: 100, height: 100 });
/// ```
pub fn place_crop(
    size: (u32, u32),
    offset: (i64, i64),
    gravity: Option<Gravity>,
    dims: (u32, u32),
) -> Option<CropRect> {
    let (width, height) = (size.0 as i64, size.1 as i64);
    let (img_w, img_h) = (dims.0 as i64, dims.1 as i64);
    let (anchor_x, anchor_y) = gravity.map(Gravity::anchor).unwrap_or((Anchor::Start, Anchor::Start));

    let left = anchor_x.place(width, img_w, offset.0);
    let top = anchor_y.place(height, img_h, offset.1);

    // Offsets come straight from the option string and may be anywhere in i64
    let (x0, x1) = (left.max(0), left.saturating_add(width).min(img_w));
    let (y0, y1) = (top.max(0), top.saturating_add(height).min(img_h));
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(CropRect {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

/// Where a gravity pins the rectangle along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

impl Anchor {
    fn place(self, extent: i64, image_extent: i64, offset: i64) -> i64 {
        match self {
            Anchor::Start => offset,
            Anchor::Middle => (image_extent - extent).div_euclid(2).saturating_add(offset),
            Anchor::End => (image_extent - extent).saturating_sub(offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::geometry::ResizeGeometry;

    fn geometry(text: &str) -> ResizeGeometry {
        ResizeGeometry::parse(text).unwrap()
    }

    // =========================================================================
    // normalize_ratio
    // =========================================================================

    #[test]
    fn ratio_narrower_than_source_keeps_height() {
        assert_eq!(normalize_ratio((1.0, 1.0), (1000, 500)), Some((500, 500)));
    }

    #[test]
    fn ratio_wider_than_source_keeps_width() {
        assert_eq!(normalize_ratio((2.0, 1.0), (600, 800)), Some((600, 300)));
    }

    #[test]
    fn equal_ratio_keeps_both_edges() {
        assert_eq!(normalize_ratio((4.0, 3.0), (800, 600)), Some((800, 600)));
    }

    #[test]
    fn ratio_floors_fractional_edges() {
        // 1000 / (16/9) = 562.5
        assert_eq!(normalize_ratio((16.0, 9.0), (1000, 1000)), Some((1000, 562)));
        // 333 * (3/4) = 249.75
        assert_eq!(normalize_ratio((3.0, 4.0), (1000, 333)), Some((249, 333)));
    }

    #[test]
    fn same_ratio_different_sources_different_rects() {
        assert_eq!(normalize_ratio((1.0, 1.0), (400, 300)), Some((300, 300)));
        assert_eq!(normalize_ratio((1.0, 1.0), (300, 400)), Some((300, 300)));
        assert_eq!(normalize_ratio((1.0, 1.0), (1200, 900)), Some((900, 900)));
    }

    #[test]
    fn degenerate_ratio_is_none() {
        assert_eq!(normalize_ratio((0.0, 1.0), (100, 100)), None);
        assert_eq!(normalize_ratio((1.0, 0.0), (100, 100)), None);
        assert_eq!(normalize_ratio((-1.0, 1.0), (100, 100)), None);
        assert_eq!(normalize_ratio((f64::NAN, 1.0), (100, 100)), None);
    }

    #[test]
    fn extreme_ratio_collapsing_to_zero_is_none() {
        // 10 / 1000 floors to 0 rows
        assert_eq!(normalize_ratio((1000.0, 1.0), (10, 10)), None);
    }

    #[test]
    fn empty_image_is_none() {
        assert_eq!(normalize_ratio((1.0, 1.0), (0, 100)), None);
    }

    // =========================================================================
    // resize_dimensions
    // =========================================================================

    #[test]
    fn fit_box_preserves_aspect() {
        assert_eq!(resize_dimensions(&geometry("400x400"), (800, 600)), Some((400, 300)));
        assert_eq!(resize_dimensions(&geometry("400x400"), (600, 800)), Some((300, 400)));
    }

    #[test]
    fn fit_box_enlarges_without_modifier() {
        assert_eq!(resize_dimensions(&geometry("400x400"), (200, 100)), Some((400, 200)));
    }

    #[test]
    fn width_only_and_height_only() {
        assert_eq!(resize_dimensions(&geometry("200"), (800, 600)), Some((200, 150)));
        assert_eq!(resize_dimensions(&geometry("x300"), (800, 600)), Some((400, 300)));
    }

    #[test]
    fn only_shrink_skips_smaller_images() {
        assert_eq!(resize_dimensions(&geometry("400x400>"), (800, 600)), Some((400, 300)));
        assert_eq!(resize_dimensions(&geometry("400x400>"), (300, 200)), None);
    }

    #[test]
    fn only_enlarge_skips_larger_images() {
        assert_eq!(resize_dimensions(&geometry("400x400<"), (200, 100)), Some((400, 200)));
        assert_eq!(resize_dimensions(&geometry("400x400<"), (800, 600)), None);
    }

    #[test]
    fn exact_ignores_aspect() {
        assert_eq!(resize_dimensions(&geometry("300x300!"), (800, 600)), Some((300, 300)));
    }

    #[test]
    fn fill_covers_box() {
        assert_eq!(resize_dimensions(&geometry("400x400^"), (800, 600)), Some((533, 400)));
    }

    #[test]
    fn percentage_scales_both_axes() {
        assert_eq!(resize_dimensions(&geometry("50%"), (800, 600)), Some((400, 300)));
        assert_eq!(resize_dimensions(&geometry("50%x25%"), (800, 600)), Some((400, 150)));
    }

    #[test]
    fn area_limits_pixel_count() {
        let (w, h) = resize_dimensions(&geometry("@10000"), (400, 100)).unwrap();
        assert_eq!((w, h), (200, 50));
    }

    #[test]
    fn same_size_is_noop() {
        assert_eq!(resize_dimensions(&geometry("800x600"), (800, 600)), None);
    }

    #[test]
    fn oversized_targets_are_noop() {
        assert_eq!(resize_dimensions(&geometry("100000%"), (800, 600)), None);
        assert_eq!(resize_dimensions(&geometry("@18446744073709551615"), (800, 600)), None);
        assert_eq!(resize_dimensions(&geometry("70000x100!"), (800, 600)), None);
    }

    #[test]
    fn target_at_edge_limit_is_allowed() {
        assert_eq!(
            resize_dimensions(&geometry("65535x10!"), (800, 600)),
            Some((MAX_RESIZE_EDGE, 10))
        );
    }

    // =========================================================================
    // place_crop
    // =========================================================================

    #[test]
    fn literal_offset_without_gravity() {
        let rect = place_crop((100, 50), (10, 20), None, (300, 200)).unwrap();
        assert_eq!(rect, CropRect { x: 10, y: 20, width: 100, height: 50 });
    }

    #[test]
    fn crop_clipped_to_bounds() {
        let rect = place_crop((100, 100), (250, 150), None, (300, 200)).unwrap();
        assert_eq!(rect, CropRect { x: 250, y: 150, width: 50, height: 50 });
    }

    #[test]
    fn negative_offset_clips_leading_edge() {
        let rect = place_crop((100, 100), (-20, 0), None, (300, 200)).unwrap();
        assert_eq!(rect, CropRect { x: 0, y: 0, width: 80, height: 100 });
    }

    #[test]
    fn crop_outside_image_is_none() {
        assert_eq!(place_crop((100, 100), (400, 0), None, (300, 200)), None);
    }

    #[test]
    fn gravity_southeast_measures_from_far_edges() {
        let rect = place_crop((100, 50), (10, 5), Some(Gravity::SouthEast), (300, 200)).unwrap();
        assert_eq!(rect, CropRect { x: 190, y: 145, width: 100, height: 50 });
    }

    #[test]
    fn gravity_north_centers_horizontally() {
        let rect = place_crop((100, 50), (0, 0), Some(Gravity::North), (300, 200)).unwrap();
        assert_eq!(rect, CropRect { x: 100, y: 0, width: 100, height: 50 });
    }

    #[test]
    fn extreme_offsets_are_none_not_overflow() {
        for offset in [(i64::MAX, 0), (0, i64::MAX), (i64::MIN, 0), (0, i64::MIN)] {
            for gravity in [None, Some(Gravity::Center), Some(Gravity::SouthEast)] {
                assert_eq!(
                    place_crop((300, 300), offset, gravity, (400, 400)),
                    None,
                    "{offset:?} {gravity:?}"
                );
            }
        }
    }

    #[test]
    fn gravity_center_shifts_by_offset() {
        let rect = place_crop((100, 100), (10, -10), Some(Gravity::Center), (300, 200)).unwrap();
        assert_eq!(rect, CropRect { x: 110, y: 40, width: 100, height: 100 });
    }
}
