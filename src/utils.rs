//! Region helpers shared by the landmark backends.

pub mod safe_cast;

use crate::face_detection::FaceRegion;
use safe_cast::f32_to_i32_clamp;

/// Expand a face region by `shift` of its size on each side, square it and
/// keep it inside a `max_width` × `max_height` frame
///
/// Returns an empty region when the frame itself is empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn refine_region(region: FaceRegion, max_width: i32, max_height: i32, shift: f32) -> FaceRegion {
    if max_width <= 0 || max_height <= 0 {
        return FaceRegion::default();
    }

    let x_shift = f32_to_i32_clamp(region.width as f32 * shift, -region.width / 2, max_width);
    let y_shift = f32_to_i32_clamp(region.height as f32 * shift, -region.height / 2, max_height);

    let x = (region.x - x_shift).clamp(0, max_width - 1);
    let y = (region.y - y_shift).clamp(0, max_height - 1);
    let width = (region.width + 2 * x_shift).min(max_width - x);
    let height = (region.height + 2 * y_shift).min(max_height - y);

    let side = width.max(height).min(max_width).min(max_height).max(0);
    let x = if x + side > max_width { max_width - side } else { x };
    let y = if y + side > max_height { max_height - side } else { y };

    FaceRegion::new(x, y, side, side)
}
