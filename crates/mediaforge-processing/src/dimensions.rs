//! Output-dimension policy: explicit overrides, aspect-preserving derivation,
//! and hard max-ceiling clamping.

use mediaforge_core::models::{SizeAxis, SizeSpec};

/// Compute output dimensions from an original size, optional explicit
/// targets, and hard maximum ceilings.
///
/// - With no explicit request, the candidate is the original size.
/// - An explicit single axis derives the other proportionally from the
///   original aspect ratio; both explicit axes are taken as-is.
/// - If the candidate exceeds either ceiling, both axes scale down by
///   `min(max_w/w, max_h/h)` rounded to nearest, so the ceiling is never
///   exceeded and the candidate's aspect ratio is preserved.
/// - Nothing ever upscales implicitly: only explicit requests change
///   dimensions beyond the clamp.
pub fn compute_dimensions(
    original_w: u32,
    original_h: u32,
    requested_w: Option<u32>,
    requested_h: Option<u32>,
    max_w: Option<u32>,
    max_h: Option<u32>,
) -> (u32, u32) {
    debug_assert!(original_w > 0 && original_h > 0);

    let (candidate_w, candidate_h) = match (requested_w, requested_h) {
        (None, None) => (original_w, original_h),
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => {
            let h = ((w as f64) * (original_h as f64) / (original_w as f64)).round() as u32;
            (w, h.max(1))
        }
        (None, Some(h)) => {
            let w = ((h as f64) * (original_w as f64) / (original_h as f64)).round() as u32;
            (w.max(1), h)
        }
    };

    clamp_to_ceiling(candidate_w, candidate_h, max_w, max_h)
}

/// Scale a candidate down to fit within the given ceilings, preserving the
/// candidate's aspect ratio. Pass-through when already within bounds.
pub fn clamp_to_ceiling(w: u32, h: u32, max_w: Option<u32>, max_h: Option<u32>) -> (u32, u32) {
    let mut scale = 1.0f64;
    if let Some(max_w) = max_w {
        if w > max_w {
            scale = scale.min(max_w as f64 / w as f64);
        }
    }
    if let Some(max_h) = max_h {
        if h > max_h {
            scale = scale.min(max_h as f64 / h as f64);
        }
    }
    if scale >= 1.0 {
        return (w, h);
    }
    let out_w = ((w as f64) * scale).round() as u32;
    let out_h = ((h as f64) * scale).round() as u32;
    (out_w.max(1), out_h.max(1))
}

/// Dimensions for a named size: the configured axis takes the target value,
/// the other is derived from the original aspect ratio. No ceiling clamp
/// applies to named-size derivation.
pub fn size_for_axis(original_w: u32, original_h: u32, spec: &SizeSpec) -> (u32, u32) {
    match spec.axis {
        SizeAxis::Height => {
            let w = ((spec.target as f64) * (original_w as f64) / (original_h as f64)).round()
                as u32;
            (w.max(1), spec.target)
        }
        SizeAxis::Width => {
            let h = ((spec.target as f64) * (original_h as f64) / (original_w as f64)).round()
                as u32;
            (spec.target, h.max(1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaforge_core::models::SizeSpecSet;

    #[test]
    fn no_request_no_clamp_is_passthrough() {
        assert_eq!(
            compute_dimensions(1920, 1080, None, None, Some(3840), Some(2160)),
            (1920, 1080)
        );
    }

    #[test]
    fn dual_ceiling_clamp_uses_min_ratio() {
        // 4000x3000 under 3840x2160: scale = min(0.96, 0.72) = 0.72.
        assert_eq!(
            compute_dimensions(4000, 3000, None, None, Some(3840), Some(2160)),
            (2880, 2160)
        );
    }

    #[test]
    fn single_axis_request_preserves_aspect() {
        assert_eq!(
            compute_dimensions(1920, 1080, Some(960), None, None, None),
            (960, 540)
        );
        assert_eq!(
            compute_dimensions(1920, 1080, None, Some(540), None, None),
            (960, 540)
        );
    }

    #[test]
    fn both_axes_request_taken_as_is_then_clamped() {
        assert_eq!(
            compute_dimensions(100, 100, Some(5000), Some(1000), Some(2500), None),
            (2500, 500)
        );
    }

    #[test]
    fn clamp_never_exceeds_ceiling() {
        for (w, h) in [(1, 1), (17, 4000), (9999, 9999), (3841, 2161), (4000, 1)] {
            let (out_w, out_h) = compute_dimensions(w, h, None, None, Some(3840), Some(2160));
            assert!(out_w <= 3840, "{}x{} -> {}x{}", w, h, out_w, out_h);
            assert!(out_h <= 2160, "{}x{} -> {}x{}", w, h, out_w, out_h);
        }
    }

    #[test]
    fn named_size_height_axis() {
        // SizeSpecs {icon:64, thumb:240} over a 1920x1080 original.
        let set = SizeSpecSet::parse("icon=64,thumb=240").unwrap();
        assert_eq!(size_for_axis(1920, 1080, set.get("icon").unwrap()), (114, 64));
        assert_eq!(
            size_for_axis(1920, 1080, set.get("thumb").unwrap()),
            (427, 240)
        );
    }

    #[test]
    fn named_size_width_axis() {
        let set = SizeSpecSet::parse("banner=1200w").unwrap();
        assert_eq!(
            size_for_axis(1920, 1080, set.get("banner").unwrap()),
            (1200, 675)
        );
    }

    #[test]
    fn degenerate_axis_floors_at_one_pixel() {
        let set = SizeSpecSet::parse("icon=64").unwrap();
        let (w, h) = size_for_axis(1, 4000, set.get("icon").unwrap());
        assert_eq!((w, h), (1, 64));
    }
}
