use super::FULL_TURN;

pub fn segment_angle(segment_count: usize) -> f64 {
    FULL_TURN / segment_count as f64
}

/// Maps the rotation the wheel came to rest at onto the index of the winning segment.
///
/// Rotation is clockwise-positive while segments are laid out in the opposite direction,
/// so the resting angle is inverted before it is bucketed. Offsetting by half a segment
/// makes each bucket centred on its segment rather than starting at its edge.
///
/// Returns `None` only when there are no segments.
pub fn resolve(final_rotation: f64, segment_count: usize) -> Option<usize> {
    if segment_count == 0 {
        return None;
    }
    let angle = segment_angle(segment_count);

    let normalized = final_rotation.rem_euclid(FULL_TURN);
    let raw = (FULL_TURN - normalized).rem_euclid(FULL_TURN);
    let centered = (raw + angle / 2.0).rem_euclid(FULL_TURN);
    let index = (centered / angle).floor() as usize;

    // Rounding right at the 360° wraparound can land one past the last bucket; this clamp
    // only absorbs that, it is not a "no winner" case.
    Some(index.min(segment_count - 1))
}
