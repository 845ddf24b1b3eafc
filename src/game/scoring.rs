use crate::constants::{BASE_SCORE_MAX, STREAK_BONUS};

/// Round score for a successful tap.
///
/// `streak` already counts the current success. Negative reaction times are
/// clamped to the full base of 1000; slow reactions bottom out at the streak
/// bonus alone.
pub fn round_score(reaction_time_ms: f64, streak: u32) -> u64 {
    let reaction = if reaction_time_ms.is_nan() {
        BASE_SCORE_MAX
    } else {
        reaction_time_ms.max(0.0)
    };
    let base = (BASE_SCORE_MAX - reaction).max(0.0);
    (base + f64::from(streak) * STREAK_BONUS).floor() as u64
}
