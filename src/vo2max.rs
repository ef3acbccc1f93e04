//! VO2max estimation from Yo-Yo IR1 distance
//!
//! Uses the linear relationship reported by Bangsbo et al. (2008) between the
//! total distance covered in the Yo-Yo Intermittent Recovery test level 1 and
//! maximal oxygen uptake:
//!
//! VO2max (ml/kg/min) = distance (m) × 0.0084 + 36.4

/// Slope in ml/kg/min per meter covered
pub const VO2MAX_SLOPE: f64 = 0.0084;

/// Baseline credited for zero distance
pub const VO2MAX_INTERCEPT: f64 = 36.4;

/// Estimate VO2max (ml/kg/min) from the distance covered over completed stages
///
/// # Arguments
/// * `distance_m` - Cumulative distance in meters
pub fn estimate(distance_m: u32) -> f64 {
    distance_m as f64 * VO2MAX_SLOPE + VO2MAX_INTERCEPT
}
