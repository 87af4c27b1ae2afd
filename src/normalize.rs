//! Style normalization: re-express a raw rating against the global
//! distribution via its z-score within the style.

use crate::catalog::Catalog;

pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 5.0;

pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Adjusted score in `[0, 5]`, or `None` when the catalog has no usable
/// statistics for `style_name`.
///
/// Styles with zero (or otherwise degenerate) variance carry no information
/// about spread and are treated like unknown styles.
pub fn compute_adjusted(raw_score: f64, style_name: &str, catalog: &Catalog) -> Option<f64> {
    let style = catalog.style(style_name)?;
    if !raw_score.is_finite() || !(style.std.is_finite() && style.std > 0.0) {
        return None;
    }

    let z = (raw_score - style.mean) / style.std;
    let adjusted = catalog.global.mean + z * catalog.global.std;
    Some(clamp(adjusted, SCORE_MIN, SCORE_MAX))
}
