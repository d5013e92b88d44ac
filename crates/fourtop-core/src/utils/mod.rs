/// Useful enumerations for parton labels and processing settings.
pub mod enums;
/// Three- and four-vectors and the angular distance used for matching.
pub mod vectors;

/// Percentage of `passed` over `total`, or zero for an empty sample.
pub fn efficiency(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * passed as f64 / total as f64
    }
}
