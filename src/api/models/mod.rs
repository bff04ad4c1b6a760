pub mod cost;
pub mod dashboard;
pub mod readings;
pub mod usage;

pub use cost::*;
pub use dashboard::*;
pub use readings::*;
pub use usage::*;

/// Presentation rounding. Never applied before a value is used in a
/// further computation.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    let rounded = (value * factor).round() / factor;
    // avoid "-0.0" in responses
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
