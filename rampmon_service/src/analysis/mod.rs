/// Derived values for the ramp depth service.
///
/// Submodules:
/// - `depth`: applies a reference elevation to a dataset and summarizes
///   the resulting depth-at-ramp series.

pub mod depth;
