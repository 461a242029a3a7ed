pub mod number;
pub mod percentile;
