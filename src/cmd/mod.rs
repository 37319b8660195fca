//! Command-line entry points.

pub mod ask;
pub mod serve;
