//! Application services, one module per use-case.

pub mod mutators;
pub mod pipeline;
pub mod stages;
