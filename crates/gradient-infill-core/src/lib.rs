//! # Gradient Infill Core
//!
//! Core types for the gradient infill post-processor: machine-space geometry,
//! reinforcement targets, gradient settings and the flow model that maps a
//! point to an extrusion multiplier. Also hosts the shared error types.

pub mod error;
pub mod geometry;
pub mod reinforcement;

pub use error::{ConfigError, GcodeError};
pub use geometry::Point3D;
pub use reinforcement::{
    flow_multiplier, GradientConfig, InfluenceShape, ReinforcementModel, ReinforcementTarget,
    BASELINE_FLOW,
};
