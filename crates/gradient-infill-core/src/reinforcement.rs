//! Spatial reinforcement model
//!
//! Answers "which flow multiplier applies at this point" for a set of
//! reinforcement targets. Every target influences a region around its centre:
//!
//! - inside `inner_radius` the multiplier is `max_flow`
//! - between `inner_radius` and `outer_radius` it is either `max_flow` (flat)
//!   or a stair-stepped gradient from `min_flow` (outermost step) up to
//!   `max_flow`
//! - at or beyond `outer_radius` the target does not contribute
//!
//! When several targets cover a point the strongest multiplier wins. A point
//! covered by no target gets the baseline flow (100% unless configured).
//!
//! All multipliers are percentages of the extrusion the slicer already
//! computed for a move.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geometry::Point3D;

/// Flow percentage that leaves extrusion unchanged
pub const BASELINE_FLOW: f64 = 100.0;

/// Region shape a target influences
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InfluenceShape {
    /// Full 3D sphere around the centre
    #[default]
    Sphere,
    /// Vertical column: distance is measured in XY only and the target is
    /// active for `center.z <= z < center.z + height`
    Column {
        /// Vertical extent of the column above the centre, in mm
        height: f64,
    },
}

/// A point that should receive locally increased extrusion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReinforcementTarget {
    /// Target centre in machine coordinates (mm)
    pub center: Point3D,
    /// Radius beyond which the target has no effect (mm)
    pub outer_radius: f64,
    /// Radius within which flow is always `max_flow` (mm)
    #[serde(default)]
    pub inner_radius: f64,
    /// Region shape
    #[serde(default)]
    pub shape: InfluenceShape,
}

impl ReinforcementTarget {
    /// Create a spherical target
    pub fn new(center: Point3D, outer_radius: f64, inner_radius: f64) -> Self {
        Self {
            center,
            outer_radius,
            inner_radius,
            shape: InfluenceShape::Sphere,
        }
    }

    /// Create a column target spanning `height` mm upwards from `center.z`
    pub fn column(center: Point3D, height: f64, outer_radius: f64, inner_radius: f64) -> Self {
        Self {
            center,
            outer_radius,
            inner_radius,
            shape: InfluenceShape::Column { height },
        }
    }

    /// Replace the influence shape
    pub fn with_shape(mut self, shape: InfluenceShape) -> Self {
        self.shape = shape;
        self
    }

    /// Distance from the centre as this target measures it
    ///
    /// Returns `None` when the point lies outside a column's Z band.
    pub fn distance_to(&self, point: &Point3D) -> Option<f64> {
        match self.shape {
            InfluenceShape::Sphere => Some(self.center.distance_to(point)),
            InfluenceShape::Column { height } => {
                let in_band = self.center.z <= point.z && point.z < self.center.z + height;
                in_band.then(|| self.center.horizontal_distance_to(point))
            }
        }
    }

    /// Multiplier this target asks for at `point`, or `None` if it does not
    /// cover the point
    pub fn contribution(&self, point: &Point3D, config: &GradientConfig) -> Option<f64> {
        let distance = self.distance_to(point)?;
        if distance >= self.outer_radius {
            return None;
        }
        if distance <= self.inner_radius {
            return Some(config.max_flow);
        }
        Some(config.band_multiplier(distance, self.inner_radius, self.outer_radius))
    }

    /// Check the target geometry
    pub fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidTarget { index, reason };

        if !self.center.is_finite() {
            return Err(invalid(format!("center {} is not finite", self.center)));
        }
        if !self.outer_radius.is_finite() || self.outer_radius < 0.0 {
            return Err(invalid(format!(
                "outer_radius must be finite and non-negative (got {})",
                self.outer_radius
            )));
        }
        if !self.inner_radius.is_finite() || self.inner_radius < 0.0 {
            return Err(invalid(format!(
                "inner_radius must be finite and non-negative (got {})",
                self.inner_radius
            )));
        }
        if self.inner_radius > self.outer_radius {
            return Err(invalid(format!(
                "inner_radius ({}) exceeds outer_radius ({})",
                self.inner_radius, self.outer_radius
            )));
        }
        if let InfluenceShape::Column { height } = self.shape {
            if !height.is_finite() || height <= 0.0 {
                return Err(invalid(format!(
                    "column height must be positive (got {})",
                    height
                )));
            }
        }
        Ok(())
    }
}

/// Gradient settings shared by all targets of a job
///
/// Fields missing from a configuration file take their [`Default`] values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradientConfig {
    /// Flow percentage at the core of a target
    pub max_flow: f64,
    /// Flow percentage at the outermost gradient step
    pub min_flow: f64,
    /// Stair-step between the radii instead of flat `max_flow`
    pub enable_gradient: bool,
    /// Number of gradient steps between `inner_radius` and `outer_radius`
    pub gradient_discretization: u32,
    /// Flow percentage applied where no target reaches
    pub baseline_flow: f64,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            max_flow: 350.0,
            min_flow: 50.0,
            enable_gradient: false,
            gradient_discretization: 4,
            baseline_flow: BASELINE_FLOW,
        }
    }
}

impl GradientConfig {
    /// Flat reinforcement at `max_flow`
    pub fn flat(max_flow: f64) -> Self {
        Self {
            max_flow,
            enable_gradient: false,
            ..Self::default()
        }
    }

    /// Stair-stepped gradient from `min_flow` to `max_flow` in `steps` levels
    pub fn stepped(max_flow: f64, min_flow: f64, steps: u32) -> Self {
        Self {
            max_flow,
            min_flow,
            enable_gradient: true,
            gradient_discretization: steps,
            ..Self::default()
        }
    }

    /// Multiplier for a point at `distance` strictly between the radii
    ///
    /// The band is split into `gradient_discretization` equal-width rings.
    /// Ring 0 (outermost) gets `min_flow`, each ring further in adds
    /// `(max_flow - min_flow) / (steps - 1)`.
    pub fn band_multiplier(&self, distance: f64, inner_radius: f64, outer_radius: f64) -> f64 {
        if !self.enable_gradient {
            return self.max_flow;
        }

        let steps = self.gradient_discretization;
        if steps <= 1 {
            return self.min_flow;
        }

        let width = (outer_radius - inner_radius) / f64::from(steps);
        let last_step = f64::from(steps - 1);
        let step = ((outer_radius - distance) / width).floor().clamp(0.0, last_step);
        let increment = (self.max_flow - self.min_flow) / last_step;

        self.min_flow + step * increment
    }

    /// Check the configuration for values that cannot be printed sensibly
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("max_flow", self.max_flow),
            ("min_flow", self.min_flow),
            ("baseline_flow", self.baseline_flow),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidFlow { field, value });
            }
        }
        if self.min_flow > self.max_flow {
            return Err(ConfigError::FlowRange {
                min_flow: self.min_flow,
                max_flow: self.max_flow,
            });
        }
        if self.gradient_discretization < 1 {
            return Err(ConfigError::InvalidDiscretization(
                self.gradient_discretization,
            ));
        }
        Ok(())
    }
}

/// Flow multiplier at `point` for a set of targets
///
/// Pure function: the strongest contribution among the targets that cover
/// the point, or `config.baseline_flow` if none does.
pub fn flow_multiplier(
    point: &Point3D,
    targets: &[ReinforcementTarget],
    config: &GradientConfig,
) -> f64 {
    targets
        .iter()
        .filter_map(|target| target.contribution(point, config))
        .reduce(f64::max)
        .unwrap_or(config.baseline_flow)
}

/// Targets and gradient settings for one job
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReinforcementModel {
    targets: Vec<ReinforcementTarget>,
    config: GradientConfig,
}

impl ReinforcementModel {
    /// Create a model over the given targets
    pub fn new(targets: Vec<ReinforcementTarget>, config: GradientConfig) -> Self {
        Self { targets, config }
    }

    /// Flow multiplier (percent) at `point`
    pub fn multiplier_at(&self, point: &Point3D) -> f64 {
        flow_multiplier(point, &self.targets, &self.config)
    }

    /// Whether the model can change anything at all
    ///
    /// With no targets and a 100% baseline every multiplier is 100%.
    pub fn is_noop(&self) -> bool {
        self.targets.is_empty() && self.config.baseline_flow == BASELINE_FLOW
    }

    /// Targets of this model
    pub fn targets(&self) -> &[ReinforcementTarget] {
        &self.targets
    }

    /// Gradient settings of this model
    pub fn config(&self) -> &GradientConfig {
        &self.config
    }

    /// Validate the gradient settings and every target
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.config.validate()?;
        self.targets
            .iter()
            .enumerate()
            .try_for_each(|(index, target)| target.validate(index))
    }
}
