//! Job configuration for gradient reinforcement
//!
//! A job file names the gradient settings, the reinforcement targets and the
//! rewrite options. JSON and TOML are supported; the format is chosen by file
//! extension.
//!
//! Targets may be given as full objects or in the compact five-number form
//! `[x, y, z_start, z_height, radius]`, which describes a vertical column.
//!
//! ```toml
//! origin_offset = [110.0, 110.0]
//! targets = [[0.0, 0.0, 0.0, 10.0, 5.0]]
//!
//! [gradient]
//! max_flow = 350.0
//! min_flow = 50.0
//! enable_gradient = true
//! gradient_discretization = 4
//! ```

use std::path::Path;

use gradient_infill_core::{
    GradientConfig, Point3D, ReinforcementModel, ReinforcementTarget, BASELINE_FLOW,
};
use gradient_infill_gcode::{RewriteOptions, MAX_E_PRECISION};
use serde::{Deserialize, Serialize};

use crate::error::{SettingsError, SettingsResult};

/// A target as written in a job file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetSpec {
    /// Full target description
    Structured(ReinforcementTarget),
    /// `[x, y, z_start, z_height, radius]` column
    Compact([f64; 5]),
}

impl TargetSpec {
    /// Target in slicer coordinates, shifted by `offset` in X and Y
    pub fn resolve(&self, offset: [f64; 2]) -> ReinforcementTarget {
        match *self {
            Self::Structured(target) => ReinforcementTarget {
                center: target.center.offset_xy(offset[0], offset[1]),
                ..target
            },
            Self::Compact([x, y, z_start, z_height, radius]) => ReinforcementTarget::column(
                Point3D::new(x + offset[0], y + offset[1], z_start),
                z_height,
                radius,
                0.0,
            ),
        }
    }
}

impl From<ReinforcementTarget> for TargetSpec {
    fn from(target: ReinforcementTarget) -> Self {
        Self::Structured(target)
    }
}

/// Everything needed to post-process one sliced program
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Shift applied to every target's X and Y (e.g. the bed centre)
    pub origin_offset: [f64; 2],
    /// Reinforcement targets
    pub targets: Vec<TargetSpec>,
    /// Gradient settings
    pub gradient: GradientConfig,
    /// Rewrite options
    pub options: RewriteOptions,
}

impl JobConfig {
    /// Create a job over the given targets
    pub fn new(gradient: GradientConfig, targets: Vec<ReinforcementTarget>) -> Self {
        Self {
            gradient,
            targets: targets.into_iter().map(TargetSpec::from).collect(),
            ..Self::default()
        }
    }

    /// Load a job from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path).map_err(|e| {
            SettingsError::LoadError(format!("{}: {}", path.display(), e))
        })?;

        let config = format.parse(&content)?;
        config.validate()?;

        tracing::debug!(
            "Loaded job config from {} ({} targets)",
            path.display(),
            config.targets.len()
        );
        Ok(config)
    }

    /// Save the job to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = ConfigFormat::from_path(path)?.render(self)?;
        std::fs::write(path, content).map_err(|e| {
            SettingsError::SaveError(format!("{}: {}", path.display(), e))
        })?;

        Ok(())
    }

    /// Targets with the origin offset applied
    pub fn resolve_targets(&self) -> Vec<ReinforcementTarget> {
        self.targets
            .iter()
            .map(|spec| spec.resolve(self.origin_offset))
            .collect()
    }

    /// Reinforcement model for this job
    pub fn model(&self) -> ReinforcementModel {
        ReinforcementModel::new(self.resolve_targets(), self.gradient)
    }

    /// Validate the job
    pub fn validate(&self) -> SettingsResult<()> {
        if !self.origin_offset.iter().all(|v| v.is_finite()) {
            return Err(SettingsError::InvalidSetting {
                key: "origin_offset".to_string(),
                reason: "must be finite".to_string(),
            });
        }

        if self.options.e_precision > MAX_E_PRECISION {
            return Err(SettingsError::InvalidSetting {
                key: "options.e_precision".to_string(),
                reason: format!("must be at most {}", MAX_E_PRECISION),
            });
        }

        if let Some(features) = &self.options.features {
            if features.iter().any(|f| f.trim().is_empty()) {
                return Err(SettingsError::InvalidSetting {
                    key: "options.features".to_string(),
                    reason: "feature names must not be empty".to_string(),
                });
            }
        }

        self.model().validate()?;

        if self.targets.is_empty() && self.gradient.baseline_flow == BASELINE_FLOW {
            tracing::warn!("Job has no reinforcement targets, output will equal input");
        }
        Ok(())
    }
}

/// File formats a job can be stored in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Ok(Self::Toml),
            other => Err(SettingsError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    fn parse(self, content: &str) -> SettingsResult<JobConfig> {
        Ok(match self {
            Self::Json => serde_json::from_str(content)?,
            Self::Toml => toml::from_str(content)?,
        })
    }

    fn render(self, config: &JobConfig) -> SettingsResult<String> {
        Ok(match self {
            Self::Json => serde_json::to_string_pretty(config)?,
            Self::Toml => toml::to_string_pretty(config)?,
        })
    }
}
