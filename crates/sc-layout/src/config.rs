use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Upper bound for the sweep, transpose and detour caps.
pub const MAX_ITERATION_CAP: usize = 1_000;

/// Tunable knobs for the layout pipeline.
///
/// The crossing pass and transpose caps are heuristic limits, not
/// convergence guarantees: raising them can only keep or lower the reported
/// crossing count, never make the result optimal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Forward+backward median sweeps.
    pub crossing_passes: usize,
    /// Transpose rounds after each layer reorder.
    pub transpose_rounds: usize,
    /// Width complex diagrams are squeezed towards; also the minimum canvas width.
    pub target_width: f32,
    pub margin: f32,
    /// Inflation applied to node boxes when testing edges for collisions.
    pub obstacle_padding: f32,
    /// Distance between successive detour channels.
    pub detour_step: f32,
    pub detour_attempts: usize,
    /// Bezier control point offset as a fraction of the edge length.
    pub curve_factor: f32,
    /// Length of the straight stubs leaving and entering nodes on detours.
    pub stub_length: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            crossing_passes: 8,
            transpose_rounds: 10,
            target_width: 640.0,
            margin: 24.0,
            obstacle_padding: 8.0,
            detour_step: 20.0,
            detour_attempts: 24,
            curve_factor: 0.12,
            stub_length: 16.0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid layout config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid layout config TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("layout config field `{field}` must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: String,
    },
}

impl LayoutConfig {
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_count("crossing_passes", self.crossing_passes)?;
        check_count("transpose_rounds", self.transpose_rounds)?;
        check_count("detour_attempts", self.detour_attempts)?;
        check_positive("target_width", self.target_width)?;
        check_positive("detour_step", self.detour_step)?;
        check_non_negative("margin", self.margin)?;
        check_non_negative("obstacle_padding", self.obstacle_padding)?;
        check_non_negative("curve_factor", self.curve_factor)?;
        check_non_negative("stub_length", self.stub_length)?;
        Ok(())
    }

    /// Replace every invalid field with its default, so a bad config can
    /// never stop a layout from being produced. Oversized caps are clamped
    /// to [`MAX_ITERATION_CAP`].
    #[must_use]
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let count = |value: usize, fallback: usize| {
            if value == 0 {
                fallback
            } else {
                value.min(MAX_ITERATION_CAP)
            }
        };
        let positive =
            |value: f32, fallback: f32| if value.is_finite() && value > 0.0 { value } else { fallback };
        let non_negative =
            |value: f32, fallback: f32| if value.is_finite() && value >= 0.0 { value } else { fallback };
        Self {
            crossing_passes: count(self.crossing_passes, defaults.crossing_passes),
            transpose_rounds: count(self.transpose_rounds, defaults.transpose_rounds),
            detour_attempts: count(self.detour_attempts, defaults.detour_attempts),
            target_width: positive(self.target_width, defaults.target_width),
            detour_step: positive(self.detour_step, defaults.detour_step),
            margin: non_negative(self.margin, defaults.margin),
            obstacle_padding: non_negative(self.obstacle_padding, defaults.obstacle_padding),
            curve_factor: non_negative(self.curve_factor, defaults.curve_factor),
            stub_length: non_negative(self.stub_length, defaults.stub_length),
        }
    }
}

fn check_count(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_ITERATION_CAP {
        return Err(ConfigError::OutOfRange {
            field,
            expected: "between 1 and 1000",
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(ConfigError::OutOfRange {
            field,
            expected: "a finite number above zero",
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(ConfigError::OutOfRange {
            field,
            expected: "a finite non-negative number",
            value: value.to_string(),
        });
    }
    Ok(())
}
