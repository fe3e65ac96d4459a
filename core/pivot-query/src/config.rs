//! FILENAME: core/pivot-query/src/config.rs
//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Pagination and measurement settings of one pivot widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PivotConfig {
    /// Rows per page.
    pub page_size: usize,
    pub is_paginated: bool,
    /// Height of one grid row in pixels.
    pub row_height: f64,
    pub border_width: f64,
    /// Emit `TotalHeightChange` after every tree install.
    pub emit_height_changes: bool,
}

impl Default for PivotConfig {
    fn default() -> Self {
        PivotConfig {
            page_size: 100,
            is_paginated: true,
            row_height: 25.0,
            border_width: 1.0,
            emit_height_changes: true,
        }
    }
}

impl PivotConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: PivotConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "pageSize",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !(self.row_height > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "rowHeight",
                reason: format!("must be positive, got {}", self.row_height),
            });
        }
        if self.border_width < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "borderWidth",
                reason: format!("must not be negative, got {}", self.border_width),
            });
        }
        Ok(())
    }
}
