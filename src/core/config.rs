//! Loader configuration
//!
//! All settings are fixed before a load starts. Values outside their allowed
//! range are clamped by [`LoaderConfig::sanitized`], which every constructor
//! path runs through.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::Result;

/// Allowed density skip factors (keep every Nth record).
pub const DENSITY_SKIP_RANGE: (u32, u32) = (1, 100);
/// Allowed hierarchy depth limits.
pub const MAX_DEPTH_RANGE: (u32, u32) = (0, 8);
/// Allowed intensity gamma factors.
pub const INTENSITY_GAMMA_RANGE: (f32, f32) = (0.1, 2.0);
/// Allowed color contrast exponents.
pub const CONTRAST_RANGE: (f32, f32) = (0.1, 4.0);
/// Allowed worker pool sizes.
pub const CONCURRENCY_RANGE: (usize, usize) = (1, 64);

/// Order in which decoded tiles reach the consumer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryOrder {
    /// Tiles are handed over as soon as their task finishes
    #[default]
    Completion,
    /// Tiles are buffered and handed over in exact schedule order
    Dispatch,
}

/// Configuration for one load operation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Keep every Nth record of each node (1 = all records)
    pub density_skip: u32,
    /// Deepest hierarchy level that is discovered and scheduled
    pub max_depth: u32,
    /// Drop red/green/blue from decoded tiles
    pub skip_color: bool,
    /// Drop intensity from decoded tiles
    pub skip_intensity: bool,
    /// Drop classification from decoded tiles
    pub skip_classification: bool,
    /// Exponent applied to normalized intensity
    pub intensity_gamma: f32,
    /// Exponent applied to every normalized color channel
    pub contrast_factor: f32,
    /// Modulate colors by intensity (grey ramp when a tile has no colors)
    pub apply_intensity_to_color: bool,
    /// Maximum number of node fetches in flight
    pub concurrency: usize,
    /// Delivery order of decoded tiles
    pub delivery_order: DeliveryOrder,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            density_skip: 1,
            max_depth: 8,
            skip_color: false,
            skip_intensity: false,
            skip_classification: false,
            intensity_gamma: 1.0,
            contrast_factor: 1.0,
            apply_intensity_to_color: false,
            concurrency: 4,
            delivery_order: DeliveryOrder::Completion,
        }
    }
}

impl LoaderConfig {
    /// Clamp every setting into its allowed range
    pub fn sanitized(mut self) -> Self {
        self.density_skip = self.density_skip.clamp(DENSITY_SKIP_RANGE.0, DENSITY_SKIP_RANGE.1);
        self.max_depth = self.max_depth.clamp(MAX_DEPTH_RANGE.0, MAX_DEPTH_RANGE.1);
        self.intensity_gamma = clamp_finite(self.intensity_gamma, INTENSITY_GAMMA_RANGE, 1.0);
        self.contrast_factor = clamp_finite(self.contrast_factor, CONTRAST_RANGE, 1.0);
        self.concurrency = self.concurrency.clamp(CONCURRENCY_RANGE.0, CONCURRENCY_RANGE.1);
        self
    }

    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LoaderConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Read a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn with_density_skip(mut self, skip: u32) -> Self {
        self.density_skip = skip;
        self.sanitized()
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self.sanitized()
    }

    pub fn with_intensity_gamma(mut self, gamma: f32) -> Self {
        self.intensity_gamma = gamma;
        self.sanitized()
    }

    pub fn with_contrast_factor(mut self, factor: f32) -> Self {
        self.contrast_factor = factor;
        self.sanitized()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self.sanitized()
    }

    pub fn with_delivery_order(mut self, order: DeliveryOrder) -> Self {
        self.delivery_order = order;
        self
    }
}

fn clamp_finite(value: f32, (min, max): (f32, f32), fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}
