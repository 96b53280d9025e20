//! Decoded point buffers handed to the consumer

use crate::core::{LoaderConfig, Vec3};

/// Point data of one octree node
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedTile {
    /// World-space positions
    pub positions: Vec<Vec3>,
    /// RGB in [0, 1]
    pub colors: Option<Vec<Vec3>>,
    /// Intensity in [0, 1]
    pub intensity: Option<Vec<f32>>,
    /// Raw classification codes
    pub classification: Option<Vec<u8>>,
}

impl DecodedTile {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Positions as tightly packed `f32` triplets for GPU upload
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Colors as tightly packed `f32` triplets for GPU upload
    pub fn color_bytes(&self) -> Option<&[u8]> {
        self.colors.as_deref().map(bytemuck::cast_slice)
    }

    /// Apply contrast, intensity gamma, intensity-to-color and the class
    /// skip flags. Channels must already be normalized to [0, 1].
    pub(crate) fn apply_tone(&mut self, config: &LoaderConfig) {
        if config.contrast_factor != 1.0 {
            if let Some(colors) = self.colors.as_mut() {
                let k = config.contrast_factor;
                for c in colors.iter_mut() {
                    *c = Vec3::new(c.x.powf(k), c.y.powf(k), c.z.powf(k));
                }
            }
        }

        if config.intensity_gamma != 1.0 {
            if let Some(intensity) = self.intensity.as_mut() {
                for v in intensity.iter_mut() {
                    *v = v.powf(config.intensity_gamma);
                }
            }
        }

        if config.apply_intensity_to_color {
            if let Some(intensity) = self.intensity.as_ref() {
                let colors = match self.colors.take() {
                    Some(mut colors) if !config.skip_color => {
                        for (c, &i) in colors.iter_mut().zip(intensity) {
                            *c *= i;
                        }
                        colors
                    }
                    _ => intensity.iter().map(|&i| Vec3::splat(i)).collect(),
                };
                self.colors = Some(colors);
            }
        } else if config.skip_color {
            self.colors = None;
        }

        if config.skip_intensity {
            self.intensity = None;
        }
        if config.skip_classification {
            self.classification = None;
        }
    }
}

/// Map a raw channel value into [0, 1] given its byte size and the largest
/// value seen for that channel in the tile.
///
/// 16-bit channels whose tile maximum fits in 8 bits hold 8-bit data and are
/// divided by 255. Sizes other than 1 and 2 are taken as already normalized.
pub fn normalize_channel(raw: f64, size: usize, tile_max: f64) -> f32 {
    let v = match size {
        1 => raw / 255.0,
        2 if tile_max <= 255.0 => raw / 255.0,
        2 => raw / 65535.0,
        _ => raw,
    };
    v.clamp(0.0, 1.0) as f32
}
