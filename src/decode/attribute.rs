//! Fixed-stride attribute buffer decoding

use crate::core::{LoaderConfig, Vec3};
use crate::decode::layout::{Channel, RecordLayout};
use crate::decode::tile::{normalize_channel, DecodedTile};

/// Raw values of one normalized channel, kept until the tile maximum is known
struct RawChannel {
    size: usize,
    max: f64,
    values: Vec<f64>,
}

impl RawChannel {
    fn new(size: usize, len: usize) -> Self {
        Self { size, max: f64::MIN, values: vec![0.0; len] }
    }

    fn set(&mut self, index: usize, value: f64) {
        self.values[index] = value;
        self.max = self.max.max(value);
    }

    fn normalized(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().map(move |&v| normalize_channel(v, self.size, self.max))
    }
}

/// Decode a node's record buffer.
///
/// Returns `None` when no complete record can be read (zero stride or a
/// buffer shorter than one record). Trailing bytes past the last complete
/// record are ignored.
pub fn decode_records(buffer: &[u8], layout: &RecordLayout, config: &LoaderConfig) -> Option<DecodedTile> {
    let stride = layout.stride;
    if stride == 0 {
        return None;
    }
    let point_count = buffer.len() / stride;
    if point_count == 0 {
        return None;
    }
    let skip = config.density_skip.max(1) as usize;
    let kept = point_count.div_ceil(skip);

    let want_intensity = !config.skip_intensity || config.apply_intensity_to_color;
    let want_color = !config.skip_color;

    let mut positions = vec![Vec3::ZERO; kept];
    let mut colors: [Option<RawChannel>; 3] = [None, None, None];
    let mut intensity: Option<RawChannel> = None;
    let mut classification: Option<Vec<u8>> = None;
    for field in &layout.fields {
        match field.channel {
            Channel::Color(c) if want_color => colors[c] = Some(RawChannel::new(field.size, kept)),
            Channel::Intensity if want_intensity => intensity = Some(RawChannel::new(field.size, kept)),
            Channel::Classification if !config.skip_classification => classification = Some(vec![0; kept]),
            _ => {}
        }
    }

    for (out, record) in buffer.chunks_exact(stride).step_by(skip).enumerate() {
        for field in &layout.fields {
            let raw = (field.read)(&record[field.offset..]);
            match field.channel {
                Channel::Position(axis) => {
                    positions[out][axis] = (raw * field.scale + field.shift) as f32;
                }
                Channel::Color(c) => {
                    if let Some(channel) = colors[c].as_mut() {
                        channel.set(out, raw);
                    }
                }
                Channel::Intensity => {
                    if let Some(channel) = intensity.as_mut() {
                        channel.set(out, raw);
                    }
                }
                Channel::Classification => {
                    if let Some(classes) = classification.as_mut() {
                        classes[out] = raw.clamp(0.0, 255.0) as u8;
                    }
                }
            }
        }
    }

    let colors = if colors.iter().any(Option::is_some) {
        let mut rgb = vec![Vec3::ZERO; kept];
        for (c, channel) in colors.iter().enumerate() {
            if let Some(channel) = channel {
                for (dst, v) in rgb.iter_mut().zip(channel.normalized()) {
                    dst[c] = v;
                }
            }
        }
        Some(rgb)
    } else {
        None
    };

    let mut tile = DecodedTile {
        positions,
        colors,
        intensity: intensity.as_ref().map(|channel| channel.normalized().collect()),
        classification,
    };
    tile.apply_tone(config);
    Some(tile)
}
