//! Stream formats, bus counts and other structural configuration
//!
//! Everything here shapes render resources, so writes are only accepted
//! while the unit is not initialized.

use crate::{
    descriptor::FourCc,
    error::{Error, Result, Status},
    properties::{property, PropertyKey, Scope},
    unit::AudioUnit,
};
use serde::{Deserialize, Serialize};

/// Linear PCM format identifier
pub const FORMAT_LINEAR_PCM: FourCc = FourCc::new(b"lpcm");

/// Format flag bits
pub mod format_flags {
    /// Samples are IEEE floats
    pub const IS_FLOAT: u32 = 1 << 0;
    /// Samples are big-endian
    pub const IS_BIG_ENDIAN: u32 = 1 << 1;
    /// Integer samples are signed
    pub const IS_SIGNED_INTEGER: u32 = 1 << 2;
    /// Sample bits fill their container
    pub const IS_PACKED: u32 = 1 << 3;
    /// One buffer per channel
    pub const IS_NON_INTERLEAVED: u32 = 1 << 5;
}

/// Description of the audio carried on one bus
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Frames per second
    pub sample_rate: f64,
    /// Encoding, e.g. [`FORMAT_LINEAR_PCM`]
    pub format_id: FourCc,
    /// See [`format_flags`]
    pub format_flags: u32,
    /// Bytes in one packet
    pub bytes_per_packet: u32,
    /// Frames in one packet
    pub frames_per_packet: u32,
    /// Bytes in one frame of one buffer
    pub bytes_per_frame: u32,
    /// Channels in the stream
    pub channels_per_frame: u32,
    /// Bits per sample
    pub bits_per_channel: u32,
}

impl StreamFormat {
    /// Encoded size in bytes
    pub const ENCODED_SIZE: usize = 40;

    /// The canonical processing format: 32-bit float, packed, non-interleaved
    pub fn float32(sample_rate: f64, channels: u32) -> Self {
        Self {
            sample_rate,
            format_id: FORMAT_LINEAR_PCM,
            format_flags: format_flags::IS_FLOAT
                | format_flags::IS_PACKED
                | format_flags::IS_NON_INTERLEAVED,
            bytes_per_packet: 4,
            frames_per_packet: 1,
            bytes_per_frame: 4,
            channels_per_frame: channels,
            bits_per_channel: 32,
        }
    }

    /// Structural sanity: positive finite rate, at least one channel, non-empty packets
    pub fn is_valid(&self) -> bool {
        self.sample_rate.is_finite()
            && self.sample_rate > 0.0
            && self.channels_per_frame > 0
            && self.frames_per_packet > 0
            && self.bits_per_channel > 0
    }

    /// Whether each channel has its own buffer
    pub fn is_non_interleaved(&self) -> bool {
        self.format_flags & format_flags::IS_NON_INTERLEAVED != 0
    }

    /// Little-endian encoding: the rate, seven `u32` fields and a zero pad word
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::ENCODED_SIZE);
        out.extend_from_slice(&self.sample_rate.to_le_bytes());
        for word in [
            self.format_id.0,
            self.format_flags,
            self.bytes_per_packet,
            self.frames_per_packet,
            self.bytes_per_frame,
            self.channels_per_frame,
            self.bits_per_channel,
            0,
        ] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out
    }

    /// Decode the encoding produced by [`StreamFormat::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::ENCODED_SIZE {
            return None;
        }
        let word = |i: usize| {
            let start = 8 + i * 4;
            u32::from_le_bytes([bytes[start], bytes[start + 1], bytes[start + 2], bytes[start + 3]])
        };
        let mut rate = [0u8; 8];
        rate.copy_from_slice(&bytes[..8]);
        Some(Self {
            sample_rate: f64::from_le_bytes(rate),
            format_id: FourCc(word(0)),
            format_flags: word(1),
            bytes_per_packet: word(2),
            frames_per_packet: word(3),
            bytes_per_frame: word(4),
            channels_per_frame: word(5),
            bits_per_channel: word(6),
        })
    }
}

/// One supported input/output channel configuration; -1 means any count
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Input channels
    pub inputs: i16,
    /// Output channels
    pub outputs: i16,
}

impl ChannelInfo {
    /// Whether this configuration admits the given channel counts
    pub fn admits(&self, inputs: u32, outputs: u32) -> bool {
        fn side(want: i16, have: u32) -> bool {
            want < 0 || u32::try_from(want).map_or(false, |w| w == have)
        }
        side(self.inputs, inputs) && side(self.outputs, outputs)
    }

    /// Encode a list as consecutive little-endian `i16` pairs
    pub fn encode_list(list: &[ChannelInfo]) -> Vec<u8> {
        list.iter()
            .flat_map(|info| {
                let mut pair = [0u8; 4];
                pair[..2].copy_from_slice(&info.inputs.to_le_bytes());
                pair[2..].copy_from_slice(&info.outputs.to_le_bytes());
                pair
            })
            .collect()
    }

    /// Decode a list produced by [`ChannelInfo::encode_list`]
    pub fn decode_list(bytes: &[u8]) -> Option<Vec<ChannelInfo>> {
        if bytes.len() % 4 != 0 {
            return None;
        }
        Some(
            bytes
                .chunks_exact(4)
                .map(|c| ChannelInfo {
                    inputs: i16::from_le_bytes([c[0], c[1]]),
                    outputs: i16::from_le_bytes([c[2], c[3]]),
                })
                .collect(),
        )
    }
}

fn bus_scope(scope: Scope) -> Result<()> {
    match scope {
        Scope::Input | Scope::Output => Ok(()),
        other => Err(Error::NotApplicable(format!(
            "buses only exist in input and output scopes, not {:?}",
            other
        ))),
    }
}

impl AudioUnit {
    /// Set the stream format of a bus
    pub fn set_stream_format(&mut self, scope: Scope, bus: u32, format: &StreamFormat) -> Result<()> {
        let result = bus_scope(scope).and_then(|_| {
            self.write_property(
                PropertyKey::new(property::STREAM_FORMAT, scope, bus),
                &format.to_bytes(),
            )
        });
        self.record(result)
    }

    /// Stream format of a bus
    pub fn stream_format(&self, scope: Scope, bus: u32) -> Result<StreamFormat> {
        let result = bus_scope(scope)
            .and_then(|_| self.read_property(PropertyKey::new(property::STREAM_FORMAT, scope, bus)))
            .and_then(|bytes| {
                StreamFormat::from_bytes(&bytes)
                    .ok_or(Error::NativeFailure(Status::INVALID_PROPERTY_VALUE))
            });
        self.record(result)
    }

    /// Sample rate of a bus
    pub fn sample_rate(&self, scope: Scope, bus: u32) -> Result<f64> {
        self.property_f64(PropertyKey::new(property::SAMPLE_RATE, scope, bus))
    }

    /// Change the number of buses in the input or output scope
    pub fn set_bus_count(&mut self, scope: Scope, count: u32) -> Result<()> {
        let result = bus_scope(scope).and_then(|_| {
            self.write_property(
                PropertyKey::new(property::ELEMENT_COUNT, scope, 0),
                &count.to_le_bytes(),
            )
        });
        self.record(result)
    }

    /// Number of buses in the input or output scope
    pub fn bus_count(&self, scope: Scope) -> Result<u32> {
        if let Err(e) = bus_scope(scope) {
            return self.record(Err(e));
        }
        self.property_u32(PropertyKey::new(property::ELEMENT_COUNT, scope, 0))
    }

    /// Whether the bus count of a scope can be changed
    pub fn is_bus_count_writable(&self, scope: Scope) -> bool {
        bus_scope(scope).is_ok()
            && self.is_property_writable(PropertyKey::new(property::ELEMENT_COUNT, scope, 0))
    }

    /// Channel configurations the unit supports
    pub fn supported_channels(&self) -> Result<Vec<ChannelInfo>> {
        let result = self
            .read_property(PropertyKey::global(property::SUPPORTED_NUM_CHANNELS))
            .and_then(|bytes| {
                ChannelInfo::decode_list(&bytes)
                    .ok_or(Error::NativeFailure(Status::INVALID_PROPERTY_VALUE))
            });
        self.record(result)
    }

    /// Largest slice the unit will be asked to render
    pub fn set_max_frames_per_slice(&mut self, frames: u32) -> Result<()> {
        self.set_property_u32(PropertyKey::global(property::MAXIMUM_FRAMES_PER_SLICE), frames)
    }

    /// Maximum frames per slice
    pub fn max_frames_per_slice(&self) -> Result<u32> {
        self.property_u32(PropertyKey::global(property::MAXIMUM_FRAMES_PER_SLICE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_format_encoding_is_fixed_size() {
        let format = StreamFormat::float32(44100.0, 2);
        let bytes = format.to_bytes();
        assert_eq!(bytes.len(), StreamFormat::ENCODED_SIZE);
        assert_eq!(StreamFormat::from_bytes(&bytes), Some(format));
        assert_eq!(StreamFormat::from_bytes(&bytes[..39]), None);
    }

    #[test]
    fn zero_rate_is_structurally_invalid() {
        assert!(StreamFormat::float32(48000.0, 1).is_valid());
        assert!(!StreamFormat::float32(0.0, 2).is_valid());
        assert!(!StreamFormat::float32(44100.0, 0).is_valid());
        assert!(!StreamFormat::float32(f64::NAN, 2).is_valid());
    }

    #[test]
    fn wildcard_channel_counts() {
        let any_in_stereo_out = ChannelInfo { inputs: -1, outputs: 2 };
        assert!(any_in_stereo_out.admits(6, 2));
        assert!(!any_in_stereo_out.admits(2, 1));

        let list = vec![any_in_stereo_out, ChannelInfo { inputs: 1, outputs: 1 }];
        let decoded = ChannelInfo::decode_list(&ChannelInfo::encode_list(&list));
        assert_eq!(decoded, Some(list));
    }
}
