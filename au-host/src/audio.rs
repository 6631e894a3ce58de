//! Audio data handed across the render boundary

/// Non-interleaved audio buffers, one per channel
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBufferList {
    /// Sample buffers [channel][frame]
    pub buffers: Vec<Vec<f32>>,
}

impl AudioBufferList {
    /// Allocate silent buffers
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            buffers: vec![vec![0.0; frames]; channels],
        }
    }

    /// Clear all buffers to silence
    pub fn clear(&mut self) {
        for buffer in &mut self.buffers {
            buffer.fill(0.0);
        }
    }

    /// Number of channels
    pub fn channels(&self) -> usize {
        self.buffers.len()
    }

    /// Frames per channel
    pub fn frames(&self) -> usize {
        self.buffers.first().map_or(0, Vec::len)
    }

    /// Copy the first `frames` frames into an interleaved slice.
    ///
    /// Extra output channels are filled with silence. Does not allocate.
    pub fn interleave_into(&self, out: &mut [f32], out_channels: usize) {
        if out_channels == 0 {
            return;
        }
        for (frame, chunk) in out.chunks_mut(out_channels).enumerate() {
            for (ch, sample) in chunk.iter_mut().enumerate() {
                *sample = self
                    .buffers
                    .get(ch)
                    .and_then(|b| b.get(frame))
                    .copied()
                    .unwrap_or(0.0);
            }
        }
    }
}

/// Flag bits passed to and returned from render calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderFlags(pub u32);

impl RenderFlags {
    /// Called before the unit renders
    pub const PRE_RENDER: u32 = 1 << 2;
    /// Called after the unit renders
    pub const POST_RENDER: u32 = 1 << 3;
    /// The callback produced silence
    pub const OUTPUT_IS_SILENCE: u32 = 1 << 4;

    /// Whether `bit` is set
    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    /// Set `bit`
    pub fn insert(&mut self, bit: u32) {
        self.0 |= bit;
    }
}

/// Timing of a render slice
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TimeStamp {
    /// Position in samples since the stream started
    pub sample_time: f64,
    /// Host clock time
    pub host_time: u64,
}
