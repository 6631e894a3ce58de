//! Render-context capabilities: input callbacks, host callbacks and external buffers
//!
//! A [`RenderCallback`] is invoked by the engine on its own real-time thread.
//! The closure must not block, allocate, or call back into the unit's
//! lifecycle (open, initialize, close and friends); doing so is undefined.
//! This crate's responsibility ends at handing the callback to the unit.

use crate::{
    audio::{AudioBufferList, RenderFlags, TimeStamp},
    error::{Error, Result, Status},
    properties::property,
    unit::AudioUnit,
};
use log::debug;
use std::fmt;

/// Arguments of one render call
pub struct RenderArgs<'a> {
    /// Action flags for this call
    pub flags: RenderFlags,
    /// Timing of the slice
    pub timestamp: &'a TimeStamp,
    /// Bus being rendered
    pub bus: u32,
    /// Frames requested
    pub frames: u32,
    /// Buffers to fill
    pub buffers: &'a mut AudioBufferList,
}

type RenderFn = dyn FnMut(&mut RenderArgs<'_>) -> Status + Send;

/// Supplies audio to a unit's input
pub struct RenderCallback {
    func: Box<RenderFn>,
}

impl RenderCallback {
    /// Wrap a closure; its captures play the role of the reference context
    pub fn new<F>(func: F) -> Self
    where
        F: FnMut(&mut RenderArgs<'_>) -> Status + Send + 'static,
    {
        Self {
            func: Box::new(func),
        }
    }

    /// Invoke the callback
    pub fn call(&mut self, args: &mut RenderArgs<'_>) -> Status {
        (self.func)(args)
    }
}

impl fmt::Debug for RenderCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderCallback").finish_non_exhaustive()
    }
}

/// Current beat position and tempo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatAndTempo {
    /// Beat position
    pub current_beat: f64,
    /// Beats per minute
    pub current_tempo: f64,
}

/// Position within the bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicalTimeLocation {
    /// Samples from the start of the slice to the next beat
    pub delta_sample_offset_to_next_beat: u32,
    /// Time signature numerator
    pub time_sig_numerator: f32,
    /// Time signature denominator
    pub time_sig_denominator: u32,
    /// Beat position of the current bar's downbeat
    pub current_measure_down_beat: f64,
}

type BeatAndTempoFn = dyn Fn() -> Option<BeatAndTempo> + Send + Sync;
type MusicalTimeFn = dyn Fn() -> Option<MusicalTimeLocation> + Send + Sync;

/// Callbacks a unit may use to follow the host's musical time
#[derive(Default)]
pub struct HostCallbacks {
    beat_and_tempo: Option<Box<BeatAndTempoFn>>,
    musical_time_location: Option<Box<MusicalTimeFn>>,
}

impl HostCallbacks {
    /// No callbacks installed
    pub fn new() -> Self {
        Self::default()
    }

    /// Provide beat and tempo
    pub fn with_beat_and_tempo<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Option<BeatAndTempo> + Send + Sync + 'static,
    {
        self.beat_and_tempo = Some(Box::new(f));
        self
    }

    /// Provide the musical time location
    pub fn with_musical_time_location<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Option<MusicalTimeLocation> + Send + Sync + 'static,
    {
        self.musical_time_location = Some(Box::new(f));
        self
    }

    /// Whether no callback is present
    pub fn is_empty(&self) -> bool {
        self.beat_and_tempo.is_none() && self.musical_time_location.is_none()
    }

    /// Query beat and tempo
    pub fn beat_and_tempo(&self) -> Option<BeatAndTempo> {
        self.beat_and_tempo.as_ref().and_then(|f| f())
    }

    /// Query the musical time location
    pub fn musical_time_location(&self) -> Option<MusicalTimeLocation> {
        self.musical_time_location.as_ref().and_then(|f| f())
    }
}

impl fmt::Debug for HostCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCallbacks")
            .field("beat_and_tempo", &self.beat_and_tempo.is_some())
            .field("musical_time_location", &self.musical_time_location.is_some())
            .finish()
    }
}

/// Host-owned scratch memory lent to a unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalBuffer(Box<[u8]>);

impl ExternalBuffer {
    /// Allocate a zeroed buffer of `size` bytes
    pub fn new(size: usize) -> Self {
        Self(vec![0; size].into_boxed_slice())
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The buffer contents
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl AudioUnit {
    /// Install the callback that supplies input audio on `element`.
    ///
    /// Failures returned by the callback are written to the render-error slot
    /// (see [`AudioUnit::last_render_error`]). Install callbacks before the
    /// engine starts pulling audio.
    pub fn set_render_callback(&mut self, element: u32, mut callback: RenderCallback) -> Result<()> {
        let slot = self.tracker().render_slot();
        let wrapped = RenderCallback::new(move |args| {
            let status = callback.call(args);
            slot.report(status);
            status
        });
        let result = self.native_mut().and_then(|unit| {
            unit.set_render_callback(element, Some(wrapped))
                .map_err(|s| Error::from_property(render_key(element), s))
        });
        if result.is_ok() {
            debug!("render callback installed on input {}", element);
            self.render_callbacks.insert(element);
        }
        self.record(result)
    }

    /// Remove the render callback from `element`
    pub fn remove_render_callback(&mut self, element: u32) -> Result<()> {
        let result = self.native_mut().and_then(|unit| {
            unit.set_render_callback(element, None)
                .map_err(|s| Error::from_property(render_key(element), s))
        });
        if result.is_ok() {
            self.render_callbacks.remove(&element);
        }
        self.record(result)
    }

    /// Whether any input has a render callback installed
    pub fn has_render_callback(&self) -> bool {
        !self.render_callbacks.is_empty()
    }

    /// Install the host's musical-time callbacks; at least one must be present
    pub fn set_host_callbacks(&mut self, callbacks: HostCallbacks) -> Result<()> {
        if callbacks.is_empty() {
            return self.record(Err(Error::NativeFailure(Status::PARAM_ERR)));
        }
        let key = crate::properties::PropertyKey::global(property::HOST_CALLBACKS);
        let result = self.native_mut().and_then(|unit| {
            unit.set_host_callbacks(Some(callbacks))
                .map_err(|s| Error::from_property(key, s))
        });
        self.record(result)
    }

    /// Lend the unit a scratch buffer. Only allowed while uninitialized.
    pub fn set_external_buffer(&mut self, buffer: ExternalBuffer) -> Result<()> {
        let result = self.swap_external_buffer(Some(buffer));
        self.record(result)
    }

    /// Let the unit use its own scratch memory again. Only allowed while uninitialized.
    pub fn use_default_buffer(&mut self) -> Result<()> {
        let result = self.swap_external_buffer(None);
        self.record(result)
    }

    /// The last failure raised while rendering.
    ///
    /// The unit's own render error wins when it reports one; otherwise the
    /// last failure returned by one of this unit's render callbacks. Not
    /// recorded as a result.
    pub fn last_render_error(&self) -> Option<Status> {
        let key = crate::properties::PropertyKey::global(property::LAST_RENDER_ERROR);
        self.native()
            .ok()
            .and_then(|unit| unit.get_property(key).ok())
            .and_then(|bytes| <[u8; 4]>::try_from(bytes.as_slice()).ok())
            .map(|code| Status(i32::from_le_bytes(code)))
            .filter(|status| status.is_err())
            .or_else(|| self.tracker().last_render_error())
    }

    fn swap_external_buffer(&mut self, buffer: Option<ExternalBuffer>) -> Result<()> {
        self.ensure_reconfigurable("external buffer")?;
        let key = crate::properties::PropertyKey::global(property::SET_EXTERNAL_BUFFER);
        self.native_mut()?
            .set_external_buffer(buffer)
            .map_err(|s| Error::from_property(key, s))
    }
}

fn render_key(element: u32) -> crate::properties::PropertyKey {
    crate::properties::PropertyKey::input(property::SET_RENDER_CALLBACK, element)
}
