//! Default output unit on top of CPAL
//!
//! [`CpalOutputFactory`] offers a single output component that plays what
//! the render callback on input 0 supplies through the system's default
//! output device.

use crate::{
    audio::{AudioBufferList, RenderFlags, TimeStamp},
    descriptor::{kind, ComponentDescription, ComponentRef, FourCc},
    error::Status,
    factory::{ComponentFactory, NativeResult, NativeUnit},
    format::StreamFormat,
    parameters::{ParameterId, ParameterInfo, ParameterKey},
    presets::{ClassInfo, PropertyState, CLASS_INFO_VERSION},
    properties::{property, PropertyInfo, PropertyKey, Scope},
    render::{RenderArgs, RenderCallback},
};
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    BufferSize, SampleRate, Stream, StreamConfig,
};
use log::{debug, error, warn};
use std::sync::{Arc, Mutex, PoisonError};

/// Subtype of the default output component
pub const DEFAULT_OUTPUT: FourCc = FourCc::new(b"def ");
/// Vendor code of components offered by this backend
pub const VENDOR: FourCc = FourCc::new(b"cpal");

const DEFAULT_MAX_FRAMES: u32 = 512;

/// Description of the default output component
pub fn default_output_description() -> ComponentDescription {
    ComponentDescription::new(kind::OUTPUT, DEFAULT_OUTPUT, VENDOR)
}

/// CPAL stream wrapper
struct CpalStream {
    stream: Option<Stream>,
}

// The stream is only played, paused and dropped from the control thread.
unsafe impl Send for CpalStream {}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.stream.take();
    }
}

type SharedCallback = Arc<Mutex<Option<RenderCallback>>>;

/// Factory offering the default output device as an output unit
#[derive(Debug, Default)]
pub struct CpalOutputFactory;

impl CpalOutputFactory {
    /// Create the factory
    pub fn new() -> Self {
        Self
    }

    /// Names of the available output devices
    pub fn output_devices(&self) -> Vec<String> {
        match cpal::default_host().output_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                warn!("failed to enumerate output devices: {}", e);
                Vec::new()
            }
        }
    }
}

impl ComponentFactory for CpalOutputFactory {
    fn find(&self, description: &ComponentDescription) -> Vec<ComponentRef> {
        if description.matches(&default_output_description()) {
            vec![ComponentRef(0)]
        } else {
            Vec::new()
        }
    }

    fn description(&self, component: ComponentRef) -> Option<ComponentDescription> {
        (component.0 == 0).then(default_output_description)
    }

    fn instantiate(&self, component: ComponentRef) -> NativeResult<Box<dyn NativeUnit>> {
        if component.0 != 0 {
            return Err(Status::INVALID_COMPONENT_ID);
        }
        Ok(Box::new(CpalOutputUnit::new()))
    }
}

/// Channel count and whole-hertz rate of `format` as the device expects them
fn device_format(format: &StreamFormat) -> NativeResult<(u16, u32)> {
    let channels = u16::try_from(format.channels_per_frame).map_err(|_| Status::FORMAT_NOT_SUPPORTED)?;
    let rate = format.sample_rate;
    if rate.fract() != 0.0 || rate < 1.0 || rate > f64::from(u32::MAX) {
        return Err(Status::FORMAT_NOT_SUPPORTED);
    }
    Ok((channels, rate as u32))
}

struct CpalOutputUnit {
    format: StreamFormat,
    max_frames: u32,
    device: Option<cpal::Device>,
    stream: Option<CpalStream>,
    callback: SharedCallback,
}

impl CpalOutputUnit {
    fn new() -> Self {
        Self {
            format: StreamFormat::float32(44100.0, 2),
            max_frames: DEFAULT_MAX_FRAMES,
            device: None,
            stream: None,
            callback: Arc::new(Mutex::new(None)),
        }
    }

    fn check_bus(key: PropertyKey) -> NativeResult<()> {
        match key.scope {
            Scope::Input | Scope::Output if key.element == 0 => Ok(()),
            Scope::Input | Scope::Output => Err(Status::INVALID_ELEMENT),
            Scope::Global => Ok(()),
            _ => Err(Status::INVALID_SCOPE),
        }
    }

    fn build_stream(&self, device: &cpal::Device) -> NativeResult<CpalStream> {
        let (channels, rate) = device_format(&self.format)?;
        let max_frames = self.max_frames as usize;
        let config = StreamConfig {
            channels,
            sample_rate: SampleRate(rate),
            buffer_size: BufferSize::Default,
        };
        let channels = usize::from(channels);
        let callback = Arc::clone(&self.callback);
        let mut buffers = AudioBufferList::new(channels, max_frames);
        let mut sample_time = 0.0;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    data.fill(0.0);
                    // Never block the audio thread; play silence while the
                    // control thread swaps the callback.
                    let Ok(mut guard) = callback.try_lock() else {
                        return;
                    };
                    let Some(render) = guard.as_mut() else {
                        return;
                    };
                    for chunk in data.chunks_mut(max_frames * channels) {
                        let frames = chunk.len() / channels;
                        for buffer in &mut buffers.buffers {
                            buffer.resize(frames, 0.0);
                        }
                        buffers.clear();
                        let timestamp = TimeStamp {
                            sample_time,
                            host_time: 0,
                        };
                        let mut args = RenderArgs {
                            flags: RenderFlags::default(),
                            timestamp: &timestamp,
                            bus: 0,
                            frames: frames as u32,
                            buffers: &mut buffers,
                        };
                        if render.call(&mut args).is_ok() {
                            buffers.interleave_into(chunk, channels);
                        }
                        sample_time += frames as f64;
                    }
                },
                move |err| error!("output stream error: {}", err),
                None,
            )
            .map_err(|e| {
                error!("failed to build output stream: {}", e);
                Status::FORMAT_NOT_SUPPORTED
            })?;
        Ok(CpalStream {
            stream: Some(stream),
        })
    }
}

impl NativeUnit for CpalOutputUnit {
    fn initialize(&mut self) -> NativeResult<()> {
        if !self.format.is_valid() || !self.format.is_non_interleaved() {
            return Err(Status::FORMAT_NOT_SUPPORTED);
        }
        device_format(&self.format)?;
        if self.max_frames == 0 {
            return Err(Status::FAILED_INITIALIZATION);
        }
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(Status::FAILED_INITIALIZATION)?;
        debug!("using output device {:?}", device.name().ok());
        self.device = Some(device);
        Ok(())
    }

    fn uninitialize(&mut self) {
        self.stream = None;
        self.device = None;
    }

    fn reset(&mut self, _scope: Scope, _element: u32) -> NativeResult<()> {
        Ok(())
    }

    fn property_info(&self, key: PropertyKey) -> NativeResult<PropertyInfo> {
        if key.id == property::SET_RENDER_CALLBACK {
            return Ok(PropertyInfo {
                size: 16,
                writable: true,
            });
        }
        let size = self.get_property(key)?.len() as u32;
        let writable = matches!(
            key.id,
            property::STREAM_FORMAT | property::SAMPLE_RATE | property::MAXIMUM_FRAMES_PER_SLICE
        );
        Ok(PropertyInfo { size, writable })
    }

    fn get_property(&self, key: PropertyKey) -> NativeResult<Vec<u8>> {
        Self::check_bus(key)?;
        match key.id {
            property::STREAM_FORMAT if key.scope != Scope::Global => Ok(self.format.to_bytes()),
            property::SAMPLE_RATE => Ok(self.format.sample_rate.to_le_bytes().to_vec()),
            property::ELEMENT_COUNT => Ok(1u32.to_le_bytes().to_vec()),
            property::MAXIMUM_FRAMES_PER_SLICE => Ok(self.max_frames.to_le_bytes().to_vec()),
            property::LATENCY | property::TAIL_TIME => Ok(0f64.to_le_bytes().to_vec()),
            _ => Err(Status::INVALID_PROPERTY),
        }
    }

    fn set_property(&mut self, key: PropertyKey, data: &[u8]) -> NativeResult<()> {
        Self::check_bus(key)?;
        if self.device.is_some() {
            return Err(Status::CANNOT_DO_IN_CURRENT_CONTEXT);
        }
        let invalid = |_| Status::INVALID_PROPERTY_VALUE;
        match key.id {
            property::STREAM_FORMAT if key.scope != Scope::Global => {
                // Both sides of the unit carry the same format.
                self.format = StreamFormat::from_bytes(data).ok_or(Status::INVALID_PROPERTY_VALUE)?;
            }
            property::SAMPLE_RATE => {
                self.format.sample_rate = f64::from_le_bytes(data.try_into().map_err(invalid)?);
            }
            property::MAXIMUM_FRAMES_PER_SLICE => {
                self.max_frames = u32::from_le_bytes(data.try_into().map_err(invalid)?);
            }
            property::ELEMENT_COUNT | property::LATENCY | property::TAIL_TIME => {
                return Err(Status::PROPERTY_NOT_WRITABLE);
            }
            _ => return Err(Status::INVALID_PROPERTY),
        }
        Ok(())
    }

    fn get_parameter(&self, _key: ParameterKey) -> NativeResult<f32> {
        Err(Status::INVALID_PARAMETER)
    }

    fn set_parameter(&mut self, _key: ParameterKey, _value: f32) -> NativeResult<()> {
        Err(Status::INVALID_PARAMETER)
    }

    fn parameter_list(&self, _scope: Scope) -> NativeResult<Vec<ParameterId>> {
        Ok(Vec::new())
    }

    fn parameter_info(&self, _id: ParameterId, _scope: Scope) -> NativeResult<ParameterInfo> {
        Err(Status::INVALID_PARAMETER)
    }

    fn class_info(&self) -> NativeResult<ClassInfo> {
        let mut info = ClassInfo::new(default_output_description());
        for key in [
            PropertyKey::output(property::STREAM_FORMAT, 0),
            PropertyKey::global(property::MAXIMUM_FRAMES_PER_SLICE),
        ] {
            info.properties.push(PropertyState {
                key,
                data: self.get_property(key)?,
            });
        }
        Ok(info)
    }

    fn set_class_info(&mut self, info: &ClassInfo) -> NativeResult<()> {
        if info.description != default_output_description() || info.version != CLASS_INFO_VERSION {
            return Err(Status::INVALID_PROPERTY_VALUE);
        }
        for state in &info.properties {
            self.set_property(state.key, &state.data)?;
        }
        Ok(())
    }

    fn set_render_callback(
        &mut self,
        element: u32,
        callback: Option<RenderCallback>,
    ) -> NativeResult<()> {
        if element != 0 {
            return Err(Status::INVALID_ELEMENT);
        }
        *self.callback.lock().unwrap_or_else(PoisonError::into_inner) = callback;
        Ok(())
    }

    fn start(&mut self) -> NativeResult<()> {
        let device = self.device.as_ref().ok_or(Status::UNINITIALIZED)?;
        if self.stream.is_none() {
            self.stream = Some(self.build_stream(device)?);
        }
        if let Some(stream) = self.stream.as_ref().and_then(|s| s.stream.as_ref()) {
            stream.play().map_err(|e| {
                error!("failed to start output stream: {}", e);
                Status::OUTPUT_NODE_ERR
            })?;
        }
        Ok(())
    }

    fn stop(&mut self) -> NativeResult<()> {
        if let Some(stream) = self.stream.as_ref().and_then(|s| s.stream.as_ref()) {
            stream.pause().map_err(|e| {
                error!("failed to stop output stream: {}", e);
                Status::OUTPUT_NODE_ERR
            })?;
        }
        Ok(())
    }
}
