//! In-process components and graph
//!
//! [`MemoryFactory`] hosts components that keep their parameters and
//! properties in memory and follow the same property rules as a simple
//! native effect, instrument or output unit. It counts instantiations and
//! disposals, and [`MemoryInstance`] handles let a test drive the render
//! side of a live instance. [`MemoryGraph`] is a matching graph engine.

use crate::{
    audio::{AudioBufferList, RenderFlags, TimeStamp},
    descriptor::{kind, ComponentDescription, ComponentRef},
    error::Status,
    factory::{ComponentFactory, NativeResult, NativeUnit},
    format::{ChannelInfo, StreamFormat, FORMAT_LINEAR_PCM},
    graph::{AudioGraph, GraphConnection, NodeId},
    parameters::{parameter_flags, ParameterId, ParameterInfo, ParameterKey, ParameterUnit},
    presets::{ClassInfo, FactoryPreset, ParameterState, PropertyState, CLASS_INFO_VERSION},
    properties::{property, PropertyInfo, PropertyKey, Scope},
    render::{BeatAndTempo, ExternalBuffer, HostCallbacks, RenderArgs, RenderCallback},
};
use log::{debug, trace};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

const DEFAULT_SAMPLE_RATE: f64 = 44100.0;
const DEFAULT_MAX_FRAMES: u32 = 1156;
const MAX_BUSES: u32 = 64;

/// Template for an in-memory component
#[derive(Debug, Clone)]
pub struct MemoryComponent {
    description: ComponentDescription,
    parameters: Vec<(Scope, ParameterId, ParameterInfo)>,
    presets: Vec<(FactoryPreset, Vec<(ParameterId, f32)>)>,
    input_buses: u32,
    output_buses: u32,
    bus_count_writable: bool,
    supported_channels: Vec<ChannelInfo>,
    latency: f64,
    tail_time: f64,
}

impl MemoryComponent {
    /// A component with one output bus, and one input bus if its kind takes audio input
    pub fn new(description: ComponentDescription) -> Self {
        Self {
            description,
            parameters: Vec::new(),
            presets: Vec::new(),
            input_buses: u32::from(description.has_audio_input()),
            output_buses: 1,
            bus_count_writable: false,
            supported_channels: Vec::new(),
            latency: 0.0,
            tail_time: 0.0,
        }
    }

    /// Add a readable and writable global parameter
    pub fn parameter(self, id: ParameterId, name: &str, min: f32, max: f32, default: f32) -> Self {
        let info = ParameterInfo {
            name: name.to_string(),
            unit: ParameterUnit::Generic,
            min_value: min,
            max_value: max,
            default_value: default,
            flags: parameter_flags::IS_READABLE | parameter_flags::IS_WRITABLE,
        };
        self.parameter_info(Scope::Global, id, info)
    }

    /// Add a parameter with full metadata in any scope
    pub fn parameter_info(mut self, scope: Scope, id: ParameterId, info: ParameterInfo) -> Self {
        self.parameters.push((scope, id, info));
        self
    }

    /// Add a factory preset that sets the given global parameters
    pub fn factory_preset(mut self, number: i32, name: &str, values: &[(ParameterId, f32)]) -> Self {
        let preset = FactoryPreset {
            number,
            name: name.to_string(),
        };
        self.presets.push((preset, values.to_vec()));
        self
    }

    /// Initial bus counts
    pub fn buses(mut self, inputs: u32, outputs: u32) -> Self {
        self.input_buses = inputs;
        self.output_buses = outputs;
        self
    }

    /// Allow the host to change bus counts
    pub fn bus_count_writable(mut self, writable: bool) -> Self {
        self.bus_count_writable = writable;
        self
    }

    /// Restrict the channel configurations accepted at initialize
    pub fn supported_channels(mut self, channels: Vec<ChannelInfo>) -> Self {
        self.supported_channels = channels;
        self
    }

    /// Reported latency in seconds
    pub fn latency(mut self, seconds: f64) -> Self {
        self.latency = seconds;
        self
    }

    /// Reported tail time in seconds
    pub fn tail_time(mut self, seconds: f64) -> Self {
        self.tail_time = seconds;
        self
    }

    /// The component's description
    pub fn description(&self) -> ComponentDescription {
        self.description
    }

    fn find_parameter(&self, scope: Scope, id: ParameterId) -> Option<&ParameterInfo> {
        self.parameters
            .iter()
            .find(|(s, i, _)| *s == scope && *i == id)
            .map(|(_, _, info)| info)
    }
}

/// Everything a class info captures
#[derive(Debug, Clone)]
struct Settings {
    parameters: BTreeMap<ParameterKey, f32>,
    input_formats: Vec<StreamFormat>,
    output_formats: Vec<StreamFormat>,
    max_frames: u32,
    bypass: bool,
    cpu_load: f32,
    render_quality: u32,
}

impl Settings {
    fn new(component: &MemoryComponent) -> Self {
        let format = StreamFormat::float32(DEFAULT_SAMPLE_RATE, 2);
        let parameters = component
            .parameters
            .iter()
            .filter(|(scope, _, _)| *scope == Scope::Global)
            .map(|(_, id, info)| (ParameterKey::global(*id), info.default_value))
            .collect();
        Self {
            parameters,
            input_formats: vec![format; component.input_buses as usize],
            output_formats: vec![format; component.output_buses as usize],
            max_frames: DEFAULT_MAX_FRAMES,
            bypass: false,
            cpu_load: 0.0,
            render_quality: 127,
        }
    }

    fn formats(&self, scope: Scope) -> NativeResult<&Vec<StreamFormat>> {
        match scope {
            Scope::Input => Ok(&self.input_formats),
            Scope::Output => Ok(&self.output_formats),
            _ => Err(Status::INVALID_SCOPE),
        }
    }

    fn formats_mut(&mut self, scope: Scope) -> NativeResult<&mut Vec<StreamFormat>> {
        match scope {
            Scope::Input => Ok(&mut self.input_formats),
            Scope::Output => Ok(&mut self.output_formats),
            _ => Err(Status::INVALID_SCOPE),
        }
    }

    fn bus(&self, scope: Scope, element: u32) -> NativeResult<&StreamFormat> {
        self.formats(scope)?
            .get(element as usize)
            .ok_or(Status::INVALID_ELEMENT)
    }

    fn bus_mut(&mut self, scope: Scope, element: u32) -> NativeResult<&mut StreamFormat> {
        self.formats_mut(scope)?
            .get_mut(element as usize)
            .ok_or(Status::INVALID_ELEMENT)
    }

    fn check_parameter<'c>(
        &self,
        component: &'c MemoryComponent,
        key: ParameterKey,
    ) -> NativeResult<&'c ParameterInfo> {
        let info = component
            .find_parameter(key.scope, key.id)
            .ok_or(Status::INVALID_PARAMETER)?;
        match key.scope {
            Scope::Input | Scope::Output => {
                self.bus(key.scope, key.element)?;
            }
            _ if key.element != 0 => return Err(Status::INVALID_ELEMENT),
            _ => {}
        }
        Ok(info)
    }

    fn parameter(&self, component: &MemoryComponent, key: ParameterKey) -> NativeResult<f32> {
        let info = self.check_parameter(component, key)?;
        Ok(self
            .parameters
            .get(&key)
            .copied()
            .unwrap_or(info.default_value))
    }

    fn set_parameter(
        &mut self,
        component: &MemoryComponent,
        key: ParameterKey,
        value: f32,
    ) -> NativeResult<()> {
        let info = self.check_parameter(component, key)?;
        if !value.is_finite() || value < info.min_value || value > info.max_value {
            return Err(Status::INVALID_PARAMETER_VALUE);
        }
        self.parameters.insert(key, value);
        Ok(())
    }

    fn read(
        &self,
        component: &MemoryComponent,
        last_render_error: Status,
        key: PropertyKey,
    ) -> NativeResult<Vec<u8>> {
        let bytes = match key.id {
            property::SAMPLE_RATE => {
                let format = match key.scope {
                    Scope::Global => self
                        .output_formats
                        .first()
                        .or_else(|| self.input_formats.first())
                        .ok_or(Status::INVALID_ELEMENT)?,
                    scope => self.bus(scope, key.element)?,
                };
                format.sample_rate.to_le_bytes().to_vec()
            }
            property::STREAM_FORMAT => self.bus(key.scope, key.element)?.to_bytes(),
            property::ELEMENT_COUNT => {
                let count = match key.scope {
                    Scope::Global => 1,
                    scope => self.formats(scope)?.len() as u32,
                };
                count.to_le_bytes().to_vec()
            }
            property::MAXIMUM_FRAMES_PER_SLICE => {
                global_only(key)?;
                self.max_frames.to_le_bytes().to_vec()
            }
            property::LATENCY => {
                global_only(key)?;
                component.latency.to_le_bytes().to_vec()
            }
            property::TAIL_TIME => {
                global_only(key)?;
                component.tail_time.to_le_bytes().to_vec()
            }
            property::BYPASS_EFFECT => {
                global_only(key)?;
                if !component.description.is_effect() {
                    return Err(Status::INVALID_PROPERTY);
                }
                u32::from(self.bypass).to_le_bytes().to_vec()
            }
            property::CPU_LOAD => {
                global_only(key)?;
                self.cpu_load.to_le_bytes().to_vec()
            }
            property::RENDER_QUALITY => {
                global_only(key)?;
                self.render_quality.to_le_bytes().to_vec()
            }
            property::SUPPORTED_NUM_CHANNELS => {
                global_only(key)?;
                if component.supported_channels.is_empty() {
                    return Err(Status::INVALID_PROPERTY);
                }
                ChannelInfo::encode_list(&component.supported_channels)
            }
            property::LAST_RENDER_ERROR => {
                global_only(key)?;
                last_render_error.0.to_le_bytes().to_vec()
            }
            property::PARAMETER_LIST => component
                .parameters
                .iter()
                .filter(|(scope, _, _)| *scope == key.scope)
                .flat_map(|(_, id, _)| id.to_le_bytes())
                .collect(),
            property::CLASS_INFO => {
                global_only(key)?;
                serde_json::to_vec(&self.class_info(component))
                    .map_err(|_| Status::INVALID_PROPERTY_VALUE)?
            }
            _ => return Err(Status::INVALID_PROPERTY),
        };
        Ok(bytes)
    }

    fn write(
        &mut self,
        component: &MemoryComponent,
        initialized: bool,
        key: PropertyKey,
        data: &[u8],
    ) -> NativeResult<()> {
        let current = self.read(component, Status::NO_ERR, key)?;
        if !is_writable(component, key) {
            return Err(Status::PROPERTY_NOT_WRITABLE);
        }
        if initialized && property::is_structural(key.id) {
            if current == data {
                return Ok(());
            }
            return Err(Status::CANNOT_DO_IN_CURRENT_CONTEXT);
        }
        match key.id {
            property::SAMPLE_RATE => {
                let rate = f64::from_le_bytes(fixed(data)?);
                match key.scope {
                    Scope::Global => {
                        for format in self.input_formats.iter_mut().chain(self.output_formats.iter_mut()) {
                            format.sample_rate = rate;
                        }
                    }
                    scope => self.bus_mut(scope, key.element)?.sample_rate = rate,
                }
            }
            property::STREAM_FORMAT => {
                let format = StreamFormat::from_bytes(data).ok_or(Status::INVALID_PROPERTY_VALUE)?;
                if format.format_id != FORMAT_LINEAR_PCM {
                    return Err(Status::FORMAT_NOT_SUPPORTED);
                }
                *self.bus_mut(key.scope, key.element)? = format;
            }
            property::ELEMENT_COUNT => {
                let count = u32::from_le_bytes(fixed(data)?);
                if count > MAX_BUSES {
                    return Err(Status::INVALID_PROPERTY_VALUE);
                }
                let formats = self.formats_mut(key.scope)?;
                let template = formats
                    .first()
                    .copied()
                    .unwrap_or_else(|| StreamFormat::float32(DEFAULT_SAMPLE_RATE, 2));
                formats.resize(count as usize, template);
            }
            property::MAXIMUM_FRAMES_PER_SLICE => self.max_frames = u32::from_le_bytes(fixed(data)?),
            property::BYPASS_EFFECT => self.bypass = u32::from_le_bytes(fixed(data)?) != 0,
            property::CPU_LOAD => {
                let load = f32::from_le_bytes(fixed(data)?);
                if !(0.0..=1.0).contains(&load) {
                    return Err(Status::INVALID_PROPERTY_VALUE);
                }
                self.cpu_load = load;
            }
            property::RENDER_QUALITY => {
                let quality = u32::from_le_bytes(fixed(data)?);
                if quality > 127 {
                    return Err(Status::INVALID_PROPERTY_VALUE);
                }
                self.render_quality = quality;
            }
            _ => return Err(Status::PROPERTY_NOT_WRITABLE),
        }
        Ok(())
    }

    fn class_info(&self, component: &MemoryComponent) -> ClassInfo {
        let mut info = ClassInfo::new(component.description);
        info.parameters = self
            .parameters
            .iter()
            .map(|(key, value)| ParameterState {
                key: *key,
                value: *value,
            })
            .collect();

        let mut capture = |key: PropertyKey| {
            if let Ok(data) = self.read(component, Status::NO_ERR, key) {
                info.properties.push(PropertyState { key, data });
            }
        };
        if component.bus_count_writable {
            capture(PropertyKey::input(property::ELEMENT_COUNT, 0));
            capture(PropertyKey::output(property::ELEMENT_COUNT, 0));
        }
        for bus in 0..self.input_formats.len() as u32 {
            capture(PropertyKey::input(property::STREAM_FORMAT, bus));
        }
        for bus in 0..self.output_formats.len() as u32 {
            capture(PropertyKey::output(property::STREAM_FORMAT, bus));
        }
        capture(PropertyKey::global(property::MAXIMUM_FRAMES_PER_SLICE));
        capture(PropertyKey::global(property::BYPASS_EFFECT));
        capture(PropertyKey::global(property::CPU_LOAD));
        capture(PropertyKey::global(property::RENDER_QUALITY));
        info
    }
}

fn global_only(key: PropertyKey) -> NativeResult<()> {
    if key.scope == Scope::Global {
        Ok(())
    } else {
        Err(Status::INVALID_SCOPE)
    }
}

fn fixed<const N: usize>(data: &[u8]) -> NativeResult<[u8; N]> {
    data.try_into().map_err(|_| Status::INVALID_PROPERTY_VALUE)
}

fn is_writable(component: &MemoryComponent, key: PropertyKey) -> bool {
    match key.id {
        property::SAMPLE_RATE
        | property::STREAM_FORMAT
        | property::MAXIMUM_FRAMES_PER_SLICE
        | property::BYPASS_EFFECT
        | property::CPU_LOAD
        | property::RENDER_QUALITY
        | property::CLASS_INFO => true,
        property::ELEMENT_COUNT => {
            component.bus_count_writable && matches!(key.scope, Scope::Input | Scope::Output)
        }
        _ => false,
    }
}

struct MemoryState {
    component: MemoryComponent,
    settings: Settings,
    initialized: bool,
    running: bool,
    render_callbacks: BTreeMap<u32, RenderCallback>,
    host_callbacks: Option<HostCallbacks>,
    external_buffer: Option<ExternalBuffer>,
    last_render_error: Status,
    sample_time: f64,
    initialize_count: usize,
    reset_count: usize,
}

impl MemoryState {
    fn new(component: MemoryComponent) -> Self {
        let settings = Settings::new(&component);
        Self {
            component,
            settings,
            initialized: false,
            running: false,
            render_callbacks: BTreeMap::new(),
            host_callbacks: None,
            external_buffer: None,
            last_render_error: Status::NO_ERR,
            sample_time: 0.0,
            initialize_count: 0,
            reset_count: 0,
        }
    }

    fn set_class_info(&mut self, info: &ClassInfo) -> NativeResult<()> {
        if info.description != self.component.description || info.version != CLASS_INFO_VERSION {
            return Err(Status::INVALID_PROPERTY_VALUE);
        }
        // Apply to a copy so a rejected entry leaves the unit untouched.
        let mut next = self.settings.clone();
        for state in &info.properties {
            next.write(&self.component, self.initialized, state.key, &state.data)?;
        }
        for state in &info.parameters {
            next.set_parameter(&self.component, state.key, state.value)?;
        }
        self.settings = next;
        Ok(())
    }

    fn validate(&self) -> NativeResult<()> {
        let formats = self.settings.input_formats.iter().chain(&self.settings.output_formats);
        for format in formats {
            if !format.is_valid() || format.format_id != FORMAT_LINEAR_PCM {
                return Err(Status::FORMAT_NOT_SUPPORTED);
            }
        }
        if self.settings.max_frames == 0 {
            return Err(Status::FAILED_INITIALIZATION);
        }
        let supported = &self.component.supported_channels;
        if !supported.is_empty() {
            let channels = |formats: &[StreamFormat]| formats.first().map_or(0, |f| f.channels_per_frame);
            let inputs = channels(&self.settings.input_formats);
            let outputs = channels(&self.settings.output_formats);
            if !supported.iter().any(|c| c.admits(inputs, outputs)) {
                return Err(Status::FORMAT_NOT_SUPPORTED);
            }
        }
        Ok(())
    }

    fn render(&mut self, bus: u32, frames: u32) -> NativeResult<AudioBufferList> {
        if !self.initialized {
            return Err(Status::UNINITIALIZED);
        }
        if frames > self.settings.max_frames {
            return Err(Status::TOO_MANY_FRAMES_TO_PROCESS);
        }
        let channels = self
            .settings
            .input_formats
            .get(bus as usize)
            .ok_or(Status::INVALID_ELEMENT)?
            .channels_per_frame as usize;
        let timestamp = TimeStamp {
            sample_time: self.sample_time,
            host_time: 0,
        };
        let callback = self
            .render_callbacks
            .get_mut(&bus)
            .ok_or(Status::NO_CONNECTION)?;
        let mut buffers = AudioBufferList::new(channels, frames as usize);
        let mut args = RenderArgs {
            flags: RenderFlags::default(),
            timestamp: &timestamp,
            bus,
            frames,
            buffers: &mut buffers,
        };
        let status = callback.call(&mut args);
        self.sample_time += f64::from(frames);
        if status.is_err() {
            return Err(status);
        }
        Ok(buffers)
    }
}

#[derive(Debug, Default)]
struct Counters {
    instantiated: AtomicUsize,
    disposed: AtomicUsize,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A live in-memory instance as seen by the host wrapper
struct MemoryUnit {
    state: Arc<Mutex<MemoryState>>,
    counters: Arc<Counters>,
}

impl MemoryUnit {
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.state)
    }
}

impl NativeUnit for MemoryUnit {
    fn initialize(&mut self) -> NativeResult<()> {
        let mut state = self.lock();
        if state.initialized {
            return Ok(());
        }
        state.validate()?;
        state.initialized = true;
        state.initialize_count += 1;
        Ok(())
    }

    fn uninitialize(&mut self) {
        let mut state = self.lock();
        state.initialized = false;
        state.running = false;
    }

    fn reset(&mut self, _scope: Scope, _element: u32) -> NativeResult<()> {
        let mut state = self.lock();
        state.reset_count += 1;
        state.sample_time = 0.0;
        Ok(())
    }

    fn property_info(&self, key: PropertyKey) -> NativeResult<PropertyInfo> {
        let state = self.lock();
        let write_only = |size: u32| PropertyInfo {
            size,
            writable: true,
        };
        match key.id {
            property::SET_RENDER_CALLBACK => {
                state.settings.bus(key.scope, key.element)?;
                if key.scope != Scope::Input {
                    return Err(Status::INVALID_SCOPE);
                }
                Ok(write_only(16))
            }
            property::HOST_CALLBACKS | property::SET_EXTERNAL_BUFFER => {
                global_only(key)?;
                Ok(write_only(16))
            }
            _ => {
                let data = state.settings.read(&state.component, state.last_render_error, key)?;
                Ok(PropertyInfo {
                    size: data.len() as u32,
                    writable: is_writable(&state.component, key),
                })
            }
        }
    }

    fn get_property(&self, key: PropertyKey) -> NativeResult<Vec<u8>> {
        let state = self.lock();
        state.settings.read(&state.component, state.last_render_error, key)
    }

    fn set_property(&mut self, key: PropertyKey, data: &[u8]) -> NativeResult<()> {
        let mut state = self.lock();
        if key.id == property::CLASS_INFO {
            global_only(key)?;
            let info: ClassInfo =
                serde_json::from_slice(data).map_err(|_| Status::INVALID_PROPERTY_VALUE)?;
            return state.set_class_info(&info);
        }
        let state = &mut *state;
        state.settings.write(&state.component, state.initialized, key, data)
    }

    fn get_parameter(&self, key: ParameterKey) -> NativeResult<f32> {
        let state = self.lock();
        state.settings.parameter(&state.component, key)
    }

    fn set_parameter(&mut self, key: ParameterKey, value: f32) -> NativeResult<()> {
        let mut state = self.lock();
        let state = &mut *state;
        state.settings.set_parameter(&state.component, key, value)
    }

    fn parameter_list(&self, scope: Scope) -> NativeResult<Vec<ParameterId>> {
        let state = self.lock();
        Ok(state
            .component
            .parameters
            .iter()
            .filter(|(s, _, _)| *s == scope)
            .map(|(_, id, _)| *id)
            .collect())
    }

    fn parameter_info(&self, id: ParameterId, scope: Scope) -> NativeResult<ParameterInfo> {
        self.lock()
            .component
            .find_parameter(scope, id)
            .cloned()
            .ok_or(Status::INVALID_PARAMETER)
    }

    fn class_info(&self) -> NativeResult<ClassInfo> {
        let state = self.lock();
        Ok(state.settings.class_info(&state.component))
    }

    fn set_class_info(&mut self, info: &ClassInfo) -> NativeResult<()> {
        self.lock().set_class_info(info)
    }

    fn factory_presets(&self) -> NativeResult<Vec<FactoryPreset>> {
        Ok(self
            .lock()
            .component
            .presets
            .iter()
            .map(|(preset, _)| preset.clone())
            .collect())
    }

    fn set_present_preset(&mut self, preset: &FactoryPreset) -> NativeResult<()> {
        let mut state = self.lock();
        let state = &mut *state;
        let values = state
            .component
            .presets
            .iter()
            .find(|(p, _)| p == preset)
            .map(|(_, values)| values.clone())
            .ok_or(Status::INVALID_PROPERTY_VALUE)?;
        let mut next = state.settings.clone();
        for (id, value) in values {
            next.set_parameter(&state.component, ParameterKey::global(id), value)?;
        }
        state.settings = next;
        Ok(())
    }

    fn set_render_callback(
        &mut self,
        element: u32,
        callback: Option<RenderCallback>,
    ) -> NativeResult<()> {
        let mut state = self.lock();
        state.settings.bus(Scope::Input, element)?;
        match callback {
            Some(callback) => {
                state.render_callbacks.insert(element, callback);
            }
            None => {
                state.render_callbacks.remove(&element);
            }
        }
        Ok(())
    }

    fn set_host_callbacks(&mut self, callbacks: Option<HostCallbacks>) -> NativeResult<()> {
        self.lock().host_callbacks = callbacks;
        Ok(())
    }

    fn set_external_buffer(&mut self, buffer: Option<ExternalBuffer>) -> NativeResult<()> {
        let mut state = self.lock();
        if state.initialized {
            return Err(Status::CANNOT_DO_IN_CURRENT_CONTEXT);
        }
        state.external_buffer = buffer;
        Ok(())
    }

    fn start(&mut self) -> NativeResult<()> {
        let mut state = self.lock();
        if state.component.description.kind != kind::OUTPUT {
            return Err(Status::UNIMPLEMENTED);
        }
        if !state.initialized {
            return Err(Status::UNINITIALIZED);
        }
        state.running = true;
        Ok(())
    }

    fn stop(&mut self) -> NativeResult<()> {
        let mut state = self.lock();
        if state.component.description.kind != kind::OUTPUT {
            return Err(Status::UNIMPLEMENTED);
        }
        state.running = false;
        Ok(())
    }
}

impl Drop for MemoryUnit {
    fn drop(&mut self) {
        self.counters.disposed.fetch_add(1, Ordering::SeqCst);
        trace!("disposed {}", self.lock().component.description);
    }
}

/// Render-side view of a live in-memory instance
#[derive(Clone)]
pub struct MemoryInstance {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryInstance {
    /// Pull `frames` frames through the render callback installed on input `bus`,
    /// as the graph engine would. Failures are remembered as the last render error.
    pub fn pull(&self, bus: u32, frames: u32) -> NativeResult<AudioBufferList> {
        let mut state = lock(&self.state);
        let result = state.render(bus, frames);
        if let Err(status) = &result {
            state.last_render_error = *status;
        }
        result
    }

    /// Whether the instance is initialized
    pub fn is_initialized(&self) -> bool {
        lock(&self.state).initialized
    }

    /// Whether output is started
    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    /// Current parameter value, including unset defaults
    pub fn parameter(&self, key: ParameterKey) -> Option<f32> {
        let state = lock(&self.state);
        state.settings.parameter(&state.component, key).ok()
    }

    /// Whether a render callback is installed on input `bus`
    pub fn has_render_callback(&self, bus: u32) -> bool {
        lock(&self.state).render_callbacks.contains_key(&bus)
    }

    /// Ask the installed host callbacks for beat and tempo
    pub fn host_beat_and_tempo(&self) -> Option<BeatAndTempo> {
        lock(&self.state)
            .host_callbacks
            .as_ref()
            .and_then(HostCallbacks::beat_and_tempo)
    }

    /// Size of the lent external buffer, if any
    pub fn external_buffer_len(&self) -> Option<usize> {
        lock(&self.state).external_buffer.as_ref().map(ExternalBuffer::len)
    }

    /// Successful initializations so far
    pub fn initialize_count(&self) -> usize {
        lock(&self.state).initialize_count
    }

    /// Resets so far
    pub fn reset_count(&self) -> usize {
        lock(&self.state).reset_count
    }
}

impl fmt::Debug for MemoryInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("MemoryInstance")
            .field("description", &state.component.description)
            .field("initialized", &state.initialized)
            .field("running", &state.running)
            .finish()
    }
}

/// Factory of in-memory components
#[derive(Default)]
pub struct MemoryFactory {
    components: Mutex<Vec<MemoryComponent>>,
    instances: Mutex<Vec<Weak<Mutex<MemoryState>>>>,
    counters: Arc<Counters>,
    reject_instantiation: AtomicBool,
}

impl MemoryFactory {
    /// An empty factory
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a component available; returns its handle
    pub fn register(&self, component: MemoryComponent) -> ComponentRef {
        let mut components = self.components.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("registered {}", component.description);
        components.push(component);
        ComponentRef(components.len() as u32 - 1)
    }

    /// Instances created so far
    pub fn instantiated(&self) -> usize {
        self.counters.instantiated.load(Ordering::SeqCst)
    }

    /// Instances disposed so far
    pub fn disposed(&self) -> usize {
        self.counters.disposed.load(Ordering::SeqCst)
    }

    /// Instances alive right now
    pub fn live(&self) -> usize {
        self.instantiated() - self.disposed()
    }

    /// Make every following instantiation fail, as when resources run out
    pub fn set_reject_instantiation(&self, reject: bool) {
        self.reject_instantiation.store(reject, Ordering::SeqCst);
    }

    /// Handles to every live instance, oldest first
    pub fn instances(&self) -> Vec<MemoryInstance> {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .map(|state| MemoryInstance { state })
            .collect()
    }

    /// The most recently created live instance
    pub fn last_instance(&self) -> Option<MemoryInstance> {
        self.instances().pop()
    }
}

impl ComponentFactory for MemoryFactory {
    fn find(&self, description: &ComponentDescription) -> Vec<ComponentRef> {
        self.components
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .enumerate()
            .filter(|(_, c)| description.matches(&c.description))
            .map(|(i, _)| ComponentRef(i as u32))
            .collect()
    }

    fn description(&self, component: ComponentRef) -> Option<ComponentDescription> {
        self.components
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(component.0 as usize)
            .map(|c| c.description)
    }

    fn instantiate(&self, component: ComponentRef) -> NativeResult<Box<dyn NativeUnit>> {
        if self.reject_instantiation.load(Ordering::SeqCst) {
            return Err(Status::MEM_FULL);
        }
        let template = self
            .components
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(component.0 as usize)
            .cloned()
            .ok_or(Status::INVALID_COMPONENT_ID)?;
        let state = Arc::new(Mutex::new(MemoryState::new(template)));
        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        instances.retain(|weak| weak.strong_count() > 0);
        instances.push(Arc::downgrade(&state));
        self.counters.instantiated.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryUnit {
            state,
            counters: Arc::clone(&self.counters),
        }))
    }
}

impl fmt::Debug for MemoryFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryFactory")
            .field("instantiated", &self.instantiated())
            .field("disposed", &self.disposed())
            .finish()
    }
}

#[derive(Debug)]
struct Topology {
    nodes: BTreeMap<NodeId, ComponentDescription>,
    edges: Vec<GraphConnection>,
    next_node: u32,
    updates: usize,
    fail_updates: bool,
    max_buses: u32,
}

/// In-memory graph engine.
///
/// Clones share one topology, so a test can keep a clone for inspection
/// after handing the graph to a [`GraphContext`](crate::graph::GraphContext).
#[derive(Debug, Clone)]
pub struct MemoryGraph {
    topology: Arc<Mutex<Topology>>,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::with_max_buses(8)
    }
}

impl MemoryGraph {
    /// An empty graph accepting buses 0..8
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty graph rejecting connections on buses at or above `max_buses`
    pub fn with_max_buses(max_buses: u32) -> Self {
        Self {
            topology: Arc::new(Mutex::new(Topology {
                nodes: BTreeMap::new(),
                edges: Vec::new(),
                next_node: 1,
                updates: 0,
                fail_updates: false,
                max_buses,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Topology> {
        self.topology.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Nodes currently in the graph
    pub fn nodes(&self) -> Vec<NodeId> {
        self.lock().nodes.keys().copied().collect()
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }

    /// Successful updates so far
    pub fn update_count(&self) -> usize {
        self.lock().updates
    }

    /// Make every following update fail
    pub fn set_fail_updates(&self, fail: bool) {
        self.lock().fail_updates = fail;
    }
}

impl AudioGraph for MemoryGraph {
    fn add_node(&mut self, description: &ComponentDescription) -> NativeResult<NodeId> {
        let mut topology = self.lock();
        let node = NodeId(topology.next_node);
        topology.next_node += 1;
        topology.nodes.insert(node, *description);
        Ok(node)
    }

    fn remove_node(&mut self, node: NodeId) -> NativeResult<()> {
        let mut topology = self.lock();
        topology.nodes.remove(&node).ok_or(Status::NODE_NOT_FOUND)?;
        topology.edges.retain(|e| e.source != node && e.dest != node);
        Ok(())
    }

    fn connect(&mut self, source: NodeId, source_bus: u32, dest: NodeId, dest_bus: u32) -> NativeResult<()> {
        let mut topology = self.lock();
        if !topology.nodes.contains_key(&source) || !topology.nodes.contains_key(&dest) {
            return Err(Status::NODE_NOT_FOUND);
        }
        let taken = topology
            .edges
            .iter()
            .any(|e| e.dest == dest && e.dest_bus == dest_bus);
        if source == dest
            || source_bus >= topology.max_buses
            || dest_bus >= topology.max_buses
            || taken
        {
            return Err(Status::INVALID_CONNECTION);
        }
        topology.edges.push(GraphConnection {
            source,
            source_bus,
            dest,
            dest_bus,
        });
        Ok(())
    }

    fn disconnect(&mut self, dest: NodeId, dest_bus: u32) -> NativeResult<()> {
        let mut topology = self.lock();
        if !topology.nodes.contains_key(&dest) {
            return Err(Status::NODE_NOT_FOUND);
        }
        topology
            .edges
            .retain(|e| !(e.dest == dest && e.dest_bus == dest_bus));
        Ok(())
    }

    fn update(&mut self) -> NativeResult<()> {
        let mut topology = self.lock();
        if topology.fail_updates {
            return Err(Status::CANNOT_DO_IN_CURRENT_CONTEXT);
        }
        topology.updates += 1;
        Ok(())
    }

    fn connections(&self) -> Vec<GraphConnection> {
        self.lock().edges.clone()
    }
}
