//! Typed access to a unit's property space
//!
//! Properties are addressed by `(id, scope, element)` and carried as opaque
//! byte buffers. [`PropertyValue`] gives the handful of shapes the host
//! actually uses (32-bit unsigned, 32/64-bit float, raw bytes) explicit
//! conversions to and from those buffers.

use crate::{
    error::{Error, Result, Status},
    unit::AudioUnit,
};
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Property identifier
pub type PropertyId = u32;

/// Well-known property identifiers
pub mod property {
    use super::PropertyId;

    /// Complete restorable state
    pub const CLASS_INFO: PropertyId = 0;
    /// Connection made through the property interface
    pub const MAKE_CONNECTION: PropertyId = 1;
    /// Sample rate of a bus (f64)
    pub const SAMPLE_RATE: PropertyId = 2;
    /// Parameter identifiers of a scope
    pub const PARAMETER_LIST: PropertyId = 3;
    /// Metadata of one parameter
    pub const PARAMETER_INFO: PropertyId = 4;
    /// Maximum CPU load, 0.0..=1.0 (f32)
    pub const CPU_LOAD: PropertyId = 6;
    /// Stream format of a bus
    pub const STREAM_FORMAT: PropertyId = 8;
    /// Number of buses in a scope (u32)
    pub const ELEMENT_COUNT: PropertyId = 11;
    /// Processing latency in seconds (f64)
    pub const LATENCY: PropertyId = 12;
    /// Supported input/output channel configurations
    pub const SUPPORTED_NUM_CHANNELS: PropertyId = 13;
    /// Largest slice the unit will be asked to render (u32)
    pub const MAXIMUM_FRAMES_PER_SLICE: PropertyId = 14;
    /// Host-supplied scratch buffer
    pub const SET_EXTERNAL_BUFFER: PropertyId = 15;
    /// Decay time after input stops, in seconds (f64)
    pub const TAIL_TIME: PropertyId = 20;
    /// Effect bypass flag (u32, non-zero = bypassed)
    pub const BYPASS_EFFECT: PropertyId = 21;
    /// Last error raised while rendering (i32)
    pub const LAST_RENDER_ERROR: PropertyId = 22;
    /// Input render callback
    pub const SET_RENDER_CALLBACK: PropertyId = 23;
    /// Presets shipped with the component
    pub const FACTORY_PRESETS: PropertyId = 24;
    /// Render quality, 0..=127 (u32)
    pub const RENDER_QUALITY: PropertyId = 26;
    /// Host musical-time callbacks
    pub const HOST_CALLBACKS: PropertyId = 27;
    /// Currently selected preset
    pub const PRESENT_PRESET: PropertyId = 36;

    /// Properties that shape render resources and may only change while uninitialized
    pub fn is_structural(id: PropertyId) -> bool {
        matches!(
            id,
            SAMPLE_RATE
                | STREAM_FORMAT
                | ELEMENT_COUNT
                | MAXIMUM_FRAMES_PER_SLICE
                | SET_EXTERNAL_BUFFER
        )
    }
}

/// Configuration namespace within a unit
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum Scope {
    /// Unit-wide settings
    Global,
    /// Input buses
    Input,
    /// Output buses
    Output,
    /// Group (e.g. MIDI channel) scope
    Group,
    /// Multitimbral part scope
    Part,
    /// Per-note scope
    Note,
}

impl Scope {
    /// Numeric scope code
    pub fn raw(self) -> u32 {
        match self {
            Scope::Global => 0,
            Scope::Input => 1,
            Scope::Output => 2,
            Scope::Group => 3,
            Scope::Part => 4,
            Scope::Note => 5,
        }
    }

    /// Scope for a numeric code
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Scope::Global),
            1 => Some(Scope::Input),
            2 => Some(Scope::Output),
            3 => Some(Scope::Group),
            4 => Some(Scope::Part),
            5 => Some(Scope::Note),
            _ => None,
        }
    }
}

/// Address of a property
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct PropertyKey {
    /// Property identifier, see [`property`]
    pub id: PropertyId,
    /// Scope the property lives in
    pub scope: Scope,
    /// Bus within the scope
    pub element: u32,
}

impl PropertyKey {
    /// Create a key
    pub const fn new(id: PropertyId, scope: Scope, element: u32) -> Self {
        Self { id, scope, element }
    }

    /// Key in the global scope, element 0
    pub const fn global(id: PropertyId) -> Self {
        Self::new(id, Scope::Global, 0)
    }

    /// Key on an input bus
    pub const fn input(id: PropertyId, element: u32) -> Self {
        Self::new(id, Scope::Input, element)
    }

    /// Key on an output bus
    pub const fn output(id: PropertyId, element: u32) -> Self {
        Self::new(id, Scope::Output, element)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}/{}", self.id, self.scope, self.element)
    }
}

/// Size and writability of a property
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PropertyInfo {
    /// Size in bytes of the property value
    pub size: u32,
    /// Whether the property accepts writes
    pub writable: bool,
}

/// Shape of a property value
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ValueKind {
    /// 32-bit unsigned integer
    U32,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Opaque bytes
    Raw,
}

/// A property value in one of the supported shapes
#[derive(Clone, PartialEq, Debug)]
pub enum PropertyValue {
    /// 32-bit unsigned integer
    U32(u32),
    /// 32-bit float
    F32(f32),
    /// 64-bit float
    F64(f64),
    /// Opaque bytes
    Raw(Vec<u8>),
}

impl PropertyValue {
    /// Shape of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::U32(_) => ValueKind::U32,
            PropertyValue::F32(_) => ValueKind::F32,
            PropertyValue::F64(_) => ValueKind::F64,
            PropertyValue::Raw(_) => ValueKind::Raw,
        }
    }

    /// Little-endian byte encoding
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            PropertyValue::U32(v) => v.to_le_bytes().to_vec(),
            PropertyValue::F32(v) => v.to_le_bytes().to_vec(),
            PropertyValue::F64(v) => v.to_le_bytes().to_vec(),
            PropertyValue::Raw(bytes) => bytes.clone(),
        }
    }

    /// Decode `bytes` as `kind`; `None` if the size does not fit the shape
    pub fn decode(kind: ValueKind, bytes: &[u8]) -> Option<Self> {
        match kind {
            ValueKind::U32 => Some(PropertyValue::U32(u32::from_le_bytes(bytes.try_into().ok()?))),
            ValueKind::F32 => Some(PropertyValue::F32(f32::from_le_bytes(bytes.try_into().ok()?))),
            ValueKind::F64 => Some(PropertyValue::F64(f64::from_le_bytes(bytes.try_into().ok()?))),
            ValueKind::Raw => Some(PropertyValue::Raw(bytes.to_vec())),
        }
    }

    /// The value as `u32`, if it has that shape
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            PropertyValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `f32`, if it has that shape
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            PropertyValue::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as `f64`, if it has that shape
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::F64(v) => Some(*v),
            _ => None,
        }
    }
}

impl AudioUnit {
    /// Read a property as raw bytes
    pub fn property(&self, key: PropertyKey) -> Result<Vec<u8>> {
        let result = self.read_property(key);
        self.record(result)
    }

    /// Write a property from raw bytes
    pub fn set_property(&mut self, key: PropertyKey, data: &[u8]) -> Result<()> {
        let result = self.write_property(key, data);
        self.record(result)
    }

    /// Read a property and decode it as `kind`
    pub fn property_value(&self, key: PropertyKey, kind: ValueKind) -> Result<PropertyValue> {
        let result = self.read_property(key).and_then(|bytes| {
            PropertyValue::decode(kind, &bytes)
                .ok_or(Error::NativeFailure(Status::INVALID_PROPERTY_VALUE))
        });
        self.record(result)
    }

    /// Encode and write a property value
    pub fn set_property_value(&mut self, key: PropertyKey, value: &PropertyValue) -> Result<()> {
        self.set_property(key, &value.to_bytes())
    }

    /// Read a 32-bit unsigned property
    pub fn property_u32(&self, key: PropertyKey) -> Result<u32> {
        self.property_value(key, ValueKind::U32)
            .map(|v| v.as_u32().unwrap_or_default())
    }

    /// Read a 32-bit float property
    pub fn property_f32(&self, key: PropertyKey) -> Result<f32> {
        self.property_value(key, ValueKind::F32)
            .map(|v| v.as_f32().unwrap_or_default())
    }

    /// Read a 64-bit float property
    pub fn property_f64(&self, key: PropertyKey) -> Result<f64> {
        self.property_value(key, ValueKind::F64)
            .map(|v| v.as_f64().unwrap_or_default())
    }

    /// Write a 32-bit unsigned property
    pub fn set_property_u32(&mut self, key: PropertyKey, value: u32) -> Result<()> {
        self.set_property_value(key, &PropertyValue::U32(value))
    }

    /// Write a 32-bit float property
    pub fn set_property_f32(&mut self, key: PropertyKey, value: f32) -> Result<()> {
        self.set_property_value(key, &PropertyValue::F32(value))
    }

    /// Write a 64-bit float property
    pub fn set_property_f64(&mut self, key: PropertyKey, value: f64) -> Result<()> {
        self.set_property_value(key, &PropertyValue::F64(value))
    }

    /// Size and writability of a property
    pub fn property_info(&self, key: PropertyKey) -> Result<PropertyInfo> {
        let result = self
            .native()
            .and_then(|unit| unit.property_info(key).map_err(|s| Error::from_property(key, s)));
        self.record(result)
    }

    /// Size in bytes of a property value
    pub fn property_size(&self, key: PropertyKey) -> Result<u32> {
        self.property_info(key).map(|info| info.size)
    }

    /// Whether a property accepts writes; `false` when it is unsupported
    pub fn is_property_writable(&self, key: PropertyKey) -> bool {
        self.property_info(key)
            .map(|info| info.writable)
            .unwrap_or(false)
    }

    /// Bypass an effect
    pub fn set_bypassing(&mut self, bypass: bool) -> Result<()> {
        self.set_property_u32(PropertyKey::global(property::BYPASS_EFFECT), u32::from(bypass))
    }

    /// Whether the effect is bypassed
    pub fn is_bypassing(&self) -> Result<bool> {
        self.property_u32(PropertyKey::global(property::BYPASS_EFFECT))
            .map(|v| v != 0)
    }

    /// Processing latency in seconds
    pub fn latency(&self) -> Result<f64> {
        self.property_f64(PropertyKey::global(property::LATENCY))
    }

    /// Tail time in seconds
    pub fn tail_time(&self) -> Result<f64> {
        self.property_f64(PropertyKey::global(property::TAIL_TIME))
    }

    /// Limit the share of CPU the unit may use, 0.0..=1.0
    pub fn set_max_cpu_load(&mut self, load: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&load) {
            let result = Err(Error::NativeFailure(Status::INVALID_PROPERTY_VALUE));
            return self.record(result);
        }
        self.set_property_f32(PropertyKey::global(property::CPU_LOAD), load)
    }

    /// Maximum CPU load
    pub fn max_cpu_load(&self) -> Result<f32> {
        self.property_f32(PropertyKey::global(property::CPU_LOAD))
    }

    /// Set render quality, 0..=127
    pub fn set_render_quality(&mut self, quality: u32) -> Result<()> {
        if quality > 127 {
            let result = Err(Error::NativeFailure(Status::INVALID_PROPERTY_VALUE));
            return self.record(result);
        }
        self.set_property_u32(PropertyKey::global(property::RENDER_QUALITY), quality)
    }

    /// Render quality, 0..=127
    pub fn render_quality(&self) -> Result<u32> {
        self.property_u32(PropertyKey::global(property::RENDER_QUALITY))
    }

    pub(crate) fn read_property(&self, key: PropertyKey) -> Result<Vec<u8>> {
        trace!("get property {}", key);
        self.native()?
            .get_property(key)
            .map_err(|s| Error::from_property(key, s))
    }

    pub(crate) fn write_property(&mut self, key: PropertyKey, data: &[u8]) -> Result<()> {
        trace!("set property {} ({} bytes)", key, data.len());
        if property::is_structural(key.id) {
            self.ensure_reconfigurable("structural property")?;
        }
        self.native_mut()?
            .set_property(key, data)
            .map_err(|s| Error::from_property(key, s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_decode_by_shape() {
        let bytes = PropertyValue::F64(44100.0).to_bytes();
        assert_eq!(bytes.len(), 8);
        assert_eq!(
            PropertyValue::decode(ValueKind::F64, &bytes),
            Some(PropertyValue::F64(44100.0))
        );
        assert_eq!(PropertyValue::decode(ValueKind::U32, &bytes), None);
        assert_eq!(
            PropertyValue::decode(ValueKind::Raw, &bytes).map(|v| v.kind()),
            Some(ValueKind::Raw)
        );
    }

    #[test]
    fn scope_codes_round_trip() {
        for scope in [Scope::Global, Scope::Input, Scope::Output, Scope::Group, Scope::Part, Scope::Note] {
            assert_eq!(Scope::from_raw(scope.raw()), Some(scope));
        }
        assert_eq!(Scope::from_raw(42), None);
    }
}
