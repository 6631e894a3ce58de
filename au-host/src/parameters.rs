//! Parameter types and accessors

use crate::{
    error::{Error, Result},
    properties::Scope,
    unit::AudioUnit,
};
use log::trace;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Parameter identifier
pub type ParameterId = u32;

/// Address of a parameter
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ParameterKey {
    /// Parameter identifier
    pub id: ParameterId,
    /// Scope the parameter lives in
    pub scope: Scope,
    /// Bus within the scope
    pub element: u32,
}

impl ParameterKey {
    /// Create a key
    pub const fn new(id: ParameterId, scope: Scope, element: u32) -> Self {
        Self { id, scope, element }
    }

    /// Key in the global scope, element 0
    pub const fn global(id: ParameterId) -> Self {
        Self::new(id, Scope::Global, 0)
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}/{}", self.id, self.scope, self.element)
    }
}

/// Unit of measure of a parameter
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum ParameterUnit {
    /// Plain number
    #[default]
    Generic,
    /// Index into a list of values
    Indexed,
    /// On/off switch
    Boolean,
    /// Percentage
    Percent,
    /// Seconds
    Seconds,
    /// Sample frames
    SampleFrames,
    /// Phase in degrees
    Phase,
    /// Rate multiplier
    Rate,
    /// Frequency
    Hertz,
    /// Pitch in cents
    Cents,
    /// Pitch in semitones
    RelativeSemiTones,
    /// MIDI note number
    MidiNoteNumber,
    /// Level in decibels
    Decibels,
    /// Linear gain factor
    LinearGain,
    /// Angle
    Degrees,
    /// Stereo position
    Pan,
    /// Milliseconds
    Milliseconds,
    /// Ratio
    Ratio,
    /// Tempo
    Bpm,
    /// Musical beats
    Beats,
}

impl ParameterUnit {
    /// Short label appended to formatted values
    pub fn abbreviation(self) -> &'static str {
        match self {
            ParameterUnit::Percent => "%",
            ParameterUnit::Seconds => "s",
            ParameterUnit::SampleFrames => "smp",
            ParameterUnit::Phase | ParameterUnit::Degrees => "°",
            ParameterUnit::Hertz => "Hz",
            ParameterUnit::Cents => "ct",
            ParameterUnit::RelativeSemiTones => "st",
            ParameterUnit::Decibels => "dB",
            ParameterUnit::Milliseconds => "ms",
            ParameterUnit::Bpm => "BPM",
            ParameterUnit::Beats => "beats",
            ParameterUnit::Ratio => ":1",
            _ => "",
        }
    }
}

/// Parameter flag bits
pub mod parameter_flags {
    /// Values are displayed on a logarithmic scale
    pub const DISPLAY_LOGARITHMIC: u32 = 1 << 22;
    /// Parameter is not safe to change from the render context
    pub const NON_REAL_TIME: u32 = 1 << 24;
    /// Parameter supports ramped changes
    pub const CAN_RAMP: u32 = 1 << 25;
    /// Parameter is for expert use
    pub const EXPERT_MODE: u32 = 1 << 26;
    /// Value is a global meta parameter
    pub const IS_GLOBAL_META: u32 = 1 << 28;
    /// Value is a per-element meta parameter
    pub const IS_ELEMENT_META: u32 = 1 << 29;
    /// Parameter can be read
    pub const IS_READABLE: u32 = 1 << 30;
    /// Parameter can be written
    pub const IS_WRITABLE: u32 = 1 << 31;
}

/// Static metadata of a parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    /// Display name
    pub name: String,
    /// Unit of measure
    pub unit: ParameterUnit,
    /// Minimum value
    pub min_value: f32,
    /// Maximum value
    pub max_value: f32,
    /// Default value
    pub default_value: f32,
    /// See [`parameter_flags`]
    pub flags: u32,
}

impl ParameterInfo {
    /// Whether the parameter can be read
    pub fn is_readable(&self) -> bool {
        self.flags & parameter_flags::IS_READABLE != 0
    }

    /// Whether the parameter can be written
    pub fn is_writable(&self) -> bool {
        self.flags & parameter_flags::IS_WRITABLE != 0
    }

    /// Clamp a value into the parameter's range
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min_value, self.max_value)
    }

    /// Convert a plain value to 0.0..=1.0
    pub fn normalize(&self, value: f32) -> f32 {
        let span = self.max_value - self.min_value;
        if span.abs() < f32::EPSILON {
            0.0
        } else {
            ((value - self.min_value) / span).clamp(0.0, 1.0)
        }
    }

    /// Convert 0.0..=1.0 to a plain value
    pub fn denormalize(&self, normalized: f32) -> f32 {
        self.min_value + normalized.clamp(0.0, 1.0) * (self.max_value - self.min_value)
    }

    /// Format a plain value with its unit
    pub fn format_value(&self, value: f32) -> String {
        match self.unit {
            ParameterUnit::Boolean => {
                if value >= 0.5 {
                    "On".to_string()
                } else {
                    "Off".to_string()
                }
            }
            ParameterUnit::Indexed | ParameterUnit::MidiNoteNumber => format!("{:.0}", value),
            unit => {
                let label = unit.abbreviation();
                if label.is_empty() {
                    format!("{:.3}", value)
                } else {
                    format!("{:.3} {}", value, label)
                }
            }
        }
    }
}

/// Batch parameter update; writes stop at the first failure
pub struct ParameterBatch<'a> {
    updates: Vec<(ParameterKey, f32)>,
    unit: &'a mut AudioUnit,
}

impl<'a> ParameterBatch<'a> {
    pub(crate) fn new(unit: &'a mut AudioUnit) -> Self {
        Self {
            updates: Vec::new(),
            unit,
        }
    }

    /// Queue a write
    pub fn set(&mut self, key: ParameterKey, value: f32) -> &mut Self {
        self.updates.push((key, value));
        self
    }

    /// Apply all queued writes in order
    pub fn apply(self) -> Result<()> {
        for (key, value) in self.updates {
            self.unit.set_parameter(key, value)?;
        }
        Ok(())
    }
}

impl AudioUnit {
    /// Set a parameter value
    pub fn set_parameter(&mut self, key: ParameterKey, value: f32) -> Result<()> {
        trace!("set parameter {} = {}", key, value);
        let result = self
            .native_mut()
            .and_then(|unit| unit.set_parameter(key, value).map_err(Error::NativeFailure));
        self.record(result)
    }

    /// Read a parameter value
    pub fn parameter(&self, key: ParameterKey) -> Result<f32> {
        trace!("get parameter {}", key);
        let result = self
            .native()
            .and_then(|unit| unit.get_parameter(key).map_err(Error::NativeFailure));
        self.record(result)
    }

    /// Set a parameter on an input bus
    pub fn set_input_parameter(&mut self, id: ParameterId, element: u32, value: f32) -> Result<()> {
        self.set_parameter(ParameterKey::new(id, Scope::Input, element), value)
    }

    /// Read a parameter on an input bus
    pub fn input_parameter(&self, id: ParameterId, element: u32) -> Result<f32> {
        self.parameter(ParameterKey::new(id, Scope::Input, element))
    }

    /// Set a parameter on an output bus
    pub fn set_output_parameter(&mut self, id: ParameterId, element: u32, value: f32) -> Result<()> {
        self.set_parameter(ParameterKey::new(id, Scope::Output, element), value)
    }

    /// Read a parameter on an output bus
    pub fn output_parameter(&self, id: ParameterId, element: u32) -> Result<f32> {
        self.parameter(ParameterKey::new(id, Scope::Output, element))
    }

    /// Parameter identifiers of a scope, in the order the unit enumerates them
    pub fn parameter_list(&self, scope: Scope) -> Result<Vec<ParameterId>> {
        let result = self
            .native()
            .and_then(|unit| unit.parameter_list(scope).map_err(Error::NativeFailure));
        self.record(result)
    }

    /// Metadata of one parameter. Only available once the unit is open.
    pub fn parameter_info(&self, id: ParameterId, scope: Scope) -> Result<ParameterInfo> {
        let result = self
            .native()
            .and_then(|unit| unit.parameter_info(id, scope).map_err(Error::NativeFailure));
        self.record(result)
    }

    /// Find a global parameter by display name
    pub fn find_parameter(&self, name: &str) -> Result<(ParameterId, ParameterInfo)> {
        for id in self.parameter_list(Scope::Global)? {
            let info = self.parameter_info(id, Scope::Global)?;
            if info.name == name {
                return Ok((id, info));
            }
        }
        let result = Err(Error::NativeFailure(crate::error::Status::INVALID_PARAMETER));
        self.record(result)
    }

    /// Create a batch parameter update
    pub fn update_parameters<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut ParameterBatch<'_>),
    {
        let mut batch = ParameterBatch::new(self);
        f(&mut batch);
        batch.apply()
    }
}
