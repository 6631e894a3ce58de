//! Unit configuration and builder

use crate::{
    descriptor::{ComponentDescription, ComponentDescriptor, ComponentRef, FourCc},
    error::{Error, Result},
    factory::ComponentFactory,
    format::StreamFormat,
    properties::Scope,
    unit::AudioUnit,
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stream configuration applied by [`AudioUnitBuilder`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitConfig {
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Channels per bus
    pub channels: u32,
    /// Largest slice the unit will be asked to render
    pub max_frames_per_slice: u32,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            channels: 2,
            max_frames_per_slice: 512,
        }
    }
}

impl UnitConfig {
    /// The float32 stream format for this configuration
    pub fn stream_format(&self) -> StreamFormat {
        StreamFormat::float32(self.sample_rate, self.channels)
    }
}

enum Target {
    Unset,
    Description(ComponentDescription),
    Component(ComponentRef),
}

/// Builder that resolves, opens, configures and optionally initializes a unit
pub struct AudioUnitBuilder {
    factory: Arc<dyn ComponentFactory>,
    target: Target,
    config: UnitConfig,
    open: bool,
    initialize: bool,
}

impl AudioUnitBuilder {
    pub(crate) fn new(factory: Arc<dyn ComponentFactory>) -> Self {
        Self {
            factory,
            target: Target::Unset,
            config: UnitConfig::default(),
            open: true,
            initialize: false,
        }
    }

    /// Component to resolve; zero fields match anything
    pub fn description(mut self, description: ComponentDescription) -> Self {
        self.target = Target::Description(description);
        self
    }

    /// Component to resolve, as a triple
    pub fn triple(self, kind: FourCc, subtype: FourCc, vendor: FourCc) -> Self {
        self.description(ComponentDescription::new(kind, subtype, vendor))
    }

    /// An already-known component handle
    pub fn component(mut self, component: ComponentRef) -> Self {
        self.target = Target::Component(component);
        self
    }

    /// Set the sample rate
    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.config.sample_rate = rate;
        self
    }

    /// Set the channel count of the main buses
    pub fn channels(mut self, channels: u32) -> Self {
        self.config.channels = channels;
        self
    }

    /// Set the maximum frames per slice
    pub fn max_frames_per_slice(mut self, frames: u32) -> Self {
        self.config.max_frames_per_slice = frames;
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: UnitConfig) -> Self {
        self.config = config;
        self
    }

    /// Open the unit (default: yes)
    pub fn open(mut self, open: bool) -> Self {
        self.open = open;
        self
    }

    /// Initialize the unit after configuring it (default: no). Implies open.
    pub fn initialize(mut self, initialize: bool) -> Self {
        self.initialize = initialize;
        self
    }

    /// Build the unit.
    ///
    /// When opened, the configured float32 format is applied to output bus 0
    /// and, for units with audio input, input bus 0; then the maximum frames
    /// per slice. Properties the unit does not implement are skipped.
    pub fn build(self) -> Result<AudioUnit> {
        let descriptor = match self.target {
            Target::Unset => {
                return Err(Error::LookupFailed(ComponentDescription::default()));
            }
            Target::Description(description) => {
                ComponentDescriptor::resolve(self.factory.as_ref(), description)?
            }
            Target::Component(component) => {
                ComponentDescriptor::resolve_by_reference(self.factory.as_ref(), component)?
            }
        };
        let mut unit = AudioUnit::new(descriptor, self.factory);
        if !(self.open || self.initialize) {
            return Ok(unit);
        }

        unit.open()?;
        let format = self.config.stream_format();
        skip_unsupported(unit.set_stream_format(Scope::Output, 0, &format))?;
        if unit.description().has_audio_input() {
            skip_unsupported(unit.set_stream_format(Scope::Input, 0, &format))?;
        }
        skip_unsupported(unit.set_max_frames_per_slice(self.config.max_frames_per_slice))?;
        debug!(
            "configured {} at {} Hz, {} channels",
            unit.descriptor(),
            self.config.sample_rate,
            self.config.channels
        );

        if self.initialize {
            unit.initialize()?;
        }
        Ok(unit)
    }
}

fn skip_unsupported(result: Result<()>) -> Result<()> {
    match result {
        Err(Error::PropertyUnsupported { .. }) => Ok(()),
        other => other,
    }
}
