//! # au-host
//!
//! A typed, host-side facade for audio unit components: lifecycle
//! management, property and parameter access, graph wiring, presets and
//! result-code tracking.
//!
//! ## Quick Start
//!
//! ```no_run
//! use au_host::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let factory = Arc::new(MemoryFactory::new());
//! factory.register(
//!     MemoryComponent::new(ComponentDescription::new(
//!         kind::EFFECT,
//!         FourCc::new(b"gain"),
//!         FourCc::new(b"demo"),
//!     ))
//!     .parameter(0, "Gain", 0.0, 1.0, 1.0),
//! );
//!
//! // Resolve, open, apply 44.1 kHz stereo and initialize
//! let mut unit = AudioUnit::builder(factory)
//!     .triple(kind::EFFECT, FourCc::ANY, FourCc::ANY)
//!     .sample_rate(44100.0)
//!     .channels(2)
//!     .initialize(true)
//!     .build()?;
//!
//! unit.set_parameter(ParameterKey::global(0), 0.5)?;
//! assert_eq!(unit.parameter(ParameterKey::global(0))?, 0.5);
//!
//! unit.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod audio;
pub mod backends;
pub mod descriptor;
pub mod error;
pub mod factory;
pub mod format;
pub mod graph;
pub mod host;
pub mod parameters;
pub mod presets;
pub mod properties;
pub mod render;
pub mod tracker;
pub mod unit;

mod connection;

pub use audio::{AudioBufferList, RenderFlags, TimeStamp};
pub use descriptor::{kind, ComponentDescription, ComponentDescriptor, ComponentRef, FourCc};
pub use error::{Error, Result, Status};
pub use factory::{ComponentFactory, NativeResult, NativeUnit};
pub use format::{ChannelInfo, StreamFormat};
pub use graph::{AudioGraph, GraphConnection, GraphContext, NodeId};
pub use host::{AudioUnitBuilder, UnitConfig};
pub use parameters::{ParameterBatch, ParameterId, ParameterInfo, ParameterKey, ParameterUnit};
pub use presets::{ClassInfo, FactoryPreset, Preset, PresetSnapshot};
pub use properties::{property, PropertyInfo, PropertyKey, PropertyValue, Scope, ValueKind};
pub use render::{BeatAndTempo, ExternalBuffer, HostCallbacks, MusicalTimeLocation, RenderArgs, RenderCallback};
pub use tracker::{ErrorTracker, RenderErrorSlot};
pub use unit::{AudioUnit, Duplicate, UnitState};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        audio::{AudioBufferList, TimeStamp},
        backends::{MemoryComponent, MemoryFactory, MemoryGraph},
        descriptor::{kind, ComponentDescription, FourCc},
        error::{Error, Result, Status},
        format::StreamFormat,
        graph::GraphContext,
        host::UnitConfig,
        parameters::{ParameterInfo, ParameterKey},
        presets::{Preset, PresetSnapshot},
        properties::{property, PropertyKey, PropertyValue, Scope},
        render::{HostCallbacks, RenderArgs, RenderCallback},
        unit::{AudioUnit, Duplicate, UnitState},
    };

    #[cfg(feature = "cpal-backend")]
    pub use crate::backends::CpalOutputFactory;
}
