//! Factory presets and state snapshots
//!
//! A unit's complete restorable state is its [`ClassInfo`]. Snapshots wrap
//! a class info with a name and can be written to and read from JSON files.

use crate::{
    descriptor::ComponentDescription,
    error::{Error, Result},
    parameters::ParameterKey,
    properties::PropertyKey,
    unit::AudioUnit,
};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Version of the class info layout this crate produces and accepts
pub const CLASS_INFO_VERSION: u32 = 0;

/// A preset shipped with the component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryPreset {
    /// Component-defined preset number
    pub number: i32,
    /// Display name
    pub name: String,
}

/// One captured parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterState {
    /// Parameter address
    pub key: ParameterKey,
    /// Captured value
    pub value: f32,
}

/// One captured property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyState {
    /// Property address
    pub key: PropertyKey,
    /// Raw property bytes
    pub data: Vec<u8>,
}

/// Complete restorable state of a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Layout version, see [`CLASS_INFO_VERSION`]
    pub version: u32,
    /// Component the state was captured from
    pub description: ComponentDescription,
    /// Parameter values
    pub parameters: Vec<ParameterState>,
    /// Property values
    #[serde(default)]
    pub properties: Vec<PropertyState>,
}

impl ClassInfo {
    /// An empty state for `description`
    pub fn new(description: ComponentDescription) -> Self {
        Self {
            version: CLASS_INFO_VERSION,
            description,
            parameters: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Captured value of a parameter
    pub fn parameter(&self, key: ParameterKey) -> Option<f32> {
        self.parameters.iter().find(|p| p.key == key).map(|p| p.value)
    }
}

/// A named class info
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetSnapshot {
    /// Preset name
    pub name: String,
    /// Captured state
    pub class_info: ClassInfo,
}

/// A preset to apply: either from the factory list or a saved snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Preset {
    /// Factory preset
    Factory(FactoryPreset),
    /// Saved snapshot
    Snapshot(PresetSnapshot),
}

impl From<FactoryPreset> for Preset {
    fn from(preset: FactoryPreset) -> Self {
        Preset::Factory(preset)
    }
}

impl From<PresetSnapshot> for Preset {
    fn from(snapshot: PresetSnapshot) -> Self {
        Preset::Snapshot(snapshot)
    }
}

impl AudioUnit {
    /// Factory presets, enumerated once per open and cached
    pub fn presets(&mut self) -> Result<Vec<FactoryPreset>> {
        let result = self.load_factory_presets();
        self.record(result)
    }

    /// Apply a factory preset; it must be one of [`AudioUnit::presets`]
    pub fn select_preset(&mut self, preset: &FactoryPreset) -> Result<()> {
        let result = self.select_factory_preset(preset);
        self.record(result)
    }

    /// Apply the factory preset at `index` in [`AudioUnit::presets`]
    pub fn select_preset_at(&mut self, index: usize) -> Result<()> {
        let result = self.load_factory_presets().and_then(|presets| {
            let preset = presets.get(index).cloned().ok_or_else(|| {
                Error::InvalidPreset(format!(
                    "index {} out of range ({} presets)",
                    index,
                    presets.len()
                ))
            })?;
            self.select_factory_preset(&preset)
        });
        self.record(result)
    }

    /// Capture the unit's complete state under `name`
    pub fn save_preset(&self, name: &str) -> Result<PresetSnapshot> {
        let result = self.native().and_then(|unit| {
            let class_info = unit.class_info().map_err(Error::NativeFailure)?;
            Ok(PresetSnapshot {
                name: name.to_string(),
                class_info,
            })
        });
        self.record(result)
    }

    /// Capture the unit's state and write it to `path` as JSON
    pub fn save_preset_to_file<P: AsRef<Path>>(&self, name: &str, path: P) -> Result<PresetSnapshot> {
        let path = path.as_ref();
        let snapshot = self.save_preset(name)?;
        let result = serde_json::to_string_pretty(&snapshot)
            .map_err(Error::from)
            .and_then(|json| fs::write(path, json).map_err(Error::from));
        if result.is_ok() {
            info!("saved preset '{}' to {}", name, path.display());
        }
        self.record(result.map(|_| snapshot))
    }

    /// Restore a snapshot.
    ///
    /// The snapshot must come from the same component (kind, subtype and
    /// vendor) and use the current class info layout.
    pub fn load_preset(&mut self, snapshot: &PresetSnapshot) -> Result<()> {
        let result = self.restore_class_info(&snapshot.class_info);
        if result.is_ok() {
            debug!("{}: restored preset '{}'", self.descriptor(), snapshot.name);
        }
        self.record(result)
    }

    /// Read a snapshot written by [`AudioUnit::save_preset_to_file`] and restore it
    pub fn load_preset_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<PresetSnapshot> {
        let path = path.as_ref();
        let result = fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|text| {
                serde_json::from_str::<PresetSnapshot>(&text).map_err(|e| {
                    Error::RestoreFailed(format!("{} is not a preset file: {}", path.display(), e))
                })
            });
        let snapshot = self.record(result)?;
        self.load_preset(&snapshot)?;
        Ok(snapshot)
    }

    /// Apply either kind of preset
    pub fn apply_preset(&mut self, preset: &Preset) -> Result<()> {
        match preset {
            Preset::Factory(factory) => self.select_preset(factory),
            Preset::Snapshot(snapshot) => self.load_preset(snapshot),
        }
    }

    fn load_factory_presets(&mut self) -> Result<Vec<FactoryPreset>> {
        if !self.is_open() {
            return Err(Error::InvalidPreset("unit is not open".to_string()));
        }
        if let Some(cached) = &self.presets {
            return Ok(cached.clone());
        }
        let presets = self
            .native()?
            .factory_presets()
            .map_err(Error::NativeFailure)?;
        debug!("{}: {} factory presets", self.descriptor(), presets.len());
        self.presets = Some(presets.clone());
        Ok(presets)
    }

    fn select_factory_preset(&mut self, preset: &FactoryPreset) -> Result<()> {
        let presets = self.load_factory_presets()?;
        if !presets.contains(preset) {
            return Err(Error::InvalidPreset(format!(
                "'{}' ({}) is not a factory preset of {}",
                preset.name,
                preset.number,
                self.description()
            )));
        }
        self.native_mut()?
            .set_present_preset(preset)
            .map_err(Error::NativeFailure)
    }

    fn restore_class_info(&mut self, info: &ClassInfo) -> Result<()> {
        let ours = self.description();
        if info.description != ours {
            return Err(Error::RestoreFailed(format!(
                "state was captured from {}, not {}",
                info.description, ours
            )));
        }
        if info.version != CLASS_INFO_VERSION {
            return Err(Error::RestoreFailed(format!(
                "unsupported class info version {}",
                info.version
            )));
        }
        self.native_mut()?
            .set_class_info(info)
            .map_err(|status| Error::RestoreFailed(format!("rejected by {}: {}", ours, status)))
    }
}
