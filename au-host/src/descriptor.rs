//! Component identity: four-character tags, descriptions and resolved descriptors

use crate::{
    error::{Error, Result},
    factory::ComponentFactory,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-bit tag conventionally spelled as four ASCII characters
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FourCc(pub u32);

impl FourCc {
    /// The wildcard tag used in lookups
    pub const ANY: FourCc = FourCc(0);

    /// Build a tag from its four characters, most significant first
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(u32::from_be_bytes(*code))
    }

    /// The four characters of the tag
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Whether this tag matches anything in a lookup
    pub const fn is_wildcard(self) -> bool {
        self.0 == 0
    }
}

impl From<[u8; 4]> for FourCc {
    fn from(code: [u8; 4]) -> Self {
        Self::new(&code)
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.to_bytes();
        if bytes.iter().all(|b| b.is_ascii_graphic() || *b == b' ') {
            for b in bytes {
                write!(f, "{}", b as char)?;
            }
            Ok(())
        } else {
            write!(f, "{:#010x}", self.0)
        }
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self)
    }
}

/// Well-known component kinds
pub mod kind {
    use super::FourCc;

    /// Hardware or software output
    pub const OUTPUT: FourCc = FourCc::new(b"auou");
    /// Instrument driven by note events
    pub const MUSIC_DEVICE: FourCc = FourCc::new(b"aumu");
    /// Effect that also accepts note events
    pub const MUSIC_EFFECT: FourCc = FourCc::new(b"aumf");
    /// Sample rate or format converter
    pub const FORMAT_CONVERTER: FourCc = FourCc::new(b"aufc");
    /// Plain effect
    pub const EFFECT: FourCc = FourCc::new(b"aufx");
    /// Mixer
    pub const MIXER: FourCc = FourCc::new(b"aumx");
    /// Panner
    pub const PANNER: FourCc = FourCc::new(b"aupn");
    /// Generator without audio input
    pub const GENERATOR: FourCc = FourCc::new(b"augn");
    /// Offline effect
    pub const OFFLINE_EFFECT: FourCc = FourCc::new(b"auol");
    /// MIDI processor
    pub const MIDI_PROCESSOR: FourCc = FourCc::new(b"aumi");
}

/// The identity triple used to look up a component
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ComponentDescription {
    /// Component kind, see [`kind`]
    pub kind: FourCc,
    /// Kind-specific subtype
    pub subtype: FourCc,
    /// Manufacturer tag
    pub vendor: FourCc,
}

impl ComponentDescription {
    /// Create a description from its three tags
    pub const fn new(kind: FourCc, subtype: FourCc, vendor: FourCc) -> Self {
        Self {
            kind,
            subtype,
            vendor,
        }
    }

    /// Whether `other` satisfies this description, treating zero tags as wildcards
    pub fn matches(&self, other: &ComponentDescription) -> bool {
        fn field(want: FourCc, have: FourCc) -> bool {
            want.is_wildcard() || want == have
        }
        field(self.kind, other.kind)
            && field(self.subtype, other.subtype)
            && field(self.vendor, other.vendor)
    }

    /// Output units can be started and stopped on their own
    pub fn is_output(&self) -> bool {
        self.kind == kind::OUTPUT
    }

    /// Instruments (music devices)
    pub fn is_instrument(&self) -> bool {
        self.kind == kind::MUSIC_DEVICE
    }

    /// Mixers
    pub fn is_mixer(&self) -> bool {
        self.kind == kind::MIXER
    }

    /// Effects, including music effects
    pub fn is_effect(&self) -> bool {
        self.kind == kind::EFFECT || self.kind == kind::MUSIC_EFFECT
    }

    /// Whether units of this kind conventionally take audio input
    pub fn has_audio_input(&self) -> bool {
        self.kind != kind::MUSIC_DEVICE && self.kind != kind::GENERATOR
    }
}

impl fmt::Display for ComponentDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.subtype, self.vendor)
    }
}

impl fmt::Debug for ComponentDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentDescription({})", self)
    }
}

/// Handle to a loadable component, issued by a [`ComponentFactory`]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub struct ComponentRef(pub u32);

/// A description resolved against a factory; the key used to open a unit
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ComponentDescriptor {
    description: ComponentDescription,
    component: ComponentRef,
}

impl ComponentDescriptor {
    /// Wrap an already-resolved component handle
    pub fn resolve_by_reference(
        factory: &dyn ComponentFactory,
        component: ComponentRef,
    ) -> Result<Self> {
        let description = factory
            .description(component)
            .ok_or(Error::LookupFailed(ComponentDescription::default()))?;
        Ok(Self {
            description,
            component,
        })
    }

    /// Look up the first component matching `description`
    pub fn resolve(factory: &dyn ComponentFactory, description: ComponentDescription) -> Result<Self> {
        let component = factory
            .find(&description)
            .into_iter()
            .next()
            .ok_or(Error::LookupFailed(description))?;
        // The match may have filled in wildcard fields.
        Self::resolve_by_reference(factory, component)
    }

    /// Convenience for [`ComponentDescriptor::resolve`] taking the triple directly
    pub fn resolve_by_triple(
        factory: &dyn ComponentFactory,
        kind: FourCc,
        subtype: FourCc,
        vendor: FourCc,
    ) -> Result<Self> {
        Self::resolve(factory, ComponentDescription::new(kind, subtype, vendor))
    }

    /// The full description of the resolved component
    pub fn description(&self) -> ComponentDescription {
        self.description
    }

    /// The factory handle of the resolved component
    pub fn component(&self) -> ComponentRef {
        self.component
    }
}

impl fmt::Display for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{})", self.description, self.component.0)
    }
}
