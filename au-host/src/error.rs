//! Error types and native result codes for the au-host library

use crate::descriptor::ComponentDescription;
use crate::properties::PropertyKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A raw result code as reported by a native component or graph.
///
/// Zero is success, everything else is a failure. The named constants cover
/// the codes this crate produces or interprets; components are free to
/// return others, which pass through untouched.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub i32);

impl Status {
    /// No error
    pub const NO_ERR: Status = Status(0);
    /// Unimplemented routine
    pub const UNIMPLEMENTED: Status = Status(-4);
    /// Bad argument
    pub const PARAM_ERR: Status = Status(-50);
    /// Out of memory
    pub const MEM_FULL: Status = Status(-108);
    /// No component matches the requested description
    pub const INVALID_COMPONENT_ID: Status = Status(-3000);

    /// Property is not implemented by the unit
    pub const INVALID_PROPERTY: Status = Status(-10879);
    /// Parameter is not implemented by the unit
    pub const INVALID_PARAMETER: Status = Status(-10878);
    /// Element (bus) does not exist in the scope
    pub const INVALID_ELEMENT: Status = Status(-10877);
    /// No connection on the requested input
    pub const NO_CONNECTION: Status = Status(-10876);
    /// The unit refused to initialize
    pub const FAILED_INITIALIZATION: Status = Status(-10875);
    /// Render slice exceeds the maximum frames per slice
    pub const TOO_MANY_FRAMES_TO_PROCESS: Status = Status(-10874);
    /// Preset or state file could not be read
    pub const INVALID_FILE: Status = Status(-10871);
    /// Stream format is not supported
    pub const FORMAT_NOT_SUPPORTED: Status = Status(-10868);
    /// Operation requires an initialized unit
    pub const UNINITIALIZED: Status = Status(-10867);
    /// Scope does not exist for this property or parameter
    pub const INVALID_SCOPE: Status = Status(-10866);
    /// Property is read-only
    pub const PROPERTY_NOT_WRITABLE: Status = Status(-10865);
    /// Operation is invalid in the current state
    pub const CANNOT_DO_IN_CURRENT_CONTEXT: Status = Status(-10863);
    /// Property value is malformed or out of range
    pub const INVALID_PROPERTY_VALUE: Status = Status(-10851);
    /// Property exists but is currently not in use
    pub const PROPERTY_NOT_IN_USE: Status = Status(-10850);
    /// Operation requires an uninitialized unit
    pub const INITIALIZED: Status = Status(-10849);
    /// Parameter value is outside its range
    pub const INVALID_PARAMETER_VALUE: Status = Status(-67743);

    /// Graph node does not exist
    pub const NODE_NOT_FOUND: Status = Status(-10860);
    /// Graph refused the connection
    pub const INVALID_CONNECTION: Status = Status(-10861);
    /// Graph output node error
    pub const OUTPUT_NODE_ERR: Status = Status(-10862);
    /// Graph holds an invalid unit
    pub const INVALID_AUDIO_UNIT: Status = Status(-10864);

    /// Whether this code denotes success
    pub fn is_ok(self) -> bool {
        self.0 == 0
    }

    /// Whether this code denotes a failure
    pub fn is_err(self) -> bool {
        self.0 != 0
    }

    /// Convert into a `Result`, wrapping failures as [`Error::NativeFailure`]
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(Error::NativeFailure(self))
        }
    }

    /// Symbolic name for well-known codes
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Status::NO_ERR => "noErr",
            Status::UNIMPLEMENTED => "unimpErr",
            Status::PARAM_ERR => "paramErr",
            Status::MEM_FULL => "memFullErr",
            Status::INVALID_COMPONENT_ID => "invalidComponentID",
            Status::INVALID_PROPERTY => "InvalidProperty",
            Status::INVALID_PARAMETER => "InvalidParameter",
            Status::INVALID_ELEMENT => "InvalidElement",
            Status::NO_CONNECTION => "NoConnection",
            Status::FAILED_INITIALIZATION => "FailedInitialization",
            Status::TOO_MANY_FRAMES_TO_PROCESS => "TooManyFramesToProcess",
            Status::INVALID_FILE => "InvalidFile",
            Status::FORMAT_NOT_SUPPORTED => "FormatNotSupported",
            Status::UNINITIALIZED => "Uninitialized",
            Status::INVALID_SCOPE => "InvalidScope",
            Status::PROPERTY_NOT_WRITABLE => "PropertyNotWritable",
            Status::CANNOT_DO_IN_CURRENT_CONTEXT => "CannotDoInCurrentContext",
            Status::INVALID_PROPERTY_VALUE => "InvalidPropertyValue",
            Status::PROPERTY_NOT_IN_USE => "PropertyNotInUse",
            Status::INITIALIZED => "Initialized",
            Status::INVALID_PARAMETER_VALUE => "InvalidParameterValue",
            Status::NODE_NOT_FOUND => "NodeNotFound",
            Status::INVALID_CONNECTION => "InvalidConnection",
            Status::OUTPUT_NODE_ERR => "OutputNodeErr",
            Status::INVALID_AUDIO_UNIT => "InvalidAudioUnit",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Status({})", self)
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(code)
    }
}

/// Main error type for au-host operations
#[derive(Error, Debug)]
pub enum Error {
    /// No installed component matches the description
    #[error("No component matches {0}")]
    LookupFailed(ComponentDescription),

    /// The factory refused to instantiate the component
    #[error("Failed to open {description}: {status}")]
    OpenFailed {
        /// Component that was being opened
        description: ComponentDescription,
        /// Result code reported by the factory
        status: Status,
    },

    /// The unit rejected its current configuration during initialize
    #[error("Initialization failed: {0}")]
    InitFailed(Status),

    /// Operation is invalid for this kind of unit or in its current state
    #[error("Not applicable: {0}")]
    NotApplicable(String),

    /// The graph handle no longer refers to a live graph
    #[error("No graph is available")]
    NoGraph,

    /// The graph rejected a connection change
    #[error("Connection failed: {0}")]
    ConnectFailed(Status),

    /// Preset index or identity is not valid for this unit
    #[error("Invalid preset: {0}")]
    InvalidPreset(String),

    /// Saved state could not be restored into this unit
    #[error("Failed to restore state: {0}")]
    RestoreFailed(String),

    /// The unit does not implement the property at this address
    #[error("Property {key} unsupported: {status}")]
    PropertyUnsupported {
        /// Address that was queried
        key: PropertyKey,
        /// Result code reported by the unit
        status: Status,
    },

    /// Any other native failure
    #[error("Native failure: {0}")]
    NativeFailure(Status),

    /// IO error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Preset serialization error
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// The result code recorded for this error
    pub fn status(&self) -> Status {
        match self {
            Error::LookupFailed(_) => Status::INVALID_COMPONENT_ID,
            Error::OpenFailed { status, .. } => *status,
            Error::InitFailed(status) => *status,
            Error::NotApplicable(_) => Status::CANNOT_DO_IN_CURRENT_CONTEXT,
            Error::NoGraph => Status::NO_CONNECTION,
            Error::ConnectFailed(status) => *status,
            Error::InvalidPreset(_) => Status::INVALID_PROPERTY_VALUE,
            Error::RestoreFailed(_) => Status::INVALID_PROPERTY_VALUE,
            Error::PropertyUnsupported { status, .. } => *status,
            Error::NativeFailure(status) => *status,
            Error::Io(_) | Error::Serialization(_) => Status::INVALID_FILE,
        }
    }

    /// Classify a native failure from a property call
    pub(crate) fn from_property(key: PropertyKey, status: Status) -> Self {
        match status {
            Status::INVALID_PROPERTY | Status::INVALID_SCOPE => {
                Error::PropertyUnsupported { key, status }
            }
            _ => Error::NativeFailure(status),
        }
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display_uses_symbolic_names() {
        assert_eq!(Status::INVALID_PROPERTY.to_string(), "InvalidProperty (-10879)");
        assert_eq!(Status(-12345).to_string(), "-12345");
    }

    #[test]
    fn unsupported_properties_are_classified() {
        let key = PropertyKey::global(crate::properties::property::LATENCY);
        assert!(matches!(
            Error::from_property(key, Status::INVALID_PROPERTY),
            Error::PropertyUnsupported { .. }
        ));
        assert!(matches!(
            Error::from_property(key, Status::PROPERTY_NOT_WRITABLE),
            Error::NativeFailure(Status::PROPERTY_NOT_WRITABLE)
        ));
    }

    #[test]
    fn every_error_reports_a_failure_code() {
        let errors = [
            Error::NoGraph,
            Error::NotApplicable("closed".into()),
            Error::InvalidPreset("7".into()),
            Error::RestoreFailed("mismatch".into()),
        ];
        for error in errors {
            assert!(error.status().is_err(), "{error}");
        }
    }
}
