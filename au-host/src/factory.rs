//! Seams to the native component system
//!
//! A [`ComponentFactory`] resolves descriptions and instantiates components;
//! each instance is a [`NativeUnit`], the vendor-owned processing node this
//! crate configures but never looks inside. Dropping a `NativeUnit` disposes
//! of the native instance.

use crate::{
    descriptor::{ComponentDescription, ComponentRef},
    error::Status,
    parameters::{ParameterId, ParameterInfo, ParameterKey},
    presets::{ClassInfo, FactoryPreset},
    properties::{PropertyInfo, PropertyKey, Scope},
    render::{ExternalBuffer, HostCallbacks, RenderCallback},
};

/// Result of a call into a native component: a value or its failure code
pub type NativeResult<T> = std::result::Result<T, Status>;

/// Locates and instantiates components
pub trait ComponentFactory: Send + Sync {
    /// All components matching `description`, in enumeration order
    fn find(&self, description: &ComponentDescription) -> Vec<ComponentRef>;

    /// The full description of a component handle
    fn description(&self, component: ComponentRef) -> Option<ComponentDescription>;

    /// Create a new, uninitialized instance
    fn instantiate(&self, component: ComponentRef) -> NativeResult<Box<dyn NativeUnit>>;
}

/// One live instance of a native component
pub trait NativeUnit: Send {
    /// Validate the current configuration and allocate render resources
    fn initialize(&mut self) -> NativeResult<()>;

    /// Release render resources; configuration is kept
    fn uninitialize(&mut self);

    /// Clear rendering state such as delay lines and filter history
    fn reset(&mut self, scope: Scope, element: u32) -> NativeResult<()>;

    /// Size and writability of a property
    fn property_info(&self, key: PropertyKey) -> NativeResult<PropertyInfo>;

    /// Read a property as raw bytes
    fn get_property(&self, key: PropertyKey) -> NativeResult<Vec<u8>>;

    /// Write a property from raw bytes
    fn set_property(&mut self, key: PropertyKey, data: &[u8]) -> NativeResult<()>;

    /// Read a parameter value
    fn get_parameter(&self, key: ParameterKey) -> NativeResult<f32>;

    /// Write a parameter value
    fn set_parameter(&mut self, key: ParameterKey, value: f32) -> NativeResult<()>;

    /// Parameter identifiers currently valid in `scope`
    fn parameter_list(&self, scope: Scope) -> NativeResult<Vec<ParameterId>>;

    /// Static metadata of a parameter
    fn parameter_info(&self, id: ParameterId, scope: Scope) -> NativeResult<ParameterInfo>;

    /// Capture the complete restorable state
    fn class_info(&self) -> NativeResult<ClassInfo>;

    /// Restore state previously captured by [`NativeUnit::class_info`]
    fn set_class_info(&mut self, info: &ClassInfo) -> NativeResult<()>;

    /// Presets shipped with the component
    fn factory_presets(&self) -> NativeResult<Vec<FactoryPreset>> {
        Ok(Vec::new())
    }

    /// Apply a factory preset
    fn set_present_preset(&mut self, _preset: &FactoryPreset) -> NativeResult<()> {
        Err(Status::INVALID_PROPERTY)
    }

    /// Install or remove the callback that supplies input on `element`
    fn set_render_callback(
        &mut self,
        element: u32,
        callback: Option<RenderCallback>,
    ) -> NativeResult<()>;

    /// Install or remove the host's musical-time callbacks
    fn set_host_callbacks(&mut self, _callbacks: Option<HostCallbacks>) -> NativeResult<()> {
        Err(Status::INVALID_PROPERTY)
    }

    /// Hand the unit a host-owned scratch buffer, or revert to its own
    fn set_external_buffer(&mut self, _buffer: Option<ExternalBuffer>) -> NativeResult<()> {
        Err(Status::INVALID_PROPERTY)
    }

    /// Start pulling audio (output units only)
    fn start(&mut self) -> NativeResult<()> {
        Err(Status::UNIMPLEMENTED)
    }

    /// Stop pulling audio (output units only)
    fn stop(&mut self) -> NativeResult<()> {
        Err(Status::UNIMPLEMENTED)
    }
}
