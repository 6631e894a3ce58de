//! Audio unit wrapper and its lifecycle
//!
//! A unit moves through `Closed -> Opened -> Initialized`. Structural
//! configuration (stream formats, bus counts, maximum frames per slice,
//! external buffers) happens while `Opened`; `initialize` validates it and
//! allocates render resources. Dropping an [`AudioUnit`] closes it.

use crate::{
    descriptor::{ComponentDescription, ComponentDescriptor, FourCc},
    error::{Error, Result, Status},
    factory::{ComponentFactory, NativeUnit},
    graph::{GraphContext, NodeId},
    host::AudioUnitBuilder,
    presets::{ClassInfo, FactoryPreset},
    properties::Scope,
    tracker::ErrorTracker,
};
use log::{debug, warn};
use std::collections::BTreeSet;
use std::fmt;
use std::mem;
use std::sync::Arc;

/// Lifecycle state of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// No native instance exists
    Closed,
    /// Instantiated and configurable
    Opened,
    /// Render resources allocated
    Initialized,
}

enum Instance {
    Closed,
    Opened(Box<dyn NativeUnit>),
    Initialized(Box<dyn NativeUnit>),
}

impl Instance {
    fn state(&self) -> UnitState {
        match self {
            Instance::Closed => UnitState::Closed,
            Instance::Opened(_) => UnitState::Opened,
            Instance::Initialized(_) => UnitState::Initialized,
        }
    }
}

/// The graph a unit belongs to and its node there
#[derive(Clone)]
pub(crate) struct GraphMembership {
    pub(crate) graph: GraphContext,
    pub(crate) node: NodeId,
}

/// Explicit deep copy.
///
/// Duplicating a unit may serialize its complete state, so it is never
/// available through `Clone`.
pub trait Duplicate {
    /// Produce an independent copy
    fn duplicate(&self) -> Result<Self>
    where
        Self: Sized;
}

/// One audio unit and the state machine around its native instance
pub struct AudioUnit {
    descriptor: ComponentDescriptor,
    factory: Arc<dyn ComponentFactory>,
    instance: Instance,
    output_running: bool,
    pub(crate) render_callbacks: BTreeSet<u32>,
    pub(crate) membership: Option<GraphMembership>,
    pub(crate) presets: Option<Vec<FactoryPreset>>,
    pending_state: Option<ClassInfo>,
    tracker: ErrorTracker,
}

impl AudioUnit {
    /// Wrap a resolved component. The unit starts `Closed`.
    pub fn new(descriptor: ComponentDescriptor, factory: Arc<dyn ComponentFactory>) -> Self {
        Self {
            descriptor,
            factory,
            instance: Instance::Closed,
            output_running: false,
            render_callbacks: BTreeSet::new(),
            membership: None,
            presets: None,
            pending_state: None,
            tracker: ErrorTracker::new(),
        }
    }

    /// Resolve `description` (zero fields match anything) and wrap the first match
    pub fn with_description(
        factory: Arc<dyn ComponentFactory>,
        description: ComponentDescription,
    ) -> Result<Self> {
        let descriptor = ComponentDescriptor::resolve(factory.as_ref(), description)?;
        Ok(Self::new(descriptor, factory))
    }

    /// Resolve a kind/subtype/vendor triple and wrap the first match
    pub fn with_triple(
        factory: Arc<dyn ComponentFactory>,
        kind: FourCc,
        subtype: FourCc,
        vendor: FourCc,
    ) -> Result<Self> {
        Self::with_description(factory, ComponentDescription::new(kind, subtype, vendor))
    }

    /// Start building a configured unit
    pub fn builder(factory: Arc<dyn ComponentFactory>) -> AudioUnitBuilder {
        AudioUnitBuilder::new(factory)
    }

    /// Instantiate the native component. Succeeds without effect if already open.
    pub fn open(&mut self) -> Result<()> {
        let result = self.open_instance();
        self.record(result)
    }

    /// Validate the configuration and allocate render resources.
    ///
    /// On failure the unit stays `Opened`.
    pub fn initialize(&mut self) -> Result<()> {
        let result = self.initialize_instance();
        self.record(result)
    }

    /// Release render resources so the unit can be reconfigured. Always succeeds.
    pub fn uninitialize(&mut self) {
        if self.is_initialized() {
            if let Instance::Initialized(mut native) = mem::replace(&mut self.instance, Instance::Closed) {
                if self.output_running {
                    if let Err(status) = native.stop() {
                        warn!("failed to stop output of {}: {}", self.descriptor, status);
                    }
                    self.output_running = false;
                }
                native.uninitialize();
                debug!("uninitialized {}", self.descriptor);
                self.instance = Instance::Opened(native);
            }
        }
        self.tracker.register_result(Status::NO_ERR);
    }

    /// Tear down the native instance.
    ///
    /// The unit is removed from its graph first. Every step is attempted even
    /// if an earlier one fails; the first failure is returned. Succeeds without
    /// effect if already closed.
    pub fn close(&mut self) -> Result<()> {
        let result = self.teardown();
        self.record(result)
    }

    /// Clear rendering state such as delay lines without reinitializing
    pub fn reset(&mut self) -> Result<()> {
        let result = self
            .native_mut()
            .and_then(|unit| unit.reset(Scope::Global, 0).map_err(Error::NativeFailure));
        self.record(result)
    }

    /// Start an output unit pulling audio independently of the graph engine
    pub fn start_output(&mut self) -> Result<()> {
        let result = self.output_native("start").and_then(|unit| unit.start().map_err(Error::NativeFailure));
        if result.is_ok() {
            debug!("output started on {}", self.descriptor);
            self.output_running = true;
        }
        self.record(result)
    }

    /// Stop an output unit started with [`AudioUnit::start_output`]
    pub fn stop_output(&mut self) -> Result<()> {
        let result = self.output_native("stop").and_then(|unit| unit.stop().map_err(Error::NativeFailure));
        if result.is_ok() {
            debug!("output stopped on {}", self.descriptor);
            self.output_running = false;
        }
        self.record(result)
    }

    /// Current lifecycle state
    pub fn state(&self) -> UnitState {
        self.instance.state()
    }

    /// Whether a native instance exists
    pub fn is_open(&self) -> bool {
        self.state() != UnitState::Closed
    }

    /// Whether render resources are allocated
    pub fn is_initialized(&self) -> bool {
        self.state() == UnitState::Initialized
    }

    /// Whether output was started and not yet stopped
    pub fn is_output_running(&self) -> bool {
        self.output_running
    }

    /// The component this unit wraps
    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    /// Shorthand for the descriptor's description
    pub fn description(&self) -> ComponentDescription {
        self.descriptor.description()
    }

    /// Output unit (device I/O)
    pub fn is_output(&self) -> bool {
        self.description().is_output()
    }

    /// Software instrument
    pub fn is_instrument(&self) -> bool {
        self.description().is_instrument()
    }

    /// Mixer
    pub fn is_mixer(&self) -> bool {
        self.description().is_mixer()
    }

    /// Audio effect
    pub fn is_effect(&self) -> bool {
        self.description().is_effect()
    }

    /// The graph this unit belongs to and its node there
    pub fn graph_node(&self) -> Option<(&GraphContext, NodeId)> {
        self.membership.as_ref().map(|m| (&m.graph, m.node))
    }

    /// The most recent result code
    pub fn last_result(&self) -> Status {
        self.tracker.last_result()
    }

    /// The most recent failure code
    pub fn last_error(&self) -> Option<Status> {
        self.tracker.last_error()
    }

    /// Record a result code produced outside this wrapper and hand it back
    pub fn register_result(&self, status: Status) -> Status {
        self.tracker.register_result(status)
    }

    pub(crate) fn tracker(&self) -> &ErrorTracker {
        &self.tracker
    }

    pub(crate) fn record<T>(&self, result: Result<T>) -> Result<T> {
        self.tracker.record(&result);
        if let Err(e) = &result {
            debug!("{}: {}", self.descriptor, e);
        }
        result
    }

    pub(crate) fn native(&self) -> Result<&dyn NativeUnit> {
        match &self.instance {
            Instance::Opened(native) | Instance::Initialized(native) => Ok(native.as_ref()),
            Instance::Closed => Err(not_open()),
        }
    }

    pub(crate) fn native_mut(&mut self) -> Result<&mut dyn NativeUnit> {
        match &mut self.instance {
            Instance::Opened(native) | Instance::Initialized(native) => Ok(native.as_mut()),
            Instance::Closed => Err(not_open()),
        }
    }

    /// Reject structural changes once render resources exist
    pub(crate) fn ensure_reconfigurable(&self, what: &str) -> Result<()> {
        if self.is_initialized() {
            warn!(
                "{}: {} cannot change while initialized; uninitialize first",
                self.descriptor, what
            );
            return Err(Error::NotApplicable(format!(
                "{} cannot change while initialized",
                what
            )));
        }
        Ok(())
    }

    fn output_native(&mut self, action: &str) -> Result<&mut dyn NativeUnit> {
        if !self.is_output() {
            return Err(Error::NotApplicable(format!(
                "cannot {} output on non-output unit {}",
                action,
                self.description()
            )));
        }
        match &mut self.instance {
            Instance::Initialized(native) => Ok(native.as_mut()),
            _ => Err(Error::NotApplicable(format!(
                "cannot {} output before initialize",
                action
            ))),
        }
    }

    fn open_instance(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }
        let description = self.description();
        let mut native = self
            .factory
            .instantiate(self.descriptor.component())
            .map_err(|status| Error::OpenFailed {
                description,
                status,
            })?;
        if let Some(state) = &self.pending_state {
            if let Err(status) = native.set_class_info(state) {
                return Err(Error::RestoreFailed(format!(
                    "duplicated state rejected by {}: {}",
                    description, status
                )));
            }
            self.pending_state = None;
        }
        debug!("opened {}", self.descriptor);
        self.instance = Instance::Opened(native);
        Ok(())
    }

    fn initialize_instance(&mut self) -> Result<()> {
        match mem::replace(&mut self.instance, Instance::Closed) {
            Instance::Closed => Err(not_open()),
            Instance::Initialized(native) => {
                self.instance = Instance::Initialized(native);
                Ok(())
            }
            Instance::Opened(mut native) => match native.initialize() {
                Ok(()) => {
                    debug!("initialized {}", self.descriptor);
                    self.instance = Instance::Initialized(native);
                    Ok(())
                }
                Err(status) => {
                    warn!("{} rejected its configuration: {}", self.descriptor, status);
                    self.instance = Instance::Opened(native);
                    Err(Error::InitFailed(status))
                }
            },
        }
    }

    fn teardown(&mut self) -> Result<()> {
        let mut first_error: Option<Error> = None;
        let mut keep = |step: &str, error: Error| {
            warn!("close: {} failed: {}", step, error);
            if first_error.is_none() {
                first_error = Some(error);
            }
        };

        if let Some(membership) = self.membership.take() {
            let node = membership.node;
            let removed = membership.graph.with_graph(|graph| {
                graph.remove_node(node)?;
                graph.update()
            });
            match removed {
                Ok(Ok(())) => debug!("removed node {} from graph", node),
                Ok(Err(status)) => keep("graph removal", Error::ConnectFailed(status)),
                // The graph is gone, so there is no node left to dangle.
                Err(Error::NoGraph) => {}
                Err(e) => keep("graph removal", e),
            }
        }

        match mem::replace(&mut self.instance, Instance::Closed) {
            Instance::Closed => {}
            Instance::Opened(native) => drop(native),
            Instance::Initialized(mut native) => {
                if self.output_running {
                    if let Err(status) = native.stop() {
                        keep("stop output", Error::NativeFailure(status));
                    }
                }
                native.uninitialize();
                drop(native);
            }
        }
        self.output_running = false;
        self.render_callbacks.clear();
        self.presets = None;
        debug!("closed {}", self.descriptor);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Duplicate for AudioUnit {
    /// A new `Closed` unit of the same component whose first `open` restores
    /// this unit's parameters and properties.
    fn duplicate(&self) -> Result<Self> {
        let state = match self.native() {
            Ok(native) => Some(native.class_info().map_err(Error::NativeFailure)),
            Err(_) => self.pending_state.clone().map(Ok),
        };
        let result = state.transpose().map(|pending_state| {
            let mut copy = AudioUnit::new(self.descriptor, Arc::clone(&self.factory));
            copy.pending_state = pending_state;
            copy
        });
        self.record(result)
    }
}

impl Drop for AudioUnit {
    fn drop(&mut self) {
        if self.is_open() || self.membership.is_some() {
            if let Err(e) = self.teardown() {
                warn!("error closing {} on drop: {}", self.descriptor, e);
            }
        }
    }
}

impl fmt::Debug for AudioUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioUnit")
            .field("descriptor", &self.descriptor)
            .field("state", &self.state())
            .field("output_running", &self.output_running)
            .field("render_callbacks", &self.render_callbacks)
            .field("graph_node", &self.membership.as_ref().map(|m| m.node))
            .field("last_result", &self.tracker.last_result())
            .finish()
    }
}

fn not_open() -> Error {
    Error::NotApplicable("unit is not open".to_string())
}
