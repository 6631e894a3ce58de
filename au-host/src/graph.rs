//! Processing-graph handle
//!
//! The graph engine (node scheduling, start/stop of the pull loop) lives
//! behind [`AudioGraph`]. Units reach it through a [`GraphContext`], an
//! explicit shared handle passed to every connection operation.

use crate::{
    descriptor::ComponentDescription,
    error::{Error, Result},
    factory::NativeResult,
};
use log::debug;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// Identity of a node within one graph
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One edge: `source`'s output bus feeds `dest`'s input bus
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct GraphConnection {
    /// Node producing audio
    pub source: NodeId,
    /// Output bus on the source
    pub source_bus: u32,
    /// Node consuming audio
    pub dest: NodeId,
    /// Input bus on the destination
    pub dest_bus: u32,
}

/// The external graph engine
pub trait AudioGraph: Send {
    /// Add a node for a component
    fn add_node(&mut self, description: &ComponentDescription) -> NativeResult<NodeId>;

    /// Remove a node together with every edge touching it
    fn remove_node(&mut self, node: NodeId) -> NativeResult<()>;

    /// Connect an output bus to an input bus
    fn connect(&mut self, source: NodeId, source_bus: u32, dest: NodeId, dest_bus: u32) -> NativeResult<()>;

    /// Remove the edge ending at `dest_bus` of `dest`; succeeds if there is none
    fn disconnect(&mut self, dest: NodeId, dest_bus: u32) -> NativeResult<()>;

    /// Commit pending topology changes
    fn update(&mut self) -> NativeResult<()>;

    /// Current edges
    fn connections(&self) -> Vec<GraphConnection>;
}

/// Shared handle to a graph session.
///
/// Clones refer to the same graph. After [`GraphContext::dispose`] every
/// operation through any clone fails with [`Error::NoGraph`].
#[derive(Clone)]
pub struct GraphContext {
    inner: Arc<Mutex<Option<Box<dyn AudioGraph>>>>,
}

impl GraphContext {
    /// Wrap a graph engine
    pub fn new<G: AudioGraph + 'static>(graph: G) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(Box::new(graph)))),
        }
    }

    /// End the session and drop the engine
    pub fn dispose(&self) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.take().is_some() {
            debug!("graph disposed");
        }
    }

    /// Whether [`GraphContext::dispose`] has been called
    pub fn is_disposed(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Current edges
    pub fn connections(&self) -> Result<Vec<GraphConnection>> {
        self.with_graph(|graph| graph.connections())
    }

    /// Whether two handles refer to the same session
    pub fn same_graph(&self, other: &GraphContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Run `f` against the engine
    pub(crate) fn with_graph<R>(&self, f: impl FnOnce(&mut dyn AudioGraph) -> R) -> Result<R> {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_mut() {
            Some(graph) => Ok(f(graph.as_mut())),
            None => Err(Error::NoGraph),
        }
    }
}

impl fmt::Debug for GraphContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphContext")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
