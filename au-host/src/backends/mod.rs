//! Component factory and graph implementations

pub mod memory;

#[cfg(feature = "cpal-backend")]
pub mod cpal_backend;

pub use memory::{MemoryComponent, MemoryFactory, MemoryGraph, MemoryInstance};

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::CpalOutputFactory;
