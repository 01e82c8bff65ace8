//! E2 manager library.
//!
//! This crate primarily ships an `e2-manager` binary, but we expose the
//! library surface to enable integration testing and reuse.

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod keepalive;
pub mod locks;
pub mod manager;
pub mod model;
pub mod orchestrator;
pub mod registry;
pub mod routing;
pub mod sessions;
pub mod state;
pub mod state_machine;
pub mod store;
pub mod terminators;
pub mod transport;
