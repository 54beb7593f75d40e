//! HTTP control plane
//!
//! A small HTTP/1.1 server that maps method+path onto engine capabilities.
//! The server can run before any engine is attached; every route answers 501
//! until [`ControlServer::attach`] wires in a capability provider.

pub mod capability;
pub mod http;
pub mod listener;
pub mod routes;

pub use capability::ControlCapabilities;
pub use listener::ControlServer;
