//! Server-side view models. Each one is a plain serializable description of
//! what a client should render for the current session.

pub mod dashboard;

pub use dashboard::*;
