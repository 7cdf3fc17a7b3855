//! # Routing
//!
//! Content-based routing of decoded packets to application handlers.
//!
//! A [`Dispatcher`] names the handler for a payload and the
//! [`HandlerRegistry`] resolves that name to the code to run.

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{Dispatcher, PrefixDispatcher, StaticDispatcher};
pub use registry::{Handler, HandlerRegistry};
