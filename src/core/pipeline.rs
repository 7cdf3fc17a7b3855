//! Ordered chain of middlewares.
//!
//! `encode` applies the chain in configured order, `decode` in reverse, so
//! `decode(encode(p)) == p` holds for every chain. Both stop at the first
//! error.

use crate::core::middleware::{self, Middleware, MiddlewareOptions};
use crate::error::Result;
use std::fmt;

/// Immutable codec chain, built once from configuration.
#[derive(Default)]
pub struct Pipeline {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl Pipeline {
    pub fn new(middlewares: Vec<Box<dyn Middleware>>) -> Self {
        Self { middlewares }
    }

    /// Build a pipeline from catalogue names, in order.
    ///
    /// # Errors
    /// Returns `MuxError::UnknownMiddleware` on the first unknown name.
    pub fn from_names<S: AsRef<str>>(names: &[S], opts: &MiddlewareOptions) -> Result<Self> {
        let middlewares = names
            .iter()
            .map(|name| middleware::from_name(name.as_ref(), opts))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(middlewares))
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(|mw| mw.name()).collect()
    }

    /// Run every middleware's `send` in configured order.
    pub fn encode(&self, payload: Vec<u8>) -> Result<Vec<u8>> {
        self.middlewares
            .iter()
            .try_fold(payload, |raw, mw| mw.send(&raw))
    }

    /// Run every middleware's `receive` in reverse configured order.
    pub fn decode(&self, payload: Vec<u8>) -> Result<Vec<u8>> {
        self.middlewares
            .iter()
            .rev()
            .try_fold(payload, |raw, mw| mw.receive(&raw))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("middlewares", &self.names())
            .finish()
    }
}
