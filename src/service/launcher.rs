//! Bring a multiplexer up from configuration and keep it in step with
//! configuration changes.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::MuxConfig;
use crate::error::Result;
use crate::service::mux::Mux;

type Hook = Arc<dyn Fn(&Mux) + Send + Sync>;

/// Owns the `up`/`down` cycle of one [`Mux`].
///
/// `Mux::close` clears the handler registry, so handlers are registered by
/// a hook that runs before every dial.
pub struct Launcher {
    mux: Mux,
    current: Mutex<Option<MuxConfig>>,
    hook: Option<Hook>,
}

impl Launcher {
    pub fn new(mux: Mux) -> Self {
        Self {
            mux,
            current: Mutex::new(None),
            hook: None,
        }
    }

    /// Set the registration hook run before each dial.
    pub fn on_up<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Mux) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn mux(&self) -> &Mux {
        &self.mux
    }

    /// Dial with `config`, or redial if it differs from the running one.
    ///
    /// A configuration equal to the running one (see [`MuxConfig`]'s
    /// `PartialEq`) leaves the multiplexer untouched.
    ///
    /// # Errors
    /// Any error from [`Mux::dial`]; the registry is cleared when the dial
    /// fails.
    pub async fn up(&self, config: MuxConfig) -> Result<()> {
        let mut current = self.current.lock().await;
        let running = self.mux.is_running().await;

        if running && current.as_ref() == Some(&config) {
            debug!("Configuration unchanged, keeping multiplexer up");
            return Ok(());
        }

        if running {
            info!("Configuration changed, redialing");
            if let Err(e) = self.mux.close().await {
                warn!(error = %e, "Failed to close every socket before redial");
            }
        }

        if let Some(hook) = &self.hook {
            hook(&self.mux);
        }

        if let Err(e) = self.mux.dial(config.clone()).await {
            self.mux.registry().clear();
            *current = None;
            return Err(e);
        }
        *current = Some(config);
        Ok(())
    }

    /// Close the multiplexer.
    pub async fn down(&self) -> Result<()> {
        let mut current = self.current.lock().await;
        *current = None;
        self.mux.close().await
    }
}
