/// Lumen Engine - application-owned context for the rendering subsystems
///
/// The engine holds the renderer (with its resources) for as long as the
/// application keeps the value alive. There is no global renderer state:
/// create an `Engine`, attach the backend's renderer, and drop or shut it
/// down when done. The logger sink is the only process-wide state.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::renderer::Renderer;

/// Engine context
///
/// # Example
///
/// ```ignore
/// use lumen_engine::lumen::{Config, Engine};
/// use lumen_engine_renderer_vulkan::create_renderer;
///
/// # fn run(window: &winit::window::Window) -> lumen_engine::lumen::Result<()> {
/// let config = Config::default();
/// let mut engine = Engine::new(config.clone());
/// engine.attach_renderer(create_renderer(window, &config)?)?;
///
/// engine.renderer_mut()?.new_frame()?;
///
/// engine.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    config: Config,
    renderer: Option<Box<dyn Renderer>>,
}

impl Engine {
    /// Log an error before handing it back
    fn log_and_return_error(error: Error) -> Error {
        match &error {
            Error::InitializationFailed(msg) => {
                crate::engine_error!("lumen::engine", "Initialization failed: {}", msg);
            }
            _ => {
                crate::engine_error!("lumen::engine", "Engine error: {}", error);
            }
        }
        error
    }

    /// Create an engine and apply the configured log level
    pub fn new(config: Config) -> Self {
        crate::log::set_min_severity(config.log_level);
        crate::engine_info!(
            "lumen::engine",
            "Engine created for '{}' ({} backend)",
            config.app_name,
            config.backend.name()
        );
        Self { config, renderer: None }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Initialize and take ownership of a renderer
    ///
    /// # Errors
    ///
    /// `Error::InitializationFailed` if a renderer is already attached, or
    /// whatever the renderer's `init` reports.
    pub fn attach_renderer(&mut self, mut renderer: Box<dyn Renderer>) -> Result<()> {
        if self.renderer.is_some() {
            return Err(Self::log_and_return_error(Error::InitializationFailed(
                "Renderer already attached. Call Engine::detach_renderer() first.".to_string(),
            )));
        }
        renderer.init().map_err(Self::log_and_return_error)?;
        renderer.render_state_mut().clear_color = self.config.clear_color;
        self.renderer = Some(renderer);
        crate::engine_info!("lumen::engine", "Renderer attached");
        Ok(())
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    /// The attached renderer
    ///
    /// # Errors
    ///
    /// `Error::NotInitialized` when no renderer is attached.
    pub fn renderer(&self) -> Result<&dyn Renderer> {
        self.renderer.as_deref().ok_or(Error::NotInitialized)
    }

    /// The attached renderer, mutably
    pub fn renderer_mut(&mut self) -> Result<&mut dyn Renderer> {
        match self.renderer.as_deref_mut() {
            Some(renderer) => Ok(renderer),
            None => Err(Error::NotInitialized),
        }
    }

    /// Shut the renderer down and give it back to the caller
    pub fn detach_renderer(&mut self) -> Result<Option<Box<dyn Renderer>>> {
        let Some(mut renderer) = self.renderer.take() else {
            return Ok(None);
        };
        renderer.shutdown().map_err(Self::log_and_return_error)?;
        Ok(Some(renderer))
    }

    /// Shut down and destroy the renderer
    ///
    /// Resources are released before the device; calling this twice is a
    /// no-op.
    pub fn shutdown(&mut self) -> Result<()> {
        if let Some(renderer) = self.detach_renderer()? {
            drop(renderer);
            crate::engine_info!("lumen::engine", "Engine shut down");
        }
        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            crate::engine_error!("lumen::engine", "Shutdown failed: {}", e);
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
