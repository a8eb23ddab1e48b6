use anyhow::{Context as _, Result};
use renderer::Renderer;
use std::sync::Arc;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::DemoConfig;

pub mod renderer;

/// The demo window and the renderer drawing into it.
pub struct Engine {
    // Declared before `window` so it is dropped first: the surface must go
    // before the window it was created from.
    renderer: Renderer,
    window: Arc<Window>,
}

impl Engine {
    pub fn new(event_loop: &ActiveEventLoop, config: &DemoConfig) -> Result<Self> {
        let attributes = WindowAttributes::default()
            .with_title(config.title.clone())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_resizable(false);

        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("Failed to create the window")?,
        );
        let renderer = Renderer::new(window.clone(), config)?;

        tracing::info!(
            "Opened {}x{} window `{}`",
            config.width,
            config.height,
            config.title
        );
        Ok(Self { renderer, window })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn present(&self) -> Result<()> {
        if !self.renderer.has_program() {
            tracing::warn!("Presenting without a shader program; only the clear will show");
        }
        self.renderer.render_frame()
    }
}
