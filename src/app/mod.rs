mod engine;
use crate::app::engine::Engine;
use crate::app::engine::renderer::vertex::Vertex;
use crate::config::DemoConfig;
use crate::shader::{OfflineBackend, ShaderProgramBuilder};
use anyhow::Result;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow},
    window::WindowId,
};

/// Shows one frame, keeps it up for the configured time, then leaves the
/// event loop.
pub struct App {
    config: DemoConfig,
    engine: Option<Engine>,
    deadline: Option<Instant>,
    failure: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: DemoConfig) -> Self {
        Self {
            config,
            engine: None,
            deadline: None,
            failure: None,
        }
    }

    /// The error that stopped the demo, if any.
    pub fn finish(self) -> Result<()> {
        match self.failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // The frame is shown once; a later resume does not start over.
        if self.deadline.is_some() || self.failure.is_some() {
            return;
        }

        let shown = Engine::new(event_loop, &self.config).and_then(|engine| {
            engine.present()?;
            Ok(engine)
        });

        match shown {
            Ok(engine) => {
                let deadline = Instant::now() + self.config.present_for;
                self.engine = Some(engine);
                self.deadline = Some(deadline);
                event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
            }
            Err(error) => {
                self.failure = Some(error);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let ours = self
            .engine
            .as_ref()
            .is_some_and(|engine| engine.window_id() == window_id);

        match event {
            WindowEvent::CloseRequested if ours => {
                tracing::info!("Window closed before the display time elapsed");
                event_loop.exit();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                event_loop.exit();
            } else {
                event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
            }
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        self.engine = None;
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Release the renderer and window while the event loop still exists.
        self.engine = None;
    }
}

/// Builds the configured shader program without opening a window.
pub fn check_shaders(config: &DemoConfig) -> Result<()> {
    let backend = OfflineBackend::default();
    let program = ShaderProgramBuilder::new(&backend)
        .with_vertex_layout(Vertex::layout())
        .build_from_files(&config.vertex_shader, &config.fragment_shader)?;

    let interface = program.interface();
    tracing::info!(
        "Shader program is valid: {} vertex attributes, {} varyings",
        interface.vertex_attributes.len(),
        interface.varyings.len()
    );
    drop(program);

    debug_assert_eq!(backend.live_modules(), 0);
    debug_assert_eq!(backend.live_programs(), 0);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn shipped_config() -> DemoConfig {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        DemoConfig {
            vertex_shader: root.join("shaders/main.vert"),
            fragment_shader: root.join("shaders/main.frag"),
            ..DemoConfig::default()
        }
    }

    #[test]
    fn shipped_shaders_pass_the_check() {
        check_shaders(&shipped_config()).unwrap();
    }

    #[test]
    fn check_reports_missing_sources() {
        let config = DemoConfig {
            vertex_shader: "does/not/exist.vert".into(),
            ..shipped_config()
        };
        let error = check_shaders(&config).unwrap_err();
        assert!(error.to_string().contains("does/not/exist.vert"));
    }

    #[test]
    fn app_without_frames_finishes_cleanly() {
        assert!(App::new(DemoConfig::default()).finish().is_ok());
    }
}
