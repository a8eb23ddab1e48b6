use crate::app::App;
use crate::config::{DemoConfig, USAGE};
use anyhow::Result;
use winit::event_loop::EventLoop;

mod app;
mod config;
mod logging;
mod shader;

fn main() -> Result<()> {
    let config = match DemoConfig::from_args(std::env::args().skip(1)) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{}\n{}", error, USAGE);
            return Err(error.into());
        }
    };
    logging::init(config.log_filter.as_deref());

    if config.check_only {
        return app::check_shaders(&config);
    }

    let mut app = App::new(config);
    let event_loop = EventLoop::new()?;

    event_loop.run_app(&mut app)?;

    app.finish()
}
