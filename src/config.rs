use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// What to do when the shader program cannot be built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ShaderFailurePolicy {
    /// Exit with the shader error.
    #[default]
    Abort,
    /// Present the frame anyway, with only the clear color.
    KeepGoing,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DemoConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    /// How long the single frame stays on screen.
    pub present_for: Duration,
    pub on_shader_failure: ShaderFailurePolicy,
    /// Only build the shader program, without opening a window.
    pub check_only: bool,
    /// `tracing_subscriber::EnvFilter` directives, overriding `RUST_LOG`.
    pub log_filter: Option<String>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan Demo".to_owned(),
            width: 640,
            height: 480,
            vertex_shader: PathBuf::from("./shaders/main.vert"),
            fragment_shader: PathBuf::from("./shaders/main.frag"),
            present_for: Duration::from_secs(1),
            on_shader_failure: ShaderFailurePolicy::Abort,
            check_only: false,
            log_filter: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown option `{0}`.")]
    UnknownOption(String),
    #[error("Option `{0}` expects a value.")]
    MissingValue(&'static str),
    #[error("Invalid value `{value}` for `{option}`: {reason}.")]
    InvalidValue {
        option: &'static str,
        value: String,
        reason: &'static str,
    },
}

pub const USAGE: &str = "\
usage: VulkanShaderDemo [options]
  --vertex <path>      vertex shader source (default ./shaders/main.vert)
  --fragment <path>    fragment shader source (default ./shaders/main.frag)
  --size <W>x<H>       window size in pixels (default 640x480)
  --title <text>       window title
  --present-ms <ms>    how long the frame stays on screen (default 1000)
  --keep-going         present a cleared frame when the shaders fail
  --check              build the shader program without a window and exit
  --log <filter>       log filter, e.g. `debug` or `VulkanShaderDemo=trace`";

impl DemoConfig {
    /// Parses command line arguments, not including the program name.
    pub fn from_args<I>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut config = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--vertex" => config.vertex_shader = value(&mut args, "--vertex")?.into(),
                "--fragment" => config.fragment_shader = value(&mut args, "--fragment")?.into(),
                "--title" => config.title = value(&mut args, "--title")?,
                "--size" => {
                    let size = value(&mut args, "--size")?;
                    (config.width, config.height) = parse_size(&size)?;
                }
                "--present-ms" => {
                    let millis = value(&mut args, "--present-ms")?;
                    let millis = millis.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
                        option: "--present-ms",
                        value: millis.clone(),
                        reason: "expected a whole number of milliseconds",
                    })?;
                    config.present_for = Duration::from_millis(millis);
                }
                "--keep-going" => config.on_shader_failure = ShaderFailurePolicy::KeepGoing,
                "--check" => config.check_only = true,
                "--log" => config.log_filter = Some(value(&mut args, "--log")?),
                _ => return Err(ConfigError::UnknownOption(arg)),
            }
        }

        Ok(config)
    }
}

fn value(
    args: &mut impl Iterator<Item = String>,
    option: &'static str,
) -> Result<String, ConfigError> {
    args.next().ok_or(ConfigError::MissingValue(option))
}

fn parse_size(size: &str) -> Result<(u32, u32), ConfigError> {
    let invalid = |reason| ConfigError::InvalidValue {
        option: "--size",
        value: size.to_owned(),
        reason,
    };

    let (width, height) = size
        .split_once(['x', 'X'])
        .ok_or_else(|| invalid("expected <W>x<H>"))?;
    let width = width.parse::<u32>().map_err(|_| invalid("width is not a number"))?;
    let height = height.parse::<u32>().map_err(|_| invalid("height is not a number"))?;

    if width == 0 || height == 0 {
        return Err(invalid("window dimensions must be non-zero"));
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<DemoConfig, ConfigError> {
        DemoConfig::from_args(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn no_arguments_gives_the_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, DemoConfig::default());
        assert_eq!((config.width, config.height), (640, 480));
        assert_eq!(config.vertex_shader, PathBuf::from("./shaders/main.vert"));
        assert_eq!(config.on_shader_failure, ShaderFailurePolicy::Abort);
    }

    #[test]
    fn every_option_is_applied() {
        let config = parse(&[
            "--vertex",
            "a.vert",
            "--fragment",
            "b.frag",
            "--size",
            "800x600",
            "--title",
            "Triangle",
            "--present-ms",
            "250",
            "--keep-going",
            "--check",
            "--log",
            "debug",
        ])
        .unwrap();

        assert_eq!(config.vertex_shader, PathBuf::from("a.vert"));
        assert_eq!(config.fragment_shader, PathBuf::from("b.frag"));
        assert_eq!((config.width, config.height), (800, 600));
        assert_eq!(config.title, "Triangle");
        assert_eq!(config.present_for, Duration::from_millis(250));
        assert_eq!(config.on_shader_failure, ShaderFailurePolicy::KeepGoing);
        assert!(config.check_only);
        assert_eq!(config.log_filter.as_deref(), Some("debug"));
    }

    #[test]
    fn unknown_option_is_rejected() {
        assert_eq!(
            parse(&["--fullscreen"]),
            Err(ConfigError::UnknownOption("--fullscreen".to_owned()))
        );
    }

    #[test]
    fn option_without_value_is_rejected() {
        assert_eq!(parse(&["--vertex"]), Err(ConfigError::MissingValue("--vertex")));
    }

    #[test]
    fn malformed_sizes_are_rejected() {
        for size in ["640", "640x", "x480", "0x480", "wide x tall"] {
            assert!(
                matches!(parse(&["--size", size]), Err(ConfigError::InvalidValue { .. })),
                "size `{}` should be rejected",
                size
            );
        }
    }

    #[test]
    fn malformed_duration_is_rejected() {
        let error = parse(&["--present-ms", "-5"]).unwrap_err();
        assert!(error.to_string().contains("--present-ms"));
    }
}
