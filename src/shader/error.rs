use std::io;
use std::path::PathBuf;
use thiserror::Error;

use super::StageKind;
use super::diagnostic::Diagnostic;

/// Everything that can go wrong while turning two source files into a program.
///
/// The three variants stay distinct so a caller can tell a missing file from
/// bad GLSL from an incompatible stage pair.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read shader source `{}`: {source}", .path.display())]
    SourceLoad {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{kind} shader error: {diagnostic}")]
    StageCompile {
        kind: StageKind,
        diagnostic: Diagnostic,
    },

    #[error("Link error: {diagnostic}")]
    Link { diagnostic: Diagnostic },
}

pub type ShaderResult<T> = Result<T, ShaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_names_the_stage() {
        let error = ShaderError::StageCompile {
            kind: StageKind::Fragment,
            diagnostic: Diagnostic::new("unknown variable"),
        };
        assert_eq!(error.to_string(), "Fragment shader error: unknown variable");
    }

    #[test]
    fn source_load_error_keeps_the_io_cause() {
        let error = ShaderError::SourceLoad {
            path: PathBuf::from("shaders/missing.vert"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such file"),
        };
        let display = error.to_string();
        assert!(display.contains("shaders/missing.vert"));
        assert!(display.contains("no such file"));
        assert!(std::error::Error::source(&error).is_some());
    }
}
