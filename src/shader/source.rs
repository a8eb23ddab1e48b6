use std::fs;
use std::path::Path;

use super::error::{ShaderError, ShaderResult};

/// GLSL text for one stage, together with where it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSource {
    origin: String,
    text: String,
}

impl ShaderSource {
    /// Reads the whole file. Every line of the result ends with `\n`, whatever
    /// line endings the file used.
    pub fn load(path: impl AsRef<Path>) -> ShaderResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ShaderError::SourceLoad {
            path: path.to_path_buf(),
            source,
        })?;

        let mut text = String::with_capacity(raw.len() + 1);
        for line in raw.lines() {
            text.push_str(line);
            text.push('\n');
        }

        let source = Self {
            origin: path.display().to_string(),
            text,
        };
        if source.is_empty() {
            tracing::warn!("Shader source `{}` is empty", source.origin);
        } else {
            tracing::debug!(
                "Loaded shader source `{}` ({} bytes)",
                source.origin,
                source.text.len()
            );
        }
        Ok(source)
    }

    #[cfg(test)]
    pub fn from_text(origin: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            text: text.into(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
