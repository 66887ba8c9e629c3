use crate::errors::{FileOperation, IoError};
use miette::Diagnostic;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

pub const MIN_DEPTH: usize = 3;
pub const MIN_ENTRY_COUNT: usize = 2;
/// Smallest allowed upper bound for lines per file; every file gets at least this many lines.
pub const MIN_LINES: usize = 5;

const DEFAULT_MAX_NAME_LEN: usize = 10;
const DEFAULT_LINE_LEN: usize = 60;
const DEFAULT_MAX_LINES: usize = 15;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("max directory depth must be >= {MIN_DEPTH}, got {got}")]
    #[diagnostic(code(datagen::config::invalid_depth), help("Pass --dir-depth 3 or more"))]
    InvalidDepth { got: usize },

    #[error("directory entry count must be >= {MIN_ENTRY_COUNT}, got {got}")]
    #[diagnostic(
        code(datagen::config::invalid_entry_count),
        help("Pass --dir-width 2 or more")
    )]
    InvalidEntryCount { got: usize },

    #[error("invalid content shape: {reason}")]
    #[diagnostic(code(datagen::config::invalid_content_shape))]
    InvalidContentShape { reason: String },

    #[error("Unable to parse toml file at '{path}': {source}")]
    #[diagnostic(code(datagen::config::parse_toml), help("Review toml file"))]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("I/O error within config domain")]
    #[diagnostic(code(datagen::config::io))]
    Io(#[from] IoError),
}

/// Parameters for one generation run.
///
/// Built by the caller (normally the CLI) and passed by value to the tree builder,
/// so nothing about a run lives in process-wide state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    /// Deepest directory level below the root. Directories at this depth only hold files.
    pub max_depth: usize,
    /// Number of immediate entries per directory, and minimum file count of a leaf.
    pub entry_count: usize,
    /// Upper bound on the random part of generated names.
    pub max_name_len: usize,
    /// Approximate length of each generated text line.
    pub line_len: usize,
    /// Upper bound on lines per file; the lower bound is [`MIN_LINES`].
    pub max_lines: usize,
    /// Pause inserted after diagnostic events, if any.
    pub pacing: Option<Duration>,
    /// Seed for the random source. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}
impl GeneratorConfig {
    pub fn new(max_depth: usize, entry_count: usize) -> Self {
        Self {
            max_depth,
            entry_count,
            max_name_len: DEFAULT_MAX_NAME_LEN,
            line_len: DEFAULT_LINE_LEN,
            max_lines: DEFAULT_MAX_LINES,
            pacing: None,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = Some(pacing);
        self
    }

    /// Applies values from a config file. Only fields present in the file are overwritten.
    pub fn merge_file(mut self, file: &ConfigFile) -> Self {
        if let Some(max_depth) = file.max_depth {
            self.max_depth = max_depth;
        }
        if let Some(entry_count) = file.entry_count {
            self.entry_count = entry_count;
        }
        if let Some(max_name_len) = file.max_name_len {
            self.max_name_len = max_name_len;
        }
        if let Some(line_len) = file.line_len {
            self.line_len = line_len;
        }
        if let Some(max_lines) = file.max_lines {
            self.max_lines = max_lines;
        }
        if file.seed.is_some() {
            self.seed = file.seed;
        }
        self
    }

    /// Rejects parameters the tree builder cannot honor.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first offending parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth < MIN_DEPTH {
            return Err(ConfigError::InvalidDepth {
                got: self.max_depth,
            });
        }
        if self.entry_count < MIN_ENTRY_COUNT {
            return Err(ConfigError::InvalidEntryCount {
                got: self.entry_count,
            });
        }
        if self.max_name_len == 0 {
            return Err(ConfigError::InvalidContentShape {
                reason: "max name length must be >= 1".to_string(),
            });
        }
        if self.line_len == 0 {
            return Err(ConfigError::InvalidContentShape {
                reason: "line length must be >= 1".to_string(),
            });
        }
        if self.max_lines < MIN_LINES {
            return Err(ConfigError::InvalidContentShape {
                reason: format!("max lines must be >= {MIN_LINES}"),
            });
        }
        Ok(())
    }
}

/// Optional TOML overrides, e.g.
///
/// ```toml
/// max_depth = 4
/// entry_count = 3
/// line_len = 80
/// ```
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub max_depth: Option<usize>,
    pub entry_count: Option<usize>,
    pub max_name_len: Option<usize>,
    pub line_len: Option<usize>,
    pub max_lines: Option<usize>,
    pub seed: Option<u64>,
}
impl ConfigFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .map_err(|error| IoError::new(FileOperation::Read, path.to_path_buf(), error))?;

        toml::from_str(&content).map_err(|err| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source: err,
        })
    }
}
