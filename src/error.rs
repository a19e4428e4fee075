// src/error.rs
//! Error taxonomy for one pipeline run and its mapping to process exit codes.
//!
//! Every category is fatal: the first error ends the run before anything is
//! written to the destination.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::rule::{CompileError, EvalError};

/// sysexits(3)-style exit codes.
pub mod exit {
    pub const SUCCESS: u8 = 0;
    pub const SERIALIZE: u8 = 1;
    pub const DATAERR: u8 = 65;
    pub const SOFTWARE: u8 = 70;
    pub const IOERR: u8 = 74;
    pub const TEMPFAIL: u8 = 75;
    pub const PROTOCOL: u8 = 76;
    pub const CONFIG: u8 = 78;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config file found (tried --config, $FEEDFILTER_CONFIG, ./config.json, ./config.toml)")]
    NotFound,

    #[error("FEEDFILTER_CONFIG points to non-existent path {}", .0.display())]
    MissingEnvPath(PathBuf),

    #[error("reading config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid config field `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}

/// The fetched body could not be turned into a feed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("document is empty")]
    Empty,

    #[error("unrecognized feed format (root element <{0}>)")]
    Unrecognized(String),

    #[error("malformed XML near byte {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("malformed JSON Feed: {0}")]
    Json(String),
}

impl ParseError {
    pub(crate) fn xml(position: u64, err: impl std::fmt::Display) -> Self {
        ParseError::Xml {
            position,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("fetching {url} exceeded the {timeout:?} deadline")]
    Timeout { url: String, timeout: Duration },

    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("parsing feed from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerializeError {
    #[error("writing {format} document: {message}")]
    Xml {
        format: &'static str,
        message: String,
    },

    #[error("encoding JSON Feed: {0}")]
    Json(String),
}

#[derive(Debug, Error)]
#[error("writing {destination}: {source}")]
pub struct OutputError {
    pub destination: String,
    #[source]
    pub source: std::io::Error,
}

/// Coarse failure category, recorded in the `Failed` pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Config,
    Compile,
    Fetch,
    Timeout,
    Evaluate,
    Serialize,
    Output,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("include_if does not compile: {0}")]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("include_if failed on item #{index}: {source}")]
    Evaluate {
        index: usize,
        #[source]
        source: EvalError,
    },

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error(transparent)]
    Output(#[from] OutputError),
}

impl PipelineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Config(_) => FailureKind::Config,
            PipelineError::Compile(_) => FailureKind::Compile,
            PipelineError::Fetch(FetchError::Timeout { .. }) => FailureKind::Timeout,
            PipelineError::Fetch(_) => FailureKind::Fetch,
            PipelineError::Evaluate { .. } => FailureKind::Evaluate,
            PipelineError::Serialize(_) => FailureKind::Serialize,
            PipelineError::Output(_) => FailureKind::Output,
        }
    }

    /// Short label used in log lines.
    pub fn phase(&self) -> &'static str {
        match self.kind() {
            FailureKind::Config => "config",
            FailureKind::Compile => "compile",
            FailureKind::Fetch | FailureKind::Timeout => "fetch",
            FailureKind::Evaluate => "evaluate",
            FailureKind::Serialize => "serialize",
            FailureKind::Output => "output",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::Config(_) => exit::CONFIG,
            PipelineError::Compile(_) => exit::DATAERR,
            PipelineError::Fetch(FetchError::Parse { .. }) => exit::PROTOCOL,
            PipelineError::Fetch(_) => exit::TEMPFAIL,
            PipelineError::Evaluate { .. } => exit::SOFTWARE,
            PipelineError::Serialize(_) => exit::SERIALIZE,
            PipelineError::Output(_) => exit::IOERR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_is_its_own_kind_but_shares_fetch_exit_code() {
        let err = PipelineError::from(FetchError::Timeout {
            url: "https://example.com/feed".into(),
            timeout: Duration::from_secs(20),
        });
        assert_eq!(err.kind(), FailureKind::Timeout);
        assert_eq!(err.phase(), "fetch");
        assert_eq!(err.exit_code(), exit::TEMPFAIL);
        assert!(err.to_string().contains("20s"), "{err}");
    }

    #[test]
    fn parse_failures_exit_with_protocol_code() {
        let err = PipelineError::from(FetchError::Parse {
            url: "https://example.com/feed".into(),
            source: ParseError::Unrecognized("html".into()),
        });
        assert_eq!(err.kind(), FailureKind::Fetch);
        assert_eq!(err.exit_code(), exit::PROTOCOL);
    }

    #[test]
    fn evaluation_error_names_the_item() {
        let err = PipelineError::Evaluate {
            index: 3,
            source: EvalError::DivisionByZero,
        };
        assert_eq!(err.exit_code(), exit::SOFTWARE);
        assert_eq!(
            err.to_string(),
            "include_if failed on item #3: division by zero"
        );
    }
}
