//! Error taxonomy for the index-processing pipeline.
//!
//! Fatal conditions (`SyntaxError`, `StyleError`, `ModuleNotFound`,
//! `IndexBuilderError`) propagate to the process boundary through
//! [`XindexError`]. `LocationMatchError` is internal: the index builder
//! recovers from it by trying the next location class, and only skips the
//! entry (with a warning) once every class has failed.

use std::{
    fmt::{self, Display},
    io,
    path::PathBuf,
};

/// Result alias used throughout the crate.
pub type XindexResult<T> = Result<T, XindexError>;

/// A tokenisation or parse failure in a style or raw file.
///
/// `line`/`column` are 1-based; they are `None` for failures that are not
/// tied to a single source position (e.g. a malformed `indexentry` property
/// list discovered after parsing).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub location: Option<(u32, u32)>,
}

impl SyntaxError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    pub(crate) fn at(message: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            message: message.into(),
            location: Some((line, column)),
        }
    }
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some((line, column)) => {
                write!(f, "{} at line {line}, column {column}", self.message)
            }
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for SyntaxError {}

/// A semantic error raised while evaluating a style file.
///
/// Carries the path of the file being evaluated when the failure happened
/// inside a `require`d module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleError {
    pub message: String,
    pub file: Option<PathBuf>,
}

impl StyleError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
        }
    }

    pub(crate) fn in_file(mut self, file: impl Into<PathBuf>) -> Self {
        if self.file.is_none() {
            self.file = Some(file.into());
        }
        self
    }
}

impl Display for StyleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{} (while evaluating {})", self.message, file.display()),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for StyleError {}

/// A `require` target that could not be located on the search path or among
/// the bundled modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleNotFound {
    pub name: String,
}

impl Display for ModuleNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unable to locate required module {:?}", self.name)
    }
}

impl std::error::Error for ModuleNotFound {}

/// Fatal misconfiguration detected by the index builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBuilderError {
    pub message: String,
}

impl IndexBuilderError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for IndexBuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for IndexBuilderError {}

/// One location class failed to match a location string.
///
/// Never crosses the crate boundary as a failure: callers fall back to the
/// next class in the configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationMatchError {
    pub message: String,
}

impl LocationMatchError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Display for LocationMatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for LocationMatchError {}

/// Top-level error for everything that aborts the pipeline.
#[derive(Debug)]
pub enum XindexError {
    Syntax(SyntaxError),
    Style(StyleError),
    ModuleNotFound(ModuleNotFound),
    Builder(IndexBuilderError),
    Io(io::Error),
}

impl Display for XindexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax(err) => write!(f, "syntax error: {err}"),
            Self::Style(err) => write!(f, "style error: {err}"),
            Self::ModuleNotFound(err) => Display::fmt(err, f),
            Self::Builder(err) => write!(f, "index builder error: {err}"),
            Self::Io(err) => write!(f, "i/o error: {err}"),
        }
    }
}

impl std::error::Error for XindexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Syntax(err) => Some(err),
            Self::Style(err) => Some(err),
            Self::ModuleNotFound(err) => Some(err),
            Self::Builder(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<SyntaxError> for XindexError {
    fn from(err: SyntaxError) -> Self {
        Self::Syntax(err)
    }
}

impl From<StyleError> for XindexError {
    fn from(err: StyleError) -> Self {
        Self::Style(err)
    }
}

impl From<ModuleNotFound> for XindexError {
    fn from(err: ModuleNotFound) -> Self {
        Self::ModuleNotFound(err)
    }
}

impl From<IndexBuilderError> for XindexError {
    fn from(err: IndexBuilderError) -> Self {
        Self::Builder(err)
    }
}

impl From<io::Error> for XindexError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}
