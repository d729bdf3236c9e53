use thiserror::Error;

/// Failures raised inside the core.
///
/// None of these cross the public command boundary: `Vi::command`, the
/// address and range operations and the macro engine log them and report a
/// boolean or integer sentinel instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid syntax: {0}")]
    Parse(String),

    #[error("address cannot be resolved: {0}")]
    Unresolved(String),

    #[error("marker '{0}' is not set")]
    UnknownMarker(char),

    #[error("pattern not found: {0}")]
    NoMatch(String),

    #[error("buffer is read-only")]
    ReadOnly,

    #[error("unknown macro: {0}")]
    UnknownMacro(char),

    #[error("macro nesting exceeds {0} levels")]
    MacroDepth(usize),

    #[error("{0} failed")]
    Failed(&'static str),

    #[error("variable cannot be expanded: {0}")]
    Variable(String),

    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("store: {0}")]
    Store(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
