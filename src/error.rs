use evalex_core::{CompilationError, RuntimeError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Any failure while compiling or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Compilation(#[from] CompilationError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl Error {
    /// The compilation error, if compilation failed.
    pub fn as_compilation_error(&self) -> Option<&CompilationError> {
        match self {
            Error::Compilation(err) => Some(err),
            Error::Runtime(_) => None,
        }
    }

    /// The runtime error, if evaluation failed.
    pub fn as_runtime_error(&self) -> Option<&RuntimeError> {
        match self {
            Error::Runtime(err) => Some(err),
            Error::Compilation(_) => None,
        }
    }
}
