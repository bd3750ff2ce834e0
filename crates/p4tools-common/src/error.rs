/// Result type of this crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A caller violated a contract of this crate. This is a fatal error that indicates a defect
    /// in the engine or in a prior pass and cannot be safely handled.
    #[error("BUG: {0}")]
    Bug(String),

    /// The solver backend could not translate or process a request.
    #[error("solver error: {0}")]
    Solver(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error must abort the current run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Bug(_))
    }
}

/// Construct an [Error::Bug] from format arguments.
#[macro_export]
macro_rules! bug {
    ($($arg:tt)*) => {
        $crate::Error::Bug(format!($($arg)*))
    };
}
