/// Result type of this crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An engine invariant was violated. Aborts the whole run.
    #[error("BUG: {0}")]
    Bug(String),

    /// The program uses a construct that is anticipated but not modeled, e.g. an extern invoked
    /// with an argument shape it does not support. Aborts only the current execution branch.
    #[error("unimplemented: {0}")]
    Unimplemented(String),

    #[error(transparent)]
    Common(#[from] p4tools_common::Error),
}

impl Error {
    /// Whether this error must abort the current run rather than only the current branch.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Bug(_) => true,
            Error::Unimplemented(_) => false,
            Error::Common(err) => err.is_fatal(),
        }
    }
}

/// Construct an [Error::Bug] from format arguments.
macro_rules! bug {
    ($($arg:tt)*) => {
        $crate::error::Error::Bug(format!($($arg)*))
    };
}

/// Construct an [Error::Unimplemented] from format arguments.
macro_rules! unimplemented_construct {
    ($($arg:tt)*) => {
        $crate::error::Error::Unimplemented(format!($($arg)*))
    };
}

pub(crate) use bug;
pub(crate) use unimplemented_construct;
