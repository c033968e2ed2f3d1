//! Error types for the import domain.

/// The result type used throughout silo-import.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving an import.
///
/// `Display` and `std::error::Error` are implemented by hand because two
/// variants carry a `String` field named `source`, which thiserror would
/// otherwise infer as the error source.
#[derive(Debug)]
pub enum Error {
    /// An `Init` event arrived for a table whose load was already launched.
    ///
    /// This is the at-most-once guard: redelivered or duplicate `Init`
    /// events must not launch a second job.
    AlreadyLaunched {
        /// The table whose `Launched` marker already exists.
        table_id: String,
    },

    /// A table folder contained more than one mapping file.
    DuplicateMappingFile {
        /// The data source owning the table.
        source: String,
        /// The offending table.
        table: String,
    },

    /// A table folder mixed mapped and self-describing data files.
    MixedRepresentations {
        /// The data source owning the table.
        source: String,
        /// The offending table.
        table: String,
    },

    /// The manifest trigger file is not inside an import root directory.
    TriggerOutsideImportRoot {
        /// The event's object name.
        name: String,
    },

    /// Layout resolution produced no importable datasets.
    EmptyManifest {
        /// The import root that was resolved.
        root: String,
    },

    /// A table admin operation failed.
    Admin {
        /// Description of the admin failure.
        message: String,
        /// The underlying cause, if any.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Launching the batch ingestion job failed.
    Launch {
        /// Description of the launch failure.
        message: String,
        /// The underlying cause, if any.
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Publishing the import notification failed.
    Publish {
        /// Description of the publish failure.
        message: String,
    },

    /// A gateway call exceeded its deadline.
    DeadlineExceeded {
        /// The operation that timed out.
        operation: String,
    },

    /// An error from silo-core (storage, paths, configuration).
    Core(silo_core::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyLaunched { table_id } => {
                write!(f, "import already launched for table {table_id}")
            }
            Self::DuplicateMappingFile { source, table } => {
                write!(f, "multiple mapping files in table {source}/{table}")
            }
            Self::MixedRepresentations { source, table } => {
                write!(
                    f,
                    "table {source}/{table} mixes mapped and self-describing data files"
                )
            }
            Self::TriggerOutsideImportRoot { name } => {
                write!(f, "trigger file is in the incorrect path: {name}")
            }
            Self::EmptyManifest { root } => write!(f, "no importable datasets under {root}"),
            Self::Admin { message, .. } => write!(f, "table admin error: {message}"),
            Self::Launch { message, .. } => write!(f, "job launch error: {message}"),
            Self::Publish { message } => write!(f, "publish error: {message}"),
            Self::DeadlineExceeded { operation } => write!(f, "deadline exceeded: {operation}"),
            Self::Core(error) => write!(f, "core error: {error}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Admin { source, .. } | Self::Launch { source, .. } => source
                .as_deref()
                .map(|error| error as &(dyn std::error::Error + 'static)),
            Self::Core(error) => Some(error),
            _ => None,
        }
    }
}

impl From<silo_core::Error> for Error {
    fn from(error: silo_core::Error) -> Self {
        Self::Core(error)
    }
}

impl Error {
    /// Creates a new table admin error.
    #[must_use]
    pub fn admin(message: impl Into<String>) -> Self {
        Self::Admin {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new job launch error.
    #[must_use]
    pub fn launch(message: impl Into<String>) -> Self {
        Self::Launch {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new publish error.
    #[must_use]
    pub fn publish(message: impl Into<String>) -> Self {
        Self::Publish {
            message: message.into(),
        }
    }
}
