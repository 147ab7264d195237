//! Error types for the Snapfeed binary.

use snapfeed_core::{ComposeError, ConfigError, LoadError};
use snapfeed_db::DbError;

/// Top-level error for the `snapfeed` binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// Opening, seeding or clearing the store failed.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: DbError,
    },

    /// The initial feed load failed.
    #[error("load error: {source}")]
    Load {
        /// The underlying load error.
        #[from]
        source: LoadError,
    },

    /// Submitting a new post failed.
    #[error("post error: {source}")]
    Compose {
        /// The underlying compose error.
        #[from]
        source: ComposeError,
    },
}
