//! Storage Error Types

use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Failure of the persistence layer backing theme preferences.
///
/// These never leave [`crate::ThemeController`]; they are logged and treated
/// as "no stored value".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("Preference storage is unavailable")]
    Unavailable,

    #[error("Preference storage access denied: {0}")]
    Denied(String),

    #[error("Preference storage quota exceeded")]
    QuotaExceeded,
}
