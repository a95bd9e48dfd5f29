//! Main Crate Error

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// kclosest crate error enum.
pub enum Error {
    /// Indicates that the bytes used to build an [Id](crate::Id) are not
    /// exactly [ID_SIZE](crate::ID_SIZE) long.
    #[error("Invalid Id size, expected 20, got {0}")]
    InvalidIdSize(usize),
}

/// Alias for `Result<T, kclosest::Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
