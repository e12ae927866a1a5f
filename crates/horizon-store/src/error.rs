use thiserror::Error;

/// Why a mutation was rejected.
///
/// Rejections are swallowed at the store boundary: they are counted and
/// logged server-side, but the protocol never answers the offending client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The target message id is absent.
    #[error("message not found")]
    NotFound,

    /// The acting username is not the message's author.
    #[error("acting user is not the author")]
    Unauthorized,

    /// A required field is missing or empty.
    #[error("malformed payload: missing or empty {0}")]
    Malformed(&'static str),
}
