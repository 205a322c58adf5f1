//! Error taxonomy of the product repository.

use crate::store::StoreError;

use std::fmt;

/// Coarse classification of a [`RepositoryError`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// Nothing to act on.
    NotFound,
    /// The insert collides with an existing document.
    AlreadyExists,
    /// A caller-supplied value failed local validation.
    InvalidArgument,
    /// Concurrent writers kept winning the optimistic concurrency race.
    Conflict,
    /// The caller cancelled the operation or its deadline elapsed.
    Cancelled,
    /// A stored document does not decode as a product.
    InvalidDocument,
    /// Transport, authentication, throttling or unclassified remote failure.
    StoreUnavailable,
}

impl ErrorKind {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Conflict | Self::StoreUnavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::NotFound => "not_found",
            Self::AlreadyExists => "already_exists",
            Self::InvalidArgument => "invalid_argument",
            Self::Conflict => "conflict",
            Self::Cancelled => "cancelled",
            Self::InvalidDocument => "invalid_document",
            Self::StoreUnavailable => "store_unavailable",
        };
        f.write_str(kind)
    }
}

/// Failure of a repository operation.
///
/// Variants raised because of a store failure keep it as their source.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RepositoryError {
    /// No product at the requested (category, id).
    #[error("product `{product_id}` not found in category `{category_name}`")]
    NotFound {
        /// Partition key that was looked up.
        category_name: String,
        /// Id that was looked up.
        product_id: String,
        /// Store failure.
        #[source]
        source: StoreError,
    },
    /// A product with the same (category, id) already exists.
    #[error("product `{product_id}` already exists in category `{category_name}`")]
    AlreadyExists {
        /// Partition key of the insert.
        category_name: String,
        /// Id of the insert.
        product_id: String,
        /// Store failure.
        #[source]
        source: StoreError,
    },
    /// A caller-supplied value is invalid. Raised before any store call.
    #[error("invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        /// Name of the offending field or parameter.
        argument: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// The update lost the optimistic concurrency race on every attempt.
    #[error("product `{product_id}` was modified concurrently, gave up after {attempts} attempts")]
    Conflict {
        /// Id of the contended product.
        product_id: String,
        /// Attempts made.
        attempts: u32,
        /// Last store failure.
        #[source]
        source: StoreError,
    },
    /// The caller cancelled the operation or its deadline elapsed.
    #[error("operation on product `{product_id}` was interrupted")]
    Cancelled {
        /// Id of the product being operated on.
        product_id: String,
        /// Cancellation or deadline.
        #[source]
        source: StoreError,
    },
    /// A stored document cannot be read back as a product.
    #[error("stored document `{product_id}` is not a valid product: {reason}")]
    InvalidDocument {
        /// Id of the document.
        product_id: String,
        /// Decoding or invariant failure.
        reason: String,
    },
    /// The store failed for infrastructure reasons.
    #[error("document store unavailable")]
    StoreUnavailable {
        /// Store failure.
        #[source]
        source: StoreError,
    },
}

impl RepositoryError {
    /// Build an [`RepositoryError::InvalidArgument`].
    pub fn invalid_argument(argument: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }

    /// Classification of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::InvalidDocument { .. } => ErrorKind::InvalidDocument,
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
        }
    }

    /// Map a store failure about `(category_name, product_id)` onto the taxonomy.
    ///
    /// A precondition failure surfacing here was not retried, so it is a conflict after one
    /// attempt.
    pub(crate) fn from_store(err: StoreError, category_name: &str, product_id: &str) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound {
                category_name: category_name.to_string(),
                product_id: product_id.to_string(),
                source: err,
            },
            StoreError::AlreadyExists => Self::AlreadyExists {
                category_name: category_name.to_string(),
                product_id: product_id.to_string(),
                source: err,
            },
            StoreError::PreconditionFailed => Self::Conflict {
                product_id: product_id.to_string(),
                attempts: 1,
                source: err,
            },
            StoreError::Cancelled | StoreError::DeadlineExceeded => Self::Cancelled {
                product_id: product_id.to_string(),
                source: err,
            },
            StoreError::InvalidDocument(reason) => Self::InvalidDocument {
                product_id: product_id.to_string(),
                reason,
            },
            StoreError::Transport(_) => Self::StoreUnavailable { source: err },
        }
    }

    /// Log the error once, at the point where it was mapped.
    pub(crate) fn report(self, operation: &'static str) -> Self {
        #[cfg(feature = "tracing")]
        {
            let cause = std::error::Error::source(&self).map(ToString::to_string);
            match self.kind() {
                ErrorKind::NotFound | ErrorKind::AlreadyExists | ErrorKind::InvalidArgument => {
                    tracing::warn!(operation, kind = %self.kind(), cause = ?cause, "{self}")
                }
                _ => tracing::error!(operation, kind = %self.kind(), cause = ?cause, "{self}"),
            }
        }
        #[cfg(not(feature = "tracing"))]
        let _ = operation;
        self
    }
}
