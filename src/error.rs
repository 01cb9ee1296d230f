//! Error types for the Temporal operator
//!
//! Errors carry the object and operation they relate to so that the message
//! written into a `ReconcileError` condition is enough to diagnose a failure
//! without digging through controller logs.

use std::time::Duration;

use thiserror::Error;

/// Classification of a failure reported by the Temporal server
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// The object being created is already registered
    AlreadyExists,
    /// The object being read or deleted does not exist
    NotFound,
    /// The server could not be reached or timed out
    Unavailable,
    /// The server answered but refused the request
    Rejected,
}

impl std::fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyExists => write!(f, "already exists"),
            Self::NotFound => write!(f, "not found"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Main error type for operator operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Invalid custom resource spec
    #[error("validation error for {object}: {message}")]
    Validation {
        /// `namespace/name` of the offending object
        object: String,
        /// Description of what's invalid
        message: String,
    },

    /// Call to the Temporal server failed
    #[error("temporal {operation} failed for {target} ({kind}): {message}")]
    Remote {
        /// Remote operation (e.g. "register namespace")
        operation: String,
        /// Temporal namespace or cluster the call targeted
        target: String,
        /// Failure classification
        kind: RemoteErrorKind,
        /// Server or transport message
        message: String,
    },

    /// A search attribute exists on the server with a different type than declared
    #[error("search attribute {name} already exists with type {existing}, spec declares {declared}")]
    SearchAttributeConflict {
        /// Attribute name
        name: String,
        /// Type declared in the spec
        declared: String,
        /// Type registered on the server
        existing: String,
    },

    /// A spec declares a search attribute type outside the supported set
    #[error("unsupported type {value:?} for search attribute {name}")]
    UnknownSearchAttributeType {
        /// Attribute name
        name: String,
        /// The type string from the spec
        value: String,
    },

    /// A TemporalNamespace references a cluster that does not exist
    #[error("{object} references missing TemporalCluster {cluster}")]
    MissingCluster {
        /// `namespace/name` of the TemporalNamespace
        object: String,
        /// `namespace/name` of the referenced cluster
        cluster: String,
    },

    /// A child resource builder could not produce its object
    #[error("failed to build {resource}: {message}")]
    Builder {
        /// `Kind/name` of the child resource
        resource: String,
        /// Description of what failed
        message: String,
    },

    /// A write lost an optimistic concurrency race
    #[error("conflict writing {object}: {message}")]
    Conflict {
        /// `namespace/name` of the object
        object: String,
        /// Server message
        message: String,
    },

    /// A reconcile pass exceeded its deadline
    #[error("reconcile of {object} timed out after {after:?}")]
    Timeout {
        /// `namespace/name` of the object
        object: String,
        /// The deadline that was exceeded
        after: Duration,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Where the error occurred
        context: String,
        /// Description of what failed
        message: String,
    },
}

impl Error {
    /// Create a validation error for an object
    pub fn validation(object: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            object: object.into(),
            message: msg.into(),
        }
    }

    /// Create a remote (Temporal server) error
    pub fn remote(
        operation: impl Into<String>,
        target: impl Into<String>,
        kind: RemoteErrorKind,
        msg: impl Into<String>,
    ) -> Self {
        Self::Remote {
            operation: operation.into(),
            target: target.into(),
            kind,
            message: msg.into(),
        }
    }

    /// Create a builder error for a child resource
    pub fn builder(resource: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Builder {
            resource: resource.into(),
            message: msg.into(),
        }
    }

    /// Create an optimistic concurrency conflict error
    pub fn conflict(object: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Conflict {
            object: object.into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create an internal error with context
    pub fn internal(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Returns the remote failure classification, if this is a remote error
    pub fn remote_kind(&self) -> Option<RemoteErrorKind> {
        match self {
            Self::Remote { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// True when the remote reported that the target already exists
    pub fn is_already_exists(&self) -> bool {
        self.remote_kind() == Some(RemoteErrorKind::AlreadyExists)
    }

    /// True when the remote or the API server reported that the target is gone
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Remote { kind, .. } => *kind == RemoteErrorKind::NotFound,
            Self::Kube {
                source: kube::Error::Api(ae),
            } => ae.code == 404,
            _ => false,
        }
    }

    /// True for errors that user action must fix before a retry can succeed
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Validation { .. } | Self::UnknownSearchAttributeType { .. }
        )
    }

    /// True for errors worth retrying with backoff
    ///
    /// Permanent errors wait for a spec change or a watch event instead.
    pub fn is_retryable(&self) -> bool {
        !self.is_permanent()
    }
}

/// Translate a kube API conflict (HTTP 409) into [`Error::Conflict`]
pub(crate) fn map_conflict(object: &str, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(ae) if ae.code == 409 => Error::conflict(object, ae.message),
        other => other.into(),
    }
}
