use strand_core::TimeError;

/// Result alias used throughout the crate.
pub type EcsResult<T> = Result<T, EcsError>;

/// Every failure the runtime reports. None of these are retried internally;
/// they abort the current `update()`/`run()` and surface to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    #[error(
        "cannot spawn {requested} {component} entities: pool holds {live} of {capacity}"
    )]
    CapacityExceeded {
        component: &'static str,
        requested: usize,
        live: usize,
        capacity: usize,
    },

    #[error("invalid signature for system \"{system}\": {reason}")]
    SystemSignature { system: String, reason: String },

    #[error("{operation} between a view and itself is ambiguous")]
    Aliasing { operation: &'static str },

    #[error("missing a pool for the {0} component (was add_pool called?)")]
    MissingPool(&'static str),

    #[error("missing resource {0} (was add_resource called?)")]
    MissingResource(&'static str),

    #[error("resource {0} is already borrowed")]
    ResourceBorrowed(&'static str),

    #[error("index {index} out of range for view of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("mask of length {actual} used on view of length {expected}")]
    MaskLength { expected: usize, actual: usize },

    #[error("operand of length {actual} does not match view of length {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("slice step cannot be zero")]
    ZeroSliceStep,

    #[error("system \"{0}\" was run before it was initialized")]
    SystemNotInitialized(String),

    #[error(transparent)]
    Time(#[from] TimeError),
}
