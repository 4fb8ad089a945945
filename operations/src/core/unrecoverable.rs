//! Marker for handler errors that must not be retried.

/// Wraps a handler error to stop the retry loop after the current attempt.
///
/// Display and source forward to the wrapped error, so the marker never
/// changes how the failure reads.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Unrecoverable(anyhow::Error);

impl Unrecoverable {
    pub fn into_inner(self) -> anyhow::Error {
        self.0
    }
}

/// Mark `err` as unrecoverable.
///
/// ```
/// use anyhow::anyhow;
/// use operations::core::unrecoverable::{is_unrecoverable, unrecoverable};
///
/// let err = unrecoverable(anyhow!("contract already deployed"));
/// assert!(is_unrecoverable(&err));
/// ```
pub fn unrecoverable(err: impl Into<anyhow::Error>) -> anyhow::Error {
    anyhow::Error::new(Unrecoverable(err.into()))
}

/// True if any layer of the error chain carries the unrecoverable marker.
pub fn is_unrecoverable(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<Unrecoverable>())
}
