//! Crate-level error type.

use thiserror::Error;

/// Fatal analysis failures.
///
/// Local candidate rejections (a filament that cannot be fitted, a peak with a
/// noisy side) are logged at debug level and dropped, never surfaced here.
#[derive(Debug, Error)]
pub enum GridError {
    /// The page yielded no staff system at all. Either the interline
    /// hypothesis was abandoned (no plausible staff pattern) or every
    /// candidate was rejected along the way.
    #[error("no system found on page")]
    NoSystemFound,

    /// The supplied scale is unusable (non-positive interline or line
    /// thickness).
    #[error("invalid scale: {0}")]
    InvalidScale(String),
}
