//! Live subscription streaming.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`StreamViewer`] | Drain-and-render polling loop |
//! | [`CancelSignal`] | Non-blocking stop check |
//! | [`KeyCancel`] | Keypress cancel on a raw-mode terminal |

// ============================================================================
// Submodules
// ============================================================================

/// Cooperative cancellation.
pub mod cancel;

/// Polling viewer and line rendering.
pub mod viewer;

// ============================================================================
// Re-exports
// ============================================================================

pub use cancel::{CancelSignal, KeyCancel};
pub use viewer::{StreamStats, StreamViewer, render_notification};
