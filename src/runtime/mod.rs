//! Single-writer runtime and reply envelope.

/// Reply envelope handed to the external router.
pub mod envelope;
/// Handle and command loop implementation.
pub mod handle;
