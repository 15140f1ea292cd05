//! Stable process exit codes for the license-check binary.

/// Every setup step (fetch, parse, write) succeeded. Individual records may
/// still carry an `Error` verdict.
pub const OK: i32 = 0;
/// Authentication, download, input, output, interrupt or any other fatal failure.
pub const FAILURE: i32 = 1;
