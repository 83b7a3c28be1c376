//! Stable exit codes for blueprint CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid config or arguments, file-system failure, or any other error.
pub const INVALID: i32 = 1;
/// The coder needed more turns than `max_coder_turns` allows.
pub const ITERATION_LIMIT: i32 = 2;
/// The model endpoint kept rate limiting through every retry.
pub const RATE_LIMITED: i32 = 3;
/// No API credential was found.
pub const MISSING_CREDENTIAL: i32 = 4;
/// A stage's structured output could not be coerced into its contract.
pub const STRUCTURED_OUTPUT: i32 = 5;
