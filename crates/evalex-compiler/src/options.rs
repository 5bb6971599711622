//! Compiler configuration.

/// Limits applied while compiling an expression.
///
/// # Example
///
/// ```
/// use evalex_compiler::CompilerOptions;
///
/// let options = CompilerOptions::default()
///     .with_regex_size_limit(64 * 1024)
///     .with_max_arguments(16);
/// assert_eq!(options.max_arguments, 16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    /// Upper bound, in bytes, on the compiled size of a `matches` pattern.
    pub regex_size_limit: usize,
    /// Maximum number of arguments at a single call site.
    pub max_arguments: usize,
}

impl CompilerOptions {
    pub const DEFAULT_REGEX_SIZE_LIMIT: usize = 1 << 20;
    /// The call instruction encodes its argument count in one byte.
    pub const DEFAULT_MAX_ARGUMENTS: usize = u8::MAX as usize;

    pub fn with_regex_size_limit(mut self, limit: usize) -> Self {
        self.regex_size_limit = limit;
        self
    }

    /// Values above the bytecode limit are clamped to it.
    pub fn with_max_arguments(mut self, max: usize) -> Self {
        self.max_arguments = max.min(Self::DEFAULT_MAX_ARGUMENTS);
        self
    }
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            regex_size_limit: Self::DEFAULT_REGEX_SIZE_LIMIT,
            max_arguments: Self::DEFAULT_MAX_ARGUMENTS,
        }
    }
}
