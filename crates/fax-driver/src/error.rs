use std::path::PathBuf;
use thiserror::Error;

/// Everything that can send the driver to a non-zero exit, mapped to the
/// exit codes `main.c`'s `runFile`/usage-check/`main` use: usage (64),
/// compile failure (65), runtime failure (70), file I/O failure (74).
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Usage: fax [path]")]
    Usage,

    #[error("Could not open file \"{path}\".")]
    FileNotFound { path: PathBuf },

    #[error("Could not read \"{path}\": {source}")]
    FileUnreadable { path: PathBuf, #[source] source: std::io::Error },

    /// The compiler already printed its diagnostics to stderr; this variant
    /// exists only to carry the right exit code back to `main`.
    #[error("compilation failed")]
    CompileFailed,

    /// Likewise, the VM already printed its trace; wraps the failure so the
    /// exit-code mapping stays in one place.
    #[error(transparent)]
    RuntimeFailed(#[from] fax_vm::RuntimeError),
}

impl DriverError {
    pub fn exit_code(&self) -> i32 {
        match self {
            DriverError::Usage => 64,
            DriverError::CompileFailed => 65,
            DriverError::RuntimeFailed(_) => 70,
            DriverError::FileNotFound { .. } | DriverError::FileUnreadable { .. } => 74,
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_clox_conventions() {
        assert_eq!(DriverError::Usage.exit_code(), 64);
        assert_eq!(DriverError::CompileFailed.exit_code(), 65);
        assert_eq!(DriverError::FileNotFound { path: "x".into() }.exit_code(), 74);
    }
}
