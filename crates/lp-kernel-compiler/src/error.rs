//! Error types for kernel compilation and ABI synthesis.

use core::fmt;

/// Stable error codes for compiler diagnostics.
///
/// Grouped by pipeline stage: E02xx front-end checks, E03xx signature
/// normalization, E04xx code generation and unit lifecycle, E05xx target
/// selection, E06xx calling-convention boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Operand or result type mismatch in a kernel body
    E0201,
    /// Result expression count does not match the return type
    E0202,
    /// Reference to an unknown kernel parameter
    E0203,
    /// Parameter count does not match the signature
    E0204,
    /// Malformed signature text
    E0301,
    /// Empty tuple return type
    E0302,
    /// Code generator or module error
    E0401,
    /// Symbol not defined in the referenced library
    E0402,
    /// Unit used in the wrong lifecycle state
    E0403,
    /// Non-device compilation requested
    E0501,
    /// Target text requested for a different compute tier
    E0502,
    /// Failure/exception return requested under the SoA convention
    E0601,
    /// Status propagation requested under the SoA convention
    E0602,
    /// SoA-return function requested as an ordinary callee
    E0603,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::E0201 => "E0201",
            ErrorCode::E0202 => "E0202",
            ErrorCode::E0203 => "E0203",
            ErrorCode::E0204 => "E0204",
            ErrorCode::E0301 => "E0301",
            ErrorCode::E0302 => "E0302",
            ErrorCode::E0401 => "E0401",
            ErrorCode::E0402 => "E0402",
            ErrorCode::E0403 => "E0403",
            ErrorCode::E0501 => "E0501",
            ErrorCode::E0502 => "E0502",
            ErrorCode::E0601 => "E0601",
            ErrorCode::E0602 => "E0602",
            ErrorCode::E0603 => "E0603",
        }
    }

    /// Coarse classification used at the ABI-layer boundary.
    pub fn kind(self) -> ErrorKind {
        match self {
            ErrorCode::E0501 | ErrorCode::E0502 => ErrorKind::UnsupportedTarget,
            ErrorCode::E0601 | ErrorCode::E0602 | ErrorCode::E0603 => {
                ErrorKind::UnsupportedConventionFeature
            }
            _ => ErrorKind::CompilationFailure,
        }
    }
}

/// Error classes surfaced to callers of the compile-and-wrap pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Front-end or code-generator failure, propagated unchanged
    CompilationFailure,
    /// The requested output target is not supported
    UnsupportedTarget,
    /// The requested behavior has no channel in the active convention
    UnsupportedConventionFeature,
}

/// A compiler diagnostic with a stable code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelError {
    code: ErrorCode,
    message: String,
}

impl KernelError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        KernelError {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        KernelError::new(ErrorCode::E0201, message)
    }

    pub fn unknown_parameter(name: &str) -> Self {
        KernelError::new(ErrorCode::E0203, format!("unknown kernel parameter `{name}`"))
    }

    pub fn unsupported_target(message: impl Into<String>) -> Self {
        KernelError::new(ErrorCode::E0501, message)
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error[{}]: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for KernelError {}

impl From<cranelift_module::ModuleError> for KernelError {
    fn from(err: cranelift_module::ModuleError) -> Self {
        KernelError::new(ErrorCode::E0401, err.to_string())
    }
}

impl From<cranelift_codegen::CodegenError> for KernelError {
    fn from(err: cranelift_codegen::CodegenError) -> Self {
        KernelError::new(ErrorCode::E0401, err.to_string())
    }
}

impl From<cranelift_codegen::settings::SetError> for KernelError {
    fn from(err: cranelift_codegen::settings::SetError) -> Self {
        KernelError::new(ErrorCode::E0401, err.to_string())
    }
}

impl From<cranelift_codegen::isa::LookupError> for KernelError {
    fn from(err: cranelift_codegen::isa::LookupError) -> Self {
        KernelError::new(ErrorCode::E0501, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ErrorCode::E0201.kind(), ErrorKind::CompilationFailure);
        assert_eq!(ErrorCode::E0401.kind(), ErrorKind::CompilationFailure);
        assert_eq!(ErrorCode::E0501.kind(), ErrorKind::UnsupportedTarget);
        assert_eq!(ErrorCode::E0502.kind(), ErrorKind::UnsupportedTarget);
        assert_eq!(
            ErrorCode::E0601.kind(),
            ErrorKind::UnsupportedConventionFeature
        );
        assert_eq!(
            ErrorCode::E0603.kind(),
            ErrorKind::UnsupportedConventionFeature
        );
    }

    #[test]
    fn test_display_includes_code() {
        let err = KernelError::new(ErrorCode::E0203, "unknown kernel parameter `z`");
        assert_eq!(err.to_string(), "error[E0203]: unknown kernel parameter `z`");
    }
}
