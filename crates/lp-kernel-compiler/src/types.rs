//! Kernel-level types and their CLIF lowering.

use core::fmt;

use cranelift_codegen::ir::{Type, types};

use crate::error::{ErrorCode, KernelError};

/// Scalar element types supported by device kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    I32,
    I64,
    F32,
    F64,
}

impl ScalarType {
    /// The CLIF type this scalar lowers to.
    pub fn clif_type(self) -> Type {
        match self {
            ScalarType::I32 => types::I32,
            ScalarType::I64 => types::I64,
            ScalarType::F32 => types::F32,
            ScalarType::F64 => types::F64,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ScalarType::I32 => "i32",
            ScalarType::I64 => "i64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    pub(crate) fn parse(text: &str) -> Option<ScalarType> {
        match text {
            "i32" => Some(ScalarType::I32),
            "i64" => Some(ScalarType::I64),
            "f32" => Some(ScalarType::F32),
            "f64" => Some(ScalarType::F64),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Declared kernel return type: a scalar or a flat tuple of scalars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelType {
    Scalar(ScalarType),
    Tuple(Vec<ScalarType>),
}

impl KernelType {
    /// Number of return components (a scalar counts as one).
    pub fn component_count(&self) -> usize {
        match self {
            KernelType::Scalar(_) => 1,
            KernelType::Tuple(elems) => elems.len(),
        }
    }

    /// Component types in declared order.
    pub fn components(&self) -> &[ScalarType] {
        match self {
            KernelType::Scalar(ty) => core::slice::from_ref(ty),
            KernelType::Tuple(elems) => elems,
        }
    }

    /// Tuple returns must have at least one element.
    pub fn validate(&self) -> Result<(), KernelError> {
        match self {
            KernelType::Tuple(elems) if elems.is_empty() => Err(KernelError::new(
                ErrorCode::E0302,
                "tuple return types must have at least one element",
            )),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelType::Scalar(ty) => write!(f, "{ty}"),
            KernelType::Tuple(elems) => {
                f.write_str("(")?;
                for (i, ty) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{ty}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clif_mapping() {
        assert_eq!(ScalarType::I32.clif_type(), types::I32);
        assert_eq!(ScalarType::I64.clif_type(), types::I64);
        assert_eq!(ScalarType::F32.clif_type(), types::F32);
        assert_eq!(ScalarType::F64.clif_type(), types::F64);
    }

    #[test]
    fn test_component_views() {
        let scalar = KernelType::Scalar(ScalarType::F32);
        assert_eq!(scalar.component_count(), 1);
        assert_eq!(scalar.components(), &[ScalarType::F32]);

        let pair = KernelType::Tuple(vec![ScalarType::I32, ScalarType::I64]);
        assert_eq!(pair.component_count(), 2);
        assert_eq!(pair.components(), &[ScalarType::I32, ScalarType::I64]);
    }

    #[test]
    fn test_empty_tuple_rejected() {
        let empty = KernelType::Tuple(Vec::new());
        let err = empty.validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::E0302);
    }

    #[test]
    fn test_display() {
        assert_eq!(KernelType::Scalar(ScalarType::I64).to_string(), "i64");
        assert_eq!(
            KernelType::Tuple(vec![ScalarType::I32, ScalarType::F64]).to_string(),
            "(i32, f64)"
        );
    }
}
