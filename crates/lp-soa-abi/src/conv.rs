//! The SoA return convention descriptor.
//!
//! A function using this convention writes each component of its result
//! through a caller-supplied pointer instead of returning it. The C
//! prototype of a wrapped kernel looks like:
//!
//! ```c
//! void name(c0 *out0, ..., cN *outN, args...);
//! ```
//!
//! The descriptor is pure: it computes signatures and selects/names
//! parameters, nothing else. It deliberately exposes no operation for
//! the boxed convention's status or exception machinery; the only thing
//! a caller can do with those is ask [`SoaAbi::require_feature`], which
//! always fails before anything is emitted.

use cranelift_codegen::ir::{AbiParam, Signature, Type, Value};
use cranelift_codegen::isa::CallConv;

use lp_kernel_compiler::error::{ErrorCode, KernelError};
use lp_kernel_compiler::types::{KernelType, ScalarType};
use lp_kernel_compiler::KernelCodegen;

/// Classification of a kernel return type, computed once; downstream
/// pointer counts and extraction bounds all read this tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnShape {
    Scalar(ScalarType),
    Tuple(Vec<ScalarType>),
}

impl ReturnShape {
    /// Derive the shape from a declared return type.
    pub fn of(ret: &KernelType) -> Result<ReturnShape, KernelError> {
        ret.validate()?;
        Ok(match ret {
            KernelType::Scalar(ty) => ReturnShape::Scalar(*ty),
            KernelType::Tuple(elems) => ReturnShape::Tuple(elems.clone()),
        })
    }

    /// Output pointer count: one per component.
    pub fn component_count(&self) -> usize {
        match self {
            ReturnShape::Scalar(_) => 1,
            ReturnShape::Tuple(elems) => elems.len(),
        }
    }

    /// Component types in declared order.
    pub fn components(&self) -> &[ScalarType] {
        match self {
            ReturnShape::Scalar(ty) => core::slice::from_ref(ty),
            ReturnShape::Tuple(elems) => elems,
        }
    }
}

/// Auxiliary behaviors of the boxed convention. None of them has a
/// channel in the SoA convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxedFeature {
    /// Returning a recoverable failure / exception object.
    FailureReturn,
    /// Propagating a callee's status code to the caller.
    StatusPropagation,
    /// Calling a SoA-return function as an ordinary value-returning
    /// callee.
    DirectCall,
}

/// The structure-of-output-arguments convention for one target.
#[derive(Debug, Clone, Copy)]
pub struct SoaAbi {
    pointer_type: Type,
    call_conv: CallConv,
}

impl SoaAbi {
    pub fn new(codegen: &KernelCodegen) -> SoaAbi {
        SoaAbi {
            pointer_type: codegen.pointer_type(),
            call_conv: codegen.call_conv(),
        }
    }

    /// The wrapper's low-level signature: `|shape|` output pointers,
    /// then the original arguments, returning nothing.
    pub fn wrapper_signature(&self, shape: &ReturnShape, args: &[ScalarType]) -> Signature {
        let mut sig = Signature::new(self.call_conv);
        for _ in shape.components() {
            sig.params.push(AbiParam::new(self.pointer_type));
        }
        for arg in args {
            sig.params.push(AbiParam::new(arg.clif_type()));
        }
        sig
    }

    /// The wrapper parameters that carry the original arguments: all of
    /// them after the leading output pointers. `params` must be the
    /// wrapper's full entry-block parameter list.
    pub fn caller_params<'a>(&self, params: &'a [Value], shape: &ReturnShape) -> &'a [Value] {
        &params[shape.component_count()..]
    }

    /// The wrapper parameters that carry output pointers.
    pub fn output_params<'a>(&self, params: &'a [Value], shape: &ReturnShape) -> &'a [Value] {
        &params[..shape.component_count()]
    }

    /// Human-readable parameter names in wrapper order, for listing
    /// headers (CLIF itself has no named parameters).
    pub fn parameter_names(&self, shape: &ReturnShape, arg_names: &[String]) -> Vec<String> {
        let mut names = Vec::with_capacity(shape.component_count() + arg_names.len());
        for i in 0..shape.component_count() {
            names.push(format!("out{i}"));
        }
        for name in arg_names {
            names.push(format!("arg.{name}"));
        }
        names
    }

    /// Check that this convention can express a boxed-convention
    /// auxiliary behavior. It never can; the failure is explicit so no
    /// caller attempts the behavior silently or half-emits it.
    pub fn require_feature(&self, feature: BoxedFeature) -> Result<(), KernelError> {
        Err(match feature {
            BoxedFeature::FailureReturn => KernelError::new(
                ErrorCode::E0601,
                "failure returns cannot be expressed when returning in SoA form",
            ),
            BoxedFeature::StatusPropagation => KernelError::new(
                ErrorCode::E0602,
                "return status cannot be propagated when returning in SoA form",
            ),
            BoxedFeature::DirectCall => KernelError::new(
                ErrorCode::E0603,
                "a SoA-return function cannot be called as an ordinary callee",
            ),
        })
    }
}
