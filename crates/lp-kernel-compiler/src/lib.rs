//! Kernel compiler for the LightPlayer streaming core.
//!
//! This crate covers the pipeline up to and including the boxed calling
//! convention:
//! - a small kernel AST and its type checking ([`frontend`])
//! - signature normalization ([`signature`])
//! - Cranelift-based code generation for the rv64 device, organized as
//!   independently nameable linkable units ([`backend`])
//!
//! Kernels compiled here return `(i32 status, components...)`; adapting
//! that convention for callers that need output pointers instead lives
//! in the `lp-soa-abi` crate.

pub mod backend;
pub mod error;
pub mod frontend;
pub mod signature;
pub mod types;

pub use backend::{CodegenOptions, ComputeTier, FunctionAsm, KernelCodegen, KernelLibrary};
pub use error::{ErrorCode, ErrorKind, KernelError};
pub use frontend::{
    BinOp, CmpOp, CompiledKernel, Expr, Guard, KernelDescriptor, KernelFn, Literal,
    boxed_signature, compile_boxed, kernel_symbol,
};
pub use signature::{KernelSignature, normalize_signature};
pub use types::{KernelType, ScalarType};
