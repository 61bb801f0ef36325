//! Kernel front-end: source AST and boxed-convention lowering.

pub mod ast;
pub mod lower;

pub use ast::{BinOp, CmpOp, Expr, Guard, KernelFn, Literal};
pub use lower::{CompiledKernel, KernelDescriptor, boxed_signature, compile_boxed, kernel_symbol};
