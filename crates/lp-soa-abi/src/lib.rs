//! SoA return ABI for LightPlayer device kernels.
//!
//! Kernels come out of `lp-kernel-compiler` using the boxed calling
//! convention: a status code plus the computed value in return slots.
//! Device-side callers that are themselves generated code cannot
//! consume that — they have no runtime to interpret the status, and a
//! multi-component result has to land in caller-owned buffers. This
//! crate adapts one convention to the other:
//!
//! - [`conv`] describes the structure-of-output-arguments convention:
//!   how a return type maps to output-pointer parameters, and which
//!   boxed-convention behaviors have no channel here.
//! - [`wrapper`] synthesizes the trampoline unit that calls the
//!   compiled kernel, discards its status, and stores each return
//!   component through its output pointer.
//! - [`compile`] drives the whole pipeline behind the process-wide
//!   compiler lock.

pub mod compile;
pub mod conv;
pub mod wrapper;

pub use compile::{AbiInfo, SoaCompileOptions, compile_kernel_soa};
pub use conv::{BoxedFeature, ReturnShape, SoaAbi};
pub use wrapper::synthesize_wrapper;
