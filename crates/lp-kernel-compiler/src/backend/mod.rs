//! Device backend: target selection and linkable units.

pub mod library;
pub mod target;

pub use library::{FunctionAsm, KernelLibrary};
pub use target::{CodegenOptions, ComputeTier, KernelCodegen};
