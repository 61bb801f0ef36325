//! End-to-end SoA compilation.
//!
//! One entry point drives the whole pipeline: normalize the signature,
//! compile the kernel under the boxed convention, synthesize the SoA
//! trampoline, and extract the linked unit's target text. The code
//! generator keeps process-wide state, so the entire sequence runs
//! under a single process-wide lock.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use lp_kernel_compiler::error::KernelError;
use lp_kernel_compiler::{
    CodegenOptions, ComputeTier, KernelCodegen, KernelFn, KernelType, compile_boxed,
    normalize_signature,
};

use crate::wrapper::synthesize_wrapper;

/// Caller-supplied ABI overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbiInfo {
    /// Externally visible name for the emitted trampoline.
    pub abi_name: String,
}

/// Options for [`compile_kernel_soa`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoaCompileOptions {
    /// Include CLIF IR in the returned target text.
    pub debug: bool,
    /// Annotate CLIF with per-expression source locations.
    pub lineinfo: bool,
    /// Compile for the device. The SoA convention is device-only, and
    /// the default is off so callers must opt in explicitly.
    pub device: bool,
    /// Relax IEEE determinism (skips NaN canonicalization).
    pub fastmath: bool,
    /// Target compute tier; `None` selects the lowest tier every
    /// deployed core supports.
    pub tier: Option<ComputeTier>,
    /// Optimize the emitted code.
    pub opt: bool,
    /// Optional trampoline rename; the kernel's own name otherwise.
    pub abi_info: Option<AbiInfo>,
}

impl Default for SoaCompileOptions {
    fn default() -> Self {
        SoaCompileOptions {
            debug: false,
            lineinfo: false,
            device: false,
            fastmath: false,
            tier: None,
            opt: true,
            abi_info: None,
        }
    }
}

/// The code generator is not reentrant; compilations must not
/// interleave anywhere in the process.
static COMPILER_LOCK: Mutex<()> = Mutex::new(());

fn lock_compiler() -> MutexGuard<'static, ()> {
    // A poisoning panic already aborted its own synthesis; the lock
    // guards no data of its own.
    COMPILER_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Compile `kernel` for the device and wrap it so each return component
/// is written through a caller-supplied output pointer. Returns the
/// linked unit's target machine text and the kernel's declared return
/// type.
pub fn compile_kernel_soa(
    kernel: &KernelFn,
    sig: &str,
    options: &SoaCompileOptions,
) -> Result<(String, KernelType), KernelError> {
    if !options.device {
        return Err(KernelError::unsupported_target(
            "only device kernels can be compiled for the SoA return convention",
        ));
    }

    let _guard = lock_compiler();

    let sig = normalize_signature(sig)?;
    let tier = options.tier.unwrap_or_default();
    let codegen = KernelCodegen::for_device(
        tier,
        CodegenOptions {
            opt: options.opt,
            fastmath: options.fastmath,
            debug: options.debug,
            lineinfo: options.lineinfo,
        },
    )?;
    debug!("compiling `{}` for {tier}", kernel.name());

    let compiled = compile_boxed(&codegen, kernel, &sig)?;

    let wrapper_name = options
        .abi_info
        .as_ref()
        .map(|abi| abi.abi_name.as_str())
        .unwrap_or_else(|| kernel.name());
    let unit = synthesize_wrapper(
        &codegen,
        compiled.library(),
        compiled.descriptor(),
        wrapper_name,
    )?;

    let text = unit.target_text(tier)?;
    Ok((text, compiled.descriptor().return_type.clone()))
}
