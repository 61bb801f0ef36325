//! Wrapper synthesis.
//!
//! Builds the trampoline unit that adapts one boxed-convention kernel
//! to the SoA convention. The trampoline is straight-line: one call to
//! the original kernel, one store per return component, a void return.
//! The boxed status result is discarded; the SoA convention has no
//! channel to carry it.

use std::sync::Arc;

use cranelift_codegen::ir::{InstBuilder, MemFlags, Value};
use cranelift_module::{Linkage, Module};
use log::debug;

use lp_kernel_compiler::error::{ErrorCode, KernelError};
use lp_kernel_compiler::signature::KernelSignature;
use lp_kernel_compiler::{KernelCodegen, KernelDescriptor, KernelLibrary, boxed_signature};

use crate::conv::{ReturnShape, SoaAbi};

/// Synthesize a SoA-convention trampoline for `descriptor`, which must
/// name a function already compiled into `library`. Returns the
/// finalized wrapper unit, linked against `library`.
///
/// The convention is defined only for device kernels: a descriptor
/// compiled as caller-facing host code is rejected, since host callers
/// consume the boxed convention directly.
pub fn synthesize_wrapper(
    codegen: &KernelCodegen,
    library: &Arc<KernelLibrary>,
    descriptor: &KernelDescriptor,
    wrapper_name: &str,
) -> Result<KernelLibrary, KernelError> {
    if !descriptor.device {
        return Err(KernelError::unsupported_target(
            "the SoA return convention is defined only for device kernels",
        ));
    }
    let defined = library.defined_symbols()?;
    if !defined.iter().any(|symbol| symbol == &descriptor.symbol) {
        return Err(KernelError::new(
            ErrorCode::E0402,
            format!(
                "`{}` is not defined in library `{}`",
                descriptor.symbol,
                library.name()
            ),
        ));
    }

    let shape = ReturnShape::of(&descriptor.return_type)?;
    let abi = SoaAbi::new(codegen);
    let wrapper_sig = abi.wrapper_signature(&shape, &descriptor.arg_types);
    let callee_sig = boxed_signature(
        codegen,
        &KernelSignature {
            args: descriptor.arg_types.clone(),
            ret: descriptor.return_type.clone(),
        },
    );

    let mut unit = codegen.create_library(
        &format!("{}_function_", library.name()),
        Some(wrapper_name),
    )?;
    unit.add_link_dependency(Arc::clone(library))?;
    // Forward reference, resolved when the units are linked.
    let callee_id = unit.declare_import(&descriptor.symbol, &callee_sig)?;

    let note = format!(
        "params: {}",
        abi.parameter_names(&shape, &descriptor.arg_names).join(", ")
    );
    debug!(
        "synthesizing `{wrapper_name}` around `{}` ({} outputs)",
        descriptor.symbol,
        shape.component_count()
    );

    unit.define_function(
        wrapper_name,
        Linkage::Export,
        wrapper_sig,
        Some(note),
        |builder, module| {
            let entry = builder
                .current_block()
                .ok_or_else(|| KernelError::new(ErrorCode::E0401, "missing entry block"))?;
            let params = builder.block_params(entry).to_vec();
            let callee = module.declare_func_in_func(callee_id, builder.func);

            let args = marshal_arguments(abi.caller_params(&params, &shape));
            let call = builder.ins().call(callee, args);
            let results = builder.inst_results(call).to_vec();
            // results[0] is the boxed status; there is nowhere to put it.

            let outputs = abi.output_params(&params, &shape);
            for (i, output) in outputs.iter().enumerate() {
                builder
                    .ins()
                    .store(MemFlags::trusted(), results[1 + i], *output, 0);
            }
            builder.ins().return_(&[]);
            Ok(())
        },
    )?;
    unit.finalize()?;
    Ok(unit)
}

/// Marshal wrapper parameters into boxed-convention call arguments.
/// Kernel parameters are scalar-typed, so this is a 1:1 forward; any
/// composite flattening/packing would live here.
fn marshal_arguments(params: &[Value]) -> &[Value] {
    params
}
