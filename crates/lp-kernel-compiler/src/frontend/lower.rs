//! Boxed-convention lowering.
//!
//! Kernels are lowered to CLIF under the boxed calling convention:
//! `fn(args...) -> (i32 status, c0, ..., cn-1)`. Status 0 is success.
//! A failed guard returns its nonzero status with zeroed components;
//! the components of a failed call carry no information.

use std::sync::Arc;

use cranelift_codegen::ir::condcodes::{FloatCC, IntCC};
use cranelift_codegen::ir::{AbiParam, InstBuilder, Signature, SourceLoc, Value, types};
use cranelift_frontend::FunctionBuilder;
use cranelift_module::Linkage;
use hashbrown::HashMap;
use log::debug;

use crate::backend::library::KernelLibrary;
use crate::backend::target::KernelCodegen;
use crate::error::{ErrorCode, KernelError};
use crate::frontend::ast::{BinOp, CmpOp, Expr, Guard, KernelFn, Literal};
use crate::signature::KernelSignature;
use crate::types::{KernelType, ScalarType};

/// Descriptor of one kernel compiled under the boxed convention.
///
/// Produced once per compilation and immutable afterward; the wrapper
/// synthesizer borrows it read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelDescriptor {
    /// Low-level device symbol of the compiled kernel.
    pub symbol: String,
    pub arg_names: Vec<String>,
    pub arg_types: Vec<ScalarType>,
    pub return_type: KernelType,
    /// Whether the kernel was compiled as device code.
    pub device: bool,
}

/// A compiled kernel: its descriptor plus the owning library.
#[derive(Clone)]
pub struct CompiledKernel {
    descriptor: KernelDescriptor,
    library: Arc<KernelLibrary>,
}

impl core::fmt::Debug for CompiledKernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompiledKernel")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl CompiledKernel {
    pub fn descriptor(&self) -> &KernelDescriptor {
        &self.descriptor
    }

    pub fn library(&self) -> &Arc<KernelLibrary> {
        &self.library
    }
}

/// Mangled device symbol for a kernel name.
pub fn kernel_symbol(name: &str) -> String {
    format!("__lpk_{name}")
}

/// CLIF signature of a kernel under the boxed convention: the declared
/// arguments in, `(i32 status, components...)` out.
pub fn boxed_signature(codegen: &KernelCodegen, sig: &KernelSignature) -> Signature {
    let mut out = Signature::new(codegen.call_conv());
    for arg in &sig.args {
        out.params.push(AbiParam::new(arg.clif_type()));
    }
    out.returns.push(AbiParam::new(types::I32));
    for component in sig.ret.components() {
        out.returns.push(AbiParam::new(component.clif_type()));
    }
    out
}

/// Compile a kernel under the boxed convention into a fresh, finalized
/// library.
pub fn compile_boxed(
    codegen: &KernelCodegen,
    kernel: &KernelFn,
    sig: &KernelSignature,
) -> Result<CompiledKernel, KernelError> {
    sig.ret.validate()?;
    if kernel.param_names().len() != sig.args.len() {
        return Err(KernelError::new(
            ErrorCode::E0204,
            format!(
                "kernel `{}` has {} parameters but the signature declares {}",
                kernel.name(),
                kernel.param_names().len(),
                sig.args.len()
            ),
        ));
    }
    if kernel.results().len() != sig.ret.component_count() {
        return Err(KernelError::new(
            ErrorCode::E0202,
            format!(
                "kernel `{}` produces {} results but the return type has {} components",
                kernel.name(),
                kernel.results().len(),
                sig.ret.component_count()
            ),
        ));
    }

    let symbol = kernel_symbol(kernel.name());
    let fn_sig = boxed_signature(codegen, sig);
    debug!(
        "lowering kernel `{}` as `{symbol}` returning {}",
        kernel.name(),
        sig.ret
    );

    let mut library = codegen.create_library(kernel.name(), None)?;
    let lineinfo = codegen.options().lineinfo;
    let components = sig.ret.components();

    library.define_function(&symbol, Linkage::Export, fn_sig, None, |builder, _module| {
        let entry = builder
            .current_block()
            .ok_or_else(|| KernelError::new(ErrorCode::E0401, "missing entry block"))?;
        let params = builder.block_params(entry).to_vec();

        let mut env = HashMap::new();
        for ((name, value), ty) in kernel.param_names().iter().zip(&params).zip(&sig.args) {
            env.insert(name.as_str(), (*value, *ty));
        }

        let mut lower = BodyLowerer {
            builder,
            env,
            lineinfo,
            next_loc: 0,
        };

        for guard in kernel.guards() {
            lower.lower_guard(guard, components)?;
        }

        let status = lower.builder.ins().iconst(types::I32, 0);
        let mut rets = vec![status];
        for (expr, want) in kernel.results().iter().zip(components) {
            let (value, ty) = lower.lower_expr(expr)?;
            if ty != *want {
                return Err(KernelError::type_mismatch(format!(
                    "result has type {ty} but the return component is {want}"
                )));
            }
            rets.push(value);
        }
        lower.builder.ins().return_(&rets);
        Ok(())
    })?;
    library.finalize()?;

    Ok(CompiledKernel {
        descriptor: KernelDescriptor {
            symbol,
            arg_names: kernel.param_names().to_vec(),
            arg_types: sig.args.clone(),
            return_type: sig.ret.clone(),
            device: codegen.is_device(),
        },
        library: Arc::new(library),
    })
}

struct BodyLowerer<'a, 'b> {
    builder: &'a mut FunctionBuilder<'b>,
    env: HashMap<&'a str, (Value, ScalarType)>,
    lineinfo: bool,
    next_loc: u32,
}

impl BodyLowerer<'_, '_> {
    fn mark(&mut self) {
        if self.lineinfo {
            self.next_loc += 1;
            self.builder.set_srcloc(SourceLoc::new(self.next_loc));
        }
    }

    fn lower_expr(&mut self, expr: &Expr) -> Result<(Value, ScalarType), KernelError> {
        self.mark();
        match expr {
            Expr::Param(name) => self
                .env
                .get(name.as_str())
                .copied()
                .ok_or_else(|| KernelError::unknown_parameter(name)),
            Expr::Lit(literal) => Ok(self.lower_literal(*literal)),
            Expr::Bin { op, lhs, rhs } => {
                let (lhs, lhs_ty) = self.lower_expr(lhs)?;
                let (rhs, rhs_ty) = self.lower_expr(rhs)?;
                if lhs_ty != rhs_ty {
                    return Err(KernelError::type_mismatch(format!(
                        "operands of `{}` have types {lhs_ty} and {rhs_ty}",
                        op.symbol()
                    )));
                }
                Ok((self.lower_bin(*op, lhs_ty, lhs, rhs), lhs_ty))
            }
        }
    }

    fn lower_literal(&mut self, literal: Literal) -> (Value, ScalarType) {
        let value = match literal {
            Literal::I32(v) => self.builder.ins().iconst(types::I32, i64::from(v)),
            Literal::I64(v) => self.builder.ins().iconst(types::I64, v),
            Literal::F32(v) => self.builder.ins().f32const(v),
            Literal::F64(v) => self.builder.ins().f64const(v),
        };
        (value, literal.scalar_type())
    }

    fn lower_bin(&mut self, op: BinOp, ty: ScalarType, lhs: Value, rhs: Value) -> Value {
        let ins = self.builder.ins();
        if ty.is_float() {
            match op {
                BinOp::Add => ins.fadd(lhs, rhs),
                BinOp::Sub => ins.fsub(lhs, rhs),
                BinOp::Mul => ins.fmul(lhs, rhs),
                BinOp::Div => ins.fdiv(lhs, rhs),
            }
        } else {
            match op {
                BinOp::Add => ins.iadd(lhs, rhs),
                BinOp::Sub => ins.isub(lhs, rhs),
                BinOp::Mul => ins.imul(lhs, rhs),
                BinOp::Div => ins.sdiv(lhs, rhs),
            }
        }
    }

    /// Emit one guard: branch to a failure block that returns the
    /// guard's status with zeroed components, then continue lowering in
    /// the fall-through block.
    fn lower_guard(&mut self, guard: &Guard, components: &[ScalarType]) -> Result<(), KernelError> {
        self.mark();
        let (lhs, lhs_ty) = self.lower_expr(&guard.lhs)?;
        let (rhs, rhs_ty) = self.lower_expr(&guard.rhs)?;
        if lhs_ty != rhs_ty {
            return Err(KernelError::type_mismatch(format!(
                "guard operands of `{}` have types {lhs_ty} and {rhs_ty}",
                guard.op.symbol()
            )));
        }

        let cond = if lhs_ty.is_float() {
            let cc = match guard.op {
                CmpOp::Eq => FloatCC::Equal,
                CmpOp::Ne => FloatCC::NotEqual,
                CmpOp::Lt => FloatCC::LessThan,
                CmpOp::Le => FloatCC::LessThanOrEqual,
                CmpOp::Gt => FloatCC::GreaterThan,
                CmpOp::Ge => FloatCC::GreaterThanOrEqual,
            };
            self.builder.ins().fcmp(cc, lhs, rhs)
        } else {
            let cc = match guard.op {
                CmpOp::Eq => IntCC::Equal,
                CmpOp::Ne => IntCC::NotEqual,
                CmpOp::Lt => IntCC::SignedLessThan,
                CmpOp::Le => IntCC::SignedLessThanOrEqual,
                CmpOp::Gt => IntCC::SignedGreaterThan,
                CmpOp::Ge => IntCC::SignedGreaterThanOrEqual,
            };
            self.builder.ins().icmp(cc, lhs, rhs)
        };

        let cont = self.builder.create_block();
        let fail = self.builder.create_block();
        self.builder.ins().brif(cond, cont, &[], fail, &[]);

        self.builder.switch_to_block(fail);
        self.builder.seal_block(fail);
        let status = self
            .builder
            .ins()
            .iconst(types::I32, i64::from(guard.status.get()));
        let mut rets = vec![status];
        for ty in components {
            rets.push(self.zero(*ty));
        }
        self.builder.ins().return_(&rets);

        self.builder.switch_to_block(cont);
        self.builder.seal_block(cont);
        Ok(())
    }

    fn zero(&mut self, ty: ScalarType) -> Value {
        match ty {
            ScalarType::I32 => self.builder.ins().iconst(types::I32, 0),
            ScalarType::I64 => self.builder.ins().iconst(types::I64, 0),
            ScalarType::F32 => self.builder.ins().f32const(0.0),
            ScalarType::F64 => self.builder.ins().f64const(0.0),
        }
    }
}
