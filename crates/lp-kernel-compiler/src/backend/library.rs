//! Linkable device units.
//!
//! A [`KernelLibrary`] is one independently nameable compilation unit.
//! Functions are defined through a builder closure, the per-function
//! machine listing is captured at definition time, and [`finalize`]
//! emits the ELF object. A finalized library is immutable and may be
//! linked against by any number of later units.
//!
//! [`finalize`]: KernelLibrary::finalize

use std::sync::Arc;

use cranelift_codegen::ir::{Signature, UserFuncName};
use cranelift_codegen::write_function;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_module::{FuncId, Linkage, Module, default_libcall_names};
use cranelift_object::{ObjectBuilder, ObjectModule};
use log::{debug, trace};
use object::{Object, ObjectSymbol, SymbolKind};

use crate::backend::target::{CodegenOptions, ComputeTier, KernelCodegen};
use crate::error::{ErrorCode, KernelError};

/// Captured text for one defined function.
#[derive(Debug, Clone)]
pub struct FunctionAsm {
    pub symbol: String,
    /// Header note (parameter naming and the like) shown above the
    /// listing.
    pub note: Option<String>,
    pub clif: String,
    pub vcode: String,
}

/// An independently nameable compilation unit.
pub struct KernelLibrary {
    name: String,
    entry: Option<String>,
    tier: ComputeTier,
    device: bool,
    options: CodegenOptions,
    module: Option<ObjectModule>,
    object_bytes: Option<Vec<u8>>,
    functions: Vec<FunctionAsm>,
    imports: Vec<String>,
    links: Vec<Arc<KernelLibrary>>,
    next_func: u32,
}

impl core::fmt::Debug for KernelLibrary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KernelLibrary")
            .field("name", &self.name)
            .field("entry", &self.entry)
            .field("tier", &self.tier)
            .field("device", &self.device)
            .field("functions", &self.functions)
            .field("imports", &self.imports)
            .finish_non_exhaustive()
    }
}

impl KernelLibrary {
    pub(crate) fn new(
        codegen: &KernelCodegen,
        name: &str,
        entry: Option<&str>,
    ) -> Result<Self, KernelError> {
        let builder = ObjectBuilder::new(
            codegen.owned_isa(),
            name.to_owned(),
            default_libcall_names(),
        )?;
        debug!("created unit `{name}` for {}", codegen.tier());
        Ok(KernelLibrary {
            name: name.to_owned(),
            entry: entry.map(str::to_owned),
            tier: codegen.tier(),
            device: codegen.is_device(),
            options: codegen.options(),
            module: Some(ObjectModule::new(builder)),
            object_bytes: None,
            functions: Vec::new(),
            imports: Vec::new(),
            links: Vec::new(),
            next_func: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Externally visible entry symbol, when the unit declares one.
    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    pub fn tier(&self) -> ComputeTier {
        self.tier
    }

    pub fn is_device(&self) -> bool {
        self.device
    }

    pub fn is_finalized(&self) -> bool {
        self.object_bytes.is_some()
    }

    pub fn imports(&self) -> &[String] {
        &self.imports
    }

    pub fn link_dependencies(&self) -> &[Arc<KernelLibrary>] {
        &self.links
    }

    /// Captured text for the functions defined in this unit, in
    /// definition order.
    pub fn functions(&self) -> &[FunctionAsm] {
        &self.functions
    }

    /// Define one function by building its body through `build`. The
    /// entry block is created, parameterized, and current when the
    /// closure runs; the closure must terminate the function itself.
    pub fn define_function(
        &mut self,
        symbol: &str,
        linkage: Linkage,
        sig: Signature,
        note: Option<String>,
        build: impl FnOnce(&mut FunctionBuilder<'_>, &mut ObjectModule) -> Result<(), KernelError>,
    ) -> Result<FuncId, KernelError> {
        let module = self.module.as_mut().ok_or_else(|| {
            KernelError::new(ErrorCode::E0403, "cannot define functions in a finalized unit")
        })?;

        let func_id = module.declare_function(symbol, linkage, &sig)?;

        let mut ctx = module.make_context();
        ctx.func.signature = sig;
        ctx.func.name = UserFuncName::user(0, self.next_func);
        self.next_func += 1;
        ctx.set_disasm(true);

        let mut fb_ctx = FunctionBuilderContext::new();
        let mut builder = FunctionBuilder::new(&mut ctx.func, &mut fb_ctx);
        let entry = builder.create_block();
        builder.append_block_params_for_function_params(entry);
        builder.switch_to_block(entry);
        builder.seal_block(entry);

        build(&mut builder, module)?;
        builder.finalize();

        let mut clif = String::new();
        write_function(&mut clif, &ctx.func)
            .map_err(|err| KernelError::new(ErrorCode::E0401, err.to_string()))?;

        module.define_function(func_id, &mut ctx)?;

        let vcode = ctx
            .compiled_code()
            .and_then(|code| code.vcode.clone())
            .ok_or_else(|| {
                KernelError::new(ErrorCode::E0401, "code generator produced no disassembly")
            })?;
        trace!("defined `{symbol}` in `{}`", self.name);

        self.functions.push(FunctionAsm {
            symbol: symbol.to_owned(),
            note,
            clif,
            vcode,
        });
        Ok(func_id)
    }

    /// Declare an external function resolved at link time; no body is
    /// attached here.
    pub fn declare_import(&mut self, symbol: &str, sig: &Signature) -> Result<FuncId, KernelError> {
        let module = self.module.as_mut().ok_or_else(|| {
            KernelError::new(ErrorCode::E0403, "cannot declare imports in a finalized unit")
        })?;
        let func_id = module.declare_function(symbol, Linkage::Import, sig)?;
        self.imports.push(symbol.to_owned());
        Ok(func_id)
    }

    /// Record `library` as a link dependency of this unit. Dependencies
    /// must already be finalized; they are read-only from here on.
    pub fn add_link_dependency(&mut self, library: Arc<KernelLibrary>) -> Result<(), KernelError> {
        if self.module.is_none() {
            return Err(KernelError::new(
                ErrorCode::E0403,
                "cannot add link dependencies to a finalized unit",
            ));
        }
        if !library.is_finalized() {
            return Err(KernelError::new(
                ErrorCode::E0403,
                "link dependencies must be finalized before use",
            ));
        }
        self.links.push(library);
        Ok(())
    }

    /// Emit the unit's ELF object and seal it against further change.
    pub fn finalize(&mut self) -> Result<(), KernelError> {
        let module = self.module.take().ok_or_else(|| {
            KernelError::new(ErrorCode::E0403, "unit is already finalized")
        })?;
        let product = module.finish();
        let bytes = product
            .emit()
            .map_err(|err| KernelError::new(ErrorCode::E0401, format!("object emission failed: {err}")))?;
        debug!("finalized `{}` ({} bytes)", self.name, bytes.len());
        self.object_bytes = Some(bytes);
        Ok(())
    }

    /// The emitted ELF object. Only available once finalized.
    pub fn object(&self) -> Result<&[u8], KernelError> {
        self.object_bytes.as_deref().ok_or_else(|| {
            KernelError::new(ErrorCode::E0403, "unit must be finalized before emission")
        })
    }

    /// Function symbols defined (not merely referenced) by this unit.
    pub fn defined_symbols(&self) -> Result<Vec<String>, KernelError> {
        let file = object::File::parse(self.object()?)
            .map_err(|err| KernelError::new(ErrorCode::E0401, format!("bad object file: {err}")))?;
        let mut symbols = Vec::new();
        for symbol in file.symbols() {
            if symbol.is_definition() && symbol.kind() == SymbolKind::Text {
                let name = symbol.name().map_err(|err| {
                    KernelError::new(ErrorCode::E0401, format!("bad symbol name: {err}"))
                })?;
                symbols.push(name.to_owned());
            }
        }
        Ok(symbols)
    }

    /// Target machine text for this unit and everything it links, for
    /// the given compute tier. Units are compiled for exactly one tier;
    /// asking for another is an error, not a silent re-target.
    pub fn target_text(&self, tier: ComputeTier) -> Result<String, KernelError> {
        if !self.is_finalized() {
            return Err(KernelError::new(
                ErrorCode::E0403,
                "unit must be finalized before emission",
            ));
        }
        if tier != self.tier {
            return Err(KernelError::new(
                ErrorCode::E0502,
                format!(
                    "unit `{}` was compiled for {}, not {tier}",
                    self.name, self.tier
                ),
            ));
        }

        let mut out = String::new();
        out.push_str(&format!("; unit {} tier {}\n", self.name, self.tier));
        if let Some(entry) = &self.entry {
            out.push_str(&format!("; entry {entry}\n"));
        }
        self.append_functions(&mut out);
        Ok(out)
    }

    fn append_functions(&self, out: &mut String) {
        for link in &self.links {
            link.append_functions(out);
        }
        for function in &self.functions {
            out.push_str(&format!("\n; function {}\n", function.symbol));
            if let Some(note) = &function.note {
                out.push_str(&format!("; {note}\n"));
            }
            if self.options.debug {
                out.push_str(&function.clif);
                out.push('\n');
            }
            out.push_str(&function.vcode);
        }
    }
}
