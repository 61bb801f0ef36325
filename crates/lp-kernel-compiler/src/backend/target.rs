//! Device target selection.
//!
//! The device is a 64-bit RISC-V streaming core. Compute tiers select
//! the ISA extension level the emitted code may rely on; the lowest
//! tier is supported by every deployed core.

use core::fmt;
use core::str::FromStr;

use cranelift_codegen::isa::{self, CallConv, OwnedTargetIsa};
use cranelift_codegen::ir::Type;
use cranelift_codegen::settings::{self, Configurable};
use target_lexicon::Triple;

use crate::backend::library::KernelLibrary;
use crate::error::{ErrorCode, KernelError};

/// Device ISA feature tiers, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ComputeTier {
    /// rv64gc baseline.
    #[default]
    Base,
    /// Adds the Zba/Zbb/Zbs bit-manipulation extensions.
    Zb,
    /// Adds the vector extension on top of [`ComputeTier::Zb`].
    Vector,
}

impl ComputeTier {
    pub fn name(self) -> &'static str {
        match self {
            ComputeTier::Base => "rv64",
            ComputeTier::Zb => "rv64zb",
            ComputeTier::Vector => "rv64v",
        }
    }

    /// ISA flags enabled on top of the rv64gc baseline.
    fn isa_flags(self) -> &'static [&'static str] {
        match self {
            ComputeTier::Base => &[],
            ComputeTier::Zb => &["has_zba", "has_zbb", "has_zbs"],
            ComputeTier::Vector => &["has_zba", "has_zbb", "has_zbs", "has_v"],
        }
    }
}

impl fmt::Display for ComputeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ComputeTier {
    type Err = KernelError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text {
            "rv64" => Ok(ComputeTier::Base),
            "rv64zb" => Ok(ComputeTier::Zb),
            "rv64v" => Ok(ComputeTier::Vector),
            _ => Err(KernelError::new(
                ErrorCode::E0501,
                format!("unknown compute tier `{text}`"),
            )),
        }
    }
}

/// Options threaded through the whole compile pipeline.
#[derive(Debug, Clone, Copy)]
pub struct CodegenOptions {
    /// Optimize for speed; off compiles faster but emits naive code.
    pub opt: bool,
    /// Relax IEEE determinism. When off, NaN results are canonicalized
    /// so every tier produces bit-identical float output.
    pub fastmath: bool,
    /// Include CLIF IR in target text alongside the machine listing.
    pub debug: bool,
    /// Annotate CLIF with per-expression source locations.
    pub lineinfo: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions {
            opt: true,
            fastmath: false,
            debug: false,
            lineinfo: false,
        }
    }
}

/// Handle to the code generator for one target.
///
/// The underlying code generator keeps process-wide state; creating and
/// finalizing libraries for concurrent compilations must be serialized
/// by the caller (the pipeline holds a process-wide lock).
pub struct KernelCodegen {
    isa: OwnedTargetIsa,
    tier: ComputeTier,
    device: bool,
    options: CodegenOptions,
}

impl KernelCodegen {
    /// Code generator for the streaming device at the given tier.
    pub fn for_device(tier: ComputeTier, options: CodegenOptions) -> Result<Self, KernelError> {
        let triple: Triple = "riscv64gc-unknown-none-elf".parse().map_err(|err| {
            KernelError::new(ErrorCode::E0501, format!("bad device triple: {err}"))
        })?;
        Self::build(triple, tier, true, options)
    }

    /// Code generator for caller-facing host code. Host functions keep
    /// the boxed convention end to end; SoA wrapping rejects them.
    pub fn for_host(options: CodegenOptions) -> Result<Self, KernelError> {
        Self::build(Triple::host(), ComputeTier::Base, false, options)
    }

    fn build(
        triple: Triple,
        tier: ComputeTier,
        device: bool,
        options: CodegenOptions,
    ) -> Result<Self, KernelError> {
        let mut flags = settings::builder();
        flags.set("opt_level", if options.opt { "speed" } else { "none" })?;
        flags.set("is_pic", "false")?;
        flags.set("unwind_info", "false")?;
        // Wide boxed returns (status + tuple components) are legalized
        // to a hidden sret pointer when they overflow return registers.
        flags.set("enable_multi_ret_implicit_sret", "true")?;
        if !options.fastmath {
            flags.set("enable_nan_canonicalization", "true")?;
        }

        let mut isa_builder = isa::lookup(triple)?;
        if device {
            for flag in tier.isa_flags() {
                isa_builder.set(flag, "true")?;
            }
        }
        let isa = isa_builder.finish(settings::Flags::new(flags))?;

        Ok(KernelCodegen {
            isa,
            tier,
            device,
            options,
        })
    }

    pub fn tier(&self) -> ComputeTier {
        self.tier
    }

    pub fn is_device(&self) -> bool {
        self.device
    }

    pub fn options(&self) -> CodegenOptions {
        self.options
    }

    pub fn call_conv(&self) -> CallConv {
        self.isa.default_call_conv()
    }

    pub fn pointer_type(&self) -> Type {
        self.isa.pointer_type()
    }

    pub(crate) fn owned_isa(&self) -> OwnedTargetIsa {
        self.isa.clone()
    }

    /// Create a fresh linkable unit scoped to this code generator.
    pub fn create_library(
        &self,
        name: &str,
        entry: Option<&str>,
    ) -> Result<KernelLibrary, KernelError> {
        KernelLibrary::new(self, name, entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(ComputeTier::Base < ComputeTier::Zb);
        assert!(ComputeTier::Zb < ComputeTier::Vector);
        assert_eq!(ComputeTier::default(), ComputeTier::Base);
    }

    #[test]
    fn test_tier_name_roundtrip() {
        for tier in [ComputeTier::Base, ComputeTier::Zb, ComputeTier::Vector] {
            assert_eq!(tier.name().parse::<ComputeTier>().unwrap(), tier);
        }
        assert!("sm50".parse::<ComputeTier>().is_err());
    }

    #[test]
    fn test_device_codegen_builds() {
        let codegen =
            KernelCodegen::for_device(ComputeTier::Base, CodegenOptions::default()).unwrap();
        assert!(codegen.is_device());
        assert_eq!(codegen.tier(), ComputeTier::Base);
        // The device is a 64-bit core.
        assert_eq!(codegen.pointer_type().bits(), 64);
    }

    #[test]
    fn test_device_codegen_builds_at_every_tier() {
        for tier in [ComputeTier::Base, ComputeTier::Zb, ComputeTier::Vector] {
            let codegen = KernelCodegen::for_device(tier, CodegenOptions::default()).unwrap();
            assert_eq!(codegen.tier(), tier);
        }
    }

    #[test]
    fn test_host_codegen_is_not_device() {
        let codegen = KernelCodegen::for_host(CodegenOptions::default()).unwrap();
        assert!(!codegen.is_device());
    }
}
