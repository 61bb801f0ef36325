//! End-to-end tests for the SoA return ABI.
//!
//! These drive the real pipeline: compile a kernel under the boxed
//! convention for the rv64 device, synthesize the SoA trampoline, and
//! inspect the emitted unit (ELF symbols, CLIF, machine listing).

use lp_soa_abi::{AbiInfo, BoxedFeature, ReturnShape, SoaAbi, SoaCompileOptions};
use lp_soa_abi::{compile_kernel_soa, synthesize_wrapper};

use lp_kernel_compiler::error::ErrorKind;
use lp_kernel_compiler::{
    CodegenOptions, CompiledKernel, ComputeTier, Expr, KernelCodegen, KernelFn, KernelType,
    ScalarType, compile_boxed, normalize_signature,
};

use object::{Object, ObjectSymbol, SymbolKind};

fn device_codegen() -> KernelCodegen {
    KernelCodegen::for_device(ComputeTier::Base, CodegenOptions::default()).unwrap()
}

fn addsub() -> KernelFn {
    KernelFn::new("addsub")
        .param("x")
        .param("y")
        .result(Expr::add(Expr::param("x"), Expr::param("y")))
        .result(Expr::sub(Expr::param("x"), Expr::param("y")))
}

fn compile_addsub(codegen: &KernelCodegen, sig: &str) -> CompiledKernel {
    let sig = normalize_signature(sig).unwrap();
    compile_boxed(codegen, &addsub(), &sig).unwrap()
}

/// First line of the wrapper's CLIF, which carries the declared
/// low-level signature.
fn clif_signature(unit: &lp_kernel_compiler::KernelLibrary) -> String {
    unit.functions()[0].clif.lines().next().unwrap().to_owned()
}

#[test]
fn test_wrapper_parameter_counts_per_shape() {
    let codegen = device_codegen();
    let abi = SoaAbi::new(&codegen);

    let cases = [
        (KernelType::Scalar(ScalarType::I32), 0),
        (KernelType::Scalar(ScalarType::F64), 3),
        (KernelType::Tuple(vec![ScalarType::I32; 2]), 2),
        (
            KernelType::Tuple(vec![ScalarType::F32, ScalarType::F32, ScalarType::F32]),
            1,
        ),
    ];
    for (ret, n_args) in cases {
        let shape = ReturnShape::of(&ret).unwrap();
        let args = vec![ScalarType::I32; n_args];
        let sig = abi.wrapper_signature(&shape, &args);

        assert_eq!(sig.params.len(), shape.component_count() + n_args);
        for param in &sig.params[..shape.component_count()] {
            assert_eq!(param.value_type, codegen.pointer_type());
        }
        assert!(sig.returns.is_empty());
    }
}

#[test]
fn test_pair_return_wrapper_has_exactly_four_params() {
    let codegen = device_codegen();
    let compiled = compile_addsub(&codegen, "(i32, i32) -> (i32, i32)");
    let unit = synthesize_wrapper(
        &codegen,
        compiled.library(),
        compiled.descriptor(),
        "addsub",
    )
    .unwrap();

    // Two 64-bit output pointers, then the two i32 arguments. No fifth
    // parameter exists.
    let sig = clif_signature(&unit);
    assert!(
        sig.contains("(i64, i64, i32, i32)"),
        "unexpected wrapper signature: {sig}"
    );

    // Straight-line trampoline: call, stores, bare return.
    let clif = &unit.functions()[0].clif;
    assert_eq!(clif.matches("store").count(), 2);
    assert!(clif.lines().any(|line| line.trim() == "return"));
}

#[test]
fn test_rename_controls_the_sole_defined_symbol() {
    let codegen = device_codegen();
    let compiled = compile_addsub(&codegen, "(i32, i32) -> (i32, i32)");
    let unit = synthesize_wrapper(
        &codegen,
        compiled.library(),
        compiled.descriptor(),
        "soa_addsub",
    )
    .unwrap();

    let file = object::File::parse(unit.object().unwrap()).unwrap();
    let defined: Vec<_> = file
        .symbols()
        .filter(|sym| sym.is_definition() && sym.kind() == SymbolKind::Text)
        .map(|sym| sym.name().unwrap().to_owned())
        .collect();
    assert_eq!(defined, vec!["soa_addsub".to_owned()]);

    // The original kernel stays a resolved-at-link-time reference.
    let undefined: Vec<_> = file
        .symbols()
        .filter(|sym| sym.is_undefined())
        .map(|sym| sym.name().unwrap().to_owned())
        .collect();
    assert!(undefined.contains(&"__lpk_addsub".to_owned()));
}

#[test]
fn test_argument_width_changes_only_that_parameter() {
    let codegen = device_codegen();
    let abi = SoaAbi::new(&codegen);
    let shape = ReturnShape::of(&KernelType::Tuple(vec![ScalarType::I32; 2])).unwrap();

    let narrow = abi.wrapper_signature(&shape, &[ScalarType::I32, ScalarType::I32]);
    let wide = abi.wrapper_signature(&shape, &[ScalarType::I64, ScalarType::I32]);

    assert_eq!(narrow.params.len(), wide.params.len());
    for i in [0, 1, 3] {
        assert_eq!(narrow.params[i].value_type, wide.params[i].value_type);
    }
    assert_ne!(narrow.params[2].value_type, wide.params[2].value_type);
}

#[test]
fn test_non_device_compilation_is_rejected() {
    let err = compile_kernel_soa(
        &addsub(),
        "(i32, i32) -> (i32, i32)",
        &SoaCompileOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedTarget);
}

#[test]
fn test_boxed_features_unsupported_for_scalar_and_tuple_shapes() {
    let codegen = device_codegen();
    let abi = SoaAbi::new(&codegen);

    for ret in [
        KernelType::Scalar(ScalarType::I32),
        KernelType::Tuple(vec![ScalarType::I32; 2]),
    ] {
        // The shape is expressible...
        let shape = ReturnShape::of(&ret).unwrap();
        let _ = abi.wrapper_signature(&shape, &[ScalarType::I32]);
        // ...but none of the boxed convention's auxiliary behaviors are.
        for feature in [
            BoxedFeature::FailureReturn,
            BoxedFeature::StatusPropagation,
            BoxedFeature::DirectCall,
        ] {
            let err = abi.require_feature(feature).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::UnsupportedConventionFeature);
        }
    }
}

#[test]
fn test_repeated_synthesis_declares_identical_signatures() {
    let codegen = device_codegen();
    let compiled = compile_addsub(&codegen, "(i32, i32) -> (i32, i32)");

    let first = synthesize_wrapper(
        &codegen,
        compiled.library(),
        compiled.descriptor(),
        "addsub",
    )
    .unwrap();
    let second = synthesize_wrapper(
        &codegen,
        compiled.library(),
        compiled.descriptor(),
        "addsub",
    )
    .unwrap();

    assert_eq!(clif_signature(&first), clif_signature(&second));
    assert_eq!(
        first.defined_symbols().unwrap(),
        second.defined_symbols().unwrap()
    );
}

#[test]
fn test_end_to_end_returns_declared_type_and_text() {
    let options = SoaCompileOptions {
        device: true,
        abi_info: Some(AbiInfo {
            abi_name: "soa_addsub".to_owned(),
        }),
        ..SoaCompileOptions::default()
    };
    let (text, resty) =
        compile_kernel_soa(&addsub(), "(i32, i32) -> (i32, i32)", &options).unwrap();

    assert_eq!(
        resty,
        KernelType::Tuple(vec![ScalarType::I32, ScalarType::I32])
    );
    // The linked text carries the kernel and the trampoline, trampoline
    // last.
    let kernel_at = text.find("; function __lpk_addsub").unwrap();
    let wrapper_at = text.find("; function soa_addsub").unwrap();
    assert!(kernel_at < wrapper_at);
}
