//! SoA return ABI demo.
//!
//! Compiles a two-result kernel for the rv64 device, wraps it so the
//! results come back through output pointers, and prints the linked
//! unit's machine listing.

use anyhow::Context;

use lp_kernel_compiler::{ComputeTier, Expr, KernelFn};
use lp_soa_abi::{AbiInfo, SoaCompileOptions, compile_kernel_soa};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // addsub(x, y) = (x + y, x - y)
    let kernel = KernelFn::new("addsub")
        .param("x")
        .param("y")
        .result(Expr::add(Expr::param("x"), Expr::param("y")))
        .result(Expr::sub(Expr::param("x"), Expr::param("y")));
    let signature = "(i32, i32) -> (i32, i32)";

    println!("=== SoA wrapper for addsub {signature} ===\n");

    let options = SoaCompileOptions {
        device: true,
        debug: true,
        tier: Some(ComputeTier::Base),
        abi_info: Some(AbiInfo {
            abi_name: "soa_addsub".to_owned(),
        }),
        ..SoaCompileOptions::default()
    };
    let (text, resty) = compile_kernel_soa(&kernel, signature, &options)
        .context("SoA compilation failed")?;

    println!("{text}");
    println!("return type: {resty}");

    // The convention is device-only; host compilation is refused up
    // front.
    let host = SoaCompileOptions::default();
    match compile_kernel_soa(&kernel, signature, &host) {
        Ok(_) => anyhow::bail!("host compilation should have been rejected"),
        Err(err) => println!("\nhost compilation rejected as expected: {err}"),
    }

    Ok(())
}
