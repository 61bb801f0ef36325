//! Signature normalization.
//!
//! Signatures are written `(arg, ...) -> ret`, where `ret` is a scalar
//! type or a parenthesized tuple: `(i32, i32) -> (i32, i32)`. This is
//! the only signature syntax the pipeline accepts; everything downstream
//! works on the normalized form.

use crate::error::{ErrorCode, KernelError};
use crate::types::{KernelType, ScalarType};

/// A normalized kernel signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelSignature {
    /// Kernel parameters, in declaration order. Scalar-typed only;
    /// composite parameters are rejected during normalization.
    pub args: Vec<ScalarType>,
    pub ret: KernelType,
}

/// Parse signature text into its argument types and return type.
pub fn normalize_signature(text: &str) -> Result<KernelSignature, KernelError> {
    let (args_text, ret_text) = text.split_once("->").ok_or_else(|| {
        KernelError::new(
            ErrorCode::E0301,
            format!("signature `{text}` is missing `->`"),
        )
    })?;

    let args = parse_arg_list(args_text.trim())?;
    let ret = parse_return(ret_text.trim())?;
    ret.validate()?;

    Ok(KernelSignature { args, ret })
}

fn parse_arg_list(text: &str) -> Result<Vec<ScalarType>, KernelError> {
    let inner = strip_parens(text).ok_or_else(|| {
        KernelError::new(
            ErrorCode::E0301,
            format!("argument list `{text}` must be parenthesized"),
        )
    })?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    inner.split(',').map(|part| parse_arg(part.trim())).collect()
}

fn parse_arg(text: &str) -> Result<ScalarType, KernelError> {
    if text.starts_with('(') {
        return Err(KernelError::new(
            ErrorCode::E0301,
            "tuple-typed kernel parameters are not supported",
        ));
    }
    ScalarType::parse(text).ok_or_else(|| {
        KernelError::new(ErrorCode::E0301, format!("unknown scalar type `{text}`"))
    })
}

fn parse_return(text: &str) -> Result<KernelType, KernelError> {
    if let Some(inner) = strip_parens(text) {
        if inner.trim().is_empty() {
            return Ok(KernelType::Tuple(Vec::new()));
        }
        let elems = inner
            .split(',')
            .map(|part| parse_arg(part.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(KernelType::Tuple(elems))
    } else {
        Ok(KernelType::Scalar(parse_arg(text)?))
    }
}

/// Strip one outer pair of parentheses, or `None` if `text` has none.
fn strip_parens(text: &str) -> Option<&str> {
    text.strip_prefix('(')?.strip_suffix(')')
}
