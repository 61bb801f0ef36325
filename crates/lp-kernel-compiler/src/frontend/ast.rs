//! Kernel source AST.
//!
//! A [`KernelFn`] is the source-function handle handed to the compiler:
//! named parameters, optional guard checks, and one result expression
//! per return component. Guards are the source-level failure construct;
//! under the boxed convention a failed guard returns its nonzero status
//! code instead of a computed value.

use core::num::NonZeroU32;

use crate::types::ScalarType;

/// Arithmetic operators on matching scalar operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        }
    }
}

/// Comparison operators, valid only in guard conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// A typed literal. Literals carry their type explicitly; there is no
/// numeric inference in the kernel language.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Literal {
    pub fn scalar_type(self) -> ScalarType {
        match self {
            Literal::I32(_) => ScalarType::I32,
            Literal::I64(_) => ScalarType::I64,
            Literal::F32(_) => ScalarType::F32,
            Literal::F64(_) => ScalarType::F64,
        }
    }
}

/// A pure kernel expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a kernel parameter by name.
    Param(String),
    Lit(Literal),
    Bin {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn param(name: impl Into<String>) -> Expr {
        Expr::Param(name.into())
    }

    pub fn lit(literal: Literal) -> Expr {
        Expr::Lit(literal)
    }

    pub fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Bin {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Expr {
        Expr::bin(BinOp::Add, lhs, rhs)
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
        Expr::bin(BinOp::Sub, lhs, rhs)
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
        Expr::bin(BinOp::Mul, lhs, rhs)
    }

    pub fn div(lhs: Expr, rhs: Expr) -> Expr {
        Expr::bin(BinOp::Div, lhs, rhs)
    }
}

/// A guard aborts the kernel with `status` when its condition is false.
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub op: CmpOp,
    pub lhs: Expr,
    pub rhs: Expr,
    pub status: NonZeroU32,
}

/// Source-function handle for one device kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct KernelFn {
    name: String,
    params: Vec<String>,
    guards: Vec<Guard>,
    results: Vec<Expr>,
}

impl KernelFn {
    pub fn new(name: impl Into<String>) -> KernelFn {
        KernelFn {
            name: name.into(),
            params: Vec::new(),
            guards: Vec::new(),
            results: Vec::new(),
        }
    }

    /// Append a named parameter.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(name.into());
        self
    }

    /// Append a guard; guards run in order, before any result is
    /// computed.
    pub fn guard(mut self, op: CmpOp, lhs: Expr, rhs: Expr, status: NonZeroU32) -> Self {
        self.guards.push(Guard {
            op,
            lhs,
            rhs,
            status,
        });
        self
    }

    /// Append a result expression. One result is required per return
    /// component, in declared tuple order.
    pub fn result(mut self, expr: Expr) -> Self {
        self.results.push(expr);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    pub fn results(&self) -> &[Expr] {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_shape() {
        let kernel = KernelFn::new("addsub")
            .param("x")
            .param("y")
            .result(Expr::add(Expr::param("x"), Expr::param("y")))
            .result(Expr::sub(Expr::param("x"), Expr::param("y")));

        assert_eq!(kernel.name(), "addsub");
        assert_eq!(kernel.param_names(), ["x", "y"]);
        assert_eq!(kernel.results().len(), 2);
        assert!(kernel.guards().is_empty());
    }

    #[test]
    fn test_literal_types() {
        assert_eq!(Literal::I32(7).scalar_type(), ScalarType::I32);
        assert_eq!(Literal::F64(0.5).scalar_type(), ScalarType::F64);
    }
}
