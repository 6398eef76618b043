//! Callable functions.
//!
//! A [`Func`] is either a host function handed to an instance as an import or
//! a native function exported by compiled code. Both go through the same
//! signature check and trap boundary when called.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use aotwasm_common::RuntimeError;

use crate::trap::catch_traps;

/// A WebAssembly number type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValType::I32 => f.write_str("i32"),
            ValType::I64 => f.write_str("i64"),
            ValType::F32 => f.write_str("f32"),
            ValType::F64 => f.write_str("f64"),
        }
    }
}

/// An argument or result value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// The type of this value.
    pub fn ty(&self) -> ValType {
        match self {
            Value::I32(_) => ValType::I32,
            Value::I64(_) => ValType::I64,
            Value::F32(_) => ValType::F32,
            Value::F64(_) => ValType::F64,
        }
    }
}

/// Parameter and result types of a function.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct FuncType {
    pub params: Vec<ValType>,
    pub results: Vec<ValType>,
}

impl FuncType {
    pub fn new(
        params: impl IntoIterator<Item = ValType>,
        results: impl IntoIterator<Item = ValType>,
    ) -> Self {
        Self {
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
        }
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |types: &[ValType]| {
            types
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(f, "({}) -> ({})", join(&self.params), join(&self.results))
    }
}

type Callable = dyn Fn(&[Value]) -> Result<Vec<Value>, RuntimeError>;

struct FuncInner {
    ty: FuncType,
    callable: Box<Callable>,
}

/// A reference-counted function handle.
///
/// Clones refer to the same function; [`Func::ptr_eq`] compares identity.
#[derive(Clone)]
pub struct Func {
    inner: Rc<FuncInner>,
}

impl Func {
    /// Wrap `f` as a function of type `ty`.
    ///
    /// `f` may call [`crate::trap::raise`] to trap.
    pub fn new<F>(ty: FuncType, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Vec<Value>, RuntimeError> + 'static,
    {
        Self {
            inner: Rc::new(FuncInner {
                ty,
                callable: Box::new(f),
            }),
        }
    }

    /// The function's signature.
    pub fn ty(&self) -> &FuncType {
        &self.inner.ty
    }

    /// Call the function.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::InvalidArgument`] if `args` do not match the parameter types,
    ///   or the function returned results that do not match its result types
    /// - [`RuntimeError::Trap`] if the function trapped
    pub fn call(&self, args: &[Value]) -> Result<Vec<Value>, RuntimeError> {
        let ty = &self.inner.ty;
        check_types("argument", &ty.params, args)?;

        let results = catch_traps(|| (self.inner.callable)(args))?;

        check_types("result", &ty.results, &results)?;
        Ok(results)
    }

    /// Whether both handles refer to the same function.
    pub fn ptr_eq(&self, other: &Func) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Func {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Func")
            .field("ty", &self.inner.ty)
            .finish_non_exhaustive()
    }
}

fn check_types(what: &str, expected: &[ValType], values: &[Value]) -> Result<(), RuntimeError> {
    if expected.len() != values.len() {
        return Err(RuntimeError::invalid_argument(format!(
            "expected {} {what}s, got {}",
            expected.len(),
            values.len()
        )));
    }
    for (i, (ty, value)) in expected.iter().zip(values).enumerate() {
        if *ty != value.ty() {
            return Err(RuntimeError::invalid_argument(format!(
                "{what} {i}: expected {ty}, got {}",
                value.ty()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use aotwasm_common::TrapKind;

    use super::*;
    use crate::trap::raise;

    fn divide() -> Func {
        Func::new(
            FuncType::new([ValType::I32, ValType::I32], [ValType::I32]),
            |args| match args {
                [Value::I32(_), Value::I32(0)] => raise(TrapKind::IntegerDivisionByZero),
                [Value::I32(a), Value::I32(b)] => Ok(vec![Value::I32(a / b)]),
                _ => unreachable!(),
            },
        )
    }

    #[test]
    fn test_call() {
        let results = divide().call(&[Value::I32(10), Value::I32(3)]).unwrap();
        assert_eq!(results, vec![Value::I32(3)]);
    }

    #[test]
    fn test_call_checks_arguments() {
        let func = divide();

        let err = func.call(&[Value::I32(1)]).unwrap_err();
        assert!(err.to_string().contains("expected 2 arguments, got 1"));

        let err = func.call(&[Value::I32(1), Value::F64(2.0)]).unwrap_err();
        assert!(err.to_string().contains("argument 1: expected i32, got f64"));
    }

    #[test]
    fn test_call_checks_results() {
        let func = Func::new(FuncType::new([], [ValType::I64]), |_| {
            Ok(vec![Value::I32(1)])
        });
        assert!(matches!(
            func.call(&[]),
            Err(RuntimeError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_call_trap() {
        let err = divide().call(&[Value::I32(1), Value::I32(0)]).unwrap_err();
        assert_eq!(err.trap_kind(), Some(TrapKind::IntegerDivisionByZero));
    }

    #[test]
    fn test_identity() {
        let a = divide();
        let b = a.clone();
        let c = divide();

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn test_func_type_display() {
        let ty = FuncType::new([ValType::I32, ValType::F64], []);
        assert_eq!(ty.to_string(), "(i32, f64) -> ()");
    }
}
