//! Trap boundary between the host and compiled code.
//!
//! Compiled code reports a fault by calling [`raise`], which unwinds the
//! native stack back to the nearest [`catch_traps`] frame. Every entry point
//! into compiled code (instantiation factories, [`crate::Func::call`]) is
//! wrapped in [`catch_traps`], so a trap surfaces as
//! [`RuntimeError::Trap`] instead of terminating the process.
//!
//! Unwinding requires `panic = "unwind"`, which is the default profile
//! setting.

use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

use aotwasm_common::{RuntimeError, TrapKind};

/// Unwind payload carrying a trap out of compiled code.
struct TrapPayload(TrapKind);

/// Abort execution of compiled code with `kind`.
///
/// This does not run the panic hook, so traps are not reported on stderr.
pub fn raise(kind: TrapKind) -> ! {
    panic::resume_unwind(Box::new(TrapPayload(kind)))
}

/// Abort execution with a numeric trap code from the compiler runtime.
///
/// Unknown codes are reported as [`TrapKind::UnreachableCodeReached`].
pub fn raise_code(code: u32) -> ! {
    let kind = TrapKind::from_code(code).unwrap_or_else(|| {
        warn!(code, "Unknown trap code");
        TrapKind::UnreachableCodeReached
    });
    raise(kind)
}

/// Run `f`, converting a trap raised inside it into [`RuntimeError::Trap`].
///
/// Panics that are not traps are host bugs and keep unwinding.
pub fn catch_traps<T>(f: impl FnOnce() -> Result<T, RuntimeError>) -> Result<T, RuntimeError> {
    // Borrow guards held by `f` are dropped during the unwind, so no
    // object is left half-borrowed when the trap is reported.
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => match payload.downcast::<TrapPayload>() {
            Ok(trap) => {
                warn!(trap = %trap.0, "Compiled code trapped");
                Err(RuntimeError::trap(trap.0))
            }
            Err(other) => panic::resume_unwind(other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_trap() {
        let result = catch_traps(|| Ok(42));
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn test_error_passes_through() {
        let result: Result<(), _> = catch_traps(|| Err(RuntimeError::ImmutableGlobal));
        assert!(matches!(result, Err(RuntimeError::ImmutableGlobal)));
    }

    #[test]
    fn test_trap_converted() {
        let result: Result<(), _> = catch_traps(|| raise(TrapKind::IntegerDivisionByZero));
        assert_eq!(
            result.unwrap_err().trap_kind(),
            Some(TrapKind::IntegerDivisionByZero)
        );
    }

    #[test]
    fn test_trap_code_converted() {
        let result: Result<(), _> = catch_traps(|| raise_code(9));
        assert_eq!(result.unwrap_err().trap_kind(), Some(TrapKind::StackOverflow));

        let result: Result<(), _> = catch_traps(|| raise_code(1234));
        assert_eq!(
            result.unwrap_err().trap_kind(),
            Some(TrapKind::UnreachableCodeReached)
        );
    }

    #[test]
    fn test_nested_boundaries() {
        let result = catch_traps(|| {
            let inner: Result<(), _> = catch_traps(|| raise(TrapKind::MemoryOutOfBounds));
            assert!(inner.is_err());
            Ok("outer survived")
        });
        assert_eq!(result.unwrap(), "outer survived");
    }

    #[test]
    #[should_panic(expected = "host bug")]
    fn test_foreign_panic_keeps_unwinding() {
        let _ = catch_traps::<()>(|| panic!("host bug"));
    }
}
