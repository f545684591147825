use thiserror::Error;

/// Every distinct way the dispatch loop can fail, one-to-one with the
/// `runtimeError(...)` call sites in `vm.c`. Kept as a `thiserror` enum
/// (rather than bare strings) so callers can match on the kind while still
/// getting clox's exact wording from `Display`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeErrorKind {
    #[error("Operand must be a number.")]
    OperandMustBeNumber,
    #[error("Operands must be numbers.")]
    OperandsMustBeNumbers,
    #[error("Operands must be two numbers or two strings.")]
    AddOperandMismatch,
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Only instances have properties.")]
    OnlyInstancesHaveProperties,
    #[error("Only instances have fields.")]
    OnlyInstancesHaveFields,
    #[error("Only instances have methods.")]
    OnlyInstancesHaveMethods,
    #[error("Undefined property '{0}'.")]
    UndefinedProperty(String),
    #[error("Expected {expected} arguments but got {got}.")]
    ArityMismatch { expected: u8, got: u8 },
    #[error("Can only call functions and classes.")]
    NotCallable,
    #[error("Stack overflow.")]
    StackOverflow,
    #[error("Superclass must be a class.")]
    SuperclassMustBeClass,
}

/// A runtime failure together with the frame-by-frame trace `runtimeError`
/// builds before resetting the VM: one `[line N] in <name|script>` entry per
/// active call, deepest (currently executing) frame first and the top-level
/// script last, matching `vm.c`'s `frameCount - 1` downto `0` loop order.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub trace: Vec<String>,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.kind)?;
        for line in &self.trace {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}
