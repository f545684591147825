use fax_gc::GcRef;

/// One activation record: the closure being executed, an instruction cursor
/// into that closure's function's chunk, and the value-stack slot at which
/// this call's window begins. Matches clox's `CallFrame` in `vm.h`, minus
/// the raw `ip`/`slots` pointers, which become plain indices here since the
/// value stack is a `Vec` rather than a fixed C array the frame can alias.
pub struct CallFrame {
    pub closure: GcRef,
    pub ip: usize,
    pub base: usize,
}

impl CallFrame {
    pub fn new(closure: GcRef, base: usize) -> Self {
        CallFrame { closure, ip: 0, base }
    }

    pub fn function(&self) -> &fax_gc::LFunction {
        self.closure.as_closure().function.as_function()
    }
}
