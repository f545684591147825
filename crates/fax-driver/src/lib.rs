//! Ties the compiler and VM together into a runnable session: compile a
//! chunk of source, hand it to the VM, repeat. Mirrors `main.c`'s `repl`
//! and `runFile`, generalized into an explicit `Session` so a REPL's globals
//! and heap persist across lines without a process-global `VM`.

mod error;

use std::io::{self, BufRead, Write};
use std::path::Path;

pub use error::{DriverError, Result};
use fax_compiler::compile;
use fax_gc::{GcConfig, Heap};
use fax_util::FileId;
use fax_vm::{clock_native, Vm};

/// Knobs a caller can set before opening a [`Session`]. `gc_stress` wires
/// straight into [`GcConfig::stress`], forcing a collection before every
/// allocation in both the compiler and the VM.
#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    pub gc_stress: bool,
    pub verbose: bool,
}

/// One interpreter instance: a heap and a VM that outlive any single
/// `interpret` call, so global variables and loaded classes persist across
/// REPL lines the way clox's single global `VM` does.
pub struct Session {
    heap: Heap,
    vm: Vm,
}

impl Session {
    pub fn new(config: &DriverConfig) -> Self {
        let gc_config = GcConfig { stress: config.gc_stress, log: config.verbose, ..GcConfig::default() };
        let mut heap = Heap::new(gc_config);
        let mut vm = Vm::new(&mut heap);
        vm.define_native(&mut heap, "clock", clock_native);
        Session { heap, vm }
    }

    /// Compile and run one chunk of source. Compile errors are reported to
    /// stderr by the `Handler` that collected them; runtime errors are
    /// reported by the `RuntimeError` this returns, which the caller prints
    /// before mapping it to an exit code.
    pub fn interpret(&mut self, source: &str) -> Result<()> {
        let function = match compile(source, FileId::DUMMY, &mut self.heap) {
            Ok(function) => function,
            Err(handler) => {
                handler.print_to_stderr();
                return Err(DriverError::CompileFailed);
            }
        };
        self.vm.interpret(&mut self.heap, function).map_err(|err| {
            eprint!("{err}");
            DriverError::RuntimeFailed(err)
        })
    }
}

/// Reads the whole file and interprets it as one compilation unit, matching
/// `runFile`.
pub fn run_file(path: &Path, config: &DriverConfig) -> Result<()> {
    let source = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            DriverError::FileNotFound { path: path.to_path_buf() }
        } else {
            DriverError::FileUnreadable { path: path.to_path_buf(), source }
        }
    })?;
    let mut session = Session::new(config);
    session.interpret(&source)
}

/// Line-at-a-time REPL, matching `repl()`: each line is its own compilation
/// unit against the same session, so a `var` or `fun` declared on one line
/// is visible on the next. A read error or EOF ends the loop without being
/// treated as a failure (clox's `repl` just breaks out of its `for (;;)`).
pub fn run_repl(config: &DriverConfig) -> Result<()> {
    let mut session = Session::new(config);
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut line = String::new();
    loop {
        print!("> ");
        stdout.flush().ok();
        line.clear();
        let bytes_read = stdin.lock().read_line(&mut line).unwrap_or(0);
        if bytes_read == 0 {
            println!();
            break;
        }
        // A REPL line failing to compile or run shouldn't kill the session;
        // only `run_file`'s single-shot failure should reach `main`'s exit code.
        let _ = session.interpret(&line);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interprets_a_well_formed_program() {
        let mut session = Session::new(&DriverConfig::default());
        assert!(session.interpret("print 1 + 1;").is_ok());
    }

    #[test]
    fn globals_persist_across_interpret_calls() {
        let mut session = Session::new(&DriverConfig::default());
        assert!(session.interpret("var x = 41;").is_ok());
        assert!(session.interpret("print x + 1;").is_ok());
    }

    #[test]
    fn compile_error_is_reported_and_mapped() {
        let mut session = Session::new(&DriverConfig::default());
        let err = session.interpret("1 +;").unwrap_err();
        assert_eq!(err.exit_code(), 65);
    }

    #[test]
    fn runtime_error_is_reported_and_mapped() {
        let mut session = Session::new(&DriverConfig::default());
        let err = session.interpret("print 1 + nil;").unwrap_err();
        assert_eq!(err.exit_code(), 70);
    }

    #[test]
    fn missing_file_maps_to_io_exit_code() {
        let err = run_file(Path::new("/nonexistent/path/to/fax/source.fax"), &DriverConfig::default()).unwrap_err();
        assert_eq!(err.exit_code(), 74);
    }

    #[test]
    fn gc_stress_mode_still_interprets_correctly() {
        let config = DriverConfig { gc_stress: true, verbose: false };
        let mut session = Session::new(&config);
        let source = r#"
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(8);
        "#;
        assert!(session.interpret(source).is_ok());
    }
}
