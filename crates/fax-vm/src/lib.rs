//! The stack-based bytecode interpreter: call frames, the dispatch loop,
//! and the single native fax exposes (`clock`).

mod error;
mod frame;
mod natives;
mod vm;

pub use error::{RuntimeError, RuntimeErrorKind};
pub use frame::CallFrame;
pub use natives::clock_native;
pub use vm::{Vm, FRAMES_MAX, STACK_MAX};

#[cfg(test)]
mod tests {
    use super::*;
    use fax_compiler::compile;
    use fax_gc::{GcConfig, Heap};
    use fax_util::FileId;

    fn run_source(source: &str) -> Result<(), RuntimeError> {
        let mut heap = Heap::new(GcConfig::default());
        let function = compile(source, FileId::DUMMY, &mut heap).expect("source compiles");
        let mut vm = Vm::new(&mut heap);
        vm.define_native(&mut heap, "clock", clock_native);
        vm.interpret(&mut heap, function)
    }

    #[test]
    fn arithmetic_and_print() {
        assert!(run_source("print 1 + 2 * 3;").is_ok());
    }

    #[test]
    fn string_concatenation() {
        assert!(run_source("print \"foo\" + \"bar\";").is_ok());
    }

    #[test]
    fn closures_capture_and_mutate_shared_upvalue() {
        let source = r#"
            fun makeCounter() {
                var count = 0;
                fun increment() {
                    count = count + 1;
                    return count;
                }
                return increment;
            }
            var counter = makeCounter();
            print counter();
            print counter();
        "#;
        assert!(run_source(source).is_ok());
    }

    #[test]
    fn classes_methods_and_inheritance() {
        let source = r#"
            class Animal {
                init(name) {
                    this.name = name;
                }
                speak() {
                    return this.name;
                }
            }
            class Dog < Animal {
                speak() {
                    return super.speak() + " woofs";
                }
            }
            var d = Dog("Rex");
            print d.speak();
        "#;
        assert!(run_source(source).is_ok());
    }

    #[test]
    fn undefined_variable_is_a_runtime_error() {
        let err = run_source("print undefinedThing;").unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::UndefinedVariable("undefinedThing".to_string()));
    }

    #[test]
    fn runtime_error_reports_call_stack_trace() {
        let source = r#"
            fun a() { b(); }
            fun b() { c(); }
            fun c() { c.bad; }
            a();
        "#;
        let err = run_source(source).unwrap_err();
        assert_eq!(err.trace.len(), 4);
        assert!(err.trace[0].contains("in c()"));
        assert!(err.trace[1].contains("in b()"));
        assert!(err.trace[2].contains("in a()"));
        assert!(err.trace[3].contains("in script"));
    }

    #[test]
    fn deep_recursion_overflows_the_call_stack() {
        let source = r#"
            fun recurse() {
                recurse();
            }
            recurse();
        "#;
        let err = run_source(source).unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::StackOverflow);
    }

    #[test]
    fn adding_number_and_string_is_rejected() {
        let err = run_source("print 1 + \"a\";").unwrap_err();
        assert_eq!(err.kind, RuntimeErrorKind::AddOperandMismatch);
    }

    #[test]
    fn field_shadows_method_on_lookup() {
        let source = r#"
            class Box {
                value() { return "method"; }
            }
            var b = Box();
            b.value = "field";
            print b.value;
        "#;
        assert!(run_source(source).is_ok());
    }

    #[test]
    fn clock_native_returns_a_number() {
        let source = "print clock();";
        assert!(run_source(source).is_ok());
    }
}
