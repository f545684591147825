//! Single-pass Pratt parser and bytecode emitter: turns source text directly
//! into a `Chunk`-backed function object, with no intermediate AST.

mod compiler;
mod rules;

pub use compiler::compile;

#[cfg(test)]
mod tests {
    use super::*;
    use fax_gc::{GcConfig, Heap};
    use fax_util::FileId;

    fn compiles(source: &str) -> bool {
        let mut heap = Heap::new(GcConfig::default());
        compile(source, FileId::DUMMY, &mut heap).is_ok()
    }

    fn fails(source: &str) -> bool {
        !compiles(source)
    }

    #[test]
    fn compiles_arithmetic_expression_statement() {
        assert!(compiles("1 + 2 * 3 - 4 / 2;"));
    }

    #[test]
    fn compiles_variable_declaration_and_use() {
        assert!(compiles("var x = 1; print x;"));
    }

    #[test]
    fn compiles_function_with_closure() {
        assert!(compiles(
            r#"
            fun outer() {
                var x = 1;
                fun inner() { return x; }
                return inner;
            }
            "#
        ));
    }

    #[test]
    fn compiles_class_with_inheritance_and_super() {
        assert!(compiles(
            r#"
            class A { greet() { return "a"; } }
            class B < A { greet() { return super.greet(); } }
            "#
        ));
    }

    #[test]
    fn reading_local_in_its_own_initializer_is_an_error() {
        assert!(fails("{ var a = a; }"));
    }

    #[test]
    fn class_cannot_inherit_from_itself() {
        assert!(fails("class Oops < Oops {}"));
    }

    #[test]
    fn return_from_top_level_initializer_with_value_is_an_error() {
        assert!(fails(
            r#"
            class A {
                init() { return 1; }
            }
            "#
        ));
    }

    #[test]
    fn unterminated_string_is_a_compile_error() {
        assert!(fails("print \"unterminated;"));
    }

    #[test]
    fn this_outside_a_method_is_an_error() {
        assert!(fails("print this;"));
    }

    #[test]
    fn super_outside_a_subclass_is_an_error() {
        assert!(fails(
            r#"
            class A {
                greet() { return super.greet(); }
            }
            "#
        ));
    }
}
