use fax_lex::TokenKind;

/// Operator binding power, weakest to strongest. One-to-one with clox's
/// `Precedence` enum in `compiler.c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    /// One level tighter than `self`. Binary operators parse their right
    /// operand one level above their own precedence so that e.g. `-` is
    /// left-associative (`a - b - c` groups as `(a - b) - c`).
    pub fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

/// clox drives its Pratt loop from a static `ParseRule[]` table of
/// `{prefix, infix, precedence}` function pointers. A table of methods
/// generic over this compiler's lifetimes doesn't fit in a `const` array
/// without higher-ranked-trait-bound boilerplate at every call site, so
/// the table collapses to this one function; `Compiler::parse_precedence`
/// dispatches the prefix/infix calls themselves with a `match` on the
/// token kind, which is the part of the table that actually varies by
/// call site.
pub fn infix_precedence(kind: TokenKind) -> Precedence {
    use TokenKind::*;
    match kind {
        LeftParen | Dot => Precedence::Call,
        Minus | Plus => Precedence::Term,
        Slash | Star => Precedence::Factor,
        BangEqual | EqualEqual => Precedence::Equality,
        Greater | GreaterEqual | Less | LessEqual => Precedence::Comparison,
        And => Precedence::And,
        Or => Precedence::Or,
        _ => Precedence::None,
    }
}
