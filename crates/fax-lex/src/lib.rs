mod scanner;
mod token;

pub use scanner::Scanner;
pub use token::{Token, TokenKind};

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new(src);
        let mut out = Vec::new();
        loop {
            let token = scanner.scan_token();
            let done = token.is_eof();
            out.push(token.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn scans_keywords_and_identifiers() {
        assert_eq!(
            kinds("var x = this.super_class"),
            vec![
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::This,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_two_char_operators() {
        assert_eq!(
            kinds("a <= b != c == d >= e"),
            vec![
                TokenKind::Identifier,
                TokenKind::LessEqual,
                TokenKind::Identifier,
                TokenKind::BangEqual,
                TokenKind::Identifier,
                TokenKind::EqualEqual,
                TokenKind::Identifier,
                TokenKind::GreaterEqual,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_string_and_number_literals() {
        let mut scanner = Scanner::new(r#""hello" 3.14"#);
        let a = scanner.scan_token();
        assert_eq!(a.kind, TokenKind::String);
        assert_eq!(a.lexeme, "\"hello\"");
        let b = scanner.scan_token();
        assert_eq!(b.kind, TokenKind::Number);
        assert_eq!(b.lexeme, "3.14");
    }

    #[test]
    fn tracks_line_numbers_across_newlines_and_comments() {
        let mut scanner = Scanner::new("var a = 1;\n// comment\nvar b = 2;");
        for _ in 0..5 {
            scanner.scan_token(); // var a = 1 ;
        }
        let b_token = scanner.scan_token();
        assert_eq!(b_token.kind, TokenKind::Var);
        assert_eq!(b_token.line, 3);
    }

    #[test]
    fn reports_unterminated_string() {
        let mut scanner = Scanner::new("\"oops");
        let token = scanner.scan_token();
        assert_eq!(token.kind, TokenKind::Error);
        assert_eq!(token.lexeme, "Unterminated string.");
    }

    #[test]
    fn reports_unexpected_character() {
        let mut scanner = Scanner::new("@");
        let token = scanner.scan_token();
        assert_eq!(token.kind, TokenKind::Error);
    }
}
