//! Tokeniser for Thrift IDL source text.

use crate::error::SyntaxError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// Identifier, possibly dotted (`shared.Base`).
    Ident(String),
    Int(i64),
    Double(f64),
    Str(String),
    Punct(char),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) line: u32,
    pub(crate) column: u32,
}

const PUNCTUATION: &[char] = &['{', '}', '(', ')', '[', ']', '<', '>', ',', ';', ':', '=', '*'];

pub(crate) struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// Consumes the whole input, ending with a single [`TokenKind::Eof`].
    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let (line, column) = (self.line, self.column);
            let Some(&next) = self.chars.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    line,
                    column,
                });
                return Ok(tokens);
            };
            let kind = self.token(next, line, column)?;
            tokens.push(Token { kind, line, column });
        }
    }

    fn token(&mut self, next: char, line: u32, column: u32) -> Result<TokenKind, SyntaxError> {
        if next.is_ascii_alphabetic() || next == '_' {
            return Ok(TokenKind::Ident(self.take_while(|c| {
                c.is_ascii_alphanumeric() || c == '_' || c == '.'
            })));
        }
        if next.is_ascii_digit() || next == '+' || next == '-' {
            return self.number(line, column);
        }
        if next == '"' || next == '\'' {
            self.bump();
            return self.string(next, line, column).map(TokenKind::Str);
        }
        if PUNCTUATION.contains(&next) {
            self.bump();
            return Ok(TokenKind::Punct(next));
        }
        Err(SyntaxError::new(
            line,
            column,
            format!("unexpected character '{next}'"),
        ))
    }

    fn bump(&mut self) -> Option<char> {
        let next = self.chars.next()?;
        if next == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(next)
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let mut text = String::new();
        while let Some(&next) = self.chars.peek() {
            if !predicate(next) {
                break;
            }
            text.push(next);
            self.bump();
        }
        text
    }

    fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => self.skip_line(),
                Some('/') => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    match self.chars.peek() {
                        Some('/') => self.skip_line(),
                        Some('*') => {
                            self.bump();
                            self.skip_block_comment(line, column)?;
                        }
                        _ => return Err(SyntaxError::new(line, column, "unexpected '/'")),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_line(&mut self) {
        while let Some(next) = self.bump() {
            if next == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self, line: u32, column: u32) -> Result<(), SyntaxError> {
        let mut previous = '\0';
        while let Some(next) = self.bump() {
            if previous == '*' && next == '/' {
                return Ok(());
            }
            previous = next;
        }
        Err(SyntaxError::new(line, column, "unterminated block comment"))
    }

    fn number(&mut self, line: u32, column: u32) -> Result<TokenKind, SyntaxError> {
        let mut text = String::new();
        if let Some(&sign @ ('+' | '-')) = self.chars.peek() {
            text.push(sign);
            self.bump();
        }
        text.push_str(&self.take_while(|c| c.is_ascii_alphanumeric() || c == '.'));
        if text.ends_with(['e', 'E']) {
            if let Some(&sign @ ('+' | '-')) = self.chars.peek() {
                text.push(sign);
                self.bump();
                text.push_str(&self.take_while(|c| c.is_ascii_digit()));
            }
        }
        parse_number(&text).ok_or_else(|| {
            SyntaxError::new(line, column, format!("invalid numeric literal '{text}'"))
        })
    }

    fn string(&mut self, quote: char, line: u32, column: u32) -> Result<String, SyntaxError> {
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(SyntaxError::new(line, column, "unterminated string literal")),
                Some(c) if c == quote => return Ok(text),
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('r') => text.push('\r'),
                    Some(escaped) => text.push(escaped),
                    None => {
                        return Err(SyntaxError::new(line, column, "unterminated string literal"));
                    }
                },
                Some(c) => text.push(c),
            }
        }
    }
}

fn parse_number(text: &str) -> Option<TokenKind> {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    if unsigned.is_empty() {
        return None;
    }
    if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        let magnitude = i64::from_str_radix(hex, 16).ok()?;
        return Some(TokenKind::Int(if negative { -magnitude } else { magnitude }));
    }
    if unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return text.parse().ok().map(TokenKind::Int);
    }
    text.parse().ok().map(TokenKind::Double)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .expect("tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[rstest]
    #[case("42", TokenKind::Int(42))]
    #[case("-7", TokenKind::Int(-7))]
    #[case("+3", TokenKind::Int(3))]
    #[case("0x1F", TokenKind::Int(31))]
    #[case("1.5", TokenKind::Double(1.5))]
    #[case("2e3", TokenKind::Double(2000.0))]
    #[case("1.5e-1", TokenKind::Double(0.15))]
    #[case("'hi'", TokenKind::Str("hi".to_owned()))]
    #[case("\"a\\\"b\"", TokenKind::Str("a\"b".to_owned()))]
    #[case("shared.Base", TokenKind::Ident("shared.Base".to_owned()))]
    fn lexes_literals(#[case] source: &str, #[case] expected: TokenKind) {
        assert_eq!(kinds(source), vec![expected, TokenKind::Eof]);
    }

    #[test]
    fn skips_all_comment_styles() {
        let source = "# hash\n// slash\n/* block\n * body */ struct";
        assert_eq!(
            kinds(source),
            vec![TokenKind::Ident("struct".to_owned()), TokenKind::Eof]
        );
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = Lexer::new("a\n  b").tokenize().expect("tokenize");
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }

    #[rstest]
    #[case("\"open")]
    #[case("/* open")]
    #[case("@")]
    #[case("12abc")]
    fn rejects_malformed_input(#[case] source: &str) {
        assert!(Lexer::new(source).tokenize().is_err());
    }
}
