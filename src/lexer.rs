use crate::diagnostics::{Diagnostic, DiagnosticKind, SourceSpan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Var,
    Let,
    Const,
    Function,
    Return,
    If,
    Else,
    While,
    For,
    Break,
    Continue,
    Throw,
    Try,
    Catch,
    Finally,
    New,
    Typeof,
    True,
    False,
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    Number,
    String,
    Keyword(Keyword),
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    BangEqual,
    BangEqualEqual,
    EqualEqual,
    EqualEqualEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    AmpersandAmpersand,
    PipePipe,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// Identifier name, raw number text, or the decoded string literal.
    pub lexeme: String,
    pub span: SourceSpan,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            current: 0,
        }
    }

    fn bump(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        if let Some((idx, ch)) = next {
            self.current = idx + ch.len_utf8();
        }
        next
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_second(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, ch)| ch)
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_while<F>(&mut self, mut predicate: F)
    where
        F: FnMut(char) -> bool,
    {
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            self.bump();
        }
    }

    fn skip_trivia(&mut self) -> Result<(), Diagnostic> {
        loop {
            self.eat_while(char::is_whitespace);
            match (self.peek(), self.peek_second()) {
                (Some('/'), Some('/')) => self.eat_while(|ch| ch != '\n'),
                (Some('/'), Some('*')) => {
                    let start = self.current;
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some((_, ch)) = self.bump() {
                        if ch == '*' && self.match_next('/') {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        return Err(Diagnostic::new(
                            DiagnosticKind::Lexer,
                            "Unterminated comment",
                            SourceSpan::new(start, self.current),
                        ));
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn identifier_or_keyword(&mut self, start: usize) -> Token {
        self.eat_while(|ch| ch.is_alphanumeric() || ch == '_' || ch == '$');
        let lexeme = &self.source[start..self.current];
        let kind = keyword_for(lexeme)
            .map(TokenKind::Keyword)
            .unwrap_or(TokenKind::Identifier);
        self.token(kind, start, lexeme.to_string())
    }

    fn number_literal(&mut self, start: usize) -> Token {
        self.eat_while(|ch| ch.is_ascii_digit());
        if self.peek() == Some('.') && self.peek_second().is_some_and(|ch| ch.is_ascii_digit()) {
            self.bump();
            self.eat_while(|ch| ch.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exponent_follows = match self.peek_second() {
                Some('+' | '-') => true,
                Some(ch) => ch.is_ascii_digit(),
                None => false,
            };
            if exponent_follows {
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                self.eat_while(|ch| ch.is_ascii_digit());
            }
        }
        let lexeme = self.source[start..self.current].to_string();
        self.token(TokenKind::Number, start, lexeme)
    }

    fn string_literal(&mut self, start: usize, quote: char) -> Result<Token, Diagnostic> {
        let mut value = String::new();
        while let Some((_, ch)) = self.bump() {
            match ch {
                '\n' => break,
                '\\' => match self.bump() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, '0')) => value.push('\0'),
                    Some((_, other)) => value.push(other),
                    None => break,
                },
                ch if ch == quote => return Ok(self.token(TokenKind::String, start, value)),
                _ => value.push(ch),
            }
        }
        Err(Diagnostic::new(
            DiagnosticKind::Lexer,
            "Invalid or unexpected token",
            SourceSpan::new(start, self.current),
        ))
    }

    fn token(&self, kind: TokenKind, start: usize, lexeme: String) -> Token {
        Token {
            kind,
            lexeme,
            span: SourceSpan::new(start, self.current),
        }
    }

    fn punct(&self, kind: TokenKind, start: usize) -> Token {
        self.token(kind, start, self.source[start..self.current].to_string())
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let Some((start, ch)) = self.bump() else {
                tokens.push(self.token(TokenKind::Eof, self.current, String::new()));
                break;
            };

            let token = match ch {
                ch if ch.is_alphabetic() || ch == '_' || ch == '$' => {
                    self.identifier_or_keyword(start)
                }
                '0'..='9' => self.number_literal(start),
                '"' | '\'' => self.string_literal(start, ch)?,
                '(' => self.punct(TokenKind::LParen, start),
                ')' => self.punct(TokenKind::RParen, start),
                '{' => self.punct(TokenKind::LBrace, start),
                '}' => self.punct(TokenKind::RBrace, start),
                '[' => self.punct(TokenKind::LBracket, start),
                ']' => self.punct(TokenKind::RBracket, start),
                ',' => self.punct(TokenKind::Comma, start),
                '.' => self.punct(TokenKind::Dot, start),
                ':' => self.punct(TokenKind::Colon, start),
                ';' => self.punct(TokenKind::Semicolon, start),
                '+' => self.punct(TokenKind::Plus, start),
                '-' => self.punct(TokenKind::Minus, start),
                '*' => self.punct(TokenKind::Star, start),
                '/' => self.punct(TokenKind::Slash, start),
                '%' => self.punct(TokenKind::Percent, start),
                '=' => {
                    let kind = if self.match_next('=') {
                        if self.match_next('=') {
                            TokenKind::EqualEqualEqual
                        } else {
                            TokenKind::EqualEqual
                        }
                    } else {
                        TokenKind::Assign
                    };
                    self.punct(kind, start)
                }
                '!' => {
                    let kind = if self.match_next('=') {
                        if self.match_next('=') {
                            TokenKind::BangEqualEqual
                        } else {
                            TokenKind::BangEqual
                        }
                    } else {
                        TokenKind::Bang
                    };
                    self.punct(kind, start)
                }
                '<' => {
                    let kind = if self.match_next('=') {
                        TokenKind::LessEqual
                    } else {
                        TokenKind::Less
                    };
                    self.punct(kind, start)
                }
                '>' => {
                    let kind = if self.match_next('=') {
                        TokenKind::GreaterEqual
                    } else {
                        TokenKind::Greater
                    };
                    self.punct(kind, start)
                }
                '&' if self.match_next('&') => self.punct(TokenKind::AmpersandAmpersand, start),
                '|' if self.match_next('|') => self.punct(TokenKind::PipePipe, start),
                _ => {
                    return Err(Diagnostic::new(
                        DiagnosticKind::Lexer,
                        "Invalid or unexpected token",
                        SourceSpan::new(start, self.current),
                    ));
                }
            };
            tokens.push(token);
        }
        Ok(tokens)
    }
}

fn keyword_for(ident: &str) -> Option<Keyword> {
    use self::Keyword as Kw;
    let keyword = match ident {
        "var" => Kw::Var,
        "let" => Kw::Let,
        "const" => Kw::Const,
        "function" => Kw::Function,
        "return" => Kw::Return,
        "if" => Kw::If,
        "else" => Kw::Else,
        "while" => Kw::While,
        "for" => Kw::For,
        "break" => Kw::Break,
        "continue" => Kw::Continue,
        "throw" => Kw::Throw,
        "try" => Kw::Try,
        "catch" => Kw::Catch,
        "finally" => Kw::Finally,
        "new" => Kw::New,
        "typeof" => Kw::Typeof,
        "true" => Kw::True,
        "false" => Kw::False,
        "null" => Kw::Null,
        "undefined" => Kw::Undefined,
        _ => return None,
    };
    Some(keyword)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .expect("tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn distinguishes_equality_operators() {
        assert_eq!(
            kinds("a === b != c"),
            vec![
                TokenKind::Identifier,
                TokenKind::EqualEqualEqual,
                TokenKind::Identifier,
                TokenKind::BangEqual,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn member_access_on_number_is_not_a_fraction() {
        let tokens = Lexer::new("1.5 + 2.x").tokenize().expect("tokenize");
        assert_eq!(tokens[0].lexeme, "1.5");
        assert_eq!(tokens[2].lexeme, "2");
        assert_eq!(tokens[3].kind, TokenKind::Dot);
    }

    #[test]
    fn decodes_string_escapes() {
        let tokens = Lexer::new(r#"'it\'s' "a\tb""#).tokenize().expect("tokenize");
        assert_eq!(tokens[0].lexeme, "it's");
        assert_eq!(tokens[1].lexeme, "a\tb");
        assert_eq!(tokens[1].span, SourceSpan::new(8, 14));
    }

    #[test]
    fn skips_comments() {
        assert_eq!(
            kinds("// note\n/* block\n */ x"),
            vec![TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = Lexer::new("print('oops").tokenize().unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::Lexer);
        assert_eq!(err.span, SourceSpan::new(6, 11));
    }
}
