use crate::value::{PhpString, RuntimeError, RuntimeErrorCode};

/// A piece of a double-quoted string.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StrPart {
    Lit(PhpString),
    Var(String),
    /// `"$obj->prop"`
    Prop(String, String),
    /// `"$arr[key]"` with an unquoted, integer or variable key.
    Index(String, IndexKey),
    /// `"{$expr}"`, kept as source and parsed later.
    Expr { source: String, line: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IndexKey {
    Int(i64),
    Name(String),
    Var(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    InlineHtml(String),
    Int(i64),
    Float(f64),
    Str(PhpString),
    Template(Vec<StrPart>),
    Var(String),
    Ident(String),
    Cast(String),
    Semicolon,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Arrow,
    FatArrow,
    DoubleColon,
    Question,
    QuestionQuestion,
    QuestionQuestionEq,
    Colon,
    Dot,
    DotEq,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    PlusPlus,
    MinusMinus,
    Eq,
    EqEq,
    EqEqEq,
    BangEq,
    BangEqEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Spaceship,
    AndAnd,
    OrOr,
    Bang,
    Ampersand,
    Eof,
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) line: usize,
}

const CAST_TYPES: &[&str] = &[
    "int", "integer", "float", "double", "string", "bool", "boolean", "array",
];

pub(crate) struct Lexer {
    src: Vec<char>,
    pos: usize,
    line: usize,
    /// False while scanning inline HTML outside `<?php ... ?>`.
    in_code: bool,
}

impl Lexer {
    /// A lexer for a whole file, starting in inline-HTML mode.
    pub(crate) fn new(input: &str) -> Self {
        Self {
            src: input.chars().collect(),
            pos: 0,
            line: 1,
            in_code: false,
        }
    }

    /// A lexer for a code fragment with no open tag (`-r` code, `{$expr}` parts).
    pub(crate) fn new_code(input: &str, line: usize) -> Self {
        Self {
            src: input.chars().collect(),
            pos: 0,
            line,
            in_code: true,
        }
    }

    pub(crate) fn tokenize(mut self) -> Result<Vec<Token>, RuntimeError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }
        crate::trace::trace_log!("lex", "{} tokens", tokens.len());
        Ok(tokens)
    }

    fn error(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::with_location(message, RuntimeErrorCode::ParseUnexpected, self.line, 0)
    }

    fn next_token(&mut self) -> Result<Token, RuntimeError> {
        if !self.in_code
            && let Some(html) = self.read_inline_html()
        {
            return Ok(html);
        }
        self.skip_ws_and_comments()?;
        let line = self.line;
        if self.pos >= self.src.len() {
            return Ok(Token {
                kind: TokenKind::Eof,
                line,
            });
        }
        if self.starts_with("?>") {
            self.pos += 2;
            if self.peek() == Some('\n') {
                self.bump();
            }
            self.in_code = false;
            // `?>` terminates the statement like `;`.
            return Ok(Token {
                kind: TokenKind::Semicolon,
                line,
            });
        }
        let ch = self.bump();
        let kind = match ch {
            '$' => {
                if self.peek().is_some_and(is_ident_start) {
                    TokenKind::Var(self.read_ident())
                } else {
                    return Err(self.error("unexpected '$'"));
                }
            }
            c if is_ident_start(c) => {
                let mut ident = c.to_string();
                ident.push_str(&self.read_ident());
                TokenKind::Ident(ident)
            }
            '0'..='9' => self.read_number(ch)?,
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.read_number(ch)?,
            '\'' => TokenKind::Str(self.read_single_quoted()?),
            '"' => self.read_double_quoted()?,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '(' => {
                if let Some(cast) = self.try_read_cast() {
                    TokenKind::Cast(cast)
                } else {
                    TokenKind::LParen
                }
            }
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '.' => {
                if self.match_char('=') {
                    TokenKind::DotEq
                } else {
                    TokenKind::Dot
                }
            }
            '-' => {
                if self.match_char('>') {
                    TokenKind::Arrow
                } else if self.match_char('-') {
                    TokenKind::MinusMinus
                } else if self.match_char('=') {
                    TokenKind::MinusEq
                } else {
                    TokenKind::Minus
                }
            }
            '+' => {
                if self.match_char('+') {
                    TokenKind::PlusPlus
                } else if self.match_char('=') {
                    TokenKind::PlusEq
                } else {
                    TokenKind::Plus
                }
            }
            '*' => {
                if self.match_char('*') {
                    TokenKind::StarStar
                } else if self.match_char('=') {
                    TokenKind::StarEq
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.match_char('=') {
                    TokenKind::SlashEq
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.match_char('=') {
                    TokenKind::PercentEq
                } else {
                    TokenKind::Percent
                }
            }
            '=' => {
                if self.match_char('=') {
                    if self.match_char('=') {
                        TokenKind::EqEqEq
                    } else {
                        TokenKind::EqEq
                    }
                } else if self.match_char('>') {
                    TokenKind::FatArrow
                } else {
                    TokenKind::Eq
                }
            }
            '!' => {
                if self.match_char('=') {
                    if self.match_char('=') {
                        TokenKind::BangEqEq
                    } else {
                        TokenKind::BangEq
                    }
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.match_char('=') {
                    if self.match_char('>') {
                        TokenKind::Spaceship
                    } else {
                        TokenKind::Lte
                    }
                } else if self.match_char('>') {
                    TokenKind::BangEq
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.match_char('=') {
                    TokenKind::Gte
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.match_char('&') {
                    TokenKind::AndAnd
                } else {
                    TokenKind::Ampersand
                }
            }
            '|' => {
                if self.match_char('|') {
                    TokenKind::OrOr
                } else {
                    return Err(self.error("bitwise '|' is not supported"));
                }
            }
            '?' => {
                if self.match_char('?') {
                    if self.match_char('=') {
                        TokenKind::QuestionQuestionEq
                    } else {
                        TokenKind::QuestionQuestion
                    }
                } else {
                    TokenKind::Question
                }
            }
            ':' => {
                if self.match_char(':') {
                    TokenKind::DoubleColon
                } else {
                    TokenKind::Colon
                }
            }
            other => return Err(self.error(format!("unexpected character '{}'", other))),
        };
        Ok(Token { kind, line })
    }

    /// Scan text up to the next `<?php`. Returns `None` when there is no text.
    fn read_inline_html(&mut self) -> Option<Token> {
        let line = self.line;
        let mut text = String::new();
        while self.pos < self.src.len() {
            if self.starts_with("<?php") {
                self.pos += 5;
                self.in_code = true;
                break;
            }
            let c = self.bump();
            text.push(c);
        }
        (!text.is_empty()).then_some(Token {
            kind: TokenKind::InlineHtml(text),
            line,
        })
    }

    fn skip_ws_and_comments(&mut self) -> Result<(), RuntimeError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => self.skip_line_comment(),
                Some('/') if self.peek_next() == Some('/') => self.skip_line_comment(),
                Some('/') if self.peek_next() == Some('*') => {
                    let start_line = self.line;
                    self.pos += 2;
                    loop {
                        if self.pos >= self.src.len() {
                            return Err(RuntimeError::with_location(
                                "unterminated comment",
                                RuntimeErrorCode::ParseExpected,
                                start_line,
                                0,
                            ));
                        }
                        if self.starts_with("*/") {
                            self.pos += 2;
                            break;
                        }
                        self.bump();
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Line comments stop at a newline or at `?>`.
    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' || self.starts_with("?>") {
                break;
            }
            self.bump();
        }
    }

    fn try_read_cast(&mut self) -> Option<String> {
        let mut i = self.pos;
        while i < self.src.len() && (self.src[i] == ' ' || self.src[i] == '\t') {
            i += 1;
        }
        let start = i;
        while i < self.src.len() && self.src[i].is_ascii_alphabetic() {
            i += 1;
        }
        let word: String = self.src[start..i].iter().collect::<String>().to_ascii_lowercase();
        while i < self.src.len() && (self.src[i] == ' ' || self.src[i] == '\t') {
            i += 1;
        }
        if i < self.src.len() && self.src[i] == ')' && CAST_TYPES.contains(&word.as_str()) {
            self.pos = i + 1;
            Some(word)
        } else {
            None
        }
    }

    fn read_number(&mut self, first: char) -> Result<TokenKind, RuntimeError> {
        if first == '0' && matches!(self.peek(), Some('x' | 'X' | 'b' | 'B' | 'o' | 'O')) {
            let radix = match self.bump().to_ascii_lowercase() {
                'x' => 16,
                'b' => 2,
                _ => 8,
            };
            let digits = self.read_digits(|c| c.is_digit(radix));
            return Ok(match i64::from_str_radix(&digits, radix) {
                Ok(i) => TokenKind::Int(i),
                Err(_) => TokenKind::Float(
                    digits
                        .chars()
                        .filter_map(|c| c.to_digit(radix))
                        .fold(0.0, |acc, d| acc * radix as f64 + d as f64),
                ),
            });
        }
        let mut text = String::new();
        if first != '.' {
            text.push(first);
            text.push_str(&self.read_digits(|c| c.is_ascii_digit()));
        }
        let mut is_float = false;
        if first == '.' || (self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit())) {
            if first != '.' {
                self.bump();
            }
            is_float = true;
            text.push('.');
            text.push_str(&self.read_digits(|c| c.is_ascii_digit()));
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign = self.peek_next();
            let digit_at = if matches!(sign, Some('+' | '-')) { 2 } else { 1 };
            if self
                .src
                .get(self.pos + digit_at)
                .is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                text.push('e');
                self.bump();
                if digit_at == 2 {
                    text.push(self.bump());
                }
                text.push_str(&self.read_digits(|c| c.is_ascii_digit()));
            }
        }
        if !is_float {
            if first == '0' && text.len() > 1 {
                let octal = &text[1..];
                return i64::from_str_radix(octal, 8)
                    .map(TokenKind::Int)
                    .map_err(|_| self.error(format!("invalid numeric literal {}", text)));
            }
            if let Ok(i) = text.parse::<i64>() {
                return Ok(TokenKind::Int(i));
            }
        }
        text.parse::<f64>()
            .map(TokenKind::Float)
            .map_err(|_| self.error(format!("invalid numeric literal {}", text)))
    }

    fn read_digits(&mut self, accept: impl Fn(char) -> bool) -> String {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if accept(c) {
                digits.push(c);
                self.bump();
            } else if c == '_' && self.peek_next().is_some_and(&accept) {
                self.bump();
            } else {
                break;
            }
        }
        digits
    }

    fn read_single_quoted(&mut self) -> Result<PhpString, RuntimeError> {
        let start_line = self.line;
        let mut s = String::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(RuntimeError::with_location(
                    "unterminated string",
                    RuntimeErrorCode::ParseExpected,
                    start_line,
                    0,
                ));
            };
            self.bump();
            match c {
                '\'' => return Ok(s.into()),
                '\\' if matches!(self.peek(), Some('\'' | '\\')) => s.push(self.bump()),
                _ => s.push(c),
            }
        }
    }

    fn read_double_quoted(&mut self) -> Result<TokenKind, RuntimeError> {
        let start_line = self.line;
        let mut parts = Vec::new();
        let mut lit = PhpString::new();
        loop {
            let Some(c) = self.peek() else {
                return Err(RuntimeError::with_location(
                    "unterminated string",
                    RuntimeErrorCode::ParseExpected,
                    start_line,
                    0,
                ));
            };
            self.bump();
            match c {
                '"' => break,
                '\\' => self.read_escape(&mut lit),
                '$' if self.peek().is_some_and(is_ident_start) => {
                    flush_lit(&mut parts, &mut lit);
                    parts.push(self.read_simple_interpolation()?);
                }
                '{' if self.peek() == Some('$') => {
                    flush_lit(&mut parts, &mut lit);
                    parts.push(self.read_brace_interpolation()?);
                }
                _ => lit.push_char(c),
            }
        }
        if parts.is_empty() {
            return Ok(TokenKind::Str(lit));
        }
        flush_lit(&mut parts, &mut lit);
        Ok(TokenKind::Template(parts))
    }

    /// `\x` and octal escapes produce raw bytes, not characters.
    fn read_escape(&mut self, out: &mut PhpString) {
        let Some(c) = self.peek() else {
            out.push(b'\\');
            return;
        };
        match c {
            'n' | 't' | 'r' | 'v' | 'e' | 'f' | '\\' | '$' | '"' => {
                self.bump();
                out.push_char(match c {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    'v' => '\x0b',
                    'e' => '\x1b',
                    'f' => '\x0c',
                    other => other,
                });
            }
            'x' if self.peek_next().is_some_and(|d| d.is_ascii_hexdigit()) => {
                self.bump();
                let hex = self.take_while_max(2, |d| d.is_ascii_hexdigit());
                if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                    out.push(byte);
                }
            }
            '0'..='7' => {
                let oct = self.take_while_max(3, |d| ('0'..='7').contains(&d));
                if let Ok(byte) = u32::from_str_radix(&oct, 8) {
                    out.push((byte & 0xff) as u8);
                }
            }
            'u' if self.peek_next() == Some('{') => {
                self.pos += 2;
                let hex = self.take_while_max(6, |d| d.is_ascii_hexdigit());
                self.match_char('}');
                if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push_char(ch);
                }
            }
            _ => out.push(b'\\'),
        }
    }

    fn take_while_max(&mut self, max: usize, accept: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while s.len() < max
            && let Some(c) = self.peek()
            && accept(c)
        {
            s.push(c);
            self.bump();
        }
        s
    }

    fn read_simple_interpolation(&mut self) -> Result<StrPart, RuntimeError> {
        let name = self.read_ident();
        if self.starts_with("->") && self.src.get(self.pos + 2).is_some_and(|c| is_ident_start(*c)) {
            self.pos += 2;
            let prop = self.read_ident();
            return Ok(StrPart::Prop(name, prop));
        }
        if self.peek() == Some('[') {
            self.bump();
            let key = match self.peek() {
                Some('$') => {
                    self.bump();
                    IndexKey::Var(self.read_ident())
                }
                Some(c) if c.is_ascii_digit() || c == '-' => {
                    let mut digits = self.bump().to_string();
                    digits.push_str(&self.take_while_max(20, |d| d.is_ascii_digit()));
                    IndexKey::Int(
                        digits
                            .parse()
                            .map_err(|_| self.error("invalid array offset in string"))?,
                    )
                }
                Some(c) if is_ident_start(c) => IndexKey::Name(self.read_ident()),
                _ => return Err(self.error("unexpected token in string offset")),
            };
            if !self.match_char(']') {
                return Err(self.error("expected ']' in string offset"));
            }
            return Ok(StrPart::Index(name, key));
        }
        Ok(StrPart::Var(name))
    }

    fn read_brace_interpolation(&mut self) -> Result<StrPart, RuntimeError> {
        let line = self.line;
        let mut depth = 1;
        let mut source = String::new();
        while let Some(c) = self.peek() {
            self.bump();
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(StrPart::Expr { source, line });
                    }
                }
                _ => {}
            }
            source.push(c);
        }
        Err(self.error("unterminated '{$' in string"))
    }

    fn read_ident(&mut self) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if is_ident_char(c) {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        s
    }

    fn starts_with(&self, s: &str) -> bool {
        let mut i = self.pos;
        for c in s.chars() {
            if self.src.get(i) != Some(&c) {
                return false;
            }
            i += 1;
        }
        true
    }

    fn bump(&mut self) -> char {
        let c = self.src[self.pos];
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        c
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }
}

fn flush_lit(parts: &mut Vec<StrPart>, lit: &mut PhpString) {
    if !lit.is_empty() {
        parts.push(StrPart::Lit(std::mem::take(lit)));
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || !c.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn text_before_open_tag_is_inline_html() {
        let toks = kinds("hello\n<?php echo 1;");
        assert_eq!(toks[0], TokenKind::InlineHtml("hello\n".to_string()));
        assert_eq!(toks[1], TokenKind::Ident("echo".to_string()));
        assert_eq!(toks[2], TokenKind::Int(1));
    }

    #[test]
    fn close_tag_acts_as_semicolon_and_eats_newline() {
        let toks = kinds("<?php echo 1 ?>\nafter");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("echo".to_string()),
                TokenKind::Int(1),
                TokenKind::Semicolon,
                TokenKind::InlineHtml("after".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn member_access_tokens() {
        let toks = kinds("<?php $this->field[] = 1;");
        assert_eq!(
            toks,
            vec![
                TokenKind::Var("this".to_string()),
                TokenKind::Arrow,
                TokenKind::Ident("field".to_string()),
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::Eq,
                TokenKind::Int(1),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn double_quoted_escapes_and_interpolation() {
        let toks = kinds(r#"<?php "Base::fun1\n" "a $x b" "{$o->p}";"#);
        assert_eq!(toks[0], TokenKind::Str("Base::fun1\n".into()));
        assert_eq!(
            toks[1],
            TokenKind::Template(vec![
                StrPart::Lit("a ".into()),
                StrPart::Var("x".to_string()),
                StrPart::Lit(" b".into()),
            ])
        );
        assert_eq!(
            toks[2],
            TokenKind::Template(vec![StrPart::Expr {
                source: "$o->p".to_string(),
                line: 1
            }])
        );
    }

    #[test]
    fn hex_and_octal_escapes_are_single_bytes() {
        let toks = kinds(r#"<?php "\xff" "\377" "\u{e9}";"#);
        assert_eq!(toks[0], TokenKind::Str(PhpString::from(vec![0xff])));
        assert_eq!(toks[1], TokenKind::Str(PhpString::from(vec![0xff])));
        assert_eq!(toks[2], TokenKind::Str("é".into()));
    }

    #[test]
    fn numbers_and_casts() {
        let toks = kinds("<?php 0x1F 017 1.5 1e3 1_000 (int) $x;");
        assert_eq!(toks[0], TokenKind::Int(31));
        assert_eq!(toks[1], TokenKind::Int(15));
        assert_eq!(toks[2], TokenKind::Float(1.5));
        assert_eq!(toks[3], TokenKind::Float(1000.0));
        assert_eq!(toks[4], TokenKind::Int(1000));
        assert_eq!(toks[5], TokenKind::Cast("int".to_string()));
    }

    #[test]
    fn comments_are_skipped_and_lines_counted() {
        let tokens = Lexer::new("<?php\n// one\n# two\n/* three\n */ $x;")
            .tokenize()
            .unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Var("x".to_string()));
        assert_eq!(tokens[0].line, 5);
    }

    #[test]
    fn unterminated_string_is_a_parse_error() {
        let err = Lexer::new("<?php 'abc").tokenize().unwrap_err();
        assert_eq!(err.code, Some(RuntimeErrorCode::ParseExpected));
    }
}
