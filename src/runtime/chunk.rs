//! `.t` chunk syntax.
//!
//! ```text
//! -- comment
//! local util = require "net.util"
//! require(".common")
//! export answer = 42
//! export banner = util.name
//! link "-lm"
//! local c = includec("limits.h", "-Ivendor/include")
//! local opts = assign(defaults, { debug = true })
//! return { version = 1 }
//! ```

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    Name(String),
    Field(Box<Expr>, String),
    Table(Vec<(String, Expr)>),
    Require(String),
    /// Call of a built-in function (`includec`, `includecstring`, `assign`).
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Local { name: String, value: Expr },
    Export { name: String, value: Expr },
    Link(Expr),
    Expr(Expr),
    Return(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// A parsed chunk. `origin` is set only for chunks loaded from a file; it is
/// what `require` reports as the requesting file.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub origin: Option<PathBuf>,
    pub stmts: Vec<Stmt>,
    pub content_hash: String,
}

impl Chunk {
    pub fn from_file(path: &Path, source: &str) -> Result<Self, ParseError> {
        Self::parse(source, Some(path.to_path_buf()))
    }

    pub fn from_string(source: &str) -> Result<Self, ParseError> {
        Self::parse(source, None)
    }

    fn parse(source: &str, origin: Option<PathBuf>) -> Result<Self, ParseError> {
        let tokens = Lexer::new(source).tokenize()?;
        let stmts = Parser::new(tokens).parse_chunk()?;

        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());

        Ok(Self {
            origin,
            stmts,
            content_hash: hex::encode(hasher.finalize()),
        })
    }

    /// Display name used in diagnostics.
    pub fn name(&self) -> String {
        match &self.origin {
            Some(path) => path.display().to_string(),
            None => "<string>".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Int(i64),
    Str(String),
    Eq,
    Dot,
    Comma,
    Semi,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
    column: usize,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Token>, ParseError> {
        let mut tokens = Vec::new();

        loop {
            let (line, column) = (self.line, self.column);
            let Some(&c) = self.chars.peek() else {
                tokens.push(Token { tok: Tok::Eof, line, column });
                return Ok(tokens);
            };

            let tok = match c {
                c if c.is_whitespace() => {
                    self.bump();
                    continue;
                }
                '-' => {
                    self.bump();
                    let next = self.chars.peek().copied();
                    match next {
                        Some('-') => {
                            while let Some(c) = self.bump() {
                                if c == '\n' {
                                    break;
                                }
                            }
                            continue;
                        }
                        Some(d) if d.is_ascii_digit() => Tok::Int(-self.number()?),
                        _ => return Err(self.error("unexpected '-'")),
                    }
                }
                '0'..='9' => Tok::Int(self.number()?),
                '"' | '\'' => Tok::Str(self.string()?),
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let mut ident = String::new();
                    while let Some(&c) = self.chars.peek() {
                        if !(c.is_ascii_alphanumeric() || c == '_') {
                            break;
                        }
                        ident.push(c);
                        self.bump();
                    }
                    Tok::Ident(ident)
                }
                _ => {
                    self.bump();
                    match c {
                        '=' => Tok::Eq,
                        '.' => Tok::Dot,
                        ',' => Tok::Comma,
                        ';' => Tok::Semi,
                        '(' => Tok::LParen,
                        ')' => Tok::RParen,
                        '{' => Tok::LBrace,
                        '}' => Tok::RBrace,
                        other => return Err(self.error(format!("unexpected character '{}'", other))),
                    }
                }
            };

            tokens.push(Token { tok, line, column });
        }
    }

    fn number(&mut self) -> Result<i64, ParseError> {
        let mut digits = String::new();
        while let Some(&c) = self.chars.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            digits.push(c);
            self.bump();
        }
        digits
            .parse()
            .map_err(|_| self.error(format!("integer literal '{}' out of range", digits)))
    }

    fn string(&mut self) -> Result<String, ParseError> {
        let quote = self.bump().unwrap_or('"');
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return Err(self.error("unfinished string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('0') => out.push('\0'),
                    Some(c @ ('\\' | '"' | '\'')) => out.push(c),
                    _ => return Err(self.error("invalid escape sequence")),
                },
                Some(c) => out.push(c),
            }
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_at(token: &Token, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: token.line,
            column: token.column,
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> Result<Token, ParseError> {
        let token = self.advance();
        if token.tok == tok {
            Ok(token)
        } else {
            Err(Self::error_at(&token, format!("expected {}", what)))
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        let token = self.advance();
        match token.tok.clone() {
            Tok::Ident(name) if !is_keyword(&name) => Ok(name),
            _ => Err(Self::error_at(&token, "expected a name")),
        }
    }

    fn parse_chunk(mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();

        loop {
            while self.peek().tok == Tok::Semi {
                self.advance();
            }
            if self.peek().tok == Tok::Eof {
                return Ok(stmts);
            }
            if let Some(Stmt { kind: StmtKind::Return(_), .. }) = stmts.last() {
                return Err(Self::error_at(self.peek(), "'return' must be the last statement"));
            }
            stmts.push(self.statement()?);
        }
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.peek().clone();
        let keyword = match &start.tok {
            Tok::Ident(word) => word.clone(),
            _ => return Err(Self::error_at(&start, "expected a statement")),
        };

        let kind = match keyword.as_str() {
            "local" | "export" => {
                self.advance();
                let name = self.ident()?;
                self.expect(Tok::Eq, "'='")?;
                let value = self.expr()?;
                if keyword == "local" {
                    StmtKind::Local { name, value }
                } else {
                    StmtKind::Export { name, value }
                }
            }
            "link" => {
                self.advance();
                StmtKind::Link(self.call_argument()?)
            }
            "return" => {
                self.advance();
                match self.peek().tok {
                    Tok::Eof | Tok::Semi => StmtKind::Return(Expr::Nil),
                    _ => StmtKind::Return(self.expr()?),
                }
            }
            "require" | "includec" | "includecstring" | "assign" => StmtKind::Expr(self.expr()?),
            _ => return Err(Self::error_at(&start, format!("unexpected '{}'", keyword))),
        };

        Ok(Stmt {
            kind,
            line: start.line,
            column: start.column,
        })
    }

    /// `f "x"` or `f("x")` style single argument.
    fn call_argument(&mut self) -> Result<Expr, ParseError> {
        if self.peek().tok == Tok::LParen {
            self.advance();
            let arg = self.expr()?;
            self.expect(Tok::RParen, "')'")?;
            Ok(arg)
        } else {
            self.expr()
        }
    }

    /// `f "x"` or `f(a, b, ...)`.
    fn call_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        if self.peek().tok != Tok::LParen {
            return Ok(vec![self.expr()?]);
        }

        self.advance();
        let mut args = Vec::new();
        while self.peek().tok != Tok::RParen {
            args.push(self.expr()?);
            match self.peek().tok {
                Tok::Comma => {
                    self.advance();
                }
                Tok::RParen => {}
                _ => return Err(Self::error_at(self.peek(), "expected ',' or ')'")),
            }
        }
        self.advance();
        Ok(args)
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.primary()?;
        while self.peek().tok == Tok::Dot {
            self.advance();
            let field = self.ident()?;
            expr = Expr::Field(Box::new(expr), field);
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.advance();
        match token.tok.clone() {
            Tok::Int(n) => Ok(Expr::Int(n)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::LBrace => self.table(),
            Tok::LParen => {
                let inner = self.expr()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(inner)
            }
            Tok::Ident(word) => match word.as_str() {
                "nil" => Ok(Expr::Nil),
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "require" => match self.call_argument()? {
                    Expr::Str(spec) => Ok(Expr::Require(spec)),
                    _ => Err(Self::error_at(&token, "require expects a string literal")),
                },
                "includec" | "includecstring" | "assign" => {
                    Ok(Expr::Call(word, self.call_arguments()?))
                }
                _ if is_keyword(&word) => {
                    Err(Self::error_at(&token, format!("unexpected '{}'", word)))
                }
                _ => Ok(Expr::Name(word)),
            },
            _ => Err(Self::error_at(&token, "expected an expression")),
        }
    }

    fn table(&mut self) -> Result<Expr, ParseError> {
        let mut fields = Vec::new();
        loop {
            if self.peek().tok == Tok::RBrace {
                self.advance();
                return Ok(Expr::Table(fields));
            }
            let key = self.ident()?;
            self.expect(Tok::Eq, "'='")?;
            fields.push((key, self.expr()?));

            match self.peek().tok {
                Tok::Comma | Tok::Semi => {
                    self.advance();
                }
                Tok::RBrace => {}
                _ => return Err(Self::error_at(self.peek(), "expected ',' or '}'")),
            }
        }
    }
}

fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "local"
            | "export"
            | "link"
            | "return"
            | "require"
            | "includec"
            | "includecstring"
            | "assign"
            | "nil"
            | "true"
            | "false"
    )
}
