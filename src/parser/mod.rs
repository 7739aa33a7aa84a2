use crate::ast::*;
use crate::lexer::{self, Token};

pub struct Parser {
    tokens: Vec<(Token, Span)>,
    pos: usize,
    /// End of the last consumed token, for closing spans.
    last_end: usize,
}

#[derive(Debug, thiserror::Error)]
#[error("Parse error at token {position}: {message}")]
pub struct ParseError {
    pub code: &'static str,
    pub position: usize,
    pub span: Span,
    pub message: String,
}

type Result<T> = std::result::Result<T, ParseError>;

impl Parser {
    pub fn new(tokens: Vec<(Token, Span)>) -> Self {
        Parser { tokens, pos: 0, last_end: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|(_, s)| *s)
            .unwrap_or(Span::new(self.last_end, self.last_end))
    }

    fn advance(&mut self) -> Option<&Token> {
        let entry = self.tokens.get(self.pos);
        if let Some((_, span)) = entry {
            self.last_end = span.end;
            self.pos += 1;
        }
        entry.map(|(t, _)| t)
    }

    fn expect(&mut self, expected: &Token) -> Result<Span> {
        match self.peek() {
            Some(tok) if tok == expected => {
                let span = self.peek_span();
                self.advance();
                Ok(span)
            }
            Some(tok) => Err(self.error("LL-P003", format!("expected {:?}, got {:?}", expected, tok))),
            None => Err(self.error("LL-P004", format!("expected {:?}, got EOF", expected))),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.advance();
                Ok(name)
            }
            Some(tok) => Err(self.error("LL-P005", format!("expected identifier, got {:?}", tok))),
            None => Err(self.error("LL-P006", "expected identifier, got EOF".into())),
        }
    }

    fn error(&self, code: &'static str, message: String) -> ParseError {
        ParseError {
            code,
            position: self.pos,
            span: self.peek_span(),
            message,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    // ---- Program ----

    /// The whole input is a single root block.
    pub fn parse_program(&mut self) -> Result<Block> {
        let block = self.parse_block()?;
        if !self.at_end() {
            let tok = self.peek().cloned();
            return Err(self.error("LL-P001", format!("unexpected {:?} after the root block", tok)));
        }
        Ok(block)
    }

    /// `{ stmt* }`
    fn parse_block(&mut self) -> Result<Block> {
        self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        loop {
            match self.peek() {
                Some(Token::RBrace) => {
                    self.advance();
                    return Ok(Block::new(stmts));
                }
                None => return Err(self.error("LL-P002", "unclosed block, expected '}'".into())),
                Some(_) => stmts.push(self.parse_stmt()?),
            }
        }
    }

    // ---- Statements ----

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.peek() {
            Some(Token::Cond) => self.parse_cond(),
            Some(Token::Loop) => self.parse_loop(),
            Some(Token::Break) => self.parse_break(),
            Some(Token::LBrace) => Ok(Stmt::Block(self.parse_block()?)),
            Some(Token::Var(_)) | Some(Token::Ident(_)) => self.parse_call_stmt(),
            Some(tok) => {
                let hint = if matches!(tok, Token::Else) {
                    "\n  hint: 'else' must directly follow the block of a 'cond'"
                } else {
                    ""
                };
                Err(self.error("LL-P007", format!("expected statement, got {:?}{}", tok, hint)))
            }
            None => Err(self.error("LL-P008", "expected statement, got EOF".into())),
        }
    }

    /// `cond expr {..} (else {..})?`
    fn parse_cond(&mut self) -> Result<Stmt> {
        self.expect(&Token::Cond)?;
        let condition = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let else_block = if self.peek() == Some(&Token::Else) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(Stmt::Cond(Cond { condition, then_block, else_block }))
    }

    /// `loop label? {..}`
    fn parse_loop(&mut self) -> Result<Stmt> {
        let start = self.expect(&Token::Loop)?;
        let label = match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.advance();
                Some(name)
            }
            _ => None,
        };
        let head = Span::new(start.start, self.last_end);
        let body = self.parse_block()?;
        Ok(Stmt::Loop(Loop { label, body, span: head }))
    }

    /// `break label? ;`
    fn parse_break(&mut self) -> Result<Stmt> {
        let start = self.expect(&Token::Break)?;
        let label = match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.advance();
                Some(name)
            }
            _ => None,
        };
        let end = self.expect(&Token::Semi)?;
        Ok(Stmt::Break(Break { label, span: start.merge(end) }))
    }

    /// `($var =)? name expr* ;`
    fn parse_call_stmt(&mut self) -> Result<Stmt> {
        let result = match self.peek().cloned() {
            Some(Token::Var(name)) => {
                self.advance();
                self.expect(&Token::Assign)
                    .map_err(|e| ParseError {
                        message: format!("{}\n  hint: a variable on its own is not a statement, assign a call to it: $x = f;", e.message),
                        ..e
                    })?;
                Some(Var::new(name))
            }
            _ => None,
        };
        let call = self.parse_call()?;
        self.expect(&Token::Semi)?;
        Ok(Stmt::Call(CallStmt { result, call }))
    }

    // ---- Expressions ----

    /// `name expr*`. Arguments are taken greedily.
    fn parse_call(&mut self) -> Result<CallExpr> {
        let start = self.peek_span();
        let name = self.expect_ident()?;
        let mut args = Vec::new();
        while matches!(self.peek(), Some(Token::Var(_) | Token::Ident(_) | Token::LParen)) {
            args.push(self.parse_expr()?);
        }
        Ok(CallExpr { name, args, span: Span::new(start.start, self.last_end) })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        match self.peek().cloned() {
            Some(Token::Var(name)) => {
                self.advance();
                Ok(Expr::Var(Var::new(name)))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(Expr::Paren(Box::new(inner)))
            }
            Some(Token::Ident(_)) => Ok(Expr::Call(self.parse_call()?)),
            Some(tok) => Err(self.error("LL-P009", format!("expected expression, got {:?}", tok))),
            None => Err(self.error("LL-P010", "expected expression, got EOF".into())),
        }
    }
}

pub fn parse(tokens: Vec<(Token, Span)>) -> Result<Block> {
    let mut parser = Parser::new(tokens);
    parser.parse_program()
}

/// Failure of either front-end stage.
#[derive(Debug, thiserror::Error)]
pub enum FrontendError {
    #[error(transparent)]
    Lex(#[from] lexer::LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Lex and parse source text into an unresolved root block.
pub fn parse_source(source: &str) -> std::result::Result<Block, FrontendError> {
    let tokens = lexer::lex(source)?
        .into_iter()
        .map(|(t, r)| (t, Span::new(r.start, r.end)))
        .collect();
    Ok(parse(tokens)?)
}
