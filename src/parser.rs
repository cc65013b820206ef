use std::rc::Rc;

use crate::{
    ast::{
        BinaryOp, CatchClause, DeclKind, Expr, ExprKind, FunctionDecl, Literal, LogicalOp,
        Program, Stmt, StmtKind, UnaryOp,
    },
    diagnostics::{Diagnostic, DiagnosticKind, SourceSpan},
    lexer::{Keyword, Lexer, Token, TokenKind},
    stack::StackGuard,
};

/// Deepest statement and expression nesting a script may use. Operator
/// chains such as `a + b + c` count one level per operator.
pub const MAX_NESTING_DEPTH: usize = 256;

pub fn parse_program(source: &str) -> Result<Program, Diagnostic> {
    parse_program_with_stack(source, StackGuard::new())
}

/// Parses with native stack use measured against `stack`, for scripts
/// compiled while another one is running.
pub fn parse_program_with_stack(source: &str, stack: StackGuard) -> Result<Program, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens, stack).parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    current: usize,
    function_depth: usize,
    loop_depth: usize,
    depth: usize,
    stack: StackGuard,
}

impl Parser {
    fn new(tokens: Vec<Token>, stack: StackGuard) -> Self {
        Self {
            tokens,
            current: 0,
            function_depth: 0,
            loop_depth: 0,
            depth: 0,
            stack,
        }
    }

    fn descend(&mut self) -> Result<(), Diagnostic> {
        if self.depth >= MAX_NESTING_DEPTH || self.stack.exhausted() {
            return Err(Diagnostic::new(
                DiagnosticKind::Parser,
                "Maximum nesting depth exceeded",
                self.peek().span,
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn nested<T>(
        &mut self,
        parse: impl FnOnce(&mut Self) -> Result<T, Diagnostic>,
    ) -> Result<T, Diagnostic> {
        self.descend()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn parse_program(&mut self) -> Result<Program, Diagnostic> {
        let mut body = Vec::new();
        while !self.check(TokenKind::Eof) {
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    fn parse_block(&mut self) -> Result<(Vec<Stmt>, SourceSpan), Diagnostic> {
        let lbrace = self.consume(TokenKind::LBrace)?;
        let mut items = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            items.push(self.parse_statement()?);
        }
        let rbrace = self.consume(TokenKind::RBrace)?;
        Ok((items, lbrace.span.to(rbrace.span)))
    }

    fn parse_statement(&mut self) -> Result<Stmt, Diagnostic> {
        self.nested(Self::parse_statement_kind)
    }

    fn parse_statement_kind(&mut self) -> Result<Stmt, Diagnostic> {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::Var | Keyword::Let | Keyword::Const) => {
                let stmt = self.parse_declaration()?;
                self.consume_optional_semicolon();
                Ok(stmt)
            }
            TokenKind::Keyword(Keyword::Function) => {
                let decl = self.parse_function()?;
                if decl.name.is_none() {
                    return Err(Diagnostic::new(
                        DiagnosticKind::Parser,
                        "Function statements require a function name",
                        decl.span,
                    ));
                }
                Ok(Stmt {
                    span: decl.span,
                    kind: StmtKind::Function(decl),
                })
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::While) => self.parse_while(),
            TokenKind::Keyword(Keyword::For) => self.parse_for(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::Break) => self.parse_jump(Keyword::Break),
            TokenKind::Keyword(Keyword::Continue) => self.parse_jump(Keyword::Continue),
            TokenKind::Keyword(Keyword::Throw) => self.parse_throw(),
            TokenKind::Keyword(Keyword::Try) => self.parse_try(),
            TokenKind::LBrace => {
                let (items, span) = self.parse_block()?;
                Ok(Stmt {
                    kind: StmtKind::Block(items),
                    span,
                })
            }
            TokenKind::Semicolon => {
                let token = self.advance();
                Ok(Stmt {
                    kind: StmtKind::Empty,
                    span: token.span,
                })
            }
            _ => {
                let expr = self.parse_expression()?;
                self.consume_optional_semicolon();
                Ok(Stmt {
                    span: expr.span,
                    kind: StmtKind::Expr(expr),
                })
            }
        }
    }

    fn parse_declaration(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        let kind = match keyword.kind {
            TokenKind::Keyword(Keyword::Let) => DeclKind::Let,
            TokenKind::Keyword(Keyword::Const) => DeclKind::Const,
            _ => DeclKind::Var,
        };
        let name = self.consume_identifier()?;
        let initializer = if self.matches(TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        if kind == DeclKind::Const && initializer.is_none() {
            return Err(Diagnostic::new(
                DiagnosticKind::Parser,
                "Missing initializer in const declaration",
                name.span,
            ));
        }
        let end = initializer.as_ref().map_or(name.span, |expr| expr.span);
        Ok(Stmt {
            kind: StmtKind::Decl {
                kind,
                name: name.lexeme,
                initializer,
            },
            span: keyword.span.to(end),
        })
    }

    fn parse_function(&mut self) -> Result<Rc<FunctionDecl>, Diagnostic> {
        let keyword = self.consume(TokenKind::Keyword(Keyword::Function))?;
        let name = if self.check(TokenKind::Identifier) {
            Some(self.advance().lexeme)
        } else {
            None
        };
        self.consume(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                params.push(self.consume_identifier()?.lexeme);
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen)?;

        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;
        let block = self.parse_block();
        self.function_depth -= 1;
        self.loop_depth = saved_loops;
        let (body, body_span) = block?;

        Ok(Rc::new(FunctionDecl {
            name,
            params,
            body,
            span: keyword.span.to(body_span),
        }))
    }

    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        self.consume(TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RParen)?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.matches(TokenKind::Keyword(Keyword::Else)) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        let end = else_branch
            .as_ref()
            .map_or(then_branch.span, |branch| branch.span);
        Ok(Stmt {
            kind: StmtKind::If {
                condition,
                then_branch,
                else_branch,
            },
            span: keyword.span.to(end),
        })
    }

    fn parse_loop_body(&mut self) -> Result<Box<Stmt>, Diagnostic> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        body.map(Box::new)
    }

    fn parse_while(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        self.consume(TokenKind::LParen)?;
        let condition = self.parse_expression()?;
        self.consume(TokenKind::RParen)?;
        let body = self.parse_loop_body()?;
        Ok(Stmt {
            span: keyword.span.to(body.span),
            kind: StmtKind::While { condition, body },
        })
    }

    fn parse_for(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        self.consume(TokenKind::LParen)?;
        let init = if self.check(TokenKind::Semicolon) {
            None
        } else if matches!(
            self.peek().kind,
            TokenKind::Keyword(Keyword::Var | Keyword::Let | Keyword::Const)
        ) {
            Some(Box::new(self.parse_declaration()?))
        } else {
            let expr = self.parse_expression()?;
            Some(Box::new(Stmt {
                span: expr.span,
                kind: StmtKind::Expr(expr),
            }))
        };
        self.consume(TokenKind::Semicolon)?;
        let condition = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::Semicolon)?;
        let update = if self.check(TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::RParen)?;
        let body = self.parse_loop_body()?;
        Ok(Stmt {
            span: keyword.span.to(body.span),
            kind: StmtKind::For {
                init,
                condition,
                update,
                body,
            },
        })
    }

    fn parse_return(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        if self.function_depth == 0 {
            return Err(Diagnostic::new(
                DiagnosticKind::Parser,
                "Illegal return statement",
                keyword.span,
            ));
        }
        let value = if self.ends_statement() {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_optional_semicolon();
        let end = value.as_ref().map_or(keyword.span, |expr| expr.span);
        Ok(Stmt {
            kind: StmtKind::Return(value),
            span: keyword.span.to(end),
        })
    }

    fn parse_jump(&mut self, keyword: Keyword) -> Result<Stmt, Diagnostic> {
        let token = self.advance();
        if self.loop_depth == 0 {
            let message = match keyword {
                Keyword::Break => "Illegal break statement",
                _ => "Illegal continue statement: no surrounding iteration statement",
            };
            return Err(Diagnostic::new(DiagnosticKind::Parser, message, token.span));
        }
        self.consume_optional_semicolon();
        let kind = match keyword {
            Keyword::Break => StmtKind::Break,
            _ => StmtKind::Continue,
        };
        Ok(Stmt {
            kind,
            span: token.span,
        })
    }

    fn parse_throw(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        if self.ends_statement() {
            let next = self.peek().clone();
            return Err(self.unexpected(&next));
        }
        let value = self.parse_expression()?;
        self.consume_optional_semicolon();
        Ok(Stmt {
            span: keyword.span.to(value.span),
            kind: StmtKind::Throw(value),
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, Diagnostic> {
        let keyword = self.advance();
        let (block, mut span) = self.parse_block()?;
        span = keyword.span.to(span);

        let handler = if self.matches(TokenKind::Keyword(Keyword::Catch)) {
            let binding = if self.matches(TokenKind::LParen) {
                let name = self.consume_identifier()?;
                self.consume(TokenKind::RParen)?;
                Some(name.lexeme)
            } else {
                None
            };
            let (body, body_span) = self.parse_block()?;
            span = span.to(body_span);
            Some(CatchClause { binding, body })
        } else {
            None
        };

        let finalizer = if self.matches(TokenKind::Keyword(Keyword::Finally)) {
            let (body, body_span) = self.parse_block()?;
            span = span.to(body_span);
            Some(body)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(Diagnostic::new(
                DiagnosticKind::Parser,
                "Missing catch or finally after try",
                self.peek().span,
            ));
        }

        Ok(Stmt {
            kind: StmtKind::Try {
                block,
                handler,
                finalizer,
            },
            span,
        })
    }

    fn parse_expression(&mut self) -> Result<Expr, Diagnostic> {
        self.nested(Self::parse_assignment)
    }

    fn parse_assignment(&mut self) -> Result<Expr, Diagnostic> {
        let target = self.parse_or()?;
        if !self.check(TokenKind::Assign) {
            return Ok(target);
        }
        if !matches!(
            target.kind,
            ExprKind::Identifier(_) | ExprKind::Member { .. } | ExprKind::Index { .. }
        ) {
            return Err(Diagnostic::new(
                DiagnosticKind::Parser,
                "Invalid left-hand side in assignment",
                target.span,
            ));
        }
        self.advance();
        let value = self.parse_expression()?;
        Ok(Expr {
            span: target.span.to(value.span),
            kind: ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
        })
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_logical_level(TokenKind::PipePipe, LogicalOp::Or, Self::parse_and)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_logical_level(
            TokenKind::AmpersandAmpersand,
            LogicalOp::And,
            Self::parse_equality,
        )
    }

    fn parse_logical_level(
        &mut self,
        token: TokenKind,
        op: LogicalOp,
        operand: fn(&mut Self) -> Result<Expr, Diagnostic>,
    ) -> Result<Expr, Diagnostic> {
        let mut expr = operand(self)?;
        let entered = self.depth;
        while self.matches(token) {
            self.descend()?;
            let right = operand(self)?;
            expr = Expr {
                span: expr.span.to(right.span),
                kind: ExprKind::Logical {
                    op,
                    left: Box::new(expr),
                    right: Box::new(right),
                },
            };
        }
        self.depth = entered;
        Ok(expr)
    }

    fn parse_binary_level(
        &mut self,
        operators: &[(TokenKind, BinaryOp)],
        operand: fn(&mut Self) -> Result<Expr, Diagnostic>,
    ) -> Result<Expr, Diagnostic> {
        let mut expr = operand(self)?;
        let entered = self.depth;
        'outer: loop {
            for (token, op) in operators {
                if self.matches(*token) {
                    self.descend()?;
                    let right = operand(self)?;
                    expr = Expr {
                        span: expr.span.to(right.span),
                        kind: ExprKind::Binary {
                            op: *op,
                            left: Box::new(expr),
                            right: Box::new(right),
                        },
                    };
                    continue 'outer;
                }
            }
            break;
        }
        self.depth = entered;
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_binary_level(
            &[
                (TokenKind::EqualEqualEqual, BinaryOp::StrictEqual),
                (TokenKind::BangEqualEqual, BinaryOp::StrictNotEqual),
                (TokenKind::EqualEqual, BinaryOp::Equal),
                (TokenKind::BangEqual, BinaryOp::NotEqual),
            ],
            Self::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_binary_level(
            &[
                (TokenKind::LessEqual, BinaryOp::LessEqual),
                (TokenKind::GreaterEqual, BinaryOp::GreaterEqual),
                (TokenKind::Less, BinaryOp::Less),
                (TokenKind::Greater, BinaryOp::Greater),
            ],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_binary_level(
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_binary_level(
            &[
                (TokenKind::Star, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Bang => UnaryOp::Not,
            TokenKind::Keyword(Keyword::Typeof) => UnaryOp::Typeof,
            _ => return self.parse_call(),
        };
        let operator = self.advance();
        let operand = self.nested(Self::parse_unary)?;
        Ok(Expr {
            span: operator.span.to(operand.span),
            kind: ExprKind::Unary {
                op,
                expr: Box::new(operand),
            },
        })
    }

    fn parse_call(&mut self) -> Result<Expr, Diagnostic> {
        let mut expr = if self.check(TokenKind::Keyword(Keyword::New)) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        let entered = self.depth;
        loop {
            if self.matches(TokenKind::LParen) {
                self.descend()?;
                let (args, rparen) = self.parse_arguments()?;
                expr = Expr {
                    span: expr.span.to(rparen),
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                };
            } else if let Some(next) = self.parse_member_suffix(&expr)? {
                self.descend()?;
                expr = next;
            } else {
                break;
            }
        }
        self.depth = entered;
        Ok(expr)
    }

    fn parse_new(&mut self) -> Result<Expr, Diagnostic> {
        let keyword = self.advance();
        let mut callee = if self.check(TokenKind::Keyword(Keyword::New)) {
            self.nested(Self::parse_new)?
        } else {
            self.parse_primary()?
        };
        let entered = self.depth;
        while let Some(next) = self.parse_member_suffix(&callee)? {
            self.descend()?;
            callee = next;
        }
        self.depth = entered;
        let (args, end) = if self.matches(TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            (Vec::new(), callee.span)
        };
        Ok(Expr {
            span: keyword.span.to(end),
            kind: ExprKind::New {
                callee: Box::new(callee),
                args,
            },
        })
    }

    /// Parses `.name` or `[index]` following `target`, if present.
    fn parse_member_suffix(&mut self, target: &Expr) -> Result<Option<Expr>, Diagnostic> {
        if self.matches(TokenKind::Dot) {
            let name = self.consume_property_name()?;
            return Ok(Some(Expr {
                span: target.span.to(name.span),
                kind: ExprKind::Member {
                    target: Box::new(target.clone()),
                    property: name.lexeme,
                },
            }));
        }
        if self.matches(TokenKind::LBracket) {
            let index = self.parse_expression()?;
            let rbracket = self.consume(TokenKind::RBracket)?;
            return Ok(Some(Expr {
                span: target.span.to(rbracket.span),
                kind: ExprKind::Index {
                    target: Box::new(target.clone()),
                    index: Box::new(index),
                },
            }));
        }
        Ok(None)
    }

    fn parse_arguments(&mut self) -> Result<(Vec<Expr>, SourceSpan), Diagnostic> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.matches(TokenKind::Comma) || self.check(TokenKind::RParen) {
                    break;
                }
            }
        }
        let rparen = self.consume(TokenKind::RParen)?;
        Ok((args, rparen.span))
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let token = self.peek().clone();
        let literal = |literal: Literal| -> Result<Expr, Diagnostic> {
            Ok(Expr {
                span: token.span,
                kind: ExprKind::Literal(literal),
            })
        };
        match token.kind {
            TokenKind::Keyword(Keyword::Function) => {
                let decl = self.parse_function()?;
                return Ok(Expr {
                    span: decl.span,
                    kind: ExprKind::Function(decl),
                });
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RParen)?;
                return Ok(inner);
            }
            TokenKind::LBracket => return self.parse_array(),
            TokenKind::LBrace => return self.parse_object(),
            _ => {}
        }
        self.advance();
        match token.kind {
            TokenKind::Number => literal(Literal::Number(token.lexeme.parse().unwrap_or(f64::NAN))),
            TokenKind::String => literal(Literal::String(token.lexeme.clone())),
            TokenKind::Keyword(Keyword::True) => literal(Literal::Bool(true)),
            TokenKind::Keyword(Keyword::False) => literal(Literal::Bool(false)),
            TokenKind::Keyword(Keyword::Null) => literal(Literal::Null),
            TokenKind::Keyword(Keyword::Undefined) => literal(Literal::Undefined),
            TokenKind::Identifier => Ok(Expr {
                span: token.span,
                kind: ExprKind::Identifier(token.lexeme.clone()),
            }),
            _ => Err(self.unexpected(&token)),
        }
    }

    fn parse_array(&mut self) -> Result<Expr, Diagnostic> {
        let lbracket = self.advance();
        let mut elements = Vec::new();
        while !self.check(TokenKind::RBracket) {
            elements.push(self.parse_expression()?);
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        let rbracket = self.consume(TokenKind::RBracket)?;
        Ok(Expr {
            span: lbracket.span.to(rbracket.span),
            kind: ExprKind::Array(elements),
        })
    }

    fn parse_object(&mut self) -> Result<Expr, Diagnostic> {
        let lbrace = self.advance();
        let mut entries = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let key = self.consume_property_name()?;
            self.consume(TokenKind::Colon)?;
            entries.push((key.lexeme, self.parse_expression()?));
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        let rbrace = self.consume(TokenKind::RBrace)?;
        Ok(Expr {
            span: lbrace.span.to(rbrace.span),
            kind: ExprKind::Object(entries),
        })
    }

    fn ends_statement(&self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Semicolon | TokenKind::RBrace | TokenKind::Eof
        )
    }

    fn consume_optional_semicolon(&mut self) {
        let _ = self.matches(TokenKind::Semicolon);
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind) -> Result<Token, Diagnostic> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            let token = self.peek().clone();
            Err(self.unexpected(&token))
        }
    }

    fn consume_identifier(&mut self) -> Result<Token, Diagnostic> {
        self.consume(TokenKind::Identifier)
    }

    /// Property names may be identifiers, keywords, strings or numbers.
    fn consume_property_name(&mut self) -> Result<Token, Diagnostic> {
        match self.peek().kind {
            TokenKind::Identifier
            | TokenKind::Keyword(_)
            | TokenKind::String
            | TokenKind::Number => Ok(self.advance()),
            _ => {
                let token = self.peek().clone();
                Err(self.unexpected(&token))
            }
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn peek(&self) -> &Token {
        // The lexer always terminates the stream with `Eof`.
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn unexpected(&self, token: &Token) -> Diagnostic {
        let message = match token.kind {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            TokenKind::String => "Unexpected string".to_string(),
            TokenKind::Number => "Unexpected number".to_string(),
            TokenKind::Identifier => format!("Unexpected identifier '{}'", token.lexeme),
            _ => format!("Unexpected token '{}'", token.lexeme),
        };
        Diagnostic::new(DiagnosticKind::Parser, message, token.span)
    }
}
