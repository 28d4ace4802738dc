use crate::data::ast::*;
use crate::data::ids::FieldId;
use crate::data::ids::LocalVarId;
use crate::data::ids::MethodId;
use crate::data::ids::TypeId;
use crate::data::ids::TypeKind;
use crate::data::span::FileId;
use crate::data::span::Span;
use crate::data::token::Token;
use crate::parse::Error;
use crate::parse::ErrorKind;

type Parsed<T> = Result<T, Error>;

/// Recursive-descent parser over a filtered token stream.
///
/// Productions mirror the Joos grammar; the only lookahead beyond one
/// token is a bounded speculative parse for local-variable
/// declarations and cast expressions, implemented by saving and
/// restoring the cursor.
pub struct Parser<'tokens> {
    file: FileId,
    tokens: &'tokens [(Token, Span)],
    pos: usize,
}

impl<'tokens> Parser<'tokens> {
    pub fn new(file: FileId, tokens: &'tokens [(Token, Span)]) -> Self {
        Parser {
            file,
            tokens,
            pos: 0,
        }
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).map(|(token, _)| *token)
    }

    fn peek2(&self) -> Option<Token> {
        self.tokens.get(self.pos + 1).map(|(token, _)| *token)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|(_, span)| *span)
            .unwrap_or_else(|| Span {
                file: self.file,
                ..Span::default()
            })
    }

    fn advance(&mut self) -> Option<(Token, Span)> {
        let next = self.tokens.get(self.pos).copied();
        self.pos += 1;
        next
    }

    fn unexpected<T>(&self) -> Parsed<T> {
        Err(Error {
            span: self.span(),
            kind: ErrorKind::UnexpectedToken(self.peek()),
        })
    }

    fn eat(&mut self, expected: Token) -> Parsed<Span> {
        match self.peek() {
            Some(token) if token == expected => Ok(self.advance().unwrap().1),
            _ => self.unexpected(),
        }
    }

    fn eat_if(&mut self, expected: Token) -> Option<Span> {
        match self.peek() {
            Some(token) if token == expected => Some(self.advance().unwrap().1),
            _ => None,
        }
    }

    fn identifier(&mut self) -> Parsed<Ident> {
        match self.peek() {
            Some(Token::Identifier(symbol)) => {
                let (_, span) = self.advance().unwrap();
                Ok(Ident { symbol, span })
            }
            _ => self.unexpected(),
        }
    }

    // CompilationUnit:
    //   PackageDeclaration? ImportDeclaration* TypeDeclaration*
    pub fn comp_unit(&mut self) -> Parsed<CompUnit> {
        let package = match self.eat_if(Token::Package) {
            Some(_) => {
                let name = self.qualified_name()?;
                self.eat(Token::Semicolon)?;
                Some(name)
            }
            None => None,
        };

        let mut imports = Vec::new();
        while let Some(lo) = self.eat_if(Token::Import) {
            imports.push(self.import(lo)?);
        }

        let mut decls = Vec::new();
        while self.peek().is_some() {
            decls.push(self.type_decl()?);
        }

        Ok(CompUnit {
            file: self.file,
            package,
            imports,
            decls,
        })
    }

    fn import(&mut self, lo: Span) -> Parsed<Import> {
        let mut parts = vec![self.identifier()?];
        let mut wildcard = false;

        while self.eat_if(Token::Dot).is_some() {
            if self.eat_if(Token::Mul).is_some() {
                wildcard = true;
                break;
            }
            parts.push(self.identifier()?);
        }

        let hi = self.eat(Token::Semicolon)?;
        let span = lo.merge(hi);
        let name_span = parts[0].span.merge(parts.last().unwrap().span);
        Ok(Import {
            name: QualifiedName {
                parts: parts.into_iter().map(|ident| ident.symbol).collect(),
                span: name_span,
            },
            wildcard,
            span,
        })
    }

    fn qualified_name(&mut self) -> Parsed<QualifiedName> {
        let head = self.identifier()?;
        let mut span = head.span;
        let mut parts = vec![head.symbol];

        while let Some(Token::Dot) = self.peek() {
            // Stop before `.` when it is not followed by an
            // identifier, e.g. the `.*` of a wildcard import.
            match self.peek2() {
                Some(Token::Identifier(_)) => {
                    self.advance();
                    let next = self.identifier()?;
                    span = span.merge(next.span);
                    parts.push(next.symbol);
                }
                _ => break,
            }
        }

        Ok(QualifiedName { parts, span })
    }

    fn modifiers(&mut self) -> Modifiers {
        let mut mods = Modifiers::default();
        while let Some(token) = self.peek().filter(Token::is_modifier) {
            let (_, span) = self.advance().unwrap();
            let slot = match token {
                Token::Public => &mut mods.public,
                Token::Protected => &mut mods.protected,
                Token::Abstract => &mut mods.abstract_,
                Token::Final => &mut mods.final_,
                Token::Static => &mut mods.static_,
                Token::Native => &mut mods.native,
                _ => unreachable!(),
            };
            // Keep the first occurrence; duplicates are harmless here
            // and the weeder does not distinguish them.
            slot.get_or_insert(span);
        }
        mods
    }

    // ClassDeclaration:
    //   Modifiers `class` Identifier (`extends` Name)?
    //   (`implements` NameList)? ClassBody
    // InterfaceDeclaration:
    //   Modifiers `interface` Identifier (`extends` NameList)?
    //   InterfaceBody
    fn type_decl(&mut self) -> Parsed<TypeDecl> {
        let mods = self.modifiers();
        let (kind, lo) = match self.peek() {
            Some(Token::Class) => (TypeKind::Class, self.advance().unwrap().1),
            Some(Token::Interface) => (TypeKind::Interface, self.advance().unwrap().1),
            _ => return self.unexpected(),
        };

        let name = self.identifier()?;
        let mut extends = Vec::new();
        let mut implements = Vec::new();

        if self.eat_if(Token::Extends).is_some() {
            extends.push(self.qualified_name()?);
            if kind == TypeKind::Interface {
                while self.eat_if(Token::Comma).is_some() {
                    extends.push(self.qualified_name()?);
                }
            }
        }

        if kind == TypeKind::Class && self.eat_if(Token::Implements).is_some() {
            implements.push(self.qualified_name()?);
            while self.eat_if(Token::Comma).is_some() {
                implements.push(self.qualified_name()?);
            }
        }

        self.eat(Token::LBrace)?;
        let mut members = Vec::new();
        let hi = loop {
            if let Some(hi) = self.eat_if(Token::RBrace) {
                break hi;
            }
            members.push(self.member()?);
        };

        Ok(TypeDecl {
            kind,
            mods,
            name,
            extends,
            implements,
            members,
            span: lo.merge(hi),
        })
    }

    fn member(&mut self) -> Parsed<Member> {
        let mods = self.modifiers();

        // Constructor: an identifier directly followed by `(`.
        if let (Some(Token::Identifier(_)), Some(Token::LParen)) = (self.peek(), self.peek2()) {
            let name = self.identifier()?;
            let params = self.params()?;
            let body = self.block()?;
            let span = name.span.merge(body.span);
            return Ok(Member::Method(MethodDecl {
                mods,
                ret: None,
                name,
                params,
                body: Some(body),
                span,
                ret_tid: TypeId::UNASSIGNED,
                mid: MethodId::ERROR,
            }));
        }

        let ty = if let Some(span) = self.eat_if(Token::Void) {
            Type::Void(span)
        } else {
            self.ty()?
        };
        let name = self.identifier()?;

        match self.peek() {
            Some(Token::LParen) => {
                let params = self.params()?;
                let (body, hi) = match self.eat_if(Token::Semicolon) {
                    Some(hi) => (None, hi),
                    None => {
                        let block = self.block()?;
                        let hi = block.span;
                        (Some(block), hi)
                    }
                };
                let span = ty.span().merge(hi);
                Ok(Member::Method(MethodDecl {
                    mods,
                    ret: Some(ty),
                    name,
                    params,
                    body,
                    span,
                    ret_tid: TypeId::UNASSIGNED,
                    mid: MethodId::ERROR,
                }))
            }
            _ => {
                let init = match self.eat_if(Token::Assign) {
                    Some(_) => Some(self.expr()?),
                    None => None,
                };
                let hi = self.eat(Token::Semicolon)?;
                let span = ty.span().merge(hi);
                Ok(Member::Field(FieldDecl {
                    mods,
                    ty,
                    name,
                    init,
                    span,
                    tid: TypeId::UNASSIGNED,
                    fid: FieldId::ERROR,
                }))
            }
        }
    }

    fn params(&mut self) -> Parsed<Vec<Param>> {
        self.eat(Token::LParen)?;
        let mut params = Vec::new();
        if self.eat_if(Token::RParen).is_some() {
            return Ok(params);
        }
        loop {
            let ty = self.ty()?;
            let name = self.identifier()?;
            let span = ty.span().merge(name.span);
            params.push(Param {
                ty,
                name,
                span,
                tid: TypeId::UNASSIGNED,
                lid: LocalVarId(0),
            });
            if self.eat_if(Token::Comma).is_none() {
                break;
            }
        }
        self.eat(Token::RParen)?;
        Ok(params)
    }

    fn primitive(&mut self) -> Option<(TypeId, Span)> {
        let tid = match self.peek()? {
            Token::Boolean => TypeId::BOOL,
            Token::Byte => TypeId::BYTE,
            Token::Char => TypeId::CHAR,
            Token::Short => TypeId::SHORT,
            Token::Int => TypeId::INT,
            _ => return None,
        };
        let (_, span) = self.advance().unwrap();
        Some((tid, span))
    }

    // Type: (PrimitiveType | Name) (`[` `]`)*
    fn ty(&mut self) -> Parsed<Type> {
        let mut ty = match self.primitive() {
            Some((tid, span)) => Type::Primitive(tid, span),
            None => Type::Reference(self.qualified_name()?),
        };
        while let (Some(Token::LBrack), Some(Token::RBrack)) = (self.peek(), self.peek2()) {
            let lo = ty.span();
            self.advance();
            let (_, hi) = self.advance().unwrap();
            ty = Type::Array(Box::new(ty), lo.merge(hi));
        }
        Ok(ty)
    }

    fn block(&mut self) -> Parsed<Block> {
        let lo = self.eat(Token::LBrace)?;
        let mut stmts = Vec::new();
        let hi = loop {
            if let Some(hi) = self.eat_if(Token::RBrace) {
                break hi;
            }
            stmts.push(self.stmt()?);
        };
        Ok(Block {
            stmts,
            span: lo.merge(hi),
        })
    }

    fn stmt(&mut self) -> Parsed<Stmt> {
        match self.peek() {
            Some(Token::LBrace) => self.block().map(Stmt::Block),
            Some(Token::Semicolon) => {
                let span = self.advance().unwrap().1;
                Ok(Stmt::Empty(span))
            }
            Some(Token::If) => {
                let lo = self.advance().unwrap().1;
                self.eat(Token::LParen)?;
                let cond = self.expr()?;
                self.eat(Token::RParen)?;
                let then = Box::new(self.stmt()?);
                let (els, hi) = match self.eat_if(Token::Else) {
                    Some(_) => {
                        let els = self.stmt()?;
                        let hi = els.span();
                        (Some(Box::new(els)), hi)
                    }
                    None => (None, then.span()),
                };
                Ok(Stmt::If {
                    cond,
                    then,
                    els,
                    span: lo.merge(hi),
                })
            }
            Some(Token::While) => {
                let lo = self.advance().unwrap().1;
                self.eat(Token::LParen)?;
                let cond = self.expr()?;
                self.eat(Token::RParen)?;
                let body = Box::new(self.stmt()?);
                let span = lo.merge(body.span());
                Ok(Stmt::While { cond, body, span })
            }
            Some(Token::For) => {
                let lo = self.advance().unwrap().1;
                self.eat(Token::LParen)?;
                let init = match self.peek() {
                    Some(Token::Semicolon) => {
                        self.advance();
                        None
                    }
                    _ => {
                        let init = self.simple_stmt()?;
                        self.eat(Token::Semicolon)?;
                        Some(Box::new(init))
                    }
                };
                let cond = match self.peek() {
                    Some(Token::Semicolon) => None,
                    _ => Some(self.expr()?),
                };
                self.eat(Token::Semicolon)?;
                let update = match self.peek() {
                    Some(Token::RParen) => None,
                    _ => Some(self.expr()?),
                };
                self.eat(Token::RParen)?;
                let body = Box::new(self.stmt()?);
                let span = lo.merge(body.span());
                Ok(Stmt::For {
                    init,
                    cond,
                    update,
                    body,
                    span,
                })
            }
            Some(Token::Return) => {
                let lo = self.advance().unwrap().1;
                let value = match self.peek() {
                    Some(Token::Semicolon) => None,
                    _ => Some(self.expr()?),
                };
                let hi = self.eat(Token::Semicolon)?;
                Ok(Stmt::Return(value, lo.merge(hi)))
            }
            _ => {
                let stmt = self.simple_stmt()?;
                self.eat(Token::Semicolon)?;
                Ok(stmt)
            }
        }
    }

    /// A local-variable declaration or an expression, without the
    /// trailing semicolon. Shared between statements and `for` inits.
    fn simple_stmt(&mut self) -> Parsed<Stmt> {
        if let Some(decl) = self.try_local_decl()? {
            return Ok(decl);
        }
        self.expr().map(Stmt::Expr)
    }

    /// Speculatively parses `Type Identifier = Expr`. Rolls the cursor
    /// back when the lookahead does not shape like a declaration.
    fn try_local_decl(&mut self) -> Parsed<Option<Stmt>> {
        let saved = self.pos;

        let shaped = matches!(
            self.peek(),
            Some(Token::Boolean)
                | Some(Token::Byte)
                | Some(Token::Char)
                | Some(Token::Short)
                | Some(Token::Int)
                | Some(Token::Identifier(_))
        );
        if !shaped {
            return Ok(None);
        }

        let ty = match self.ty() {
            Ok(ty) => ty,
            Err(_) => {
                self.pos = saved;
                return Ok(None);
            }
        };

        match (self.peek(), self.peek2()) {
            (Some(Token::Identifier(_)), Some(Token::Assign)) => {
                let name = self.identifier()?;
                self.eat(Token::Assign)?;
                let init = self.expr()?;
                let span = ty.span().merge(init.span);
                Ok(Some(Stmt::LocalDecl {
                    ty,
                    name,
                    init: Some(init),
                    span,
                    tid: TypeId::UNASSIGNED,
                    lid: LocalVarId(0),
                }))
            }
            (Some(Token::Identifier(_)), Some(Token::Semicolon)) => {
                let name = self.identifier()?;
                let span = ty.span().merge(name.span);
                Ok(Some(Stmt::LocalDecl {
                    ty,
                    name,
                    init: None,
                    span,
                    tid: TypeId::UNASSIGNED,
                    lid: LocalVarId(0),
                }))
            }
            _ => {
                self.pos = saved;
                Ok(None)
            }
        }
    }

    // Assignment is right-associative and the lowest-precedence
    // expression form.
    pub fn expr(&mut self) -> Parsed<Expr> {
        let lhs = self.lor()?;
        match self.peek() {
            Some(Token::Assign) => {
                self.advance();
                let rhs = self.expr()?;
                let span = lhs.span.merge(rhs.span);
                Ok(Expr::new(
                    ExprKind::Assign {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    span,
                ))
            }
            _ => Ok(lhs),
        }
    }

    fn binary<F>(&mut self, mut operand: F, table: &[(Token, BinOp)]) -> Parsed<Expr>
    where
        F: FnMut(&mut Self) -> Parsed<Expr>,
    {
        let mut lhs = operand(self)?;
        'outer: loop {
            for (token, op) in table {
                if self.peek() == Some(*token) {
                    self.advance();
                    let rhs = operand(self)?;
                    let span = lhs.span.merge(rhs.span);
                    lhs = Expr::new(
                        ExprKind::Binary {
                            op: *op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        span,
                    );
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    fn lor(&mut self) -> Parsed<Expr> {
        self.binary(Self::land, &[(Token::LOr, BinOp::LOr)])
    }

    fn land(&mut self) -> Parsed<Expr> {
        self.binary(Self::or, &[(Token::LAnd, BinOp::LAnd)])
    }

    fn or(&mut self) -> Parsed<Expr> {
        self.binary(Self::xor, &[(Token::Or, BinOp::Or)])
    }

    fn xor(&mut self) -> Parsed<Expr> {
        self.binary(Self::and, &[(Token::Xor, BinOp::Xor)])
    }

    fn and(&mut self) -> Parsed<Expr> {
        self.binary(Self::equality, &[(Token::And, BinOp::And)])
    }

    fn equality(&mut self) -> Parsed<Expr> {
        self.binary(
            Self::relational,
            &[(Token::Eq, BinOp::Eq), (Token::Ne, BinOp::Ne)],
        )
    }

    fn relational(&mut self) -> Parsed<Expr> {
        let mut lhs = self.binary(
            Self::additive,
            &[
                (Token::Lt, BinOp::Lt),
                (Token::Gt, BinOp::Gt),
                (Token::Le, BinOp::Le),
                (Token::Ge, BinOp::Ge),
            ],
        )?;
        while self.eat_if(Token::Instanceof).is_some() {
            let ty = self.ty()?;
            let span = lhs.span.merge(ty.span());
            lhs = Expr::new(
                ExprKind::InstanceOf {
                    expr: Box::new(lhs),
                    ty,
                    target: TypeId::UNASSIGNED,
                },
                span,
            );
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Parsed<Expr> {
        self.binary(
            Self::multiplicative,
            &[(Token::Add, BinOp::Add), (Token::Sub, BinOp::Sub)],
        )
    }

    fn multiplicative(&mut self) -> Parsed<Expr> {
        self.binary(
            Self::unary,
            &[
                (Token::Mul, BinOp::Mul),
                (Token::Div, BinOp::Div),
                (Token::Mod, BinOp::Mod),
            ],
        )
    }

    fn unary(&mut self) -> Parsed<Expr> {
        match self.peek() {
            Some(Token::Sub) => {
                let lo = self.advance().unwrap().1;
                // `-2147483648` is a literal, not a negation.
                if let Some(Token::Integer(value)) = self.peek() {
                    let hi = self.advance().unwrap().1;
                    let span = lo.merge(hi);
                    return match i32::try_from(-(value as i64)) {
                        Ok(value) => Ok(Expr::new(ExprKind::Lit(Lit::Int(value)), span)),
                        Err(_) => Err(Error {
                            span,
                            kind: ErrorKind::IntegerOutOfRange,
                        }),
                    };
                }
                let expr = self.unary()?;
                let span = lo.merge(expr.span);
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnOp::Neg,
                        expr: Box::new(expr),
                    },
                    span,
                ))
            }
            Some(Token::Not) => {
                let lo = self.advance().unwrap().1;
                let expr = self.unary()?;
                let span = lo.merge(expr.span);
                Ok(Expr::new(
                    ExprKind::Unary {
                        op: UnOp::Not,
                        expr: Box::new(expr),
                    },
                    span,
                ))
            }
            Some(Token::LParen) => match self.try_cast()? {
                Some(cast) => Ok(cast),
                None => self.postfix(),
            },
            _ => self.postfix(),
        }
    }

    /// Speculatively parses `(Type) UnaryExpression`. A parenthesized
    /// type followed by a token that can begin an operand is a cast;
    /// anything else rolls back to a parenthesized expression.
    fn try_cast(&mut self) -> Parsed<Option<Expr>> {
        let saved = self.pos;
        let lo = match self.eat_if(Token::LParen) {
            Some(lo) => lo,
            None => return Ok(None),
        };

        let primitive = matches!(
            self.peek(),
            Some(Token::Boolean)
                | Some(Token::Byte)
                | Some(Token::Char)
                | Some(Token::Short)
                | Some(Token::Int)
        );

        let ty = match self.ty() {
            Ok(ty) => ty,
            Err(_) => {
                self.pos = saved;
                return Ok(None);
            }
        };

        if self.eat_if(Token::RParen).is_none() {
            self.pos = saved;
            return Ok(None);
        }

        let operand_follows = match self.peek() {
            Some(Token::Identifier(_))
            | Some(Token::Integer(_))
            | Some(Token::Character(_))
            | Some(Token::String(_))
            | Some(Token::True)
            | Some(Token::False)
            | Some(Token::Null)
            | Some(Token::This)
            | Some(Token::New)
            | Some(Token::LParen)
            | Some(Token::Not) => true,
            // `(int) -x` is a cast; `(x) - y` is a subtraction.
            Some(Token::Sub) => primitive || matches!(&ty, Type::Array(_, _)),
            _ => false,
        };

        if !operand_follows {
            self.pos = saved;
            return Ok(None);
        }

        let expr = self.unary()?;
        let span = lo.merge(expr.span);
        Ok(Some(Expr::new(
            ExprKind::Cast {
                ty,
                expr: Box::new(expr),
            },
            span,
        )))
    }

    fn postfix(&mut self) -> Parsed<Expr> {
        let mut expr = self.primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let name = self.identifier()?;
                    if self.peek() == Some(Token::LParen) {
                        let (args, hi) = self.args()?;
                        let span = expr.span.merge(hi);
                        expr = Expr::new(
                            ExprKind::Call {
                                base: Some(Box::new(expr)),
                                name,
                                args,
                                mid: MethodId::ERROR,
                                owner: TypeId::UNASSIGNED,
                                is_static: false,
                            },
                            span,
                        );
                    } else {
                        let span = expr.span.merge(name.span);
                        expr = Expr::new(
                            ExprKind::Field {
                                base: Box::new(expr),
                                name,
                                fid: FieldId::ERROR,
                                owner: TypeId::UNASSIGNED,
                            },
                            span,
                        );
                    }
                }
                Some(Token::LBrack) => {
                    self.advance();
                    let index = self.expr()?;
                    let hi = self.eat(Token::RBrack)?;
                    let span = expr.span.merge(hi);
                    expr = Expr::new(
                        ExprKind::Index {
                            base: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn args(&mut self) -> Parsed<(Vec<Expr>, Span)> {
        self.eat(Token::LParen)?;
        let mut args = Vec::new();
        if let Some(hi) = self.eat_if(Token::RParen) {
            return Ok((args, hi));
        }
        loop {
            args.push(self.expr()?);
            if self.eat_if(Token::Comma).is_none() {
                break;
            }
        }
        let hi = self.eat(Token::RParen)?;
        Ok((args, hi))
    }

    fn primary(&mut self) -> Parsed<Expr> {
        match self.peek() {
            Some(Token::Integer(value)) => {
                let span = self.advance().unwrap().1;
                match i32::try_from(value) {
                    Ok(value) => Ok(Expr::new(ExprKind::Lit(Lit::Int(value)), span)),
                    Err(_) => Err(Error {
                        span,
                        kind: ErrorKind::IntegerOutOfRange,
                    }),
                }
            }
            Some(Token::Character(value)) => {
                let span = self.advance().unwrap().1;
                Ok(Expr::new(ExprKind::Lit(Lit::Char(value)), span))
            }
            Some(Token::String(symbol)) => {
                let span = self.advance().unwrap().1;
                Ok(Expr::new(
                    ExprKind::Lit(Lit::String(symbol, crate::data::ids::StringId(0))),
                    span,
                ))
            }
            Some(Token::True) => {
                let span = self.advance().unwrap().1;
                Ok(Expr::new(ExprKind::Lit(Lit::Bool(true)), span))
            }
            Some(Token::False) => {
                let span = self.advance().unwrap().1;
                Ok(Expr::new(ExprKind::Lit(Lit::Bool(false)), span))
            }
            Some(Token::Null) => {
                let span = self.advance().unwrap().1;
                Ok(Expr::new(ExprKind::Lit(Lit::Null), span))
            }
            Some(Token::This) => {
                let span = self.advance().unwrap().1;
                Ok(Expr::new(ExprKind::This, span))
            }
            Some(Token::LParen) => {
                self.advance();
                let expr = self.expr()?;
                self.eat(Token::RParen)?;
                Ok(expr)
            }
            Some(Token::New) => self.new_expr(),
            Some(Token::Identifier(_)) => {
                let name = self.qualified_name()?;
                if self.peek() == Some(Token::LParen) {
                    // The last segment names the method; anything
                    // before it is the receiver or a static base.
                    let span = name.span;
                    let method = Ident {
                        symbol: *name.parts.last().unwrap(),
                        span: name.span,
                    };
                    let base = if name.parts.len() > 1 {
                        let base_name = QualifiedName {
                            parts: name.parts[..name.parts.len() - 1].to_vec(),
                            span: name.span,
                        };
                        Some(Box::new(Expr::new(ExprKind::Name(base_name), span)))
                    } else {
                        None
                    };
                    let (args, hi) = self.args()?;
                    Ok(Expr::new(
                        ExprKind::Call {
                            base,
                            name: method,
                            args,
                            mid: MethodId::ERROR,
                            owner: TypeId::UNASSIGNED,
                            is_static: false,
                        },
                        span.merge(hi),
                    ))
                } else {
                    let span = name.span;
                    Ok(Expr::new(ExprKind::Name(name), span))
                }
            }
            _ => self.unexpected(),
        }
    }

    // `new` Name `(` Arguments `)` | `new` Type `[` Expression `]`
    fn new_expr(&mut self) -> Parsed<Expr> {
        let lo = self.eat(Token::New)?;

        if let Some((tid, span)) = self.primitive() {
            self.eat(Token::LBrack)?;
            let len = self.expr()?;
            let hi = self.eat(Token::RBrack)?;
            return Ok(Expr::new(
                ExprKind::NewArray {
                    elem: Type::Primitive(tid, span),
                    len: Box::new(len),
                },
                lo.merge(hi),
            ));
        }

        let name = self.qualified_name()?;
        match self.peek() {
            Some(Token::LBrack) => {
                self.advance();
                let len = self.expr()?;
                let hi = self.eat(Token::RBrack)?;
                Ok(Expr::new(
                    ExprKind::NewArray {
                        elem: Type::Reference(name),
                        len: Box::new(len),
                    },
                    lo.merge(hi),
                ))
            }
            Some(Token::LParen) => {
                let (args, hi) = self.args()?;
                Ok(Expr::new(
                    ExprKind::New {
                        ty: name,
                        args,
                        mid: MethodId::ERROR,
                    },
                    lo.merge(hi),
                ))
            }
            _ => self.unexpected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::token::Token;
    use crate::ErrorList;

    fn parse(source: &str) -> CompUnit {
        let mut errors = ErrorList::new();
        let tokens = crate::lex::lex(0, source, &mut errors);
        assert!(!errors.is_fatal(), "lexical errors in test input");
        Parser::new(0, &tokens).comp_unit().expect("syntax error")
    }

    fn parse_err(source: &str) -> Error {
        let mut errors = ErrorList::new();
        let tokens = crate::lex::lex(0, source, &mut errors);
        Parser::new(0, &tokens).comp_unit().unwrap_err()
    }

    #[test]
    fn minimal_class() {
        let unit = parse("package foo; public class Foo { public Foo() {} }");
        assert_eq!(unit.package_name(), "foo");
        assert_eq!(unit.decls.len(), 1);
        assert_eq!(unit.decls[0].kind, TypeKind::Class);
    }

    #[test]
    fn imports() {
        let unit = parse("import java.util.Vector; import java.lang.*; class A {}");
        assert_eq!(unit.imports.len(), 2);
        assert!(!unit.imports[0].wildcard);
        assert_eq!(unit.imports[0].name.qualified(), "java.util.Vector");
        assert!(unit.imports[1].wildcard);
        assert_eq!(unit.imports[1].name.qualified(), "java.lang");
    }

    #[test]
    fn members() {
        let unit = parse(
            "class A {
                public int x = 0;
                protected static boolean flag;
                public A() {}
                public int[] get(int i, char c) { return null; }
                public abstract void go();
            }",
        );
        let members = &unit.decls[0].members;
        assert_eq!(members.len(), 5);
        assert!(matches!(members[0], Member::Field(_)));
        match &members[2] {
            Member::Method(method) => assert!(method.is_constructor()),
            member => panic!("expected constructor, found {:?}", member),
        }
    }

    #[test]
    fn local_decl_vs_expression() {
        let unit = parse(
            "class A { public void f() {
                int x = 1;
                foo.Bar y = null;
                x = 2;
                g();
            } }",
        );
        let body = match &unit.decls[0].members[0] {
            Member::Method(method) => method.body.as_ref().unwrap(),
            member => panic!("expected method, found {:?}", member),
        };
        assert!(matches!(body.stmts[0], Stmt::LocalDecl { .. }));
        assert!(matches!(body.stmts[1], Stmt::LocalDecl { .. }));
        assert!(matches!(body.stmts[2], Stmt::Expr(_)));
        assert!(matches!(body.stmts[3], Stmt::Expr(_)));
    }

    #[test]
    fn precedence() {
        let unit = parse("class A { public int f() { return 1 + 2 * 3; } }");
        let body = match &unit.decls[0].members[0] {
            Member::Method(method) => method.body.as_ref().unwrap(),
            _ => unreachable!(),
        };
        let expr = match &body.stmts[0] {
            Stmt::Return(Some(expr), _) => expr,
            stmt => panic!("expected return, found {:?}", stmt),
        };
        match &expr.kind {
            ExprKind::Binary { op, rhs, .. } => {
                assert_eq!(*op, BinOp::Add);
                assert!(matches!(
                    rhs.kind,
                    ExprKind::Binary { op: BinOp::Mul, .. }
                ));
            }
            kind => panic!("expected binary, found {:?}", kind),
        }
    }

    #[test]
    fn cast_vs_parenthesized() {
        let unit = parse(
            "class A { public void f() {
                int a = (int) 'c';
                int b = (a) - 1;
                Object o = (java.lang.Object) null;
            } }",
        );
        let body = match &unit.decls[0].members[0] {
            Member::Method(method) => method.body.as_ref().unwrap(),
            _ => unreachable!(),
        };
        let init = |index: usize| match &body.stmts[index] {
            Stmt::LocalDecl { init, .. } => init.as_ref().unwrap(),
            stmt => panic!("expected declaration, found {:?}", stmt),
        };
        assert!(matches!(init(0).kind, ExprKind::Cast { .. }));
        assert!(matches!(init(1).kind, ExprKind::Binary { .. }));
        assert!(matches!(init(2).kind, ExprKind::Cast { .. }));
    }

    #[test]
    fn min_int_literal() {
        parse("class A { public int f() { return -2147483648; } }");
        let error = parse_err("class A { public int f() { return 2147483648; } }");
        assert_eq!(error.kind, ErrorKind::IntegerOutOfRange);
    }

    #[test]
    fn instanceof_and_new() {
        let unit = parse(
            "class A { public boolean f(Object o) {
                return o instanceof A[] || new A() instanceof A;
            } }",
        );
        assert_eq!(unit.decls.len(), 1);
    }

    #[test]
    fn unexpected_token() {
        let error = parse_err("class A { public void f() { return }; }");
        assert!(matches!(
            error.kind,
            ErrorKind::UnexpectedToken(Some(Token::RBrace))
        ));
    }
}
