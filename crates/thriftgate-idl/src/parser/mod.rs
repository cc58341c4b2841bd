//! Recursive-descent parser producing an unresolved [`ast::Document`].
//!
//! Annotations, `cpp_include`, `cpp_type`, and `xsd_*` decorations are
//! accepted and discarded. `senum` is rejected outright.

pub(crate) mod ast;
mod lexer;

use ast::{Definition, Document, FieldDecl, FunctionDecl, Literal, TypeRef};
use lexer::{Lexer, Token, TokenKind};

use crate::descriptor::{Requiredness, StructKind};
use crate::error::SyntaxError;

/// Parses one IDL document.
pub(crate) fn parse_document(source: &str) -> Result<Document, SyntaxError> {
    let tokens = Lexer::new(source).tokenize()?;
    let eof = tokens.last().cloned().unwrap_or(Token {
        kind: TokenKind::Eof,
        line: 1,
        column: 1,
    });
    Parser {
        tokens,
        position: 0,
        eof,
    }
    .document()
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
    eof: Token,
}

impl Parser {
    fn document(mut self) -> Result<Document, SyntaxError> {
        let mut document = Document::default();
        loop {
            let token = self.peek().clone();
            let keyword = match &token.kind {
                TokenKind::Eof => return Ok(document),
                TokenKind::Ident(keyword) => keyword.clone(),
                _ => return Err(self.unexpected(&token, "a definition")),
            };
            self.advance();
            match keyword.as_str() {
                "include" => document.includes.push(self.string_literal()?),
                "cpp_include" => {
                    self.string_literal()?;
                }
                "namespace" => {
                    let scope = self.namespace_scope()?;
                    let name = self.identifier()?;
                    document.namespaces.push((scope, name));
                    self.skip_annotations()?;
                }
                "const" => {
                    let ty = self.field_type()?;
                    let name = self.identifier()?;
                    self.expect('=')?;
                    let value = self.literal()?;
                    document
                        .definitions
                        .push(Definition::Const { name, ty, value });
                }
                "typedef" => {
                    let ty = self.field_type()?;
                    let name = self.identifier()?;
                    self.skip_annotations()?;
                    document.definitions.push(Definition::Typedef { name, ty });
                }
                "enum" => document.definitions.push(self.enumeration()?),
                "struct" => document.definitions.push(self.structure(StructKind::Struct)?),
                "union" => document.definitions.push(self.structure(StructKind::Union)?),
                "exception" => document
                    .definitions
                    .push(self.structure(StructKind::Exception)?),
                "service" => document.definitions.push(self.service()?),
                "senum" => {
                    return Err(SyntaxError::new(
                        token.line,
                        token.column,
                        "'senum' is not supported",
                    ));
                }
                other => {
                    return Err(SyntaxError::new(
                        token.line,
                        token.column,
                        format!("unknown keyword '{other}'"),
                    ));
                }
            }
            self.skip_separator();
        }
    }

    fn enumeration(&mut self) -> Result<Definition, SyntaxError> {
        let name = self.identifier()?;
        self.expect('{')?;
        let mut members = Vec::new();
        while !self.eat('}') {
            let member = self.identifier()?;
            let value = if self.eat('=') {
                let token = self.peek().clone();
                let TokenKind::Int(raw) = token.kind else {
                    return Err(self.unexpected(&token, "an integer"));
                };
                self.advance();
                let checked = i32::try_from(raw).map_err(|_| {
                    SyntaxError::new(token.line, token.column, "enum value out of range")
                })?;
                Some(checked)
            } else {
                None
            };
            self.skip_annotations()?;
            self.skip_separator();
            members.push((member, value));
        }
        self.skip_annotations()?;
        Ok(Definition::Enum { name, members })
    }

    fn structure(&mut self, kind: StructKind) -> Result<Definition, SyntaxError> {
        let name = self.identifier()?;
        self.skip_xsd_all();
        self.expect('{')?;
        let fields = self.field_list('}')?;
        self.skip_annotations()?;
        Ok(Definition::Struct { name, kind, fields })
    }

    fn service(&mut self) -> Result<Definition, SyntaxError> {
        let name = self.identifier()?;
        let extends = if self.eat_keyword("extends") {
            Some(self.identifier()?)
        } else {
            None
        };
        self.expect('{')?;
        let mut functions = Vec::new();
        while !self.eat('}') {
            functions.push(self.function()?);
        }
        self.skip_annotations()?;
        Ok(Definition::Service {
            name,
            extends,
            functions,
        })
    }

    fn function(&mut self) -> Result<FunctionDecl, SyntaxError> {
        let oneway = self.eat_keyword("oneway");
        let returns = if self.eat_keyword("void") {
            None
        } else {
            Some(self.field_type()?)
        };
        let name = self.identifier()?;
        self.expect('(')?;
        let args = self.field_list(')')?;
        let throws = if self.eat_keyword("throws") {
            self.expect('(')?;
            self.field_list(')')?
        } else {
            Vec::new()
        };
        self.skip_annotations()?;
        self.skip_separator();
        Ok(FunctionDecl {
            name,
            oneway,
            returns,
            args,
            throws,
        })
    }

    /// Fields up to and including the closing delimiter.
    fn field_list(&mut self, close: char) -> Result<Vec<FieldDecl>, SyntaxError> {
        let mut fields = Vec::new();
        while !self.eat(close) {
            fields.push(self.field()?);
        }
        Ok(fields)
    }

    fn field(&mut self) -> Result<FieldDecl, SyntaxError> {
        let id = match self.peek().kind {
            TokenKind::Int(raw) => {
                let token = self.advance();
                self.expect(':')?;
                let checked = i16::try_from(raw).map_err(|_| {
                    SyntaxError::new(token.line, token.column, "field id out of range")
                })?;
                Some(checked)
            }
            _ => None,
        };
        let requiredness = if self.eat_keyword("required") {
            Requiredness::Required
        } else if self.eat_keyword("optional") {
            Requiredness::Optional
        } else {
            Requiredness::Default
        };
        let ty = self.field_type()?;
        let name = self.identifier()?;
        let default = if self.eat('=') {
            Some(self.literal()?)
        } else {
            None
        };
        self.skip_xsd_attributes();
        self.skip_annotations()?;
        self.skip_separator();
        Ok(FieldDecl {
            id,
            requiredness,
            ty,
            name,
            default,
        })
    }

    fn field_type(&mut self) -> Result<TypeRef, SyntaxError> {
        let name = self.identifier()?;
        let ty = match name.as_str() {
            "bool" => TypeRef::Bool,
            "byte" | "i8" => TypeRef::Byte,
            "i16" => TypeRef::I16,
            "i32" => TypeRef::I32,
            "i64" => TypeRef::I64,
            "double" => TypeRef::Double,
            "string" => TypeRef::String,
            "binary" => TypeRef::Binary,
            "list" => {
                self.skip_cpp_type()?;
                self.expect('<')?;
                let element = self.field_type()?;
                self.expect('>')?;
                TypeRef::List(Box::new(element))
            }
            "set" => {
                self.skip_cpp_type()?;
                self.expect('<')?;
                let element = self.field_type()?;
                self.expect('>')?;
                TypeRef::Set(Box::new(element))
            }
            "map" => {
                self.skip_cpp_type()?;
                self.expect('<')?;
                let key = self.field_type()?;
                self.expect(',')?;
                let value = self.field_type()?;
                self.expect('>')?;
                TypeRef::Map(Box::new(key), Box::new(value))
            }
            _ => TypeRef::Named(name),
        };
        self.skip_annotations()?;
        Ok(ty)
    }

    fn literal(&mut self) -> Result<Literal, SyntaxError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Int(value) => Ok(Literal::Int(value)),
            TokenKind::Double(value) => Ok(Literal::Double(value)),
            TokenKind::Str(value) => Ok(Literal::Str(value)),
            TokenKind::Ident(name) => Ok(Literal::Ident(name)),
            TokenKind::Punct('[') => {
                let mut items = Vec::new();
                while !self.eat(']') {
                    items.push(self.literal()?);
                    self.skip_separator();
                }
                Ok(Literal::List(items))
            }
            TokenKind::Punct('{') => {
                let mut entries = Vec::new();
                while !self.eat('}') {
                    let key = self.literal()?;
                    self.expect(':')?;
                    let value = self.literal()?;
                    self.skip_separator();
                    entries.push((key, value));
                }
                Ok(Literal::Map(entries))
            }
            _ => Err(self.unexpected(&token, "a constant value")),
        }
    }

    fn namespace_scope(&mut self) -> Result<String, SyntaxError> {
        if self.eat('*') {
            return Ok("*".to_owned());
        }
        self.identifier()
    }

    fn identifier(&mut self) -> Result<String, SyntaxError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(&token, "an identifier")),
        }
    }

    fn string_literal(&mut self) -> Result<String, SyntaxError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Str(text) => {
                self.advance();
                Ok(text)
            }
            _ => Err(self.unexpected(&token, "a string literal")),
        }
    }

    /// Discards a balanced `( ... )` annotation block, if present.
    fn skip_annotations(&mut self) -> Result<(), SyntaxError> {
        if !matches!(self.peek().kind, TokenKind::Punct('(')) {
            return Ok(());
        }
        let open = self.advance();
        let mut depth = 1_usize;
        while depth > 0 {
            match self.advance().kind {
                TokenKind::Punct('(') => depth += 1,
                TokenKind::Punct(')') => depth -= 1,
                TokenKind::Eof => {
                    return Err(SyntaxError::new(
                        open.line,
                        open.column,
                        "unterminated annotation",
                    ));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn skip_cpp_type(&mut self) -> Result<(), SyntaxError> {
        if self.eat_keyword("cpp_type") {
            self.string_literal()?;
        }
        Ok(())
    }

    fn skip_xsd_all(&mut self) {
        self.eat_keyword("xsd_all");
    }

    fn skip_xsd_attributes(&mut self) {
        self.eat_keyword("xsd_optional");
        self.eat_keyword("xsd_nillable");
    }

    fn skip_separator(&mut self) {
        if !self.eat(',') {
            self.eat(';');
        }
    }

    fn expect(&mut self, punct: char) -> Result<(), SyntaxError> {
        if self.eat(punct) {
            return Ok(());
        }
        let token = self.peek().clone();
        Err(self.unexpected(&token, &format!("'{punct}'")))
    }

    fn eat(&mut self, punct: char) -> bool {
        if self.peek().kind == TokenKind::Punct(punct) {
            self.advance();
            return true;
        }
        false
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(&self.peek().kind, TokenKind::Ident(name) if name == keyword) {
            self.advance();
            return true;
        }
        false
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&self.eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn unexpected(&self, token: &Token, expected: &str) -> SyntaxError {
        let found = match &token.kind {
            TokenKind::Ident(name) => format!("'{name}'"),
            TokenKind::Int(value) => value.to_string(),
            TokenKind::Double(value) => value.to_string(),
            TokenKind::Str(text) => format!("\"{text}\""),
            TokenKind::Punct(punct) => format!("'{punct}'"),
            TokenKind::Eof => "end of file".to_owned(),
        };
        SyntaxError::new(
            token.line,
            token.column,
            format!("expected {expected}, found {found}"),
        )
    }
}
