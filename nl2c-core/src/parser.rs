use crate::ast::{Operand, RawEquation, RawNetlist, TypedVar};
use crate::error::CoreError;
use crate::lexer::{Token, TokenKind, lex};

/// Parses netlist source text into a [`RawNetlist`].
///
/// ```text
/// netlist      := "INPUT" varlist "OUTPUT" varlist "VAR" typedvarlist "IN" eq+
/// varlist      := (name ("," name)*)? ","?
/// typedvarlist := typedvar ("," typedvar)* ","?
/// typedvar     := name (":" width)?
/// eq           := name "=" opcode? operand+
/// ```
pub fn parse(input: &str) -> Result<RawNetlist, CoreError> {
    let tokens = lex(input)?;
    let mut parser = Parser {
        tokens: &tokens,
        position: 0,
    };
    parser.netlist()
}

struct Parser<'t> {
    tokens: &'t [Token],
    position: usize,
}

impl<'t> Parser<'t> {
    fn netlist(&mut self) -> Result<RawNetlist, CoreError> {
        self.expect(TokenKind::Input, "INPUT")?;
        let inputs = self.varlist()?;
        self.expect(TokenKind::Output, "OUTPUT")?;
        let outputs = self.varlist()?;
        self.expect(TokenKind::Var, "VAR")?;
        let vars = self.typedvarlist()?;
        self.expect(TokenKind::In, "IN")?;

        let mut equations = Vec::new();
        while !matches!(self.peek().kind, TokenKind::Eof) {
            equations.push(self.equation()?);
        }
        if equations.is_empty() {
            return Err(self.error("expected at least one equation after IN"));
        }

        Ok(RawNetlist {
            inputs,
            outputs,
            vars,
            equations,
        })
    }

    fn varlist(&mut self) -> Result<Vec<String>, CoreError> {
        let mut names = Vec::new();
        while let TokenKind::Ident(name) = &self.peek().kind {
            names.push(name.clone());
            self.position += 1;
            if !self.eat(&TokenKind::Comma) {
                return Ok(names);
            }
        }
        if names.is_empty() {
            self.eat(&TokenKind::Comma);
        }
        Ok(names)
    }

    fn typedvarlist(&mut self) -> Result<Vec<TypedVar>, CoreError> {
        let mut vars = Vec::new();
        while let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            self.position += 1;
            let width = if self.eat(&TokenKind::Colon) {
                match self.peek().kind {
                    TokenKind::Number { value, .. } => {
                        self.position += 1;
                        Some(value)
                    }
                    _ => return Err(self.error(&format!("expected a width after `{name}:`"))),
                }
            } else {
                None
            };
            vars.push(TypedVar { name, width });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        if vars.is_empty() {
            return Err(self.error("expected at least one variable after VAR"));
        }
        Ok(vars)
    }

    fn equation(&mut self) -> Result<RawEquation, CoreError> {
        let token = self.peek().clone();
        let TokenKind::Ident(target) = token.kind else {
            return Err(self.error("expected an equation `name = ...`"));
        };
        self.position += 1;
        self.expect(TokenKind::Equal, "'='")?;

        let opcode = match self.peek().kind {
            TokenKind::Opcode(op) => {
                self.position += 1;
                Some(op)
            }
            _ => None,
        };

        let mut operands = Vec::new();
        loop {
            match &self.peek().kind {
                // `name =` starts the next equation.
                TokenKind::Ident(_) if self.peek_next_is(&TokenKind::Equal) => break,
                TokenKind::Ident(name) => operands.push(Operand::Name(name.clone())),
                TokenKind::Number { value, width } => operands.push(Operand::Literal {
                    value: *value,
                    width: *width,
                }),
                _ => break,
            }
            self.position += 1;
        }
        if operands.is_empty() {
            return Err(self.error(&format!("equation for `{target}` has no operand")));
        }

        Ok(RawEquation {
            target,
            opcode,
            operands,
            line: token.line,
        })
    }

    fn peek(&self) -> &'t Token {
        // The token stream always ends with Eof.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn peek_next_is(&self, kind: &TokenKind) -> bool {
        self.tokens
            .get(self.position + 1)
            .is_some_and(|token| &token.kind == kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.peek().kind == kind {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), CoreError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn error(&self, message: &str) -> CoreError {
        let token = self.peek();
        CoreError::ParseError {
            line: token.line,
            column: token.column,
            message: message.to_string(),
        }
    }
}
