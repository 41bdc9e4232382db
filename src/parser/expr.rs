use crate::ast::{BinOp, Expr, Token};
use crate::error::Result;
use crate::lexer::LexMode;

use super::Parser;

const MODE: LexMode = LexMode::Expression;

impl Parser<'_> {
    /// Parses one untyped eval/where expression starting at the cursor.
    pub(crate) fn parse_expression(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;

        loop {
            let op = match self.peek(MODE)? {
                Token::Or => BinOp::Or,
                Token::Xor => BinOp::Xor,
                _ => break,
            };
            self.next(MODE)?;
            let right = self.parse_and()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;

        while self.check(MODE, &Token::And)? {
            self.next(MODE)?;
            let right = self.parse_not()?;

            left = Expr::BinaryOp {
                op: BinOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.check(MODE, &Token::Not)? {
            self.next(MODE)?;
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_concat()?;

        let op = match self.peek(MODE)? {
            Token::Eq | Token::EqEq => BinOp::Equal,
            Token::NotEq => BinOp::NotEqual,
            Token::Lt => BinOp::LessThan,
            Token::Gt => BinOp::GreaterThan,
            Token::LtEq => BinOp::LessEqual,
            Token::GtEq => BinOp::GreaterEqual,
            token if token.is_word("in") => {
                self.next(MODE)?;
                let list = self.parse_paren_list()?;
                return Ok(Expr::In {
                    value: Box::new(left),
                    list,
                });
            }
            _ => return Ok(left),
        };

        self.next(MODE)?;
        let right = self.parse_concat()?;
        Ok(Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_concat(&mut self) -> Result<Expr> {
        let mut left = self.parse_additive()?;

        while self.check(MODE, &Token::Dot)? {
            self.next(MODE)?;
            let right = self.parse_additive()?;

            left = Expr::BinaryOp {
                op: BinOp::Concat,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;

        loop {
            let op = match self.peek(MODE)? {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Subtract,
                _ => break,
            };
            self.next(MODE)?;
            let right = self.parse_multiplicative()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let op = match self.peek(MODE)? {
                Token::Star => BinOp::Multiply,
                Token::Slash => BinOp::Divide,
                Token::Percent => BinOp::Modulo,
                _ => break,
            };
            self.next(MODE)?;
            let right = self.parse_unary()?;

            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    /// `-x` is read as `0 - x`.
    fn parse_unary(&mut self) -> Result<Expr> {
        if self.check(MODE, &Token::Minus)? {
            self.next(MODE)?;
            let operand = self.parse_unary()?;
            return Ok(Expr::BinaryOp {
                op: BinOp::Subtract,
                left: Box::new(Expr::Number("0".to_string())),
                right: Box::new(operand),
            });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.next(MODE)? {
            Token::Number(n) => Ok(Expr::Number(n)),
            Token::Quoted(s) => Ok(Expr::String(s)),
            Token::FieldRef(name) => Ok(Expr::Field(name)),
            Token::Word(word) => {
                if self.check(MODE, &Token::LParen)? {
                    let args = self.parse_paren_list()?;
                    return Ok(Expr::Call {
                        name: word.to_ascii_lowercase(),
                        args,
                    });
                }
                if word.eq_ignore_ascii_case("true") {
                    Ok(Expr::Boolean(true))
                } else if word.eq_ignore_ascii_case("false") {
                    Ok(Expr::Boolean(false))
                } else {
                    Ok(Expr::Field(word))
                }
            }
            Token::LParen => {
                let expr = self.parse_expression()?;
                self.expect(MODE, Token::RParen)?;
                Ok(expr)
            }
            other => Err(self.unexpected(other, "an expression")),
        }
    }

    /// `( expr, expr, ... )`, possibly empty.
    fn parse_paren_list(&mut self) -> Result<Vec<Expr>> {
        self.expect(MODE, Token::LParen)?;
        let mut items = Vec::new();

        if self.check(MODE, &Token::RParen)? {
            self.next(MODE)?;
            return Ok(items);
        }

        loop {
            items.push(self.parse_expression()?);
            match self.next(MODE)? {
                Token::Comma => continue,
                Token::RParen => return Ok(items),
                other => return Err(self.unexpected(other, "',' or ')'")),
            }
        }
    }
}
