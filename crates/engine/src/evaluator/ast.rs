//! Restricted expression interpreter
//!
//! Flow definitions carry author-written conditions like
//! `balance.amount > 0 && account.length() == 8`. These are parsed into a
//! small AST and evaluated against the call's variable bag. The grammar is
//! deliberately closed: literals, dotted variable paths, unary `!`/`-`,
//! the usual comparison/arithmetic/logical operators, and a fixed method
//! set (`length`, `contains`, `startsWith`, `endsWith`, `toString`,
//! `toNumber`). Nothing else is reachable.

use std::fmt;

use ivr_engine_core::state::render_value;
use ivr_engine_core::ExecutionState;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("eval error: {0}")]
    Eval(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    OrOr,
    AndAnd,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    LParen,
    RParen,
    Dot,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Str(s) => write!(f, "'{s}'"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::OrOr => write!(f, "||"),
            Token::AndAnd => write!(f, "&&"),
            Token::EqEq => write!(f, "=="),
            Token::NotEq => write!(f, "!="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Bang => write!(f, "!"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '0'..='9' => {
                let mut lit = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        lit.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let n = lit
                    .parse::<f64>()
                    .map_err(|_| EvalError::Parse(format!("bad number literal '{lit}'")))?;
                tokens.push(Token::Number(n));
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut lit = String::new();
                let mut closed = false;
                for d in chars.by_ref() {
                    if d == quote {
                        closed = true;
                        break;
                    }
                    lit.push(d);
                }
                if !closed {
                    return Err(EvalError::Parse("unterminated string literal".into()));
                }
                tokens.push(Token::Str(lit));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        ident.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(ident));
            }
            '|' => {
                chars.next();
                if chars.next_if_eq(&'|').is_none() {
                    return Err(EvalError::Parse("expected '||'".into()));
                }
                tokens.push(Token::OrOr);
            }
            '&' => {
                chars.next();
                if chars.next_if_eq(&'&').is_none() {
                    return Err(EvalError::Parse("expected '&&'".into()));
                }
                tokens.push(Token::AndAnd);
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_none() {
                    return Err(EvalError::Parse("expected '=='".into()));
                }
                // flow authors also write the strict-equality spelling
                chars.next_if_eq(&'=');
                tokens.push(Token::EqEq);
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    chars.next_if_eq(&'=');
                    tokens.push(Token::NotEq);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            other => {
                return Err(EvalError::Parse(format!("unexpected character '{other}'")));
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Dotted lookup into the variable bag, e.g. `balance.amount`.
    Path(String),
    /// Property access on a computed value (parenthesised or method result).
    Prop(Box<Expr>, String),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Method(Box<Expr>, String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), EvalError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(EvalError::Parse(match self.peek() {
                Some(tok) => format!("expected '{expected}', found '{tok}'"),
                None => format!("expected '{expected}', found end of input"),
            }))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::Ne,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_comparison()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        if self.eat(&Token::Bang) {
            return Ok(Expr::Not(Box::new(self.parse_unary()?)));
        }
        if self.eat(&Token::Minus) {
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_primary()?;
        while self.eat(&Token::Dot) {
            let name = match self.next() {
                Some(Token::Ident(name)) => name,
                other => {
                    return Err(EvalError::Parse(match other {
                        Some(tok) => format!("expected name after '.', found '{tok}'"),
                        None => "expected name after '.'".into(),
                    }))
                }
            };
            if self.eat(&Token::LParen) {
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_or()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                    self.expect(&Token::RParen)?;
                }
                expr = Expr::Method(Box::new(expr), name, args);
            } else if let Expr::Path(path) = expr {
                // extend the dotted path rather than chaining lookups
                expr = Expr::Path(format!("{path}.{name}"));
            } else {
                expr = Expr::Prop(Box::new(expr), name);
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Literal(number_value(n)?)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" | "undefined" => Ok(Expr::Literal(Value::Null)),
                _ => Ok(Expr::Path(name)),
            },
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(tok) => Err(EvalError::Parse(format!("unexpected token '{tok}'"))),
            None => Err(EvalError::Parse("unexpected end of input".into())),
        }
    }
}

/// Parse an expression source string into an AST.
pub fn parse(source: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(EvalError::Parse("empty expression".into()));
    }
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(tok) => Err(EvalError::Parse(format!("trailing input at '{tok}'"))),
    }
}

/// Evaluate an AST against the call's variables. Unknown paths read as
/// `null` rather than failing so authors can test optional values.
pub fn eval(expr: &Expr, state: &ExecutionState) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Path(path) => Ok(state.lookup(path).cloned().unwrap_or(Value::Null)),
        Expr::Prop(base, name) => {
            let value = eval(base, state)?;
            Ok(value.get(name).cloned().unwrap_or(Value::Null))
        }
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, state)?))),
        Expr::Neg(inner) => {
            let n = as_number(&eval(inner, state)?)?;
            number_value(-n)
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, state),
        Expr::Method(recv, name, args) => {
            let recv = eval(recv, state)?;
            let args = args
                .iter()
                .map(|a| eval(a, state))
                .collect::<Result<Vec<_>, _>>()?;
            eval_method(&recv, name, &args)
        }
    }
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    state: &ExecutionState,
) -> Result<Value, EvalError> {
    // logical operators short-circuit before the rhs is evaluated
    match op {
        BinaryOp::Or => {
            if truthy(&eval(lhs, state)?) {
                return Ok(Value::Bool(true));
            }
            return Ok(Value::Bool(truthy(&eval(rhs, state)?)));
        }
        BinaryOp::And => {
            if !truthy(&eval(lhs, state)?) {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(truthy(&eval(rhs, state)?)));
        }
        _ => {}
    }

    let a = eval(lhs, state)?;
    let b = eval(rhs, state)?;
    match op {
        BinaryOp::Eq => Ok(Value::Bool(loose_eq(&a, &b))),
        BinaryOp::Ne => Ok(Value::Bool(!loose_eq(&a, &b))),
        BinaryOp::Lt => Ok(Value::Bool(as_number(&a)? < as_number(&b)?)),
        BinaryOp::Le => Ok(Value::Bool(as_number(&a)? <= as_number(&b)?)),
        BinaryOp::Gt => Ok(Value::Bool(as_number(&a)? > as_number(&b)?)),
        BinaryOp::Ge => Ok(Value::Bool(as_number(&a)? >= as_number(&b)?)),
        BinaryOp::Add => match (as_number(&a), as_number(&b)) {
            (Ok(x), Ok(y)) => number_value(x + y),
            // either side non-numeric means string concatenation
            _ => Ok(Value::String(format!("{}{}", render_value(&a), render_value(&b)))),
        },
        BinaryOp::Sub => number_value(as_number(&a)? - as_number(&b)?),
        BinaryOp::Mul => number_value(as_number(&a)? * as_number(&b)?),
        BinaryOp::Div => {
            let d = as_number(&b)?;
            if d == 0.0 {
                return Err(EvalError::Eval("division by zero".into()));
            }
            number_value(as_number(&a)? / d)
        }
        BinaryOp::Mod => {
            let d = as_number(&b)?;
            if d == 0.0 {
                return Err(EvalError::Eval("modulo by zero".into()));
            }
            number_value(as_number(&a)? % d)
        }
        BinaryOp::Or | BinaryOp::And => unreachable!("handled above"),
    }
}

fn eval_method(recv: &Value, name: &str, args: &[Value]) -> Result<Value, EvalError> {
    match name {
        "length" => {
            let len = match recv {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => {
                    return Err(EvalError::Eval(format!("length() not valid on {other}")))
                }
            };
            number_value(len as f64)
        }
        "contains" => {
            let needle = single_arg(name, args)?;
            match recv {
                Value::Array(items) => Ok(Value::Bool(items.iter().any(|v| loose_eq(v, needle)))),
                other => Ok(Value::Bool(
                    render_value(other).contains(&render_value(needle)),
                )),
            }
        }
        "startsWith" => {
            let prefix = single_arg(name, args)?;
            Ok(Value::Bool(
                render_value(recv).starts_with(&render_value(prefix)),
            ))
        }
        "endsWith" => {
            let suffix = single_arg(name, args)?;
            Ok(Value::Bool(
                render_value(recv).ends_with(&render_value(suffix)),
            ))
        }
        "toString" => Ok(Value::String(render_value(recv))),
        "toNumber" => number_value(as_number(recv)?),
        other => Err(EvalError::Eval(format!("unknown method '{other}'"))),
    }
}

fn single_arg<'a>(name: &str, args: &'a [Value]) -> Result<&'a Value, EvalError> {
    match args {
        [arg] => Ok(arg),
        _ => Err(EvalError::Eval(format!(
            "{name}() takes exactly one argument"
        ))),
    }
}

/// Truthiness follows the rules flow authors expect from the definition
/// format: empty strings, zero and null are false, containers are true.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_number(value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| EvalError::Eval("number out of range".into())),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| EvalError::Eval(format!("'{s}' is not a number"))),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(EvalError::Eval(format!("{other} is not a number"))),
    }
}

fn number_value(n: f64) -> Result<Value, EvalError> {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| EvalError::Eval("result is not a finite number".into()))
}

/// Equality that compares numerically when both sides parse as numbers,
/// otherwise by rendered text. Matches how digits collected as strings are
/// compared against numeric literals in flow definitions.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if let (Ok(x), Ok(y)) = (as_number(a), as_number(b)) {
        return (x - y).abs() < f64::EPSILON;
    }
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        _ => render_value(a) == render_value(b),
    }
}
