// Linear expression parsing for constraint and objective strings.
//
// Grammar:
//   expr   := term (('+' | '-') term)*
//   term   := factor ('*' factor)*
//   factor := NUMBER | IDENT | '(' expr ')' | '-' factor | '+' factor
//
// Every well-formed expression reduces to `constant + Σ coefficient·variable`.
// A product of two non-constant operands is rejected as non-linear.

use crate::domain::models::{Model, ValidationError};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExprError {
    #[error("expression is empty")]
    Empty,
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("product of two non-constant terms is not linear")]
    NonLinear,
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
}

/// A parsed linear expression: `constant + Σ coefficient·variable`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    pub constant: f64,
    coefficients: HashMap<String, f64>,
}

impl LinearExpr {
    /// Parse an expression string into linear form.
    pub fn parse(input: &str) -> Result<Self, ExprError> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        match parser.peek() {
            None => Ok(expr),
            Some(token) => Err(ExprError::UnexpectedToken(token.to_string())),
        }
    }

    fn constant(value: f64) -> Self {
        Self {
            constant: value,
            coefficients: HashMap::new(),
        }
    }

    fn variable(name: String) -> Self {
        let mut coefficients = HashMap::new();
        coefficients.insert(name, 1.0);
        Self {
            constant: 0.0,
            coefficients,
        }
    }

    fn is_constant(&self) -> bool {
        self.coefficients.is_empty()
    }

    fn add(mut self, other: Self) -> Self {
        self.constant += other.constant;
        for (name, coefficient) in other.coefficients {
            *self.coefficients.entry(name).or_insert(0.0) += coefficient;
        }
        self
    }

    fn neg(mut self) -> Self {
        self.constant = -self.constant;
        for coefficient in self.coefficients.values_mut() {
            *coefficient = -*coefficient;
        }
        self
    }

    fn sub(self, other: Self) -> Self {
        self.add(other.neg())
    }

    fn mul(self, other: Self) -> Result<Self, ExprError> {
        let (scalar, mut linear) = if self.is_constant() {
            (self.constant, other)
        } else if other.is_constant() {
            (other.constant, self)
        } else {
            return Err(ExprError::NonLinear);
        };
        linear.constant *= scalar;
        for coefficient in linear.coefficients.values_mut() {
            *coefficient *= scalar;
        }
        Ok(linear)
    }

    /// Coefficient of a variable, zero when it does not occur.
    pub fn coefficient(&self, name: &str) -> f64 {
        self.coefficients.get(name).copied().unwrap_or(0.0)
    }

    /// Names of the variables occurring in the expression.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.coefficients.keys().map(String::as_str)
    }

    /// Fail on the first variable not accepted by `is_known`.
    pub fn check_variables<F>(&self, is_known: F) -> Result<(), ExprError>
    where
        F: Fn(&str) -> bool,
    {
        for name in self.coefficients.keys() {
            if !is_known(name) {
                return Err(ExprError::UnknownVariable(name.clone()));
            }
        }
        Ok(())
    }

    /// Evaluate the expression with the given variable values.
    pub fn evaluate<F>(&self, value_of: F) -> f64
    where
        F: Fn(&str) -> f64,
    {
        self.constant
            + self
                .coefficients
                .iter()
                .map(|(name, coefficient)| coefficient * value_of(name))
                .sum::<f64>()
    }
}

/// Check that the objective and every constraint of a linear model parse
/// as linear expressions over the declared variables.
pub(crate) fn validate_linear(model: &Model) -> Result<(), ValidationError> {
    let known = |name: &str| model.variable(name).is_some();

    LinearExpr::parse(&model.objective.expression)
        .and_then(|expr| expr.check_variables(&known))
        .map_err(|e| ValidationError::ObjectiveExpression {
            reason: e.to_string(),
        })?;

    for constraint in &model.constraints {
        LinearExpr::parse(&constraint.expression)
            .and_then(|expr| expr.check_variables(&known))
            .map_err(|e| ValidationError::ConstraintExpression {
                name: constraint.name.clone(),
                reason: e.to_string(),
            })?;
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Ident(s) => write!(f, "{s}"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                // Exponent part, only when it is actually followed by digits.
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        i = j;
                        while i < bytes.len() && bytes[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text = &input[start..i];
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ExprError::InvalidNumber(text.to_string()))?;
                tokens.push(Token::Number(value));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(input[start..i].to_string()));
            }
            other => return Err(ExprError::UnexpectedChar(other, i)),
        }
    }

    Ok(tokens)
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
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<LinearExpr, ExprError> {
        let mut acc = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    acc = acc.add(self.term()?);
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    acc = acc.sub(self.term()?);
                }
                _ => return Ok(acc),
            }
        }
    }

    fn term(&mut self) -> Result<LinearExpr, ExprError> {
        let mut acc = self.factor()?;
        while self.peek() == Some(&Token::Star) {
            self.pos += 1;
            acc = acc.mul(self.factor()?)?;
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<LinearExpr, ExprError> {
        match self.next() {
            Some(Token::Number(value)) => Ok(LinearExpr::constant(value)),
            Some(Token::Ident(name)) => Ok(LinearExpr::variable(name)),
            Some(Token::Minus) => Ok(self.factor()?.neg()),
            Some(Token::Plus) => self.factor(),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    Some(token) => Err(ExprError::UnexpectedToken(token.to_string())),
                    None => Err(ExprError::UnexpectedEnd),
                }
            }
            Some(token) => Err(ExprError::UnexpectedToken(token.to_string())),
            None => Err(ExprError::UnexpectedEnd),
        }
    }
}
