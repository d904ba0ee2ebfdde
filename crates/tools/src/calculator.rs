//! Calculator tool: evaluates numeric expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `^`, parentheses, unary minus, decimal
//! numbers and the functions `sqrt(x)` and `pow(a, b)`. Input is checked
//! against a fixed character set first, then parsed by recursive descent.
//! Nothing is ever handed to a general-purpose evaluator.

use async_trait::async_trait;
use toolrelay_core::error::ToolError;
use toolrelay_core::tool::{Tool, ToolResult};

/// Longest expression accepted.
const MAX_EXPRESSION_LEN: usize = 256;

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Performs mathematical calculations. Supports basic arithmetic, exponents, and common math functions."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The mathematical expression to evaluate (e.g., '2 + 2', '10 * 5', 'sqrt(16)')"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let expr = arguments["expression"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'expression' argument".into()))?;

        match evaluate(expr) {
            Ok(value) => Ok(ToolResult::ok(format!(
                "Calculation result: {} = {}",
                expr.trim(),
                format_number(value)
            ))),
            Err(e) => Ok(ToolResult::failed(format!("Error calculating expression: {e}"))),
        }
    }
}

/// Render a result, dropping the fractional part of integral values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ── Recursive-descent expression evaluator ────────────────────────────────

/// Evaluate a mathematical expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    sanitize(expr)?;
    let tokens = tokenize(expr)?;
    let mut parser = Parser::new(&tokens);
    let result = parser.parse_expr()?;
    if let Some(tok) = parser.peek() {
        return Err(format!("Unexpected token at position {}: {}", parser.pos, tok));
    }
    if !result.is_finite() {
        return Err("Result is not a finite number".into());
    }
    Ok(result)
}

fn sanitize(expr: &str) -> Result<(), String> {
    if expr.len() > MAX_EXPRESSION_LEN {
        return Err(format!("Expression longer than {MAX_EXPRESSION_LEN} characters"));
    }
    match expr.chars().find(|c| !is_allowed(*c)) {
        Some(c) => Err(format!("Unsupported character: '{c}'")),
        None => Ok(()),
    }
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_digit()
        || c.is_ascii_alphabetic()
        || c.is_ascii_whitespace()
        || matches!(c, '+' | '-' | '*' | '/' | '^' | '(' | ')' | '.' | ',')
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Comma,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Ident(name) => write!(f, "{name}"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Caret => f.write_str("^"),
            Token::Comma => f.write_str(","),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            c if c.is_ascii_whitespace() => i += 1,
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' => { tokens.push(Token::Star); i += 1; }
            '/' => { tokens.push(Token::Slash); i += 1; }
            '^' => { tokens.push(Token::Caret); i += 1; }
            ',' => { tokens.push(Token::Comma); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let num_str: String = chars[start..i].iter().collect();
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("Invalid number: {num_str}"))?;
                tokens.push(Token::Number(num));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphanumeric() {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push(Token::Ident(name.to_ascii_lowercase()));
            }
            c => return Err(format!("Unexpected character: '{c}'")),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, expected: Token) -> Result<(), String> {
        match self.consume() {
            Some(tok) if *tok == expected => Ok(()),
            Some(tok) => Err(format!("Expected '{expected}', found '{tok}'")),
            None => Err(format!("Expected '{expected}' before end of expression")),
        }
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut left = self.parse_term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.consume();
                    left += self.parse_term()?;
                }
                Token::Minus => {
                    self.consume();
                    left -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term = unary (('*' | '/') unary)*
    fn parse_term(&mut self) -> Result<f64, String> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.consume();
                    left *= self.parse_unary()?;
                }
                Token::Slash => {
                    self.consume();
                    let right = self.parse_unary()?;
                    if right == 0.0 {
                        return Err("Division by zero".into());
                    }
                    left /= right;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // unary = ('-' | '+') unary | power
    fn parse_unary(&mut self) -> Result<f64, String> {
        match self.peek() {
            Some(Token::Minus) => {
                self.consume();
                Ok(-self.parse_unary()?)
            }
            Some(Token::Plus) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    // power = primary ('^' unary)?   (right-associative)
    fn parse_power(&mut self) -> Result<f64, String> {
        let base = self.parse_primary()?;
        if let Some(Token::Caret) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    // primary = NUMBER | '(' expr ')' | IDENT '(' expr (',' expr)* ')'
    fn parse_primary(&mut self) -> Result<f64, String> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(*n),
            Some(Token::LParen) => {
                let val = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(val)
            }
            Some(Token::Ident(name)) => {
                self.expect(Token::LParen)?;
                let mut args = vec![self.parse_expr()?];
                while let Some(Token::Comma) = self.peek() {
                    self.consume();
                    args.push(self.parse_expr()?);
                }
                self.expect(Token::RParen)?;
                apply_function(name, &args)
            }
            Some(tok) => Err(format!("Unexpected token: '{tok}'")),
            None => Err("Unexpected end of expression".into()),
        }
    }
}

fn apply_function(name: &str, args: &[f64]) -> Result<f64, String> {
    match (name, args) {
        ("sqrt", [x]) => {
            if *x < 0.0 {
                Err("Square root of a negative number".into())
            } else {
                Ok(x.sqrt())
            }
        }
        ("pow", [base, exponent]) => Ok(base.powf(*exponent)),
        ("sqrt", _) => Err(format!("sqrt takes 1 argument, got {}", args.len())),
        ("pow", _) => Err(format!("pow takes 2 arguments, got {}", args.len())),
        _ => Err(format!("Unknown function: {name}")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
