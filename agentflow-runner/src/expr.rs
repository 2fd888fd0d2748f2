//! ABOUTME: Isolated conditional-expression sandbox: tokenizer, recursive-descent parser, evaluator
//! ABOUTME: No function calls, no assignment, no host-object property chains -- identifiers, `.`/`[]`, comparisons, boolean ops, literals only

use agentflow_core::WorkflowContext;
use serde_json::Value;
use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum ExprError {
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("expected {0}")]
    Expected(String),
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),
    #[error("cannot index into a non-object/non-array value")]
    NotIndexable,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    String(String),
    Number(f64),
    Bool(bool),
    Null,
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    And,
    Or,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
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
            '&' if chars.get(i + 1) == Some(&'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Ne);
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '=' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '<' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Le);
                i += 2;
            }
            '<' => {
                tokens.push(Token::Lt);
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Ge);
                i += 2;
            }
            '>' => {
                tokens.push(Token::Gt);
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let mut s = String::new();
                i += 1;
                while i < chars.len() && chars[i] != quote {
                    s.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(ExprError::UnexpectedEnd);
                }
                i += 1; // closing quote
                tokens.push(Token::String(s));
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let slice: String = chars[start..i].iter().collect();
                let n: f64 = slice.parse().map_err(|_| ExprError::UnexpectedChar(c, start))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                i += 1;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                tokens.push(match ident.as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    "null" => Token::Null,
                    _ => Token::Ident(ident),
                });
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

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn expect(&mut self, token: &Token) -> Result<(), ExprError> {
        if self.peek() == Some(token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(ExprError::Expected(format!("{token:?}")))
        }
    }

    fn parse_or(&mut self, root: &Value) -> Result<Value, ExprError> {
        let mut left = self.parse_and(root)?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let left_truthy = truthy(&left);
            let right = self.parse_and(root)?;
            left = Value::Bool(left_truthy || truthy(&right));
        }
        Ok(left)
    }

    fn parse_and(&mut self, root: &Value) -> Result<Value, ExprError> {
        let mut left = self.parse_not(root)?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let left_truthy = truthy(&left);
            let right = self.parse_not(root)?;
            left = Value::Bool(left_truthy && truthy(&right));
        }
        Ok(left)
    }

    fn parse_not(&mut self, root: &Value) -> Result<Value, ExprError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let value = self.parse_not(root)?;
            return Ok(Value::Bool(!truthy(&value)));
        }
        self.parse_cmp(root)
    }

    fn parse_cmp(&mut self, root: &Value) -> Result<Value, ExprError> {
        let left = self.parse_primary(root)?;
        let op = match self.peek() {
            Some(Token::Eq) => Some(Token::Eq),
            Some(Token::Ne) => Some(Token::Ne),
            Some(Token::Lt) => Some(Token::Lt),
            Some(Token::Le) => Some(Token::Le),
            Some(Token::Gt) => Some(Token::Gt),
            Some(Token::Ge) => Some(Token::Ge),
            _ => None,
        };
        let Some(op) = op else { return Ok(left) };
        self.pos += 1;
        let right = self.parse_primary(root)?;
        Ok(Value::Bool(match op {
            Token::Eq => values_equal(&left, &right),
            Token::Ne => !values_equal(&left, &right),
            Token::Lt => compare(&left, &right)?.is_lt(),
            Token::Le => compare(&left, &right)?.is_le(),
            Token::Gt => compare(&left, &right)?.is_gt(),
            Token::Ge => compare(&left, &right)?.is_ge(),
            _ => unreachable!(),
        }))
    }

    fn parse_primary(&mut self, root: &Value) -> Result<Value, ExprError> {
        match self.advance() {
            Some(Token::String(s)) => Ok(Value::String(s)),
            Some(Token::Number(n)) => Ok(serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)),
            Some(Token::Bool(b)) => Ok(Value::Bool(b)),
            Some(Token::Null) => Ok(Value::Null),
            Some(Token::LParen) => {
                let inner = self.parse_or(root)?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => self.parse_accessor_chain(root, &name),
            Some(other) => Err(ExprError::Expected(format!("a value, found {other:?}"))),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn parse_accessor_chain(&mut self, root: &Value, first: &str) -> Result<Value, ExprError> {
        let Some(mut current) = root.get(first).cloned() else {
            return Err(ExprError::UnknownIdentifier(first.to_string()));
        };
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let Some(Token::Ident(field)) = self.advance() else {
                        return Err(ExprError::Expected("identifier after '.'".into()));
                    };
                    current = current.get(&field).cloned().ok_or(ExprError::NotIndexable)?;
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_primary(root)?;
                    self.expect(&Token::RBracket)?;
                    current = match &index {
                        Value::String(key) => current.get(key).cloned().ok_or(ExprError::NotIndexable)?,
                        Value::Number(n) => {
                            let idx = n.as_u64().ok_or(ExprError::NotIndexable)? as usize;
                            current.get(idx).cloned().ok_or(ExprError::NotIndexable)?
                        }
                        _ => return Err(ExprError::NotIndexable),
                    };
                }
                _ => break,
            }
        }
        Ok(current)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b
}

fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering, ExprError> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .ok_or(ExprError::NotIndexable),
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(ExprError::NotIndexable),
    }
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Exposes the three read-only namespaces a conditional expression may
/// reference -- `stepOutputs`, `userInput`, `files` -- as top-level objects
/// on the evaluation root, matching the context view documented for the
/// conditional sandbox. `files` is keyed by path.
pub fn evaluate(expression: &str, context: &WorkflowContext) -> Result<bool, ExprError> {
    let step_outputs: serde_json::Map<String, Value> = context
        .step_outputs
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let user_input: serde_json::Map<String, Value> = context
        .user_input
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let files: serde_json::Map<String, Value> = context
        .files
        .iter()
        .map(|f| (f.path.to_string_lossy().into_owned(), serde_json::to_value(f).unwrap_or(Value::Null)))
        .collect();

    let mut root = serde_json::Map::new();
    root.insert("stepOutputs".to_string(), Value::Object(step_outputs));
    root.insert("userInput".to_string(), Value::Object(user_input));
    root.insert("files".to_string(), Value::Object(files));

    let tokens = tokenize(expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let result = parser.parse_or(&Value::Object(root))?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::Expected("end of expression".into()));
    }
    Ok(truthy(&result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx_with(key: &str, value: Value) -> WorkflowContext {
        let mut ctx = WorkflowContext::new(PathBuf::from("."));
        ctx.step_outputs.insert(key.to_string(), value);
        ctx
    }

    #[test]
    fn literal_booleans() {
        let ctx = WorkflowContext::new(PathBuf::from("."));
        assert!(evaluate("true", &ctx).unwrap());
        assert!(!evaluate("false", &ctx).unwrap());
        assert!(evaluate("!false", &ctx).unwrap());
    }

    #[test]
    fn identifier_lookup_and_comparison() {
        let ctx = ctx_with("count", Value::from(3));
        assert!(evaluate("stepOutputs.count > 2", &ctx).unwrap());
        assert!(!evaluate("stepOutputs.count > 10", &ctx).unwrap());
        assert!(evaluate("stepOutputs.count == 3", &ctx).unwrap());
    }

    #[test]
    fn dot_and_bracket_access() {
        let ctx = ctx_with("result", serde_json::json!({"status": "ok", "items": [1, 2, 3]}));
        assert!(evaluate("stepOutputs.result.status == \"ok\"", &ctx).unwrap());
        assert!(evaluate("stepOutputs[\"result\"][\"items\"][1] == 2", &ctx).unwrap());
    }

    #[test]
    fn boolean_combinators_short_circuit_correctly() {
        let ctx = ctx_with("flag", Value::Bool(true));
        assert!(evaluate("stepOutputs.flag && true", &ctx).unwrap());
        assert!(evaluate("!stepOutputs.flag || true", &ctx).unwrap());
    }

    #[test]
    fn unknown_identifier_is_an_error_not_falsy() {
        let ctx = WorkflowContext::new(PathBuf::from("."));
        assert!(evaluate("missing == \"x\"", &ctx).is_err());
    }

    #[test]
    fn user_input_and_files_are_reachable_under_their_own_namespaces() {
        let mut ctx = WorkflowContext::new(PathBuf::from("."));
        ctx.user_input.insert("target".to_string(), Value::from("left"));
        ctx.files.push(agentflow_core::FileRecord {
            path: PathBuf::from("left"),
            content: Some("x".into()),
            language: None,
            original_content: None,
        });
        assert!(evaluate("userInput.target == \"left\"", &ctx).unwrap());
        assert!(evaluate("files.left.content == \"x\"", &ctx).unwrap());
    }

    #[test]
    fn scenario_c_style_branch_selects_on_step_output() {
        let ctx = ctx_with("pick", Value::from("left"));
        assert!(evaluate("stepOutputs.pick == \"left\"", &ctx).unwrap());
        assert!(!evaluate("stepOutputs.pick == \"right\"", &ctx).unwrap());
    }

    #[test]
    fn trailing_garbage_is_rejected() {
        let ctx = WorkflowContext::new(PathBuf::from("."));
        assert!(evaluate("true true", &ctx).is_err());
    }
}
