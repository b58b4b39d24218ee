//! Kubernetes label selector parsing
//!
//! Selectors are validated locally so a typo fails before any API call is
//! made. The parsed form renders back to the canonical string handed to the
//! API server and can also match a label map directly.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

const MAX_NAME_LEN: usize = 63;
const MAX_PREFIX_LEN: usize = 253;

/// A single clause of a selector
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Requirement {
    Equals { key: String, value: String },
    NotEquals { key: String, value: String },
    In { key: String, values: Vec<String> },
    NotIn { key: String, values: Vec<String> },
    Exists { key: String },
    DoesNotExist { key: String },
}

impl Requirement {
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        match self {
            Requirement::Equals { key, value } => labels.get(key) == Some(value),
            Requirement::NotEquals { key, value } => labels.get(key) != Some(value),
            Requirement::In { key, values } => labels.get(key).is_some_and(|v| values.contains(v)),
            Requirement::NotIn { key, values } => {
                labels.get(key).map_or(true, |v| !values.contains(v))
            }
            Requirement::Exists { key } => labels.contains_key(key),
            Requirement::DoesNotExist { key } => !labels.contains_key(key),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Equals { key, value } => write!(f, "{key}={value}"),
            Requirement::NotEquals { key, value } => write!(f, "{key}!={value}"),
            Requirement::In { key, values } => write!(f, "{key} in ({})", values.join(",")),
            Requirement::NotIn { key, values } => write!(f, "{key} notin ({})", values.join(",")),
            Requirement::Exists { key } => write!(f, "{key}"),
            Requirement::DoesNotExist { key } => write!(f, "!{key}"),
        }
    }
}

/// Conjunction of requirements; the empty selector matches everything
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn everything() -> Self {
        Self::default()
    }

    /// Parse an optional selector flag value; blank means "everything"
    pub fn parse_opt(selector: Option<&str>) -> Result<Self, Error> {
        match selector.map(str::trim) {
            None | Some("") => Ok(Self::everything()),
            Some(s) => s.parse(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for LabelSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| Error::InvalidSelector {
            selector: s.to_string(),
            reason,
        };

        let tokens = lex(s);
        let mut parser = Parser { tokens, pos: 0 };
        let mut requirements = Vec::new();

        if parser.peek().is_none() {
            return Ok(Self::default());
        }

        loop {
            let requirement = parser.requirement().map_err(invalid)?;
            validate(&requirement).map_err(invalid)?;
            requirements.push(requirement);

            match parser.next() {
                None => break,
                Some(Token::Comma) => {
                    if parser.peek().is_none() {
                        return Err(invalid("trailing ','".to_string()));
                    }
                }
                Some(other) => return Err(invalid(format!("unexpected {other} after requirement"))),
            }
        }

        Ok(Self { requirements })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Ident(String),
    Equals,
    DoubleEquals,
    NotEquals,
    Bang,
    OpenParen,
    CloseParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{s:?}"),
            Token::Equals => f.write_str("'='"),
            Token::DoubleEquals => f.write_str("'=='"),
            Token::NotEquals => f.write_str("'!='"),
            Token::Bang => f.write_str("'!'"),
            Token::OpenParen => f.write_str("'('"),
            Token::CloseParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
        }
    }
}

fn is_special(c: char) -> bool {
    matches!(c, '=' | '!' | '(' | ')' | ',')
}

fn lex(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        match c {
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::DoubleEquals);
                } else {
                    tokens.push(Token::Equals);
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::NotEquals);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '(' => {
                chars.next();
                tokens.push(Token::OpenParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::CloseParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            _ => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || is_special(c) {
                        break;
                    }
                    ident.push(c);
                    chars.next();
                }
                tokens.push(Token::Ident(ident));
            }
        }
    }

    tokens
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

    fn requirement(&mut self) -> Result<Requirement, String> {
        match self.next() {
            Some(Token::Bang) => match self.next() {
                Some(Token::Ident(key)) => Ok(Requirement::DoesNotExist { key }),
                Some(other) => Err(format!("expected label key after '!', found {other}")),
                None => Err("expected label key after '!'".to_string()),
            },
            Some(Token::Ident(key)) => self.operator(key),
            Some(other) => Err(format!("expected label key, found {other}")),
            None => Err("expected label key".to_string()),
        }
    }

    fn operator(&mut self, key: String) -> Result<Requirement, String> {
        match self.peek() {
            None | Some(Token::Comma) => Ok(Requirement::Exists { key }),
            Some(Token::Equals) | Some(Token::DoubleEquals) => {
                self.next();
                let value = self.value()?;
                Ok(Requirement::Equals { key, value })
            }
            Some(Token::NotEquals) => {
                self.next();
                let value = self.value()?;
                Ok(Requirement::NotEquals { key, value })
            }
            Some(Token::Ident(op)) if op == "in" || op == "notin" => {
                let negate = op == "notin";
                self.next();
                let values = self.value_set()?;
                if values.is_empty() {
                    return Err(format!(
                        "values set for {key:?} can't be empty for 'in'/'notin'"
                    ));
                }
                Ok(if negate {
                    Requirement::NotIn { key, values }
                } else {
                    Requirement::In { key, values }
                })
            }
            Some(other) => Err(format!("expected operator after {key:?}, found {other}")),
        }
    }

    /// Value after `=`/`!=`; an immediately following `,` or end means ""
    fn value(&mut self) -> Result<String, String> {
        match self.peek() {
            None | Some(Token::Comma) => Ok(String::new()),
            Some(Token::Ident(_)) => match self.next() {
                Some(Token::Ident(v)) => Ok(v),
                _ => Err("expected value".to_string()),
            },
            Some(other) => Err(format!("expected value, found {other}")),
        }
    }

    fn value_set(&mut self) -> Result<Vec<String>, String> {
        match self.next() {
            Some(Token::OpenParen) => {}
            Some(other) => return Err(format!("expected '(', found {other}")),
            None => return Err("expected '('".to_string()),
        }

        let mut values = Vec::new();
        loop {
            match self.next() {
                Some(Token::CloseParen) if values.is_empty() => return Ok(values),
                Some(Token::Ident(v)) => values.push(v),
                Some(other) => return Err(format!("expected value in set, found {other}")),
                None => return Err("unterminated value set".to_string()),
            }
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::CloseParen) => return Ok(values),
                Some(other) => return Err(format!("expected ',' or ')', found {other}")),
                None => return Err("unterminated value set".to_string()),
            }
        }
    }
}

fn validate(requirement: &Requirement) -> Result<(), String> {
    match requirement {
        Requirement::Equals { key, value } | Requirement::NotEquals { key, value } => {
            validate_key(key)?;
            validate_value(value)
        }
        Requirement::In { key, values } | Requirement::NotIn { key, values } => {
            validate_key(key)?;
            values.iter().try_for_each(|v| validate_value(v))
        }
        Requirement::Exists { key } | Requirement::DoesNotExist { key } => validate_key(key),
    }
}

/// `[prefix/]name` where prefix is a DNS subdomain and name a qualified name
fn validate_key(key: &str) -> Result<(), String> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        if !is_dns_subdomain(prefix) {
            return Err(format!(
                "invalid label key {key:?}: prefix must be a lowercase DNS subdomain"
            ));
        }
    }
    if name.is_empty() {
        return Err(format!("invalid label key {key:?}: name part must be non-empty"));
    }
    if !is_qualified_name(name) {
        return Err(format!(
            "invalid label key {key:?}: name must be at most {MAX_NAME_LEN} alphanumeric characters, '-', '_' or '.', starting and ending with an alphanumeric"
        ));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<(), String> {
    if value.is_empty() || is_qualified_name(value) {
        Ok(())
    } else {
        Err(format!(
            "invalid label value {value:?}: must be empty or at most {MAX_NAME_LEN} alphanumeric characters, '-', '_' or '.', starting and ending with an alphanumeric"
        ))
    }
}

fn is_qualified_name(s: &str) -> bool {
    let bytes = s.as_bytes();
    !bytes.is_empty()
        && bytes.len() <= MAX_NAME_LEN
        && bytes[0].is_ascii_alphanumeric()
        && bytes[bytes.len() - 1].is_ascii_alphanumeric()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

fn is_dns_subdomain(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= MAX_PREFIX_LEN
        && s.split('.').all(|label| {
            let bytes = label.as_bytes();
            !bytes.is_empty()
                && bytes.len() <= MAX_NAME_LEN
                && is_lower_alnum(bytes[0])
                && is_lower_alnum(bytes[bytes.len() - 1])
                && bytes.iter().all(|&b| is_lower_alnum(b) || b == b'-')
        })
}

fn is_lower_alnum(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}
