//! Event query language.
//!
//! A query is one or more conditions joined by `AND`:
//!
//! ```text
//! tm.event = 'Tx' AND tx.height >= 5 AND transfer.sender EXISTS
//! ```
//!
//! Supported operators: `=`, `<`, `<=`, `>`, `>=`, `CONTAINS`, `EXISTS`.
//! Operands are single-quoted strings or numbers. A condition matches when
//! any value recorded under its key satisfies it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use tessel_types::event::{EVENT_TX, EVENT_TYPE_KEY, TX_HASH_KEY};
use tessel_types::{Tags, TxHash};

use crate::QueryError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    Exists,
}

impl Operator {
    fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Contains => "CONTAINS",
            Operator::Exists => "EXISTS",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Str(String),
    /// The raw text is kept so the query renders exactly as written.
    Number { value: f64, raw: String },
    None,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub key: String,
    pub op: Operator,
    pub operand: Operand,
}

impl Condition {
    fn matches(&self, tags: &Tags) -> bool {
        let Some(values) = tags.get(&self.key) else {
            return false;
        };
        if self.op == Operator::Exists {
            return true;
        }
        values.iter().any(|value| self.matches_value(value))
    }

    fn matches_value(&self, value: &str) -> bool {
        match (&self.op, &self.operand) {
            (Operator::Eq, Operand::Str(s)) => value == s,
            (Operator::Contains, Operand::Str(s)) => value.contains(s.as_str()),
            (op, Operand::Number { value: n, .. }) => {
                let Ok(v) = value.parse::<f64>() else {
                    return false;
                };
                match op {
                    Operator::Eq => v == *n,
                    Operator::Lt => v < *n,
                    Operator::Le => v <= *n,
                    Operator::Gt => v > *n,
                    Operator::Ge => v >= *n,
                    _ => false,
                }
            }
            // Ordering against strings is lexical.
            (Operator::Lt, Operand::Str(s)) => value < s.as_str(),
            (Operator::Le, Operand::Str(s)) => value <= s.as_str(),
            (Operator::Gt, Operand::Str(s)) => value > s.as_str(),
            (Operator::Ge, Operand::Str(s)) => value >= s.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Operand::Str(s) => write!(f, "{} {} '{}'", self.key, self.op.as_str(), s),
            Operand::Number { raw, .. } => write!(f, "{} {} {}", self.key, self.op.as_str(), raw),
            Operand::None => write!(f, "{} {}", self.key, self.op.as_str()),
        }
    }
}

/// A parsed query. Two queries are equal when their canonical renderings
/// are equal, which is also how the bus keys subscriptions.
#[derive(Clone, Debug)]
pub struct Query {
    conditions: Vec<Condition>,
    canonical: String,
}

impl Query {
    pub fn parse(input: &str) -> Result<Self, QueryError> {
        let conditions = Parser::new(input).parse()?;
        Ok(Self::from_conditions(conditions))
    }

    /// Query matching the inclusion event of one transaction.
    pub fn tx_for(hash: &TxHash) -> Self {
        Self::from_conditions(vec![
            Condition {
                key: EVENT_TYPE_KEY.to_string(),
                op: Operator::Eq,
                operand: Operand::Str(EVENT_TX.to_string()),
            },
            Condition {
                key: TX_HASH_KEY.to_string(),
                op: Operator::Eq,
                operand: Operand::Str(hash.to_string()),
            },
        ])
    }

    fn from_conditions(conditions: Vec<Condition>) -> Self {
        let canonical = conditions
            .iter()
            .map(Condition::to_string)
            .collect::<Vec<_>>()
            .join(" AND ");
        Self {
            conditions,
            canonical,
        }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn matches(&self, tags: &Tags) -> bool {
        self.conditions.iter().all(|c| c.matches(tags))
    }
}

impl PartialEq for Query {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Query {}

impl Hash for Query {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

impl FromStr for Query {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn unexpected(&self, expected: &'static str) -> QueryError {
        QueryError::Unexpected {
            pos: self.pos,
            expected,
            found: self.rest().chars().take(16).collect(),
        }
    }

    /// Consume `kw` if it appears next as a whole word.
    fn eat_keyword(&mut self, kw: &str) -> bool {
        let rest = self.rest();
        let whole_word = rest
            .get(kw.len()..)
            .and_then(|after| after.chars().next())
            .map_or(true, |c| !is_key_char(c));
        if rest.starts_with(kw) && whole_word {
            self.pos += kw.len();
            true
        } else {
            false
        }
    }

    fn parse(mut self) -> Result<Vec<Condition>, QueryError> {
        self.skip_ws();
        if self.at_end() {
            return Err(QueryError::Empty);
        }
        let mut conditions = Vec::new();
        loop {
            conditions.push(self.parse_condition()?);
            self.skip_ws();
            if self.at_end() {
                return Ok(conditions);
            }
            if !self.eat_keyword("AND") {
                return Err(self.unexpected("AND"));
            }
            self.skip_ws();
        }
    }

    fn parse_condition(&mut self) -> Result<Condition, QueryError> {
        let key = self.parse_key()?;
        self.skip_ws();
        let op = self.parse_operator()?;
        let operand = if op == Operator::Exists {
            Operand::None
        } else {
            self.skip_ws();
            self.parse_operand()?
        };
        if op == Operator::Contains && !matches!(operand, Operand::Str(_)) {
            return Err(self.unexpected("string operand for CONTAINS"));
        }
        Ok(Condition { key, op, operand })
    }

    fn parse_key(&mut self) -> Result<String, QueryError> {
        let rest = self.rest();
        let len = rest.find(|c: char| !is_key_char(c)).unwrap_or(rest.len());
        if len == 0 {
            return Err(self.unexpected("tag key"));
        }
        self.pos += len;
        Ok(rest[..len].to_string())
    }

    fn parse_operator(&mut self) -> Result<Operator, QueryError> {
        // Two-character operators first so `<=` is not read as `<`.
        const SYMBOLS: [(&str, Operator); 5] = [
            ("<=", Operator::Le),
            (">=", Operator::Ge),
            ("=", Operator::Eq),
            ("<", Operator::Lt),
            (">", Operator::Gt),
        ];
        for (sym, op) in SYMBOLS {
            if self.rest().starts_with(sym) {
                self.pos += sym.len();
                return Ok(op);
            }
        }
        if self.eat_keyword("CONTAINS") {
            return Ok(Operator::Contains);
        }
        if self.eat_keyword("EXISTS") {
            return Ok(Operator::Exists);
        }
        Err(self.unexpected("operator"))
    }

    fn parse_operand(&mut self) -> Result<Operand, QueryError> {
        let rest = self.rest();
        if let Some(body) = rest.strip_prefix('\'') {
            let end = body
                .find('\'')
                .ok_or(QueryError::UnterminatedString(self.pos))?;
            self.pos += end + 2;
            return Ok(Operand::Str(body[..end].to_string()));
        }
        let len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.unexpected("operand"));
        }
        let raw = &rest[..len];
        let value = raw
            .parse::<f64>()
            .map_err(|_| QueryError::InvalidNumber(raw.to_string()))?;
        self.pos += len;
        Ok(Operand::Number {
            value,
            raw: raw.to_string(),
        })
    }
}
