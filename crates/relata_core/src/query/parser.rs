//! Query text parser.

use crate::error::{CoreError, CoreResult};
use crate::sql::CompareOp;
use std::fmt;

/// Where a condition's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Parameter {
    /// `:name`
    Named(String),
    /// `?N`
    Positional(u32),
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Named(name) => write!(f, ":{name}"),
            Parameter::Positional(position) => write!(f, "?{position}"),
        }
    }
}

/// One `field op parameter` comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Field name, alias stripped.
    pub field: String,
    /// Comparison operator.
    pub op: CompareOp,
    /// Bound value.
    pub parameter: Parameter,
}

/// A parsed `SELECT alias FROM Entity alias [WHERE ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectStatement {
    /// Alias the query selects.
    pub alias: String,
    /// Entity name as registered.
    pub entity_name: String,
    /// AND-joined conditions, in text order.
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Named(String),
    Positional(u32),
    Op(CompareOp),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) => f.write_str(word),
            Token::Named(name) => write!(f, ":{name}"),
            Token::Positional(position) => write!(f, "?{position}"),
            Token::Op(op) => write!(f, "{op}"),
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

fn tokenize(text: &str) -> CoreResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if is_word_char(c) {
            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                if !is_word_char(c) {
                    break;
                }
                end = i + c.len_utf8();
                chars.next();
            }
            tokens.push(Token::Word(text[start..end].to_string()));
            continue;
        }

        chars.next();
        match c {
            ':' | '?' => {
                let mut end = start + 1;
                while let Some(&(i, c)) = chars.peek() {
                    if !(c.is_alphanumeric() || c == '_') {
                        break;
                    }
                    end = i + c.len_utf8();
                    chars.next();
                }
                let body = &text[start + 1..end];
                if body.is_empty() {
                    return Err(CoreError::query(format!(
                        "parameter marker '{c}' at offset {start} has no name"
                    )));
                }
                if c == ':' {
                    tokens.push(Token::Named(body.to_string()));
                } else {
                    let position = body.parse::<u32>().map_err(|_| {
                        CoreError::query(format!("invalid positional parameter ?{body}"))
                    })?;
                    tokens.push(Token::Positional(position));
                }
            }
            '=' | '<' | '>' => {
                let mut op = c.to_string();
                if let Some(&(_, next)) = chars.peek() {
                    if matches!((c, next), ('<', '=') | ('<', '>') | ('>', '=')) {
                        op.push(next);
                        chars.next();
                    }
                }
                let op = CompareOp::parse(&op)
                    .ok_or_else(|| CoreError::query(format!("unknown operator {op}")))?;
                tokens.push(Token::Op(op));
            }
            other => {
                return Err(CoreError::query(format!(
                    "unexpected character '{other}' at offset {start}"
                )));
            }
        }
    }
    Ok(tokens)
}

struct Cursor {
    tokens: std::vec::IntoIter<Token>,
}

impl Cursor {
    fn next(&mut self, expected: &str) -> CoreResult<Token> {
        self.tokens
            .next()
            .ok_or_else(|| CoreError::query(format!("expected {expected}, found end of query")))
    }

    fn word(&mut self, expected: &str) -> CoreResult<String> {
        match self.next(expected)? {
            Token::Word(word) => Ok(word),
            other => Err(CoreError::query(format!("expected {expected}, found {other}"))),
        }
    }

    fn keyword(&mut self, keyword: &str) -> CoreResult<()> {
        let word = self.word(keyword)?;
        if word.eq_ignore_ascii_case(keyword) {
            Ok(())
        } else {
            Err(CoreError::query(format!("expected {keyword}, found {word}")))
        }
    }
}

/// Parser for the query language.
///
/// Grammar:
///
/// ```text
/// SELECT alias FROM Entity alias [WHERE cond (AND cond)*]
/// cond := (alias.field | field) op (:name | ?N)
/// op   := = | <> | < | <= | > | >=
/// ```
///
/// Keywords are case-insensitive; entity and field names are not.
pub struct QueryParser;

impl QueryParser {
    /// Parses `text`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Query`] describing the first problem found.
    pub fn parse(text: &str) -> CoreResult<SelectStatement> {
        let mut cursor = Cursor {
            tokens: tokenize(text)?.into_iter(),
        };

        cursor.keyword("SELECT")?;
        let alias = cursor.word("select alias")?;
        cursor.keyword("FROM")?;
        let entity_name = cursor.word("entity name")?;
        let from_alias = cursor.word("entity alias")?;
        if from_alias != alias {
            return Err(CoreError::query(format!(
                "selected alias {alias} does not match entity alias {from_alias}"
            )));
        }

        let mut conditions = Vec::new();
        match cursor.tokens.next() {
            None => {}
            Some(Token::Word(word)) if word.eq_ignore_ascii_case("WHERE") => {
                conditions.push(Self::condition(&mut cursor, &alias)?);
                while let Some(token) = cursor.tokens.next() {
                    match token {
                        Token::Word(word) if word.eq_ignore_ascii_case("AND") => {
                            conditions.push(Self::condition(&mut cursor, &alias)?);
                        }
                        other => {
                            return Err(CoreError::query(format!("expected AND, found {other}")))
                        }
                    }
                }
            }
            Some(other) => {
                return Err(CoreError::query(format!("expected WHERE, found {other}")));
            }
        }

        Ok(SelectStatement {
            alias,
            entity_name,
            conditions,
        })
    }

    fn condition(cursor: &mut Cursor, alias: &str) -> CoreResult<Condition> {
        let lhs = cursor.word("field")?;
        let field = match lhs.split_once('.') {
            Some((prefix, field)) if prefix == alias && !field.is_empty() => field.to_string(),
            Some((prefix, _)) => {
                return Err(CoreError::query(format!(
                    "unknown alias {prefix} (expected {alias})"
                )))
            }
            None => lhs,
        };

        let op = match cursor.next("operator")? {
            Token::Op(op) => op,
            other => return Err(CoreError::query(format!("expected operator, found {other}"))),
        };

        let parameter = match cursor.next("parameter")? {
            Token::Named(name) => Parameter::Named(name),
            Token::Positional(position) => Parameter::Positional(position),
            other => {
                return Err(CoreError::query(format!(
                    "expected :name or ?N, found {other}"
                )))
            }
        };

        Ok(Condition {
            field,
            op,
            parameter,
        })
    }
}
