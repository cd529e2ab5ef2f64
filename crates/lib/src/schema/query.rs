//! Query documents.
//!
//! A small selection-set language in the shape of GraphQL queries:
//!
//! ```text
//! query Post($path: String!) {
//!   post(path: $path) { title date }
//!   posts: allPost(limit: 3) { id title }
//!   metadata { siteName }
//! }
//! ```
//!
//! Commas are insignificant and `#` starts a comment. Fragments, directives
//! and mutations are not supported.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
  #[error("syntax error at {offset}: expected {expected}, found {found}")]
  Syntax {
    offset: usize,
    expected: String,
    found: String,
  },

  #[error("syntax error: unterminated string starting at {0}")]
  UnterminatedString(usize),

  #[error("syntax error: unexpected end of query, expected {0}")]
  UnexpectedEnd(String),
}

/// A query as handed to the executor.
///
/// Callers that already hold a parsed document (page queries) pass it as-is;
/// callers with raw text (the CLI, the dev server) pass the source.
#[derive(Debug, Clone)]
pub enum Query {
  Document(Arc<QueryDocument>),
  Source(String),
}

impl From<QueryDocument> for Query {
  fn from(doc: QueryDocument) -> Self {
    Query::Document(Arc::new(doc))
  }
}

impl From<&str> for Query {
  fn from(source: &str) -> Self {
    Query::Source(source.to_string())
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryDocument {
  pub name: Option<String>,
  pub variables: Vec<VariableDef>,
  pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
  pub name: String,
  pub type_name: String,
  pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
  pub name: String,
  pub alias: Option<String>,
  pub arguments: Vec<(String, ArgValue)>,
  pub selections: Vec<Selection>,
}

impl Selection {
  /// Key under which the result is placed.
  pub fn response_key(&self) -> &str {
    self.alias.as_deref().unwrap_or(&self.name)
  }

  pub fn argument(&self, name: &str) -> Option<&ArgValue> {
    self.arguments.iter().find(|(n, _)| n == name).map(|(_, v)| v)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
  Variable(String),
  Literal(Value),
  List(Vec<ArgValue>),
}

impl FromStr for QueryDocument {
  type Err = QueryError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    QueryDocument::parse(s)
  }
}

impl QueryDocument {
  pub fn parse(source: &str) -> Result<Self, QueryError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let doc = parser.document()?;
    parser.expect_end()?;
    Ok(doc)
  }

  /// Names of the top-level fields.
  pub fn root_fields(&self) -> impl Iterator<Item = &str> {
    self.selections.iter().map(|s| s.name.as_str())
  }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
  Name(String),
  Str(String),
  Int(i64),
  Float(f64),
  Punct(char),
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Token::Name(n) => write!(f, "`{}`", n),
      Token::Str(s) => write!(f, "\"{}\"", s),
      Token::Int(i) => write!(f, "{}", i),
      Token::Float(x) => write!(f, "{}", x),
      Token::Punct(c) => write!(f, "`{}`", c),
    }
  }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, QueryError> {
  let mut tokens = Vec::new();
  let chars: Vec<(usize, char)> = source.char_indices().collect();
  let mut i = 0;

  while i < chars.len() {
    let (offset, c) = chars[i];
    match c {
      c if c.is_whitespace() || c == ',' => i += 1,
      '#' => {
        while i < chars.len() && chars[i].1 != '\n' {
          i += 1;
        }
      }
      '{' | '}' | '(' | ')' | '[' | ']' | ':' | '$' | '!' | '=' => {
        tokens.push((offset, Token::Punct(c)));
        i += 1;
      }
      '"' => {
        let mut text = String::new();
        i += 1;
        loop {
          let Some(&(_, c)) = chars.get(i) else {
            return Err(QueryError::UnterminatedString(offset));
          };
          i += 1;
          match c {
            '"' => break,
            '\\' => {
              let Some(&(_, escaped)) = chars.get(i) else {
                return Err(QueryError::UnterminatedString(offset));
              };
              i += 1;
              text.push(match escaped {
                'n' => '\n',
                't' => '\t',
                other => other,
              });
            }
            other => text.push(other),
          }
        }
        tokens.push((offset, Token::Str(text)));
      }
      c if c == '-' || c.is_ascii_digit() => {
        let start = i;
        i += 1;
        while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
          i += 1;
        }
        let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
        let token = if text.contains('.') {
          text.parse().map(Token::Float).ok()
        } else {
          text.parse().map(Token::Int).ok()
        };
        let token = token.ok_or_else(|| QueryError::Syntax {
          offset,
          expected: "number".to_string(),
          found: text.clone(),
        })?;
        tokens.push((offset, token));
      }
      c if c.is_alphabetic() || c == '_' => {
        let start = i;
        while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
          i += 1;
        }
        let text: String = chars[start..i].iter().map(|(_, c)| *c).collect();
        tokens.push((offset, Token::Name(text)));
      }
      other => {
        return Err(QueryError::Syntax {
          offset,
          expected: "token".to_string(),
          found: format!("`{}`", other),
        });
      }
    }
  }

  Ok(tokens)
}

struct Parser {
  tokens: Vec<(usize, Token)>,
  pos: usize,
}

impl Parser {
  fn peek(&self) -> Option<&Token> {
    self.tokens.get(self.pos).map(|(_, t)| t)
  }

  fn next(&mut self, expected: &str) -> Result<(usize, Token), QueryError> {
    let token = self
      .tokens
      .get(self.pos)
      .cloned()
      .ok_or_else(|| QueryError::UnexpectedEnd(expected.to_string()))?;
    self.pos += 1;
    Ok(token)
  }

  fn is_punct(&self, c: char) -> bool {
    self.peek() == Some(&Token::Punct(c))
  }

  fn expect_punct(&mut self, c: char) -> Result<(), QueryError> {
    let expected = format!("`{}`", c);
    match self.next(&expected)? {
      (_, Token::Punct(p)) if p == c => Ok(()),
      (offset, found) => Err(QueryError::Syntax {
        offset,
        expected,
        found: found.to_string(),
      }),
    }
  }

  fn expect_name(&mut self) -> Result<String, QueryError> {
    match self.next("name")? {
      (_, Token::Name(name)) => Ok(name),
      (offset, found) => Err(QueryError::Syntax {
        offset,
        expected: "name".to_string(),
        found: found.to_string(),
      }),
    }
  }

  fn expect_end(&self) -> Result<(), QueryError> {
    match self.tokens.get(self.pos) {
      None => Ok(()),
      Some((offset, found)) => Err(QueryError::Syntax {
        offset: *offset,
        expected: "end of query".to_string(),
        found: found.to_string(),
      }),
    }
  }

  fn document(&mut self) -> Result<QueryDocument, QueryError> {
    let mut name = None;
    let mut variables = Vec::new();

    if self.peek() == Some(&Token::Name("query".to_string())) {
      self.pos += 1;
      if let Some(Token::Name(_)) = self.peek() {
        name = Some(self.expect_name()?);
      }
      if self.is_punct('(') {
        variables = self.variable_defs()?;
      }
    }

    let selections = self.selection_set()?;
    Ok(QueryDocument {
      name,
      variables,
      selections,
    })
  }

  fn variable_defs(&mut self) -> Result<Vec<VariableDef>, QueryError> {
    self.expect_punct('(')?;
    let mut defs = Vec::new();
    while !self.is_punct(')') {
      self.expect_punct('$')?;
      let name = self.expect_name()?;
      self.expect_punct(':')?;
      let type_name = self.type_ref()?;
      let default = if self.is_punct('=') {
        self.pos += 1;
        match self.value()? {
          ArgValue::Literal(v) => Some(v),
          _ => {
            return Err(QueryError::Syntax {
              offset: self.offset(),
              expected: "literal default value".to_string(),
              found: "variable".to_string(),
            });
          }
        }
      } else {
        None
      };
      defs.push(VariableDef {
        name,
        type_name,
        default,
      });
    }
    self.expect_punct(')')?;
    Ok(defs)
  }

  fn type_ref(&mut self) -> Result<String, QueryError> {
    let mut text = if self.is_punct('[') {
      self.pos += 1;
      let inner = self.type_ref()?;
      self.expect_punct(']')?;
      format!("[{}]", inner)
    } else {
      self.expect_name()?
    };
    if self.is_punct('!') {
      self.pos += 1;
      text.push('!');
    }
    Ok(text)
  }

  fn offset(&self) -> usize {
    self.tokens.get(self.pos).map(|(o, _)| *o).unwrap_or_default()
  }

  fn selection_set(&mut self) -> Result<Vec<Selection>, QueryError> {
    self.expect_punct('{')?;
    let mut selections = Vec::new();
    while !self.is_punct('}') {
      selections.push(self.selection()?);
    }
    self.expect_punct('}')?;

    if selections.is_empty() {
      return Err(QueryError::Syntax {
        offset: self.offset(),
        expected: "at least one field".to_string(),
        found: "`}`".to_string(),
      });
    }
    Ok(selections)
  }

  fn selection(&mut self) -> Result<Selection, QueryError> {
    let first = self.expect_name()?;
    let (alias, name) = if self.is_punct(':') {
      self.pos += 1;
      (Some(first), self.expect_name()?)
    } else {
      (None, first)
    };

    let mut arguments = Vec::new();
    if self.is_punct('(') {
      self.pos += 1;
      while !self.is_punct(')') {
        let arg = self.expect_name()?;
        self.expect_punct(':')?;
        arguments.push((arg, self.value()?));
      }
      self.expect_punct(')')?;
    }

    let selections = if self.is_punct('{') {
      self.selection_set()?
    } else {
      Vec::new()
    };

    Ok(Selection {
      name,
      alias,
      arguments,
      selections,
    })
  }

  fn value(&mut self) -> Result<ArgValue, QueryError> {
    match self.next("value")? {
      (_, Token::Punct('$')) => Ok(ArgValue::Variable(self.expect_name()?)),
      (_, Token::Punct('[')) => {
        let mut items = Vec::new();
        while !self.is_punct(']') {
          items.push(self.value()?);
        }
        self.expect_punct(']')?;
        Ok(ArgValue::List(items))
      }
      (_, Token::Str(s)) => Ok(ArgValue::Literal(Value::String(s))),
      (_, Token::Int(i)) => Ok(ArgValue::Literal(Value::from(i))),
      (_, Token::Float(x)) => Ok(ArgValue::Literal(Value::from(x))),
      (_, Token::Name(n)) if n == "true" => Ok(ArgValue::Literal(Value::Bool(true))),
      (_, Token::Name(n)) if n == "false" => Ok(ArgValue::Literal(Value::Bool(false))),
      (_, Token::Name(n)) if n == "null" => Ok(ArgValue::Literal(Value::Null)),
      // Bare names are enum values, e.g. `order: DESC`.
      (_, Token::Name(n)) => Ok(ArgValue::Literal(Value::String(n))),
      (offset, found) => Err(QueryError::Syntax {
        offset,
        expected: "value".to_string(),
        found: found.to_string(),
      }),
    }
  }
}
