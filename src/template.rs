//! Statement templates with `??` (identifier) and `?` (value) tokens.
//!
//! [`expand`] is the execution path: it rewrites every token into positional `?`
//! placeholders and returns the bind values alongside, so values never reach the SQL
//! text. [`format`] inlines escaped literals instead and exists for logging and manual
//! composition only.
//!
//! Comment syntax follows the [`Dialect`]: MySQL needs whitespace after `--` and
//! also accepts `#`; SQLite takes `--` on its own. The plain functions assume MySQL.

use std::fmt::Write;
use std::iter::Peekable;
use std::str::Chars;

use crate::cluster::Dialect;
use crate::error::DaoError;
use crate::types::{QueryValue, RowValues};

/// A template after token expansion: positional SQL plus its ordered binds.
#[derive(Debug, Clone, PartialEq)]
pub struct Expanded {
    pub sql: String,
    pub params: Vec<RowValues>,
}

/// Quote an identifier with backticks. Dots separate qualifier parts, embedded
/// backticks are doubled.
///
/// ```rust
/// use cluster_dao::template::escape_id;
///
/// assert_eq!(escape_id("users.name"), "`users`.`name`");
/// ```
#[must_use]
pub fn escape_id(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('`');
    for c in name.chars() {
        match c {
            '`' => out.push_str("``"),
            '.' => out.push_str("`.`"),
            _ => out.push(c),
        }
    }
    out.push('`');
    out
}

/// Render a value as an SQL literal.
#[must_use]
pub fn literal(value: &RowValues) -> String {
    match value {
        RowValues::Int(i) => i.to_string(),
        RowValues::Float(f) if f.is_finite() => f.to_string(),
        RowValues::Float(_) | RowValues::Null => "NULL".to_string(),
        RowValues::Text(s) => quote(s),
        RowValues::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        RowValues::Timestamp(dt) => quote(&dt.format("%F %T%.f").to_string()),
        RowValues::JSON(v) => quote(&v.to_string()),
        RowValues::Blob(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for b in bytes {
                let _ = write!(out, "{b:02X}");
            }
            out.push('\'');
            out
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Expand `??`/`?` tokens into positional placeholders and collect the binds.
///
/// # Errors
/// Returns `DaoError::ParameterError` when the number of values does not match the
/// tokens, when `??` receives something other than an identifier, or when `SET ?`
/// receives an empty record.
pub fn expand(template: &str, values: &[QueryValue]) -> Result<Expanded, DaoError> {
    expand_with(Dialect::MySql, template, values)
}

/// [`expand`] with the comment rules of `dialect`.
///
/// # Errors
/// Same conditions as [`expand`].
pub fn expand_with(
    dialect: Dialect,
    template: &str,
    values: &[QueryValue],
) -> Result<Expanded, DaoError> {
    let mut params = Vec::with_capacity(values.len());
    let sql = substitute(dialect, template, values, |token, value, out| match token {
        Token::Identifier => push_identifier(value, out),
        Token::Value => match value {
            QueryValue::Value(v) => {
                out.push('?');
                params.push(v.clone());
                Ok(())
            }
            QueryValue::Identifier(s) => {
                out.push('?');
                params.push(RowValues::Text(s.clone()));
                Ok(())
            }
            QueryValue::List(items) => {
                if items.is_empty() {
                    out.push_str("NULL");
                } else {
                    out.push_str(&vec!["?"; items.len()].join(", "));
                    params.extend(items.iter().cloned());
                }
                Ok(())
            }
            QueryValue::Record(record) => {
                if record.is_empty() {
                    return Err(empty_record());
                }
                let assignments: Vec<String> = record
                    .iter()
                    .map(|(column, v)| {
                        params.push(RowValues::from(v));
                        format!("{} = ?", escape_id(column))
                    })
                    .collect();
                out.push_str(&assignments.join(", "));
                Ok(())
            }
        },
    })?;
    Ok(Expanded { sql, params })
}

/// Inline every token as an escaped literal.
///
/// # Errors
/// Same conditions as [`expand`].
pub fn format(template: &str, values: &[QueryValue]) -> Result<String, DaoError> {
    format_with(Dialect::MySql, template, values)
}

/// [`format`] with the comment rules of `dialect`.
///
/// # Errors
/// Same conditions as [`expand`].
pub fn format_with(
    dialect: Dialect,
    template: &str,
    values: &[QueryValue],
) -> Result<String, DaoError> {
    substitute(dialect, template, values, |token, value, out| match token {
        Token::Identifier => push_identifier(value, out),
        Token::Value => {
            match value {
                QueryValue::Value(v) => out.push_str(&literal(v)),
                QueryValue::Identifier(s) => out.push_str(&quote(s)),
                QueryValue::List(items) if items.is_empty() => out.push_str("NULL"),
                QueryValue::List(items) => {
                    let rendered: Vec<String> = items.iter().map(literal).collect();
                    out.push_str(&rendered.join(", "));
                }
                QueryValue::Record(record) => {
                    if record.is_empty() {
                        return Err(empty_record());
                    }
                    let assignments: Vec<String> = record
                        .iter()
                        .map(|(column, v)| {
                            format!("{} = {}", escape_id(column), literal(&RowValues::from(v)))
                        })
                        .collect();
                    out.push_str(&assignments.join(", "));
                }
            }
            Ok(())
        }
    })
}

fn push_identifier(value: &QueryValue, out: &mut String) -> Result<(), DaoError> {
    match value {
        QueryValue::Identifier(name) | QueryValue::Value(RowValues::Text(name)) => {
            out.push_str(&escape_id(name));
            Ok(())
        }
        QueryValue::List(items) if !items.is_empty() => {
            let names = items
                .iter()
                .map(|item| {
                    item.as_text().map(escape_id).ok_or_else(|| {
                        DaoError::ParameterError(format!("`??` list expects text, got {item:?}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            out.push_str(&names.join(", "));
            Ok(())
        }
        other => Err(DaoError::ParameterError(format!(
            "`??` expects an identifier, got {other:?}"
        ))),
    }
}

fn empty_record() -> DaoError {
    DaoError::ParameterError("`SET ?` needs at least one column".into())
}

#[derive(Clone, Copy)]
enum Token {
    /// `??`
    Identifier,
    /// `?`
    Value,
}

#[derive(Clone, Copy)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Backticked,
    LineComment,
    BlockComment,
}

/// Walk the template, handing every token outside literals and comments to `emit`
/// together with the next value. Numbered placeholders (`?1`) pass through untouched.
fn substitute<F>(
    dialect: Dialect,
    template: &str,
    values: &[QueryValue],
    mut emit: F,
) -> Result<String, DaoError>
where
    F: FnMut(Token, &QueryValue, &mut String) -> Result<(), DaoError>,
{
    let mut out = String::with_capacity(template.len() + values.len() * 2);
    let mut remaining = values.iter();
    let mut consumed = 0usize;
    let mut state = State::Normal;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '\'' => state = State::SingleQuoted,
                '"' => state = State::DoubleQuoted,
                '`' => state = State::Backticked,
                '-' if opens_dash_comment(dialect, &chars) => state = State::LineComment,
                '#' if dialect == Dialect::MySql => state = State::LineComment,
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("/*");
                    state = State::BlockComment;
                    continue;
                }
                '?' if !chars.peek().is_some_and(char::is_ascii_digit) => {
                    let token = if chars.peek() == Some(&'?') {
                        chars.next();
                        Token::Identifier
                    } else {
                        Token::Value
                    };
                    let value = remaining.next().ok_or_else(|| {
                        DaoError::ParameterError(format!(
                            "template has more tokens than the {} values supplied",
                            values.len()
                        ))
                    })?;
                    consumed += 1;
                    emit(token, value, &mut out)?;
                    continue;
                }
                _ => {}
            },
            State::SingleQuoted | State::DoubleQuoted | State::Backticked => {
                let close = match state {
                    State::SingleQuoted => '\'',
                    State::DoubleQuoted => '"',
                    _ => '`',
                };
                if c == close {
                    if chars.peek() == Some(&close) {
                        // doubled quote is an escape, stay inside
                        out.push(c);
                        chars.next();
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("*/");
                    state = State::Normal;
                    continue;
                }
            }
        }
        out.push(c);
    }

    if consumed < values.len() {
        return Err(DaoError::ParameterError(format!(
            "template has {consumed} tokens but {} values were supplied",
            values.len()
        )));
    }
    Ok(out)
}

/// `rest` follows a `-`. MySQL only opens a comment on `--` followed by whitespace
/// or the end of input.
fn opens_dash_comment(dialect: Dialect, rest: &Peekable<Chars<'_>>) -> bool {
    let mut ahead = rest.clone();
    if ahead.next() != Some('-') {
        return false;
    }
    match dialect {
        Dialect::MySql => ahead.next().is_none_or(char::is_whitespace),
        Dialect::Sqlite => true,
    }
}
