//! Literal escaping and statement rewriting for generated SQL.
//!
//! Every value interpolated into a supplemental query goes through
//! [`quote_literal`] or [`escape_sql_string`]; resolvers never format raw
//! user data into SQL text themselves.

use regex::Regex;
use std::sync::OnceLock;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
static SPECIAL_CHARS: OnceLock<Regex> = OnceLock::new();

/// Escape a string for use inside a single-quoted SQL literal.
///
/// Single quotes are always doubled. With `backslash` set, backslashes and
/// double quotes are additionally backslash-escaped for engines that treat
/// `\` as an escape character inside literals.
pub fn escape_sql_string(input: &str, backslash: bool) -> String {
    let escaped = input.replace('\'', "''");
    if !backslash {
        return escaped;
    }
    escaped.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Wrap a value as a quoted literal.
pub fn quote_literal(value: &str, backslash: bool) -> String {
    format!("'{}'", escape_sql_string(value, backslash))
}

/// Comma-joined list of quoted literals, for use inside `IN(...)`.
pub fn literal_list<'a, I>(values: I, backslash: bool) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .map(|v| quote_literal(v, backslash))
        .collect::<Vec<_>>()
        .join(",")
}

/// Replace every carriage return, line feed and tab with a space, so a CRLF
/// pair becomes two spaces.
pub fn replace_special_chars(input: &str) -> String {
    let re = SPECIAL_CHARS.get_or_init(|| Regex::new(r"[\r\n\t]").expect("valid regex"));
    re.replace_all(input, " ").into_owned()
}

/// Rewrite positional `?` placeholders into sequentially numbered named ones.
///
/// A run of consecutive `?` counts as one placeholder. With `prefix = ":"`
/// `a = ? AND b = ?` becomes `a = :P1 AND b = :P2`.
pub fn number_placeholders(sql: &str, prefix: &str) -> (String, usize) {
    let re = PLACEHOLDER.get_or_init(|| Regex::new(r"\?+").expect("valid regex"));
    let mut index = 0usize;
    let rewritten = re
        .replace_all(sql, |_: &regex::Captures<'_>| {
            index += 1;
            format!("{}P{}", prefix, index)
        })
        .into_owned();
    (rewritten, index)
}
