//! Placeholder templates rendered to literal, injection-safe MySQL text.
//!
//! Two placeholder forms are recognised:
//!
//! - `::name` is replaced by the identifier-escaped form of `params[name]`
//! - `:name` is replaced by the literal-escaped form of `params[name]`
//!
//! Placeholders whose name is missing from the parameter map are left untouched,
//! so a template can be filled in over several steps.
//!
//! # Example
//!
//! ```ignore
//! use rowbase::{escape, params};
//!
//! let sql = escape(
//!     "SELECT * FROM ::table WHERE ::column = :value",
//!     &params! { "table" => "post", "column" => "title", "value" => "it's" },
//! );
//! assert_eq!(sql, "SELECT * FROM `post` WHERE `title` = 'it\\'s'");
//! ```

use crate::value::Value;
use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::fmt::Write as _;
use std::sync::OnceLock;

/// Named parameters for [`escape`], kept in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: IndexMap<String, Value>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter (builder style).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Build [`Params`] from `name => value` pairs.
#[macro_export]
macro_rules! params {
    () => { $crate::Params::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut params = $crate::Params::new();
        $( params.insert($name, $value); )+
        params
    }};
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Leftmost-first: `::name` wins over `:name` at the same position.
    RE.get_or_init(|| Regex::new(r"::(\w+)|:(\w+)").expect("valid placeholder regex"))
}

/// Render a template, substituting every placeholder whose name is in `params`.
pub fn escape(template: &str, params: &Params) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures<'_>| {
            if let Some(name) = caps.get(1) {
                return match params.get(name.as_str()) {
                    Some(value) => escape_id(&value.to_ident_string()),
                    None => caps[0].to_string(),
                };
            }
            match caps.get(2).and_then(|name| params.get(name.as_str())) {
                Some(value) => escape_value(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Quote an identifier with backticks.
///
/// Dots split qualified names (`post.id` becomes `` `post`.`id` ``) and a bare
/// `*` segment is kept unquoted so `post.*` stays a wildcard.
pub fn escape_id(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 2);
    for (i, part) in ident.split('.').enumerate() {
        if i > 0 {
            out.push('.');
        }
        if part == "*" {
            out.push('*');
            continue;
        }
        out.push('`');
        out.push_str(&part.replace('`', "``"));
        out.push('`');
    }
    out
}

/// Render a value as a MySQL literal.
pub fn escape_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "true".to_string(),
        Value::Bool(false) => "false".to_string(),
        Value::Int(v) => v.to_string(),
        Value::UInt(v) => v.to_string(),
        Value::Float(v) if v.is_finite() => v.to_string(),
        Value::Float(_) => "NULL".to_string(),
        Value::Text(s) => escape_string(&normalize_newlines(s)),
        Value::Bytes(bytes) => {
            let mut out = String::with_capacity(bytes.len() * 2 + 3);
            out.push_str("X'");
            for b in bytes {
                let _ = write!(out, "{b:02x}");
            }
            out.push('\'');
            out
        }
        Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
        Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
        Value::List(items) => escape_list(items),
    }
}

fn escape_list(items: &[Value]) -> String {
    if items.is_empty() {
        // `IN (NULL)` is valid and matches nothing.
        return "NULL".to_string();
    }
    items
        .iter()
        .map(|item| match item {
            Value::List(inner) => format!("({})", escape_list(inner)),
            other => escape_value(other),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn normalize_newlines(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params;

    #[test]
    fn identifiers_and_values() {
        let sql = escape(
            "SELECT * FROM ::table WHERE ::column = :value",
            &params! { "table" => "post", "column" => "title", "value" => "it's" },
        );
        assert_eq!(sql, "SELECT * FROM `post` WHERE `title` = 'it\\'s'");
    }

    #[test]
    fn missing_placeholders_are_untouched() {
        let template = "UPDATE ::table SET ::col = :val WHERE id = :id";
        let sql = escape(template, &params! { "table" => "post" });
        assert_eq!(sql, "UPDATE `post` SET ::col = :val WHERE id = :id");
    }

    #[test]
    fn partial_application_composes() {
        let first = escape("::t.::c = :v", &params! { "t" => "post" });
        let second = escape(&first, &params! { "c" => "id", "v" => 3 });
        assert_eq!(second, "`post`.`id` = 3");
    }

    #[test]
    fn identifier_wins_over_value_with_same_name() {
        let sql = escape("::name = :name", &params! { "name" => "title" });
        assert_eq!(sql, "`title` = 'title'");
    }

    #[test]
    fn substituted_text_is_not_rescanned() {
        let sql = escape(
            ":a, :b",
            &params! { "a" => ":b", "b" => "x" },
        );
        assert_eq!(sql, "':b', 'x'");
    }

    #[test]
    fn time_literals_in_template_survive() {
        let sql = escape("SELECT '12:30:00', :v", &params! { "v" => 1 });
        assert_eq!(sql, "SELECT '12:30:00', 1");
    }

    #[test]
    fn backticks_are_doubled_and_dots_split() {
        assert_eq!(escape_id("we`ird"), "`we``ird`");
        assert_eq!(escape_id("post.id"), "`post`.`id`");
        assert_eq!(escape_id("post.*"), "`post`.*");
    }

    #[test]
    fn strings_escape_control_characters_and_newlines() {
        let v = Value::from("a\r\nb\rc\"d\\e\0");
        assert_eq!(escape_value(&v), "'a\\nb\\nc\\\"d\\\\e\\0'");
    }

    #[test]
    fn scalar_literals() {
        assert_eq!(escape_value(&Value::Null), "NULL");
        assert_eq!(escape_value(&Value::Bool(true)), "true");
        assert_eq!(escape_value(&Value::Int(-4)), "-4");
        assert_eq!(escape_value(&Value::Float(1.5)), "1.5");
        assert_eq!(escape_value(&Value::Float(f64::NAN)), "NULL");
        assert_eq!(escape_value(&Value::Bytes(vec![0xde, 0xad])), "X'dead'");
    }

    #[test]
    fn lists_join_and_nest() {
        assert_eq!(escape_value(&Value::from(vec![1, 2, 3])), "1, 2, 3");
        let nested = Value::List(vec![Value::from(vec![1, 2]), Value::from(vec![3, 4])]);
        assert_eq!(escape_value(&nested), "(1, 2), (3, 4)");
        assert_eq!(escape_value(&Value::List(Vec::new())), "NULL");
    }
}
