use std::sync::LazyLock;

use chrono::{Local, Utc};
use regex::Regex;
use tracing::warn;

use crate::config::DefaultValueMode;
use crate::error::SqlMapperError;
use crate::types::RowValues;

/// Platform default expressions with a concrete client-side value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnownDefault {
    CurrentTimestamp,
    CurrentUtcTimestamp,
    CurrentDate,
    CurrentTime,
    NewIdentifier,
    /// The database fills the value in (sequences, identity); nothing to supply.
    Generated,
}

impl KnownDefault {
    fn value(self) -> RowValues {
        match self {
            KnownDefault::CurrentTimestamp => RowValues::Timestamp(Local::now().naive_local()),
            KnownDefault::CurrentUtcTimestamp => RowValues::Timestamp(Utc::now().naive_utc()),
            KnownDefault::CurrentDate => Local::now()
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map_or(RowValues::Null, RowValues::Timestamp),
            KnownDefault::CurrentTime => {
                RowValues::Text(Local::now().time().format("%H:%M:%S").to_string())
            }
            KnownDefault::NewIdentifier => RowValues::Text(uuid::Uuid::new_v4().to_string()),
            KnownDefault::Generated => RowValues::Null,
        }
    }
}

// 'text', N'text', 'text'::character varying
static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)^N?'(.*)'(?:::[A-Za-z_ "]+(?:\[\])?)?$"#).expect("valid regex")
});
static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+(?:\.\d+)?$").expect("valid regex"));
static NULL_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^null(?:::[A-Za-z_ "]+)?$"#).expect("valid regex")
});

/// Remove parentheses wrapping the whole literal: `((0))` becomes `0`.
fn strip_wrapping_parens(literal: &str) -> &str {
    let mut s = literal.trim();
    while s.starts_with('(') && s.ends_with(')') && encloses_all(s) {
        s = s[1..s.len() - 1].trim();
    }
    s
}

fn encloses_all(s: &str) -> bool {
    let mut depth = 0_i32;
    for (idx, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && idx != s.len() - 1 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

fn lookup_known(literal: &str, known: &[(&str, KnownDefault)]) -> Option<KnownDefault> {
    let lower = literal.to_ascii_lowercase();
    known.iter().find_map(|(key, kind)| {
        let hit = lower == *key || (key.ends_with('(') && lower.starts_with(key));
        hit.then_some(*kind)
    })
}

fn coerce_numeric(text: &str, numeric_scale: Option<i64>) -> Option<RowValues> {
    match numeric_scale {
        Some(0) => text
            .parse::<i64>()
            .ok()
            .or_else(|| {
                #[allow(clippy::cast_possible_truncation)]
                text.parse::<f64>().ok().map(|f| f.trunc() as i64)
            })
            .map(RowValues::Int),
        Some(_) => text.parse::<f64>().ok().map(RowValues::Float),
        None if NUMERIC.is_match(text) => text
            .parse::<i64>()
            .map(RowValues::Int)
            .ok()
            .or_else(|| text.parse::<f64>().ok().map(RowValues::Float)),
        None => None,
    }
}

/// Turn a catalog default-value literal into a value.
///
/// `None` (no default) is `RowValues::Null`. Known platform expressions come from
/// the dialect's table; quoted strings, `NULL`, booleans and numbers are handled for
/// every backend. A numeric scale from the catalog decides between integer and
/// floating point.
///
/// # Errors
/// Returns `SqlMapperError::UnknownDefaultValue` for unrecognised literals when
/// `mode` is strict; lenient mode logs and yields `RowValues::Null`.
pub fn interpret_default_value(
    column: &str,
    literal: Option<&str>,
    numeric_scale: Option<i64>,
    known: &[(&str, KnownDefault)],
    mode: DefaultValueMode,
) -> Result<RowValues, SqlMapperError> {
    let Some(raw) = literal else {
        return Ok(RowValues::Null);
    };
    let literal = strip_wrapping_parens(raw);

    if let Some(kind) = lookup_known(literal, known) {
        return Ok(kind.value());
    }
    if NULL_LITERAL.is_match(literal) {
        return Ok(RowValues::Null);
    }
    if let Some(caps) = QUOTED.captures(literal) {
        let inner = caps.get(1).map_or("", |m| m.as_str()).replace("''", "'");
        if numeric_scale.is_some()
            && let Some(value) = coerce_numeric(inner.trim(), numeric_scale)
        {
            return Ok(value);
        }
        return Ok(RowValues::Text(inner));
    }
    if literal.eq_ignore_ascii_case("true") {
        return Ok(RowValues::Bool(true));
    }
    if literal.eq_ignore_ascii_case("false") {
        return Ok(RowValues::Bool(false));
    }
    if let Some(value) = coerce_numeric(literal, numeric_scale) {
        return Ok(value);
    }

    match mode {
        DefaultValueMode::Strict => Err(SqlMapperError::UnknownDefaultValue {
            column: column.to_string(),
            literal: raw.to_string(),
        }),
        DefaultValueMode::Lenient => {
            warn!(column, literal = raw, "unrecognised default value, using NULL");
            Ok(RowValues::Null)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN: &[(&str, KnownDefault)] = &[
        ("getdate()", KnownDefault::CurrentTimestamp),
        ("newid()", KnownDefault::NewIdentifier),
        ("nextval(", KnownDefault::Generated),
    ];

    fn strict(literal: &str, scale: Option<i64>) -> Result<RowValues, SqlMapperError> {
        interpret_default_value("c", Some(literal), scale, KNOWN, DefaultValueMode::Strict)
    }

    #[test]
    fn parentheses_are_unwrapped() {
        assert_eq!(strip_wrapping_parens("((0))"), "0");
        assert_eq!(strip_wrapping_parens("(getdate())"), "getdate()");
        assert_eq!(strip_wrapping_parens("(1) + (2)"), "(1) + (2)");
        assert_eq!(strict("((0))", Some(0)).unwrap(), RowValues::Int(0));
    }

    #[test]
    fn known_platform_literals() {
        assert!(matches!(strict("(getdate())", None).unwrap(), RowValues::Timestamp(_)));
        let RowValues::Text(id) = strict("(NEWID())", None).unwrap() else {
            panic!("expected a uuid string");
        };
        assert_eq!(id.len(), 36);
        assert_eq!(
            strict("nextval('people_id_seq'::regclass)", Some(0)).unwrap(),
            RowValues::Null
        );
    }

    #[test]
    fn quoted_strings_and_casts() {
        assert_eq!(strict("'abc'", None).unwrap(), RowValues::Text("abc".into()));
        assert_eq!(strict("(N'it''s')", None).unwrap(), RowValues::Text("it's".into()));
        assert_eq!(
            strict("'pending'::character varying", None).unwrap(),
            RowValues::Text("pending".into())
        );
        assert_eq!(strict("'7'", Some(0)).unwrap(), RowValues::Int(7));
    }

    #[test]
    fn numbers_follow_scale() {
        assert_eq!(strict("42", None).unwrap(), RowValues::Int(42));
        assert_eq!(strict("4.5", None).unwrap(), RowValues::Float(4.5));
        assert_eq!(strict("4", Some(2)).unwrap(), RowValues::Float(4.0));
        assert_eq!(strict("1e3", Some(0)).unwrap(), RowValues::Int(1000));
        assert_eq!(strict("true", None).unwrap(), RowValues::Bool(true));
        assert_eq!(strict("NULL", None).unwrap(), RowValues::Null);
    }

    #[test]
    fn missing_default_is_null() {
        let v = interpret_default_value("c", None, None, KNOWN, DefaultValueMode::Strict).unwrap();
        assert_eq!(v, RowValues::Null);
    }

    #[test]
    fn unknown_literal_strict_vs_lenient() {
        let err = strict("some_function(1, 2)", None).unwrap_err();
        assert!(matches!(err, SqlMapperError::UnknownDefaultValue { .. }));
        assert!(err.is_caller_input());

        let lenient = interpret_default_value(
            "c",
            Some("some_function(1, 2)"),
            None,
            KNOWN,
            DefaultValueMode::Lenient,
        )
        .unwrap();
        assert_eq!(lenient, RowValues::Null);
    }
}
