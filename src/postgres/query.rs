use std::error::Error;
use std::fmt::Write;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use tokio_postgres::types::{FromSql, Kind, Type};
use tokio_postgres::{Row, Statement};
use uuid::Uuid;

use crate::error::SqlMapperError;
use crate::results::ResultSet;
use crate::types::{CursorHandle, RowValues};

/// The undecoded payload of a column; decoding happens against the base type.
struct RawValue<'a>(&'a [u8]);

impl<'a> FromSql<'a> for RawValue<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(RawValue(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Build a result set using statement metadata for column names and native types.
///
/// # Errors
/// Returns errors from row value extraction.
pub fn build_result_set(stmt: &Statement, rows: &[Row]) -> Result<ResultSet, SqlMapperError> {
    let columns = stmt.columns();
    let mut result_set = ResultSet::with_capacity(rows.len());
    result_set.set_column_names(Arc::new(
        columns.iter().map(|c| c.name().to_string()).collect(),
    ));
    result_set.set_column_types(Arc::new(
        columns.iter().map(|c| c.type_().name().to_string()).collect(),
    ));

    for row in rows {
        let mut row_values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            row_values.push(postgres_extract_value(row, idx)?);
        }
        result_set.add_row_values(row_values);
    }
    Ok(result_set)
}

/// Extracts a `RowValues` from a `tokio_postgres` Row at the given index.
///
/// Domains decode as their base type.
///
/// # Errors
/// Returns `SqlMapperError` if the column cannot be retrieved, and
/// `SqlMapperError::ExecutionError` for a payload that is malformed or of a type
/// with no `RowValues` counterpart.
pub fn postgres_extract_value(row: &Row, idx: usize) -> Result<RowValues, SqlMapperError> {
    let ty = row.columns()[idx].type_();
    let Some(raw) = row.try_get::<_, Option<RawValue>>(idx)? else {
        return Ok(RowValues::Null);
    };
    decode_value(ty, raw.0).map_err(|e| {
        SqlMapperError::ExecutionError(format!(
            "column {} of type {}: {e}",
            row.columns()[idx].name(),
            ty.name()
        ))
    })
}

fn base_type(ty: &Type) -> &Type {
    match ty.kind() {
        Kind::Domain(inner) => base_type(inner),
        _ => ty,
    }
}

fn decode_value(ty: &Type, raw: &[u8]) -> Result<RowValues, Box<dyn Error + Sync + Send>> {
    let ty = base_type(ty);
    Ok(match *ty {
        Type::INT2 => RowValues::Int(i64::from(i16::from_sql(ty, raw)?)),
        Type::INT4 => RowValues::Int(i64::from(i32::from_sql(ty, raw)?)),
        Type::INT8 => RowValues::Int(i64::from_sql(ty, raw)?),
        Type::OID => RowValues::Int(i64::from(u32::from_sql(ty, raw)?)),
        Type::FLOAT4 => RowValues::Float(f64::from(f32::from_sql(ty, raw)?)),
        Type::FLOAT8 => RowValues::Float(f64::from_sql(ty, raw)?),
        Type::BOOL => RowValues::Bool(bool::from_sql(ty, raw)?),
        Type::NUMERIC => RowValues::Text(numeric_text(raw)?),
        Type::TIMESTAMP => RowValues::Timestamp(NaiveDateTime::from_sql(ty, raw)?),
        Type::TIMESTAMPTZ => RowValues::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?.naive_utc()),
        Type::DATE => RowValues::Timestamp(NaiveDate::from_sql(ty, raw)?.and_time(NaiveTime::MIN)),
        Type::TIME => RowValues::Text(NaiveTime::from_sql(ty, raw)?.to_string()),
        Type::UUID => RowValues::Text(Uuid::from_sql(ty, raw)?.to_string()),
        Type::JSON | Type::JSONB => RowValues::JSON(Value::from_sql(ty, raw)?),
        Type::BYTEA => RowValues::Blob(raw.to_vec()),
        Type::REFCURSOR => RowValues::Cursor(CursorHandle::new(std::str::from_utf8(raw)?)),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            RowValues::Text(std::str::from_utf8(raw)?.to_string())
        }
        _ => return Err("unsupported column type".into()),
    })
}

fn be_word(raw: &[u8], idx: usize) -> Result<[u8; 2], Box<dyn Error + Sync + Send>> {
    raw.get(idx * 2..idx * 2 + 2)
        .map(|b| [b[0], b[1]])
        .ok_or_else(|| "truncated numeric".into())
}

/// Render a binary `numeric` as its decimal text, keeping the declared scale.
fn numeric_text(raw: &[u8]) -> Result<String, Box<dyn Error + Sync + Send>> {
    const NEGATIVE: u16 = 0x4000;
    const NAN: u16 = 0xC000;
    const POS_INF: u16 = 0xD000;
    const NEG_INF: u16 = 0xF000;

    let ndigits = usize::from(u16::from_be_bytes(be_word(raw, 0)?));
    let weight = i32::from(i16::from_be_bytes(be_word(raw, 1)?));
    let sign = u16::from_be_bytes(be_word(raw, 2)?);
    let dscale = usize::from(u16::from_be_bytes(be_word(raw, 3)?));
    let digits = (0..ndigits)
        .map(|i| be_word(raw, 4 + i).map(i16::from_be_bytes))
        .collect::<Result<Vec<_>, _>>()?;

    match sign {
        NAN => return Ok("NaN".to_string()),
        POS_INF => return Ok("Infinity".to_string()),
        NEG_INF => return Ok("-Infinity".to_string()),
        _ => {}
    }
    // base-10000 group at position `k`; positions outside the payload are zero
    let group = |k: i32| {
        usize::try_from(k)
            .ok()
            .and_then(|k| digits.get(k))
            .copied()
            .unwrap_or(0)
    };

    let mut out = String::new();
    if sign == NEGATIVE {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        for k in 0..=weight {
            if k == 0 {
                write!(out, "{}", group(k))?;
            } else {
                write!(out, "{:04}", group(k))?;
            }
        }
    }
    if dscale > 0 {
        let mut fraction = String::new();
        let mut k = weight + 1;
        while fraction.len() < dscale {
            write!(fraction, "{:04}", group(k))?;
            k += 1;
        }
        fraction.truncate(dscale);
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(out)
}
