//! 原始字符串到 `Value` 的解析规则
//!
//! 每种 `TypeDescriptor` 对应一个解析函数，容器类型在逗号上切分后逐个解析元素。

use std::str::FromStr;

use crate::error::BindingError;

use super::descriptor::TypeDescriptor;
use super::duration::parse_duration;
use super::value::Value;

/// 列表和多值映射的分隔符
pub const DELIMITER: char = ',';

/// 多值映射中 key 与值的分隔符
pub const KEY_VALUE_SEPARATOR: char = '=';

fn parse_number<T>(raw: &str, kind: &TypeDescriptor) -> Result<T, BindingError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| BindingError::new(raw, kind, e.to_string()))
}

fn parse_bool(raw: &str) -> Result<bool, BindingError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if trimmed.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(BindingError::new(
            raw,
            TypeDescriptor::Bool,
            "expected 'true' or 'false'",
        ))
    }
}

fn parse_char(raw: &str) -> Result<char, BindingError> {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(BindingError::new(
            raw,
            TypeDescriptor::Char,
            "expected exactly one character",
        )),
    }
}

fn parse_scalar(raw: &str, kind: &TypeDescriptor) -> Result<Value, BindingError> {
    match kind {
        TypeDescriptor::Bool => parse_bool(raw).map(Value::Bool),
        TypeDescriptor::Char => parse_char(raw).map(Value::Char),
        TypeDescriptor::Int => parse_number(raw, kind).map(Value::Int),
        TypeDescriptor::Long => parse_number(raw, kind).map(Value::Long),
        TypeDescriptor::Float => parse_number(raw, kind).map(Value::Float),
        TypeDescriptor::Double => parse_number(raw, kind).map(Value::Double),
        TypeDescriptor::String => Ok(Value::String(raw.to_string())),
        TypeDescriptor::Duration => parse_duration(raw)
            .map(Value::Duration)
            .map_err(|e| BindingError::new(raw, kind, e.to_string())),
        TypeDescriptor::List(_) | TypeDescriptor::Multimap(_) => Err(BindingError::new(
            raw,
            kind,
            "nested containers are not supported",
        )),
    }
}

fn tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(DELIMITER).map(str::trim)
}

fn parse_list(raw: &str, element: &TypeDescriptor) -> Result<Vec<Value>, BindingError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    tokens(raw).map(|token| parse_scalar(token, element)).collect()
}

/// `key1=v1,key2=v2,v3,v4,key3=v5`：遇到 `key=` 开启新 key，其后不带 `=` 的
/// token 都归入当前 key
fn parse_multimap(
    raw: &str,
    kind: &TypeDescriptor,
    element: &TypeDescriptor,
) -> Result<Vec<(String, Vec<Value>)>, BindingError> {
    let mut entries: Vec<(String, Vec<Value>)> = Vec::new();
    if raw.trim().is_empty() {
        return Ok(entries);
    }

    for token in tokens(raw) {
        match token.split_once(KEY_VALUE_SEPARATOR) {
            Some((key, first)) => {
                let key = key.trim();
                if key.is_empty() {
                    return Err(BindingError::new(raw, kind, "empty key"));
                }
                let mut values = Vec::new();
                if !first.trim().is_empty() {
                    values.push(parse_scalar(first.trim(), element)?);
                }
                match entries.iter_mut().find(|(existing, _)| existing == key) {
                    Some((_, existing)) => existing.extend(values),
                    None => entries.push((key.to_string(), values)),
                }
            }
            None => {
                let (_, values) = entries.last_mut().ok_or_else(|| {
                    BindingError::new(raw, kind, format!("value '{}' has no key", token))
                })?;
                values.push(parse_scalar(token, element)?);
            }
        }
    }
    Ok(entries)
}

/// 按类型描述解析原始字符串
pub fn parse_value(raw: &str, kind: &TypeDescriptor) -> Result<Value, BindingError> {
    match kind {
        TypeDescriptor::List(Some(element)) => parse_list(raw, element).map(Value::List),
        TypeDescriptor::Multimap(Some(element)) => {
            parse_multimap(raw, kind, element).map(Value::Multimap)
        }
        TypeDescriptor::List(None) | TypeDescriptor::Multimap(None) => Err(BindingError::new(
            raw,
            kind,
            "container element type is not declared",
        )),
        scalar => parse_scalar(raw, scalar),
    }
}
