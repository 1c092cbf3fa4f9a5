//! The basic building block of our template language: the value.
//! All values like floats, integers, strings, lists, hashes, etc.
//! are represented using the value.
//!
//! This allows operations across data types, like multiplying lists by integers,
//! or accessing hash keys.
use super::Error;

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// A constant value, e.g. `5` or `"hello world"`.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    List(Vec<Value>),
    // Sorted by key, so hashes always print and iterate the same way.
    Hash(BTreeMap<String, Value>),
    Null,
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(i1), Value::Integer(i2)) => i1.partial_cmp(i2),
            (Value::Integer(i1), Value::Float(f2)) => (*i1 as f64).partial_cmp(f2),
            (Value::Float(f1), Value::Integer(i2)) => f1.partial_cmp(&(*i2 as f64)),
            (Value::Float(f1), Value::Float(f2)) => f1.partial_cmp(f2),
            (Value::String(s1), Value::String(s2)) => s1.partial_cmp(s2),
            (Value::Boolean(b1), Value::Boolean(b2)) => b1.partial_cmp(b2),
            _ => None,
        }
    }
}

/// How the value looks when printed into the template.
impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::List(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Hash(h) => {
                write!(f, "{{")?;
                for (i, (k, v)) in h.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Value::Null => Ok(()),
        }
    }
}

impl Value {
    /// If the value, when evaluated in the context of a `if` statement
    /// would result in the `if` statement being executed.
    ///
    /// e.g. `<% if 5 %>five is true<% end %>`
    /// would output "five is true" since `5` is truthy.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Integer(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Null => false,
            Value::List(list) => !list.is_empty(),
            Value::Hash(hash) => !hash.is_empty(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn add(&self, other: &Self) -> Self {
        match (self, other) {
            (Value::Integer(i1), Value::Integer(i2)) => Value::Integer(i1.wrapping_add(*i2)),
            (Value::Integer(i1), Value::Float(f2)) => Value::Float(*i1 as f64 + f2),
            (Value::Float(f1), Value::Integer(i2)) => Value::Float(f1 + *i2 as f64),
            (Value::Float(f1), Value::Float(f2)) => Value::Float(f1 + f2),
            (Value::String(s1), Value::String(s2)) => Value::String(format!("{}{}", s1, s2)),
            (Value::String(s1), Value::Integer(i2)) => Value::String(format!("{}{}", s1, i2)),
            (Value::Integer(i1), Value::String(s2)) => Value::String(format!("{}{}", i1, s2)),
            (Value::String(s1), Value::Float(f2)) => Value::String(format!("{}{}", s1, f2)),
            (Value::Float(f1), Value::String(s2)) => Value::String(format!("{}{}", f1, s2)),
            (Value::List(list), other) => {
                let mut list = list.clone();
                list.push(other.clone());
                Value::List(list)
            }
            (value, Value::List(list)) => {
                let mut new = vec![value.clone()];
                new.extend(list.iter().cloned());
                Value::List(new)
            }
            (Value::Hash(h1), Value::Hash(h2)) => {
                let mut hash = h1.clone();
                hash.extend(h2.iter().map(|(k, v)| (k.clone(), v.clone())));
                Value::Hash(hash)
            }
            _ => Value::Null,
        }
    }

    pub fn sub(&self, other: &Self) -> Self {
        match (self, other) {
            (Value::Integer(i1), Value::Integer(i2)) => Value::Integer(i1.wrapping_sub(*i2)),
            (Value::Integer(i1), Value::Float(f2)) => Value::Float(*i1 as f64 - f2),
            (Value::Float(f1), Value::Integer(i2)) => Value::Float(f1 - *i2 as f64),
            (Value::Float(f1), Value::Float(f2)) => Value::Float(f1 - f2),
            (Value::String(s1), Value::String(s2)) => Value::String(s1.replace(s2.as_str(), "")),
            (Value::List(list), other) => {
                let mut list = list.clone();
                list.retain(|v| v != other);
                Value::List(list)
            }
            _ => Value::Null,
        }
    }

    /// Division. Dividing by zero produces `null` instead of an error.
    pub fn div(&self, other: &Self) -> Self {
        match (self, other) {
            (Value::Integer(_), Value::Integer(0)) => Value::Null,
            (_, Value::Float(f)) if *f == 0.0 => Value::Null,
            (Value::Float(_), Value::Integer(0)) => Value::Null,
            (Value::Integer(i1), Value::Integer(i2)) => Value::Integer(i1.wrapping_div(*i2)),
            (Value::Integer(i1), Value::Float(f2)) => Value::Float(*i1 as f64 / f2),
            (Value::Float(f1), Value::Integer(i2)) => Value::Float(f1 / *i2 as f64),
            (Value::Float(f1), Value::Float(f2)) => Value::Float(f1 / f2),
            _ => Value::Null,
        }
    }

    /// Remainder. Same as division, zero produces `null`.
    pub fn rem(&self, other: &Self) -> Self {
        match (self, other) {
            (Value::Integer(_), Value::Integer(0)) => Value::Null,
            (_, Value::Float(f)) if *f == 0.0 => Value::Null,
            (Value::Float(_), Value::Integer(0)) => Value::Null,
            (Value::Integer(i1), Value::Integer(i2)) => Value::Integer(i1.wrapping_rem(*i2)),
            (Value::Integer(i1), Value::Float(f2)) => Value::Float(*i1 as f64 % f2),
            (Value::Float(f1), Value::Integer(i2)) => Value::Float(f1 % *i2 as f64),
            (Value::Float(f1), Value::Float(f2)) => Value::Float(f1 % f2),
            _ => Value::Null,
        }
    }

    pub fn mul(&self, other: &Self) -> Self {
        match (self, other) {
            (Value::Integer(i1), Value::Integer(i2)) => Value::Integer(i1.wrapping_mul(*i2)),
            (Value::Integer(i1), Value::Float(f2)) => Value::Float(*i1 as f64 * f2),
            (Value::Float(f1), Value::Integer(i2)) => Value::Float(f1 * *i2 as f64),
            (Value::Float(f1), Value::Float(f2)) => Value::Float(f1 * f2),
            (Value::String(s), Value::Integer(n)) | (Value::Integer(n), Value::String(s)) => {
                match repeat_count(s.len(), *n) {
                    Some(n) => Value::String(s.repeat(n)),
                    None => Value::Null,
                }
            }
            (Value::List(list), Value::Integer(n)) => match repeat_count(list.len(), *n) {
                Some(n) => Value::List(
                    std::iter::repeat(list.iter().cloned())
                        .take(n)
                        .flatten()
                        .collect(),
                ),
                None => Value::Null,
            },
            _ => Value::Null,
        }
    }

    /// Bracket access, e.g. `list[0]` or `hash["key"]`.
    pub fn index(&self, key: &Value) -> Value {
        match (self, key) {
            (Value::List(list), Value::Integer(i)) => {
                let index = if *i < 0 { list.len() as i64 + i } else { *i };
                usize::try_from(index)
                    .ok()
                    .and_then(|index| list.get(index))
                    .cloned()
                    .unwrap_or(Value::Null)
            }
            (Value::Hash(hash), key) => hash.get(&key.to_string()).cloned().unwrap_or(Value::Null),
            (Value::String(s), Value::Integer(i)) => usize::try_from(*i)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::String(c.to_string()))
                .unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// Call a method on the value, e.g. `name.upcase` or `items.join(", ")`.
    ///
    /// Calling anything on `null` produces `null`, so optional data
    /// can be chained through without checks.
    pub fn call(&self, method_name: &str, args: &[Value]) -> Result<Self, Error> {
        Ok(match self {
            Value::Null => Value::Null,

            Value::Integer(value) => match method_name {
                "abs" => Value::Integer(value.wrapping_abs()),
                "to_string" | "to_s" => Value::String(value.to_string()),
                "to_f" | "to_float" => Value::Float(*value as f64),
                "to_i" | "to_integer" => Value::Integer(*value),
                "times" => Value::List((0..*value).map(Value::Integer).collect()),
                "even" => Value::Boolean(value % 2 == 0),
                "odd" => Value::Boolean(value % 2 != 0),
                method_name => return Err(Error::UnknownMethod(method_name.into(), "integer")),
            },

            Value::Float(value) => match method_name {
                "abs" => Value::Float(value.abs()),
                "ceil" => Value::Float(value.ceil()),
                "floor" => Value::Float(value.floor()),
                "round" => match args {
                    [Value::Integer(digits)] => {
                        let factor = 10f64.powi((*digits).clamp(0, 15) as i32);
                        Value::Float((value * factor).round() / factor)
                    }
                    _ => Value::Float(value.round()),
                },
                "to_string" | "to_s" => Value::String(value.to_string()),
                "to_i" | "to_integer" => Value::Integer(*value as i64),
                "to_f" | "to_float" => Value::Float(*value),
                _ => return Err(Error::UnknownMethod(method_name.into(), "float")),
            },

            Value::Boolean(value) => match method_name {
                "to_string" | "to_s" => Value::String(value.to_string()),
                _ => return Err(Error::UnknownMethod(method_name.into(), "boolean")),
            },

            Value::String(value) => match method_name {
                "to_uppercase" | "upcase" => Value::String(value.to_uppercase()),
                "to_lowercase" | "downcase" => Value::String(value.to_lowercase()),
                "trim" => Value::String(value.trim().to_string()),
                "capitalize" => Value::String(crate::capitalize(value)),
                "camelize" | "to_PascalCase" => Value::String(crate::pascal_case(value)),
                "underscore" | "to_snake_case" => Value::String(crate::snake_case(value)),
                "escape" => Value::String(crate::escape_html(value)),
                "len" | "length" => Value::Integer(value.chars().count() as i64),
                "empty" => Value::Boolean(value.is_empty()),
                "to_string" | "to_s" => Value::String(value.clone()),
                "to_i" | "to_integer" => value
                    .trim()
                    .parse::<i64>()
                    .map(Value::Integer)
                    .unwrap_or(Value::Null),
                "to_f" | "to_float" => value
                    .trim()
                    .parse::<f64>()
                    .map(Value::Float)
                    .unwrap_or(Value::Null),
                "contains" => match args {
                    [needle] => Value::Boolean(value.contains(needle.to_string().as_str())),
                    _ => Value::Boolean(false),
                },
                "starts_with" => match args {
                    [prefix] => Value::Boolean(value.starts_with(prefix.to_string().as_str())),
                    _ => Value::Boolean(false),
                },
                "ends_with" => match args {
                    [suffix] => Value::Boolean(value.ends_with(suffix.to_string().as_str())),
                    _ => Value::Boolean(false),
                },
                "replace" => match args {
                    [from, to] => {
                        Value::String(value.replace(from.to_string().as_str(), &to.to_string()))
                    }
                    _ => Value::String(value.clone()),
                },
                "split" => {
                    let separator = match args {
                        [separator] => separator.to_string(),
                        _ => " ".to_string(),
                    };
                    Value::List(
                        value
                            .split(separator.as_str())
                            .map(|s| Value::String(s.to_string()))
                            .collect(),
                    )
                }
                "truncate" => match args {
                    [Value::Integer(n)] => {
                        let n = (*n).max(0) as usize;
                        if value.chars().count() > n {
                            Value::String(value.chars().take(n).collect::<String>() + "...")
                        } else {
                            Value::String(value.clone())
                        }
                    }
                    _ => Value::String(value.clone()),
                },
                _ => return Err(Error::UnknownMethod(method_name.into(), "string")),
            },

            Value::List(list) => match method_name.parse::<i64>() {
                Ok(index) => self.index(&Value::Integer(index)),

                Err(_) => match method_name {
                    "enumerate" => Value::List(
                        list.iter()
                            .enumerate()
                            .map(|(i, v)| Value::List(vec![Value::Integer(i as i64), v.clone()]))
                            .collect(),
                    ),

                    "flatten" => Value::List(Self::flatten(list)),

                    "reverse" | "rev" => Value::List(list.iter().rev().cloned().collect()),

                    "contains" => match args {
                        [needle] => Value::Boolean(list.contains(needle)),
                        _ => Value::Boolean(false),
                    },

                    "join" => {
                        let separator = match args {
                            [separator] => separator.to_string(),
                            _ => String::new(),
                        };
                        Value::String(
                            list.iter()
                                .map(|v| v.to_string())
                                .collect::<Vec<_>>()
                                .join(&separator),
                        )
                    }

                    "first" => list.first().cloned().unwrap_or(Value::Null),
                    "last" => list.last().cloned().unwrap_or(Value::Null),
                    "empty" => Value::Boolean(list.is_empty()),
                    "len" | "length" | "count" => Value::Integer(list.len() as i64),

                    _ => return Err(Error::UnknownMethod(method_name.into(), "list")),
                },
            },

            Value::Hash(hash) => match method_name {
                "keys" => Value::List(hash.keys().map(|k| Value::String(k.clone())).collect()),
                "values" => Value::List(hash.values().cloned().collect()),
                "iter" => Value::List(
                    hash.iter()
                        .map(|(k, v)| Value::List(vec![Value::String(k.clone()), v.clone()]))
                        .collect(),
                ),
                "len" | "length" | "count" if !hash.contains_key(method_name) => {
                    Value::Integer(hash.len() as i64)
                }
                "empty" if !hash.contains_key(method_name) => Value::Boolean(hash.is_empty()),
                key => hash.get(key).cloned().unwrap_or(Value::Null),
            },
        })
    }

    fn flatten(list: &[Value]) -> Vec<Value> {
        let mut result = vec![];

        for value in list {
            match value {
                Value::List(inner) => result.extend(Self::flatten(inner)),
                value => result.push(value.clone()),
            }
        }

        result
    }

    /// Items of a list, or the value itself wrapped in a list.
    pub fn to_vec(self) -> Vec<Value> {
        match self {
            Value::List(list) => list,
            value => vec![value],
        }
    }
}

/// Largest string or list a repetition like `"ab" * 3` can produce.
pub const MAX_REPEAT_LEN: usize = 16 * 1024 * 1024;

// Repeating `len` items `n` times, if the result isn't too large.
fn repeat_count(len: usize, n: i64) -> Option<usize> {
    let n = usize::try_from(n.max(0)).ok()?;

    match len.checked_mul(n) {
        Some(0) => Some(0),
        Some(total) if total <= MAX_REPEAT_LEN => Some(n),
        _ => None,
    }
}

/// Convert Rust types to template values.
pub trait ToTemplateValue {
    fn to_template_value(&self) -> Result<Value, Error>;
}

impl ToTemplateValue for Value {
    fn to_template_value(&self) -> Result<Value, Error> {
        Ok(self.clone())
    }
}

impl ToTemplateValue for String {
    fn to_template_value(&self) -> Result<Value, Error> {
        Ok(Value::String(self.clone()))
    }
}

impl ToTemplateValue for &str {
    fn to_template_value(&self) -> Result<Value, Error> {
        Ok(Value::String(self.to_string()))
    }
}

macro_rules! impl_integer {
    ($ty:ty) => {
        impl ToTemplateValue for $ty {
            fn to_template_value(&self) -> Result<Value, Error> {
                Ok(Value::Integer(*self as i64))
            }
        }
    };
}

impl_integer!(i64);
impl_integer!(i32);
impl_integer!(i16);
impl_integer!(i8);
impl_integer!(isize);
impl_integer!(u64); // Could very much overflow
impl_integer!(u32);
impl_integer!(u16);
impl_integer!(u8);
impl_integer!(usize);

impl ToTemplateValue for f64 {
    fn to_template_value(&self) -> Result<Value, Error> {
        Ok(Value::Float(*self))
    }
}

impl ToTemplateValue for f32 {
    fn to_template_value(&self) -> Result<Value, Error> {
        Ok(Value::Float(*self as f64))
    }
}

impl ToTemplateValue for bool {
    fn to_template_value(&self) -> Result<Value, Error> {
        Ok(Value::Boolean(*self))
    }
}

impl ToTemplateValue for time::OffsetDateTime {
    fn to_template_value(&self) -> Result<Value, Error> {
        let fmt = time::format_description::well_known::Rfc2822;
        Ok(Value::String(self.format(&fmt)?))
    }
}

impl<T: ToTemplateValue> ToTemplateValue for Option<T> {
    fn to_template_value(&self) -> Result<Value, Error> {
        match self {
            Some(value) => value.to_template_value(),
            None => Ok(Value::Null),
        }
    }
}

impl<T: ToTemplateValue> ToTemplateValue for &[T] {
    fn to_template_value(&self) -> Result<Value, Error> {
        let mut list = vec![];

        for value in self.iter() {
            list.push(value.to_template_value()?);
        }

        Ok(Value::List(list))
    }
}

impl<T: ToTemplateValue> ToTemplateValue for Vec<T> {
    fn to_template_value(&self) -> Result<Value, Error> {
        self.as_slice().to_template_value()
    }
}

impl<T: ToTemplateValue> ToTemplateValue for HashMap<String, T> {
    fn to_template_value(&self) -> Result<Value, Error> {
        let mut result = BTreeMap::new();
        for (key, value) in self.iter() {
            result.insert(key.clone(), value.to_template_value()?);
        }

        Ok(Value::Hash(result))
    }
}

impl<T: ToTemplateValue> ToTemplateValue for BTreeMap<String, T> {
    fn to_template_value(&self) -> Result<Value, Error> {
        let mut result = BTreeMap::new();
        for (key, value) in self.iter() {
            result.insert(key.clone(), value.to_template_value()?);
        }

        Ok(Value::Hash(result))
    }
}

impl ToTemplateValue for serde_json::Value {
    fn to_template_value(&self) -> Result<Value, Error> {
        Ok(Value::from(self.clone()))
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Boolean(b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            Json::String(s) => Value::String(s),
            Json::Array(list) => Value::List(list.into_iter().map(Value::from).collect()),
            Json::Object(hash) => Value::Hash(
                hash.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<Value> for serde_json::Value {
    type Error = Error;

    fn try_from(value: Value) -> Result<serde_json::Value, Self::Error> {
        use serde_json::value::Number;

        match value {
            Value::Integer(i) => Ok(serde_json::Value::Number(i.into())),
            Value::Float(f) => Number::from_f64(f)
                .map(serde_json::Value::Number)
                .ok_or(Error::SerializationError),
            Value::String(s) => Ok(serde_json::Value::String(s)),
            Value::Boolean(b) => Ok(serde_json::Value::Bool(b)),
            Value::List(l) => {
                let mut list = vec![];
                for v in l {
                    list.push(v.try_into()?);
                }
                Ok(serde_json::Value::Array(list))
            }
            Value::Hash(h) => {
                let mut hash = serde_json::Map::new();
                for (k, v) in h {
                    hash.insert(k, v.try_into()?);
                }
                Ok(serde_json::Value::Object(hash))
            }
            Value::Null => Ok(serde_json::Value::Null),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_arithmetic() {
        assert_eq!(Value::Integer(7).div(&Value::Integer(2)), Value::Integer(3));
        assert_eq!(Value::Integer(7).div(&Value::Integer(0)), Value::Null);
        assert_eq!(Value::Float(1.0).rem(&Value::Float(0.0)), Value::Null);
        assert_eq!(Value::Integer(7).rem(&Value::Integer(4)), Value::Integer(3));
        assert_eq!(
            Value::String("ab".into()).mul(&Value::Integer(-3)),
            Value::String("".into())
        );
        assert_eq!(
            Value::String("a".into()).add(&Value::Integer(1)),
            Value::String("a1".into())
        );
        assert_eq!(Value::Boolean(true).add(&Value::Integer(1)), Value::Null);
    }

    #[test]
    fn test_repeat_limit() {
        assert_eq!(
            Value::String("ab".into()).mul(&Value::Integer(i64::MAX)),
            Value::Null
        );
        assert_eq!(
            Value::Integer(3).mul(&Value::String("ab".into())),
            Value::String("ababab".into())
        );
        assert_eq!(
            Value::List(vec![Value::Integer(1)]).mul(&Value::Integer(i64::MAX)),
            Value::Null
        );
        assert_eq!(
            Value::List(vec![]).mul(&Value::Integer(i64::MAX)),
            Value::List(vec![])
        );
        assert_eq!(
            Value::List(vec![Value::Integer(1), Value::Integer(2)]).mul(&Value::Integer(2)),
            Value::List(vec![
                Value::Integer(1),
                Value::Integer(2),
                Value::Integer(1),
                Value::Integer(2)
            ])
        );
        assert_eq!(
            Value::String("a".into()).mul(&Value::Integer(MAX_REPEAT_LEN as i64 + 1)),
            Value::Null
        );
    }

    #[test]
    fn test_methods() -> Result<(), Error> {
        let name = Value::String(" lev ".into());
        assert_eq!(name.call("trim", &[])?.call("upcase", &[])?, Value::String("LEV".into()));

        let list = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(list.call("1", &[])?, Value::Integer(2));
        assert_eq!(list.call("5", &[])?, Value::Null);
        assert_eq!(
            list.call("join", &[Value::String("-".into())])?,
            Value::String("1-2".into())
        );

        assert_eq!(Value::Null.call("anything", &[])?, Value::Null);

        assert!(matches!(
            Value::Integer(1).call("nope", &[]),
            Err(Error::UnknownMethod(_, "integer"))
        ));

        Ok(())
    }

    #[test]
    fn test_display() {
        let mut hash = BTreeMap::new();
        hash.insert("b".to_string(), Value::Integer(2));
        hash.insert("a".to_string(), Value::List(vec![Value::Integer(1), Value::Null]));

        assert_eq!(Value::Hash(hash).to_string(), "{a: [1, ], b: 2}");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn test_json() -> Result<(), Error> {
        let json = serde_json::json!({"user": {"name": "Lev", "tags": [1, 2.5, null]}});
        let value = Value::from(json.clone());

        assert_eq!(
            value.call("user", &[])?.call("name", &[])?,
            Value::String("Lev".into())
        );

        let back: serde_json::Value = value.try_into()?;
        assert_eq!(back, json);

        Ok(())
    }
}
