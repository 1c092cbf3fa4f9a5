//! Variables available to a template while it renders.
use crate::view::template::{Error, ToTemplateValue, Value};
use serde::Serialize;
use std::collections::HashMap;
use std::ops::{Index, IndexMut};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Context {
    values: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a context from any serializable struct or map.
    /// Its fields become top-level variables.
    pub fn from_serialize<T: Serialize>(data: &T) -> Result<Self, Error> {
        let json = serde_json::to_value(data).map_err(|_| Error::SerializationError)?;

        match Value::from(json) {
            Value::Hash(hash) => Ok(Context {
                values: hash.into_iter().collect(),
            }),
            Value::Null => Ok(Context::new()),
            _ => Err(Error::SerializationError),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: impl ToTemplateValue) -> Result<&mut Self, Error> {
        self.values
            .insert(key.to_string(), value.to_template_value()?);
        Ok(self)
    }

    pub fn insert(&mut self, key: impl ToString, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    /// Copy all variables from another context. Variables
    /// in `other` replace existing ones with the same name.
    pub fn extend(&mut self, other: &Context) {
        self.values
            .extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: ToString, V: ToTemplateValue> TryFrom<HashMap<K, V>> for Context {
    type Error = Error;

    fn try_from(values: HashMap<K, V>) -> Result<Context, Self::Error> {
        Context::try_from(values.into_iter().collect::<Vec<_>>())
    }
}

impl<K: ToString, V: ToTemplateValue> TryFrom<Vec<(K, V)>> for Context {
    type Error = Error;

    fn try_from(values: Vec<(K, V)>) -> Result<Context, Self::Error> {
        let mut context = Context::new();

        for (key, value) in values {
            context.insert(key, value.to_template_value()?);
        }

        Ok(context)
    }
}

impl<K: ToString, V: ToTemplateValue, const N: usize> TryFrom<[(K, V); N]> for Context {
    type Error = Error;

    fn try_from(values: [(K, V); N]) -> Result<Context, Self::Error> {
        Context::try_from(Vec::from(values))
    }
}

impl TryFrom<&Context> for Context {
    type Error = Error;

    fn try_from(context: &Context) -> Result<Context, Self::Error> {
        Ok(context.clone())
    }
}

impl TryFrom<serde_json::Value> for Context {
    type Error = Error;

    fn try_from(json: serde_json::Value) -> Result<Context, Self::Error> {
        Context::from_serialize(&json)
    }
}

impl Index<&str> for Context {
    type Output = Value;

    fn index(&self, key: &str) -> &Self::Output {
        self.values.get(key).unwrap_or(&Value::Null)
    }
}

impl IndexMut<&str> for Context {
    fn index_mut(&mut self, key: &str) -> &mut Self::Output {
        self.values.entry(key.to_string()).or_insert(Value::Null)
    }
}
