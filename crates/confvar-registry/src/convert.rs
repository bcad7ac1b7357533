//! Conversion between native values and their YAML text form.
//!
//! Every variable type implements [`Convert`]. Scalars render directly;
//! containers render each element through the element type's own
//! converter, so nesting (a `Vec<BTreeSet<String>>`, say) works for any
//! depth as long as every level has an implementation.

use confvar_common::ConvertError;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, LinkedList, VecDeque};
use std::hash::Hash;
use std::ops::{Deref, DerefMut};

/// Shape tag of a converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// Numbers, booleans, characters and strings
    Scalar,
    /// Order-preserving sequences
    Sequence,
    /// Unique sets; duplicates collapse on load
    Set,
    /// String-keyed maps
    Map,
    /// Arbitrary serde structures
    Struct,
}

/// Bidirectional conversion between a value and its structured-text form.
///
/// Implementors provide the node-level pair; the text-level pair is
/// derived from it and is what variables expose.
pub trait Convert: Sized {
    /// Shape of this type.
    const KIND: ValueKind;

    /// Build the YAML node for this value.
    fn to_node(&self) -> Result<Value, ConvertError>;

    /// Rebuild a value from a YAML node.
    fn from_node(node: &Value) -> Result<Self, ConvertError>;

    /// Render this value as YAML text.
    fn to_text(&self) -> Result<String, ConvertError> {
        render(&self.to_node()?)
    }

    /// Parse YAML text into a value.
    fn from_text(text: &str) -> Result<Self, ConvertError> {
        Self::from_node(&parse(text)?)
    }
}

/// Parse YAML text into a node. Blank text is a null node.
pub fn parse(text: &str) -> Result<Value, ConvertError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(text).map_err(|e| ConvertError::Syntax(e.to_string()))
}

/// Render a node as YAML text without the trailing newline.
pub fn render(node: &Value) -> Result<String, ConvertError> {
    let mut text = serde_yaml::to_string(node).map_err(|e| ConvertError::Render(e.to_string()))?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// Short human description of a node for error messages.
pub(crate) fn describe(node: &Value) -> String {
    match node {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {b}"),
        Value::Number(n) => format!("number {n}"),
        Value::String(s) => format!("string {s:?}"),
        Value::Sequence(items) => format!("sequence of {}", items.len()),
        Value::Mapping(map) => format!("mapping of {}", map.len()),
        Value::Tagged(tagged) => format!("tagged value {}", tagged.tag),
    }
}

macro_rules! impl_convert_integer {
    ($($ty:ty),* $(,)?) => {$(
        impl Convert for $ty {
            const KIND: ValueKind = ValueKind::Scalar;

            fn to_node(&self) -> Result<Value, ConvertError> {
                Ok(Value::Number((*self).into()))
            }

            fn from_node(node: &Value) -> Result<Self, ConvertError> {
                let out_of_range = |value: String| ConvertError::OutOfRange {
                    target: stringify!($ty),
                    value,
                };
                match node {
                    Value::Number(n) => {
                        if let Some(v) = n.as_i64() {
                            <$ty>::try_from(v).map_err(|_| out_of_range(v.to_string()))
                        } else if let Some(v) = n.as_u64() {
                            <$ty>::try_from(v).map_err(|_| out_of_range(v.to_string()))
                        } else {
                            Err(ConvertError::mismatch("integer", describe(node)))
                        }
                    }
                    Value::String(s) => s
                        .trim()
                        .parse::<$ty>()
                        .map_err(|_| ConvertError::mismatch("integer", describe(node))),
                    other => Err(ConvertError::mismatch("integer", describe(other))),
                }
            }
        }
    )*};
}

impl_convert_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_convert_float {
    ($($ty:ty),* $(,)?) => {$(
        impl Convert for $ty {
            const KIND: ValueKind = ValueKind::Scalar;

            fn to_node(&self) -> Result<Value, ConvertError> {
                Ok(Value::Number((*self).into()))
            }

            #[allow(clippy::cast_possible_truncation)]
            fn from_node(node: &Value) -> Result<Self, ConvertError> {
                match node {
                    Value::Number(n) => n
                        .as_f64()
                        .map(|v| v as $ty)
                        .ok_or_else(|| ConvertError::mismatch("float", describe(node))),
                    Value::String(s) => s
                        .trim()
                        .parse::<$ty>()
                        .map_err(|_| ConvertError::mismatch("float", describe(node))),
                    other => Err(ConvertError::mismatch("float", describe(other))),
                }
            }
        }
    )*};
}

impl_convert_float!(f32, f64);

impl Convert for bool {
    const KIND: ValueKind = ValueKind::Scalar;

    fn to_node(&self) -> Result<Value, ConvertError> {
        Ok(Value::Bool(*self))
    }

    fn from_node(node: &Value) -> Result<Self, ConvertError> {
        match node {
            Value::Bool(b) => Ok(*b),
            Value::String(s) => s
                .trim()
                .parse()
                .map_err(|_| ConvertError::mismatch("boolean", describe(node))),
            other => Err(ConvertError::mismatch("boolean", describe(other))),
        }
    }
}

impl Convert for char {
    const KIND: ValueKind = ValueKind::Scalar;

    fn to_node(&self) -> Result<Value, ConvertError> {
        Ok(Value::String(self.to_string()))
    }

    fn from_node(node: &Value) -> Result<Self, ConvertError> {
        if let Value::String(s) = node {
            let mut chars = s.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Ok(c);
            }
        }
        Err(ConvertError::mismatch("single character", describe(node)))
    }
}

impl Convert for String {
    const KIND: ValueKind = ValueKind::Scalar;

    fn to_node(&self) -> Result<Value, ConvertError> {
        Ok(Value::String(self.clone()))
    }

    fn from_node(node: &Value) -> Result<Self, ConvertError> {
        match node {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            other => Err(ConvertError::mismatch("string", describe(other))),
        }
    }
}

fn encode_items<'a, T, I>(items: I) -> Result<Value, ConvertError>
where
    T: Convert + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items
        .into_iter()
        .map(Convert::to_node)
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Sequence)
}

/// Decode a sequence node into a fresh container using `insert`.
fn decode_items<C, T, F>(node: &Value, mut insert: F) -> Result<C, ConvertError>
where
    C: Default,
    T: Convert,
    F: FnMut(&mut C, T),
{
    let mut out = C::default();
    match node {
        Value::Null => {}
        Value::Sequence(items) => {
            for (index, item) in items.iter().enumerate() {
                let value = T::from_node(item).map_err(|e| ConvertError::element(index, e))?;
                insert(&mut out, value);
            }
        }
        other => return Err(ConvertError::mismatch("sequence", describe(other))),
    }
    Ok(out)
}

macro_rules! impl_convert_sequence {
    ($($container:ident => $insert:ident),* $(,)?) => {$(
        impl<T: Convert> Convert for $container<T> {
            const KIND: ValueKind = ValueKind::Sequence;

            fn to_node(&self) -> Result<Value, ConvertError> {
                encode_items(self)
            }

            fn from_node(node: &Value) -> Result<Self, ConvertError> {
                decode_items(node, |out: &mut Self, item: T| out.$insert(item))
            }
        }
    )*};
}

impl_convert_sequence!(Vec => push, VecDeque => push_back, LinkedList => push_back);

impl<T: Convert + Ord> Convert for BTreeSet<T> {
    const KIND: ValueKind = ValueKind::Set;

    fn to_node(&self) -> Result<Value, ConvertError> {
        encode_items(self)
    }

    fn from_node(node: &Value) -> Result<Self, ConvertError> {
        decode_items(node, |out: &mut Self, item: T| {
            out.insert(item);
        })
    }
}

impl<T: Convert + Eq + Hash> Convert for HashSet<T> {
    const KIND: ValueKind = ValueKind::Set;

    fn to_node(&self) -> Result<Value, ConvertError> {
        encode_items(self)
    }

    fn from_node(node: &Value) -> Result<Self, ConvertError> {
        decode_items(node, |out: &mut Self, item: T| {
            out.insert(item);
        })
    }
}

fn scalar_key(key: &Value) -> Result<String, ConvertError> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ConvertError::mismatch("scalar key", describe(other))),
    }
}

fn encode_entries<'a, T, I>(entries: I) -> Result<Value, ConvertError>
where
    T: Convert + 'a,
    I: IntoIterator<Item = (&'a String, &'a T)>,
{
    let mut mapping = Mapping::new();
    for (key, value) in entries {
        let node = value.to_node().map_err(|e| ConvertError::entry(key.as_str(), e))?;
        mapping.insert(Value::String(key.clone()), node);
    }
    Ok(Value::Mapping(mapping))
}

fn decode_entries<C, T, F>(node: &Value, mut insert: F) -> Result<C, ConvertError>
where
    C: Default,
    T: Convert,
    F: FnMut(&mut C, String, T),
{
    let mut out = C::default();
    match node {
        Value::Null => {}
        Value::Mapping(mapping) => {
            for (key, value) in mapping {
                let key = scalar_key(key)?;
                let value = T::from_node(value).map_err(|e| ConvertError::entry(key.as_str(), e))?;
                insert(&mut out, key, value);
            }
        }
        other => return Err(ConvertError::mismatch("mapping", describe(other))),
    }
    Ok(out)
}

impl<T: Convert> Convert for BTreeMap<String, T> {
    const KIND: ValueKind = ValueKind::Map;

    fn to_node(&self) -> Result<Value, ConvertError> {
        encode_entries(self)
    }

    fn from_node(node: &Value) -> Result<Self, ConvertError> {
        decode_entries(node, |out: &mut Self, key, value: T| {
            out.insert(key, value);
        })
    }
}

impl<T: Convert> Convert for HashMap<String, T> {
    const KIND: ValueKind = ValueKind::Map;

    fn to_node(&self) -> Result<Value, ConvertError> {
        encode_entries(self)
    }

    fn from_node(node: &Value) -> Result<Self, ConvertError> {
        decode_entries(node, |out: &mut Self, key, value: T| {
            out.insert(key, value);
        })
    }
}

/// Wrapper giving any serde structure a converter.
///
/// ```
/// use confvar_registry::{Convert, Structured};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// struct Endpoint {
///     host: String,
///     port: u16,
/// }
///
/// let value = Structured::<Endpoint>::from_text("host: db\nport: 5432").unwrap();
/// assert_eq!(value.port, 5432);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Structured<T>(pub T);

impl<T> Deref for Structured<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Structured<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: Serialize + DeserializeOwned> Convert for Structured<T> {
    const KIND: ValueKind = ValueKind::Struct;

    fn to_node(&self) -> Result<Value, ConvertError> {
        serde_yaml::to_value(&self.0).map_err(|e| ConvertError::Render(e.to_string()))
    }

    fn from_node(node: &Value) -> Result<Self, ConvertError> {
        T::deserialize(node)
            .map(Structured)
            .map_err(|e| ConvertError::mismatch(std::any::type_name::<T>(), e.to_string()))
    }
}
