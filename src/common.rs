use std::borrow::Cow;

/// A key-value attribute attached to a measurement.
///
/// Attribute values are strings because the backend stores label values as
/// strings; callers with numeric attribute values stringify them up front.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyValue {
    /// The attribute name.
    pub key: Cow<'static, str>,
    /// The attribute value.
    pub value: Cow<'static, str>,
}

impl KeyValue {
    /// Create a new attribute pair.
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Cow<'static, str>>) -> Self {
        KeyValue {
            key: key.into(),
            value: value.into(),
        }
    }
}
