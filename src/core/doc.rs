//! Purpose: Safe wrapper types over parsed JSON documents.
//! Exports: `Doc` (owned tree), `DocRef` (borrowed node).
//! Role: The only seam between extraction logic and the underlying
//! document representation; nothing above this module touches
//! `serde_json::Value` field lookups directly.
//! Invariants: `DocRef` is `Copy` and never outlives its `Doc`.
//! Invariants: `kind()` labels are stable; diagnostics quote them.

use serde_json::Value;

/// An owned JSON document (or subtree detached from one).
///
/// Obtained from [`crate::json::parse`] or by cloning a node out of a
/// larger tree via [`DocRef::to_doc`]. Cheap to move, not cheap to
/// clone; prefer handing out [`DocRef`]s.
#[derive(Clone, Debug, PartialEq)]
pub struct Doc {
    value: Value,
}

impl Doc {
    pub fn new(value: Value) -> Self {
        Doc { value }
    }

    /// Borrow the root node.
    pub fn root(&self) -> DocRef<'_> {
        DocRef { value: &self.value }
    }

    /// Consume the document, yielding the raw tree.
    pub fn into_value(self) -> Value {
        self.value
    }
}

impl From<Value> for Doc {
    fn from(value: Value) -> Self {
        Doc::new(value)
    }
}

/// A borrowed view of one node inside a [`Doc`].
#[derive(Clone, Copy, Debug)]
pub struct DocRef<'a> {
    value: &'a Value,
}

impl<'a> DocRef<'a> {
    pub fn new(value: &'a Value) -> Self {
        DocRef { value }
    }

    /// Look up a direct child of an object node.
    ///
    /// Returns `None` when this node is not an object or when the key
    /// is absent. Lookup is by exact key, no path syntax.
    pub fn child(&self, key: &str) -> Option<DocRef<'a>> {
        self.value.get(key).map(DocRef::new)
    }

    pub fn as_str(&self) -> Option<&'a str> {
        self.value.as_str()
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.value.as_i64()
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.value.as_u64()
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.value.as_bool()
    }

    /// Iterate the elements of an array node in document order.
    pub fn elements(&self) -> Option<impl ExactSizeIterator<Item = DocRef<'a>> + 'a + use<'a>> {
        self.value.as_array().map(|items| items.iter().map(DocRef::new))
    }

    pub fn is_object(&self) -> bool {
        self.value.is_object()
    }

    /// Stable label for the node's JSON type, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self.value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Deep-copy this node into an independent [`Doc`].
    pub fn to_doc(&self) -> Doc {
        Doc::new(self.value.clone())
    }

    /// Render the node as JSON text.
    pub fn to_json(&self, pretty: bool) -> String {
        if pretty {
            serde_json::to_string_pretty(self.value).unwrap_or_else(|_| self.value.to_string())
        } else {
            self.value.to_string()
        }
    }

    /// Escape hatch for callers that need the raw tree.
    pub fn raw(&self) -> &'a Value {
        self.value
    }
}
