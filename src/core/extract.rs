//! Purpose: Typed field extraction with a closed outcome set.
//! Exports: `Extractor`, `FromField`, `FieldType`, `in_range`.
//! Role: The extraction protocol. Resolves the target type, converts
//! the node, validates, and applies defaults; every failure carries
//! one of the `ErrorKind` outcomes and is recorded on the diagnostics
//! context exactly once.
//! Invariants: results are all-or-nothing; a failed composite
//! extraction yields no partial value.
//! Invariants: a missing field is only left unrecorded while a
//! default substitution is in flight.

use std::str::FromStr;

use serde_json::Value;

use crate::core::diag::Diagnostics;
use crate::core::doc::{Doc, DocRef};
use crate::core::error::{Error, ErrorKind};

/// Conversion from one document field to a typed value.
///
/// Implemented for the closed set of extraction targets: `String`,
/// `i64`, `u64`, `bool`, `Vec<String>` and [`Doc`]. The target type
/// picks the conversion at compile time; dynamic callers go through
/// [`FieldType`] instead.
pub trait FromField: Sized {
    fn from_field(ex: &Extractor<'_>, field: &str) -> Result<Self, Error>;
}

/// A borrowed view over one document plus the diagnostics context
/// extraction failures are recorded on. Cheap to copy; one per
/// document (or per subtree via [`DocRef::fields`]).
#[derive(Clone, Copy)]
pub struct Extractor<'a> {
    doc: DocRef<'a>,
    diag: &'a Diagnostics,
    verbose: bool,
    report_missing: bool,
}

impl<'a> Extractor<'a> {
    pub fn new(doc: DocRef<'a>, diag: &'a Diagnostics) -> Self {
        Extractor { doc, diag, verbose: true, report_missing: true }
    }

    /// Drop per-field success notes; failures are still recorded.
    pub fn silent(self) -> Self {
        Extractor { verbose: false, ..self }
    }

    /// Extract `field` as `T`, owned.
    pub fn get<T: FromField>(&self, field: &str) -> Result<T, Error> {
        T::from_field(self, field)
    }

    /// Extract `field` as `T`; a missing field yields `default`
    /// instead of `NotFound`. Only absence is papered over: type
    /// mismatches and every other failure still surface.
    pub fn get_or<T: FromField>(&self, field: &str, default: T) -> Result<T, Error> {
        match T::from_field(&self.quiet_missing(), field) {
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.note(|| format!("field '{field}' missing, default applied"));
                Ok(default)
            }
            other => other,
        }
    }

    /// Extract `field` as `T`, then run a domain check on the value.
    /// A rejected value fails with `Mismatch` and the checker's own
    /// wording.
    pub fn get_checked<T, F>(&self, field: &str, check: F) -> Result<T, Error>
    where
        T: FromField,
        F: FnOnce(&T) -> Result<(), String>,
    {
        let value = T::from_field(self, field)?;
        if let Err(reason) = check(&value) {
            return Err(self.fail(
                Error::new(ErrorKind::Mismatch).with_field(field).with_message(reason),
            ));
        }
        Ok(value)
    }

    /// [`Extractor::get_checked`] with a default for missing fields.
    /// The default bypasses the check; it is the caller's own value.
    pub fn get_checked_or<T, F>(&self, field: &str, check: F, default: T) -> Result<T, Error>
    where
        T: FromField,
        F: FnOnce(&T) -> Result<(), String>,
    {
        match self.quiet_missing().get_checked(field, check) {
            Err(err) if err.kind() == ErrorKind::NotFound => {
                self.note(|| format!("field '{field}' missing, default applied"));
                Ok(default)
            }
            other => other,
        }
    }

    /// Borrow `field`'s string without copying. The slice lives as
    /// long as the document, which stays immutable behind `&self`.
    pub fn borrowed_str(&self, field: &str) -> Result<&'a str, Error> {
        let node = self.lookup(field)?;
        let text = match node.as_str() {
            Some(text) => text,
            None => return Err(self.mismatch(field, "string", node)),
        };
        self.note(|| format!("string '{text}' extracted from field '{field}'"));
        Ok(text)
    }

    /// Borrow `field`'s node itself, whatever its JSON type.
    pub fn borrowed_node(&self, field: &str) -> Result<DocRef<'a>, Error> {
        let node = self.lookup(field)?;
        self.note(|| format!("subtree borrowed from field '{field}'"));
        Ok(node)
    }

    /// Copy `field`'s string into a caller-owned buffer, appending a
    /// trailing NUL. The buffer must hold the string plus the NUL or
    /// the call fails with `BufferTooSmall` and leaves the buffer
    /// untouched. Returns the string length in bytes, NUL excluded.
    pub fn fixed_str(&self, field: &str, dest: &mut [u8]) -> Result<usize, Error> {
        let node = self.lookup(field)?;
        let text = match node.as_str() {
            Some(text) => text,
            None => return Err(self.mismatch(field, "string", node)),
        };
        let written =
            copy_nul_terminated(text, dest).map_err(|err| self.fail(err.with_field(field)))?;
        self.note(|| format!("string '{text}' extracted from field '{field}'"));
        Ok(written)
    }

    /// [`Extractor::fixed_str`] with a default for missing fields.
    /// The default is subject to the same capacity check.
    pub fn fixed_str_or(
        &self,
        field: &str,
        default: &str,
        dest: &mut [u8],
    ) -> Result<usize, Error> {
        match self.quiet_missing().fixed_str(field, dest) {
            Err(err) if err.kind() == ErrorKind::NotFound => {
                let written = copy_nul_terminated(default, dest).map_err(|err| {
                    self.fail(err.with_field(field).with_message(format!(
                        "buffer is too small to contain default value '{default}'"
                    )))
                })?;
                self.note(|| format!("field '{field}' missing, default applied"));
                Ok(written)
            }
            other => other,
        }
    }

    /// Extract with the target type picked at runtime, yielding the
    /// value re-wrapped as a JSON node.
    pub fn get_tagged(&self, field: &str, ty: FieldType) -> Result<Value, Error> {
        match ty {
            FieldType::String => self.get::<String>(field).map(Value::String),
            FieldType::Int => self.get::<i64>(field).map(Value::from),
            FieldType::Uint => self.get::<u64>(field).map(Value::from),
            FieldType::Bool => self.get::<bool>(field).map(Value::Bool),
            FieldType::Strings => self
                .get::<Vec<String>>(field)
                .map(|items| Value::Array(items.into_iter().map(Value::String).collect())),
            FieldType::Json => self.get::<Doc>(field).map(Doc::into_value),
        }
    }

    /// [`Extractor::get_tagged`] with a default for missing fields.
    /// The default must itself fit `ty`, else `InvalidParam`.
    pub fn get_tagged_or(
        &self,
        field: &str,
        ty: FieldType,
        default: &Value,
    ) -> Result<Value, Error> {
        match self.quiet_missing().get_tagged(field, ty) {
            Err(err) if err.kind() == ErrorKind::NotFound => {
                if !default_matches(ty, default) {
                    return Err(self.fail(
                        Error::new(ErrorKind::InvalidParam).with_field(field).with_message(
                            format!("default value does not fit type '{}'", ty.label()),
                        ),
                    ));
                }
                self.note(|| format!("field '{field}' missing, default applied"));
                Ok(default.clone())
            }
            other => other,
        }
    }

    fn quiet_missing(&self) -> Self {
        Extractor { report_missing: false, ..*self }
    }

    fn lookup(&self, field: &str) -> Result<DocRef<'a>, Error> {
        match self.doc.child(field) {
            Some(node) => Ok(node),
            None => Err(self.fail(
                Error::new(ErrorKind::NotFound)
                    .with_field(field)
                    .with_message(format!("field '{field}' not found")),
            )),
        }
    }

    fn mismatch(&self, field: &str, expected: &str, node: DocRef<'_>) -> Error {
        self.fail(Error::new(ErrorKind::Mismatch).with_field(field).with_message(format!(
            "expected {expected} at field '{field}', got {}",
            node.kind()
        )))
    }

    fn fail(&self, err: Error) -> Error {
        self.diag.report_extraction(&err, self.report_missing);
        err
    }

    fn note<F: FnOnce() -> String>(&self, text: F) {
        if self.verbose {
            self.diag.info(&text());
        }
    }
}

impl Doc {
    /// Start extracting fields from the document root.
    pub fn fields<'a>(&'a self, diag: &'a Diagnostics) -> Extractor<'a> {
        Extractor::new(self.root(), diag)
    }
}

impl<'a> DocRef<'a> {
    /// Start extracting fields from this node.
    pub fn fields(self, diag: &'a Diagnostics) -> Extractor<'a> {
        Extractor::new(self, diag)
    }
}

impl FromField for String {
    fn from_field(ex: &Extractor<'_>, field: &str) -> Result<Self, Error> {
        ex.borrowed_str(field).map(str::to_owned)
    }
}

impl FromField for i64 {
    fn from_field(ex: &Extractor<'_>, field: &str) -> Result<Self, Error> {
        let node = ex.lookup(field)?;
        let num = match node.as_i64() {
            Some(num) => num,
            None => return Err(ex.mismatch(field, "integer", node)),
        };
        ex.note(|| format!("int '{num}' extracted from field '{field}'"));
        Ok(num)
    }
}

impl FromField for u64 {
    fn from_field(ex: &Extractor<'_>, field: &str) -> Result<Self, Error> {
        let node = ex.lookup(field)?;
        let num = match node.as_u64() {
            Some(num) => num,
            // A signed reading that failed the unsigned one can only
            // be negative.
            None => match node.as_i64() {
                Some(neg) => {
                    return Err(ex.fail(
                        Error::new(ErrorKind::Mismatch).with_field(field).with_message(
                            format!("expected a positive value at field '{field}', got {neg}"),
                        ),
                    ));
                }
                None => return Err(ex.mismatch(field, "unsigned integer", node)),
            },
        };
        ex.note(|| format!("uint '{num}' extracted from field '{field}'"));
        Ok(num)
    }
}

impl FromField for bool {
    fn from_field(ex: &Extractor<'_>, field: &str) -> Result<Self, Error> {
        let node = ex.lookup(field)?;
        let flag = match node.as_bool() {
            Some(flag) => flag,
            None => return Err(ex.mismatch(field, "boolean", node)),
        };
        ex.note(|| format!("bool '{flag}' extracted from field '{field}'"));
        Ok(flag)
    }
}

impl FromField for Vec<String> {
    fn from_field(ex: &Extractor<'_>, field: &str) -> Result<Self, Error> {
        let node = ex.lookup(field)?;
        let elements = match node.elements() {
            Some(elements) => elements,
            None => return Err(ex.mismatch(field, "array", node)),
        };
        let mut out = Vec::new();
        out.try_reserve_exact(elements.len()).map_err(|_| {
            ex.fail(Error::new(ErrorKind::NoMemory).with_field(field).with_message(format!(
                "unable to reserve {} entries for field '{field}'",
                elements.len()
            )))
        })?;
        for (index, element) in elements.enumerate() {
            match element.as_str() {
                Some(text) => out.push(text.to_owned()),
                None => {
                    return Err(ex.fail(
                        Error::new(ErrorKind::Mismatch).with_field(field).with_message(format!(
                            "element {index} of field '{field}' is not a string (got {})",
                            element.kind()
                        )),
                    ));
                }
            }
        }
        ex.note(|| format!("{} strings extracted from field '{field}'", out.len()));
        Ok(out)
    }
}

impl FromField for Doc {
    fn from_field(ex: &Extractor<'_>, field: &str) -> Result<Self, Error> {
        let node = ex.lookup(field)?;
        ex.note(|| format!("subtree cloned from field '{field}'"));
        Ok(node.to_doc())
    }
}

/// Runtime type tag for dynamic callers (CLI arguments, the C
/// surface). Statically typed callers use [`FromField`] and never
/// touch this.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldType {
    String,
    Int,
    Uint,
    Bool,
    Strings,
    Json,
}

impl FieldType {
    pub fn label(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Int => "int",
            FieldType::Uint => "uint",
            FieldType::Bool => "bool",
            FieldType::Strings => "strings",
            FieldType::Json => "json",
        }
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "string" | "str" => Ok(FieldType::String),
            "int" => Ok(FieldType::Int),
            "uint" => Ok(FieldType::Uint),
            "bool" => Ok(FieldType::Bool),
            "strings" => Ok(FieldType::Strings),
            "json" => Ok(FieldType::Json),
            other => Err(Error::new(ErrorKind::InvalidParam)
                .with_message(format!("unknown field type '{other}'"))
                .with_hint("expected one of: string, int, uint, bool, strings, json")),
        }
    }
}

/// Closed-interval domain check for [`Extractor::get_checked`].
pub fn in_range(lo: u64, hi: u64) -> impl Fn(&u64) -> Result<(), String> {
    move |value| {
        if (lo..=hi).contains(value) {
            Ok(())
        } else {
            Err(format!("expected a value between [{lo}, {hi}], got {value}"))
        }
    }
}

fn default_matches(ty: FieldType, value: &Value) -> bool {
    match ty {
        FieldType::String => value.is_string(),
        FieldType::Int => value.as_i64().is_some(),
        FieldType::Uint => value.as_u64().is_some(),
        FieldType::Bool => value.is_boolean(),
        FieldType::Strings => {
            value.as_array().is_some_and(|items| items.iter().all(Value::is_string))
        }
        FieldType::Json => true,
    }
}

fn copy_nul_terminated(text: &str, dest: &mut [u8]) -> Result<usize, Error> {
    let needed = text.len() + 1;
    if needed > dest.len() {
        return Err(Error::new(ErrorKind::BufferTooSmall).with_message(format!(
            "destination of {} bytes cannot hold {} bytes",
            dest.len(),
            needed
        )));
    }
    dest[..text.len()].copy_from_slice(text.as_bytes());
    dest[text.len()] = 0;
    Ok(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> Doc {
        Doc::new(json!({
            "name": "alice",
            "count": -3,
            "node": 7,
            "big": u64::MAX,
            "ready": true,
            "tags": ["a", "b", "c"],
            "mixed": ["a", 3],
            "inner": {"deep": 1},
        }))
    }

    #[test]
    fn string_extracts_owned_value() {
        let diag = Diagnostics::new();
        let doc = doc();
        let name: String = doc.fields(&diag).get("name").unwrap();
        assert_eq!(name, "alice");
    }

    #[test]
    fn missing_field_is_not_found_and_recorded() {
        let diag = Diagnostics::new();
        let doc = doc();
        let err = doc.fields(&diag).get::<String>("absent").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.field(), Some("absent"));
        assert!(diag.last_message().unwrap().contains("absent"));
    }

    #[test]
    fn wrong_type_is_mismatch_with_both_kinds() {
        let diag = Diagnostics::new();
        let doc = doc();
        let err = doc.fields(&diag).get::<String>("count").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mismatch);
        let text = err.message().unwrap();
        assert!(text.contains("string") && text.contains("number"), "{text}");
    }

    #[test]
    fn int_reads_signed_values() {
        let diag = Diagnostics::new();
        let doc = doc();
        assert_eq!(doc.fields(&diag).get::<i64>("count").unwrap(), -3);
    }

    #[test]
    fn int_rejects_fractional_numbers() {
        let diag = Diagnostics::new();
        let doc = Doc::new(json!({"ratio": 1.5}));
        let err = doc.fields(&diag).get::<i64>("ratio").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mismatch);
    }

    #[test]
    fn uint_rejects_negative_values() {
        let diag = Diagnostics::new();
        let doc = doc();
        let err = doc.fields(&diag).get::<u64>("count").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mismatch);
        assert!(err.message().unwrap().contains("positive"));
    }

    #[test]
    fn uint_accepts_values_above_i64_max() {
        let diag = Diagnostics::new();
        let doc = doc();
        assert_eq!(doc.fields(&diag).get::<u64>("big").unwrap(), u64::MAX);
    }

    #[test]
    fn bool_extracts_and_rejects_numbers() {
        let diag = Diagnostics::new();
        let doc = doc();
        assert!(doc.fields(&diag).get::<bool>("ready").unwrap());
        let err = doc.fields(&diag).get::<bool>("node").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mismatch);
    }

    #[test]
    fn get_or_substitutes_on_missing_only() {
        let diag = Diagnostics::new();
        let doc = doc();
        let ex = doc.fields(&diag);
        assert_eq!(ex.get_or::<i64>("absent", 42).unwrap(), 42);
        // A present field keeps its own value.
        assert_eq!(ex.get_or::<i64>("count", 42).unwrap(), -3);
        // A mismatch is not papered over by the default.
        let err = ex.get_or::<i64>("name", 42).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mismatch);
    }

    #[test]
    fn get_or_does_not_record_the_missing_field() {
        let diag = Diagnostics::new();
        let doc = doc();
        doc.fields(&diag).get_or::<i64>("absent", 42).unwrap();
        assert_eq!(diag.last_message(), None);
    }

    #[test]
    fn get_checked_accepts_in_range_values() {
        let diag = Diagnostics::new();
        let doc = doc();
        let node: u64 = doc.fields(&diag).get_checked("node", in_range(1, 64)).unwrap();
        assert_eq!(node, 7);
    }

    #[test]
    fn get_checked_rejects_with_the_checker_wording() {
        let diag = Diagnostics::new();
        let doc = doc();
        let err = doc.fields(&diag).get_checked::<u64, _>("node", in_range(10, 64)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mismatch);
        assert!(err.message().unwrap().contains("[10, 64]"));
    }

    #[test]
    fn get_checked_or_checks_the_value_but_not_the_default() {
        let diag = Diagnostics::new();
        let doc = doc();
        let ex = doc.fields(&diag);
        assert_eq!(ex.get_checked_or("absent", in_range(1, 4), 9).unwrap(), 9);
        let err = ex.get_checked_or("node", in_range(1, 4), 9).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mismatch);
    }

    #[test]
    fn strings_extracts_whole_arrays() {
        let diag = Diagnostics::new();
        let doc = doc();
        let tags: Vec<String> = doc.fields(&diag).get("tags").unwrap();
        assert_eq!(tags, ["a", "b", "c"]);
    }

    #[test]
    fn strings_is_all_or_nothing() {
        let diag = Diagnostics::new();
        let doc = doc();
        let err = doc.fields(&diag).get::<Vec<String>>("mixed").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mismatch);
        assert!(err.message().unwrap().contains("element 1"));
    }

    #[test]
    fn strings_on_non_array_is_mismatch() {
        let diag = Diagnostics::new();
        let doc = doc();
        let err = doc.fields(&diag).get::<Vec<String>>("name").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Mismatch);
    }

    #[test]
    fn subtree_clone_outlives_the_source() {
        let diag = Diagnostics::new();
        let inner: Doc = {
            let doc = doc();
            doc.fields(&diag).get("inner").unwrap()
        };
        assert_eq!(inner.root().child("deep").and_then(|n| n.as_i64()), Some(1));
    }

    #[test]
    fn borrowed_str_points_into_the_document() {
        let diag = Diagnostics::new();
        let doc = doc();
        let name = doc.fields(&diag).borrowed_str("name").unwrap();
        assert_eq!(name, "alice");
    }

    #[test]
    fn borrowed_node_accepts_any_json_type() {
        let diag = Diagnostics::new();
        let doc = doc();
        let node = doc.fields(&diag).borrowed_node("tags").unwrap();
        assert_eq!(node.kind(), "array");
    }

    #[test]
    fn fixed_str_writes_value_and_nul() {
        let diag = Diagnostics::new();
        let doc = doc();
        let mut buf = [0xffu8; 6];
        let written = doc.fields(&diag).fixed_str("name", &mut buf).unwrap();
        assert_eq!(written, 5);
        assert_eq!(&buf[..5], b"alice");
        assert_eq!(buf[5], 0);
    }

    #[test]
    fn fixed_str_needs_room_for_the_nul() {
        let diag = Diagnostics::new();
        let doc = doc();
        let mut buf = [0xffu8; 5];
        let err = doc.fields(&diag).fixed_str("name", &mut buf).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BufferTooSmall);
        // Nothing was written.
        assert_eq!(buf, [0xffu8; 5]);
    }

    #[test]
    fn fixed_str_or_applies_and_checks_the_default() {
        let diag = Diagnostics::new();
        let doc = doc();
        let mut buf = [0u8; 8];
        let written = doc.fields(&diag).fixed_str_or("absent", "fallback", &mut buf);
        assert_eq!(written.unwrap_err().kind(), ErrorKind::BufferTooSmall);

        let mut buf = [0u8; 9];
        let written = doc.fields(&diag).fixed_str_or("absent", "fallback", &mut buf).unwrap();
        assert_eq!(written, 8);
        assert_eq!(&buf[..8], b"fallback");
    }

    #[test]
    fn tagged_dispatch_covers_every_type() {
        let diag = Diagnostics::new();
        let doc = doc();
        let ex = doc.fields(&diag);
        assert_eq!(ex.get_tagged("name", FieldType::String).unwrap(), json!("alice"));
        assert_eq!(ex.get_tagged("count", FieldType::Int).unwrap(), json!(-3));
        assert_eq!(ex.get_tagged("node", FieldType::Uint).unwrap(), json!(7));
        assert_eq!(ex.get_tagged("ready", FieldType::Bool).unwrap(), json!(true));
        assert_eq!(ex.get_tagged("tags", FieldType::Strings).unwrap(), json!(["a", "b", "c"]));
        assert_eq!(ex.get_tagged("inner", FieldType::Json).unwrap(), json!({"deep": 1}));
    }

    #[test]
    fn tagged_default_must_fit_the_type() {
        let diag = Diagnostics::new();
        let doc = doc();
        let ex = doc.fields(&diag);
        let err = ex.get_tagged_or("absent", FieldType::Int, &json!("five")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParam);
        assert_eq!(ex.get_tagged_or("absent", FieldType::Int, &json!(5)).unwrap(), json!(5));
    }

    #[test]
    fn field_type_parses_its_labels() {
        for (text, ty) in [
            ("string", FieldType::String),
            ("str", FieldType::String),
            ("int", FieldType::Int),
            ("uint", FieldType::Uint),
            ("bool", FieldType::Bool),
            ("strings", FieldType::Strings),
            ("json", FieldType::Json),
        ] {
            assert_eq!(text.parse::<FieldType>().unwrap(), ty);
        }
        let err = "float".parse::<FieldType>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParam);
    }
}
