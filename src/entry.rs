//! In-memory copies of directory entries.
use std::{collections::BTreeMap, fmt};

use ldap3::SearchEntry;

use crate::{
	diff::{self, Modification},
	error::Error,
};

/// Attribute name to ordered list of values.
pub type Attributes = BTreeMap<String, Vec<Value>>;

/// A single attribute value. LDAP values are octet strings; most of them
/// happen to be UTF-8 text.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Value(Vec<u8>);

impl Value {
	/// The raw bytes of the value.
	#[must_use]
	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	/// The value as text, or `None` if it isn't valid UTF-8.
	#[must_use]
	pub fn as_str(&self) -> Option<&str> {
		std::str::from_utf8(&self.0).ok()
	}

	/// Consume the value, returning its bytes.
	#[must_use]
	pub fn into_bytes(self) -> Vec<u8> {
		self.0
	}
}

impl fmt::Debug for Value {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.as_str() {
			Some(text) => fmt::Debug::fmt(text, f),
			None => write!(f, "{:x?}", self.0),
		}
	}
}

impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self(value.as_bytes().to_vec())
	}
}

impl From<String> for Value {
	fn from(value: String) -> Self {
		Self(value.into_bytes())
	}
}

impl From<&String> for Value {
	fn from(value: &String) -> Self {
		Self::from(value.as_str())
	}
}

impl From<Vec<u8>> for Value {
	fn from(value: Vec<u8>) -> Self {
		Self(value)
	}
}

impl From<&[u8]> for Value {
	fn from(value: &[u8]) -> Self {
		Self(value.to_vec())
	}
}

impl PartialEq<str> for Value {
	fn eq(&self, other: &str) -> bool {
		self.0 == other.as_bytes()
	}
}

impl PartialEq<&str> for Value {
	fn eq(&self, other: &&str) -> bool {
		self.0 == other.as_bytes()
	}
}

/// One directory object: its DN, its current attributes, and a snapshot of
/// the attributes as they were last read from (or written to) the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
	/// Distinguished name, never empty.
	dn: String,
	/// Attributes as edited by the caller.
	attributes: Attributes,
	/// Attributes as last seen on the server.
	original: Attributes,
}

impl Entry {
	/// Create an entry that does not exist in the directory yet. Store it with
	/// [`Session::add`](crate::ldap::Session::add).
	pub fn new(dn: impl Into<String>) -> Result<Self, Error> {
		let dn = dn.into();
		if dn.trim().is_empty() {
			return Err(Error::Invalid("An entry needs a non-empty DN".to_owned()));
		}
		Ok(Self { dn, attributes: Attributes::new(), original: Attributes::new() })
	}

	/// Build an entry whose snapshot equals its attributes.
	pub(crate) fn from_attributes(dn: String, attributes: Attributes) -> Self {
		Self { dn, original: attributes.clone(), attributes }
	}

	/// The distinguished name of the entry.
	#[must_use]
	pub fn dn(&self) -> &str {
		&self.dn
	}

	/// Names of all attributes currently holding at least one value.
	pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
		self.attributes
			.iter()
			.filter(|(_, values)| !values.is_empty())
			.map(|(name, _)| name.as_str())
	}

	/// The current values of an attribute; empty if it is absent.
	#[must_use]
	pub fn get(&self, name: &str) -> &[Value] {
		match lookup(&self.attributes, name) {
			Some((_, values)) => values,
			None => &[],
		}
	}

	/// The values of an attribute that are valid UTF-8.
	#[must_use]
	pub fn get_str(&self, name: &str) -> Vec<&str> {
		self.get(name).iter().filter_map(Value::as_str).collect()
	}

	/// The first value of an attribute.
	#[must_use]
	pub fn first(&self, name: &str) -> Option<&Value> {
		self.get(name).first()
	}

	/// The first value of an attribute as text. Returns `None` if the attribute
	/// is absent or its first value isn't valid UTF-8.
	#[must_use]
	pub fn first_str(&self, name: &str) -> Option<&str> {
		self.first(name).and_then(Value::as_str)
	}

	/// Replace the values of an attribute. Setting an empty list removes the
	/// attribute on the next update.
	pub fn set<I, V>(&mut self, name: &str, values: I)
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		let values: Vec<Value> = values.into_iter().map(Into::into).collect();
		let key = lookup(&self.attributes, name)
			.or_else(|| lookup(&self.original, name))
			.map_or_else(|| name.to_owned(), |(key, _)| key.clone());
		self.attributes.insert(key, values);
	}

	/// Replace the values of an attribute with a single value.
	pub fn set_one(&mut self, name: &str, value: impl Into<Value>) {
		self.set(name, [value]);
	}

	/// The modify operations needed to bring the server in line with this
	/// entry. Empty when nothing changed since the last read or write.
	#[must_use]
	pub fn modifications(&self) -> Vec<Modification> {
		diff::modifications(&self.original, &self.attributes)
	}

	/// Whether any attribute differs from the snapshot.
	#[must_use]
	pub fn is_modified(&self) -> bool {
		!self.modifications().is_empty()
	}

	/// All current attributes, including emptied ones.
	pub(crate) fn attributes(&self) -> &Attributes {
		&self.attributes
	}

	/// Record that the server now holds the current attributes.
	pub(crate) fn commit(&mut self) {
		self.attributes.retain(|_, values| !values.is_empty());
		self.original = self.attributes.clone();
	}
}

impl fmt::Display for Entry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "DN: {}", self.dn)
	}
}

impl From<SearchEntry> for Entry {
	fn from(entry: SearchEntry) -> Self {
		let mut attributes = Attributes::new();
		for (name, values) in entry.attrs {
			attributes.entry(name).or_default().extend(values.into_iter().map(Value::from));
		}
		for (name, values) in entry.bin_attrs {
			attributes.entry(name).or_default().extend(values.into_iter().map(Value::from));
		}
		Self::from_attributes(entry.dn, attributes)
	}
}

/// Find an attribute by name, ignoring ASCII case.
pub(crate) fn lookup<'a>(
	attributes: &'a Attributes,
	name: &str,
) -> Option<(&'a String, &'a Vec<Value>)> {
	attributes
		.get_key_value(name)
		.or_else(|| attributes.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)))
}
