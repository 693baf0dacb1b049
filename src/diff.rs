//! Snapshot comparison to find out which attributes of an entry changed
use std::collections::HashSet;

use ldap3::Mod;

use crate::entry::{lookup, Attributes, Value};

/// A change to a single attribute of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
	/// The attribute did not exist before and now has these values.
	Add {
		/// Attribute name.
		attribute: String,
		/// Values to add, in the caller's order.
		values: Vec<Value>,
	},
	/// The attribute existed before and has been emptied.
	Delete {
		/// Attribute name.
		attribute: String,
	},
	/// The attribute's values changed.
	Replace {
		/// Attribute name.
		attribute: String,
		/// The complete new value list.
		values: Vec<Value>,
	},
}

impl Modification {
	/// Name of the attribute this modification targets.
	#[must_use]
	pub fn attribute(&self) -> &str {
		match self {
			Modification::Add { attribute, .. }
			| Modification::Delete { attribute }
			| Modification::Replace { attribute, .. } => attribute,
		}
	}

	/// Convert into the form `ldap3` sends over the wire. The protocol treats
	/// values as a set, so their order is not transmitted.
	pub(crate) fn into_mod(self) -> Mod<Vec<u8>> {
		fn set(values: Vec<Value>) -> HashSet<Vec<u8>> {
			values.into_iter().map(Value::into_bytes).collect()
		}

		match self {
			Modification::Add { attribute, values } => Mod::Add(attribute.into_bytes(), set(values)),
			Modification::Delete { attribute } => Mod::Delete(attribute.into_bytes(), HashSet::new()),
			Modification::Replace { attribute, values } => {
				Mod::Replace(attribute.into_bytes(), set(values))
			}
		}
	}
}

/// Compute the modifications turning `original` into `current`.
///
/// Attributes that are new get an add, emptied or dropped ones a delete, and
/// attributes whose value set differs a replace. A pure reordering of values
/// is not a change, since the directory stores values as a set.
pub(crate) fn modifications(original: &Attributes, current: &Attributes) -> Vec<Modification> {
	let mut modifications = Vec::new();

	for (attribute, values) in current {
		let before = lookup(original, attribute).map_or(&[][..], |(_, values)| values.as_slice());
		match (before.is_empty(), values.is_empty()) {
			(true, true) => {}
			(true, false) => modifications
				.push(Modification::Add { attribute: attribute.clone(), values: values.clone() }),
			(false, true) => modifications.push(Modification::Delete { attribute: attribute.clone() }),
			(false, false) => {
				if !same_values(before, values) {
					modifications.push(Modification::Replace {
						attribute: attribute.clone(),
						values: values.clone(),
					});
				}
			}
		}
	}

	for (attribute, values) in original {
		if !values.is_empty() && lookup(current, attribute).is_none() {
			modifications.push(Modification::Delete { attribute: attribute.clone() });
		}
	}

	modifications
}

/// Compare two value lists as multisets.
fn same_values(a: &[Value], b: &[Value]) -> bool {
	if a.len() != b.len() {
		return false;
	}
	let mut a = a.iter().collect::<Vec<_>>();
	let mut b = b.iter().collect::<Vec<_>>();
	a.sort_unstable();
	b.sort_unstable();
	a == b
}
