//! Error codes
use ldap3::LdapError;

/// Errors that can occur when using this library
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// The session has been closed, or was never bound.
	#[error("Session is not bound to a directory server")]
	NotBound,
	/// The directory server could not be reached, or the connection broke
	/// while an operation was in flight.
	#[error("Connection to the directory server failed: {0}")]
	Connection(#[source] LdapError),
	/// The server refused the bind credentials.
	#[error("Bind as `{dn}` was rejected: {source}")]
	Authentication {
		/// The DN the bind was attempted with.
		dn: String,
		/// The result returned by the server.
		#[source]
		source: LdapError,
	},
	/// A search was refused, either because the filter did not parse or
	/// because the server answered with an error (bad base DN, limits, ...).
	#[error("Search below `{base}` failed: {source}")]
	Query {
		/// The search base.
		base: String,
		/// The underlying failure.
		#[source]
		source: LdapError,
	},
	/// Some entries of an update batch were rejected. Entries not listed
	/// here have been written successfully.
	#[error("{} entries could not be updated", .0.len())]
	Update(Vec<UpdateError>),
	/// A single add, delete or rename was rejected by the server.
	#[error("{operation} of `{dn}` was rejected: {source}")]
	Rejected {
		/// Name of the operation (`add`, `delete`, `rename`).
		operation: &'static str,
		/// The DN the operation targeted.
		dn: String,
		/// The result returned by the server.
		#[source]
		source: LdapError,
	},
	/// Invalid configuration or arguments.
	#[error("Invalid data: {0}")]
	Invalid(String),
	/// Reading TLS material from disk failed.
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// The rejection of one entry's modify operation.
#[derive(thiserror::Error, Debug)]
#[error("Modifying `{dn}` failed: {source}")]
pub struct UpdateError {
	/// DN of the entry the server refused to modify.
	pub dn: String,
	/// The result returned by the server.
	#[source]
	pub source: LdapError,
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// The server could not be reached or the session is not bound.
	Connection,
	/// Bind credentials were rejected.
	Authentication,
	/// A search failed.
	Query,
	/// A write operation was rejected.
	Update,
	/// Local configuration or argument problem.
	Configuration,
}

impl Error {
	/// Classify this error.
	#[must_use]
	pub fn kind(&self) -> ErrorKind {
		match self {
			Error::NotBound | Error::Connection(_) => ErrorKind::Connection,
			Error::Authentication { .. } => ErrorKind::Authentication,
			Error::Query { .. } => ErrorKind::Query,
			Error::Update(_) | Error::Rejected { .. } => ErrorKind::Update,
			Error::Invalid(_) | Error::Io(_) => ErrorKind::Configuration,
		}
	}
}

/// Whether the error is an answer from the server, as opposed to a failure
/// of the transport.
pub(crate) fn is_rejection(err: &LdapError) -> bool {
	matches!(err, LdapError::LdapResult { .. })
}

/// Convert a failed search into an [`Error`].
pub(crate) fn query_error(base: &str, err: LdapError) -> Error {
	match err {
		LdapError::LdapResult { .. } | LdapError::FilterParsing => {
			Error::Query { base: base.to_owned(), source: err }
		}
		err => Error::Connection(err),
	}
}

/// Convert a failed write operation into an [`Error`].
pub(crate) fn rejected(operation: &'static str, dn: &str, err: LdapError) -> Error {
	if is_rejection(&err) || matches!(err, LdapError::AddNoValues) {
		Error::Rejected { operation, dn: dn.to_owned(), source: err }
	} else {
		Error::Connection(err)
	}
}

#[cfg(test)]
mod tests {
	use ldap3::{LdapError, LdapResult};

	use super::{query_error, rejected, Error, ErrorKind};

	fn server_error(rc: u32) -> LdapError {
		LdapError::LdapResult {
			result: LdapResult {
				rc,
				matched: String::new(),
				text: String::new(),
				refs: Vec::new(),
				ctrls: Vec::new(),
			},
		}
	}

	#[test]
	fn search_failures_are_classified() {
		let base = "ou=people,dc=example,dc=org";
		assert_eq!(query_error(base, server_error(87)).kind(), ErrorKind::Query);
		assert_eq!(query_error(base, LdapError::FilterParsing).kind(), ErrorKind::Query);
		assert_eq!(query_error(base, LdapError::EndOfStream).kind(), ErrorKind::Connection);
	}

	#[test]
	fn write_failures_are_classified() {
		let dn = "uid=jdoe,ou=people,dc=example,dc=org";
		assert!(matches!(
			rejected("delete", dn, server_error(50)),
			Error::Rejected { operation: "delete", .. }
		));
		assert!(matches!(rejected("delete", dn, LdapError::EndOfStream), Error::Connection(_)));
		assert_eq!(Error::NotBound.kind(), ErrorKind::Connection);
		assert_eq!(Error::Update(Vec::new()).kind(), ErrorKind::Update);
	}
}
