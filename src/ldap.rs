//! Sessions with a directory server
use std::{collections::HashSet, fmt, time::Duration};

use ldap3::{LdapConn, LdapError, Scope, SearchEntry, SearchOptions};
use tracing::{debug, info, warn};

use crate::{
	config::{Config, Deref},
	diff::Modification,
	entry::Entry,
	error::{self, Error, UpdateError},
};

/// The directory operations a [`Session`] is built on. Every method blocks
/// until the server answered and reports non-success results as
/// [`LdapError::LdapResult`].
pub trait Connection {
	/// Authenticate with a DN and password. Empty strings bind anonymously.
	fn simple_bind(&mut self, dn: &str, password: &str) -> Result<(), LdapError>;

	/// Search below `base`, returning the requested attributes (all user
	/// attributes if `attributes` is empty).
	fn search(
		&mut self,
		base: &str,
		scope: Scope,
		filter: &str,
		attributes: &[&str],
	) -> Result<Vec<SearchEntry>, LdapError>;

	/// Apply modifications to a single entry.
	fn modify(&mut self, dn: &str, modifications: Vec<Modification>) -> Result<(), LdapError>;

	/// Create an entry.
	fn add(
		&mut self,
		dn: &str,
		attributes: Vec<(Vec<u8>, HashSet<Vec<u8>>)>,
	) -> Result<(), LdapError>;

	/// Remove an entry.
	fn delete(&mut self, dn: &str) -> Result<(), LdapError>;

	/// Change the RDN of an entry, optionally moving it below a new parent.
	fn rename(
		&mut self,
		dn: &str,
		new_rdn: &str,
		delete_old_rdn: bool,
		new_superior: Option<&str>,
	) -> Result<(), LdapError>;

	/// End the session.
	fn unbind(&mut self) -> Result<(), LdapError>;
}

/// A [`Connection`] backed by the blocking `ldap3` client.
pub struct LdapConnection {
	/// The underlying client.
	inner: LdapConn,
	/// Timeout applied to every operation.
	operation_timeout: Duration,
	/// Alias dereferencing requested by every search.
	deref: Deref,
}

impl fmt::Debug for LdapConnection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("LdapConnection")
			.field("operation_timeout", &self.operation_timeout)
			.field("deref", &self.deref)
			.finish_non_exhaustive()
	}
}

impl LdapConnection {
	/// Open a connection to the server named in the configuration.
	pub fn connect(config: &Config) -> Result<Self, Error> {
		let settings = config.connection.to_settings()?;
		debug!("Connecting to directory server {}", config.url);
		let inner = LdapConn::from_url_with_settings(settings, &config.url)
			.map_err(Error::Connection)?;
		Ok(Self {
			inner,
			operation_timeout: config.connection.operation_timeout,
			deref: config.connection.deref,
		})
	}

	/// The client, armed with the operation timeout for its next request.
	fn timed(&mut self) -> &mut LdapConn {
		self.inner.with_timeout(self.operation_timeout)
	}
}

impl Connection for LdapConnection {
	fn simple_bind(&mut self, dn: &str, password: &str) -> Result<(), LdapError> {
		self.timed().simple_bind(dn, password)?.success()?;
		Ok(())
	}

	fn search(
		&mut self,
		base: &str,
		scope: Scope,
		filter: &str,
		attributes: &[&str],
	) -> Result<Vec<SearchEntry>, LdapError> {
		let options = SearchOptions::new().deref(self.deref.into());
		let (entries, _result) = self
			.timed()
			.with_search_options(options)
			.search(base, scope, filter, attributes.to_vec())?
			.success()?;
		Ok(entries.into_iter().map(SearchEntry::construct).collect())
	}

	fn modify(&mut self, dn: &str, modifications: Vec<Modification>) -> Result<(), LdapError> {
		let mods = modifications.into_iter().map(Modification::into_mod).collect();
		self.timed().modify(dn, mods)?.success()?;
		Ok(())
	}

	fn add(
		&mut self,
		dn: &str,
		attributes: Vec<(Vec<u8>, HashSet<Vec<u8>>)>,
	) -> Result<(), LdapError> {
		self.timed().add(dn, attributes)?.success()?;
		Ok(())
	}

	fn delete(&mut self, dn: &str) -> Result<(), LdapError> {
		self.timed().delete(dn)?.success()?;
		Ok(())
	}

	fn rename(
		&mut self,
		dn: &str,
		new_rdn: &str,
		delete_old_rdn: bool,
		new_superior: Option<&str>,
	) -> Result<(), LdapError> {
		self.timed().modifydn(dn, new_rdn, delete_old_rdn, new_superior)?.success()?;
		Ok(())
	}

	fn unbind(&mut self) -> Result<(), LdapError> {
		self.inner.unbind()
	}
}

/// A bound session with a directory server.
///
/// Entries returned by [`Session::search`] remember the attributes they were
/// read with; [`Session::update`] sends only what the caller changed since.
/// A session is meant for one caller at a time.
#[derive(Debug)]
pub struct Session<C: Connection = LdapConnection> {
	/// The bound connection, `None` once closed.
	connection: Option<C>,
}

impl Session<LdapConnection> {
	/// Connect to `url` and bind with the given DN and password.
	pub fn new(url: &str, bind_dn: &str, password: &str) -> Result<Self, Error> {
		Self::from_config(&Config::new(url, bind_dn, password)?)
	}

	/// Connect and bind as described by the configuration.
	pub fn from_config(config: &Config) -> Result<Self, Error> {
		let connection = LdapConnection::connect(config)?;
		Self::with_connection(connection, &config.bind_dn, &config.bind_password)
	}
}

impl<C: Connection> Session<C> {
	/// Bind over an already established connection.
	pub fn with_connection(
		mut connection: C,
		bind_dn: &str,
		password: &str,
	) -> Result<Self, Error> {
		connection.simple_bind(bind_dn, password).map_err(|err| {
			if error::is_rejection(&err) {
				Error::Authentication { dn: bind_dn.to_owned(), source: err }
			} else {
				Error::Connection(err)
			}
		})?;
		debug!("Bound as `{bind_dn}`");
		Ok(Self { connection: Some(connection) })
	}

	/// The connection, if the session is still bound.
	fn connection(&mut self) -> Result<&mut C, Error> {
		self.connection.as_mut().ok_or(Error::NotBound)
	}

	/// Search the subtree below `base` for entries matching `filter`. An empty
	/// attribute list requests all user attributes.
	pub fn search(
		&mut self,
		base: &str,
		filter: &str,
		attributes: &[&str],
	) -> Result<Vec<Entry>, Error> {
		self.search_with_scope(base, Scope::Subtree, filter, attributes)
	}

	/// Like [`Session::search`], with an explicit scope.
	pub fn search_with_scope(
		&mut self,
		base: &str,
		scope: Scope,
		filter: &str,
		attributes: &[&str],
	) -> Result<Vec<Entry>, Error> {
		debug!("Searching `{base}` for {filter}");
		let entries = self
			.connection()?
			.search(base, scope, filter, attributes)
			.map_err(|err| error::query_error(base, err))?;
		debug!("Search below `{base}` returned {} entries", entries.len());
		Ok(entries.into_iter().map(Entry::from).collect())
	}

	/// Write the changes made to each entry back to the directory.
	///
	/// Entries without changes are skipped. Each changed entry gets one modify
	/// request; on success its snapshot is refreshed so a repeated update is a
	/// no-op. A rejected entry does not stop the batch: all rejections are
	/// returned together as [`Error::Update`] once every entry was tried. A
	/// broken connection aborts the batch with [`Error::Connection`].
	///
	/// Returns the number of entries that were modified.
	pub fn update<'a, I>(&mut self, entries: I) -> Result<usize, Error>
	where
		I: IntoIterator<Item = &'a mut Entry>,
	{
		let connection = self.connection()?;
		let mut modified = 0;
		let mut failures = Vec::new();

		for entry in entries {
			let modifications = entry.modifications();
			if modifications.is_empty() {
				debug!("Nothing to modify in `{}`", entry.dn());
				continue;
			}

			debug!("Modifying `{}`: {modifications:?}", entry.dn());
			match connection.modify(entry.dn(), modifications) {
				Ok(()) => {
					info!("Modified `{}`", entry.dn());
					entry.commit();
					modified += 1;
				}
				Err(err) if error::is_rejection(&err) => {
					warn!("Modifying `{}` failed: {err}", entry.dn());
					failures.push(UpdateError { dn: entry.dn().to_owned(), source: err });
				}
				Err(err) => return Err(Error::Connection(err)),
			}
		}

		if failures.is_empty() {
			Ok(modified)
		} else {
			Err(Error::Update(failures))
		}
	}

	/// Create a new entry in the directory from all of its non-empty
	/// attributes.
	pub fn add(&mut self, entry: &mut Entry) -> Result<(), Error> {
		let attributes = entry
			.attributes()
			.iter()
			.filter(|(_, values)| !values.is_empty())
			.map(|(name, values)| {
				let values = values.iter().map(|value| value.as_bytes().to_vec()).collect();
				(name.as_bytes().to_vec(), values)
			})
			.collect();

		self.connection()?
			.add(entry.dn(), attributes)
			.map_err(|err| error::rejected("add", entry.dn(), err))?;
		info!("Added `{}`", entry.dn());
		entry.commit();
		Ok(())
	}

	/// Remove an entry from the directory.
	pub fn delete(&mut self, dn: &str) -> Result<(), Error> {
		self.connection()?.delete(dn).map_err(|err| error::rejected("delete", dn, err))?;
		info!("Deleted `{dn}`");
		Ok(())
	}

	/// Give an entry a new RDN, and optionally move it below `new_superior`.
	pub fn rename(
		&mut self,
		dn: &str,
		new_rdn: &str,
		new_superior: Option<&str>,
		delete_old_rdn: bool,
	) -> Result<(), Error> {
		self.connection()?
			.rename(dn, new_rdn, delete_old_rdn, new_superior)
			.map_err(|err| error::rejected("rename", dn, err))?;
		match new_superior {
			Some(parent) => info!("Renamed `{dn}` to `{new_rdn},{parent}`"),
			None => info!("Renamed `{dn}` to `{new_rdn}`"),
		}
		Ok(())
	}

	/// Collect the first value of `attribute` from every entry below `base`,
	/// sorted. Pass `"dn"` to collect the entries' DNs instead. The optional
	/// filter narrows the search further.
	pub fn attribute_values(
		&mut self,
		base: &str,
		attribute: &str,
		filter: Option<&str>,
	) -> Result<Vec<String>, Error> {
		let is_dn = attribute.eq_ignore_ascii_case("dn");
		let filter = match filter {
			Some(filter) if is_dn => filter.to_owned(),
			Some(filter) => format!("(&({attribute}=*){filter})"),
			None if is_dn => "(objectClass=*)".to_owned(),
			None => format!("({attribute}=*)"),
		};
		// 1.1 requests no attributes at all
		let requested = if is_dn { ["1.1"] } else { [attribute] };

		let mut values: Vec<String> = self
			.search(base, &filter, &requested)?
			.into_iter()
			.filter_map(|entry| {
				if is_dn {
					Some(entry.dn().to_owned())
				} else {
					entry.first_str(attribute).map(str::to_owned)
				}
			})
			.collect();
		values.sort();
		Ok(values)
	}

	/// Unbind and close the session. Later operations fail with
	/// [`Error::NotBound`].
	pub fn close(&mut self) -> Result<(), Error> {
		if let Some(mut connection) = self.connection.take() {
			debug!("Unbinding from directory server");
			connection.unbind().map_err(Error::Connection)?;
		}
		Ok(())
	}

	/// Whether the session is still bound.
	#[must_use]
	pub fn is_bound(&self) -> bool {
		self.connection.is_some()
	}
}

/// Check whether a DN and password are accepted by the server at `url`.
pub fn authenticate(url: &str, bind_dn: &str, password: &str) -> Result<(), Error> {
	let mut session = Session::new(url, bind_dn, password)?;
	session.close()
}
