//! Search a directory server and write attribute edits back to it.
//!
//! A [`Session`] binds to an LDAP server and returns search results as
//! [`Entry`] values. An entry keeps a snapshot of the attributes it was read
//! with, so once the caller changed some of them, [`Session::update`] sends
//! exactly the add, delete and replace operations needed, and nothing for
//! entries that were left alone.
//!
//! For a general primer on LDAP, the [introduction] in the `ldap3` crate which
//! is used here for interfacing with LDAP is an excellent resource.
//!
//! [introduction]: https://github.com/inejge/ldap3/blob/master/LDAP-primer.md
//!
//! # Getting started
//! ```no_run
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use ldap_helper::Session;
//!
//! let mut session = Session::new("ldap://localhost", "cn=admin,dc=example,dc=tld", "verysecret")?;
//!
//! let mut entries = session.search(
//!     "ou=people,dc=example,dc=tld",
//!     "(&(objectClass=inetOrgPerson)(title=Developer))",
//!     &["uid", "displayName", "title"],
//! )?;
//! for entry in &mut entries {
//!     println!("{entry}: {:?}", entry.get("displayName"));
//!     entry.set("title", ["Development"]);
//! }
//! session.update(&mut entries)?;
//! session.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Limitations
//! * Operations block the calling thread. A session is not meant to be shared
//!   between threads; open one per worker instead.
//! * The directory stores multi-valued attributes as sets. Value order is kept
//!   in memory but not transmitted, and reordering values alone is not
//!   considered a change.
//! * An update batch keeps going after an entry was rejected, but stops at
//!   the first transport failure.

pub mod config;
pub mod diff;
pub mod entry;
pub mod error;
pub mod ldap;
mod ldif;

pub use ldap3::{self, Scope, SearchEntry};

pub use crate::{
	config::{Config, ConnectionConfig, Deref, TLSConfig},
	diff::Modification,
	entry::{Attributes, Entry, Value},
	error::{Error, ErrorKind, UpdateError},
	ldap::{authenticate, Connection, LdapConnection, Session},
};
