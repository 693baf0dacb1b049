//! Config for the directory session.
use std::{
	fs::File,
	io::BufReader,
	path::{Path, PathBuf},
	sync::Arc,
	time::Duration,
};

use ldap3::{DerefAliases, LdapConnSettings};
use rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Seconds to wait for a connection unless configured otherwise.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Session configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
	/// The URL to connect to the server with. Supports ldap, ldaps, and ldapi
	/// schemes
	pub url: Url,
	/// The DN to bind as. Empty for an anonymous bind.
	#[serde(default)]
	pub bind_dn: String,
	/// The password for the bind DN
	#[serde(default)]
	pub bind_password: String,
	/// Connection settings.
	#[serde(default)]
	pub connection: ConnectionConfig,
}

impl Config {
	/// Configuration with default connection settings.
	pub fn new(url: &str, bind_dn: &str, bind_password: &str) -> Result<Self, Error> {
		let url = Url::parse(url).map_err(|err| Error::Invalid(format!("Invalid URL: {err}")))?;
		Ok(Self {
			url,
			bind_dn: bind_dn.to_owned(),
			bind_password: bind_password.to_owned(),
			connection: ConnectionConfig::default(),
		})
	}
}

/// Configuration for how to connect to the LDAP server
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
	/// Timeout to establish a connection in seconds.
	pub timeout: u64,

	/// Timeout for each directory operation.
	pub operation_timeout: Duration,

	/// When searches should follow alias entries.
	pub deref: Deref,

	/// TLS config
	pub tls: TLSConfig,
}

impl Default for ConnectionConfig {
	fn default() -> Self {
		Self {
			timeout: DEFAULT_TIMEOUT_SECS,
			operation_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
			deref: Deref::default(),
			tls: TLSConfig::default(),
		}
	}
}

/// Alias dereferencing during searches, see RFC 4511 section 4.5.1.3.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Deref {
	/// Never dereference aliases.
	Never,
	/// Dereference aliases below the search base, but not the base itself.
	Searching,
	/// Dereference the search base only.
	Finding,
	/// Dereference aliases everywhere.
	#[default]
	Always,
}

impl From<Deref> for DerefAliases {
	fn from(deref: Deref) -> Self {
		match deref {
			Deref::Never => DerefAliases::Never,
			Deref::Searching => DerefAliases::Searching,
			Deref::Finding => DerefAliases::Finding,
			Deref::Always => DerefAliases::Always,
		}
	}
}

/// TLS Configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TLSConfig {
	/// Use StartTLS extended operation for establishing a secure connection,
	/// rather than TLS on a dedicated port.
	pub starttls: bool,

	/// Disable verification of TLS certificates
	pub no_tls_verify: bool,

	/// TLS root certificates path
	pub root_certificates_path: Option<PathBuf>,

	/// Path of the TLS client key to use for the connection
	pub client_key_path: Option<PathBuf>,

	/// Path of the TLS client certificate to use for the connection
	pub client_certificate_path: Option<PathBuf>,
}

impl ConnectionConfig {
	/// Create a [`LdapConnSettings`] based on this [`ConnectionConfig`]
	pub(crate) fn to_settings(&self) -> Result<LdapConnSettings, Error> {
		let mut settings = LdapConnSettings::new();

		settings = settings.set_conn_timeout(Duration::from_secs(self.timeout));
		settings = settings.set_starttls(self.tls.starttls);
		settings = settings.set_no_tls_verify(self.tls.no_tls_verify);

		let identity = match (&self.tls.client_key_path, &self.tls.client_certificate_path) {
			(Some(key_path), Some(cert_path)) => Some((key_path, cert_path)),
			(None, None) => None,
			_ => Err(Error::Invalid(
				"Both a client certificate and key file in PKCS8 format must be specified"
					.to_owned(),
			))?,
		};

		if let Some(path) = &self.tls.root_certificates_path {
			let mut roots = RootCertStore::empty();
			let (added, _ignored) = roots.add_parsable_certificates(&read_certificates(path)?);
			if added == 0 {
				return Err(Error::Invalid("Could not read root certificate".to_owned()));
			}

			let builder = ClientConfig::builder().with_safe_defaults().with_root_certificates(roots);
			let config = match identity {
				Some((key_path, cert_path)) => {
					let chain = read_certificates(cert_path)?.into_iter().map(Certificate).collect();
					builder.with_client_auth_cert(chain, read_private_key(key_path)?).map_err(
						|err| Error::Invalid(format!("Could not read client certificates: {err}")),
					)?
				}
				None => builder.with_no_client_auth(),
			};
			settings = settings.set_config(Arc::new(config));
		} else if identity.is_some() {
			return Err(Error::Invalid(
				"A client certificate requires root certificates to be configured".to_owned(),
			));
		}
		Ok(settings)
	}
}

/// Read all PEM encoded certificates from a file.
fn read_certificates(path: &Path) -> Result<Vec<Vec<u8>>, Error> {
	let mut reader = BufReader::new(File::open(path)?);
	let certificates = rustls_pemfile::certs(&mut reader)?;
	if certificates.is_empty() {
		return Err(Error::Invalid(format!("No certificate found in {}", path.display())));
	}
	Ok(certificates)
}

/// Read the first PKCS8 private key from a PEM file.
fn read_private_key(path: &Path) -> Result<PrivateKey, Error> {
	let mut reader = BufReader::new(File::open(path)?);
	rustls_pemfile::pkcs8_private_keys(&mut reader)?
		.into_iter()
		.next()
		.map(PrivateKey)
		.ok_or_else(|| Error::Invalid(format!("No PKCS8 key found in {}", path.display())))
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used, clippy::expect_used, clippy::items_after_statements)]

	use std::{io::ErrorKind, path::PathBuf, time::Duration};

	use ldap3::DerefAliases;

	use super::{Config, ConnectionConfig, Deref, TLSConfig};
	use crate::error::Error;

	fn with_tls(tls: TLSConfig) -> ConnectionConfig {
		ConnectionConfig { tls, ..ConnectionConfig::default() }
	}

	#[test]
	fn test_defaults() -> Result<(), Box<dyn std::error::Error>> {
		let config = Config::new("ldaps://ldap.example.org", "cn=admin,dc=example,dc=org", "s3Cr3t")?;
		assert_eq!(config.url.scheme(), "ldaps");
		assert_eq!(config.connection.timeout, 10);
		assert_eq!(config.connection.operation_timeout, Duration::from_secs(10));
		assert!(!config.connection.tls.starttls);

		config.connection.to_settings()?;

		assert!(matches!(Config::new("not a url", "", ""), Err(Error::Invalid(_))));
		Ok(())
	}

	#[test]
	fn test_deref_config() -> Result<(), Box<dyn std::error::Error>> {
		assert_eq!(ConnectionConfig::default().deref, Deref::Always);
		assert!(matches!(DerefAliases::from(Deref::Always), DerefAliases::Always));
		assert!(matches!(DerefAliases::from(Deref::Never), DerefAliases::Never));

		let config: Config = serde_json::from_str(
			r#"{"url": "ldap://localhost", "connection": {"deref": "finding"}}"#,
		)?;
		assert_eq!(config.connection.deref, Deref::Finding);
		assert_eq!(config.connection.timeout, 10, "Unset fields keep their defaults");
		Ok(())
	}

	#[test]
	fn test_tls_config() {
		// invalid crt test
		assert!(matches!(
			with_tls(TLSConfig {
				root_certificates_path: Some(PathBuf::from("src/config.rs")),
				..TLSConfig::default()
			})
			.to_settings()
			.err()
			.unwrap(),
			Error::Invalid(_)
		));

		// invalid path test
		assert!(matches!(
			with_tls(TLSConfig {
				client_key_path: Some(PathBuf::from("invalid_path")),
				client_certificate_path: Some(PathBuf::from("invalid_path")),
				root_certificates_path: Some(PathBuf::from("invalid_path")),
				..TLSConfig::default()
			})
			.to_settings()
			.err()
			.unwrap(),
			Error::Io(io_err) if io_err.kind() == ErrorKind::NotFound
		));

		// client identity without root certificates
		assert!(matches!(
			with_tls(TLSConfig {
				client_key_path: Some(PathBuf::from("client.key")),
				client_certificate_path: Some(PathBuf::from("client.crt")),
				..TLSConfig::default()
			})
			.to_settings()
			.err()
			.unwrap(),
			Error::Invalid(_)
		));

		// key without certificate
		assert!(matches!(
			with_tls(TLSConfig {
				client_key_path: Some(PathBuf::from("client.key")),
				..TLSConfig::default()
			})
			.to_settings()
			.err()
			.unwrap(),
			Error::Invalid(_)
		));
	}
}
