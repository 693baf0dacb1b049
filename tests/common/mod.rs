use std::error::Error;

use ldap3::{LdapConn, Scope, SearchEntry, SearchResult};

pub const URL: &str = "ldap://localhost:1389";
pub const ADMIN_DN: &str = "cn=admin,dc=example,dc=org";
pub const ADMIN_PASSWORD: &str = "adminpassword";
pub const PEOPLE: &str = "ou=people,dc=example,dc=org";
pub const ALIASES: &str = "ou=aliases,dc=example,dc=org";

pub fn ldap_connect() -> Result<LdapConn, Box<dyn Error>> {
	let mut ldap = LdapConn::new(URL)?;
	ldap.simple_bind(ADMIN_DN, ADMIN_PASSWORD)?.success()?;
	Ok(ldap)
}

pub fn ldap_add_organizational_unit(ldap: &mut LdapConn, ou: &str) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("ou={},dc=example,dc=org", ou),
		vec![("objectClass", ["organizationalUnit"].into())],
	)?
	.success()?;
	Ok(())
}

pub fn ldap_delete_organizational_unit(
	ldap: &mut LdapConn,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("ou={},dc=example,dc=org", ou))?.success()?;
	Ok(())
}

pub fn ldap_add_person(
	ldap: &mut LdapConn,
	uid: &str,
	title: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("uid={},{}", uid, PEOPLE),
		vec![
			("objectClass", ["inetOrgPerson"].into()),
			("cn", [uid].into()),
			("sn", [uid].into()),
			("displayName", [format!("User {uid}").as_str()].into()),
			("title", [title].into()),
		],
	)?
	.success()?;
	Ok(())
}

pub fn ldap_delete_person(ldap: &mut LdapConn, uid: &str) -> Result<(), Box<dyn Error>> {
	ldap.delete(&format!("uid={},{}", uid, PEOPLE))?.success()?;
	Ok(())
}

pub fn ldap_add_alias(ldap: &mut LdapConn, uid: &str, target: &str) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("uid={},{}", uid, ALIASES),
		vec![
			("objectClass", ["alias", "extensibleObject"].into()),
			("uid", [uid].into()),
			("aliasedObjectName", [target].into()),
		],
	)?
	.success()?;
	Ok(())
}

/// Delete an organizational unit together with every entry directly below it,
/// ignoring a unit that does not exist.
pub fn ldap_remove_organizational_unit(ldap: &mut LdapConn, ou: &str) {
	let base = format!("ou={},dc=example,dc=org", ou);
	let children = ldap
		.search(&base, Scope::OneLevel, "(objectClass=*)", vec!["1.1"])
		.and_then(SearchResult::success);
	if let Ok((children, _)) = children {
		for child in children {
			let _ = ldap.delete(&SearchEntry::construct(child).dn);
		}
	}
	let _ = ldap_delete_organizational_unit(ldap, ou);
}

/// Start from an empty people subtree holding the given persons, whatever an
/// earlier run left behind.
pub fn ldap_reset_people(
	ldap: &mut LdapConn,
	people: &[(&str, &str)],
) -> Result<(), Box<dyn Error>> {
	ldap_remove_organizational_unit(ldap, "people");
	ldap_add_organizational_unit(ldap, "people")?;
	for (uid, title) in people {
		ldap_add_person(ldap, uid, title)?;
	}
	Ok(())
}

pub fn ldap_cleanup_people(ldap: &mut LdapConn, uids: &[&str]) -> Result<(), Box<dyn Error>> {
	for uid in uids {
		ldap_delete_person(ldap, uid)?;
	}
	ldap_delete_organizational_unit(ldap, "people")?;
	Ok(())
}
