//! Detector-scoped permissions for flag writes.

use serde::{Deserialize, Serialize};

use bk_config::Access;

/// How a request identifies its author.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum UserIdentifier {
	Id(i64),
	ExternalId(i64),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
	pub user: UserIdentifier,
	#[serde(default)]
	pub roles: Vec<String>,
}

pub fn is_admin(access: &Access, roles: &[String]) -> bool {
	roles
		.iter()
		.map(|role| role.trim().to_lowercase())
		.any(|role| access.admin_roles.iter().any(|admin| *admin == role))
}

/// Admin roles manage every detector; otherwise `<prefix><name>` grants one detector.
pub fn can_manage_detector(access: &Access, roles: &[String], detector_name: &str) -> bool {
	let detector_role = format!("{}{}", access.detector_role_prefix, detector_name.to_lowercase());

	is_admin(access, roles)
		|| roles.iter().any(|role| role.trim().to_lowercase() == detector_role)
}
