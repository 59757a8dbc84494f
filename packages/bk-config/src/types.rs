use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	#[serde(default)]
	pub qc: Qc,
	#[serde(default)]
	pub access: Access,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Qc {
	/// Upper bound on live (non-deleted) flags per (run, detector, pass) scope.
	pub max_flags_per_scope: u32,
	/// Detector names that never carry QC flags.
	pub non_qc_detectors: Vec<String>,
	/// When true, a flag with at least one verification cannot be deleted.
	pub reject_delete_verified: bool,
}
impl Default for Qc {
	fn default() -> Self {
		Self {
			max_flags_per_scope: 512,
			non_qc_detectors: vec!["TST".to_string()],
			reject_delete_verified: true,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Access {
	/// Roles allowed to manage flags of every detector.
	pub admin_roles: Vec<String>,
	/// Prefix of detector-scoped roles, e.g. "det-" for "det-tpc".
	pub detector_role_prefix: String,
}
impl Default for Access {
	fn default() -> Self {
		Self {
			admin_roles: vec!["admin".to_string(), "global".to_string()],
			detector_role_prefix: "det-".to_string(),
		}
	}
}
