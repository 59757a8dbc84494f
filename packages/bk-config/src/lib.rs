mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Access, Config, Postgres, Qc, Service, Storage};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.qc.max_flags_per_scope == 0 {
		return Err(Error::Validation {
			message: "qc.max_flags_per_scope must be greater than zero.".to_string(),
		});
	}

	for detector in &cfg.qc.non_qc_detectors {
		if detector.trim().is_empty() {
			return Err(Error::Validation {
				message: "qc.non_qc_detectors entries must be non-empty.".to_string(),
			});
		}
	}

	if cfg.access.detector_role_prefix.trim().is_empty() {
		return Err(Error::Validation {
			message: "access.detector_role_prefix must be non-empty.".to_string(),
		});
	}

	for role in &cfg.access.admin_roles {
		if role.trim().is_empty() {
			return Err(Error::Validation {
				message: "access.admin_roles entries must be non-empty.".to_string(),
			});
		}
		if role.starts_with(cfg.access.detector_role_prefix.as_str()) {
			return Err(Error::Validation {
				message: format!(
					"access.admin_roles entry {role:?} must not use the detector role prefix."
				),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.service.log_level = cfg.service.log_level.trim().to_string();
	cfg.qc.non_qc_detectors =
		cfg.qc.non_qc_detectors.iter().map(|name| name.trim().to_uppercase()).collect();
	cfg.access.admin_roles =
		cfg.access.admin_roles.iter().map(|role| role.trim().to_lowercase()).collect();
	cfg.access.detector_role_prefix = cfg.access.detector_role_prefix.trim().to_lowercase();
}
