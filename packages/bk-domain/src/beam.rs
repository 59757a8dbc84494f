use serde::{Deserialize, Serialize};

use crate::flag::DetectorRef;

/// Beam type as recorded by the processing pipeline for a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeamType {
	ProtonProton,
	ProtonLead,
	LeadLead,
	Other,
}
impl BeamType {
	pub fn from_pdp(raw: Option<&str>) -> Self {
		match raw.map(str::trim) {
			Some("pp") => Self::ProtonProton,
			Some("pPb") | Some("Pbp") => Self::ProtonLead,
			Some("PbPb") => Self::LeadLead,
			_ => Self::Other,
		}
	}
}

/// Detector names that make up global quality when no explicit set is configured.
pub fn default_gaq_detectors(beam: BeamType) -> &'static [&'static str] {
	match beam {
		BeamType::ProtonProton => &["TPC", "ITS", "FT0"],
		BeamType::LeadLead => &["TPC", "ITS", "FT0", "ZDC"],
		BeamType::ProtonLead | BeamType::Other => &[],
	}
}

/// The default set restricted to the detectors that actually took part in the run, by name.
pub fn default_gaq_detectors_for_run(beam: BeamType, run_detectors: &[DetectorRef]) -> Vec<DetectorRef> {
	let defaults = default_gaq_detectors(beam);
	let mut detectors: Vec<DetectorRef> = run_detectors
		.iter()
		.filter(|detector| defaults.contains(&detector.name.as_str()))
		.cloned()
		.collect();

	detectors.sort_by(|a, b| a.name.cmp(&b.name));
	detectors.dedup_by_key(|detector| detector.detector_id);

	detectors
}
