pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_users.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_users.sql")),
				"tables/002_detectors.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_detectors.sql")),
				"tables/003_runs.sql" => out.push_str(include_str!("../../../sql/tables/003_runs.sql")),
				"tables/004_run_detectors.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_run_detectors.sql")),
				"tables/005_data_passes.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_data_passes.sql")),
				"tables/006_simulation_passes.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_simulation_passes.sql")),
				"tables/007_qc_flag_types.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_qc_flag_types.sql")),
				"tables/008_qc_flags.sql" =>
					out.push_str(include_str!("../../../sql/tables/008_qc_flags.sql")),
				"tables/009_qc_flag_effective_periods.sql" => out
					.push_str(include_str!("../../../sql/tables/009_qc_flag_effective_periods.sql")),
				"tables/010_qc_flag_verifications.sql" =>
					out.push_str(include_str!("../../../sql/tables/010_qc_flag_verifications.sql")),
				"tables/011_gaq_detectors.sql" =>
					out.push_str(include_str!("../../../sql/tables/011_gaq_detectors.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
