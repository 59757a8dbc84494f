use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use bk_service::{CoverageOptions, CoverageTarget, PassContext, PassSummaryRequest, QcService, Scope};
use bk_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = bk_cli::VERSION,
	rename_all = "kebab",
	styles = bk_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[command(subcommand)]
	pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Rebuild the effective periods of one scope.
	Recompute {
		#[command(flatten)]
		scope: ScopeArgs,
	},
	/// Rebuild the effective periods of every scope.
	RecomputeAll,
	/// Verify stored effective periods against the flags of every scope.
	Check,
	/// Print the GAQ timeline of a run in a data pass.
	Gaq {
		#[arg(long, value_name = "ID")]
		data_pass: i64,
		#[arg(long, value_name = "NUMBER")]
		run: i64,
	},
	/// Print coverage summaries.
	///
	/// With `--detector` the summary covers one scope; with `--run` alone, the run's GAQ; with
	/// neither, every run of the data pass (per detector with `--per-detector`).
	Summary {
		#[arg(long, value_name = "ID")]
		data_pass: Option<i64>,
		#[arg(long, value_name = "ID", conflicts_with = "data_pass")]
		simulation_pass: Option<i64>,
		#[arg(long, value_name = "NUMBER")]
		run: Option<i64>,
		#[arg(long, value_name = "ID", requires = "run")]
		detector: Option<i64>,
		#[arg(long, conflicts_with_all = ["run", "detector"])]
		per_detector: bool,
		/// Limit synchronous per-detector summaries to one LHC period.
		#[arg(
			long,
			value_name = "ID",
			requires = "per_detector",
			conflicts_with_all = ["data_pass", "simulation_pass"]
		)]
		lhc_period: Option<i64>,
		#[arg(long)]
		mc_reproducible_as_not_bad: bool,
	},
	/// Store the beam-type default GAQ detectors for runs of a data pass.
	GaqDefaults {
		#[arg(long, value_name = "ID")]
		data_pass: i64,
		#[arg(long = "run", value_name = "NUMBER", num_args = 1.., required = true)]
		runs: Vec<i64>,
	},
}

#[derive(Debug, clap::Args)]
pub struct ScopeArgs {
	#[arg(long, value_name = "NUMBER")]
	pub run: i64,
	#[arg(long, value_name = "ID")]
	pub detector: i64,
	#[arg(long, value_name = "ID")]
	pub data_pass: Option<i64>,
	#[arg(long, value_name = "ID", conflicts_with = "data_pass")]
	pub simulation_pass: Option<i64>,
}
impl ScopeArgs {
	fn scope(&self) -> eyre::Result<Scope> {
		let pass = PassContext::from_options(self.data_pass, self.simulation_pass)?;

		Ok(Scope::new(self.run, self.detector, pass))
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = bk_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let service = QcService::new(config, db);

	tracing::debug!(command = ?args.command, "Running maintenance command.");

	match args.command {
		Command::Recompute { scope } => print_json(&service.recompute_scope(scope.scope()?).await?),
		Command::RecomputeAll => print_json(&service.recompute_all().await?),
		Command::Check => {
			let violations = service.check_all_scopes().await?;

			print_json(&violations)?;

			if !violations.is_empty() {
				return Err(eyre::eyre!(
					"{} scope(s) hold effective periods that do not match their flags.",
					violations.len()
				));
			}

			Ok(())
		},
		Command::Gaq { data_pass, run } => print_json(&service.gaq_timeline(data_pass, run).await?),
		Command::Summary {
			data_pass,
			simulation_pass,
			run,
			detector,
			per_detector,
			lhc_period,
			mc_reproducible_as_not_bad,
		} => {
			let options = CoverageOptions { mc_reproducible_as_not_bad };

			match (run, detector) {
				(Some(run_number), Some(detector_id)) => {
					let target = CoverageTarget::Scope {
						run_number,
						detector_id,
						data_pass_id: data_pass,
						simulation_pass_id: simulation_pass,
					};

					print_json(&service.coverage_summary(target, options).await?)
				},
				(Some(run_number), None) => {
					let data_pass_id = data_pass
						.ok_or_else(|| eyre::eyre!("GAQ summaries require --data-pass."))?;
					let target = CoverageTarget::Gaq { data_pass_id, run_number };

					print_json(&service.coverage_summary(target, options).await?)
				},
				_ if per_detector => {
					let req = PassSummaryRequest {
						data_pass_id: data_pass,
						simulation_pass_id: simulation_pass,
						lhc_period_id: lhc_period,
						options,
					};

					print_json(&service.pass_summary(req).await?)
				},
				_ => {
					let data_pass_id = data_pass
						.ok_or_else(|| eyre::eyre!("GAQ summaries require --data-pass."))?;

					print_json(&service.data_pass_gaq_summary(data_pass_id, options).await?)
				},
			}
		},
		Command::GaqDefaults { data_pass, runs } =>
			print_json(&service.use_default_gaq_detectors(data_pass, &runs).await?),
	}
}

fn print_json<T>(value: &T) -> color_eyre::Result<()>
where
	T: Serialize,
{
	let json = serde_json::to_string_pretty(value)?;

	println!("{json}");

	Ok(())
}
