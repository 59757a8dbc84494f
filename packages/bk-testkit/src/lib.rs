//! Per-test Postgres databases and fixture rows.
//!
//! Every test gets its own database, created through the server `BK_PG_DSN` points at and named
//! after the test, so concurrent tests never share rows or advisory locks.

pub mod seed;

mod error;

pub use error::{Error, Result};

use std::{env, str::FromStr, thread};

use sqlx::{
	ConnectOptions, Connection, Executor,
	postgres::{PgConnectOptions, PgConnection},
};
use tokio::runtime::Builder;
use uuid::Uuid;

pub const DSN_VAR: &str = "BK_PG_DSN";

const NAME_PREFIX: &str = "bk_";
const MAX_SLUG_LEN: usize = 40;

pub struct TestDatabase {
	name: String,
	server: PgConnectOptions,
	dropped: bool,
}
impl TestDatabase {
	/// Creates a database for `test_name`, or `None` when `BK_PG_DSN` is not set.
	pub async fn for_test(test_name: &str) -> Result<Option<Self>> {
		match env_dsn() {
			Some(dsn) => Self::create(&dsn, test_name).await.map(Some),
			None => Ok(None),
		}
	}

	pub async fn create(server_dsn: &str, test_name: &str) -> Result<Self> {
		let server = PgConnectOptions::from_str(server_dsn).map_err(Error::InvalidDsn)?;
		let name = database_name(test_name);
		let mut conn = PgConnection::connect_with(&server).await?;

		conn.execute(format!(r#"CREATE DATABASE "{name}""#).as_str()).await?;
		conn.close().await?;

		Ok(Self { name, server, dropped: false })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn dsn(&self) -> String {
		self.server.clone().database(&self.name).to_url_lossy().to_string()
	}

	pub async fn cleanup(mut self) -> Result<()> {
		drop_database(&self.server, &self.name).await?;

		self.dropped = true;

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if self.dropped {
			return;
		}

		let server = self.server.clone();
		let name = std::mem::take(&mut self.name);
		// The test's runtime may already be shutting down; use a private one.
		let dropper = thread::spawn(move || -> Result<()> {
			let runtime = Builder::new_current_thread().enable_all().build()?;

			runtime.block_on(drop_database(&server, &name))
		});

		match dropper.join() {
			Ok(Ok(())) => {},
			Ok(Err(err)) => eprintln!("Failed to drop test database: {err}."),
			Err(_) => eprintln!("Test database cleanup thread panicked."),
		}
	}
}

pub fn env_dsn() -> Option<String> {
	env::var(DSN_VAR).ok().filter(|dsn| !dsn.trim().is_empty())
}

/// `bk_<test slug>_<8 hex>`, well under the 63-byte identifier limit.
fn database_name(test_name: &str) -> String {
	let slug: String = test_name
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
		.take(MAX_SLUG_LEN)
		.collect();
	let suffix = Uuid::new_v4().simple().to_string();

	format!("{NAME_PREFIX}{slug}_{}", &suffix[..8])
}

async fn drop_database(server: &PgConnectOptions, name: &str) -> Result<()> {
	let mut conn = PgConnection::connect_with(server).await?;

	conn.execute(format!(r#"DROP DATABASE IF EXISTS "{name}" WITH (FORCE)"#).as_str()).await?;
	conn.close().await?;

	Ok(())
}
