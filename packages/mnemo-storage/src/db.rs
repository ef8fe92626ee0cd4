use std::{path::Path, str::FromStr};

use sqlx::{
	SqlitePool,
	sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{Result, schema};

pub struct Db {
	pub pool: SqlitePool,
}
impl Db {
	pub async fn connect(cfg: &mnemo_config::Storage) -> Result<Self> {
		Self::connect_path(Path::new(&cfg.database_path)).await
	}

	pub async fn connect_path(path: &Path) -> Result<Self> {
		if let Some(parent) = path.parent()
			&& !parent.as_os_str().is_empty()
		{
			std::fs::create_dir_all(parent)?;
		}

		let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))?
			.create_if_missing(true);
		let pool = SqlitePoolOptions::new().max_connections(4).connect_with(options).await?;

		Ok(Self { pool })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		sqlx::raw_sql(schema::render_schema()).execute(&self.pool).await?;

		Ok(())
	}
}
