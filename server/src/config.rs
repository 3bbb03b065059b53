use clap::Parser;

/// Server configuration, loaded from environment variables (optionally via
/// a `.env` file loaded with `dotenvy` before this is parsed). Field names
/// track the fixed environment variable names; `PORT` and `REDIS_URL` are
/// not part of that fixed set but are needed to bind the HTTP listener and
/// reach the refresh-token store, so they keep permissive defaults.
#[derive(Parser, Debug, Clone)]
#[command(name = "taskchain-server")]
pub struct AppConfig {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "DEBUG", default_value_t = false)]
    pub debug: bool,

    #[arg(long, env = "DB_USER")]
    pub db_user: String,
    #[arg(long, env = "DB_PASSWORD")]
    pub db_password: String,
    #[arg(long, env = "DB_HOST")]
    pub db_host: String,
    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,
    #[arg(long, env = "DB_NAME")]
    pub db_name: String,

    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    pub redis_url: String,

    #[arg(long, env = "GOOGLE_OAUTH2_CLIENT_ID")]
    pub google_oauth2_client_id: Option<String>,
    #[arg(long, env = "GOOGLE_OAUTH2_CLIENT_SECRET")]
    pub google_oauth2_client_secret: Option<String>,
    #[arg(long, env = "GOOGLE_OAUTH2_REDIRECT_URL")]
    pub google_oauth2_redirect_url: Option<String>,

    #[arg(long, env = "JWT_ACCESS_SECRET")]
    pub jwt_access_secret: String,
    #[arg(long, env = "JWT_ACCESS_EXPIRE", default_value_t = 900)]
    pub jwt_access_expire: i64,

    #[arg(long, env = "JWT_REFRESH_SECRET")]
    pub jwt_refresh_secret: String,
    #[arg(long, env = "JWT_REFRESH_EXPIRE", default_value_t = 2_592_000)]
    pub jwt_refresh_expire: i64,

    #[arg(long, env = "STATE_SCHEME_VERSION", default_value_t = 1)]
    pub state_scheme_version: i32,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::info!(path = %path.display(), "loaded .env file"),
            Err(dotenvy::Error::Io(_)) => tracing::debug!("no .env file found, using process environment"),
            Err(err) => return Err(err.into()),
        }
        Ok(AppConfig::try_parse()?)
    }

    /// Postgres connection string assembled from the individual `DB_*`
    /// variables, since the fixed environment lists the parts rather than a
    /// single `DATABASE_URL`.
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
        )
    }

    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "debug,taskchain_server=trace,sqlx=info"
        } else {
            "info,taskchain_server=debug,sqlx=warn"
        }
    }
}
