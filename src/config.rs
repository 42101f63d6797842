use std::env;
use std::path::PathBuf;

#[derive(Clone)]
pub struct Config {
    pub mongo_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    /// External mail function; notifications are not mailed when unset.
    pub mail_sink_endpoint: Option<String>,
    pub sync_queue_path: PathBuf,
    pub ping_interval_secs: u64,
    pub directory_refresh_secs: u64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            mongo_uri: env::var("MONGO_URI").expect("MONGO_URI must be set"),
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "task_db".to_string()),
            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            mail_sink_endpoint: env::var("MAIL_SINK_ENDPOINT").ok(),
            sync_queue_path: env::var("SYNC_QUEUE_PATH")
                .unwrap_or_else(|_| "sync_queue.json".to_string())
                .into(),
            ping_interval_secs: env::var("PING_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(15),
            directory_refresh_secs: env::var("DIRECTORY_REFRESH_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}
