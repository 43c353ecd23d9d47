use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("no data directory on this platform; set POSTBOARD_DATA_DIR")]
    NoDataDir,

    #[error("config file io")]
    Io(#[from] std::io::Error),

    #[error("malformed config file")]
    Config(#[from] serde_json::Error),

    #[error("data store unavailable")]
    Db(#[from] sea_orm::DbErr),
}
