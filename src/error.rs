use thiserror::Error;

/// Errors surfaced by the terrain core.
///
/// Generation math never fails; everything here comes from settings I/O,
/// GPU resource creation or worker pool setup.
#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    SettingsParse(#[from] toml::de::Error),

    #[error("invalid value {value:?} for setting `{key}`")]
    InvalidSetting { key: String, value: String },

    #[error("buffer allocation failed ({label}): {reason}")]
    BufferAllocation { label: &'static str, reason: String },

    #[error("transfer queue submission failed: {0}")]
    Transfer(String),

    #[error("no suitable GPU adapter: {0}")]
    NoAdapter(String),

    #[error("failed to request device: {0}")]
    RequestDevice(String),

    #[error("failed to build generation pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, TerrainError>;
