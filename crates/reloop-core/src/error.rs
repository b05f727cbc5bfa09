use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Script runner already started")]
    AlreadyStarted,

    #[error("Failed to spawn run thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    #[error("Run thread panicked: {0}")]
    WorkerPanicked(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_started_display() {
        assert_eq!(
            EngineError::AlreadyStarted.to_string(),
            "Script runner already started"
        );
    }

    #[test]
    fn test_worker_panicked_display() {
        let error = EngineError::WorkerPanicked("observer failed".to_string());
        assert_eq!(error.to_string(), "Run thread panicked: observer failed");
    }

    #[test]
    fn test_thread_spawn_from_io() {
        let error: EngineError =
            std::io::Error::new(std::io::ErrorKind::OutOfMemory, "no threads").into();
        let msg = format!("{error}");
        assert!(msg.contains("spawn"));
        assert!(msg.contains("no threads"));
    }

    #[test]
    fn test_config_json_display() {
        let error: ConfigError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(error.to_string().starts_with("Invalid config:"));
    }
}
