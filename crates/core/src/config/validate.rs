use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Heartbeat interval is at least one second
/// - Audio bitrate is non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.orchestrator.heartbeat_secs == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.heartbeat_secs must be at least 1".to_string(),
        ));
    }

    if config.orchestrator.temp_prefix.is_empty() {
        return Err(ConfigError::ValidationError(
            "orchestrator.temp_prefix cannot be empty".to_string(),
        ));
    }

    if config.clipper.audio_bitrate_kbps == 0 {
        return Err(ConfigError::ValidationError(
            "clipper.audio_bitrate_kbps cannot be 0".to_string(),
        ));
    }

    Ok(())
}
