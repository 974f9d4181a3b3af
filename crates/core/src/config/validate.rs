use super::{types::Config, ConfigError};

/// Upper bound for `worker.concurrency`.
pub const MAX_CONCURRENCY: usize = 5;

/// Validate configuration ranges and the preset catalog.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let fail = |msg: String| Err(ConfigError::ValidationError(msg));

    if !(1..=MAX_CONCURRENCY).contains(&config.worker.concurrency) {
        return fail(format!(
            "worker.concurrency must be within 1..={}, got {}",
            MAX_CONCURRENCY, config.worker.concurrency
        ));
    }
    if config.worker.poll_interval_ms == 0 {
        return fail("worker.poll_interval_ms cannot be 0".to_string());
    }

    if config.retry.max_attempts == 0 {
        return fail("retry.max_attempts must be at least 1".to_string());
    }
    if config.retry.initial_delay_ms > config.retry.max_delay_ms {
        return fail(format!(
            "retry.initial_delay_ms ({}) exceeds retry.max_delay_ms ({})",
            config.retry.initial_delay_ms, config.retry.max_delay_ms
        ));
    }

    if config.encoder.timeout_secs == 0 {
        return fail("encoder.timeout_secs cannot be 0".to_string());
    }
    if config.encoder.crf > 51 {
        return fail(format!("encoder.crf must be within 0..=51, got {}", config.encoder.crf));
    }
    if config.encoder.audio_bitrate_kbps == 0 || config.encoder.sample_rate_hz == 0 {
        return fail("encoder audio bitrate and sample rate must be positive".to_string());
    }

    if config.source.request_timeout_secs == 0 {
        return fail("source.request_timeout_secs cannot be 0".to_string());
    }

    if let Some(ref base) = config.artifacts.public_base_url {
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return fail(format!(
                "artifacts.public_base_url must be an http(s) URL, got '{}'",
                base
            ));
        }
    }

    config
        .preset_catalog()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preset::PresetCatalog;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_concurrency_bounds() {
        for bad in [0, 6] {
            let mut config = Config::default();
            config.worker.concurrency = bad;
            assert!(matches!(
                validate_config(&config),
                Err(ConfigError::ValidationError(_))
            ));
        }
        let mut config = Config::default();
        config.worker.concurrency = 5;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_retry() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.retry.initial_delay_ms = 600_000;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_public_base_url() {
        let mut config = Config::default();
        config.artifacts.public_base_url = Some("cdn.example.com".to_string());
        assert!(validate_config(&config).is_err());

        config.artifacts.public_base_url = Some("https://cdn.example.com".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_presets() {
        let mut config = Config::default();
        let mut preset = PresetCatalog::builtin().get("safe").unwrap().clone();
        preset.ranges.speed.min = 1.5;
        preset.ranges.speed.max = 1.1;
        config.presets = vec![preset];

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("safe"));
    }
}
