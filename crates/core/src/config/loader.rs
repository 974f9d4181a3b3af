use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Prefix for environment overrides. Nested keys use a double underscore,
/// e.g. `POSTPLEX_WORKER__CONCURRENCY=4`.
pub const ENV_PREFIX: &str = "POSTPLEX_";

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(
            r#"
[worker]
concurrency = 5
"#,
        )
        .unwrap();
        assert_eq!(config.worker.concurrency, 5);
    }

    #[test]
    fn test_load_config_from_str_wrong_type() {
        let result = load_config_from_str(
            r#"
[worker]
concurrency = "many"
"#,
        );
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/postplex.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[database]
path = "/var/lib/postplex/state.db"

[staging]
dir = "/scratch/postplex"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(
            config.database.path.to_string_lossy(),
            "/var/lib/postplex/state.db"
        );
        assert_eq!(config.staging.dir.to_string_lossy(), "/scratch/postplex");
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "postplex.toml",
                r#"
[worker]
concurrency = 1
"#,
            )?;
            jail.set_env("POSTPLEX_WORKER__CONCURRENCY", "4");
            jail.set_env("POSTPLEX_RETRY__MAX_ATTEMPTS", "7");

            let config = load_config(Path::new("postplex.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.worker.concurrency, 4);
            assert_eq!(config.retry.max_attempts, 7);
            Ok(())
        });
    }
}
