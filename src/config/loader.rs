//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `VOCEL_`，层级分隔符 `__`）
/// 2. 配置文件（config.toml 或 config.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `VOCEL_SERVER__HOST=127.0.0.1`
/// - `VOCEL_SERVER__PORT=8080`
/// - `VOCEL_ENGINE__PIPER_BIN=/usr/local/bin/piper`
/// - `VOCEL_STORAGE__VOICES_DIR=/data/voices`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5070)?
        .set_default(
            "engine.catalog_url",
            "https://huggingface.co/rhasspy/piper-voices/resolve/main/voices.json",
        )?
        .set_default(
            "engine.download_base_url",
            "https://huggingface.co/rhasspy/piper-voices/resolve/main",
        )?
        .set_default("engine.piper_bin", "piper")?
        .set_default("engine.timeout_secs", 300)?
        .set_default("storage.voices_dir", "data/voices")?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: VOCEL_，层级分隔符: __ (双下划线)
    builder = builder.add_source(
        Environment::with_prefix("VOCEL")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 构建并反序列化
    let config = builder.build()?;
    let app_config: AppConfig = config
        .try_deserialize()
        .map_err(|e| ConfigError::ParseError(format!("Failed to deserialize config: {}", e)))?;

    // 5. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "Server port cannot be 0".to_string(),
        ));
    }

    if config.engine.catalog_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Engine catalog URL cannot be empty".to_string(),
        ));
    }

    if config.engine.download_base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "Engine download base URL cannot be empty".to_string(),
        ));
    }

    if config.engine.piper_bin.is_empty() {
        return Err(ConfigError::ValidationError(
            "Piper binary path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Catalog URL: {}", config.engine.catalog_url);
    tracing::info!("Download Base URL: {}", config.engine.download_base_url);
    tracing::info!("Piper Binary: {}", config.engine.piper_bin);
    tracing::info!("Engine Timeout: {}s", config.engine.timeout_secs);
    tracing::info!("Voices Directory: {:?}", config.storage.voices_dir);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_passes_for_valid_config() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_catalog_url() {
        let mut config = AppConfig::default();
        config.engine.catalog_url = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_empty_piper_bin() {
        let mut config = AppConfig::default();
        config.engine.piper_bin = String::new();
        assert!(validate_config(&config).is_err());
    }
}
