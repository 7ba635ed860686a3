//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;

/// 应用主配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 合成引擎配置
    #[serde(default)]
    pub engine: EngineConfig,

    /// 存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            engine: EngineConfig::default(),
            storage: StorageConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5070
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 合成引擎配置
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// 音色目录 URL
    #[serde(default = "default_catalog_url")]
    pub catalog_url: String,

    /// voice 模型下载基础 URL
    #[serde(default = "default_download_base_url")]
    pub download_base_url: String,

    /// piper 可执行文件
    #[serde(default = "default_piper_bin")]
    pub piper_bin: String,

    /// HTTP 请求超时（秒）
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,
}

fn default_catalog_url() -> String {
    "https://huggingface.co/rhasspy/piper-voices/resolve/main/voices.json".to_string()
}

fn default_download_base_url() -> String {
    "https://huggingface.co/rhasspy/piper-voices/resolve/main".to_string()
}

fn default_piper_bin() -> String {
    "piper".to_string()
}

fn default_engine_timeout() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog_url: default_catalog_url(),
            download_base_url: default_download_base_url(),
            piper_bin: default_piper_bin(),
            timeout_secs: default_engine_timeout(),
        }
    }
}

/// 存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 本地 voices 目录（模型缓存，stored/flush 的作用对象）
    #[serde(default = "default_voices_dir")]
    pub voices_dir: PathBuf,
}

fn default_voices_dir() -> PathBuf {
    PathBuf::from("data/voices")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            voices_dir: default_voices_dir(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5070);
        assert_eq!(config.engine.piper_bin, "piper");
        assert_eq!(config.storage.voices_dir, PathBuf::from("data/voices"));
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.addr(), "0.0.0.0:5070");
    }
}
