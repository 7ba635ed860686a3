//! Piper Engine - 基于 piper 的语音合成引擎实现
//!
//! 实现 SpeechEnginePort：
//! - 音色目录来自 HTTP 端点（voices.json，对象表或数组两种形态）
//! - voice 模型按需下载到本地 voices 目录，流式上报下载进度
//! - stored/flush 直接作用于 voices 目录
//! - 合成调用本地 piper 进程（stdin 文本，stdout WAV，stderr 转发为日志）

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::application::ports::{
    EngineError, SpeechEnginePort, SynthesisSink, VoiceSessionPort,
};
use crate::domain::{DownloadProgress, VoiceCatalogEntry};

/// Piper 引擎配置
#[derive(Debug, Clone)]
pub struct PiperEngineConfig {
    /// 音色目录 URL（voices.json）
    pub catalog_url: String,
    /// voice 模型下载基础 URL（{base}/{voiceId}.onnx）
    pub download_base_url: String,
    /// 本地 voices 目录（stored/flush 的作用对象）
    pub voices_dir: PathBuf,
    /// piper 可执行文件
    pub piper_bin: String,
    /// HTTP 请求超时（秒）
    pub timeout_secs: u64,
}

impl Default for PiperEngineConfig {
    fn default() -> Self {
        Self {
            catalog_url: "https://huggingface.co/rhasspy/piper-voices/resolve/main/voices.json"
                .to_string(),
            download_base_url: "https://huggingface.co/rhasspy/piper-voices/resolve/main"
                .to_string(),
            voices_dir: PathBuf::from("data/voices"),
            piper_bin: "piper".to_string(),
            timeout_secs: 300,
        }
    }
}

/// Piper 引擎
pub struct PiperEngine {
    client: Client,
    config: PiperEngineConfig,
}

impl PiperEngine {
    /// 创建引擎实例
    pub fn new(config: PiperEngineConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EngineError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait]
impl SpeechEnginePort for PiperEngine {
    async fn voices(&self) -> Result<Vec<VoiceCatalogEntry>, EngineError> {
        tracing::debug!(url = %self.config.catalog_url, "Fetching voice catalog");

        let response = self
            .client
            .get(&self.config.catalog_url)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::InvalidResponse(format!(
                "catalog endpoint returned HTTP {}",
                status
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        parse_catalog(value)
    }

    async fn stored(&self) -> Result<Vec<String>, EngineError> {
        let mut voice_ids = Vec::new();

        let mut entries = match tokio::fs::read_dir(&self.config.voices_dir).await {
            Ok(entries) => entries,
            // 目录尚未创建等价于空缓存
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(voice_ids),
            Err(e) => return Err(EngineError::Storage(e.to_string())),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("onnx") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    voice_ids.push(stem.to_string());
                }
            }
        }

        voice_ids.sort();
        Ok(voice_ids)
    }

    async fn flush(&self) -> Result<(), EngineError> {
        let mut entries = match tokio::fs::read_dir(&self.config.voices_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(EngineError::Storage(e.to_string())),
        };

        let mut removed = 0usize;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?
        {
            let path = entry.path();
            if path.is_file() {
                tokio::fs::remove_file(&path)
                    .await
                    .map_err(|e| EngineError::Storage(e.to_string()))?;
                removed += 1;
            }
        }

        tracing::info!(removed = removed, "Voice cache flushed");
        Ok(())
    }

    fn open_voice_session(&self, sink: Arc<dyn SynthesisSink>) -> Box<dyn VoiceSessionPort> {
        Box::new(PiperVoiceSession {
            client: self.client.clone(),
            config: self.config.clone(),
            sink,
            model_path: None,
        })
    }
}

/// 解析目录端点返回的 JSON
///
/// piper 的 voices.json 是以 voice 标识符为键的对象表；
/// 也接受条目数组（每项自带 "key"）。
fn parse_catalog(value: serde_json::Value) -> Result<Vec<VoiceCatalogEntry>, EngineError> {
    match value {
        serde_json::Value::Object(map) => map
            .into_iter()
            .map(|(key, entry)| match entry {
                serde_json::Value::Object(mut metadata) => {
                    metadata.remove("key");
                    Ok(VoiceCatalogEntry { key, metadata })
                }
                _ => Err(EngineError::InvalidResponse(format!(
                    "catalog entry {} is not an object",
                    key
                ))),
            })
            .collect(),
        serde_json::Value::Array(entries) => entries
            .into_iter()
            .map(|entry| {
                serde_json::from_value(entry)
                    .map_err(|e| EngineError::InvalidResponse(e.to_string()))
            })
            .collect(),
        _ => Err(EngineError::InvalidResponse(
            "catalog is neither an object nor an array".to_string(),
        )),
    }
}

/// Piper 会话句柄
struct PiperVoiceSession {
    client: Client,
    config: PiperEngineConfig,
    sink: Arc<dyn SynthesisSink>,
    model_path: Option<PathBuf>,
}

impl PiperVoiceSession {
    fn model_url(&self, voice_id: &str) -> String {
        format!(
            "{}/{}.onnx",
            self.config.download_base_url.trim_end_matches('/'),
            voice_id
        )
    }

    /// 流式下载到 `.part` 文件，完成后原子改名
    async fn download_with_progress(
        &self,
        url: &str,
        dest: &Path,
        voice_id: &str,
    ) -> Result<(), EngineError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(EngineError::VoiceNotFound(voice_id.to_string()));
        }
        if !status.is_success() {
            return Err(EngineError::Network(format!(
                "download of {} returned HTTP {}",
                url, status
            )));
        }

        let total = response.content_length().unwrap_or(0);
        let part_path = dest.with_extension("onnx.part");
        let mut file = tokio::fs::File::create(&part_path)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;

        let mut loaded = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| EngineError::Network(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| EngineError::Storage(e.to_string()))?;
            loaded += chunk.len() as u64;
            self.sink.progress(DownloadProgress {
                url: url.to_string(),
                loaded,
                total,
            });
        }

        file.flush()
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        drop(file);

        tokio::fs::rename(&part_path, dest)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;

        Ok(())
    }

    /// 下载模型配置 sidecar（体积小，不上报进度）
    async fn download_sidecar(&self, url: &str, dest: &Path) -> Result<(), EngineError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Network(format!(
                "download of {} returned HTTP {}",
                url, status
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))
    }
}

#[async_trait]
impl VoiceSessionPort for PiperVoiceSession {
    async fn load_voice(&mut self, voice_id: &str) -> Result<(), EngineError> {
        tokio::fs::create_dir_all(&self.config.voices_dir)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;

        let model_path = self.config.voices_dir.join(format!("{voice_id}.onnx"));
        let exists = tokio::fs::try_exists(&model_path)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))?;

        if exists {
            self.sink.log(&format!("Voice {voice_id} already stored"));
        } else {
            let url = self.model_url(voice_id);
            self.sink.log(&format!("Downloading voice {voice_id}"));
            self.download_with_progress(&url, &model_path, voice_id)
                .await?;

            let sidecar_url = format!("{url}.json");
            let sidecar_path = self.config.voices_dir.join(format!("{voice_id}.onnx.json"));
            self.download_sidecar(&sidecar_url, &sidecar_path).await?;

            self.sink.log(&format!("Voice {voice_id} ready"));
        }

        tracing::info!(voice_id = %voice_id, path = %model_path.display(), "Voice loaded");
        self.model_path = Some(model_path);
        Ok(())
    }

    async fn synthesize(&mut self, text: &str) -> Result<Vec<u8>, EngineError> {
        let model_path = self
            .model_path
            .as_ref()
            .ok_or_else(|| EngineError::VoiceLoad("no voice loaded".to_string()))?;

        tracing::debug!(
            text_len = text.len(),
            model = %model_path.display(),
            "Running piper synthesis"
        );

        let mut child = Command::new(&self.config.piper_bin)
            .arg("--model")
            .arg(model_path)
            .arg("--output_file")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                EngineError::Synthesis(format!(
                    "failed to start {}: {}",
                    self.config.piper_bin, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(text.as_bytes())
                .await
                .map_err(|e| EngineError::Synthesis(e.to_string()))?;
            // 关闭 stdin，让 piper 读到 EOF
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| EngineError::Synthesis(e.to_string()))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|line| !line.trim().is_empty()) {
            self.sink.log(line);
        }

        if !output.status.success() {
            let detail = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no diagnostic output");
            return Err(EngineError::Synthesis(format!(
                "piper exited with {}: {}",
                output.status, detail
            )));
        }

        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn engine_at(dir: &Path) -> PiperEngine {
        let config = PiperEngineConfig {
            voices_dir: dir.to_path_buf(),
            ..Default::default()
        };
        PiperEngine::new(config).unwrap()
    }

    #[test]
    fn test_parse_catalog_object_map() {
        let value = serde_json::json!({
            "en_US-joe": {"name": "Joe", "quality": "medium"},
            "en_GB-amy": {"name": "Amy", "quality": "low"},
        });

        let mut entries = parse_catalog(value).unwrap();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "en_GB-amy");
        assert_eq!(entries[1].key, "en_US-joe");
        assert_eq!(entries[1].metadata["name"], "Joe");
    }

    #[test]
    fn test_parse_catalog_array() {
        let value = serde_json::json!([
            {"key": "en_US-joe", "name": "Joe"},
        ]);

        let entries = parse_catalog(value).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "en_US-joe");
    }

    #[test]
    fn test_parse_catalog_rejects_scalar() {
        assert!(parse_catalog(serde_json::json!("nope")).is_err());
        assert!(parse_catalog(serde_json::json!({"v": 42})).is_err());
    }

    #[tokio::test]
    async fn test_stored_lists_onnx_stems() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("en_US-joe.onnx"), b"model").unwrap();
        std::fs::write(dir.path().join("en_US-joe.onnx.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("en_GB-amy.onnx"), b"model").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let engine = engine_at(dir.path());
        let stored = engine.stored().await.unwrap();
        assert_eq!(stored, vec!["en_GB-amy", "en_US-joe"]);
    }

    #[tokio::test]
    async fn test_stored_with_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        let engine = engine_at(&dir.path().join("does-not-exist"));
        assert!(engine.stored().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_clears_voices_dir() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("en_US-joe.onnx"), b"model").unwrap();
        std::fs::write(dir.path().join("en_US-joe.onnx.json"), b"{}").unwrap();

        let engine = engine_at(dir.path());
        engine.flush().await.unwrap();
        assert!(engine.stored().await.unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_flush_with_missing_dir_is_noop() {
        let dir = tempdir().unwrap();
        let engine = engine_at(&dir.path().join("does-not-exist"));
        assert!(engine.flush().await.is_ok());
    }

    #[test]
    fn test_config_default() {
        let config = PiperEngineConfig::default();
        assert_eq!(config.piper_bin, "piper");
        assert!(config.catalog_url.ends_with("voices.json"));
    }
}
