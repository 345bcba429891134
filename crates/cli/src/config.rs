//! 配置文件
//!
//! 记录已安装模型的位置、来源与校验和，放在平台配置目录下。
//! 文件不存在等价于默认配置。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    // ============ 已安装模型 ============
    /// 检测模型路径
    pub det_model_path: Option<String>,
    /// 识别模型路径
    pub rec_model_path: Option<String>,
    /// 字符集路径
    pub charset_path: Option<String>,
    /// 模型版本
    pub model_version: Option<String>,
    /// 安装来源
    pub install_source: Option<String>,

    // ============ 下载选项 ============
    /// 是否优先使用镜像
    pub use_mirror: Option<bool>,
    /// 下载地址覆盖
    pub det_url: Option<String>,
    pub rec_url: Option<String>,
    pub charset_url: Option<String>,

    // ============ 审计 ============
    /// 安装产物的 sha256
    pub det_sha256: Option<String>,
    pub rec_sha256: Option<String>,
    pub charset_sha256: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config dir unavailable")]
    NoConfigDir,
    #[error("data dir unavailable")]
    NoDataDir,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    Ok(base.join("pixtext").join("config.json"))
}

/// 模型缓存目录
pub fn models_dir() -> Result<PathBuf, ConfigError> {
    let base = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
    Ok(base.join("pixtext").join("models"))
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_from(&config_path()?)
}

pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    save_to(&config_path()?, config)
}

fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn save_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let raw = serde_json::to_string_pretty(config)?;
    fs::write(path, raw)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_default() {
        let config = load_from(Path::new("/nonexistent/pixtext/config.json")).unwrap();
        assert!(config.det_model_path.is_none());
        assert!(config.use_mirror.is_none());
    }

    #[test]
    fn test_round_trip() {
        let path = std::env::temp_dir().join("pixtext_config_test").join("config.json");
        let config = AppConfig {
            det_model_path: Some("/models/det.onnx".into()),
            model_version: Some("PP-OCRv5".into()),
            use_mirror: Some(true),
            ..Default::default()
        };
        save_to(&path, &config).unwrap();
        let loaded = load_from(&path).unwrap();
        assert_eq!(loaded.det_model_path.as_deref(), Some("/models/det.onnx"));
        assert_eq!(loaded.use_mirror, Some(true));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_serializes_camel_case() {
        let config = AppConfig {
            rec_model_path: Some("/models/rec.onnx".into()),
            ..Default::default()
        };
        let raw = serde_json::to_string(&config).unwrap();
        assert!(raw.contains("recModelPath"));
        assert!(!raw.contains("rec_model_path"));
    }

    #[test]
    fn test_unknown_keys_are_tolerated() {
        let raw = r#"{"detModelPath": "/d.onnx", "someFutureKey": 1}"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.det_model_path.as_deref(), Some("/d.onnx"));
    }
}
