//! 模型注册表与本地缓存
//!
//! 固定标识符 `PP-OCRv5` 对应三个产物：检测模型、识别模型、字符集。
//! 首次运行从主站或镜像下载到数据目录，之后直接复用；
//! 安装时记录 sha256 供审计对照。

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};

use crate::config::{load_config, models_dir, save_config, AppConfig};

/// 固定模型标识符
pub const MODEL_ID: &str = "PP-OCRv5";

const DOWNLOAD_CHUNK: usize = 64 * 1024;
const PROGRESS_LOG_STEP: u64 = 1 << 20;

/// 单个模型产物
struct Artifact {
    file_name: &'static str,
    url: &'static str,
    mirror: &'static str,
}

const DET: Artifact = Artifact {
    file_name: "PP-OCRv5_mobile_det.onnx",
    url: "https://huggingface.co/ppocr-onnx/PP-OCRv5/resolve/main/PP-OCRv5_mobile_det.onnx",
    mirror: "https://hf-mirror.com/ppocr-onnx/PP-OCRv5/resolve/main/PP-OCRv5_mobile_det.onnx",
};

const REC: Artifact = Artifact {
    file_name: "PP-OCRv5_mobile_rec.onnx",
    url: "https://huggingface.co/ppocr-onnx/PP-OCRv5/resolve/main/PP-OCRv5_mobile_rec.onnx",
    mirror: "https://hf-mirror.com/ppocr-onnx/PP-OCRv5/resolve/main/PP-OCRv5_mobile_rec.onnx",
};

const CHARSET: Artifact = Artifact {
    file_name: "ppocr_keys_v5.txt",
    url: "https://huggingface.co/ppocr-onnx/PP-OCRv5/resolve/main/ppocr_keys_v5.txt",
    mirror: "https://hf-mirror.com/ppocr-onnx/PP-OCRv5/resolve/main/ppocr_keys_v5.txt",
};

/// 本地就绪的模型产物
#[derive(Debug, Clone)]
pub struct InstalledModels {
    pub det: PathBuf,
    pub rec: PathBuf,
    pub charset: PathBuf,
}

/// 确保模型产物在本地可用
///
/// 配置里记录过且文件仍在则直接复用；否则逐个下载、
/// 记录路径与 sha256 并写回配置。
pub fn ensure_models() -> Result<InstalledModels> {
    let mut config = load_config().context("load config")?;

    if let Some(models) = installed_from_config(&config) {
        log::info!("[Model] 复用已安装模型: {}", models.det.display());
        return Ok(models);
    }

    let dir = models_dir().context("resolve models dir")?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;

    let use_mirror = config.use_mirror.unwrap_or(false);
    let det = fetch_artifact(&DET, config.det_url.as_deref(), use_mirror, &dir, 1, 3)?;
    let rec = fetch_artifact(&REC, config.rec_url.as_deref(), use_mirror, &dir, 2, 3)?;
    let charset = fetch_artifact(&CHARSET, config.charset_url.as_deref(), use_mirror, &dir, 3, 3)?;

    config.det_model_path = Some(det.to_string_lossy().to_string());
    config.rec_model_path = Some(rec.to_string_lossy().to_string());
    config.charset_path = Some(charset.to_string_lossy().to_string());
    config.model_version = Some(MODEL_ID.to_string());
    config.install_source = Some(if use_mirror { "mirror" } else { "primary" }.to_string());
    config.det_sha256 = file_digest(&det).ok();
    config.rec_sha256 = file_digest(&rec).ok();
    config.charset_sha256 = file_digest(&charset).ok();
    save_config(&config).context("save config")?;

    log::info!("[Model] 模型安装完成: {}", dir.display());
    Ok(InstalledModels { det, rec, charset })
}

fn installed_from_config(config: &AppConfig) -> Option<InstalledModels> {
    let det = PathBuf::from(config.det_model_path.as_ref()?);
    let rec = PathBuf::from(config.rec_model_path.as_ref()?);
    let charset = PathBuf::from(config.charset_path.as_ref()?);

    if det.exists() && rec.exists() && charset.exists() {
        Some(InstalledModels { det, rec, charset })
    } else {
        None
    }
}

fn fetch_artifact(
    artifact: &Artifact,
    override_url: Option<&str>,
    use_mirror: bool,
    dir: &Path,
    index: u32,
    total: u32,
) -> Result<PathBuf> {
    let dest = dir.join(artifact.file_name);
    if dest.exists() {
        log::info!("[Model] 已在缓存: {}", dest.display());
        return Ok(dest);
    }

    let url = override_url.unwrap_or(if use_mirror { artifact.mirror } else { artifact.url });
    log::info!("[Model] 下载 ({}/{}): {}", index, total, url);
    download(url, &dest).with_context(|| format!("download {}", artifact.file_name))?;
    Ok(dest)
}

fn download(url: &str, dest: &Path) -> Result<()> {
    let response = reqwest::blocking::get(url).context("request failed")?;
    if !response.status().is_success() {
        bail!("http status {}", response.status());
    }

    let total = response.content_length();
    let mut reader = response;
    let mut file =
        fs::File::create(dest).with_context(|| format!("create {}", dest.display()))?;

    let mut buf = [0u8; DOWNLOAD_CHUNK];
    let mut downloaded: u64 = 0;
    let mut last_log: u64 = 0;

    loop {
        let n = reader.read(&mut buf).context("read body")?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).context("write file")?;
        downloaded += n as u64;

        if downloaded - last_log >= PROGRESS_LOG_STEP {
            last_log = downloaded;
            match total {
                Some(t) => log::info!(
                    "[Model] 进度: {:.0}% ({} / {} 字节)",
                    downloaded as f64 / t as f64 * 100.0,
                    downloaded,
                    t
                ),
                None => log::info!("[Model] 进度: {} 字节", downloaded),
            }
        }
    }

    log::info!("[Model] 完成: {} 字节", downloaded);
    Ok(())
}

/// 计算文件 sha256，记录到配置供审计
fn file_digest(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).context("hash file")?;
    Ok(hex::encode(hasher.finalize()))
}
