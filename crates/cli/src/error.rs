//! 运行期错误
//!
//! 四类失败，全部在顶层收敛为一条 `error` 信封加非零退出码，
//! 没有重试，没有部分成功。Display 即信封文案。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunError {
    /// 缺少必需的位置参数
    #[error("Usage: pixtext <image_path>")]
    Usage,

    /// 启动能力检查失败：推理运行时不可用
    #[error("Missing dependencies: {0}. Install with: install ONNX Runtime (https://onnxruntime.ai/docs/install/) or set ORT_DYLIB_PATH")]
    MissingDependencies(String),

    /// 图片路径不存在
    #[error("Image file not found: {0}")]
    ImageNotFound(String),

    /// 模型获取、加载、图片解码或推理中的任何失败
    #[error("OCR processing failed: {0}")]
    Processing(String),
}

impl RunError {
    pub fn exit_code(&self) -> i32 {
        1
    }
}
