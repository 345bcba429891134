//! OCR 错误类型

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("onnx runtime unavailable: {0}")]
    Runtime(String),

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("charset invalid: {0}")]
    Charset(String),

    #[error("image process failed: {0}")]
    ImageProcess(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
