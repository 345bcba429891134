//! 文本识别
//!
//! CRNN 模型输出 [batch, seq, classes] 的 logits，按 CTC 贪心解码：
//! 逐时间步取最大类，跳过 blank（索引 0）并折叠相邻重复。

use std::path::Path;

use ndarray::{Array4, ArrayViewD};
use ort::session::Session;
use ort::value::Tensor;

use crate::error::OcrError;
use crate::threading::configure_session;

/// 单行识别结果
#[derive(Debug, Clone)]
pub struct LineText {
    pub text: String,
    pub confidence: f32,
}

/// 文本识别器
pub struct TextRecognizer {
    session: Session,
    charset: Vec<String>,
}

impl TextRecognizer {
    /// 从识别模型和字符集文件创建识别器
    ///
    /// 字符集每行一个字符，行号 + 1 即模型类别索引（0 为 blank）。
    pub fn new(model_path: &Path, charset_path: &Path) -> Result<Self, OcrError> {
        let builder = Session::builder().map_err(|e: ort::Error| OcrError::ModelLoad(e.to_string()))?;
        let builder = configure_session(builder).map_err(|e| OcrError::ModelLoad(e.to_string()))?;
        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| OcrError::ModelLoad(format!("rec model: {}", e)))?;

        let charset = load_charset(charset_path)?;
        log::info!("[OCR] 字符集: {} 个字符", charset.len());

        Ok(Self { session, charset })
    }

    /// 识别一批固定尺寸的行图像
    pub fn recognize_batch(&mut self, input: Array4<f32>) -> Result<Vec<LineText>, OcrError> {
        let batch = input.shape()[0];

        let tensor = Tensor::from_array(input).map_err(|e| OcrError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| OcrError::Inference(format!("rec run: {}", e)))?;

        let logits = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| OcrError::Inference(e.to_string()))?
            .to_owned();
        drop(outputs);

        if logits.ndim() != 3 {
            return Err(OcrError::Inference(format!(
                "unexpected rec output shape: {:?}",
                logits.shape()
            )));
        }

        let mut lines = Vec::with_capacity(batch);
        for b in 0..batch {
            lines.push(decode_ctc(&logits.view(), b, &self.charset));
        }
        Ok(lines)
    }
}

/// CTC 贪心解码单个样本
///
/// 置信度取每个保留字符处 softmax 概率的平均值。
fn decode_ctc(logits: &ArrayViewD<f32>, batch_idx: usize, charset: &[String]) -> LineText {
    let seq_len = logits.shape()[1];
    let classes = logits.shape()[2];

    let mut text = String::new();
    let mut prob_sum = 0.0f32;
    let mut kept = 0u32;
    let mut prev_class = 0usize;

    for t in 0..seq_len {
        let mut best = 0usize;
        let mut best_logit = f32::NEG_INFINITY;
        for c in 0..classes {
            let v = logits[[batch_idx, t, c]];
            if v > best_logit {
                best_logit = v;
                best = c;
            }
        }

        if best != 0 && best != prev_class {
            let char_idx = best - 1;
            if char_idx < charset.len() {
                text.push_str(&charset[char_idx]);
                prob_sum += softmax_at(logits, batch_idx, t, best, classes);
                kept += 1;
            }
        }
        prev_class = best;
    }

    let confidence = if kept > 0 { prob_sum / kept as f32 } else { 0.0 };
    LineText { text, confidence }
}

fn softmax_at(logits: &ArrayViewD<f32>, b: usize, t: usize, class: usize, classes: usize) -> f32 {
    let mut max = f32::NEG_INFINITY;
    for c in 0..classes {
        max = max.max(logits[[b, t, c]]);
    }
    let mut denom = 0.0f32;
    for c in 0..classes {
        denom += (logits[[b, t, c]] - max).exp();
    }
    (logits[[b, t, class]] - max).exp() / denom
}

fn load_charset(path: &Path) -> Result<Vec<String>, OcrError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| OcrError::Charset(format!("{}: {}", path.display(), e)))?;
    let charset: Vec<String> = content.lines().map(|s| s.to_string()).collect();
    if charset.is_empty() {
        return Err(OcrError::Charset("empty charset file".to_string()));
    }
    Ok(charset)
}
