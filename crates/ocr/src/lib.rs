//! PP-OCRv5 ONNX Runtime 推理引擎
//!
//! 检测 + 识别两段式流水线：DBNet 找出文本区域，CRNN + CTC 解码文字。
//! 只做推理，模型文件的获取与缓存由调用方负责。

mod det;
mod error;
mod preprocess;
mod rec;
mod threading;

pub use det::{DetParams, TextBox, TextDetector};
pub use error::OcrError;
pub use rec::{LineText, TextRecognizer};

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// 单批识别的行数上限
const MAX_BATCH_SIZE: usize = 32;

/// 引擎配置：三个模型产物的本地路径
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 检测模型（ONNX）
    pub det_model: PathBuf,
    /// 识别模型（ONNX）
    pub rec_model: PathBuf,
    /// 字符集文件（每行一个字符）
    pub charset: PathBuf,
}

/// 一个识别出的文本区域
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSpan {
    pub text: String,
    pub confidence: f32,
    /// 相对坐标（0-1）
    pub bbox: BBox,
}

/// 边界框（相对坐标 0-1）
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// OCR 引擎
pub struct OcrEngine {
    detector: TextDetector,
    recognizer: TextRecognizer,
}

impl OcrEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, OcrError> {
        log::info!("[OCR] 加载检测模型: {}", config.det_model.display());
        let detector = TextDetector::new(&config.det_model)?;

        log::info!("[OCR] 加载识别模型: {}", config.rec_model.display());
        let recognizer = TextRecognizer::new(&config.rec_model, &config.charset)?;

        Ok(Self { detector, recognizer })
    }

    /// 识别图片文件
    pub fn recognize_file(&mut self, path: &Path) -> Result<Vec<OcrSpan>, OcrError> {
        let img = image::open(path)
            .map_err(|e| OcrError::ImageProcess(format!("{}: {}", path.display(), e)))?;
        self.recognize(&img)
    }

    /// 识别内存中的图像
    pub fn recognize(&mut self, img: &DynamicImage) -> Result<Vec<OcrSpan>, OcrError> {
        let (orig_w, orig_h) = (img.width(), img.height());

        let det_start = Instant::now();
        let det_input = preprocess::det_tensor(img);
        let boxes = self.detector.detect(det_input, orig_w, orig_h)?;
        log::info!(
            "[OCR] 检测: {} 个区域, {} ms",
            boxes.len(),
            det_start.elapsed().as_millis()
        );

        if boxes.is_empty() {
            return Ok(Vec::new());
        }

        let rec_start = Instant::now();
        let crops: Vec<DynamicImage> = boxes.iter().map(|b| preprocess::crop_span(img, b)).collect();
        let lines = self.recognize_crops(&crops)?;

        let mut spans = Vec::with_capacity(boxes.len());
        for (text_box, line) in boxes.iter().zip(lines.into_iter()) {
            if line.text.trim().is_empty() {
                continue;
            }
            log::debug!("[OCR] \"{}\" ({:.2})", line.text, line.confidence);
            spans.push(OcrSpan {
                text: line.text,
                confidence: line.confidence,
                bbox: relative_bbox(text_box, orig_w, orig_h),
            });
        }

        log::info!(
            "[OCR] 识别: {} 行, {} ms",
            spans.len(),
            rec_start.elapsed().as_millis()
        );
        Ok(spans)
    }

    /// 只要文字：按阅读顺序把各行拼成一个字符串
    pub fn extract_text(&mut self, path: &Path) -> Result<String, OcrError> {
        let spans = self.recognize_file(path)?;
        Ok(join_spans(&spans))
    }

    /// 分批识别裁剪图；单批失败降级为空行，不中断整次调用
    fn recognize_crops(&mut self, crops: &[DynamicImage]) -> Result<Vec<LineText>, OcrError> {
        let mut lines = Vec::with_capacity(crops.len());

        for batch in preprocess::rec_batches(crops, MAX_BATCH_SIZE) {
            let batch_len = batch.shape()[0];
            match self.recognizer.recognize_batch(batch) {
                Ok(mut decoded) => lines.append(&mut decoded),
                Err(e) => {
                    log::warn!("[OCR] 批量识别失败: {}", e);
                    lines.extend((0..batch_len).map(|_| LineText {
                        text: String::new(),
                        confidence: 0.0,
                    }));
                }
            }
        }

        Ok(lines)
    }
}

/// 启动能力检查：ONNX Runtime 是否可用
///
/// load-dynamic 构建下动态库可能缺失，这里显式初始化一次运行时，
/// 把失败作为普通结果值返回给调用方。
pub fn runtime_check() -> Result<(), OcrError> {
    ort::init()
        .with_name("pixtext")
        .commit()
        .map(|_| ())
        .map_err(|e| OcrError::Runtime(e.to_string()))
}

/// 按阅读顺序拼接各行文字
pub fn join_spans(spans: &[OcrSpan]) -> String {
    spans
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn relative_bbox(text_box: &TextBox, img_w: u32, img_h: u32) -> BBox {
    let w = img_w.max(1) as f32;
    let h = img_h.max(1) as f32;
    BBox {
        x: text_box.x0 / w,
        y: text_box.y0 / h,
        w: (text_box.x1 - text_box.x0) / w,
        h: (text_box.y1 - text_box.y0) / h,
    }
}
