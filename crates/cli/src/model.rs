//! 模型接入层
//!
//! 运行器只透过 `TextModel` 看到一个"给图出值"的推理器，
//! 返回值形状不定（对象、字符串或别的），由归一化统一处理。
//! 测试用 mock 实现替换整个提供者。

use image::DynamicImage;
use serde_json::{json, Value};

use pixtext_ocr::{join_spans, EngineConfig, OcrEngine};

use crate::models::{ensure_models, InstalledModels, MODEL_ID};

/// 可替换的模型抽象
pub trait TextModel {
    /// 对一张图推理，返回形状不定的结果值
    fn infer(&mut self, img: &DynamicImage) -> Result<Value, String>;
}

/// 能力检查与模型构造
pub trait ModelProvider {
    /// 启动能力检查：推理运行时是否可用
    fn check_runtime(&self) -> Result<(), String>;

    /// 解析固定标识符并加载模型（首次运行会触发下载）
    fn load_model(&self) -> Result<Box<dyn TextModel>, String>;
}

/// PP-OCRv5 ONNX 推理实现
pub struct PaddleModel {
    engine: OcrEngine,
}

impl PaddleModel {
    pub fn load(models: &InstalledModels) -> Result<Self, String> {
        let config = EngineConfig {
            det_model: models.det.clone(),
            rec_model: models.rec.clone(),
            charset: models.charset.clone(),
        };
        let engine = OcrEngine::new(&config).map_err(|e| e.to_string())?;
        Ok(Self { engine })
    }
}

impl TextModel for PaddleModel {
    fn infer(&mut self, img: &DynamicImage) -> Result<Value, String> {
        let spans = self.engine.recognize(img).map_err(|e| e.to_string())?;
        Ok(json!({
            "text": join_spans(&spans),
            "model": MODEL_ID,
            "spans": spans,
        }))
    }
}

/// 默认提供者：ONNX Runtime + 模型注册表
pub struct OnnxProvider;

impl ModelProvider for OnnxProvider {
    fn check_runtime(&self) -> Result<(), String> {
        pixtext_ocr::runtime_check().map_err(|e| e.to_string())
    }

    fn load_model(&self) -> Result<Box<dyn TextModel>, String> {
        let models = ensure_models().map_err(|e| format!("{:#}", e))?;
        let model = PaddleModel::load(&models)?;
        Ok(Box::new(model))
    }
}
