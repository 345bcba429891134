//! 文本检测
//!
//! DBNet 输出一张文字概率图，这里做二值化、连通域收集和外扩，
//! 得到按阅读顺序排列的文本框。

use std::collections::VecDeque;
use std::path::Path;

use ndarray::{Array2, Array4, ArrayViewD};
use ort::session::Session;
use ort::value::Tensor;

use crate::error::OcrError;
use crate::threading::configure_session;

/// 检测后处理参数
#[derive(Debug, Clone)]
pub struct DetParams {
    /// 概率图二值化阈值
    pub prob_thresh: f32,
    /// 连通域平均得分下限
    pub box_thresh: f32,
    /// 框的最小边长（概率图坐标系）
    pub min_box_size: f32,
    /// 框外扩比例
    pub unclip_ratio: f32,
}

impl Default for DetParams {
    fn default() -> Self {
        Self {
            prob_thresh: 0.3,
            box_thresh: 0.5,
            min_box_size: 5.0,
            unclip_ratio: 1.6,
        }
    }
}

/// 检测到的文本框（原图像素坐标，轴对齐矩形）
#[derive(Debug, Clone, Copy)]
pub struct TextBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    pub score: f32,
}

/// 文本检测器
pub struct TextDetector {
    session: Session,
    params: DetParams,
}

impl TextDetector {
    pub fn new(model_path: &Path) -> Result<Self, OcrError> {
        let builder = Session::builder().map_err(|e: ort::Error| OcrError::ModelLoad(e.to_string()))?;
        let builder = configure_session(builder).map_err(|e| OcrError::ModelLoad(e.to_string()))?;
        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| OcrError::ModelLoad(format!("det model: {}", e)))?;

        Ok(Self {
            session,
            params: DetParams::default(),
        })
    }

    /// 在预处理后的输入上运行检测，返回原图坐标系下的文本框
    pub fn detect(
        &mut self,
        input: Array4<f32>,
        orig_w: u32,
        orig_h: u32,
    ) -> Result<Vec<TextBox>, OcrError> {
        let input_h = input.shape()[2] as u32;
        let input_w = input.shape()[3] as u32;

        let tensor = Tensor::from_array(input).map_err(|e| OcrError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| OcrError::Inference(format!("det run: {}", e)))?;

        let prob_map = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| OcrError::Inference(e.to_string()))?
            .to_owned();
        drop(outputs);

        let boxes = collect_boxes(&prob_map.view(), &self.params)?;
        Ok(rescale_boxes(boxes, input_w, input_h, orig_w, orig_h))
    }
}

/// 概率图可能是 [1,1,H,W] 或 [1,H,W]
fn map_dims(shape: &[usize]) -> Result<(usize, usize), OcrError> {
    match shape.len() {
        4 => Ok((shape[2], shape[3])),
        3 => Ok((shape[1], shape[2])),
        _ => Err(OcrError::Inference(format!("unexpected det output shape: {:?}", shape))),
    }
}

fn prob_at(map: &ArrayViewD<f32>, y: usize, x: usize) -> f32 {
    if map.ndim() == 4 {
        map[[0, 0, y, x]]
    } else {
        map[[0, y, x]]
    }
}

/// 对二值化后的概率图做连通域收集
fn collect_boxes(map: &ArrayViewD<f32>, params: &DetParams) -> Result<Vec<TextBox>, OcrError> {
    let (h, w) = map_dims(map.shape())?;

    let mut mask = Array2::<bool>::from_elem((h, w), false);
    for y in 0..h {
        for x in 0..w {
            mask[[y, x]] = prob_at(map, y, x) > params.prob_thresh;
        }
    }

    let mut seen = Array2::<bool>::from_elem((h, w), false);
    let mut boxes = Vec::new();
    let mut queue = VecDeque::new();

    for sy in 0..h {
        for sx in 0..w {
            if !mask[[sy, sx]] || seen[[sy, sx]] {
                continue;
            }

            let (mut min_x, mut max_x, mut min_y, mut max_y) = (sx, sx, sy, sy);
            let mut score_sum = 0.0f32;
            let mut area = 0u32;

            seen[[sy, sx]] = true;
            queue.push_back((sx, sy));

            while let Some((x, y)) = queue.pop_front() {
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
                score_sum += prob_at(map, y, x);
                area += 1;

                if x > 0 && mask[[y, x - 1]] && !seen[[y, x - 1]] {
                    seen[[y, x - 1]] = true;
                    queue.push_back((x - 1, y));
                }
                if x + 1 < w && mask[[y, x + 1]] && !seen[[y, x + 1]] {
                    seen[[y, x + 1]] = true;
                    queue.push_back((x + 1, y));
                }
                if y > 0 && mask[[y - 1, x]] && !seen[[y - 1, x]] {
                    seen[[y - 1, x]] = true;
                    queue.push_back((x, y - 1));
                }
                if y + 1 < h && mask[[y + 1, x]] && !seen[[y + 1, x]] {
                    seen[[y + 1, x]] = true;
                    queue.push_back((x, y + 1));
                }
            }

            let box_w = (max_x - min_x) as f32;
            let box_h = (max_y - min_y) as f32;
            if box_w < params.min_box_size || box_h < params.min_box_size {
                continue;
            }

            let score = score_sum / area as f32;
            if score < params.box_thresh {
                continue;
            }

            // DBNet 的概率图收缩过，按比例外扩还原
            let grow_x = box_w * (params.unclip_ratio - 1.0) / 2.0;
            let grow_y = box_h * (params.unclip_ratio - 1.0) / 2.0;

            boxes.push(TextBox {
                x0: (min_x as f32 - grow_x).max(0.0),
                y0: (min_y as f32 - grow_y).max(0.0),
                x1: (max_x as f32 + grow_x).min(w as f32 - 1.0),
                y1: (max_y as f32 + grow_y).min(h as f32 - 1.0),
                score,
            });
        }
    }

    Ok(boxes)
}

/// 把概率图坐标映射回原图，并按从上到下排序
fn rescale_boxes(
    mut boxes: Vec<TextBox>,
    input_w: u32,
    input_h: u32,
    orig_w: u32,
    orig_h: u32,
) -> Vec<TextBox> {
    let sx = orig_w as f32 / input_w as f32;
    let sy = orig_h as f32 / input_h as f32;

    for b in boxes.iter_mut() {
        b.x0 *= sx;
        b.x1 *= sx;
        b.y0 *= sy;
        b.y1 *= sy;
    }

    boxes.sort_by(|a, b| a.y0.partial_cmp(&b.y0).unwrap_or(std::cmp::Ordering::Equal));
    boxes
}
