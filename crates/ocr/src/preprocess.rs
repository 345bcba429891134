//! 图像预处理
//!
//! PP-OCRv5 的检测/识别模型对输入有固定要求：BGR 通道序、
//! (x/255 - 0.5) / 0.5 归一化、NCHW 布局。

use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use ndarray::{Array3, Array4, Axis};

use crate::det::TextBox;

/// 检测输入的最长边上限，且宽高都取 32 的倍数
pub const DET_MAX_SIDE: u32 = 960;
pub const DET_MIN_SIDE: u32 = 32;
const DET_STRIDE: u32 = 32;

/// 识别输入的固定高宽
pub const REC_HEIGHT: u32 = 48;
pub const REC_WIDTH: u32 = 320;

/// 裁剪文本区域时向外扩的边距比例
const CROP_PAD_RATIO: f32 = 0.04;

/// 填充像素（灰色，归一化后为 0）
const PAD_PIXEL: Rgb<u8> = Rgb([127, 127, 127]);

/// 为检测模型准备 NCHW 输入张量
pub fn det_tensor(img: &DynamicImage) -> Array4<f32> {
    let rgb = img.to_rgb8();
    let (w, h) = (rgb.width(), rgb.height());

    let scale = det_scale(w, h);
    let new_w = (((w as f32 * scale) as u32) / DET_STRIDE * DET_STRIDE).max(DET_MIN_SIDE);
    let new_h = (((h as f32 * scale) as u32) / DET_STRIDE * DET_STRIDE).max(DET_MIN_SIDE);

    let resized = image::imageops::resize(&rgb, new_w, new_h, image::imageops::FilterType::Lanczos3);
    to_chw(&resized).insert_axis(Axis(0))
}

/// 把文本区域裁剪图按批拼成识别模型输入
///
/// 每张裁剪图缩放到固定高度、按比例限宽，右侧用灰色填充。
pub fn rec_batches(crops: &[DynamicImage], batch_size: usize) -> Vec<Array4<f32>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(crops.len().div_ceil(batch_size));

    for chunk in crops.chunks(batch_size) {
        let mut batch = Array4::<f32>::zeros((
            chunk.len(),
            3,
            REC_HEIGHT as usize,
            REC_WIDTH as usize,
        ));
        for (i, crop) in chunk.iter().enumerate() {
            let tensor = rec_tensor(crop);
            batch.index_axis_mut(Axis(0), i).assign(&tensor);
        }
        batches.push(batch);
    }

    batches
}

/// 按检测框裁剪原图，四周留少量边距
pub fn crop_span(img: &DynamicImage, text_box: &TextBox) -> DynamicImage {
    let (img_w, img_h) = (img.width() as f32, img.height() as f32);

    let w = (text_box.x1 - text_box.x0).max(1.0);
    let h = (text_box.y1 - text_box.y0).max(1.0);
    let pad_x = (w * CROP_PAD_RATIO).round();
    let pad_y = (h * CROP_PAD_RATIO).round();

    let x0 = (text_box.x0 - pad_x).clamp(0.0, img_w - 1.0);
    let y0 = (text_box.y0 - pad_y).clamp(0.0, img_h - 1.0);
    let x1 = (text_box.x1 + pad_x).clamp(0.0, img_w);
    let y1 = (text_box.y1 + pad_y).clamp(0.0, img_h);

    let crop_w = ((x1 - x0) as u32).max(1);
    let crop_h = ((y1 - y0) as u32).max(1);

    img.crop_imm(x0 as u32, y0 as u32, crop_w, crop_h)
}

fn rec_tensor(img: &DynamicImage) -> Array3<f32> {
    let rgb = img.to_rgb8();
    let (w, h) = (rgb.width(), rgb.height());

    let scale = REC_HEIGHT as f32 / h.max(1) as f32;
    let new_w = ((w as f32 * scale) as u32).clamp(1, REC_WIDTH);
    let resized = image::imageops::resize(&rgb, new_w, REC_HEIGHT, image::imageops::FilterType::Lanczos3);

    let mut padded: RgbImage = ImageBuffer::from_pixel(REC_WIDTH, REC_HEIGHT, PAD_PIXEL);
    image::imageops::overlay(&mut padded, &resized, 0, 0);

    to_chw(&padded)
}

fn det_scale(w: u32, h: u32) -> f32 {
    let long = w.max(h) as f32;
    let short = w.min(h) as f32;

    let mut scale = 1.0f32;
    if long > DET_MAX_SIDE as f32 {
        scale = DET_MAX_SIDE as f32 / long;
    }
    if short * scale < DET_MIN_SIDE as f32 {
        scale = DET_MIN_SIDE as f32 / short;
    }
    scale
}

/// RGB -> BGR、归一化、CHW
fn to_chw(img: &RgbImage) -> Array3<f32> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut tensor = Array3::<f32>::zeros((3, h, w));

    for (x, y, pixel) in img.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, y, x]] = pixel[2] as f32 / 255.0 * 2.0 - 1.0;
        tensor[[1, y, x]] = pixel[1] as f32 / 255.0 * 2.0 - 1.0;
        tensor[[2, y, x]] = pixel[0] as f32 / 255.0 * 2.0 - 1.0;
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_det_scale_shrinks_large_image() {
        let scale = det_scale(1920, 1080);
        assert!((1920.0 * scale) <= DET_MAX_SIDE as f32 + 1.0);
    }

    #[test]
    fn test_det_scale_keeps_small_image() {
        assert_eq!(det_scale(640, 480), 1.0);
    }

    #[test]
    fn test_det_tensor_shape_is_stride_aligned() {
        let img = DynamicImage::new_rgb8(100, 70);
        let tensor = det_tensor(&img);
        let shape = tensor.shape();
        assert_eq!(shape[0], 1);
        assert_eq!(shape[1], 3);
        assert_eq!(shape[2] % DET_STRIDE as usize, 0);
        assert_eq!(shape[3] % DET_STRIDE as usize, 0);
    }

    #[test]
    fn test_to_chw_normalizes_range() {
        let mut img = RgbImage::new(1, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 127]));
        let tensor = to_chw(&img);
        // BGR 顺序
        assert!((tensor[[0, 0, 0]] - (127.0 / 255.0 * 2.0 - 1.0)).abs() < 1e-5);
        assert!((tensor[[1, 0, 0]] + 1.0).abs() < 1e-5);
        assert!((tensor[[2, 0, 0]] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_rec_batches_pads_and_chunks() {
        let crops: Vec<DynamicImage> = (0..5).map(|_| DynamicImage::new_rgb8(64, 16)).collect();
        let batches = rec_batches(&crops, 2);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].shape(), &[2, 3, REC_HEIGHT as usize, REC_WIDTH as usize]);
        assert_eq!(batches[2].shape(), &[1, 3, REC_HEIGHT as usize, REC_WIDTH as usize]);
    }

    #[test]
    fn test_crop_span_stays_in_bounds() {
        let img = DynamicImage::new_rgb8(100, 50);
        let text_box = TextBox {
            x0: 90.0,
            y0: 40.0,
            x1: 120.0,
            y1: 60.0,
            score: 0.9,
        };
        let crop = crop_span(&img, &text_box);
        assert!(crop.width() >= 1 && crop.height() >= 1);
        assert!(crop.width() <= 100 && crop.height() <= 50);
    }
}
