// 该文件是 Zhijian （织检） 项目的一部分。
// src/detect/synthetic.rs - 占位检测结果
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::RgbImage;

use super::{Detector, DetectorError, RawDetection};

// (x1, y1, x2, y2) 为相对图像宽高的比例
const SYNTHETIC_ITEMS: [([f64; 4], f32, &str); 2] = [
  ([0.20, 0.20, 0.45, 0.50], 0.92, "hole"),
  ([0.55, 0.55, 0.80, 0.85], 0.87, "stain"),
];

/// 仅由图像尺寸决定的固定检测结果
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticDetector;

impl SyntheticDetector {
  pub fn synthesize(&self, width: u32, height: u32) -> Vec<RawDetection> {
    let (w, h) = (width as f64, height as f64);
    SYNTHETIC_ITEMS
      .iter()
      .map(|&([x1, y1, x2, y2], confidence, label)| RawDetection {
        bbox: [x1 * w, y1 * h, x2 * w, y2 * h],
        confidence,
        label: label.to_string(),
      })
      .collect()
  }
}

impl Detector for SyntheticDetector {
  fn name(&self) -> &str {
    "synthetic"
  }

  fn infer(&self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectorError> {
    Ok(self.synthesize(image.width(), image.height()))
  }
}
