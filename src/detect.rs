// 该文件是 Zhijian （织检） 项目的一部分。
// src/detect.rs - 缺陷检测适配
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::fmt;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, annotation::BoundingBox};

#[cfg(feature = "exec_detector")]
mod exec;
#[cfg(feature = "exec_detector")]
pub use self::exec::ExecDetector;

mod synthetic;
pub use self::synthetic::SyntheticDetector;

mod unavailable;
pub use self::unavailable::UnavailableDetector;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("检测后端不可用: {0}")]
  Unavailable(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像编码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("检测进程异常退出: {0}")]
  ProcessFailed(String),
  #[error("检测输出解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("检测输出无效: {0}")]
  InvalidOutput(String),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 后端给出的原始检测项，像素坐标 `[x1, y1, x2, y2]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
  pub bbox: [f64; 4],
  pub confidence: f32,
  pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  pub bbox: BoundingBox,
  pub confidence: f32,
  pub class_label: String,
}

impl TryFrom<RawDetection> for Detection {
  type Error = DetectorError;

  fn try_from(raw: RawDetection) -> Result<Self, Self::Error> {
    if !raw.confidence.is_finite() || !(0.0..=1.0).contains(&raw.confidence) {
      return Err(DetectorError::InvalidOutput(format!(
        "置信度超出范围: {}",
        raw.confidence
      )));
    }
    if raw.bbox.iter().any(|v| !v.is_finite()) {
      return Err(DetectorError::InvalidOutput(format!(
        "边界框坐标无效: {:?}",
        raw.bbox
      )));
    }

    let [x1, y1, x2, y2] = raw.bbox;
    Ok(Detection {
      bbox: BoundingBox::from_pixels(x1, y1, x2, y2),
      confidence: raw.confidence,
      class_label: raw.label,
    })
  }
}

/// 检测结果来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
  Real,
  Fallback,
}

impl fmt::Display for Provenance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Provenance::Real => write!(f, "real"),
      Provenance::Fallback => write!(f, "fallback"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
  pub detections: Vec<Detection>,
  pub provenance: Provenance,
}

impl DetectionReport {
  pub fn is_fallback(&self) -> bool {
    self.provenance == Provenance::Fallback
  }
}

/// 外部检测后端
pub trait Detector {
  fn name(&self) -> &str;

  /// 对整幅图像推理，不做阈值过滤
  fn infer(&self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectorError>;
}

pub enum DetectorWrapper {
  #[cfg(feature = "exec_detector")]
  Exec(ExecDetector),
  Unavailable(UnavailableDetector),
}

impl Default for DetectorWrapper {
  fn default() -> Self {
    DetectorWrapper::Unavailable(UnavailableDetector)
  }
}

impl FromUrl for DetectorWrapper {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "exec_detector")]
      ExecDetector::SCHEME => Ok(DetectorWrapper::Exec(ExecDetector::from_url(url)?)),
      UnavailableDetector::SCHEME => Ok(DetectorWrapper::Unavailable(
        UnavailableDetector::from_url(url)?,
      )),
      scheme => Err(DetectorError::SchemeMismatch(format!(
        "不支持的检测后端: {}",
        scheme
      ))),
    }
  }
}

impl Detector for DetectorWrapper {
  fn name(&self) -> &str {
    match self {
      #[cfg(feature = "exec_detector")]
      DetectorWrapper::Exec(detector) => detector.name(),
      DetectorWrapper::Unavailable(detector) => detector.name(),
    }
  }

  fn infer(&self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectorError> {
    match self {
      #[cfg(feature = "exec_detector")]
      DetectorWrapper::Exec(detector) => detector.infer(image),
      DetectorWrapper::Unavailable(detector) => detector.infer(image),
    }
  }
}

/// 阈值限制在 [0, 1]，NaN 取默认值
pub fn normalize_threshold(threshold: f32) -> f32 {
  if threshold.is_nan() {
    DEFAULT_CONFIDENCE_THRESHOLD
  } else {
    threshold.clamp(0.0, 1.0)
  }
}

fn run_detector<D: Detector + ?Sized>(
  detector: &D,
  image: &RgbImage,
) -> Result<Vec<Detection>, DetectorError> {
  detector
    .infer(image)?
    .into_iter()
    .map(Detection::try_from)
    .collect()
}

/// 检测适配器：真实后端失败时改用合成结果
pub struct DetectionAdapter<D = DetectorWrapper> {
  real: D,
  fallback: SyntheticDetector,
}

impl<D: Detector> DetectionAdapter<D> {
  pub fn new(real: D) -> Self {
    info!("检测后端: {}", real.name());
    Self {
      real,
      fallback: SyntheticDetector,
    }
  }

  pub fn backend_name(&self) -> &str {
    self.real.name()
  }

  /// 检测并按置信度过滤，任何后端错误都只体现在结果来源上
  pub fn detect(&self, image: &RgbImage, threshold: f32) -> DetectionReport {
    let threshold = normalize_threshold(threshold);

    let (detections, provenance) = match run_detector(&self.real, image) {
      Ok(detections) => (detections, Provenance::Real),
      Err(e) => {
        warn!("检测后端 {} 失败，使用占位结果: {}", self.real.name(), e);
        let detections = run_detector(&self.fallback, image).unwrap_or_default();
        (detections, Provenance::Fallback)
      }
    };

    let total = detections.len();
    let detections: Vec<Detection> = detections
      .into_iter()
      .filter(|d| d.confidence >= threshold)
      .collect();
    debug!(
      "检测结果 ({}): {} 个, 阈值 {:.2} 后保留 {} 个",
      provenance,
      total,
      threshold,
      detections.len()
    );

    DetectionReport {
      detections,
      provenance,
    }
  }
}
