// 该文件是 Zhijian （织检） 项目的一部分。
// src/detect/unavailable.rs - 未配置的检测后端
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use image::RgbImage;
use url::Url;

use super::{Detector, DetectorError, RawDetection};
use crate::{FromUrl, FromUrlWithScheme};

/// 总是失败的后端，`none:`
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableDetector;

impl FromUrlWithScheme for UnavailableDetector {
  const SCHEME: &'static str = "none";
}

impl FromUrl for UnavailableDetector {
  type Error = DetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorError::SchemeMismatch(format!(
        "期望检测后端 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Ok(UnavailableDetector)
  }
}

impl Detector for UnavailableDetector {
  fn name(&self) -> &str {
    "none"
  }

  fn infer(&self, _image: &RgbImage) -> Result<Vec<RawDetection>, DetectorError> {
    Err(DetectorError::Unavailable("未配置检测后端".to_string()))
  }
}
