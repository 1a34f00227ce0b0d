// 该文件是 Zhijian （织检） 项目的一部分。
// src/render.rs - 叠加渲染定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use thiserror::Error;

use crate::{
  annotation::{BoundingBox, GroundTruthBox},
  detect::Detection,
  style::{ClassStyle, ClassStyles},
};

mod draw;
mod record;

pub use self::draw::OverlayRenderer;
pub use self::record::Record;

#[derive(Error, Debug)]
pub enum RenderError {
  #[error("字体加载错误: {0}")]
  FontError(#[from] ab_glyph::InvalidFont),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 可被叠加绘制的对象
pub trait OverlayItem {
  fn bbox(&self) -> BoundingBox;
  fn style<'s>(&self, styles: &'s ClassStyles) -> &'s ClassStyle;
  fn caption(&self, style: &ClassStyle) -> String;
}

impl OverlayItem for GroundTruthBox {
  fn bbox(&self) -> BoundingBox {
    self.bbox
  }

  fn style<'s>(&self, styles: &'s ClassStyles) -> &'s ClassStyle {
    styles.lookup(self.class_id)
  }

  fn caption(&self, style: &ClassStyle) -> String {
    style.name.clone()
  }
}

impl OverlayItem for Detection {
  fn bbox(&self) -> BoundingBox {
    self.bbox
  }

  fn style<'s>(&self, styles: &'s ClassStyles) -> &'s ClassStyle {
    styles.lookup_name(&self.class_label)
  }

  fn caption(&self, _style: &ClassStyle) -> String {
    format!("{} {:.2}", self.class_label, self.confidence)
  }
}
