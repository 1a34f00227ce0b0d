// 该文件是 Zhijian （织检） 项目的一部分。
// src/render/draw.rs - 标注框与标签绘制
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use tracing::{debug, info};

use super::{OverlayItem, RenderError};
use crate::{annotation::BoundingBox, style::ClassStyles};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_TEXT_VERTICAL_PADDING: i32 = 2;
const LABEL_TEXT_COLOR: [u8; 3] = [255, 255, 255]; // 白色
const STROKE_WIDTH: u32 = 2;

/// 叠加渲染器
///
/// 只持有字体与绘制参数，不含任何可变状态，同样的输入总是得到逐字节相同的输出。
pub struct OverlayRenderer {
  font: FontArc,
  font_scale: PxScale,
  stroke_width: u32,
  text_color: Rgb<u8>,
}

impl OverlayRenderer {
  /// 使用内嵌字体创建渲染器
  pub fn new() -> Result<Self, RenderError> {
    let font_data: &'static [u8] = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data)?;
    Ok(Self::with_font(font))
  }

  /// 从字体文件创建渲染器
  pub fn from_font_file(path: impl AsRef<Path>) -> Result<Self, RenderError> {
    let path = path.as_ref();
    let font = FontArc::try_from_vec(std::fs::read(path)?)?;
    info!("加载字体文件: {}", path.display());
    Ok(Self::with_font(font))
  }

  fn with_font(font: FontArc) -> Self {
    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      stroke_width: STROKE_WIDTH,
      text_color: Rgb(LABEL_TEXT_COLOR),
    }
  }

  pub fn stroke_width(mut self, width: u32) -> Self {
    self.stroke_width = width.max(1);
    self
  }

  pub fn font_size(mut self, size: f32) -> Self {
    self.font_scale = PxScale::from(size);
    self
  }

  /// 在图像副本上绘制所有对象，原图不变
  pub fn render<T: OverlayItem>(
    &self,
    image: &RgbImage,
    items: &[T],
    styles: &ClassStyles,
    show_labels: bool,
  ) -> RgbImage {
    let mut canvas = image.clone();
    for item in items {
      self.draw_item(&mut canvas, item, styles, show_labels);
    }
    canvas
  }

  fn draw_item<T: OverlayItem>(
    &self,
    image: &mut RgbImage,
    item: &T,
    styles: &ClassStyles,
    show_labels: bool,
  ) {
    let bbox = item.bbox();
    let style = item.style(styles);

    if bbox.is_degenerate() {
      debug!("绘制退化框: {:?}", bbox);
    }

    // 边框向内加粗
    for t in 0..self.stroke_width as i32 {
      let inner = BoundingBox::new(
        bbox.x1.saturating_add(t),
        bbox.y1.saturating_add(t),
        bbox.x2.saturating_sub(t),
        bbox.y2.saturating_sub(t),
      );
      stroke_rect(image, &inner, style.color);
    }

    if show_labels {
      let caption = item.caption(style);
      self.draw_label(image, bbox.x1, bbox.y1, &caption, style.color);
    }
  }

  // 标签背景位于框左上角的上方，不裁剪到图像范围内
  fn draw_label(&self, image: &mut RgbImage, x: i32, y: i32, caption: &str, color: Rgb<u8>) {
    if caption.is_empty() {
      return;
    }

    let (text_w, text_h) = text_size(self.font_scale, &self.font, caption);
    let label_w = text_w as i32;
    let label_h = text_h as i32 + 2 * LABEL_TEXT_VERTICAL_PADDING;
    if label_w <= 0 || label_h <= 0 {
      return;
    }

    let Some(label_y) = y.checked_sub(label_h) else {
      return;
    };
    if x.checked_add(label_w).is_none() {
      return;
    }

    let rect = Rect::at(x, label_y).of_size(label_w as u32, label_h as u32);
    draw_filled_rect_mut(image, rect, color);

    draw_text_mut(
      image,
      self.text_color,
      x,
      label_y + LABEL_TEXT_VERTICAL_PADDING,
      self.font_scale,
      &self.font,
      caption,
    );
  }
}

// 按原坐标描边，仅在写像素时跳过图像外的点
fn stroke_rect(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>) {
  draw_hline(image, bbox.y1, bbox.x1, bbox.x2, color);
  draw_hline(image, bbox.y2, bbox.x1, bbox.x2, color);
  draw_vline(image, bbox.x1, bbox.y1, bbox.y2, color);
  draw_vline(image, bbox.x2, bbox.y1, bbox.y2, color);
}

fn draw_hline(image: &mut RgbImage, y: i32, xa: i32, xb: i32, color: Rgb<u8>) {
  if y < 0 || y as u32 >= image.height() || image.width() == 0 {
    return;
  }
  let lo = xa.min(xb).max(0);
  let hi = (xa.max(xb) as i64).min(image.width() as i64 - 1);
  for x in lo as i64..=hi {
    image.put_pixel(x as u32, y as u32, color);
  }
}

fn draw_vline(image: &mut RgbImage, x: i32, ya: i32, yb: i32, color: Rgb<u8>) {
  if x < 0 || x as u32 >= image.width() || image.height() == 0 {
    return;
  }
  let lo = ya.min(yb).max(0);
  let hi = (ya.max(yb) as i64).min(image.height() as i64 - 1);
  for y in lo as i64..=hi {
    image.put_pixel(x as u32, y as u32, color);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::annotation::GroundTruthBox;

  const RED: Rgb<u8> = Rgb([255, 0, 0]);
  const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

  fn gt(class_id: Option<u32>, x1: i32, y1: i32, x2: i32, y2: i32) -> GroundTruthBox {
    GroundTruthBox {
      class_id,
      bbox: BoundingBox::new(x1, y1, x2, y2),
    }
  }

  fn gradient(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 77]))
  }

  #[test]
  fn never_mutates_input() {
    let renderer = OverlayRenderer::new().unwrap();
    let styles = ClassStyles::default();
    let image = gradient(80, 60);
    let before = image.clone();

    let out = renderer.render(&image, &[gt(Some(0), 10, 20, 50, 50)], &styles, true);

    assert_eq!(image.as_raw(), before.as_raw());
    assert_ne!(out.as_raw(), image.as_raw());
  }

  #[test]
  fn output_is_deterministic() {
    let renderer = OverlayRenderer::new().unwrap();
    let styles = ClassStyles::default();
    let image = gradient(120, 90);
    let boxes = [gt(Some(1), 5, 30, 60, 80), gt(None, 70, 25, 110, 85)];

    let a = renderer.render(&image, &boxes, &styles, true);
    let b = renderer.render(&image, &boxes, &styles, true);
    assert_eq!(a.as_raw(), b.as_raw());
  }

  #[test]
  fn strokes_box_with_class_color() {
    let renderer = OverlayRenderer::new().unwrap();
    let styles = ClassStyles::default();
    let image = RgbImage::new(64, 64);

    let out = renderer.render(&image, &[gt(Some(0), 10, 10, 30, 30)], &styles, false);

    assert_eq!(*out.get_pixel(10, 10), RED);
    assert_eq!(*out.get_pixel(30, 20), RED);
    assert_eq!(*out.get_pixel(11, 11), RED);
    assert_eq!(*out.get_pixel(12, 12), BLACK);
    assert_eq!(*out.get_pixel(20, 20), BLACK);
  }

  #[test]
  fn unknown_class_uses_default_color() {
    let renderer = OverlayRenderer::new().unwrap();
    let styles = ClassStyles::default();
    let image = RgbImage::new(32, 32);

    let out = renderer.render(&image, &[gt(Some(42), 4, 4, 20, 20)], &styles, false);
    assert_eq!(*out.get_pixel(4, 4), styles.default_style().color);
  }

  #[test]
  fn label_background_sits_above_box() {
    let renderer = OverlayRenderer::new().unwrap();
    let styles = ClassStyles::default();
    let image = RgbImage::new(100, 100);
    let boxes = [gt(Some(0), 10, 50, 60, 90)];

    let count_above = |img: &RgbImage| {
      (0..50u32)
        .flat_map(|y| (0..100u32).map(move |x| (x, y)))
        .filter(|&(x, y)| *img.get_pixel(x, y) == RED)
        .count()
    };

    let plain = renderer.render(&image, &boxes, &styles, false);
    let labeled = renderer.render(&image, &boxes, &styles, true);
    assert_eq!(count_above(&plain), 0);
    assert!(count_above(&labeled) > 0);
  }

  #[test]
  fn degenerate_and_off_canvas_boxes_are_drawn_without_panic() {
    let renderer = OverlayRenderer::new().unwrap();
    let styles = ClassStyles::default();
    let image = RgbImage::new(40, 40);
    let boxes = [
      gt(Some(0), 20, 20, 20, 20),
      gt(Some(0), 30, 30, 10, 10),
      gt(Some(1), -50, -50, 500, 500),
      gt(Some(2), i32::MIN, i32::MIN, i32::MAX, i32::MAX),
      gt(None, 0, 0, 10, 10),
    ];

    let out = renderer.render(&image, &boxes, &styles, true);
    assert_eq!(*out.get_pixel(20, 20), RED);
    assert_eq!(out.dimensions(), (40, 40));
  }
}
