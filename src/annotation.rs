// 该文件是 Zhijian （织检） 项目的一部分。
// src/annotation.rs - 标注文件解析
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

use std::{fmt, io::ErrorKind, path::Path};

use serde::Serialize;
use tracing::{debug, warn};

/// 像素坐标下的矩形框，(x1, y1) 为左上角，(x2, y2) 为右下角
///
/// 不保证落在图像范围内，也不保证 x1 <= x2。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BoundingBox {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
}

impl BoundingBox {
  pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 由浮点像素坐标构造，向零截断
  pub fn from_pixels(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
    Self {
      x1: x1 as i32,
      y1: y1 as i32,
      x2: x2 as i32,
      y2: y2 as i32,
    }
  }

  pub fn width(&self) -> i32 {
    self.x2.saturating_sub(self.x1)
  }

  pub fn height(&self) -> i32 {
    self.y2.saturating_sub(self.y1)
  }

  /// 宽或高不为正
  pub fn is_degenerate(&self) -> bool {
    self.width() <= 0 || self.height() <= 0
  }
}

/// 单条归一化标注：`class_id x_center y_center width height`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Annotation {
  /// 类别编号，无法解析时为 None
  pub class_id: Option<u32>,
  pub x_center: f64,
  pub y_center: f64,
  pub width: f64,
  pub height: f64,
}

impl Annotation {
  /// 按图像尺寸反归一化为像素框，不做边界裁剪
  pub fn to_pixel_box(&self, image_width: u32, image_height: u32) -> BoundingBox {
    let (w, h) = (image_width as f64, image_height as f64);

    let x_center = self.x_center * w;
    let y_center = self.y_center * h;
    let box_w = self.width * w;
    let box_h = self.height * h;

    BoundingBox::from_pixels(
      x_center - box_w / 2.0,
      y_center - box_h / 2.0,
      x_center + box_w / 2.0,
      y_center + box_h / 2.0,
    )
  }
}

/// 标注行被跳过的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
  /// 字段数不足 5 个
  TooFewFields(usize),
  /// 第 n 个字段（从 0 开始）不是有限数值
  InvalidNumber(usize),
}

impl fmt::Display for SkipReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SkipReason::TooFewFields(n) => write!(f, "字段不足: {} 个", n),
      SkipReason::InvalidNumber(idx) => write!(f, "第 {} 个字段不是数值", idx),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
  Kept(Annotation),
  Skipped(SkipReason),
  Blank,
}

/// 解析一行标注，多余字段忽略
pub fn parse_line(line: &str) -> LineOutcome {
  let parts: Vec<&str> = line.split_whitespace().collect();
  if parts.is_empty() {
    return LineOutcome::Blank;
  }
  if parts.len() < 5 {
    return LineOutcome::Skipped(SkipReason::TooFewFields(parts.len()));
  }

  let mut values = [0.0f64; 4];
  for (i, token) in parts[1..5].iter().enumerate() {
    match token.parse::<f64>() {
      Ok(v) if v.is_finite() => values[i] = v,
      _ => return LineOutcome::Skipped(SkipReason::InvalidNumber(i + 1)),
    }
  }

  let [x_center, y_center, width, height] = values;
  LineOutcome::Kept(Annotation {
    class_id: parts[0].parse::<u32>().ok(),
    x_center,
    y_center,
    width,
    height,
  })
}

/// 真值框：像素框与其来源类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundTruthBox {
  pub class_id: Option<u32>,
  pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
  /// 按文件行序排列
  pub boxes: Vec<GroundTruthBox>,
  /// 被跳过的格式错误行数
  pub skipped: usize,
}

impl ParseReport {
  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }
}

/// 解析整段标注文本
pub fn parse_str(text: &str, image_width: u32, image_height: u32) -> ParseReport {
  let mut report = ParseReport::default();

  for (line_no, line) in text.lines().enumerate() {
    match parse_line(line) {
      LineOutcome::Kept(annotation) => report.boxes.push(GroundTruthBox {
        class_id: annotation.class_id,
        bbox: annotation.to_pixel_box(image_width, image_height),
      }),
      LineOutcome::Skipped(reason) => {
        debug!("跳过第 {} 行标注: {}", line_no + 1, reason);
        report.skipped += 1;
      }
      LineOutcome::Blank => {}
    }
  }

  report
}

/// 读取并解析标注文件
///
/// 每次调用都重新读取文件。文件不存在或读取失败时返回空结果。
pub fn parse_annotations(
  path: impl AsRef<Path>,
  image_width: u32,
  image_height: u32,
) -> ParseReport {
  let path = path.as_ref();
  let data = match std::fs::read(path) {
    Ok(data) => data,
    Err(e) if e.kind() == ErrorKind::NotFound => {
      debug!("标注文件不存在: {}", path.display());
      return ParseReport::default();
    }
    Err(e) => {
      warn!("无法读取标注文件 {}: {}", path.display(), e);
      return ParseReport::default();
    }
  };

  let report = parse_str(&String::from_utf8_lossy(&data), image_width, image_height);
  if report.skipped > 0 {
    debug!(
      "标注文件 {}: {} 个框, 跳过 {} 行",
      path.display(),
      report.boxes.len(),
      report.skipped
    );
  }
  report
}
