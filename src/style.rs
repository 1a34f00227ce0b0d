// 该文件是 Zhijian （织检） 项目的一部分。
// src/style.rs - 类别样式映射
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

use std::{collections::BTreeMap, path::Path};

use image::Rgb;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

const DEFAULT_NAME: &str = "defect";
const DEFAULT_COLOR: [u8; 3] = [0, 255, 0]; // 绿色

const BUILTIN_CLASSES: [(u32, &str, [u8; 3]); 4] = [
  (0, "hole", [255, 0, 0]),
  (1, "stain", [255, 165, 0]),
  (2, "thread", [0, 191, 255]),
  (3, "tear", [255, 0, 255]),
];

#[derive(Error, Debug)]
pub enum StyleError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("样式文件格式错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("颜色格式错误: {0}")]
  InvalidColor(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassStyle {
  pub name: String,
  pub color: Rgb<u8>,
}

impl ClassStyle {
  pub fn new(name: impl Into<String>, color: [u8; 3]) -> Self {
    Self {
      name: name.into(),
      color: Rgb(color),
    }
  }
}

/// 类别编号到样式的只读映射，未知编号回落到默认样式
#[derive(Debug, Clone)]
pub struct ClassStyles {
  styles: BTreeMap<u32, ClassStyle>,
  default: ClassStyle,
}

impl Default for ClassStyles {
  fn default() -> Self {
    let styles = BUILTIN_CLASSES
      .iter()
      .map(|&(id, name, color)| (id, ClassStyle::new(name, color)))
      .collect();

    Self {
      styles,
      default: ClassStyle::new(DEFAULT_NAME, DEFAULT_COLOR),
    }
  }
}

#[derive(Deserialize)]
struct StyleEntry {
  name: String,
  color: String,
}

#[derive(Deserialize)]
struct ClassEntry {
  id: u32,
  name: String,
  color: String,
}

#[derive(Deserialize)]
struct StyleFile {
  #[serde(default)]
  default: Option<StyleEntry>,
  classes: Vec<ClassEntry>,
}

impl ClassStyles {
  pub fn new(styles: impl IntoIterator<Item = (u32, ClassStyle)>, default: ClassStyle) -> Self {
    Self {
      styles: styles.into_iter().collect(),
      default,
    }
  }

  /// 从 JSON 样式文件加载
  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StyleError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let styles = Self::from_json_str(&text)?;
    info!("加载类别样式: {} ({} 个类别)", path.display(), styles.len());
    Ok(styles)
  }

  pub fn from_json_str(text: &str) -> Result<Self, StyleError> {
    let file: StyleFile = serde_json::from_str(text)?;

    let default = match file.default {
      Some(entry) => ClassStyle::new(entry.name, parse_hex_color(&entry.color)?),
      None => ClassStyle::new(DEFAULT_NAME, DEFAULT_COLOR),
    };

    let mut styles = BTreeMap::new();
    for entry in file.classes {
      let color = parse_hex_color(&entry.color)?;
      styles.insert(entry.id, ClassStyle::new(entry.name, color));
    }

    Ok(Self { styles, default })
  }

  pub fn default_style(&self) -> &ClassStyle {
    &self.default
  }

  /// 按类别编号查找，编号缺失或未知时返回默认样式
  pub fn lookup(&self, class_id: Option<u32>) -> &ClassStyle {
    class_id
      .and_then(|id| self.styles.get(&id))
      .unwrap_or(&self.default)
  }

  /// 按类别名查找（忽略大小写），用于检测结果
  pub fn lookup_name(&self, name: &str) -> &ClassStyle {
    self
      .styles
      .values()
      .find(|style| style.name.eq_ignore_ascii_case(name))
      .unwrap_or(&self.default)
  }

  pub fn len(&self) -> usize {
    self.styles.len()
  }

  pub fn is_empty(&self) -> bool {
    self.styles.is_empty()
  }
}

/// 解析 `#rrggbb` 形式的颜色
pub fn parse_hex_color(text: &str) -> Result<[u8; 3], StyleError> {
  let hex = text.trim().trim_start_matches('#');
  if hex.len() != 6 || !hex.is_ascii() {
    return Err(StyleError::InvalidColor(text.to_string()));
  }

  let mut color = [0u8; 3];
  for (i, channel) in color.iter_mut().enumerate() {
    *channel = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
      .map_err(|_| StyleError::InvalidColor(text.to_string()))?;
  }
  Ok(color)
}
