// 该文件是 Zhijian （织检） 项目的一部分。
// src/render/record.rs - 检测结果文本记录
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use crate::detect::{Detection, DetectionReport};

/// 将检测结果写为逐行文本：`label, confidence, x1, y1, x2, y2`
///
/// 每行一个检测结果，结果来源只写入 JSON 报告。
#[derive(Debug, Clone, Copy, Default)]
pub struct Record;

impl Record {
  pub fn format(&self, report: &DetectionReport) -> String {
    report
      .detections
      .iter()
      .map(format_detection)
      .collect::<Vec<_>>()
      .join("\n")
  }

  /// 写入与 `path` 同名的 `.txt` 文件
  pub fn record(&self, report: &DetectionReport, path: &Path) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension("txt"), self.format(report))?;
    Ok(())
  }
}

fn format_detection(item: &Detection) -> String {
  format!(
    "{}, {:.4}, {}, {}, {}, {}",
    item.class_label, item.confidence, item.bbox.x1, item.bbox.y1, item.bbox.x2, item.bbox.y2
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{annotation::BoundingBox, detect::Provenance};

  fn report() -> DetectionReport {
    DetectionReport {
      detections: vec![Detection {
        bbox: BoundingBox::new(1, 2, 30, 40),
        confidence: 0.92,
        class_label: "hole".to_string(),
      }],
      provenance: Provenance::Fallback,
    }
  }

  #[test]
  fn formats_one_line_per_detection() {
    let mut report = report();
    report.detections.push(Detection {
      bbox: BoundingBox::new(-3, 0, 7, 9),
      confidence: 0.5,
      class_label: "stain".to_string(),
    });

    let text = Record.format(&report);
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines, vec!["hole, 0.9200, 1, 2, 30, 40", "stain, 0.5000, -3, 0, 7, 9"]);
  }

  #[test]
  fn provenance_is_not_written_to_record() {
    assert!(!Record.format(&report()).contains("fallback"));
  }

  #[test]
  fn writes_txt_next_to_image() {
    let dir = tempfile::tempdir().unwrap();
    let png = dir.path().join("sample_01.detect.png");
    Record.record(&report(), &png).unwrap();

    let text = std::fs::read_to_string(dir.path().join("sample_01.detect.txt")).unwrap();
    assert_eq!(text, "hole, 0.9200, 1, 2, 30, 40");
  }
}
