// 该文件是 Zhijian （织检） 项目的一部分。
// src/detect/exec.rs - 外部进程检测后端
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{
  io::{Cursor, Write},
  path::PathBuf,
  process::{Command, Stdio},
  thread,
};

use image::{ImageFormat, RgbImage};
use tracing::debug;
use url::Url;

use super::{Detector, DetectorError, RawDetection};
use crate::{FromUrl, FromUrlWithScheme};

/// 调用外部检测程序
///
/// 图像以 PNG 写入子进程标准输入，子进程在标准输出给出 JSON 数组：
/// `[{"bbox": [x1, y1, x2, y2], "confidence": 0.9, "label": "hole"}]`，坐标为像素。
/// 不设超时，子进程阻塞多久调用就阻塞多久。
#[derive(Debug, Clone)]
pub struct ExecDetector {
  program: PathBuf,
  args: Vec<String>,
  name: String,
}

impl FromUrlWithScheme for ExecDetector {
  const SCHEME: &'static str = "exec";
}

impl FromUrl for ExecDetector {
  type Error = DetectorError;

  /// `exec:///path/to/program?arg=--model&arg=model.onnx`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorError::SchemeMismatch(format!(
        "期望检测后端 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let program = url.path();
    if program.is_empty() || program == "/" {
      return Err(DetectorError::SchemeMismatch(format!(
        "缺少检测程序路径: {}",
        url
      )));
    }

    let args = url
      .query_pairs()
      .filter(|(k, _)| k == "arg")
      .map(|(_, v)| v.into_owned())
      .collect();

    Ok(Self::new(program, args))
  }
}

impl ExecDetector {
  pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
    let program = program.into();
    let name = format!("exec:{}", program.display());
    Self {
      program,
      args,
      name,
    }
  }

  fn encode_png(image: &RgbImage) -> Result<Vec<u8>, DetectorError> {
    let mut buffer = Vec::new();
    image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
    Ok(buffer)
  }
}

impl Detector for ExecDetector {
  fn name(&self) -> &str {
    &self.name
  }

  fn infer(&self, image: &RgbImage) -> Result<Vec<RawDetection>, DetectorError> {
    let png = Self::encode_png(image)?;

    debug!("启动检测进程: {} {:?}", self.program.display(), self.args);
    let mut child = Command::new(&self.program)
      .args(&self.args)
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .spawn()?;

    // 标准输入在独立线程写入，与读取标准输出和标准错误同时进行
    let Some(mut stdin) = child.stdin.take() else {
      let _ = child.kill();
      let _ = child.wait();
      return Err(DetectorError::ProcessFailed("无法打开检测进程标准输入".to_string()));
    };
    let writer = thread::spawn(move || stdin.write_all(&png));

    let output = child.wait_with_output()?;
    let written = writer
      .join()
      .map_err(|_| DetectorError::ProcessFailed("写入图像的线程异常退出".to_string()))?;

    if !output.status.success() {
      return Err(DetectorError::ProcessFailed(format!(
        "{}: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
      )));
    }
    written?;

    let items: Vec<RawDetection> = serde_json::from_slice(&output.stdout)?;
    debug!("检测进程返回 {} 个结果", items.len());
    Ok(items)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_program_and_args_from_url() {
    let url = Url::parse("exec:///opt/detect/run?arg=--model&arg=fabric.onnx&verbose=1").unwrap();
    let detector = ExecDetector::from_url(&url).unwrap();
    assert_eq!(detector.program, PathBuf::from("/opt/detect/run"));
    assert_eq!(detector.args, vec!["--model", "fabric.onnx"]);
    assert_eq!(detector.name(), "exec:/opt/detect/run");
  }

  #[test]
  fn missing_program_is_rejected() {
    let url = Url::parse("exec:///").unwrap();
    assert!(ExecDetector::from_url(&url).is_err());
  }

  #[test]
  fn missing_binary_is_an_error() {
    let detector = ExecDetector::new("/nonexistent/zhijian-detector", Vec::new());
    assert!(detector.infer(&RgbImage::new(8, 8)).is_err());
  }

  #[cfg(unix)]
  fn shell(script: &str) -> ExecDetector {
    ExecDetector::new("/bin/sh", vec!["-c".to_string(), script.to_string()])
  }

  #[cfg(unix)]
  #[test]
  fn reads_json_from_stdout() {
    let detector = shell(
      r#"cat > /dev/null; echo '[{"bbox": [1, 2, 30.7, 40], "confidence": 0.75, "label": "hole"}]'"#,
    );
    let items = detector.infer(&RgbImage::new(16, 16)).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].label, "hole");
    assert_eq!(items[0].bbox, [1.0, 2.0, 30.7, 40.0]);
  }

  #[cfg(unix)]
  #[test]
  fn non_zero_exit_is_an_error() {
    let detector = shell("cat > /dev/null; echo boom >&2; exit 3");
    assert!(matches!(
      detector.infer(&RgbImage::new(16, 16)),
      Err(DetectorError::ProcessFailed(_))
    ));
  }

  #[cfg(unix)]
  #[test]
  fn chatty_stderr_does_not_block_large_images() {
    let detector = shell("head -c 262144 /dev/zero >&2; cat > /dev/null; echo '[]'");
    let image = RgbImage::from_fn(512, 512, |x, y| {
      let v = x.wrapping_mul(2_654_435_761) ^ y.wrapping_mul(40_503);
      image::Rgb([v as u8, (v >> 8) as u8, (v >> 16) as u8])
    });

    let items = detector.infer(&image).unwrap();
    assert!(items.is_empty());
  }

  #[cfg(unix)]
  #[test]
  fn garbage_output_is_an_error() {
    let detector = shell("cat > /dev/null; echo not-json");
    assert!(matches!(
      detector.infer(&RgbImage::new(16, 16)),
      Err(DetectorError::JsonError(_))
    ));
  }
}
