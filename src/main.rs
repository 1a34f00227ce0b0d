// 该文件是 Zhijian （织检） 项目的一部分。
// src/main.rs - 项目主程序
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

mod args;

use std::{
  io::{self, BufRead, Write},
  path::Path,
};

use anyhow::{Context, Result};
use clap::Parser;
use image::{ImageReader, RgbImage};
use tracing::{info, warn};

use args::{Args, Command, RenderArgs};
use zhijian::{
  FromUrl,
  corpus::{Sample, SampleRepository},
  detect::{DetectionAdapter, DetectionReport, DetectorWrapper},
  navigation::{DetailView, DetectionView, NavigationController, Session},
  render::{OverlayRenderer, Record},
  style::ClassStyles,
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();
  let repository = SampleRepository::new(&args.corpus);
  info!("样本库目录: {}", args.corpus.display());

  match &args.command {
    Command::Setup {
      source_images,
      source_labels,
      max_count,
      force,
    } => {
      let copied = if *force {
        Some(repository.initialize(source_images, source_labels, *max_count)?)
      } else {
        repository.ensure_initialized(source_images, source_labels, *max_count)?
      };
      match copied {
        Some(n) => println!("已复制 {} 个样本到 {}", n, args.corpus.display()),
        None => println!("样本库已存在，未做修改（使用 --force 重新初始化）"),
      }
      print_gallery(&repository.list());
      Ok(())
    }
    Command::List => {
      print_gallery(&repository.list());
      Ok(())
    }
    Command::View {
      sample,
      output,
      render,
    } => {
      let components = Components::load(&args)?;
      let controller = components.controller(&repository);
      let mut session = session_for(render);
      let view = controller.select(&mut session, sample)?;
      write_detail(&view, output)?;
      Ok(())
    }
    Command::Detect {
      image,
      output,
      render,
    } => {
      let components = Components::load(&args)?;
      let controller = components.controller(&repository);
      let input = load_image(image)?;
      let view = controller.preview_upload(&input, render.confidence, !render.no_labels);
      write_detection(&view, output)?;
      Ok(())
    }
    Command::Browse { output, render } => {
      let components = Components::load(&args)?;
      let controller = components.controller(&repository);
      let mut session = session_for(render);
      browse(&controller, &mut session, output)
    }
  }
}

/// 启动时构造一次、之后只读的组件
struct Components {
  styles: ClassStyles,
  renderer: OverlayRenderer,
  adapter: DetectionAdapter,
}

impl Components {
  fn load(args: &Args) -> Result<Self> {
    let styles = match &args.classes {
      Some(path) => ClassStyles::from_json_file(path)
        .with_context(|| format!("无法加载类别样式: {}", path.display()))?,
      None => ClassStyles::default(),
    };

    let renderer = match &args.font {
      Some(path) => OverlayRenderer::from_font_file(path)
        .with_context(|| format!("无法加载字体: {}", path.display()))?,
      None => OverlayRenderer::new()?,
    };

    let detector = match &args.detector {
      Some(url) => DetectorWrapper::from_url(url)
        .with_context(|| format!("无法创建检测后端: {}", url))?,
      None => DetectorWrapper::default(),
    };

    Ok(Self {
      styles,
      renderer,
      adapter: DetectionAdapter::new(detector),
    })
  }

  fn controller<'a>(&'a self, repository: &'a SampleRepository) -> NavigationController<'a> {
    NavigationController::new(repository, &self.renderer, &self.styles, &self.adapter)
  }
}

fn session_for(render: &RenderArgs) -> Session {
  Session::with_settings(!render.no_labels, render.confidence)
}

fn load_image(path: &Path) -> Result<RgbImage> {
  let image = ImageReader::open(path)
    .with_context(|| format!("无法打开图片文件: {}", path.display()))?
    .with_guessed_format()?
    .decode()
    .with_context(|| format!("无法解码图片文件: {}", path.display()))?
    .to_rgb8();
  Ok(image)
}

fn print_gallery(samples: &[Sample]) {
  if samples.is_empty() {
    println!("样本库为空");
    return;
  }
  println!("共 {} 个样本:", samples.len());
  for (i, sample) in samples.iter().enumerate() {
    println!(
      "  [{}] {}{}",
      i + 1,
      sample.id,
      if sample.annotation_path.is_some() {
        ""
      } else {
        " (无标注)"
      }
    );
  }
}

fn print_detections(report: &DetectionReport) {
  if report.is_fallback() {
    warn!("检测后端不可用，以下为占位结果");
    println!("注意: 检测后端不可用，显示的是占位结果");
  }
  println!("检测到 {} 个缺陷:", report.detections.len());
  for det in &report.detections {
    println!(
      "  - {}: {:.2}% at ({}, {}) - ({}, {})",
      det.class_label,
      det.confidence * 100.0,
      det.bbox.x1,
      det.bbox.y1,
      det.bbox.x2,
      det.bbox.y2
    );
  }
}

fn write_detection(view: &DetectionView, path: &Path) -> Result<()> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)?;
  }

  view
    .overlay
    .save(path)
    .with_context(|| format!("无法保存图片: {}", path.display()))?;
  Record.record(&view.report, path)?;
  std::fs::write(
    path.with_extension("json"),
    serde_json::to_string_pretty(&view.report)?,
  )?;

  print_detections(&view.report);
  println!("检测图: {}", path.display());
  Ok(())
}

fn write_detail(view: &DetailView, output: &Path) -> Result<()> {
  std::fs::create_dir_all(output)
    .with_context(|| format!("无法创建输出目录: {}", output.display()))?;

  let id = &view.sample.id;
  let original = output.join(format!("{}.original.png", id));
  let annotated = output.join(format!("{}.annotated.png", id));
  view
    .original
    .save(&original)
    .with_context(|| format!("无法保存图片: {}", original.display()))?;
  view
    .ground_truth
    .save(&annotated)
    .with_context(|| format!("无法保存图片: {}", annotated.display()))?;

  println!(
    "样本 {}: {} 个标注框{}",
    id,
    view.annotations.boxes.len(),
    if view.annotations.skipped > 0 {
      format!(", 跳过 {} 行格式错误的标注", view.annotations.skipped)
    } else {
      String::new()
    }
  );
  println!("原图: {}", original.display());
  println!("标注图: {}", annotated.display());

  write_detection(&view.detection, &output.join(format!("{}.detect.png", id)))
}

fn browse(controller: &NavigationController, session: &mut Session, output: &Path) -> Result<()> {
  println!("输入样本序号或编号查看详情，b 返回图库，l 列出样本，q 退出");
  print_gallery(&controller.gallery());

  let stdin = io::stdin();
  let mut lines = stdin.lock().lines();
  loop {
    match session.selected() {
      Some(id) => print!("{}> ", id),
      None => print!("图库> "),
    }
    io::stdout().flush()?;

    let Some(line) = lines.next() else {
      break;
    };
    let input = line?;
    let input = input.trim();

    match input {
      "" => continue,
      "q" | "quit" => break,
      "l" | "list" => print_gallery(&controller.gallery()),
      "b" | "back" => {
        controller.back(session);
        print_gallery(&controller.gallery());
      }
      selection => {
        let id = resolve_selection(&controller.gallery(), selection);
        match controller.select(session, &id) {
          Ok(view) => write_detail(&view, output)?,
          Err(e) => println!("{}", e),
        }
      }
    }
  }

  info!("退出浏览");
  Ok(())
}

// 数字按图库序号解析，其余按样本编号
fn resolve_selection(samples: &[Sample], selection: &str) -> String {
  selection
    .parse::<usize>()
    .ok()
    .and_then(|n| n.checked_sub(1))
    .and_then(|i| samples.get(i))
    .map(|sample| sample.id.clone())
    .unwrap_or_else(|| selection.to_string())
}
