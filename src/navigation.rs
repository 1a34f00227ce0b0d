// 该文件是 Zhijian （织检） 项目的一部分。
// src/navigation.rs - 图库/详情导航
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

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  annotation::{ParseReport, parse_annotations},
  corpus::{CorpusError, Sample, SampleRepository},
  detect::{
    DEFAULT_CONFIDENCE_THRESHOLD, DetectionAdapter, DetectionReport, Detector, DetectorWrapper,
  },
  render::OverlayRenderer,
  style::ClassStyles,
};

#[derive(Error, Debug)]
pub enum NavigationError {
  #[error(transparent)]
  Corpus(#[from] CorpusError),
  #[error("详情页中不能直接选择样本，请先返回图库")]
  InvalidTransition,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NavigationState {
  #[default]
  Gallery,
  Detail(String),
}

/// 单个会话的状态，每个会话各持一份
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
  state: NavigationState,
  pub show_labels: bool,
  pub confidence_threshold: f32,
}

impl Default for Session {
  fn default() -> Self {
    Self {
      state: NavigationState::Gallery,
      show_labels: true,
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
    }
  }
}

impl Session {
  pub fn new() -> Self {
    Self::default()
  }

  /// 从图库开始的会话，使用给定的显示设置
  pub fn with_settings(show_labels: bool, confidence_threshold: f32) -> Self {
    Self {
      show_labels,
      confidence_threshold,
      ..Self::default()
    }
  }

  pub fn state(&self) -> &NavigationState {
    &self.state
  }

  pub fn selected(&self) -> Option<&str> {
    match &self.state {
      NavigationState::Gallery => None,
      NavigationState::Detail(id) => Some(id),
    }
  }
}

#[derive(Debug, Clone)]
pub struct DetectionView {
  pub report: DetectionReport,
  pub overlay: RgbImage,
}

#[derive(Debug, Clone)]
pub struct DetailView {
  pub sample: Sample,
  pub original: RgbImage,
  pub annotations: ParseReport,
  pub ground_truth: RgbImage,
  pub detection: DetectionView,
}

/// 导航控制器，只持有共享的只读组件
pub struct NavigationController<'a, D = DetectorWrapper> {
  repository: &'a SampleRepository,
  renderer: &'a OverlayRenderer,
  styles: &'a ClassStyles,
  adapter: &'a DetectionAdapter<D>,
}

impl<'a, D: Detector> NavigationController<'a, D> {
  pub fn new(
    repository: &'a SampleRepository,
    renderer: &'a OverlayRenderer,
    styles: &'a ClassStyles,
    adapter: &'a DetectionAdapter<D>,
  ) -> Self {
    Self {
      repository,
      renderer,
      styles,
      adapter,
    }
  }

  pub fn gallery(&self) -> Vec<Sample> {
    self.repository.list()
  }

  /// Gallery --select(id)--> Detail(id)
  ///
  /// 样本不存在或图像无法加载时返回错误，会话停留在图库。
  pub fn select(&self, session: &mut Session, id: &str) -> Result<DetailView, NavigationError> {
    if let NavigationState::Detail(current) = &session.state {
      warn!("当前正在查看 {}, 忽略选择 {}", current, id);
      return Err(NavigationError::InvalidTransition);
    }

    let view = self
      .repository
      .get(id)
      .map_err(NavigationError::from)
      .and_then(|sample| self.build_detail(sample, session));

    match view {
      Ok(view) => {
        info!("进入详情: {}", id);
        session.state = NavigationState::Detail(id.to_string());
        Ok(view)
      }
      Err(e) => {
        warn!("无法打开样本 {}: {}", id, e);
        session.state = NavigationState::Gallery;
        Err(e)
      }
    }
  }

  /// Detail(id) --back--> Gallery，在图库中调用不产生变化
  pub fn back(&self, session: &mut Session) {
    if let NavigationState::Detail(id) = &session.state {
      debug!("离开详情: {}", id);
    }
    session.state = NavigationState::Gallery;
  }

  /// 按会话当前设置重新计算详情页，处于图库时返回 None
  pub fn detail(&self, session: &mut Session) -> Result<Option<DetailView>, NavigationError> {
    let Some(id) = session.selected().map(str::to_string) else {
      return Ok(None);
    };

    let view = self
      .repository
      .get(&id)
      .map_err(NavigationError::from)
      .and_then(|sample| self.build_detail(sample, session));
    match view {
      Ok(view) => Ok(Some(view)),
      Err(e) => {
        warn!("样本 {} 已不可用，返回图库: {}", id, e);
        session.state = NavigationState::Gallery;
        Err(e)
      }
    }
  }

  /// 对外部提供的图像执行检测并绘制，不影响导航状态
  pub fn preview_upload(
    &self,
    image: &RgbImage,
    threshold: f32,
    show_labels: bool,
  ) -> DetectionView {
    let report = self.adapter.detect(image, threshold);
    let overlay = self
      .renderer
      .render(image, &report.detections, self.styles, show_labels);
    DetectionView { report, overlay }
  }

  fn build_detail(&self, sample: Sample, session: &Session) -> Result<DetailView, NavigationError> {
    let original = sample.load_image()?;
    let (width, height) = original.dimensions();

    let annotations = match &sample.annotation_path {
      Some(path) => parse_annotations(path, width, height),
      None => ParseReport::default(),
    };
    let ground_truth = self.renderer.render(
      &original,
      &annotations.boxes,
      self.styles,
      session.show_labels,
    );

    let detection =
      self.preview_upload(&original, session.confidence_threshold, session.show_labels);

    Ok(DetailView {
      sample,
      original,
      annotations,
      ground_truth,
      detection,
    })
  }
}
