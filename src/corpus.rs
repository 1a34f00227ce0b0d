// 该文件是 Zhijian （织检） 项目的一部分。
// src/corpus.rs - 样本库
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

use std::{
  fs,
  path::{Path, PathBuf},
};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const IMAGES_DIR: &str = "images";
pub const ANNOTATIONS_DIR: &str = "annotations";
pub const DEFAULT_MAX_SAMPLES: usize = 10;

const SAMPLE_PREFIX: &str = "sample_";
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

#[derive(Error, Debug)]
pub enum CorpusError {
  #[error("无法读取源目录 {path}: {source}")]
  SourceUnreadable {
    path: PathBuf,
    source: std::io::Error,
  },
  #[error("样本不存在: {0}")]
  NotFound(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageError(#[from] image::ImageError),
}

/// 一张样本图像及其可选的标注文件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
  pub id: String,
  pub image_path: PathBuf,
  pub annotation_path: Option<PathBuf>,
}

impl Sample {
  /// 解码为 RGB 图像
  pub fn load_image(&self) -> Result<RgbImage, CorpusError> {
    let image = ImageReader::open(&self.image_path)?
      .with_guessed_format()?
      .decode()?
      .to_rgb8();
    Ok(image)
  }
}

/// 样本库目录：`<root>/images` 与 `<root>/annotations`
#[derive(Debug, Clone)]
pub struct SampleRepository {
  root: PathBuf,
}

impl SampleRepository {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn images_dir(&self) -> PathBuf {
    self.root.join(IMAGES_DIR)
  }

  pub fn annotations_dir(&self) -> PathBuf {
    self.root.join(ANNOTATIONS_DIR)
  }

  /// 仅在图像目录或标注目录为空时初始化
  ///
  /// 未执行初始化时返回 `None`，否则返回实际复制的图像数。
  pub fn ensure_initialized(
    &self,
    source_images: &Path,
    source_labels: &Path,
    max_count: usize,
  ) -> Result<Option<usize>, CorpusError> {
    if !dir_is_empty(&self.images_dir()) && !dir_is_empty(&self.annotations_dir()) {
      debug!("样本库已存在: {}", self.root.display());
      return Ok(None);
    }
    let copied = self.initialize(source_images, source_labels, max_count)?;
    Ok(Some(copied))
  }

  /// 清空样本库并从源目录复制前 `max_count` 张图像及其标注
  ///
  /// 单个文件复制失败只记录日志并跳过。返回成功复制的图像数。
  pub fn initialize(
    &self,
    source_images: &Path,
    source_labels: &Path,
    max_count: usize,
  ) -> Result<usize, CorpusError> {
    let sources = match list_image_files(source_images) {
      Ok(sources) => sources,
      Err(source) => {
        if self.list().is_empty() {
          return Err(CorpusError::SourceUnreadable {
            path: source_images.to_path_buf(),
            source,
          });
        }
        warn!(
          "源目录不可读，保留现有样本库 {}: {}",
          source_images.display(),
          source
        );
        return Ok(0);
      }
    };

    let images_dir = self.images_dir();
    let annotations_dir = self.annotations_dir();
    fs::create_dir_all(&images_dir)?;
    fs::create_dir_all(&annotations_dir)?;
    clear_dir(&images_dir);
    clear_dir(&annotations_dir);

    let width = max_count.max(1).to_string().len();
    let mut copied = 0;

    for (i, src) in sources.iter().take(max_count).enumerate() {
      let stem = format!("{}{:0width$}", SAMPLE_PREFIX, i + 1, width = width);
      let ext = src
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

      let image_dst = images_dir.join(format!("{}.{}", stem, ext));
      if let Err(e) = fs::copy(src, &image_dst) {
        warn!("复制图像失败 {}: {}", src.display(), e);
        continue;
      }
      copied += 1;

      let Some(src_stem) = src.file_stem() else {
        continue;
      };
      let label_src = source_labels.join(format!("{}.txt", src_stem.to_string_lossy()));
      if label_src.is_file() {
        let label_dst = annotations_dir.join(format!("{}.txt", stem));
        if let Err(e) = fs::copy(&label_src, &label_dst) {
          warn!("复制标注失败 {}: {}", label_src.display(), e);
        }
      } else {
        debug!("无标注文件: {}", label_src.display());
      }
    }

    info!(
      "样本库初始化完成: {} 张图像 -> {}",
      copied,
      self.root.display()
    );
    Ok(copied)
  }

  /// 按文件名排序的样本列表，目录不可读时为空
  pub fn list(&self) -> Vec<Sample> {
    let images = match list_image_files(&self.images_dir()) {
      Ok(images) => images,
      Err(e) => {
        debug!("无法读取样本目录 {}: {}", self.images_dir().display(), e);
        return Vec::new();
      }
    };

    let annotations_dir = self.annotations_dir();
    images
      .into_iter()
      .filter_map(|image_path| {
        let id = image_path.file_stem()?.to_string_lossy().into_owned();
        let annotation = annotations_dir.join(format!("{}.txt", id));
        Some(Sample {
          annotation_path: annotation.is_file().then_some(annotation),
          id,
          image_path,
        })
      })
      .collect()
  }

  pub fn get(&self, id: &str) -> Result<Sample, CorpusError> {
    self
      .list()
      .into_iter()
      .find(|sample| sample.id == id)
      .ok_or_else(|| CorpusError::NotFound(id.to_string()))
  }
}

fn is_image_file(path: &Path) -> bool {
  path.is_file()
    && path
      .extension()
      .and_then(|e| e.to_str())
      .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
      .unwrap_or(false)
}

// 按路径排序
fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>, std::io::Error> {
  let mut files: Vec<PathBuf> = fs::read_dir(dir)?
    .filter_map(|entry| entry.ok().map(|e| e.path()))
    .filter(|path| is_image_file(path))
    .collect();
  files.sort();
  Ok(files)
}

fn dir_is_empty(dir: &Path) -> bool {
  fs::read_dir(dir)
    .map(|mut entries| entries.next().is_none())
    .unwrap_or(true)
}

fn clear_dir(dir: &Path) {
  let Ok(entries) = fs::read_dir(dir) else {
    return;
  };
  for path in entries.filter_map(|entry| entry.ok().map(|e| e.path())) {
    if path.is_file()
      && let Err(e) = fs::remove_file(&path)
    {
      warn!("删除文件失败 {}: {}", path.display(), e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn write_source(dir: &Path, names: &[&str], labelled: &[&str]) -> (PathBuf, PathBuf) {
    let images = dir.join("src_images");
    let labels = dir.join("src_labels");
    fs::create_dir_all(&images).unwrap();
    fs::create_dir_all(&labels).unwrap();
    for (i, name) in names.iter().enumerate() {
      RgbImage::from_pixel(8, 6, Rgb([i as u8, 0, 0]))
        .save(images.join(format!("{}.png", name)))
        .unwrap();
    }
    for name in labelled {
      fs::write(labels.join(format!("{}.txt", name)), "0 0.5 0.5 0.5 0.5\n").unwrap();
    }
    (images, labels)
  }

  fn ids(repo: &SampleRepository) -> Vec<String> {
    repo.list().into_iter().map(|s| s.id).collect()
  }

  #[test]
  fn copies_first_images_in_path_order() {
    let dir = tempfile::tempdir().unwrap();
    let (images, labels) = write_source(dir.path(), &["c", "a", "b"], &["a", "c"]);
    let repo = SampleRepository::new(dir.path().join("corpus"));

    assert_eq!(repo.initialize(&images, &labels, 2).unwrap(), 2);

    let samples = repo.list();
    assert_eq!(ids(&repo), vec!["sample_1", "sample_2"]);
    // sample_1 <- a.png (有标注), sample_2 <- b.png (无标注)
    assert!(samples[0].annotation_path.is_some());
    assert!(samples[1].annotation_path.is_none());
    assert_eq!(samples[0].load_image().unwrap().get_pixel(0, 0), &Rgb([1, 0, 0]));
  }

  #[test]
  fn pads_names_so_listing_matches_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let names: Vec<String> = (0..12).map(|i| format!("img{:02}", i)).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let (images, labels) = write_source(dir.path(), &refs, &[]);
    let repo = SampleRepository::new(dir.path().join("corpus"));

    repo.initialize(&images, &labels, 12).unwrap();
    let listed = ids(&repo);
    assert_eq!(listed.first().map(String::as_str), Some("sample_01"));
    assert_eq!(listed.get(9).map(String::as_str), Some("sample_10"));
    assert_eq!(listed.len(), 12);
  }

  #[test]
  fn initialize_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (images, labels) = write_source(dir.path(), &["x", "y", "z"], &["y"]);
    let repo = SampleRepository::new(dir.path().join("corpus"));

    repo.initialize(&images, &labels, 10).unwrap();
    let first = repo.list();
    repo.initialize(&images, &labels, 10).unwrap();
    assert_eq!(repo.list(), first);
  }

  #[test]
  fn rerun_replaces_previous_contents() {
    let dir = tempfile::tempdir().unwrap();
    let (images, labels) = write_source(dir.path(), &["a", "b", "c"], &[]);
    let repo = SampleRepository::new(dir.path().join("corpus"));

    repo.initialize(&images, &labels, 3).unwrap();
    fs::write(repo.images_dir().join("stray.jpg"), b"junk").unwrap();
    repo.initialize(&images, &labels, 1).unwrap();
    assert_eq!(ids(&repo), vec!["sample_1"]);
  }

  #[test]
  fn unreadable_source_with_empty_corpus_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let repo = SampleRepository::new(dir.path().join("corpus"));
    let missing = dir.path().join("missing");

    assert!(matches!(
      repo.initialize(&missing, &missing, 10),
      Err(CorpusError::SourceUnreadable { .. })
    ));
  }

  #[test]
  fn unreadable_source_keeps_existing_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let (images, labels) = write_source(dir.path(), &["a"], &["a"]);
    let repo = SampleRepository::new(dir.path().join("corpus"));
    repo.initialize(&images, &labels, 10).unwrap();

    let missing = dir.path().join("missing");
    assert_eq!(repo.initialize(&missing, &missing, 10).unwrap(), 0);
    assert_eq!(ids(&repo), vec!["sample_01"]);
  }

  #[test]
  fn ensure_initialized_skips_populated_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let (images, labels) = write_source(dir.path(), &["a", "b"], &["a"]);
    let repo = SampleRepository::new(dir.path().join("corpus"));

    assert_eq!(repo.ensure_initialized(&images, &labels, 10).unwrap(), Some(2));
    assert_eq!(repo.ensure_initialized(&images, &labels, 1).unwrap(), None);
    assert_eq!(repo.list().len(), 2);
  }

  #[test]
  fn ensure_initialized_reports_nothing_copied_from_unreadable_source() {
    let dir = tempfile::tempdir().unwrap();
    let (images, labels) = write_source(dir.path(), &["a", "b"], &[]);
    let repo = SampleRepository::new(dir.path().join("corpus"));
    assert_eq!(repo.ensure_initialized(&images, &labels, 10).unwrap(), Some(2));

    // 标注目录为空，会再次尝试初始化
    let missing = dir.path().join("missing");
    assert_eq!(
      repo.ensure_initialized(&missing, &missing, 10).unwrap(),
      Some(0)
    );
    assert_eq!(ids(&repo), vec!["sample_01", "sample_02"]);
  }

  #[test]
  fn get_reports_missing_sample() {
    let dir = tempfile::tempdir().unwrap();
    let repo = SampleRepository::new(dir.path());
    assert!(matches!(repo.get("sample_1"), Err(CorpusError::NotFound(_))));
    assert!(repo.list().is_empty());
  }
}
