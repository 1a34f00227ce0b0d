// 该文件是 Zhijian （织检） 项目的一部分。
// src/args.rs - 项目参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;
use zhijian::{corpus::DEFAULT_MAX_SAMPLES, detect::DEFAULT_CONFIDENCE_THRESHOLD};

/// Zhijian 织物缺陷查看器
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 样本库目录
  #[arg(long, default_value = "corpus", value_name = "DIR", global = true)]
  pub corpus: PathBuf,

  /// 检测后端
  /// 支持格式:
  /// - 外部程序: exec:///path/to/detector?arg=--model&arg=model.onnx
  /// - 不使用后端: none:
  #[arg(long, value_name = "URL", global = true)]
  pub detector: Option<Url>,

  /// 类别样式 JSON 文件
  #[arg(long, value_name = "FILE", global = true)]
  pub classes: Option<PathBuf>,

  /// 标签字体文件（默认使用内嵌字体）
  #[arg(long, value_name = "FILE", global = true)]
  pub font: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 从数据集复制样本到样本库
  Setup {
    /// 源图像目录
    #[arg(long, value_name = "DIR")]
    source_images: PathBuf,

    /// 源标注目录
    #[arg(long, value_name = "DIR")]
    source_labels: PathBuf,

    /// 最多复制的样本数
    #[arg(long, default_value_t = DEFAULT_MAX_SAMPLES, value_name = "COUNT")]
    max_count: usize,

    /// 即使样本库非空也重新初始化
    #[arg(long)]
    force: bool,
  },

  /// 列出样本
  List,

  /// 渲染单个样本的原图、标注图与检测图
  View {
    /// 样本编号，如 sample_01
    sample: String,

    /// 输出目录
    #[arg(long, default_value = "output", value_name = "DIR")]
    output: PathBuf,

    #[command(flatten)]
    render: RenderArgs,
  },

  /// 对任意图像执行检测
  Detect {
    /// 输入图像
    image: PathBuf,

    /// 输出图像路径
    #[arg(long, value_name = "FILE")]
    output: PathBuf,

    #[command(flatten)]
    render: RenderArgs,
  },

  /// 交互式浏览样本库
  Browse {
    /// 输出目录
    #[arg(long, default_value = "output", value_name = "DIR")]
    output: PathBuf,

    #[command(flatten)]
    render: RenderArgs,
  },
}

#[derive(clap::Args, Debug, Clone)]
pub struct RenderArgs {
  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// 不绘制类别标签
  #[arg(long)]
  pub no_labels: bool,
}
