// 该文件是 Tespit （目标检测后处理） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Args;
use tracing::info;
use url::Url;

use crate::{
  FromUrl,
  input::InputWrapper,
  model::{Detector, DetectorBuilder},
  output::OutputWrapper,
};

/// 各个程序共用的参数
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
  /// 检测器配置，例如
  /// detector:///path/labels.txt?channels=6&anchors=8400&confidence=0.6&iou=0.5
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 tensor:///path/to/dump 或单个张量文件
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径: log:stdout, jsonl:///path/out.jsonl, folder:///path/records
  #[arg(long, value_name = "OUTPUT", default_value = "log:stdout")]
  pub output: Url,
  /// 覆盖置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,
  /// 覆盖 NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub iou_threshold: Option<f32>,
}

impl PipelineArgs {
  pub fn detector(&self) -> anyhow::Result<Detector> {
    let mut builder = DetectorBuilder::from_url(&self.model)?;
    if let Some(confidence) = self.confidence {
      builder = builder.confidence_threshold(confidence);
    }
    if let Some(iou) = self.iou_threshold {
      builder = builder.iou_threshold(iou);
    }
    Ok(builder.build()?)
  }

  pub fn open(&self) -> anyhow::Result<(InputWrapper, Detector, OutputWrapper)> {
    info!("检测器配置: {}", self.model);
    info!("输入来源: {}", self.input);
    info!("输出路径: {}", self.output);

    let input = InputWrapper::from_url(&self.input)?;
    let detector = self.detector()?;
    let output = OutputWrapper::from_url(&self.output)?;
    Ok((input, detector, output))
  }
}
