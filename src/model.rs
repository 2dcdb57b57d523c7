// 该文件是 Tespit （目标检测后处理） 项目的一部分。
// src/model.rs - 模型输出与检测结果
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

use std::{convert::Infallible, sync::Arc};

use serde::Serialize;
use thiserror::Error;

/// 几何通道数量：cx, cy, w, h
pub const GEOMETRY_CHANNELS: usize = 4;

/// 外部推理引擎。
///
/// 核心只消费引擎产出的扁平输出张量，不负责运行模型。
pub trait Model {
  type Input;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Box<[f32]>, Self::Error>;
}

/// 回放已由推理引擎导出的输出张量。
#[derive(Debug, Default, Clone, Copy)]
pub struct TensorReplay;

impl Model for TensorReplay {
  type Input = Box<[f32]>;
  type Error = Infallible;

  fn infer(&self, input: &Self::Input) -> Result<Box<[f32]>, Self::Error> {
    Ok(input.clone())
  }
}

/// 输出张量形状 `[channels][anchors]`，通道优先。
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TensorShape {
  pub channels: usize,
  pub anchors: usize,
}

impl TensorShape {
  pub const fn new(channels: usize, anchors: usize) -> Self {
    Self { channels, anchors }
  }

  /// 从模型声明的输出维度 `[1, channels, anchors]` 建立形状。
  pub fn from_output_dims(dims: &[usize]) -> Option<Self> {
    match dims {
      [_, channels, anchors] => Some(Self::new(*channels, *anchors)),
      _ => None,
    }
  }

  /// 类别数量，形状未建立时为 0
  pub fn num_classes(&self) -> usize {
    self.channels.saturating_sub(GEOMETRY_CHANNELS)
  }

  /// 张量元素总数，乘积溢出时为 `None`
  pub fn checked_len(&self) -> Option<usize> {
    self.channels.checked_mul(self.anchors)
  }

  /// 张量元素总数，溢出时饱和为 `usize::MAX`
  pub fn len(&self) -> usize {
    self.channels.saturating_mul(self.anchors)
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// 通道 `channel`、锚点 `anchor` 在扁平张量中的下标。
  ///
  /// 要求 `channel < channels`、`anchor < anchors` 且 `checked_len` 不溢出。
  #[inline]
  pub fn index(&self, channel: usize, anchor: usize) -> usize {
    anchor + self.anchors * channel
  }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
  #[error("锚点数量为 0，模型输出形状尚未建立")]
  NoAnchors,
  #[error("通道数量 {channels} 不足，没有类别通道")]
  NoClasses { channels: usize },
  #[error("输出张量形状 {channels}x{anchors} 溢出")]
  ShapeOverflow { channels: usize, anchors: usize },
  #[error("输出张量长度不匹配: 期望 {expected}, 实际 {actual}")]
  TensorLength { expected: usize, actual: usize },
  #[error("标签数量 {labels} 少于类别数量 {classes}")]
  MissingLabels { labels: usize, classes: usize },
  #[error("{name} 阈值无效: {value}")]
  InvalidThreshold { name: &'static str, value: f32 },
}

/// 一个检测框，坐标均为归一化坐标。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  pub min_x: f32,
  pub min_y: f32,
  pub max_x: f32,
  pub max_y: f32,
  pub center_x: f32,
  pub center_y: f32,
  pub width: f32,
  pub height: f32,
  pub score: f32,
  pub class_index: usize,
  pub class_name: Arc<str>,
}

impl Detection {
  /// 由中心点形式构造，角点按 `c ∓ extent / 2` 推导
  pub fn from_center(
    center_x: f32,
    center_y: f32,
    width: f32,
    height: f32,
    score: f32,
    class_index: usize,
    class_name: Arc<str>,
  ) -> Self {
    Self {
      min_x: center_x - width / 2.0,
      min_y: center_y - height / 2.0,
      max_x: center_x + width / 2.0,
      max_y: center_y + height / 2.0,
      center_x,
      center_y,
      width,
      height,
      score,
      class_index,
      class_name,
    }
  }

  /// 面积取自存储的宽高，而非角点差
  pub fn area(&self) -> f32 {
    self.width * self.height
  }

  pub fn bbox(&self) -> [f32; 4] {
    [self.min_x, self.min_y, self.max_x, self.max_y]
  }
}

/// 单帧检测结果，按接受顺序（分数降序）排列
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectResult {
  pub items: Box<[Detection]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }
}

impl From<Vec<Detection>> for DetectResult {
  fn from(items: Vec<Detection>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

mod decode;
mod detector;
mod geometry;
mod nms;

pub use self::decode::decode;
pub use self::detector::{Detector, DetectorBuilder, DetectorBuilderError};
pub use self::geometry::{Overlap, iou, overlap};
pub use self::nms::{SuppressionMode, suppress, suppress_with_mode};
