// 该文件是 Tespit （目标检测后处理） 项目的一部分。
// src/model/decode.rs - 输出张量解码
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

use std::cmp::Ordering;

use tracing::{debug, trace};

use crate::{
  labels::Labels,
  model::{ConfigurationError, Detection, GEOMETRY_CHANNELS, TensorShape},
};

/// 检查形状、张量长度与标签数量，任何一项未建立都立即失败
fn validate(
  tensor: &[f32],
  shape: TensorShape,
  labels: &Labels,
) -> Result<(), ConfigurationError> {
  if shape.anchors == 0 {
    return Err(ConfigurationError::NoAnchors);
  }
  if shape.num_classes() == 0 {
    return Err(ConfigurationError::NoClasses {
      channels: shape.channels,
    });
  }
  let expected = shape
    .checked_len()
    .ok_or(ConfigurationError::ShapeOverflow {
      channels: shape.channels,
      anchors: shape.anchors,
    })?;
  if tensor.len() < expected {
    return Err(ConfigurationError::TensorLength {
      expected,
      actual: tensor.len(),
    });
  }
  if labels.len() < shape.num_classes() {
    return Err(ConfigurationError::MissingLabels {
      labels: labels.len(),
      classes: shape.num_classes(),
    });
  }
  Ok(())
}

/// 将扁平输出张量解码为候选框。
///
/// 最高类别分数必须严格大于 `confidence_threshold`；
/// 任一角点落在 `[0, 1]` 之外或宽高为负的候选框整体丢弃，不做裁剪。
/// 没有候选框时返回空列表。
pub fn decode(
  tensor: &[f32],
  shape: TensorShape,
  confidence_threshold: f32,
  labels: &Labels,
) -> Result<Vec<Detection>, ConfigurationError> {
  validate(tensor, shape, labels)?;

  let mut candidates = Vec::new();
  let mut rejected = 0usize;

  for anchor in 0..shape.anchors {
    // 分数相同时保留通道序号最小者
    let mut best_score = f32::NEG_INFINITY;
    let mut best_class = 0usize;
    for class in 0..shape.num_classes() {
      let score = tensor[shape.index(GEOMETRY_CHANNELS + class, anchor)];
      if score > best_score {
        best_score = score;
        best_class = class;
      }
    }

    // NaN 阈值不放行任何锚点
    if best_score.partial_cmp(&confidence_threshold) != Some(Ordering::Greater) {
      continue;
    }

    let cx = tensor[shape.index(0, anchor)];
    let cy = tensor[shape.index(1, anchor)];
    let w = tensor[shape.index(2, anchor)];
    let h = tensor[shape.index(3, anchor)];

    // validate 已保证标签数量足够
    let Some(class_name) = labels.get(best_class) else {
      continue;
    };

    let detection =
      Detection::from_center(cx, cy, w, h, best_score, best_class, class_name.clone());

    let bbox = detection.bbox();
    let [min_x, min_y, max_x, max_y] = bbox;
    let inside = bbox.iter().all(|v| (0.0..=1.0).contains(v));
    if !inside || min_x > max_x || min_y > max_y {
      trace!("锚点 {} 超出画面: {:?}", anchor, bbox);
      rejected += 1;
      continue;
    }

    candidates.push(detection);
  }

  debug!(
    "解码得到 {} 个候选框，{} 个因越界被丢弃",
    candidates.len(),
    rejected
  );

  Ok(candidates)
}
