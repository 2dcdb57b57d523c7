// 该文件是 Tespit （目标检测后处理） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::{cmp::Ordering, str::FromStr};

use tracing::debug;

use crate::model::{Detection, iou};

/// 抑制时哪些框之间互相比较
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionMode {
  /// 任意类别之间都会互相抑制
  #[default]
  ClassAgnostic,
  /// 只抑制同一类别的框
  PerClass,
}

impl FromStr for SuppressionMode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "agnostic" | "class-agnostic" => Ok(SuppressionMode::ClassAgnostic),
      "per-class" | "class" => Ok(SuppressionMode::PerClass),
      other => Err(format!("未知的抑制模式: {}", other)),
    }
  }
}

/// 贪心非极大值抑制，类别无关。
pub fn suppress(candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
  suppress_with_mode(candidates, iou_threshold, SuppressionMode::ClassAgnostic)
}

/// 按分数降序（稳定排序，同分保持扫描顺序）逐个接受候选框，
/// 与任一已接受框的交并比严格大于 `iou_threshold` 时丢弃。
pub fn suppress_with_mode(
  mut candidates: Vec<Detection>,
  iou_threshold: f32,
  mode: SuppressionMode,
) -> Vec<Detection> {
  let total = candidates.len();
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut accepted: Vec<Detection> = Vec::with_capacity(candidates.len());
  for candidate in candidates {
    let duplicated = accepted.iter().any(|kept| {
      let comparable = match mode {
        SuppressionMode::ClassAgnostic => true,
        SuppressionMode::PerClass => kept.class_index == candidate.class_index,
      };
      // NaN 阈值视为全部重叠
      comparable
        && !matches!(
          iou(kept, &candidate).partial_cmp(&iou_threshold),
          Some(Ordering::Less | Ordering::Equal)
        )
    });
    if !duplicated {
      accepted.push(candidate);
    }
  }

  debug!("NMS: {} 个候选框保留 {} 个", total, accepted.len());
  accepted
}

#[cfg(test)]
mod tests {
  use super::*;

  fn det(cx: f32, cy: f32, size: f32, score: f32, class_index: usize) -> Detection {
    Detection::from_center(cx, cy, size, size, score, class_index, "leg".into())
  }

  #[test]
  fn empty_input() {
    assert!(suppress(Vec::new(), 0.5).is_empty());
  }

  #[test]
  fn single_candidate_is_kept() {
    let only = det(0.5, 0.5, 0.2, 0.7, 0);
    assert_eq!(suppress(vec![only.clone()], 0.0), vec![only]);
  }

  #[test]
  fn keeps_higher_score_of_duplicates() {
    let low = det(0.5, 0.5, 0.2, 0.80, 0);
    let high = det(0.505, 0.5, 0.2, 0.95, 0);
    let result = suppress(vec![low, high.clone()], 0.5);
    assert_eq!(result, vec![high]);
  }

  #[test]
  fn output_sorted_by_score() {
    let a = det(0.2, 0.2, 0.1, 0.7, 0);
    let b = det(0.8, 0.8, 0.1, 0.9, 0);
    let c = det(0.5, 0.5, 0.1, 0.8, 1);
    let result = suppress(vec![a, b, c], 0.5);
    let scores: Vec<f32> = result.iter().map(|d| d.score).collect();
    assert_eq!(scores, vec![0.9, 0.8, 0.7]);
  }

  #[test]
  fn equal_scores_keep_scan_order() {
    let first = det(0.5, 0.5, 0.2, 0.8, 0);
    let second = det(0.51, 0.5, 0.2, 0.8, 1);
    let result = suppress(vec![first.clone(), second], 0.5);
    assert_eq!(result, vec![first]);
  }

  #[test]
  fn iou_equal_to_threshold_is_kept() {
    let a = det(0.5, 0.5, 0.2, 0.9, 0);
    let b = a.clone();
    // 交并比为 1，阈值为 1 时不抑制
    assert_eq!(suppress(vec![a, b], 1.0).len(), 2);
  }

  #[test]
  fn nan_threshold_keeps_only_best() {
    let a = det(0.2, 0.2, 0.1, 0.9, 0);
    let b = det(0.8, 0.8, 0.1, 0.7, 0);
    assert_eq!(suppress(vec![b, a.clone()], f32::NAN), vec![a]);
  }

  #[test]
  fn per_class_mode_keeps_other_classes() {
    let a = det(0.5, 0.5, 0.2, 0.9, 0);
    let b = det(0.5, 0.5, 0.2, 0.8, 1);
    assert_eq!(suppress(vec![a.clone(), b.clone()], 0.5).len(), 1);
    assert_eq!(
      suppress_with_mode(vec![a, b], 0.5, SuppressionMode::PerClass).len(),
      2
    );
  }

  #[test]
  fn parse_mode() {
    assert_eq!(
      "agnostic".parse::<SuppressionMode>(),
      Ok(SuppressionMode::ClassAgnostic)
    );
    assert_eq!(
      "per-class".parse::<SuppressionMode>(),
      Ok(SuppressionMode::PerClass)
    );
    assert!("other".parse::<SuppressionMode>().is_err());
  }
}
