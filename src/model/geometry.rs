// 该文件是 Tespit （目标检测后处理） 项目的一部分。
// src/model/geometry.rs - 交并比计算
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

use crate::model::Detection;

/// 两个框的重叠度量
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Overlap {
  /// 交并比
  pub iou: f32,
  /// 交集面积 / 第一个框面积
  pub overlap_a: f32,
  /// 交集面积 / 第二个框面积
  pub overlap_b: f32,
}

/// 计算交并比及两个方向的重叠比例。
///
/// 并集面积不大于 0 时交并比记为 0，面积为 0 的框重叠比例记为 0。
pub fn overlap(a: &Detection, b: &Detection) -> Overlap {
  let x1 = a.min_x.max(b.min_x);
  let y1 = a.min_y.max(b.min_y);
  let x2 = a.max_x.min(b.max_x);
  let y2 = a.max_y.min(b.max_y);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = a.area();
  let area_b = b.area();
  let union = area_a + area_b - intersection;

  Overlap {
    iou: ratio(intersection, union),
    overlap_a: ratio(intersection, area_a),
    overlap_b: ratio(intersection, area_b),
  }
}

pub fn iou(a: &Detection, b: &Detection) -> f32 {
  overlap(a, b).iou
}

fn ratio(part: f32, whole: f32) -> f32 {
  if whole > 0.0 {
    (part / whole).clamp(0.0, 1.0)
  } else {
    0.0
  }
}
