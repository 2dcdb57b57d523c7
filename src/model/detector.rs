// 该文件是 Tespit （目标检测后处理） 项目的一部分。
// src/model/detector.rs - 检测器配置与后处理入口
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

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  labels::{Labels, LabelsError},
  model::{
    ConfigurationError, DetectResult, SuppressionMode, TensorShape, decode, suppress_with_mode,
  },
};

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.6;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum DetectorBuilderError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("参数 {key} 的值无效: {value}")]
  InvalidParameter { key: String, value: String },
  #[error("未知参数: {0}")]
  UnknownParameter(String),
  #[error("标签错误: {0}")]
  LabelsError(#[from] LabelsError),
  #[error("配置错误: {0}")]
  ConfigurationError(#[from] ConfigurationError),
}

/// 检测后处理器。
///
/// 只持有不可变配置，可在多个线程间共享，每次调用互不影响。
#[derive(Debug, Clone)]
pub struct Detector {
  shape: TensorShape,
  confidence_threshold: f32,
  iou_threshold: f32,
  mode: SuppressionMode,
  labels: Labels,
}

impl Detector {
  pub fn builder() -> DetectorBuilder {
    DetectorBuilder::default()
  }

  pub fn shape(&self) -> TensorShape {
    self.shape
  }

  pub fn labels(&self) -> &Labels {
    &self.labels
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  pub fn iou_threshold(&self) -> f32 {
    self.iou_threshold
  }

  pub fn mode(&self) -> SuppressionMode {
    self.mode
  }

  /// 模型输出形状确定后建立形状
  pub fn with_shape(mut self, shape: TensorShape) -> Self {
    self.shape = shape;
    self
  }

  /// 解码并抑制一帧输出张量。
  ///
  /// 形状或标签未建立时返回 [`ConfigurationError`]；
  /// 没有检测到目标时返回空结果。
  pub fn detect(&self, tensor: &[f32]) -> Result<DetectResult, ConfigurationError> {
    let candidates = decode(tensor, self.shape, self.confidence_threshold, &self.labels)?;
    let items = suppress_with_mode(candidates, self.iou_threshold, self.mode);
    debug!("检测到 {} 个物体", items.len());
    Ok(DetectResult::from(items))
  }
}

#[derive(Debug, Clone)]
pub struct DetectorBuilder {
  shape: TensorShape,
  confidence_threshold: f32,
  iou_threshold: f32,
  mode: SuppressionMode,
  labels: Labels,
}

impl Default for DetectorBuilder {
  fn default() -> Self {
    Self {
      shape: TensorShape::default(),
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      mode: SuppressionMode::default(),
      labels: Labels::default(),
    }
  }
}

impl FromUrlWithScheme for DetectorBuilder {
  const SCHEME: &'static str = "detector";
}

impl FromUrl for DetectorBuilder {
  type Error = DetectorBuilderError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DetectorBuilderError::SchemeMismatch);
    }

    let mut builder = DetectorBuilder::default();

    let path = url.path();
    if !path.is_empty() && path != "/" {
      builder = builder.labels(Labels::from_path(path)?);
    }

    for (key, value) in url.query_pairs() {
      let invalid = || DetectorBuilderError::InvalidParameter {
        key: key.to_string(),
        value: value.to_string(),
      };
      match key.as_ref() {
        "channels" => builder.shape.channels = value.parse().map_err(|_| invalid())?,
        "anchors" => builder.shape.anchors = value.parse().map_err(|_| invalid())?,
        "confidence" => builder.confidence_threshold = value.parse().map_err(|_| invalid())?,
        "iou" => builder.iou_threshold = value.parse().map_err(|_| invalid())?,
        "mode" => builder.mode = value.parse().map_err(|_| invalid())?,
        other => return Err(DetectorBuilderError::UnknownParameter(other.to_string())),
      }
    }

    Ok(builder)
  }
}

impl DetectorBuilder {
  pub fn shape(mut self, shape: TensorShape) -> Self {
    self.shape = shape;
    self
  }

  /// 使用模型声明的输出维度 `[1, channels, anchors]`，维度不符时保持未建立
  pub fn output_dims(mut self, dims: &[usize]) -> Self {
    self.shape = TensorShape::from_output_dims(dims).unwrap_or_default();
    self
  }

  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn mode(mut self, mode: SuppressionMode) -> Self {
    self.mode = mode;
    self
  }

  pub fn labels(mut self, labels: Labels) -> Self {
    self.labels = labels;
    self
  }

  pub fn build(self) -> Result<Detector, DetectorBuilderError> {
    for (name, value) in [
      ("confidence", self.confidence_threshold),
      ("iou", self.iou_threshold),
    ] {
      if !value.is_finite() {
        return Err(ConfigurationError::InvalidThreshold { name, value }.into());
      }
    }

    info!(
      "检测器配置: 形状 {}x{}, 置信度阈值 {}, IoU 阈值 {}, 模式 {:?}, 标签 {} 个",
      self.shape.channels,
      self.shape.anchors,
      self.confidence_threshold,
      self.iou_threshold,
      self.mode,
      self.labels.len()
    );

    Ok(Detector {
      shape: self.shape,
      confidence_threshold: self.confidence_threshold,
      iou_threshold: self.iou_threshold,
      mode: self.mode,
      labels: self.labels,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn labels() -> Labels {
    ["left_leg", "right_leg"].into_iter().collect()
  }

  #[test]
  fn builder_defaults() {
    let detector = Detector::builder().build().unwrap();
    assert_eq!(detector.confidence_threshold(), DEFAULT_CONFIDENCE_THRESHOLD);
    assert_eq!(detector.iou_threshold(), DEFAULT_IOU_THRESHOLD);
    assert_eq!(detector.mode(), SuppressionMode::ClassAgnostic);
    assert_eq!(detector.shape(), TensorShape::default());
  }

  #[test]
  fn unset_shape_is_configuration_error() {
    let detector = Detector::builder().labels(labels()).build().unwrap();
    assert_eq!(detector.detect(&[]), Err(ConfigurationError::NoAnchors));

    let detector = detector.with_shape(TensorShape::new(6, 1));
    assert!(detector.detect(&[0.0; 6]).unwrap().is_empty());
  }

  #[test]
  fn output_dims_establish_shape() {
    let detector = Detector::builder().output_dims(&[1, 6, 8400]).build().unwrap();
    assert_eq!(detector.shape(), TensorShape::new(6, 8400));
    let detector = Detector::builder().output_dims(&[6]).build().unwrap();
    assert_eq!(detector.shape(), TensorShape::default());
  }

  #[test]
  fn non_finite_threshold_rejected() {
    let err = Detector::builder().iou_threshold(f32::NAN).build().unwrap_err();
    assert!(matches!(
      err,
      DetectorBuilderError::ConfigurationError(ConfigurationError::InvalidThreshold {
        name: "iou",
        ..
      })
    ));
  }

  #[test]
  fn detect_decodes_and_suppresses() {
    let shape = TensorShape::new(6, 3);
    let mut tensor = vec![0.0; shape.len()];
    let anchors = [
      [0.5, 0.5, 0.2, 0.2, 0.80, 0.0],
      [0.505, 0.5, 0.2, 0.2, 0.95, 0.0],
      [0.2, 0.2, 0.1, 0.1, 0.0, 0.7],
    ];
    for (a, values) in anchors.iter().enumerate() {
      for (c, value) in values.iter().enumerate() {
        tensor[shape.index(c, a)] = *value;
      }
    }

    let detector = Detector::builder()
      .shape(shape)
      .labels(labels())
      .build()
      .unwrap();
    let result = detector.detect(&tensor).unwrap();
    let scores: Vec<f32> = result.iter().map(|d| d.score).collect();
    assert_eq!(scores, vec![0.95, 0.7]);
    assert_eq!(result.items[1].class_name.as_ref(), "right_leg");
  }

  #[test]
  fn from_url_reads_query_and_labels() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "left_leg")?;
    writeln!(file, "right_leg")?;

    let url = Url::parse(&format!(
      "detector://{}?channels=6&anchors=8400&confidence=0.4&iou=0.7&mode=per-class",
      file.path().display()
    ))?;
    let detector = DetectorBuilder::from_url(&url)?.build()?;
    assert_eq!(detector.shape(), TensorShape::new(6, 8400));
    assert_eq!(detector.confidence_threshold(), 0.4);
    assert_eq!(detector.iou_threshold(), 0.7);
    assert_eq!(detector.mode(), SuppressionMode::PerClass);
    assert_eq!(detector.labels().len(), 2);
    Ok(())
  }

  #[test]
  fn from_url_rejects_bad_input() {
    let url = Url::parse("yolo26:///model.rknn").unwrap();
    assert!(matches!(
      DetectorBuilder::from_url(&url),
      Err(DetectorBuilderError::SchemeMismatch)
    ));

    let url = Url::parse("detector:///?anchors=many").unwrap();
    assert!(matches!(
      DetectorBuilder::from_url(&url),
      Err(DetectorBuilderError::InvalidParameter { .. })
    ));

    let url = Url::parse("detector:///?stride=8").unwrap();
    assert!(matches!(
      DetectorBuilder::from_url(&url),
      Err(DetectorBuilderError::UnknownParameter(_))
    ));
  }

  #[test]
  fn oversized_url_shape_is_configuration_error() -> Result<(), Box<dyn std::error::Error>> {
    let half = 1usize << (usize::BITS / 2);
    let url = Url::parse(&format!("detector:///?channels={half}&anchors={half}"))?;
    let detector = DetectorBuilder::from_url(&url)?.build()?;
    assert_eq!(
      detector.detect(&[0.0; 6]),
      Err(ConfigurationError::ShapeOverflow {
        channels: half,
        anchors: half
      })
    );
    Ok(())
  }
}
