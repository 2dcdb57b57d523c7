// 该文件是 Tespit （目标检测后处理） 项目的一部分。
// src/output.rs - 检测结果输出
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

use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, model::DetectResult};

/// 单帧处理结果的两种形态
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
  Empty,
  Detected {
    result: &'a DetectResult,
    elapsed: Duration,
  },
}

impl<'a> Outcome<'a> {
  pub fn new(result: &'a DetectResult, elapsed: Duration) -> Self {
    if result.is_empty() {
      Outcome::Empty
    } else {
      Outcome::Detected { result, elapsed }
    }
  }
}

pub trait Render: Sized {
  type Error;

  fn render_empty(&self) -> Result<(), Self::Error>;
  fn render_result(&self, result: &DetectResult, elapsed: Duration) -> Result<(), Self::Error>;

  fn render(&self, outcome: Outcome<'_>) -> Result<(), Self::Error> {
    match outcome {
      Outcome::Empty => self.render_empty(),
      Outcome::Detected { result, elapsed } => self.render_result(result, elapsed),
    }
  }
}

mod directory_record;
mod json_lines;
mod log_output;

pub use self::directory_record::{DirectoryRecordOutput, DirectoryRecordOutputError, RecordLabel};
pub use self::json_lines::{JsonLinesOutput, JsonLinesOutputError};
pub use self::log_output::LogOutput;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("JSON Lines 输出错误: {0}")]
  JsonLinesOutputError(#[from] JsonLinesOutputError),
  #[error("目录记录输出错误: {0}")]
  DirectoryRecordOutputError(#[from] DirectoryRecordOutputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum OutputWrapper {
  Log(LogOutput),
  JsonLines(JsonLinesOutput),
  DirectoryRecord(DirectoryRecordOutput),
}

impl FromUrl for OutputWrapper {
  type Error = OutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      LogOutput::SCHEME => Ok(OutputWrapper::Log(LogOutput::from_url(url)?)),
      JsonLinesOutput::SCHEME => Ok(OutputWrapper::JsonLines(JsonLinesOutput::from_url(url)?)),
      DirectoryRecordOutput::SCHEME => Ok(OutputWrapper::DirectoryRecord(
        DirectoryRecordOutput::from_url(url)?,
      )),
      _ => Err(OutputError::SchemeMismatch),
    }
  }
}

impl Render for OutputWrapper {
  type Error = OutputError;

  fn render_empty(&self) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Log(output) => output.render_empty().map_err(|never| match never {}),
      OutputWrapper::JsonLines(output) => output.render_empty().map_err(OutputError::from),
      OutputWrapper::DirectoryRecord(output) => output.render_empty().map_err(OutputError::from),
    }
  }

  fn render_result(&self, result: &DetectResult, elapsed: Duration) -> Result<(), Self::Error> {
    match self {
      OutputWrapper::Log(output) => output
        .render_result(result, elapsed)
        .map_err(|never| match never {}),
      OutputWrapper::JsonLines(output) => output
        .render_result(result, elapsed)
        .map_err(OutputError::from),
      OutputWrapper::DirectoryRecord(output) => output
        .render_result(result, elapsed)
        .map_err(OutputError::from),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::Detection;

  #[test]
  fn outcome_shapes() {
    let empty = DetectResult::default();
    assert!(matches!(
      Outcome::new(&empty, Duration::from_millis(3)),
      Outcome::Empty
    ));

    let result = DetectResult::from(vec![Detection::from_center(
      0.5,
      0.5,
      0.2,
      0.2,
      0.9,
      0,
      "leg".into(),
    )]);
    match Outcome::new(&result, Duration::from_millis(3)) {
      Outcome::Detected { result, elapsed } => {
        assert_eq!(result.len(), 1);
        assert_eq!(elapsed, Duration::from_millis(3));
      }
      Outcome::Empty => panic!("应当有检测结果"),
    }
  }

  #[test]
  fn wrapper_dispatches_by_scheme() {
    let url = Url::parse("log:stdout").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Ok(OutputWrapper::Log(_))
    ));
    let url = Url::parse("rtsp://localhost/stream").unwrap();
    assert!(matches!(
      OutputWrapper::from_url(&url),
      Err(OutputError::SchemeMismatch)
    ));
  }
}
