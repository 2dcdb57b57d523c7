// 该文件是 Tespit （目标检测后处理） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use chrono::{Datelike, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::{FromUrl, FromUrlWithScheme, model::DetectResult, output::Render};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 记录中类别的写法
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RecordLabel {
  #[default]
  Name,
  Id,
}

/// 按 `年/月/日` 分目录，每帧写一个 `.txt` 记录文件。
///
/// 每行格式为 `类别, 分数, x_min, y_min, x_max, y_max`。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  label: RecordLabel,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let label = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| {
        if v == "id" {
          RecordLabel::Id
        } else {
          RecordLabel::Name
        }
      })
      .unwrap_or_default();

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput::new(uri.path(), label, always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl AsRef<Path>, label: RecordLabel, always: bool) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      label,
      frame_counter: AtomicU16::new(0),
      always,
    }
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.txt",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn record(&self, result: &DetectResult) -> Result<(), DirectoryRecordOutputError> {
    let records = result
      .iter()
      .map(|item| {
        let name = match self.label {
          RecordLabel::Name => item.class_name.to_string(),
          RecordLabel::Id => item.class_index.to_string(),
        };
        format!(
          "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
          name, item.score, item.min_x, item.min_y, item.max_x, item.max_y
        )
      })
      .collect::<Vec<_>>();

    let path = self.frame_path()?;
    debug!("写入检测记录: {}", path.display());
    std::fs::write(path, records.join("\n"))?;
    Ok(())
  }
}

impl Render for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_empty(&self) -> Result<(), Self::Error> {
    if self.always {
      self.record(&DetectResult::default())?;
    }
    Ok(())
  }

  fn render_result(&self, result: &DetectResult, _elapsed: Duration) -> Result<(), Self::Error> {
    self.record(result)
  }
}
