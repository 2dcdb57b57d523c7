// 该文件是 Tespit （目标检测后处理） 项目的一部分。
// src/labels.rs - 类别标签列表
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

use std::{path::Path, sync::Arc};

use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LabelsError {
  #[error("标签文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 按类别通道顺序排列的标签列表。
///
/// 克隆只增加引用计数，检测结果中的类别名称与列表共享同一份字符串。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
  names: Arc<[Arc<str>]>,
}

impl Labels {
  /// 每行一个标签，遇到第一个空行即停止读取。
  pub fn parse(text: &str) -> Self {
    let names = text
      .lines()
      .map(|line| line.trim_end_matches('\r'))
      .take_while(|line| !line.is_empty())
      .map(Arc::<str>::from)
      .collect::<Vec<_>>();
    debug!("解析到 {} 个标签", names.len());
    Self {
      names: names.into(),
    }
  }

  pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LabelsError> {
    let path = path.as_ref();
    info!("加载标签文件: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    Ok(Self::parse(&text))
  }

  pub fn get(&self, index: usize) -> Option<&Arc<str>> {
    self.names.get(index)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.names.iter().map(|name| name.as_ref())
  }
}

impl<S: AsRef<str>> FromIterator<S> for Labels {
  fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
    let names = iter
      .into_iter()
      .map(|name| Arc::<str>::from(name.as_ref()))
      .collect::<Vec<_>>();
    Self {
      names: names.into(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn parse_stops_at_first_empty_line() {
    let labels = Labels::parse("left_leg\nright_leg\n\nignored\n");
    assert_eq!(labels.len(), 2);
    assert_eq!(labels.iter().collect::<Vec<_>>(), vec!["left_leg", "right_leg"]);
  }

  #[test]
  fn parse_handles_crlf() {
    let labels = Labels::parse("a\r\nb\r\n");
    assert_eq!(labels.get(1).map(|s| s.as_ref()), Some("b"));
  }

  #[test]
  fn clones_share_names() {
    let labels: Labels = ["person", "dog"].into_iter().collect();
    let other = labels.clone();
    assert!(Arc::ptr_eq(
      labels.get(0).unwrap(),
      other.get(0).unwrap()
    ));
  }

  #[test]
  fn from_path_reads_file() -> Result<(), Box<dyn std::error::Error>> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(file, "cat")?;
    writeln!(file, "dog")?;
    let labels = Labels::from_path(file.path())?;
    assert_eq!(labels.len(), 2);
    assert!(Labels::from_path("/nonexistent/labels.txt").is_err());
    Ok(())
  }
}
