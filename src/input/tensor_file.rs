// 该文件是 Tespit （目标检测后处理） 项目的一部分。
// src/input/tensor_file.rs - 张量文件输入
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

use std::{
  collections::VecDeque,
  path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

const TENSOR_FILE_EXTENSIONS: [&str; 2] = ["bin", "f32"];

#[derive(Error, Debug)]
pub enum TensorFileInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("File size {size} of {path} is not a multiple of 4 bytes")]
  Misaligned { path: PathBuf, size: usize },
}

/// 读取一个小端 f32 张量文件
pub fn read_tensor_file(path: impl AsRef<Path>) -> Result<Box<[f32]>, TensorFileInputError> {
  let path = path.as_ref();
  let bytes = std::fs::read(path)?;
  if bytes.len() % 4 != 0 {
    return Err(TensorFileInputError::Misaligned {
      path: path.to_path_buf(),
      size: bytes.len(),
    });
  }
  Ok(
    bytes
      .chunks_exact(4)
      .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
      .collect(),
  )
}

/// 推理引擎导出的输出张量，可以是单个文件，也可以是目录。
///
/// 目录中的 `*.bin` / `*.f32` 文件按文件名排序依次读取，
/// 读取失败的文件记录日志后跳过。
#[derive(Debug)]
pub struct TensorFileInput {
  pending: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for TensorFileInput {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorFileInput {
  type Error = TensorFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(TensorFileInputError::SchemaMismatch);
    }
    Self::open(url.path())
  }
}

impl TensorFileInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, TensorFileInputError> {
    let path = path.as_ref();
    let pending = if path.is_dir() {
      let mut files = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
          p.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| TENSOR_FILE_EXTENSIONS.contains(&ext))
        })
        .collect::<Vec<_>>();
      files.sort();
      files
    } else {
      std::fs::metadata(path)?;
      vec![path.to_path_buf()]
    };
    info!("张量输入: {} 个文件", pending.len());
    Ok(Self {
      pending: pending.into(),
    })
  }

  pub fn remaining(&self) -> usize {
    self.pending.len()
  }
}

impl Iterator for TensorFileInput {
  type Item = Box<[f32]>;

  fn next(&mut self) -> Option<Self::Item> {
    while let Some(path) = self.pending.pop_front() {
      match read_tensor_file(&path) {
        Ok(tensor) => return Some(tensor),
        Err(e) => error!("读取张量文件 {} 失败: {}", path.display(), e),
      }
    }
    None
  }
}
