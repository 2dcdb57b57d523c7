// 该文件是 Tespit （目标检测后处理） 项目的一部分。
// src/output/json_lines.rs - JSON Lines 输出
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
  fs::OpenOptions,
  io::{BufWriter, Write},
  sync::Mutex,
  time::Duration,
};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectResult, Detection},
  output::Render,
};

#[derive(Error, Debug)]
pub enum JsonLinesOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("输出写入器已损坏")]
  Poisoned,
}

#[derive(Serialize)]
struct FrameRecord<'a> {
  timestamp: String,
  elapsed_ms: Option<f64>,
  detections: &'a [Detection],
}

/// 每帧写入一行 JSON，路径为 `-` 时写入标准输出
pub struct JsonLinesOutput {
  writer: Mutex<Box<dyn Write + Send>>,
}

impl FromUrlWithScheme for JsonLinesOutput {
  const SCHEME: &'static str = "jsonl";
}

impl FromUrl for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonLinesOutputError::SchemeMismatch);
    }

    let path = url.path();
    let writer: Box<dyn Write + Send> = if path.is_empty() || path == "-" {
      info!("检测结果写入标准输出");
      Box::new(std::io::stdout())
    } else {
      info!("检测结果写入文件: {}", path);
      let file = OpenOptions::new().create(true).append(true).open(path)?;
      Box::new(BufWriter::new(file))
    };

    Ok(Self::new(writer))
  }
}

impl JsonLinesOutput {
  pub fn new(writer: Box<dyn Write + Send>) -> Self {
    Self {
      writer: Mutex::new(writer),
    }
  }

  fn write_record(&self, record: &FrameRecord<'_>) -> Result<(), JsonLinesOutputError> {
    let mut writer = self
      .writer
      .lock()
      .map_err(|_| JsonLinesOutputError::Poisoned)?;
    serde_json::to_writer(&mut *writer, record)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
  }
}

impl Render for JsonLinesOutput {
  type Error = JsonLinesOutputError;

  fn render_empty(&self) -> Result<(), Self::Error> {
    self.write_record(&FrameRecord {
      timestamp: Utc::now().to_rfc3339(),
      elapsed_ms: None,
      detections: &[],
    })
  }

  fn render_result(&self, result: &DetectResult, elapsed: Duration) -> Result<(), Self::Error> {
    self.write_record(&FrameRecord {
      timestamp: Utc::now().to_rfc3339(),
      elapsed_ms: Some(elapsed.as_micros() as f64 / 1000.0),
      detections: &result.items,
    })
  }
}
