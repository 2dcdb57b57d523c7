// 该文件是 Tespit （目标检测后处理） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use std::{convert::Infallible, time::Duration};

use tracing::info;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::DetectResult,
  output::{OutputError, Render},
};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogOutput;

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = OutputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OutputError::SchemeMismatch);
    }
    Ok(LogOutput)
  }
}

impl Render for LogOutput {
  type Error = Infallible;

  fn render_empty(&self) -> Result<(), Self::Error> {
    info!("未检测到目标");
    Ok(())
  }

  fn render_result(&self, result: &DetectResult, elapsed: Duration) -> Result<(), Self::Error> {
    info!("检测到 {} 个目标，耗时: {:.2?}", result.len(), elapsed);
    for item in result.iter() {
      info!(
        "  - {}({}): {:.2}% at [{:.4}, {:.4}, {:.4}, {:.4}]",
        item.class_name,
        item.class_index,
        item.score * 100.0,
        item.min_x,
        item.min_y,
        item.max_x,
        item.max_y
      );
    }
    Ok(())
  }
}
