// 该文件是 Tespit （目标检测后处理） 项目的一部分。
// src/task.rs - 推理与后处理任务
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
  thread,
  time::{Duration, Instant},
};
use tracing::{info, warn};

use crate::{
  model::{DetectResult, Detector, Model},
  output::{Outcome, Render},
};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(
    self,
    input: I,
    model: M,
    detector: &Detector,
    output: O,
  ) -> Result<(), Self::Error>;
}

/// 推理并后处理一帧，返回结果与推理加解码耗时
pub fn process_frame<F, M>(
  frame: &F,
  model: &M,
  detector: &Detector,
) -> anyhow::Result<(DetectResult, Duration)>
where
  M: Model<Input = F>,
  M::Error: std::error::Error + Sync + Send + 'static,
{
  let now = Instant::now();
  let tensor = model.infer(frame)?;
  let result = detector.detect(&tensor)?;
  Ok((result, now.elapsed()))
}

pub struct OneShotTask;

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Error = ME>,
  O: Render<Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, detector: &Detector, output: O) -> anyhow::Result<()> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let (result, elapsed) = process_frame(&frame, &model, detector)?;
    info!("推理完成，耗时: {:.2?}", elapsed);
    output.render(Outcome::new(&result, elapsed))?;

    Ok(())
  }
}

pub struct RepeatShotTask {
  repeat_times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat_times: 1000 }
  }
}

impl RepeatShotTask {
  /// 前两次作为预热不计入平均耗时
  const WARMUP: usize = 2;

  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times;
    self
  }
}

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Error = ME>,
  O: Render<Error = RE>,
> Task<I, M, O> for RepeatShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, detector: &Detector, output: O) -> anyhow::Result<()> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat_times);
    for i in 0..self.repeat_times {
      let (result, elapsed) = process_frame(&frame, &model, detector)?;
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      output.render(Outcome::new(&result, elapsed))?;
      times.push(elapsed);
    }

    if times.len() > Self::WARMUP {
      warn!(
        "平均推理时间: {:.2?}",
        times.iter().skip(Self::WARMUP).sum::<Duration>() / (times.len() - Self::WARMUP) as u32
      );
    } else {
      warn!("重复次数不足 {}，不计算平均推理时间", Self::WARMUP + 1);
    }

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  handle_interrupt: bool,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 注册 Ctrl-C 处理，收到信号后在当前帧结束时退出
  pub fn with_interrupt(mut self, handle_interrupt: bool) -> Self {
    self.handle_interrupt = handle_interrupt;
    self
  }
}

impl<
  F,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  M: Model<Input = F, Error = ME>,
  O: Render<Error = RE>,
> Task<I, M, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, detector: &Detector, output: O) -> anyhow::Result<()> {
    info!("开始任务...");
    let (tx, rx) = std::sync::mpsc::channel();

    if self.handle_interrupt {
      ctrlc::set_handler(move || {
        info!("收到中断信号，准备退出...");
        let _ = tx.send(());
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })?;
    }

    let mut frame_index = 0usize;
    let mut total_detections = 0usize;
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      info!("处理第 {} 帧", frame_index);
      let (result, elapsed_a) = process_frame(&frame, &model, detector)?;
      total_detections += result.len();
      let now = Instant::now();
      output.render(Outcome::new(&result, elapsed_a))?;
      let elapsed_b = now.elapsed();
      info!("推理完成，耗时: {:.2?} / 输出耗时: {:.2?}", elapsed_a, elapsed_b);
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共 {} 帧，{} 个检测结果", frame_index, total_detections);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    labels::Labels,
    model::{TensorReplay, TensorShape},
  };
  use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
  };

  #[derive(Default, Clone)]
  struct Collect {
    frames: Arc<Mutex<Vec<usize>>>,
  }

  impl Render for Collect {
    type Error = Infallible;

    fn render_empty(&self) -> Result<(), Self::Error> {
      self.frames.lock().unwrap().push(0);
      Ok(())
    }

    fn render_result(&self, result: &DetectResult, _elapsed: Duration) -> Result<(), Self::Error> {
      self.frames.lock().unwrap().push(result.len());
      Ok(())
    }
  }

  fn detector() -> Detector {
    Detector::builder()
      .shape(TensorShape::new(5, 1))
      .labels(["leg"].into_iter().collect::<Labels>())
      .build()
      .unwrap()
  }

  fn frames() -> Vec<Box<[f32]>> {
    vec![
      vec![0.5, 0.5, 0.2, 0.2, 0.9].into_boxed_slice(),
      vec![0.5, 0.5, 0.2, 0.2, 0.1].into_boxed_slice(),
      vec![0.5, 0.5, 0.2, 0.2, 0.8].into_boxed_slice(),
    ]
  }

  #[test]
  fn one_shot_uses_first_frame() {
    let sink = Collect::default();
    OneShotTask
      .run_task(frames().into_iter(), TensorReplay, &detector(), sink.clone())
      .unwrap();
    assert_eq!(*sink.frames.lock().unwrap(), vec![1]);
  }

  #[test]
  fn one_shot_without_input_fails() {
    let result = OneShotTask.run_task(
      Vec::<Box<[f32]>>::new().into_iter(),
      TensorReplay,
      &detector(),
      Collect::default(),
    );
    assert!(result.is_err());
  }

  #[test]
  fn repeat_shot_runs_requested_times() {
    let sink = Collect::default();
    RepeatShotTask::default()
      .with_repeat_times(4)
      .run_task(frames().into_iter(), TensorReplay, &detector(), sink.clone())
      .unwrap();
    assert_eq!(*sink.frames.lock().unwrap(), vec![1, 1, 1, 1]);
  }

  #[test]
  fn continuous_reports_empty_frames_and_stops_at_limit() {
    let sink = Collect::default();
    ContinuousTask::default()
      .with_frame_number(Some(2))
      .run_task(frames().into_iter(), TensorReplay, &detector(), sink.clone())
      .unwrap();
    assert_eq!(*sink.frames.lock().unwrap(), vec![1, 0]);
  }

  #[test]
  fn configuration_error_stops_task() {
    let unset = Detector::builder().build().unwrap();
    let result = ContinuousTask::default().run_task(
      frames().into_iter(),
      TensorReplay,
      &unset,
      Collect::default(),
    );
    let err = result.unwrap_err();
    assert!(err.downcast_ref::<crate::model::ConfigurationError>().is_some());
  }
}
