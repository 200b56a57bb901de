// 该文件是 Wangjian （望见） 项目的一部分。
// src/task.rs - 任务调度
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
  sync::{Arc, mpsc},
  thread,
  time::{Duration, Instant},
};

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::{
  frame::RawFrame,
  model::{DetectResult, InferenceEngine, Model},
  output::{DisplaySlot, Render},
  pipeline::{DetectionOutput, Pipeline},
};

mod analyzer;
pub use self::analyzer::{AnalyzerWorker, FrameMailbox, Offer, WorkerStats};

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 只处理第一帧
pub struct OneShotTask;

impl<I, E, O> Task<I, Pipeline<E>, O> for OneShotTask
where
  I: Iterator<Item = RawFrame>,
  E: InferenceEngine,
  O: Render<RgbImage, DetectResult>,
  O::Error: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, pipeline: Pipeline<E>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = Instant::now();
    let detection = pipeline
      .infer(&frame)?
      .ok_or_else(|| anyhow::anyhow!("输入帧解码失败"))?;
    let elapsed = now.elapsed();
    info!(
      "推理完成，耗时: {:.2?}, 检测到 {} 个目标",
      elapsed,
      detection.boxes().len()
    );
    output.render_result(&detection.original, &detection.result)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 持续处理输入帧
///
/// 采集端逐帧投递到容量为 1 的信箱，分析线程忙碌时新帧覆盖旧帧；
/// 分析结果经显示槽交给输出端，输出端只取最新结果。
#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
  frame_interval: Option<Duration>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 两次投递之间的间隔，用于按采集帧率回放文件
  pub fn with_frame_interval(mut self, frame_interval: Option<Duration>) -> Self {
    self.frame_interval = frame_interval;
    self
  }
}

fn flush_latest<O>(slot: &DisplaySlot<DetectionOutput>, output: &O) -> anyhow::Result<bool>
where
  O: Render<RgbImage, DetectResult>,
  O::Error: std::error::Error + Sync + Send + 'static,
{
  match slot.take_latest() {
    Some(detection) => {
      output.render_result(&detection.original, &detection.result)?;
      Ok(true)
    }
    None => Ok(false),
  }
}

impl<I, E, O> Task<I, Pipeline<E>, O> for ContinuousTask
where
  I: Iterator<Item = RawFrame>,
  E: InferenceEngine + Send + 'static,
  O: Render<RgbImage, DetectResult>,
  O::Error: std::error::Error + Sync + Send + 'static,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, pipeline: Pipeline<E>, output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let (tx, rx) = mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
    .expect("Error setting Ctrl-C handler");

    let mailbox = Arc::new(FrameMailbox::new());
    let slot = Arc::new(DisplaySlot::new());
    let worker = AnalyzerWorker::spawn(pipeline, mailbox.clone(), slot.clone())?;

    let mut frame_index = 0usize;
    let mut rendered = 0usize;
    let mut outcome = Ok(());
    for frame in input {
      frame_index = frame_index.wrapping_add(1);
      debug!("投递第 {} 帧图像", frame_index);
      if mailbox.offer(frame) == Offer::Replaced {
        debug!("分析线程繁忙，丢弃上一帧");
      }

      match flush_latest(&slot, &output) {
        Ok(true) => rendered += 1,
        Ok(false) => {}
        Err(e) => {
          outcome = Err(e);
          break;
        }
      }

      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if rx.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
      if let Some(interval) = self.frame_interval {
        thread::sleep(interval);
      }
    }

    mailbox.close();
    let stats = worker.join()?;
    outcome?;
    if flush_latest(&slot, &output)? {
      rendered += 1;
    }

    info!(
      "任务完成: 投递 {} 帧, 分析 {} 帧, 输出 {} 帧",
      frame_index, stats.processed, rendered
    );
    Ok(())
  }
}
