// 该文件是 Wangjian （望见） 项目的一部分。
// src/task/analyzer.rs - 单线程帧分析
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
  sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
  thread::{self, JoinHandle},
};

use anyhow::anyhow;
use tracing::{debug, error, info, warn};

use crate::{
  frame::RawFrame,
  model::InferenceEngine,
  output::DisplaySlot,
  pipeline::{DetectionOutput, Pipeline},
};

/// 提交帧的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
  Accepted,
  /// 覆盖了尚未处理的上一帧
  Replaced,
  Closed,
}

struct MailboxState<T> {
  pending: Option<T>,
  closed: bool,
  dropped: usize,
}

/// 容量为 1 的帧信箱，新帧覆盖未处理的旧帧
pub struct FrameMailbox<T> {
  state: Mutex<MailboxState<T>>,
  ready: Condvar,
}

impl<T> Default for FrameMailbox<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> FrameMailbox<T> {
  pub fn new() -> Self {
    Self {
      state: Mutex::new(MailboxState {
        pending: None,
        closed: false,
        dropped: 0,
      }),
      ready: Condvar::new(),
    }
  }

  fn lock(&self) -> MutexGuard<'_, MailboxState<T>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn offer(&self, item: T) -> Offer {
    let mut state = self.lock();
    if state.closed {
      return Offer::Closed;
    }
    let offer = if state.pending.replace(item).is_some() {
      state.dropped += 1;
      Offer::Replaced
    } else {
      Offer::Accepted
    };
    drop(state);
    self.ready.notify_one();
    offer
  }

  /// 阻塞等待下一帧；关闭后仍会先交出已提交的帧
  pub fn recv(&self) -> Option<T> {
    let guard = self.lock();
    let mut state = self
      .ready
      .wait_while(guard, |s| s.pending.is_none() && !s.closed)
      .unwrap_or_else(PoisonError::into_inner);
    state.pending.take()
  }

  pub fn close(&self) {
    self.lock().closed = true;
    self.ready.notify_all();
  }

  /// 被覆盖丢弃的帧数
  pub fn dropped(&self) -> usize {
    self.lock().dropped
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
  pub processed: usize,
  pub skipped: usize,
  pub failed: usize,
}

/// 独占流水线的分析线程
pub struct AnalyzerWorker {
  handle: JoinHandle<WorkerStats>,
}

impl AnalyzerWorker {
  pub fn spawn<E>(
    pipeline: Pipeline<E>,
    mailbox: Arc<FrameMailbox<RawFrame>>,
    slot: Arc<DisplaySlot<DetectionOutput>>,
  ) -> std::io::Result<Self>
  where
    E: InferenceEngine + Send + 'static,
  {
    let handle = thread::Builder::new()
      .name("analyzer".to_string())
      .spawn(move || {
        info!("分析线程启动");
        let mut stats = WorkerStats::default();
        while let Some(frame) = mailbox.recv() {
          match pipeline.process(&frame) {
            Ok(Some(output)) => {
              stats.processed += 1;
              debug!("发布检测结果: {} 个目标", output.boxes().len());
              if slot.publish(output) {
                debug!("显示端未取走上一结果，已覆盖");
              }
            }
            Ok(None) => {
              stats.skipped += 1;
            }
            Err(e) => {
              stats.failed += 1;
              error!("帧处理失败: {}", e);
            }
          }
        }
        slot.close();
        if mailbox.dropped() > 0 {
          warn!("分析线程繁忙期间丢弃 {} 帧", mailbox.dropped());
        }
        info!(
          "分析线程退出: 处理 {} 帧, 跳过 {} 帧, 失败 {} 帧",
          stats.processed, stats.skipped, stats.failed
        );
        stats
      })?;
    Ok(Self { handle })
  }

  pub fn join(self) -> anyhow::Result<WorkerStats> {
    self
      .handle
      .join()
      .map_err(|_| anyhow!("分析线程异常退出"))
  }
}
