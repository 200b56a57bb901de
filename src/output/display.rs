// 该文件是 Wangjian （望见） 项目的一部分。
// src/output/display.rs - 显示交接槽
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
  sync::{Condvar, Mutex, MutexGuard, PoisonError},
  time::Duration,
};

struct SlotState<T> {
  latest: Option<T>,
  closed: bool,
}

/// 单值、后写覆盖的显示交接槽
///
/// 发布方从不阻塞；未被取走的旧结果直接被新结果替换。
pub struct DisplaySlot<T> {
  state: Mutex<SlotState<T>>,
  ready: Condvar,
}

impl<T> Default for DisplaySlot<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> DisplaySlot<T> {
  pub fn new() -> Self {
    Self {
      state: Mutex::new(SlotState {
        latest: None,
        closed: false,
      }),
      ready: Condvar::new(),
    }
  }

  fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// 发布最新结果，返回是否覆盖了尚未取走的结果
  pub fn publish(&self, value: T) -> bool {
    let replaced = self.lock().latest.replace(value).is_some();
    self.ready.notify_all();
    replaced
  }

  pub fn take_latest(&self) -> Option<T> {
    self.lock().latest.take()
  }

  /// 等待结果，超时或槽已关闭且为空时返回 `None`
  pub fn wait_latest(&self, timeout: Duration) -> Option<T> {
    let guard = self.lock();
    let (mut guard, _) = self
      .ready
      .wait_timeout_while(guard, timeout, |s| s.latest.is_none() && !s.closed)
      .unwrap_or_else(PoisonError::into_inner);
    guard.latest.take()
  }

  pub fn close(&self) {
    self.lock().closed = true;
    self.ready.notify_all();
  }

  pub fn is_closed(&self) -> bool {
    self.lock().closed
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::{sync::Arc, thread};

  #[test]
  fn last_write_wins() {
    let slot = DisplaySlot::new();
    assert!(!slot.publish(1));
    assert!(slot.publish(2));
    assert_eq!(slot.take_latest(), Some(2));
    assert_eq!(slot.take_latest(), None);
  }

  #[test]
  fn wait_returns_after_publish_from_another_thread() {
    let slot = Arc::new(DisplaySlot::new());
    let publisher = {
      let slot = slot.clone();
      thread::spawn(move || {
        slot.publish("frame");
      })
    };
    let value = slot.wait_latest(Duration::from_secs(5));
    publisher.join().unwrap();
    assert_eq!(value, Some("frame"));
  }

  #[test]
  fn wait_times_out_and_observes_close() {
    let slot: DisplaySlot<u8> = DisplaySlot::new();
    assert_eq!(slot.wait_latest(Duration::from_millis(10)), None);
    assert!(!slot.is_closed());
    slot.close();
    assert_eq!(slot.wait_latest(Duration::from_secs(5)), None);
    assert!(slot.is_closed());
  }
}
