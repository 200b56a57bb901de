// 该文件是 Wangjian （望见） 项目的一部分。
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

use std::{
  fmt::Write as _,
  path::{Path, PathBuf},
  sync::atomic::{AtomicU16, Ordering},
};

use chrono::{Datelike, Utc};
use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::DetectResult,
  output::{OverlayRenderer, Render},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 保存方式：绘制边框后保存，或保存原图并附带文本记录
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordMode {
  Draw,
  Record,
}

/// 按 `年/月/日` 分目录保存每一帧
///
/// `folder:///dir` 保存绘制后的图像，`?record` 改为保存原图和同名 `.txt` 记录，
/// `?always` 在没有检测结果时也保存。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  mode: RecordMode,
  renderer: OverlayRenderer,
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

    let mode = if uri.query_pairs().any(|(k, _)| k == "record") {
      RecordMode::Record
    } else {
      RecordMode::Draw
    };
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput::new(uri.path(), mode, always))
  }
}

impl DirectoryRecordOutput {
  pub fn new<P: AsRef<Path>>(directory: P, mode: RecordMode, always: bool) -> Self {
    Self {
      directory: directory.as_ref().to_path_buf(),
      mode,
      renderer: OverlayRenderer::default(),
      frame_counter: AtomicU16::new(0),
      always,
    }
  }

  pub fn with_renderer(mut self, renderer: OverlayRenderer) -> Self {
    self.renderer = renderer;
    self
  }

  pub fn mode(&self) -> RecordMode {
    self.mode
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
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }

  fn write_record(path: &Path, result: &DetectResult) -> Result<(), DirectoryRecordOutputError> {
    let mut text = String::new();
    for b in result.iter() {
      let _ = writeln!(
        text,
        "{:.1} {:.1} {:.1} {:.1} {:.4}",
        b.left, b.top, b.right, b.bottom, b.score
      );
    }
    std::fs::write(path.with_extension("txt"), text)?;
    Ok(())
  }
}

impl Render<RgbImage, DetectResult> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbImage, result: &DetectResult) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      return Ok(());
    }

    let path = self.frame_path()?;
    match self.mode {
      RecordMode::Draw => {
        self.renderer.render(frame, &result.boxes).save(&path)?;
      }
      RecordMode::Record => {
        frame.save(&path)?;
        Self::write_record(&path, result)?;
      }
    }
    debug!("记录帧到: {}", path.display());
    Ok(())
  }
}
