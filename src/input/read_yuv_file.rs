// 该文件是 Wangjian （望见） 项目的一部分。
// src/input/read_yuv_file.rs - 原始 YUV 文件输入
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
  fs::File,
  io::{BufReader, ErrorKind, Read},
  path::Path,
};

use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::ConfigError,
  frame::{RawFrame, Rotation},
  query_value,
};

#[derive(Error, Debug)]
pub enum YuvFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("缺少参数: {0}")]
  MissingParameter(&'static str),
  #[error("参数无效: {0}={1}")]
  InvalidParameter(&'static str, String),
  #[error("配置错误: {0}")]
  ConfigError(#[from] ConfigError),
}

/// 文件中每帧的排列方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum YuvFormat {
  /// Y 平面后接交错的 V、U
  #[default]
  Nv21,
  /// Y、U、V 三个独立平面
  I420,
}

impl std::str::FromStr for YuvFormat {
  type Err = YuvFileInputError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "nv21" => Ok(YuvFormat::Nv21),
      "i420" => Ok(YuvFormat::I420),
      _ => Err(YuvFileInputError::InvalidParameter("format", s.to_string())),
    }
  }
}

/// 从文件中逐帧读取固定尺寸的原始 YUV 4:2:0 帧
pub struct YuvFileInput {
  reader: Box<dyn Read + Send>,
  width: u32,
  height: u32,
  rotation: Rotation,
  format: YuvFormat,
  frame_index: usize,
}

impl FromUrlWithScheme for YuvFileInput {
  const SCHEME: &'static str = "yuv";
}

impl FromUrl for YuvFileInput {
  type Error = YuvFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(YuvFileInputError::SchemeMismatch);
    }

    let width = parse_param(url, "width")?.ok_or(YuvFileInputError::MissingParameter("width"))?;
    let height = parse_param(url, "height")?.ok_or(YuvFileInputError::MissingParameter("height"))?;
    let rotation = Rotation::try_from(parse_param(url, "rotation")?.unwrap_or(0))?;
    let format = match query_value(url, "format") {
      Some(s) => s.parse()?,
      None => YuvFormat::default(),
    };

    Self::open(url.path(), width, height, rotation, format)
  }
}

fn parse_param(url: &Url, key: &'static str) -> Result<Option<u32>, YuvFileInputError> {
  query_value(url, key)
    .map(|v| {
      v.parse::<u32>()
        .map_err(|_| YuvFileInputError::InvalidParameter(key, v))
    })
    .transpose()
}

impl YuvFileInput {
  pub fn new<R: Read + Send + 'static>(
    reader: R,
    width: u32,
    height: u32,
    rotation: Rotation,
    format: YuvFormat,
  ) -> Result<Self, YuvFileInputError> {
    if width == 0 || height == 0 {
      return Err(ConfigError::InvalidDimensions { width, height }.into());
    }
    Ok(Self {
      reader: Box::new(reader),
      width,
      height,
      rotation,
      format,
      frame_index: 0,
    })
  }

  pub fn open<P: AsRef<Path>>(
    path: P,
    width: u32,
    height: u32,
    rotation: Rotation,
    format: YuvFormat,
  ) -> Result<Self, YuvFileInputError> {
    let path = path.as_ref();
    info!(
      "打开 YUV 文件: {} ({}x{}, {:?}, 旋转 {}°)",
      path.display(),
      width,
      height,
      format,
      rotation.degrees()
    );
    let file = File::open(path)?;
    Self::new(BufReader::new(file), width, height, rotation, format)
  }

  /// 单帧字节数: 亮度平面加两个四分之一分辨率的色度平面
  pub fn frame_len(&self) -> usize {
    let (w, h) = (self.width as usize, self.height as usize);
    w * h + 2 * w.div_ceil(2) * h.div_ceil(2)
  }

  fn read_frame(&mut self) -> std::io::Result<Option<Vec<u8>>> {
    let mut buffer = vec![0u8; self.frame_len()];
    let mut filled = 0;
    while filled < buffer.len() {
      match self.reader.read(&mut buffer[filled..]) {
        Ok(0) => break,
        Ok(n) => filled += n,
        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
        Err(e) => return Err(e),
      }
    }

    if filled == 0 {
      return Ok(None);
    }
    if filled < buffer.len() {
      warn!("文件末尾帧不完整: {} / {} 字节, 丢弃", filled, buffer.len());
      return Ok(None);
    }
    Ok(Some(buffer))
  }
}

impl Iterator for YuvFileInput {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    let data = match self.read_frame() {
      Ok(Some(data)) => data,
      Ok(None) => {
        info!("YUV 文件读取完毕, 共 {} 帧", self.frame_index);
        return None;
      }
      Err(e) => {
        error!("读取 YUV 帧失败: {}", e);
        return None;
      }
    };

    self.frame_index += 1;
    debug!("读取第 {} 帧", self.frame_index);
    let frame = match self.format {
      YuvFormat::Nv21 => RawFrame::from_nv21(self.width, self.height, self.rotation, &data),
      YuvFormat::I420 => RawFrame::from_i420(self.width, self.height, self.rotation, &data),
    };
    Some(frame)
  }
}
