// 该文件是 Wangjian （望见） 项目的一部分。
// src/config.rs - 流水线配置
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

use image::Rgb;
use thiserror::Error;

/// 默认置信度阈值（严格大于才接受）
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
/// 默认边框线宽
pub const DEFAULT_STROKE_WIDTH: f32 = 8.0;
/// 默认边框颜色：红色
pub const DEFAULT_STROKE_COLOR: [u8; 3] = [255, 0, 0];
/// 默认填充颜色：黑色
pub const DEFAULT_PAD_COLOR: [u8; 3] = [0, 0, 0];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
  #[error("置信度阈值无效: {0}")]
  InvalidThreshold(f32),
  #[error("线宽无效: {0}")]
  InvalidStrokeWidth(f32),
  #[error("目标尺寸无效: {width}x{height}")]
  InvalidDimensions { width: u32, height: u32 },
  #[error("不支持的旋转角度: {0}")]
  InvalidRotation(u32),
  #[error("张量形状无效: {0:?}")]
  InvalidShape(Vec<usize>),
  #[error("张量长度不匹配: 期望 {expected}, 实际 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("颜色格式无效: {0}")]
  InvalidColor(String),
  #[error("未知的张量布局: {0}")]
  UnknownLayout(String),
  #[error("图像尺寸与模型输入不符: 期望 {expected:?}, 实际 {actual:?}")]
  ImageSizeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
}

/// 输入张量的内存布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
  /// `[batch, height, width, channels]`，逐像素交错 RGB
  #[default]
  Nhwc,
  /// `[batch, channels, height, width]`，按通道分平面
  Nchw,
}

impl std::str::FromStr for TensorLayout {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "nhwc" => Ok(TensorLayout::Nhwc),
      "nchw" => Ok(TensorLayout::Nchw),
      _ => Err(ConfigError::UnknownLayout(s.to_string())),
    }
  }
}

/// 流水线配置
///
/// 默认值: `{confidence_threshold: 0.5, stroke_width: 8.0, stroke_color: 红色, pad_color: 黑色}`
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
  /// 置信度阈值
  pub confidence_threshold: f32,
  /// 边框线宽
  pub stroke_width: f32,
  /// 边框颜色
  pub stroke_color: Rgb<u8>,
  /// 缩放后空白区域的填充颜色
  pub pad_color: Rgb<u8>,
  /// 输入张量布局
  pub layout: TensorLayout,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      stroke_width: DEFAULT_STROKE_WIDTH,
      stroke_color: Rgb(DEFAULT_STROKE_COLOR),
      pad_color: Rgb(DEFAULT_PAD_COLOR),
      layout: TensorLayout::default(),
    }
  }
}

impl PipelineConfig {
  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn with_stroke_width(mut self, width: f32) -> Self {
    self.stroke_width = width;
    self
  }

  pub fn with_stroke_color(mut self, color: Rgb<u8>) -> Self {
    self.stroke_color = color;
    self
  }

  pub fn with_pad_color(mut self, color: Rgb<u8>) -> Self {
    self.pad_color = color;
    self
  }

  pub fn with_layout(mut self, layout: TensorLayout) -> Self {
    self.layout = layout;
    self
  }

  /// 构建流水线前校验配置
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !self.confidence_threshold.is_finite() || !(0.0..=1.0).contains(&self.confidence_threshold)
    {
      return Err(ConfigError::InvalidThreshold(self.confidence_threshold));
    }
    if !self.stroke_width.is_finite() || self.stroke_width <= 0.0 {
      return Err(ConfigError::InvalidStrokeWidth(self.stroke_width));
    }
    Ok(())
  }
}

/// 解析 `#rrggbb` / `rrggbb` 格式的颜色
pub fn parse_color(s: &str) -> Result<Rgb<u8>, ConfigError> {
  let hex = s.trim_start_matches('#');
  if hex.len() != 6 || !hex.is_ascii() {
    return Err(ConfigError::InvalidColor(s.to_string()));
  }
  let channel = |i: usize| {
    u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ConfigError::InvalidColor(s.to_string()))
  };
  Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}
