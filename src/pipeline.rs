// 该文件是 Wangjian （望见） 项目的一部分。
// src/pipeline.rs - 单帧检测流水线
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

//! 解码 → 缩放填充 → 张量编码 → 推理 → 结果解码 → 绘制

use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  config::{ConfigError, PipelineConfig},
  frame::{FrameDecoder, RawFrame},
  model::{BoundingBox, DetectResult, Detector, DetectorError, InferenceEngine, Model},
  output::OverlayRenderer,
};

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("配置错误: {0}")]
  ConfigError(#[from] ConfigError),
  #[error("检测失败: {0}")]
  DetectorError(#[from] DetectorError),
}

/// 一帧的检测输出
#[derive(Debug, Clone)]
pub struct DetectionOutput {
  /// 解码并旋转后的原图
  pub original: RgbImage,
  /// 按扫描顺序排列的边界框
  pub result: DetectResult,
  /// 绘制了边框的原图副本
  pub rendered: RgbImage,
}

impl DetectionOutput {
  pub fn boxes(&self) -> &[BoundingBox] {
    &self.result.boxes
  }
}

pub struct Pipeline<E> {
  decoder: FrameDecoder,
  detector: Detector<E>,
  renderer: OverlayRenderer,
}

impl<E: InferenceEngine> Pipeline<E> {
  pub fn new(engine: E, config: &PipelineConfig) -> Result<Self, PipelineError> {
    let renderer = OverlayRenderer::from_config(config)?;
    let detector = Detector::new(engine, config)?;
    Ok(Self {
      decoder: FrameDecoder::new(),
      detector,
      renderer,
    })
  }

  pub fn detector(&self) -> &Detector<E> {
    &self.detector
  }

  pub fn renderer(&self) -> &OverlayRenderer {
    &self.renderer
  }

  /// 处理一帧；解码失败时跳过并返回 `Ok(None)`，推理失败时返回错误
  pub fn process(&self, frame: &RawFrame) -> Result<Option<DetectionOutput>, PipelineError> {
    let Some(original) = self.decoder.decode(frame) else {
      return Ok(None);
    };
    self.process_image(original).map(Some)
  }

  /// 对已解码的 RGB 图像执行检测与绘制
  pub fn process_image(&self, original: RgbImage) -> Result<DetectionOutput, PipelineError> {
    let result = self.detector.infer(&original)?;
    let rendered = self.renderer.render(&original, &result.boxes);
    debug!("流水线完成: {} 个目标", result.len());
    Ok(DetectionOutput {
      original,
      result,
      rendered,
    })
  }
}

impl<E: InferenceEngine> Model for Pipeline<E> {
  type Input = RawFrame;
  type Output = Option<DetectionOutput>;
  type Error = PipelineError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    self.process(input)
  }
}
