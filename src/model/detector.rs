// 该文件是 Wangjian （望见） 项目的一部分。
// src/model/detector.rs - 单帧目标检测器
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

use std::sync::Mutex;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
  config::{ConfigError, PipelineConfig},
  model::{DetectResult, DetectionDecoder, DetectionGrid, GridError, InferenceEngine, Model},
  transform::{Letterbox, LetterboxError, TensorEncoder},
};

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("配置错误: {0}")]
  ConfigError(#[from] ConfigError),
  #[error("缩放填充错误: {0}")]
  LetterboxError(#[from] LetterboxError),
  #[error("推理引擎调用失败: {0}")]
  EngineError(Box<dyn std::error::Error + Send + Sync>),
  #[error("推理输出无效: {0}")]
  GridError(#[from] GridError),
  #[error("推理输出形状与声明不符: 期望 {expected:?}, 实际 {actual:?}")]
  OutputShapeMismatch {
    expected: Vec<usize>,
    actual: Vec<usize>,
  },
  #[error("推理引擎锁已损坏")]
  EnginePoisoned,
}

/// 目标检测器
///
/// 持有推理引擎的独占访问权，`infer` 可以在多个线程间共享调用，引擎调用本身串行执行。
pub struct Detector<E> {
  engine: Mutex<E>,
  output_shape: [usize; 5],
  letterbox: Letterbox,
  encoder: TensorEncoder,
  decoder: DetectionDecoder,
}

impl<E: InferenceEngine> Detector<E> {
  pub fn new(engine: E, config: &PipelineConfig) -> Result<Self, DetectorError> {
    config.validate()?;

    let input_shape = engine.input_shape().to_vec();
    let output_shape = DetectionGrid::check_shape(engine.output_shape())?;
    debug!("模型输入形状: {:?}", input_shape);
    debug!("模型输出形状: {:?}", output_shape);

    let encoder = TensorEncoder::new(&input_shape, config.layout)?;
    let padded = (encoder.input_width(), encoder.input_height());
    let letterbox = Letterbox::new(padded.0, padded.1, config.pad_color)?;
    let decoder = DetectionDecoder::new(config.confidence_threshold, padded)?;

    info!(
      "检测器就绪: 输入 {}x{}, 置信度阈值 {}",
      padded.0, padded.1, config.confidence_threshold
    );

    Ok(Self {
      engine: Mutex::new(engine),
      output_shape,
      letterbox,
      encoder,
      decoder,
    })
  }

  /// 模型输入的宽高，即填充后的画布尺寸
  pub fn input_size(&self) -> (u32, u32) {
    self.letterbox.target_size()
  }

  pub fn threshold(&self) -> f32 {
    self.decoder.threshold()
  }

  fn run_engine(&self, image: &RgbImage) -> Result<DetectionGrid, DetectorError> {
    let tensor = self.encoder.encode(image)?;
    let mut engine = self.engine.lock().map_err(|_| DetectorError::EnginePoisoned)?;
    let grid = engine.run(&tensor).map_err(|e| {
      error!("推理引擎调用失败: {}", e);
      DetectorError::EngineError(Box::new(e))
    })?;

    if grid.shape() != &self.output_shape {
      return Err(DetectorError::OutputShapeMismatch {
        expected: self.output_shape.to_vec(),
        actual: grid.shape().to_vec(),
      });
    }
    Ok(grid)
  }
}

impl<E: InferenceEngine> Model for Detector<E> {
  type Input = RgbImage;
  type Output = DetectResult;
  type Error = DetectorError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    let letterboxed = self.letterbox.apply(input)?;
    let grid = self.run_engine(&letterboxed.image)?;
    let boxes = self.decoder.decode(&grid, letterboxed.original_size);
    debug!("检测到 {} 个目标", boxes.len());
    Ok(DetectResult::from(boxes))
  }
}
