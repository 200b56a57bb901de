// 该文件是 Wangjian （望见） 项目的一部分。
// src/model.rs - 模型与推理引擎
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, transform::InputTensor};

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 推理引擎能力接口
///
/// 输入形状约定为 `[batch, height, width, channels]`，
/// 输出形状约定为 `[batch, gridA, gridB, gridC, attrs]`，其中 `attrs[0..5] = x, y, w, h, confidence`。
pub trait InferenceEngine {
  type Error: std::error::Error + Send + Sync + 'static;

  fn input_shape(&self) -> &[usize];
  fn output_shape(&self) -> &[usize];
  fn run(&mut self, input: &InputTensor) -> Result<DetectionGrid, Self::Error>;
}

/// 原图像素坐标系下的边界框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub left: f32,
  pub top: f32,
  pub right: f32,
  pub bottom: f32,
  pub score: f32,
}

impl BoundingBox {
  pub fn width(&self) -> f32 {
    self.right - self.left
  }

  pub fn height(&self) -> f32 {
    self.bottom - self.top
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub boxes: Box<[BoundingBox]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.boxes.is_empty()
  }

  pub fn len(&self) -> usize {
    self.boxes.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, BoundingBox> {
    self.boxes.iter()
  }
}

impl From<Vec<BoundingBox>> for DetectResult {
  fn from(boxes: Vec<BoundingBox>) -> Self {
    Self {
      boxes: boxes.into_boxed_slice(),
    }
  }
}

mod decoder;
mod detector;
mod grid;
pub use self::decoder::DetectionDecoder;
pub use self::detector::{Detector, DetectorError};
pub use self::grid::{DetectionGrid, GridError, MIN_ATTRIBUTES};

#[cfg(feature = "engine_replay")]
mod replay;
#[cfg(feature = "engine_replay")]
pub use self::replay::{ReplayEngine, ReplayEngineError};

#[cfg(feature = "engine_tflite")]
mod tflite;
#[cfg(feature = "engine_tflite")]
pub use self::tflite::{TfliteEngine, TfliteError};

#[derive(Error, Debug)]
pub enum EngineError {
  #[cfg(feature = "engine_replay")]
  #[error("回放引擎错误: {0}")]
  ReplayEngineError(#[from] ReplayEngineError),
  #[cfg(feature = "engine_tflite")]
  #[error("TFLite 引擎错误: {0}")]
  TfliteError(#[from] TfliteError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum EngineWrapper {
  #[cfg(feature = "engine_replay")]
  Replay(ReplayEngine),
  #[cfg(feature = "engine_tflite")]
  Tflite(TfliteEngine),
}

impl FromUrl for EngineWrapper {
  type Error = EngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "engine_replay")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == ReplayEngine::SCHEME {
        return Ok(EngineWrapper::Replay(ReplayEngine::from_url(url)?));
      }
    }
    #[cfg(feature = "engine_tflite")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == TfliteEngine::SCHEME {
        return Ok(EngineWrapper::Tflite(TfliteEngine::from_url(url)?));
      }
    }
    Err(EngineError::SchemeMismatch)
  }
}

impl InferenceEngine for EngineWrapper {
  type Error = EngineError;

  fn input_shape(&self) -> &[usize] {
    match self {
      #[cfg(feature = "engine_replay")]
      EngineWrapper::Replay(engine) => engine.input_shape(),
      #[cfg(feature = "engine_tflite")]
      EngineWrapper::Tflite(engine) => engine.input_shape(),
    }
  }

  fn output_shape(&self) -> &[usize] {
    match self {
      #[cfg(feature = "engine_replay")]
      EngineWrapper::Replay(engine) => engine.output_shape(),
      #[cfg(feature = "engine_tflite")]
      EngineWrapper::Tflite(engine) => engine.output_shape(),
    }
  }

  fn run(&mut self, input: &InputTensor) -> Result<DetectionGrid, Self::Error> {
    match self {
      #[cfg(feature = "engine_replay")]
      EngineWrapper::Replay(engine) => engine.run(input).map_err(EngineError::from),
      #[cfg(feature = "engine_tflite")]
      EngineWrapper::Tflite(engine) => engine.run(input).map_err(EngineError::from),
    }
  }
}
