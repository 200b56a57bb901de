// 该文件是 Wangjian （望见） 项目的一部分。
// src/model/tflite.rs - TensorFlow Lite 推理引擎
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
  ffi::{CString, c_char, c_int, c_void},
  ptr,
};

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectionGrid, GridError, InferenceEngine},
  query_value,
  transform::InputTensor,
};

const DEFAULT_NUM_THREADS: c_int = 2;

#[repr(C)]
struct TfLiteModel {
  _private: [u8; 0],
}
#[repr(C)]
struct TfLiteInterpreterOptions {
  _private: [u8; 0],
}
#[repr(C)]
struct TfLiteInterpreter {
  _private: [u8; 0],
}
#[repr(C)]
struct TfLiteTensor {
  _private: [u8; 0],
}

#[link(name = "tensorflowlite_c")]
unsafe extern "C" {
  fn TfLiteModelCreateFromFile(model_path: *const c_char) -> *mut TfLiteModel;
  fn TfLiteModelDelete(model: *mut TfLiteModel);

  fn TfLiteInterpreterOptionsCreate() -> *mut TfLiteInterpreterOptions;
  fn TfLiteInterpreterOptionsDelete(options: *mut TfLiteInterpreterOptions);
  fn TfLiteInterpreterOptionsSetNumThreads(options: *mut TfLiteInterpreterOptions, num_threads: c_int);

  fn TfLiteInterpreterCreate(
    model: *const TfLiteModel,
    options: *const TfLiteInterpreterOptions,
  ) -> *mut TfLiteInterpreter;
  fn TfLiteInterpreterDelete(interpreter: *mut TfLiteInterpreter);

  fn TfLiteInterpreterAllocateTensors(interpreter: *mut TfLiteInterpreter) -> c_int;
  fn TfLiteInterpreterInvoke(interpreter: *mut TfLiteInterpreter) -> c_int;

  fn TfLiteInterpreterGetInputTensor(interpreter: *mut TfLiteInterpreter, index: c_int) -> *mut TfLiteTensor;
  fn TfLiteInterpreterGetOutputTensor(interpreter: *mut TfLiteInterpreter, index: c_int) -> *const TfLiteTensor;

  fn TfLiteTensorData(tensor: *const TfLiteTensor) -> *mut c_void;
  fn TfLiteTensorByteSize(tensor: *const TfLiteTensor) -> usize;
  fn TfLiteTensorNumDims(tensor: *const TfLiteTensor) -> c_int;
  fn TfLiteTensorDim(tensor: *const TfLiteTensor, dim_index: c_int) -> c_int;
}

#[derive(Error, Debug)]
pub enum TfliteError {
  #[error("模型路径无效: {0}")]
  InvalidPath(String),
  #[error("加载 TFLite 模型失败: {0}")]
  ModelLoadError(String),
  #[error("创建解释器失败")]
  InterpreterError,
  #[error("分配张量失败, 返回码 {0}")]
  AllocateError(c_int),
  #[error("推理调用失败, 返回码 {0}")]
  InvokeError(c_int),
  #[error("缺少张量: {0}")]
  MissingTensor(&'static str),
  #[error("张量字节数不匹配: 期望 {expected}, 实际 {actual}")]
  ByteSizeMismatch { expected: usize, actual: usize },
  #[error("线程数无效: {0}")]
  InvalidThreads(String),
  #[error("输出网格无效: {0}")]
  GridError(#[from] GridError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 基于 TFLite C API 的推理引擎，只使用第 0 个输入与第 0 个输出，数据类型为 f32
pub struct TfliteEngine {
  model: *mut TfLiteModel,
  options: *mut TfLiteInterpreterOptions,
  interpreter: *mut TfLiteInterpreter,
  input_shape: Vec<usize>,
  output_shape: Vec<usize>,
}

// 解释器只在持有 &mut self 时访问
unsafe impl Send for TfliteEngine {}

impl TfliteEngine {
  pub fn new(model_path: &str, num_threads: c_int) -> Result<Self, TfliteError> {
    info!("加载 TFLite 模型: {}", model_path);
    let cpath = CString::new(model_path).map_err(|_| TfliteError::InvalidPath(model_path.to_string()))?;

    let model = unsafe { TfLiteModelCreateFromFile(cpath.as_ptr()) };
    if model.is_null() {
      return Err(TfliteError::ModelLoadError(model_path.to_string()));
    }

    let options = unsafe { TfLiteInterpreterOptionsCreate() };
    if options.is_null() {
      unsafe { TfLiteModelDelete(model) };
      return Err(TfliteError::InterpreterError);
    }
    unsafe { TfLiteInterpreterOptionsSetNumThreads(options, num_threads) };

    let interpreter = unsafe { TfLiteInterpreterCreate(model, options) };
    // 之后的失败路径由 Drop 统一释放
    let mut engine = Self {
      model,
      options,
      interpreter,
      input_shape: Vec::new(),
      output_shape: Vec::new(),
    };
    if interpreter.is_null() {
      return Err(TfliteError::InterpreterError);
    }

    let rc = unsafe { TfLiteInterpreterAllocateTensors(interpreter) };
    if rc != 0 {
      return Err(TfliteError::AllocateError(rc));
    }

    engine.input_shape = tensor_dims(engine.input_tensor()?);
    engine.output_shape = tensor_dims(engine.output_tensor()?);
    debug!("TFLite 输入形状: {:?}", engine.input_shape);
    debug!("TFLite 输出形状: {:?}", engine.output_shape);
    info!("TFLite 模型加载完成");

    Ok(engine)
  }

  fn input_tensor(&self) -> Result<*mut TfLiteTensor, TfliteError> {
    let tensor = unsafe { TfLiteInterpreterGetInputTensor(self.interpreter, 0) };
    if tensor.is_null() {
      return Err(TfliteError::MissingTensor("input[0]"));
    }
    Ok(tensor)
  }

  fn output_tensor(&self) -> Result<*const TfLiteTensor, TfliteError> {
    let tensor = unsafe { TfLiteInterpreterGetOutputTensor(self.interpreter, 0) };
    if tensor.is_null() {
      return Err(TfliteError::MissingTensor("output[0]"));
    }
    Ok(tensor)
  }
}

fn tensor_dims(tensor: *const TfLiteTensor) -> Vec<usize> {
  unsafe {
    let nd = TfLiteTensorNumDims(tensor);
    (0..nd)
      .map(|i| TfLiteTensorDim(tensor, i).max(0) as usize)
      .collect()
  }
}

impl InferenceEngine for TfliteEngine {
  type Error = TfliteError;

  fn input_shape(&self) -> &[usize] {
    &self.input_shape
  }

  fn output_shape(&self) -> &[usize] {
    &self.output_shape
  }

  fn run(&mut self, input: &InputTensor) -> Result<DetectionGrid, Self::Error> {
    let in_tensor = self.input_tensor()?;
    let in_bytes = unsafe { TfLiteTensorByteSize(in_tensor) };
    let need = std::mem::size_of_val(input.data());
    if in_bytes != need {
      return Err(TfliteError::ByteSizeMismatch {
        expected: in_bytes,
        actual: need,
      });
    }
    let in_ptr = unsafe { TfLiteTensorData(in_tensor) as *mut f32 };
    if in_ptr.is_null() {
      return Err(TfliteError::MissingTensor("input[0] data"));
    }
    unsafe { ptr::copy_nonoverlapping(input.data().as_ptr(), in_ptr, input.len()) };

    let rc = unsafe { TfLiteInterpreterInvoke(self.interpreter) };
    if rc != 0 {
      return Err(TfliteError::InvokeError(rc));
    }

    let out_tensor = self.output_tensor()?;
    let out_ptr = unsafe { TfLiteTensorData(out_tensor) as *const f32 };
    if out_ptr.is_null() {
      return Err(TfliteError::MissingTensor("output[0] data"));
    }
    let out_len = unsafe { TfLiteTensorByteSize(out_tensor) } / std::mem::size_of::<f32>();
    let raw = unsafe { std::slice::from_raw_parts(out_ptr, out_len) };

    Ok(DetectionGrid::new(&self.output_shape, raw.to_vec())?)
  }
}

impl Drop for TfliteEngine {
  fn drop(&mut self) {
    unsafe {
      if !self.interpreter.is_null() {
        TfLiteInterpreterDelete(self.interpreter);
      }
      if !self.options.is_null() {
        TfLiteInterpreterOptionsDelete(self.options);
      }
      if !self.model.is_null() {
        TfLiteModelDelete(self.model);
      }
    }
  }
}

impl FromUrl for TfliteEngine {
  type Error = TfliteError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TfliteError::SchemeMismatch);
    }
    let threads = match query_value(url, "threads") {
      Some(s) => s.parse::<c_int>().map_err(|_| TfliteError::InvalidThreads(s))?,
      None => DEFAULT_NUM_THREADS,
    };
    Self::new(url.path(), threads)
  }
}

impl FromUrlWithScheme for TfliteEngine {
  const SCHEME: &'static str = "tflite";
}
