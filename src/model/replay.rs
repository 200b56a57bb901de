// 该文件是 Wangjian （望见） 项目的一部分。
// src/model/replay.rs - 回放推理引擎
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

//! 从 JSON 文件读取预先录制的检测输出，每次推理都返回同一个网格。
//!
//! 文件内容可以是 5 层嵌套的数值数组，也可以是
//! `{"input_shape": [1, 320, 320, 3], "output": [[[[[...]]]]]}` 形式的对象。

use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{DetectionGrid, GridError, InferenceEngine},
  query_value,
  transform::InputTensor,
};

#[derive(Error, Debug)]
pub enum ReplayEngineError {
  #[error("读取回放文件失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("解析回放文件失败: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("回放数据格式无效: {0}")]
  InvalidFormat(String),
  #[error("回放网格无效: {0}")]
  GridError(#[from] GridError),
  #[error("缺少输入形状")]
  MissingInputShape,
  #[error("输入形状无效: {0}")]
  InvalidInputShape(String),
  #[error("输入张量长度不匹配: 期望 {expected}, 实际 {actual}")]
  InputLengthMismatch { expected: usize, actual: usize },
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub struct ReplayEngine {
  input_shape: Vec<usize>,
  grid: DetectionGrid,
}

impl ReplayEngine {
  pub fn new(input_shape: Vec<usize>, grid: DetectionGrid) -> Self {
    Self { input_shape, grid }
  }

  pub fn from_json_str(json: &str, input_shape: Option<Vec<usize>>) -> Result<Self, ReplayEngineError> {
    let value: Value = serde_json::from_str(json)?;
    let (declared, output) = match value {
      Value::Object(mut map) => {
        let declared = match map.remove("input_shape") {
          Some(shape) => Some(serde_json::from_value::<Vec<usize>>(shape)?),
          None => None,
        };
        let output = map
          .remove("output")
          .ok_or_else(|| ReplayEngineError::InvalidFormat("缺少 output 字段".to_string()))?;
        (declared, output)
      }
      other => (None, other),
    };

    let input_shape = input_shape
      .or(declared)
      .ok_or(ReplayEngineError::MissingInputShape)?;

    let mut shape = Vec::new();
    let mut data = Vec::new();
    flatten(&output, 0, &mut shape, &mut data)?;
    let grid = DetectionGrid::new(&shape, data)?;
    debug!("回放网格形状: {:?}", grid.shape());

    Ok(Self { input_shape, grid })
  }

  pub fn load<P: AsRef<Path>>(path: P, input_shape: Option<Vec<usize>>) -> Result<Self, ReplayEngineError> {
    let path = path.as_ref();
    info!("加载回放文件: {}", path.display());
    let json = std::fs::read_to_string(path)?;
    Self::from_json_str(&json, input_shape)
  }
}

/// 递归展开嵌套数组，同时记录并校验每一层的长度
fn flatten(
  value: &Value,
  depth: usize,
  shape: &mut Vec<usize>,
  data: &mut Vec<f32>,
) -> Result<(), ReplayEngineError> {
  match value {
    Value::Array(items) => {
      if shape.len() == depth {
        shape.push(items.len());
      } else if shape.len() < depth || shape[depth] != items.len() {
        return Err(ReplayEngineError::InvalidFormat(format!(
          "第 {} 层长度不一致",
          depth
        )));
      }
      for item in items {
        flatten(item, depth + 1, shape, data)?;
      }
      Ok(())
    }
    Value::Number(n) => {
      if shape.len() != depth {
        return Err(ReplayEngineError::InvalidFormat(format!(
          "数值出现在第 {} 层",
          depth
        )));
      }
      let v = n
        .as_f64()
        .ok_or_else(|| ReplayEngineError::InvalidFormat(n.to_string()))?;
      data.push(v as f32);
      Ok(())
    }
    other => Err(ReplayEngineError::InvalidFormat(format!(
      "不支持的元素: {}",
      other
    ))),
  }
}

fn parse_shape(s: &str) -> Result<Vec<usize>, ReplayEngineError> {
  s.split(',')
    .map(|d| d.trim().parse::<usize>())
    .collect::<Result<Vec<_>, _>>()
    .map_err(|_| ReplayEngineError::InvalidInputShape(s.to_string()))
}

impl InferenceEngine for ReplayEngine {
  type Error = ReplayEngineError;

  fn input_shape(&self) -> &[usize] {
    &self.input_shape
  }

  fn output_shape(&self) -> &[usize] {
    self.grid.shape()
  }

  fn run(&mut self, input: &InputTensor) -> Result<DetectionGrid, Self::Error> {
    let expected: usize = self.input_shape.iter().product();
    if input.len() != expected {
      return Err(ReplayEngineError::InputLengthMismatch {
        expected,
        actual: input.len(),
      });
    }
    Ok(self.grid.clone())
  }
}

impl FromUrl for ReplayEngine {
  type Error = ReplayEngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayEngineError::SchemeMismatch);
    }
    let input_shape = query_value(url, "input")
      .map(|s| parse_shape(&s))
      .transpose()?;
    Self::load(url.path(), input_shape)
  }
}

impl FromUrlWithScheme for ReplayEngine {
  const SCHEME: &'static str = "replay";
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{config::TensorLayout, transform::TensorEncoder};
  use image::RgbImage;
  use std::io::Write;

  fn nested(a: usize, b: usize, c: usize, hit: Option<[usize; 3]>) -> Value {
    let cells: Vec<Value> = (0..a)
      .map(|i| {
        Value::Array(
          (0..b)
            .map(|j| {
              Value::Array(
                (0..c)
                  .map(|k| {
                    let conf = if hit == Some([i, j, k]) { 0.9 } else { 0.0 };
                    serde_json::json!([0.5, 0.5, 0.1, 0.1, conf])
                  })
                  .collect(),
              )
            })
            .collect(),
        )
      })
      .collect();
    Value::Array(vec![Value::Array(cells)])
  }

  #[test]
  fn parses_bare_nested_array() {
    let json = nested(2, 3, 1, Some([1, 2, 0])).to_string();
    let engine = ReplayEngine::from_json_str(&json, Some(vec![1, 4, 4, 3])).unwrap();
    assert_eq!(engine.output_shape(), &[1, 2, 3, 1, 5]);
    assert_eq!(engine.grid.get(0, 1, 2, 0, 4), Some(0.9));
  }

  #[test]
  fn parses_object_with_declared_input() {
    let json = serde_json::json!({
      "input_shape": [1, 8, 8, 3],
      "output": nested(1, 1, 2, None),
    })
    .to_string();
    let engine = ReplayEngine::from_json_str(&json, None).unwrap();
    assert_eq!(engine.input_shape(), &[1, 8, 8, 3]);
  }

  #[test]
  fn rejects_ragged_and_shallow_grids() {
    let ragged = "[[[[[0,0,0,0,0]],[[0,0,0,0]]]]]";
    assert!(matches!(
      ReplayEngine::from_json_str(ragged, Some(vec![1, 1, 1, 3])),
      Err(ReplayEngineError::InvalidFormat(_))
    ));

    let shallow = "[[[[0,0,0,0,0]]]]";
    assert!(matches!(
      ReplayEngine::from_json_str(shallow, Some(vec![1, 1, 1, 3])),
      Err(ReplayEngineError::GridError(GridError::InvalidShape(_)))
    ));

    let missing = "[[[[[0,0,0,0,0]]]]]";
    assert!(matches!(
      ReplayEngine::from_json_str(missing, None),
      Err(ReplayEngineError::MissingInputShape)
    ));
  }

  #[test]
  fn run_checks_input_length() {
    let json = nested(1, 1, 1, None).to_string();
    let mut engine = ReplayEngine::from_json_str(&json, Some(vec![1, 4, 4, 3])).unwrap();

    let good = TensorEncoder::new(&[1, 4, 4, 3], TensorLayout::Nhwc)
      .unwrap()
      .encode(&RgbImage::new(4, 4))
      .unwrap();
    assert!(engine.run(&good).is_ok());

    let bad = TensorEncoder::new(&[1, 2, 2, 3], TensorLayout::Nhwc)
      .unwrap()
      .encode(&RgbImage::new(2, 2))
      .unwrap();
    assert!(matches!(
      engine.run(&bad),
      Err(ReplayEngineError::InputLengthMismatch { expected: 48, actual: 12 })
    ));
  }

  #[test]
  fn loads_from_url() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file
      .write_all(nested(1, 1, 1, None).to_string().as_bytes())
      .unwrap();
    let url = Url::parse(&format!(
      "replay://{}?input=1,32,32,3",
      file.path().display()
    ))
    .unwrap();
    let engine = ReplayEngine::from_url(&url).unwrap();
    assert_eq!(engine.input_shape(), &[1, 32, 32, 3]);

    let wrong = Url::parse("tflite:///model.tflite").unwrap();
    assert!(matches!(
      ReplayEngine::from_url(&wrong),
      Err(ReplayEngineError::SchemeMismatch)
    ));
  }
}
