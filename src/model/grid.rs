// 该文件是 Wangjian （望见） 项目的一部分。
// src/model/grid.rs - 检测输出网格
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

/// 每个候选至少包含 x, y, w, h, confidence
pub const MIN_ATTRIBUTES: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
  #[error("输出形状必须为 5 维: {0:?}")]
  InvalidShape(Vec<usize>),
  #[error("候选属性数量不足: 期望至少 {MIN_ATTRIBUTES}, 实际 {0}")]
  TooFewAttributes(usize),
  #[error("输出数据长度不匹配: 形状 {shape:?} 需要 {expected}, 实际 {actual}")]
  LengthMismatch {
    shape: Vec<usize>,
    expected: usize,
    actual: usize,
  },
}

/// 形状为 `[batch][gridA][gridB][gridC][attrs]` 的扁平输出缓冲区
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionGrid {
  data: Vec<f32>,
  shape: [usize; 5],
}

impl DetectionGrid {
  pub fn new(shape: &[usize], data: Vec<f32>) -> Result<Self, GridError> {
    let shape = Self::check_shape(shape)?;
    let expected: usize = shape.iter().product();
    if data.len() != expected {
      return Err(GridError::LengthMismatch {
        shape: shape.to_vec(),
        expected,
        actual: data.len(),
      });
    }
    Ok(Self { data, shape })
  }

  /// 全零网格
  pub fn zeros(shape: &[usize]) -> Result<Self, GridError> {
    let shape = Self::check_shape(shape)?;
    let len = shape.iter().product();
    Ok(Self {
      data: vec![0.0; len],
      shape,
    })
  }

  /// 校验输出形状是否可以被解码
  pub fn check_shape(shape: &[usize]) -> Result<[usize; 5], GridError> {
    let shape: [usize; 5] = shape
      .try_into()
      .map_err(|_| GridError::InvalidShape(shape.to_vec()))?;
    if shape[4] < MIN_ATTRIBUTES {
      return Err(GridError::TooFewAttributes(shape[4]));
    }
    Ok(shape)
  }

  pub fn shape(&self) -> &[usize; 5] {
    &self.shape
  }

  pub fn attributes(&self) -> usize {
    self.shape[4]
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }

  fn offset(&self, batch: usize, a: usize, b: usize, c: usize, attr: usize) -> Option<usize> {
    let [nb, na, nbb, nc, nattr] = self.shape;
    if batch >= nb || a >= na || b >= nbb || c >= nc || attr >= nattr {
      return None;
    }
    Some((((batch * na + a) * nbb + b) * nc + c) * nattr + attr)
  }

  pub fn get(&self, batch: usize, a: usize, b: usize, c: usize, attr: usize) -> Option<f32> {
    self
      .offset(batch, a, b, c, attr)
      .map(|offset| self.data[offset])
  }

  pub fn set(&mut self, index: [usize; 4], values: &[f32]) -> Option<()> {
    let start = self.offset(index[0], index[1], index[2], index[3], 0)?;
    let len = values.len().min(self.attributes());
    self.data[start..start + len].copy_from_slice(&values[..len]);
    Some(())
  }

  /// 按 batch、gridA、gridB、gridC 顺序遍历每个候选的属性
  pub fn leaves(&self) -> impl Iterator<Item = &[f32]> {
    self.data.chunks_exact(self.attributes())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rejects_bad_shapes() {
    assert_eq!(
      DetectionGrid::zeros(&[1, 10, 10, 3]),
      Err(GridError::InvalidShape(vec![1, 10, 10, 3]))
    );
    assert_eq!(
      DetectionGrid::zeros(&[1, 10, 10, 3, 4]),
      Err(GridError::TooFewAttributes(4))
    );
    assert!(matches!(
      DetectionGrid::new(&[1, 1, 1, 1, 5], vec![0.0; 4]),
      Err(GridError::LengthMismatch { expected: 5, .. })
    ));
  }

  #[test]
  fn get_uses_row_major_offsets() {
    let data: Vec<f32> = (0..2 * 2 * 2 * 2 * 5).map(|v| v as f32).collect();
    let grid = DetectionGrid::new(&[2, 2, 2, 2, 5], data).unwrap();
    assert_eq!(grid.get(0, 0, 0, 0, 0), Some(0.0));
    assert_eq!(grid.get(0, 0, 0, 1, 0), Some(5.0));
    assert_eq!(grid.get(0, 0, 1, 0, 4), Some(14.0));
    assert_eq!(grid.get(1, 1, 1, 1, 4), Some(79.0));
    assert_eq!(grid.get(2, 0, 0, 0, 0), None);
    assert_eq!(grid.get(0, 0, 0, 0, 5), None);
  }

  #[test]
  fn leaves_follow_scan_order() {
    let mut grid = DetectionGrid::zeros(&[1, 2, 1, 2, 6]).unwrap();
    grid.set([0, 1, 0, 0], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let leaves: Vec<&[f32]> = grid.leaves().collect();
    assert_eq!(leaves.len(), 4);
    assert_eq!(leaves[2], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    assert!(grid.set([0, 2, 0, 0], &[0.0]).is_none());
  }
}
