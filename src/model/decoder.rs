// 该文件是 Wangjian （望见） 项目的一部分。
// src/model/decoder.rs - 检测结果解码
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

use tracing::debug;

use crate::{
  config::ConfigError,
  model::{BoundingBox, DetectionGrid},
};

/// 将输出网格从填充后的模型坐标系映射回原图坐标系
#[derive(Debug, Clone)]
pub struct DetectionDecoder {
  threshold: f32,
  padded_width: u32,
  padded_height: u32,
}

impl DetectionDecoder {
  pub fn new(threshold: f32, padded: (u32, u32)) -> Result<Self, ConfigError> {
    let (padded_width, padded_height) = padded;
    if padded_width == 0 || padded_height == 0 {
      return Err(ConfigError::InvalidDimensions {
        width: padded_width,
        height: padded_height,
      });
    }
    if !threshold.is_finite() {
      return Err(ConfigError::InvalidThreshold(threshold));
    }
    Ok(Self {
      threshold,
      padded_width,
      padded_height,
    })
  }

  pub fn padded_size(&self) -> (u32, u32) {
    (self.padded_width, self.padded_height)
  }

  pub fn threshold(&self) -> f32 {
    self.threshold
  }

  /// 解码全部候选，按扫描顺序输出，不做去重
  pub fn decode(&self, grid: &DetectionGrid, original: (u32, u32)) -> Vec<BoundingBox> {
    let (original_width, original_height) = original;
    let padded_width = self.padded_width as f32;
    let padded_height = self.padded_height as f32;

    let scale_x = original_width as f32 / padded_width;
    let scale_y = original_height as f32 / padded_height;

    let center_x = (original_width / 2) as f32;
    let center_y = (original_height / 2) as f32;

    let mut boxes = Vec::new();
    for data in grid.leaves() {
      if !(data[4] > self.threshold) {
        continue;
      }

      // right / bottom 在已缩放的 left / top 上再次乘以缩放系数，保持与既有检测器一致
      let left = data[0] * padded_width * scale_x - center_x;
      let top = data[1] * padded_height * scale_y - center_y;
      let right = (left + data[2] * padded_width) * scale_x - center_x;
      let bottom = (top + data[3] * padded_height) * scale_y - center_y;

      let left = clip(left, center_x) + center_x;
      let top = clip(top, center_y) + center_y;
      let right = clip(right, center_x) + center_x;
      let bottom = clip(bottom, center_y) + center_y;

      debug!(
        "裁剪后边界框: left: {}, top: {}, right: {}, bottom: {}",
        left, top, right, bottom
      );

      boxes.push(BoundingBox {
        left: left.min(right),
        top: top.min(bottom),
        right: left.max(right),
        bottom: top.max(bottom),
        score: data[4],
      });
    }

    debug!("解码得到 {} 个边界框", boxes.len());
    boxes
  }
}

// NaN 落到下界
fn clip(value: f32, bound: f32) -> f32 {
  value.max(-bound).min(bound)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn grid_with(cells: &[([usize; 4], [f32; 5])]) -> DetectionGrid {
    let mut grid = DetectionGrid::zeros(&[1, 10, 10, 3, 5]).unwrap();
    for (index, values) in cells {
      grid.set(*index, values).unwrap();
    }
    grid
  }

  #[test]
  fn rejects_zero_padded_dimensions() {
    assert!(DetectionDecoder::new(0.5, (0, 320)).is_err());
    assert!(DetectionDecoder::new(0.5, (320, 0)).is_err());
    assert!(DetectionDecoder::new(f32::NAN, (320, 320)).is_err());
  }

  #[test]
  fn threshold_is_strict() {
    let decoder = DetectionDecoder::new(0.5, (320, 320)).unwrap();
    let at = grid_with(&[([0, 0, 0, 0], [0.5, 0.5, 0.1, 0.1, 0.5])]);
    assert!(decoder.decode(&at, (640, 480)).is_empty());

    let above = grid_with(&[([0, 0, 0, 0], [0.5, 0.5, 0.1, 0.1, 0.50001])]);
    assert_eq!(decoder.decode(&above, (640, 480)).len(), 1);
  }

  #[test]
  fn single_cell_follows_projection_formula() {
    let decoder = DetectionDecoder::new(0.5, (320, 320)).unwrap();
    let grid = grid_with(&[([0, 4, 7, 1], [0.5, 0.5, 0.1, 0.1, 0.9])]);
    let boxes = decoder.decode(&grid, (640, 480));
    assert_eq!(boxes.len(), 1);

    // scale = (2.0, 1.5), center = (320, 240)
    // left = 0, top = 0, right = (0 + 32) * 2 - 320 = -256, bottom = (0 + 32) * 1.5 - 240 = -192
    let b = boxes[0];
    assert_eq!((b.left, b.top, b.right, b.bottom), (64.0, 48.0, 320.0, 240.0));
    assert_eq!(b.score, 0.9);
  }

  #[test]
  fn coordinates_are_clipped_to_frame() {
    let decoder = DetectionDecoder::new(0.5, (320, 320)).unwrap();
    let grid = grid_with(&[
      ([0, 0, 0, 0], [2.0, 2.0, 5.0, 5.0, 0.9]),
      ([0, 0, 0, 1], [-3.0, -3.0, 0.1, 0.1, 0.9]),
      ([0, 0, 0, 2], [f32::NAN, 0.1, 0.1, 0.1, 0.9]),
    ]);
    let boxes = decoder.decode(&grid, (640, 480));
    assert_eq!(boxes.len(), 3);
    for b in &boxes {
      assert!((0.0..=640.0).contains(&b.left) && (0.0..=640.0).contains(&b.right));
      assert!((0.0..=480.0).contains(&b.top) && (0.0..=480.0).contains(&b.bottom));
      assert!(b.left <= b.right && b.top <= b.bottom);
    }
    assert_eq!(
      (boxes[0].left, boxes[0].top, boxes[0].right, boxes[0].bottom),
      (640.0, 480.0, 640.0, 480.0)
    );
  }

  #[test]
  fn keeps_scan_order_and_duplicates() {
    let decoder = DetectionDecoder::new(0.5, (320, 320)).unwrap();
    let cell = [0.25, 0.25, 0.2, 0.2, 0.8];
    let grid = grid_with(&[
      ([0, 9, 9, 2], [0.25, 0.25, 0.2, 0.2, 0.95]),
      ([0, 0, 0, 0], cell),
      ([0, 0, 0, 1], cell),
    ]);
    let boxes = decoder.decode(&grid, (640, 480));
    assert_eq!(boxes.len(), 3);
    assert_eq!(boxes[0], boxes[1]);
    assert_eq!(boxes[2].score, 0.95);
  }

  #[test]
  fn odd_dimensions_use_integer_centers() {
    let decoder = DetectionDecoder::new(0.5, (100, 100)).unwrap();
    let grid = grid_with(&[([0, 0, 0, 0], [1.0, 1.0, 0.0, 0.0, 0.9])]);
    let boxes = decoder.decode(&grid, (101, 51));
    // center = (50, 25)，上界被裁剪到 2 * center
    assert_eq!(boxes[0].right, 100.0);
    assert_eq!(boxes[0].bottom, 50.0);
  }
}
