// 该文件是 Wangjian （望见） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_filled_rect_mut, rect::Rect};

use crate::{
  config::{ConfigError, DEFAULT_STROKE_COLOR, DEFAULT_STROKE_WIDTH, PipelineConfig},
  model::BoundingBox,
};

/// 边框绘制器，只绘制空心矩形，不绘制标签
#[derive(Debug, Clone)]
pub struct OverlayRenderer {
  stroke_width: f32,
  color: Rgb<u8>,
}

impl Default for OverlayRenderer {
  fn default() -> Self {
    Self {
      stroke_width: DEFAULT_STROKE_WIDTH,
      color: Rgb(DEFAULT_STROKE_COLOR),
    }
  }
}

impl OverlayRenderer {
  pub fn new(stroke_width: f32, color: Rgb<u8>) -> Result<Self, ConfigError> {
    if !stroke_width.is_finite() || stroke_width <= 0.0 {
      return Err(ConfigError::InvalidStrokeWidth(stroke_width));
    }
    Ok(Self {
      stroke_width,
      color,
    })
  }

  pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
    Self::new(config.stroke_width, config.stroke_color)
  }

  pub fn stroke_width(&self) -> f32 {
    self.stroke_width
  }

  pub fn color(&self) -> Rgb<u8> {
    self.color
  }

  /// 在原图副本上按顺序绘制全部边框
  pub fn render(&self, image: &RgbImage, boxes: &[BoundingBox]) -> RgbImage {
    let mut canvas = image.clone();
    for bbox in boxes {
      self.draw_box(&mut canvas, bbox);
    }
    canvas
  }

  // 线条以边为中心，内外各占一半
  fn draw_box(&self, canvas: &mut RgbImage, bbox: &BoundingBox) {
    let half = self.stroke_width / 2.0;
    let (l, t, r, b) = (bbox.left, bbox.top, bbox.right, bbox.bottom);

    // 上、下
    self.fill(canvas, l - half, t - half, r + half, t + half);
    self.fill(canvas, l - half, b - half, r + half, b + half);
    // 左、右
    self.fill(canvas, l - half, t - half, l + half, b + half);
    self.fill(canvas, r - half, t - half, r + half, b + half);
  }

  fn fill(&self, canvas: &mut RgbImage, x0: f32, y0: f32, x1: f32, y1: f32) {
    let (x0, y0) = (x0.round() as i32, y0.round() as i32);
    let (x1, y1) = (x1.round() as i32, y1.round() as i32);
    if x1 <= x0 || y1 <= y0 {
      return;
    }
    let rect = Rect::at(x0, y0).of_size((x1 - x0) as u32, (y1 - y0) as u32);
    draw_filled_rect_mut(canvas, rect, self.color);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const RED: Rgb<u8> = Rgb([255, 0, 0]);
  const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

  fn bbox(left: f32, top: f32, right: f32, bottom: f32) -> BoundingBox {
    BoundingBox {
      left,
      top,
      right,
      bottom,
      score: 0.9,
    }
  }

  #[test]
  fn empty_box_list_is_identity() {
    let image = RgbImage::from_fn(32, 24, |x, y| Rgb([x as u8, y as u8, 7]));
    let rendered = OverlayRenderer::default().render(&image, &[]);
    assert_eq!(rendered, image);
  }

  #[test]
  fn stroke_is_centered_on_edges() {
    let image = RgbImage::new(100, 100);
    let rendered = OverlayRenderer::default().render(&image, &[bbox(20.0, 20.0, 60.0, 60.0)]);

    assert_eq!(rendered.get_pixel(16, 40), &RED);
    assert_eq!(rendered.get_pixel(23, 40), &RED);
    assert_eq!(rendered.get_pixel(15, 40), &BLACK);
    assert_eq!(rendered.get_pixel(24, 40), &BLACK);
    assert_eq!(rendered.get_pixel(63, 40), &RED);
    assert_eq!(rendered.get_pixel(64, 40), &BLACK);
    assert_eq!(rendered.get_pixel(40, 16), &RED);
    assert_eq!(rendered.get_pixel(40, 40), &BLACK);

    // 原图保持不变
    assert!(image.pixels().all(|p| *p == BLACK));
  }

  #[test]
  fn boxes_touching_the_border_are_clipped() {
    let image = RgbImage::new(50, 40);
    let rendered = OverlayRenderer::default().render(&image, &[bbox(0.0, 0.0, 50.0, 40.0)]);
    assert_eq!(rendered.dimensions(), (50, 40));
    assert_eq!(rendered.get_pixel(0, 20), &RED);
    assert_eq!(rendered.get_pixel(49, 20), &RED);
    assert_eq!(rendered.get_pixel(25, 20), &BLACK);
  }

  #[test]
  fn zero_area_box_still_draws_a_mark() {
    let image = RgbImage::new(40, 40);
    let rendered = OverlayRenderer::default().render(&image, &[bbox(20.0, 20.0, 20.0, 20.0)]);
    assert_eq!(rendered.get_pixel(20, 20), &RED);
    assert_eq!(rendered.get_pixel(10, 10), &BLACK);
  }

  #[test]
  fn stroke_width_and_color_are_configurable() {
    assert!(OverlayRenderer::new(0.0, RED).is_err());
    let green = Rgb([0, 255, 0]);
    let renderer = OverlayRenderer::new(2.0, green).unwrap();
    let rendered = renderer.render(&RgbImage::new(30, 30), &[bbox(10.0, 10.0, 20.0, 20.0)]);
    assert_eq!(rendered.get_pixel(9, 15), &green);
    assert_eq!(rendered.get_pixel(10, 15), &green);
    assert_eq!(rendered.get_pixel(8, 15), &BLACK);
    assert_eq!(rendered.get_pixel(11, 15), &BLACK);
  }
}
