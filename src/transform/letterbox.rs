// 该文件是 Wangjian （望见） 项目的一部分。
// src/transform/letterbox.rs - 保持宽高比的缩放与填充
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

use image::{Rgb, RgbImage, imageops, imageops::FilterType};
use thiserror::Error;
use tracing::debug;

use crate::config::ConfigError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LetterboxError {
  #[error("源图像尺寸为零: {0}x{1}")]
  EmptyImage(u32, u32),
}

/// 缩放填充结果
#[derive(Debug, Clone)]
pub struct LetterboxResult {
  /// 目标尺寸的画布
  pub image: RgbImage,
  /// 原图到画布的缩放比例
  pub scale: f32,
  /// 缩放内容在画布上的左上角偏移
  pub offset: (u32, u32),
  /// 缩放内容的尺寸
  pub scaled_size: (u32, u32),
  /// 原图尺寸
  pub original_size: (u32, u32),
}

impl LetterboxResult {
  pub fn padded_size(&self) -> (u32, u32) {
    self.image.dimensions()
  }
}

/// 计算缩放后的内容尺寸
///
/// 宽图按目标宽度适配，否则按目标高度适配；四舍五入取整。
/// 若按此规则会溢出另一条边（非正方形目标时可能发生），改为按另一条边适配。
pub fn fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
  let (src_w, src_h) = source;
  let (dst_w, dst_h) = target;
  let aspect = src_w as f32 / src_h as f32;

  let by_width = || (dst_w, (dst_w as f32 / aspect).round() as u32);
  let by_height = || ((dst_h as f32 * aspect).round() as u32, dst_h);

  let (w, h) = if aspect > 1.0 {
    let (w, h) = by_width();
    if h > dst_h { by_height() } else { (w, h) }
  } else {
    let (w, h) = by_height();
    if w > dst_w { by_width() } else { (w, h) }
  };

  (w.clamp(1, dst_w), h.clamp(1, dst_h))
}

/// 缩放填充变换器
#[derive(Debug, Clone)]
pub struct Letterbox {
  target_width: u32,
  target_height: u32,
  pad_color: Rgb<u8>,
  filter: FilterType,
}

impl Letterbox {
  pub fn new(target_width: u32, target_height: u32, pad_color: Rgb<u8>) -> Result<Self, ConfigError> {
    if target_width == 0 || target_height == 0 {
      return Err(ConfigError::InvalidDimensions {
        width: target_width,
        height: target_height,
      });
    }
    Ok(Self {
      target_width,
      target_height,
      pad_color,
      filter: FilterType::Triangle,
    })
  }

  pub fn with_filter(mut self, filter: FilterType) -> Self {
    self.filter = filter;
    self
  }

  pub fn target_size(&self) -> (u32, u32) {
    (self.target_width, self.target_height)
  }

  pub fn apply(&self, image: &RgbImage) -> Result<LetterboxResult, LetterboxError> {
    let (src_w, src_h) = image.dimensions();
    if src_w == 0 || src_h == 0 {
      return Err(LetterboxError::EmptyImage(src_w, src_h));
    }

    let (new_w, new_h) = fit_dimensions((src_w, src_h), self.target_size());
    let offset_x = (self.target_width - new_w) / 2;
    let offset_y = (self.target_height - new_h) / 2;

    let resized = imageops::resize(image, new_w, new_h, self.filter);
    let mut canvas = RgbImage::from_pixel(self.target_width, self.target_height, self.pad_color);
    imageops::replace(&mut canvas, &resized, offset_x as i64, offset_y as i64);

    let scale = if new_w == self.target_width {
      self.target_width as f32 / src_w as f32
    } else {
      self.target_height as f32 / src_h as f32
    };

    debug!(
      "缩放填充: {}x{} -> {}x{}, 偏移 ({}, {}), 画布 {}x{}",
      src_w, src_h, new_w, new_h, offset_x, offset_y, self.target_width, self.target_height
    );

    Ok(LetterboxResult {
      image: canvas,
      scale,
      offset: (offset_x, offset_y),
      scaled_size: (new_w, new_h),
      original_size: (src_w, src_h),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use proptest::prelude::*;

  const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

  #[test]
  fn rejects_zero_targets() {
    assert!(Letterbox::new(0, 320, BLACK).is_err());
    assert!(Letterbox::new(320, 0, BLACK).is_err());
  }

  #[test]
  fn wide_image_fits_width_and_centers_vertically() {
    let image = RgbImage::from_pixel(640, 480, Rgb([200, 100, 50]));
    let result = Letterbox::new(320, 320, BLACK).unwrap().apply(&image).unwrap();

    assert_eq!(result.padded_size(), (320, 320));
    assert_eq!(result.scaled_size, (320, 240));
    assert_eq!(result.offset, (0, 40));
    assert_eq!(result.scale, 0.5);
    assert_eq!(result.original_size, (640, 480));

    assert_eq!(result.image.get_pixel(160, 10), &BLACK);
    assert_eq!(result.image.get_pixel(160, 300), &BLACK);
    assert_eq!(result.image.get_pixel(160, 160), &Rgb([200, 100, 50]));
  }

  #[test]
  fn tall_image_fits_height_and_centers_horizontally() {
    let image = RgbImage::from_pixel(480, 640, Rgb([9, 9, 9]));
    let result = Letterbox::new(320, 320, BLACK).unwrap().apply(&image).unwrap();

    assert_eq!(result.scaled_size, (240, 320));
    assert_eq!(result.offset, (40, 0));
    assert_eq!(result.image.get_pixel(20, 160), &BLACK);
    assert_eq!(result.image.get_pixel(160, 160), &Rgb([9, 9, 9]));
  }

  #[test]
  fn odd_slack_lands_on_bottom_right() {
    // 100x33 -> 100 宽, 高度 33, 余量 67: 上 33, 下 34
    let image = RgbImage::from_pixel(100, 33, Rgb([255, 255, 255]));
    let result = Letterbox::new(100, 100, BLACK).unwrap().apply(&image).unwrap();
    assert_eq!(result.scaled_size, (100, 33));
    assert_eq!(result.offset, (0, 33));
    assert_eq!(result.image.get_pixel(50, 32), &BLACK);
    assert_eq!(result.image.get_pixel(50, 33), &Rgb([255, 255, 255]));
    assert_eq!(result.image.get_pixel(50, 65), &Rgb([255, 255, 255]));
    assert_eq!(result.image.get_pixel(50, 66), &BLACK);
  }

  #[test]
  fn square_image_fills_canvas() {
    let image = RgbImage::from_pixel(64, 64, Rgb([1, 2, 3]));
    let result = Letterbox::new(32, 32, BLACK).unwrap().apply(&image).unwrap();
    assert_eq!(result.scaled_size, (32, 32));
    assert_eq!(result.offset, (0, 0));
  }

  #[test]
  fn non_square_target_never_overflows() {
    assert_eq!(fit_dimensions((200, 100), (100, 20)), (40, 20));
    assert_eq!(fit_dimensions((100, 200), (20, 100)), (20, 40));
  }

  #[test]
  fn pad_color_is_configurable() {
    let gray = Rgb([114, 114, 114]);
    let image = RgbImage::from_pixel(40, 20, Rgb([0, 0, 0]));
    let result = Letterbox::new(40, 40, gray).unwrap().apply(&image).unwrap();
    assert_eq!(result.image.get_pixel(0, 0), &gray);
  }

  proptest! {
    #[test]
    fn fitted_content_preserves_aspect(
      src_w in 1u32..2000,
      src_h in 1u32..2000,
      dst_w in 1u32..1000,
      dst_h in 1u32..1000,
    ) {
      let (w, h) = fit_dimensions((src_w, src_h), (dst_w, dst_h));
      prop_assert!(w >= 1 && w <= dst_w);
      prop_assert!(h >= 1 && h <= dst_h);

      // 一条边贴满画布
      prop_assert!(w == dst_w || h == dst_h);

      // 宽高比误差不超过一个像素的取整误差
      let aspect = src_w as f64 / src_h as f64;
      if w == dst_w && h > 1 && h < dst_h {
        prop_assert!((w as f64 / aspect - h as f64).abs() <= 0.5 + 1e-3);
      }
      if h == dst_h && w > 1 && w < dst_w {
        prop_assert!((h as f64 * aspect - w as f64).abs() <= 0.5 + 1e-3);
      }
    }

    #[test]
    fn applied_content_is_centered(
      src_w in 1u32..48,
      src_h in 1u32..48,
      dst_w in 1u32..48,
      dst_h in 1u32..48,
    ) {
      let pad = Rgb([114, 114, 114]);
      let image = RgbImage::from_pixel(src_w, src_h, Rgb([255, 255, 255]));
      let result = Letterbox::new(dst_w, dst_h, pad).unwrap().apply(&image).unwrap();
      let (w, h) = result.scaled_size;

      prop_assert_eq!((w, h), fit_dimensions((src_w, src_h), (dst_w, dst_h)));
      prop_assert_eq!(result.image.dimensions(), (dst_w, dst_h));
      prop_assert_eq!(result.offset, ((dst_w - w) / 2, (dst_h - h) / 2));

      // 奇数余量落在右侧和下侧
      if w < dst_w {
        for y in 0..dst_h {
          prop_assert_eq!(result.image.get_pixel(dst_w - 1, y), &pad);
        }
      }
      if h < dst_h {
        for x in 0..dst_w {
          prop_assert_eq!(result.image.get_pixel(x, dst_h - 1), &pad);
        }
      }
      let (ox, oy) = result.offset;
      prop_assert_ne!(result.image.get_pixel(ox, oy), &pad);
      prop_assert_ne!(result.image.get_pixel(ox + w - 1, oy + h - 1), &pad);
    }
  }
}
