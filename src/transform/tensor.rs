// 该文件是 Wangjian （望见） 项目的一部分。
// src/transform/tensor.rs - RGB 图像编码为归一化输入张量
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

use image::RgbImage;

use crate::config::{ConfigError, TensorLayout};

const RGB_CHANNELS: usize = 3;

/// 模型输入张量，取值范围 [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
  data: Vec<f32>,
  shape: [usize; 4],
  layout: TensorLayout,
}

impl InputTensor {
  pub fn data(&self) -> &[f32] {
    &self.data
  }

  pub fn shape(&self) -> &[usize; 4] {
    &self.shape
  }

  pub fn layout(&self) -> TensorLayout {
    self.layout
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn into_vec(self) -> Vec<f32> {
    self.data
  }

  /// 按平台字节序展开为字节流，供二进制推理后端直接拷贝
  pub fn to_ne_bytes(&self) -> Vec<u8> {
    self.data.iter().flat_map(|v| v.to_ne_bytes()).collect()
  }
}

/// 张量编码器
#[derive(Debug, Clone)]
pub struct TensorEncoder {
  shape: [usize; 4],
  layout: TensorLayout,
}

impl TensorEncoder {
  /// 根据推理引擎声明的输入形状创建编码器
  ///
  /// NHWC 形状为 `[1, H, W, 3]`，NCHW 形状为 `[1, 3, H, W]`。
  pub fn new(shape: &[usize], layout: TensorLayout) -> Result<Self, ConfigError> {
    let shape: [usize; 4] = shape
      .try_into()
      .map_err(|_| ConfigError::InvalidShape(shape.to_vec()))?;

    let channels = match layout {
      TensorLayout::Nhwc => shape[3],
      TensorLayout::Nchw => shape[1],
    };
    if shape[0] != 1 || channels != RGB_CHANNELS || shape.contains(&0) {
      return Err(ConfigError::InvalidShape(shape.to_vec()));
    }
    if shape[1..].iter().any(|&d| u32::try_from(d).is_err()) {
      return Err(ConfigError::InvalidShape(shape.to_vec()));
    }

    Ok(Self { shape, layout })
  }

  pub fn input_height(&self) -> u32 {
    match self.layout {
      TensorLayout::Nhwc => self.shape[1] as u32,
      TensorLayout::Nchw => self.shape[2] as u32,
    }
  }

  pub fn input_width(&self) -> u32 {
    match self.layout {
      TensorLayout::Nhwc => self.shape[2] as u32,
      TensorLayout::Nchw => self.shape[3] as u32,
    }
  }

  /// 期望的张量长度
  pub fn tensor_len(&self) -> usize {
    self.shape.iter().product()
  }

  pub fn encode(&self, image: &RgbImage) -> Result<InputTensor, ConfigError> {
    let expected = (self.input_width(), self.input_height());
    if image.dimensions() != expected {
      return Err(ConfigError::ImageSizeMismatch {
        expected,
        actual: image.dimensions(),
      });
    }

    let data = match self.layout {
      TensorLayout::Nhwc => image
        .as_raw()
        .iter()
        .map(|&byte| byte as f32 / 255.0)
        .collect::<Vec<_>>(),
      TensorLayout::Nchw => {
        let plane = (expected.0 * expected.1) as usize;
        let mut data = vec![0.0f32; plane * RGB_CHANNELS];
        for (idx, pixel) in image.pixels().enumerate() {
          for c in 0..RGB_CHANNELS {
            data[c * plane + idx] = pixel[c] as f32 / 255.0;
          }
        }
        data
      }
    };

    if data.len() != self.tensor_len() {
      return Err(ConfigError::LengthMismatch {
        expected: self.tensor_len(),
        actual: data.len(),
      });
    }

    Ok(InputTensor {
      data,
      shape: self.shape,
      layout: self.layout,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  #[test]
  fn rejects_unsupported_shapes() {
    assert!(TensorEncoder::new(&[1, 320, 320], TensorLayout::Nhwc).is_err());
    assert!(TensorEncoder::new(&[2, 320, 320, 3], TensorLayout::Nhwc).is_err());
    assert!(TensorEncoder::new(&[1, 320, 320, 4], TensorLayout::Nhwc).is_err());
    assert!(TensorEncoder::new(&[1, 0, 320, 3], TensorLayout::Nhwc).is_err());
    assert!(TensorEncoder::new(&[1, 320, 320, 3], TensorLayout::Nchw).is_err());
  }

  #[test]
  fn nhwc_is_interleaved_rgb_row_major() {
    let encoder = TensorEncoder::new(&[1, 2, 2, 3], TensorLayout::Nhwc).unwrap();
    let mut image = RgbImage::new(2, 2);
    image.put_pixel(1, 0, Rgb([255, 0, 51]));
    image.put_pixel(0, 1, Rgb([0, 255, 0]));

    let tensor = encoder.encode(&image).unwrap();
    assert_eq!(tensor.len(), 2 * 2 * 3);
    assert_eq!(&tensor.data()[3..6], &[1.0, 0.0, 0.2]);
    assert_eq!(&tensor.data()[6..9], &[0.0, 1.0, 0.0]);
  }

  #[test]
  fn nchw_is_planar() {
    let encoder = TensorEncoder::new(&[1, 3, 2, 2], TensorLayout::Nchw).unwrap();
    assert_eq!((encoder.input_width(), encoder.input_height()), (2, 2));
    let mut image = RgbImage::new(2, 2);
    image.put_pixel(1, 0, Rgb([255, 0, 255]));

    let tensor = encoder.encode(&image).unwrap();
    assert_eq!(tensor.data()[1], 1.0);
    assert_eq!(tensor.data()[4 + 1], 0.0);
    assert_eq!(tensor.data()[8 + 1], 1.0);
  }

  #[test]
  fn length_and_range_hold_for_square_input() {
    let encoder = TensorEncoder::new(&[1, 320, 320, 3], TensorLayout::Nhwc).unwrap();
    let image = RgbImage::from_fn(320, 320, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 255]));
    let tensor = encoder.encode(&image).unwrap();

    assert_eq!(tensor.len(), 320 * 320 * 3);
    assert!(tensor.data().iter().all(|v| (0.0..=1.0).contains(v)));
    assert_eq!(tensor.data()[0], 0.0);
    assert_eq!(tensor.data()[2], 1.0);
  }

  #[test]
  fn size_mismatch_is_a_configuration_error() {
    let encoder = TensorEncoder::new(&[1, 320, 320, 3], TensorLayout::Nhwc).unwrap();
    let image = RgbImage::new(640, 480);
    assert_eq!(
      encoder.encode(&image),
      Err(ConfigError::ImageSizeMismatch {
        expected: (320, 320),
        actual: (640, 480)
      })
    );
  }

  #[test]
  fn native_bytes_match_float_count() {
    let encoder = TensorEncoder::new(&[1, 1, 1, 3], TensorLayout::Nhwc).unwrap();
    let image = RgbImage::from_pixel(1, 1, Rgb([255, 0, 0]));
    let bytes = encoder.encode(&image).unwrap().to_ne_bytes();
    assert_eq!(bytes.len(), 12);
    assert_eq!(&bytes[..4], &1.0f32.to_ne_bytes());
  }
}
