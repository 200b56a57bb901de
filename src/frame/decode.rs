// 该文件是 Wangjian （望见） 项目的一部分。
// src/frame/decode.rs - YUV 帧解码为 RGB 图像
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

use image::{ImageBuffer, Rgb, RgbImage, imageops};
use thiserror::Error;
use tracing::{debug, warn};

use super::{Plane, RawFrame, Rotation};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
  #[error("帧尺寸为零: {width}x{height}")]
  EmptyFrame { width: u32, height: u32 },
  #[error("{plane} 平面数据不足: 在 ({x}, {y}) 处越界")]
  ShortPlane {
    plane: &'static str,
    x: usize,
    y: usize,
  },
  #[error("NV21 缓冲区长度不匹配: 期望 {expected} 字节, 实际 {actual} 字节")]
  BufferSizeMismatch { expected: usize, actual: usize },
}

/// 将三个平面重新打包为 NV21 缓冲区
///
/// 布局为完整的 Y 平面，后接 1/4 分辨率的 V、U 交错数据。
/// 注意 V 在 U 之前，与相机给出的平面顺序相反。
pub fn pack_nv21(frame: &RawFrame) -> Result<Vec<u8>, DecodeError> {
  let (w, h) = (frame.width() as usize, frame.height() as usize);
  if w == 0 || h == 0 {
    return Err(DecodeError::EmptyFrame {
      width: frame.width(),
      height: frame.height(),
    });
  }
  let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
  let mut nv21 = Vec::with_capacity(w * h + 2 * cw * ch);

  copy_plane(&mut nv21, frame.y_plane(), "Y", w, h)?;

  for y in 0..ch {
    for x in 0..cw {
      let v = frame
        .v_plane()
        .sample(x, y)
        .ok_or(DecodeError::ShortPlane { plane: "V", x, y })?;
      let u = frame
        .u_plane()
        .sample(x, y)
        .ok_or(DecodeError::ShortPlane { plane: "U", x, y })?;
      nv21.push(v);
      nv21.push(u);
    }
  }

  Ok(nv21)
}

fn copy_plane(
  out: &mut Vec<u8>,
  plane: &Plane,
  name: &'static str,
  w: usize,
  h: usize,
) -> Result<(), DecodeError> {
  for y in 0..h {
    if plane.pixel_stride() == 1 {
      let start = y * plane.row_stride();
      let row = plane
        .data()
        .get(start..start + w)
        .ok_or(DecodeError::ShortPlane {
          plane: name,
          x: w - 1,
          y,
        })?;
      out.extend_from_slice(row);
    } else {
      for x in 0..w {
        out.push(
          plane
            .sample(x, y)
            .ok_or(DecodeError::ShortPlane { plane: name, x, y })?,
        );
      }
    }
  }
  Ok(())
}

/// NV21 缓冲区转 RGB 图像（BT.601 全范围，与 JFIF 解码一致）
pub fn nv21_to_rgb(nv21: &[u8], width: u32, height: u32) -> Result<RgbImage, DecodeError> {
  let (w, h) = (width as usize, height as usize);
  if w == 0 || h == 0 {
    return Err(DecodeError::EmptyFrame { width, height });
  }
  let cw = w.div_ceil(2);
  let expected = w * h + 2 * cw * h.div_ceil(2);
  if nv21.len() < expected {
    return Err(DecodeError::BufferSizeMismatch {
      expected,
      actual: nv21.len(),
    });
  }

  let (luma, chroma) = nv21.split_at(w * h);
  Ok(ImageBuffer::from_fn(width, height, |x, y| {
    let (x, y) = (x as usize, y as usize);
    let c = (y / 2) * cw * 2 + (x / 2) * 2;
    yuv_to_rgb(luma[y * w + x], chroma[c + 1], chroma[c])
  }))
}

// JFIF 系数，16 位定点
const CR_R: i32 = 91_881; // 1.402
const CB_G: i32 = 22_554; // 0.344136
const CR_G: i32 = 46_802; // 0.714136
const CB_B: i32 = 116_130; // 1.772
const ONE_HALF: i32 = 1 << 15;

fn yuv_to_rgb(y: u8, u: u8, v: u8) -> Rgb<u8> {
  let y = y as i32;
  let d = u as i32 - 128;
  let e = v as i32 - 128;

  let r = y + ((CR_R * e + ONE_HALF) >> 16);
  let g = y + ((-CB_G * d - CR_G * e + ONE_HALF) >> 16);
  let b = y + ((CB_B * d + ONE_HALF) >> 16);

  Rgb([
    r.clamp(0, 255) as u8,
    g.clamp(0, 255) as u8,
    b.clamp(0, 255) as u8,
  ])
}

fn rotate(image: RgbImage, rotation: Rotation) -> RgbImage {
  match rotation {
    Rotation::Deg0 => image,
    Rotation::Deg90 => imageops::rotate90(&image),
    Rotation::Deg180 => imageops::rotate180(&image),
    Rotation::Deg270 => imageops::rotate270(&image),
  }
}

/// 帧解码器：YUV 4:2:0 → NV21 → RGB → 顺时针旋转
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder;

impl FrameDecoder {
  pub fn new() -> Self {
    Self
  }

  pub fn try_decode(&self, frame: &RawFrame) -> Result<RgbImage, DecodeError> {
    let nv21 = pack_nv21(frame)?;
    let image = nv21_to_rgb(&nv21, frame.width(), frame.height())?;
    debug!(
      "帧解码完成: {}x{}, 旋转 {}°",
      frame.width(),
      frame.height(),
      frame.rotation().degrees()
    );
    Ok(rotate(image, frame.rotation()))
  }

  /// 解码失败时返回 `None`，调用方跳过该帧即可
  pub fn decode(&self, frame: &RawFrame) -> Option<RgbImage> {
    match self.try_decode(frame) {
      Ok(image) => Some(image),
      Err(e) => {
        warn!("YUV 帧解码失败，跳过该帧: {}", e);
        None
      }
    }
  }
}
