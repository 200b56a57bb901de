// 该文件是 Wangjian （望见） 项目的一部分。
// src/frame.rs - 相机原始帧定义
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

use crate::config::ConfigError;

mod decode;
pub use self::decode::{DecodeError, FrameDecoder, nv21_to_rgb, pack_nv21};

/// 帧的顺时针旋转角度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
  #[default]
  Deg0,
  Deg90,
  Deg180,
  Deg270,
}

impl Rotation {
  pub fn degrees(&self) -> u32 {
    match self {
      Rotation::Deg0 => 0,
      Rotation::Deg90 => 90,
      Rotation::Deg180 => 180,
      Rotation::Deg270 => 270,
    }
  }

  /// 旋转后宽高是否互换
  pub fn swaps_axes(&self) -> bool {
    matches!(self, Rotation::Deg90 | Rotation::Deg270)
  }
}

impl TryFrom<u32> for Rotation {
  type Error = ConfigError;

  fn try_from(degrees: u32) -> Result<Self, Self::Error> {
    match degrees {
      0 => Ok(Rotation::Deg0),
      90 => Ok(Rotation::Deg90),
      180 => Ok(Rotation::Deg180),
      270 => Ok(Rotation::Deg270),
      other => Err(ConfigError::InvalidRotation(other)),
    }
  }
}

/// 单个图像平面，行跨度与像素跨度均以字节计
#[derive(Debug, Clone)]
pub struct Plane {
  data: Vec<u8>,
  row_stride: usize,
  pixel_stride: usize,
}

impl Plane {
  pub fn new(data: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
    Self {
      data,
      row_stride,
      pixel_stride,
    }
  }

  /// 紧密排列的平面（像素跨度为 1）
  pub fn packed(data: Vec<u8>, row_stride: usize) -> Self {
    Self::new(data, row_stride, 1)
  }

  pub fn data(&self) -> &[u8] {
    &self.data
  }

  pub fn row_stride(&self) -> usize {
    self.row_stride
  }

  pub fn pixel_stride(&self) -> usize {
    self.pixel_stride
  }

  pub(crate) fn sample(&self, x: usize, y: usize) -> Option<u8> {
    self
      .data
      .get(y * self.row_stride + x * self.pixel_stride)
      .copied()
  }
}

/// 相机采集的 YUV 4:2:0 原始帧
///
/// 平面顺序为 Y、U、V，与相机采集端约定一致。
#[derive(Debug, Clone)]
pub struct RawFrame {
  width: u32,
  height: u32,
  rotation: Rotation,
  planes: [Plane; 3],
}

impl RawFrame {
  pub fn new(width: u32, height: u32, rotation: Rotation, y: Plane, u: Plane, v: Plane) -> Self {
    Self {
      width,
      height,
      rotation,
      planes: [y, u, v],
    }
  }

  /// 由 I420 (YUV420P) 连续字节构造：Y 平面后接 U 平面、V 平面
  pub fn from_i420(width: u32, height: u32, rotation: Rotation, data: &[u8]) -> Self {
    let (w, h) = (width as usize, height as usize);
    let (cw, ch) = (w.div_ceil(2), h.div_ceil(2));
    let y_end = (w * h).min(data.len());
    let u_end = (y_end + cw * ch).min(data.len());
    let v_end = (u_end + cw * ch).min(data.len());

    Self::new(
      width,
      height,
      rotation,
      Plane::packed(data[..y_end].to_vec(), w),
      Plane::packed(data[y_end..u_end].to_vec(), cw),
      Plane::packed(data[u_end..v_end].to_vec(), cw),
    )
  }

  /// 由 NV21 连续字节构造
  ///
  /// U、V 平面以像素跨度 2 共享同一段交错的 VU 数据，
  /// 与相机 HAL 暴露半平面格式时的方式相同。
  pub fn from_nv21(width: u32, height: u32, rotation: Rotation, data: &[u8]) -> Self {
    let (w, h) = (width as usize, height as usize);
    let y_end = (w * h).min(data.len());
    let vu = &data[y_end..];
    let chroma_stride = w.div_ceil(2) * 2;

    let v = vu[..vu.len().saturating_sub(1)].to_vec();
    let u = vu.get(1..).map(|s| s.to_vec()).unwrap_or_default();

    Self::new(
      width,
      height,
      rotation,
      Plane::packed(data[..y_end].to_vec(), w),
      Plane::new(u, chroma_stride, 2),
      Plane::new(v, chroma_stride, 2),
    )
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn rotation(&self) -> Rotation {
    self.rotation
  }

  pub fn y_plane(&self) -> &Plane {
    &self.planes[0]
  }

  pub fn u_plane(&self) -> &Plane {
    &self.planes[1]
  }

  pub fn v_plane(&self) -> &Plane {
    &self.planes[2]
  }

  /// 解码并旋转后的输出尺寸
  pub fn output_dimensions(&self) -> (u32, u32) {
    if self.rotation.swaps_axes() {
      (self.height, self.width)
    } else {
      (self.width, self.height)
    }
  }
}
