// 该文件是 Wangjian （望见） 项目的一部分。
// src/input.rs - 原始帧输入
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

use crate::{FromUrl, frame::RawFrame};

#[cfg(feature = "read_yuv_file")]
mod read_yuv_file;
#[cfg(feature = "read_yuv_file")]
pub use self::read_yuv_file::{YuvFileInput, YuvFileInputError, YuvFormat};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_yuv_file")]
  #[error("YUV 文件输入错误: {0}")]
  YuvFileInputError(#[from] YuvFileInputError),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub enum InputWrapper {
  #[cfg(feature = "read_yuv_file")]
  ReadYuvFile(YuvFileInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_yuv_file")]
    {
      use crate::FromUrlWithScheme;

      if url.scheme() == YuvFileInput::SCHEME {
        let input = YuvFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadYuvFile(input));
      }
    }
    Err(InputError::SchemeMismatch)
  }
}

impl Iterator for InputWrapper {
  type Item = RawFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "read_yuv_file")]
      InputWrapper::ReadYuvFile(input) => input.next(),
    }
  }
}
