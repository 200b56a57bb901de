// 该文件是 Wangjian （望见） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::Args;

use crate::config::{ConfigError, PipelineConfig, TensorLayout, parse_color};

/// 流水线参数，各个可执行程序共用
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
  /// 置信度阈值（严格大于才接受）
  #[arg(long, default_value_t = 0.5, value_name = "THRESHOLD")]
  pub confidence: f32,
  /// 边框线宽
  #[arg(long, default_value_t = 8.0, value_name = "WIDTH")]
  pub stroke_width: f32,
  /// 边框颜色
  #[arg(long, default_value = "#ff0000", value_name = "COLOR")]
  pub stroke_color: String,
  /// 填充颜色
  #[arg(long, default_value = "#000000", value_name = "COLOR")]
  pub pad_color: String,
  /// 输入张量布局: nhwc / nchw
  #[arg(long, default_value = "nhwc", value_name = "LAYOUT")]
  pub layout: String,
}

impl PipelineArgs {
  /// 构造并校验流水线配置
  pub fn to_config(&self) -> Result<PipelineConfig, ConfigError> {
    let config = PipelineConfig::default()
      .with_confidence_threshold(self.confidence)
      .with_stroke_width(self.stroke_width)
      .with_stroke_color(parse_color(&self.stroke_color)?)
      .with_pad_color(parse_color(&self.pad_color)?)
      .with_layout(self.layout.parse::<TensorLayout>()?);
    config.validate()?;
    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;
  use image::Rgb;

  #[derive(Parser, Debug)]
  struct Cli {
    #[command(flatten)]
    pipeline: PipelineArgs,
  }

  fn config(args: &[&str]) -> Result<PipelineConfig, ConfigError> {
    let cli = Cli::try_parse_from(std::iter::once("wangjian").chain(args.iter().copied())).unwrap();
    cli.pipeline.to_config()
  }

  #[test]
  fn defaults_match_pipeline_defaults() {
    assert_eq!(config(&[]).unwrap(), PipelineConfig::default());
  }

  #[test]
  fn flags_reach_config() {
    let config = config(&[
      "--confidence",
      "0.7",
      "--stroke-width",
      "3",
      "--stroke-color",
      "00ff00",
      "--pad-color",
      "#727272",
      "--layout",
      "nchw",
    ])
    .unwrap();
    assert_eq!(config.confidence_threshold, 0.7);
    assert_eq!(config.stroke_width, 3.0);
    assert_eq!(config.stroke_color, Rgb([0, 255, 0]));
    assert_eq!(config.pad_color, Rgb([114, 114, 114]));
    assert_eq!(config.layout, TensorLayout::Nchw);
  }

  #[test]
  fn invalid_values_are_rejected() {
    assert!(config(&["--confidence", "1.5"]).is_err());
    assert!(config(&["--stroke-color", "red"]).is_err());
    assert!(config(&["--layout", "chw"]).is_err());
  }
}
