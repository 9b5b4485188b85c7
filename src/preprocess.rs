// 该文件是 Chepai （车牌） 项目的一部分。
// src/preprocess.rs - 文字识别前的车牌图像预处理
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

use clap::ValueEnum;
use image::{DynamicImage, GrayImage, RgbImage, imageops};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};
use imageproc::filter::bilateral::{GaussianEuclideanColorDistance, bilateral_filter};
use tracing::debug;

// 双边滤波参数
const BILATERAL_DIAMETER: u32 = 11;
const BILATERAL_SIGMA_COLOR: f32 = 17.0;
const BILATERAL_SIGMA_SPACE: f32 = 17.0;

/// 送入文字识别前对裁剪图像的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PreprocessMode {
  /// 原始彩色裁剪图
  Raw,
  /// 灰度 + 双边滤波 + Otsu 二值化
  #[default]
  Binarize,
}

impl PreprocessMode {
  pub fn apply(&self, crop: &RgbImage) -> DynamicImage {
    match self {
      PreprocessMode::Raw => DynamicImage::ImageRgb8(crop.clone()),
      PreprocessMode::Binarize => DynamicImage::ImageLuma8(binarize_plate(crop)),
    }
  }
}

/// 灰度化、去噪并二值化车牌图像，输出只含 0 与 255
pub fn binarize_plate(crop: &RgbImage) -> GrayImage {
  let gray = imageops::grayscale(crop);
  // 空图像会使滤波器 panic
  if gray.width() == 0 || gray.height() == 0 {
    return gray;
  }
  let smoothed = bilateral_filter(
    &gray,
    (BILATERAL_DIAMETER / 2) as u8,
    BILATERAL_SIGMA_SPACE,
    GaussianEuclideanColorDistance::new(BILATERAL_SIGMA_COLOR),
  );
  let level = otsu_level(&smoothed);
  debug!("Otsu 阈值: {}", level);
  threshold(&smoothed, level, ThresholdType::Binary)
}
