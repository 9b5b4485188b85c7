// 该文件是 Chepai （车牌） 项目的一部分。
// src/frame.rs - NHWC 模型输入帧定义
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

use image::{RgbImage, imageops};

use crate::geometry::MODEL_INPUT_SIZE;

const RGB_CHANNELS: usize = 3;

pub trait AsNhwcFrame {
  fn as_nhwc(&self) -> &[u8];
}

/// 检测模型使用的输入帧
pub type ModelInputFrame = RgbNhwcFrame<MODEL_INPUT_SIZE, MODEL_INPUT_SIZE>;

#[derive(Debug, Clone)]
pub struct RgbNhwcFrame<const W: u32, const H: u32> {
  data: Box<[u8]>,
}

impl<const W: u32, const H: u32> From<Vec<u8>> for RgbNhwcFrame<W, H> {
  fn from(data: Vec<u8>) -> Self {
    if data.len() != (RGB_CHANNELS * W as usize * H as usize) {
      panic!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        RGB_CHANNELS * W as usize * H as usize,
        data.len()
      );
    }

    Self {
      data: data.into_boxed_slice(),
    }
  }
}

impl<const W: u32, const H: u32> RgbNhwcFrame<W, H> {
  /// 将任意尺寸的原图双线性缩放（不保持比例）到 W×H
  pub fn from_image(image: &RgbImage) -> Self {
    let resized = if image.dimensions() == (W, H) {
      image.clone()
    } else {
      imageops::resize(image, W, H, imageops::FilterType::Triangle)
    };
    Self::from(resized.into_raw())
  }

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  /// 归一化到 [0, 1] 的 NCHW 浮点数据
  pub fn to_nchw_f32(&self) -> Vec<f32> {
    let plane = W as usize * H as usize;
    let mut out = vec![0f32; RGB_CHANNELS * plane];
    for (idx, pixel) in self.data.chunks_exact(RGB_CHANNELS).enumerate() {
      for c in 0..RGB_CHANNELS {
        out[c * plane + idx] = pixel[c] as f32 / 255.0;
      }
    }
    out
  }
}

impl<const W: u32, const H: u32> AsNhwcFrame for RgbNhwcFrame<W, H> {
  fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}
