// 该文件是 Chepai （车牌） 项目的一部分。
// src/geometry.rs - 检测框坐标换算
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

use serde::Serialize;

/// 检测模型的固定输入边长
pub const MODEL_INPUT_SIZE: u32 = 640;

/// 原图像素坐标下的车牌框 `[x1, y1, x2, y2]`（右下角不含）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "[u32; 4]")]
pub struct PlateBox {
  pub x1: u32,
  pub y1: u32,
  pub x2: u32,
  pub y2: u32,
}

impl From<PlateBox> for [u32; 4] {
  fn from(b: PlateBox) -> Self {
    [b.x1, b.y1, b.x2, b.y2]
  }
}

impl PlateBox {
  pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 将模型输入空间（640×640）中的框映射回 `width`×`height` 的原图。
  ///
  /// 各坐标按比例缩放后向零截断，再限制在图像范围内。
  /// 截断后可能得到 `x1 >= x2` 的退化框，调用者需自行处理。
  pub fn rescale(raw: &[f32; 4], width: u32, height: u32) -> Self {
    let scale = |v: f32, limit: u32| -> u32 {
      // 先乘后除，整数坐标的结果精确；`as i64` 向零截断，NaN 得到 0
      let scaled = (v as f64 * limit as f64 / MODEL_INPUT_SIZE as f64) as i64;
      scaled.clamp(0, limit as i64) as u32
    };

    Self {
      x1: scale(raw[0], width),
      y1: scale(raw[1], height),
      x2: scale(raw[2], width),
      y2: scale(raw[3], height),
    }
  }

  pub fn width(&self) -> u32 {
    self.x2.saturating_sub(self.x1)
  }

  pub fn height(&self) -> u32 {
    self.y2.saturating_sub(self.y1)
  }

  /// 宽或高为零
  pub fn is_degenerate(&self) -> bool {
    self.width() == 0 || self.height() == 0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rescales_with_truncation() {
    let b = PlateBox::rescale(&[100.0, 100.0, 200.0, 150.0], 1280, 720);
    assert_eq!(b, PlateBox::new(200, 112, 400, 168));

    let b = PlateBox::rescale(&[100.0, 200.0, 200.0, 300.0], 1280, 720);
    assert_eq!(b, PlateBox::new(200, 225, 400, 337));
  }

  #[test]
  fn integer_coordinates_match_integer_formula() {
    for &size in &[112u32, 164, 333, 1280, 1920] {
      for v in 0..=MODEL_INPUT_SIZE {
        let f = v as f32;
        let b = PlateBox::rescale(&[f, f, f, f], size, size);
        let expected = v * size / MODEL_INPUT_SIZE;
        assert_eq!(b.x1, expected, "x={} W={}", v, size);
        assert_eq!(b.y2, expected, "y={} H={}", v, size);
      }
    }
    assert_eq!(PlateBox::rescale(&[360.0, 0.0, 360.0, 0.0], 112, 640).x1, 63);
    assert_eq!(PlateBox::rescale(&[480.0, 0.0, 480.0, 0.0], 164, 640).x1, 123);
  }

  #[test]
  fn clamps_to_frame() {
    let b = PlateBox::rescale(&[-12.0, -0.5, 700.0, 641.0], 320, 240);
    assert_eq!(b, PlateBox::new(0, 0, 320, 240));
  }

  #[test]
  fn stays_inside_frame_for_valid_raw_boxes() {
    let sizes = [(1, 1), (17, 9), (640, 640), (1280, 720), (1920, 1080), (333, 4000)];
    let raws = [
      [0.0, 0.0, 640.0, 640.0],
      [0.0, 0.0, 0.5, 0.5],
      [639.0, 639.0, 640.0, 640.0],
      [12.3, 45.6, 78.9, 101.1],
      [320.0, 10.0, 320.5, 600.0],
    ];
    for &(w, h) in &sizes {
      for raw in &raws {
        let b = PlateBox::rescale(raw, w, h);
        assert!(b.x1 <= b.x2 && b.x2 <= w, "{:?} in {}x{}", b, w, h);
        assert!(b.y1 <= b.y2 && b.y2 <= h, "{:?} in {}x{}", b, w, h);
      }
    }
  }

  #[test]
  fn degenerate_after_truncation() {
    // 0.5 * 1 / 640 截断后为 0
    let b = PlateBox::rescale(&[0.0, 0.0, 0.5, 0.5], 1, 1);
    assert!(b.is_degenerate());
    assert_eq!(b.width(), 0);
  }

  #[test]
  fn serializes_as_array() {
    let json = serde_json::to_string(&PlateBox::new(1, 2, 3, 4)).unwrap();
    assert_eq!(json, "[1,2,3,4]");
  }
}
