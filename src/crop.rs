// 该文件是 Chepai （车牌） 项目的一部分。
// src/crop.rs - 车牌区域裁剪
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

use crate::geometry::PlateBox;

/// 从原图中取出 `frame[y1:y2, x1:x2]`，退化框返回 0×0 图像
pub fn crop_plate(frame: &RgbImage, bbox: &PlateBox) -> RgbImage {
  let x2 = bbox.x2.min(frame.width());
  let y2 = bbox.y2.min(frame.height());
  let width = x2.saturating_sub(bbox.x1);
  let height = y2.saturating_sub(bbox.y1);

  if width == 0 || height == 0 {
    return RgbImage::new(0, 0);
  }

  imageops::crop_imm(frame, bbox.x1, bbox.y1, width, height).to_image()
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn gradient(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 7]))
  }

  #[test]
  fn crops_region() {
    let frame = gradient(40, 30);
    let crop = crop_plate(&frame, &PlateBox::new(10, 5, 25, 12));
    assert_eq!(crop.dimensions(), (15, 7));
    assert_eq!(crop.get_pixel(0, 0), &Rgb([10, 5, 7]));
    assert_eq!(crop.get_pixel(14, 6), &Rgb([24, 11, 7]));
  }

  #[test]
  fn degenerate_box_gives_empty_raster() {
    let frame = gradient(40, 30);
    for bbox in [
      PlateBox::new(10, 5, 10, 12),
      PlateBox::new(10, 5, 25, 5),
      PlateBox::new(30, 20, 10, 5),
    ] {
      let crop = crop_plate(&frame, &bbox);
      assert_eq!(crop.dimensions(), (0, 0));
      assert!(crop.as_raw().is_empty());
    }
  }

  #[test]
  fn box_touching_edge_is_kept() {
    let frame = gradient(40, 30);
    let crop = crop_plate(&frame, &PlateBox::new(30, 20, 40, 30));
    assert_eq!(crop.dimensions(), (10, 10));
  }
}
