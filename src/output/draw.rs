// 该文件是 Chepai （车牌） 项目的一部分。
// src/output/draw.rs - 车牌识别结果标注
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

use ab_glyph::{Font, FontRef, PxScale, ScaleFont, point};
use image::{Rgb, RgbImage};
use imageproc::{drawing::draw_hollow_rect_mut, rect::Rect};

use crate::{geometry::PlateBox, pipeline::PlateRecord};

/// 识别文字为空时显示的标签
pub const FALLBACK_LABEL: &str = "Plate";

// 标注常量
const HERSHEY_BASE_HEIGHT: f32 = 30.0; // Hershey simplex 字体在缩放 1.0 时的像素高度
const LABEL_FONT_SCALE: f32 = 0.7;
const LABEL_OFFSET: i32 = 10; // 文字基线位于框上沿之上的距离
const LABEL_THICKNESS: i32 = 2;
const BOX_THICKNESS: u32 = 2;
const LABEL_COLOR: [u8; 3] = [0, 255, 0]; // 绿色

pub struct Draw<'a> {
  font: FontRef<'a>,
  scale: PxScale,
  label_offset: i32,
  label_thickness: i32,
  box_thickness: u32,
  color: Rgb<u8>,
}

impl<'a> Default for Draw<'a> {
  fn default() -> Self {
    let font_data = include_bytes!("../../assets/DejaVuSans.ttf"); // default font
    let font = FontRef::try_from_slice(font_data).expect("无法加载嵌入的字体文件");

    Self {
      font,
      scale: PxScale::from(HERSHEY_BASE_HEIGHT * LABEL_FONT_SCALE),
      label_offset: LABEL_OFFSET,
      label_thickness: LABEL_THICKNESS,
      box_thickness: BOX_THICKNESS,
      color: Rgb(LABEL_COLOR),
    }
  }
}

/// 车牌框上方显示的文字
pub fn label_for(text: &str) -> &str {
  if text.is_empty() { FALLBACK_LABEL } else { text }
}

impl<'a> Draw<'a> {
  /// 在原图上绘制车牌框与标签。
  ///
  /// 只写入纯色像素（不做抗锯齿混合），重复绘制同一记录不会改变结果。
  pub fn annotate(&self, image: &mut RgbImage, bbox: &PlateBox, text: &str) {
    if image.width() == 0 || image.height() == 0 {
      return;
    }

    self.draw_box(image, bbox);
    self.draw_label(
      image,
      label_for(text),
      bbox.x1 as i32,
      bbox.y1 as i32 - self.label_offset,
    );
  }

  pub fn annotate_all(&self, image: &mut RgbImage, records: &[PlateRecord]) {
    for record in records {
      self.annotate(image, &record.bbox, &record.text);
    }
  }

  fn draw_box(&self, image: &mut RgbImage, bbox: &PlateBox) {
    // 与像素含端点的矩形一致，宽高至少为 1
    let width = bbox.x2.saturating_sub(bbox.x1) + 1;
    let height = bbox.y2.saturating_sub(bbox.y1) + 1;

    for thickness in 0..self.box_thickness {
      let inset = 2 * thickness;
      if width <= inset || height <= inset {
        break;
      }
      let rect = Rect::at((bbox.x1 + thickness) as i32, (bbox.y1 + thickness) as i32)
        .of_size(width - inset, height - inset);
      draw_hollow_rect_mut(image, rect, self.color);
    }
  }

  fn draw_label(&self, image: &mut RgbImage, text: &str, x: i32, baseline: i32) {
    let scaled = self.font.as_scaled(self.scale);
    let (image_w, image_h) = (image.width() as i32, image.height() as i32);

    let mut caret = x as f32;
    let mut previous = None;
    for ch in text.chars() {
      let id = scaled.glyph_id(ch);
      if let Some(prev) = previous {
        caret += scaled.kern(prev, id);
      }
      let glyph = id.with_scale_and_position(self.scale, point(caret, baseline as f32));
      caret += scaled.h_advance(id);
      previous = Some(id);

      let Some(outlined) = self.font.outline_glyph(glyph) else {
        continue;
      };
      let bounds = outlined.px_bounds();
      let (left, top) = (bounds.min.x as i32, bounds.min.y as i32);

      outlined.draw(|gx, gy, coverage| {
        if coverage < 0.5 {
          return;
        }
        // 横向加粗
        for dx in 0..self.label_thickness {
          let px = left + gx as i32 + dx;
          let py = top + gy as i32;
          if px >= 0 && py >= 0 && px < image_w && py < image_h {
            image.put_pixel(px as u32, py as u32, self.color);
          }
        }
      });
    }
  }
}
