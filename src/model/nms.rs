// 该文件是 Chepai （车牌） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use super::DetectItem;

/// 两个 `[x_min, y_min, x_max, y_max]` 框的交并比
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let ix1 = a[0].max(b[0]);
  let iy1 = a[1].max(b[1]);
  let ix2 = a[2].min(b[2]);
  let iy2 = a[3].min(b[3]);
  let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
  if inter <= 0.0 {
    return 0.0;
  }
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - inter;
  if union <= 0.0 { 0.0 } else { inter / union }
}

/// 贪心 NMS：按置信度降序保留，与已保留框 IoU 超过阈值的被抑制。
/// 返回结果按置信度降序排列。
pub fn non_max_suppression(mut items: Vec<DetectItem>, iou_threshold: f32) -> Vec<DetectItem> {
  items.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

  let mut kept: Vec<DetectItem> = Vec::with_capacity(items.len());
  for item in items {
    if kept.iter().all(|k| iou(&k.bbox, &item.bbox) <= iou_threshold) {
      kept.push(item);
    }
  }
  kept
}
