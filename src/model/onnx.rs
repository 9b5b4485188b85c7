// 该文件是 Chepai （车牌） 项目的一部分。
// src/model/onnx.rs - 基于 tract 的 YOLO ONNX 车牌检测模型
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
use tracing::{debug, info};
use tract_onnx::prelude::*;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::ModelInputFrame,
  geometry::MODEL_INPUT_SIZE,
  model::{DetectItem, DetectResult, Model, Thresholds, non_max_suppression},
  utils::{query_parse, url_path},
};

const YOLO_BOX_CHANNELS: usize = 4;

#[derive(Error, Debug)]
pub enum OnnxYoloError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(String),
  #[error("推理错误: {0}")]
  InferError(String),
  #[error("模型输出形状无效: {0:?}")]
  OutputShape(Vec<usize>),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

impl OnnxYoloError {
  fn load(e: TractError) -> Self {
    OnnxYoloError::ModelLoadError(format!("{:#}", e))
  }

  fn infer(e: TractError) -> Self {
    OnnxYoloError::InferError(format!("{:#}", e))
  }
}

/// Ultralytics 导出的 YOLO 检测模型，输出 `[1, 4 + 类别数, 候选数]`
pub struct OnnxYolo {
  plan: TypedRunnableModel<TypedModel>,
  classes: usize,
  thresholds: Thresholds,
}

pub struct OnnxYoloBuilder {
  model_path: String,
  classes: usize,
  thresholds: Thresholds,
}

impl FromUrlWithScheme for OnnxYoloBuilder {
  const SCHEME: &'static str = "onnx";
}

impl FromUrl for OnnxYoloBuilder {
  type Error = OnnxYoloError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxYoloError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    // 车牌数据集只有一个类别
    let classes = query_parse::<usize>(url, "classes")
      .map_err(OnnxYoloError::ModelPathError)?
      .unwrap_or(1);

    Ok(OnnxYoloBuilder {
      model_path: url_path(url),
      classes,
      thresholds: Thresholds::default(),
    })
  }
}

impl OnnxYoloBuilder {
  pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
    self.thresholds = thresholds;
    self
  }

  pub fn build(self) -> Result<OnnxYolo, OnnxYoloError> {
    info!("加载模型文件: {}", self.model_path);
    let side = MODEL_INPUT_SIZE as usize;
    let plan = tract_onnx::onnx()
      .model_for_path(&self.model_path)
      .map_err(OnnxYoloError::load)?
      .with_input_fact(
        0,
        InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
      )
      .map_err(OnnxYoloError::load)?
      .into_optimized()
      .map_err(OnnxYoloError::load)?
      .into_runnable()
      .map_err(OnnxYoloError::load)?;
    info!("模型加载完成");
    debug!("检测阈值: {:?}", self.thresholds);

    Ok(OnnxYolo {
      plan,
      classes: self.classes,
      thresholds: self.thresholds,
    })
  }
}

impl Model for OnnxYolo {
  type Input = ModelInputFrame;
  type Output = DetectResult;
  type Error = OnnxYoloError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入");
    let shape = [1, 3, input.height(), input.width()];
    let tensor = Tensor::from_shape(&shape, &input.to_nchw_f32())
      .map_err(OnnxYoloError::infer)?;

    debug!("执行模型推理");
    let outputs = self
      .plan
      .run(tvec!(tensor.into()))
      .map_err(OnnxYoloError::infer)?;

    let output = outputs
      .first()
      .ok_or_else(|| OnnxYoloError::InferError("模型没有输出".to_string()))?;
    let view = output
      .to_array_view::<f32>()
      .map_err(OnnxYoloError::infer)?;
    let shape = view.shape().to_vec();
    let data: Vec<f32> = view.iter().copied().collect();

    let items = decode_predictions(&data, &shape, self.classes, self.thresholds)?;
    debug!("检测到 {} 个车牌", items.len());
    Ok(DetectResult::from(items))
  }
}

/// 解析 `[1, 4 + classes, N]`（或转置的 `[1, N, 4 + classes]`）输出，
/// 过滤置信度后做 NMS
fn decode_predictions(
  data: &[f32],
  shape: &[usize],
  classes: usize,
  thresholds: Thresholds,
) -> Result<Vec<DetectItem>, OnnxYoloError> {
  let (a, b) = match shape {
    [1, a, b] => (*a, *b),
    [a, b] => (*a, *b),
    _ => return Err(OnnxYoloError::OutputShape(shape.to_vec())),
  };

  let channels = YOLO_BOX_CHANNELS + classes;
  let (proposals, transposed) = if a == channels {
    (b, false)
  } else if b == channels {
    (a, true)
  } else {
    return Err(OnnxYoloError::OutputShape(shape.to_vec()));
  };
  if classes == 0 || data.len() < channels * proposals {
    return Err(OnnxYoloError::OutputShape(shape.to_vec()));
  }

  let at = |c: usize, i: usize| -> f32 {
    if transposed {
      data[i * channels + c]
    } else {
      data[c * proposals + i]
    }
  };

  let limit = MODEL_INPUT_SIZE as f32;
  let mut candidates = Vec::new();
  for i in 0..proposals {
    let score = (YOLO_BOX_CHANNELS..channels)
      .map(|c| at(c, i))
      .fold(f32::MIN, f32::max);
    if score < thresholds.confidence {
      continue;
    }

    let (cx, cy, w, h) = (at(0, i), at(1, i), at(2, i), at(3, i));
    candidates.push(DetectItem {
      score,
      bbox: [
        (cx - w / 2.0).clamp(0.0, limit),
        (cy - h / 2.0).clamp(0.0, limit),
        (cx + w / 2.0).clamp(0.0, limit),
        (cy + h / 2.0).clamp(0.0, limit),
      ],
    });
  }

  debug!("置信度过滤后候选数: {}", candidates.len());
  Ok(non_max_suppression(candidates, thresholds.iou))
}

#[cfg(test)]
mod tests {
  use super::*;

  // 单类别，三个候选，按 [C, N] 排列
  fn channel_major() -> Vec<f32> {
    vec![
      // cx
      100.0, 102.0, 400.0, //
      // cy
      100.0, 101.0, 300.0, //
      // w
      40.0, 40.0, 80.0, //
      // h
      20.0, 20.0, 30.0, //
      // score
      0.9, 0.6, 0.02,
    ]
  }

  #[test]
  fn decodes_filters_and_suppresses() {
    let thresholds = Thresholds {
      confidence: 0.05,
      iou: 0.3,
    };
    let items = decode_predictions(&channel_major(), &[1, 5, 3], 1, thresholds).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].score, 0.9);
    assert_eq!(items[0].bbox, [80.0, 90.0, 120.0, 110.0]);
  }

  #[test]
  fn accepts_transposed_output() {
    let cm = channel_major();
    let mut transposed = vec![0.0; cm.len()];
    for c in 0..5 {
      for i in 0..3 {
        transposed[i * 5 + c] = cm[c * 3 + i];
      }
    }
    let thresholds = Thresholds {
      confidence: 0.5,
      iou: 0.99,
    };
    let items = decode_predictions(&transposed, &[1, 3, 5], 1, thresholds).unwrap();
    assert_eq!(items.len(), 2);
  }

  #[test]
  fn rejects_unknown_shape() {
    assert!(decode_predictions(&[0.0; 4], &[1, 4, 1], 1, Thresholds::default()).is_err());
    assert!(decode_predictions(&[0.0; 4], &[4], 1, Thresholds::default()).is_err());
    assert!(decode_predictions(&[0.0; 12], &[1, 6, 2], 1, Thresholds::default()).is_err());
  }
}
