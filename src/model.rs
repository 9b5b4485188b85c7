// 该文件是 Chepai （车牌） 项目的一部分。
// src/model.rs - 车牌检测模型
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
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::ModelInputFrame};

#[cfg(not(any(feature = "model_onnx", feature = "model_yolo26")))]
compile_error!("至少需要启用一个检测模型特性: model_onnx 或 model_yolo26");

pub trait Model {
  type Input;
  type Output;
  type Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error>;
}

/// 单个检测结果，坐标位于模型输入空间（640×640 像素）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectItem {
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

#[derive(Debug, Clone, Default)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem> {
    self.items.iter()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

/// 检测阈值：置信度下限与 NMS 的 IoU 上限
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
  pub confidence: f32,
  pub iou: f32,
}

impl Default for Thresholds {
  fn default() -> Self {
    Self {
      confidence: 0.05,
      iou: 0.3,
    }
  }
}

mod nms;
pub use self::nms::{iou, non_max_suppression};

#[cfg(feature = "model_onnx")]
mod onnx;
#[cfg(feature = "model_onnx")]
pub use self::onnx::{OnnxYolo, OnnxYoloBuilder, OnnxYoloError};

#[cfg(feature = "model_yolo26")]
mod yolo26;
#[cfg(feature = "model_yolo26")]
pub use self::yolo26::{Yolo26, Yolo26Builder, Yolo26Error};

#[derive(Error, Debug)]
pub enum ModelError {
  #[cfg(feature = "model_onnx")]
  #[error("ONNX 模型错误: {0}")]
  OnnxYoloError(#[from] OnnxYoloError),
  #[cfg(feature = "model_yolo26")]
  #[error("YOLO26 模型错误: {0}")]
  Yolo26Error(#[from] Yolo26Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 按 URL 方案选择的检测模型
pub enum ModelWrapper {
  #[cfg(feature = "model_onnx")]
  Onnx(OnnxYolo),
  #[cfg(feature = "model_yolo26")]
  Yolo26(Yolo26),
}

impl ModelWrapper {
  pub fn open(url: &Url, thresholds: Thresholds) -> Result<Self, ModelError> {
    match url.scheme() {
      #[cfg(feature = "model_onnx")]
      OnnxYoloBuilder::SCHEME => {
        let model = OnnxYoloBuilder::from_url(url)?
          .thresholds(thresholds)
          .build()?;
        Ok(ModelWrapper::Onnx(model))
      }
      #[cfg(feature = "model_yolo26")]
      Yolo26Builder::SCHEME => {
        let model = Yolo26Builder::from_url(url)?
          .thresholds(thresholds)
          .build()?;
        Ok(ModelWrapper::Yolo26(model))
      }
      other => Err(ModelError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Model for ModelWrapper {
  type Input = ModelInputFrame;
  type Output = DetectResult;
  type Error = ModelError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    match self {
      #[cfg(feature = "model_onnx")]
      ModelWrapper::Onnx(model) => model.infer(input).map_err(ModelError::from),
      #[cfg(feature = "model_yolo26")]
      ModelWrapper::Yolo26(model) => model.infer(input).map_err(ModelError::from),
    }
  }
}
