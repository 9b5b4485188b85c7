// 该文件是 Chepai （车牌） 项目的一部分。
// src/config.rs - 检测参数与配置档
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

use clap::{Args, ValueEnum};
use tracing::info;
use url::Url;

use crate::{
  FromUrl,
  model::{ModelWrapper, Thresholds},
  ocr::RecognizerWrapper,
  pipeline::PlatePipeline,
  preprocess::PreprocessMode,
};

/// 预设的检测配置档
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Profile {
  /// 低置信度、强抑制，配合二值化预处理，尽量不漏检
  #[default]
  Recall,
  /// 常规阈值，直接识别彩色裁剪图
  Baseline,
}

impl Profile {
  pub fn thresholds(&self) -> Thresholds {
    match self {
      Profile::Recall => Thresholds {
        confidence: 0.05,
        iou: 0.3,
      },
      Profile::Baseline => Thresholds {
        confidence: 0.4,
        iou: 0.7,
      },
    }
  }

  pub fn preprocess(&self) -> PreprocessMode {
    match self {
      Profile::Recall => PreprocessMode::Binarize,
      Profile::Baseline => PreprocessMode::Raw,
    }
  }
}

/// 各程序共用的检测参数
#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
  /// 检测模型，例如 onnx:///models/best.onnx 或 yolo26:///models/plate.rknn
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 文字识别模型，例如 ctc:///models/ocr.onnx 或 tesseract:///usr/share/tessdata?lang=eng
  #[arg(long, value_name = "OCR")]
  pub ocr: Url,
  /// 配置档
  #[arg(long, value_enum, default_value_t = Profile::Recall)]
  pub profile: Profile,
  /// 覆盖配置档的置信度阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub confidence: Option<f32>,
  /// 覆盖配置档的 NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long, value_name = "THRESHOLD")]
  pub iou: Option<f32>,
  /// 覆盖配置档的预处理方式
  #[arg(long, value_enum)]
  pub preprocess: Option<PreprocessMode>,
}

impl DetectArgs {
  pub fn thresholds(&self) -> Thresholds {
    let base = self.profile.thresholds();
    Thresholds {
      confidence: self.confidence.unwrap_or(base.confidence),
      iou: self.iou.unwrap_or(base.iou),
    }
  }

  pub fn preprocess(&self) -> PreprocessMode {
    self.preprocess.unwrap_or_else(|| self.profile.preprocess())
  }

  /// 加载检测模型与识别器，组装车牌识别流程
  pub fn open_pipeline<'a>(
    &self,
  ) -> anyhow::Result<PlatePipeline<'a, ModelWrapper, RecognizerWrapper>> {
    let thresholds = self.thresholds();
    info!("检测模型: {}", self.model);
    info!("识别模型: {}", self.ocr);
    info!(
      "配置档 {:?}: 置信度 {}, IoU {}, 预处理 {:?}",
      self.profile,
      thresholds.confidence,
      thresholds.iou,
      self.preprocess()
    );

    let model = ModelWrapper::open(&self.model, thresholds)?;
    let recognizer = RecognizerWrapper::from_url(&self.ocr)?;
    Ok(PlatePipeline::new(model, recognizer).with_preprocess(self.preprocess()))
  }
}
