// 该文件是 Chepai （车牌） 项目的一部分。
// src/ocr.rs - 车牌文字识别
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

use image::DynamicImage;
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

#[cfg(not(any(feature = "ocr_ctc", feature = "ocr_tesseract")))]
compile_error!("至少需要启用一个文字识别特性: ocr_ctc 或 ocr_tesseract");

/// 一条识别候选，按可信度从高到低排列
#[derive(Debug, Clone, PartialEq)]
pub struct TextCandidate {
  pub text: String,
  pub confidence: Option<f32>,
}

impl TextCandidate {
  pub fn new(text: impl Into<String>, confidence: Option<f32>) -> Self {
    Self {
      text: text.into(),
      confidence,
    }
  }
}

pub trait Recognizer {
  type Error;

  /// 识别单张车牌图像；没有识别到任何文字时返回空列表
  fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextCandidate>, Self::Error>;
}

#[cfg(feature = "ocr_ctc")]
mod ctc;
#[cfg(feature = "ocr_ctc")]
pub use self::ctc::{CtcRecognizer, CtcRecognizerBuilder, CtcRecognizerError};

#[cfg(feature = "ocr_tesseract")]
mod tesseract;
#[cfg(feature = "ocr_tesseract")]
pub use self::tesseract::{TesseractRecognizer, TesseractRecognizerBuilder, TesseractRecognizerError};

#[derive(Error, Debug)]
pub enum RecognizerError {
  #[cfg(feature = "ocr_ctc")]
  #[error("CTC 识别错误: {0}")]
  CtcRecognizerError(#[from] CtcRecognizerError),
  #[cfg(feature = "ocr_tesseract")]
  #[error("Tesseract 识别错误: {0}")]
  TesseractRecognizerError(#[from] TesseractRecognizerError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 按 URL 方案选择的文字识别器
pub enum RecognizerWrapper {
  #[cfg(feature = "ocr_ctc")]
  Ctc(CtcRecognizer),
  #[cfg(feature = "ocr_tesseract")]
  Tesseract(TesseractRecognizer),
}

impl FromUrl for RecognizerWrapper {
  type Error = RecognizerError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "ocr_ctc")]
      CtcRecognizerBuilder::SCHEME => {
        let recognizer = CtcRecognizerBuilder::from_url(url)?.build()?;
        Ok(RecognizerWrapper::Ctc(recognizer))
      }
      #[cfg(feature = "ocr_tesseract")]
      TesseractRecognizerBuilder::SCHEME => {
        let recognizer = TesseractRecognizerBuilder::from_url(url)?.build()?;
        Ok(RecognizerWrapper::Tesseract(recognizer))
      }
      other => Err(RecognizerError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Recognizer for RecognizerWrapper {
  type Error = RecognizerError;

  fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextCandidate>, Self::Error> {
    match self {
      #[cfg(feature = "ocr_ctc")]
      RecognizerWrapper::Ctc(recognizer) => recognizer
        .recognize(image)
        .map_err(RecognizerError::from),
      #[cfg(feature = "ocr_tesseract")]
      RecognizerWrapper::Tesseract(recognizer) => recognizer
        .recognize(image)
        .map_err(RecognizerError::from),
    }
  }
}
