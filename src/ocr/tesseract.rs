// 该文件是 Chepai （车牌） 项目的一部分。
// src/ocr/tesseract.rs - Tesseract 文字识别
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

use std::{ffi::CString, sync::Mutex};

use image::DynamicImage;
use leptess::tesseract::TessApi;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  ocr::{Recognizer, TextCandidate},
  utils::{query_value, url_path},
};

const DEFAULT_LANG: &str = "eng";
const DEFAULT_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
// 单行文本
const DEFAULT_PAGE_SEG_MODE: &str = "7";

#[derive(Error, Debug)]
pub enum TesseractRecognizerError {
  #[error("Tesseract 初始化错误: {0}")]
  InitError(String),
  #[error("Tesseract 参数设置错误: {0}")]
  VariableError(String),
  #[error("识别错误: {0}")]
  RecognizeError(String),
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

pub struct TesseractRecognizer {
  // TessApi 识别时需要可变借用
  api: Mutex<TessApi>,
}

pub struct TesseractRecognizerBuilder {
  datapath: Option<String>,
  lang: String,
  variables: Vec<(String, String)>,
}

impl FromUrlWithScheme for TesseractRecognizerBuilder {
  const SCHEME: &'static str = "tesseract";
}

impl FromUrl for TesseractRecognizerBuilder {
  type Error = TesseractRecognizerError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TesseractRecognizerError::SchemeMismatch);
    }

    let path = url_path(url);
    let datapath = if path.is_empty() || path == "/" {
      None
    } else {
      Some(path)
    };

    let variables = vec![
      (
        "tessedit_char_whitelist".to_string(),
        query_value(url, "whitelist").unwrap_or_else(|| DEFAULT_WHITELIST.to_string()),
      ),
      (
        "tessedit_pageseg_mode".to_string(),
        query_value(url, "psm").unwrap_or_else(|| DEFAULT_PAGE_SEG_MODE.to_string()),
      ),
    ];

    Ok(TesseractRecognizerBuilder {
      datapath,
      lang: query_value(url, "lang").unwrap_or_else(|| DEFAULT_LANG.to_string()),
      variables,
    })
  }
}

impl TesseractRecognizerBuilder {
  pub fn build(self) -> Result<TesseractRecognizer, TesseractRecognizerError> {
    info!(
      "初始化 Tesseract，数据目录: {:?}，语言: {}",
      self.datapath, self.lang
    );
    let mut api = TessApi::new(self.datapath.as_deref(), &self.lang)
      .map_err(|e| TesseractRecognizerError::InitError(format!("{:?}", e)))?;

    for (key, value) in &self.variables {
      let name = CString::new(key.as_str())
        .map_err(|e| TesseractRecognizerError::VariableError(e.to_string()))?;
      let value_c = CString::new(value.as_str())
        .map_err(|e| TesseractRecognizerError::VariableError(e.to_string()))?;
      api
        .raw
        .set_variable(&name, &value_c)
        .map_err(|e| TesseractRecognizerError::VariableError(format!("{}: {:?}", key, e)))?;
      debug!("Tesseract 参数 {} = {}", key, value);
    }

    Ok(TesseractRecognizer {
      api: Mutex::new(api),
    })
  }
}

impl Recognizer for TesseractRecognizer {
  type Error = TesseractRecognizerError;

  fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextCandidate>, Self::Error> {
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();

    let mut api = self
      .api
      .lock()
      .map_err(|_| TesseractRecognizerError::RecognizeError("识别器锁已损坏".to_string()))?;
    api
      .raw
      .set_image(gray.as_raw(), width as i32, height as i32, 1, width as i32)
      .map_err(|e| TesseractRecognizerError::RecognizeError(format!("{:?}", e)))?;
    let text = api
      .get_utf8_text()
      .map_err(|e| TesseractRecognizerError::RecognizeError(e.to_string()))?;
    let confidence = api.mean_text_conf();

    let text = text.trim();
    debug!("Tesseract 识别结果: {:?} ({})", text, confidence);
    if text.is_empty() {
      return Ok(Vec::new());
    }
    Ok(vec![TextCandidate::new(
      text,
      Some(confidence as f32 / 100.0),
    )])
  }
}
