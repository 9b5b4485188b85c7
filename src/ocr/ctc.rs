// 该文件是 Chepai （车牌） 项目的一部分。
// src/ocr/ctc.rs - 基于 tract 的 CTC 文字识别模型
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

use image::{DynamicImage, imageops};
use thiserror::Error;
use tracing::{debug, info};
use tract_onnx::prelude::*;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  ocr::{Recognizer, TextCandidate},
  utils::{query_parse, query_value, url_path},
};

const DEFAULT_INPUT_WIDTH: u32 = 200;
const DEFAULT_INPUT_HEIGHT: u32 = 64;
const DEFAULT_VOCAB: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const CTC_BLANK: usize = 0;

#[derive(Error, Debug)]
pub enum CtcRecognizerError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(String),
  #[error("推理错误: {0}")]
  InferError(String),
  #[error("模型输出形状无效: {0:?}")]
  OutputShape(Vec<usize>),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

impl CtcRecognizerError {
  fn load(e: TractError) -> Self {
    CtcRecognizerError::ModelLoadError(format!("{:#}", e))
  }

  fn infer(e: TractError) -> Self {
    CtcRecognizerError::InferError(format!("{:#}", e))
  }
}

/// 灰度输入 `[1, 1, H, W]`，输出 `[1, T, 1 + 字符数]` 的序列识别模型。
/// 类别 0 为 CTC 空白符，类别 i 对应字符表第 i - 1 个字符。
pub struct CtcRecognizer {
  plan: TypedRunnableModel<TypedModel>,
  width: u32,
  height: u32,
  vocab: Vec<char>,
}

pub struct CtcRecognizerBuilder {
  model_path: String,
  width: u32,
  height: u32,
  vocab: Vec<char>,
}

impl FromUrlWithScheme for CtcRecognizerBuilder {
  const SCHEME: &'static str = "ctc";
}

impl FromUrl for CtcRecognizerBuilder {
  type Error = CtcRecognizerError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(CtcRecognizerError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let width = query_parse::<u32>(url, "width")
      .map_err(CtcRecognizerError::ModelPathError)?
      .unwrap_or(DEFAULT_INPUT_WIDTH);
    let height = query_parse::<u32>(url, "height")
      .map_err(CtcRecognizerError::ModelPathError)?
      .unwrap_or(DEFAULT_INPUT_HEIGHT);
    if width == 0 || height == 0 {
      return Err(CtcRecognizerError::ModelPathError(
        "输入尺寸必须大于 0".to_string(),
      ));
    }

    let vocab: Vec<char> = query_value(url, "vocab")
      .unwrap_or_else(|| DEFAULT_VOCAB.to_string())
      .chars()
      .collect();
    if vocab.is_empty() {
      return Err(CtcRecognizerError::ModelPathError("字符表为空".to_string()));
    }

    Ok(CtcRecognizerBuilder {
      model_path: url_path(url),
      width,
      height,
      vocab,
    })
  }
}

impl CtcRecognizerBuilder {
  pub fn build(self) -> Result<CtcRecognizer, CtcRecognizerError> {
    info!("加载识别模型文件: {}", self.model_path);
    let plan = tract_onnx::onnx()
      .model_for_path(&self.model_path)
      .map_err(CtcRecognizerError::load)?
      .with_input_fact(
        0,
        InferenceFact::dt_shape(
          f32::datum_type(),
          tvec!(1, 1, self.height as usize, self.width as usize),
        ),
      )
      .map_err(CtcRecognizerError::load)?
      .into_optimized()
      .map_err(CtcRecognizerError::load)?
      .into_runnable()
      .map_err(CtcRecognizerError::load)?;
    info!(
      "识别模型加载完成，输入 {}x{}，字符数 {}",
      self.width,
      self.height,
      self.vocab.len()
    );

    Ok(CtcRecognizer {
      plan,
      width: self.width,
      height: self.height,
      vocab: self.vocab,
    })
  }
}

impl Recognizer for CtcRecognizer {
  type Error = CtcRecognizerError;

  fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextCandidate>, Self::Error> {
    let gray = imageops::resize(
      &image.to_luma8(),
      self.width,
      self.height,
      imageops::FilterType::Triangle,
    );
    let data: Vec<f32> = gray.pixels().map(|p| p[0] as f32 / 255.0).collect();
    let tensor = Tensor::from_shape(&[1, 1, self.height as usize, self.width as usize], &data)
      .map_err(CtcRecognizerError::infer)?;

    let outputs = self
      .plan
      .run(tvec!(tensor.into()))
      .map_err(CtcRecognizerError::infer)?;
    let output = outputs
      .first()
      .ok_or_else(|| CtcRecognizerError::InferError("模型没有输出".to_string()))?;
    let view = output
      .to_array_view::<f32>()
      .map_err(CtcRecognizerError::infer)?;
    let shape = view.shape().to_vec();
    let scores: Vec<f32> = view.iter().copied().collect();

    let candidate = greedy_decode(&scores, &shape, &self.vocab)?;
    debug!("识别结果: {:?}", candidate);
    Ok(candidate.into_iter().collect())
  }
}

/// 贪心 CTC 解码：逐帧取最大类别，合并连续重复并去掉空白符。
///
/// 输出形状可以是 `[1, T, C]`、`[T, 1, C]`、`[T, C]` 或 `[1, C, T]`，
/// 其中 C = 字符数 + 1。数值不在 [0, 1] 内时按 logits 逐帧 softmax。
fn greedy_decode(
  scores: &[f32],
  shape: &[usize],
  vocab: &[char],
) -> Result<Option<TextCandidate>, CtcRecognizerError> {
  let classes = vocab.len() + 1;
  let (steps, class_major) = match shape {
    [1, t, c] | [t, 1, c] | [t, c] if *c == classes => (*t, false),
    [1, c, t] if *c == classes => (*t, true),
    _ => return Err(CtcRecognizerError::OutputShape(shape.to_vec())),
  };
  if scores.len() < steps * classes {
    return Err(CtcRecognizerError::OutputShape(shape.to_vec()));
  }

  let is_prob = scores.iter().all(|v| (0.0..=1.0).contains(v));

  let mut text = String::new();
  let mut confidences = Vec::new();
  let mut previous = CTC_BLANK;
  let mut row = vec![0f32; classes];

  for t in 0..steps {
    for (c, slot) in row.iter_mut().enumerate() {
      *slot = if class_major {
        scores[c * steps + t]
      } else {
        scores[t * classes + c]
      };
    }
    if !is_prob {
      softmax(&mut row);
    }

    let (best, prob) = row
      .iter()
      .copied()
      .enumerate()
      .fold((CTC_BLANK, f32::MIN), |acc, (c, p)| if p > acc.1 { (c, p) } else { acc });

    if best != CTC_BLANK && best != previous {
      text.push(vocab[best - 1]);
      confidences.push(prob);
    }
    previous = best;
  }

  if text.is_empty() {
    return Ok(None);
  }
  let confidence = confidences.iter().sum::<f32>() / confidences.len() as f32;
  Ok(Some(TextCandidate::new(text, Some(confidence))))
}

fn softmax(row: &mut [f32]) {
  let max = row.iter().copied().fold(f32::MIN, f32::max);
  let mut sum = 0.0;
  for v in row.iter_mut() {
    *v = (*v - max).exp();
    sum += *v;
  }
  if sum > 0.0 {
    for v in row.iter_mut() {
      *v /= sum;
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const VOCAB: [char; 3] = ['A', 'B', '7'];

  // 每行依次为 blank, A, B, 7
  fn one_hot(indices: &[usize]) -> Vec<f32> {
    let mut out = vec![0.0; indices.len() * 4];
    for (t, &i) in indices.iter().enumerate() {
      out[t * 4 + i] = 1.0;
    }
    out
  }

  #[test]
  fn collapses_repeats_and_drops_blanks() {
    let scores = one_hot(&[1, 1, 0, 1, 2, 2, 0, 3, 0]);
    let candidate = greedy_decode(&scores, &[1, 9, 4], &VOCAB).unwrap().unwrap();
    assert_eq!(candidate.text, "AAB7");
    assert_eq!(candidate.confidence, Some(1.0));
  }

  #[test]
  fn all_blank_yields_nothing() {
    let scores = one_hot(&[0, 0, 0]);
    assert_eq!(greedy_decode(&scores, &[3, 1, 4], &VOCAB).unwrap(), None);
  }

  #[test]
  fn softmaxes_logits_and_reads_class_major() {
    // [1, C, T]，T = 2：第 0 帧最大为 B，第 1 帧最大为 7
    let scores = vec![
      -1.0, -1.0, // blank
      -2.0, -2.0, // A
      5.0, -3.0, // B
      0.0, 6.0, // 7
    ];
    let candidate = greedy_decode(&scores, &[1, 4, 2], &VOCAB).unwrap().unwrap();
    assert_eq!(candidate.text, "B7");
    let confidence = candidate.confidence.unwrap();
    assert!(confidence > 0.9 && confidence <= 1.0);
  }

  #[test]
  fn builder_reads_defaults_from_url() {
    let url = Url::parse("ctc:///models/plate%20ocr.onnx").unwrap();
    let builder = CtcRecognizerBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, "/models/plate ocr.onnx");
    assert_eq!((builder.width, builder.height), (200, 64));
    assert_eq!(builder.vocab.iter().collect::<String>(), DEFAULT_VOCAB);
  }

  #[test]
  fn builder_reads_query_overrides() {
    let url = Url::parse("ctc:///m.onnx?width=96&height=32&vocab=AB7").unwrap();
    let builder = CtcRecognizerBuilder::from_url(&url).unwrap();
    assert_eq!((builder.width, builder.height), (96, 32));
    assert_eq!(builder.vocab, VOCAB.to_vec());
  }

  #[test]
  fn builder_rejects_bad_urls() {
    for url in [
      "ctc:///m.onnx?width=0",
      "ctc:///m.onnx?height=0",
      "ctc:///m.onnx?width=wide",
      "ctc:///m.onnx?vocab=",
      "onnx:///m.onnx",
    ] {
      let url = Url::parse(url).unwrap();
      assert!(CtcRecognizerBuilder::from_url(&url).is_err(), "{}", url);
    }
  }

  #[test]
  fn rejects_mismatched_vocab() {
    assert!(greedy_decode(&[0.0; 10], &[1, 2, 5], &VOCAB).is_err());
  }
}
