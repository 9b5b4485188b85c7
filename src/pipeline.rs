// 该文件是 Chepai （车牌） 项目的一部分。
// src/pipeline.rs - 车牌检测与识别流程
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

use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  crop::crop_plate,
  frame::ModelInputFrame,
  geometry::PlateBox,
  input::SourceFrame,
  model::{DetectResult, Model},
  ocr::Recognizer,
  output::draw::Draw,
  preprocess::PreprocessMode,
};

/// 单个车牌的检测与识别结果，坐标为原图像素
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateRecord {
  pub bbox: PlateBox,
  pub text: String,
  pub score: f32,
}

#[derive(Error, Debug)]
pub enum PipelineError<ME, RE> {
  #[error("检测模型错误: {0}")]
  Model(ME),
  #[error("文字识别错误: {0}")]
  Recognizer(RE),
}

pub struct PlatePipeline<'a, M, R> {
  model: M,
  recognizer: R,
  draw: Draw<'a>,
  preprocess: PreprocessMode,
}

impl<'a, M, R> PlatePipeline<'a, M, R>
where
  M: Model<Input = ModelInputFrame, Output = DetectResult>,
  R: Recognizer,
{
  pub fn new(model: M, recognizer: R) -> Self {
    Self {
      model,
      recognizer,
      draw: Draw::default(),
      preprocess: PreprocessMode::default(),
    }
  }

  pub fn with_preprocess(mut self, preprocess: PreprocessMode) -> Self {
    self.preprocess = preprocess;
    self
  }

  pub fn draw(&self) -> &Draw<'a> {
    &self.draw
  }

  /// 检测并识别 `frame` 中的车牌，并把结果标注在 `frame` 上。
  ///
  /// 返回的记录与检测模型输出一一对应，顺序一致。
  /// 所有车牌先裁剪识别，之后才统一标注，重叠框的识别输入不含其他框的标注。
  pub fn detect(
    &self,
    frame: &mut RgbImage,
  ) -> Result<Vec<PlateRecord>, PipelineError<M::Error, R::Error>> {
    let records = self.recognize(frame)?;
    self.draw.annotate_all(frame, &records);
    Ok(records)
  }

  /// 只检测与识别，不修改原图
  pub fn recognize(
    &self,
    frame: &RgbImage,
  ) -> Result<Vec<PlateRecord>, PipelineError<M::Error, R::Error>> {
    let (width, height) = frame.dimensions();
    let input = ModelInputFrame::from_image(frame);

    let result = self.model.infer(&input).map_err(PipelineError::Model)?;
    debug!("检测模型返回 {} 个候选框", result.len());

    let mut records = Vec::with_capacity(result.len());
    for item in result.iter() {
      let bbox = PlateBox::rescale(&item.bbox, width, height);
      let crop = crop_plate(frame, &bbox);

      let text = if crop.width() == 0 || crop.height() == 0 {
        debug!("车牌框 {:?} 为空，跳过识别", bbox);
        String::new()
      } else {
        let plate = self.preprocess.apply(&crop);
        self
          .recognizer
          .recognize(&plate)
          .map_err(PipelineError::Recognizer)?
          .into_iter()
          .next()
          .map(|candidate| candidate.text)
          .unwrap_or_default()
      };

      info!(
        "车牌 {:?} 得分 {:.3} 识别结果 {:?}",
        <[u32; 4]>::from(bbox),
        item.score,
        text
      );
      records.push(PlateRecord {
        bbox,
        text,
        score: item.score,
      });
    }

    Ok(records)
  }
}

/// 作为任务中的“模型”使用：输入原始帧，输出识别记录，不修改帧
impl<'a, M, R> Model for PlatePipeline<'a, M, R>
where
  M: Model<Input = ModelInputFrame, Output = DetectResult>,
  R: Recognizer,
{
  type Input = SourceFrame;
  type Output = Vec<PlateRecord>;
  type Error = PipelineError<M::Error, R::Error>;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("识别 {}", input.name);
    self.recognize(&input.image)
  }
}
