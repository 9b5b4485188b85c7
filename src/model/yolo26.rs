// 该文件是 Chepai （车牌） 项目的一部分。
// src/model/yolo26.rs - 基于 RKNPU 的 YOLO26 车牌检测模型
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

use rknpu::{Context, InitFlags, TensorType};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{AsNhwcFrame, ModelInputFrame},
  geometry::MODEL_INPUT_SIZE,
  model::{DetectItem, DetectResult, Model, Thresholds, non_max_suppression},
  utils::{query_parse, url_path},
};

const YOLO26_NUM_INPUTS: u32 = 1;
const YOLO26_NUM_OUTPUTS: u32 = 6;
const YOLO26_INPUT_SIZE: f32 = MODEL_INPUT_SIZE as f32;
const YOLO26_HEAD_SIZES: [(usize, usize); 3] = [(80, 80), (40, 40), (20, 20)];
const YOLO26_STRIDES: [f32; 3] = [8.0, 16.0, 32.0];

pub struct Yolo26 {
  context: Context,
  classes: usize,
  thresholds: Thresholds,
}

#[derive(Error, Debug)]
pub enum Yolo26Error {
  #[error("模型加载错误: {0}")]
  ModelLoadError(std::io::Error),
  #[error("模型无效: {0}, 错误: {1}")]
  ModelInvalid(String, rknpu::Error),
  #[error("RKNN 错误: {0}")]
  RknnError(rknpu::Error),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型输出错误: {0}")]
  OutputError(String),
}

impl From<std::io::Error> for Yolo26Error {
  fn from(err: std::io::Error) -> Self {
    Yolo26Error::ModelLoadError(err)
  }
}

impl From<rknpu::Error> for Yolo26Error {
  fn from(err: rknpu::Error) -> Self {
    Yolo26Error::RknnError(err)
  }
}

impl Yolo26Error {
  pub fn invalid(msg: &str, e: rknpu::Error) -> Self {
    Yolo26Error::ModelInvalid(msg.to_string(), e)
  }
}

pub struct Yolo26Builder {
  model_path: String,
  flags: InitFlags,
  classes: usize,
  thresholds: Thresholds,
}

impl FromUrlWithScheme for Yolo26Builder {
  const SCHEME: &'static str = "yolo26";
}

impl FromUrl for Yolo26Builder {
  type Error = Yolo26Error;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(Yolo26Error::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    let classes = query_parse::<usize>(url, "classes")
      .map_err(Yolo26Error::ModelPathError)?
      .unwrap_or(1);

    Ok(Yolo26Builder {
      model_path: url_path(url),
      flags: InitFlags::default(),
      classes,
      thresholds: Thresholds::default(),
    })
  }
}

impl Yolo26Builder {
  pub fn flags(mut self, flags: InitFlags) -> Self {
    self.flags = flags;
    self
  }

  pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
    self.thresholds = thresholds;
    self
  }

  pub fn build(self) -> Result<Yolo26, Yolo26Error> {
    info!("加载模型文件: {}", self.model_path);
    let mode_data = std::fs::read(&self.model_path)?;
    debug!(
      "模型文件大小: {:.2} MB",
      mode_data.len() as f64 / (1024.0 * 1024.0)
    );

    info!("创建 RKNN 推理上下文");
    let context = Context::new(&mode_data, self.flags)?;

    match context.sdk_version() {
      Ok(version) => {
        if let Ok(api_ver) = version.api_version() {
          debug!("模型 API 版本: {}", api_ver);
        }
        if let Ok(drv_ver) = version.driver_version() {
          debug!("模型驱动版本: {}", drv_ver);
        }
      }
      Err(e) => {
        error!("查询 SDK 版本失败: {}", e);
        return Err(Yolo26Error::invalid("无法查询 SDK 版本", e));
      }
    }

    let num_inputs = context
      .num_inputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输入数量", e))?;
    let num_outputs = context
      .num_outputs()
      .map_err(|e| Yolo26Error::invalid("无法获取输出数量", e))?;

    if num_inputs != YOLO26_NUM_INPUTS || num_outputs != YOLO26_NUM_OUTPUTS {
      let msg = format!(
        "预期模型输入/输出数量为 {}/{}, 实际为 {}/{}",
        YOLO26_NUM_INPUTS, YOLO26_NUM_OUTPUTS, num_inputs, num_outputs
      );
      error!("{}", msg);
      return Err(Yolo26Error::invalid(&msg, rknpu::Error::InvalidModel));
    }

    info!("模型加载完成");
    Ok(Yolo26 {
      context,
      classes: self.classes,
      thresholds: self.thresholds,
    })
  }
}

/// 根据张量大小匹配回归和分类输出
/// 返回 (reg, cls) 元组，如果大小不匹配则返回 None
fn match_reg_cls_tensors<'a>(
  tensor1: &'a [f32],
  tensor2: &'a [f32],
  reg_expected: usize,
  cls_expected: usize,
  head_idx: usize,
) -> Result<(&'a [f32], &'a [f32]), Yolo26Error> {
  if tensor1.len() == reg_expected && tensor2.len() == cls_expected {
    Ok((tensor1, tensor2))
  } else if tensor1.len() == cls_expected && tensor2.len() == reg_expected {
    debug!("检测头 {}: 输出顺序交换", head_idx);
    Ok((tensor2, tensor1))
  } else {
    let msg = format!(
      "检测头 {}: 输出大小不匹配 - 张量1: {}, 张量2: {}, 期望回归: {}, 期望分类: {}",
      head_idx,
      tensor1.len(),
      tensor2.len(),
      reg_expected,
      cls_expected
    );
    error!("{}", msg);
    Err(Yolo26Error::OutputError(msg))
  }
}

/// 解码单个检测头的输出，框坐标为模型输入像素
fn decode_head(
  reg: &[f32],
  cls: &[f32],
  (map_h, map_w): (usize, usize),
  stride: f32,
  classes: usize,
  confidence: f32,
  items: &mut Vec<DetectItem>,
) {
  let spatial = map_h * map_w;
  for h in 0..map_h {
    for w in 0..map_w {
      let idx = h * map_w + w;

      let max_logit = (0..classes)
        .map(|c| cls[c * spatial + idx])
        .fold(f32::MIN, f32::max);
      let score = sigmoid(max_logit);
      if score < confidence {
        continue;
      }

      let grid_x = (w as f32) + 0.5;
      let grid_y = (h as f32) + 0.5;

      items.push(DetectItem {
        score,
        bbox: [
          ((grid_x - reg[idx]) * stride).clamp(0.0, YOLO26_INPUT_SIZE),
          ((grid_y - reg[spatial + idx]) * stride).clamp(0.0, YOLO26_INPUT_SIZE),
          ((grid_x + reg[2 * spatial + idx]) * stride).clamp(0.0, YOLO26_INPUT_SIZE),
          ((grid_y + reg[3 * spatial + idx]) * stride).clamp(0.0, YOLO26_INPUT_SIZE),
        ],
      });
    }
  }
}

impl Model for Yolo26 {
  type Input = ModelInputFrame;
  type Output = DetectResult;
  type Error = Yolo26Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("设置模型输入");
    self.context.set_input(
      0,
      input.as_nhwc(),
      rknpu::TensorFormat::NHWC,
      TensorType::UInt8,
    )?;

    debug!("执行模型推理");
    self.context.run()?;

    let output = self.context.get_outputs()?;
    let mut items = Vec::new();

    for (head_idx, (&head_size, stride)) in
      YOLO26_HEAD_SIZES.iter().zip(YOLO26_STRIDES).enumerate()
    {
      let spatial = head_size.0 * head_size.1;
      let reg_expected = 4 * spatial;
      let cls_expected = self.classes * spatial;

      // RKNN 输出顺序可能不同，需要根据张量大小判断回归与分类
      let tensor1 = output
        .get_f32(head_idx * 2)
        .map_err(|e| output_error(head_idx * 2, e))?;
      let tensor2 = output
        .get_f32(head_idx * 2 + 1)
        .map_err(|e| output_error(head_idx * 2 + 1, e))?;

      let (reg, cls) =
        match_reg_cls_tensors(tensor1, tensor2, reg_expected, cls_expected, head_idx)?;

      decode_head(
        reg,
        cls,
        head_size,
        stride,
        self.classes,
        self.thresholds.confidence,
        &mut items,
      );
    }

    debug!("置信度过滤后候选数: {}", items.len());
    let items = non_max_suppression(items, self.thresholds.iou);
    debug!("检测到 {} 个车牌", items.len());

    Ok(DetectResult::from(items))
  }
}

fn output_error(index: usize, e: impl std::fmt::Display) -> Yolo26Error {
  error!("获取第 {} 个输出失败: {}", index, e);
  Yolo26Error::OutputError(format!("无法获取第 {} 个输出: {}", index, e))
}

fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}
