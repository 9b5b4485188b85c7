// 该文件是 Chepai （车牌） 项目的一部分。
// src/train.rs - 调用 Ultralytics 命令行微调车牌检测模型
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

use std::{
  path::{Path, PathBuf},
  process::Command,
};

use thiserror::Error;
use tracing::{error, info};

const DEFAULT_PROGRAM: &str = "yolo";
const DEFAULT_BASE_MODEL: &str = "yolov8n.pt";
const DEFAULT_DATA: &str = "data/licence_plate_dataset/data.yaml";
const DEFAULT_PROJECT: &str = "runs/detect";
const DEFAULT_NAME: &str = "train";

#[derive(Error, Debug)]
pub enum TrainError {
  #[error("数据集描述文件不存在: {0}")]
  DatasetMissing(PathBuf),
  #[error("无法启动训练程序 {0}: {1}")]
  SpawnError(String, std::io::Error),
  #[error("训练程序异常退出: {0}")]
  Failed(String),
  #[error("训练完成但未找到权重文件: {0}")]
  WeightsMissing(PathBuf),
}

/// 训练超参数
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
  /// 预训练模型标识或权重路径
  pub base_model: String,
  /// Ultralytics `data.yaml`
  pub data: PathBuf,
  pub epochs: u32,
  pub imgsz: u32,
  pub batch: u32,
  pub device: String,
  pub project: PathBuf,
  pub name: String,
}

impl Default for TrainConfig {
  fn default() -> Self {
    Self {
      base_model: DEFAULT_BASE_MODEL.to_string(),
      data: PathBuf::from(DEFAULT_DATA),
      epochs: 20,
      imgsz: 640,
      batch: 8,
      device: "cpu".to_string(),
      project: PathBuf::from(DEFAULT_PROJECT),
      name: DEFAULT_NAME.to_string(),
    }
  }
}

impl TrainConfig {
  /// 训练产出的最优权重
  pub fn best_weights(&self) -> PathBuf {
    self.project.join(&self.name).join("weights").join("best.pt")
  }
}

pub struct Trainer {
  program: String,
  config: TrainConfig,
}

impl Trainer {
  pub fn new(config: TrainConfig) -> Self {
    Self {
      program: DEFAULT_PROGRAM.to_string(),
      config,
    }
  }

  /// 替换外部训练程序（默认为 PATH 中的 `yolo`）
  pub fn with_program(mut self, program: impl Into<String>) -> Self {
    self.program = program.into();
    self
  }

  pub fn config(&self) -> &TrainConfig {
    &self.config
  }

  pub fn train_args(&self) -> Vec<String> {
    let c = &self.config;
    vec![
      "detect".to_string(),
      "train".to_string(),
      format!("model={}", c.base_model),
      format!("data={}", c.data.display()),
      format!("epochs={}", c.epochs),
      format!("imgsz={}", c.imgsz),
      format!("batch={}", c.batch),
      format!("device={}", c.device),
      format!("project={}", c.project.display()),
      format!("name={}", c.name),
      // 保证权重路径与 best_weights 一致
      "exist_ok=True".to_string(),
    ]
  }

  pub fn export_args(&self, weights: &Path) -> Vec<String> {
    vec![
      "export".to_string(),
      format!("model={}", weights.display()),
      "format=onnx".to_string(),
      format!("imgsz={}", self.config.imgsz),
    ]
  }

  /// 运行训练，返回最优权重路径
  pub fn run(&self) -> Result<PathBuf, TrainError> {
    if !self.config.data.is_file() {
      error!("数据集描述文件不存在: {}", self.config.data.display());
      return Err(TrainError::DatasetMissing(self.config.data.clone()));
    }

    info!(
      "开始训练: {} 轮，输入 {}，批大小 {}，设备 {}",
      self.config.epochs, self.config.imgsz, self.config.batch, self.config.device
    );
    self.invoke(&self.train_args())?;

    let weights = self.config.best_weights();
    if !weights.is_file() {
      return Err(TrainError::WeightsMissing(weights));
    }
    info!("训练完成，权重文件: {}", weights.display());
    Ok(weights)
  }

  /// 将权重导出为 ONNX，返回导出文件路径
  pub fn export(&self, weights: &Path) -> Result<PathBuf, TrainError> {
    info!("导出 ONNX 模型: {}", weights.display());
    self.invoke(&self.export_args(weights))?;

    let onnx = weights.with_extension("onnx");
    if !onnx.is_file() {
      return Err(TrainError::WeightsMissing(onnx));
    }
    info!("导出完成: {}", onnx.display());
    Ok(onnx)
  }

  fn invoke(&self, args: &[String]) -> Result<(), TrainError> {
    let status = Command::new(&self.program)
      .args(args)
      .status()
      .map_err(|e| TrainError::SpawnError(self.program.clone(), e))?;

    if status.success() {
      Ok(())
    } else {
      error!("{} 退出状态: {}", self.program, status);
      Err(TrainError::Failed(status.to_string()))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_arguments_match_the_reference_run() {
    let trainer = Trainer::new(TrainConfig::default());
    let args = trainer.train_args();
    assert_eq!(&args[..2], &["detect", "train"]);
    for expected in [
      "model=yolov8n.pt",
      "data=data/licence_plate_dataset/data.yaml",
      "epochs=20",
      "imgsz=640",
      "batch=8",
      "device=cpu",
    ] {
      assert!(args.iter().any(|a| a == expected), "missing {}", expected);
    }
    assert_eq!(
      trainer.config().best_weights(),
      PathBuf::from("runs/detect/train/weights/best.pt")
    );
  }

  #[test]
  fn export_targets_onnx() {
    let trainer = Trainer::new(TrainConfig::default());
    let args = trainer.export_args(Path::new("w/best.pt"));
    assert_eq!(args, vec!["export", "model=w/best.pt", "format=onnx", "imgsz=640"]);
  }

  #[test]
  fn missing_dataset_is_reported_before_spawning() {
    let trainer = Trainer::new(TrainConfig {
      data: PathBuf::from("/nonexistent/data.yaml"),
      ..TrainConfig::default()
    })
    .with_program("/nonexistent/yolo");
    assert!(matches!(trainer.run(), Err(TrainError::DatasetMissing(_))));
  }

  #[test]
  fn missing_program_is_a_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data.yaml");
    std::fs::write(&data, "names: [plate]\n").unwrap();
    let trainer = Trainer::new(TrainConfig {
      data,
      ..TrainConfig::default()
    })
    .with_program("/nonexistent/yolo");
    assert!(matches!(trainer.run(), Err(TrainError::SpawnError(..))));
  }
}
