// 该文件是 Chepai （车牌） 项目的一部分。
// src/bin/train.rs - 微调车牌检测模型
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

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use chepai::train::{TrainConfig, Trainer};
use tracing::info;

/// 使用 Ultralytics 命令行在车牌数据集上微调检测模型
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 预训练模型
  #[arg(long, default_value = "yolov8n.pt", value_name = "MODEL")]
  pub model: String,
  /// 数据集描述文件
  #[arg(long, default_value = "data/licence_plate_dataset/data.yaml", value_name = "DATA")]
  pub data: PathBuf,
  /// 训练轮数
  #[arg(long, default_value_t = 20)]
  pub epochs: u32,
  /// 输入尺寸
  #[arg(long, default_value_t = 640)]
  pub imgsz: u32,
  /// 批大小
  #[arg(long, default_value_t = 8)]
  pub batch: u32,
  /// 训练设备，例如 cpu 或 0
  #[arg(long, default_value = "cpu")]
  pub device: String,
  /// 输出目录
  #[arg(long, default_value = "runs/detect")]
  pub project: PathBuf,
  /// 本次训练名称
  #[arg(long, default_value = "train")]
  pub name: String,
  /// 外部训练程序
  #[arg(long, default_value = "yolo")]
  pub program: String,
  /// 训练后导出 ONNX 模型
  #[arg(long)]
  pub export: bool,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let trainer = Trainer::new(TrainConfig {
    base_model: args.model,
    data: args.data,
    epochs: args.epochs,
    imgsz: args.imgsz,
    batch: args.batch,
    device: args.device,
    project: args.project,
    name: args.name,
  })
  .with_program(args.program);

  let weights = trainer.run()?;
  info!("最优权重: {}", weights.display());

  if args.export {
    let onnx = trainer.export(&weights)?;
    info!("可使用 --model onnx://{} 进行识别", onnx.display());
  }

  Ok(())
}
