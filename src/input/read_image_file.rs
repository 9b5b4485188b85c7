// 该文件是 Chepai （车牌） 项目的一部分。
// src/input/read_image_file.rs - 单个图像文件输入
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

use std::path::Path;

use thiserror::Error;
use tracing::{error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{SourceFrame, file_name, load_rgb_image},
  utils::url_path,
};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像读取错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

/// 读取单张图像，只产生一帧
pub struct ImageFileInput {
  frame: Option<SourceFrame>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch);
    }

    let path = url_path(url);
    let image = load_rgb_image(Path::new(&path))?;
    info!("读取图像 {}，尺寸 {}x{}", path, image.width(), image.height());

    let name = file_name(Path::new(&path));
    Ok(ImageFileInput {
      frame: Some(SourceFrame::new(name, image)),
    })
  }
}

impl Iterator for ImageFileInput {
  type Item = SourceFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn yields_the_image_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("car.png");
    RgbImage::from_pixel(8, 6, Rgb([1, 2, 3])).save(&path).unwrap();

    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();

    let frame = input.next().unwrap();
    assert_eq!(frame.name, "car.png");
    assert_eq!(frame.image.dimensions(), (8, 6));
    assert!(input.next().is_none());
  }

  #[test]
  fn unreadable_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.jpg");
    std::fs::write(&path, b"not an image").unwrap();
    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    assert!(ImageFileInput::from_url(&url).is_err());

    let missing = Url::parse(&format!("image://{}/none.png", dir.path().display())).unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&missing),
      Err(ImageFileInputError::ImageLoadError(_))
    ));
  }
}
