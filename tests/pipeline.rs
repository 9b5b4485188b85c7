// 该文件是 Chepai （车牌） 项目的一部分。
// tests/pipeline.rs - 车牌识别流程集成测试
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

use std::cell::RefCell;

use image::{DynamicImage, Rgb, RgbImage};

use chepai::{
  frame::ModelInputFrame,
  geometry::PlateBox,
  input::SourceFrame,
  model::{DetectItem, DetectResult, Model},
  ocr::{Recognizer, TextCandidate},
  output::draw::Draw,
  pipeline::{PipelineError, PlatePipeline},
  preprocess::PreprocessMode,
};

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

struct FixedDetector {
  boxes: Vec<[f32; 4]>,
}

impl FixedDetector {
  fn new(boxes: &[[f32; 4]]) -> Self {
    Self {
      boxes: boxes.to_vec(),
    }
  }
}

impl Model for FixedDetector {
  type Input = ModelInputFrame;
  type Output = DetectResult;
  type Error = std::io::Error;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    assert_eq!((input.width(), input.height()), (640, 640));
    let items: Vec<DetectItem> = self
      .boxes
      .iter()
      .map(|&bbox| DetectItem { score: 0.8, bbox })
      .collect();
    Ok(DetectResult::from(items))
  }
}

struct FailingDetector;

impl Model for FailingDetector {
  type Input = ModelInputFrame;
  type Output = DetectResult;
  type Error = std::io::Error;

  fn infer(&self, _: &Self::Input) -> Result<Self::Output, Self::Error> {
    Err(std::io::Error::other("model crashed"))
  }
}

/// 记录每次调用收到的图像，并按顺序返回预设文字
#[derive(Default)]
struct ScriptedRecognizer {
  texts: Vec<&'static str>,
  seen: RefCell<Vec<DynamicImage>>,
}

impl ScriptedRecognizer {
  fn new(texts: &[&'static str]) -> Self {
    Self {
      texts: texts.to_vec(),
      seen: RefCell::default(),
    }
  }

  fn calls(&self) -> usize {
    self.seen.borrow().len()
  }
}

impl Recognizer for &ScriptedRecognizer {
  type Error = std::io::Error;

  fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextCandidate>, Self::Error> {
    let index = self.seen.borrow().len();
    self.seen.borrow_mut().push(image.clone());
    Ok(match self.texts.get(index) {
      Some(text) if !text.is_empty() => vec![
        TextCandidate::new(*text, Some(0.9)),
        TextCandidate::new("IGNORED", Some(0.1)),
      ],
      _ => Vec::new(),
    })
  }
}

struct FailingRecognizer;

impl Recognizer for FailingRecognizer {
  type Error = std::io::Error;

  fn recognize(&self, _: &DynamicImage) -> Result<Vec<TextCandidate>, Self::Error> {
    Err(std::io::Error::other("ocr crashed"))
  }
}

fn gray_frame(width: u32, height: u32) -> RgbImage {
  RgbImage::from_fn(width, height, |x, y| {
    let v = ((x * 7 + y * 3) % 200) as u8 + 20;
    Rgb([v, v, v])
  })
}

#[test]
fn rescales_boxes_from_model_space() {
  let recognizer = ScriptedRecognizer::new(&["AB123", "CD456"]);
  let pipeline = PlatePipeline::new(
    FixedDetector::new(&[[100.0, 100.0, 200.0, 150.0], [100.0, 200.0, 200.0, 300.0]]),
    &recognizer,
  );

  let mut frame = gray_frame(1280, 720);
  let records = pipeline.detect(&mut frame).unwrap();

  assert_eq!(records.len(), 2);
  assert_eq!(records[0].bbox, PlateBox::new(200, 112, 400, 168));
  assert_eq!(records[0].text, "AB123");
  assert_eq!(records[1].bbox, PlateBox::new(200, 225, 400, 337));
  assert_eq!(records[1].text, "CD456");
  assert_eq!(records[0].score, 0.8);

  // 每个框都被标注
  assert_eq!(*frame.get_pixel(200, 140), GREEN);
  assert_eq!(*frame.get_pixel(200, 280), GREEN);
}

#[test]
fn one_record_per_detection_and_degenerate_boxes_skip_ocr() {
  let recognizer = ScriptedRecognizer::new(&["AAA", "BBB"]);
  let pipeline = PlatePipeline::new(
    FixedDetector::new(&[
      [10.0, 10.0, 100.0, 60.0],
      // 宽度为零
      [300.0, 300.0, 300.0, 350.0],
      // 完全在图像外，截断后退化
      [700.0, 700.0, 800.0, 800.0],
      [400.0, 400.0, 500.0, 450.0],
    ]),
    &recognizer,
  );

  let mut frame = gray_frame(640, 480);
  let records = pipeline.detect(&mut frame).unwrap();

  assert_eq!(records.len(), 4);
  assert_eq!(recognizer.calls(), 2);
  assert_eq!(records[0].text, "AAA");
  assert_eq!(records[1].text, "");
  assert!(records[1].bbox.is_degenerate());
  assert_eq!(records[2].text, "");
  assert!(records[2].bbox.is_degenerate());
  assert_eq!(records[3].text, "BBB");

  for record in &records {
    let b = record.bbox;
    assert!(b.x1 <= b.x2 && b.x2 <= 640);
    assert!(b.y1 <= b.y2 && b.y2 <= 480);
  }
}

#[test]
fn no_detections_leave_the_frame_untouched() {
  let recognizer = ScriptedRecognizer::new(&[]);
  let pipeline = PlatePipeline::new(FixedDetector::new(&[]), &recognizer);

  let original = gray_frame(320, 240);
  let mut frame = original.clone();
  let records = pipeline.detect(&mut frame).unwrap();

  assert!(records.is_empty());
  assert_eq!(recognizer.calls(), 0);
  assert_eq!(frame, original);
}

#[test]
fn empty_text_is_drawn_as_plate() {
  let recognizer = ScriptedRecognizer::new(&[""]);
  let pipeline = PlatePipeline::new(
    FixedDetector::new(&[[100.0, 200.0, 300.0, 260.0]]),
    &recognizer,
  );

  let original = gray_frame(640, 640);
  let mut frame = original.clone();
  let records = pipeline.detect(&mut frame).unwrap();
  assert_eq!(records[0].text, "");

  let mut expected = original;
  Draw::default().annotate(&mut expected, &records[0].bbox, "Plate");
  assert_eq!(frame, expected);
}

#[test]
fn annotation_is_overwrite_stable() {
  let recognizer = ScriptedRecognizer::new(&["KA01AB1234"]);
  let pipeline = PlatePipeline::new(
    FixedDetector::new(&[[50.0, 300.0, 250.0, 350.0]]),
    &recognizer,
  );

  let mut frame = gray_frame(640, 640);
  let records = pipeline.detect(&mut frame).unwrap();
  let once = frame.clone();
  pipeline.draw().annotate_all(&mut frame, &records);
  assert_eq!(frame, once);
}

#[test]
fn crops_never_contain_earlier_annotations() {
  let recognizer = ScriptedRecognizer::new(&["A", "B"]);
  let pipeline = PlatePipeline::new(
    FixedDetector::new(&[[100.0, 100.0, 300.0, 200.0], [150.0, 120.0, 350.0, 220.0]]),
    &recognizer,
  )
  .with_preprocess(PreprocessMode::Raw);

  let mut frame = gray_frame(640, 640);
  pipeline.detect(&mut frame).unwrap();

  let seen = recognizer.seen.borrow();
  assert_eq!(seen.len(), 2);
  for crop in seen.iter() {
    let crop = crop.to_rgb8();
    assert!(crop.pixels().all(|p| *p != GREEN));
  }
  assert_eq!(seen[1].width(), 200);
  assert_eq!(seen[1].height(), 100);
}

#[test]
fn binarized_crops_reach_the_recognizer() {
  let recognizer = ScriptedRecognizer::new(&["X"]);
  let pipeline = PlatePipeline::new(
    FixedDetector::new(&[[0.0, 0.0, 320.0, 320.0]]),
    &recognizer,
  );

  let mut frame = gray_frame(64, 64);
  pipeline.detect(&mut frame).unwrap();

  let seen = recognizer.seen.borrow();
  let crop = seen[0].as_luma8().expect("binarized crop is grayscale");
  assert_eq!(crop.dimensions(), (32, 32));
  assert!(crop.pixels().all(|p| p[0] == 0 || p[0] == 255));
}

#[test]
fn pipeline_as_model_does_not_touch_the_frame() {
  let recognizer = ScriptedRecognizer::new(&["AB"]);
  let pipeline = PlatePipeline::new(
    FixedDetector::new(&[[10.0, 10.0, 200.0, 100.0]]),
    &recognizer,
  );

  let frame = SourceFrame::new("car.png", gray_frame(320, 320));
  let records = pipeline.infer(&frame).unwrap();
  assert_eq!(records.len(), 1);
  assert_eq!(frame.image, gray_frame(320, 320));
  assert_eq!(
    serde_json::to_value(&records[0]).unwrap(),
    serde_json::json!({"bbox": [5, 5, 100, 50], "text": "AB", "score": 0.8f32})
  );
}

#[test]
fn errors_propagate_with_their_source() {
  let recognizer = ScriptedRecognizer::new(&[]);
  let pipeline = PlatePipeline::new(FailingDetector, &recognizer);
  let mut frame = gray_frame(64, 64);
  assert!(matches!(
    pipeline.detect(&mut frame),
    Err(PipelineError::Model(_))
  ));

  let pipeline = PlatePipeline::new(
    FixedDetector::new(&[[0.0, 0.0, 320.0, 320.0]]),
    FailingRecognizer,
  );
  let original = gray_frame(64, 64);
  let mut frame = original.clone();
  assert!(matches!(
    pipeline.detect(&mut frame),
    Err(PipelineError::Recognizer(_))
  ));
  assert_eq!(frame, original);
}
