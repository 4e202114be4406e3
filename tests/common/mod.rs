//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use rechtbank::analysis::{AnalysisRequest, Classifier, ClassifierError};

/// A well-formed model payload.
pub const PAYLOAD: &str = r#"{"observation":"Een houten eettafel","admissible":true,"score":6,"crime":"Horizontale ongehoorzaamheid","reasoning":"Overwegende dat Wetsartikel 3.14 van het Wetboek van Stoelgang...","sentence":"Het Hof gelast heroriëntatie","verdictType":"waarschuwing"}"#;

/// Deterministic, non-trivial pixel content so encoders cannot cheat.
pub fn noisy_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let v = (x.wrapping_mul(29) ^ y.wrapping_mul(13)) as u8;
        Rgb([v, v.wrapping_mul(3), (x / 4 + y / 4) as u8])
    })
}

pub fn jpeg_bytes(width: u32, height: u32, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), quality);
    DynamicImage::ImageRgb8(noisy_rgb(width, height))
        .write_with_encoder(encoder)
        .unwrap();
    buf
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(noisy_rgb(width, height))
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

pub fn dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}

/// One scripted classifier answer.
pub enum Step {
    Reply(Result<String, ClassifierError>),
    Hang,
}

pub fn ok() -> Step {
    Step::Reply(Ok(PAYLOAD.to_string()))
}

pub fn rate_limited() -> Step {
    Step::Reply(Err(ClassifierError::RateLimited { retry_after: None }))
}

/// Classifier that replays a script and records what it was sent.
pub struct ScriptedClassifier {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicU32,
    seen: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedClassifier {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into()),
            calls: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Image bytes received, one entry per call.
    pub fn seen(&self) -> Vec<Vec<u8>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn classify(&self, request: AnalysisRequest<'_>) -> Result<String, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.image.to_vec());
        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(r)) => r,
            Some(Step::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(PAYLOAD.to_string())
            }
            None => Err(ClassifierError::Other("script exhausted".to_string())),
        }
    }
}
