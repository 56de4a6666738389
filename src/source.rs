// src/source.rs - Frame producers injected into a posture session
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::error::{PostureError, PostureResult};
use crate::keypoints::Frame;

/// A frame together with the time it was captured, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedFrame {
    pub timestamp: f64,
    pub frame: Frame,
}

/// Anything that yields detector output: a live model, a recording, a test
/// fixture. The tracker only ever pulls from it; it never constructs one.
pub trait KeypointSource {
    /// `Ok(None)` once the source is exhausted.
    fn next_frame(&mut self) -> PostureResult<Option<TimedFrame>>;
}

impl<S: KeypointSource + ?Sized> KeypointSource for Box<S> {
    fn next_frame(&mut self) -> PostureResult<Option<TimedFrame>> {
        (**self).next_frame()
    }
}

#[derive(Debug, Deserialize)]
struct FrameRecord {
    timestamp: Option<f64>,
    #[serde(default)]
    keypoints: Frame,
    /// Raw COCO-17 rows, as emitted by YOLO pose models.
    #[serde(default)]
    coco17: Option<Vec<[f64; 3]>>,
}

impl FrameRecord {
    fn frame(self) -> Frame {
        match self.coco17 {
            Some(rows) => Frame::from_coco17(&rows),
            None => self.keypoints,
        }
    }
}

/// Parses one frame record from a JSON object. A missing timestamp reads
/// as 0, which suits single still images.
pub fn parse_frame_record(json: &str) -> PostureResult<TimedFrame> {
    let record: FrameRecord = serde_json::from_str(json)?;
    Ok(TimedFrame {
        timestamp: record.timestamp.unwrap_or(0.0),
        frame: record.frame(),
    })
}

/// Replays detector output stored as JSON lines, one frame per line:
///
/// ```text
/// {"timestamp": 0.0, "keypoints": {"nose": {"x": 312.0, "y": 140.5, "confidence": 0.93}, ...}}
/// {"timestamp": 0.033, "coco17": [[312.0, 140.5, 0.93], ...]}
/// {"timestamp": 0.066, "keypoints": {}}
/// ```
///
/// An empty `keypoints` object is a frame with nobody in it. Every line
/// needs a `timestamp`, since windows close on the recorded clock.
pub struct JsonLinesSource<R> {
    reader: R,
    line_number: usize,
    buffer: String,
}

impl JsonLinesSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> PostureResult<Self> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened keypoint recording");
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buffer: String::new(),
        }
    }
}

impl<R: BufRead> KeypointSource for JsonLinesSource<R> {
    fn next_frame(&mut self) -> PostureResult<Option<TimedFrame>> {
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buffer.trim();
            if line.is_empty() {
                continue;
            }

            let malformed = |message: String| PostureError::MalformedFrame {
                line: self.line_number,
                message,
            };

            let record: FrameRecord =
                serde_json::from_str(line).map_err(|e| malformed(e.to_string()))?;
            let timestamp = record
                .timestamp
                .ok_or_else(|| malformed("missing timestamp".to_string()))?;

            return Ok(Some(TimedFrame {
                timestamp,
                frame: record.frame(),
            }));
        }
    }
}
