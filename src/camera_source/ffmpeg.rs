//! ffmpeg-backed capture device
//!
//! One long-lived ffmpeg process reads the camera input and writes an MJPEG
//! stream to stdout. Frames are cut out of the stream on JPEG SOI/EOI markers.

use super::{CaptureDevice, DeviceOpener, Frame, JPEG_EOI, JPEG_SOI};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

/// Upper bound on buffered stream bytes before the splitter resyncs
const MAX_BUFFERED_BYTES: usize = 8 * 1024 * 1024;

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Opens ffmpeg capture processes
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    /// ffmpeg input, e.g. `/dev/video0` or an RTSP URL
    input: String,
    /// ffmpeg input format, e.g. `v4l2`; empty lets ffmpeg probe
    format: String,
    /// Bound on a single frame read
    frame_timeout: Duration,
}

impl FfmpegOpener {
    pub fn new(input: String, format: String, frame_timeout: Duration) -> Self {
        Self {
            input,
            format,
            frame_timeout,
        }
    }

    fn args(&self) -> Vec<String> {
        let mut args = vec!["-loglevel".to_string(), "error".to_string()];
        if self.input.starts_with("rtsp://") {
            args.extend(["-rtsp_transport".to_string(), "tcp".to_string()]);
        }
        if !self.format.is_empty() {
            args.extend(["-f".to_string(), self.format.clone()]);
        }
        args.extend(
            [
                "-i",
                self.input.as_str(),
                "-f",
                "image2pipe",
                "-vcodec",
                "mjpeg",
                "-q:v",
                "5",
                "-",
            ]
            .map(String::from),
        );
        args
    }
}

#[async_trait]
impl DeviceOpener for FfmpegOpener {
    async fn open(&self) -> Result<Box<dyn CaptureDevice>> {
        // kill_on_drop ensures the ffmpeg process never outlives its handle
        let mut child = Command::new("ffmpeg")
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Device(format!("ffmpeg spawn failed: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Device("ffmpeg stdout not captured".to_string()))?;

        let mut device = FfmpegDevice {
            child,
            stdout,
            splitter: MjpegSplitter::default(),
            read_buf: vec![0u8; READ_CHUNK_BYTES],
            frame_timeout: self.frame_timeout,
        };

        // The process starts even when the device is missing; only a first
        // frame proves the handle is usable.
        device.read_frame().await.map_err(|e| {
            device.release();
            Error::Device(format!("camera {} produced no frame: {}", self.input, e))
        })?;

        tracing::debug!(input = %self.input, format = %self.format, "ffmpeg capture started");
        Ok(Box::new(device))
    }
}

struct FfmpegDevice {
    child: Child,
    stdout: ChildStdout,
    splitter: MjpegSplitter,
    read_buf: Vec<u8>,
    frame_timeout: Duration,
}

impl FfmpegDevice {
    async fn next_jpeg(&mut self) -> Result<Vec<u8>> {
        loop {
            if let Some(frame) = self.splitter.next_frame() {
                return Ok(frame);
            }

            let n = self.stdout.read(&mut self.read_buf).await?;
            if n == 0 {
                return Err(Error::Device("capture stream ended".to_string()));
            }
            self.splitter.push(&self.read_buf[..n]);
        }
    }
}

#[async_trait]
impl CaptureDevice for FfmpegDevice {
    fn is_opened(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn read_frame(&mut self) -> Result<Frame> {
        match tokio::time::timeout(self.frame_timeout, self.next_jpeg()).await {
            Ok(Ok(data)) => Ok(Frame::new(data)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::Device(format!(
                "frame read timed out after {}ms",
                self.frame_timeout.as_millis()
            ))),
        }
    }

    fn release(&mut self) {
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "ffmpeg already exited");
        }
    }
}

/// Splits an MJPEG byte stream into complete JPEG images
#[derive(Debug, Default)]
pub struct MjpegSplitter {
    buf: Vec<u8>,
}

impl MjpegSplitter {
    /// Append stream bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);

        if self.buf.len() > MAX_BUFFERED_BYTES {
            tracing::warn!(buffered = self.buf.len(), "MJPEG buffer overflow, resyncing");
            // A frame starting at 0 is the one that overflowed; drop it whole
            match rfind(&self.buf, &JPEG_SOI) {
                Some(start) if start > 0 => {
                    self.buf.drain(..start);
                }
                _ => self.buf.clear(),
            }
        }
    }

    /// Take the oldest complete JPEG image, if any
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let Some(start) = find(&self.buf, &JPEG_SOI, 0) else {
            // Keep a trailing 0xFF in case a marker straddles two chunks
            let keep = usize::from(self.buf.last() == Some(&0xFF));
            let len = self.buf.len();
            self.buf.drain(..len - keep);
            return None;
        };

        if start > 0 {
            self.buf.drain(..start);
        }

        let end = find(&self.buf, &JPEG_EOI, JPEG_SOI.len())? + JPEG_EOI.len();
        Some(self.buf.drain(..end).collect())
    }

    /// Bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

fn find(haystack: &[u8], needle: &[u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

fn rfind(haystack: &[u8], needle: &[u8; 2]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
