//! CameraSource - Single shared capture handle
//!
//! ## Responsibilities
//!
//! - Lazily open the capture device and keep it open across requests
//! - Serialize open/read/encode behind one lock
//! - Return one fresh JPEG still per call
//! - Reopen once when a read fails
//!
//! State: `CLOSED -> OPEN` on a successful open, back to `CLOSED` on
//! `release()` or when a failed read forces reinitialization.

mod ffmpeg;

pub use ffmpeg::{FfmpegOpener, MjpegSplitter};

use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

const OPEN_FAILED: &str = "Cannot open camera";
const CAPTURE_FAILED: &str = "Failed to capture image";

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// One still frame as delivered by the device
#[derive(Debug, Clone)]
pub struct Frame {
    data: Vec<u8>,
}

impl Frame {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Encode as JPEG bytes
    ///
    /// Devices deliver MJPEG frames, so this only checks the SOI/EOI markers.
    pub fn into_jpeg(self) -> Result<Vec<u8>> {
        if self.data.starts_with(&JPEG_SOI) && self.data.ends_with(&JPEG_EOI) {
            Ok(self.data)
        } else {
            Err(Error::Device(format!(
                "frame is not a complete JPEG image ({} bytes)",
                self.data.len()
            )))
        }
    }
}

/// An open capture handle
#[async_trait]
pub trait CaptureDevice: Send {
    /// Whether the handle is still usable
    fn is_opened(&mut self) -> bool;

    /// Read the next frame
    async fn read_frame(&mut self) -> Result<Frame>;

    /// Close the handle
    fn release(&mut self);
}

/// Opens capture handles
#[async_trait]
pub trait DeviceOpener: Send + Sync {
    async fn open(&self) -> Result<Box<dyn CaptureDevice>>;
}

/// Shared camera resource owned by the server
pub struct CameraSource {
    opener: Arc<dyn DeviceOpener>,
    handle: Mutex<Option<Box<dyn CaptureDevice>>>,
    open_count: AtomicU64,
}

impl CameraSource {
    pub fn new(opener: Arc<dyn DeviceOpener>) -> Self {
        Self {
            opener,
            handle: Mutex::new(None),
            open_count: AtomicU64::new(0),
        }
    }

    /// Grab one fresh frame as JPEG bytes
    pub async fn grab_frame(&self) -> Result<Vec<u8>> {
        let started = Instant::now();
        let mut handle = self.handle.lock().await;

        let device = self.ensure_open(&mut handle).await?;

        // Drop one buffered frame so the caller gets a current one
        if let Err(e) = device.read_frame().await {
            tracing::debug!(error = %e, "Discard read failed");
        }

        let frame = match device.read_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Frame read failed, reinitializing camera");
                close(&mut handle);

                let device = self.ensure_open(&mut handle).await?;
                device.read_frame().await.map_err(|e| {
                    tracing::error!(error = %e, "Frame read failed after reinitialization");
                    Error::Device(CAPTURE_FAILED.to_string())
                })?
            }
        };

        let jpeg = frame.into_jpeg().map_err(|e| {
            tracing::error!(error = %e, "Frame encode failed");
            Error::Device(CAPTURE_FAILED.to_string())
        })?;

        tracing::debug!(
            size = jpeg.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Camera frame captured"
        );

        Ok(jpeg)
    }

    /// Close the handle; the next grab reopens it
    pub async fn release(&self) {
        let mut handle = self.handle.lock().await;
        if handle.is_some() {
            close(&mut handle);
            tracing::info!("Camera released");
        }
    }

    /// Whether a handle is currently held and healthy
    pub async fn is_open(&self) -> bool {
        let mut handle = self.handle.lock().await;
        handle.as_mut().map(|d| d.is_opened()).unwrap_or(false)
    }

    /// Number of successful device opens since startup
    pub fn open_count(&self) -> u64 {
        self.open_count.load(Ordering::Relaxed)
    }

    async fn ensure_open<'a>(
        &self,
        slot: &'a mut Option<Box<dyn CaptureDevice>>,
    ) -> Result<&'a mut Box<dyn CaptureDevice>> {
        let healthy = slot.as_mut().map(|d| d.is_opened()).unwrap_or(false);

        if !healthy {
            close(slot);

            tracing::info!("Initializing camera connection");
            let started = Instant::now();
            let device = self.opener.open().await.map_err(|e| {
                tracing::error!(
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Camera open failed"
                );
                Error::Device(OPEN_FAILED.to_string())
            })?;

            self.open_count.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Camera initialized"
            );
            *slot = Some(device);
        }

        slot.as_mut()
            .ok_or_else(|| Error::Internal("camera handle missing after open".to_string()))
    }
}

fn close(slot: &mut Option<Box<dyn CaptureDevice>>) {
    if let Some(mut device) = slot.take() {
        device.release();
    }
}

/// Wrap JPEG bytes as a `data:image/jpeg;base64,` URI
pub fn to_data_uri(jpeg: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(jpeg)
    )
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory device for tests

    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    /// Smallest byte string accepted as a JPEG frame
    pub fn tiny_jpeg() -> Vec<u8> {
        vec![0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9]
    }

    #[derive(Default)]
    pub struct Script {
        /// Read outcomes in order; an empty script always succeeds
        pub reads: std::sync::Mutex<VecDeque<std::result::Result<Vec<u8>, ()>>>,
        pub fail_open: AtomicBool,
        pub healthy: AtomicBool,
        pub opens: AtomicUsize,
        pub releases: AtomicUsize,
    }

    impl Script {
        pub fn new() -> Arc<Self> {
            let script = Self::default();
            script.healthy.store(true, Ordering::SeqCst);
            Arc::new(script)
        }

        pub fn push_read(&self, outcome: std::result::Result<Vec<u8>, ()>) {
            self.reads.lock().unwrap().push_back(outcome);
        }
    }

    pub struct ScriptedOpener(pub Arc<Script>);

    struct ScriptedDevice(Arc<Script>);

    #[async_trait]
    impl DeviceOpener for ScriptedOpener {
        async fn open(&self) -> Result<Box<dyn CaptureDevice>> {
            if self.0.fail_open.load(Ordering::SeqCst) {
                return Err(Error::Device("no such device".to_string()));
            }
            self.0.opens.fetch_add(1, Ordering::SeqCst);
            self.0.healthy.store(true, Ordering::SeqCst);
            Ok(Box::new(ScriptedDevice(self.0.clone())))
        }
    }

    #[async_trait]
    impl CaptureDevice for ScriptedDevice {
        fn is_opened(&mut self) -> bool {
            self.0.healthy.load(Ordering::SeqCst)
        }

        async fn read_frame(&mut self) -> Result<Frame> {
            let next = self.0.reads.lock().unwrap().pop_front();
            match next {
                None => Ok(Frame::new(tiny_jpeg())),
                Some(Ok(data)) => Ok(Frame::new(data)),
                Some(Err(())) => Err(Error::Device("read failed".to_string())),
            }
        }

        fn release(&mut self) {
            self.0.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn scripted_camera(script: &Arc<Script>) -> CameraSource {
        CameraSource::new(Arc::new(ScriptedOpener(script.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_first_grab_opens_second_reuses() {
        let script = Script::new();
        let camera = scripted_camera(&script);

        assert!(!camera.is_open().await);
        let jpeg = camera.grab_frame().await.unwrap();
        assert_eq!(jpeg, tiny_jpeg());
        camera.grab_frame().await.unwrap();

        assert_eq!(script.opens.load(Ordering::SeqCst), 1);
        assert_eq!(camera.open_count(), 1);
        assert!(camera.is_open().await);
    }

    #[tokio::test]
    async fn test_open_failure_is_device_error() {
        let script = Script::new();
        script.fail_open.store(true, Ordering::SeqCst);
        let camera = scripted_camera(&script);

        let err = camera.grab_frame().await.unwrap_err();
        assert!(matches!(err, Error::Device(ref msg) if msg == "Cannot open camera"));
        assert_eq!(camera.open_count(), 0);
    }

    #[tokio::test]
    async fn test_discards_one_buffered_frame() {
        let script = Script::new();
        script.push_read(Ok(vec![0xFF, 0xD8, 0xAA, 0xFF, 0xD9]));
        script.push_read(Ok(vec![0xFF, 0xD8, 0xBB, 0xFF, 0xD9]));
        let camera = scripted_camera(&script);

        let jpeg = camera.grab_frame().await.unwrap();
        assert_eq!(jpeg, vec![0xFF, 0xD8, 0xBB, 0xFF, 0xD9]);
    }

    #[tokio::test]
    async fn test_read_failure_reopens_once() {
        let script = Script::new();
        script.push_read(Ok(tiny_jpeg()));
        script.push_read(Err(()));
        let camera = scripted_camera(&script);

        camera.grab_frame().await.unwrap();
        assert_eq!(script.opens.load(Ordering::SeqCst), 2);
        assert_eq!(script.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_read_failure_is_device_error() {
        let script = Script::new();
        script.push_read(Ok(tiny_jpeg()));
        script.push_read(Err(()));
        script.push_read(Err(()));
        let camera = scripted_camera(&script);

        let err = camera.grab_frame().await.unwrap_err();
        assert!(matches!(err, Error::Device(ref msg) if msg == "Failed to capture image"));
        assert_eq!(script.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_closed_handle_is_reopened() {
        let script = Script::new();
        let camera = scripted_camera(&script);

        camera.grab_frame().await.unwrap();
        script.healthy.store(false, Ordering::SeqCst);
        camera.grab_frame().await.unwrap();

        assert_eq!(script.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_release_then_grab_reopens() {
        let script = Script::new();
        let camera = scripted_camera(&script);

        camera.grab_frame().await.unwrap();
        camera.release().await;
        assert!(!camera.is_open().await);
        assert_eq!(script.releases.load(Ordering::SeqCst), 1);

        camera.grab_frame().await.unwrap();
        assert_eq!(script.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_grabs_share_one_open() {
        let script = Script::new();
        let camera = Arc::new(scripted_camera(&script));

        let (a, b) = tokio::join!(camera.grab_frame(), camera.grab_frame());
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(script.opens.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_jpeg_frame_is_device_error() {
        let script = Script::new();
        script.push_read(Ok(tiny_jpeg()));
        script.push_read(Ok(vec![0x00, 0x01, 0x02]));
        let camera = scripted_camera(&script);

        assert!(matches!(camera.grab_frame().await, Err(Error::Device(_))));
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(to_data_uri(b"ABC"), "data:image/jpeg;base64,QUJD");
    }
}
