#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use forge_sampling::{
    DeviceCaps, DeviceError, GpuContext, GpuDevice, HeadlessDevice, LutShape, ResourceName,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LutEvent {
    Create(ResourceName, LutShape),
    Update(ResourceName, LutShape),
    Release(ResourceName),
}

/// Headless device that records every LUT operation.
pub struct RecordingDevice {
    inner: HeadlessDevice,
    events: Mutex<Vec<LutEvent>>,
    fail_updates: bool,
}

impl RecordingDevice {
    pub fn new(caps: DeviceCaps) -> Self {
        Self {
            inner: HeadlessDevice::new(caps),
            events: Mutex::new(Vec::new()),
            fail_updates: false,
        }
    }

    /// Reject in-place updates, to exercise the recreate fallback.
    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    pub fn events(&self) -> Vec<LutEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&LutEvent) -> bool) -> usize {
        self.events().iter().filter(|e| pred(e)).count()
    }

    pub fn creates(&self) -> usize {
        self.count(|e| matches!(e, LutEvent::Create(..)))
    }

    pub fn updates(&self) -> usize {
        self.count(|e| matches!(e, LutEvent::Update(..)))
    }

    pub fn releases(&self) -> usize {
        self.count(|e| matches!(e, LutEvent::Release(..)))
    }

    pub fn resident(&self) -> usize {
        self.inner.lut_count()
    }

    fn record(&self, event: LutEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl GpuDevice for RecordingDevice {
    fn caps(&self) -> DeviceCaps {
        self.inner.caps()
    }

    fn create_lut(
        &self,
        name: &ResourceName,
        shape: LutShape,
        texels: &[u8],
    ) -> Result<(), DeviceError> {
        self.inner.create_lut(name, shape, texels)?;
        self.record(LutEvent::Create(name.clone(), shape));
        Ok(())
    }

    fn update_lut(
        &self,
        name: &ResourceName,
        shape: LutShape,
        texels: &[u8],
    ) -> Result<(), DeviceError> {
        if self.fail_updates {
            return Err(DeviceError::UploadRejected("updates disabled".to_string()));
        }
        self.inner.update_lut(name, shape, texels)?;
        self.record(LutEvent::Update(name.clone(), shape));
        Ok(())
    }

    fn release_lut(&self, name: &ResourceName) {
        self.inner.release_lut(name);
        self.record(LutEvent::Release(name.clone()));
    }
}

pub fn recording_context(caps: DeviceCaps) -> (GpuContext, Arc<RecordingDevice>) {
    let dev = Arc::new(RecordingDevice::new(caps));
    (GpuContext::new(dev.clone()), dev)
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
