//! GPU device abstraction: capability query, LUT texture storage, and the
//! context token shared by shader builders and textures.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::error::DeviceError;
use super::types::ResourceName;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one GPU device context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    fn next() -> Self {
        ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// What the device can do, as far as shader selection is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCaps {
    pub compute_shaders: bool,
    /// `rgba16float` supports `STORAGE_BINDING` writes.
    pub storage_output: bool,
    pub max_workgroup_storage_bytes: u32,
    pub max_workgroup_invocations: u32,
    pub max_texture_dimension_2d: u32,
}

impl Default for DeviceCaps {
    /// WebGPU default limits with compute enabled.
    fn default() -> Self {
        Self {
            compute_shaders: true,
            storage_output: true,
            max_workgroup_storage_bytes: 16384,
            max_workgroup_invocations: 256,
            max_texture_dimension_2d: 8192,
        }
    }
}

impl DeviceCaps {
    /// Fragment-only device (e.g. GLES / WebGL2 downlevel).
    pub fn fragment_only() -> Self {
        Self {
            compute_shaders: false,
            storage_output: false,
            max_workgroup_storage_bytes: 0,
            max_workgroup_invocations: 0,
            ..Self::default()
        }
    }
}

/// Texel format of a LUT texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LutFormat {
    /// One weight per texel (polar tables).
    R16Float,
    /// Four consecutive taps per texel (separable rows).
    Rgba16Float,
}

impl LutFormat {
    pub fn components(self) -> u32 {
        match self {
            LutFormat::R16Float => 1,
            LutFormat::Rgba16Float => 4,
        }
    }

    pub fn bytes_per_texel(self) -> u32 {
        self.components() * 2
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LutShape {
    pub width: u32,
    pub height: u32,
    pub format: LutFormat,
}

impl LutShape {
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_texel() as usize
    }
}

/// The device operations the sampling code depends on.
///
/// `texels` are tightly packed little-endian half floats, `shape.byte_len()`
/// bytes long.
pub trait GpuDevice: Send + Sync {
    fn caps(&self) -> DeviceCaps;

    fn create_lut(
        &self,
        name: &ResourceName,
        shape: LutShape,
        texels: &[u8],
    ) -> Result<(), DeviceError>;

    /// Overwrite an existing LUT of identical shape.
    fn update_lut(
        &self,
        name: &ResourceName,
        shape: LutShape,
        texels: &[u8],
    ) -> Result<(), DeviceError>;

    fn release_lut(&self, name: &ResourceName);
}

pub(crate) fn check_lut_upload(
    caps: &DeviceCaps,
    shape: LutShape,
    texels: &[u8],
) -> Result<(), DeviceError> {
    let max = caps.max_texture_dimension_2d;
    if shape.width == 0 || shape.height == 0 || shape.width > max || shape.height > max {
        return Err(DeviceError::LutTooLarge {
            width: shape.width,
            height: shape.height,
            max,
        });
    }
    if texels.len() != shape.byte_len() {
        return Err(DeviceError::UploadRejected(format!(
            "expected {} bytes for {}x{} {:?}, got {}",
            shape.byte_len(),
            shape.width,
            shape.height,
            shape.format,
            texels.len()
        )));
    }
    Ok(())
}

/// Device that keeps LUT texels in host memory.
///
/// Used for offline shader generation and tests, where no adapter is needed.
pub struct HeadlessDevice {
    caps: DeviceCaps,
    luts: Mutex<HashMap<ResourceName, (LutShape, Vec<u8>)>>,
}

impl HeadlessDevice {
    pub fn new(caps: DeviceCaps) -> Self {
        Self {
            caps,
            luts: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot of a stored LUT.
    pub fn lut(&self, name: &ResourceName) -> Option<(LutShape, Vec<u8>)> {
        self.luts.lock().ok()?.get(name).cloned()
    }

    pub fn lut_count(&self) -> usize {
        self.luts.lock().map(|l| l.len()).unwrap_or(0)
    }
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new(DeviceCaps::default())
    }
}

impl GpuDevice for HeadlessDevice {
    fn caps(&self) -> DeviceCaps {
        self.caps
    }

    fn create_lut(
        &self,
        name: &ResourceName,
        shape: LutShape,
        texels: &[u8],
    ) -> Result<(), DeviceError> {
        check_lut_upload(&self.caps, shape, texels)?;
        let mut luts = self
            .luts
            .lock()
            .map_err(|_| DeviceError::UploadRejected("LUT store poisoned".to_string()))?;
        luts.insert(name.clone(), (shape, texels.to_vec()));
        Ok(())
    }

    fn update_lut(
        &self,
        name: &ResourceName,
        shape: LutShape,
        texels: &[u8],
    ) -> Result<(), DeviceError> {
        check_lut_upload(&self.caps, shape, texels)?;
        let mut luts = self
            .luts
            .lock()
            .map_err(|_| DeviceError::UploadRejected("LUT store poisoned".to_string()))?;
        match luts.get_mut(name) {
            Some(entry) if entry.0 == shape => {
                entry.1.copy_from_slice(texels);
                Ok(())
            }
            Some(_) => Err(DeviceError::UploadRejected(format!(
                "shape of `{name}` changed"
            ))),
            None => Err(DeviceError::UnknownLut(name.clone())),
        }
    }

    fn release_lut(&self, name: &ResourceName) {
        if let Ok(mut luts) = self.luts.lock() {
            luts.remove(name);
        }
    }
}

struct ContextInner {
    id: ContextId,
    caps: DeviceCaps,
    device: Arc<dyn GpuDevice>,
    lut_serial: AtomicU64,
}

/// Shared handle to one GPU device context.
///
/// Shader builders and textures each carry the [`ContextId`] of the context
/// they were created from; combining two different contexts is rejected.
#[derive(Clone)]
pub struct GpuContext {
    inner: Arc<ContextInner>,
}

impl GpuContext {
    pub fn new(device: Arc<dyn GpuDevice>) -> Self {
        let caps = device.caps();
        Self {
            inner: Arc::new(ContextInner {
                id: ContextId::next(),
                caps,
                device,
                lut_serial: AtomicU64::new(0),
            }),
        }
    }

    /// Context over a fresh [`HeadlessDevice`].
    pub fn headless(caps: DeviceCaps) -> Self {
        Self::new(Arc::new(HeadlessDevice::new(caps)))
    }

    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn caps(&self) -> DeviceCaps {
        self.inner.caps
    }

    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.inner.device
    }

    /// Fresh, context-unique LUT texture name.
    pub(crate) fn next_lut_name(&self) -> ResourceName {
        let serial = self.inner.lut_serial.fetch_add(1, Ordering::Relaxed);
        ResourceName::from(format!("sys.sampling.lut.{}.{}", self.inner.id.get(), serial))
    }
}

impl fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GpuContext")
            .field("id", &self.inner.id)
            .field("caps", &self.inner.caps)
            .finish()
    }
}
