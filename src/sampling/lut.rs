//! Caller-owned LUT slots and their get-or-create lifecycle.
//!
//! A [`LutHandle`] starts empty. [`LutHandle::ensure`] fingerprints the
//! request; a matching fingerprint reuses the resident table untouched,
//! anything else regenerates it. Regeneration uploads in place when the
//! texture shape is unchanged and recreates the texture otherwise. The
//! texture is released with [`LutHandle::release`] or when the handle drops.

use log::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use super::device::{GpuContext, LutShape};
use super::error::NotApplicable;
use super::filters::{FilterConfig, FilterRequest, GeneratedFilter, generate_filter};
use super::types::ResourceName;
use super::utils::encode_f16_texels;

/// What a sampler asks the LUT manager for.
#[derive(Clone, Copy, Debug)]
pub struct LutRequest<'a> {
    pub config: &'a FilterConfig,
    pub entries: u32,
    pub cutoff: f32,
    pub antiring: f32,
    /// Effective widening factor (`1` unless downscaling with widening).
    pub filter_scale: f64,
}

impl LutRequest<'_> {
    /// Stable hash of everything that shapes the table contents.
    ///
    /// The cutoff and antiring strength only feed polar tables; separable
    /// antiringing happens in the shader.
    pub fn fingerprint(&self) -> Result<u64, NotApplicable> {
        let mut bytes = serde_json::to_vec(self.config)
            .map_err(|e| NotApplicable::LutUnavailable(e.to_string()))?;
        bytes.extend_from_slice(&self.entries.to_le_bytes());
        bytes.extend_from_slice(&self.filter_scale.to_bits().to_le_bytes());
        if self.config.polar {
            bytes.extend_from_slice(&self.cutoff.to_bits().to_le_bytes());
            bytes.extend_from_slice(&self.antiring.clamp(0.0, 1.0).to_bits().to_le_bytes());
        }
        bytes.push(self.config.polar as u8);
        Ok(xxh3_64(&bytes))
    }
}

/// Resource name and table layout of a resident LUT.
#[derive(Clone, Debug, PartialEq)]
pub struct LutInfo {
    pub name: ResourceName,
    pub shape: LutShape,
    pub polar: bool,
    pub entries: u32,
    pub row_size: u32,
    pub row_stride: u32,
    pub radius: f64,
    pub radius_cutoff: f64,
}

struct Resident {
    owner: GpuContext,
    name: ResourceName,
    fingerprint: u64,
    shape: LutShape,
    filter: GeneratedFilter,
}

impl Resident {
    fn info(&self) -> LutInfo {
        LutInfo {
            name: self.name.clone(),
            shape: self.shape,
            polar: self.filter.polar,
            entries: self.filter.entries,
            row_size: self.filter.row_size,
            row_stride: self.filter.row_stride,
            radius: self.filter.radius,
            radius_cutoff: self.filter.radius_cutoff,
        }
    }
}

#[derive(Default)]
pub struct LutHandle {
    resident: Option<Resident>,
    constructions: u64,
    regenerations: u64,
}

impl LutHandle {
    pub fn is_empty(&self) -> bool {
        self.resident.is_none()
    }

    pub fn name(&self) -> Option<&ResourceName> {
        self.resident.as_ref().map(|r| &r.name)
    }

    pub fn fingerprint(&self) -> Option<u64> {
        self.resident.as_ref().map(|r| r.fingerprint)
    }

    /// The table currently resident, as uploaded (before half encoding).
    pub fn filter(&self) -> Option<&GeneratedFilter> {
        self.resident.as_ref().map(|r| &r.filter)
    }

    /// Tables computed so far, including the first.
    pub fn constructions(&self) -> u64 {
        self.constructions
    }

    /// Tables computed to replace an already resident one.
    pub fn regenerations(&self) -> u64 {
        self.regenerations
    }

    /// Make the slot hold a table matching `req` on `ctx`'s device.
    pub fn ensure(
        &mut self,
        ctx: &GpuContext,
        req: &LutRequest<'_>,
    ) -> Result<LutInfo, NotApplicable> {
        let fingerprint = req.fingerprint()?;
        if let Some(r) = &self.resident {
            if r.owner.id() == ctx.id() && r.fingerprint == fingerprint {
                debug!("reusing LUT {} ({:016x})", r.name, fingerprint);
                return Ok(r.info());
            }
        }

        let filter = generate_filter(&FilterRequest {
            config: req.config,
            entries: req.entries,
            filter_scale: req.filter_scale,
            cutoff: req.cutoff as f64,
            antiring: req.antiring as f64,
        })
        .map_err(|e| NotApplicable::LutUnavailable(format!("{e:#}")))?;
        let shape = filter.lut_shape();
        let max = ctx.caps().max_texture_dimension_2d;
        if shape.width > max || shape.height > max {
            return Err(NotApplicable::LutUnavailable(format!(
                "{}x{} LUT exceeds the device limit of {max}",
                shape.width, shape.height
            )));
        }
        let texels = encode_f16_texels(&filter.weights);

        let replacing = self.resident.is_some();
        let name = match self.resident.take() {
            Some(old) if old.owner.id() == ctx.id() && old.shape == shape => {
                match ctx.device().update_lut(&old.name, shape, &texels) {
                    Ok(()) => {
                        debug!("updated LUT {} in place ({:016x})", old.name, fingerprint);
                        old.name
                    }
                    Err(e) => {
                        warn!("in-place update of LUT {} failed: {e}", old.name);
                        ctx.device().release_lut(&old.name);
                        self.create(ctx, shape, &texels)?
                    }
                }
            }
            Some(old) => {
                debug!("dropping LUT {} (shape or context changed)", old.name);
                old.owner.device().release_lut(&old.name);
                self.create(ctx, shape, &texels)?
            }
            None => self.create(ctx, shape, &texels)?,
        };

        self.constructions += 1;
        if replacing {
            self.regenerations += 1;
        }
        let resident = Resident {
            owner: ctx.clone(),
            name,
            fingerprint,
            shape,
            filter,
        };
        let info = resident.info();
        self.resident = Some(resident);
        Ok(info)
    }

    fn create(
        &self,
        ctx: &GpuContext,
        shape: LutShape,
        texels: &[u8],
    ) -> Result<ResourceName, NotApplicable> {
        let name = ctx.next_lut_name();
        ctx.device().create_lut(&name, shape, texels).map_err(|e| {
            warn!("creating LUT {name} failed: {e}");
            NotApplicable::LutUnavailable(e.to_string())
        })?;
        debug!(
            "created LUT {name}: {}x{} {:?}",
            shape.width, shape.height, shape.format
        );
        Ok(name)
    }

    /// Free the GPU texture. The slot becomes empty.
    pub fn release(&mut self) {
        if let Some(r) = self.resident.take() {
            debug!("releasing LUT {}", r.name);
            r.owner.device().release_lut(&r.name);
        }
    }
}

impl Drop for LutHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for LutHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LutHandle")
            .field("name", &self.name())
            .field("fingerprint", &self.fingerprint())
            .field("constructions", &self.constructions)
            .finish()
    }
}
