//! Shader builder the sampling entry points emit into.
//!
//! A builder accumulates bindings, module-scope helpers and body statements
//! for exactly one output color. [`ShaderBuilder::finish`] wraps them into a
//! standalone WGSL module: a fullscreen-triangle vertex + fragment pair, or a
//! compute entry writing an `rgba16float` storage texture when a sampler
//! opted into the compute path.
//!
//! Inside the body, `out_px: vec2f` is the center of the output pixel being
//! produced (in output pixel units). Compute bodies additionally see
//! `wg_px: vec2f` (center of the workgroup's first pixel) and
//! `lidx: u32` (local invocation index).

use std::collections::HashSet;

use log::trace;
use xxhash_rust::xxh3::xxh3_64;

use super::device::{ContextId, DeviceCaps, GpuContext};
use super::error::SamplingError;
use super::texture::SamplerKind;
use super::types::{ResourceName, TypedExpr};
use super::utils::ceil_div;

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";
pub const COMPUTE_ENTRY: &str = "cs_main";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindingKind {
    SourceTexture(ResourceName),
    SourceSampler(SamplerKind),
    LutTexture(ResourceName),
    /// Linear clamp sampler used for LUT lookups.
    LutSampler,
    /// `texture_storage_2d<rgba16float, write>` target of a compute shader.
    OutputStorage,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub group: u32,
    pub binding: u32,
    pub var: String,
    pub kind: BindingKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Fragment,
    Compute,
}

/// A finished, self-contained WGSL module plus what the host needs to run it.
#[derive(Clone, Debug)]
pub struct GeneratedShader {
    pub wgsl: String,
    pub stage: ShaderStage,
    pub bindings: Vec<Binding>,
    pub vertex_entry: Option<&'static str>,
    pub entry_point: &'static str,
    pub workgroup_size: Option<[u32; 2]>,
    /// Workgroup counts for the compute stage.
    pub dispatch: Option<[u32; 3]>,
    pub output_size: [u32; 2],
    /// xxh3 of `wgsl`, usable as a pipeline cache key.
    pub fingerprint: u64,
}

pub struct ShaderBuilder {
    ctx: GpuContext,
    allow_compute: bool,
    seed: f32,
    next_id: u32,
    bindings: Vec<Binding>,
    helper_keys: HashSet<&'static str>,
    header: Vec<String>,
    body: Vec<String>,
    output: Option<TypedExpr>,
    output_size: [u32; 2],
    /// Workgroup size once a sampler switched to the compute stage.
    compute: Option<[u32; 2]>,
}

impl ShaderBuilder {
    pub fn new(ctx: &GpuContext) -> Self {
        Self {
            ctx: ctx.clone(),
            allow_compute: true,
            seed: 0.0,
            next_id: 0,
            bindings: Vec::new(),
            helper_keys: HashSet::new(),
            header: Vec::new(),
            body: Vec::new(),
            output: None,
            output_size: [0, 0],
            compute: None,
        }
    }

    /// Whether samplers may turn this shader into a compute shader.
    pub fn allow_compute(mut self, allow: bool) -> Self {
        self.allow_compute = allow;
        self
    }

    /// Frame seed mixed into procedural noise. Vary it per frame for
    /// temporal grain.
    pub fn with_seed(mut self, seed: f32) -> Self {
        self.seed = seed;
        self
    }

    pub fn context(&self) -> &GpuContext {
        &self.ctx
    }

    pub fn context_id(&self) -> ContextId {
        self.ctx.id()
    }

    pub fn caps(&self) -> DeviceCaps {
        self.ctx.caps()
    }

    pub fn prng_seed(&self) -> f32 {
        self.seed
    }

    /// No input consumed and no output produced yet.
    pub fn is_empty(&self) -> bool {
        self.output.is_none() && self.body.is_empty()
    }

    pub fn is_compute(&self) -> bool {
        self.compute.is_some()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub(crate) fn fresh(&mut self, prefix: &str) -> String {
        let id = self.next_id;
        self.next_id += 1;
        format!("{prefix}_{id}")
    }

    /// Declare a `@group(0)` resource and return its variable name.
    pub(crate) fn bind(&mut self, prefix: &str, kind: BindingKind) -> String {
        let var = self.fresh(prefix);
        let binding = self.bindings.len() as u32;
        self.bindings.push(Binding {
            group: 0,
            binding,
            var: var.clone(),
            kind,
        });
        var
    }

    /// Module-scope helper, emitted once per `key`.
    pub(crate) fn helper(&mut self, key: &'static str, code: &str) {
        if self.helper_keys.insert(key) {
            self.header.push(code.trim().to_string());
        }
    }

    pub(crate) fn header(&mut self, code: String) {
        self.header.push(code);
    }

    pub(crate) fn push(&mut self, stmt: impl Into<String>) {
        self.body.push(stmt.into());
    }

    /// Switch to the compute stage if the device and builder allow it.
    ///
    /// Returns the reason when the compute path is unavailable; the builder
    /// is left unchanged in that case.
    pub(crate) fn try_compute(
        &mut self,
        workgroup: [u32; 2],
        shared_bytes: u32,
    ) -> Result<(), &'static str> {
        let caps = self.ctx.caps();
        if !self.allow_compute {
            return Err("builder disallows compute");
        }
        if !caps.compute_shaders {
            return Err("device lacks compute shaders");
        }
        if !caps.storage_output {
            return Err("device lacks storage output");
        }
        if workgroup[0] * workgroup[1] > caps.max_workgroup_invocations {
            return Err("workgroup exceeds invocation limit");
        }
        if shared_bytes > caps.max_workgroup_storage_bytes {
            return Err("shared tile exceeds workgroup storage");
        }
        self.compute = Some(workgroup);
        Ok(())
    }

    pub(crate) fn set_output(&mut self, output: TypedExpr, size: [u32; 2]) {
        self.output = Some(output);
        self.output_size = size;
    }

    pub fn finish(mut self) -> Result<GeneratedShader, SamplingError> {
        let output = self.output.take().ok_or(SamplingError::EmptyShader)?;
        let compute = self.compute;
        if compute.is_some() {
            self.bind("out_img", BindingKind::OutputStorage);
        }

        let mut wgsl = String::new();
        for b in &self.bindings {
            wgsl.push_str(&format!(
                "@group({}) @binding({}) var {}: {};\n",
                b.group,
                b.binding,
                b.var,
                binding_type(&b.kind)
            ));
        }
        wgsl.push('\n');
        for h in &self.header {
            wgsl.push_str(h);
            wgsl.push_str("\n\n");
        }

        let body: String = self
            .body
            .iter()
            .flat_map(|s| s.lines().map(|l| format!("    {l}\n")).collect::<Vec<_>>())
            .collect();

        let [ow, oh] = self.output_size;
        let shader = match compute {
            None => {
                wgsl.push_str(&format!(
                    r#"struct VSOut {{
    @builtin(position) position: vec4f,
}};

@vertex
fn {VERTEX_ENTRY}(@builtin(vertex_index) vertex_index: u32) -> VSOut {{
    var out: VSOut;
    let uv = vec2f(f32((vertex_index << 1u) & 2u), f32(vertex_index & 2u));
    out.position = vec4f(uv * 2.0 - vec2f(1.0), 0.0, 1.0);
    return out;
}}

@fragment
fn {FRAGMENT_ENTRY}(in: VSOut) -> @location(0) vec4f {{
    let out_px = in.position.xy;
{body}    return {out};
}}
"#,
                    out = output.expr
                ));
                GeneratedShader {
                    fingerprint: xxh3_64(wgsl.as_bytes()),
                    wgsl,
                    stage: ShaderStage::Fragment,
                    bindings: self.bindings,
                    vertex_entry: Some(VERTEX_ENTRY),
                    entry_point: FRAGMENT_ENTRY,
                    workgroup_size: None,
                    dispatch: None,
                    output_size: self.output_size,
                }
            }
            Some(workgroup) => {
                let [bw, bh] = workgroup;
                let out_var = self
                    .bindings
                    .last()
                    .map(|b| b.var.clone())
                    .unwrap_or_default();
                wgsl.push_str(&format!(
                    r#"@compute @workgroup_size({bw}, {bh}, 1)
fn {COMPUTE_ENTRY}(
    @builtin(global_invocation_id) gid: vec3u,
    @builtin(workgroup_id) wid: vec3u,
    @builtin(local_invocation_index) lidx: u32,
) {{
    let out_px = vec2f(gid.xy) + vec2f(0.5);
    let wg_px = vec2f(wid.xy * vec2u({bw}u, {bh}u)) + vec2f(0.5);
{body}    if (gid.x < {ow}u && gid.y < {oh}u) {{
        textureStore({out_var}, vec2i(gid.xy), {out});
    }}
}}
"#,
                    out = output.expr
                ));
                GeneratedShader {
                    fingerprint: xxh3_64(wgsl.as_bytes()),
                    wgsl,
                    stage: ShaderStage::Compute,
                    bindings: self.bindings,
                    vertex_entry: None,
                    entry_point: COMPUTE_ENTRY,
                    workgroup_size: Some(workgroup),
                    dispatch: Some([ceil_div(ow, bw), ceil_div(oh, bh), 1]),
                    output_size: self.output_size,
                }
            }
        };
        trace!(
            "finished {:?} sampling shader: {} bytes, {} bindings",
            shader.stage,
            shader.wgsl.len(),
            shader.bindings.len()
        );
        Ok(shader)
    }
}

fn binding_type(kind: &BindingKind) -> &'static str {
    match kind {
        BindingKind::SourceTexture(_) | BindingKind::LutTexture(_) => "texture_2d<f32>",
        BindingKind::SourceSampler(_) | BindingKind::LutSampler => "sampler",
        BindingKind::OutputStorage => "texture_storage_2d<rgba16float, write>",
    }
}
