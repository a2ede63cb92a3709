//! GPU compute through `wgpu`.
//!
//! This module has two jobs:
//!
//! - **Discovery**: adapters are enumerated once per process and reported to
//!   the device cache as [`DeviceCandidate`]s. Vulkan, Metal and DX12 adapters
//!   are listed under [`Backend::Wgpu`]; OpenGL adapters under [`Backend::Gl`].
//! - **Kernels**: element-wise `f32` functions run as a WGSL compute shader.
//!   A device and pipeline are created lazily per [`DeviceId`] and reused.
//!
//! Kernels return `None` whenever the GPU cannot serve a request, and the
//! caller falls back to the CPU path.

use super::unary::UnaryOp;
use crate::array::{Array, ArrayData};
use crate::backend::{Backend, DeviceId};
use crate::device::{DeviceCacheEntry, DeviceCandidate};
use briny::prelude::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use wgpu::util::DeviceExt;

const UNARY: &str = include_str!("shaders/unary.wgsl");

const WORKGROUP_SIZE: u32 = 64;

/// Basic wrapper for common GPU errors.
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    /// No adapter is registered under the requested id.
    #[error("no adapter for {0}")]
    Adapter(DeviceId),
    /// Requesting the logical device failed.
    #[error("device error: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
}

/// A failure while preparing or running a GPU kernel.
#[derive(Debug, thiserror::Error)]
pub enum GpuFailure {
    #[error("GPU error: {0}")]
    Gpu(#[from] GpuError),
    #[error("shader failed validation")]
    Validation(ValidationError),
    #[error("GPU failure: {0}")]
    Message(String),
}

impl From<ValidationError> for GpuFailure {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}

/// WGSL source that passed basic safety checks.
pub struct WgslSource<'a>(pub &'a str);

impl Validate for WgslSource<'_> {
    fn validate(&self) -> Result<(), ValidationError> {
        let src = self.0;
        if src.len() > 65536 || !src.contains("fn main") {
            return Err(ValidationError);
        }
        if src.contains("import") || src.contains("#include") {
            return Err(ValidationError);
        }
        let forbidden = ["asm", "unsafe", "ptr", "std::"];
        if forbidden.iter().any(|bad| src.contains(bad)) {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// Validates `source` and compiles it on `device`.
pub fn load_shader(
    device: &wgpu::Device,
    label: &str,
    source: &str,
) -> Result<wgpu::ShaderModule, GpuFailure> {
    let source = TrustedData::new(WgslSource(source))?.into_inner().0;
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    }))
}

struct AdapterSlot {
    id: DeviceId,
    adapter: wgpu::Adapter,
}

fn backend_of(api: wgpu::Backend) -> Option<Backend> {
    match api {
        wgpu::Backend::Vulkan | wgpu::Backend::Metal | wgpu::Backend::Dx12 => Some(Backend::Wgpu),
        wgpu::Backend::Gl => Some(Backend::Gl),
        _ => None,
    }
}

fn enumerate() -> Vec<AdapterSlot> {
    let instance = wgpu::Instance::default();
    let mut counters: HashMap<Backend, usize> = HashMap::new();
    let mut slots = Vec::new();
    for adapter in instance.enumerate_adapters(wgpu::Backends::all()) {
        let Some(backend) = backend_of(adapter.get_info().backend) else {
            continue;
        };
        let index = counters.entry(backend).or_insert(0);
        slots.push(AdapterSlot { id: DeviceId::new(backend, *index), adapter });
        *index += 1;
    }
    slots
}

lazy_static::lazy_static! {
    static ref ADAPTERS: Vec<AdapterSlot> = enumerate();
    static ref CONTEXTS: Mutex<HashMap<DeviceId, Arc<GpuContext>>> = Mutex::new(HashMap::new());
}

/// Describes every enumerated adapter for the device cache.
pub fn list_adapters() -> Vec<DeviceCandidate> {
    ADAPTERS
        .iter()
        .map(|slot| {
            let info = slot.adapter.get_info();
            let limits = slot.adapter.limits();
            DeviceCandidate {
                entry: DeviceCacheEntry {
                    name: info.name.clone(),
                    platform: format!("{:?}", info.backend),
                    toolkit: format!("{} {}", info.driver, info.driver_info).trim().to_owned(),
                    compute: format!("{:?}", info.device_type),
                    memory_step_size: limits.min_storage_buffer_offset_alignment as usize,
                    backend: slot.id.backend,
                    device_index: slot.id.index,
                },
                supports_f64: slot.adapter.features().contains(wgpu::Features::SHADER_F64),
            }
        })
        .collect()
}

/// Device, queue and compiled pipelines for one adapter.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    unary_layout: wgpu::BindGroupLayout,
    unary_pipeline: wgpu::ComputePipeline,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl GpuContext {
    /// Opens the adapter registered as `id` and compiles the kernels.
    pub fn new(id: DeviceId) -> Result<Self, GpuFailure> {
        let slot = ADAPTERS
            .iter()
            .find(|s| s.id == id)
            .ok_or(GpuError::Adapter(id))?;
        let (device, queue) = pollster::block_on(slot.adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("arrayflow"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .map_err(GpuError::Device)?;

        let module = load_shader(&device, "unary", UNARY)?;
        let unary_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("unary_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("unary_pipeline_layout"),
            bind_group_layouts: &[&unary_layout],
            push_constant_ranges: &[],
        });
        let unary_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("unary_pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            cache: None,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });
        log::info!("opened GPU context for {id}");
        Ok(Self { device, queue, unary_layout, unary_pipeline })
    }
}

fn context(id: DeviceId) -> Result<Arc<GpuContext>, GpuFailure> {
    let mut contexts = CONTEXTS
        .lock()
        .map_err(|_| GpuFailure::Message("context map poisoned".into()))?;
    if let Some(ctx) = contexts.get(&id) {
        return Ok(Arc::clone(ctx));
    }
    let ctx = Arc::new(GpuContext::new(id)?);
    contexts.insert(id, Arc::clone(&ctx));
    Ok(ctx)
}

/// Shader op code for operations with a WGSL implementation.
pub fn op_code(op: UnaryOp) -> Option<u32> {
    Some(match op {
        UnaryOp::Abs => 0,
        UnaryOp::Sin => 1,
        UnaryOp::Cos => 2,
        UnaryOp::Tan => 3,
        UnaryOp::Exp => 4,
        UnaryOp::Log => 5,
        UnaryOp::Sqrt => 6,
        UnaryOp::Floor => 7,
        UnaryOp::Ceil => 8,
        UnaryOp::Tanh => 9,
        UnaryOp::Sigmoid => 10,
        UnaryOp::Trunc => 11,
        _ => return None,
    })
}

fn run_unary(ctx: &GpuContext, code: u32, input: &[f32]) -> Result<Vec<f32>, GpuFailure> {
    let len = u32::try_from(input.len()).map_err(|_| GpuFailure::Message("input too large".into()))?;
    let groups = len.div_ceil(WORKGROUP_SIZE);
    if groups > ctx.device.limits().max_compute_workgroups_per_dimension {
        return Err(GpuFailure::Message(format!("{len} elements exceed one dispatch")));
    }
    let size = (input.len() * size_of::<f32>()) as u64;
    let device = &ctx.device;

    let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("unary_params"),
        contents: bytemuck::cast_slice(&[code, len, 0, 0]),
        usage: wgpu::BufferUsages::UNIFORM,
    });
    let input_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("unary_input"),
        contents: bytemuck::cast_slice(input),
        usage: wgpu::BufferUsages::STORAGE,
    });
    let output_buf = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("unary_output"),
        size,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("unary_bind_group"),
        layout: &ctx.unary_layout,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: params.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 1, resource: input_buf.as_entire_binding() },
            wgpu::BindGroupEntry { binding: 2, resource: output_buf.as_entire_binding() },
        ],
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("unary_encoder"),
    });
    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("unary_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&ctx.unary_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(groups, 1, 1);
    }

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("unary_staging"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    encoder.copy_buffer_to_buffer(&output_buf, 0, &staging, 0, size);
    ctx.queue.submit(Some(encoder.finish()));

    staging.slice(..).map_async(wgpu::MapMode::Read, |_| {});
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|e| GpuFailure::Message(e.to_string()))?;

    let mapped = staging.slice(..).get_mapped_range();
    let out: Vec<f32> = bytemuck::pod_collect_to_vec(&mapped);
    drop(mapped);
    staging.unmap();
    Ok(out)
}

/// Runs `op` on the GPU that produced `input`.
///
/// Returns `None` when the op has no shader, the input is not `float32`, the
/// array lives on the CPU, or the GPU fails; failures are logged.
pub fn try_unary(op: UnaryOp, input: &Array) -> Option<Array> {
    let code = op_code(op)?;
    let data = input.as_slice::<f32>()?;
    if !input.device().is_gpu() || data.is_empty() {
        return None;
    }
    let result = context(input.device()).and_then(|ctx| run_unary(&ctx, code, data));
    match result {
        Ok(out) => Array::new(ArrayData::Float32(out), input.dims().to_vec(), input.device()).ok(),
        Err(err) => {
            log::warn!("{} on {} failed: {err}", op.name(), input.device());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unary_shader_validates() {
        assert!(WgslSource(UNARY).validate().is_ok());
        assert!(WgslSource("fn helper() {}").validate().is_err());
        assert!(WgslSource("fn main() { let p: ptr<function, f32>; }").validate().is_err());
    }

    #[test]
    fn op_codes_are_distinct() {
        let codes: Vec<u32> = UnaryOp::ALL.iter().filter_map(|&op| op_code(op)).collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(codes.len(), sorted.len());
        assert_eq!(op_code(UnaryOp::Erf), None);
    }

    #[test]
    fn cpu_arrays_are_not_taken() {
        let a = Array::from_vec(vec![1.0f32, -2.0], DeviceId::CPU);
        assert!(try_unary(UnaryOp::Abs, &a).is_none());
    }
}
