//! Process-wide GPU handles.
//!
//! Created once at startup and shared read-only by the dispatcher and the
//! image bridge. Nothing here is torn down before process exit.

use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{PipelineError, Result};

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    // Error scopes are device-wide; pushes and pops from two threads must
    // not interleave.
    scopes: Mutex<()>,
}

impl GpuContext {
    /// Blocking wrapper around [`GpuContext::new`].
    pub fn create() -> Result<Arc<Self>> {
        pollster::block_on(Self::new()).map(Arc::new)
    }

    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or_else(|| PipelineError::Initialization("no suitable GPU adapter found".into()))?;

        let adapter_info = adapter.get_info();
        tracing::info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "selected GPU adapter"
        );

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("retrograde-device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|error| {
                PipelineError::Initialization(format!("failed to request wgpu device: {error}"))
            })?;

        // Errors outside an error scope would otherwise abort the process.
        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!("uncaptured GPU error: {error}");
        }));

        Ok(Self {
            device,
            queue,
            adapter_info,
            scopes: Mutex::new(()),
        })
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// Run `f` inside out-of-memory and validation error scopes and turn
    /// whatever they catch into [`PipelineError::ResourceAllocation`].
    pub(crate) fn guarded<T>(&self, what: &str, f: impl FnOnce() -> T) -> Result<T> {
        self.guarded_as(PipelineError::ResourceAllocation, what, f)
    }

    /// [`GpuContext::guarded`] with the caller choosing the error variant.
    pub(crate) fn guarded_as<T>(
        &self,
        kind: fn(String) -> PipelineError,
        what: &str,
        f: impl FnOnce() -> T,
    ) -> Result<T> {
        let _scopes = self.scopes.lock().unwrap_or_else(PoisonError::into_inner);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        match out_of_memory.or(validation) {
            Some(error) => Err(scope_error(kind, what, error)),
            None => Ok(value),
        }
    }
}

fn scope_error(
    kind: fn(String) -> PipelineError,
    what: &str,
    error: impl std::fmt::Display,
) -> PipelineError {
    kind(format!("{what}: {error}"))
}

pub(crate) fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}
