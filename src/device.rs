//! Device cache.
//!
//! Devices are enumerated once per process and memoized. For every backend
//! in priority order each device is queried; devices without 64-bit float
//! support are skipped with a warning, and a device whose name was already
//! reported by a higher-priority backend is dropped so that the faster path
//! is preferred. The host CPU entry is always present.

use crate::backend::{Backend, DeviceId};
use crate::config::{self, AUTO_DEVICE};
use crate::error::{BlockError, Result};
use std::collections::HashSet;

/// Immutable description of one usable device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCacheEntry {
    pub name: String,
    pub platform: String,
    pub toolkit: String,
    pub compute: String,
    pub memory_step_size: usize,
    pub backend: Backend,
    pub device_index: usize,
}

impl DeviceCacheEntry {
    pub fn id(&self) -> DeviceId {
        DeviceId::new(self.backend, self.device_index)
    }
}

/// A device as reported by a backend, before filtering.
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    pub entry: DeviceCacheEntry,
    pub supports_f64: bool,
}

/// Filters and orders raw candidates into the cached device list.
pub fn build_cache(candidates: impl IntoIterator<Item = DeviceCandidate>) -> Vec<DeviceCacheEntry> {
    let mut candidates: Vec<DeviceCandidate> = candidates.into_iter().collect();
    // stable: keeps each backend's own device order
    candidates.sort_by_key(|p| p.entry.backend);

    let mut seen = HashSet::new();
    let mut cache = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let entry = candidate.entry;
        if !candidate.supports_f64 {
            log::warn!(
                "skipping {} device {} \"{}\": no 64-bit float support",
                entry.backend,
                entry.device_index,
                entry.name
            );
            continue;
        }
        if !seen.insert(entry.name.clone()) {
            log::debug!(
                "skipping {} device \"{}\": already provided by a faster backend",
                entry.backend,
                entry.name
            );
            continue;
        }
        cache.push(entry);
    }
    cache
}

fn cpu_candidate() -> DeviceCandidate {
    DeviceCandidate {
        entry: DeviceCacheEntry {
            name: format!("{} CPU", std::env::consts::ARCH),
            platform: std::env::consts::OS.to_owned(),
            toolkit: "rayon".to_owned(),
            compute: format!("{} threads", rayon::current_num_threads()),
            memory_step_size: 1024,
            backend: Backend::Cpu,
            device_index: 0,
        },
        supports_f64: true,
    }
}

fn discover_all() -> Vec<DeviceCandidate> {
    #[allow(unused_mut)]
    let mut candidates = Vec::new();
    #[cfg(feature = "wgpu")]
    candidates.extend(crate::ops::wgpu::list_adapters());
    candidates.push(cpu_candidate());
    candidates
}

lazy_static::lazy_static! {
    static ref DEVICE_CACHE: Vec<DeviceCacheEntry> = {
        let cache = build_cache(discover_all());
        log::info!(
            "device cache: {}",
            cache
                .iter()
                .map(|d| format!("{} [{}]", d.name, d.backend))
                .collect::<Vec<_>>()
                .join(", ")
        );
        cache
    };
}

/// Every usable device, highest-priority backend first.
///
/// The slice is computed on first use and identical for the rest of the
/// process lifetime.
pub fn device_cache() -> &'static [DeviceCacheEntry] {
    &DEVICE_CACHE
}

/// Distinct backends that contributed at least one device, in priority order.
pub fn available_backends() -> Vec<Backend> {
    let mut backends: Vec<Backend> = device_cache().iter().map(|d| d.backend).collect();
    backends.dedup();
    backends
}

/// Looks up the cached entry for a device id.
pub fn entry_for(id: DeviceId) -> Option<&'static DeviceCacheEntry> {
    device_cache().iter().find(|d| d.id() == id)
}

/// Resolves a device-name parameter against the process device cache.
///
/// `"Auto"` resolves to the configured default device, or to the first
/// cached device when no default is configured.
pub fn resolve_device(name: &str) -> Result<&'static DeviceCacheEntry> {
    let cache = device_cache();
    if name == AUTO_DEVICE {
        let default = config::global().default_device.as_str();
        if default != AUTO_DEVICE {
            if let Ok(entry) = resolve_device_in(cache, default) {
                return Ok(entry);
            }
            log::warn!("configured default device \"{default}\" is not available");
        }
    }
    resolve_device_in(cache, name)
}

/// Resolves a device name against an explicit cache.
pub fn resolve_device_in<'a>(cache: &'a [DeviceCacheEntry], name: &str) -> Result<&'a DeviceCacheEntry> {
    if cache.is_empty() {
        return Err(BlockError::Environment("no compute devices available".to_owned()));
    }
    if name == AUTO_DEVICE {
        return Ok(&cache[0]);
    }
    cache.iter().find(|d| d.name == name).ok_or_else(|| {
        let names: Vec<&str> = cache.iter().map(|d| d.name.as_str()).collect();
        BlockError::invalid(format!(
            "invalid device \"{name}\"; available devices: {}",
            names.join(", ")
        ))
    })
}
