//! Capability/device selection
//!
//! Pure selection logic over adapter descriptions. Backends translate their
//! enumeration results into [`AdapterInfo`] values and map the selected index
//! back to the native handle.

use crate::error::{Error, Result};
use crate::{engine_debug, engine_error};

/// Name of the swapchain device extension
pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

/// Kind of adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterType {
    Discrete,
    Integrated,
    Virtual,
    Cpu,
    Other,
}

impl AdapterType {
    /// Lower ranks are preferred
    fn rank(self) -> u8 {
        match self {
            AdapterType::Discrete => 0,
            AdapterType::Integrated => 1,
            _ => 2,
        }
    }
}

/// One queue family of an adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    pub index: u32,
    pub queue_count: u32,
    pub graphics: bool,
    /// Can present to the target surface
    pub present: bool,
}

/// Description of one adapter
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub adapter_type: AdapterType,
    pub queue_families: Vec<QueueFamilyInfo>,
    pub extensions: Vec<String>,
    /// Line/point polygon modes (`fillModeNonSolid`)
    pub fill_mode_non_solid: bool,
    pub surface_format_count: usize,
    pub present_mode_count: usize,
}

/// Hard requirements an adapter must meet
#[derive(Debug, Clone)]
pub struct DeviceRequirements {
    /// A queue family able to present to the surface is needed
    pub presenting: bool,
    /// Wireframe rendering is requested
    pub wireframe: bool,
    /// Device extensions that must be present
    pub extensions: Vec<String>,
}

impl DeviceRequirements {
    /// Requirements of an on-screen renderer
    pub fn for_presentation(wireframe: bool) -> Self {
        Self {
            presenting: true,
            wireframe,
            extensions: vec![SWAPCHAIN_EXTENSION.to_string()],
        }
    }
}

/// Result of device selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedDevice {
    /// Index into the adapter list
    pub adapter_index: usize,
    pub name: String,
    pub adapter_type: AdapterType,
    pub graphics_family: u32,
    /// Present family, `None` when not presenting
    pub present_family: Option<u32>,
}

impl SelectedDevice {
    /// Graphics and present work go to the same family
    pub fn shares_queue_family(&self) -> bool {
        self.present_family.map_or(true, |p| p == self.graphics_family)
    }
}

/// Pick the graphics and present queue families, preferring a single
/// family doing both
fn find_queue_families(adapter: &AdapterInfo, presenting: bool) -> Option<(u32, Option<u32>)> {
    let usable = |f: &&QueueFamilyInfo| f.queue_count > 0;

    if !presenting {
        return adapter
            .queue_families
            .iter()
            .filter(usable)
            .find(|f| f.graphics)
            .map(|f| (f.index, None));
    }

    if let Some(both) = adapter
        .queue_families
        .iter()
        .filter(usable)
        .find(|f| f.graphics && f.present)
    {
        return Some((both.index, Some(both.index)));
    }

    let graphics = adapter.queue_families.iter().filter(usable).find(|f| f.graphics)?;
    let present = adapter.queue_families.iter().filter(usable).find(|f| f.present)?;
    Some((graphics.index, Some(present.index)))
}

/// Why an adapter fails the requirements, `None` when it satisfies them
fn rejection_reason(adapter: &AdapterInfo, requirements: &DeviceRequirements) -> Option<String> {
    if find_queue_families(adapter, requirements.presenting).is_none() {
        return Some(if requirements.presenting {
            "no graphics + present queue families".to_string()
        } else {
            "no graphics queue family".to_string()
        });
    }

    if let Some(missing) = requirements
        .extensions
        .iter()
        .find(|ext| !adapter.extensions.iter().any(|a| a == *ext))
    {
        return Some(format!("missing extension {}", missing));
    }

    if requirements.wireframe && !adapter.fill_mode_non_solid {
        return Some("fillModeNonSolid not supported".to_string());
    }

    if requirements.presenting && (adapter.surface_format_count == 0 || adapter.present_mode_count == 0) {
        return Some("no surface format or present mode".to_string());
    }

    None
}

/// Select the adapter to render with
///
/// Discrete adapters are preferred over integrated ones, integrated over
/// anything else. Within a rank the first adapter meeting every requirement
/// wins.
pub fn select_device(adapters: &[AdapterInfo], requirements: &DeviceRequirements) -> Result<SelectedDevice> {
    let mut best: Option<(u8, usize)> = None;

    for (index, adapter) in adapters.iter().enumerate() {
        if let Some(reason) = rejection_reason(adapter, requirements) {
            engine_debug!("lumen::device", "Rejected adapter '{}': {}", adapter.name, reason);
            continue;
        }
        let rank = adapter.adapter_type.rank();
        if best.map_or(true, |(best_rank, _)| rank < best_rank) {
            best = Some((rank, index));
        }
    }

    let Some((_, index)) = best else {
        engine_error!("lumen::device", "No suitable device among {} adapter(s)", adapters.len());
        return Err(Error::NoSuitableDevice(format!(
            "none of {} adapter(s) meets the requirements",
            adapters.len()
        )));
    };

    let adapter = &adapters[index];
    let (graphics_family, present_family) = find_queue_families(adapter, requirements.presenting)
        .ok_or_else(|| Error::NoSuitableDevice(adapter.name.clone()))?;

    Ok(SelectedDevice {
        adapter_index: index,
        name: adapter.name.clone(),
        adapter_type: adapter.adapter_type,
        graphics_family,
        present_family,
    })
}

#[cfg(test)]
#[path = "device_selector_tests.rs"]
mod tests;
