//! Device capability detection
//!
//! The hardware model identifier is matched by prefix against a table of
//! known device families. Unknown identifiers fall back to one of two
//! profiles:
//! - emulated/test environments get the most conservative profile
//! - unrecognized physical hardware gets the most capable profile, on the
//!   assumption that it is newer than anything in the table

use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Environment variable overriding the detected model identifier
pub const MODEL_ENV: &str = "MARQUEE_DEVICE_MODEL";

/// Environment variable forcing the emulated fallback
pub const EMULATED_ENV: &str = "MARQUEE_EMULATED";

/// Identifiers reported by emulators and generic hosts
const EMULATED_MODELS: &[&str] = &["i386", "x86_64", "x86", "arm64", "aarch64"];

/// Highest output resolution the device can decode and present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionTier {
    Hd1080,
    Uhd4k,
}

impl ResolutionTier {
    pub fn max_width(&self) -> u32 {
        match self {
            ResolutionTier::Hd1080 => 1920,
            ResolutionTier::Uhd4k => 3840,
        }
    }
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolutionTier::Hd1080 => write!(f, "1080p"),
            ResolutionTier::Uhd4k => write!(f, "4K"),
        }
    }
}

/// Immutable description of what the device can decode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRecord {
    pub supports_hevc: bool,
    pub supports_hevc_10bit: bool,
    pub supports_hdr10: bool,
    pub supports_hdr10_plus: bool,
    pub supports_dolby_vision: bool,
    pub supports_av1: bool,
    pub max_resolution: ResolutionTier,
    pub model_label: String,
}

/// Known device family entry
struct DeviceFamily {
    prefix: &'static str,
    label: &'static str,
    hevc: bool,
    hdr10: bool,
    hdr10_plus: bool,
    dolby_vision: bool,
    av1: bool,
    max_resolution: ResolutionTier,
}

const DEVICE_FAMILIES: &[DeviceFamily] = &[
    DeviceFamily {
        prefix: "AppleTV5,3",
        label: "Apple TV HD (4th generation)",
        hevc: false,
        hdr10: false,
        hdr10_plus: false,
        dolby_vision: false,
        av1: false,
        max_resolution: ResolutionTier::Hd1080,
    },
    DeviceFamily {
        prefix: "AppleTV6,2",
        label: "Apple TV 4K (1st generation)",
        hevc: true,
        hdr10: true,
        hdr10_plus: false,
        dolby_vision: true,
        av1: false,
        max_resolution: ResolutionTier::Uhd4k,
    },
    DeviceFamily {
        prefix: "AppleTV11,1",
        label: "Apple TV 4K (2nd generation)",
        hevc: true,
        hdr10: true,
        hdr10_plus: true,
        dolby_vision: true,
        av1: false,
        max_resolution: ResolutionTier::Uhd4k,
    },
    DeviceFamily {
        prefix: "AppleTV14,1",
        label: "Apple TV 4K (3rd generation)",
        hevc: true,
        hdr10: true,
        hdr10_plus: true,
        dolby_vision: true,
        av1: false,
        max_resolution: ResolutionTier::Uhd4k,
    },
];

impl CapabilityRecord {
    /// Conservative profile for emulators and test hosts
    pub fn emulated() -> Self {
        Self {
            supports_hevc: false,
            supports_hevc_10bit: false,
            supports_hdr10: false,
            supports_hdr10_plus: false,
            supports_dolby_vision: false,
            supports_av1: false,
            max_resolution: ResolutionTier::Hd1080,
            model_label: "Emulator".to_string(),
        }
    }

    /// Most capable profile, assumed for hardware newer than the table
    pub fn unrecognized(model: &str) -> Self {
        Self {
            supports_hevc: true,
            supports_hevc_10bit: true,
            supports_hdr10: true,
            supports_hdr10_plus: true,
            supports_dolby_vision: true,
            supports_av1: true,
            max_resolution: ResolutionTier::Uhd4k,
            model_label: format!("Unknown device ({})", model),
        }
    }

    /// Resolve capabilities for a model identifier
    pub fn for_model(model: &str, emulated: bool) -> Self {
        if let Some(family) = DEVICE_FAMILIES.iter().find(|f| model.starts_with(f.prefix)) {
            return Self {
                supports_hevc: family.hevc,
                // Every HEVC-capable family in the table decodes Main10
                supports_hevc_10bit: family.hevc,
                supports_hdr10: family.hdr10,
                supports_hdr10_plus: family.hdr10_plus,
                supports_dolby_vision: family.dolby_vision,
                supports_av1: family.av1,
                max_resolution: family.max_resolution,
                model_label: family.label.to_string(),
            };
        }

        if emulated || EMULATED_MODELS.contains(&model) {
            Self::emulated()
        } else {
            Self::unrecognized(model)
        }
    }

    /// True if any HDR mode is supported
    pub fn supports_any_hdr(&self) -> bool {
        self.supports_hdr10 || self.supports_hdr10_plus || self.supports_dolby_vision
    }

    pub fn is_4k(&self) -> bool {
        self.max_resolution == ResolutionTier::Uhd4k
    }
}

/// Probes the running environment once and caches the result
#[derive(Debug, Default)]
pub struct DeviceCapabilityProbe {
    cached: OnceLock<Arc<CapabilityRecord>>,
}

impl DeviceCapabilityProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capabilities of this device; computed on first call only
    pub fn capabilities(&self) -> Arc<CapabilityRecord> {
        self.cached
            .get_or_init(|| {
                let model = detect_model_identifier();
                let emulated = std::env::var_os(EMULATED_ENV).is_some();
                let record = CapabilityRecord::for_model(&model, emulated);
                info!(
                    model = %model,
                    label = %record.model_label,
                    hevc = record.supports_hevc,
                    hdr = record.supports_any_hdr(),
                    max_resolution = %record.max_resolution,
                    "Device capabilities probed"
                );
                Arc::new(record)
            })
            .clone()
    }
}

/// Read the hardware model identifier for this host
pub fn detect_model_identifier() -> String {
    if let Ok(model) = std::env::var(MODEL_ENV) {
        if !model.trim().is_empty() {
            return model.trim().to_string();
        }
    }

    for path in [
        "/sys/firmware/devicetree/base/model",
        "/sys/class/dmi/id/product_name",
    ] {
        if let Ok(raw) = std::fs::read_to_string(path) {
            let model = raw.trim_matches(|c: char| c.is_whitespace() || c == '\0');
            if !model.is_empty() {
                debug!(path, model, "Model identifier read");
                return model.to_string();
            }
        }
    }

    std::env::consts::ARCH.to_string()
}
