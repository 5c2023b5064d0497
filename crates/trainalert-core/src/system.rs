//! Host and GPU information included in start and completion messages
//!
//! Collection is best effort: anything that cannot be read is left out of the
//! snapshot rather than reported as an error.

use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::error::NvmlError;
use nvml_wrapper::{Device, Nvml};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Source of [`SystemSnapshot`]s
pub trait SystemInfoCollector: Send + Sync {
    /// Take a snapshot of the current host
    fn snapshot(&self) -> SystemSnapshot;
}

/// Point-in-time description of the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    /// Operating system, e.g. `linux`
    pub platform: String,

    /// CPU description
    pub cpu: CpuInfo,

    /// Memory usage, when the platform exposes it
    pub memory: Option<MemoryInfo>,

    /// Detected GPUs
    pub gpus: Vec<GpuInfo>,
}

/// CPU description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuInfo {
    /// Instruction set architecture, e.g. `x86_64`
    pub architecture: String,

    /// Number of logical cores available to this process
    pub logical_cores: usize,
}

/// Memory usage in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryInfo {
    /// Physical memory
    pub total_bytes: u64,
    /// Memory available to new allocations
    pub available_bytes: u64,
}

impl MemoryInfo {
    /// Bytes in use
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.available_bytes)
    }

    /// Share of memory in use, in percent
    pub fn percent_used(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes() as f64 / self.total_bytes as f64 * 100.0
    }
}

/// One GPU as reported by NVML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    /// Device index
    pub index: u32,
    /// Product name
    pub name: String,
    /// Device memory in MiB
    pub memory_total_mb: u64,
    /// Device memory in use in MiB
    pub memory_used_mb: u64,
    /// Compute utilization, when reported
    pub utilization_percent: Option<f64>,
    /// Core temperature, when reported
    pub temperature_c: Option<f64>,
}

impl GpuInfo {
    /// Share of GPU memory in use, in percent
    pub fn memory_percent(&self) -> f64 {
        if self.memory_total_mb == 0 {
            return 0.0;
        }
        self.memory_used_mb as f64 / self.memory_total_mb as f64 * 100.0
    }
}

impl fmt::Display for SystemSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "System Information:")?;
        writeln!(f, "  Platform: {} ({})", self.platform, self.cpu.architecture)?;
        writeln!(f, "  CPU Cores: {} logical", self.cpu.logical_cores)?;

        if let Some(memory) = &self.memory {
            writeln!(
                f,
                "  Memory: {:.2} GB / {:.2} GB ({:.1}%)",
                memory.used_bytes() as f64 / BYTES_PER_GB,
                memory.total_bytes as f64 / BYTES_PER_GB,
                memory.percent_used()
            )?;
        }

        if self.gpus.is_empty() {
            return write!(f, "  GPUs: None detected");
        }

        write!(f, "  GPUs: {}", self.gpus.len())?;
        for gpu in &self.gpus {
            write!(f, "\n    GPU {}: {}", gpu.index, gpu.name)?;
            write!(
                f,
                "\n      Memory: {} MB / {} MB ({:.1}%)",
                gpu.memory_used_mb,
                gpu.memory_total_mb,
                gpu.memory_percent()
            )?;
            if let Some(utilization) = gpu.utilization_percent {
                write!(f, "\n      Utilization: {utilization:.1}%")?;
            }
            if let Some(temperature) = gpu.temperature_c {
                write!(f, "\n      Temperature: {temperature:.0}°C")?;
            }
        }
        Ok(())
    }
}

/// A fixed snapshot is its own collector
impl SystemInfoCollector for SystemSnapshot {
    fn snapshot(&self) -> SystemSnapshot {
        self.clone()
    }
}

/// Collector for the machine this process runs on
#[derive(Debug, Clone)]
pub struct HostInfoCollector {
    meminfo_path: PathBuf,
    detect_gpus: bool,
}

impl Default for HostInfoCollector {
    fn default() -> Self {
        Self {
            meminfo_path: PathBuf::from("/proc/meminfo"),
            detect_gpus: true,
        }
    }
}

impl HostInfoCollector {
    /// Create a collector reading `/proc/meminfo` with GPU detection on
    pub fn new() -> Self {
        Self::default()
    }

    /// Read memory figures from another `meminfo`-formatted file
    pub fn with_meminfo_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.meminfo_path = path.into();
        self
    }

    /// Enable or disable GPU detection through NVML
    pub fn with_gpu_detection(mut self, enabled: bool) -> Self {
        self.detect_gpus = enabled;
        self
    }

    fn memory(&self) -> Option<MemoryInfo> {
        let contents = std::fs::read_to_string(&self.meminfo_path)
            .map_err(|e| debug!(path = %self.meminfo_path.display(), error = %e, "Memory info unavailable"))
            .ok()?;
        parse_meminfo(&contents)
    }

    fn gpus(&self) -> Vec<GpuInfo> {
        if !self.detect_gpus {
            return Vec::new();
        }

        let nvml = match Nvml::init() {
            Ok(nvml) => nvml,
            Err(NvmlError::LibloadingError(_)) => {
                debug!("NVML library not found, no GPUs reported");
                return Vec::new();
            }
            Err(e) => {
                debug!(error = %e, "NVML initialization failed, no GPUs reported");
                return Vec::new();
            }
        };

        let count = match nvml.device_count() {
            Ok(count) => count,
            Err(e) => {
                debug!(error = %e, "Failed to count GPUs");
                return Vec::new();
            }
        };

        (0..count)
            .filter_map(|index| match nvml.device_by_index(index) {
                Ok(device) => gpu_info(index, &device),
                Err(e) => {
                    debug!(index, error = %e, "GPU not accessible");
                    None
                }
            })
            .collect()
    }
}

/// Name and memory are required; utilization and temperature are optional
fn gpu_info(index: u32, device: &Device<'_>) -> Option<GpuInfo> {
    let name = device
        .name()
        .map_err(|e| debug!(index, error = %e, "GPU name unavailable"))
        .ok()?;
    let memory = device
        .memory_info()
        .map_err(|e| debug!(index, error = %e, "GPU memory unavailable"))
        .ok()?;

    Some(GpuInfo {
        index,
        name,
        memory_total_mb: memory.total / BYTES_PER_MB,
        memory_used_mb: memory.used / BYTES_PER_MB,
        utilization_percent: device
            .utilization_rates()
            .ok()
            .map(|rates| f64::from(rates.gpu)),
        temperature_c: device
            .temperature(TemperatureSensor::Gpu)
            .ok()
            .map(f64::from),
    })
}

impl SystemInfoCollector for HostInfoCollector {
    fn snapshot(&self) -> SystemSnapshot {
        let logical_cores = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1);

        SystemSnapshot {
            platform: std::env::consts::OS.to_string(),
            cpu: CpuInfo {
                architecture: std::env::consts::ARCH.to_string(),
                logical_cores,
            },
            memory: self.memory(),
            gpus: self.gpus(),
        }
    }
}

/// Parse `MemTotal` and `MemAvailable` (kB) from `/proc/meminfo` contents
fn parse_meminfo(contents: &str) -> Option<MemoryInfo> {
    let field = |key: &str| {
        contents.lines().find_map(|line| {
            let rest = line.strip_prefix(key)?.strip_prefix(':')?;
            let kb: u64 = rest.split_whitespace().next()?.parse().ok()?;
            Some(kb * 1024)
        })
    };

    Some(MemoryInfo {
        total_bytes: field("MemTotal")?,
        available_bytes: field("MemAvailable").or_else(|| field("MemFree"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn snapshot(gpus: Vec<GpuInfo>) -> SystemSnapshot {
        SystemSnapshot {
            platform: "linux".to_string(),
            cpu: CpuInfo {
                architecture: "x86_64".to_string(),
                logical_cores: 16,
            },
            memory: Some(MemoryInfo {
                total_bytes: 32 * 1024 * 1024 * 1024,
                available_bytes: 24 * 1024 * 1024 * 1024,
            }),
            gpus,
        }
    }

    #[test]
    fn test_parse_meminfo() {
        let contents = "MemTotal:       32768000 kB\nMemFree:         1000000 kB\nMemAvailable:   16384000 kB\n";

        let memory = parse_meminfo(contents).unwrap();

        assert_eq!(memory.total_bytes, 32_768_000 * 1024);
        assert_eq!(memory.available_bytes, 16_384_000 * 1024);
        assert!((memory.percent_used() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_meminfo_missing_fields() {
        assert!(parse_meminfo("SwapTotal: 0 kB\n").is_none());
    }

    #[test]
    fn test_display_without_gpus() {
        let text = snapshot(Vec::new()).to_string();

        assert!(text.starts_with("System Information:"));
        assert!(text.contains("Platform: linux (x86_64)"));
        assert!(text.contains("Memory: 8.00 GB / 32.00 GB (25.0%)"));
        assert!(text.ends_with("GPUs: None detected"));
    }

    #[test]
    fn test_display_with_gpu() {
        let text = snapshot(vec![GpuInfo {
            index: 0,
            name: "RTX 4090".to_string(),
            memory_total_mb: 24_000,
            memory_used_mb: 12_000,
            utilization_percent: Some(99.0),
            temperature_c: None,
        }])
        .to_string();

        assert!(text.contains("GPUs: 1"));
        assert!(text.contains("GPU 0: RTX 4090"));
        assert!(text.contains("Memory: 12000 MB / 24000 MB (50.0%)"));
        assert!(text.contains("Utilization: 99.0%"));
    }

    #[test]
    fn test_host_collector_with_custom_sources() {
        let mut meminfo = tempfile::NamedTempFile::new().unwrap();
        writeln!(meminfo, "MemTotal: 2048 kB\nMemAvailable: 1024 kB").unwrap();

        let collector = HostInfoCollector::new()
            .with_meminfo_path(meminfo.path())
            .with_gpu_detection(false);
        let snapshot = collector.snapshot();

        assert_eq!(snapshot.platform, std::env::consts::OS);
        assert!(snapshot.cpu.logical_cores >= 1);
        assert_eq!(snapshot.memory.unwrap().total_bytes, 2048 * 1024);
        assert!(snapshot.gpus.is_empty());
    }

    #[test]
    fn test_gpu_detection_never_fails() {
        // Hosts without the NVML library report no GPUs instead of an error
        let gpus = HostInfoCollector::new().gpus();

        assert!(gpus.iter().all(|gpu| gpu.memory_used_mb <= gpu.memory_total_mb));
    }

    #[test]
    #[ignore = "Requires NVIDIA GPU"]
    fn test_gpu_detection_reports_devices() {
        let gpus = HostInfoCollector::new().gpus();

        assert!(!gpus.is_empty());
        assert!(gpus.iter().all(|gpu| !gpu.name.is_empty() && gpu.memory_total_mb > 0));
    }
}
