// Linux host counters: /proc/stat ticks, /proc/meminfo pages. Physical memory via sysinfo.

use sysinfo::System;

use super::{AcquisitionError, CpuTicks, HostCounters, VmStats};

/// /proc/meminfo reports kB, so one "page" here is 1 KiB.
const MEMINFO_PAGE_SIZE: u64 = 1024;

pub struct ProcHost {
    physical_memory: u64,
}

impl Default for ProcHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcHost {
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        Self {
            physical_memory: sys.total_memory(),
        }
    }
}

impl HostCounters for ProcHost {
    fn cpu_ticks(&self) -> Result<CpuTicks, AcquisitionError> {
        parse_proc_stat(&read_proc("/proc/stat")?)
    }

    fn vm_stats(&self) -> Result<VmStats, AcquisitionError> {
        parse_meminfo(&read_proc("/proc/meminfo")?)
    }

    fn physical_memory(&self) -> u64 {
        self.physical_memory
    }
}

#[cfg(target_os = "linux")]
fn read_proc(path: &str) -> Result<String, AcquisitionError> {
    Ok(std::fs::read_to_string(path)?)
}

#[cfg(not(target_os = "linux"))]
fn read_proc(_path: &str) -> Result<String, AcquisitionError> {
    Err(AcquisitionError::Unsupported(std::env::consts::OS))
}

/// Aggregate `cpu` line: user nice system idle [iowait irq softirq steal ...].
/// iowait counts as idle; irq, softirq and steal count as system.
pub(super) fn parse_proc_stat(content: &str) -> Result<CpuTicks, AcquisitionError> {
    let line = content
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| AcquisitionError::Parse("no aggregate cpu line in /proc/stat".into()))?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|s| {
            s.parse()
                .map_err(|_| AcquisitionError::Parse(format!("bad cpu tick value {s:?}")))
        })
        .collect::<Result<_, _>>()?;
    if fields.len() < 4 {
        return Err(AcquisitionError::Parse(format!(
            "expected at least 4 cpu tick fields, got {}",
            fields.len()
        )));
    }
    let field = |i: usize| fields.get(i).copied().unwrap_or(0);

    Ok(CpuTicks {
        user: field(0),
        nice: field(1),
        system: field(2) + field(5) + field(6) + field(7),
        idle: field(3) + field(4),
    })
}

/// Maps meminfo onto page classes: Active, Inactive,
/// wired = Unevictable + KernelStack + PageTables + SUnreclaim, compressed = Zswap.
pub(super) fn parse_meminfo(content: &str) -> Result<VmStats, AcquisitionError> {
    let value = |key: &str| -> Option<u64> {
        content.lines().find_map(|line| {
            let rest = line.strip_prefix(key)?.strip_prefix(':')?;
            rest.split_whitespace().next()?.parse().ok()
        })
    };
    let required = |key: &str| {
        value(key).ok_or_else(|| AcquisitionError::Parse(format!("missing {key} in /proc/meminfo")))
    };

    let wired = ["Unevictable", "KernelStack", "PageTables", "SUnreclaim"]
        .iter()
        .filter_map(|&k| value(k))
        .sum();

    Ok(VmStats {
        active: required("Active")?,
        inactive: required("Inactive")?,
        wired,
        compressed: value("Zswap").unwrap_or(0),
        page_size: MEMINFO_PAGE_SIZE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_STAT: &str = "cpu  100 20 300 4000 50 6 7 8 0 0\n\
                             cpu0 50 10 150 2000 25 3 3 4 0 0\n\
                             intr 12345\n";

    const MEMINFO: &str = "MemTotal:       16000000 kB\n\
                           MemFree:         8000000 kB\n\
                           Active:          3000000 kB\n\
                           Inactive:        2000000 kB\n\
                           Active(anon):    1000000 kB\n\
                           Unevictable:        1000 kB\n\
                           KernelStack:       20000 kB\n\
                           PageTables:        30000 kB\n\
                           SUnreclaim:       149000 kB\n\
                           Zswap:             50000 kB\n";

    #[test]
    fn proc_stat_folds_extra_states() {
        let t = parse_proc_stat(PROC_STAT).unwrap();
        assert_eq!(t.user, 100);
        assert_eq!(t.nice, 20);
        assert_eq!(t.system, 300 + 6 + 7 + 8);
        assert_eq!(t.idle, 4000 + 50);
    }

    #[test]
    fn proc_stat_accepts_four_fields() {
        let t = parse_proc_stat("cpu 1 2 3 4\n").unwrap();
        assert_eq!((t.user, t.nice, t.system, t.idle), (1, 2, 3, 4));
    }

    #[test]
    fn proc_stat_rejects_missing_or_short_line() {
        assert!(matches!(
            parse_proc_stat("cpu0 1 2 3 4\n"),
            Err(AcquisitionError::Parse(_))
        ));
        assert!(matches!(
            parse_proc_stat("cpu 1 2\n"),
            Err(AcquisitionError::Parse(_))
        ));
    }

    #[test]
    fn meminfo_maps_page_classes() {
        let vm = parse_meminfo(MEMINFO).unwrap();
        assert_eq!(vm.active, 3_000_000);
        assert_eq!(vm.inactive, 2_000_000);
        assert_eq!(vm.wired, 200_000);
        assert_eq!(vm.compressed, 50_000);
        assert_eq!(vm.page_size, 1024);
    }

    #[test]
    fn meminfo_without_zswap_reports_no_compressed_pages() {
        let vm = parse_meminfo("Active: 10 kB\nInactive: 20 kB\n").unwrap();
        assert_eq!(vm.compressed, 0);
        assert_eq!(vm.wired, 0);
    }

    #[test]
    fn meminfo_missing_active_is_an_error() {
        assert!(parse_meminfo("Inactive: 20 kB\n").is_err());
    }
}
