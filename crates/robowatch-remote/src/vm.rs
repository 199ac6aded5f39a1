use std::time::Duration;

use log::{
    debug,
    warn,
};

use robowatch_commons::models::vm::{
    CpuSample,
    MemorySample,
    StorageSample,
    VmResources,
};

use crate::error::RemoteError;
use crate::ssh::SshSession;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Collects host memory, disk and CPU figures over SSH. Individual probe
/// failures leave their section zeroed; only a transport fault on the
/// first command bubbles so the poll loop can record it.
pub async fn fetch_vm_resources(ssh: &SshSession) -> Result<VmResources, RemoteError> {
    let mut resources = VmResources::default();

    let output = ssh.exec("free -b", PROBE_TIMEOUT).await?;
    if output.success() {
        if let Some(memory) = parse_free(&output.stdout) {
            resources.memory = memory;
        }
    } else {
        warn!("free -b failed: {}", output.stderr.trim());
    }

    match ssh.exec("df -B1 /", PROBE_TIMEOUT).await {
        Ok(output) if output.success() => {
            if let Some(storage) = parse_df(&output.stdout, 1) {
                resources.storage = storage;
            }
        }
        Ok(output) => warn!("df -B1 / failed: {}", output.stderr.trim()),
        Err(e) => warn!("df -B1 / failed: {e}"),
    }

    if resources.storage.total == 0 {
        // older coreutils without -B1 report 1K blocks
        if let Ok(output) = ssh.exec("df / | tail -1", PROBE_TIMEOUT).await {
            if output.success() {
                if let Some(storage) = parse_df(&output.stdout, 1024) {
                    resources.storage = storage;
                }
            }
        }
    }

    match ssh.exec("top -bn1 | grep 'Cpu(s)'", PROBE_TIMEOUT).await {
        Ok(output) if output.success() => {
            if let Some(cpu) = parse_top_cpu(&output.stdout) {
                resources.cpu = cpu;
            }
        }
        _ => {
            debug!("top unavailable, falling back to vmstat");
            if let Ok(output) = ssh.exec("vmstat 1 2 | tail -1", PROBE_TIMEOUT).await {
                if output.success() {
                    if let Some(cpu) = parse_vmstat_cpu(&output.stdout) {
                        resources.cpu = cpu;
                    }
                }
            }
        }
    }

    Ok(resources)
}

fn parse_free(stdout: &str) -> Option<MemorySample> {
    let line = stdout.lines().nth(1)?;
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 4 {
        return None;
    }
    let total = parts[1].parse().ok()?;
    let used = parts[2].parse().ok()?;
    let free = parts[3].parse().ok()?;
    Some(MemorySample::from_bytes(total, used, free))
}

fn parse_df(stdout: &str, block_size: u64) -> Option<StorageSample> {
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("Filesystem") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            continue;
        }
        // only the root mount is interesting when several rows come back
        if stdout.lines().count() > 2 && parts.last() != Some(&"/") {
            continue;
        }
        let total = parts[1].parse::<u64>().ok()? * block_size;
        let used = parts[2].parse::<u64>().ok()? * block_size;
        let free = parts[3].parse::<u64>().ok()? * block_size;
        if total == 0 {
            continue;
        }
        return Some(StorageSample::from_bytes(total, used, free));
    }
    None
}

fn parse_top_cpu(stdout: &str) -> Option<CpuSample> {
    // "%Cpu(s):  3.2 us,  1.1 sy,  0.0 ni, 95.1 id, ..."
    let idle_field = stdout
        .split(',')
        .find(|field| field.trim_end().ends_with("id"))?;
    let idle: f64 = idle_field
        .trim()
        .trim_end_matches("id")
        .trim()
        .trim_end_matches('%')
        .parse()
        .ok()?;
    Some(cpu_from_idle(idle))
}

fn parse_vmstat_cpu(stdout: &str) -> Option<CpuSample> {
    let parts: Vec<&str> = stdout.split_whitespace().collect();
    if parts.len() < 15 {
        return None;
    }
    let idle: f64 = parts[14].parse().ok()?;
    Some(cpu_from_idle(idle))
}

fn cpu_from_idle(idle: f64) -> CpuSample {
    let idle = idle.clamp(0.0, 100.0);
    CpuSample {
        total: 100.0,
        used: ((100.0 - idle) * 100.0).round() / 100.0,
        idle: (idle * 100.0).round() / 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_free() {
        let output = "              total        used        free      shared  buff/cache   available\n\
                      Mem:     8326160384  2147483648  4294967296    12345678  1883709440  5000000000\n\
                      Swap:             0           0           0\n";
        let memory = parse_free(output).unwrap();
        assert_eq!(memory.total, 8326160384);
        assert_eq!(memory.used, 2147483648);
        assert_eq!(memory.free, 4294967296);
        assert_eq!(memory.used_gb, 2.0);
    }

    #[test]
    fn test_parse_df_b1() {
        let output = "Filesystem       1B-blocks       Used  Available Use% Mounted on\n\
                      /dev/sda1      10737418240 2147483648 8589934592  20% /\n";
        let storage = parse_df(output, 1).unwrap();
        assert_eq!(storage.total, 10737418240);
        assert_eq!(storage.used, 2147483648);
        assert_eq!(storage.free, 8589934592);
    }

    #[test]
    fn test_parse_df_1k_blocks() {
        let output = "/dev/sda1 10485760 2097152 8388608 20% /\n";
        let storage = parse_df(output, 1024).unwrap();
        assert_eq!(storage.total, 10485760 * 1024);
        assert_eq!(storage.used, 2097152 * 1024);
    }

    #[test]
    fn test_parse_df_skips_other_mounts() {
        let output = "Filesystem 1B-blocks Used Available Use% Mounted on\n\
                      tmpfs 1000 100 900 10% /dev/shm\n\
                      /dev/sda1 10737418240 2147483648 8589934592 20% /\n";
        let storage = parse_df(output, 1).unwrap();
        assert_eq!(storage.total, 10737418240);
    }

    #[test]
    fn test_parse_top_cpu() {
        let output = "%Cpu(s):  3.2 us,  1.1 sy,  0.0 ni, 95.1 id,  0.5 wa,  0.0 hi,  0.1 si,  0.0 st\n";
        let cpu = parse_top_cpu(output).unwrap();
        assert_eq!(cpu.idle, 95.1);
        assert_eq!(cpu.used, 4.9);
    }

    #[test]
    fn test_parse_vmstat_cpu() {
        let output = " 1  0      0 4294967 123456 789012    0    0     1     2   33   44  3  1 95  1  0\n";
        let cpu = parse_vmstat_cpu(output).unwrap();
        assert_eq!(cpu.idle, 95.0);
        assert_eq!(cpu.used, 5.0);
    }

    #[test]
    fn test_cpu_clamps() {
        let cpu = cpu_from_idle(150.0);
        assert_eq!(cpu.idle, 100.0);
        assert_eq!(cpu.used, 0.0);
    }
}
