use std::time::Duration;

use log::debug;

use robowatch_commons::models::cluster::PodUsage;

use crate::client::KubeClient;
use crate::error::KubeError;

const TOP_TIMEOUT: Duration = Duration::from_secs(15);

/// "380m" → 0.38 cores, "2" → 2 cores.
pub fn parse_cpu_quantity(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Some(millis) = raw.strip_suffix('m') {
        millis.parse::<f64>().ok().map(|m| m / 1000.0)
    } else {
        raw.parse::<f64>().ok()
    }
}

/// "183Mi" → bytes; bare numbers are already bytes.
pub fn parse_memory_quantity(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let units: [(&str, f64); 6] = [
        ("Ki", 1024.0),
        ("Mi", 1024.0 * 1024.0),
        ("Gi", 1024.0 * 1024.0 * 1024.0),
        ("K", 1000.0),
        ("M", 1000.0 * 1000.0),
        ("G", 1000.0 * 1000.0 * 1000.0),
    ];
    for (suffix, factor) in units {
        if let Some(value) = raw.strip_suffix(suffix) {
            return value.parse::<f64>().ok().map(|v| v * factor);
        }
    }
    raw.parse::<f64>().ok()
}

pub(crate) fn parse_top_output(stdout: &str) -> Vec<PodUsage> {
    let mut usages = Vec::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() || line.to_lowercase().contains("error") {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            continue;
        }
        let (Some(cpu_cores), Some(memory_bytes)) = (
            parse_cpu_quantity(parts[1]),
            parse_memory_quantity(parts[2]),
        ) else {
            continue;
        };
        usages.push(PodUsage {
            pod_name: parts[0].to_string(),
            cpu_used_millicores: (cpu_cores * 1000.0) as i64,
            memory_used_mb: (memory_bytes / (1024.0 * 1024.0) * 100.0).round() / 100.0,
        });
    }
    usages
}

impl KubeClient {
    /// Per-pod cpu/memory usage. Requires metrics-server on the cluster;
    /// an unavailable metrics API yields an empty list.
    pub async fn top_pods(&self) -> Result<Vec<PodUsage>, KubeError> {
        let output = self
            .ssh()
            .exec("kubectl top pods --no-headers 2>&1", TOP_TIMEOUT)
            .await?;
        if !output.success() {
            debug!("kubectl top pods unavailable: {}", output.stderr.trim());
            return Ok(Vec::new());
        }
        Ok(parse_top_output(&output.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_quantity() {
        assert_eq!(parse_cpu_quantity("380m"), Some(0.38));
        assert_eq!(parse_cpu_quantity("2"), Some(2.0));
        assert_eq!(parse_cpu_quantity("junk"), None);
    }

    #[test]
    fn test_parse_memory_quantity() {
        assert_eq!(parse_memory_quantity("1Ki"), Some(1024.0));
        assert_eq!(parse_memory_quantity("183Mi"), Some(183.0 * 1024.0 * 1024.0));
        assert_eq!(parse_memory_quantity("1G"), Some(1e9));
        assert_eq!(parse_memory_quantity("512"), Some(512.0));
    }

    #[test]
    fn test_parse_top_output() {
        let stdout = "rpa-job-honorarios-clientes-bitrix-9pltw-rz6lg   380m   183Mi\n\
                      api-proxy-7d9f8b6c5-x2x2x                        12m    45Mi\n";
        let usages = parse_top_output(stdout);
        assert_eq!(usages.len(), 2);
        assert_eq!(usages[0].pod_name, "rpa-job-honorarios-clientes-bitrix-9pltw-rz6lg");
        assert_eq!(usages[0].cpu_used_millicores, 380);
        assert_eq!(usages[0].memory_used_mb, 183.0);
    }

    #[test]
    fn test_parse_top_skips_error_lines() {
        let stdout = "error: Metrics API not available\n";
        assert!(parse_top_output(stdout).is_empty());
    }
}
