//! Quantity-string parsing for CPU, memory, and pod counts.
//!
//! CPU is written as whole cores ("2"), fractional cores ("0.5"), or
//! millicores ("250m") and normalizes to millicores. Memory is written as
//! plain bytes ("1024") or with a binary suffix ("512Ki", "128Mi", "4Gi")
//! and normalizes to bytes.

use std::collections::BTreeMap;

// Binary memory suffixes, largest first so "Mi" is tried before a bare
// integer parse
const MEMORY_SUFFIXES: [(&str, i64); 3] = [("Gi", 1 << 30), ("Mi", 1 << 20), ("Ki", 1 << 10)];

/// Normalized CPU and memory quantities
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceQuantities {
    pub cpu_millicores: i64,
    pub memory_bytes: i64,
}

impl ResourceQuantities {
    /// Parse a CPU quantity string into millicores
    pub fn parse_cpu(quantity: &str) -> Result<i64, String> {
        let quantity = quantity.trim();
        if let Some(millis) = quantity.strip_suffix('m') {
            return millis
                .parse::<i64>()
                .map_err(|_| format!("invalid millicore quantity {:?}", quantity));
        }
        let cores: f64 = quantity
            .parse()
            .map_err(|_| format!("invalid CPU quantity {:?}", quantity))?;
        Ok((cores * 1000.0).round() as i64)
    }

    /// Parse a memory quantity string into bytes
    pub fn parse_memory(quantity: &str) -> Result<i64, String> {
        let quantity = quantity.trim();
        for (suffix, multiplier) in MEMORY_SUFFIXES {
            if let Some(count) = quantity.strip_suffix(suffix) {
                let count: i64 = count
                    .parse()
                    .map_err(|_| format!("invalid memory quantity {:?}", quantity))?;
                return Ok(count * multiplier);
            }
        }
        quantity
            .parse::<i64>()
            .map_err(|_| format!("invalid memory quantity {:?}", quantity))
    }

    /// Read the `cpu` and `memory` entries of a resource map.
    ///
    /// Absent or unparseable entries count as zero, which downstream code
    /// treats as "nothing requested" (pods) or "unlimited" (capacity).
    pub fn from_resource_map(resources: &BTreeMap<String, String>) -> Self {
        let entry = |key: &str, parse: fn(&str) -> Result<i64, String>| {
            resources.get(key).and_then(|raw| parse(raw).ok()).unwrap_or(0)
        };
        Self {
            cpu_millicores: entry("cpu", Self::parse_cpu),
            memory_bytes: entry("memory", Self::parse_memory),
        }
    }
}

/// Node capacity: CPU, memory, and the pod count ceiling.
///
/// A zero entry means "unlimited" for that resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeCapacity {
    pub cpu_millicores: i64,
    pub memory_bytes: i64,
    pub pods: i64,
}

impl NodeCapacity {
    /// Get capacity from a node's capacity map (keys `cpu`, `memory`, `pods`)
    pub fn from_capacity_map(capacity: &BTreeMap<String, String>) -> Self {
        let quantities = ResourceQuantities::from_resource_map(capacity);
        let pods = capacity
            .get("pods")
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(0);

        Self {
            cpu_millicores: quantities.cpu_millicores,
            memory_bytes: quantities.memory_bytes,
            pods,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_forms() {
        assert_eq!(ResourceQuantities::parse_cpu("250m"), Ok(250));
        assert_eq!(ResourceQuantities::parse_cpu("1500m"), Ok(1500));
        assert_eq!(ResourceQuantities::parse_cpu("3"), Ok(3000));
        assert_eq!(ResourceQuantities::parse_cpu("0.25"), Ok(250));
        assert_eq!(ResourceQuantities::parse_cpu(" 1 "), Ok(1000));

        assert!(ResourceQuantities::parse_cpu("m").is_err());
        assert!(ResourceQuantities::parse_cpu("lots").is_err());
        assert!(ResourceQuantities::parse_cpu("").is_err());
    }

    #[test]
    fn test_parse_memory_forms() {
        assert_eq!(ResourceQuantities::parse_memory("2048"), Ok(2048));
        assert_eq!(ResourceQuantities::parse_memory("512Ki"), Ok(512 * 1024));
        assert_eq!(ResourceQuantities::parse_memory("1536Mi"), Ok(1536 << 20));
        assert_eq!(ResourceQuantities::parse_memory("2Gi"), Ok(2 << 30));

        // Decimal suffixes are not a thing here
        assert!(ResourceQuantities::parse_memory("2G").is_err());
        assert!(ResourceQuantities::parse_memory("Mi").is_err());
    }

    #[test]
    fn test_resource_map_defaults_to_zero() {
        let mut map = BTreeMap::new();
        map.insert("cpu".to_string(), "750m".to_string());

        let quantities = ResourceQuantities::from_resource_map(&map);
        assert_eq!(quantities.cpu_millicores, 750);
        assert_eq!(quantities.memory_bytes, 0);

        map.insert("memory".to_string(), "garbage".to_string());
        let quantities = ResourceQuantities::from_resource_map(&map);
        assert_eq!(quantities.memory_bytes, 0);
    }

    #[test]
    fn test_capacity_from_map() {
        let mut map = BTreeMap::new();
        map.insert("cpu".to_string(), "2".to_string());
        map.insert("memory".to_string(), "2Gi".to_string());
        map.insert("pods".to_string(), "10".to_string());

        let capacity = NodeCapacity::from_capacity_map(&map);
        assert_eq!(capacity.cpu_millicores, 2000);
        assert_eq!(capacity.memory_bytes, 2 << 30);
        assert_eq!(capacity.pods, 10);

        // Missing entries mean unlimited
        let capacity = NodeCapacity::from_capacity_map(&BTreeMap::new());
        assert_eq!(capacity.cpu_millicores, 0);
        assert_eq!(capacity.pods, 0);
    }
}
