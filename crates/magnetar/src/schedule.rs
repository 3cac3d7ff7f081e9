//! One-shot placement decisions over a directory of cluster manifests.

use magnetar_core::{from_yaml, Node, PersistentVolume, PersistentVolumeClaim, Pod, Service};
use magnetar_scheduler::{
    ClusterSnapshot, Policy, Scheduler, SchedulerConfig, SchedulerError,
};
use miette::{miette, Result};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

fn load_manifests<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    if !dir.is_dir() {
        return Ok(items);
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .map_err(|e| miette!("failed to read {}: {}", dir.display(), e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    paths.sort();

    for path in paths {
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| miette!("failed to read {}: {}", path.display(), e))?;
        items.push(from_yaml(&raw)?);
    }
    Ok(items)
}

/// Load a cluster snapshot from a manifest directory with `nodes/`,
/// `pods/`, `services/`, `volumes/`, and `claims/` subdirectories.
/// Missing subdirectories mean "none of that kind".
pub fn load_cluster(dir: &Path) -> Result<ClusterSnapshot> {
    let nodes: Vec<Node> = load_manifests(&dir.join("nodes"))?;
    let pods: Vec<Pod> = load_manifests(&dir.join("pods"))?;
    let services: Vec<Service> = load_manifests(&dir.join("services"))?;
    let persistent_volumes: Vec<PersistentVolume> = load_manifests(&dir.join("volumes"))?;
    let claims: Vec<PersistentVolumeClaim> = load_manifests(&dir.join("claims"))?;

    if nodes.is_empty() {
        return Err(miette!(
            help = "Put node manifests under the nodes/ subdirectory",
            "No nodes found in cluster directory {}",
            dir.display()
        ));
    }

    Ok(ClusterSnapshot {
        nodes,
        pods,
        services,
        persistent_volumes,
        claims,
    })
}

/// Rank the cluster's nodes for the pod manifest and print the result
pub async fn run_schedule(pod_path: &Path, cluster_dir: &Path, parallelism: usize) -> Result<()> {
    let raw = std::fs::read_to_string(pod_path)
        .map_err(|e| miette!("failed to read pod manifest {}: {}", pod_path.display(), e))?;
    let pod: Pod = from_yaml(&raw)?;

    let snapshot = Arc::new(load_cluster(cluster_dir)?);
    info!(
        "Loaded snapshot: {} nodes, {} pods, {} services",
        snapshot.nodes.len(),
        snapshot.pods.len(),
        snapshot.services.len()
    );

    let policy = Policy::with_defaults(snapshot.clone());
    let scheduler = Scheduler::new(SchedulerConfig { parallelism });

    match scheduler
        .schedule(&pod, snapshot, &policy, &CancellationToken::new())
        .await
    {
        Ok(ranked) => {
            for host_priority in &ranked.hosts {
                println!("{}\t{}", host_priority.host, host_priority.score);
            }
            Ok(())
        }
        Err(SchedulerError::NoFeasibleNodes {
            pod_name,
            explanation,
        }) => {
            for (node, reason) in &explanation {
                eprintln!("{}\t{}", node, reason);
            }
            Err(miette!(
                help = "Per-node reasons are listed above",
                "No feasible nodes found for pod {}",
                pod_name
            ))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magnetar_core::to_yaml;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn write_node(dir: &Path, name: &str, cpu: &str, memory: &str) {
        let mut node = Node::default();
        node.metadata.name = name.to_string();
        node.status.capacity = BTreeMap::from([
            ("cpu".to_string(), cpu.to_string()),
            ("memory".to_string(), memory.to_string()),
            ("pods".to_string(), "110".to_string()),
        ]);
        std::fs::write(
            dir.join("nodes").join(format!("{}.yaml", name)),
            to_yaml(&node).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_load_cluster() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nodes")).unwrap();
        write_node(dir.path(), "m1", "4", "8Gi");
        write_node(dir.path(), "m2", "2", "4Gi");

        let snapshot = load_cluster(dir.path()).unwrap();
        assert_eq!(snapshot.nodes.len(), 2);
        assert!(snapshot.pods.is_empty());
    }

    #[test]
    fn test_load_cluster_requires_nodes() {
        let dir = tempdir().unwrap();
        assert!(load_cluster(dir.path()).is_err());
    }

    #[tokio::test]
    async fn test_run_schedule_end_to_end() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nodes")).unwrap();
        write_node(dir.path(), "m1", "4", "8Gi");

        let mut pod = Pod::default();
        pod.metadata.name = "web".to_string();
        pod.metadata.namespace = "default".to_string();
        let pod_path = dir.path().join("pod.yaml");
        std::fs::write(&pod_path, to_yaml(&pod).unwrap()).unwrap();

        run_schedule(&pod_path, dir.path(), 4).await.unwrap();
    }
}
