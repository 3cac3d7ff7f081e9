//! The taint editor: parse taint change specs, merge them into a node's
//! taint list, and write the node manifest back.

use magnetar_core::annotations::taints_from_annotations;
use magnetar_core::{from_yaml, to_yaml, Node, Taint, TaintEffect};
use miette::{miette, Result};
use std::path::{Path, PathBuf};

// Label-value rules: up to 63 chars of alphanumerics, '-', '_' or '.',
// starting and ending alphanumeric
fn is_valid_label_value(value: &str) -> bool {
    if value.is_empty() || value.len() > 63 {
        return false;
    }
    let chars: Vec<char> = value.chars().collect();
    if !chars[0].is_ascii_alphanumeric() || !chars[chars.len() - 1].is_ascii_alphanumeric() {
        return false;
    }
    chars
        .iter()
        .all(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
}

fn is_qualified_name(name: &str) -> bool {
    // Optionally prefixed with a DNS subdomain: prefix/name
    let name = match name.split_once('/') {
        Some((prefix, rest)) => {
            if !magnetar_core::resources::is_valid_name(prefix) {
                return false;
            }
            rest
        }
        None => name,
    };
    is_valid_label_value(name)
}

/// Parse taint change specs: `KEY=VALUE:EFFECT` adds or replaces,
/// `KEY-` removes. Returns the taints to apply and the keys to remove.
pub fn parse_taint_specs(specs: &[String]) -> Result<(Vec<Taint>, Vec<String>)> {
    let mut taints = Vec::new();
    let mut remove = Vec::new();

    for spec in specs {
        if spec.contains('=') && spec.contains(':') {
            let (key, rest) = spec
                .split_once('=')
                .ok_or_else(|| miette!("invalid taint spec: {}", spec))?;
            if !is_qualified_name(key) {
                return Err(miette!("invalid taint spec: {}", spec));
            }

            let (value, effect) = rest
                .split_once(':')
                .ok_or_else(|| miette!("invalid taint spec: {}", spec))?;
            if !is_valid_label_value(value) {
                return Err(miette!("invalid taint spec: {}", spec));
            }

            let effect: TaintEffect = effect
                .parse()
                .map_err(|_| miette!("invalid taint spec: {}, unsupported taint effect", spec))?;
            if !matches!(
                effect,
                TaintEffect::NoSchedule | TaintEffect::PreferNoSchedule
            ) {
                return Err(miette!(
                    "invalid taint spec: {}, unsupported taint effect",
                    spec
                ));
            }

            taints.push(Taint {
                key: key.to_string(),
                value: value.to_string(),
                effect,
            });
        } else if let Some(key) = spec.strip_suffix('-') {
            remove.push(key.to_string());
        } else {
            return Err(miette!("unknown taint spec: {}", spec));
        }
    }

    Ok((taints, remove))
}

fn validate_no_taint_overwrites(node: &Node, old: &[Taint], taints: &[Taint]) -> Result<()> {
    for taint in taints {
        if old.iter().any(|existing| existing.key == taint.key) {
            return Err(miette!(
                help = "Pass --overwrite to replace existing taints",
                "Node '{}' already has a taint with key '{}', and --overwrite is false",
                node.name(),
                taint.key
            ));
        }
    }
    Ok(())
}

fn delete_taint_by_key(taints: Vec<Taint>, key: &str) -> Result<Vec<Taint>> {
    let had_key = taints.iter().any(|t| t.key == key);
    if !had_key {
        return Err(miette!("taint key=\"{}\" not found", key));
    }
    Ok(taints.into_iter().filter(|t| t.key != key).collect())
}

/// Merge the requested changes into the node's current taint list.
///
/// Added taints replace same-key taints (only with `overwrite`); taints
/// not touched by the change set are kept; removals must name a key that
/// exists after the merge.
pub fn reorganize_taints(
    node: &Node,
    overwrite: bool,
    taints: &[Taint],
    remove: &[String],
) -> Result<Vec<Taint>> {
    let old = taints_from_annotations(&node.metadata.annotations)?;

    if !overwrite {
        validate_no_taint_overwrites(node, &old, taints)?;
    }

    let mut new_taints: Vec<Taint> = taints.to_vec();
    for old_taint in old {
        if !new_taints.iter().any(|t| t.key == old_taint.key) {
            new_taints.push(old_taint);
        }
    }

    for key in remove {
        new_taints = delete_taint_by_key(new_taints, key)?;
    }

    Ok(new_taints)
}

/// Where a node's manifest lives inside the data directory
pub fn node_manifest_path(data_dir: &Path, node_name: &str) -> PathBuf {
    data_dir.join("nodes").join(format!("{}.yaml", node_name))
}

pub fn load_node(path: &Path) -> Result<Node> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| miette!("failed to read node manifest {}: {}", path.display(), e))?;
    Ok(from_yaml(&raw)?)
}

pub fn store_node(path: &Path, node: &Node) -> Result<()> {
    let raw = to_yaml(node)?;
    std::fs::write(path, raw)
        .map_err(|e| miette!("failed to write node manifest {}: {}", path.display(), e))
}

/// Apply taint changes to the named node's manifest
pub fn run_taint(
    data_dir: &Path,
    node_name: &str,
    specs: &[String],
    overwrite: bool,
) -> Result<()> {
    let (taints, remove) = parse_taint_specs(specs)?;
    if taints.is_empty() && remove.is_empty() {
        return Err(miette!("at least one taint update is required"));
    }

    let path = node_manifest_path(data_dir, node_name);
    let mut node = load_node(&path)?;

    let new_taints = reorganize_taints(&node, overwrite, &taints, &remove)?;
    node.set_taints(&new_taints)?;
    store_node(&path, &node)?;

    println!("node/{} tainted", node_name);
    Ok(())
}
