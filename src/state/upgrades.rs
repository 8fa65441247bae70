//! Registered upgrade functions applied in order while
//! `@version < CURRENT_VERSION`, each bumping the version by exactly one.
//! Grounded on `uberdot/upgrades.py`'s two named upgrades.

use std::path::Path;

use serde_json::Value;

use crate::utils;

pub type UpgradeFn = fn(&mut Value, &Path) -> anyhow::Result<()>;

/// Ordered list of `(from_version, upgrade)`: `upgrade` transforms a
/// document at `from_version` into `from_version + 1`.
pub const UPGRADES: &[(u32, UpgradeFn)] = &[(1, stone_age), (2, flexible_events)];

fn profiles_mut(doc: &mut Value) -> impl Iterator<Item = &mut Value> {
    doc.as_object_mut()
        .into_iter()
        .flat_map(|m| m.iter_mut())
        .filter(|(k, _)| !k.starts_with('@'))
        .map(|(_, v)| v)
}

/// Pre-1.0 documents used `name` for the link path and had no `hard`,
/// `target_inode`, or `owner` fields. Renames `name` -> `path`, defaults
/// `hard = false`, resolves `target_inode` via `stat`, and fills `owner`
/// from the target's resolved uid/gid (or the current process's identity
/// if the target is missing).
pub fn stone_age(doc: &mut Value, _session_dir: &Path) -> anyhow::Result<()> {
    for profile in profiles_mut(doc) {
        let Some(links) = profile.get_mut("links").and_then(Value::as_array_mut) else {
            continue;
        };
        for link in links.iter_mut() {
            let Some(obj) = link.as_object_mut() else {
                continue;
            };
            if let Some(name) = obj.remove("name") {
                obj.entry("path".to_string()).or_insert(name);
            }
            obj.entry("hard".to_string()).or_insert(Value::Bool(false));

            if !obj.contains_key("target_inode") {
                let inode = obj
                    .get("target")
                    .and_then(Value::as_str)
                    .and_then(|t| std::fs::metadata(t).ok())
                    .map(|m| {
                        use std::os::unix::fs::MetadataExt;
                        m.ino()
                    });
                if let Some(inode) = inode {
                    obj.insert("target_inode".to_string(), Value::from(inode));
                }
            }

            if !obj.contains_key("owner") {
                let resolved = obj
                    .get("target")
                    .and_then(Value::as_str)
                    .map(Path::new)
                    .and_then(|p| utils::path_owner(p).ok())
                    .unwrap_or_else(|| {
                        let id = utils::real_identity();
                        (id.uid, id.gid)
                    });
                obj.insert(
                    "owner".to_string(),
                    Value::from(format!("{}:{}", resolved.0, resolved.1)),
                );
            }
        }
    }
    bump(doc, 2);
    Ok(())
}

/// Fill missing event-hash fields with `""`; if a profile references an
/// external event script by symlink (`<name>.<32-hex>` under the session
/// dir), extract the 32-hex suffix as the stored reference.
pub fn flexible_events(doc: &mut Value, session_dir: &Path) -> anyhow::Result<()> {
    const FIELDS: [&str; 6] = [
        "beforeInstall",
        "afterInstall",
        "beforeUpdate",
        "afterUpdate",
        "beforeUninstall",
        "afterUninstall",
    ];

    for profile in profiles_mut(doc) {
        let Some(obj) = profile.as_object_mut() else {
            continue;
        };
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        for field in FIELDS {
            if !obj.contains_key(field) || obj.get(field).map(Value::is_null).unwrap_or(false) {
                let extracted = extract_event_hash(session_dir, &name, field);
                obj.insert(field.to_string(), Value::from(extracted.unwrap_or_default()));
            }
        }
    }
    bump(doc, 3);
    Ok(())
}

fn extract_event_hash(session_dir: &Path, profile: &str, field: &str) -> Option<String> {
    let entries = std::fs::read_dir(session_dir).ok()?;
    let prefix = format!("{profile}.{field}.");
    for entry in entries.flatten() {
        let fname = entry.file_name();
        let fname = fname.to_string_lossy();
        if let Some(hex) = fname.strip_prefix(&prefix) {
            if hex.len() == 32 && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Some(hex.to_string());
            }
        }
    }
    None
}

fn bump(doc: &mut Value, to: u32) {
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("@version".to_string(), Value::from(to));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stone_age_renames_and_defaults() {
        let mut doc = json!({
            "@version": 1,
            "work": {
                "name": "work",
                "links": [
                    {"name": "/home/u/.vimrc", "target": "/repo/vimrc"}
                ]
            }
        });
        stone_age(&mut doc, Path::new("/tmp")).unwrap();
        let link = &doc["work"]["links"][0];
        assert_eq!(link["path"], "/home/u/.vimrc");
        assert!(link.get("name").is_none());
        assert_eq!(link["hard"], false);
        assert_eq!(doc["@version"], 2);
    }

    #[test]
    fn flexible_events_defaults_missing() {
        let mut doc = json!({
            "@version": 2,
            "work": {"name": "work", "links": []}
        });
        flexible_events(&mut doc, Path::new("/tmp")).unwrap();
        assert_eq!(doc["work"]["beforeInstall"], "");
        assert_eq!(doc["work"]["afterUninstall"], "");
        assert_eq!(doc["@version"], 3);
    }
}
