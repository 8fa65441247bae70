pub mod global;
pub mod snapshot;
pub mod store;
pub mod upgrades;

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::model::ProfileState;

pub const MIN_VERSION: u32 = 1;
pub const CURRENT_VERSION: u32 = 3;

/// A per-user persisted document: profile name -> [`ProfileState`], plus
/// the `@version`/`@snapshot` bookkeeping keys from spec.md §3/§4.1.
///
/// Serialized by hand (rather than `#[derive(Serialize)]`) because the
/// wire format mixes the typed profile map with `@`-prefixed scalar keys
/// in one flat JSON object.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub version: u32,
    pub snapshot: Option<i64>,
    pub profiles: BTreeMap<String, ProfileState>,
}

impl State {
    pub fn empty() -> Self {
        State {
            version: CURRENT_VERSION,
            snapshot: None,
            profiles: BTreeMap::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("@version".to_string(), Value::from(self.version));
        if let Some(ts) = self.snapshot {
            map.insert("@snapshot".to_string(), Value::from(ts));
        }
        for (name, profile) in &self.profiles {
            map.insert(
                name.clone(),
                serde_json::to_value(profile).expect("ProfileState always serializes"),
            );
        }
        Value::Object(map)
    }

    pub fn from_json(value: Value) -> anyhow::Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| anyhow::anyhow!("state document root is not an object"))?;

        let version = obj
            .get("@version")
            .and_then(Value::as_u64)
            .map(|v| v as u32)
            .unwrap_or(CURRENT_VERSION);
        let snapshot = obj.get("@snapshot").and_then(Value::as_i64);

        let mut profiles = BTreeMap::new();
        for (key, val) in obj {
            if key.starts_with('@') {
                continue;
            }
            let profile: ProfileState = serde_json::from_value(val.clone())
                .map_err(|e| anyhow::anyhow!("profile '{key}' malformed: {e}"))?;
            profiles.insert(key.clone(), profile);
        }

        Ok(State {
            version,
            snapshot,
            profiles,
        })
    }

    /// Run `body` against a mutable borrow and persist exactly once if it
    /// succeeds; nothing is written on error. Replaces the original's
    /// reactive auto-write with the explicit single-commit-point pattern
    /// recommended in spec.md §9.
    pub fn transaction<F>(&mut self, session_dir: &std::path::Path, body: F) -> anyhow::Result<()>
    where
        F: FnOnce(&mut State) -> anyhow::Result<()>,
    {
        body(self)?;
        store::save(session_dir, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_roundtrip_empty() {
        let s = State::empty();
        let v = s.to_json();
        let s2 = State::from_json(v).unwrap();
        assert_eq!(s2.version, CURRENT_VERSION);
        assert!(s2.profiles.is_empty());
    }

    #[test]
    fn json_roundtrip_with_profile() {
        let mut s = State::empty();
        s.profiles
            .insert("work".to_string(), ProfileState::new("work"));
        let v = s.to_json();
        assert!(v.get("work").is_some());
        let s2 = State::from_json(v).unwrap();
        assert_eq!(s2.profiles.len(), 1);
        assert_eq!(s2.profiles["work"].name, "work");
    }
}
