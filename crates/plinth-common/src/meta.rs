use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a repository maintainer, in decreasing order of influence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintainerRole {
    Owner,
    Lead,
    Maintainer,
}

impl MaintainerRole {
    /// Weight used by the influence ranking.
    pub fn weight(self) -> f64 {
        match self {
            MaintainerRole::Owner => 3.0,
            MaintainerRole::Lead => 1.5,
            MaintainerRole::Maintainer => 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maintainer {
    pub name: String,
    pub role: MaintainerRole,
}

/// Recognized metadata keys. Unknown keys pass through the bag verbatim.
pub mod keys {
    pub const VERSION: &str = "version";
    pub const DESCRIPTION: &str = "description";
    pub const LICENSE: &str = "license";
    pub const AUTHOR: &str = "author";
    pub const DOWNLOADS: &str = "downloads";
    pub const HOMEPAGE: &str = "homepage";
    pub const REPO_URL: &str = "repo_url";
    pub const REPO_STARS: &str = "repo_stars";
    pub const REPO_OWNER: &str = "repo_owner";
    pub const REPO_MAINTAINERS: &str = "repo_maintainers";
    pub const REPO_LAST_COMMIT: &str = "repo_last_commit";
    pub const REPO_LAST_RELEASE: &str = "repo_last_release";
    pub const REPO_ARCHIVED: &str = "repo_archived";
    pub const REPO_LANGUAGE: &str = "repo_language";
    pub const REPO_TOPICS: &str = "repo_topics";
    /// Reserved: round-trips a node's label through the serialized graph.
    pub const LABEL: &str = "_label";
}

/// The free-form, string-keyed metadata bag attached to every graph node,
/// with typed accessors for the recognized keys. Backed by a `BTreeMap` so
/// serialization order is deterministic.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meta(BTreeMap<String, Value>);

impl Meta {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Merges `other` into `self`, overwriting existing keys.
    pub fn merge(&mut self, other: impl IntoIterator<Item = (String, Value)>) {
        self.0.extend(other);
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    fn set_str(&mut self, key: &str, value: impl AsRef<str>) {
        self.0.insert(key.into(), Value::from(value.as_ref()));
    }

    pub fn version(&self) -> Option<&str> {
        self.get_str(keys::VERSION)
    }

    pub fn set_version(&mut self, version: impl AsRef<str>) {
        self.set_str(keys::VERSION, version);
    }

    pub fn description(&self) -> Option<&str> {
        self.get_str(keys::DESCRIPTION)
    }

    pub fn repo_url(&self) -> Option<&str> {
        self.get_str(keys::REPO_URL)
    }

    pub fn set_repo_url(&mut self, url: impl AsRef<str>) {
        self.set_str(keys::REPO_URL, url);
    }

    pub fn repo_stars(&self) -> Option<u64> {
        self.get_u64(keys::REPO_STARS)
    }

    pub fn set_repo_stars(&mut self, stars: u64) {
        self.0.insert(keys::REPO_STARS.into(), Value::from(stars));
    }

    pub fn repo_owner(&self) -> Option<&str> {
        self.get_str(keys::REPO_OWNER)
    }

    pub fn set_repo_owner(&mut self, owner: impl AsRef<str>) {
        self.set_str(keys::REPO_OWNER, owner);
    }

    pub fn repo_archived(&self) -> Option<bool> {
        self.0.get(keys::REPO_ARCHIVED).and_then(Value::as_bool)
    }

    pub fn set_repo_archived(&mut self, archived: bool) {
        self.0
            .insert(keys::REPO_ARCHIVED.into(), Value::from(archived));
    }

    pub fn repo_language(&self) -> Option<&str> {
        self.get_str(keys::REPO_LANGUAGE)
    }

    pub fn repo_last_commit(&self) -> Option<&str> {
        self.get_str(keys::REPO_LAST_COMMIT)
    }

    pub fn set_repo_last_commit(&mut self, stamp: impl AsRef<str>) {
        self.set_str(keys::REPO_LAST_COMMIT, stamp);
    }

    pub fn repo_last_release(&self) -> Option<&str> {
        self.get_str(keys::REPO_LAST_RELEASE)
    }

    pub fn repo_topics(&self) -> Vec<String> {
        self.0
            .get(keys::REPO_TOPICS)
            .and_then(Value::as_array)
            .map(|topics| {
                topics
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn maintainers(&self) -> Vec<Maintainer> {
        self.0
            .get(keys::REPO_MAINTAINERS)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn set_maintainers(&mut self, maintainers: &[Maintainer]) {
        if let Ok(value) = serde_json::to_value(maintainers) {
            self.0.insert(keys::REPO_MAINTAINERS.into(), value);
        }
    }
}

impl FromIterator<(String, Value)> for Meta {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Meta(iter.into_iter().collect())
    }
}

impl IntoIterator for Meta {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Days without a commit after which a repository counts as stale.
const STALE_DAYS: i64 = 730;
const MIN_MAINTAINERS: usize = 2;
const MIN_STARS: u64 = 25;

/// Whether a node should be flagged as brittle, judging from its repository
/// metadata: archived, stale, thin maintainer bench, or very few stars.
///
/// `now_epoch_days` is the current time in days since the Unix epoch; it is a
/// parameter so the flag stays reproducible in tests.
pub fn is_brittle(meta: &Meta, now_epoch_days: i64) -> bool {
    if meta.repo_archived() == Some(true) {
        return true;
    }
    if let Some(stamp) = meta.repo_last_commit() {
        if let Some(days) = parse_epoch_days(stamp) {
            if now_epoch_days - days > STALE_DAYS {
                return true;
            }
        }
    }
    let maintainers = meta.maintainers();
    if !maintainers.is_empty() && maintainers.len() < MIN_MAINTAINERS {
        return true;
    }
    matches!(meta.repo_stars(), Some(stars) if stars < MIN_STARS)
}

/// Parses the date prefix of an ISO-8601 timestamp (`YYYY-MM-DD...`) into
/// days since the Unix epoch. Returns `None` for anything unparseable.
fn parse_epoch_days(stamp: &str) -> Option<i64> {
    let date = stamp.get(..10)?;
    let mut parts = date.splitn(3, '-');
    let year: i64 = parts.next()?.parse().ok()?;
    let month: i64 = parts.next()?.parse().ok()?;
    let day: i64 = parts.next()?.parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    // Civil-date-to-epoch-days (Howard Hinnant's algorithm).
    let y = if month <= 2 { year - 1 } else { year };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    Some(era * 146_097 + doe - 719_468)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn typed_facade_round_trips() {
        let mut meta = Meta::new();
        meta.set_version("1.2.3");
        meta.set_repo_stars(404);
        meta.set_maintainers(&[Maintainer {
            name: "ada".into(),
            role: MaintainerRole::Owner,
        }]);
        meta.insert("x-custom", Value::from("kept"));

        assert_eq!(meta.version(), Some("1.2.3"));
        assert_eq!(meta.repo_stars(), Some(404));
        assert_eq!(meta.maintainers()[0].name, "ada");
        assert_eq!(meta.get("x-custom").and_then(Value::as_str), Some("kept"));
    }

    #[test]
    fn unknown_keys_survive_serialization() {
        let mut meta = Meta::new();
        meta.insert("weird:key", Value::from(7));
        let bytes = serde_json::to_vec(&meta).unwrap();
        let back: Meta = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn brittleness_from_archived_flag() {
        let mut meta = Meta::new();
        assert!(!is_brittle(&meta, 20_000));
        meta.set_repo_archived(true);
        assert!(is_brittle(&meta, 20_000));
    }

    #[test]
    fn brittleness_from_stale_commit() {
        let mut meta = Meta::new();
        meta.set_repo_stars(1_000);
        meta.set_repo_last_commit("2020-01-01T00:00:00Z");
        let now = parse_epoch_days("2026-01-01").unwrap();
        assert!(is_brittle(&meta, now));
        meta.set_repo_last_commit("2025-11-30T12:00:00Z");
        assert!(!is_brittle(&meta, now));
    }

    #[test]
    fn epoch_days_for_known_dates() {
        assert_eq!(parse_epoch_days("1970-01-01"), Some(0));
        assert_eq!(parse_epoch_days("1970-01-02T09:00:00Z"), Some(1));
        assert_eq!(parse_epoch_days("2000-03-01"), Some(11_017));
        assert_eq!(parse_epoch_days("not-a-date"), None);
    }
}
