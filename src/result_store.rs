use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use log::{debug, info};
use serde::{Deserialize, Deserializer, Serialize};
use tempfile::NamedTempFile;

use crate::error::{PromoError, Result};

pub const DEFAULT_RESULTS_FILE: &str = "alaska_promos.json";
pub const UNKNOWN_ORGANIZATION: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromoStatus {
    Active,
    #[serde(alias = "inactive")]
    Expired,
    #[default]
    Unknown,
}

impl fmt::Display for PromoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PromoStatus::Active => "active",
            PromoStatus::Expired => "expired",
            PromoStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Stored outcome for one code. The code itself is the document key.
/// Aliases keep documents written by the older script readable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoRecord {
    #[serde(
        alias = "company_name",
        default = "unknown_organization",
        deserialize_with = "organization_or_unknown"
    )]
    pub organization: String,
    #[serde(default)]
    pub status: PromoStatus,
    pub url: String,
    #[serde(alias = "found_date", deserialize_with = "flexible_timestamp")]
    pub discovered_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<String>,
}

impl PromoRecord {
    pub fn new(organization: impl Into<String>, status: PromoStatus, url: impl Into<String>) -> Self {
        PromoRecord {
            organization: organization.into(),
            status,
            url: url.into(),
            discovered_at: Utc::now(),
            expiration_date: None,
        }
    }

    pub fn has_known_organization(&self) -> bool {
        self.organization != UNKNOWN_ORGANIZATION
    }
}

fn unknown_organization() -> String {
    UNKNOWN_ORGANIZATION.to_string()
}

fn organization_or_unknown<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(unknown_organization))
}

/// RFC 3339, or a naive ISO timestamp (taken as UTC) from older documents.
fn flexible_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{}': {}", raw, e)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// In-memory view of the results document. Owns the file: nothing else
/// reads or writes it while a store is alive.
#[derive(Debug)]
pub struct ResultStore {
    path: PathBuf,
    records: BTreeMap<String, PromoRecord>,
    dirty: bool,
}

impl ResultStore {
    /// An empty store that will be written to `path` on save.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        ResultStore {
            path: path.as_ref().to_path_buf(),
            records: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Reads the document at `path`. A missing file is an empty store; an
    /// unparseable one is an error and is left untouched on disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut store = ResultStore::new(path);
        if !store.path.exists() {
            info!("No results file at {}. Starting fresh.", store.path.display());
            return Ok(store);
        }

        let content = fs::read_to_string(&store.path)?;
        store.records = serde_json::from_str(&content).map_err(|source| PromoError::StoreCorruption {
            path: store.path.clone(),
            source,
        })?;
        info!("Loaded {} existing results from {}", store.records.len(), store.path.display());
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn has(&self, code: &str) -> bool {
        self.records.contains_key(code)
    }

    pub fn get(&self, code: &str) -> Option<&PromoRecord> {
        self.records.get(code)
    }

    /// Inserts `record`, or refreshes an existing one while keeping its
    /// original `discovered_at`.
    pub fn upsert(&mut self, code: &str, mut record: PromoRecord) -> Upsert {
        self.dirty = true;
        match self.records.get_mut(code) {
            Some(existing) => {
                record.discovered_at = existing.discovered_at;
                *existing = record;
                Upsert::Updated
            }
            None => {
                self.records.insert(code.to_string(), record);
                Upsert::Inserted
            }
        }
    }

    /// Flags a known code as expired. Returns false for unknown codes.
    pub fn mark_expired(&mut self, code: &str) -> bool {
        match self.records.get_mut(code) {
            Some(existing) => {
                if existing.status != PromoStatus::Expired {
                    existing.status = PromoStatus::Expired;
                    self.dirty = true;
                }
                true
            }
            None => false,
        }
    }

    /// Writes the whole mapping to a temp file beside the target, then
    /// renames it over the target.
    pub fn save(&mut self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let json = serde_json::to_string_pretty(&self.records)?;
        let mut tmp = NamedTempFile::new_in(&parent)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        self.dirty = false;
        info!("Saved {} results to {}", self.records.len(), self.path.display());
        Ok(())
    }

    /// Case-insensitive substring match over known organization names,
    /// ordered by code.
    pub fn find_by_organization(&self, query: &str) -> Vec<(&str, &PromoRecord)> {
        let needle = query.trim().to_lowercase();
        let matches: Vec<(&str, &PromoRecord)> = self
            .records
            .iter()
            .filter(|(_, r)| r.has_known_organization() && r.organization.to_lowercase().contains(&needle))
            .map(|(code, r)| (code.as_str(), r))
            .collect();
        debug!("Organization query '{}' matched {} records", query, matches.len());
        matches
    }

    /// Every record, ordered by code.
    pub fn all(&self) -> Vec<(&str, &PromoRecord)> {
        self.records.iter().map(|(code, r)| (code.as_str(), r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(org: &str, status: PromoStatus, at: &str) -> PromoRecord {
        PromoRecord {
            organization: org.to_string(),
            status,
            url: "https://www.alaskaair.com/promo/AS2366".to_string(),
            discovered_at: DateTime::parse_from_rfc3339(at).unwrap().with_timezone(&Utc),
            expiration_date: None,
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let store = ResultStore::load(dir.path().join("absent.json")).unwrap();
        assert!(store.is_empty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_corrupt_file_is_reported_and_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("promos.json");
        fs::write(&path, "{\"AS2300\": {\"organization\": ").unwrap();

        let err = ResultStore::load(&path).unwrap_err();
        assert!(matches!(err, PromoError::StoreCorruption { .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"AS2300\": {\"organization\": ");
    }

    #[test]
    fn test_upsert_keeps_first_discovery_time() {
        let mut store = ResultStore::new("unused.json");
        let first = record("Microsoft", PromoStatus::Active, "2024-01-01T00:00:00Z");
        let second = record("Microsoft Corp", PromoStatus::Expired, "2025-06-01T12:00:00Z");

        assert_eq!(store.upsert("AS2366", first.clone()), Upsert::Inserted);
        assert_eq!(store.upsert("AS2366", second.clone()), Upsert::Updated);

        let stored = store.get("AS2366").unwrap();
        assert_eq!(stored.discovered_at, first.discovered_at);
        assert_eq!(stored.organization, "Microsoft Corp");
        assert_eq!(stored.status, PromoStatus::Expired);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("promos.json");
        let mut store = ResultStore::new(&path);
        store.upsert("CS2344", record("University Of Washington", PromoStatus::Active, "2024-03-02T10:11:12.345Z"));
        let mut expired = record("Acme", PromoStatus::Expired, "2024-01-01T00:00:00Z");
        expired.expiration_date = Some("12/31/2023".to_string());
        store.upsert("AS2301", expired);
        store.save().unwrap();
        assert!(!store.is_dirty());

        let reloaded = ResultStore::load(&path).unwrap();
        assert_eq!(reloaded.all(), store.all());

        // only the document itself is left in the directory
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_find_by_organization_is_case_insensitive() {
        let mut store = ResultStore::new("unused.json");
        store.upsert("AS2366", record("Microsoft", PromoStatus::Active, "2024-01-01T00:00:00Z"));
        store.upsert("AS2301", record("Amazon", PromoStatus::Active, "2024-01-01T00:00:00Z"));
        store.upsert("CS2300", record(UNKNOWN_ORGANIZATION, PromoStatus::Active, "2024-01-01T00:00:00Z"));

        let hits = store.find_by_organization("micro");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "AS2366");
        assert!(store.find_by_organization("MICROSOFT").len() == 1);
        assert!(store.find_by_organization("unknown").is_empty());
        assert!(store.find_by_organization("google").is_empty());
    }

    #[test]
    fn test_all_is_ordered_by_code() {
        let mut store = ResultStore::new("unused.json");
        for code in ["CS2300", "AS2399", "AS2300"] {
            store.upsert(code, record("X", PromoStatus::Active, "2024-01-01T00:00:00Z"));
        }
        let codes: Vec<&str> = store.all().into_iter().map(|(c, _)| c).collect();
        assert_eq!(codes, vec!["AS2300", "AS2399", "CS2300"]);
    }

    #[test]
    fn test_mark_expired_only_touches_known_codes() {
        let mut store = ResultStore::new("unused.json");
        assert!(!store.mark_expired("AS2300"));
        assert!(!store.is_dirty());

        store.upsert("AS2300", record("Acme", PromoStatus::Active, "2024-01-01T00:00:00Z"));
        assert!(store.mark_expired("AS2300"));
        let r = store.get("AS2300").unwrap();
        assert_eq!(r.status, PromoStatus::Expired);
        assert_eq!(r.organization, "Acme");
    }

    #[test]
    fn test_reads_legacy_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        fs::write(
            &path,
            r#"{
              "CS2344": {
                "promo_code": "CS2344",
                "url": "https://www.alaskaair.com/promo/CS2344",
                "company_name": "University of Washington",
                "found_date": "2024-05-01T12:30:00.123456",
                "status": "active"
              },
              "AS2310": {
                "promo_code": "AS2310",
                "url": "https://www.alaskaair.com/promo/AS2310",
                "company_name": null,
                "found_date": "2024-05-01T12:31:00",
                "status": "expired",
                "expiration_date": "04/30/2024"
              }
            }"#,
        )
        .unwrap();

        let store = ResultStore::load(&path).unwrap();
        let uw = store.get("CS2344").unwrap();
        assert_eq!(uw.organization, "University of Washington");
        assert_eq!(uw.status, PromoStatus::Active);
        assert_eq!(uw.discovered_at.to_rfc3339(), "2024-05-01T12:30:00.123456+00:00");

        let expired = store.get("AS2310").unwrap();
        assert_eq!(expired.organization, UNKNOWN_ORGANIZATION);
        assert_eq!(expired.status, PromoStatus::Expired);
        assert_eq!(expired.expiration_date.as_deref(), Some("04/30/2024"));
    }

    #[test]
    fn test_serialized_field_names_are_stable() {
        let mut store = ResultStore::new("unused.json");
        store.upsert("AS2366", record("Microsoft", PromoStatus::Active, "2024-01-01T00:00:00Z"));
        let json = serde_json::to_value(&store.records).unwrap();
        let entry = &json["AS2366"];
        assert_eq!(entry["organization"], "Microsoft");
        assert_eq!(entry["status"], "active");
        assert_eq!(entry["discovered_at"], "2024-01-01T00:00:00Z");
        assert!(entry.get("expiration_date").is_none());
    }
}
