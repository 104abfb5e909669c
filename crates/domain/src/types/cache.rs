//! Cached inventory records and resolution results.
//!
//! One denormalized record type per resolvable object kind. Each carries a
//! stable canonical key (serial, site id, group name, ...) plus the alternate
//! fields the resolver matches on. A device's `site`/`group` fields are
//! by-name back-references, not pointers into the other tables.

use serde::{Deserialize, Serialize};

/// The object kinds the identifier cache can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    Device,
    Site,
    Group,
    Template,
    Label,
    Client,
}

impl CacheKind {
    pub const ALL: [Self; 6] =
        [Self::Device, Self::Site, Self::Group, Self::Template, Self::Label, Self::Client];

    /// Table name in the persistent store.
    #[must_use]
    pub fn table(&self) -> &'static str {
        match self {
            Self::Device => "devices",
            Self::Site => "sites",
            Self::Group => "groups",
            Self::Template => "templates",
            Self::Label => "labels",
            Self::Client => "clients",
        }
    }
}

impl std::fmt::Display for CacheKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table().trim_end_matches('s'))
    }
}

/// Broad device category as Central's monitoring API reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Ap,
    Switch,
    Gateway,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDevice {
    /// Canonical key the API expects for device operations.
    pub serial: String,
    /// Normalized MAC: uppercase hex, no separators.
    pub mac: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub dev_type: DeviceType,
    /// Site name back-reference; resolved by name on demand.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    /// Group name back-reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedSite {
    /// Canonical key (`site_id` in the API).
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zipcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedGroup {
    /// Group name is the canonical key; Central has no separate group id.
    pub name: String,
    #[serde(default)]
    pub wired_template_group: bool,
    #[serde(default)]
    pub wlan_template_group: bool,
}

impl CachedGroup {
    /// Whether templates can exist in this group.
    #[must_use]
    pub fn is_template_group(&self) -> bool {
        self.wired_template_group || self.wlan_template_group
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedTemplate {
    pub name: String,
    /// Owning group; templates are only unique per group.
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CachedTemplate {
    /// Canonical key: group-qualified name.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.group, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedLabel {
    pub id: i64,
    pub name: String,
}

/// Whether a client is associated over the air or plugged into a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientType {
    Wired,
    Wireless,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedClient {
    /// Canonical key: clients have no serial, the normalized MAC is the
    /// identifier every client operation takes.
    pub mac: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub client_type: ClientType,
    /// Serial of the AP or switch the client is attached to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// One record of any kind. The store and the resolver work on this sum type
/// so a single table-swap path serves every kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheEntry {
    Device(CachedDevice),
    Site(CachedSite),
    Group(CachedGroup),
    Template(CachedTemplate),
    Label(CachedLabel),
    Client(CachedClient),
}

impl CacheEntry {
    #[must_use]
    pub fn kind(&self) -> CacheKind {
        match self {
            Self::Device(_) => CacheKind::Device,
            Self::Site(_) => CacheKind::Site,
            Self::Group(_) => CacheKind::Group,
            Self::Template(_) => CacheKind::Template,
            Self::Label(_) => CacheKind::Label,
            Self::Client(_) => CacheKind::Client,
        }
    }

    /// Canonical identifier the API expects for this object.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        match self {
            Self::Device(d) => d.serial.clone(),
            Self::Site(s) => s.id.to_string(),
            Self::Group(g) => g.name.clone(),
            Self::Template(t) => t.key(),
            Self::Label(l) => l.id.to_string(),
            Self::Client(c) => c.mac.clone(),
        }
    }

    /// Display name used for ambiguity reporting and tie-breaking.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Device(d) => &d.name,
            Self::Site(s) => &s.name,
            Self::Group(g) => &g.name,
            Self::Template(t) => &t.name,
            Self::Label(l) => &l.name,
            Self::Client(c) => &c.name,
        }
    }
}

/// Outcome of an identifier lookup. Ambiguity and misses are first-class
/// values so CLI and library callers each decide how to present them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Resolution {
    Found(CacheEntry),
    NotFound,
    /// Two or more equally-ranked candidates matched the query.
    Ambiguous(Vec<CacheEntry>),
}

impl Resolution {
    #[must_use]
    pub fn found(&self) -> Option<&CacheEntry> {
        match self {
            Self::Found(entry) => Some(entry),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for types::cache.
    use super::*;

    fn device(serial: &str, name: &str) -> CachedDevice {
        CachedDevice {
            serial: serial.to_string(),
            mac: "AABBCCDDEEFF".to_string(),
            name: name.to_string(),
            ip: None,
            dev_type: DeviceType::Ap,
            site: None,
            group: None,
        }
    }

    #[test]
    fn canonical_keys_per_kind() {
        assert_eq!(CacheEntry::Device(device("CN12345678", "ap1")).canonical_key(), "CN12345678");

        let site = CachedSite {
            id: 42,
            name: "HQ".to_string(),
            city: None,
            state: None,
            zipcode: None,
            address: None,
        };
        assert_eq!(CacheEntry::Site(site).canonical_key(), "42");

        let template = CachedTemplate {
            name: "wlan-base".to_string(),
            group: "branch".to_string(),
            device_type: None,
            version: None,
            model: None,
        };
        assert_eq!(CacheEntry::Template(template).canonical_key(), "branch/wlan-base");

        let client = CachedClient {
            mac: "AABBCCDDEEFF".to_string(),
            name: "laptop-1".to_string(),
            ip: None,
            client_type: ClientType::Wireless,
            connected_serial: None,
            connected_name: None,
            site: None,
            group: None,
        };
        assert_eq!(CacheEntry::Client(client).canonical_key(), "AABBCCDDEEFF");
    }

    #[test]
    fn entry_round_trips_through_json() {
        let entry = CacheEntry::Device(device("CN001", "lobby-ap"));
        let json = serde_json::to_string(&entry).unwrap();
        let back: CacheEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn unknown_optional_fields_are_tolerated() {
        // Records gain optional fields over time; old rows must still load.
        let raw = r#"{"kind":"site","id":7,"name":"Annex","future_field":"x"}"#;
        let entry: CacheEntry = serde_json::from_str(raw).unwrap();
        assert_eq!(entry.name(), "Annex");
    }
}
