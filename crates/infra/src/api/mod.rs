//! Central listing endpoints feeding the identifier cache.
//!
//! One adapter per cached kind, all funneled through the batch dispatcher so
//! listings share its concurrency bound and rate-limit throttling. Device
//! inventory fans out over the three monitoring endpoints in one batch;
//! clients over the wireless and wired endpoints likewise.

use std::sync::Arc;

use async_trait::async_trait;
use centralkit_core::{BatchDispatcher, InventorySource};
use centralkit_domain::utils::mac::normalize_mac;
use centralkit_domain::{
    CacheEntry, CacheKind, CachedClient, CachedDevice, CachedGroup, CachedLabel, CachedSite,
    CachedTemplate, CallDescriptor, CallResult, CentralError, ClientType, DeviceType, Payload,
    Result,
};
use serde_json::Value;
use tracing::debug;

const SITES_PATH: &str = "/central/v2/sites";
const LABELS_PATH: &str = "/central/v2/labels";
const GROUPS_PATH: &str = "/configuration/v2/groups";
const GROUP_TEMPLATE_INFO_PATH: &str = "/configuration/v2/groups/template_info";
const APS_PATH: &str = "/monitoring/v2/aps";
const SWITCHES_PATH: &str = "/monitoring/v1/switches";
const GATEWAYS_PATH: &str = "/monitoring/v1/gateways";
const WIRELESS_CLIENTS_PATH: &str = "/monitoring/v1/clients/wireless";
const WIRED_CLIENTS_PATH: &str = "/monitoring/v1/clients/wired";

/// Page sizes the provider caps per endpoint family.
const MONITORING_PAGE: usize = 1000;
const GROUPS_PAGE: usize = 100;
const TEMPLATES_PAGE: usize = 20;
/// Max group names per `template_info` query.
const TEMPLATE_INFO_CHUNK: usize = 20;

/// [`InventorySource`] over the Central REST API.
pub struct CentralApi {
    dispatcher: Arc<BatchDispatcher>,
}

impl CentralApi {
    #[must_use]
    pub fn new(dispatcher: Arc<BatchDispatcher>) -> Self {
        Self { dispatcher }
    }

    async fn list_devices(&self) -> Result<Vec<CacheEntry>> {
        let descriptors = vec![
            CallDescriptor::get(APS_PATH).query("calculate_total", "false").paged(MONITORING_PAGE),
            CallDescriptor::get(SWITCHES_PATH)
                .query("calculate_total", "false")
                .paged(MONITORING_PAGE),
            CallDescriptor::get(GATEWAYS_PATH)
                .query("calculate_total", "false")
                .paged(MONITORING_PAGE),
        ];
        let results = self.dispatcher.execute_many(&descriptors).await;

        let mut entries = Vec::new();
        let plans = [
            ("aps", DeviceType::Ap),
            ("switches", DeviceType::Switch),
            ("gateways", DeviceType::Gateway),
        ];
        for (result, (list_key, dev_type)) in results.into_iter().zip(plans) {
            let value = require_success(result, list_key)?;
            entries.extend(parse_devices(&value, list_key, dev_type)?);
        }
        debug!(devices = entries.len(), "device inventory listed");
        Ok(entries)
    }

    async fn list_sites(&self) -> Result<Vec<CacheEntry>> {
        let descriptor = CallDescriptor::get(SITES_PATH)
            .query("calculate_total", "false")
            .paged(MONITORING_PAGE);
        let value = require_success(self.dispatcher.run_one(&descriptor).await, "sites")?;
        parse_sites(&value)
    }

    async fn list_labels(&self) -> Result<Vec<CacheEntry>> {
        let descriptor = CallDescriptor::get(LABELS_PATH)
            .query("calculate_total", "false")
            .paged(MONITORING_PAGE);
        let value = require_success(self.dispatcher.run_one(&descriptor).await, "labels")?;
        parse_labels(&value)
    }

    async fn list_groups(&self) -> Result<Vec<CacheEntry>> {
        let names = self.group_names().await?;
        if names.is_empty() {
            return Ok(Vec::new());
        }

        // template_info takes a bounded comma-separated name list.
        let descriptors: Vec<CallDescriptor> = names
            .chunks(TEMPLATE_INFO_CHUNK)
            .map(|chunk| {
                CallDescriptor::get(GROUP_TEMPLATE_INFO_PATH).query("groups", chunk.join(","))
            })
            .collect();
        let results = self.dispatcher.execute_many(&descriptors).await;

        let mut groups = Vec::new();
        for result in results {
            let value = require_success(result, "group template info")?;
            groups.extend(parse_group_template_info(&value)?);
        }
        debug!(groups = groups.len(), "group inventory listed");
        Ok(groups)
    }

    async fn list_templates(&self) -> Result<Vec<CacheEntry>> {
        let template_groups: Vec<String> = self
            .list_groups()
            .await?
            .into_iter()
            .filter_map(|entry| match entry {
                CacheEntry::Group(g) if g.is_template_group() => Some(g.name),
                _ => None,
            })
            .collect();
        if template_groups.is_empty() {
            return Ok(Vec::new());
        }

        let descriptors: Vec<CallDescriptor> = template_groups
            .iter()
            .map(|group| {
                CallDescriptor::get(format!("/configuration/v1/groups/{group}/templates"))
                    .paged(TEMPLATES_PAGE)
            })
            .collect();
        let results = self.dispatcher.execute_many(&descriptors).await;

        let mut templates = Vec::new();
        for (result, group) in results.into_iter().zip(&template_groups) {
            let value = require_success(result, "templates")?;
            templates.extend(parse_templates(&value, group)?);
        }
        Ok(templates)
    }

    async fn list_clients(&self) -> Result<Vec<CacheEntry>> {
        let descriptors = vec![
            CallDescriptor::get(WIRELESS_CLIENTS_PATH)
                .query("calculate_total", "false")
                .paged(MONITORING_PAGE),
            CallDescriptor::get(WIRED_CLIENTS_PATH)
                .query("calculate_total", "false")
                .paged(MONITORING_PAGE),
        ];
        let results = self.dispatcher.execute_many(&descriptors).await;

        let mut entries = Vec::new();
        for (result, client_type) in
            results.into_iter().zip([ClientType::Wireless, ClientType::Wired])
        {
            let value = require_success(result, "clients")?;
            entries.extend(parse_clients(&value, client_type)?);
        }
        debug!(clients = entries.len(), "client inventory listed");
        Ok(entries)
    }

    async fn group_names(&self) -> Result<Vec<String>> {
        let descriptor = CallDescriptor::get(GROUPS_PATH).paged(GROUPS_PAGE);
        let value = require_success(self.dispatcher.run_one(&descriptor).await, "groups")?;

        // Group rows arrive as single-element arrays: {"data": [["g1"], ...]}.
        let rows = require_array(&value, "data", "groups")?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(0).and_then(Value::as_str).map(str::to_string))
            .collect())
    }
}

#[async_trait]
impl InventorySource for CentralApi {
    async fn list(&self, kind: CacheKind) -> Result<Vec<CacheEntry>> {
        match kind {
            CacheKind::Device => self.list_devices().await,
            CacheKind::Site => self.list_sites().await,
            CacheKind::Group => self.list_groups().await,
            CacheKind::Template => self.list_templates().await,
            CacheKind::Label => self.list_labels().await,
            CacheKind::Client => self.list_clients().await,
        }
    }
}

/// Unwrap a successful JSON result or map the failure onto the error enum.
fn require_success(result: CallResult, context: &str) -> Result<Value> {
    if result.ok {
        return Ok(match result.output {
            Payload::Json(value) => value,
            _ => Value::Null,
        });
    }

    let detail = result.error.unwrap_or_else(|| "unknown failure".to_string());
    let message = format!("listing {context}: {detail}");
    Err(match result.status {
        0 => CentralError::Network(message),
        401 | 403 => CentralError::Auth(message),
        429 => CentralError::RateLimit(message),
        s if (200..300).contains(&s) => CentralError::Decode(message),
        _ => CentralError::Network(message),
    })
}

fn parse_devices(value: &Value, list_key: &str, dev_type: DeviceType) -> Result<Vec<CacheEntry>> {
    let rows = require_array(value, list_key, list_key)?;
    let mut devices = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(serial) = str_field(row, "serial") else {
            // Monitoring sometimes reports half-onboarded devices without a
            // serial; they cannot be addressed, so they are not cached.
            continue;
        };
        let mac =
            str_field(row, "macaddr").and_then(|raw| normalize_mac(&raw)).unwrap_or_default();
        let name = str_field(row, "name").unwrap_or_else(|| serial.clone());
        devices.push(CacheEntry::Device(CachedDevice {
            serial,
            mac,
            name,
            ip: str_field(row, "ip_address"),
            dev_type,
            site: str_field(row, "site"),
            group: str_field(row, "group_name"),
        }));
    }
    Ok(devices)
}

fn parse_clients(value: &Value, client_type: ClientType) -> Result<Vec<CacheEntry>> {
    let rows = require_array(value, "clients", "clients")?;
    let mut clients = Vec::with_capacity(rows.len());
    for row in rows {
        // A client without a usable MAC cannot be addressed.
        let Some(mac) = str_field(row, "macaddr").and_then(|raw| normalize_mac(&raw)) else {
            continue;
        };
        let name = str_field(row, "name")
            .or_else(|| str_field(row, "username"))
            .unwrap_or_else(|| mac.clone());
        clients.push(CacheEntry::Client(CachedClient {
            mac,
            name,
            ip: str_field(row, "ip_address"),
            client_type,
            connected_serial: str_field(row, "associated_device"),
            connected_name: str_field(row, "associated_device_name"),
            site: str_field(row, "site"),
            group: str_field(row, "group_name"),
        }));
    }
    Ok(clients)
}

fn parse_sites(value: &Value) -> Result<Vec<CacheEntry>> {
    let rows = require_array(value, "sites", "sites")?;
    let mut sites = Vec::with_capacity(rows.len());
    for row in rows {
        let Some(id) = row.get("site_id").and_then(Value::as_i64) else {
            continue;
        };
        let Some(name) = str_field(row, "site_name") else {
            continue;
        };
        sites.push(CacheEntry::Site(CachedSite {
            id,
            name,
            city: str_field(row, "city"),
            state: str_field(row, "state"),
            zipcode: str_field(row, "zipcode"),
            address: str_field(row, "address"),
        }));
    }
    Ok(sites)
}

fn parse_labels(value: &Value) -> Result<Vec<CacheEntry>> {
    let rows = require_array(value, "labels", "labels")?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let id = row.get("label_id").and_then(Value::as_i64)?;
            let name = str_field(row, "label_name")?;
            Some(CacheEntry::Label(CachedLabel { id, name }))
        })
        .collect())
}

fn parse_group_template_info(value: &Value) -> Result<Vec<CacheEntry>> {
    let rows = require_array(value, "data", "group template info")?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let name = str_field(row, "group")?;
            let details = row.get("template_details");
            let flag = |key: &str| {
                details.and_then(|d| d.get(key)).and_then(Value::as_bool).unwrap_or(false)
            };
            Some(CacheEntry::Group(CachedGroup {
                name,
                wired_template_group: flag("Wired"),
                wlan_template_group: flag("Wireless"),
            }))
        })
        .collect())
}

fn parse_templates(value: &Value, group: &str) -> Result<Vec<CacheEntry>> {
    let rows = require_array(value, "data", "templates")?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let name = str_field(row, "name")?;
            Some(CacheEntry::Template(CachedTemplate {
                name,
                group: group.to_string(),
                device_type: str_field(row, "device_type"),
                version: str_field(row, "version"),
                model: str_field(row, "model"),
            }))
        })
        .collect())
}

fn require_array<'a>(value: &'a Value, key: &str, context: &str) -> Result<&'a Vec<Value>> {
    value.get(key).and_then(Value::as_array).ok_or_else(|| {
        CentralError::Decode(format!("listing {context}: response has no {key} list"))
    })
}

fn str_field(row: &Value, key: &str) -> Option<String> {
    row.get(key).and_then(Value::as_str).filter(|s| !s.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
    //! Unit tests for the listing parsers.
    use serde_json::json;

    use super::*;

    #[test]
    fn devices_parse_with_normalized_macs() {
        let value = json!({"aps": [
            {"serial": "CN001", "macaddr": "20:4c:03:2f:f9:54", "name": "lobby-ap",
             "ip_address": "10.0.0.5", "site": "HQ", "group_name": "campus"},
            {"serial": "CN002", "macaddr": "bogus", "name": "attic-ap"}
        ]});

        let devices = parse_devices(&value, "aps", DeviceType::Ap).unwrap();
        assert_eq!(devices.len(), 2);
        match &devices[0] {
            CacheEntry::Device(d) => {
                assert_eq!(d.mac, "204C032FF954");
                assert_eq!(d.site.as_deref(), Some("HQ"));
            }
            other => panic!("expected device, got {other:?}"),
        }
        match &devices[1] {
            CacheEntry::Device(d) => assert!(d.mac.is_empty()),
            other => panic!("expected device, got {other:?}"),
        }
    }

    #[test]
    fn devices_without_serial_are_skipped() {
        let value = json!({"switches": [{"name": "half-onboarded"}]});
        assert!(parse_devices(&value, "switches", DeviceType::Switch).unwrap().is_empty());
    }

    #[test]
    fn clients_parse_keyed_by_normalized_mac() {
        let value = json!({"clients": [
            {"macaddr": "aa:bb:cc:dd:ee:ff", "name": "laptop-1", "ip_address": "10.0.1.20",
             "associated_device": "CN001", "associated_device_name": "lobby-ap",
             "site": "HQ", "group_name": "campus"},
            {"macaddr": "11:22:33:44:55:66", "username": "jdoe"},
            {"name": "no-mac-row"}
        ]});

        let clients = parse_clients(&value, ClientType::Wireless).unwrap();
        assert_eq!(clients.len(), 2);
        match &clients[0] {
            CacheEntry::Client(c) => {
                assert_eq!(c.mac, "AABBCCDDEEFF");
                assert_eq!(c.connected_serial.as_deref(), Some("CN001"));
            }
            other => panic!("expected client, got {other:?}"),
        }
        // username stands in when the monitoring row has no name.
        assert_eq!(clients[1].name(), "jdoe");
    }

    #[test]
    fn sites_parse_with_address_fields() {
        let value = json!({"sites": [
            {"site_id": 42, "site_name": "Nashville-HQ", "city": "Nashville",
             "state": "TN", "zipcode": "37211", "address": "500 Main St"}
        ]});

        let sites = parse_sites(&value).unwrap();
        match &sites[0] {
            CacheEntry::Site(s) => {
                assert_eq!(s.id, 42);
                assert_eq!(s.city.as_deref(), Some("Nashville"));
            }
            other => panic!("expected site, got {other:?}"),
        }
    }

    #[test]
    fn group_template_info_maps_wired_and_wireless_flags() {
        let value = json!({"data": [
            {"group": "branch", "template_details": {"Wired": true, "Wireless": false}},
            {"group": "campus", "template_details": {"Wired": false, "Wireless": false}}
        ]});

        let groups = parse_group_template_info(&value).unwrap();
        match (&groups[0], &groups[1]) {
            (CacheEntry::Group(branch), CacheEntry::Group(campus)) => {
                assert!(branch.is_template_group());
                assert!(!campus.is_template_group());
            }
            other => panic!("expected groups, got {other:?}"),
        }
    }

    #[test]
    fn templates_carry_their_group() {
        let value = json!({"data": [
            {"name": "wlan-base", "device_type": "IAP", "version": "ALL", "model": "ALL"}
        ]});

        let templates = parse_templates(&value, "branch").unwrap();
        assert_eq!(templates[0].canonical_key(), "branch/wlan-base");
    }

    #[test]
    fn labels_parse_id_and_name() {
        let value = json!({"labels": [{"label_id": 9, "label_name": "critical"}]});
        let labels = parse_labels(&value).unwrap();
        assert_eq!(labels[0].canonical_key(), "9");
        assert_eq!(labels[0].name(), "critical");
    }

    #[test]
    fn missing_list_key_is_a_decode_error() {
        let value = json!({"unexpected": []});
        assert!(matches!(parse_sites(&value), Err(CentralError::Decode(_))));
    }

    #[test]
    fn failed_results_map_to_error_variants() {
        let transport = CallResult::transport_failure("refused", std::time::Duration::ZERO);
        assert!(matches!(require_success(transport, "x"), Err(CentralError::Network(_))));

        let limited = CallResult::failure(
            429,
            Payload::Empty,
            "rate limit exceeded",
            std::time::Duration::ZERO,
        );
        assert!(matches!(require_success(limited, "x"), Err(CentralError::RateLimit(_))));

        let denied =
            CallResult::failure(403, Payload::Empty, "forbidden", std::time::Duration::ZERO);
        assert!(matches!(require_success(denied, "x"), Err(CentralError::Auth(_))));
    }
}
