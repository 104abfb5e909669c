//! Pure identifier-matching tiers.
//!
//! Each kind has a fixed tier ladder. Tiers are tried in order; the first
//! tier with any candidates decides the outcome. A tier with exactly one
//! candidate resolves, more than one is ambiguous, except substring tiers
//! where the shortest matching name wins and only equal-length ties are
//! ambiguous. Given the same table and query the outcome never varies.

use centralkit_domain::utils::mac::{normalize_mac, normalize_mac_prefix};
use centralkit_domain::{CacheEntry, CacheKind, Resolution};

/// Resolve `query` against one kind's table.
pub(crate) fn lookup(kind: CacheKind, entries: &[CacheEntry], query: &str) -> Resolution {
    match kind {
        CacheKind::Device => lookup_device(entries, query),
        CacheKind::Site => lookup_site(entries, query),
        CacheKind::Client => lookup_client(entries, query),
        CacheKind::Group | CacheKind::Template | CacheKind::Label => lookup_named(entries, query),
    }
}

fn lookup_device(entries: &[CacheEntry], query: &str) -> Resolution {
    let mac_query = normalize_mac(query);
    // Users paste IPs with a CIDR suffix; the suffix never disambiguates.
    let ip_query = query.split('/').next().unwrap_or(query);

    let tiers: [Tier<'_>; 8] = [
        Tier::exact(|e| device(e).is_some_and(|d| d.serial.eq_ignore_ascii_case(query))),
        Tier::exact(|e| {
            mac_query.as_deref().is_some_and(|mac| device(e).is_some_and(|d| d.mac == mac))
        }),
        Tier::exact(|e| e.name() == query),
        Tier::exact(|e| device(e).is_some_and(|d| d.ip.as_deref() == Some(ip_query))),
        Tier::exact(|e| e.name().eq_ignore_ascii_case(query)),
        Tier::exact(|e| dash_fold(e.name()) == dash_fold(query)),
        Tier::exact(|e| {
            ci_prefix(e.name(), query)
                || device(e).is_some_and(|d| ci_prefix(&d.serial, query))
        }),
        Tier::substring(|e| ci_contains(e.name(), query)),
    ];
    run_tiers(entries, &tiers)
}

fn lookup_site(entries: &[CacheEntry], query: &str) -> Resolution {
    let tiers: [Tier<'_>; 7] = [
        Tier::exact(|e| e.name() == query),
        Tier::exact(|e| {
            site(e).is_some_and(|s| {
                s.id.to_string() == query
                    || s.city.as_deref() == Some(query)
                    || s.state.as_deref() == Some(query)
                    || s.zipcode.as_deref() == Some(query)
                    || s.address.as_deref() == Some(query)
            })
        }),
        Tier::exact(|e| e.name().eq_ignore_ascii_case(query)),
        Tier::exact(|e| dash_fold(e.name()) == dash_fold(query)),
        Tier::exact(|e| ci_prefix(e.name(), query)),
        Tier::substring(|e| ci_contains(e.name(), query)),
        Tier::exact(|e| {
            site(e).is_some_and(|s| {
                [s.city.as_deref(), s.state.as_deref(), s.address.as_deref()]
                    .iter()
                    .flatten()
                    .any(|field| ci_prefix(field, query))
            })
        }),
    ];
    run_tiers(entries, &tiers)
}

fn lookup_client(entries: &[CacheEntry], query: &str) -> Resolution {
    let mac_query = normalize_mac(query);
    // Partial MACs are a common way to pick a client off a crowded network.
    let mac_prefix = normalize_mac_prefix(query);

    let tiers: [Tier<'_>; 6] = [
        Tier::exact(|e| {
            client(e).is_some_and(|c| {
                c.name == query
                    || mac_query.as_deref().is_some_and(|mac| c.mac == mac)
                    || c.ip.as_deref() == Some(query)
            })
        }),
        Tier::exact(|e| e.name().eq_ignore_ascii_case(query)),
        Tier::exact(|e| dash_fold(e.name()) == dash_fold(query)),
        Tier::exact(|e| {
            ci_prefix(e.name(), query)
                || client(e).is_some_and(|c| c.ip.as_deref().is_some_and(|ip| ci_prefix(ip, query)))
        }),
        Tier::exact(|e| {
            mac_prefix
                .as_deref()
                .is_some_and(|prefix| client(e).is_some_and(|c| c.mac.starts_with(prefix)))
        }),
        Tier::substring(|e| ci_contains(e.name(), query)),
    ];
    run_tiers(entries, &tiers)
}

/// Common ladder for kinds whose only searchable field is the name.
fn lookup_named(entries: &[CacheEntry], query: &str) -> Resolution {
    let tiers: [Tier<'_>; 5] = [
        Tier::exact(|e| e.name() == query),
        Tier::exact(|e| e.name().eq_ignore_ascii_case(query)),
        Tier::exact(|e| dash_strip(e.name()) == dash_strip(query)),
        Tier::exact(|e| ci_prefix(e.name(), query)),
        Tier::substring(|e| ci_contains(e.name(), query)),
    ];
    run_tiers(entries, &tiers)
}

struct Tier<'a> {
    matches: Box<dyn Fn(&CacheEntry) -> bool + 'a>,
    shortest_wins: bool,
}

impl<'a> Tier<'a> {
    fn exact(matches: impl Fn(&CacheEntry) -> bool + 'a) -> Self {
        Self { matches: Box::new(matches), shortest_wins: false }
    }

    fn substring(matches: impl Fn(&CacheEntry) -> bool + 'a) -> Self {
        Self { matches: Box::new(matches), shortest_wins: true }
    }
}

fn run_tiers(entries: &[CacheEntry], tiers: &[Tier<'_>]) -> Resolution {
    for tier in tiers {
        let candidates: Vec<&CacheEntry> = entries.iter().filter(|e| (tier.matches)(e)).collect();
        match candidates.len() {
            0 => continue,
            1 => return Resolution::Found(candidates[0].clone()),
            _ if tier.shortest_wins => return shortest_name(&candidates),
            _ => return Resolution::Ambiguous(candidates.into_iter().cloned().collect()),
        }
    }
    Resolution::NotFound
}

/// Among substring matches the shortest name is the most specific match.
fn shortest_name(candidates: &[&CacheEntry]) -> Resolution {
    let min_len = candidates.iter().map(|e| e.name().len()).min().unwrap_or(0);
    let shortest: Vec<&&CacheEntry> =
        candidates.iter().filter(|e| e.name().len() == min_len).collect();
    if shortest.len() == 1 {
        Resolution::Found((*shortest[0]).clone())
    } else {
        Resolution::Ambiguous(shortest.into_iter().map(|e| (*e).clone()).collect())
    }
}

fn device(entry: &CacheEntry) -> Option<&centralkit_domain::CachedDevice> {
    match entry {
        CacheEntry::Device(d) => Some(d),
        _ => None,
    }
}

fn site(entry: &CacheEntry) -> Option<&centralkit_domain::CachedSite> {
    match entry {
        CacheEntry::Site(s) => Some(s),
        _ => None,
    }
}

fn client(entry: &CacheEntry) -> Option<&centralkit_domain::CachedClient> {
    match entry {
        CacheEntry::Client(c) => Some(c),
        _ => None,
    }
}

/// Fold `_` into `-` so `wlan_lab` and `wlan-lab` compare equal.
fn dash_fold(s: &str) -> String {
    s.chars().map(|c| if c == '_' { '-' } else { c.to_ascii_lowercase() }).collect()
}

/// Drop `-` and `_` entirely, for kinds where naming conventions differ.
fn dash_strip(s: &str) -> String {
    s.chars().filter(|c| *c != '-' && *c != '_').map(|c| c.to_ascii_lowercase()).collect()
}

fn ci_prefix(haystack: &str, prefix: &str) -> bool {
    haystack.get(..prefix.len()).is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

fn ci_contains(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    //! Unit tests for cache::lookup.
    use centralkit_domain::{
        CachedClient, CachedDevice, CachedGroup, CachedSite, ClientType, DeviceType,
    };

    use super::*;

    fn device_entry(serial: &str, mac: &str, name: &str, ip: Option<&str>) -> CacheEntry {
        CacheEntry::Device(CachedDevice {
            serial: serial.to_string(),
            mac: mac.to_string(),
            name: name.to_string(),
            ip: ip.map(str::to_string),
            dev_type: DeviceType::Ap,
            site: None,
            group: None,
        })
    }

    fn site_entry(id: i64, name: &str, city: Option<&str>) -> CacheEntry {
        CacheEntry::Site(CachedSite {
            id,
            name: name.to_string(),
            city: city.map(str::to_string),
            state: None,
            zipcode: None,
            address: None,
        })
    }

    fn client_entry(mac: &str, name: &str, ip: Option<&str>) -> CacheEntry {
        CacheEntry::Client(CachedClient {
            mac: mac.to_string(),
            name: name.to_string(),
            ip: ip.map(str::to_string),
            client_type: ClientType::Wireless,
            connected_serial: None,
            connected_name: None,
            site: None,
            group: None,
        })
    }

    fn group_entry(name: &str) -> CacheEntry {
        CacheEntry::Group(CachedGroup {
            name: name.to_string(),
            wired_template_group: false,
            wlan_template_group: false,
        })
    }

    fn devices() -> Vec<CacheEntry> {
        vec![
            device_entry("CN100AAA01", "204C032FF954", "lobby-ap", Some("10.0.0.5")),
            device_entry("CN100AAA02", "AABBCCDDEEFF", "lobby-ap-2", Some("10.0.0.6")),
            device_entry("CN200BBB01", "112233445566", "core-sw", Some("10.0.0.1")),
        ]
    }

    #[test]
    fn serial_beats_every_other_tier() {
        // A device named like another's serial must not shadow the serial hit.
        let table = vec![
            device_entry("CN100AAA01", "204C032FF954", "ap-one", None),
            device_entry("CN999ZZZ99", "AABBCCDDEEFF", "CN100AAA01", None),
        ];
        let found = lookup(CacheKind::Device, &table, "CN100AAA01").found().cloned();
        assert_eq!(found, Some(table[0].clone()));
    }

    #[test]
    fn punctuated_mac_matches_stored_normalized_form() {
        let res = lookup(CacheKind::Device, &devices(), "20:4c:03:2f:f9:54");
        assert_eq!(res.found().map(CacheEntry::canonical_key), Some("CN100AAA01".to_string()));
    }

    #[test]
    fn ip_query_ignores_cidr_suffix() {
        let res = lookup(CacheKind::Device, &devices(), "10.0.0.1/24");
        assert_eq!(res.found().map(CacheEntry::canonical_key), Some("CN200BBB01".to_string()));
    }

    #[test]
    fn exact_name_wins_over_prefix_matches() {
        // "lobby-ap" is both an exact name and a prefix of "lobby-ap-2".
        let res = lookup(CacheKind::Device, &devices(), "lobby-ap");
        assert_eq!(res.found().map(CacheEntry::canonical_key), Some("CN100AAA01".to_string()));
    }

    #[test]
    fn substring_prefers_shortest_name() {
        let res = lookup(CacheKind::Device, &devices(), "obby");
        assert_eq!(res.found().map(CacheEntry::canonical_key), Some("CN100AAA01".to_string()));
    }

    #[test]
    fn equal_length_substring_ties_are_ambiguous() {
        let table = vec![
            device_entry("CN1", "AAAAAAAAAAA1", "ap-east-1", None),
            device_entry("CN2", "AAAAAAAAAAA2", "ap-west-1", None),
        ];
        match lookup(CacheKind::Device, &table, "ap-") {
            Resolution::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn same_query_same_table_same_answer() {
        let table = devices();
        let first = lookup(CacheKind::Device, &table, "lobby");
        for _ in 0..10 {
            assert_eq!(lookup(CacheKind::Device, &table, "lobby"), first);
        }
    }

    #[test]
    fn site_resolves_by_substring() {
        let table = vec![
            site_entry(1, "Nashville-HQ", None),
            site_entry(2, "Memphis-Branch", None),
        ];
        let res = lookup(CacheKind::Site, &table, "Nashville");
        assert_eq!(res.found().map(CacheEntry::canonical_key), Some("1".to_string()));
    }

    #[test]
    fn site_city_match_outranks_name_substring() {
        let table = vec![
            site_entry(1, "Warehouse-Nashville", None),
            site_entry(2, "Annex", Some("Nashville")),
        ];
        let res = lookup(CacheKind::Site, &table, "Nashville");
        assert_eq!(res.found().map(CacheEntry::name), Some("Annex"));
    }

    #[test]
    fn site_resolves_by_id_and_city() {
        let table = vec![site_entry(42, "Annex", Some("Austin")), site_entry(7, "HQ", None)];
        assert_eq!(
            lookup(CacheKind::Site, &table, "42").found().map(CacheEntry::name),
            Some("Annex")
        );
        assert_eq!(
            lookup(CacheKind::Site, &table, "Austin").found().map(CacheEntry::name),
            Some("Annex")
        );
    }

    #[test]
    fn client_resolves_by_name_mac_or_ip() {
        let table = vec![
            client_entry("AABBCCDDEEFF", "laptop-1", Some("10.0.1.20")),
            client_entry("112233445566", "phone-1", Some("10.0.1.21")),
        ];
        assert_eq!(
            lookup(CacheKind::Client, &table, "phone-1").found().map(CacheEntry::canonical_key),
            Some("112233445566".to_string())
        );
        assert_eq!(
            lookup(CacheKind::Client, &table, "aa:bb:cc:dd:ee:ff")
                .found()
                .map(CacheEntry::canonical_key),
            Some("AABBCCDDEEFF".to_string())
        );
        assert_eq!(
            lookup(CacheKind::Client, &table, "10.0.1.21").found().map(CacheEntry::name),
            Some("phone-1")
        );
    }

    #[test]
    fn client_partial_mac_resolves_when_unique() {
        let table = vec![
            client_entry("AABBCCDDEEFF", "laptop-1", None),
            client_entry("112233445566", "phone-1", None),
        ];
        let res = lookup(CacheKind::Client, &table, "aa:bb:cc");
        assert_eq!(res.found().map(CacheEntry::canonical_key), Some("AABBCCDDEEFF".to_string()));

        // Shared prefix cannot pick a single client.
        let table = vec![
            client_entry("AABBCC000001", "laptop-1", None),
            client_entry("AABBCC000002", "laptop-2", None),
        ];
        match lookup(CacheKind::Client, &table, "aa:bb:cc") {
            Resolution::Ambiguous(candidates) => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn dash_underscore_variants_resolve() {
        let table = vec![group_entry("wlan_lab")];
        assert!(lookup(CacheKind::Group, &table, "wlan-lab").found().is_some());

        let table = vec![group_entry("wlanlab")];
        assert!(lookup(CacheKind::Group, &table, "wlan-lab").found().is_some());
    }

    #[test]
    fn miss_is_not_found() {
        assert!(lookup(CacheKind::Device, &devices(), "no-such-device").is_not_found());
        assert!(lookup(CacheKind::Device, &[], "anything").is_not_found());
    }
}
