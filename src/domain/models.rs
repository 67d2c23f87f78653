use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;

/// A cluster of realms sharing one auction house.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedRealm {
    pub id: i64,
    pub member_realm_names: Vec<String>,
}

/// Connected realms addressable by the friendly name of any member realm.
///
/// Names are lower-cased both when the index is built and when it is queried.
/// When two connected realms claim the same name the one fetched last wins.
#[derive(Debug, Default, Clone)]
pub struct ConnectedRealmIndex {
    by_name: HashMap<String, Arc<ConnectedRealm>>,
    realms: Vec<Arc<ConnectedRealm>>,
}

impl ConnectedRealmIndex {
    pub fn get(&self, name: &str) -> Option<&ConnectedRealm> {
        self.by_name.get(&name.to_lowercase()).map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Connected realms in the order they were fetched.
    pub fn connected_realms(&self) -> impl Iterator<Item = &ConnectedRealm> {
        self.realms.iter().map(Arc::as_ref)
    }

    /// One row per member realm, keeping the upstream spelling of the name.
    pub fn rows(&self) -> Vec<RealmRow> {
        self.connected_realms()
            .flat_map(|realm| {
                realm.member_realm_names.iter().map(move |name| RealmRow {
                    name: name.clone(),
                    connected_realm_id: realm.id,
                })
            })
            .collect()
    }
}

impl FromIterator<ConnectedRealm> for ConnectedRealmIndex {
    fn from_iter<T: IntoIterator<Item = ConnectedRealm>>(iter: T) -> Self {
        let mut index = ConnectedRealmIndex::default();
        for realm in iter {
            let realm = Arc::new(realm);
            for name in &realm.member_realm_names {
                index.by_name.insert(name.to_lowercase(), Arc::clone(&realm));
            }
            index.realms.push(realm);
        }
        index
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealmRow {
    pub name: String,
    pub connected_realm_id: i64,
}

/// How long an auction has left. Upstream keeps this deliberately vague.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeLeft {
    /// Under 2 hours.
    Short,
    /// 2 to 12 hours.
    Medium,
    /// 12 to 24 hours.
    Long,
    /// Over 24 hours.
    VeryLong,
}

impl TimeLeft {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeLeft::Short => "SHORT",
            TimeLeft::Medium => "MEDIUM",
            TimeLeft::Long => "LONG",
            TimeLeft::VeryLong => "VERY_LONG",
        }
    }
}

impl fmt::Display for TimeLeft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single listing on a connected realm's auction house.
///
/// Item bonuses and modifiers are not captured. Commodity listings carry a
/// `unit_price`, everything else a `buyout` and/or `bid`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Auction {
    pub realm_id: i64,
    pub auction_id: i64,
    pub item_id: i64,
    pub quantity: i64,
    pub unit_price: i64,
    pub buyout: i64,
    pub bid: i64,
    pub time_left: TimeLeft,
}

impl Auction {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.quantity <= 0 {
            return Err(self.invalid(format!("quantity of {}", self.quantity)));
        }
        if self.buyout <= 0 && self.unit_price <= 0 {
            return Err(self.invalid("neither a buyout nor a unit price".to_string()));
        }
        Ok(())
    }

    fn invalid(&self, reason: String) -> PipelineError {
        PipelineError::InvalidAuctionRecord {
            auction_id: self.auction_id,
            item_id: self.item_id,
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub item_class: String,
    pub item_class_id: i64,
    pub item_subclass: String,
    pub item_subclass_id: i64,
}

/// Rows staged as CSV for the warehouse loader.
pub trait StagedRow {
    fn fields(&self) -> Vec<String>;
}

impl StagedRow for RealmRow {
    fn fields(&self) -> Vec<String> {
        vec![self.name.clone(), self.connected_realm_id.to_string()]
    }
}

impl StagedRow for Auction {
    fn fields(&self) -> Vec<String> {
        vec![
            self.auction_id.to_string(),
            self.item_id.to_string(),
            self.quantity.to_string(),
            self.unit_price.to_string(),
            self.buyout.to_string(),
            self.time_left.to_string(),
            self.realm_id.to_string(),
        ]
    }
}

/// Raw message as delivered by the bus.
#[derive(Debug, Clone, Default)]
pub struct TriggerEnvelope {
    pub data: Vec<u8>,
}

impl TriggerEnvelope {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Names the job a trigger is meant for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerMessage {
    pub target: String,
}

/// Secret values keyed by secret name. Slots are declared up front and
/// filled in place by the resolver.
#[derive(Clone, Default)]
pub struct Secrets {
    values: HashMap<String, String>,
}

impl Secrets {
    pub fn requesting<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            values: names
                .into_iter()
                .map(|name| (name.to_string(), String::new()))
                .collect(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    pub fn set(&mut self, name: &str, value: String) {
        self.values.insert(name.to_string(), value);
    }

    /// Returns the value only once it has been resolved.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("names", &self.values.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auction() -> Auction {
        Auction {
            realm_id: 61,
            auction_id: 1,
            item_id: 42,
            quantity: 3,
            unit_price: 100,
            buyout: 0,
            bid: 0,
            time_left: TimeLeft::Short,
        }
    }

    #[test]
    fn accepts_auction_with_only_unit_price() {
        assert!(auction().validate().is_ok());
    }

    #[test]
    fn accepts_auction_with_only_buyout() {
        let a = Auction { unit_price: 0, buyout: 5000, ..auction() };
        assert!(a.validate().is_ok());
    }

    #[test]
    fn rejects_zero_quantity() {
        let a = Auction { quantity: 0, ..auction() };

        match a.validate() {
            Err(PipelineError::InvalidAuctionRecord { auction_id, item_id, .. }) => {
                assert_eq!(auction_id, 1);
                assert_eq!(item_id, 42);
            }
            other => panic!("expected invalid auction record, got {:?}", other),
        }
    }

    #[test]
    fn rejects_auction_without_any_price() {
        let a = Auction { unit_price: 0, buyout: 0, bid: 900, ..auction() };
        assert!(matches!(a.validate(), Err(PipelineError::InvalidAuctionRecord { .. })));
    }

    #[test]
    fn time_left_rejects_unknown_text() {
        assert_eq!(
            serde_json::from_str::<TimeLeft>("\"VERY_LONG\"").unwrap(),
            TimeLeft::VeryLong
        );
        assert!(serde_json::from_str::<TimeLeft>("\"FOREVER\"").is_err());
        assert!(serde_json::from_str::<TimeLeft>("\"short\"").is_err());
    }

    #[test]
    fn index_normalizes_names_on_insert_and_lookup() {
        let index: ConnectedRealmIndex = vec![
            ConnectedRealm { id: 5, member_realm_names: vec!["Zul'jin".to_string()] },
            ConnectedRealm {
                id: 9,
                member_realm_names: vec!["Area 52".to_string(), "Kil'jaeden".to_string()],
            },
        ]
        .into_iter()
        .collect();

        let mut names: Vec<&str> = index.names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["area 52", "kil'jaeden", "zul'jin"]);

        assert_eq!(index.get("ZUL'JIN").map(|r| r.id), Some(5));
        assert_eq!(index.get("area 52").map(|r| r.id), Some(9));
        assert!(index.get("Stormrage").is_none());
    }

    #[test]
    fn index_rows_keep_upstream_spelling_in_fetch_order() {
        let index: ConnectedRealmIndex = vec![
            ConnectedRealm {
                id: 9,
                member_realm_names: vec!["Area 52".to_string(), "Kil'jaeden".to_string()],
            },
            ConnectedRealm { id: 5, member_realm_names: vec!["Zul'jin".to_string()] },
        ]
        .into_iter()
        .collect();

        let rows: Vec<Vec<String>> = index.rows().iter().map(StagedRow::fields).collect();
        assert_eq!(
            rows,
            vec![
                vec!["Area 52".to_string(), "9".to_string()],
                vec!["Kil'jaeden".to_string(), "9".to_string()],
                vec!["Zul'jin".to_string(), "5".to_string()],
            ]
        );
    }

    #[test]
    fn auction_fields_follow_staging_column_order() {
        assert_eq!(auction().fields(), vec!["1", "42", "3", "100", "0", "SHORT", "61"]);
    }

    #[test]
    fn secrets_debug_hides_values() {
        let mut secrets = Secrets::requesting(["client-id"]);
        assert_eq!(secrets.get("client-id"), None);

        secrets.set("client-id", "hunter2".to_string());
        assert_eq!(secrets.get("client-id"), Some("hunter2"));
        assert!(!format!("{:?}", secrets).contains("hunter2"));
    }
}
