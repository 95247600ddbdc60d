//! Journey lifecycle ledger.
//!
//! Vehicles live in exactly one of three buckets, chosen by the status of
//! their latest message:
//!
//! | status                                        | bucket        |
//! |-----------------------------------------------|---------------|
//! | INIT                                          | `initialized` |
//! | DELAY                                         | stays `active` if already there, else `initialized` |
//! | ARRIVAL, DEPARTURE, ONROUTE, ONSTOP, OFFROUTE | `active`      |
//! | END, CANCEL                                   | `finished`    |
//! | anything else                                 | `active`      |

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tracing::debug;

use crate::parser::MessageType;
use crate::vehicle::Vehicle;

pub const DEFAULT_MAX_FINISHED: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Initialized,
    Active,
    Finished,
}

impl Bucket {
    pub const ALL: [Bucket; 3] = [Bucket::Initialized, Bucket::Active, Bucket::Finished];

    pub fn as_str(self) -> &'static str {
        match self {
            Bucket::Initialized => "initialized",
            Bucket::Active => "active",
            Bucket::Finished => "finished",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "initialized" => Ok(Bucket::Initialized),
            "active" => Ok(Bucket::Active),
            "finished" => Ok(Bucket::Finished),
            other => Err(format!("unknown bucket '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerCounts {
    pub initialized: usize,
    pub active: usize,
    pub finished: usize,
    pub total: usize,
}

#[derive(Debug)]
pub struct VehicleLedger {
    initialized: HashMap<String, Vehicle>,
    active: HashMap<String, Vehicle>,
    finished: HashMap<String, Vehicle>,
    max_finished: usize,
}

impl Default for VehicleLedger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FINISHED)
    }
}

impl VehicleLedger {
    pub fn new(max_finished: usize) -> Self {
        Self {
            initialized: HashMap::new(),
            active: HashMap::new(),
            finished: HashMap::new(),
            max_finished,
        }
    }

    /// Files `vehicle` under the bucket its status calls for and returns it.
    pub fn upsert(&mut self, vehicle: Vehicle) -> Bucket {
        let target = match vehicle.status {
            MessageType::Init => Bucket::Initialized,
            MessageType::Delay if self.active.contains_key(&vehicle.id) => Bucket::Active,
            MessageType::Delay => Bucket::Initialized,
            MessageType::Arrival
            | MessageType::Departure
            | MessageType::OnRoute
            | MessageType::OnStop
            | MessageType::OffRoute => Bucket::Active,
            MessageType::End | MessageType::Cancel => Bucket::Finished,
            MessageType::Other(_) => Bucket::Active,
        };

        self.move_to(target, vehicle);
        target
    }

    fn move_to(&mut self, target: Bucket, vehicle: Vehicle) {
        for bucket in Bucket::ALL {
            if bucket != target {
                self.bucket_mut(bucket).remove(&vehicle.id);
            }
        }
        self.bucket_mut(target).insert(vehicle.id.clone(), vehicle);
    }

    fn bucket_ref(&self, bucket: Bucket) -> &HashMap<String, Vehicle> {
        match bucket {
            Bucket::Initialized => &self.initialized,
            Bucket::Active => &self.active,
            Bucket::Finished => &self.finished,
        }
    }

    fn bucket_mut(&mut self, bucket: Bucket) -> &mut HashMap<String, Vehicle> {
        match bucket {
            Bucket::Initialized => &mut self.initialized,
            Bucket::Active => &mut self.active,
            Bucket::Finished => &mut self.finished,
        }
    }

    /// Vehicles in `bucket`, optionally restricted to one line, ordered by
    /// vehicle id. A `limit` of zero means no limit.
    pub fn get_filtered(
        &self,
        line: Option<&str>,
        limit: usize,
        bucket: Bucket,
    ) -> Vec<(&str, &Vehicle)> {
        let mut items: Vec<(&str, &Vehicle)> = self
            .bucket_ref(bucket)
            .iter()
            .filter(|(_, v)| line.is_none() || v.line.as_deref() == line)
            .map(|(id, v)| (id.as_str(), v))
            .collect();
        items.sort_by(|a, b| a.0.cmp(b.0));
        if limit > 0 {
            items.truncate(limit);
        }
        items
    }

    pub fn get(&self, id: &str) -> Option<&Vehicle> {
        Bucket::ALL
            .iter()
            .find_map(|bucket| self.bucket_ref(*bucket).get(id))
    }

    pub fn bucket_of(&self, id: &str) -> Option<Bucket> {
        Bucket::ALL
            .into_iter()
            .find(|bucket| self.bucket_ref(*bucket).contains_key(id))
    }

    /// Every vehicle across all buckets, ordered by vehicle id.
    pub fn all(&self) -> Vec<(&str, &Vehicle)> {
        let mut items: Vec<(&str, &Vehicle)> = Bucket::ALL
            .iter()
            .flat_map(|bucket| self.bucket_ref(*bucket).iter())
            .map(|(id, v)| (id.as_str(), v))
            .collect();
        items.sort_by(|a, b| a.0.cmp(b.0));
        items
    }

    pub fn by_status(&self, status: &MessageType) -> Vec<(&str, &Vehicle)> {
        self.all()
            .into_iter()
            .filter(|(_, v)| &v.status == status)
            .collect()
    }

    pub fn by_line(&self, line: &str) -> Vec<(&str, &Vehicle)> {
        self.all()
            .into_iter()
            .filter(|(_, v)| v.line.as_deref() == Some(line))
            .collect()
    }

    pub fn by_operator(&self, operator: &str) -> Vec<(&str, &Vehicle)> {
        self.all()
            .into_iter()
            .filter(|(_, v)| v.operator.as_deref() == Some(operator))
            .collect()
    }

    pub fn counts(&self) -> LedgerCounts {
        LedgerCounts {
            initialized: self.initialized.len(),
            active: self.active.len(),
            finished: self.finished.len(),
            total: self.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.initialized.len() + self.active.len() + self.finished.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }


    /// Evicts the least recently updated finished vehicles until the bucket
    /// is back at its cap. Returns the number evicted.
    pub fn cleanup_finished(&mut self) -> usize {
        let excess = self.finished.len().saturating_sub(self.max_finished);
        if excess == 0 {
            return 0;
        }

        let mut by_age: Vec<(chrono::DateTime<chrono::Utc>, String)> = self
            .finished
            .iter()
            .map(|(id, v)| (v.last_update, id.clone()))
            .collect();
        by_age.sort();

        for (_, id) in by_age.into_iter().take(excess) {
            self.finished.remove(&id);
        }

        debug!(evicted = excess, remaining = self.finished.len(), "Finished vehicles evicted");
        excess
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vehicle::Occupancy;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn vehicle(id: &str, status: MessageType) -> Vehicle {
        Vehicle {
            id: id.to_string(),
            line: Some("22012".into()),
            journey: Some("7".into()),
            status,
            stop: "N/A".into(),
            occupancy: Occupancy::Unknown,
            lat: 52.15517,
            lon: 5.38721,
            timestamp: None,
            last_update: base_time(),
            stop_name: None,
            stop_municipality: None,
            line_name: None,
            delay_seconds: None,
            init_timestamp: None,
            finish_timestamp: None,
            finish_reason: None,
            operator: Some("arriva".into()),
        }
    }

    #[test]
    fn test_status_routes_to_bucket() {
        let mut ledger = VehicleLedger::default();
        assert_eq!(ledger.upsert(vehicle("1", MessageType::Init)), Bucket::Initialized);
        assert_eq!(ledger.upsert(vehicle("2", MessageType::OnRoute)), Bucket::Active);
        assert_eq!(ledger.upsert(vehicle("3", MessageType::OffRoute)), Bucket::Active);
        assert_eq!(ledger.upsert(vehicle("4", MessageType::Cancel)), Bucket::Finished);
        assert_eq!(ledger.counts(), LedgerCounts { initialized: 1, active: 2, finished: 1, total: 4 });
    }

    #[test]
    fn test_vehicle_moves_between_buckets() {
        let mut ledger = VehicleLedger::default();
        ledger.upsert(vehicle("101", MessageType::Init));
        ledger.upsert(vehicle("101", MessageType::Departure));
        assert_eq!(ledger.bucket_of("101"), Some(Bucket::Active));

        ledger.upsert(vehicle("101", MessageType::End));
        assert_eq!(ledger.bucket_of("101"), Some(Bucket::Finished));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_delay_for_unseen_vehicle_goes_to_initialized() {
        let mut ledger = VehicleLedger::default();
        assert_eq!(ledger.upsert(vehicle("9", MessageType::Delay)), Bucket::Initialized);
    }

    #[test]
    fn test_delay_for_active_vehicle_stays_active() {
        let mut ledger = VehicleLedger::default();
        ledger.upsert(vehicle("9", MessageType::OnRoute));
        let mut delayed = vehicle("9", MessageType::Delay);
        delayed.delay_seconds = Some(120);
        assert_eq!(ledger.upsert(delayed), Bucket::Active);
        assert_eq!(ledger.get("9").unwrap().delay_seconds, Some(120));
    }

    #[test]
    fn test_delay_for_finished_vehicle_goes_to_initialized() {
        let mut ledger = VehicleLedger::default();
        ledger.upsert(vehicle("9", MessageType::End));
        assert_eq!(ledger.upsert(vehicle("9", MessageType::Delay)), Bucket::Initialized);
        assert_eq!(ledger.counts().finished, 0);
    }

    #[test]
    fn test_unrecognized_status_goes_to_active() {
        let mut ledger = VehicleLedger::default();
        ledger.upsert(vehicle("5", MessageType::Init));
        let bucket = ledger.upsert(vehicle("5", MessageType::Other("TELEPORT".into())));
        assert_eq!(bucket, Bucket::Active);
        assert_eq!(ledger.counts().initialized, 0);
    }

    #[test]
    fn test_get_filtered_orders_filters_and_limits() {
        let mut ledger = VehicleLedger::default();
        for id in ["30", "10", "20"] {
            ledger.upsert(vehicle(id, MessageType::OnRoute));
        }
        let mut other_line = vehicle("15", MessageType::OnRoute);
        other_line.line = Some("400".into());
        ledger.upsert(other_line);

        let ids: Vec<&str> = ledger
            .get_filtered(None, 0, Bucket::Active)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["10", "15", "20", "30"]);

        let ids: Vec<&str> = ledger
            .get_filtered(Some("22012"), 2, Bucket::Active)
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, vec!["10", "20"]);

        assert!(ledger.get_filtered(None, 0, Bucket::Finished).is_empty());
    }

    #[test]
    fn test_secondary_queries() {
        let mut ledger = VehicleLedger::default();
        ledger.upsert(vehicle("1", MessageType::Init));
        ledger.upsert(vehicle("2", MessageType::OnRoute));
        let mut other = vehicle("3", MessageType::OnRoute);
        other.operator = Some("qbuzz".into());
        other.line = Some("300".into());
        ledger.upsert(other);

        assert_eq!(ledger.all().len(), 3);
        assert_eq!(ledger.by_status(&MessageType::OnRoute).len(), 2);
        assert_eq!(ledger.by_line("300").len(), 1);
        assert_eq!(ledger.by_operator("arriva").len(), 2);
    }

    #[test]
    fn test_cleanup_keeps_most_recent_finished() {
        let mut ledger = VehicleLedger::new(2);
        for (i, id) in ["a", "b", "c", "d"].iter().enumerate() {
            let mut v = vehicle(id, MessageType::End);
            v.last_update = base_time() + Duration::seconds(i as i64);
            ledger.upsert(v);
        }
        assert_eq!(ledger.counts().finished, 4);

        assert_eq!(ledger.cleanup_finished(), 2);
        assert_eq!(ledger.counts().finished, 2);
        assert_eq!(ledger.bucket_of("a"), None);
        assert_eq!(ledger.bucket_of("b"), None);
        assert_eq!(ledger.bucket_of("c"), Some(Bucket::Finished));
        assert_eq!(ledger.bucket_of("d"), Some(Bucket::Finished));
    }

    #[test]
    fn test_cleanup_under_cap_is_noop() {
        let mut ledger = VehicleLedger::new(10);
        ledger.upsert(vehicle("a", MessageType::End));
        assert_eq!(ledger.cleanup_finished(), 0);
        assert_eq!(ledger.counts().finished, 1);
    }

    #[test]
    fn test_bucket_from_str() {
        assert_eq!("Finished".parse::<Bucket>(), Ok(Bucket::Finished));
        assert!("parked".parse::<Bucket>().is_err());
    }

    fn status_strategy() -> impl Strategy<Value = MessageType> {
        prop_oneof![
            Just(MessageType::Arrival),
            Just(MessageType::Departure),
            Just(MessageType::OnRoute),
            Just(MessageType::OnStop),
            Just(MessageType::OffRoute),
            Just(MessageType::Init),
            Just(MessageType::Delay),
            Just(MessageType::End),
            Just(MessageType::Cancel),
            Just(MessageType::Other("X".into())),
        ]
    }

    proptest! {
        #[test]
        fn prop_each_vehicle_in_exactly_one_bucket(
            updates in prop::collection::vec((0u8..8, status_strategy()), 0..200)
        ) {
            let mut ledger = VehicleLedger::default();
            let mut seen = std::collections::HashSet::new();
            for (id, status) in updates {
                let id = id.to_string();
                seen.insert(id.clone());
                ledger.upsert(vehicle(&id, status));
            }
            for id in &seen {
                let hits = Bucket::ALL
                    .iter()
                    .filter(|b| ledger.bucket_ref(**b).contains_key(id))
                    .count();
                prop_assert_eq!(hits, 1);
            }
            prop_assert_eq!(ledger.len(), seen.len());
        }

        #[test]
        fn prop_cleanup_respects_cap(
            ages in prop::collection::vec(0i64..10_000, 0..60),
            cap in 0usize..20
        ) {
            let mut ledger = VehicleLedger::new(cap);
            for (i, age) in ages.iter().enumerate() {
                let mut v = vehicle(&i.to_string(), MessageType::End);
                v.last_update = base_time() + Duration::seconds(*age);
                ledger.upsert(v);
            }
            let mut expected: Vec<i64> = ages.clone();
            expected.sort_unstable_by(|a, b| b.cmp(a));
            expected.truncate(cap);

            ledger.cleanup_finished();
            prop_assert!(ledger.counts().finished <= cap);

            let kept = ledger.get_filtered(None, 0, Bucket::Finished);
            let oldest_kept = kept.iter().map(|(_, v)| v.last_update).min();
            if let (Some(oldest), Some(threshold)) = (oldest_kept, expected.last()) {
                prop_assert!(oldest >= base_time() + Duration::seconds(*threshold));
            }
        }
    }
}
