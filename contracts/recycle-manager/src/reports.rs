//! Read-only reporting views
//!
//! Derived from the audit trail and the two registries. Nothing here
//! computes rewards or checks authority; the views only aggregate what has
//! already been settled.

use std::collections::BTreeMap;

use serde::Serialize;

use urbancycle_common::{
    constants::precision,
    types::{Address, Amount, Material, RecordId},
};
use urbancycle_urban_coin::UrbanCoin;
use urbancycle_waste_nft::WasteNft;

use crate::ledger::{LedgerEntry, SettlementStatus};
use crate::RecycleManager;

/// Label used for events without a collection point
pub const UNASSIGNED_POINT: &str = "unassigned";

/// Status shown to dashboard users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    /// Settled, payment awaiting retry
    Pending,
    Settled,
    NeedsReconciliation,
    Rejected,
}

impl DisplayStatus {
    pub fn of(entry: &LedgerEntry) -> Self {
        match entry.status {
            SettlementStatus::Settled if entry.payment.is_pending() => DisplayStatus::Pending,
            SettlementStatus::Settled => DisplayStatus::Settled,
            SettlementStatus::NeedsReconciliation => DisplayStatus::NeedsReconciliation,
            SettlementStatus::Rejected { .. } | SettlementStatus::Reversed => DisplayStatus::Rejected,
        }
    }
}

/// One line of a citizen's activity feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityItem {
    pub sequence: u64,
    pub submission_id: String,
    pub material: Option<Material>,
    pub weight_grams: u64,
    pub reward: Amount,
    pub record_id: Option<RecordId>,
    pub status: DisplayStatus,
    pub block_height: u64,
}

impl From<&LedgerEntry> for ActivityItem {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            sequence: entry.sequence,
            submission_id: entry.submission_id.clone(),
            material: entry.event.as_ref().map(|e| e.material),
            weight_grams: entry.weight_grams(),
            reward: entry.reward,
            record_id: entry.record_id,
            status: DisplayStatus::of(entry),
            block_height: entry.block_height,
        }
    }
}

/// Citizen dashboard view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitizenSummary {
    pub account: Address,
    /// Current URB balance
    pub balance: Amount,
    /// Weight of settled deliveries
    pub recycled_grams: u64,
    /// Provenance records currently owned
    pub records_owned: u64,
    /// Estimated CO2 avoided, in grams
    pub co2_offset_grams: u64,
    /// Newest first
    pub activity: Vec<ActivityItem>,
}

/// Per-material totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialShare {
    pub material: Material,
    pub weight_grams: u64,
    /// Share of all settled weight, in basis points
    pub share_bps: u64,
    pub deliveries: u64,
}

/// Per-collection-point activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointActivity {
    pub collection_point: String,
    pub deliveries: u64,
    pub weight_grams: u64,
    pub rewarded: Amount,
}

/// Entry counts by display status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub settled: u64,
    pub needs_reconciliation: u64,
    pub rejected: u64,
}

impl StatusCounts {
    fn add(&mut self, status: DisplayStatus) {
        match status {
            DisplayStatus::Pending => self.pending += 1,
            DisplayStatus::Settled => self.settled += 1,
            DisplayStatus::NeedsReconciliation => self.needs_reconciliation += 1,
            DisplayStatus::Rejected => self.rejected += 1,
        }
    }
}

/// Municipal dashboard view
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MunicipalReport {
    pub total_weight_grams: u64,
    pub total_rewarded: Amount,
    /// Stablecoin distributed to informal recyclers
    pub total_paid: Amount,
    pub co2_offset_grams: u64,
    pub materials: Vec<MaterialShare>,
    pub collection_points: Vec<PointActivity>,
    pub status_counts: StatusCounts,
}

/// Estimated CO2 avoided by recycling `weight_grams` of `material`
pub fn co2_offset_grams(material: Material, weight_grams: u64) -> u64 {
    let grams = weight_grams as u128 * material.co2_grams_per_kg() as u128 / precision::GRAMS_PER_KG as u128;
    u64::try_from(grams).unwrap_or(u64::MAX)
}

/// Summary for one account
pub fn citizen_summary(
    manager: &RecycleManager,
    token: &UrbanCoin,
    registry: &WasteNft,
    account: &Address,
) -> CitizenSummary {
    let mut recycled_grams = 0u64;
    let mut co2 = 0u64;
    let mut activity = Vec::new();

    for entry in manager.entries().iter().rev().filter(|e| &e.account == account) {
        if entry.is_settled() {
            if let Some(event) = &entry.event {
                recycled_grams = recycled_grams.saturating_add(event.weight_grams);
                co2 = co2.saturating_add(co2_offset_grams(event.material, event.weight_grams));
            }
        }
        activity.push(ActivityItem::from(entry));
    }

    CitizenSummary {
        account: *account,
        balance: token.balance_of(account),
        recycled_grams,
        records_owned: registry.records_of(account).len() as u64,
        co2_offset_grams: co2,
        activity,
    }
}

/// City-wide aggregates over settled runs
pub fn municipal_report(manager: &RecycleManager) -> MunicipalReport {
    let mut by_material: BTreeMap<Material, (u64, u64)> = BTreeMap::new();
    let mut by_point: BTreeMap<String, PointActivity> = BTreeMap::new();
    let mut status_counts = StatusCounts::default();
    let mut total_weight = 0u64;
    let mut total_rewarded = 0u64;
    let mut total_paid = 0u64;
    let mut co2 = 0u64;

    for entry in manager.entries() {
        status_counts.add(DisplayStatus::of(entry));
        total_paid = total_paid.saturating_add(entry.payment.paid_amount());

        let event = match (&entry.status, &entry.event) {
            (SettlementStatus::Settled, Some(event)) => event,
            _ => continue,
        };
        total_weight = total_weight.saturating_add(event.weight_grams);
        total_rewarded = total_rewarded.saturating_add(entry.reward);
        co2 = co2.saturating_add(co2_offset_grams(event.material, event.weight_grams));

        let material = by_material.entry(event.material).or_default();
        material.0 = material.0.saturating_add(event.weight_grams);
        material.1 += 1;

        let label = event
            .collection_point
            .clone()
            .unwrap_or_else(|| UNASSIGNED_POINT.to_string());
        let point = by_point.entry(label.clone()).or_insert_with(|| PointActivity {
            collection_point: label,
            deliveries: 0,
            weight_grams: 0,
            rewarded: 0,
        });
        point.deliveries += 1;
        point.weight_grams = point.weight_grams.saturating_add(event.weight_grams);
        point.rewarded = point.rewarded.saturating_add(entry.reward);
    }

    let materials = Material::ALL
        .into_iter()
        .map(|material| {
            let (weight_grams, deliveries) = by_material.get(&material).copied().unwrap_or((0, 0));
            MaterialShare {
                material,
                weight_grams,
                share_bps: share_bps(weight_grams, total_weight),
                deliveries,
            }
        })
        .collect();

    MunicipalReport {
        total_weight_grams: total_weight,
        total_rewarded,
        total_paid,
        co2_offset_grams: co2,
        materials,
        collection_points: by_point.into_values().collect(),
        status_counts,
    }
}

fn share_bps(part: u64, total: u64) -> u64 {
    if total == 0 {
        return 0;
    }
    (part as u128 * precision::BPS_DENOMINATOR as u128 / total as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExecutionLimits, ManagerConfig, RecordingProcessor};
    use urbancycle_common::constants::token::ONE;
    use urbancycle_common::types::{address_to_hex, CallContext, CollectionEventInput, WeightInput};

    const DEPLOYER: Address = [1u8; 32];
    const MANAGER: Address = [12u8; 32];
    const CITIZEN: Address = [0xAA; 32];
    const RECYCLER: Address = [0xBB; 32];

    fn setup(limits: ExecutionLimits) -> (UrbanCoin, WasteNft, RecycleManager) {
        let mut token = UrbanCoin::deploy(DEPLOYER, [10u8; 32]).unwrap();
        let mut registry = WasteNft::deploy(DEPLOYER, [11u8; 32]).unwrap();
        let mut config = ManagerConfig::new(DEPLOYER, token.address(), registry.address());
        config.limits = limits;
        let manager = RecycleManager::deploy(MANAGER, config).unwrap();
        registry.bind_manager(&CallContext::new(DEPLOYER, 0), MANAGER).unwrap();
        token.authorize_minter(&CallContext::new(DEPLOYER, 0), MANAGER).unwrap();
        (token, registry, manager)
    }

    fn input(id: &str, account: Address, material: &str, weight: &str, kind: &str, point: &str) -> CollectionEventInput {
        CollectionEventInput {
            submission_id: id.to_string(),
            account: address_to_hex(&account),
            material: material.to_string(),
            weight_kg: WeightInput::from(weight),
            grade: "A".to_string(),
            collector_kind: kind.to_string(),
            collected_at: None,
            collection_point: Some(point.to_string()),
        }
    }

    #[test]
    fn test_citizen_summary() {
        let (mut token, mut registry, mut manager) = setup(ExecutionLimits::default());
        let mut processor = RecordingProcessor::new();
        let ctx = CallContext::new([20u8; 32], 5);

        for event in [
            input("e1", CITIZEN, "plastic", "2.5", "citizen", "Centro"),
            input("e2", CITIZEN, "glass", "3.1", "citizen", "Centro"),
            input("e2", CITIZEN, "glass", "3.1", "citizen", "Centro"),
        ] {
            let _ = manager.submit(&ctx, &mut token, &mut registry, &mut processor, &event);
        }

        let summary = citizen_summary(&manager, &token, &registry, &CITIZEN);
        assert_eq!(summary.balance, 56 * ONE);
        assert_eq!(summary.recycled_grams, 5_600);
        assert_eq!(summary.records_owned, 2);
        // 2.5 kg * 1500 + 3.1 kg * 300
        assert_eq!(summary.co2_offset_grams, 3_750 + 930);
        assert_eq!(summary.activity.len(), 3);
        assert_eq!(summary.activity[0].status, DisplayStatus::Rejected);
        assert_eq!(summary.activity[2].submission_id, "e1");
    }

    #[test]
    fn test_municipal_report() {
        let (mut token, mut registry, mut manager) = setup(ExecutionLimits::default());
        let mut processor = RecordingProcessor::offline();
        let ctx = CallContext::new([20u8; 32], 5);

        for event in [
            input("e1", CITIZEN, "plastic", "3", "citizen", "Centro"),
            input("e2", RECYCLER, "metal", "1", "informal_recycler", "Norte"),
            input("e3", CITIZEN, "paper", "0", "citizen", "Norte"),
        ] {
            let _ = manager.submit(&ctx, &mut token, &mut registry, &mut processor, &event);
        }

        let report = municipal_report(&manager);
        assert_eq!(report.total_weight_grams, 4_000);
        assert_eq!(report.total_paid, 0);
        assert_eq!(report.materials.len(), 4);
        assert_eq!(report.materials[0].material, Material::Plastic);
        assert_eq!(report.materials[0].share_bps, 7_500);
        assert_eq!(report.materials[3].share_bps, 2_500);
        assert_eq!(report.collection_points.len(), 2);
        assert_eq!(
            report.status_counts,
            StatusCounts { pending: 1, settled: 1, needs_reconciliation: 0, rejected: 1 }
        );
    }

    #[test]
    fn test_reconciliation_status_in_report() {
        let (mut token, mut registry, mut manager) = setup(ExecutionLimits::new(1));
        let mut processor = RecordingProcessor::new();
        let ctx = CallContext::new([20u8; 32], 5);
        let event = input("e1", CITIZEN, "plastic", "1", "citizen", "Centro");
        manager.submit(&ctx, &mut token, &mut registry, &mut processor, &event).unwrap();

        let report = municipal_report(&manager);
        assert_eq!(report.status_counts.needs_reconciliation, 1);
        // Unrecorded runs are not counted as recycled weight
        assert_eq!(report.total_weight_grams, 0);
    }

    #[test]
    fn test_empty_report() {
        let (_, _, manager) = setup(ExecutionLimits::default());
        let report = municipal_report(&manager);
        assert_eq!(report.total_weight_grams, 0);
        assert!(report.materials.iter().all(|m| m.share_bps == 0));
        assert!(report.collection_points.is_empty());
    }
}
