//! End-to-end scenarios over a bootstrapped deployment.

use proptest::prelude::*;

use urbancycle_common::constants::{stablecoin, token::ONE};
use urbancycle_common::errors::UrbanError;
use urbancycle_common::events::EventType;
use urbancycle_common::math::RewardSchedule;
use urbancycle_common::types::{
    address_to_hex, Address, CallContext, CollectionEventInput, Grade, Material, WeightInput,
};
use urbancycle_deployer::{AddressBook, BootstrapSequencer, BootstrapStep, DeployConfig, PartialDeployment, Sequencer};
use urbancycle_recycle_manager::reports::DisplayStatus;
use urbancycle_recycle_manager::{
    ExecutionLimits, PaymentOutcome, PaymentPolicy, ReconcileAction, RecordingProcessor, SettlementStatus,
};
use urbancycle_urban_coin::UrbanCoin;
use urbancycle_waste_nft::{RecordMetadata, WasteNft};

const DEPLOYER: Address = [1u8; 32];
const SOURCE: Address = [20u8; 32];
const CITIZEN: Address = [0xAA; 32];
const RECYCLER: Address = [0xBB; 32];

fn collection(id: &str, account: Address, material: &str, weight: &str, grade: &str, kind: &str) -> CollectionEventInput {
    CollectionEventInput {
        submission_id: id.to_string(),
        account: address_to_hex(&account),
        material: material.to_string(),
        weight_kg: WeightInput::from(weight),
        grade: grade.to_string(),
        collector_kind: kind.to_string(),
        collected_at: Some(1_700_000_000),
        collection_point: Some("Distrito Centro".to_string()),
    }
}

fn e1() -> CollectionEventInput {
    collection("e1", CITIZEN, "plastic", "2.5", "A", "citizen")
}

fn with_limits(calls: u32) -> BootstrapSequencer {
    BootstrapSequencer::new(RewardSchedule::default(), PaymentPolicy::default(), ExecutionLimits::new(calls))
}

#[test]
fn scenario_happy_path() {
    let mut deployment = BootstrapSequencer::default().run(DEPLOYER).unwrap();
    let schedule = deployment.manager().config().schedule;

    let settlement = deployment.submit(SOURCE, &e1()).unwrap();

    let expected = schedule.reward_for(Material::Plastic, Grade::A, 2_500).unwrap();
    assert_eq!(expected, 25 * ONE);
    assert_eq!(deployment.token().balance_of(&CITIZEN), expected);

    let record_id = settlement.record_id.unwrap();
    assert_eq!(deployment.registry().total_records(), 1);
    assert_eq!(deployment.registry().owner_of(record_id).unwrap(), CITIZEN);
    let metadata = deployment.registry().metadata_of(record_id).unwrap();
    assert_eq!(metadata.material, Material::Plastic);
    assert_eq!(metadata.weight_grams, 2_500);

    let settled: Vec<_> = deployment
        .manager()
        .entries()
        .iter()
        .filter(|e| e.submission_id == "e1" && e.is_settled())
        .collect();
    assert_eq!(settled.len(), 1);
}

#[test]
fn scenario_resubmission_is_duplicate() {
    let mut deployment = BootstrapSequencer::default().run(DEPLOYER).unwrap();
    deployment.submit(SOURCE, &e1()).unwrap();
    let balance = deployment.token().balance_of(&CITIZEN);

    let result = deployment.submit(SOURCE, &e1());
    assert!(matches!(result, Err(UrbanError::DuplicateSubmission { .. })));
    assert_eq!(deployment.token().balance_of(&CITIZEN), balance);
    assert_eq!(deployment.registry().total_records(), 1);
}

#[test]
fn scenario_submit_before_authorize_minter() {
    // Token administered elsewhere: the bootstrap stops before authorize_minter
    let mut partial = PartialDeployment::new(DEPLOYER);
    partial.token = Some(UrbanCoin::deploy([2u8; 32], [40u8; 32]).unwrap());
    let err = BootstrapSequencer::default().resume(partial).unwrap_err();
    assert_eq!(err.step, BootstrapStep::AuthorizeMinter);

    // Drive the half-wired contracts directly
    let partial = *err.partial;
    let mut token = partial.token.unwrap();
    let mut registry = partial.registry.unwrap();
    let mut manager = partial.manager.unwrap();
    let mut processor = RecordingProcessor::new();
    let ctx = CallContext::new(SOURCE, 10);

    let result = manager.submit(&ctx, &mut token, &mut registry, &mut processor, &e1());
    assert!(matches!(result, Err(UrbanError::MintAuthorizationMissing { .. })));
    assert_eq!(token.balance_of(&CITIZEN), 0);
    assert_eq!(token.total_supply(), 0);
    assert_eq!(registry.total_records(), 0);
}

#[test]
fn scenario_second_bind_manager_fails() {
    let mut deployment = BootstrapSequencer::default().run(DEPLOYER).unwrap();
    let manager = deployment.manager().address();

    for caller in [DEPLOYER, manager, CITIZEN] {
        let result = deployment.bind_manager(caller, [77u8; 32]);
        assert!(matches!(result, Err(UrbanError::AlreadyBound { .. })));
    }
    assert_eq!(deployment.registry().bound_manager(), Some(manager));

    // Pipeline still works through the original binding
    assert!(deployment.submit(SOURCE, &e1()).is_ok());
}

#[test]
fn scenario_zero_weight_is_invalid() {
    let mut deployment = BootstrapSequencer::default().run(DEPLOYER).unwrap();

    let result = deployment.submit(SOURCE, &collection("e1", CITIZEN, "plastic", "0", "A", "citizen"));
    assert!(matches!(result, Err(UrbanError::InvalidEvent { .. })));
    assert_eq!(deployment.token().total_supply(), 0);
    assert_eq!(deployment.registry().total_records(), 0);
}

#[test]
fn scenario_reauthorizing_minter_is_idempotent() {
    let mut deployment = BootstrapSequencer::default().run(DEPLOYER).unwrap();
    let manager = deployment.manager().address();

    assert!(!deployment.authorize_minter(DEPLOYER, manager).unwrap());
    assert_eq!(deployment.token().events().count(EventType::MinterAuthorized), 1);
}

#[test]
fn scenario_informal_recycler_with_failing_processor() {
    let deployment = BootstrapSequencer::default().run(DEPLOYER).unwrap();
    let deployment = deployment.with_processor(Box::new(RecordingProcessor::offline()));
    let sequencer = Sequencer::new(deployment);

    let settlement = sequencer
        .submit(SOURCE, &collection("r1", RECYCLER, "plastic", "2.5", "B", "informal_recycler"))
        .unwrap();
    assert_eq!(settlement.status, SettlementStatus::Settled);
    assert!(matches!(settlement.payment, PaymentOutcome::Skipped { amount, .. } if amount == 50 * stablecoin::ONE));
    assert!(sequencer.balance_of(&RECYCLER) > 0);

    let summary = sequencer.citizen_summary(&RECYCLER);
    assert_eq!(summary.activity[0].status, DisplayStatus::Pending);

    let retry = sequencer.retry_payment(SOURCE, "r1");
    assert!(matches!(retry, Err(ref e) if e.is_retryable()));
}

#[test]
fn scenario_crash_window_reconciled() {
    let mut deployment = with_limits(1).run(DEPLOYER).unwrap();

    let settlement = deployment.submit(SOURCE, &e1()).unwrap();
    assert_eq!(settlement.status, SettlementStatus::NeedsReconciliation);
    assert_eq!(deployment.municipal_report().status_counts.needs_reconciliation, 1);

    let pending = deployment.manager().pending_reconciliation(deployment.registry());
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].submission_id, "e1");

    // Only the deployer operates reconciliation
    let stranger = deployment.reconcile([0x66; 32], "e1", ReconcileAction::ReverseMint);
    assert!(matches!(stranger, Err(UrbanError::Unauthorized { .. })));
    assert_eq!(deployment.token().balance_of(&CITIZEN), settlement.reward);

    let entry = deployment.reconcile(DEPLOYER, "e1", ReconcileAction::CompleteRecord).unwrap();
    assert_eq!(entry.status, SettlementStatus::Settled);
    assert_eq!(entry.sequence, settlement.sequence);
    assert_eq!(entry.reward, settlement.reward);
    assert_eq!(deployment.registry().owner_of(entry.record_id.unwrap()).unwrap(), CITIZEN);

    let again = deployment.reconcile(DEPLOYER, "e1", ReconcileAction::CompleteRecord).unwrap();
    assert_eq!(again, entry);
    assert_eq!(deployment.registry().total_records(), 1);
}

#[test]
fn scenario_municipal_report() {
    let mut deployment = BootstrapSequencer::default().run(DEPLOYER).unwrap();
    for input in [
        collection("e1", CITIZEN, "plastic", "2.5", "A", "citizen"),
        collection("e2", CITIZEN, "glass", "3.1", "A", "citizen"),
        collection("e3", CITIZEN, "paper", "1.8", "A", "citizen"),
        collection("e4", RECYCLER, "metal", "0.5", "A", "informal_recycler"),
    ] {
        deployment.submit(SOURCE, &input).unwrap();
    }

    // Dashboard figures: 25 + 31 + 18 URB to the citizen, 15 URB to the recycler
    assert_eq!(deployment.token().balance_of(&CITIZEN), 74 * ONE);
    assert_eq!(deployment.token().balance_of(&RECYCLER), 15 * ONE);

    let report = deployment.municipal_report();
    assert_eq!(report.total_weight_grams, 7_900);
    assert_eq!(report.total_rewarded, 89 * ONE);
    assert_eq!(report.total_paid, 10 * stablecoin::ONE);
    assert_eq!(report.status_counts.settled, 4);
    let shares: u64 = report.materials.iter().map(|m| m.share_bps).sum();
    assert!(shares <= 10_000 && shares >= 9_996);
}

#[test]
fn scenario_address_book_from_cli_config() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("urbancycle.toml");
    std::fs::write(&config_path, DeployConfig::new(DEPLOYER).to_toml().unwrap()).unwrap();

    let config = DeployConfig::from_file(&config_path).unwrap();
    let (sequencer, deployer) = BootstrapSequencer::from_config(&config).unwrap();
    let deployment = sequencer.run(deployer).unwrap();

    let out = dir.path().join("deployments.json");
    deployment.address_book().save(&out).unwrap();
    let book = AddressBook::load(&out).unwrap();
    assert_eq!(book, deployment.address_book());
    assert_eq!(book.recycle_manager, deployment.manager().address());
}

proptest! {
    /// Replaying any mix of ids settles each id exactly once
    #[test]
    fn replay_protection(ids in proptest::collection::vec(0u8..8, 1..50)) {
        let mut deployment = BootstrapSequencer::default().run(DEPLOYER).unwrap();
        for id in &ids {
            let _ = deployment.submit(SOURCE, &collection(&format!("s{id}"), CITIZEN, "glass", "1", "A", "citizen"));
        }
        let distinct: std::collections::BTreeSet<_> = ids.iter().collect();
        prop_assert_eq!(deployment.registry().total_records(), distinct.len() as u64);
        prop_assert_eq!(deployment.token().balance_of(&CITIZEN), distinct.len() as u64 * 10 * ONE);
    }

    /// Only the bound manager ever writes records
    #[test]
    fn single_writer(manager in any::<[u8; 32]>(), callers in proptest::collection::vec(any::<[u8; 32]>(), 1..8)) {
        prop_assume!(manager != [0u8; 32]);
        let mut registry = WasteNft::deploy(DEPLOYER, [41u8; 32]).unwrap();
        registry.bind_manager(&CallContext::new(DEPLOYER, 1), manager).unwrap();
        prop_assert!(registry.bind_manager(&CallContext::new(DEPLOYER, 2), DEPLOYER).is_err());

        for (i, caller) in callers.into_iter().chain([manager]).enumerate() {
            let metadata = RecordMetadata {
                material: Material::Paper,
                weight_grams: 1_000,
                grade: Grade::A,
                submission_id: format!("s{i}"),
                collected_at: 0,
                minted_at_block: 3,
            };
            let result = registry.record(&CallContext::new(caller, 3), CITIZEN, metadata);
            prop_assert_eq!(result.is_ok(), caller == manager);
        }
        prop_assert!(registry.records().count() >= 1);
    }
}
