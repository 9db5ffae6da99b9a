//! WasteNFT Provenance Registry
//!
//! Append-only registry of owned provenance records, one per verified
//! collection event. Exactly one writer may create records: the manager
//! latched by the single successful `bind_manager` call.
//!
//! ## Authority
//!
//! - `bind_manager`: deployer, once
//! - `record`: bound manager only
//! - `transfer`: current record owner only (independent of record creation)

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use urbancycle_common::{
    check,
    constants::provenance,
    errors::{UrbanError, UrbanResult},
    events::{EventLog, UrbanEvent},
    types::{address_short, require_nonzero, Address, CallContext, Grade, Material, RecordId},
};

// ============ Record Types ============

/// Immutable description of the collection event a record proves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RecordMetadata {
    pub material: Material,
    /// Weight in grams
    pub weight_grams: u64,
    pub grade: Grade,
    /// Originating submission, at most one record each
    pub submission_id: String,
    /// Unix seconds, as reported by the verification source
    pub collected_at: u64,
    /// Block the record was created in
    pub minted_at_block: u64,
}

/// A provenance record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ProvenanceRecord {
    pub id: RecordId,
    pub owner: Address,
    pub metadata: RecordMetadata,
}

// ============ Registry State ============

/// WasteNFT registry state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct WasteNftState {
    /// Only address allowed to bind
    pub deployer: Address,
    /// The single authorized writer, once latched
    pub bound_manager: Option<Address>,
    /// Next id to allocate
    pub next_id: RecordId,
    /// All records by id
    pub records: BTreeMap<RecordId, ProvenanceRecord>,
    /// Submission id -> record id
    pub by_submission: BTreeMap<String, RecordId>,
}

impl WasteNftState {
    pub fn new(deployer: Address) -> Self {
        Self {
            deployer,
            bound_manager: None,
            next_id: provenance::FIRST_RECORD_ID,
            records: BTreeMap::new(),
            by_submission: BTreeMap::new(),
        }
    }
}

/// A deployed WasteNFT registry
#[derive(Debug, Clone)]
pub struct WasteNft {
    address: Address,
    state: WasteNftState,
    events: EventLog,
}

impl WasteNft {
    /// Deploy an unbound registry at `address`
    pub fn deploy(deployer: Address, address: Address) -> UrbanResult<Self> {
        require_nonzero(&deployer, "deployer cannot be zero address")?;
        require_nonzero(&address, "registry address cannot be zero address")?;
        Ok(Self {
            address,
            state: WasteNftState::new(deployer),
            events: EventLog::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn name() -> &'static str {
        provenance::NAME
    }

    pub fn symbol() -> &'static str {
        provenance::SYMBOL
    }

    // ============ Binding ============

    /// Latch `manager` as the only writer.
    ///
    /// Succeeds exactly once. Every later call fails with `AlreadyBound`
    /// whoever the caller is, and the binding is left untouched.
    pub fn bind_manager(&mut self, ctx: &CallContext, manager: Address) -> UrbanResult<()> {
        // 1. Latch check comes first so a bound registry never reveals more
        if let Some(bound) = self.state.bound_manager {
            warn!(manager = %address_short(&manager), "bind_manager called on a bound registry");
            return Err(UrbanError::AlreadyBound { manager: bound });
        }

        // 2. Only the deployer may bind
        check!(
            ctx.caller == self.state.deployer,
            UrbanError::Unauthorized {
                expected: self.state.deployer,
                actual: ctx.caller,
            }
        );
        require_nonzero(&manager, "manager cannot be zero address")?;

        // 3. Latch
        self.state.bound_manager = Some(manager);
        self.events.emit(UrbanEvent::ManagerBound {
            manager,
            block_height: ctx.block_height,
        });
        Ok(())
    }

    // ============ Records ============

    /// Create a record owned by `owner`. Bound manager only.
    pub fn record(&mut self, ctx: &CallContext, owner: Address, metadata: RecordMetadata) -> UrbanResult<RecordId> {
        // 1. Caller must be the bound manager (an unbound registry accepts nobody)
        let manager = self.state.bound_manager.unwrap_or_default();
        check!(
            self.state.bound_manager == Some(ctx.caller),
            UrbanError::Unauthorized {
                expected: manager,
                actual: ctx.caller,
            }
        );

        // 2. Owner and uniqueness
        require_nonzero(&owner, "record owner cannot be zero address")?;
        check!(
            !self.state.by_submission.contains_key(&metadata.submission_id),
            UrbanError::DuplicateSubmission {
                submission_id: metadata.submission_id.clone(),
            }
        );

        // 3. Allocate
        let id = self.state.next_id;
        let next_id = id.checked_add(1).ok_or(UrbanError::Overflow)?;

        // 4. Store
        self.events.emit(UrbanEvent::RecordCreated {
            record_id: id,
            owner,
            material: metadata.material,
            weight_grams: metadata.weight_grams,
            block_height: ctx.block_height,
        });
        self.state.by_submission.insert(metadata.submission_id.clone(), id);
        self.state.records.insert(id, ProvenanceRecord { id, owner, metadata });
        self.state.next_id = next_id;

        debug!(record_id = id, "provenance record created");
        Ok(id)
    }

    /// Move record `id` to `new_owner`. Current owner only.
    pub fn transfer(&mut self, ctx: &CallContext, id: RecordId, new_owner: Address) -> UrbanResult<()> {
        let record = self
            .state
            .records
            .get_mut(&id)
            .ok_or(UrbanError::NotFound { what: "record" })?;

        check!(
            record.owner == ctx.caller,
            UrbanError::Unauthorized {
                expected: record.owner,
                actual: ctx.caller,
            }
        );
        require_nonzero(&new_owner, "new owner cannot be zero address")?;

        let from = record.owner;
        record.owner = new_owner;
        self.events.emit(UrbanEvent::RecordTransferred {
            record_id: id,
            from,
            to: new_owner,
            block_height: ctx.block_height,
        });
        Ok(())
    }

    // ============ Reads ============

    pub fn get_record(&self, id: RecordId) -> UrbanResult<&ProvenanceRecord> {
        self.state.records.get(&id).ok_or(UrbanError::NotFound { what: "record" })
    }

    pub fn owner_of(&self, id: RecordId) -> UrbanResult<Address> {
        self.get_record(id).map(|r| r.owner)
    }

    pub fn metadata_of(&self, id: RecordId) -> UrbanResult<&RecordMetadata> {
        self.get_record(id).map(|r| &r.metadata)
    }

    /// Ids currently owned by `owner`, ascending
    pub fn records_of(&self, owner: &Address) -> Vec<RecordId> {
        self.state
            .records
            .values()
            .filter(|r| &r.owner == owner)
            .map(|r| r.id)
            .collect()
    }

    /// Record created for a submission, if any
    pub fn record_for_submission(&self, submission_id: &str) -> Option<RecordId> {
        self.state.by_submission.get(submission_id).copied()
    }

    pub fn total_records(&self) -> u64 {
        self.state.records.len() as u64
    }

    pub fn bound_manager(&self) -> Option<Address> {
        self.state.bound_manager
    }

    /// Iterate all records in id order
    pub fn records(&self) -> impl Iterator<Item = &ProvenanceRecord> {
        self.state.records.values()
    }

    pub fn state(&self) -> &WasteNftState {
        &self.state
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }
}

// ============ Tests ============

#[cfg(test)]
mod tests {
    use super::*;
    use urbancycle_common::events::EventType;

    fn deployer() -> Address {
        [1u8; 32]
    }

    fn manager() -> Address {
        [2u8; 32]
    }

    fn citizen() -> Address {
        [3u8; 32]
    }

    fn ctx(caller: Address) -> CallContext {
        CallContext::new(caller, 50)
    }

    fn metadata(submission_id: &str) -> RecordMetadata {
        RecordMetadata {
            material: Material::Plastic,
            weight_grams: 2_500,
            grade: Grade::A,
            submission_id: submission_id.to_string(),
            collected_at: 1_700_000_000,
            minted_at_block: 50,
        }
    }

    fn bound_registry() -> WasteNft {
        let mut nft = WasteNft::deploy(deployer(), [8u8; 32]).unwrap();
        nft.bind_manager(&ctx(deployer()), manager()).unwrap();
        nft
    }

    #[test]
    fn test_bind_manager_once() {
        let mut nft = bound_registry();
        assert_eq!(nft.bound_manager(), Some(manager()));

        // A second call fails whoever makes it
        for caller in [deployer(), manager(), citizen()] {
            let result = nft.bind_manager(&ctx(caller), [7u8; 32]);
            assert!(matches!(result, Err(UrbanError::AlreadyBound { manager: m }) if m == manager()));
        }
        assert_eq!(nft.bound_manager(), Some(manager()));
        assert_eq!(nft.events().count(EventType::ManagerBound), 1);
    }

    #[test]
    fn test_bind_manager_requires_deployer() {
        let mut nft = WasteNft::deploy(deployer(), [8u8; 32]).unwrap();
        let result = nft.bind_manager(&ctx(citizen()), manager());
        assert!(matches!(result, Err(UrbanError::Unauthorized { .. })));
        assert_eq!(nft.bound_manager(), None);
    }

    #[test]
    fn test_bind_zero_manager_rejected() {
        let mut nft = WasteNft::deploy(deployer(), [8u8; 32]).unwrap();
        let result = nft.bind_manager(&ctx(deployer()), [0u8; 32]);
        assert!(matches!(result, Err(UrbanError::InvalidAddress { .. })));
        assert_eq!(nft.bound_manager(), None);
    }

    #[test]
    fn test_record_by_bound_manager() {
        let mut nft = bound_registry();

        let id = nft.record(&ctx(manager()), citizen(), metadata("e1")).unwrap();
        assert_eq!(id, 1);
        assert_eq!(nft.owner_of(id).unwrap(), citizen());
        assert_eq!(nft.metadata_of(id).unwrap().weight_grams, 2_500);
        assert_eq!(nft.record_for_submission("e1"), Some(1));

        let second = nft.record(&ctx(manager()), citizen(), metadata("e2")).unwrap();
        assert_eq!(second, 2);
        assert_eq!(nft.records_of(&citizen()), vec![1, 2]);
        assert_eq!(nft.total_records(), 2);
    }

    #[test]
    fn test_record_unbound_rejects_everyone() {
        let mut nft = WasteNft::deploy(deployer(), [8u8; 32]).unwrap();
        for caller in [deployer(), manager()] {
            let result = nft.record(&ctx(caller), citizen(), metadata("e1"));
            assert!(matches!(result, Err(UrbanError::Unauthorized { .. })));
        }
        assert_eq!(nft.total_records(), 0);
    }

    #[test]
    fn test_record_wrong_caller() {
        let mut nft = bound_registry();
        let result = nft.record(&ctx(deployer()), citizen(), metadata("e1"));
        assert!(matches!(result, Err(UrbanError::Unauthorized { .. })));
    }

    #[test]
    fn test_record_duplicate_submission() {
        let mut nft = bound_registry();
        nft.record(&ctx(manager()), citizen(), metadata("e1")).unwrap();

        let result = nft.record(&ctx(manager()), citizen(), metadata("e1"));
        assert!(matches!(result, Err(UrbanError::DuplicateSubmission { .. })));
        assert_eq!(nft.total_records(), 1);
    }

    #[test]
    fn test_unknown_record() {
        let nft = bound_registry();
        assert!(matches!(nft.owner_of(42), Err(UrbanError::NotFound { what: "record" })));
        assert!(matches!(nft.metadata_of(42), Err(UrbanError::NotFound { .. })));
    }

    #[test]
    fn test_transfer_by_owner_only() {
        let mut nft = bound_registry();
        let id = nft.record(&ctx(manager()), citizen(), metadata("e1")).unwrap();
        let bob = [5u8; 32];

        // The writer has no transfer authority
        let result = nft.transfer(&ctx(manager()), id, bob);
        assert!(matches!(result, Err(UrbanError::Unauthorized { .. })));

        nft.transfer(&ctx(citizen()), id, bob).unwrap();
        assert_eq!(nft.owner_of(id).unwrap(), bob);
        assert!(nft.records_of(&citizen()).is_empty());
        // Metadata is untouched by ownership changes
        assert_eq!(nft.metadata_of(id).unwrap(), &metadata("e1"));
    }

    #[test]
    fn test_transfer_unknown_record() {
        let mut nft = bound_registry();
        let result = nft.transfer(&ctx(citizen()), 9, [5u8; 32]);
        assert!(matches!(result, Err(UrbanError::NotFound { .. })));
    }

    #[test]
    fn test_state_borsh_round_trip() {
        let mut nft = bound_registry();
        nft.record(&ctx(manager()), citizen(), metadata("e1")).unwrap();

        let bytes = borsh::to_vec(nft.state()).unwrap();
        let restored: WasteNftState = borsh::from_slice(&bytes).unwrap();
        assert_eq!(&restored, nft.state());
    }
}
