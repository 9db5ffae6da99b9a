//! A wired deployment and the host sequencer that serializes access to it.
//!
//! `Deployment` owns the three contracts and the payment rail. `Sequencer`
//! puts one behind a read-write lock: every mutation takes the write lock, so
//! calls are applied one at a time in a single total order, and every read
//! returns an owned snapshot of some committed state.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use urbancycle_common::{
    errors::UrbanResult,
    types::{Address, Amount, CallContext, CollectionEventInput, RecordId},
};
use urbancycle_recycle_manager::{
    reports::{self, CitizenSummary, MunicipalReport},
    LedgerEntry, PaymentOutcome, PaymentProcessor, ReconcileAction, RecordingProcessor, RecycleManager,
    Settlement,
};
use urbancycle_urban_coin::UrbanCoin;
use urbancycle_waste_nft::{RecordMetadata, WasteNft};

use crate::address_book::AddressBook;
use crate::bootstrap::PartialDeployment;

/// Payment rail shared with the sequencer
pub type SharedProcessor = Box<dyn PaymentProcessor + Send + Sync>;

/// The three contracts of one bootstrap, fully wired.
pub struct Deployment {
    deployer: Address,
    token: UrbanCoin,
    registry: WasteNft,
    manager: RecycleManager,
    processor: SharedProcessor,
    block_height: u64,
}

impl fmt::Debug for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployment")
            .field("addresses", &self.address_book())
            .field("block_height", &self.block_height)
            .finish_non_exhaustive()
    }
}

impl Deployment {
    pub(crate) fn new(
        deployer: Address,
        token: UrbanCoin,
        registry: WasteNft,
        manager: RecycleManager,
        block_height: u64,
    ) -> Self {
        Self {
            deployer,
            token,
            registry,
            manager,
            processor: Box::new(RecordingProcessor::new()),
            block_height,
        }
    }

    /// Replace the payment rail
    pub fn with_processor(mut self, processor: SharedProcessor) -> Self {
        self.processor = processor;
        self
    }

    pub(crate) fn into_partial(self) -> PartialDeployment {
        PartialDeployment {
            deployer: self.deployer,
            token: Some(self.token),
            registry: Some(self.registry),
            manager: Some(self.manager),
            block_height: self.block_height,
        }
    }

    pub fn address_book(&self) -> AddressBook {
        AddressBook {
            urban_coin: self.token.address(),
            waste_nft: self.registry.address(),
            recycle_manager: self.manager.address(),
        }
    }

    /// Postcondition of a bootstrap: manager is a minter, registry is bound
    /// to it, and the manager points at these two registries.
    pub fn verify_wiring(&self) -> UrbanResult<()> {
        self.manager.check_wiring(&self.token, &self.registry)
    }

    // ============ Mutations ============

    /// Submit a collection event on behalf of `caller`
    pub fn submit(&mut self, caller: Address, input: &CollectionEventInput) -> UrbanResult<Settlement> {
        let ctx = self.next_context(caller);
        self.manager
            .submit(&ctx, &mut self.token, &mut self.registry, self.processor.as_mut(), input)
    }

    pub fn reconcile(&mut self, caller: Address, submission_id: &str, action: ReconcileAction) -> UrbanResult<LedgerEntry> {
        let ctx = self.next_context(caller);
        self.manager
            .reconcile(&ctx, &mut self.token, &mut self.registry, submission_id, action)
    }

    pub fn retry_payment(&mut self, caller: Address, submission_id: &str) -> UrbanResult<PaymentOutcome> {
        let ctx = self.next_context(caller);
        self.manager.retry_payment(&ctx, self.processor.as_mut(), submission_id)
    }

    /// Holder transfer of URB
    pub fn transfer_tokens(&mut self, caller: Address, to: Address, amount: Amount) -> UrbanResult<()> {
        let ctx = self.next_context(caller);
        self.token.transfer(&ctx, to, amount)
    }

    /// Owner transfer of a provenance record
    pub fn transfer_record(&mut self, caller: Address, id: RecordId, to: Address) -> UrbanResult<()> {
        let ctx = self.next_context(caller);
        self.registry.transfer(&ctx, id, to)
    }

    /// Try to bind the registry again (always fails once bootstrapped)
    pub fn bind_manager(&mut self, caller: Address, manager: Address) -> UrbanResult<()> {
        let ctx = self.next_context(caller);
        self.registry.bind_manager(&ctx, manager)
    }

    pub fn authorize_minter(&mut self, caller: Address, target: Address) -> UrbanResult<bool> {
        let ctx = self.next_context(caller);
        self.token.authorize_minter(&ctx, target)
    }

    fn next_context(&mut self, caller: Address) -> CallContext {
        self.block_height += 1;
        CallContext::new(caller, self.block_height)
    }

    // ============ Reads ============

    pub fn deployer(&self) -> Address {
        self.deployer
    }

    pub fn token(&self) -> &UrbanCoin {
        &self.token
    }

    pub fn registry(&self) -> &WasteNft {
        &self.registry
    }

    pub fn manager(&self) -> &RecycleManager {
        &self.manager
    }

    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    pub fn citizen_summary(&self, account: &Address) -> CitizenSummary {
        reports::citizen_summary(&self.manager, &self.token, &self.registry, account)
    }

    pub fn municipal_report(&self) -> MunicipalReport {
        reports::municipal_report(&self.manager)
    }
}

/// Single global sequencer over one deployment.
///
/// Cloning shares the same deployment.
#[derive(Clone)]
pub struct Sequencer {
    inner: Arc<RwLock<Deployment>>,
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequencer").field("deployment", &*self.inner.read()).finish()
    }
}

impl Sequencer {
    pub fn new(deployment: Deployment) -> Self {
        Self {
            inner: Arc::new(RwLock::new(deployment)),
        }
    }

    // ============ Mutations (write lock) ============

    pub fn submit(&self, caller: Address, input: &CollectionEventInput) -> UrbanResult<Settlement> {
        self.inner.write().submit(caller, input)
    }

    pub fn reconcile(&self, caller: Address, submission_id: &str, action: ReconcileAction) -> UrbanResult<LedgerEntry> {
        self.inner.write().reconcile(caller, submission_id, action)
    }

    pub fn retry_payment(&self, caller: Address, submission_id: &str) -> UrbanResult<PaymentOutcome> {
        self.inner.write().retry_payment(caller, submission_id)
    }

    pub fn transfer_tokens(&self, caller: Address, to: Address, amount: Amount) -> UrbanResult<()> {
        self.inner.write().transfer_tokens(caller, to, amount)
    }

    pub fn transfer_record(&self, caller: Address, id: RecordId, to: Address) -> UrbanResult<()> {
        self.inner.write().transfer_record(caller, id, to)
    }

    // ============ Reads (read lock, owned snapshots) ============

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.inner.read().token().balance_of(account)
    }

    pub fn total_supply(&self) -> Amount {
        self.inner.read().token().total_supply()
    }

    pub fn owner_of(&self, id: RecordId) -> UrbanResult<Address> {
        self.inner.read().registry().owner_of(id)
    }

    pub fn metadata_of(&self, id: RecordId) -> UrbanResult<RecordMetadata> {
        self.inner.read().registry().metadata_of(id).cloned()
    }

    pub fn entry_for(&self, submission_id: &str) -> Option<LedgerEntry> {
        self.inner.read().manager().entry_for(submission_id).cloned()
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.inner.read().manager().entries().to_vec()
    }

    pub fn citizen_summary(&self, account: &Address) -> CitizenSummary {
        self.inner.read().citizen_summary(account)
    }

    pub fn municipal_report(&self) -> MunicipalReport {
        self.inner.read().municipal_report()
    }

    pub fn address_book(&self) -> AddressBook {
        self.inner.read().address_book()
    }

    pub fn block_height(&self) -> u64 {
        self.inner.read().block_height()
    }

    /// Run `f` against one consistent view of the deployment
    pub fn read<R>(&self, f: impl FnOnce(&Deployment) -> R) -> R {
        f(&self.inner.read())
    }
}
