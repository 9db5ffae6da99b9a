//! RecycleManager - Collection Event Orchestrator
//!
//! Drives one collection event through the pipeline:
//!
//! ```text
//! Received -> Graded -> Rewarded -> Recorded -> (Paid | Skipped) -> Settled
//! ```
//!
//! The manager is the only minter it relies on and the only writer the
//! provenance registry accepts. Mint and record are two separate calls, so a
//! run that mints but cannot record is flagged `NeedsReconciliation` and
//! resolved later with [`RecycleManager::reconcile`].
//!
//! ## Failure Policy
//!
//! - Validation and authorization failures happen before any mutation
//! - Every run appends exactly one ledger entry
//! - Payment failures never unwind the reward or the record

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub mod ledger;
pub mod payments;
pub mod reports;

pub use ledger::{LedgerEntry, PaymentOutcome, PipelineStage, Settlement, SettlementStatus};
pub use payments::{PaymentPolicy, PaymentProcessor, PaymentReceipt, PaymentRequest, RecordingProcessor};

use urbancycle_common::{
    check,
    constants::limits,
    errors::{UrbanError, UrbanResult},
    events::{EventLog, UrbanEvent},
    math::RewardSchedule,
    types::{
        address_from_hex, bounded_submission_id, require_nonzero, Address, Amount, CallContext, CollectionEvent,
        CollectionEventInput, CollectorKind, RecordId, ZERO_ADDRESS,
    },
    validation::require_caller,
};
use urbancycle_urban_coin::UrbanCoin;
use urbancycle_waste_nft::{RecordMetadata, WasteNft};

// ============ Configuration ============

/// Host-imposed execution limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    /// External calls (mint, record, payment) one run may make
    pub max_calls_per_run: u32,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_calls_per_run: limits::DEFAULT_MAX_CALLS_PER_RUN,
        }
    }
}

impl ExecutionLimits {
    pub fn new(max_calls_per_run: u32) -> Self {
        Self { max_calls_per_run }
    }

    /// True if a run can mint and record without hitting the limit
    pub fn settles_in_one_run(&self) -> bool {
        self.max_calls_per_run >= limits::MIN_CALLS_FOR_SETTLEMENT
    }
}

/// Manager configuration, fixed at deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Account allowed to reconcile stuck runs (the bootstrap deployer)
    pub operator: Address,
    /// UrbanCoin address
    pub token: Address,
    /// WasteNFT address
    pub registry: Address,
    pub schedule: RewardSchedule,
    pub payment: PaymentPolicy,
    pub limits: ExecutionLimits,
}

impl ManagerConfig {
    /// Config with default schedule, payment policy and limits
    pub fn new(operator: Address, token: Address, registry: Address) -> Self {
        Self {
            operator,
            token,
            registry,
            schedule: RewardSchedule::default(),
            payment: PaymentPolicy::default(),
            limits: ExecutionLimits::default(),
        }
    }

    pub fn validate(&self) -> UrbanResult<()> {
        require_nonzero(&self.operator, "operator address cannot be zero")?;
        require_nonzero(&self.token, "token address cannot be zero")?;
        require_nonzero(&self.registry, "registry address cannot be zero")?;
        self.schedule.validate()?;
        self.payment.validate()
    }
}

/// How to resolve a run stuck in `NeedsReconciliation`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileAction {
    /// Create the missing record (or adopt one that already exists)
    CompleteRecord,
    /// Burn the reward so the submission can be sent again
    ReverseMint,
}

/// A run awaiting reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingReconciliation {
    pub sequence: u64,
    pub submission_id: String,
    pub account: Address,
    pub reward: Amount,
    /// Record the registry already holds for this submission, if any
    pub existing_record: Option<RecordId>,
}

// ============ Manager State ============

/// Persisted manager state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RecycleManagerState {
    /// Append-only audit trail
    pub entries: Vec<LedgerEntry>,
    /// Submission id -> index of the entry holding it against replay
    pub active: BTreeMap<String, u64>,
}

/// External calls left in the current run
struct CallBudget {
    remaining: u32,
}

impl CallBudget {
    fn new(limits: &ExecutionLimits) -> Self {
        Self {
            remaining: limits.max_calls_per_run,
        }
    }

    fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    fn take(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

/// Output of the grading stage
struct Graded {
    event: CollectionEvent,
    reward: Amount,
    payment_due: Amount,
}

/// A deployed RecycleManager
#[derive(Debug, Clone)]
pub struct RecycleManager {
    address: Address,
    config: ManagerConfig,
    state: RecycleManagerState,
    events: EventLog,
}

impl RecycleManager {
    /// Deploy a manager at `address` wired to the registries in `config`
    pub fn deploy(address: Address, config: ManagerConfig) -> UrbanResult<Self> {
        require_nonzero(&address, "manager address cannot be zero")?;
        config.validate()?;
        Ok(Self {
            address,
            config,
            state: RecycleManagerState::default(),
            events: EventLog::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // ============ Pipeline ============

    /// Run one collection event through the pipeline.
    ///
    /// Returns the settlement for runs that minted (including
    /// `NeedsReconciliation`). Any other outcome is returned as the error that
    /// stopped the run, after its rejected entry has been appended.
    pub fn submit(
        &mut self,
        ctx: &CallContext,
        token: &mut UrbanCoin,
        registry: &mut WasteNft,
        payments: &mut dyn PaymentProcessor,
        input: &CollectionEventInput,
    ) -> UrbanResult<Settlement> {
        // Oversized ids are rejected at grading; only a bounded prefix is kept
        let submission_id = bounded_submission_id(&input.submission_id).to_string();
        let account = address_from_hex(&input.account).unwrap_or(ZERO_ADDRESS);
        debug!(submission_id = %submission_id, "submission received");

        // 1. Received: replay protection, then wiring
        if let Err(err) = self.check_received(token, registry, &submission_id) {
            return Err(self.reject(ctx, submission_id, account, PipelineStage::Received, None, err));
        }
        let mut budget = CallBudget::new(&self.config.limits);
        if budget.is_exhausted() {
            let err = UrbanError::ExecutionTimeout { stage: PipelineStage::Received.as_str() };
            return Err(self.reject(ctx, submission_id, account, PipelineStage::Received, None, err));
        }

        // 2. Graded
        let graded = match self.grade(input) {
            Ok(graded) => graded,
            Err(err) => {
                return Err(self.reject(ctx, submission_id, account, PipelineStage::Received, None, err));
            }
        };
        let Graded { event, reward, payment_due } = graded;
        let as_manager = ctx.as_caller(self.address);

        // 3. Rewarded
        budget.take();
        if let Err(err) = token.mint(&as_manager, event.account, reward) {
            warn!(submission_id = %submission_id, code = err.code(), "reward mint failed");
            let err = UrbanError::MintAuthorizationMissing { manager: self.address };
            return Err(self.reject(ctx, submission_id, event.account, PipelineStage::Graded, Some(event), err));
        }

        // 4. Recorded
        if !budget.take() {
            let cause = UrbanError::ExecutionTimeout { stage: PipelineStage::Recorded.as_str() };
            return Ok(self.flag_for_reconciliation(ctx, event, reward, payment_due, &cause));
        }
        let record_id = match registry.record(&as_manager, event.account, record_metadata(&event, ctx.block_height)) {
            Ok(id) => id,
            Err(cause) => return Ok(self.flag_for_reconciliation(ctx, event, reward, payment_due, &cause)),
        };

        // 5. Paid / Skipped
        let (stage, payment) = if payment_due == 0 {
            (PipelineStage::Recorded, PaymentOutcome::NotApplicable)
        } else if !budget.take() {
            let cause = UrbanError::ExecutionTimeout { stage: PipelineStage::Paid.as_str() };
            warn!(submission_id = %submission_id, "no budget left for payment");
            (
                PipelineStage::Skipped,
                PaymentOutcome::Skipped {
                    amount: payment_due,
                    reason: cause.code().to_string(),
                    attempts: 0,
                },
            )
        } else {
            let request = PaymentRequest::new(submission_id.clone(), event.account, payment_due);
            match self.attempt_payment(ctx, payments, &request) {
                Ok(receipt) => (
                    PipelineStage::Paid,
                    PaymentOutcome::Paid { amount: payment_due, receipt: receipt.reference },
                ),
                Err(err) => (
                    PipelineStage::Skipped,
                    PaymentOutcome::Skipped {
                        amount: payment_due,
                        reason: err.code().to_string(),
                        attempts: 1,
                    },
                ),
            }
        };

        // 6. Settled
        let account = event.account;
        let entry = self.append(
            ctx,
            submission_id.clone(),
            account,
            stage,
            SettlementStatus::Settled,
            reward,
            Some(record_id),
            payment,
            Some(event),
        );
        let settlement = Settlement::from(entry);
        self.events.emit(UrbanEvent::SubmissionSettled {
            sequence: settlement.sequence,
            submission_id: submission_id.clone(),
            account,
            reward,
            record_id,
            block_height: ctx.block_height,
        });
        info!(submission_id = %submission_id, reward, record_id, "submission settled");
        Ok(settlement)
    }

    /// Retry the payment of a settled run whose payment was skipped.
    ///
    /// A run that was already paid returns its outcome without calling the
    /// processor again.
    pub fn retry_payment(
        &mut self,
        ctx: &CallContext,
        payments: &mut dyn PaymentProcessor,
        submission_id: &str,
    ) -> UrbanResult<PaymentOutcome> {
        let index = self.active_index(submission_id).ok_or(UrbanError::NotFound { what: "ledger entry" })?;
        let entry = &self.state.entries[index];

        let (amount, attempts) = match &entry.payment {
            PaymentOutcome::NotApplicable => return Err(UrbanError::InvalidStateTransition),
            PaymentOutcome::Paid { .. } => return Ok(entry.payment.clone()),
            PaymentOutcome::Skipped { amount, attempts, .. } => (*amount, *attempts),
        };
        // The record must exist before anyone is paid
        check!(entry.is_settled(), UrbanError::InvalidStateTransition);

        let request = PaymentRequest::new(entry.submission_id.clone(), entry.account, amount);
        let result = self.attempt_payment(ctx, payments, &request);
        let entry = &mut self.state.entries[index];
        match result {
            Ok(receipt) => {
                entry.payment = PaymentOutcome::Paid { amount, receipt: receipt.reference };
                Ok(entry.payment.clone())
            }
            Err(err) => {
                entry.payment = PaymentOutcome::Skipped {
                    amount,
                    reason: err.code().to_string(),
                    attempts: attempts.saturating_add(1),
                };
                Err(err)
            }
        }
    }

    /// Resolve a run left in `NeedsReconciliation`.
    ///
    /// Operator only. Calling it on a run that is already resolved returns
    /// the entry unchanged.
    pub fn reconcile(
        &mut self,
        ctx: &CallContext,
        token: &mut UrbanCoin,
        registry: &mut WasteNft,
        submission_id: &str,
        action: ReconcileAction,
    ) -> UrbanResult<LedgerEntry> {
        require_caller(&self.config.operator, &ctx.caller)?;
        self.check_handles(token, registry)?;
        let index = self.latest_index(submission_id).ok_or(UrbanError::NotFound { what: "ledger entry" })?;
        let entry = self.state.entries[index].clone();
        if entry.status != SettlementStatus::NeedsReconciliation {
            return Ok(entry);
        }

        let as_manager = ctx.as_caller(self.address);
        match action {
            ReconcileAction::CompleteRecord => {
                let record_id = match registry.record_for_submission(submission_id) {
                    Some(existing) => existing,
                    None => {
                        let event = entry.event.as_ref().ok_or(UrbanError::InvalidStateTransition)?;
                        registry.record(&as_manager, event.account, record_metadata(event, ctx.block_height))?
                    }
                };

                let stored = &mut self.state.entries[index];
                stored.status = SettlementStatus::Settled;
                stored.record_id = Some(record_id);
                self.events.emit(UrbanEvent::ReconciliationCompleted {
                    sequence: entry.sequence,
                    submission_id: submission_id.to_string(),
                    record_id,
                    block_height: ctx.block_height,
                });
                self.events.emit(UrbanEvent::SubmissionSettled {
                    sequence: entry.sequence,
                    submission_id: submission_id.to_string(),
                    account: entry.account,
                    reward: entry.reward,
                    record_id,
                    block_height: ctx.block_height,
                });
                info!(submission_id, record_id, "reconciliation completed missing record");
            }
            ReconcileAction::ReverseMint => {
                // A recorded submission must keep its reward
                check!(
                    registry.record_for_submission(submission_id).is_none(),
                    UrbanError::InvalidStateTransition
                );
                token.burn(&as_manager, entry.account, entry.reward)?;

                let stored = &mut self.state.entries[index];
                stored.status = SettlementStatus::Reversed;
                stored.payment = PaymentOutcome::NotApplicable;
                self.state.active.remove(submission_id);
                self.events.emit(UrbanEvent::MintReversed {
                    sequence: entry.sequence,
                    submission_id: submission_id.to_string(),
                    amount: entry.reward,
                    block_height: ctx.block_height,
                });
                info!(submission_id, reward = entry.reward, "reconciliation reversed mint");
            }
        }

        Ok(self.state.entries[index].clone())
    }

    /// Runs that minted without a record, cross-referenced with the registry
    pub fn pending_reconciliation(&self, registry: &WasteNft) -> Vec<PendingReconciliation> {
        self.state
            .entries
            .iter()
            .filter(|e| e.status == SettlementStatus::NeedsReconciliation)
            .map(|e| PendingReconciliation {
                sequence: e.sequence,
                submission_id: e.submission_id.clone(),
                account: e.account,
                reward: e.reward,
                existing_record: registry.record_for_submission(&e.submission_id),
            })
            .collect()
    }

    /// Check the wiring the pipeline depends on
    pub fn check_wiring(&self, token: &UrbanCoin, registry: &WasteNft) -> UrbanResult<()> {
        self.check_handles(token, registry)?;
        check!(
            token.is_minter(&self.address),
            UrbanError::MintAuthorizationMissing { manager: self.address }
        );
        check!(
            registry.bound_manager() == Some(self.address),
            UrbanError::BootstrapIncomplete { missing: "bind_manager" }
        );
        Ok(())
    }

    // ============ Reads ============

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.state.entries
    }

    /// The entry holding `submission_id`, or its most recent entry
    pub fn entry_for(&self, submission_id: &str) -> Option<&LedgerEntry> {
        self.latest_index(submission_id).map(|i| &self.state.entries[i])
    }

    pub fn settled_count(&self) -> usize {
        self.state.entries.iter().filter(|e| e.is_settled()).count()
    }

    /// Settled runs whose payment awaits a retry
    pub fn pending_payments(&self) -> Vec<&LedgerEntry> {
        self.state
            .entries
            .iter()
            .filter(|e| e.is_settled() && e.payment.is_pending())
            .collect()
    }

    pub fn state(&self) -> &RecycleManagerState {
        &self.state
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    // ============ Helpers ============

    fn check_received(&self, token: &UrbanCoin, registry: &WasteNft, submission_id: &str) -> UrbanResult<()> {
        check!(
            !self.state.active.contains_key(submission_id),
            UrbanError::DuplicateSubmission {
                submission_id: submission_id.to_string(),
            }
        );
        self.check_wiring(token, registry)
    }

    /// Registry handles must be the ones this manager was deployed with
    fn check_handles(&self, token: &UrbanCoin, registry: &WasteNft) -> UrbanResult<()> {
        check!(
            token.address() == self.config.token,
            UrbanError::Unauthorized {
                expected: self.config.token,
                actual: token.address(),
            }
        );
        check!(
            registry.address() == self.config.registry,
            UrbanError::Unauthorized {
                expected: self.config.registry,
                actual: registry.address(),
            }
        );
        Ok(())
    }

    fn grade(&self, input: &CollectionEventInput) -> UrbanResult<Graded> {
        let event = CollectionEvent::try_from_input(input)?;
        let reward = self
            .config
            .schedule
            .reward_for(event.material, event.grade, event.weight_grams)?;
        check!(
            reward > 0,
            UrbanError::InvalidEvent {
                field: "weight_kg",
                reason: "reward rounds to zero",
            }
        );
        let payment_due = match event.collector_kind {
            CollectorKind::InformalRecycler => self.config.payment.amount_for(event.weight_grams)?,
            CollectorKind::Citizen => 0,
        };
        Ok(Graded { event, reward, payment_due })
    }

    fn attempt_payment(
        &mut self,
        ctx: &CallContext,
        payments: &mut dyn PaymentProcessor,
        request: &PaymentRequest,
    ) -> UrbanResult<PaymentReceipt> {
        match payments.pay(request) {
            Ok(receipt) => {
                self.events.emit(UrbanEvent::PaymentDistributed {
                    submission_id: request.submission_id.clone(),
                    recipient: request.recipient,
                    amount: request.amount,
                    receipt: receipt.reference.clone(),
                    block_height: ctx.block_height,
                });
                info!(submission_id = %request.submission_id, amount = request.amount, "payment distributed");
                Ok(receipt)
            }
            Err(err) => {
                self.events.emit(UrbanEvent::PaymentSkipped {
                    submission_id: request.submission_id.clone(),
                    recipient: request.recipient,
                    amount: request.amount,
                    reason: err.code().to_string(),
                    block_height: ctx.block_height,
                });
                warn!(submission_id = %request.submission_id, error = %err, "payment skipped");
                Err(err)
            }
        }
    }

    fn flag_for_reconciliation(
        &mut self,
        ctx: &CallContext,
        event: CollectionEvent,
        reward: Amount,
        payment_due: Amount,
        cause: &UrbanError,
    ) -> Settlement {
        let submission_id = event.submission_id.clone();
        let payment = if payment_due == 0 {
            PaymentOutcome::NotApplicable
        } else {
            PaymentOutcome::Skipped {
                amount: payment_due,
                reason: cause.code().to_string(),
                attempts: 0,
            }
        };
        let entry = self.append(
            ctx,
            submission_id.clone(),
            event.account,
            PipelineStage::Rewarded,
            SettlementStatus::NeedsReconciliation,
            reward,
            None,
            payment,
            Some(event),
        );
        let settlement = Settlement::from(entry);
        self.events.emit(UrbanEvent::ReconciliationRequired {
            sequence: settlement.sequence,
            submission_id: submission_id.clone(),
            reward,
            block_height: ctx.block_height,
        });
        warn!(submission_id = %submission_id, reward, code = cause.code(), "reward minted without record");
        settlement
    }

    fn reject(
        &mut self,
        ctx: &CallContext,
        submission_id: String,
        account: Address,
        stage: PipelineStage,
        event: Option<CollectionEvent>,
        err: UrbanError,
    ) -> UrbanError {
        let code = err.code().to_string();
        let sequence = self
            .append(
                ctx,
                submission_id.clone(),
                account,
                stage,
                SettlementStatus::Rejected { code: code.clone() },
                0,
                None,
                PaymentOutcome::NotApplicable,
                event,
            )
            .sequence;
        self.events.emit(UrbanEvent::SubmissionRejected {
            sequence,
            submission_id: submission_id.clone(),
            code,
            block_height: ctx.block_height,
        });
        info!(submission_id = %submission_id, error = %err, "submission rejected");
        err
    }

    #[allow(clippy::too_many_arguments)]
    fn append(
        &mut self,
        ctx: &CallContext,
        submission_id: String,
        account: Address,
        stage: PipelineStage,
        status: SettlementStatus,
        reward: Amount,
        record_id: Option<RecordId>,
        payment: PaymentOutcome,
        event: Option<CollectionEvent>,
    ) -> &LedgerEntry {
        let index = self.state.entries.len();
        if status.blocks_replay() {
            self.state.active.insert(submission_id.clone(), index as u64);
        }
        self.state.entries.push(LedgerEntry {
            sequence: index as u64 + 1,
            submission_id,
            account,
            stage,
            status,
            reward,
            record_id,
            payment,
            event,
            block_height: ctx.block_height,
        });
        &self.state.entries[index]
    }

    fn active_index(&self, submission_id: &str) -> Option<usize> {
        self.state.active.get(submission_id).map(|i| *i as usize)
    }

    fn latest_index(&self, submission_id: &str) -> Option<usize> {
        self.active_index(submission_id).or_else(|| {
            self.state
                .entries
                .iter()
                .rposition(|e| e.submission_id == submission_id)
        })
    }
}

fn record_metadata(event: &CollectionEvent, block_height: u64) -> RecordMetadata {
    RecordMetadata {
        material: event.material,
        weight_grams: event.weight_grams,
        grade: event.grade,
        submission_id: event.submission_id.clone(),
        collected_at: event.collected_at,
        minted_at_block: block_height,
    }
}

// ============ Tests ============
