//! Bootstrap sequencer.
//!
//! Deploys and wires the three contracts in a fixed order:
//!
//! 1. Deploy UrbanCoin
//! 2. Deploy WasteNFT
//! 3. Deploy RecycleManager with both addresses
//! 4. Bind the registry to the manager
//! 5. Authorize the manager as a minter
//!
//! Every step checks its postcondition first and is skipped if it already
//! holds, so a failed bootstrap can be resumed from its `PartialDeployment`.
//! A partially wired deployment is never handed out as a `Deployment`.

use std::fmt;

use tracing::{info, warn};

use urbancycle_common::{
    errors::{UrbanError, UrbanResult},
    math::RewardSchedule,
    types::{address_to_hex, derive_address, Address, CallContext},
};
use urbancycle_recycle_manager::{ExecutionLimits, ManagerConfig, PaymentPolicy, RecycleManager};
use urbancycle_urban_coin::UrbanCoin;
use urbancycle_waste_nft::WasteNft;

use crate::config::{ConfigError, DeployConfig};
use crate::deployment::Deployment;

/// Contract label used when deriving the manager address
const MANAGER_LABEL: &str = "RecycleManager";

/// A bootstrap step
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BootstrapStep {
    DeployToken,
    DeployRegistry,
    DeployManager,
    BindManager,
    AuthorizeMinter,
    /// Final postcondition check, not a mutation
    VerifyWiring,
}

impl BootstrapStep {
    /// Mutating steps in execution order
    pub const SEQUENCE: [BootstrapStep; 5] = [
        BootstrapStep::DeployToken,
        BootstrapStep::DeployRegistry,
        BootstrapStep::DeployManager,
        BootstrapStep::BindManager,
        BootstrapStep::AuthorizeMinter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BootstrapStep::DeployToken => "deploy_urban_coin",
            BootstrapStep::DeployRegistry => "deploy_waste_nft",
            BootstrapStep::DeployManager => "deploy_recycle_manager",
            BootstrapStep::BindManager => "bind_manager",
            BootstrapStep::AuthorizeMinter => "authorize_minter",
            BootstrapStep::VerifyWiring => "verify_wiring",
        }
    }
}

impl fmt::Display for BootstrapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Components of a bootstrap that has not finished
#[derive(Debug, Clone)]
pub struct PartialDeployment {
    pub deployer: Address,
    pub token: Option<UrbanCoin>,
    pub registry: Option<WasteNft>,
    pub manager: Option<RecycleManager>,
    pub block_height: u64,
}

impl PartialDeployment {
    /// Nothing deployed yet
    pub fn new(deployer: Address) -> Self {
        Self {
            deployer,
            token: None,
            registry: None,
            manager: None,
            block_height: 0,
        }
    }

    fn next_context(&mut self) -> CallContext {
        self.block_height += 1;
        CallContext::new(self.deployer, self.block_height)
    }

    fn into_deployment(self) -> Result<Deployment, Self> {
        let (deployer, block_height) = (self.deployer, self.block_height);
        match (self.token, self.registry, self.manager) {
            (Some(token), Some(registry), Some(manager)) => {
                Ok(Deployment::new(deployer, token, registry, manager, block_height))
            }
            (token, registry, manager) => Err(Self {
                deployer,
                token,
                registry,
                manager,
                block_height,
            }),
        }
    }
}

/// A bootstrap that stopped part way
#[derive(Debug, thiserror::Error)]
#[error("bootstrap failed at {step} after {} completed steps: {source}", .completed.len())]
pub struct BootstrapError {
    /// Step that failed
    pub step: BootstrapStep,
    /// Steps whose postcondition holds
    pub completed: Vec<BootstrapStep>,
    #[source]
    pub source: UrbanError,
    /// What was deployed so far, for `resume`
    pub partial: Box<PartialDeployment>,
}

/// Runs the bootstrap steps
#[derive(Debug, Clone, Default)]
pub struct BootstrapSequencer {
    schedule: RewardSchedule,
    payment: PaymentPolicy,
    limits: ExecutionLimits,
}

impl BootstrapSequencer {
    pub fn new(schedule: RewardSchedule, payment: PaymentPolicy, limits: ExecutionLimits) -> Self {
        Self {
            schedule,
            payment,
            limits,
        }
    }

    /// Sequencer and deployer address from a validated config
    pub fn from_config(config: &DeployConfig) -> Result<(Self, Address), ConfigError> {
        config.validate()?;
        let deployer = config.deployer_address()?;
        Ok((Self::new(config.rewards, config.payment, config.limits), deployer))
    }

    /// Bootstrap from scratch
    pub fn run(&self, deployer: Address) -> Result<Deployment, BootstrapError> {
        self.resume(PartialDeployment::new(deployer))
    }

    /// Continue a bootstrap, skipping steps that already hold
    pub fn resume(&self, mut partial: PartialDeployment) -> Result<Deployment, BootstrapError> {
        let mut completed = Vec::with_capacity(BootstrapStep::SEQUENCE.len());

        for step in BootstrapStep::SEQUENCE {
            if let Err(source) = self.apply(step, &mut partial) {
                warn!(step = %step, error = %source, "bootstrap step failed");
                return Err(BootstrapError {
                    step,
                    completed,
                    source,
                    partial: Box::new(partial),
                });
            }
            completed.push(step);
        }

        let deployment = match partial.into_deployment() {
            Ok(deployment) => deployment,
            Err(partial) => {
                return Err(BootstrapError {
                    step: BootstrapStep::VerifyWiring,
                    completed,
                    source: UrbanError::BootstrapIncomplete { missing: "contracts" },
                    partial: Box::new(partial),
                });
            }
        };

        if let Err(source) = deployment.verify_wiring() {
            warn!(error = %source, "wiring postcondition does not hold");
            return Err(BootstrapError {
                step: BootstrapStep::VerifyWiring,
                completed,
                source,
                partial: Box::new(deployment.into_partial()),
            });
        }

        let book = deployment.address_book();
        info!(
            urban_coin = %address_to_hex(&book.urban_coin),
            waste_nft = %address_to_hex(&book.waste_nft),
            recycle_manager = %address_to_hex(&book.recycle_manager),
            "contracts deployed and wired"
        );
        Ok(deployment)
    }

    fn apply(&self, step: BootstrapStep, partial: &mut PartialDeployment) -> UrbanResult<()> {
        let deployer = partial.deployer;
        match step {
            BootstrapStep::DeployToken => {
                if partial.token.is_some() {
                    info!(step = %step, "already deployed, skipping");
                    return Ok(());
                }
                let address = derive_address(&deployer, 0, UrbanCoin::name());
                partial.token = Some(UrbanCoin::deploy(deployer, address)?);
                info!(step = %step, address = %address_to_hex(&address), "UrbanCoin deployed");
            }
            BootstrapStep::DeployRegistry => {
                if partial.registry.is_some() {
                    info!(step = %step, "already deployed, skipping");
                    return Ok(());
                }
                let address = derive_address(&deployer, 1, WasteNft::name());
                partial.registry = Some(WasteNft::deploy(deployer, address)?);
                info!(step = %step, address = %address_to_hex(&address), "WasteNFT deployed");
            }
            BootstrapStep::DeployManager => {
                let token = partial.token.as_ref().map(UrbanCoin::address).ok_or(UrbanError::BootstrapIncomplete {
                    missing: "urban_coin",
                })?;
                let registry = partial.registry.as_ref().map(WasteNft::address).ok_or(
                    UrbanError::BootstrapIncomplete { missing: "waste_nft" },
                )?;

                if let Some(manager) = &partial.manager {
                    // A resumed manager must point at these registries
                    let config = manager.config();
                    if config.operator != deployer {
                        return Err(UrbanError::Unauthorized { expected: deployer, actual: config.operator });
                    }
                    if config.token != token {
                        return Err(UrbanError::Unauthorized { expected: token, actual: config.token });
                    }
                    if config.registry != registry {
                        return Err(UrbanError::Unauthorized { expected: registry, actual: config.registry });
                    }
                    info!(step = %step, "already deployed, skipping");
                    return Ok(());
                }

                let config = ManagerConfig {
                    operator: deployer,
                    token,
                    registry,
                    schedule: self.schedule,
                    payment: self.payment,
                    limits: self.limits,
                };
                let address = derive_address(&deployer, 2, MANAGER_LABEL);
                partial.manager = Some(RecycleManager::deploy(address, config)?);
                info!(step = %step, address = %address_to_hex(&address), "RecycleManager deployed");
            }
            BootstrapStep::BindManager => {
                let manager = manager_address(partial)?;
                let ctx = partial.next_context();
                let registry = partial
                    .registry
                    .as_mut()
                    .ok_or(UrbanError::BootstrapIncomplete { missing: "waste_nft" })?;

                match registry.bound_manager() {
                    Some(bound) if bound == manager => {
                        info!(step = %step, "registry already bound to this manager, skipping");
                    }
                    Some(bound) => return Err(UrbanError::AlreadyBound { manager: bound }),
                    None => {
                        registry.bind_manager(&ctx, manager)?;
                        info!(step = %step, "WasteNFT configured with RecycleManager address");
                    }
                }
            }
            BootstrapStep::AuthorizeMinter => {
                let manager = manager_address(partial)?;
                let ctx = partial.next_context();
                let token = partial
                    .token
                    .as_mut()
                    .ok_or(UrbanError::BootstrapIncomplete { missing: "urban_coin" })?;

                if token.is_minter(&manager) {
                    info!(step = %step, "manager already a minter, skipping");
                } else {
                    token.authorize_minter(&ctx, manager)?;
                    info!(step = %step, "RecycleManager authorized to mint tokens");
                }
            }
            BootstrapStep::VerifyWiring => {}
        }
        Ok(())
    }
}

fn manager_address(partial: &PartialDeployment) -> UrbanResult<Address> {
    partial
        .manager
        .as_ref()
        .map(RecycleManager::address)
        .ok_or(UrbanError::BootstrapIncomplete { missing: "recycle_manager" })
}
