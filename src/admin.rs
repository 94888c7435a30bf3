//! Admin Surface
//!
//! Owner-gated parameter management and wiring. Setters mutate
//! parameters only, never mid-operation state, and each validates its
//! bounds before touching anything.

use tracing::info;

use crate::check;
use crate::constants::limits;
use crate::engine::{Engine, ProtocolAddresses};
use crate::errors::{EngineError, EngineResult};
use crate::events::EngineEvent;
use crate::types::{Address, MintRecipient};

impl Engine {
    fn require_owner(&self, caller: Address) -> EngineResult<()> {
        check!(caller == self.owner, EngineError::NotAuthorized);
        Ok(())
    }

    /// One-shot wiring of the protocol's token accounts. The custody
    /// account is whitelisted for stablecoin mint and burn.
    pub fn set_addresses(
        &mut self,
        caller: Address,
        addresses: ProtocolAddresses,
    ) -> EngineResult<()> {
        self.require_owner(caller)?;
        check!(
            self.addresses.is_none(),
            EngineError::InvalidParameter {
                what: "addresses already configured",
            }
        );
        self.ledger.add_minter(addresses.custody);
        self.addresses = Some(addresses);
        info!("protocol addresses configured");
        Ok(())
    }

    /// Registers a collateral asset. It stays inactive until its
    /// parameters are configured.
    pub fn add_new_collateral(
        &mut self,
        caller: Address,
        asset: Address,
        decimals: u8,
    ) -> EngineResult<()> {
        self.require_owner(caller)?;
        let index = self.store.add_collateral(asset, decimals)?;
        self.events.push(EngineEvent::CollateralAdded { asset, index });
        Ok(())
    }

    /// Configures all risk parameters of a collateral and activates it.
    #[allow(clippy::too_many_arguments)]
    pub fn set_collateral_parameters(
        &mut self,
        caller: Address,
        asset: Address,
        min_range: u128,
        max_range: u128,
        mcr_factor: u128,
        base_fee: u128,
        max_fee: u128,
        min_net_debt: u128,
        mint_cap: u128,
        liquidation_penalty: u128,
    ) -> EngineResult<()> {
        self.require_owner(caller)?;
        self.store.set_collateral_parameters(
            asset,
            min_range,
            max_range,
            mcr_factor,
            base_fee,
            max_fee,
            min_net_debt,
            mint_cap,
            liquidation_penalty,
        )?;
        self.events.push(EngineEvent::CollateralParametersSet { asset });
        Ok(())
    }

    /// Raises or lowers the MCR range floor of one asset.
    pub fn set_min_range(
        &mut self,
        caller: Address,
        asset: Address,
        min_range: u128,
    ) -> EngineResult<()> {
        self.require_owner(caller)?;
        self.store.set_min_range(asset, min_range)
    }

    /// Sets the steep end of one asset's interest curve.
    pub fn set_max_fee(&mut self, caller: Address, asset: Address, max_fee: u128) -> EngineResult<()> {
        self.require_owner(caller)?;
        self.store.set_max_fee(asset, max_fee)
    }

    /// Sets one asset's liquidation penalty.
    pub fn set_liquidation_penalty(
        &mut self,
        caller: Address,
        asset: Address,
        penalty: u128,
    ) -> EngineResult<()> {
        self.require_owner(caller)?;
        self.store.set_liquidation_penalty(asset, penalty)
    }

    /// Sets the global redemption fee.
    pub fn set_redemption_fee(&mut self, caller: Address, fee: u128) -> EngineResult<()> {
        self.require_owner(caller)?;
        self.store.set_redemption_fee(fee)
    }

    /// Enables or disables new positions against one asset.
    pub fn set_is_active(
        &mut self,
        caller: Address,
        asset: Address,
        active: bool,
    ) -> EngineResult<()> {
        self.require_owner(caller)?;
        self.store.set_is_active(asset, active)
    }

    /// Configures the interest-mint distribution. Shares may sum below
    /// ten thousand basis points; the shortfall goes to the default
    /// recipient, or stays unminted when none is set.
    pub fn set_mint_recipients(
        &mut self,
        caller: Address,
        recipients: Vec<MintRecipient>,
    ) -> EngineResult<()> {
        self.require_owner(caller)?;
        let total_bps: u64 = recipients.iter().map(|r| r.bps).sum();
        check!(
            total_bps <= limits::BPS_DENOMINATOR,
            EngineError::InvalidParameter {
                what: "mint recipient shares above 10000 bps",
            }
        );
        self.mint_recipients = recipients;
        Ok(())
    }

    /// Sets or clears the recipient of undistributed interest.
    pub fn set_default_interest_recipient(
        &mut self,
        caller: Address,
        recipient: Option<Address>,
    ) -> EngineResult<()> {
        self.require_owner(caller)?;
        self.default_interest_recipient = recipient;
        Ok(())
    }

    /// Rotates the oracle operator.
    pub fn set_oracle_operator(&mut self, caller: Address, operator: Address) -> EngineResult<()> {
        self.require_owner(caller)?;
        self.oracle.set_operator(operator);
        Ok(())
    }

    /// Adjusts the oracle staleness window.
    pub fn set_price_max_age(&mut self, caller: Address, max_age: u64) -> EngineResult<()> {
        self.require_owner(caller)?;
        self.oracle.set_max_age(max_age)
    }

    /// Adds an account to the stablecoin mint/burn whitelist.
    pub fn add_minter(&mut self, caller: Address, account: Address) -> EngineResult<()> {
        self.require_owner(caller)?;
        self.ledger.add_minter(account);
        Ok(())
    }

    /// Removes an account from the stablecoin mint/burn whitelist.
    pub fn remove_minter(&mut self, caller: Address, account: Address) -> EngineResult<()> {
        self.require_owner(caller)?;
        self.ledger.remove_minter(account);
        Ok(())
    }

    /// Publishes a price; callable by the oracle operator.
    pub fn update_price(
        &mut self,
        caller: Address,
        asset: Address,
        price: u128,
        now: u64,
    ) -> EngineResult<()> {
        self.oracle.update_price(caller, asset, price, now)?;
        self.events.push(EngineEvent::PriceUpdated { asset, price });
        Ok(())
    }
}
