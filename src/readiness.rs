//! Decides whether a confidential balance must be topped up from the public
//! balance before a transfer or withdrawal, and performs the deposit.

use crate::errors::ReadinessError;

use async_trait::async_trait;
use std::fmt;

/// 32-byte account or token address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut bytes = [0u8; 32];
        // Short addresses are left-padded, `0x1` is the framework address.
        let padded = format!("{:0>64}", s);
        hex::decode_to_slice(padded, &mut bytes)?;
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// Balances of one token as tracked outside the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenStatus {
    pub is_frozen: bool,
    pub is_normalized: bool,
    pub is_registered: bool,
    /// Decrypted pending confidential balance.
    pub pending_amount: u128,
    /// Decrypted available confidential balance.
    pub available_amount: u128,
    /// Public balance of the token.
    pub fungible_asset_balance: u128,
}

impl TokenStatus {
    pub fn confidential_sum(&self) -> u128 {
        self.pending_amount.saturating_add(self.available_amount)
    }

    /// Pending funds must be rolled over before they can be spent.
    pub fn needs_rollover(&self) -> bool {
        self.pending_amount > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositPath {
    /// Deposit straight from the fungible-asset store.
    DirectFungibleAsset,
    /// Deposit that may also draw on a legacy coin balance.
    CoinWrapped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositPlan {
    pub amount_to_deposit: u128,
    pub recipient: Address,
    pub path: DepositPath,
}

/// Outcome of [`BalanceReadiness::ensure_ready`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness<R> {
    /// The confidential balance already covers the request.
    Sufficient,
    /// A deposit was submitted.
    Deposited { plan: DepositPlan, receipt: R },
}

impl<R> Readiness<R> {
    pub fn deposited(&self) -> bool {
        matches!(self, Readiness::Deposited { .. })
    }
}

/// Reads public balances.
#[async_trait]
pub trait PublicBalanceSource: Send + Sync {
    /// Balance held in the fungible-asset store only, excluding coins.
    async fn fungible_asset_balance(&self, account: &Address, token: &Address) -> anyhow::Result<u128>;
}

/// Builds deposit transactions. Payload construction and signing live here.
#[async_trait]
pub trait DepositTransactionBuilder: Send + Sync {
    type Transaction: Send + 'static;

    async fn build_direct_deposit(
        &self,
        sender: &Address,
        token: &Address,
        plan: &DepositPlan,
    ) -> anyhow::Result<Self::Transaction>;

    async fn build_coin_wrapped_deposit(
        &self,
        sender: &Address,
        token: &Address,
        plan: &DepositPlan,
    ) -> anyhow::Result<Self::Transaction>;
}

/// Submits a transaction and waits for it to be committed.
#[async_trait]
pub trait TransactionSubmitter<T: Send + 'static>: Send + Sync {
    type Receipt: Send;

    async fn submit(&self, transaction: T) -> anyhow::Result<Self::Receipt>;
}

/// Tops up the confidential balance of `account` when it cannot cover an
/// operation.
///
/// When a deposit is needed the whole public balance is deposited, not just
/// the shortfall. Concurrent calls for the same token are not coordinated and
/// nothing is retried.
pub struct BalanceReadiness<Q, B, S> {
    account: Address,
    balances: Q,
    builder: B,
    submitter: S,
}

impl<Q, B, S> BalanceReadiness<Q, B, S>
where
    Q: PublicBalanceSource,
    B: DepositTransactionBuilder,
    S: TransactionSubmitter<B::Transaction>,
{
    pub fn new(account: Address, balances: Q, builder: B, submitter: S) -> Self {
        BalanceReadiness {
            account,
            balances,
            builder,
            submitter,
        }
    }

    pub fn account(&self) -> &Address {
        &self.account
    }

    /// Makes sure `requested` can be spent from the confidential balance of
    /// `token`, depositing first if necessary.
    ///
    /// The caller must not go ahead with its operation on error.
    pub async fn ensure_ready(
        &self,
        token: &Address,
        requested: u128,
        status: &TokenStatus,
    ) -> Result<Readiness<S::Receipt>, ReadinessError> {
        let confidential_sum = status.confidential_sum();
        if confidential_sum >= requested {
            tracing::debug!(%token, requested, confidential_sum, "confidential balance sufficient");
            return Ok(Readiness::Sufficient);
        }

        let amount_to_deposit = status.fungible_asset_balance;

        let fa_balance = self
            .balances
            .fungible_asset_balance(&self.account, token)
            .await
            .map_err(ReadinessError::BalanceQuery)?;

        let path = if fa_balance < amount_to_deposit {
            DepositPath::CoinWrapped
        } else {
            DepositPath::DirectFungibleAsset
        };
        let plan = DepositPlan {
            amount_to_deposit,
            recipient: self.account,
            path,
        };

        tracing::info!(
            %token,
            requested,
            confidential_sum,
            amount = amount_to_deposit,
            fa_balance,
            ?path,
            "depositing public balance"
        );

        let transaction = match path {
            DepositPath::DirectFungibleAsset => {
                self.builder
                    .build_direct_deposit(&self.account, token, &plan)
                    .await
            }
            DepositPath::CoinWrapped => {
                self.builder
                    .build_coin_wrapped_deposit(&self.account, token, &plan)
                    .await
            }
        }
        .map_err(ReadinessError::TxBuild)?;

        let receipt = self
            .submitter
            .submit(transaction)
            .await
            .map_err(ReadinessError::TxSubmit)?;

        tracing::info!(%token, amount = amount_to_deposit, "deposit committed");

        Ok(Readiness::Deposited { plan, receipt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidential_sum_saturates() {
        let status = TokenStatus {
            pending_amount: u128::MAX,
            available_amount: 1,
            ..Default::default()
        };
        assert_eq!(status.confidential_sum(), u128::MAX);
        assert!(status.needs_rollover());
        assert!(!TokenStatus::default().needs_rollover());
    }

    #[test]
    fn address_hex_round_trip() {
        let addr = Address::from_hex("0xa").unwrap();
        assert_eq!(addr.0[31], 0x0a);
        assert!(addr.0[..31].iter().all(|&b| b == 0));
        assert_eq!(Address::from_hex(&addr.to_string()).unwrap(), addr);

        assert!(Address::from_hex("0xzz").is_err());
        assert!(Address::from_hex(&"1".repeat(65)).is_err());
    }
}
