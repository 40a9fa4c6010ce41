//! Deposit decisions of the readiness check against recording collaborators.

use anyhow::anyhow;
use async_trait::async_trait;
use confidential_balance::readiness::{
    Address, BalanceReadiness, DepositPath, DepositPlan, DepositTransactionBuilder,
    PublicBalanceSource, Readiness, TokenStatus, TransactionSubmitter,
};
use confidential_balance::ReadinessError;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
struct FakeTransaction {
    path: DepositPath,
    amount: u128,
    token: Address,
}

#[derive(Default)]
struct Calls {
    balance_queries: usize,
    built: Vec<FakeTransaction>,
    submitted: Vec<FakeTransaction>,
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Calls>>);

struct Balances {
    fa_only: u128,
    fail: bool,
    calls: Recorder,
}

#[async_trait]
impl PublicBalanceSource for Balances {
    async fn fungible_asset_balance(&self, _account: &Address, _token: &Address) -> anyhow::Result<u128> {
        self.calls.0.lock().balance_queries += 1;
        if self.fail {
            return Err(anyhow!("node unreachable"));
        }
        Ok(self.fa_only)
    }
}

struct Builder {
    fail: bool,
    calls: Recorder,
}

impl Builder {
    fn build(&self, path: DepositPath, token: &Address, plan: &DepositPlan) -> anyhow::Result<FakeTransaction> {
        if self.fail {
            return Err(anyhow!("simulation rejected payload"));
        }
        let tx = FakeTransaction {
            path,
            amount: plan.amount_to_deposit,
            token: *token,
        };
        self.calls.0.lock().built.push(tx.clone());
        Ok(tx)
    }
}

#[async_trait]
impl DepositTransactionBuilder for Builder {
    type Transaction = FakeTransaction;

    async fn build_direct_deposit(
        &self,
        _sender: &Address,
        token: &Address,
        plan: &DepositPlan,
    ) -> anyhow::Result<FakeTransaction> {
        self.build(DepositPath::DirectFungibleAsset, token, plan)
    }

    async fn build_coin_wrapped_deposit(
        &self,
        _sender: &Address,
        token: &Address,
        plan: &DepositPlan,
    ) -> anyhow::Result<FakeTransaction> {
        self.build(DepositPath::CoinWrapped, token, plan)
    }
}

struct Submitter {
    fail: bool,
    calls: Recorder,
}

#[async_trait]
impl TransactionSubmitter<FakeTransaction> for Submitter {
    type Receipt = u64;

    async fn submit(&self, transaction: FakeTransaction) -> anyhow::Result<u64> {
        if self.fail {
            return Err(anyhow!("transaction aborted"));
        }
        let mut calls = self.calls.0.lock();
        calls.submitted.push(transaction);
        Ok(calls.submitted.len() as u64)
    }
}

#[derive(Default)]
struct Failures {
    query: bool,
    build: bool,
    submit: bool,
}

fn readiness(fa_only: u128, failures: Failures) -> (BalanceReadiness<Balances, Builder, Submitter>, Recorder) {
    let calls = Recorder::default();
    let readiness = BalanceReadiness::new(
        account(),
        Balances {
            fa_only,
            fail: failures.query,
            calls: calls.clone(),
        },
        Builder {
            fail: failures.build,
            calls: calls.clone(),
        },
        Submitter {
            fail: failures.submit,
            calls: calls.clone(),
        },
    );
    (readiness, calls)
}

fn account() -> Address {
    Address::from_hex("0xcafe").unwrap()
}

fn token() -> Address {
    Address::from_hex("0xa").unwrap()
}

fn status(pending: u128, available: u128, public: u128) -> TokenStatus {
    TokenStatus {
        is_registered: true,
        pending_amount: pending,
        available_amount: available,
        fungible_asset_balance: public,
        ..Default::default()
    }
}

#[tokio::test]
async fn sufficient_balance_touches_nothing() {
    let (readiness, calls) = readiness(500, Failures::default());

    let outcome = readiness
        .ensure_ready(&token(), 100, &status(50, 60, 500))
        .await
        .unwrap();

    assert_eq!(outcome, Readiness::Sufficient);
    let calls = calls.0.lock();
    assert_eq!(calls.balance_queries, 0);
    assert!(calls.built.is_empty());
    assert!(calls.submitted.is_empty());
}

#[tokio::test]
async fn exact_balance_is_sufficient() {
    let (readiness, _) = readiness(0, Failures::default());

    let outcome = readiness
        .ensure_ready(&token(), 110, &status(50, 60, 0))
        .await
        .unwrap();

    assert!(!outcome.deposited());
}

#[tokio::test]
async fn shortfall_deposits_whole_public_balance() {
    let (readiness, calls) = readiness(500, Failures::default());

    let outcome = readiness
        .ensure_ready(&token(), 100, &status(0, 0, 500))
        .await
        .unwrap();

    let expected_plan = DepositPlan {
        amount_to_deposit: 500,
        recipient: account(),
        path: DepositPath::DirectFungibleAsset,
    };
    assert_eq!(
        outcome,
        Readiness::Deposited {
            plan: expected_plan,
            receipt: 1
        }
    );

    let calls = calls.0.lock();
    let expected_tx = FakeTransaction {
        path: DepositPath::DirectFungibleAsset,
        amount: 500,
        token: token(),
    };
    assert_eq!(calls.balance_queries, 1);
    assert_eq!(calls.built, vec![expected_tx.clone()]);
    assert_eq!(calls.submitted, vec![expected_tx]);
}

#[tokio::test]
async fn coin_backed_balance_uses_wrapped_deposit() {
    let (readiness, calls) = readiness(10, Failures::default());

    let outcome = readiness
        .ensure_ready(&token(), 100, &status(20, 30, 500))
        .await
        .unwrap();

    match outcome {
        Readiness::Deposited { plan, .. } => {
            assert_eq!(plan.path, DepositPath::CoinWrapped);
            assert_eq!(plan.amount_to_deposit, 500);
        }
        other => panic!("expected a deposit, got {:?}", other),
    }
    assert_eq!(calls.0.lock().submitted[0].path, DepositPath::CoinWrapped);
}

#[tokio::test]
async fn balance_query_failure_stops_before_building() {
    let (readiness, calls) = readiness(
        500,
        Failures {
            query: true,
            ..Default::default()
        },
    );

    let err = readiness
        .ensure_ready(&token(), 100, &status(0, 0, 500))
        .await
        .unwrap_err();

    assert!(matches!(err, ReadinessError::BalanceQuery(_)));
    assert!(err.to_string().contains("node unreachable"));
    assert!(calls.0.lock().built.is_empty());
}

#[tokio::test]
async fn build_failure_is_not_submitted() {
    let (readiness, calls) = readiness(
        500,
        Failures {
            build: true,
            ..Default::default()
        },
    );

    let err = readiness
        .ensure_ready(&token(), 100, &status(0, 0, 500))
        .await
        .unwrap_err();

    assert!(matches!(err, ReadinessError::TxBuild(_)));
    assert!(calls.0.lock().submitted.is_empty());
}

#[tokio::test]
async fn submit_failure_is_reported() {
    let (readiness, calls) = readiness(
        500,
        Failures {
            submit: true,
            ..Default::default()
        },
    );

    let err = readiness
        .ensure_ready(&token(), 100, &status(0, 0, 500))
        .await
        .unwrap_err();

    assert!(matches!(err, ReadinessError::TxSubmit(_)));
    assert!(err.to_string().contains("transaction aborted"));
    assert_eq!(calls.0.lock().built.len(), 1);
}
