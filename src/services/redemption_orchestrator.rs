use crate::adapters::polymarket::chain::ChainClient;
use crate::adapters::polymarket::positions::{FetchError, PositionsClient};
use crate::models::CycleSummary;
use crate::services::redemption_service::{redeem_position, RedemptionError, RedemptionOutcome};
use alloy::primitives::Address;
use log::{debug, error, info};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

pub struct RedemptionOrchestrator<C: ChainClient> {
    positions: PositionsClient,
    chain: Arc<C>,
    wallet: String,
}

impl<C: ChainClient> RedemptionOrchestrator<C> {
    pub fn new(positions: PositionsClient, chain: Arc<C>, wallet: Address) -> Self {
        Self {
            positions,
            chain,
            // The Data API expects the lowercase hex form.
            wallet: format!("{:#x}", wallet),
        }
    }

    /// One fetch → redeem-all → summarize pass. Only a fetch failure aborts the
    /// cycle; per-position failures are counted.
    pub async fn run_cycle(&self) -> Result<CycleSummary, FetchError> {
        let positions = self.positions.get_redeemable_positions(&self.wallet).await?;
        if positions.is_empty() {
            return Ok(CycleSummary::Skipped);
        }
        info!("cycle_start wallet={} redeemable={}", self.wallet, positions.len());

        let mut redeemed = 0usize;
        let mut failed = 0usize;
        let mut total_value = Decimal::ZERO;

        // Strictly one redemption in flight: they share the signer's nonce.
        for position in positions {
            let chain = Arc::clone(&self.chain);
            let label = position.condition_label().to_string();
            let handle = tokio::spawn(async move { redeem_position(chain.as_ref(), &position).await });
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("redeem_task_failed condition_id={} error={}", label, e);
                    RedemptionOutcome::Failed {
                        error: RedemptionError::Worker(e.to_string()),
                    }
                }
            };
            match outcome {
                RedemptionOutcome::Redeemed { tx_hash, value } => {
                    debug!("position_done condition_id={} tx={}", label, tx_hash);
                    redeemed += 1;
                    total_value += value;
                }
                RedemptionOutcome::Failed { error } => {
                    debug!("position_done condition_id={} error={}", label, error);
                    failed += 1;
                }
            }
        }

        Ok(CycleSummary::Completed {
            redeemed,
            failed,
            total_value,
        })
    }

    /// Runs a cycle and logs its result. Never fails.
    pub async fn run_once(&self) -> Option<CycleSummary> {
        match self.run_cycle().await {
            Ok(summary) => {
                info!("cycle_result {}", summary);
                Some(summary)
            }
            Err(e) => {
                error!("cycle_error error={}", e);
                None
            }
        }
    }

    /// Polls every `interval` until `shutdown` flips to true. A cycle that is
    /// already running is always allowed to finish.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(
            "starting wallet={} interval={}s",
            self.wallet,
            interval.as_secs()
        );
        while !*shutdown.borrow() {
            self.run_once().await;
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = sleep(interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // Sender dropped: nobody can ask us to stop any more.
                        sleep(interval).await;
                    }
                }
            }
        }
        info!("shutdown_complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::polymarket::chain::mock::MockChain;
    use crate::adapters::polymarket::contracts::{
        IConditionalTokens, INegRiskAdapter, NEG_RISK_ADAPTER,
    };
    use crate::domain::redemption::condition_id_to_bytes32;
    use alloy::primitives::{TxKind, B256};
    use alloy::rpc::types::eth::TransactionRequest;
    use alloy_sol_types::SolCall;
    use rust_decimal_macros::dec;
    use std::time::Instant;
    use url::Url;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const WALLET: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    async fn orchestrator(
        server: &MockServer,
        chain: Arc<MockChain>,
    ) -> RedemptionOrchestrator<MockChain> {
        let url = Url::parse(&format!("{}/positions", server.uri())).unwrap();
        let positions = PositionsClient::new(url).unwrap();
        RedemptionOrchestrator::new(positions, chain, WALLET.parse().unwrap())
    }

    async fn serve_positions(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/positions"))
            .and(query_param("user", WALLET))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    fn condition(n: u8) -> String {
        format!("0x{:064x}", n)
    }

    /// Condition id a signed redemption targets, whichever contract it goes to.
    fn signed_condition(tx: &TransactionRequest) -> B256 {
        let input = tx.input.input().expect("calldata");
        match tx.to {
            Some(TxKind::Call(to)) if to == NEG_RISK_ADAPTER => {
                INegRiskAdapter::redeemPositionsCall::abi_decode(input)
                    .unwrap()
                    .conditionId
            }
            _ => {
                IConditionalTokens::redeemPositionsCall::abi_decode(input)
                    .unwrap()
                    .conditionId
            }
        }
    }

    fn expected_conditions(ns: &[u8]) -> Vec<B256> {
        ns.iter()
            .map(|n| condition_id_to_bytes32(&condition(*n)).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn no_redeemable_positions_skips_without_touching_chain() {
        let mock_server = MockServer::start().await;
        serve_positions(
            &mock_server,
            serde_json::json!([
                {"conditionId": condition(1), "redeemable": false, "size": "4", "outcome": "YES"}
            ]),
        )
        .await;
        let chain = Arc::new(MockChain::new([]));

        let summary = orchestrator(&mock_server, chain.clone()).await.run_cycle().await.unwrap();

        assert_eq!(summary, CycleSummary::Skipped);
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn tallies_successes_and_failures() {
        let mock_server = MockServer::start().await;
        serve_positions(
            &mock_server,
            serde_json::json!([
                {"conditionId": condition(1), "redeemable": true, "size": "10", "outcome": "YES", "currentValue": 10.0},
                {"conditionId": condition(2), "redeemable": true, "size": "5",  "outcome": "NO",  "currentValue": "5", "negRisk": true},
                {"conditionId": condition(3), "redeemable": true, "size": "2.5", "outcome": "YES", "currentValue": 2.5}
            ]),
        )
        .await;
        let chain = Arc::new(MockChain::new([true, false, true]));

        let summary = orchestrator(&mock_server, chain.clone()).await.run_cycle().await.unwrap();

        assert_eq!(
            summary,
            CycleSummary::Completed {
                redeemed: 2,
                failed: 1,
                total_value: dec!(12.5),
            }
        );
        assert_eq!(chain.signed().len(), 3);
    }

    #[tokio::test]
    async fn redeems_in_fetch_order() {
        let mock_server = MockServer::start().await;
        serve_positions(
            &mock_server,
            serde_json::json!([
                {"conditionId": condition(3), "redeemable": true, "size": "1", "outcome": "YES", "currentValue": 1},
                {"conditionId": condition(1), "redeemable": true, "size": "1", "outcome": "NO", "currentValue": 1, "negRisk": true},
                {"conditionId": condition(2), "redeemable": true, "size": "1", "outcome": "YES", "currentValue": 1}
            ]),
        )
        .await;
        let chain = Arc::new(MockChain::new([true, true, true]));

        orchestrator(&mock_server, chain.clone()).await.run_cycle().await.unwrap();

        let order: Vec<B256> = chain.signed().iter().map(signed_condition).collect();
        assert_eq!(order, expected_conditions(&[3, 1, 2]));
    }

    #[tokio::test]
    async fn crashed_redemption_is_counted_and_cycle_continues() {
        let mock_server = MockServer::start().await;
        serve_positions(
            &mock_server,
            serde_json::json!([
                {"conditionId": condition(1), "redeemable": true, "size": "1", "outcome": "YES", "currentValue": 1},
                {"conditionId": condition(2), "redeemable": true, "size": "2", "outcome": "YES", "currentValue": 2},
                {"conditionId": condition(3), "redeemable": true, "size": "4", "outcome": "NO", "currentValue": 4}
            ]),
        )
        .await;
        let chain = Arc::new(MockChain {
            panic_on_sign: Some(1),
            ..MockChain::new([true, true])
        });

        let summary = orchestrator(&mock_server, chain.clone()).await.run_cycle().await.unwrap();

        assert_eq!(
            summary,
            CycleSummary::Completed {
                redeemed: 2,
                failed: 1,
                total_value: dec!(5),
            }
        );
        let order: Vec<B256> = chain.signed().iter().map(signed_condition).collect();
        assert_eq!(order, expected_conditions(&[1, 2, 3]));
    }

    #[tokio::test]
    async fn invalid_position_does_not_abort_cycle() {
        let mock_server = MockServer::start().await;
        serve_positions(
            &mock_server,
            serde_json::json!([
                {"redeemable": true, "size": "1", "outcome": "YES", "currentValue": 1},
                {"conditionId": condition(9), "redeemable": true, "size": "3", "outcome": "NO", "currentValue": 3}
            ]),
        )
        .await;
        let chain = Arc::new(MockChain::new([true]));

        let summary = orchestrator(&mock_server, chain.clone()).await.run_cycle().await.unwrap();

        assert_eq!(
            summary,
            CycleSummary::Completed {
                redeemed: 1,
                failed: 1,
                total_value: dec!(3),
            }
        );
    }

    #[tokio::test]
    async fn unreachable_rpc_counts_every_position_as_failed() {
        let mock_server = MockServer::start().await;
        serve_positions(
            &mock_server,
            serde_json::json!([
                {"conditionId": condition(1), "redeemable": true, "size": "1", "outcome": "YES", "currentValue": 1},
                {"conditionId": condition(2), "redeemable": true, "size": "1", "outcome": "NO", "currentValue": 1}
            ]),
        )
        .await;
        let chain = Arc::new(MockChain::disconnected());

        let summary = orchestrator(&mock_server, chain.clone()).await.run_cycle().await.unwrap();

        assert_eq!(
            summary,
            CycleSummary::Completed {
                redeemed: 0,
                failed: 2,
                total_value: Decimal::ZERO,
            }
        );
        assert!(chain.signed().is_empty());
    }

    #[tokio::test]
    async fn fetch_error_is_contained_by_run_once() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/positions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
        let chain = Arc::new(MockChain::new([]));
        let orchestrator = orchestrator(&mock_server, chain.clone()).await;

        assert!(matches!(
            orchestrator.run_cycle().await,
            Err(FetchError::Status(_))
        ));
        assert_eq!(orchestrator.run_once().await, None);
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn shutdown_during_cycle_lets_it_finish_then_exits() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/positions"))
            .and(query_param("user", WALLET))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([
                        {"conditionId": condition(1), "redeemable": true, "size": "1", "outcome": "YES", "currentValue": 1}
                    ]))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;
        let chain = Arc::new(MockChain::new([true]));
        let orchestrator = orchestrator(&mock_server, chain.clone()).await;

        let (tx, rx) = watch::channel(false);
        let stopper = tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            tx.send(true).unwrap();
            tx
        });

        let started = Instant::now();
        tokio::time::timeout(Duration::from_secs(5), orchestrator.run(Duration::from_secs(3600), rx))
            .await
            .expect("run should stop once shutdown is signalled");
        stopper.await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
        // The in-flight cycle still redeemed its position.
        assert_eq!(chain.signed().len(), 1);
    }

    #[tokio::test]
    async fn shutdown_while_idle_cuts_the_sleep_short() {
        let mock_server = MockServer::start().await;
        serve_positions(&mock_server, serde_json::json!([])).await;
        let chain = Arc::new(MockChain::new([]));
        let orchestrator = orchestrator(&mock_server, chain).await;

        let (tx, rx) = watch::channel(false);
        let stopper = tokio::spawn(async move {
            sleep(Duration::from_millis(200)).await;
            tx.send(true).unwrap();
            tx
        });

        tokio::time::timeout(Duration::from_secs(5), orchestrator.run(Duration::from_secs(3600), rx))
            .await
            .expect("run should stop once shutdown is signalled");
        stopper.await.unwrap();

        assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
    }
}
