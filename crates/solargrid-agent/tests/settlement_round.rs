//! End-to-end settlement round: report -> oracle -> broadcast -> agent

use std::sync::Arc;
use std::time::Duration;

use solargrid_agent::SettlementAgent;
use solargrid_chain::{ConfirmationPolicy, MockChain, TransactionExecutor, Wallet};
use solargrid_hub::{BroadcastServer, DecisionHub};
use solargrid_ledger::TransactionLedger;
use solargrid_oracle::ScriptedOracle;
use solargrid_types::{EnergyReport, HouseReading, RetryPolicy, WalletAddress};

const TOKEN: &str = "0xA77884FE9B83C678689b98E877B2A2D5bAF53497";
// Distinct throwaway keys; each derives its own address
const KEY_H3: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";
const KEY_H1: &str = "0x0101010101010101010101010101010101010101010101010101010101010101";

struct Harness {
    agent: Arc<SettlementAgent>,
    chain: Arc<MockChain>,
    ledger: TransactionLedger,
    address: WalletAddress,
    _dir: tempfile::TempDir,
}

fn harness(name: &str, key: &str, hub_url: &str) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::new());
    let ledger = TransactionLedger::open(dir.path().join("tx.log")).unwrap();
    let wallet = Wallet::from_private_key(key, WalletAddress::new(TOKEN)).unwrap();
    let address = wallet.address().clone();
    let executor = TransactionExecutor::new(chain.clone(), wallet).with_confirmation_policy(
        ConfirmationPolicy {
            timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(5),
            reconcile_polls: 2,
        },
    );
    let agent = Arc::new(SettlementAgent::new(
        name,
        executor,
        ledger.clone(),
        hub_url,
        RetryPolicy::fixed(Duration::from_millis(50)),
    ));
    Harness {
        agent,
        chain,
        ledger,
        address,
        _dir: dir,
    }
}

fn deficit_report() -> EnergyReport {
    EnergyReport {
        weather: "sunny".to_string(),
        houses: vec![
            HouseReading { house_id: "H1".into(), generation: 5.0, consumption: 0.0 },
            HouseReading { house_id: "H2".into(), generation: 5.0, consumption: 0.0 },
            HouseReading { house_id: "H3".into(), generation: 5.0, consumption: 7.0 },
            HouseReading { house_id: "H4".into(), generation: 5.0, consumption: 0.0 },
        ],
    }
}

async fn wait_until<F, Fut>(mut condition: F, timeout: Duration)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// The payer settles, the payee stays idle: a deficit house's agent
/// executes exactly one transfer and the creditor's agent never touches
/// its chain.
#[tokio::test]
async fn deficit_house_pays_and_creditor_stays_idle() {
    let h3 = harness("H3", KEY_H3, "ws://unused");
    let h1 = harness("H1", KEY_H1, "ws://unused");

    let decision = format!(
        "Wallet {} sends 2 SOLAR to Wallet {} on Sonic Network.",
        h3.address, h1.address
    );

    assert_eq!(h3.agent.process_decision(&decision).await, 1);
    assert_eq!(h1.agent.process_decision(&decision).await, 0);

    let records = h3.ledger.all().await;
    assert_eq!(records.len(), 1);
    assert!(records[0].success);
    assert_eq!(records[0].amount, 2);
    assert_eq!(records[0].sender, h3.address);
    assert_eq!(records[0].recipient, h1.address);
    assert_eq!(h3.chain.submitted_count().await, 1);

    // H1 is the creditor: informational only, no chain call, no record
    assert_eq!(h1.chain.submitted_count().await, 0);
    assert!(h1.ledger.is_empty().await);
}

/// Full pipeline over a real socket: hub broadcasts a round, a live
/// agent receives it and settles.
#[tokio::test]
async fn broadcast_reaches_a_live_agent() {
    let payer = Wallet::from_private_key(KEY_H3, WalletAddress::new(TOKEN)).unwrap();
    let decision = format!(
        "Wallet {} sends 2 SOLAR to Wallet 0xE860ADA0513Cd6490684BC23e04B27E410DE84FC on Sonic Network.",
        payer.address()
    );

    let hub = Arc::new(DecisionHub::new(Arc::new(ScriptedOracle::new(decision))));
    let server = BroadcastServer::bind("127.0.0.1:0", hub.subscribers().clone())
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let h3 = harness("H3", KEY_H3, &format!("ws://{addr}"));
    let agent = h3.agent.clone();
    tokio::spawn(async move { agent.run().await });

    let subscribers = hub.subscribers().clone();
    wait_until(
        || {
            let subscribers = subscribers.clone();
            async move { subscribers.count().await == 1 }
        },
        Duration::from_secs(5),
    )
    .await;

    assert_eq!(hub.process_report(deficit_report()).await, 1);

    let ledger = h3.ledger.clone();
    wait_until(
        || {
            let ledger = ledger.clone();
            async move { ledger.len().await == 1 }
        },
        Duration::from_secs(5),
    )
    .await;

    let records = h3.ledger.all().await;
    assert!(records[0].success);
    assert_eq!(records[0].amount, 2);
    assert_eq!(h3.chain.submitted_count().await, 1);
}
