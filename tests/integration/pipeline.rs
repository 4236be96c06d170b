//! Token → pool → farming against a recording runner and local price pages.

use chrono_tz::Asia::Shanghai;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use np_autodeploy::config::Profile;
use np_autodeploy::engine::{DeployError, InstrumentDeployer, LotteryController};
use np_autodeploy::notify::NotifierSet;
use np_autodeploy::pricing::coinmarketcap::CoinMarketCapClient;
use np_autodeploy::pricing::{PriceError, PriceSource};
use np_autodeploy::scheduler::{JobKind, JobRunner};
use np_autodeploy::storage::{AddressBook, Book};
use np_autodeploy::types::{Direction, Token};

use crate::mock_runner::{temp_info_dir, RecordingRunner};
use crate::servers::price_pages;

async fn prices() -> Arc<CoinMarketCapClient> {
    let base = price_pages(&[
        ("bitcoin", "$50,000.00"),
        ("ethereum", "$3,000.00"),
        ("avalanche", "$18.27"),
    ])
    .await;
    Arc::new(CoinMarketCapClient::new(&base, Duration::from_secs(5)).unwrap())
}

fn deployer(prices: Arc<CoinMarketCapClient>, runner: &RecordingRunner, dir: &std::path::Path) -> InstrumentDeployer {
    InstrumentDeployer::new(
        prices,
        Arc::new(runner.clone()),
        AddressBook::with_info_dir(dir.to_path_buf(), "fuji"),
        Profile::v1(),
        Shanghai,
    )
}

#[tokio::test]
async fn test_price_page_scraped() {
    let prices = prices().await;
    let quote = prices.fetch_price(Token::Avax).await.unwrap();
    assert_eq!(quote.price, dec!(18.27));
}

#[tokio::test]
async fn test_missing_page_is_status_error() {
    let base = price_pages(&[("bitcoin", "$1.00")]).await;
    let prices = CoinMarketCapClient::new(&base, Duration::from_secs(5)).unwrap();
    let err = prices.fetch_price(Token::Eth).await.unwrap_err();
    assert!(matches!(err, PriceError::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_stages_resolve_names_from_books_after_restart() {
    let dir = temp_info_dir();
    let runner = RecordingRunner::new(&dir, "fuji");
    let prices = prices().await;

    let tokens = deployer(prices.clone(), &runner, &dir)
        .deploy_tokens(Token::Btc, dec!(0.1))
        .await
        .unwrap();
    let round = tokens.params.round.clone();
    assert_eq!(tokens.pair.call.to_string(), format!("BTC_55000.0_H_{round}"));
    assert_eq!(tokens.pair.put.to_string(), format!("BTC_45000.0_L_{round}"));

    // A fresh deployer has no pair in hand and must use the books.
    let pools = deployer(prices.clone(), &runner, &dir)
        .deploy_pools(Token::Btc, "MockUSD", None)
        .await
        .unwrap();
    assert_eq!(pools.pair, tokens.pair);
    assert_eq!(pools.stablecoin_address, "0xusd");

    let farming = deployer(prices, &runner, &dir)
        .deploy_farming(Token::Btc, None)
        .await
        .unwrap();
    assert_eq!(farming.call_pool, format!("0xpool-BTC_55000.0_H_{round}"));
    assert_eq!(farming.put_pool, format!("0xpool-BTC_45000.0_L_{round}"));

    assert_eq!(
        runner.tasks(),
        vec![
            "deployNPToken",
            "deployNPToken",
            "deployNPPool",
            "deployNPPool",
            "addFarmingPool",
            "addFarmingPool"
        ]
    );
    let farm_call = &runner.calls()[4].args;
    assert_eq!(farm_call.get("reward"), Some("0.25"));
    assert_eq!(farm_call.get("bonus"), Some("0"));

    let book = AddressBook::with_info_dir(dir.clone(), "fuji");
    let latest_put = book
        .latest_instrument(Book::Tokens, Token::Btc, &round, Direction::Low)
        .unwrap();
    assert_eq!(latest_put, tokens.pair.put);
    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn test_put_leg_failure_keeps_call_leg() {
    let dir = temp_info_dir();
    let runner = RecordingRunner::new(&dir, "fuji");
    runner.fail_from(1);

    let err = deployer(prices().await, &runner, &dir)
        .deploy_tokens(Token::Eth, dec!(0.1))
        .await
        .unwrap_err();

    match err {
        DeployError::Invoke { leg, deployed, .. } => {
            assert_eq!(leg, Direction::Low);
            assert_eq!(deployed.len(), 1);
            assert!(deployed[0].starts_with("ETH_3300.0_H_"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn test_default_deployment_covers_every_token() {
    let dir = temp_info_dir();
    let runner = RecordingRunner::new(&dir, "fuji");
    let jobs = JobRunner::new(
        deployer(prices().await, &runner, &dir),
        LotteryController::new(Arc::new(runner.clone())),
        Arc::new(NotifierSet::new()),
        "MockUSD",
    );

    let job = JobKind::DeployDefault {
        percentage: dec!(0.2),
        stablecoin: None,
    };
    let summary = jobs.execute(&job).await.unwrap();
    assert_eq!(summary.lines().count(), 3);
    assert_eq!(runner.calls().len(), 18);

    let avax = jobs.recorded_pair(Token::Avax).await.unwrap();
    assert!(avax.call.to_string().starts_with("AVAX_21.92_H_"));
    assert!(avax.put.to_string().starts_with("AVAX_14.62_L_"));
    std::fs::remove_dir_all(dir).unwrap();
}

#[tokio::test]
async fn test_lottery_cycle_through_jobs() {
    let dir = temp_info_dir();
    let runner = RecordingRunner::new(&dir, "fuji");
    let jobs = JobRunner::new(
        deployer(prices().await, &runner, &dir),
        LotteryController::new(Arc::new(runner.clone())),
        Arc::new(NotifierSet::new()),
        "MockUSD",
    );

    for job in [
        JobKind::LotterySettle,
        JobKind::LotteryClose,
        JobKind::LotteryDraw,
        JobKind::LotteryStart,
    ] {
        assert!(jobs.run_and_notify(&job).await);
    }
    assert_eq!(
        runner.tasks(),
        vec![
            "settlePurchaseIncentive",
            "closeLotteryRound",
            "drawLotteryRound",
            "startLotteryRound"
        ]
    );
    std::fs::remove_dir_all(dir).unwrap();
}
