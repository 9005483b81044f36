use super::{MockGnb, MockNetwork};
use amf::Amf;
use amf::consumers::Consumers;
use amf::data::TimerConfig;
use anyhow::{Result, bail};
use slog::{Drain, Logger, o};
use std::sync::Arc;
use std::time::Duration;

pub fn init() -> Result<(Amf, MockGnb, Arc<MockNetwork>, Logger)> {
    init_with(|_| {})
}

/// Like `init()`, but lets the test change the loaded config first.
pub fn init_with(
    adjust: impl FnOnce(&mut amf::Config),
) -> Result<(Amf, MockGnb, Arc<MockNetwork>, Logger)> {
    exit_on_panic();
    let logger = init_logging();
    let mut config = amf::load_config_file("test_config.toml", &logger)?;
    adjust(&mut config);
    let network = Arc::new(MockNetwork::new());
    let gnb = MockGnb::new(config.supported_tai_list[0], &logger);
    let amf = start_amf(config, &network, &gnb, &logger)?;
    Ok((amf, gnb, network, logger))
}

fn exit_on_panic() {
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        std::process::exit(1);
    }));
}

fn init_logging() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator).build();
    let drain = std::sync::Mutex::new(drain).fuse();
    let drain = slog_envlogger::new(drain);
    slog::Logger::root(drain, o!())
}

fn start_amf(
    config: amf::Config,
    network: &Arc<MockNetwork>,
    gnb: &MockGnb,
    logger: &Logger,
) -> Result<Amf> {
    Amf::start(
        config,
        Consumers {
            ausf: network.clone(),
            udm: network.clone(),
            pcf: network.clone(),
            nssf: network.clone(),
            smf: network.clone(),
            ngap: Arc::new(gnb.clone()),
        },
        logger.new(o!("amf" => 1)),
    )
}

/// A timer that expires quickly, for tests of retransmission.
pub fn short_timer() -> TimerConfig {
    TimerConfig {
        enable: true,
        expire_time_ms: 50,
        max_retry_times: 2,
    }
}

/// UE tasks work through their messages in the background, so poll for the outcome.
pub async fn eventually(mut condition: impl FnMut() -> bool, what: &str) -> Result<()> {
    for _ in 0..100 {
        if condition() {
            return Ok(());
        }
        async_std::task::sleep(Duration::from_millis(10)).await;
    }
    bail!("Timed out waiting for {what}")
}

pub async fn wait_for_ue_count(amf: &Amf, expected: usize) -> Result<()> {
    eventually(
        || amf.ue_count() == expected,
        &format!("{expected} UE contexts (have {})", amf.ue_count()),
    )
    .await
}
