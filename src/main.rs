//! HRO Linker
//!
//! Provisions bridge roles on every remote chain, then moves one token from
//! the configured source chain to the destination and waits for the relay to
//! deliver it. Chains must already be deployed and recorded in the registry
//! file.

use eyre::{eyre, Result};
use tracing::{info, warn};

use hro_linker::config::Config;
use hro_linker::evm::{connect_all, SigningIdentity};
use hro_linker::{
    check_linker_wiring, ChainRegistry, FixedGasPrice, PermissionProvisioner, TransferOrchestrator,
};

fn main() -> Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    init_logging();

    info!("Starting HRO linker");

    let config = Config::load()?;
    info!(
        chains_file = %config.chains_file.display(),
        canonical = %config.canonical_chain,
        private_key = %config.private_key,
        "Configuration loaded"
    );

    tokio::select! {
        result = run(&config) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received Ctrl+C, stopping; submitted transactions are not rolled back");
            Ok(())
        }
    }
}

async fn run(config: &Config) -> Result<()> {
    let registry = ChainRegistry::from_file(&config.chains_file, &config.canonical_chain)?;
    let identity = SigningIdentity::from_private_key(config.private_key.expose())?;
    let connections = connect_all(&registry, &identity)?;

    for chain in registry.chains() {
        let handles = connections.get(&chain.name)?;
        let report = check_linker_wiring(chain, handles.linker.as_ref()).await?;
        if !report.is_consistent() {
            return Err(eyre!(
                "Linker on {} does not match the registry: {:?}",
                chain.name,
                report.mismatches
            ));
        }
    }

    let reports = PermissionProvisioner::new(&registry, &connections, identity.queue())
        .with_config(config.provision_config())
        .provision_all()
        .await?;
    for report in &reports {
        info!(
            chain = %report.chain,
            linker = %report.linker,
            status = ?report.status,
            "Provisioned"
        );
    }

    let estimator = FixedGasPrice(config.gas_price_wei);
    let orchestrator =
        TransferOrchestrator::new(&registry, &connections, &estimator, identity.queue())
            .with_config(config.transfer_config());

    let request = &config.transfer;
    let recipient = request.recipient.unwrap_or(identity.address());
    let receipt = orchestrator
        .transfer(
            &request.source_chain,
            &request.destination_chain,
            request.token_id,
            identity.address(),
            recipient,
        )
        .await?;

    info!(
        tx = %receipt.send_tx,
        fee = %receipt.fee,
        "Transfer submitted, waiting for relay"
    );

    let settlement = orchestrator
        .await_settlement(
            &receipt.intent,
            config.poll_interval(),
            config.max_poll_attempts,
        )
        .await;

    info!(
        status = %settlement.report.status,
        attempts = settlement.outcome.attempts(),
        waited_ms = settlement.outcome.waited().as_millis() as u64,
        source_owner = %settlement.report.snapshot.source,
        destination_owner = %settlement.report.snapshot.destination,
        "Done"
    );
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,hro_linker=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}
