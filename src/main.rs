use clap::Parser;
use poly_updown::cli::{Cli, Commands};
use poly_updown::config::Config;
use poly_updown::persist::{FileSnapshotStore, SnapshotStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Configuration problems fail fast; risk parameters are never defaulted
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run(args) => {
            poly_updown::telemetry::init_telemetry(&config.telemetry)?;
            args.execute(config).await?;
        }
        Commands::Status => {
            let store = FileSnapshotStore::new(&config.persistence.snapshot_path);
            match store.load().await? {
                Some(snapshot) => {
                    println!("poly-updown status (from last snapshot)");
                    println!("  Written:   {}", snapshot.timestamp);
                    println!("  State:     {}", snapshot.engine_state);
                    println!("  Orders:    {}", snapshot.orders.len());
                    println!("  Positions: {}", snapshot.positions.len());
                    println!("  Exposure:  {}", snapshot.risk_status.exposure);
                    println!("  Net P&L:   {}", snapshot.session_stats.net_pnl);
                    println!(
                        "  Trading:   {}",
                        if snapshot.risk_status.trading_allowed {
                            "allowed"
                        } else {
                            "halted"
                        }
                    );
                }
                None => println!("No snapshot found at {:?}", config.persistence.snapshot_path),
            }
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Assets:    {:?}", config.engine.assets);
            println!("  Mode:      {:?}", config.execution.mode);
            println!("  Strategy:  {}", config.strategy.name);
            println!(
                "  Risk:      trade<={} window<={} exposure<={}",
                config.risk.max_trade_size, config.risk.max_window_size, config.risk.max_exposure
            );
            println!(
                "  Losses:    hourly<={} daily<={}",
                config.risk.max_hourly_loss, config.risk.max_daily_loss
            );
            println!("  Snapshot:  {:?}", config.persistence.snapshot_path);
        }
    }

    Ok(())
}
