use std::sync::Arc;

use clap::Parser;
use tracing::info;

use sdr_relay_blocker::cli::{Cli, Command, ListArgs};
use sdr_relay_blocker::elevation::{ensure_elevated, Elevation};
use sdr_relay_blocker::error::ReconcileError;
use sdr_relay_blocker::firewall::{FirewallRuleStore, SystemExecutor};
use sdr_relay_blocker::geo::Region;
use sdr_relay_blocker::output::{blocked_summary, relay_json, relay_table};
use sdr_relay_blocker::probe::{LatencyBoard, PingProber, ProbeRun};
use sdr_relay_blocker::reconcile::{apply_selection, refresh_cycle, Selection};
use sdr_relay_blocker::sdr_api::RelayTopology;
use sdr_relay_blocker::tracing_setup::{get_subscriber, init_subscriber};
use sdr_relay_blocker::utils::inspect_err;
use sdr_relay_blocker::{App, Config};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Cli::parse();

    let subscriber = get_subscriber(String::from("sdr-relay-blocker"), args.log_level.clone());
    init_subscriber(subscriber)?;

    if cfg!(windows) && args.command.needs_elevation() && !args.no_elevate {
        let exe = std::env::current_exe()?;
        let forwarded: Vec<String> = std::env::args().skip(1).collect();
        if ensure_elevated(&SystemExecutor, &exe, &forwarded).await? == Elevation::Relaunched {
            info!("Handed over to elevated process");
            return Ok(());
        }
    }

    let app = App::new(Config::from(&args))?;

    match args.command {
        Command::List(list_args) => list(&app, &list_args).await?,
        Command::Regions => {
            let list = refresh_cycle(&app).await?;
            for region in list.region_choices() {
                println!("{region}");
            }
        }
        Command::Block(block_args) => block(&app, block_args.selection()).await?,
        Command::Unblock => block(&app, Selection::Region(Region::World)).await?,
        Command::Status => {
            let blocked = app.firewall().current_blocked_ips().await;
            println!("{}", blocked_summary(&blocked));
            for ip in &blocked {
                println!("{ip}");
            }
        }
    }

    Ok(())
}

async fn list(app: &App, args: &ListArgs) -> Result<(), anyhow::Error> {
    let list = refresh_cycle(app).await?;

    let board = Arc::new(LatencyBoard::default());
    if args.no_probe {
        board.reset(list.rows.len());
    } else {
        let prober = Arc::new(PingProber::new(app.config().probe_timeout));
        ProbeRun::spawn(Arc::clone(&board), prober, list.ips())
            .wait()
            .await;
    }
    let latencies = board.snapshot();

    if args.json {
        println!("{}", relay_json(&list.rows, &latencies, args.sort)?);
    } else {
        println!("{}", relay_table(&list.rows, &latencies, args.sort));
        println!("{}", list.status());
    }
    Ok(())
}

async fn block(app: &App, selection: Selection) -> Result<(), ReconcileError> {
    // only a region filter needs to know where the relays are
    let topology = match selection {
        Selection::Region(Region::Continent(_)) => refresh_cycle(app).await?.topology,
        _ => RelayTopology::default(),
    };

    let report = apply_selection(app, &selection, &topology)
        .await
        .map_err(|err| inspect_err("Firewall error", err))?;
    println!("{report}");

    let blocked = app.firewall().current_blocked_ips().await;
    println!("{}", blocked_summary(&blocked));
    Ok(())
}
