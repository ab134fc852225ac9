use anyhow::Result;
use tokio::sync::watch;

use dailypress::api::{ApiServer, AppState};
use dailypress::scheduler::{Daemon, Jobs};

use super::Runtime;

/// Resolves once the shared shutdown flag flips
async fn wait_for(mut rx: watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow_and_update();
        if stop || rx.changed().await.is_err() {
            return;
        }
    }
}

fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl-C received, shutting down"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl-C"),
        }
        let _ = tx.send(true);
    });
    rx
}

/// Run the trigger loop, optionally with the operational API alongside
pub async fn daemon(rt: Runtime, with_api: bool) -> Result<()> {
    let jobs = Jobs::new(&rt.config.scheduler, rt.orchestrator.clone(), rt.planner.clone())?;
    let daemon = Daemon::new(&rt.config.scheduler, jobs);

    println!("dailypress daemon");
    println!("=================");
    println!("Sites: {}", rt.config.site_order().join(", "));
    println!(
        "Nightly {} / recovery +{}h / weekly {} {}",
        rt.config.scheduler.nightly_time,
        rt.config.scheduler.recovery_offset_hours,
        rt.config.scheduler.weekly_day,
        rt.config.scheduler.weekly_time
    );

    if !with_api {
        daemon.run().await?;
        return Ok(());
    }

    let shutdown = shutdown_channel();
    let scheduler = {
        let shutdown = shutdown.clone();
        async move {
            daemon.run_until(wait_for(shutdown)).await?;
            Ok::<_, anyhow::Error>(())
        }
    };

    let server = ApiServer::new(
        &rt.config.server.bind,
        AppState::new(rt.orchestrator.clone(), rt.clock.clone()),
    )?;
    println!("API: http://{}", server.addr());
    let api = async move {
        server.serve_with_shutdown(wait_for(shutdown)).await?;
        Ok::<_, anyhow::Error>(())
    };

    futures::future::try_join(scheduler, api).await?;
    Ok(())
}

/// Operational API only, no triggers
pub async fn serve(rt: Runtime) -> Result<()> {
    let server = ApiServer::new(
        &rt.config.server.bind,
        AppState::new(rt.orchestrator.clone(), rt.clock.clone()),
    )?;
    println!("dailypress API listening on http://{}", server.addr());

    server.serve_with_shutdown(wait_for(shutdown_channel())).await?;
    Ok(())
}
