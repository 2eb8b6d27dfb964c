use duetscreen::runner::{self, ReachabilityProbe};
use duetscreen::{
    init_logging, Config, ConnectivityDispatcher, ConnectivityEvent, ExtendedRefresh, Poller,
    SharedSnapshot, TickOutcome, UiLock, BUILD_DATE, VERSION,
};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::time::MissedTickBehavior;

const PROBE_INTERVAL: Duration = Duration::from_secs(2);
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    init_logging()?;
    tracing::info!("DuetScreen {} (built {})", VERSION, BUILD_DATE);

    let path = match std::env::args_os().nth(1) {
        Some(arg) => PathBuf::from(arg),
        None => Config::default_path()?,
    };
    let config = runner::load_config(&path)?;

    // The blocking HTTP client must be created outside the async runtime.
    let poller = Arc::new(Mutex::new(runner::build_poller(&config)?));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("duetscreen")
        .build()?;
    runtime.block_on(run(config, poller.clone()));
    runtime.shutdown_timeout(Duration::from_secs(1));

    drop(poller);
    Ok(())
}

async fn run(config: Config, poller: Arc<Mutex<Poller>>) {
    let connectivity = ConnectivityDispatcher::default();
    let (snapshot, refresh) = {
        let mut guard = poller.lock();
        guard.attach_events(connectivity.subscribe());
        (guard.snapshot(), guard.extended_refresh())
    };
    let ui = UiLock::new();
    let polling = &config.polling;

    let tasks = vec![
        tokio::spawn(poll_loop(poller.clone(), polling.tick_interval())),
        tokio::spawn(refresh_loop(refresh, polling.extended_refresh())),
        tokio::spawn(connectivity_loop(
            connectivity,
            config.controller.address.clone(),
        )),
        tokio::spawn(display_loop(
            poller.clone(),
            snapshot,
            ui.clone(),
            polling.display_interval(),
        )),
        tokio::spawn(command_loop(poller.clone())),
    ];

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutting down"),
        Err(e) => tracing::error!("cannot listen for ctrl-c: {}", e),
    }
    for task in tasks {
        task.abort();
    }
}

async fn poll_loop(poller: Arc<Mutex<Poller>>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let poller = poller.clone();
        match tokio::task::spawn_blocking(move || poller.lock().tick()).await {
            Ok(TickOutcome::Failed(e)) => tracing::debug!("tick failed: {}", e),
            Ok(_) => {}
            Err(e) => tracing::error!("poll task panicked: {}", e),
        }
    }
}

async fn refresh_loop(refresh: ExtendedRefresh, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately and the poller fetches extended
    // status on its own at startup.
    interval.tick().await;
    loop {
        interval.tick().await;
        refresh.request();
    }
}

async fn connectivity_loop(connectivity: ConnectivityDispatcher, address: String) {
    if address.trim().is_empty() {
        connectivity.publish(ConnectivityEvent::AssociationFailed);
        return;
    }

    let mut probe = ReachabilityProbe::new(address);
    let mut interval = tokio::time::interval(PROBE_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let target = probe.address().to_string();
        let reachable =
            tokio::task::spawn_blocking(move || runner::is_reachable(&target, PROBE_TIMEOUT))
                .await
                .unwrap_or(false);
        for event in probe.observe(reachable) {
            tracing::info!("{}", event);
            connectivity.publish(event);
        }
    }
}

async fn display_loop(
    poller: Arc<Mutex<Poller>>,
    snapshot: SharedSnapshot,
    ui: UiLock,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        // A poll in progress holds the poller; skip this refresh.
        let link = match poller.try_lock() {
            Some(guard) => guard.link(),
            None => continue,
        };
        ui.with(|| {
            let line = runner::status_line(&snapshot.read(), link);
            println!("{}", line);
        });
    }
}

/// G-code typed on stdin goes to the controller
async fn command_loop(poller: Arc<Mutex<Poller>>) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("stdin closed: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let poller = poller.clone();
        match tokio::task::spawn_blocking(move || poller.lock().submit_command(&line)).await {
            Ok(Ok(outcome)) => tracing::debug!("command {:?}", outcome),
            Ok(Err(e)) => tracing::warn!("command failed: {}", e),
            Err(e) => tracing::error!("command task panicked: {}", e),
        }
    }
}
