//! # Example: Persistent unit on an aggressive vendor
//!
//! Runs the supervisor against the in-memory platform posing as a Xiaomi device,
//! then plays the OS: kills the unit, refuses restarts and finally fires the wake
//! trigger. Periods are shortened so the whole story takes a few seconds.
//!
//! ```text
//! RUST_LOG=keepvisor=debug cargo run --example persistent
//! ```

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use keepvisor::platform::{DeviceInfo, memory::MemoryPlatform};
use keepvisor::{
    CommandSurface, Config, FileStore, LifecycleState, LogWriter, Signal, StateStore, Subscribe,
    Supervisor,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keepvisor=info")),
        )
        .init();

    let cfg = Config {
        heartbeat_period: Duration::from_secs(2),
        indicator_period: Duration::from_millis(500),
        restart_grace: Duration::from_millis(200),
        ..Config::default()
    };

    let state_path = std::env::temp_dir().join("keepvisor-demo").join("state.json");
    let store: Arc<dyn StateStore> = Arc::new(FileStore::new(&state_path));
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let mem = MemoryPlatform::new(DeviceInfo::new("Xiaomi", "com.example.keepvisor"));
    let sup = Supervisor::builder(cfg, mem.platform())
        .with_store(store.clone())
        .with_subscribers(subs)
        .build();
    mem.attach(sup.inbox());
    println!("vendor policy: {:?}", sup.policy());

    let token = CancellationToken::new();
    let server = {
        let sup = Arc::clone(&sup);
        let token = token.clone();
        tokio::spawn(async move { sup.run_until(token).await })
    };

    let commands = CommandSurface::new(Arc::clone(&sup));
    commands.schedule_task(5, true).await?;
    tokio::time::sleep(Duration::from_secs(3)).await;

    println!("-- the vendor killer strikes, restarts refused --");
    mem.kill_unit();
    mem.reject_next_starts(5);
    sup.inbox().post(Signal::Teardown);
    tokio::time::sleep(Duration::from_secs(10)).await;
    println!("state after kill: {:?}", sup.state().await);

    println!("-- wake trigger fires --");
    mem.fire_alarm();
    tokio::time::sleep(Duration::from_secs(1)).await;
    println!(
        "state after wake: {:?}, persisted persistent={}",
        sup.state().await,
        store.load_persistent().await?
    );
    assert_eq!(sup.state().await, LifecycleState::Running);

    commands.cancel_task().await?;
    println!("state after cancel: {:?}", sup.state().await);

    token.cancel();
    server.await??;
    Ok(())
}
