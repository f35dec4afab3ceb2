use anyhow::Context;
use pinwheel::app::{self, Wheel};
use pinwheel::config;
use pinwheel::presenter::HeadlessPresenter;
use pinwheel::spin::RandSource;
use pinwheel::storage::DirStore;
use pinwheel::sys::runtime;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    if let Err(e) = config::write_default_config() {
        log::warn!("Could not write default settings: {}", e);
    }
    let settings = config::load_or_default();

    let data_dir = settings.data_dir()?;
    let store = DirStore::open(&data_dir)
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;
    log::info!("Storing wheel state in {}", store.root().display());

    let (tx, rx) = async_channel::bounded(32);
    let (events_tx, events_rx) = async_channel::unbounded();

    // Start Background Services
    runtime::start_background_services(tx.clone(), settings.socket_path());

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create Tokio runtime")?;

    rt.block_on(async move {
        let presenter = HeadlessPresenter::new(tx.clone());
        let wheel = Wheel::new(
            Arc::new(store),
            &settings,
            Box::new(RandSource::default()),
            tx,
            events_tx,
        )
        .with_probe(Arc::new(presenter.clone()));

        tokio::spawn(presenter.run(events_rx));
        app::run(wheel, rx).await;
    });

    Ok(())
}
