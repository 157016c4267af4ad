//! Binary entry point: load configuration, open the store, and drive the TUI
//! until the user quits.
use book_haven::db::open_store;
use book_haven::{logging, run_app, App, Catalog, Config, FsCoverStore};
use tracing::info;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    config.ensure_dirs()?;
    let _log_guard = logging::init(&config)?;

    let conn = open_store(&config.db_path(), &config.admin_password)?;
    let covers = FsCoverStore::new(config.uploads_dir());
    let catalog = Catalog::new(conn, covers);

    info!(data_dir = %config.data_dir.display(), "starting book haven");
    let mut app = App::new(catalog, config);
    let result = run_app(&mut app);
    info!("shut down");
    result
}
