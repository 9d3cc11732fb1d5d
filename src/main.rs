use clap::Parser;

use dent_slot_harvester::browser::BrowserPool;
use dent_slot_harvester::config::{config_dir_from_env, ConfigLoader};
use dent_slot_harvester::store::{credential_store_from_env, object_store_from_env, YamlRuleStore};
use dent_slot_harvester::task_manager::TaskManager;
use dent_slot_harvester::{logger, output_writer, run_full_check, SystemFilter};

/// Runs one tomorrow's-schedule availability check across every
/// configured clinic, the same entry point `main.py`'s `--system` /
/// `--no-headless` / `--format` flags drive.
#[derive(Parser, Debug)]
#[command(name = "dent_slot_harvester", about = "Dental appointment-availability harvester")]
struct Cli {
    /// Restrict the run to one back-end: "legacy" or "spa". Omit for both.
    #[arg(long)]
    system: Option<String>,

    /// Run Chromium with a visible window instead of headless.
    #[arg(long, default_value_t = false)]
    no_headless: bool,

    /// Output formats to write, comma-separated (`json`, `csv`).
    #[arg(long, default_value = "json,csv")]
    format: String,

    /// Directory holding `clinics.yaml` / `staff_rules.yaml`.
    #[arg(long)]
    config_dir: Option<String>,

    /// Directory run artifacts and task state are written to.
    #[arg(long, default_value = "output")]
    output_dir: String,
}

#[tokio::main]
async fn main() {
    logger::init();
    let cli = Cli::parse();

    let config_dir = cli.config_dir.map(std::path::PathBuf::from).unwrap_or_else(|| config_dir_from_env("config"));
    let output_dir = std::path::PathBuf::from(&cli.output_dir);

    let credential_store = credential_store_from_env(&config_dir);
    let rule_store = YamlRuleStore { staff_rules_path: config_dir.join("staff_rules.yaml") };
    let object_store = object_store_from_env();

    let engine_config = match ConfigLoader::new(&config_dir).load(credential_store.as_ref(), &rule_store) {
        Ok(config) => config,
        Err(e) => {
            log::error!("failed to load configuration from {}: {e}", config_dir.display());
            std::process::exit(1);
        }
    };

    let pool = BrowserPool::init(!cli.no_headless);
    log::info!("browser pool starting (headless={})", !cli.no_headless);

    let task_manager = match TaskManager::new(&output_dir, Some(object_store.clone())) {
        Ok(manager) => manager,
        Err(e) => {
            log::error!("failed to initialize task manager: {e}");
            std::process::exit(1);
        }
    };

    let task_id = chrono::Utc::now().format("%Y%m%d%H%M%S").to_string();
    if let Err(e) = task_manager.create_task(task_id.clone(), chrono::Utc::now()).await {
        log::error!("could not start run: {e}");
        std::process::exit(1);
    }

    let formats: Vec<String> = cli.format.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    let system = SystemFilter::from_str_opt(cli.system.as_deref());

    match run_full_check(&task_id, &task_manager, &engine_config, pool, Some(object_store.as_ref()), &output_dir, &formats, system).await {
        Ok(artifact) => {
            println!("{}", output_writer::format_summary(&artifact));
        }
        Err(e) => {
            log::error!("run {task_id} failed: {e}");
            std::process::exit(1);
        }
    }
}
