use std::path::PathBuf;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use volume_inventory::collector::InventoryCollector;
use volume_inventory::config;
use volume_inventory::report::{JsonRenderer, ReportRenderer, TextRenderer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logging (stdout + daily file rotation under ./logs)
    std::fs::create_dir_all("logs").ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily("logs", "volume-inventory.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Keep the guards alive so the non-blocking writers flush on exit
    let _log_guards = (stdout_guard, file_guard);

    // Optional config file as the only argument
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let app_cfg = config::load_from(config_path.as_deref())?;

    let collector = InventoryCollector::with_system_probe(app_cfg.collector_options())?;
    let volumes = app_cfg.volumes();

    // Ctrl-C cancels outstanding scans; the run still returns a complete, degraded report
    let interrupt = {
        let cancel = collector.cancellation_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received. Cancelling outstanding scans...");
                cancel.cancel();
            }
        })
    };
    let report = collector.run(&volumes).await?;
    interrupt.abort();

    let text = TextRenderer::from(&app_cfg.params).render(&report)?;
    std::fs::write(&app_cfg.report.output, text)
        .with_context(|| format!("writing report to {}", app_cfg.report.output))?;
    info!("Report written to {}", app_cfg.report.output);

    if let Some(json_path) = &app_cfg.report.json_output {
        let json = JsonRenderer.render(&report)?;
        std::fs::write(json_path, json).with_context(|| format!("writing JSON report to {}", json_path))?;
        info!("JSON report written to {}", json_path);
    }

    let degraded = report.degraded_count();
    if degraded > 0 {
        warn!("{} report entries are degraded, see log for details", degraded);
    }
    Ok(())
}
