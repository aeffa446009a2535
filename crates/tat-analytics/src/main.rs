mod bootstrap;
mod render;

use anyhow::{Context, Result};
use tat_core::settings::{Settings, TatTargets};
use tat_core::time_utils::{resolve_timezone, LocalCalendar};
use tat_data::analysis::{analyze_records, AnalysisOptions, AnalysisResult};
use tat_data::statistics::{RecordBreakdown, TatAnalyzer};

fn main() -> Result<()> {
    let settings = Settings::load();
    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("TAT Analytics v{} starting", env!("CARGO_PKG_VERSION"));

    let targets_path = settings.targets_path();
    if settings.init_targets {
        if bootstrap::init_targets(&targets_path)? {
            println!("Wrote default targets to {}", targets_path.display());
        } else {
            println!("Targets file already exists: {}", targets_path.display());
        }
        return Ok(());
    }

    let tz = resolve_timezone(&settings.timezone);
    let calendar = LocalCalendar::new(tz);
    let now = settings.resolve_now()?;
    let range = settings.resolve_range(now, &calendar)?;

    let targets = TatTargets::load_from(&targets_path)
        .with_context(|| format!("loading targets from {}", targets_path.display()))?;

    let data_path = settings
        .data
        .clone()
        .or_else(bootstrap::discover_data_path)
        .context("no data path: pass --data or set TAT_DATA_PATH")?;

    tracing::info!(
        "View: {}, Timezone: {}, Data: {}",
        settings.view,
        tz.name(),
        data_path.display()
    );

    let result = analyze_records(&AnalysisOptions {
        data_path,
        timezone: tz,
        now,
        range,
        targets,
        test_name: settings.test.clone(),
    })?;

    let json = settings.format == "json";
    match settings.view.as_str() {
        "summary" => {
            if json {
                print_json(&serde_json::json!({
                    "metadata": result.metadata,
                    "statistics": result.statistics,
                }))?;
            } else {
                println!("{}", render::metadata_line(&result.metadata));
                print!("{}", render::summary_table(&result.statistics).render());
            }
        }
        "trend" => {
            if json {
                print_json(&result.trend)?;
            } else {
                print!("{}", render::trend_table(&result.trend).render());
            }
        }
        "tatx" => {
            if json {
                print_json(&result.tatx)?;
            } else {
                print!("{}", render::tatx_table(&result.tatx).render());
            }
        }
        "records" => {
            let breakdowns = record_breakdowns(&result);
            if json {
                print_json(&breakdowns)?;
            } else {
                print!("{}", render::records_table(&breakdowns).render());
            }
        }
        unknown => {
            eprintln!("Unknown view: {}", unknown);
        }
    }

    Ok(())
}

fn record_breakdowns(result: &AnalysisResult) -> Vec<RecordBreakdown> {
    result
        .records
        .iter()
        .map(TatAnalyzer::record_breakdown)
        .collect()
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
