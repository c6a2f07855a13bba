use anyhow::Context;
use clap::Parser;
use review_baseline::core::ConfigProvider;
use review_baseline::utils::error::ErrorSeverity;
use review_baseline::utils::{logger, validation::Validate};
use review_baseline::{BaselinePipeline, FlowEngine, LocalStorage, TomlConfig};

#[derive(Parser)]
#[command(name = "review-flow")]
#[command(about = "Baseline review flow driven by a TOML definition")]
struct Args {
    /// Path to TOML flow definition
    #[arg(short, long, default_value = "baseline-flow.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the validation split size from config
    #[arg(long = "split-sz")]
    split_sz: Option<f64>,

    /// Show what would be run without fitting anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logger::init_cli_logger(args.verbose);

    tracing::info!("🚀 Starting TOML-based review flow");
    tracing::info!("📁 Loading flow definition from: {}", args.config);

    let mut config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load flow definition '{}'", args.config))?;

    // 命令列覆蓋設定
    if let Some(split_sz) = args.split_sz {
        config.override_split_size(split_sz);
        tracing::info!("🔧 Split size overridden to: {}", split_sz);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Flow definition loaded and validated");

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No model will be fitted");
        perform_dry_run(&config);
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = BaselinePipeline::new(storage, config);
    let engine = FlowEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Review flow completed");
            println!("📁 Report saved to: {}", output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ Review flow failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };

            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Flow Summary:");
    println!("  Flow: {} v{}", config.flow.name, config.flow.version);
    if let Some(description) = &config.flow.description {
        println!("  Description: {}", description);
    }
    println!("  Source: {}", config.data_source().describe());
    println!("  Output: {}", config.output_path());
    println!(
        "  Split: {} validation, seed {}",
        config.split_size(),
        config.seed()
    );

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn perform_dry_run(config: &TomlConfig) {
    let features = config.feature_settings();
    let model = config.model_settings();
    let report = config.report_settings();

    println!("🔍 Dry Run Analysis:");
    println!();

    println!("🏷️ Labelling:");
    println!(
        "  {} = 1 when {} > {}",
        features.outcome_column, features.rating_column, features.label_threshold
    );
    println!("  Rows without '{}' are dropped", features.text_column);

    println!();
    println!("🧮 Features:");
    println!("  Numeric: {}", features.numeric_columns.join(", "));
    println!(
        "  One-hot: {} (drop first: {})",
        features.one_hot_columns.join(", "),
        features.drop_first
    );

    println!();
    println!("⚙️ Model:");
    println!(
        "  Logistic regression, C = {}, class weight = {:?}, max_iter = {}",
        model.c, model.class_weight, model.max_iter
    );

    println!();
    println!("💾 Report:");
    println!("  Title: {}", report.title);
    println!("  Rows per table: {}", report.max_table_rows);
    if report.bundle {
        println!("  Bundle: {} (ZIP)", report.bundle_filename);
    } else {
        println!("  Loose files in {}", config.output_path());
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
