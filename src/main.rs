use clap::Parser;
use czone_hhi::app::pipelines::{
    ANALYSIS_CSV, COMPLETE_CSV, CZONE_CSV, FIPS_CSV, HERFINDAHL_CSV, PARSED_CSV,
};
use czone_hhi::core::responses::{ERROR_LOG, RESPONSES_JSON};
use czone_hhi::core::Pipeline;
use czone_hhi::utils::error::ErrorSeverity;
use czone_hhi::utils::{logger, validation::Validate};
use czone_hhi::{Cli, EtlEngine, EtlError, GeocodePipeline, LocalStorage, Mode, TomlConfig, ZipPipeline};
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 載入 TOML 配置
    let mut config = match TomlConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if cli.json_logs || config.json_logs() {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting czone-hhi");
    tracing::info!("📁 Loaded configuration from: {}", cli.config);

    cli.apply_overrides(&mut config);

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &cli);

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config);
        return Ok(());
    }

    let monitor_enabled = cli.monitor_enabled(&config);
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output_path().to_string());
    let exit_code = match config.mode() {
        Mode::Geocode => match GeocodePipeline::new(storage, config) {
            Ok(pipeline) => run(pipeline, monitor_enabled).await,
            Err(e) => report_failure(&e),
        },
        Mode::Zip => run(ZipPipeline::new(storage, config), monitor_enabled).await,
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

async fn run<P: Pipeline>(pipeline: P, monitor_enabled: bool) -> i32 {
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Pipeline completed successfully!");
            tracing::info!("📁 Output saved to: {}", output_path);
            println!("✅ Pipeline completed successfully!");
            println!("📁 Output saved to: {}", output_path);
            0
        }
        Err(e) => report_failure(&e),
    }
}

fn report_failure(e: &EtlError) -> i32 {
    tracing::error!(
        "❌ Pipeline failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}

fn display_config_summary(config: &TomlConfig, cli: &Cli) {
    println!("📋 Configuration Summary:");
    println!("  Pipeline: {}", config.pipeline.name);
    println!("  Mode: {:?}", config.mode());
    match (&config.source.parsed_csv, &config.source.text_path) {
        (Some(parsed), _) => println!("  Source: {} (pre-parsed)", parsed),
        (None, Some(text)) => println!("  Source: {}", text),
        (None, None) => {}
    }
    println!("  Crosswalk: {}", config.crosswalk.path);
    println!("  Output: {}", config.output_path());
    if config.mode() == Mode::Geocode {
        println!("  Geocoder: {}", config.geocoder.endpoint);
        println!("  Geocoding Workers: {}", config.geocoder.workers());
    }

    if cli.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

fn describe_input(label: &str, path: &str) {
    let state = if Path::new(path).exists() { "found" } else { "MISSING" };
    println!("  {}: {} ({})", label, path, state);
}

fn perform_dry_run(config: &TomlConfig) {
    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📥 Inputs:");
    if let Some(text) = &config.source.text_path {
        describe_input("Fixed-width extract", text);
    }
    if let Some(parsed) = &config.source.parsed_csv {
        describe_input("Pre-parsed table", parsed);
    }
    describe_input("Crosswalk", &config.crosswalk.path);
    println!(
        "  Crosswalk columns: {} -> {}",
        config.crosswalk.fips_column(),
        config.crosswalk.czone_column()
    );
    if let Some(reference) = &config.zip_reference {
        describe_input("ZIP reference", &reference.path);
    }
    println!("  Parse workers: {}", config.parse_workers());

    println!();
    println!("⚙️ Placement:");
    match config.mode() {
        Mode::Geocode => {
            let policy = config.geocoder.retry_policy();
            println!("  🌐 Street addresses via {}", config.geocoder.endpoint);
            println!(
                "  Benchmark/vintage: {}/{}",
                config.geocoder.benchmark, config.geocoder.vintage
            );
            println!("  Workers: {}", config.geocoder.workers());
            println!(
                "  Retry: {} attempts, {:?} delay ({:?}), {:?} timeout",
                policy.max_attempts, policy.delay, policy.backoff, policy.timeout
            );
            println!("  Worst case per address: {:?}", policy.worst_case());
        }
        Mode::Zip => println!("  📮 ZIP codes via the reference table (no network access)"),
    }

    println!();
    println!("💾 Outputs in {}:", config.output_path());
    let mut outputs = vec![PARSED_CSV];
    if config.mode() == Mode::Geocode {
        outputs.extend([RESPONSES_JSON, FIPS_CSV]);
    }
    outputs.extend([CZONE_CSV, ANALYSIS_CSV, COMPLETE_CSV, HERFINDAHL_CSV]);
    println!("  {}", outputs.join(", "));
    if let Some(archive) = &config.load.archive {
        println!("  Archive: {}", archive);
    }
    println!("  Error log: {}", ERROR_LOG);

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
