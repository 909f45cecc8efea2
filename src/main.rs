use clap::Parser;
use csv_enrich::core::Storage;
use csv_enrich::utils::error::{AppError, ErrorSeverity};
use csv_enrich::utils::{logger, validation::Validate};
use csv_enrich::{
    ClientSettings, CliConfig, HttpExtractionClient, LocalStorage, Session, SubmitOutcome,
    TomlConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting csv-enrich");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    let file_config = match &config.config {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            match TomlConfig::from_file(path) {
                Ok(file_config) => Some(file_config),
                Err(e) => exit_with(AppError::from(e)),
            }
        }
        None => None,
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        exit_with(AppError::from(e));
    }
    let settings = config.resolve(file_config.as_ref());
    if let Err(e) = settings.validate() {
        exit_with(AppError::from(e));
    }

    match run(&config, &settings).await {
        Ok(()) => Ok(()),
        Err(e) => exit_with(e),
    }
}

async fn run(config: &CliConfig, settings: &ClientSettings) -> csv_enrich::Result<()> {
    let storage = LocalStorage::new(".".to_string());
    let mut session = Session::from_config(settings);

    let raw = storage.read_file(&config.input).await?;
    session.load_bytes(&raw)?;

    if let Some(dataset) = session.dataset() {
        println!(
            "📄 {} rows, columns: {}",
            dataset.len(),
            dataset.schema().columns().join(", ")
        );
    }

    if let Some(column) = &config.column {
        session.select_column(column)?;
    }
    if let Some(template) = &config.template {
        session.set_template(template);
    }

    let prepared = session.prepare()?;
    if prepared.batch.truncated {
        println!(
            "⚠️  Only the first {} of {} rows will be submitted",
            prepared.batch.selected.len(),
            prepared.batch.total
        );
    }

    if config.dry_run {
        tracing::info!("🔍 DRY RUN MODE - the service will not be called");
        for query in &prepared.batch.selected {
            println!("[{}] {}", query.index, query.text);
        }
        return Ok(());
    }

    let client = HttpExtractionClient::from_config(settings)?;
    match session.submit(&client).await? {
        SubmitOutcome::Applied { count } => {
            tracing::info!("✅ Received {} results", count);
        }
        SubmitOutcome::Discarded => {
            tracing::warn!("Response arrived for a replaced dataset and was discarded");
        }
    }

    let csv = session.export()?;
    storage.write_file(&config.output, csv.as_bytes()).await?;

    println!("✅ {} results written to {}", session.results().len(), config.output);
    Ok(())
}

fn exit_with(e: AppError) -> ! {
    // 記錄詳細錯誤信息
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    // 輸出用戶友好的錯誤信息
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 {}", e.recovery_suggestion());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 4,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
