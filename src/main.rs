use clap::Parser;
use invite_scan::utils::error::{ErrorSeverity, InviteError};
use invite_scan::utils::logger;
use invite_scan::{CliConfig, FileConfig, InviteEngine, ScanOrchestrator};

const EXIT_PARSE: i32 = 1;
const EXIT_VALIDATION: i32 = 2;
const EXIT_SOURCE: i32 = 3;
const EXIT_ENCODING: i32 = 4;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 載入 TOML 配置 (可選)
    let file_config = match &cli.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("❌ Failed to load config file '{}': {}", path.display(), e);
                eprintln!("💡 Make sure the file exists and is valid TOML format");
                std::process::exit(EXIT_PARSE);
            }
        },
        None => None,
    };

    // 初始化日誌
    let quiet = cli.silent
        || file_config
            .as_ref()
            .and_then(|f| f.output.silent)
            .unwrap_or(false);
    if cli.log_json {
        logger::init_json_logger(cli.verbose, quiet);
    } else {
        logger::init_cli_logger(cli.verbose, quiet);
    }
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 合併並驗證配置
    let settings = match cli.resolve(file_config.as_ref()) {
        Ok(settings) => settings,
        Err(e) => fail("Configuration validation failed", &e, EXIT_VALIDATION),
    };

    if cli.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }
    if !settings.silent {
        eprintln!("Calculating customers within given distance from the base coordinates....");
    }

    let engine =
        InviteEngine::new_with_monitoring(ScanOrchestrator::with_default_transports(), cli.monitor);

    let report = match engine.scan(&settings.scan).await {
        Ok(report) => report,
        Err(e) => fail("Scan could not start", &e, EXIT_SOURCE),
    };

    if report.has_errors() {
        if settings.silent {
            eprintln!(
                "Processing errors occurred in evaluation, please run without silent option for details"
            );
        } else {
            eprintln!("Processing errors:");
            for err in &report.errors {
                eprintln!("{}", err);
            }
        }
    }

    match engine.render(&report, settings.output_format) {
        Ok(data) => {
            tracing::info!(
                "📊 {} customers invited",
                report.buckets.invited().len()
            );
            let output = String::from_utf8_lossy(&data);
            if output.ends_with('\n') {
                print!("{}", output);
            } else {
                println!("{}", output);
            }
        }
        Err(e) => fail("Unable to encode the result", &e, EXIT_ENCODING),
    }

    Ok(())
}

fn fail(context: &str, e: &InviteError, exit_code: i32) -> ! {
    tracing::error!(
        "❌ {}: {} (Severity: {:?})",
        context,
        e,
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    if e.severity() >= ErrorSeverity::High {
        eprintln!("💡 建議: {}", e.recovery_suggestion());
    }
    std::process::exit(exit_code);
}
