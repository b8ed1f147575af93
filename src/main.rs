use air_supply::config::cli::{Command, LookupArgs, RefreshArgs, ServeArgs};
use air_supply::config::StorageBackend;
use air_supply::utils::error::{ErrorSeverity, Result, ServiceError};
use air_supply::utils::logger;
use air_supply::utils::validation::Validate;
use air_supply::{app, AppConfig, AppState, CliConfig, CodeTable, TariffRequest};
use clap::Parser;
use std::net::{IpAddr, SocketAddr};

#[tokio::main]
async fn main() {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting air-supply {}", env!("CARGO_PKG_VERSION"));
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    if let Err(e) = run(cli).await {
        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ Command failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
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

async fn run(cli: CliConfig) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;
    config.validate()?;

    if config.database.backend == StorageBackend::Memory {
        tracing::warn!("Using the in-memory backend; code tables are lost on exit");
    }

    match cli.command {
        Command::Serve(args) => serve(config, args).await,
        Command::Refresh(args) => refresh(&config, args).await,
        Command::Drop { table } => drop_table(&config, table).await,
        Command::Lookup(args) => lookup(&config, args).await,
    }
}

async fn serve(mut config: AppConfig, args: ServeArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let ip: IpAddr = config
        .server
        .host
        .parse()
        .map_err(|e: std::net::AddrParseError| ServiceError::InvalidConfigValueError {
            field: "server.host".to_string(),
            value: config.server.host.clone(),
            reason: e.to_string(),
        })?;
    let addr = SocketAddr::new(ip, config.server.port);

    air_supply::serve(AppState::new(config), addr).await
}

async fn refresh(config: &AppConfig, args: RefreshArgs) -> Result<()> {
    let input = args.input(config)?;
    let service = app::build_tariff_service(config)?;

    let result = service.refresh(args.table, input).await;
    service.close().await;
    let rows = result?;

    tracing::info!("✅ Refreshed {} ({} rows)", args.table, rows);
    println!("✅ Refreshed {} ({} rows)", args.table, rows);
    Ok(())
}

async fn drop_table(config: &AppConfig, table: CodeTable) -> Result<()> {
    let service = app::build_tariff_service(config)?;
    let result = service.drop_table(table).await;
    service.close().await;
    result?;

    println!("🗑  Dropped {}", table);
    Ok(())
}

async fn lookup(config: &AppConfig, args: LookupArgs) -> Result<()> {
    let request = TariffRequest {
        product: args.product,
        partner: args.partner,
        reporter: args.reporter,
        year: args.year,
    };
    request.validate()?;

    let service = app::connect_tariff_service(config).await?;
    let result = service.get_tariff(&request).await;
    service.close().await;

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
