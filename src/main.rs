use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use scheduler_config::{AppConfig, LogLevel, OutputFormat};
use scheduler_dispatcher::StrategyKind;
use scheduler_domain::Complexity;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use circuit_scheduler::{Application, BatchPlan, RunOptions};

const PRINTER_DRAIN: Duration = Duration::from_secs(1);

fn cli() -> Command {
    Command::new("scheduler-sim")
        .version("1.0.0")
        .about("电路仿真任务的进程调度模拟器")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径（默认查找 config/scheduler.toml 或 scheduler.toml）"),
        )
        .arg(
            Arg::new("strategy")
                .short('s')
                .long("strategy")
                .value_name("STRATEGY")
                .help("调度算法")
                .value_parser(["fcfs", "sjf", "rr", "round_robin"]),
        )
        .arg(
            Arg::new("simple")
                .long("simple")
                .value_name("N")
                .help("简单任务数量")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("medium")
                .long("medium")
                .value_name("N")
                .help("中等任务数量")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("complex")
                .long("complex")
                .value_name("N")
                .help("复杂任务数量")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("homogeneous")
                .long("homogeneous")
                .value_name("COMPLEXITY")
                .help("只生成同一复杂度的任务")
                .value_parser(["simple", "medium", "complex"])
                .requires("count")
                .conflicts_with_all(["simple", "medium", "complex"]),
        )
        .arg(
            Arg::new("count")
                .short('n')
                .long("count")
                .value_name("N")
                .help("同构批次的任务数量")
                .value_parser(clap::value_parser!(usize))
                .requires("homogeneous"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别（RUST_LOG 优先）")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty", "text"]),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FORMAT")
                .help("性能报告输出格式")
                .value_parser(["text", "json"])
                .default_value("text"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config_path = matches.get_one::<String>("config");
    let config = AppConfig::load(config_path.map(String::as_str))
        .with_context(|| match config_path {
            Some(path) => format!("加载配置文件失败: {path}"),
            None => "加载配置失败".to_string(),
        })?;

    let log_level = match matches.get_one::<String>("log-level") {
        Some(level) => level.parse::<LogLevel>().map_err(anyhow::Error::msg)?,
        None => config.logging.level,
    };
    let log_format = match matches.get_one::<String>("log-format") {
        Some(format) => format.parse::<OutputFormat>().map_err(anyhow::Error::msg)?,
        None => config.logging.format,
    };
    init_logging(log_level, log_format)?;

    let options = run_options(&matches, &config)?;
    info!("启动调度模拟器");
    if let Some(path) = config_path {
        info!("配置文件: {path}");
    }

    let json_output = matches
        .get_one::<String>("output")
        .is_some_and(|o| o == "json");

    let app = Application::new(config, options);
    let printer = (!json_output).then(|| app.forward_messages(|message| println!("> {message}")));

    let outcome = app.run(wait_for_shutdown_signal()).await;
    // 丢弃控制器后订阅通道关闭，打印任务输出剩余消息后退出
    drop(app);
    if let Some(printer) = printer {
        if tokio::time::timeout(PRINTER_DRAIN, printer).await.is_err() {
            warn!("控制器消息未能在 {:?} 内输出完毕", PRINTER_DRAIN);
        }
    }
    let outcome = outcome?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome.report).context("序列化性能报告失败")?
        );
    } else {
        if outcome.stopped {
            println!("模拟被提前停止，以下指标只包含已完成的任务");
        }
        println!("{}", outcome.report);
    }

    info!("调度模拟器已退出");
    Ok(())
}

/// 命令行参数覆盖配置中的调度算法与批次
fn run_options(matches: &ArgMatches, config: &AppConfig) -> Result<RunOptions> {
    let mut options = RunOptions::from_config(config)?;

    if let Some(strategy) = matches.get_one::<String>("strategy") {
        options.strategy = strategy.parse::<StrategyKind>()?;
    }

    if let Some(complexity) = matches.get_one::<String>("homogeneous") {
        let count = matches.get_one::<usize>("count").copied().unwrap_or(0);
        options.batch = BatchPlan::Homogeneous {
            complexity: complexity.parse::<Complexity>()?,
            count,
        };
    } else if let BatchPlan::Mixed {
        simple,
        medium,
        complex,
    } = options.batch
    {
        let count = |name: &str, default: usize| {
            matches.get_one::<usize>(name).copied().unwrap_or(default)
        };
        options.batch = BatchPlan::Mixed {
            simple: count("simple", simple),
            medium: count("medium", medium),
            complex: count("complex", complex),
        };
    }

    Ok(options)
}

/// 初始化日志系统
fn init_logging(log_level: LogLevel, log_format: OutputFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        OutputFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .context("初始化JSON日志格式失败")?,
        OutputFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .context("初始化Pretty日志格式失败")?,
        OutputFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().compact().with_ansi(false))
            .try_init()
            .context("初始化文本日志格式失败")?,
    }

    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("安装Ctrl+C信号处理器失败: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("安装SIGTERM信号处理器失败: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_batch_counts() {
        let matches = cli().get_matches_from(["scheduler-sim", "--simple", "5", "-s", "sjf"]);
        let options = run_options(&matches, &AppConfig::default()).unwrap();

        assert_eq!(options.strategy, StrategyKind::Sjf);
        assert_eq!(
            options.batch,
            BatchPlan::Mixed {
                simple: 5,
                medium: 2,
                complex: 1
            }
        );
    }

    #[test]
    fn test_cli_homogeneous_batch() {
        let matches = cli().get_matches_from([
            "scheduler-sim",
            "--homogeneous",
            "complex",
            "--count",
            "4",
            "--strategy",
            "rr",
        ]);
        let options = run_options(&matches, &AppConfig::default()).unwrap();

        assert_eq!(options.strategy, StrategyKind::RoundRobin);
        assert_eq!(
            options.batch,
            BatchPlan::Homogeneous {
                complexity: Complexity::Complex,
                count: 4
            }
        );
    }

    #[test]
    fn test_cli_rejects_mixed_and_homogeneous() {
        let result = cli().try_get_matches_from([
            "scheduler-sim",
            "--homogeneous",
            "simple",
            "--count",
            "2",
            "--simple",
            "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        cli().debug_assert();
    }
}
