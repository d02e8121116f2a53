//! # Logging モジュール
//!
//! 群シミュレーションのログ管理機能を提供します。
//!
//! tracing-appender による非同期ファイル出力と、コンソール出力を組み合わせます。
//! 重大アラート（`CRITICAL_ALERT`）は WARN レベルで出力されるため、
//! 既定の INFO レベルでも必ず記録されます。
//!
//! ## 設定可能な出力先
//!
//! - `Console`: コンソールのみ
//! - `File`: ファイルのみ（logs/swarmsim.YYYY-MM-DD、JSON形式）
//! - `Both`: コンソールとファイルの両方

use std::str::FromStr;

use tracing::Level;
use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// ログ出力先の設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogOutput {
    /// コンソールのみ
    Console,
    /// ファイルのみ
    File,
    /// コンソールとファイルの両方
    Both,
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(format!("無効な出力先: {}. 利用可能: console, file, both", s)),
        }
    }
}

/// ログ設定構造体
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub output: LogOutput,
    /// ログファイルのディレクトリ（File または Both の場合）
    pub log_dir: String,
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Console,
            log_dir: "logs".to_string(),
            file_prefix: "swarmsim".to_string(),
        }
    }
}

/// ログシステムを初期化
///
/// ファイル出力を伴う場合は非同期書き込みのガードを返します。
/// ガードを破棄するとバッファが書き出されるため、呼び出し側はプログラム終了まで保持してください。
///
/// # 例
///
/// ```no_run
/// use swarmsim::logging::{LogConfig, LogOutput, init_logging};
/// use tracing::Level;
///
/// let config = LogConfig {
///     level: Level::DEBUG,
///     output: LogOutput::Both,
///     log_dir: "logs".to_string(),
///     file_prefix: "swarmsim".to_string(),
/// };
///
/// let _guard = init_logging(&config).expect("ログ初期化に失敗");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    // 環境変数（RUST_LOG）が優先
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match config.output {
        LogOutput::Console => {
            Registry::default()
                .with(env_filter)
                .with(fmt::layer().with_target(true).with_thread_ids(false).compact())
                .try_init()?;
            Ok(None)
        }
        LogOutput::File => {
            ensure_log_directory(&config.log_dir)?;
            let file_appender = rolling::daily(&config.log_dir, &config.file_prefix);
            let (writer, guard) = non_blocking(file_appender);

            Registry::default()
                .with(env_filter)
                .with(fmt::layer().with_writer(writer).with_target(true).with_thread_ids(false).json())
                .try_init()?;
            Ok(Some(guard))
        }
        LogOutput::Both => {
            ensure_log_directory(&config.log_dir)?;
            let file_appender = rolling::daily(&config.log_dir, &config.file_prefix);
            let (writer, guard) = non_blocking(file_appender);

            Registry::default()
                .with(env_filter)
                .with(fmt::layer().with_target(true).with_thread_ids(false).compact())
                .with(fmt::layer().with_writer(writer).with_target(true).with_thread_ids(false).json())
                .try_init()?;
            Ok(Some(guard))
        }
    }
}

/// ログレベルを文字列から解析。無効な場合は INFO
pub fn parse_log_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!("警告: 無効なログレベル '{}'. INFOを使用します", level_str);
            Level::INFO
        }
    }
}

/// `-v` の回数からログレベルを決める（0: INFO, 1: DEBUG, 2以上: TRACE）
pub fn level_from_verbosity(verbose: u8) -> Level {
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

pub fn ensure_log_directory(log_dir: &str) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(log_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_output_from_str() {
        assert_eq!(LogOutput::from_str("console"), Ok(LogOutput::Console));
        assert_eq!(LogOutput::from_str("FILE"), Ok(LogOutput::File));
        assert_eq!(LogOutput::from_str("all"), Ok(LogOutput::Both));
        assert!(LogOutput::from_str("syslog").is_err());
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug"), Level::DEBUG);
        assert_eq!(parse_log_level("WARN"), Level::WARN);
        assert_eq!(parse_log_level("invalid"), Level::INFO);
    }

    #[test]
    fn test_level_from_verbosity() {
        assert_eq!(level_from_verbosity(0), Level::INFO);
        assert_eq!(level_from_verbosity(1), Level::DEBUG);
        assert_eq!(level_from_verbosity(5), Level::TRACE);
    }
}
