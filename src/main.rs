use anyhow::{Context, Result};
use env_logger::Env;
use sidetone_keyer::config::Config;
use sidetone_keyer::device;
use sidetone_keyer::injector::create_injector;
use sidetone_keyer::shutdown::ShutdownSignal;
use sidetone_keyer::supervisor::Supervisor;
use std::process::ExitCode;

fn main() -> ExitCode {
    // ロガーを初期化
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // コマンドライン引数をパース
    let args: Vec<String> = std::env::args().collect();

    // デバイス一覧表示モード
    if args.len() > 1 && args[1] == "--show-interfaces" {
        device::print_devices()?;
        return Ok(());
    }

    // 設定ファイル生成モード
    if args.len() > 1 && args[1] == "--generate-config" {
        let config_path = if args.len() > 2 {
            args[2].as_str()
        } else {
            "config.toml"
        };
        Config::write_default(config_path)?;
        println!("設定ファイルを生成しました: {}", config_path);
        return Ok(());
    }

    // 設定ファイルのパス
    let config_path = if args.len() > 1 && !args[1].starts_with("--") {
        args[1].as_str()
    } else {
        "config.toml"
    };

    let config = Config::load_or_default(config_path)?;
    config.validate()?;

    log::info!("sidetone-keyer を起動します");
    log::info!("設定: {:?}", config);

    let injector = create_injector(&config.keying)?;
    let shutdown = ShutdownSignal::new();

    let mut supervisor = Supervisor::new(config, injector, shutdown);
    supervisor.start().context("キーヤーが異常終了しました")?;

    log::info!("sidetone-keyer を終了しました");

    Ok(())
}
