use chrono::{Duration, Utc};
use clap::{Arg, Command};
use tracing::{error, info};

use swarmsim::logging::{LogConfig, LogOutput, init_logging, level_from_verbosity, parse_log_level};
use swarmsim::models::*;
use swarmsim::scenario::ScenarioConfig;
use swarmsim::simulation::SimulationEngine;

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("swarmsim")
        .version("0.1.0")
        .about("自律移動体群シミュレーション (Swarm Simulation)")
        .long_about(
            "航空・海洋の自律移動体群を扱う時間駆動型シミュレーション\n\
             環境場・障害物・進入禁止区域の中で任務と群監視を実行します。",
        )
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定")
                .long_help(
                    "実行するシナリオファイル(.yaml)のパスを指定します。\n\
                     指定しない場合、ヘルプとシナリオ一覧を表示します。",
                ),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
                .conflicts_with("demo"),
        )
        .arg(
            Arg::new("demo")
                .short('d')
                .long("demo")
                .action(clap::ArgAction::SetTrue)
                .help("組み込みのデモシナリオを実行")
                .conflicts_with("info"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: トレース)"),
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .default_value("console")
                .help("ログ出力先 (console, file, both)"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)。省略時は -v から決定"),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .value_name("DIR")
                .default_value("logs")
                .help("ログファイルの出力ディレクトリ"),
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");

    let output = match matches
        .get_one::<String>("log-output")
        .map(|s| s.parse::<LogOutput>())
        .unwrap_or(Ok(LogOutput::Console))
    {
        Ok(output) => output,
        Err(e) => {
            eprintln!("エラー: {}", e);
            std::process::exit(2);
        }
    };
    let log_config = LogConfig {
        level: matches
            .get_one::<String>("log-level")
            .map(|s| parse_log_level(s))
            .unwrap_or_else(|| level_from_verbosity(verbose_level)),
        output,
        log_dir: matches.get_one::<String>("log-dir").cloned().unwrap_or_else(|| "logs".to_string()),
        ..LogConfig::default()
    };

    // ガードはプログラム終了まで保持する
    let _log_guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化エラー: {}", e);
            std::process::exit(1);
        }
    };

    println!("自律移動体群シミュレーション (Swarm Simulation) - swarmsim v0.1.0");
    println!();

    if verbose_level > 0 {
        println!("詳細出力レベル: {}", verbose_level);
    }

    if matches.get_flag("demo") {
        println!("=== デモモード ===");
        if let Err(e) = run_demo(verbose_level) {
            error!("デモ実行エラー: {}", e);
            std::process::exit(1);
        }
        return;
    }

    if let Some(scenario_path) = matches.get_one::<String>("scenario") {
        match run_scenario(scenario_path, matches.get_flag("info"), verbose_level) {
            Ok(_) => {
                if verbose_level > 0 {
                    println!("シナリオ実行が正常に完了しました。");
                }
            }
            Err(e) => {
                eprintln!("エラー: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        show_default_help();
    }
}

/// 組み込みのデモ: 各機種を生成し、監視任務と救助任務を実行する
fn run_demo(verbose_level: u8) -> Result<(), Box<dyn std::error::Error>> {
    let mut area = OperatingArea::new(Vector3::new(-5000.0, -5000.0, -1500.0), Vector3::new(20000.0, 20000.0, 5000.0))?;
    area.set_wind(Wind::from_heading(std::f64::consts::FRAC_PI_4, 25.0)?);
    area.set_current(MarineCurrent::new(Vector3::new(1.0, 0.0, 0.0), 10.0)?);
    area.add_obstacle(Obstacle::with_vertical_range(Vector3::new(2500.0, 0.0, 0.0), 60.0, 0.0, 150.0, "radio-mast")?);
    area.add_exclusion_zone(ExclusionZone::new(Vector3::new(6000.0, 6000.0, 0.0), 500.0, "firing-range")?);

    let mut engine = SimulationEngine::new(area, 1.0, 900.0, 42, verbose_level);

    let recon = engine.area.register(MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 400.0))?);
    let cargo = engine.area.register(MobileEntity::logistics_drone("cargo-1", Vector3::new(0.0, 300.0, 400.0))?);
    let boat = engine.area.register(MobileEntity::surface_vessel("boat-1", Vector3::new(0.0, -300.0, 0.0))?);
    let sub = engine.area.register(MobileEntity::submersible("sub-1", Vector3::new(0.0, -600.0, -30.0))?);
    let drifting = engine.area.register(MobileEntity::surface_vessel("drifting-1", Vector3::new(1500.0, -800.0, 0.0))?);
    if let Some(entity) = engine.area.entity_mut(drifting) {
        entity.consume_autonomy(85.0);
    }
    if let Some(entity) = engine.area.entity_mut(cargo) {
        entity.load_payload(20.0);
    }

    for entity in engine.area.entities() {
        println!("{}", entity);
    }

    let mut air = Swarm::new("air-wing");
    air.add(recon);
    air.add(cargo);

    let now = Utc::now();
    let mut survey = Mission::aerial_reconnaissance(now, now + Duration::hours(1), Vector3::new(4000.0, 0.0, 400.0))?;
    survey.assign_swarm(&air, &engine.area);
    let mut inspection = Mission::subsea_inspection(now, now + Duration::hours(1), Vector3::new(800.0, -600.0, -200.0))?;
    inspection.assign(sub, &engine.area);
    let mut rescue = Mission::search_and_rescue(now, now + Duration::hours(1), drifting)?.with_seed(engine.seed);
    rescue.assign(boat, &engine.area);

    engine.add_swarm(air);
    engine.add_mission(survey, 0.0);
    engine.add_mission(inspection, 0.0);
    engine.add_mission(rescue, 30.0);

    let summary = engine.run();
    info!(
        completed = summary.missions_completed,
        unfinished = summary.missions_unfinished,
        failed_entities = summary.failed_entities,
        "デモ完了"
    );

    println!();
    println!("=== デモ結果 ===");
    for scheduled in &engine.missions {
        println!(
            "{} -> {}",
            scheduled.mission,
            scheduled.mission.obtained_result().unwrap_or("(結果なし)")
        );
    }
    for entity in engine.area.entities() {
        println!("{}", entity);
    }

    Ok(())
}

/// シナリオファイルを読み込んで実行
fn run_scenario(scenario_path: &str, info_only: bool, verbose_level: u8) -> Result<(), Box<dyn std::error::Error>> {
    let scenario = ScenarioConfig::from_file(scenario_path)?;

    if verbose_level > 0 {
        println!("シナリオファイル読み込み完了: {}", scenario_path);
    }

    if info_only {
        scenario.print_summary();
        return Ok(());
    }

    execute_scenario(&scenario, verbose_level)
}

/// シナリオの実行
fn execute_scenario(scenario: &ScenarioConfig, verbose_level: u8) -> Result<(), Box<dyn std::error::Error>> {
    scenario.print_summary();
    println!();

    let mut simulation = SimulationEngine::from_scenario(scenario, verbose_level)?;
    let summary = simulation.run();

    println!();
    println!("=== 実行結果 ===");
    println!("経過時間: {:.1}秒 ({}ステップ)", summary.elapsed_s, summary.steps);
    println!(
        "任務: 完了 {} / 中止 {} / 未完了 {}",
        summary.missions_completed, summary.missions_cancelled, summary.missions_unfinished
    );
    println!("故障移動体: {}機", summary.failed_entities);
    println!("近接警報: {}件", summary.proximity_alerts);

    Ok(())
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  swarmsim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>    シナリオファイルを指定して実行");
    println!("  -i, --info               シナリオ情報のみ表示");
    println!("  -d, --demo               組み込みのデモシナリオを実行");
    println!("  -v, --verbose            詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log-output <T>     ログ出力先 (console, file, both)");
    println!("      --log-level <LEVEL>  ログレベル");
    println!("      --log-dir <DIR>      ログディレクトリ");
    println!("  -h, --help               このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/coastal_patrol.yaml   - 航空偵察と海底点検");
    println!("  scenarios/storm_rescue.yaml     - 荒天下の捜索救助");
    println!();
    println!("例:");
    println!("  swarmsim -s scenarios/coastal_patrol.yaml");
    println!("  swarmsim -s scenarios/storm_rescue.yaml -vv --log-output both");
    println!("  swarmsim -s scenarios/coastal_patrol.yaml -i");
    println!("  swarmsim --demo");
}
