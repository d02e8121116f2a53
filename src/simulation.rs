//! # Simulation モジュール
//!
//! 群シミュレーションの中核となるシミュレーションエンジンを提供します。
//!
//! 固定時間刻み（Δt）で時間を進め、任務の開始・進行と群の近接監視を
//! 決められた順序で実行します。移動体の運動は各任務が運用エリアを通じて積分します。
//!
//! ## シミュレーション処理順序
//!
//! 各時間刻みにおいて、以下の順序で処理が実行されます：
//!
//! 1. **任務開始**: 開始時刻に達した計画中の任務を開始
//! 2. **任務処理**: 実行中の任務ごとに割り当て移動体を前進
//! 3. **群監視**: 群ごとの衝突・衝突リスク判定
//!
//! ## 使用例
//!
//! ```no_run
//! use swarmsim::scenario::ScenarioConfig;
//! use swarmsim::simulation::SimulationEngine;
//!
//! let config = ScenarioConfig::from_file("scenarios/coastal_patrol.yaml")?;
//! let mut engine = SimulationEngine::from_scenario(&config, 1)?;
//! let summary = engine.run();
//! println!("完了任務: {}", summary.missions_completed);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, trace, warn};

use crate::models::*;
use crate::scenario::*;

/// 開始時刻付きの任務
#[derive(Debug)]
pub struct ScheduledMission {
    pub mission: Mission,
    /// シミュレーション開始からの開始時刻（秒）
    pub start_at_s: f64,
    launch_attempted: bool,
}

/// 実行結果の集計
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSummary {
    pub elapsed_s: f64,
    pub steps: u64,
    pub missions_completed: usize,
    pub missions_cancelled: usize,
    pub missions_unfinished: usize,
    pub failed_entities: usize,
    pub proximity_alerts: usize,
}

pub struct SimulationEngine {
    pub current_time: f64,
    pub dt: f64,
    pub max_time: f64,
    pub seed: u64,
    pub step_count: u64,

    pub area: OperatingArea,
    pub swarms: Vec<Swarm>,
    pub missions: Vec<ScheduledMission>,
    /// (時刻, 検知結果)
    pub proximity_log: Vec<(f64, ProximityAlert)>,

    pub verbose_level: u8,
    epoch: DateTime<Utc>,
}

impl SimulationEngine {
    pub fn new(area: OperatingArea, dt: f64, max_time: f64, seed: u64, verbose_level: u8) -> Self {
        Self {
            current_time: 0.0,
            dt,
            max_time,
            seed,
            step_count: 0,
            area,
            swarms: Vec::new(),
            missions: Vec::new(),
            proximity_log: Vec::new(),
            verbose_level,
            epoch: Utc::now(),
        }
    }

    /// シナリオ設定からエンジンを構築
    pub fn from_scenario(scenario: &ScenarioConfig, verbose_level: u8) -> Result<Self, ScenarioError> {
        if verbose_level > 0 {
            info!("シミュレーションエンジンを初期化中...");
        }

        let area = initialize_area(scenario)?;
        let mut engine = Self::new(area, scenario.sim.dt_s, scenario.sim.t_max_s, scenario.sim.seed, verbose_level);

        let names = engine.initialize_entities(scenario)?;
        let swarm_index = engine.initialize_swarms(scenario, &names);
        engine.initialize_missions(scenario, &names, &swarm_index)?;

        if verbose_level > 0 {
            info!("初期化完了:");
            info!("  移動体: {}機", engine.area.entity_count());
            info!("  障害物: {}個", engine.area.obstacles().len());
            info!("  進入禁止区域: {}個", engine.area.exclusion_zones().len());
            info!("  群: {}", engine.swarms.len());
            info!("  任務: {}件", engine.missions.len());
        }

        Ok(engine)
    }

    fn initialize_entities(&mut self, scenario: &ScenarioConfig) -> Result<HashMap<String, EntityId>, ScenarioError> {
        let mut names = HashMap::new();

        for entity_config in &scenario.entities {
            let mut entity = MobileEntity::from_kind(
                entity_config.kind,
                entity_config.name.clone(),
                entity_config.position.into(),
                entity_config.max_speed_mps,
                entity_config.max_autonomy_h,
            )?;

            if let Some(kg) = entity_config.payload_kg {
                if !entity.load_payload(kg) {
                    return Err(ScenarioError::Validation(format!(
                        "Entity {} cannot carry payload {} kg",
                        entity_config.name, kg
                    )));
                }
            }

            if self.verbose_level > 1 {
                debug!("移動体初期化: {} ({}, 位置: {})", entity.name(), entity.kind().as_str(), entity.position());
            }

            let id = self.area.register(entity);
            names.insert(entity_config.name.clone(), id);
        }

        Ok(names)
    }

    fn initialize_swarms(&mut self, scenario: &ScenarioConfig, names: &HashMap<String, EntityId>) -> HashMap<String, usize> {
        let mut index = HashMap::new();

        for swarm_config in &scenario.swarms {
            let mut swarm = Swarm::new(swarm_config.name.clone());
            for member in &swarm_config.members {
                if let Some(&id) = names.get(member) {
                    swarm.add(id);
                }
            }
            if self.verbose_level > 1 {
                debug!("群初期化: {} ({}機)", swarm.name(), swarm.len());
            }
            index.insert(swarm_config.name.clone(), self.swarms.len());
            self.swarms.push(swarm);
        }

        index
    }

    fn initialize_missions(
        &mut self,
        scenario: &ScenarioConfig,
        names: &HashMap<String, EntityId>,
        swarm_index: &HashMap<String, usize>,
    ) -> Result<(), ScenarioError> {
        for (i, mission_config) in scenario.missions.iter().enumerate() {
            let kind = match mission_config.kind {
                MissionKindConfig::SearchAndRescue => {
                    let target = mission_config
                        .target
                        .as_ref()
                        .and_then(|name| names.get(name))
                        .copied()
                        .ok_or_else(|| ScenarioError::Validation(format!("Mission #{i} requires a known rescue target")))?;
                    MissionKind::SearchAndRescue { target }
                }
                waypoint => {
                    let destination: Vector3 = mission_config
                        .destination
                        .ok_or_else(|| ScenarioError::Validation(format!("Mission #{i} requires a destination")))?
                        .into();
                    match waypoint {
                        MissionKindConfig::AerialReconnaissance => MissionKind::AerialReconnaissance { destination },
                        MissionKindConfig::SubseaInspection => MissionKind::SubseaInspection { destination },
                        _ => MissionKind::Surveillance { destination },
                    }
                }
            };

            let start = self.epoch + Duration::milliseconds((mission_config.start_offset_s * 1000.0) as i64);
            let end = start + Duration::milliseconds((mission_config.duration_s * 1000.0) as i64);
            let mut mission = Mission::new(kind, start, end)?.with_seed(self.seed.wrapping_add(i as u64));

            for name in &mission_config.assigned {
                let assigned = names.get(name).is_some_and(|&id| mission.assign(id, &self.area));
                if !assigned {
                    warn!(mission = mission.name(), entity = %name, "MISSION_ASSIGN_SKIPPED: 移動体を任務に割り当てられませんでした");
                }
            }
            for swarm_name in &mission_config.swarms {
                if let Some(&index) = swarm_index.get(swarm_name) {
                    mission.assign_swarm(&self.swarms[index], &self.area);
                }
            }

            if self.verbose_level > 1 {
                debug!("任務初期化: {} ({}機, 開始: {:.1}秒)", mission, mission.assigned().len(), mission_config.start_offset_s);
            }

            self.add_mission(mission, mission_config.start_offset_s);
        }

        Ok(())
    }

    pub fn add_mission(&mut self, mission: Mission, start_at_s: f64) {
        self.missions.push(ScheduledMission { mission, start_at_s, launch_attempted: false });
    }

    pub fn add_swarm(&mut self, swarm: Swarm) {
        self.swarms.push(swarm);
    }

    /// 全任務が完了または中止済みか
    pub fn all_missions_finished(&self) -> bool {
        !self.missions.is_empty() && self.missions.iter().all(|m| m.mission.status().is_terminal())
    }

    /// 最大時刻まで、または全任務が終わるまで実行
    pub fn run(&mut self) -> SimulationSummary {
        info!("=== シミュレーション実行開始 ===");

        while self.current_time < self.max_time {
            self.step();

            if self.verbose_level > 2 {
                trace!("時刻: {:.1}秒 (ステップ: {})", self.current_time, self.step_count);
            }

            if self.step_count % 100 == 0 && self.verbose_level > 0 {
                let progress = (self.current_time / self.max_time) * 100.0;
                info!("進行状況: {:.1}% ({:.1}/{:.1}秒)", progress, self.current_time, self.max_time);
            }

            if self.all_missions_finished() {
                info!("全任務が終了しました (時刻: {:.1}秒)", self.current_time);
                break;
            }
        }

        let summary = self.summary();
        info!("=== シミュレーション完了 ===");
        info!("実行時間: {:.1}秒", summary.elapsed_s);
        info!("総ステップ数: {}", summary.steps);
        info!(
            "任務: 完了 {} / 中止 {} / 未完了 {}",
            summary.missions_completed, summary.missions_cancelled, summary.missions_unfinished
        );
        info!("故障移動体: {}機, 近接警報: {}件", summary.failed_entities, summary.proximity_alerts);
        for scheduled in &self.missions {
            info!("  {}", scheduled.mission);
        }
        for entity in self.area.entities() {
            info!("  {}", entity);
        }

        summary
    }

    pub fn step(&mut self) {
        self.process_mission_launches();
        self.process_missions();
        self.process_swarms();

        self.current_time += self.dt;
        self.step_count += 1;
    }

    fn process_mission_launches(&mut self) {
        for scheduled in &mut self.missions {
            if scheduled.launch_attempted
                || scheduled.mission.status() != MissionStatus::Planned
                || self.current_time < scheduled.start_at_s
            {
                continue;
            }
            scheduled.launch_attempted = true;
            if !scheduled.mission.start(&mut self.area) {
                warn!(mission = %scheduled.mission, time = self.current_time, "MISSION_LAUNCH_FAILED: 任務を開始できませんでした");
            }
        }
    }

    fn process_missions(&mut self) {
        for scheduled in &mut self.missions {
            if scheduled.mission.status() == MissionStatus::Active {
                scheduled.mission.tick(self.dt, &mut self.area);
            }
        }
    }

    fn process_swarms(&mut self) {
        for swarm in &self.swarms {
            for alert in swarm.scan_proximity(&mut self.area) {
                if self.verbose_level > 1 {
                    debug!(swarm = swarm.name(), time = self.current_time, "近接警報: {}", alert);
                }
                self.proximity_log.push((self.current_time, alert));
            }
        }
    }

    pub fn summary(&self) -> SimulationSummary {
        let count = |status: MissionStatus| self.missions.iter().filter(|m| m.mission.status() == status).count();
        let missions_completed = count(MissionStatus::Completed);
        let missions_cancelled = count(MissionStatus::Cancelled);

        SimulationSummary {
            elapsed_s: self.current_time,
            steps: self.step_count,
            missions_completed,
            missions_cancelled,
            missions_unfinished: self.missions.len() - missions_completed - missions_cancelled,
            failed_entities: self.area.entities().filter(|e| e.state() == OperationalState::Failed).count(),
            proximity_alerts: self.proximity_log.len(),
        }
    }
}

fn initialize_area(scenario: &ScenarioConfig) -> Result<OperatingArea, ScenarioError> {
    let mut area = OperatingArea::new(scenario.area.min.into(), scenario.area.max.into())?;

    if let Some(wind) = &scenario.environment.wind {
        area.set_wind(Wind::new(wind.direction.into(), wind.intensity)?);
    }
    if let Some(current) = &scenario.environment.current {
        area.set_current(MarineCurrent::new(current.direction.into(), current.intensity)?);
    }
    if let Some(precipitation) = &scenario.environment.precipitation {
        area.set_precipitation(Precipitation::new(precipitation.kind, precipitation.intensity)?);
    }
    if let Some(zone) = &scenario.area.rain_zone {
        area.set_rain_zone(Some(RainZone::new(zone.min.into(), zone.max.into())?));
    }

    for obstacle in &scenario.obstacles {
        let center: Vector3 = obstacle.center.into();
        let built = match (obstacle.z_min_m, obstacle.z_max_m) {
            (None, None) => Obstacle::new(center, obstacle.radius_m, obstacle.label.clone())?,
            (z_min, z_max) => Obstacle::with_vertical_range(
                center,
                obstacle.radius_m,
                z_min.unwrap_or(f64::NEG_INFINITY),
                z_max.unwrap_or(f64::INFINITY),
                obstacle.label.clone(),
            )?,
        };
        area.add_obstacle(built);
    }
    for zone in &scenario.exclusion_zones {
        area.add_exclusion_zone(ExclusionZone::new(zone.center.into(), zone.radius_m, zone.label.clone())?);
    }

    Ok(area)
}
