use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ModelError;
use crate::models::{EntityKind, PrecipitationKind, Vector3};

/// シナリオメタデータ
#[derive(Debug, Deserialize, Serialize)]
pub struct ScenarioMeta {
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// シミュレーション設定
#[derive(Debug, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub dt_s: f64,
    pub t_max_s: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct Position3D {
    pub x_m: f64,
    pub y_m: f64,
    #[serde(default)]
    pub z_m: f64,
}

impl From<Position3D> for Vector3 {
    fn from(p: Position3D) -> Self {
        Vector3::new(p.x_m, p.y_m, p.z_m)
    }
}

/// 軸平行な矩形領域
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct RegionBox {
    pub min: Position3D,
    pub max: Position3D,
}

/// 運用エリア設定
#[derive(Debug, Deserialize, Serialize)]
pub struct AreaConfig {
    pub min: Position3D,
    pub max: Position3D,
    /// 省略時は降水がエリア全域に適用される
    #[serde(default)]
    pub rain_zone: Option<RegionBox>,
}

/// 方向ベクトルと強度（0〜100）
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct FieldConfig {
    pub direction: Position3D,
    pub intensity: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PrecipitationConfig {
    pub kind: PrecipitationKind,
    pub intensity: f64,
}

/// 環境設定
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EnvironmentConfig {
    pub wind: Option<FieldConfig>,
    pub current: Option<FieldConfig>,
    pub precipitation: Option<PrecipitationConfig>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ObstacleConfig {
    pub label: String,
    pub center: Position3D,
    pub radius_m: f64,
    pub z_min_m: Option<f64>,
    pub z_max_m: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ExclusionZoneConfig {
    pub label: String,
    pub center: Position3D,
    pub radius_m: f64,
}

/// 移動体設定。速度・自律時間は省略時に機種の既定値
#[derive(Debug, Deserialize, Serialize)]
pub struct EntityConfig {
    pub name: String,
    pub kind: EntityKind,
    pub position: Position3D,
    pub max_speed_mps: Option<f64>,
    pub max_autonomy_h: Option<f64>,
    /// 初期積載量（物流ドローンのみ）
    pub payload_kg: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SwarmConfig {
    pub name: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionKindConfig {
    Surveillance,
    AerialReconnaissance,
    SubseaInspection,
    SearchAndRescue,
}

/// 任務設定
#[derive(Debug, Deserialize, Serialize)]
pub struct MissionConfig {
    pub kind: MissionKindConfig,
    /// ウェイポイント型任務の目的地
    pub destination: Option<Position3D>,
    /// 救助対象の移動体名
    pub target: Option<String>,
    #[serde(default)]
    pub assigned: Vec<String>,
    /// 割り当てる群の名前
    #[serde(default)]
    pub swarms: Vec<String>,
    /// シミュレーション開始からの開始時刻（秒）
    #[serde(default)]
    pub start_offset_s: f64,
    /// 予定所要時間（秒）
    #[serde(default = "default_mission_duration")]
    pub duration_s: f64,
}

fn default_mission_duration() -> f64 {
    3600.0
}

/// 完全なシナリオ設定
#[derive(Debug, Deserialize, Serialize)]
pub struct ScenarioConfig {
    pub meta: ScenarioMeta,
    pub sim: SimulationConfig,
    pub area: AreaConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub obstacles: Vec<ObstacleConfig>,
    #[serde(default)]
    pub exclusion_zones: Vec<ExclusionZoneConfig>,
    pub entities: Vec<EntityConfig>,
    #[serde(default)]
    pub swarms: Vec<SwarmConfig>,
    #[serde(default)]
    pub missions: Vec<MissionConfig>,
}

impl ScenarioConfig {
    /// YAMLファイルからシナリオ設定を読み込み
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path).map_err(|e| ScenarioError::Io(path.to_path_buf(), e))?;
        let config: ScenarioConfig =
            serde_yaml::from_str(&contents).map_err(|e| ScenarioError::Parse(path.to_path_buf(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// YAML文字列からシナリオ設定を読み込み
    pub fn from_yaml_str(contents: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig =
            serde_yaml::from_str(contents).map_err(|e| ScenarioError::Parse(PathBuf::from("<inline>"), e))?;
        config.validate()?;
        Ok(config)
    }

    /// 設定の基本的な検証
    ///
    /// 値域の詳細（強度・半径など）はモデル構築時に `ModelError` として検出されます。
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if !(self.sim.dt_s > 0.0) {
            return Err(ScenarioError::Validation("dt_s must be positive".to_string()));
        }
        if !(self.sim.t_max_s > 0.0) {
            return Err(ScenarioError::Validation("t_max_s must be positive".to_string()));
        }

        let (min, max) = (&self.area.min, &self.area.max);
        if min.x_m >= max.x_m || min.y_m >= max.y_m || min.z_m > max.z_m {
            return Err(ScenarioError::Validation("Invalid area bounds".to_string()));
        }

        let intensities = [
            self.environment.wind.map(|w| w.intensity),
            self.environment.current.map(|c| c.intensity),
            self.environment.precipitation.map(|p| p.intensity),
        ];
        if let Some(bad) = intensities.into_iter().flatten().find(|i| !(0.0..=100.0).contains(i)) {
            return Err(ScenarioError::Validation(format!("Intensity {bad} outside [0, 100]")));
        }

        let mut names = HashSet::new();
        for entity in &self.entities {
            if !names.insert(entity.name.as_str()) {
                return Err(ScenarioError::Validation(format!("Duplicate entity name: {}", entity.name)));
            }
            if !self.is_position_in_bounds(&entity.position) {
                return Err(ScenarioError::Validation(format!("Entity {} outside area bounds", entity.name)));
            }
        }

        let mut swarm_names = HashSet::new();
        for swarm in &self.swarms {
            if !swarm_names.insert(swarm.name.as_str()) {
                return Err(ScenarioError::Validation(format!("Duplicate swarm name: {}", swarm.name)));
            }
            for member in &swarm.members {
                if !names.contains(member.as_str()) {
                    return Err(ScenarioError::Validation(format!(
                        "Swarm {} references unknown entity {}",
                        swarm.name, member
                    )));
                }
            }
        }

        for (index, mission) in self.missions.iter().enumerate() {
            match mission.kind {
                MissionKindConfig::SearchAndRescue => match &mission.target {
                    Some(target) if names.contains(target.as_str()) => {}
                    Some(target) => {
                        return Err(ScenarioError::Validation(format!(
                            "Mission #{index} rescue target {target} is unknown"
                        )));
                    }
                    None => {
                        return Err(ScenarioError::Validation(format!("Mission #{index} requires a rescue target")));
                    }
                },
                _ if mission.destination.is_none() => {
                    return Err(ScenarioError::Validation(format!("Mission #{index} requires a destination")));
                }
                _ => {}
            }

            if let Some(unknown) = mission.assigned.iter().find(|n| !names.contains(n.as_str())) {
                return Err(ScenarioError::Validation(format!(
                    "Mission #{index} assigns unknown entity {unknown}"
                )));
            }
            if let Some(unknown) = mission.swarms.iter().find(|n| !swarm_names.contains(n.as_str())) {
                return Err(ScenarioError::Validation(format!("Mission #{index} assigns unknown swarm {unknown}")));
            }
            if mission.start_offset_s < 0.0 || mission.start_offset_s >= self.sim.t_max_s {
                return Err(ScenarioError::Validation(format!(
                    "Mission #{index} start offset {} outside simulation time {}",
                    mission.start_offset_s, self.sim.t_max_s
                )));
            }
            if !(mission.duration_s > 0.0) {
                return Err(ScenarioError::Validation(format!("Mission #{index} duration must be positive")));
            }
        }

        Ok(())
    }

    fn is_position_in_bounds(&self, p: &Position3D) -> bool {
        let (min, max) = (&self.area.min, &self.area.max);
        p.x_m >= min.x_m && p.x_m <= max.x_m && p.y_m >= min.y_m && p.y_m <= max.y_m && p.z_m >= min.z_m && p.z_m <= max.z_m
    }

    /// シナリオの概要を表示
    pub fn print_summary(&self) {
        println!("=== シナリオ情報 ===");
        println!("名前: {}", self.meta.name);
        println!("説明: {}", self.meta.description);
        println!("バージョン: {}", self.meta.version);
        println!();

        println!("=== シミュレーション設定 ===");
        println!("時間刻み: {:.3}秒", self.sim.dt_s);
        println!("最大時間: {:.1}秒 ({:.1}分)", self.sim.t_max_s, self.sim.t_max_s / 60.0);
        println!("シード値: {}", self.sim.seed);
        println!();

        println!("=== 運用エリア ===");
        println!(
            "範囲: ({:.0}, {:.0}, {:.0}) - ({:.0}, {:.0}, {:.0})",
            self.area.min.x_m, self.area.min.y_m, self.area.min.z_m, self.area.max.x_m, self.area.max.y_m, self.area.max.z_m
        );
        println!("障害物: {}個", self.obstacles.len());
        println!("進入禁止区域: {}個", self.exclusion_zones.len());
        if let Some(wind) = &self.environment.wind {
            println!("風: 強度 {:.0}", wind.intensity);
        }
        if let Some(current) = &self.environment.current {
            println!("海流: 強度 {:.0}", current.intensity);
        }
        if let Some(precipitation) = &self.environment.precipitation {
            println!("降水: {:?} 強度 {:.0}", precipitation.kind, precipitation.intensity);
        }
        println!();

        println!("=== 移動体 ===");
        println!("移動体: {}機 / 群: {}", self.entities.len(), self.swarms.len());
        for entity in &self.entities {
            println!("  {}: {}", entity.name, entity.kind.as_str());
        }
        println!();

        println!("=== 任務 ===");
        for mission in &self.missions {
            println!(
                "  {:?}: {}機 + {}群 (開始: {:.1}秒)",
                mission.kind,
                mission.assigned.len(),
                mission.swarms.len(),
                mission.start_offset_s
            );
        }
    }
}

/// シナリオ読み込みエラー
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("シナリオファイルが見つかりません: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("ファイル読み込みエラー {}: {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("YAML解析エラー {}: {}", .0.display(), .1)]
    Parse(PathBuf, #[source] serde_yaml::Error),

    #[error("設定検証エラー: {0}")]
    Validation(String),

    /// 設定値からモデルを構築できない
    #[error("モデル構築エラー: {0}")]
    Model(#[from] ModelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
meta:
  version: "1.0"
  name: minimal
sim:
  dt_s: 1.0
  t_max_s: 600.0
  seed: 42
area:
  min: { x_m: -1000.0, y_m: -1000.0, z_m: -500.0 }
  max: { x_m: 10000.0, y_m: 10000.0, z_m: 5000.0 }
environment:
  wind: { direction: { x_m: 0.0, y_m: 1.0 }, intensity: 20.0 }
entities:
  - name: recon-1
    kind: reconnaissance_drone
    position: { x_m: 0.0, y_m: 0.0, z_m: 300.0 }
  - name: boat-1
    kind: surface_vessel
    position: { x_m: 0.0, y_m: 100.0 }
    max_speed_mps: 15.0
swarms:
  - name: alpha
    members: [recon-1, boat-1]
missions:
  - kind: surveillance
    destination: { x_m: 2000.0, y_m: 0.0, z_m: 300.0 }
    swarms: [alpha]
  - kind: search_and_rescue
    target: boat-1
    assigned: [recon-1]
    start_offset_s: 120.0
"#;

    #[test]
    fn test_parse_minimal_scenario() {
        let config = ScenarioConfig::from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.meta.name, "minimal");
        assert_eq!(config.entities.len(), 2);
        assert_eq!(config.entities[1].kind, EntityKind::SurfaceVessel);
        assert_eq!(config.entities[1].position.z_m, 0.0);
        assert_eq!(config.missions[0].duration_s, 3600.0);
        assert_eq!(config.missions[1].kind, MissionKindConfig::SearchAndRescue);
        assert!(config.environment.current.is_none());
        assert!(config.area.rain_zone.is_none());
    }

    #[test]
    fn test_rejects_duplicate_entity_names() {
        let yaml = MINIMAL.replace("name: boat-1", "name: recon-1");
        let err = ScenarioConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ScenarioError::Validation(msg) if msg.contains("Duplicate entity")));
    }

    #[test]
    fn test_rejects_unknown_references() {
        let yaml = MINIMAL.replace("target: boat-1", "target: ghost");
        assert!(matches!(ScenarioConfig::from_yaml_str(&yaml), Err(ScenarioError::Validation(_))));

        let yaml = MINIMAL.replace("swarms: [alpha]", "swarms: [bravo]");
        assert!(matches!(ScenarioConfig::from_yaml_str(&yaml), Err(ScenarioError::Validation(_))));
    }

    #[test]
    fn test_rejects_intensity_out_of_range() {
        let yaml = MINIMAL.replace("intensity: 20.0", "intensity: 120.0");
        let err = ScenarioConfig::from_yaml_str(&yaml).unwrap_err();
        assert!(matches!(err, ScenarioError::Validation(msg) if msg.contains("Intensity")));
    }

    #[test]
    fn test_rejects_bad_time_step() {
        let yaml = MINIMAL.replace("dt_s: 1.0", "dt_s: 0.0");
        assert!(matches!(ScenarioConfig::from_yaml_str(&yaml), Err(ScenarioError::Validation(_))));
    }

    #[test]
    fn test_parse_error_and_missing_file() {
        assert!(matches!(ScenarioConfig::from_yaml_str("meta: ["), Err(ScenarioError::Parse(..))));
        assert!(matches!(
            ScenarioConfig::from_file("no/such/scenario.yaml"),
            Err(ScenarioError::FileNotFound(_))
        ));
    }
}
