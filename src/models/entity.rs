use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::error::{ModelError, Result};
use crate::models::{
    area::OperatingArea,
    common::{OperationalState, Vector3, constants::*},
    environment::EnvironmentFields,
    traits::{Hazard, Pilotable, Rechargeable},
};

/// 移動体の一意識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ログ用に先頭8桁のみ
        let text = self.0.to_string();
        f.write_str(&text[..8])
    }
}

/// 移動媒体と、その媒体固有の制限値
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Medium {
    /// 航空機。有効高度は [0, max_altitude]
    Aerial { max_altitude: f64, wind_sensitivity: f64 },
    /// 水上・水中艇。有効深度は [-0.1, max_depth]
    Marine { max_depth: f64, current_sensitivity: f64 },
}

impl Medium {
    pub fn is_aerial(&self) -> bool {
        matches!(self, Medium::Aerial { .. })
    }

    pub fn is_marine(&self) -> bool {
        matches!(self, Medium::Marine { .. })
    }

    /// Z座標が媒体の鉛直制約を満たすか
    pub fn accepts_vertical(&self, z: f64) -> bool {
        match *self {
            Medium::Aerial { max_altitude, .. } => (0.0..=max_altitude).contains(&z),
            Medium::Marine { max_depth, .. } => {
                let depth = -z;
                depth >= -DEPTH_TOLERANCE_M && depth <= max_depth
            }
        }
    }

    /// Z座標を鉛直制約の範囲に収める（海洋は水面より上に出ない）
    pub fn clamp_vertical(&self, z: f64) -> f64 {
        match *self {
            Medium::Aerial { max_altitude, .. } => z.clamp(0.0, max_altitude),
            Medium::Marine { max_depth, .. } => z.clamp(-max_depth, 0.0),
        }
    }

    /// 鉛直制約違反時に発報するアラート種別
    fn vertical_alert(&self) -> AlertKind {
        match self {
            Medium::Aerial { .. } => AlertKind::InvalidAltitude,
            Medium::Marine { .. } => AlertKind::InvalidDepth,
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            Medium::Aerial { max_altitude, wind_sensitivity } => {
                if !(max_altitude > 0.0) {
                    return Err(ModelError::NonPositiveAltitude(max_altitude));
                }
                if !(wind_sensitivity >= 0.0) {
                    return Err(ModelError::NegativeSensitivity(wind_sensitivity));
                }
            }
            Medium::Marine { max_depth, current_sensitivity } => {
                if !(max_depth >= 0.0) {
                    return Err(ModelError::NegativeDepth(max_depth));
                }
                if !(current_sensitivity >= 0.0) {
                    return Err(ModelError::NegativeSensitivity(current_sensitivity));
                }
            }
        }
        Ok(())
    }
}

/// 積載物
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Payload {
    pub capacity_kg: f64,
    pub load_kg: f64,
}

impl Payload {
    /// 積載率（0.0〜1.0）
    pub fn fill_ratio(&self) -> f64 {
        if self.capacity_kg > 0.0 { self.load_kg / self.capacity_kg } else { 0.0 }
    }
}

/// 移動体の機種
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// 汎用（プリセットなし）
    Generic,
    ReconnaissanceDrone,
    LogisticsDrone,
    SurfaceVessel,
    Submersible,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Generic => "Generic",
            Self::ReconnaissanceDrone => "ReconnaissanceDrone",
            Self::LogisticsDrone => "LogisticsDrone",
            Self::SurfaceVessel => "SurfaceVessel",
            Self::Submersible => "Submersible",
        }
    }

    /// 機種ごとの既定値: (最大速度 m/s, 最大自律時間 h, 媒体)
    pub fn defaults(&self) -> (f64, f64, Medium) {
        match self {
            Self::ReconnaissanceDrone => {
                (80.0, 4.0, Medium::Aerial { max_altitude: 5000.0, wind_sensitivity: 0.8 })
            }
            Self::LogisticsDrone => {
                (35.0, 12.0, Medium::Aerial { max_altitude: 3000.0, wind_sensitivity: 1.2 })
            }
            Self::SurfaceVessel => {
                (25.0, 12.0, Medium::Marine { max_depth: 0.0, current_sensitivity: 1.5 })
            }
            Self::Submersible => {
                (20.0, 10.0, Medium::Marine { max_depth: 1000.0, current_sensitivity: 1.0 })
            }
            Self::Generic => {
                (30.0, 8.0, Medium::Aerial { max_altitude: 1000.0, wind_sensitivity: 1.0 })
            }
        }
    }
}

/// 機種固有のパラメータ
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EntityClass {
    Generic,
    Reconnaissance { surveillance_range_m: f64 },
    Logistics(Payload),
    SurfaceVessel { stability: f64 },
    Submersible { pressure_resistance: f64 },
}

impl EntityClass {
    fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Generic => Self::Generic,
            EntityKind::ReconnaissanceDrone => Self::Reconnaissance { surveillance_range_m: 2000.0 },
            EntityKind::LogisticsDrone => Self::Logistics(Payload { capacity_kg: 50.0, load_kg: 0.0 }),
            EntityKind::SurfaceVessel => Self::SurfaceVessel { stability: 0.8 },
            EntityKind::Submersible => Self::Submersible { pressure_resistance: 1.2 },
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Generic => EntityKind::Generic,
            Self::Reconnaissance { .. } => EntityKind::ReconnaissanceDrone,
            Self::Logistics(_) => EntityKind::LogisticsDrone,
            Self::SurfaceVessel { .. } => EntityKind::SurfaceVessel,
            Self::Submersible { .. } => EntityKind::Submersible,
        }
    }
}

/// 重大アラートの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    BatteryCritical,
    SystemFailure,
    InvalidAltitude,
    InvalidDepth,
    RestrictedZone,
    VehicleCollision,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BatteryCritical => "BATTERY_CRITICAL",
            Self::SystemFailure => "SYSTEM_FAILURE",
            Self::InvalidAltitude => "INVALID_ALTITUDE",
            Self::InvalidDepth => "INVALID_DEPTH",
            Self::RestrictedZone => "RESTRICTED_ZONE",
            Self::VehicleCollision => "VEHICLE_COLLISION",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 移動体に記録されたアラート
#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub kind: AlertKind,
    pub position: Vector3,
    pub raised_at: DateTime<Utc>,
}

/// サブステップ積分の結果
#[derive(Debug, Clone, PartialEq)]
enum SubstepOutcome {
    /// 全サブステップを通過した
    Clear(Vector3),
    /// ハード衝突。最後に検証済みの位置と、衝突相手のラベル
    Collided { last_valid: Vector3, hazard: String },
}

/// 自律移動体
///
/// 航空機（Aerial）と艇（Marine）を一つの型で表し、媒体タグと機種パラメータで
/// 鉛直制約と消費モデルを切り替えます。位置・自律量・運用状態を保持し、
/// ティックごとの運動積分（`advance`）を提供します。
#[derive(Debug, Clone)]
pub struct MobileEntity {
    id: EntityId,
    name: String,
    class: EntityClass,
    medium: Medium,
    position: Vector3,
    /// 最大速度（m/s）
    max_speed: f64,
    /// 最大自律時間（h、情報のみ）
    max_autonomy_h: f64,
    /// 残り自律量（0〜100%）
    autonomy: f64,
    state: OperationalState,
    running: bool,
    alerts: Vec<Alert>,
    inbox: Vec<String>,
}

impl MobileEntity {
    /// 汎用の航空移動体を作成
    pub fn aerial(
        name: impl Into<String>,
        position: Vector3,
        max_speed: f64,
        max_autonomy_h: f64,
        max_altitude: f64,
        wind_sensitivity: f64,
    ) -> Result<Self> {
        Self::build(
            name.into(),
            EntityClass::Generic,
            Medium::Aerial { max_altitude, wind_sensitivity },
            position,
            max_speed,
            max_autonomy_h,
        )
    }

    /// 汎用の海洋移動体を作成
    pub fn marine(
        name: impl Into<String>,
        position: Vector3,
        max_speed: f64,
        max_autonomy_h: f64,
        max_depth: f64,
        current_sensitivity: f64,
    ) -> Result<Self> {
        Self::build(
            name.into(),
            EntityClass::Generic,
            Medium::Marine { max_depth, current_sensitivity },
            position,
            max_speed,
            max_autonomy_h,
        )
    }

    /// 機種プリセットから作成。速度・自律時間は省略時に機種の既定値を使う
    pub fn from_kind(
        kind: EntityKind,
        name: impl Into<String>,
        position: Vector3,
        max_speed: Option<f64>,
        max_autonomy_h: Option<f64>,
    ) -> Result<Self> {
        let (default_speed, default_autonomy, medium) = kind.defaults();
        // 水上艇は常に海面上
        let position = if kind == EntityKind::SurfaceVessel { position.with_z(0.0) } else { position };
        Self::build(
            name.into(),
            EntityClass::for_kind(kind),
            medium,
            position,
            max_speed.unwrap_or(default_speed),
            max_autonomy_h.unwrap_or(default_autonomy),
        )
    }

    pub fn reconnaissance_drone(name: impl Into<String>, position: Vector3) -> Result<Self> {
        Self::from_kind(EntityKind::ReconnaissanceDrone, name, position, None, None)
    }

    pub fn logistics_drone(name: impl Into<String>, position: Vector3) -> Result<Self> {
        Self::from_kind(EntityKind::LogisticsDrone, name, position, None, None)
    }

    pub fn surface_vessel(name: impl Into<String>, position: Vector3) -> Result<Self> {
        Self::from_kind(EntityKind::SurfaceVessel, name, position, None, None)
    }

    pub fn submersible(name: impl Into<String>, position: Vector3) -> Result<Self> {
        Self::from_kind(EntityKind::Submersible, name, position, None, None)
    }

    fn build(
        name: String,
        class: EntityClass,
        medium: Medium,
        position: Vector3,
        max_speed: f64,
        max_autonomy_h: f64,
    ) -> Result<Self> {
        if !position.is_finite() {
            return Err(ModelError::NonFinitePosition(position.x, position.y, position.z));
        }
        if !(max_speed > 0.0) {
            return Err(ModelError::NonPositiveSpeed(max_speed));
        }
        if !(max_autonomy_h > 0.0) {
            return Err(ModelError::NonPositiveAutonomy(max_autonomy_h));
        }
        if name.trim().is_empty() {
            return Err(ModelError::EmptyLabel);
        }
        medium.validate()?;
        if !medium.accepts_vertical(position.z) {
            return Err(ModelError::InvalidVerticalPosition(position.z));
        }

        Ok(Self {
            id: EntityId::new(),
            name,
            class,
            medium,
            position,
            max_speed,
            max_autonomy_h,
            autonomy: 100.0,
            state: OperationalState::Grounded,
            running: false,
            alerts: Vec::new(),
            inbox: Vec::new(),
        })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.class.kind()
    }

    pub fn class(&self) -> &EntityClass {
        &self.class
    }

    pub fn medium(&self) -> &Medium {
        &self.medium
    }

    pub fn position(&self) -> Vector3 {
        self.position
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn max_autonomy_hours(&self) -> f64 {
        self.max_autonomy_h
    }

    pub fn state(&self) -> OperationalState {
        self.state
    }

    /// 運用状態を外部から設定する（任務完了時の待機復帰など）
    pub fn set_state(&mut self, state: OperationalState) {
        self.state = state;
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn inbox(&self) -> &[String] {
        &self.inbox
    }

    /// 高度（航空機）または深度（艇）
    pub fn vertical_reading(&self) -> f64 {
        match self.medium {
            Medium::Aerial { .. } => self.position.z,
            Medium::Marine { .. } => self.position.depth(),
        }
    }

    /// 自律量が危険域にある、または故障している
    pub fn is_critical(&self) -> bool {
        self.autonomy < CRITICAL_AUTONOMY_PCT || self.state == OperationalState::Failed
    }

    /// 故障・整備状態から待機状態に戻す（外部修理）
    pub fn repair(&mut self) -> bool {
        match self.state {
            OperationalState::Failed | OperationalState::Maintenance => {
                self.state = OperationalState::Grounded;
                info!(entity_id = %self.id, entity_name = %self.name, "ENTITY_REPAIRED: 移動体が修理され待機状態に戻りました");
                true
            }
            _ => false,
        }
    }

    /// 待機中の移動体を整備に回す
    pub fn send_to_maintenance(&mut self) -> bool {
        if self.state != OperationalState::Grounded {
            return false;
        }
        self.state = OperationalState::Maintenance;
        true
    }

    /// 他の移動体からのメッセージを受信
    pub fn receive_message(&mut self, from: &str, text: &str) {
        let message = format!("{from}: {text}");
        debug!(entity_id = %self.id, message = %message, "ENTITY_MESSAGE: メッセージを受信しました");
        self.inbox.push(message);
    }

    /// 積載（物流ドローンのみ）
    pub fn load_payload(&mut self, kg: f64) -> bool {
        match &mut self.class {
            EntityClass::Logistics(payload) if kg >= 0.0 && payload.load_kg + kg <= payload.capacity_kg => {
                payload.load_kg += kg;
                true
            }
            _ => false,
        }
    }

    /// 荷降ろし（物流ドローンのみ）
    pub fn unload_payload(&mut self, kg: f64) -> bool {
        match &mut self.class {
            EntityClass::Logistics(payload) if kg >= 0.0 && kg <= payload.load_kg => {
                payload.load_kg -= kg;
                true
            }
            _ => false,
        }
    }

    /// 重大アラートを発報し、記録する
    pub fn raise_alert(&mut self, kind: AlertKind) {
        warn!(
            entity_id = %self.id,
            entity_name = %self.name,
            alert = %kind,
            position_x = self.position.x,
            position_y = self.position.y,
            position_z = self.position.z,
            autonomy = self.autonomy,
            state = %self.state,
            "CRITICAL_ALERT: 重大アラートが発生しました"
        );
        self.alerts.push(Alert { kind, position: self.position, raised_at: Utc::now() });
    }

    /// 故障状態へ強制遷移する
    pub fn force_failure(&mut self, kind: AlertKind) {
        self.state = OperationalState::Failed;
        self.running = false;
        self.raise_alert(kind);
    }

    /// 指定距離の移動に必要なエネルギー（自律量%）
    ///
    /// 基本消費 0.4%/km に媒体と機種の係数を掛けます。
    /// 降水は現在位置で観測されるもの（降水域の指定があればその内側のみ）を使います。
    pub fn consumption_for(&self, distance: f64, env: &EnvironmentFields) -> f64 {
        let mut consumption = (distance / 1000.0) * BASE_CONSUMPTION_PER_KM;

        match self.medium {
            Medium::Aerial { max_altitude, wind_sensitivity } => {
                consumption *= 1.0 + (env.wind.intensity() / 100.0) * wind_sensitivity;
                let precipitation = env.precipitation_at(&self.position);
                if precipitation.is_falling() {
                    consumption *= 1.0 + precipitation.intensity() / 200.0;
                }
                consumption *= 1.0 + (self.position.z / max_altitude) * 0.2;
            }
            Medium::Marine { max_depth, current_sensitivity } => {
                consumption *= 1.0 + (env.current.intensity() / 100.0) * current_sensitivity;
                if max_depth > 0.0 {
                    consumption *= 1.0 + (self.position.depth() / max_depth) * 0.3;
                }
            }
        }

        match &self.class {
            EntityClass::Logistics(payload) => {
                consumption *= 0.8;
                consumption *= 1.0 + payload.fill_ratio() * 0.5;
            }
            // 風による波浪
            EntityClass::SurfaceVessel { .. } => {
                consumption *= 1.0 + (env.wind.intensity() / 100.0) * 0.5;
            }
            _ => {}
        }

        consumption
    }

    /// 降水を考慮した実効最大速度
    pub fn effective_max_speed(&self, env: &EnvironmentFields) -> f64 {
        let intensity = env.precipitation_at(&self.position).intensity();
        if intensity > PRECIPITATION_SLOWDOWN_THRESHOLD {
            self.max_speed * (1.0 - (intensity - PRECIPITATION_SLOWDOWN_THRESHOLD) / 100.0)
        } else {
            self.max_speed
        }
    }

    /// 環境によるドリフト変位（航空機は風のXY成分、艇は海流の3軸）
    fn drift(&self, env: &EnvironmentFields, dt: f64) -> Vector3 {
        match self.medium {
            Medium::Aerial { .. } => {
                let wind = env.wind;
                wind.direction().with_z(0.0) * ((wind.intensity() / 100.0) * dt)
            }
            Medium::Marine { .. } => {
                let current = env.current;
                current.direction() * ((current.intensity() / 100.0) * dt)
            }
        }
    }

    /// 近傍の移動体から横方向に離れるよう推進方向を補正する
    fn steering_heading(&self, destination: &Vector3, distance_total: f64, area: &OperatingArea) -> Vector3 {
        let mut heading = (*destination - self.position) * (1.0 / distance_total);

        for neighbor in area.neighbors(self.id, &self.position, NEIGHBOR_DETECTION_RADIUS_M) {
            let other = neighbor.position();
            let distance = self.position.distance(&other);
            if distance >= STEERING_THRESHOLD_M {
                continue;
            }

            let lateral_x = self.position.x - other.x;
            let mut lateral_y = self.position.y - other.y;
            // Y方向にほぼ整列している場合は +Y 側に避ける
            if lateral_y.abs() < 1.0 {
                lateral_y += STEERING_LATERAL_BIAS_M;
            }
            let lateral_norm = (lateral_x * lateral_x + lateral_y * lateral_y).sqrt();
            if lateral_norm <= 0.0 {
                continue;
            }

            let force = (STEERING_THRESHOLD_M - distance) / STEERING_THRESHOLD_M;
            heading = Vector3::new(
                heading.x + (lateral_x / lateral_norm) * force,
                heading.y + (lateral_y / lateral_norm) * force,
                heading.z,
            )
            .normalized();

            trace!(
                entity_id = %self.id,
                neighbor_id = %neighbor.id(),
                neighbor_distance = distance,
                steering_force = force,
                "ENTITY_STEERING: 近傍の移動体を回避しています"
            );
        }

        heading
    }

    /// 変位を約10mのサブステップに分割し、障害物と進入禁止区域を検査する
    fn integrate_substeps(&self, displacement: Vector3, area: &OperatingArea) -> SubstepOutcome {
        let steps = (displacement.norm() / SUBSTEP_LENGTH_M).ceil().max(1.0) as usize;
        let step = displacement * (1.0 / steps as f64);
        let mut current = self.position;

        for _ in 0..steps {
            let mut next = current + step;

            for obstacle in area.obstacles() {
                if !obstacle.contains(&next) {
                    continue;
                }
                // 上空通過
                if current.z > obstacle.z_max() + FLYOVER_MARGIN_M {
                    continue;
                }

                let center = obstacle.center();
                let offset_x = next.x - center.x;
                let offset_y = next.y - center.y;
                let distance = (offset_x * offset_x + offset_y * offset_y).sqrt();
                if distance <= OBSTACLE_CORE_M {
                    return SubstepOutcome::Collided {
                        last_valid: current,
                        hazard: obstacle.label().to_string(),
                    };
                }

                // 外向き法線に押し出し、右手側の接線方向へ滑らせる
                let (normal_x, normal_y) = (offset_x / distance, offset_y / distance);
                let (tangent_x, tangent_y) = (-normal_y, normal_x);
                let penetration = obstacle.radius() - distance + OBSTACLE_SAFETY_MARGIN_M;
                next = Vector3::new(
                    next.x + normal_x * penetration + tangent_x * OBSTACLE_SLIDE_M,
                    next.y + normal_y * penetration + tangent_y * OBSTACLE_SLIDE_M,
                    next.z,
                );
            }

            if let Some(zone) = area.exclusion_zone_at(&next) {
                return SubstepOutcome::Collided {
                    last_valid: current,
                    hazard: zone.label().to_string(),
                };
            }

            current = next;
        }

        SubstepOutcome::Clear(current)
    }

    /// 位置が運用エリアと鉛直制約を満たす場合のみ確定する
    fn commit_position(&mut self, candidate: Vector3, area: &OperatingArea) -> bool {
        if !area.contains(&candidate) || !self.medium.accepts_vertical(candidate.z) {
            debug!(
                entity_id = %self.id,
                candidate_x = candidate.x,
                candidate_y = candidate.y,
                candidate_z = candidate.z,
                "ENTITY_MOVE_REJECTED: 移動先がエリア外または鉛直制約外のため確定しません"
            );
            return false;
        }
        self.position = candidate;
        true
    }

    /// 自律量を使い切って故障する
    fn exhaust(&mut self) {
        self.autonomy = 0.0;
        warn!(entity_id = %self.id, entity_name = %self.name, "ENTITY_OUT_OF_ENERGY: 移動体のエネルギーが尽きました");
        self.force_failure(AlertKind::BatteryCritical);
    }

    /// クランプ済み目的地へ向けた直線の部分移動（燃料切れ時）
    fn partial_move(&mut self, destination: &Vector3, distance_total: f64, distance: f64, area: &OperatingArea) {
        let ratio = (distance / distance_total).min(1.0);
        let candidate = self.position + (*destination - self.position) * ratio;
        self.commit_position(candidate, area);
    }

    /// 経過時間 `dt` 秒の間、目標に向けて移動する
    ///
    /// 目的地のクランプ、近傍回避操舵、降水による減速、エネルギー消費、
    /// 環境ドリフト、サブステップ衝突判定を順に適用します。
    ///
    /// # 戻り値
    ///
    /// このティックで目標に到達した場合は `true`。部分的な前進や拒否・故障は `false`
    pub fn advance(&mut self, target: Vector3, dt: f64, area: &OperatingArea) -> bool {
        if !target.is_finite() || !(dt > 0.0) {
            return false;
        }
        if self.state == OperationalState::Failed || self.autonomy <= 0.0 {
            if self.autonomy <= 0.0 {
                self.raise_alert(AlertKind::BatteryCritical);
            }
            return false;
        }
        if !self.medium.accepts_vertical(target.z) {
            self.raise_alert(self.medium.vertical_alert());
            return false;
        }

        let env = area.environment();
        let distance_to_target = self.position.distance(&target);

        // 1. 目的地クランプ
        let destination = area.clamped_destination(self.id, &self.position, &target, self.position.z);
        let distance_total = self.position.distance(&destination);

        // 2. クランプ済み目的地に到着済み
        if distance_total < ARRIVAL_EPSILON_M {
            return true;
        }

        // 3-4. 推進方向と回避操舵
        let heading = self.steering_heading(&destination, distance_total, area);

        // 5-6. 実効速度と必要エネルギー
        let reach = self.effective_max_speed(env) * dt;
        let stroke = distance_total.min(reach);
        let consumption = self.consumption_for(stroke, env);

        // 7. エネルギー不足
        if consumption > self.autonomy {
            let residual = reach * (self.autonomy / consumption);
            self.exhaust();
            if residual > MIN_RESIDUAL_MOVE_M {
                self.partial_move(&destination, distance_total, residual, area);
            }
            return false;
        }

        // 8-9. 推進変位 + ドリフト
        let displacement = heading * stroke + self.drift(env, dt);

        // 10. サブステップ。鉛直方向のドリフトは制約内に収める
        let end = match self.integrate_substeps(displacement, area) {
            SubstepOutcome::Clear(end) => end.with_z(self.medium.clamp_vertical(end.z)),
            SubstepOutcome::Collided { last_valid, hazard } => {
                self.consume_autonomy(consumption);
                self.commit_position(last_valid, area);
                warn!(
                    entity_id = %self.id,
                    entity_name = %self.name,
                    hazard = %hazard,
                    position_x = self.position.x,
                    position_y = self.position.y,
                    position_z = self.position.z,
                    "ENTITY_COLLISION: 移動体が衝突または進入禁止区域に侵入しました"
                );
                self.force_failure(AlertKind::SystemFailure);
                return false;
            }
        };

        // 11-12. 境界確認、確定後に消費。拒否されたティックはエネルギーを消費しない
        if !self.commit_position(end, area) {
            return false;
        }
        self.consume_autonomy(consumption);

        trace!(
            entity_id = %self.id,
            position_x = self.position.x,
            position_y = self.position.y,
            position_z = self.position.z,
            autonomy = self.autonomy,
            consumption = consumption,
            "ENTITY_ADVANCE: 移動体が前進しました"
        );

        distance_to_target <= reach
    }

    /// 目標位置への瞬時移動（ドリフト・サブステップなし）
    ///
    /// 鉛直制約、エネルギー、エリア境界のいずれかを満たさない場合は拒否します。
    pub fn move_to(&mut self, target: Vector3, area: &OperatingArea) -> bool {
        let target = match self.class {
            EntityClass::SurfaceVessel { .. } => target.with_z(0.0),
            _ => target,
        };
        if !target.is_finite() {
            return false;
        }

        if !self.medium.accepts_vertical(target.z) {
            self.raise_alert(self.medium.vertical_alert());
            return false;
        }

        let consumption = self.consumption_for(self.position.distance(&target), area.environment());
        if consumption > self.autonomy {
            self.raise_alert(AlertKind::BatteryCritical);
            return false;
        }

        if !area.contains(&target) {
            self.raise_alert(AlertKind::RestrictedZone);
            return false;
        }

        self.position = target;
        self.consume_autonomy(consumption);
        true
    }

    /// 指定深度まで潜航する（海洋移動体のみ）
    pub fn dive(&mut self, depth: f64, area: &OperatingArea) -> bool {
        match self.medium {
            Medium::Marine { max_depth, .. } if (0.0..=max_depth).contains(&depth) => {
                self.move_to(self.position.with_z(-depth), area)
            }
            _ => false,
        }
    }

    /// 海面へ浮上する（海洋移動体のみ）
    pub fn surface(&mut self, area: &OperatingArea) -> bool {
        if !self.medium.is_marine() {
            return false;
        }
        self.move_to(self.position.with_z(0.0), area)
    }

    /// 人間が読める概要
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl Pilotable for MobileEntity {
    fn start(&mut self) -> bool {
        match self.state {
            OperationalState::Failed | OperationalState::Maintenance => {
                debug!(entity_id = %self.id, state = %self.state, "ENTITY_START_REJECTED: 故障中または整備中のため始動できません");
                false
            }
            _ => {
                self.running = true;
                if self.state == OperationalState::Grounded {
                    self.state = OperationalState::Active;
                }
                true
            }
        }
    }

    fn stop(&mut self) -> bool {
        self.running = false;
        if self.state == OperationalState::Active {
            self.state = OperationalState::Grounded;
        }
        true
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

impl Rechargeable for MobileEntity {
    fn recharge(&mut self) {
        self.autonomy = 100.0;
        if self.state == OperationalState::Grounded {
            info!(entity_id = %self.id, entity_name = %self.name, "ENTITY_RECHARGED: 移動体が100%まで充電されました");
        }
    }

    fn consume_autonomy(&mut self, amount: f64) {
        let was_critical = self.autonomy < CRITICAL_AUTONOMY_PCT;
        self.autonomy = (self.autonomy - amount).max(0.0);
        if self.autonomy <= 0.0 {
            self.force_failure(AlertKind::BatteryCritical);
        } else if self.autonomy < CRITICAL_AUTONOMY_PCT && !was_critical {
            self.raise_alert(AlertKind::BatteryCritical);
        }
    }

    fn autonomy_remaining(&self) -> f64 {
        self.autonomy
    }
}

impl fmt::Display for MobileEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[id={}, name={}, position={}, autonomy={:.1}%, state={}]",
            self.kind().as_str(),
            self.id,
            self.name,
            self.position,
            self.autonomy,
            self.state
        )?;
        match self.medium {
            Medium::Aerial { max_altitude, .. } => {
                write!(f, "[altitude={:.1}m, max_altitude={:.1}m]", self.position.z, max_altitude)
            }
            Medium::Marine { max_depth, .. } => {
                write!(f, "[depth={:.1}m, max_depth={:.1}m]", self.position.depth() + 0.0, max_depth)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        environment::{MarineCurrent, Precipitation, PrecipitationKind, Wind},
        hazard::{ExclusionZone, Obstacle},
    };

    fn wide_area() -> OperatingArea {
        OperatingArea::new(Vector3::new(-10000.0, -10000.0, -2000.0), Vector3::new(50000.0, 50000.0, 5000.0))
            .unwrap()
    }

    #[test]
    fn test_construction_validation() {
        assert_eq!(
            MobileEntity::aerial("a", Vector3::ZERO, 0.0, 1.0, 100.0, 1.0).unwrap_err(),
            ModelError::NonPositiveSpeed(0.0)
        );
        assert_eq!(
            MobileEntity::aerial("a", Vector3::ZERO, 10.0, -1.0, 100.0, 1.0).unwrap_err(),
            ModelError::NonPositiveAutonomy(-1.0)
        );
        assert_eq!(
            MobileEntity::aerial("a", Vector3::ZERO, 10.0, 1.0, 0.0, 1.0).unwrap_err(),
            ModelError::NonPositiveAltitude(0.0)
        );
        assert_eq!(
            MobileEntity::marine("m", Vector3::ZERO, 10.0, 1.0, -5.0, 1.0).unwrap_err(),
            ModelError::NegativeDepth(-5.0)
        );
        assert!(MobileEntity::aerial("a", Vector3::new(f64::NAN, 0.0, 0.0), 10.0, 1.0, 100.0, 1.0).is_err());
        // 地中からは始められない
        assert_eq!(
            MobileEntity::aerial("a", Vector3::new(0.0, 0.0, -10.0), 10.0, 1.0, 100.0, 1.0).unwrap_err(),
            ModelError::InvalidVerticalPosition(-10.0)
        );
    }

    #[test]
    fn test_new_entity_defaults() {
        let drone = MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 100.0)).unwrap();
        assert_eq!(drone.state(), OperationalState::Grounded);
        assert_eq!(drone.autonomy_remaining(), 100.0);
        assert!(!drone.is_running());
        assert_eq!(drone.max_speed(), 80.0);
        assert_eq!(drone.kind(), EntityKind::ReconnaissanceDrone);

        let vessel = MobileEntity::surface_vessel("boat-1", Vector3::new(10.0, 10.0, 25.0)).unwrap();
        assert_eq!(vessel.position().z, 0.0);
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let mut drone = MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 100.0)).unwrap();
        assert!(drone.start());
        assert_eq!(drone.state(), OperationalState::Active);
        assert!(drone.is_running());
        assert!(drone.stop());
        assert_eq!(drone.state(), OperationalState::Grounded);

        drone.force_failure(AlertKind::SystemFailure);
        assert!(!drone.start());
        assert!(drone.repair());
        assert_eq!(drone.state(), OperationalState::Grounded);

        assert!(drone.send_to_maintenance());
        assert!(!drone.start());
    }

    #[test]
    fn test_consume_autonomy_to_zero_fails_entity() {
        let mut drone = MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 100.0)).unwrap();
        drone.consume_autonomy(85.0);
        assert!(drone.is_critical());
        assert_eq!(drone.alerts().last().map(|a| a.kind), Some(AlertKind::BatteryCritical));
        drone.consume_autonomy(50.0);
        assert_eq!(drone.autonomy_remaining(), 0.0);
        assert_eq!(drone.state(), OperationalState::Failed);

        drone.recharge();
        assert_eq!(drone.autonomy_remaining(), 100.0);
        // 充電だけでは故障から復帰しない
        assert_eq!(drone.state(), OperationalState::Failed);
    }

    #[test]
    fn test_wind_drift() {
        let mut area = wide_area();
        area.set_wind(Wind::new(Vector3::new(0.0, 1.0, 0.0), 100.0).unwrap());
        let mut drone = MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 1000.0)).unwrap();
        drone.start();

        drone.advance(Vector3::new(1000.0, 0.0, 1000.0), 1.0, &area);

        let position = drone.position();
        assert!(position.x > 0.0);
        assert!(position.y > 0.0);
        assert_eq!(drone.state(), OperationalState::Active);
    }

    #[test]
    fn test_stops_before_obstacle() {
        let mut area = OperatingArea::new(Vector3::new(-1000.0, -1000.0, -100.0), Vector3::new(5000.0, 5000.0, 5000.0))
            .unwrap();
        area.add_obstacle(Obstacle::new(Vector3::new(100.0, 0.0, 0.0), 20.0, "rock").unwrap());
        let mut boat = MobileEntity::surface_vessel("boat-1", Vector3::ZERO).unwrap();
        boat.start();

        boat.advance(Vector3::new(100.0, 0.0, 0.0), 5.0, &area);

        assert!(boat.position().x <= 80.0);
        assert_eq!(boat.state(), OperationalState::Active);
    }

    #[test]
    fn test_flyover_above_obstacle() {
        let mut area = wide_area();
        area.add_obstacle(
            Obstacle::with_vertical_range(Vector3::new(40.0, 0.0, 0.0), 20.0, 0.0, 100.0, "mast").unwrap(),
        );
        let mut drone = MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 500.0)).unwrap();
        drone.start();

        let reached = drone.advance(Vector3::new(60.0, 0.0, 500.0), 1.0, &area);

        assert!(reached);
        assert!((drone.position().x - 60.0).abs() < 1e-6);
    }

    #[test]
    fn test_slides_around_obstacle_on_path() {
        let mut area = wide_area();
        // 目的地は障害物の外なのでクランプされず、経路上で押し出される
        area.add_obstacle(Obstacle::new(Vector3::new(50.0, 1.0, 0.0), 10.0, "buoy").unwrap());
        let mut boat = MobileEntity::surface_vessel("boat-1", Vector3::ZERO).unwrap();
        boat.start();

        boat.advance(Vector3::new(100.0, 0.0, 0.0), 5.0, &area);

        assert_eq!(boat.state(), OperationalState::Active);
        assert!(boat.position().x > 60.0);
        assert!(boat.position().distance_xy(&Vector3::new(50.0, 1.0, 0.0)) >= 10.0);
    }

    #[test]
    fn test_exclusion_zone_entry_is_fatal() {
        let mut area = wide_area();
        area.add_exclusion_zone(ExclusionZone::new(Vector3::new(50.0, 0.0, 100.0), 10.0, "range").unwrap());
        let mut drone = MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 100.0)).unwrap();
        drone.start();

        let reached = drone.advance(Vector3::new(100.0, 0.0, 100.0), 1.0, &area);

        assert!(!reached);
        assert_eq!(drone.state(), OperationalState::Failed);
        assert_eq!(drone.alerts().last().map(|a| a.kind), Some(AlertKind::SystemFailure));
        // 侵入したサブステップより先には進まない
        assert!(drone.position().x <= 40.0 + 1e-9);
        assert!(!drone.advance(Vector3::new(100.0, 0.0, 100.0), 1.0, &area));
    }

    #[test]
    fn test_energy_decreases_by_computed_consumption() {
        let mut area = wide_area();
        area.set_wind(Wind::new(Vector3::new(1.0, 0.0, 0.0), 30.0).unwrap());
        let mut drone = MobileEntity::logistics_drone("cargo-1", Vector3::new(0.0, 0.0, 300.0)).unwrap();
        assert!(drone.load_payload(25.0));
        drone.start();

        let before = drone.autonomy_remaining();
        let expected = drone.consumption_for(35.0, area.environment());
        drone.advance(Vector3::new(10000.0, 0.0, 300.0), 1.0, &area);

        assert!(drone.autonomy_remaining() < before);
        assert!((before - drone.autonomy_remaining() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_consumption_model_multipliers() {
        let mut env = EnvironmentFields::default();
        let sub = MobileEntity::submersible("sub-1", Vector3::new(0.0, 0.0, -500.0)).unwrap();
        // 1km, 深度 500/1000 → ×1.15
        assert!((sub.consumption_for(1000.0, &env) - 0.4 * 1.15).abs() < 1e-12);

        env.current = MarineCurrent::new(Vector3::new(1.0, 0.0, 0.0), 50.0).unwrap();
        assert!((sub.consumption_for(1000.0, &env) - 0.4 * 1.5 * 1.15).abs() < 1e-12);

        env.precipitation = Precipitation::new(PrecipitationKind::HeavyRain, 100.0).unwrap();
        let drone = MobileEntity::aerial("a", Vector3::ZERO, 10.0, 1.0, 1000.0, 1.0).unwrap();
        assert!((drone.consumption_for(1000.0, &env) - 0.4 * 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_heavy_rain_reduces_speed() {
        let mut env = EnvironmentFields::default();
        let drone = MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 100.0)).unwrap();
        env.precipitation = Precipitation::new(PrecipitationKind::LightRain, 40.0).unwrap();
        assert_eq!(drone.effective_max_speed(&env), 80.0);
        env.precipitation = Precipitation::new(PrecipitationKind::HeavyRain, 100.0).unwrap();
        assert!((drone.effective_max_speed(&env) - 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_energy_exhaustion_mid_tick() {
        let area = wide_area();
        let mut drone = MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 0.0)).unwrap();
        drone.start();
        drone.consume_autonomy(100.0 - 0.01);

        let reached = drone.advance(Vector3::new(10000.0, 0.0, 0.0), 10.0, &area);

        assert!(!reached);
        assert_eq!(drone.autonomy_remaining(), 0.0);
        assert_eq!(drone.state(), OperationalState::Failed);
        // 0.01% は 25m 分
        assert!(drone.position().x > 0.0 && drone.position().x < 30.0);
    }

    #[test]
    fn test_rejects_tick_leaving_vertical_limits() {
        let area = wide_area();
        let mut drone = MobileEntity::aerial("a", Vector3::new(0.0, 0.0, 90.0), 50.0, 1.0, 100.0, 0.0).unwrap();
        drone.start();

        let reached = drone.advance(Vector3::new(0.0, 0.0, 200.0), 1.0, &area);

        assert!(!reached);
        assert_eq!(drone.position().z, 90.0);
        assert_eq!(drone.state(), OperationalState::Active);
        assert_eq!(drone.autonomy_remaining(), 100.0);
        assert_eq!(drone.alerts().last().map(|a| a.kind), Some(AlertKind::InvalidAltitude));
    }

    #[test]
    fn test_unreachable_altitude_does_not_drain_vessel() {
        let area = wide_area();
        let mut boat = MobileEntity::surface_vessel("boat-1", Vector3::ZERO).unwrap();
        boat.start();

        for _ in 0..100 {
            assert!(!boat.advance(Vector3::new(1000.0, 0.0, 300.0), 1.0, &area));
        }

        assert_eq!(boat.position(), Vector3::ZERO);
        assert_eq!(boat.autonomy_remaining(), 100.0);
        assert_eq!(boat.state(), OperationalState::Active);
        assert_eq!(boat.alerts().last().map(|a| a.kind), Some(AlertKind::InvalidDepth));
    }

    #[test]
    fn test_upward_current_keeps_submersible_below_surface() {
        let mut area = wide_area();
        area.set_current(MarineCurrent::new(Vector3::new(0.0, 0.0, 1.0), 100.0).unwrap());
        let mut sub = MobileEntity::submersible("sub-1", Vector3::new(0.0, 0.0, -1.0)).unwrap();
        sub.start();

        for _ in 0..5 {
            sub.advance(Vector3::new(500.0, 0.0, -1.0), 1.0, &area);
            assert!(sub.position().z <= 0.0);
            assert!(sub.medium().accepts_vertical(sub.position().z));
        }

        assert!(sub.position().x > 0.0);
        assert!(sub.autonomy_remaining() < 100.0);
        assert_eq!(sub.state(), OperationalState::Active);
    }

    #[test]
    fn test_rejects_tick_leaving_area() {
        let area = OperatingArea::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(100.0, 100.0, 500.0)).unwrap();
        let mut drone = MobileEntity::reconnaissance_drone("recon-1", Vector3::new(90.0, 50.0, 100.0)).unwrap();
        drone.start();

        assert!(!drone.advance(Vector3::new(400.0, 50.0, 100.0), 1.0, &area));
        assert_eq!(drone.position(), Vector3::new(90.0, 50.0, 100.0));
        assert_eq!(drone.autonomy_remaining(), 100.0);
    }

    #[test]
    fn test_obstacle_center_is_hard_collision() {
        let mut area = wide_area();
        area.add_obstacle(Obstacle::new(Vector3::new(5.0, 0.0, 0.0), 20.0, "reef").unwrap());
        let mut boat = MobileEntity::surface_vessel("boat-1", Vector3::ZERO).unwrap();
        boat.start();

        let reached = boat.advance(Vector3::new(5.0, 0.0, 0.0), 1.0, &area);

        assert!(!reached);
        assert_eq!(boat.state(), OperationalState::Failed);
        assert_eq!(boat.alerts().last().map(|a| a.kind), Some(AlertKind::SystemFailure));
        assert_eq!(boat.position(), Vector3::ZERO);
    }

    #[test]
    fn test_exhausted_entity_reraises_battery_alert() {
        let area = wide_area();
        let mut drone = MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 100.0)).unwrap();
        drone.start();
        drone.consume_autonomy(100.0);
        let raised = drone.alerts().len();

        assert!(!drone.advance(Vector3::new(100.0, 0.0, 100.0), 1.0, &area));
        assert_eq!(drone.alerts().len(), raised + 1);
        assert_eq!(drone.alerts().last().map(|a| a.kind), Some(AlertKind::BatteryCritical));
        assert_eq!(drone.position(), Vector3::new(0.0, 0.0, 100.0));
    }

    #[test]
    fn test_advance_short_circuits() {
        let area = wide_area();
        let mut drone = MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 100.0)).unwrap();
        assert!(!drone.advance(Vector3::new(10.0, 0.0, 100.0), 0.0, &area));
        assert!(!drone.advance(Vector3::new(f64::NAN, 0.0, 100.0), 1.0, &area));
        // 1m 未満は到着扱い
        assert!(drone.advance(Vector3::new(0.5, 0.0, 100.0), 1.0, &area));
        assert_eq!(drone.autonomy_remaining(), 100.0);
    }

    #[test]
    fn test_direct_move_and_dive() {
        let area = wide_area();
        let mut sub = MobileEntity::submersible("sub-1", Vector3::ZERO).unwrap();
        assert!(sub.dive(300.0, &area));
        assert_eq!(sub.vertical_reading(), 300.0);
        assert!(!sub.dive(1500.0, &area));
        assert!(sub.surface(&area));
        assert_eq!(sub.position().z, 0.0);

        let mut drone = MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 100.0)).unwrap();
        assert!(!drone.move_to(Vector3::new(0.0, 0.0, 6000.0), &area));
        assert_eq!(drone.alerts().last().map(|a| a.kind), Some(AlertKind::InvalidAltitude));
        assert!(!drone.move_to(Vector3::new(90000.0, 0.0, 100.0), &area));
        assert_eq!(drone.alerts().last().map(|a| a.kind), Some(AlertKind::RestrictedZone));
        assert!(drone.move_to(Vector3::new(1000.0, 0.0, 100.0), &area));
        assert!(drone.autonomy_remaining() < 100.0);
    }

    #[test]
    fn test_payload_limits() {
        let mut cargo = MobileEntity::logistics_drone("cargo-1", Vector3::ZERO).unwrap();
        assert!(!cargo.load_payload(-1.0));
        assert!(cargo.load_payload(50.0));
        assert!(!cargo.load_payload(0.5));
        assert!(!cargo.unload_payload(60.0));
        assert!(cargo.unload_payload(20.0));

        let mut drone = MobileEntity::reconnaissance_drone("recon-1", Vector3::ZERO).unwrap();
        assert!(!drone.load_payload(1.0));
    }

    #[test]
    fn test_summary_mentions_vertical_reading() {
        let sub = MobileEntity::submersible("sub-1", Vector3::new(0.0, 0.0, -42.0)).unwrap();
        let summary = sub.summary();
        assert!(summary.starts_with("Submersible["));
        assert!(summary.contains("depth=42.0m"));

        let boat = MobileEntity::surface_vessel("boat-1", Vector3::ZERO).unwrap();
        assert!(boat.summary().contains("[depth=0.0m, max_depth=0.0m]"));
    }
}
