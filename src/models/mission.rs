use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ModelError, Result};
use crate::models::{
    area::OperatingArea,
    common::{OperationalState, Vector3},
    entity::{EntityClass, EntityId, MobileEntity},
    fleet::Swarm,
    traits::{Pilotable, Rechargeable},
};

/// 救助の接近完了距離（m）
const RESCUE_APPROACH_DISTANCE_M: f64 = 50.0;
/// 対象の充電が完了したとみなす自律量（%）
const RESCUE_TRANSFER_COMPLETE_PCT: f64 = 99.0;
/// 移送中にティックごとに作業を終える確率
const RESCUE_TRANSFER_CONCLUDE_PROBABILITY: f64 = 0.1;

/// 任務状態
///
/// `Planned → Active → Completed` と、`Planned | Active → Cancelled` のみ遷移します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Planned,
    Active,
    Completed,
    Cancelled,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "PLANNED",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

impl fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 任務の種類と目標
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MissionKind {
    /// 任意の移動体による地点監視
    Surveillance { destination: Vector3 },
    /// 航空移動体のみによる偵察
    AerialReconnaissance { destination: Vector3 },
    /// 潜水艇のみによる海底点検
    SubseaInspection { destination: Vector3 },
    /// 指定移動体の捜索救助
    SearchAndRescue { target: EntityId },
}

impl MissionKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Surveillance { .. } => "Surveillance",
            Self::AerialReconnaissance { .. } => "AerialReconnaissance",
            Self::SubseaInspection { .. } => "SubseaInspection",
            Self::SearchAndRescue { .. } => "SearchAndRescue",
        }
    }

    /// ウェイポイント型任務の目的地
    pub fn destination(&self) -> Option<Vector3> {
        match *self {
            Self::Surveillance { destination }
            | Self::AerialReconnaissance { destination }
            | Self::SubseaInspection { destination } => Some(destination),
            Self::SearchAndRescue { .. } => None,
        }
    }

    /// 到着とみなす距離（m）
    pub fn arrival_tolerance(&self) -> f64 {
        match self {
            Self::SubseaInspection { .. } => 50.0,
            _ => 100.0,
        }
    }

    fn objective(&self) -> String {
        match self {
            Self::Surveillance { destination } => format!("地点 {destination} の監視"),
            Self::AerialReconnaissance { destination } => format!("地点 {destination} の航空偵察"),
            Self::SubseaInspection { destination } => format!("地点 {destination} の海底点検"),
            Self::SearchAndRescue { target } => format!("移動体 {target} の捜索救助"),
        }
    }
}

/// 中止時に割り当て済み移動体をどう扱うか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelPolicy {
    /// 移動体の状態は変更しない
    #[default]
    LeaveRunning,
    /// 任務中の移動体を停止し待機状態に戻す
    StopEntities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RescuePhase {
    Approach,
    Transfer,
    Return,
}

/// 救助者ごとの進行状況
#[derive(Debug, Clone, Copy, PartialEq)]
struct RescueLeg {
    phase: RescuePhase,
    home: Vector3,
}

/// 任務
///
/// 割り当てられた移動体の組を、状態機械に従って目標へ導きます。
/// 任務は移動体を所有せず識別子で参照し、運用エリアを明示的に受け取って操作します。
#[derive(Debug, Clone)]
pub struct Mission {
    id: Uuid,
    kind: MissionKind,
    status: MissionStatus,
    scheduled_start: DateTime<Utc>,
    scheduled_end: DateTime<Utc>,
    actual_start: Option<DateTime<Utc>>,
    actual_end: Option<DateTime<Utc>>,
    assigned: Vec<EntityId>,
    arrived: BTreeSet<EntityId>,
    rescue_legs: BTreeMap<EntityId, RescueLeg>,
    expected_result: String,
    obtained_result: Option<String>,
    rng: StdRng,
}

impl Mission {
    /// 任務を作成
    ///
    /// 予定開始時刻は予定終了時刻より前である必要があり、目的地は有限の座標である必要があります。
    pub fn new(kind: MissionKind, scheduled_start: DateTime<Utc>, scheduled_end: DateTime<Utc>) -> Result<Self> {
        if scheduled_start >= scheduled_end {
            return Err(ModelError::ScheduleOrder);
        }
        if let Some(destination) = kind.destination() {
            if !destination.is_finite() {
                return Err(ModelError::NonFinitePosition(destination.x, destination.y, destination.z));
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            status: MissionStatus::Planned,
            scheduled_start,
            scheduled_end,
            actual_start: None,
            actual_end: None,
            assigned: Vec::new(),
            arrived: BTreeSet::new(),
            rescue_legs: BTreeMap::new(),
            expected_result: kind.objective(),
            obtained_result: None,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn surveillance(start: DateTime<Utc>, end: DateTime<Utc>, destination: Vector3) -> Result<Self> {
        Self::new(MissionKind::Surveillance { destination }, start, end)
    }

    pub fn aerial_reconnaissance(start: DateTime<Utc>, end: DateTime<Utc>, destination: Vector3) -> Result<Self> {
        Self::new(MissionKind::AerialReconnaissance { destination }, start, end)
    }

    pub fn subsea_inspection(start: DateTime<Utc>, end: DateTime<Utc>, destination: Vector3) -> Result<Self> {
        Self::new(MissionKind::SubseaInspection { destination }, start, end)
    }

    pub fn search_and_rescue(start: DateTime<Utc>, end: DateTime<Utc>, target: EntityId) -> Result<Self> {
        Self::new(MissionKind::SearchAndRescue { target }, start, end)
    }

    /// 乱数シードを固定する（再現可能な救助シミュレーション用）
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &MissionKind {
        &self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn status(&self) -> MissionStatus {
        self.status
    }

    pub fn objective(&self) -> &str {
        &self.expected_result
    }

    pub fn obtained_result(&self) -> Option<&str> {
        self.obtained_result.as_deref()
    }

    pub fn scheduled_start(&self) -> DateTime<Utc> {
        self.scheduled_start
    }

    pub fn scheduled_end(&self) -> DateTime<Utc> {
        self.scheduled_end
    }

    pub fn actual_start(&self) -> Option<DateTime<Utc>> {
        self.actual_start
    }

    pub fn actual_end(&self) -> Option<DateTime<Utc>> {
        self.actual_end
    }

    pub fn assigned(&self) -> &[EntityId] {
        &self.assigned
    }

    /// 到着済みの移動体
    pub fn arrived(&self) -> &BTreeSet<EntityId> {
        &self.arrived
    }

    /// 任務種別に対して移動体が適合するか
    pub fn is_compatible(&self, entity: &MobileEntity) -> bool {
        match self.kind {
            MissionKind::Surveillance { .. } => true,
            MissionKind::AerialReconnaissance { .. } => entity.medium().is_aerial(),
            MissionKind::SubseaInspection { .. } => matches!(entity.class(), EntityClass::Submersible { .. }),
            MissionKind::SearchAndRescue { target } => entity.id() != target,
        }
    }

    /// 移動体を割り当てる
    ///
    /// 計画中の任務に、未割り当てで待機中かつ適合する移動体のみ割り当てられます。
    pub fn assign(&mut self, id: EntityId, area: &OperatingArea) -> bool {
        if self.status != MissionStatus::Planned || self.assigned.contains(&id) {
            return false;
        }
        let Some(entity) = area.entity(id) else {
            return false;
        };
        if entity.state() != OperationalState::Grounded {
            debug!(mission_id = %self.id, entity_id = %id, state = %entity.state(), "MISSION_ASSIGN_REJECTED: 待機中でない移動体は割り当てられません");
            return false;
        }
        if !self.is_compatible(entity) {
            debug!(mission_id = %self.id, entity_id = %id, mission = self.name(), "MISSION_ASSIGN_REJECTED: 任務種別に適合しない移動体です");
            return false;
        }

        self.assigned.push(id);
        debug!(mission_id = %self.id, entity_id = %id, "MISSION_ASSIGNED: 移動体を任務に割り当てました");
        true
    }

    /// 複数の移動体を割り当てる。いずれかが成功すれば `true`
    pub fn assign_group(&mut self, ids: &[EntityId], area: &OperatingArea) -> bool {
        let mut any = false;
        for &id in ids {
            any |= self.assign(id, area);
        }
        any
    }

    /// 群の全構成員を割り当てる
    pub fn assign_swarm(&mut self, swarm: &Swarm, area: &OperatingArea) -> bool {
        self.assign_group(swarm.members(), area)
    }

    /// 任務を開始し、割り当て済みの移動体を始動する
    pub fn start(&mut self, area: &mut OperatingArea) -> bool {
        if self.status != MissionStatus::Planned {
            return false;
        }
        if self.assigned.is_empty() {
            warn!(mission_id = %self.id, mission = self.name(), "MISSION_START_REJECTED: 移動体が割り当てられていません");
            return false;
        }

        self.status = MissionStatus::Active;
        self.actual_start = Some(Utc::now());

        for &id in &self.assigned {
            let Some(entity) = area.entity_mut(id) else {
                continue;
            };
            entity.start();
            if matches!(self.kind, MissionKind::SearchAndRescue { .. }) {
                self.rescue_legs.insert(id, RescueLeg { phase: RescuePhase::Approach, home: entity.position() });
            }
        }

        info!(
            mission_id = %self.id,
            mission = self.name(),
            objective = %self.expected_result,
            assigned = self.assigned.len(),
            "MISSION_STARTED: 任務を開始しました"
        );
        true
    }

    /// 1ティック分の任務処理
    ///
    /// 実行中でなければ何もしません。未到着で待機状態の移動体は再始動されます。
    pub fn tick(&mut self, dt: f64, area: &mut OperatingArea) {
        if self.status != MissionStatus::Active {
            return;
        }
        self.resume_grounded(area);

        let kind = self.kind;
        match kind {
            MissionKind::SearchAndRescue { target } => self.tick_rescue(target, dt, area),
            kind => {
                if let Some(destination) = kind.destination() {
                    self.tick_waypoint(destination, kind.arrival_tolerance(), dt, area);
                }
            }
        }
    }

    fn resume_grounded(&self, area: &mut OperatingArea) {
        for &id in &self.assigned {
            if self.arrived.contains(&id) {
                continue;
            }
            if let Some(entity) = area.entity_mut(id) {
                if entity.state() == OperationalState::Grounded {
                    info!(mission_id = %self.id, entity_id = %id, "MISSION_RESUME: 待機中の移動体を再始動します");
                    entity.start();
                }
            }
        }
    }

    fn settle_arrival(&mut self, id: EntityId, area: &mut OperatingArea) {
        self.arrived.insert(id);
        if let Some(entity) = area.entity_mut(id) {
            entity.stop();
            entity.set_state(OperationalState::Grounded);
            info!(
                mission_id = %self.id,
                entity_id = %id,
                position = %entity.position(),
                autonomy = entity.autonomy_remaining(),
                "MISSION_ENTITY_ARRIVED: 移動体が目標に到着しました"
            );
        }
    }

    fn tick_waypoint(&mut self, destination: Vector3, tolerance: f64, dt: f64, area: &mut OperatingArea) {
        let mut pending = false;

        for id in self.assigned.clone() {
            if self.arrived.contains(&id) {
                continue;
            }
            match area.entity(id) {
                Some(entity) if entity.state() == OperationalState::Active => {}
                _ => continue,
            }

            let reached = area.advance_entity(id, destination, dt);
            let within = area
                .entity(id)
                .is_some_and(|e| e.position().distance(&destination) < tolerance);

            if reached || within {
                self.settle_arrival(id, area);
            } else {
                pending = true;
            }
        }

        if !pending && !self.arrived.is_empty() {
            let result = format!("{}: {} 機が到着", self.expected_result, self.arrived.len());
            self.complete(result, area);
        }
    }

    fn tick_rescue(&mut self, target: EntityId, dt: f64, area: &mut OperatingArea) {
        let mut pending = false;

        for id in self.assigned.clone() {
            if self.arrived.contains(&id) {
                continue;
            }
            let position = match area.entity(id) {
                Some(entity) if entity.state() == OperationalState::Active => entity.position(),
                _ => continue,
            };
            let leg = self
                .rescue_legs
                .entry(id)
                .or_insert(RescueLeg { phase: RescuePhase::Approach, home: position });

            match leg.phase {
                RescuePhase::Approach => {
                    pending = true;
                    let Some(target_position) = area.entity(target).map(|t| t.position()) else {
                        warn!(mission_id = %self.id, target_id = %target, "RESCUE_TARGET_LOST: 救助対象が見つかりません。帰還します");
                        leg.phase = RescuePhase::Return;
                        continue;
                    };
                    let reached = area.advance_entity(id, target_position, dt);
                    let close = area
                        .entity(id)
                        .is_some_and(|e| e.position().distance(&target_position) < RESCUE_APPROACH_DISTANCE_M);
                    if reached || close {
                        info!(mission_id = %self.id, entity_id = %id, target_id = %target, "RESCUE_APPROACHED: 救助対象に接近しました。移送を開始します");
                        leg.phase = RescuePhase::Transfer;
                    }
                }
                RescuePhase::Transfer => {
                    pending = true;
                    match area.entity_mut(target) {
                        Some(victim) if victim.autonomy_remaining() < RESCUE_TRANSFER_COMPLETE_PCT => {
                            victim.recharge();
                            debug!(mission_id = %self.id, entity_id = %id, target_id = %target, "RESCUE_TRANSFER: 救助対象にエネルギーを移送しました");
                            if self.rng.gen_bool(RESCUE_TRANSFER_CONCLUDE_PROBABILITY) {
                                leg.phase = RescuePhase::Return;
                            }
                        }
                        _ => leg.phase = RescuePhase::Return,
                    }
                    if leg.phase == RescuePhase::Return {
                        info!(mission_id = %self.id, entity_id = %id, home = %leg.home, "RESCUE_RETURNING: 移送を終え帰還します");
                    }
                }
                RescuePhase::Return => {
                    let home = leg.home;
                    if area.advance_entity(id, home, dt) {
                        self.settle_arrival(id, area);
                    } else {
                        pending = true;
                    }
                }
            }
        }

        if !pending && !self.arrived.is_empty() {
            let result = format!("{}: {} 機が帰還", self.expected_result, self.arrived.len());
            self.complete(result, area);
        }
    }

    /// 任務を完了し、割り当て済みの移動体を待機状態に戻す
    pub fn complete(&mut self, result: impl Into<String>, area: &mut OperatingArea) -> bool {
        if self.status != MissionStatus::Active {
            return false;
        }
        self.status = MissionStatus::Completed;
        self.actual_end = Some(Utc::now());
        self.obtained_result = Some(result.into());

        // 故障した移動体は故障のまま残す
        for &id in &self.assigned {
            if let Some(entity) = area.entity_mut(id) {
                entity.stop();
                if entity.state() != OperationalState::Failed {
                    entity.set_state(OperationalState::Grounded);
                }
            }
        }

        info!(
            mission_id = %self.id,
            mission = self.name(),
            result = self.obtained_result.as_deref().unwrap_or_default(),
            "MISSION_COMPLETED: 任務が完了しました"
        );
        true
    }

    /// 任務を中止する
    pub fn cancel(&mut self, reason: &str, policy: CancelPolicy, area: &mut OperatingArea) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = MissionStatus::Cancelled;
        self.obtained_result = Some(format!("任務中止: {reason}"));
        if self.actual_start.is_some() {
            self.actual_end = Some(Utc::now());
        }

        if policy == CancelPolicy::StopEntities {
            for &id in &self.assigned {
                if let Some(entity) = area.entity_mut(id) {
                    if entity.state() == OperationalState::Active {
                        entity.stop();
                    }
                }
            }
        }

        warn!(mission_id = %self.id, mission = self.name(), reason = reason, "MISSION_CANCELLED: 任務が中止されました");
        true
    }
}

impl fmt::Display for Mission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.id.to_string();
        write!(
            f,
            "{}[id={}, status={}, objective={}, assigned={}]",
            self.name(),
            &id[..8],
            self.status,
            self.expected_result,
            self.assigned.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        let start = Utc::now();
        (start, start + Duration::hours(2))
    }

    fn area() -> OperatingArea {
        OperatingArea::new(Vector3::new(-10000.0, -10000.0, -2000.0), Vector3::new(50000.0, 50000.0, 5000.0))
            .unwrap()
    }

    #[test]
    fn test_schedule_must_be_ordered() {
        let (start, end) = window();
        assert_eq!(
            Mission::surveillance(end, start, Vector3::ZERO).unwrap_err(),
            ModelError::ScheduleOrder
        );
        assert!(Mission::surveillance(start, end, Vector3::new(f64::INFINITY, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_surveillance_completes_on_arrival() {
        let mut area = area();
        let drone = area.register(MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 100.0)).unwrap());
        let (start, end) = window();
        let mut mission = Mission::surveillance(start, end, Vector3::new(500.0, 0.0, 100.0)).unwrap();

        assert!(mission.assign(drone, &area));
        assert!(mission.start(&mut area));
        assert_eq!(area.entity(drone).unwrap().state(), OperationalState::Active);

        for _ in 0..30 {
            mission.tick(1.0, &mut area);
            if mission.status() == MissionStatus::Completed {
                break;
            }
        }

        assert_eq!(mission.status(), MissionStatus::Completed);
        assert!(mission.arrived().contains(&drone));
        assert!(mission.actual_end().is_some());
        let entity = area.entity(drone).unwrap();
        assert_eq!(entity.state(), OperationalState::Grounded);
        assert!(!entity.is_running());
        assert!(entity.position().distance(&Vector3::new(500.0, 0.0, 100.0)) < 100.0);
    }

    #[test]
    fn test_assignment_guards() {
        let mut area = area();
        let recon = area.register(MobileEntity::reconnaissance_drone("recon-1", Vector3::new(0.0, 0.0, 100.0)).unwrap());
        let boat = area.register(MobileEntity::surface_vessel("boat-1", Vector3::ZERO).unwrap());
        let sub = area.register(MobileEntity::submersible("sub-1", Vector3::new(0.0, 100.0, -10.0)).unwrap());
        let (start, end) = window();

        let mut aerial = Mission::aerial_reconnaissance(start, end, Vector3::new(100.0, 0.0, 100.0)).unwrap();
        assert!(!aerial.assign(boat, &area));
        assert!(aerial.assign(recon, &area));
        assert!(!aerial.assign(recon, &area));

        let mut subsea = Mission::subsea_inspection(start, end, Vector3::new(0.0, 0.0, -100.0)).unwrap();
        assert!(!subsea.assign(boat, &area));
        assert!(subsea.assign(sub, &area));

        // 待機中でない移動体は割り当てられない
        area.entity_mut(boat).unwrap().start();
        let mut watch = Mission::surveillance(start, end, Vector3::new(10.0, 10.0, 0.0)).unwrap();
        assert!(!watch.assign(boat, &area));
        assert!(!watch.assign(EntityId::new(), &area));

        // 実行中の任務には割り当てられない
        assert!(aerial.start(&mut area));
        area.entity_mut(boat).unwrap().stop();
        assert!(!aerial.assign(boat, &area));
    }

    #[test]
    fn test_start_requires_assignment() {
        let mut area = area();
        let (start, end) = window();
        let mut mission = Mission::surveillance(start, end, Vector3::ZERO).unwrap();
        assert!(!mission.start(&mut area));
        assert_eq!(mission.status(), MissionStatus::Planned);
    }

    #[test]
    fn test_group_assignment_and_tick_when_not_active() {
        let mut area = area();
        let a = area.register(MobileEntity::surface_vessel("a", Vector3::ZERO).unwrap());
        let b = area.register(MobileEntity::surface_vessel("b", Vector3::new(0.0, 100.0, 0.0)).unwrap());
        let (start, end) = window();
        let mut mission = Mission::surveillance(start, end, Vector3::new(1000.0, 0.0, 0.0)).unwrap();

        assert!(mission.assign_group(&[a, b, a], &area));
        assert_eq!(mission.assigned().len(), 2);

        mission.tick(1.0, &mut area);
        assert_eq!(area.entity(a).unwrap().position(), Vector3::ZERO);
    }

    #[test]
    fn test_resumes_grounded_entity() {
        let mut area = area();
        let boat = area.register(MobileEntity::surface_vessel("boat-1", Vector3::ZERO).unwrap());
        let (start, end) = window();
        let mut mission = Mission::surveillance(start, end, Vector3::new(2000.0, 0.0, 0.0)).unwrap();
        mission.assign(boat, &area);
        mission.start(&mut area);

        area.entity_mut(boat).unwrap().stop();
        assert_eq!(area.entity(boat).unwrap().state(), OperationalState::Grounded);

        mission.tick(1.0, &mut area);

        let entity = area.entity(boat).unwrap();
        assert_eq!(entity.state(), OperationalState::Active);
        assert!(entity.position().x > 0.0);
    }

    #[test]
    fn test_failed_entity_does_not_block_completion() {
        let mut area = area();
        let a = area.register(MobileEntity::reconnaissance_drone("a", Vector3::new(0.0, 0.0, 100.0)).unwrap());
        let b = area.register(MobileEntity::reconnaissance_drone("b", Vector3::new(0.0, 500.0, 100.0)).unwrap());
        let (start, end) = window();
        let mut mission = Mission::surveillance(start, end, Vector3::new(200.0, 0.0, 100.0)).unwrap();
        mission.assign_group(&[a, b], &area);
        mission.start(&mut area);
        area.entity_mut(b).unwrap().force_failure(crate::models::entity::AlertKind::SystemFailure);

        for _ in 0..10 {
            mission.tick(1.0, &mut area);
        }

        assert_eq!(mission.status(), MissionStatus::Completed);
        assert_eq!(mission.arrived().len(), 1);
    }

    #[test]
    fn test_cancel_policies() {
        let mut area = area();
        let boat = area.register(MobileEntity::surface_vessel("boat-1", Vector3::ZERO).unwrap());
        let (start, end) = window();

        let mut leave = Mission::surveillance(start, end, Vector3::new(3000.0, 0.0, 0.0)).unwrap();
        leave.assign(boat, &area);
        leave.start(&mut area);
        assert!(leave.cancel("天候悪化", CancelPolicy::LeaveRunning, &mut area));
        assert_eq!(leave.status(), MissionStatus::Cancelled);
        assert_eq!(leave.obtained_result(), Some("任務中止: 天候悪化"));
        assert!(leave.actual_end().is_some());
        assert_eq!(area.entity(boat).unwrap().state(), OperationalState::Active);
        assert!(!leave.cancel("再度", CancelPolicy::LeaveRunning, &mut area));

        area.entity_mut(boat).unwrap().stop();
        let mut stop = Mission::surveillance(start, end, Vector3::new(3000.0, 0.0, 0.0)).unwrap();
        stop.assign(boat, &area);
        stop.start(&mut area);
        assert!(stop.cancel("撤収", CancelPolicy::StopEntities, &mut area));
        assert_eq!(area.entity(boat).unwrap().state(), OperationalState::Grounded);

        // 計画中の中止では終了時刻を記録しない
        let mut planned = Mission::surveillance(start, end, Vector3::ZERO).unwrap();
        assert!(planned.cancel("不要", CancelPolicy::default(), &mut area));
        assert!(planned.actual_end().is_none());
    }

    #[test]
    fn test_rescue_approach_transfer_return() {
        let mut area = area();
        let victim = area.register(MobileEntity::surface_vessel("victim", Vector3::new(400.0, 0.0, 0.0)).unwrap());
        area.entity_mut(victim).unwrap().consume_autonomy(70.0);
        let rescuer = area.register(MobileEntity::surface_vessel("rescuer", Vector3::ZERO).unwrap());
        let (start, end) = window();
        let mut mission = Mission::search_and_rescue(start, end, victim).unwrap().with_seed(7);

        assert!(!mission.assign(victim, &area));
        assert!(mission.assign(rescuer, &area));
        assert!(mission.start(&mut area));

        for _ in 0..200 {
            mission.tick(2.0, &mut area);
            if mission.status().is_terminal() {
                break;
            }
        }

        assert_eq!(mission.status(), MissionStatus::Completed);
        assert_eq!(area.entity(victim).unwrap().autonomy_remaining(), 100.0);
        let home = area.entity(rescuer).unwrap().position();
        assert!(home.distance(&Vector3::ZERO) <= 50.0);
        assert_eq!(area.entity(rescuer).unwrap().state(), OperationalState::Grounded);
    }

    #[test]
    fn test_display() {
        let (start, end) = window();
        let mission = Mission::subsea_inspection(start, end, Vector3::new(0.0, 0.0, -100.0)).unwrap();
        let text = mission.to_string();
        assert!(text.starts_with("SubseaInspection["));
        assert!(text.contains("PLANNED"));
    }
}
