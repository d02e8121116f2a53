use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::error::{ModelError, Result};
use crate::models::{
    common::{OperationalState, Vector3, constants::*},
    entity::{AlertKind, EntityClass, EntityId, MobileEntity},
    environment::{EnvironmentFields, MarineCurrent, Precipitation, RainZone, Wind},
    hazard::{ExclusionZone, Obstacle},
    traits::Hazard,
};

/// 線分 from→to が円（XY平面）に入る最初のパラメータ t ∈ [0, 1]
fn segment_entry(from: &Vector3, to: &Vector3, center: &Vector3, radius: f64) -> Option<f64> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let fx = from.x - center.x;
    let fy = from.y - center.y;

    let a = dx * dx + dy * dy;
    if a <= f64::EPSILON {
        return None;
    }
    let b = 2.0 * (fx * dx + fy * dy);
    let c = fx * fx + fy * fy - radius * radius;
    let delta = b * b - 4.0 * a * c;
    if delta < 0.0 {
        return None;
    }

    let root = delta.sqrt();
    let t1 = (-b - root) / (2.0 * a);
    let t2 = (-b + root) / (2.0 * a);
    if (0.0..=1.0).contains(&t1) {
        Some(t1)
    } else if (0.0..=1.0).contains(&t2) {
        Some(t2)
    } else {
        None
    }
}

/// 運用エリア
///
/// 軸平行な境界ボックス、環境場、静的な障害物と進入禁止区域、
/// そして登録された移動体を保持します。移動体の積分はエリアを読み取り専用で参照するため、
/// `advance_entity` は対象を一時的に取り出してから前進させ、再登録します。
#[derive(Debug, Clone)]
pub struct OperatingArea {
    min: Vector3,
    max: Vector3,
    environment: EnvironmentFields,
    obstacles: Vec<Obstacle>,
    exclusion_zones: Vec<ExclusionZone>,
    entities: BTreeMap<EntityId, MobileEntity>,
}

impl OperatingArea {
    /// 境界ボックスから運用エリアを作成
    ///
    /// 最小角は X・Y ともに最大角より厳密に小さい必要があります。
    pub fn new(min: Vector3, max: Vector3) -> Result<Self> {
        if !min.is_finite() {
            return Err(ModelError::NonFinitePosition(min.x, min.y, min.z));
        }
        if !max.is_finite() {
            return Err(ModelError::NonFinitePosition(max.x, max.y, max.z));
        }
        if min.x >= max.x || min.y >= max.y || min.z > max.z {
            return Err(ModelError::DegenerateBounds(min.x, min.y, max.x, max.y));
        }

        Ok(Self {
            min,
            max,
            environment: EnvironmentFields::default(),
            obstacles: Vec::new(),
            exclusion_zones: Vec::new(),
            entities: BTreeMap::new(),
        })
    }

    pub fn min(&self) -> Vector3 {
        self.min
    }

    pub fn max(&self) -> Vector3 {
        self.max
    }

    pub fn environment(&self) -> &EnvironmentFields {
        &self.environment
    }

    pub fn set_wind(&mut self, wind: Wind) {
        self.environment.wind = wind;
    }

    pub fn set_current(&mut self, current: MarineCurrent) {
        self.environment.current = current;
    }

    pub fn set_precipitation(&mut self, precipitation: Precipitation) {
        self.environment.precipitation = precipitation;
    }

    /// 降水を矩形内に限定する。`None` でエリア全域に戻す
    pub fn set_rain_zone(&mut self, zone: Option<RainZone>) {
        self.environment.rain_zone = zone;
    }

    /// 指定位置で観測される降水
    pub fn precipitation_at(&self, position: &Vector3) -> Precipitation {
        self.environment.precipitation_at(position)
    }

    pub fn add_obstacle(&mut self, obstacle: Obstacle) {
        debug!(label = %obstacle.label(), center = %obstacle.center(), radius = obstacle.radius(), "AREA_OBSTACLE_ADDED: 障害物を追加しました");
        self.obstacles.push(obstacle);
    }

    pub fn add_exclusion_zone(&mut self, zone: ExclusionZone) {
        debug!(label = %zone.label(), center = %zone.center(), radius = zone.radius(), "AREA_EXCLUSION_ZONE_ADDED: 進入禁止区域を追加しました");
        self.exclusion_zones.push(zone);
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    pub fn exclusion_zones(&self) -> &[ExclusionZone] {
        &self.exclusion_zones
    }

    /// 移動体を登録し、その識別子を返す
    pub fn register(&mut self, entity: MobileEntity) -> EntityId {
        let id = entity.id();
        info!(entity_id = %id, entity_name = %entity.name(), kind = entity.kind().as_str(), position = %entity.position(), "ENTITY_REGISTERED: 移動体を運用エリアに登録しました");
        self.entities.insert(id, entity);
        id
    }

    pub fn deregister(&mut self, id: EntityId) -> Option<MobileEntity> {
        self.entities.remove(&id)
    }

    pub fn entity(&self, id: EntityId) -> Option<&MobileEntity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut MobileEntity> {
        self.entities.get_mut(&id)
    }

    pub fn entity_by_name(&self, name: &str) -> Option<&MobileEntity> {
        self.entities.values().find(|e| e.name() == name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &MobileEntity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// 境界ボックス内（境界を含む）にあるか
    pub fn contains(&self, p: &Vector3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// 位置を含む最初の進入禁止区域
    pub fn exclusion_zone_at(&self, p: &Vector3) -> Option<&ExclusionZone> {
        self.exclusion_zones.iter().find(|zone| zone.contains(p))
    }

    pub fn is_in_exclusion_zone(&self, p: &Vector3) -> bool {
        self.exclusion_zone_at(p).is_some()
    }

    pub fn collides_with_obstacle(&self, p: &Vector3) -> bool {
        self.obstacles.iter().any(|obstacle| obstacle.contains(p))
    }

    /// 半径内にある他の移動体（要求者自身と故障中のものは除く）
    pub fn neighbors(&self, requester: EntityId, origin: &Vector3, radius: f64) -> Vec<&MobileEntity> {
        self.entities
            .values()
            .filter(|e| e.id() != requester)
            .filter(|e| e.state() != OperationalState::Failed)
            .filter(|e| e.position().distance(origin) <= radius)
            .collect()
    }

    /// 障害物と他の移動体の手前で止まるようクランプした目的地
    ///
    /// 目的地が膨張半径内にある円柱（障害物は半径+5m、移動体は15m）について、
    /// 線分がその円に入る最初の点を求め、わずかに手前へ引き戻した位置を返します。
    /// `z` より十分低い障害物と、高度差が10mを超える移動体は無視します。
    pub fn clamped_destination(&self, requester: EntityId, from: &Vector3, to: &Vector3, z: f64) -> Vector3 {
        let mut min_t = 1.0;
        let mut clamped = false;

        for obstacle in &self.obstacles {
            if z > obstacle.z_max() + FLYOVER_MARGIN_M {
                continue;
            }
            let center = obstacle.center();
            let radius = obstacle.radius() + OBSTACLE_SAFETY_MARGIN_M;
            if to.distance_xy(&center) >= radius {
                continue;
            }
            if let Some(t) = segment_entry(from, to, &center, radius) {
                if t < min_t {
                    min_t = t;
                    clamped = true;
                }
            }
        }

        for other in self.entities.values() {
            if other.id() == requester {
                continue;
            }
            let center = other.position();
            if (z - center.z).abs() > VEHICLE_VERTICAL_SLICE_M {
                continue;
            }
            if to.distance_xy(&center) >= VEHICLE_FOOTPRINT_RADIUS_M {
                continue;
            }
            if let Some(t) = segment_entry(from, to, &center, VEHICLE_FOOTPRINT_RADIUS_M) {
                if t < min_t {
                    min_t = t;
                    clamped = true;
                }
            }
        }

        if !clamped {
            return *to;
        }
        let t_safe = (min_t - CLAMP_PULLBACK).max(0.0);
        *from + (*to - *from) * t_safe
    }

    /// 登録済みの移動体を `dt` 秒だけ目標へ前進させる
    ///
    /// 未登録の識別子に対しては `false` を返します。
    pub fn advance_entity(&mut self, id: EntityId, target: Vector3, dt: f64) -> bool {
        let Some(mut entity) = self.entities.remove(&id) else {
            return false;
        };
        let reached = entity.advance(target, dt, self);
        self.entities.insert(id, entity);
        reached
    }

    /// 登録済みの移動体を目標位置へ瞬時に移動させる
    pub fn move_entity(&mut self, id: EntityId, target: Vector3) -> bool {
        let Some(mut entity) = self.entities.remove(&id) else {
            return false;
        };
        let moved = entity.move_to(target, self);
        self.entities.insert(id, entity);
        moved
    }

    /// 移動体間のメッセージ中継
    ///
    /// 送信者・受信者のどちらかが未登録、または受信者が故障中の場合は配送されません。
    pub fn relay_message(&mut self, from: EntityId, to: EntityId, text: &str) -> bool {
        let Some(sender_name) = self.entities.get(&from).map(|e| e.name().to_string()) else {
            return false;
        };
        match self.entities.get_mut(&to) {
            Some(receiver) if receiver.state() != OperationalState::Failed => {
                receiver.receive_message(&sender_name, text);
                true
            }
            _ => false,
        }
    }

    /// 偵察ドローンによる無力化
    ///
    /// 実行者が偵察ドローンで、目標が100m以内にある場合に目標を故障状態にします。
    pub fn neutralize(&mut self, by: EntityId, target: EntityId) -> bool {
        if by == target {
            return false;
        }
        let Some(actor) = self.entities.get(&by) else {
            return false;
        };
        if !matches!(actor.class(), EntityClass::Reconnaissance { .. }) || actor.state() == OperationalState::Failed {
            return false;
        }
        let actor_position = actor.position();

        match self.entities.get_mut(&target) {
            Some(victim) if victim.position().distance(&actor_position) <= 100.0 => {
                warn!(actor_id = %by, target_id = %target, "ENTITY_NEUTRALIZED: 目標を無力化しました");
                victim.force_failure(AlertKind::SystemFailure);
                true
            }
            _ => false,
        }
    }
}
