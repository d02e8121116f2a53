use std::fmt;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    area::OperatingArea,
    common::{OperationalState, Vector3, constants::*},
    entity::{AlertKind, EntityId},
    traits::Rechargeable,
};

/// 群内の近接検知結果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProximityAlert {
    /// 衝突（10m未満）。両機とも故障状態になる
    Collision { first: EntityId, second: EntityId, distance: f64 },
    /// 衝突リスク（50m未満）
    Risk { first: EntityId, second: EntityId, distance: f64 },
}

impl ProximityAlert {
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::Collision { .. })
    }

    pub fn pair(&self) -> (EntityId, EntityId) {
        match *self {
            Self::Collision { first, second, .. } | Self::Risk { first, second, .. } => (first, second),
        }
    }
}

impl fmt::Display for ProximityAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collision { first, second, distance } => {
                write!(f, "COLLISION {first} <-> {second} ({distance:.1}m)")
            }
            Self::Risk { first, second, distance } => {
                write!(f, "RISK {first} <-> {second} ({distance:.1}m)")
            }
        }
    }
}

/// 移動体の群
///
/// 構成員は識別子で保持し、重複は許しません。
#[derive(Debug, Clone)]
pub struct Swarm {
    id: Uuid,
    name: String,
    members: Vec<EntityId>,
}

impl Swarm {
    /// 群を作成。名前が空の場合は識別子から生成する
    pub fn new(name: impl Into<String>) -> Self {
        let id = Uuid::new_v4();
        let mut name = name.into();
        if name.trim().is_empty() {
            name = format!("Swarm-{}", &id.to_string()[..8]);
        }
        Self { id, name, members: Vec::new() }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[EntityId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.members.contains(&id)
    }

    pub fn add(&mut self, id: EntityId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.members.push(id);
        true
    }

    pub fn remove(&mut self, id: EntityId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| *m != id);
        self.members.len() != before
    }

    /// 構成員同士の近接を走査する
    ///
    /// 少なくとも一方が任務中のペアについて、10m未満は衝突として両機を故障させ、
    /// 50m未満は衝突リスクとして報告します。
    pub fn scan_proximity(&self, area: &mut OperatingArea) -> Vec<ProximityAlert> {
        let mut alerts = Vec::new();

        for (i, &first) in self.members.iter().enumerate() {
            for &second in &self.members[i + 1..] {
                let (Some(a), Some(b)) = (area.entity(first), area.entity(second)) else {
                    continue;
                };
                if a.state() != OperationalState::Active && b.state() != OperationalState::Active {
                    continue;
                }

                let distance = a.position().distance(&b.position());
                if distance < SWARM_COLLISION_DISTANCE_M {
                    warn!(
                        swarm = %self.name,
                        first_id = %first,
                        second_id = %second,
                        distance = distance,
                        "SWARM_COLLISION: 群内で衝突が発生しました"
                    );
                    for id in [first, second] {
                        if let Some(entity) = area.entity_mut(id) {
                            if entity.state() != OperationalState::Failed {
                                entity.force_failure(AlertKind::VehicleCollision);
                            }
                        }
                    }
                    alerts.push(ProximityAlert::Collision { first, second, distance });
                } else if distance < SWARM_SAFETY_DISTANCE_M {
                    debug!(swarm = %self.name, first_id = %first, second_id = %second, distance = distance, "SWARM_PROXIMITY_RISK: 群内で衝突リスクを検知しました");
                    alerts.push(ProximityAlert::Risk { first, second, distance });
                }
            }
        }

        alerts
    }

    /// 構成員の重心。構成員が一機も登録されていなければ `None`
    pub fn centroid(&self, area: &OperatingArea) -> Option<Vector3> {
        let positions: Vec<Vector3> = self.members.iter().filter_map(|id| area.entity(*id)).map(|e| e.position()).collect();
        if positions.is_empty() {
            return None;
        }
        let sum = positions.iter().fold(Vector3::ZERO, |acc, p| acc + *p);
        Some(sum * (1.0 / positions.len() as f64))
    }

    /// 構成員の平均自律量（%）
    pub fn mean_autonomy(&self, area: &OperatingArea) -> Option<f64> {
        let levels: Vec<f64> = self
            .members
            .iter()
            .filter_map(|id| area.entity(*id))
            .map(|e| e.autonomy_remaining())
            .collect();
        if levels.is_empty() {
            return None;
        }
        Some(levels.iter().sum::<f64>() / levels.len() as f64)
    }
}
