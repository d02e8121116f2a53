use crate::error::{ModelError, Result};
use crate::models::{common::Vector3, traits::Hazard};

fn check_geometry(center: &Vector3, radius: f64, label: &str) -> Result<()> {
    if !center.is_finite() {
        return Err(ModelError::NonFinitePosition(center.x, center.y, center.z));
    }
    if !(radius > 0.0) {
        return Err(ModelError::NonPositiveRadius(radius));
    }
    if label.trim().is_empty() {
        return Err(ModelError::EmptyLabel);
    }
    Ok(())
}

/// 円柱形の静的障害物
///
/// 位置が鉛直範囲 [z_min, z_max] 内にあり、かつ中心からの2次元距離が半径未満の場合に衝突します。
/// 高度に応じて上空通過または表面に沿った滑りで回避されます。
#[derive(Debug, Clone, PartialEq)]
pub struct Obstacle {
    center: Vector3,
    radius: f64,
    z_min: f64,
    z_max: f64,
    label: String,
}

impl Obstacle {
    /// 鉛直方向に無限に伸びる障害物
    pub fn new(center: Vector3, radius: f64, label: impl Into<String>) -> Result<Self> {
        Self::with_vertical_range(center, radius, f64::NEG_INFINITY, f64::INFINITY, label)
    }

    pub fn with_vertical_range(
        center: Vector3,
        radius: f64,
        z_min: f64,
        z_max: f64,
        label: impl Into<String>,
    ) -> Result<Self> {
        let label = label.into();
        check_geometry(&center, radius, &label)?;
        if !(z_min <= z_max) {
            return Err(ModelError::InvalidVerticalRange(z_min, z_max));
        }
        Ok(Self { center, radius, z_min, z_max, label })
    }

    pub fn center(&self) -> Vector3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn z_min(&self) -> f64 {
        self.z_min
    }

    pub fn z_max(&self) -> f64 {
        self.z_max
    }

    pub fn in_vertical_range(&self, z: f64) -> bool {
        z >= self.z_min && z <= self.z_max
    }
}

impl Hazard for Obstacle {
    fn contains(&self, position: &Vector3) -> bool {
        self.in_vertical_range(position.z) && position.distance_xy(&self.center) < self.radius
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// 球形の進入禁止区域
///
/// 障害物と異なり回避の対象にならず、進入は即座に致命的な失敗となります。
#[derive(Debug, Clone, PartialEq)]
pub struct ExclusionZone {
    center: Vector3,
    radius: f64,
    label: String,
}

impl ExclusionZone {
    pub fn new(center: Vector3, radius: f64, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        check_geometry(&center, radius, &label)?;
        Ok(Self { center, radius, label })
    }

    pub fn center(&self) -> Vector3 {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl Hazard for ExclusionZone {
    fn contains(&self, position: &Vector3) -> bool {
        self.center.distance(position) <= self.radius
    }

    fn label(&self) -> &str {
        &self.label
    }
}
