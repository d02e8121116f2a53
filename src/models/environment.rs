//! 環境場（風・海流・降水）
//!
//! エンジンが読み取るだけの値オブジェクトです。強度は 0〜100 の百分率、
//! 方向はベクトルで表します。

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::models::common::Vector3;

fn check_intensity(intensity: f64) -> Result<f64> {
    if !(0.0..=100.0).contains(&intensity) {
        return Err(ModelError::IntensityOutOfRange(intensity));
    }
    Ok(intensity)
}

fn check_direction(direction: Vector3) -> Result<Vector3> {
    if !direction.is_finite() {
        return Err(ModelError::NonFinitePosition(direction.x, direction.y, direction.z));
    }
    Ok(direction)
}

/// 風
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wind {
    direction: Vector3,
    intensity: f64,
}

impl Wind {
    pub fn new(direction: Vector3, intensity: f64) -> Result<Self> {
        Ok(Self {
            direction: check_direction(direction)?,
            intensity: check_intensity(intensity)?,
        })
    }

    /// XY平面の方位角（ラジアン）から風を作成
    pub fn from_heading(angle_rad: f64, intensity: f64) -> Result<Self> {
        Self::new(Vector3::new(angle_rad.cos(), angle_rad.sin(), 0.0), intensity)
    }

    pub fn calm() -> Self {
        Self { direction: Vector3::ZERO, intensity: 0.0 }
    }

    pub fn direction(&self) -> Vector3 {
        self.direction
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }
}

/// 海流（3軸）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarineCurrent {
    direction: Vector3,
    intensity: f64,
}

impl MarineCurrent {
    pub fn new(direction: Vector3, intensity: f64) -> Result<Self> {
        Ok(Self {
            direction: check_direction(direction)?,
            intensity: check_intensity(intensity)?,
        })
    }

    pub fn still() -> Self {
        Self { direction: Vector3::ZERO, intensity: 0.0 }
    }

    pub fn direction(&self) -> Vector3 {
        self.direction
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }
}

/// 降水の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrecipitationKind {
    None,
    LightRain,
    ModerateRain,
    HeavyRain,
    Snow,
    Hail,
}

/// 降水
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Precipitation {
    kind: PrecipitationKind,
    intensity: f64,
}

impl Precipitation {
    pub fn new(kind: PrecipitationKind, intensity: f64) -> Result<Self> {
        Ok(Self { kind, intensity: check_intensity(intensity)? })
    }

    pub fn none() -> Self {
        Self { kind: PrecipitationKind::None, intensity: 0.0 }
    }

    pub fn kind(&self) -> PrecipitationKind {
        self.kind
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn is_falling(&self) -> bool {
        self.intensity > 0.0
    }
}

impl Default for Precipitation {
    fn default() -> Self {
        Self::none()
    }
}

/// 降水が適用される XY 矩形
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RainZone {
    pub min: Vector3,
    pub max: Vector3,
}

impl RainZone {
    pub fn new(min: Vector3, max: Vector3) -> Result<Self> {
        if min.x >= max.x || min.y >= max.y {
            return Err(ModelError::DegenerateBounds(min.x, min.y, max.x, max.y));
        }
        Ok(Self { min, max })
    }

    pub fn contains_xy(&self, p: &Vector3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// 運用エリアが保持する環境場一式
#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentFields {
    pub wind: Wind,
    pub current: MarineCurrent,
    pub precipitation: Precipitation,
    /// 指定された場合、降水はこの矩形の内側にのみ適用される
    pub rain_zone: Option<RainZone>,
}

impl Default for EnvironmentFields {
    fn default() -> Self {
        Self {
            wind: Wind::calm(),
            current: MarineCurrent::still(),
            precipitation: Precipitation::none(),
            rain_zone: None,
        }
    }
}

impl EnvironmentFields {
    /// 指定位置で観測される降水
    pub fn precipitation_at(&self, position: &Vector3) -> Precipitation {
        match &self.rain_zone {
            Some(zone) if !zone.contains_xy(position) => Precipitation::none(),
            _ => self.precipitation,
        }
    }
}
