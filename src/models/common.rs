use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// 3次元の位置・ベクトル（メートル）
///
/// Z は非負が高度、非正が深度を表します。深度は `-z` の正の値として報告されます。
/// 値は不変で、等価性とハッシュは成分ごとのビット比較で定義されます。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64, // m
    pub y: f64, // m
    pub z: f64, // m (高度 / -深度)
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// 3次元距離を計算
    pub fn distance(&self, other: &Vector3) -> f64 {
        (*other - *self).norm()
    }

    /// XY平面での2次元距離を計算
    pub fn distance_xy(&self, other: &Vector3) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    /// ベクトルの長さ（原点からの距離）
    pub fn norm(&self) -> f64 {
        (self.x.powi(2) + self.y.powi(2) + self.z.powi(2)).sqrt()
    }

    /// 単位ベクトルを返す。長さがゼロの場合はそのまま返す
    pub fn normalized(&self) -> Self {
        let n = self.norm();
        if n > 0.0 { *self * (1.0 / n) } else { *self }
    }

    /// 深度（`-z`）
    pub fn depth(&self) -> f64 {
        -self.z
    }

    /// Z成分を置き換えたベクトル
    pub fn with_z(&self, z: f64) -> Self {
        Self::new(self.x, self.y, z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// Eq と Hash を一致させるため、比較はビット単位で行う（-0.0 と 0.0 は区別される）
impl PartialEq for Vector3 {
    fn eq(&self, other: &Self) -> bool {
        self.x.to_bits() == other.x.to_bits()
            && self.y.to_bits() == other.y.to_bits()
            && self.z.to_bits() == other.z.to_bits()
    }
}

impl Eq for Vector3 {}

impl Hash for Vector3 {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.to_bits().hash(state);
        self.y.to_bits().hash(state);
        self.z.to_bits().hash(state);
    }
}

impl Add for Vector3 {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vector3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl Neg for Vector3 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Display for Vector3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

/// 移動体の運用状態
///
/// `Failed` は自律量の枯渇または衝突・進入禁止区域への侵入でのみ到達し、
/// エンジン自身は回復させません（外部からの修理が必要）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationalState {
    /// 待機中（地上・係留）
    Grounded,
    /// 任務中
    Active,
    /// 整備中
    Maintenance,
    /// 故障
    Failed,
}

impl OperationalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grounded => "GROUNDED",
            Self::Active => "ACTIVE",
            Self::Maintenance => "MAINTENANCE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for OperationalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// エンジン定数
pub mod constants {
    /// 障害物の安全マージン（m）
    pub const OBSTACLE_SAFETY_MARGIN_M: f64 = 5.0;
    /// 障害物上空通過の許容高（m）
    pub const FLYOVER_MARGIN_M: f64 = 10.0;
    /// 他の移動体の占有半径（m）
    pub const VEHICLE_FOOTPRINT_RADIUS_M: f64 = 15.0;
    /// 他の移動体を考慮する高度差（m）
    pub const VEHICLE_VERTICAL_SLICE_M: f64 = 10.0;
    /// クランプ時の引き戻し量（線分パラメータ）
    pub const CLAMP_PULLBACK: f64 = 0.001;

    /// クランプ済み目的地への到着判定距離（m）
    pub const ARRIVAL_EPSILON_M: f64 = 1.0;
    /// 近傍探索半径（m）
    pub const NEIGHBOR_DETECTION_RADIUS_M: f64 = 80.0;
    /// 回避操舵が働く距離（m）
    pub const STEERING_THRESHOLD_M: f64 = 60.0;
    /// 横方向ベクトルが縮退したときのY方向バイアス（m）
    pub const STEERING_LATERAL_BIAS_M: f64 = 5.0;
    /// サブステップの長さ（m）
    pub const SUBSTEP_LENGTH_M: f64 = 10.0;
    /// 障害物表面の接線方向への滑り量（m）
    pub const OBSTACLE_SLIDE_M: f64 = 2.0;
    /// 障害物中心とみなす距離（m）
    pub const OBSTACLE_CORE_M: f64 = 0.1;
    /// 燃料切れ時の最小移動距離（m）
    pub const MIN_RESIDUAL_MOVE_M: f64 = 0.1;

    /// 基本消費率（自律量% / km）
    pub const BASE_CONSUMPTION_PER_KM: f64 = 0.4;
    /// 危険域とみなす自律量（%）
    pub const CRITICAL_AUTONOMY_PCT: f64 = 20.0;
    /// 降水による減速が始まる強度
    pub const PRECIPITATION_SLOWDOWN_THRESHOLD: f64 = 50.0;
    /// 海洋移動体の深度許容誤差（m）
    pub const DEPTH_TOLERANCE_M: f64 = 0.1;

    /// 群の衝突判定距離（m）
    pub const SWARM_COLLISION_DISTANCE_M: f64 = 10.0;
    /// 群の衝突リスク判定距離（m）
    pub const SWARM_SAFETY_DISTANCE_M: f64 = 50.0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_distances() {
        let a = Vector3::new(0.0, 0.0, 0.0);
        let b = Vector3::new(3.0, 4.0, 12.0);
        assert!((a.distance(&b) - 13.0).abs() < 1e-9);
        assert!((a.distance_xy(&b) - 5.0).abs() < 1e-9);
        assert!((b.norm() - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_arithmetic() {
        let a = Vector3::new(1.0, 2.0, 3.0);
        let b = Vector3::new(0.5, -1.0, 2.0);
        assert_eq!(a + b, Vector3::new(1.5, 1.0, 5.0));
        assert_eq!(a - b, Vector3::new(0.5, 3.0, 1.0));
        assert_eq!(a * 2.0, Vector3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_normalized_zero_vector() {
        assert_eq!(Vector3::ZERO.normalized(), Vector3::ZERO);
        let unit = Vector3::new(0.0, 10.0, 0.0).normalized();
        assert!((unit.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_equality_and_hash() {
        let mut set = HashSet::new();
        set.insert(Vector3::new(1.0, 2.0, 3.0));
        assert!(set.contains(&Vector3::new(1.0, 2.0, 3.0)));
        assert!(!set.contains(&Vector3::new(1.0, 2.0, 3.5)));
    }

    #[test]
    fn test_depth_convention() {
        assert_eq!(Vector3::new(0.0, 0.0, -250.0).depth(), 250.0);
    }
}
