//! # Error モジュール
//!
//! モデル構築時の検証エラーを定義します。
//!
//! 検証エラーは構築呼び出しに対して致命的であり、部分的に有効なオブジェクトは
//! 生成されません。移動・割り当てなどの運用上の拒否は `bool` で返され、
//! ここには含まれません。

use thiserror::Error;

/// モデル構築時の検証エラー
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// 座標に NaN または無限大が含まれる
    #[error("位置が有限の値ではありません: ({0}, {1}, {2})")]
    NonFinitePosition(f64, f64, f64),

    #[error("最大速度は正の値である必要があります: {0}")]
    NonPositiveSpeed(f64),

    #[error("最大自律時間は正の値である必要があります: {0}")]
    NonPositiveAutonomy(f64),

    #[error("最大高度は正の値である必要があります: {0}")]
    NonPositiveAltitude(f64),

    #[error("最大深度は負の値にできません: {0}")]
    NegativeDepth(f64),

    #[error("環境感度は負の値にできません: {0}")]
    NegativeSensitivity(f64),

    #[error("半径は正の値である必要があります: {0}")]
    NonPositiveRadius(f64),

    /// 強度は 0〜100 の範囲
    #[error("強度は0から100の範囲である必要があります: {0}")]
    IntensityOutOfRange(f64),

    /// 障害物の鉛直範囲は z_min <= z_max
    #[error("鉛直範囲が不正です: z_min={0}, z_max={1}")]
    InvalidVerticalRange(f64, f64),

    #[error("ラベルを空にすることはできません")]
    EmptyLabel,

    /// 運用エリアの最小角は X・Y ともに最大角より厳密に小さい必要がある
    #[error("運用エリアの境界が不正です: min=({0}, {1}) max=({2}, {3})")]
    DegenerateBounds(f64, f64, f64, f64),

    /// 初期位置が媒体の高度・深度制約を満たさない
    #[error("初期位置のZ座標が鉛直制約を満たしません: {0}")]
    InvalidVerticalPosition(f64),

    /// 任務の目的地・救助対象が不正
    #[error("任務の目標が不正です: {0}")]
    InvalidMissionTarget(String),

    #[error("予定開始時刻は予定終了時刻より前である必要があります")]
    ScheduleOrder,
}

pub type Result<T> = std::result::Result<T, ModelError>;
