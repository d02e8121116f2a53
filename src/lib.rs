//! # swarmsim
//!
//! 航空・海洋の自律移動体群を扱う時間駆動型シミュレーションライブラリです。
//!
//! 運用エリア（境界・環境場・障害物・進入禁止区域）の中で、移動体を固定時間刻みで
//! 積分し、任務と群監視を通じて協調させます。

pub mod error;
pub mod logging;
pub mod models;
pub mod scenario;
pub mod simulation;
