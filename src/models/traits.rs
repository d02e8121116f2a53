use crate::models::common::Vector3;

/// 始動・停止できる移動体のインターフェース
pub trait Pilotable {
    /// 始動。故障中・整備中は拒否される
    fn start(&mut self) -> bool;

    /// 停止。任務中であれば待機状態に戻る
    fn stop(&mut self) -> bool;

    /// 動作中かどうか
    fn is_running(&self) -> bool;
}

/// エネルギー（バッテリー・燃料）を持つ移動体のインターフェース
pub trait Rechargeable {
    /// 自律量を100%に戻す
    fn recharge(&mut self);

    /// 自律量を指定量だけ消費する
    fn consume_autonomy(&mut self, amount: f64);

    /// 残り自律量（%）
    fn autonomy_remaining(&self) -> f64;
}

/// 静的な危険領域（障害物・進入禁止区域）のインターフェース
pub trait Hazard {
    /// 位置が危険領域内にあるか
    fn contains(&self, position: &Vector3) -> bool;

    /// 識別ラベル
    fn label(&self) -> &str;
}
