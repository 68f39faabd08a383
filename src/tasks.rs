//! タスクモジュール
//!
//! 各タスクの実装を分離して管理します。

pub mod led;
pub mod motor_control;
pub mod vehicle_control;

// タスク関数を再エクスポート
pub use led::led_task;
pub use motor_control::motor_control_task;
pub use vehicle_control::vehicle_control_task;
