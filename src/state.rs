//! グローバル共有状態管理
//!
//! タスク間で共有される状態をMutexで保護して管理します。

use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

use foc_inverter::{Fault, FaultSink, ParamTable};

/// パラメータストア（設定値とテレメトリ）
pub static PARAMS: Mutex<ThreadModeRawMutex, ParamTable> = Mutex::new(ParamTable::new());

/// 最終トルク指令 [%]（車両制御タスク → モーター制御タスク）
pub static TORQUE_COMMAND: Mutex<ThreadModeRawMutex, f32> = Mutex::new(0.0);

/// 直近に発生した故障（LEDタスクへ通知）
pub static FAULT: Signal<ThreadModeRawMutex, Fault> = Signal::new();

/// 故障をシグナルで通知するシンク
///
/// 通知は上書き式で、未処理の故障は最新のものに置き換わります。
pub struct FaultSignal;

impl FaultSink for FaultSignal {
    fn post(&mut self, fault: Fault) {
        FAULT.signal(fault);
    }
}
