//! LED制御タスク
//!
//! 動作中はハートビートを表示し、故障発生時は故障コードを点滅表示します。

use embassy_futures::select::{select, Either};
use embassy_stm32::gpio::Output;
use embassy_time::{Duration, Timer};

use crate::state::FAULT;

/// LED制御タスク
///
/// * LED1: 500msごとに反転（ハートビート）
/// * LED2: 故障コードの回数だけ点滅
/// * LED3: 致命的故障（過電流）でラッチ点灯
#[embassy_executor::task]
pub async fn led_task(
    mut led1: Output<'static>,
    mut led2: Output<'static>,
    mut led3: Output<'static>,
) {
    info!("LED task started");

    led2.set_low();
    led3.set_low();

    loop {
        match select(Timer::after(Duration::from_millis(500)), FAULT.wait()).await {
            Either::First(()) => led1.toggle(),
            Either::Second(fault) => {
                if fault.is_fatal() {
                    led3.set_high();
                }
                for _ in 0..fault.code() {
                    led2.set_high();
                    Timer::after(Duration::from_millis(150)).await;
                    led2.set_low();
                    Timer::after(Duration::from_millis(150)).await;
                }
            }
        }
    }
}
