//! モーター制御タスク
//!
//! 2.5kHzで電流制御サイクル（FOC）を実行します。

use embassy_stm32::{
    adc::{Adc, AnyAdcChannel},
    peripherals,
};
use embassy_time::{Duration, Ticker};

use foc_inverter::config::{pwm, OpMode, Param, ParamStore, DEFAULT_CONTROL_PERIOD_US};
use foc_inverter::foc::{Foc, HallSensor};
use foc_inverter::{CurrentSample, PwmGeneration, RunContext};

use crate::hardware::HallInputs;
use crate::motor_driver::MotorDriver;
use crate::state::{FaultSignal, PARAMS, TORQUE_COMMAND};

/// 相電流センサ入力（ADC1）
pub struct CurrentInputs {
    pub adc: Adc<'static, peripherals::ADC1>,
    pub il1: AnyAdcChannel<peripherals::ADC1>,
    pub il2: AnyAdcChannel<peripherals::ADC1>,
}

impl CurrentInputs {
    fn sample(&mut self) -> CurrentSample {
        CurrentSample {
            il1: i32::from(self.adc.blocking_read(&mut self.il1)),
            il2: i32::from(self.adc.blocking_read(&mut self.il2)),
        }
    }
}

/// モーター制御タスク（2.5kHz FOCループ）
#[embassy_executor::task]
pub async fn motor_control_task(
    mut driver: MotorDriver,
    mut currents: CurrentInputs,
    hall: HallInputs,
) {
    info!("Motor control task started");

    let pwmfrq = (1_000_000 / DEFAULT_CONTROL_PERIOD_US) as u32;
    let mut encoder = HallSensor::new();
    let mut pwmgen = PwmGeneration::new(Foc::new());
    let mut faults = FaultSignal;

    // 較正前の誤トリップを避けるため、起動時の読み値を仮オフセットにする
    let initial = currents.sample();
    pwmgen.set_current_offset(initial.il1, initial.il2);

    info!(
        "FOC parameters: Control freq={}Hz, PWM max duty={}",
        pwmfrq,
        driver.max_duty()
    );

    let mut ticker = Ticker::every(Duration::from_micros(DEFAULT_CONTROL_PERIOD_US));
    let mut last_mode = OpMode::Off;

    loop {
        ticker.next().await;

        let sample = currents.sample();
        encoder.set_hall_state(hall.read());
        let torque = *TORQUE_COMMAND.lock().await;

        let mut params = PARAMS.lock().await;
        let mode = params.op_mode();

        // 停止状態から起動する度に初期化（ゲイン・スタートアップ待ち・トリップ解除）
        if mode != last_mode {
            if last_mode == OpMode::Off {
                pwmgen.init(pwmfrq, pwm::DEFAULT_SHIFT_FOR_TIMER, &mut encoder, &*params);
                pwmgen.set_controller_gains(
                    params.get_int(Param::CurKp),
                    params.get_int(Param::CurKi),
                    params.get_int(Param::FwKp),
                    params.get_int(Param::FwKi),
                );
            }
            info!("Operating mode changed: {} -> {}", last_mode, mode);
            last_mode = mode;
        }

        if mode == OpMode::Run {
            pwmgen.set_torque_percent(torque, &mut *params);
        }

        let mut ctx = RunContext {
            encoder: &mut encoder,
            pwm: &mut driver,
            params: &mut *params,
            faults: &mut faults,
        };
        pwmgen.run(&mut ctx, sample);

        // 過電流トリップ時はモードがOFFになる
        if pwmgen.is_tripped() {
            last_mode = params.op_mode();
        }
    }
}
