//! 車両制御タスク
//!
//! アクセル・ブレーキ入力と計測値からトルク指令を生成します。

use embassy_stm32::{
    adc::{Adc, AnyAdcChannel},
    gpio::Input,
    peripherals,
};
use embassy_time::{Duration, Ticker};

use foc_inverter::config::{Param, ParamStore, DEFAULT_VEHICLE_PERIOD_MS};
use foc_inverter::limiters::LimitInputs;
use foc_inverter::{CommandInputs, ThrottlePipeline};

use crate::hardware::{tmphs_from_raw, udc_from_raw};
use crate::state::{FaultSignal, PARAMS, TORQUE_COMMAND};

/// アナログ入力（ADC2）
pub struct AnalogInputs {
    pub adc: Adc<'static, peripherals::ADC2>,
    pub pot: AnyAdcChannel<peripherals::ADC2>,
    pub pot2: AnyAdcChannel<peripherals::ADC2>,
    pub udc: AnyAdcChannel<peripherals::ADC2>,
    pub tmphs: AnyAdcChannel<peripherals::ADC2>,
}

/// デジタル入力
pub struct DigitalInputs {
    pub brake: Input<'static>,
    pub bms: Input<'static>,
    pub cruise: Input<'static>,
}

/// 車両制御タスク（100Hz）
#[embassy_executor::task]
pub async fn vehicle_control_task(mut analog: AnalogInputs, digital: DigitalInputs) {
    info!("Vehicle control task started");

    let mut pipeline = {
        let params = PARAMS.lock().await;
        ThrottlePipeline::new(&*params)
    };
    let mut faults = FaultSignal;
    let mut ticker = Ticker::every(Duration::from_millis(DEFAULT_VEHICLE_PERIOD_MS));

    // デバッグログ用カウンタ（1秒ごとにログ）
    let mut log_counter = 0u32;

    loop {
        ticker.next().await;

        let pot = i32::from(analog.adc.blocking_read(&mut analog.pot));
        let pot2 = i32::from(analog.adc.blocking_read(&mut analog.pot2));
        let udc = udc_from_raw(analog.adc.blocking_read(&mut analog.udc));
        let tmphs = tmphs_from_raw(analog.adc.blocking_read(&mut analog.tmphs));

        let mut params = PARAMS.lock().await;

        // 電気周波数 [Hz] → 機械回転数 [rpm]
        let pole_pairs = params.get_int(Param::PolePairs).max(1);
        let speed = (params.get(Param::FStat) * 60 / pole_pairs).to_num::<i32>();

        let il1 = params.get(Param::Il1).abs();
        let il2 = params.get(Param::Il2).abs();

        let inputs = CommandInputs {
            pot,
            pot2,
            brake_pedal: digital.brake.is_high(),
            cruise_active: digital.cruise.is_high(),
            speed,
            limits: LimitInputs {
                tmphs,
                bms_active: digital.bms.is_high(),
                udc,
                idc: params.get(Param::Idc),
                iac: il1.max(il2),
            },
        };

        let output = pipeline.process(&inputs, &mut *params, &mut faults);
        drop(params);

        *TORQUE_COMMAND.lock().await = output.spnt.to_num::<f32>();

        log_counter += 1;
        if log_counter >= 100 {
            log_counter = 0;
            debug!(
                "[Vehicle] pot: {}, potnom: {}%, spnt: {}%, udc: {}V, tmphs: {}C, derate: {}",
                pot,
                output.potnom.to_num::<f32>(),
                output.spnt.to_num::<f32>(),
                udc.to_num::<f32>(),
                tmphs.to_num::<f32>(),
                output.derating
            );
        }
    }
}
