#![no_std]
#![no_main]

mod fmt;

mod hardware;
mod motor_driver;
mod state;
mod tasks;

#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use {defmt_rtt as _, panic_probe as _};

use embassy_executor::Spawner;
use embassy_stm32::{
    adc::{Adc, AdcChannel, SampleTime},
    gpio::{Input, Level, Output, OutputType, Pull, Speed},
    time::Hertz,
    timer::{
        complementary_pwm::{ComplementaryPwm, ComplementaryPwmPin},
        low_level::CountingMode,
        simple_pwm::PwmPin,
    },
};
use embassy_time::{Duration, Timer};

use foc_inverter::config::pwm;

use hardware::HallInputs;
use motor_driver::MotorDriver;
use tasks::motor_control::CurrentInputs;
use tasks::vehicle_control::{AnalogInputs, DigitalInputs};
use tasks::{led_task, motor_control_task, vehicle_control_task};

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // ハードウェア初期化
    let config = hardware::create_clock_config();
    let p = embassy_stm32::init(config);

    info!("Motor inverter • STM32G431VB @ 170MHz");

    // LED初期化＆タスク起動
    let led1 = Output::new(p.PC13, Level::High, Speed::Low);
    let led2 = Output::new(p.PC14, Level::Low, Speed::Low);
    let led3 = Output::new(p.PC15, Level::Low, Speed::Low);
    spawner.spawn(led_task(led1, led2, led3)).unwrap();

    // ADC初期化（ADC1: 相電流、ADC2: 車両側アナログ入力）
    let mut adc1 = Adc::new(p.ADC1);
    adc1.set_sample_time(SampleTime::CYCLES24_5);
    let mut adc2 = Adc::new(p.ADC2);
    adc2.set_sample_time(SampleTime::CYCLES640_5);

    // 相電流センサ: PA2 = ADC1_IN3、PB1 = ADC1_IN12
    let currents = CurrentInputs {
        adc: adc1,
        il1: p.PA2.degrade_adc(),
        il2: p.PB1.degrade_adc(),
    };

    // PA0 = アクセル、PA4 = ブレーキレバー/冗長チャネル、PC1 = DCバス電圧、PB2 = ヒートシンク温度
    let analog = AnalogInputs {
        adc: adc2,
        pot: p.PA0.degrade_adc(),
        pot2: p.PA4.degrade_adc(),
        udc: p.PC1.degrade_adc(),
        tmphs: p.PB2.degrade_adc(),
    };

    let digital = DigitalInputs {
        brake: Input::new(p.PC6, Pull::Down),
        bms: Input::new(p.PC7, Pull::Down),
        cruise: Input::new(p.PC8, Pull::Down),
    };

    // Hallセンサー: PB6 = H1、PB7 = H2、PB8 = H3
    let hall = HallInputs {
        h1: Input::new(p.PB6, Pull::Up),
        h2: Input::new(p.PB7, Pull::Up),
        h3: Input::new(p.PB8, Pull::Up),
    };

    // PWM初期化（TIM1、3相補完PWM、センターアライン）
    let mut uvw_pwm = ComplementaryPwm::new(
        p.TIM1,
        Some(PwmPin::new(p.PE9, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(p.PE8, OutputType::PushPull)),
        Some(PwmPin::new(p.PE11, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(p.PE10, OutputType::PushPull)),
        Some(PwmPin::new(p.PE13, OutputType::PushPull)),
        Some(ComplementaryPwmPin::new(p.PE12, OutputType::PushPull)),
        None,
        None,
        Hertz(pwm::DEFAULT_FREQUENCY),
        CountingMode::CenterAlignedBothInterrupts,
    );
    uvw_pwm.set_dead_time(pwm::DEFAULT_DEAD_TIME);
    let driver = MotorDriver::new(uvw_pwm);

    info!("Starting control tasks...");

    spawner.spawn(motor_control_task(driver, currents, hall)).unwrap();
    spawner.spawn(vehicle_control_task(analog, digital)).unwrap();

    // メインループ（将来の拡張用）
    loop {
        Timer::after(Duration::from_millis(100)).await;
    }
}
