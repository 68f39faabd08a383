//! モータードライバー抽象化レイヤー
//!
//! TIM1の相補PWMを制御コアの `PwmOutput` として公開します。

use embassy_stm32::{
    peripherals,
    timer::{complementary_pwm::ComplementaryPwm, Channel},
};

use foc_inverter::foc::PwmOutput;

const CHANNELS: [Channel; 3] = [Channel::Ch1, Channel::Ch2, Channel::Ch3];

/// 3相モータードライバー
///
/// STM32のComplementaryPwmを使用して3相ブリッジを駆動します。
pub struct MotorDriver {
    pwm: ComplementaryPwm<'static, peripherals::TIM1>,
    max_duty: u16,
}

impl MotorDriver {
    /// 新しいモータードライバーを作成（出力は無効状態）
    ///
    /// # 引数
    /// * `pwm` - PWMペリフェラル（TIM1）
    pub fn new(mut pwm: ComplementaryPwm<'static, peripherals::TIM1>) -> Self {
        let max_duty = pwm.get_max_duty();
        for channel in CHANNELS {
            pwm.disable(channel);
        }
        Self { pwm, max_duty }
    }

    /// PWMの最大Duty値を取得
    pub fn max_duty(&self) -> u16 {
        self.max_duty
    }
}

impl PwmOutput for MotorDriver {
    fn enable_output(&mut self) {
        for channel in CHANNELS {
            self.pwm.enable(channel);
        }
    }

    fn disable_output(&mut self) {
        for channel in CHANNELS {
            self.pwm.disable(channel);
        }
    }

    fn set_duty(&mut self, channel: usize, duty: u16) {
        if let Some(&ch) = CHANNELS.get(channel) {
            self.pwm.set_duty(ch, duty.min(self.max_duty));
        }
    }
}
