//! ハードウェア初期化モジュール
//!
//! クロック設定とアナログ入力の換算を集約します。

use embassy_stm32::gpio::Input;
use embassy_stm32::Config;

use foc_inverter::math::{fp_from_f32, Fp};

/// RCCクロック設定を初期化
///
/// HSI → PLL（÷4 × 85 ÷ 2）で170MHz生成
pub fn create_clock_config() -> Config {
    let mut config = Config::default();
    {
        use embassy_stm32::rcc::mux::{Adcsel, ClockMux};
        use embassy_stm32::rcc::{Pll, PllMul, PllPreDiv, PllRDiv, PllSource, Sysclk};

        config.rcc.hsi = true;
        config.rcc.pll = Some(Pll {
            source: PllSource::HSI,
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL85,
            divp: None,
            divq: None,
            divr: Some(PllRDiv::DIV2),
        });
        config.rcc.sys = Sysclk::PLL1_R; // システムクロックをPLLに設定

        let mut clock_mux = ClockMux::default();
        clock_mux.adc12sel = Adcsel::SYS;
        config.rcc.mux = clock_mux;
    }
    config
}

/// ADCフルスケール [digit]
const ADC_MAX: f32 = 4096.0;

/// ADC基準電圧 [V]
const VREF: f32 = 3.3;

/// DCバス電圧分圧比（100kΩ / 10kΩ）
const UDC_DIVIDER: f32 = (100_000.0 + 10_000.0) / 10_000.0;

/// ヒートシンク温度センサ感度 [V/°C]（リニアセンサ、0°Cで0.5V）
const TMPHS_SLOPE: f32 = 0.01;
const TMPHS_OFFSET: f32 = 0.5;

/// ADC生値をDCバス電圧 [V] に換算
pub fn udc_from_raw(raw: u16) -> Fp {
    let v_adc = f32::from(raw) * VREF / ADC_MAX;
    fp_from_f32(v_adc * UDC_DIVIDER)
}

/// ADC生値をヒートシンク温度 [°C] に換算
pub fn tmphs_from_raw(raw: u16) -> Fp {
    let v_adc = f32::from(raw) * VREF / ADC_MAX;
    fp_from_f32((v_adc - TMPHS_OFFSET) / TMPHS_SLOPE)
}

/// Hallセンサー入力（H1、H2、H3）
pub struct HallInputs {
    pub h1: Input<'static>,
    pub h2: Input<'static>,
    pub h3: Input<'static>,
}

impl HallInputs {
    /// Hall状態を読み取り
    ///
    /// 形式: (H3 << 2) | (H2 << 1) | H1
    pub fn read(&self) -> u8 {
        (u8::from(self.h3.is_high()) << 2)
            | (u8::from(self.h2.is_high()) << 1)
            | u8::from(self.h1.is_high())
    }
}
