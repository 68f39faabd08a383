//! 制御パラメータ定義
//!
//! チューニング値（キャリブレーション範囲、ゲイン、しきい値、弱め界磁スケジュール）と
//! テレメトリ出力（電流、電圧、周波数、角度）をすべて名前付きエントリとして定義します。

use crate::math::{fp, fp_milli, Fp};

/// ポテンショメータ読み値の許容はみ出し量 [raw]
pub const POT_SLACK: i32 = 200;

/// ヒートシンク温度のディレーティング開始しきい値 [°C]
pub const TMPHS_MAX: Fp = fp(85);

/// ディレーティング50%帯の幅 [°C]
pub const TMPHS_DERATE_BAND: Fp = fp(2);

/// 電流オフセット校正の平均サンプル数
pub const OFFSET_SAMPLES: i32 = 512;

/// 同期器・ゲインスケジューリング用周波数フィルタの時定数（シフト量）
pub const FRQ_FILTER_SHIFT: u32 = 8;

/// DC電流推定係数 sqrt(2/3)*1.05（インバータ損失込み）
pub const DC_CURRENT_FACTOR: f32 = 0.816_496_6 * 1.05;

/// PI出力クランプの変調率マージン
pub const MOD_INDEX_MARGIN: i32 = 2000;

/// デュアルスロットルの許容差 [%]
pub const DUAL_THROTTLE_TOLERANCE: i32 = 10;

/// ピンスワップ設定ビット
pub mod pinswap {
    pub const SWAP_CURRENTS: i32 = 1;
    pub const SWAP_PWM13: i32 = 2;
    pub const SWAP_PWM23: i32 = 4;
}

/// PWM設定
pub mod pwm {
    /// PWM周波数 [Hz]（デフォルト値）
    ///
    /// センターアライン時、170MHzでタイマー分解能は約4250カウント
    pub const DEFAULT_FREQUENCY: u32 = 20_000;

    /// デッドタイム（デフォルト値）
    pub const DEFAULT_DEAD_TIME: u16 = 1;

    /// デューティ値（16ビット）からタイマー分解能への右シフト量
    pub const DEFAULT_SHIFT_FOR_TIMER: u32 = 4;
}

/// 電流制御周期 [μs]（2.5kHz = 400μs）（デフォルト値）
pub const DEFAULT_CONTROL_PERIOD_US: u64 = 400;

/// 車両制御（スロットル処理）周期 [ms]
pub const DEFAULT_VEHICLE_PERIOD_MS: u64 = 10;

macro_rules! param_table {
    ($($(#[$doc:meta])* $name:ident = $default:expr,)*) => {
        /// パラメータストアのキー
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[cfg_attr(feature = "defmt", derive(defmt::Format))]
        #[repr(u8)]
        pub enum Param {
            $($(#[$doc])* $name,)*
        }

        impl Param {
            /// 全キー（インデックス順）
            pub const ALL: &'static [Param] = &[$(Param::$name,)*];

            /// キーの総数
            pub const COUNT: usize = Self::ALL.len();

            /// 起動時のデフォルト値
            pub const fn default_value(self) -> Fp {
                match self {
                    $(Param::$name => $default,)*
                }
            }

            /// テーブル内のインデックス
            pub const fn index(self) -> usize {
                self as usize
            }
        }
    };
}

param_table! {
    // === スロットル ===
    /// 主ポテンショメータの最小値 [raw]
    PotMin = fp(500),
    /// 主ポテンショメータの最大値 [raw]
    PotMax = fp(3500),
    /// 第2ポテンショメータ（ブレーキレバー/冗長チャネル）の最小値 [raw]
    Pot2Min = fp(4095),
    /// 第2ポテンショメータの最大値 [raw]
    Pot2Max = fp(4095),
    /// 0: 単一チャネル、1: デュアルチャネル冗長チェック
    PotMode = fp(0),
    /// スロットル負側（回生）ヘッドルーム [%]
    BrkNom = fp(30),
    /// ブレーキペダル時の回生上限 [%]（負値）
    BrkNomPedal = fp(-50),
    /// スロットル回生時の回生上限 [%]（負値）
    BrkMax = fp(-30),
    /// アイドル目標回転数 [rpm]（負値で無効）
    IdleSpeed = fp(-100),
    /// アイドル制御のトルク上限 [%]
    IdleThrotLim = fp(50),
    /// クルーズ目標回転数 [rpm]（0以下で無効）
    CruiseSpeed = fp(0),
    /// 速度制御の比例ゲイン [%/rpm]
    SpeedKp = fp_milli(250),
    /// クルーズ用速度フィルタ（シフト量）
    SpeedFlt = fp(5),
    // === 制限 ===
    /// BMS信号時の正トルク上限 [%]
    BmsLimHigh = fp(50),
    /// BMS信号時の回生上限 [%]（負値）
    BmsLimLow = fp(-1),
    /// DCバス電圧下限 [V]
    UdcMin = fp(450),
    /// DCバス電圧上限 [V]
    UdcMax = fp(520),
    /// DC電流下限（回生） [A]
    IdcMin = fp(-5000),
    /// DC電流上限 [A]
    IdcMax = fp(5000),
    /// AC電流上限 [A]
    IacMax = fp(5000),
    /// AC電流制限の比例ゲイン
    IacKp = fp_milli(1000),
    // === モーター/FOC ===
    /// 運転モード（OpMode）
    OpMode = fp(0),
    /// 回転方向（1 / -1）
    Dir = fp(1),
    /// 電流制御の比例ゲイン
    CurKp = fp(32),
    /// 電流制御の積分ゲイン
    CurKi = fp(20000),
    /// 比例ゲインの周波数依存項 [1/Hz]
    CurKpFrqGain = fp_milli(100),
    /// 積分ゲインの周波数依存項 [1/Hz]
    CurKiFrqGain = fp(0),
    /// 弱め界磁コントローラの比例ゲイン
    FwKp = fp(0),
    /// 弱め界磁コントローラの積分ゲイン
    FwKi = fp(0),
    /// マニュアルモードのd軸電流指令 [A]
    ManualId = fp(0),
    /// マニュアルモードのq軸電流指令 [A]
    ManualIq = fp(0),
    /// 負方向のq軸電圧制限倍率
    NegQLim = fp(1),
    /// 同期オフセット [dig]
    SyncOfs = fp(0),
    /// 同期進角 [dig/Hz]
    SyncAdv = fp(10),
    /// 高速域での同期進角の減少量 [dig/Hz]
    SyncAdvOffs = fp(0),
    /// 同期進角減少の開始周波数 [Hz]
    SyncAdvStart = fp(200),
    /// 同期進角減少の終了周波数 [Hz]
    SyncAdvEnd = fp(400),
    /// モーター極対数
    PolePairs = fp(1),
    /// エンコーダ（レゾルバ）極対数
    ResPolePairs = fp(1),
    /// スリップ周波数 [Hz]
    FSlip = fp(1),
    /// 過電流トリップしきい値 [A]
    OcurLim = fp(300),
    /// 相電流1のゲイン [dig/A]
    Il1Gain = fp_milli(4700),
    /// 相電流2のゲイン [dig/A]
    Il2Gain = fp_milli(4700),
    /// ピンスワップ設定（pinswapビット）
    PinSwap = fp(0),
    /// DC電流推定値のフィルタ（シフト量）
    IdcFlt = fp(9),
    /// スロットル1%あたりの電流 [A/%]
    ThrotCur = fp(1),
    /// d軸への電流配分 [%]
    IdIqSplit = fp(0),
    /// 電流ベクトル上限（スロットル1%あたり電流に対する倍率）[%]
    Overdrive = fp(100),
    /// 弱め界磁スケジュール用周波数フィルタ（シフト量）
    FwFrqFlt = fp(5),
    /// 弱め界磁開始周波数 [Hz]
    FwFrqStart = fp(100),
    /// 弱め界磁中間周波数 [Hz]
    FwFrqMid = fp(200),
    /// 弱め界磁終了周波数 [Hz]
    FwFrqEnd = fp(300),
    /// 中間点のd軸弱め界磁電流 [A]
    FwIdMid = fp(0),
    /// 終了点のd軸弱め界磁電流 [A]
    FwIdEnd = fp(0),
    /// 中間点のq軸弱め界磁電流 [A]
    FwIqMid = fp(0),
    /// 終了点のq軸弱め界磁電流 [A]
    FwIqEnd = fp(0),
    // === テレメトリ ===
    /// 処理後スロットル [%]
    PotNom = fp(0),
    /// 最終トルク指令 [%]
    FinalSpnt = fp(0),
    /// 温度ディレーティング中
    TmpDerate = fp(0),
    /// 相電流1 [A]
    Il1 = fp(0),
    /// 相電流2 [A]
    Il2 = fp(0),
    /// d軸電流 [A]
    Id = fp(0),
    /// q軸電流 [A]
    Iq = fp(0),
    /// 電気周波数 [Hz]
    FStat = fp(0),
    /// 電気角 [°]
    Angle = fp(0),
    /// 推定DC電流 [A]
    Idc = fp(0),
    /// q軸電圧上限
    Amp = fp(0),
    /// d軸電圧
    Ud = fp(0),
    /// q軸電圧
    Uq = fp(0),
    /// d軸弱め界磁電流 [A]
    Ifw = fp(0),
    /// q軸弱め界磁電流 [A]
    Ifwq = fp(0),
    /// 正規化前の電流ベクトル長 [A]
    IAbs = fp(0),
    /// 正規化係数
    Norm = fp(0),
    /// 電流ベクトル上限 [A]
    Is = fp(0),
    /// d軸電流指令 [A]
    IdReq = fp(0),
    /// q軸電流指令 [A]
    IqReq = fp(0),
    /// 補正後の同期進角 [dig/Hz]
    SyncAdvFinal = fp(0),
    /// 補正後の同期オフセット [dig]
    SyncOffFinal = fp(0),
}

/// 運転モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpMode {
    Off,
    /// d/q電流指令をパラメータから直接与える
    Manual,
    /// スロットルからトルク指令
    Run,
    Boost,
    Buck,
    /// 巻線によるACヒーター
    AcHeat,
}

impl OpMode {
    /// パラメータ値からモードを取得（範囲外はOff）
    pub fn from_int(value: i32) -> Self {
        match value {
            1 => Self::Run,
            2 => Self::Manual,
            3 => Self::Boost,
            4 => Self::Buck,
            6 => Self::AcHeat,
            _ => Self::Off,
        }
    }

    /// パラメータストアに書き込む値
    pub fn to_int(self) -> i32 {
        match self {
            Self::Off => 0,
            Self::Run => 1,
            Self::Manual => 2,
            Self::Boost => 3,
            Self::Buck => 4,
            Self::AcHeat => 6,
        }
    }

    /// FOC電流制御を実行するモードか
    pub fn runs_foc(self) -> bool {
        matches!(self, Self::Manual | Self::Run)
    }
}
