//! パラメータストア
//!
//! 制御コアはすべてのチューニング値とテレメトリをキー/値として読み書きします。
//! 永続化はこのモジュールの範囲外です。

use super::params::{OpMode, Param};
use crate::math::{fp_from_f32, Fp};

/// パラメータのキー/値インターフェース
pub trait ParamStore {
    /// 固定小数点値を取得
    fn get(&self, param: Param) -> Fp;

    /// 固定小数点値を設定
    fn set(&mut self, param: Param, value: Fp);

    /// 整数値として取得（負方向への切り捨て）
    fn get_int(&self, param: Param) -> i32 {
        self.get(param).to_num()
    }

    /// 浮動小数点値として取得
    fn get_float(&self, param: Param) -> f32 {
        self.get(param).to_num()
    }

    /// 整数値を設定（範囲外は飽和）
    fn set_int(&mut self, param: Param, value: i32) {
        self.set(param, Fp::saturating_from_num(value));
    }

    /// 浮動小数点値を設定（NaNは0、範囲外は飽和）
    fn set_float(&mut self, param: Param, value: f32) {
        self.set(param, fp_from_f32(value));
    }

    /// 運転モードを取得
    fn op_mode(&self) -> OpMode {
        OpMode::from_int(self.get_int(Param::OpMode))
    }

    /// 運転モードを設定
    fn set_op_mode(&mut self, mode: OpMode) {
        self.set_int(Param::OpMode, mode.to_int());
    }
}

/// RAM上のパラメータテーブル
#[derive(Debug, Clone)]
pub struct ParamTable {
    values: [Fp; Param::COUNT],
}

impl ParamTable {
    /// デフォルト値で初期化したテーブルを生成
    pub const fn new() -> Self {
        let mut values = [Fp::ZERO; Param::COUNT];
        let mut i = 0;
        while i < Param::COUNT {
            values[i] = Param::ALL[i].default_value();
            i += 1;
        }
        Self { values }
    }

    /// 全エントリをデフォルト値に戻す
    pub fn load_defaults(&mut self) {
        *self = Self::new();
    }
}

impl Default for ParamTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamStore for ParamTable {
    fn get(&self, param: Param) -> Fp {
        self.values[param.index()]
    }

    fn set(&mut self, param: Param, value: Fp) {
        self.values[param.index()] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fp;

    #[test]
    fn test_defaults_loaded() {
        let table = ParamTable::new();
        assert_eq!(table.get(Param::PotMax), fp(3500));
        assert_eq!(table.get_int(Param::Dir), 1);
        assert_eq!(table.op_mode(), OpMode::Off);
    }

    #[test]
    fn test_index_matches_declaration_order() {
        for (i, p) in Param::ALL.iter().enumerate() {
            assert_eq!(p.index(), i);
        }
    }

    #[test]
    fn test_set_and_get() {
        let mut table = ParamTable::new();
        table.set_int(Param::Uq, -1234);
        assert_eq!(table.get_int(Param::Uq), -1234);

        table.set_float(Param::Norm, 0.5);
        assert!((table.get_float(Param::Norm) - 0.5).abs() < 0.001);

        table.set_float(Param::Norm, f32::NAN);
        assert_eq!(table.get(Param::Norm), Fp::ZERO);

        table.set_op_mode(OpMode::Run);
        assert_eq!(table.op_mode(), OpMode::Run);

        table.load_defaults();
        assert_eq!(table.op_mode(), OpMode::Off);
    }

    #[test]
    fn test_get_int_truncates_toward_negative_infinity() {
        let mut table = ParamTable::new();
        table.set(Param::FStat, Fp::from_num(-1.5));
        assert_eq!(table.get_int(Param::FStat), -2);
    }

    #[test]
    fn test_op_mode_round_trip_for_known_values() {
        for mode in [
            OpMode::Off,
            OpMode::Manual,
            OpMode::Run,
            OpMode::Boost,
            OpMode::Buck,
            OpMode::AcHeat,
        ] {
            assert_eq!(OpMode::from_int(mode.to_int()), mode);
        }
        assert_eq!(OpMode::from_int(42), OpMode::Off);
    }
}
