//! Configuration module
//!
//! 制御パラメータの定義とキー/値ストアを提供します。

pub mod params;
pub mod store;

// params.rsから主要な型と定数を再エクスポート
pub use params::*;

// store.rsからストアを再エクスポート
pub use store::{ParamStore, ParamTable};
