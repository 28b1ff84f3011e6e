//! 站点适配
//!
//! 目前仅支持 Copart 列表页。

pub mod copart;
