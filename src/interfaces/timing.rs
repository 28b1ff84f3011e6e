//! 时序策略 (Timing Strategy)
//!
//! 随机停顿与指针轨迹，生产环境注入随机抖动，测试注入零延迟。

use std::time::Duration;

use async_trait::async_trait;

use crate::interfaces::renderer::Point;

/// 指针轨迹中的一步
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathStep {
    pub point: Point,
    pub pause: Duration,
}

#[async_trait]
pub trait TimingStrategy: Send + Sync {
    /// 在 `[min, max]` 区间内停顿
    async fn delay(&self, min: Duration, max: Duration);

    /// 生成移向目标点的轨迹，最后一步必须落在目标上
    fn pointer_path(&self, target: Point) -> Vec<PathStep>;
}
