//! 时序策略实现
//!
//! `HumanTiming` 在生产中模拟人工节奏；`ZeroTiming` 用于确定性测试。

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::interfaces::renderer::Point;
use crate::interfaces::timing::{PathStep, TimingStrategy};

/// 随机抖动策略
#[derive(Debug, Clone, Default)]
pub struct HumanTiming;

impl HumanTiming {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TimingStrategy for HumanTiming {
    async fn delay(&self, min: Duration, max: Duration) {
        // ThreadRng 不是 Send，取值后立即释放
        let wait = {
            let mut rng = rand::rng();
            if max > min {
                rng.random_range(min..=max)
            } else {
                min
            }
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    fn pointer_path(&self, target: Point) -> Vec<PathStep> {
        let mut rng = rand::rng();
        let start = Point {
            x: rng.random_range(100.0..300.0),
            y: rng.random_range(100.0..300.0),
        };
        let steps: usize = rng.random_range(10..20);

        let mut path: Vec<PathStep> = (0..steps)
            .map(|i| {
                let progress = i as f64 / steps as f64;
                PathStep {
                    point: Point {
                        x: start.x + (target.x - start.x) * progress + rng.random_range(-5.0..5.0),
                        y: start.y + (target.y - start.y) * progress + rng.random_range(-5.0..5.0),
                    },
                    pause: Duration::from_millis(rng.random_range(50..=100)),
                }
            })
            .collect();

        path.push(PathStep {
            point: target,
            pause: Duration::from_millis(rng.random_range(50..=100)),
        });
        path
    }
}

/// 零延迟策略
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroTiming;

#[async_trait]
impl TimingStrategy for ZeroTiming {
    async fn delay(&self, _min: Duration, _max: Duration) {}

    fn pointer_path(&self, target: Point) -> Vec<PathStep> {
        vec![PathStep {
            point: target,
            pause: Duration::ZERO,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_path_ends_on_target() {
        let target = Point { x: 640.0, y: 360.0 };
        let path = HumanTiming::new().pointer_path(target);
        assert!(path.len() >= 11 && path.len() <= 20);
        assert_eq!(path.last().unwrap().point, target);
        assert!(path.iter().all(|s| s.pause <= Duration::from_millis(100)));
    }

    #[tokio::test]
    async fn human_delay_respects_degenerate_range() {
        let started = std::time::Instant::now();
        HumanTiming::new().delay(Duration::ZERO, Duration::ZERO).await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn zero_path_is_single_step() {
        let target = Point { x: 1.0, y: 2.0 };
        assert_eq!(ZeroTiming.pointer_path(target).len(), 1);
    }
}
