//! 定位解析器 (Locator Resolver)
//!
//! 按序尝试候选链，首个命中者胜出；全部未命中返回 `None`，由调用方决定回退策略。

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::core::error::Result;
use crate::interfaces::locator::{Locator, LocatorChain};
use crate::interfaces::renderer::PageRenderer;

/// 整体时限模式下，每轮对单个候选的探测时长
const ROUND_SLICE: Duration = Duration::from_millis(500);
/// 两轮之间的间隔
const ROUND_GAP: Duration = Duration::from_millis(250);

pub struct LocatorResolver<'a, R: PageRenderer> {
    renderer: &'a R,
    timeout_per_candidate: Duration,
}

enum Attempt<E> {
    Hit(E),
    Miss,
}

impl<'a, R: PageRenderer> LocatorResolver<'a, R> {
    pub fn new(renderer: &'a R, timeout_per_candidate: Duration) -> Self {
        Self {
            renderer,
            timeout_per_candidate,
        }
    }

    /// 依次等待每个候选，单个候选最多等待 `timeout_per_candidate`
    ///
    /// 只有会话级致命错误会向上传播。
    pub async fn resolve(&self, chain: &LocatorChain) -> Result<Option<R::Element>> {
        for locator in &chain.candidates {
            if let Attempt::Hit(element) = self
                .try_candidate(chain, locator, self.timeout_per_candidate)
                .await?
            {
                return Ok(Some(element));
            }
        }
        debug!("[{}] 所有候选均未命中", chain.name);
        Ok(None)
    }

    /// 在整体时限 `deadline` 内轮询整条候选链
    ///
    /// 每轮按序短暂探测各候选，总耗时不超过 `deadline`，与候选数量无关。
    pub async fn resolve_within(
        &self,
        chain: &LocatorChain,
        deadline: Duration,
    ) -> Result<Option<R::Element>> {
        let until = Instant::now() + deadline;

        loop {
            for locator in &chain.candidates {
                let remaining = until.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                if let Attempt::Hit(element) = self
                    .try_candidate(chain, locator, ROUND_SLICE.min(remaining))
                    .await?
                {
                    return Ok(Some(element));
                }
            }

            let remaining = until.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(ROUND_GAP.min(remaining)).await;
        }

        debug!("[{}] {:?} 内所有候选均未命中", chain.name, deadline);
        Ok(None)
    }

    async fn try_candidate(
        &self,
        chain: &LocatorChain,
        locator: &Locator,
        timeout: Duration,
    ) -> Result<Attempt<R::Element>> {
        match self.renderer.wait_for(locator, true, timeout).await {
            Ok(Some(element)) => {
                debug!("[{}] 命中定位器 {}", chain.name, locator);
                Ok(Attempt::Hit(element))
            }
            Ok(None) => Ok(Attempt::Miss),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                debug!("[{}] 定位器 {} 解析失败: {}", chain.name, locator, e);
                Ok(Attempt::Miss)
            }
        }
    }

    /// 立即查询：返回首个非空候选的全部元素，不等待
    pub async fn query_first_nonempty(&self, chain: &LocatorChain) -> Result<Vec<R::Element>> {
        for locator in &chain.candidates {
            match self.renderer.query_all(locator).await {
                Ok(elements) if !elements.is_empty() => return Ok(elements),
                Ok(_) => continue,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    debug!("[{}] 查询 {} 失败: {}", chain.name, locator, e);
                    continue;
                }
            }
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::core::error::ScrapeError;
    use crate::interfaces::renderer::{BoundingBox, Point};

    const FIRST: Locator = Locator::css("#zoomImgElement");
    const SECOND: Locator = Locator::css(".image-galleria-dialog img");
    const THIRD: Locator = Locator::css(".p-galleria-item img");

    fn chain() -> LocatorChain {
        LocatorChain::new("marker", vec![FIRST, SECOND, THIRD])
    }

    enum Answer {
        Hit,
        Miss,
        Fail(fn() -> ScrapeError),
        /// 第 n 次查询起才命中
        HitAfter(usize),
    }

    /// 按定位器应答并记录查询顺序
    struct Recorder {
        answers: HashMap<String, Answer>,
        queried: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn new(answers: Vec<(Locator, Answer)>) -> Self {
            Self {
                answers: answers
                    .into_iter()
                    .map(|(l, a)| (l.to_string(), a))
                    .collect(),
                queried: Mutex::new(Vec::new()),
            }
        }

        fn queried(&self) -> Vec<String> {
            self.queried.lock().clone()
        }

        fn times(&self, locator: &Locator) -> usize {
            let key = locator.to_string();
            self.queried.lock().iter().filter(|q| **q == key).count()
        }
    }

    #[async_trait]
    impl PageRenderer for Recorder {
        type Element = String;

        async fn navigate(&self, _url: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }

        async fn title(&self) -> Result<Option<String>> {
            Ok(None)
        }

        async fn wait_for(
            &self,
            locator: &Locator,
            _visible: bool,
            _timeout: Duration,
        ) -> Result<Option<String>> {
            let key = locator.to_string();
            let seen = {
                let mut queried = self.queried.lock();
                queried.push(key.clone());
                queried.iter().filter(|q| **q == key).count()
            };
            match self.answers.get(&key) {
                Some(Answer::Hit) => Ok(Some(key)),
                Some(Answer::HitAfter(n)) if seen >= *n => Ok(Some(key)),
                Some(Answer::Fail(err)) => Err(err()),
                _ => Ok(None),
            }
        }

        async fn query_all(&self, _locator: &Locator) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn read_attribute(&self, _element: &String, _name: &str) -> Result<Option<String>> {
            Ok(None)
        }

        async fn read_text(&self, _element: &String) -> Result<Option<String>> {
            Ok(None)
        }

        async fn click(&self, _element: &String) -> Result<()> {
            Ok(())
        }

        async fn bounding_box(&self, _element: &String) -> Result<Option<BoundingBox>> {
            Ok(None)
        }

        async fn move_pointer(&self, _to: Point) -> Result<()> {
            Ok(())
        }

        async fn snapshot(&self) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn is_usable(&self) -> bool {
            true
        }

        async fn reopen(&self) -> Result<()> {
            Ok(())
        }
    }

    fn resolver(renderer: &Recorder) -> LocatorResolver<'_, Recorder> {
        LocatorResolver::new(renderer, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn candidates_are_tried_in_order_until_first_hit() {
        let renderer = Recorder::new(vec![
            (FIRST, Answer::Miss),
            (SECOND, Answer::Hit),
            (THIRD, Answer::Hit),
        ]);

        let hit = resolver(&renderer).resolve(&chain()).await.unwrap();

        assert_eq!(hit, Some(SECOND.to_string()));
        assert_eq!(renderer.queried(), vec![FIRST.to_string(), SECOND.to_string()]);
    }

    #[tokio::test]
    async fn non_fatal_error_moves_to_next_candidate() {
        let renderer = Recorder::new(vec![
            (FIRST, Answer::Fail(|| ScrapeError::Browser("bad selector".into()))),
            (SECOND, Answer::Hit),
        ]);

        let hit = resolver(&renderer).resolve(&chain()).await.unwrap();

        assert_eq!(hit, Some(SECOND.to_string()));
        assert_eq!(renderer.times(&THIRD), 0);
    }

    #[tokio::test]
    async fn session_loss_propagates() {
        let renderer = Recorder::new(vec![
            (FIRST, Answer::Fail(|| ScrapeError::SessionClosed)),
            (SECOND, Answer::Hit),
        ]);

        let err = resolver(&renderer).resolve(&chain()).await.unwrap_err();

        assert!(matches!(err, ScrapeError::SessionClosed));
        assert_eq!(renderer.queried(), vec![FIRST.to_string()]);
    }

    #[tokio::test]
    async fn all_misses_resolve_to_none() {
        let renderer = Recorder::new(Vec::new());

        let hit = resolver(&renderer).resolve(&chain()).await.unwrap();

        assert!(hit.is_none());
        assert_eq!(renderer.queried().len(), 3);
    }

    #[tokio::test]
    async fn deadline_bounds_the_whole_chain() {
        let renderer = Recorder::new(Vec::new());
        let deadline = Duration::from_millis(300);

        let started = std::time::Instant::now();
        let hit = resolver(&renderer)
            .resolve_within(&chain(), deadline)
            .await
            .unwrap();

        assert!(hit.is_none());
        assert!(started.elapsed() < deadline * 2);
        // 时限内反复轮询，而不是在首个候选上耗尽时限
        assert!(renderer.times(&FIRST) >= 2);
        assert!(renderer.times(&THIRD) >= 1);
    }

    #[tokio::test]
    async fn late_candidate_is_found_on_a_later_round() {
        let renderer = Recorder::new(vec![(SECOND, Answer::HitAfter(2))]);

        let hit = resolver(&renderer)
            .resolve_within(&chain(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(hit, Some(SECOND.to_string()));
        let queried = renderer.queried();
        assert_eq!(
            queried,
            vec![
                FIRST.to_string(),
                SECOND.to_string(),
                THIRD.to_string(),
                FIRST.to_string(),
                SECOND.to_string(),
            ]
        );
    }
}
