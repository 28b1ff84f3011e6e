//! 分页状态机 (Pagination State Machine)
//!
//! 不接触页面：输入是"本页采集结果"与"翻页控件是否可用"两种信号，输出下一步动作。
//! 迭代上限在构造时一次算定，因此无论页面如何表现都必然终止。

use indexmap::IndexSet;
use serde::Serialize;
use strum::{AsRefStr, Display};
use url::Url;

use crate::core::model::CanonicalImageUrl;
use crate::sites::copart::content_url;

/// 画廊生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GalleryState {
    Unopened,
    Opened,
    Paginating,
    Exhausted,
    Aborted,
}

/// 状态机给出的下一步动作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// 采集当前可见缩略图
    Harvest,
    /// 查找并点击翻页控件
    Advance,
    /// 结束
    Finish,
}

/// 最小尝试次数的下限，配置只能调高
pub const MIN_PAGE_ATTEMPTS: usize = 5;

/// 计算分页迭代上限
///
/// 取 `ceil(expected / per_page)` 与最小尝试次数中的较大者；计数缺失时使用最小值。
pub fn page_ceiling(expected_total: Option<usize>, per_page: usize, min_attempts: usize) -> usize {
    let min_attempts = min_attempts.max(MIN_PAGE_ATTEMPTS);
    match expected_total {
        Some(total) if per_page > 0 => total.div_ceil(per_page).max(min_attempts),
        _ => min_attempts,
    }
}

/// 解析 "X of Y" 计数文本，返回 Y
pub fn parse_counter(text: &str) -> Option<usize> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.windows(3).find_map(|w| {
        let current = w[0].parse::<usize>().ok()?;
        if !w[1].eq_ignore_ascii_case("of") {
            return None;
        }
        let total = w[2].parse::<usize>().ok()?;
        (current <= total && total > 0).then_some(total)
    })
}

/// 去重后的采集集合
///
/// 只接受能通过内容判定的地址；重复采集同一批缩略图不会使集合增长。
#[derive(Debug, Default, Clone)]
pub struct HarvestSet {
    seen: IndexSet<CanonicalImageUrl>,
}

impl HarvestSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 吸收一批原始地址，返回新增数量
    pub fn absorb<I, S>(&mut self, base: &Url, raw: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        raw.into_iter()
            .filter_map(|r| content_url(base, r.as_ref()))
            .filter(|url| self.seen.insert(url.clone()))
            .count()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// 按字典序输出
    pub fn into_sorted(self) -> Vec<CanonicalImageUrl> {
        let mut urls: Vec<_> = self.seen.into_iter().collect();
        urls.sort();
        urls
    }
}

/// 分页游标 (PaginationCursor)，仅存活于单次提取
#[derive(Debug)]
pub struct PaginationCursor {
    pub pages_visited: usize,
    pub expected_total: Option<usize>,
    pub ceiling: usize,
    pub harvested: HarvestSet,
    state: GalleryState,
}

impl PaginationCursor {
    pub fn new(expected_total: Option<usize>, per_page: usize, min_attempts: usize) -> Self {
        Self {
            pages_visited: 0,
            expected_total,
            ceiling: page_ceiling(expected_total, per_page, min_attempts),
            harvested: HarvestSet::new(),
            state: GalleryState::Opened,
        }
    }

    pub fn state(&self) -> GalleryState {
        self.state
    }

    /// 起始动作
    pub fn start(&mut self) -> Action {
        self.state = GalleryState::Paginating;
        Action::Harvest
    }

    /// 记录一页采集：`found` 为本页元素数量
    pub fn on_harvested(&mut self, found: usize) -> Action {
        if self.is_terminal() {
            return Action::Finish;
        }
        self.pages_visited += 1;

        if found == 0 && self.pages_visited == 1 {
            // 首页即为空，视为空画廊
            return self.finish(GalleryState::Exhausted);
        }
        if self.pages_visited >= self.ceiling {
            return self.finish(GalleryState::Exhausted);
        }
        Action::Advance
    }

    /// 记录翻页结果：控件不存在或不可点击即为正常结束
    pub fn on_advanced(&mut self, clicked: bool) -> Action {
        if self.is_terminal() {
            return Action::Finish;
        }
        if clicked {
            Action::Harvest
        } else {
            self.finish(GalleryState::Exhausted)
        }
    }

    /// 会话级失败
    pub fn abort(&mut self) -> Action {
        self.finish(GalleryState::Aborted)
    }

    fn finish(&mut self, state: GalleryState) -> Action {
        self.state = state;
        Action::Finish
    }

    fn is_terminal(&self) -> bool {
        matches!(self.state, GalleryState::Exhausted | GalleryState::Aborted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.copart.com/lot/1").unwrap()
    }

    #[test]
    fn ceiling_takes_max_with_minimum() {
        assert_eq!(page_ceiling(Some(24), 8, 5), 5);
        assert_eq!(page_ceiling(Some(60), 8, 5), 8);
        assert_eq!(page_ceiling(Some(41), 8, 5), 6);
        assert_eq!(page_ceiling(None, 8, 5), 5);
        assert_eq!(page_ceiling(Some(10), 0, 5), 5);
        assert_eq!(page_ceiling(None, 8, 7), 7);
    }

    #[test]
    fn configured_minimum_cannot_go_below_five() {
        assert_eq!(page_ceiling(None, 8, 0), MIN_PAGE_ATTEMPTS);
        assert_eq!(page_ceiling(None, 8, 2), MIN_PAGE_ATTEMPTS);
        assert_eq!(page_ceiling(Some(8), 8, 1), MIN_PAGE_ATTEMPTS);
        assert_eq!(PaginationCursor::new(None, 8, 1).ceiling, MIN_PAGE_ATTEMPTS);
    }

    #[test]
    fn parses_counter_variants() {
        assert_eq!(parse_counter("1 of 24"), Some(24));
        assert_eq!(parse_counter("Photo 3 OF 12"), Some(12));
        assert_eq!(parse_counter("  7   of   40 "), Some(40));
        assert_eq!(parse_counter("of 24"), None);
        assert_eq!(parse_counter("loading..."), None);
        assert_eq!(parse_counter("30 of 24"), None);
        assert_eq!(parse_counter(""), None);
    }

    #[test]
    fn always_clickable_next_still_terminates() {
        let mut cursor = PaginationCursor::new(None, 8, 5);
        let mut action = cursor.start();
        let mut steps = 0;
        while action != Action::Finish {
            action = match action {
                Action::Harvest => cursor.on_harvested(8),
                Action::Advance => cursor.on_advanced(true),
                Action::Finish => unreachable!(),
            };
            steps += 1;
            assert!(steps < 100, "state machine failed to terminate");
        }
        assert_eq!(cursor.pages_visited, 5);
        assert_eq!(cursor.state(), GalleryState::Exhausted);
    }

    #[test]
    fn empty_first_page_is_exhausted() {
        let mut cursor = PaginationCursor::new(Some(24), 8, 5);
        assert_eq!(cursor.start(), Action::Harvest);
        assert_eq!(cursor.on_harvested(0), Action::Finish);
        assert_eq!(cursor.state(), GalleryState::Exhausted);
        assert_eq!(cursor.pages_visited, 1);
    }

    #[test]
    fn missing_next_control_ends_normally() {
        let mut cursor = PaginationCursor::new(Some(24), 8, 5);
        cursor.start();
        assert_eq!(cursor.on_harvested(8), Action::Advance);
        assert_eq!(cursor.on_advanced(true), Action::Harvest);
        assert_eq!(cursor.on_harvested(8), Action::Advance);
        assert_eq!(cursor.on_advanced(false), Action::Finish);
        assert_eq!(cursor.state(), GalleryState::Exhausted);
        assert_eq!(cursor.pages_visited, 2);
    }

    #[test]
    fn abort_is_terminal() {
        let mut cursor = PaginationCursor::new(None, 8, 5);
        cursor.start();
        assert_eq!(cursor.abort(), Action::Finish);
        assert_eq!(cursor.on_harvested(8), Action::Finish);
        assert_eq!(cursor.on_advanced(true), Action::Finish);
        assert_eq!(cursor.state(), GalleryState::Aborted);
    }

    #[test]
    fn repeated_harvest_does_not_grow() {
        let page = [
            "//cs.copart.com/lpp/a_thb.jpg",
            "//cs.copart.com/lpp/b_thb.jpg",
            "https://cs.copart.com/lpp/a_ful.jpg",
        ];
        let mut set = HarvestSet::new();
        assert_eq!(set.absorb(&base(), page), 2);
        assert_eq!(set.absorb(&base(), page), 0);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn harvest_drops_decorative_assets() {
        let mut set = HarvestSet::new();
        let added = set.absorb(
            &base(),
            ["https://cs.copart.com/img/logo.png", "https://cs.copart.com/lpp/c_sm.jpg"],
        );
        assert_eq!(added, 1);
        assert_eq!(
            set.into_sorted()[0].as_str(),
            "https://cs.copart.com/lpp/c_ful.jpg"
        );
    }

    #[test]
    fn output_is_lexicographic() {
        let mut set = HarvestSet::new();
        set.absorb(
            &base(),
            ["https://cs.copart.com/lpp/z.jpg", "https://cs.copart.com/lpp/a.jpg"],
        );
        let urls = set.into_sorted();
        assert!(urls[0] < urls[1]);
    }
}
