//! 结构化定位器 (Structural Locators)
//!
//! 同一逻辑目标在不同改版/AB 变体下的多种查找方式，按可靠性排序。

use std::fmt;

/// 渲染器可执行的底层查询
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Css(String),
    XPath(String),
}

/// 单个定位器变体
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// 按属性匹配，`contains` 为空时只要求属性存在
    Attribute {
        tag: Option<&'static str>,
        name: &'static str,
        contains: Option<&'static str>,
    },
    /// 按 class 组合匹配，`scope` 为祖先容器选择器
    Classes {
        scope: Option<&'static str>,
        tag: Option<&'static str>,
        classes: &'static [&'static str],
    },
    /// 测试钩子 `[data-testid="..."]`
    TestHook(&'static str),
    /// 按可见文本包含匹配 (编译为 XPath)
    Text {
        tag: &'static str,
        needle: &'static str,
    },
    /// 原样 CSS
    Css(&'static str),
}

impl Locator {
    pub const fn css(selector: &'static str) -> Self {
        Locator::Css(selector)
    }

    pub const fn test_hook(id: &'static str) -> Self {
        Locator::TestHook(id)
    }

    pub const fn text(tag: &'static str, needle: &'static str) -> Self {
        Locator::Text { tag, needle }
    }

    pub const fn classes(tag: Option<&'static str>, classes: &'static [&'static str]) -> Self {
        Locator::Classes {
            scope: None,
            tag,
            classes,
        }
    }

    pub const fn scoped_classes(
        scope: &'static str,
        tag: Option<&'static str>,
        classes: &'static [&'static str],
    ) -> Self {
        Locator::Classes {
            scope: Some(scope),
            tag,
            classes,
        }
    }

    pub const fn attribute_contains(
        tag: Option<&'static str>,
        name: &'static str,
        needle: &'static str,
    ) -> Self {
        Locator::Attribute {
            tag,
            name,
            contains: Some(needle),
        }
    }

    /// 编译为渲染器查询
    pub fn query(&self) -> Query {
        match self {
            Locator::Attribute {
                tag,
                name,
                contains,
            } => {
                let tag = tag.unwrap_or("");
                match contains {
                    Some(needle) => Query::Css(format!("{}[{}*=\"{}\"]", tag, name, needle)),
                    None => Query::Css(format!("{}[{}]", tag, name)),
                }
            }
            Locator::Classes {
                scope,
                tag,
                classes,
            } => {
                let mut sel = String::new();
                if let Some(scope) = scope {
                    sel.push_str(scope);
                    sel.push(' ');
                }
                sel.push_str(tag.unwrap_or(""));
                for class in classes.iter() {
                    sel.push('.');
                    sel.push_str(class);
                }
                Query::Css(sel)
            }
            Locator::TestHook(id) => Query::Css(format!("[data-testid=\"{}\"]", id)),
            Locator::Text { tag, needle } => Query::XPath(format!(
                "//{}[contains(normalize-space(.), \"{}\")]",
                tag, needle
            )),
            Locator::Css(sel) => Query::Css(sel.to_string()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.query() {
            Query::Css(s) => write!(f, "css:{}", s),
            Query::XPath(s) => write!(f, "xpath:{}", s),
        }
    }
}

/// 定位候选链 (LocatorCandidate)
///
/// 候选之间假定互斥，解析时最具体者优先。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorChain {
    pub name: &'static str,
    pub candidates: Vec<Locator>,
}

impl LocatorChain {
    pub fn new(name: &'static str, candidates: Vec<Locator>) -> Self {
        Self { name, candidates }
    }

    pub fn contains(&self, locator: &Locator) -> bool {
        self.candidates.contains(locator)
    }
}
