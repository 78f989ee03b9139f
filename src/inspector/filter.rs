use crate::capture::CapturedRequest;

/// 不区分大小写的子串过滤，匹配 "url method"；空过滤条件匹配一切
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextFilter {
    needle: String,
}

impl TextFilter {
    pub fn new(text: &str) -> Self {
        Self {
            needle: text.to_lowercase(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.needle
    }

    pub fn matches(&self, record: &CapturedRequest) -> bool {
        self.is_empty() || record.search_text().to_lowercase().contains(&self.needle)
    }

    /// 保持原有顺序
    pub fn apply<'a, I>(&self, records: I) -> Vec<&'a CapturedRequest>
    where
        I: IntoIterator<Item = &'a CapturedRequest>,
    {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}
