//! 排除規則：以相對路徑前綴保護目標目錄中的檔案不被覆蓋。
//!
//! 只支援字面前綴比對，不支援萬用字元 (glob)。`storage` 會排除 `storage`
//! 本身以及其下所有內容，`config.php` 只排除該檔案。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 已正規化的相對路徑：以 `/` 分隔、沒有空段落或 `.` 段落、不為空字串。
///
/// 只能透過 [`ExclusionSet::parse`] 建立。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ExclusionRule(String);

impl ExclusionRule {
    fn normalize(line: &str) -> Option<Self> {
        let line = line.trim().replace('\\', "/");
        let segments: Vec<&str> = line
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect();

        if segments.is_empty() {
            None
        } else {
            Some(Self(segments.join("/")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 路徑等於規則，或以 `規則/` 開頭
    pub fn matches(&self, relative_path: &str) -> bool {
        match relative_path.strip_prefix(self.0.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }
}

impl fmt::Display for ExclusionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExclusionRule {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// 一次更新作業使用的排除規則集合，保留第一次出現的順序。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ExclusionSet {
    rules: Vec<ExclusionRule>,
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}' | '\u{2028}' | '\u{2029}'
    )
}

impl ExclusionSet {
    /// 從多行文字建立規則集合，每行一個路徑，接受任何換行格式
    pub fn parse(raw: &str) -> Self {
        Self::from_lines(raw.split(is_line_break))
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut rules: Vec<ExclusionRule> = Vec::new();
        for line in lines {
            if let Some(rule) = ExclusionRule::normalize(line.as_ref()) {
                if !rules.contains(&rule) {
                    rules.push(rule);
                }
            }
        }
        Self { rules }
    }

    /// 回傳第一個符合的規則
    pub fn matches(&self, relative_path: &str) -> Option<&ExclusionRule> {
        self.rules.iter().find(|rule| rule.matches(relative_path))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExclusionRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// 轉回每行一條規則的文字
    pub fn to_text(&self) -> String {
        self.to_strings().join("\n")
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.rules.iter().map(|rule| rule.0.clone()).collect()
    }
}

impl From<Vec<String>> for ExclusionSet {
    fn from(lines: Vec<String>) -> Self {
        Self::from_lines(lines)
    }
}

impl From<ExclusionSet> for Vec<String> {
    fn from(set: ExclusionSet) -> Self {
        set.to_strings()
    }
}
