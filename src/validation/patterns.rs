//! Fixed pattern sets for XSS and SQL-injection detection.

use regex::RegexSet;
use std::sync::LazyLock;

static XSS_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        // <script ...>
        r"(?i)<\s*script\b",
        // inline event handler attribute inside a tag: <img src=x onerror=...>
        r#"(?i)<[^>]*[\s/"']on[a-z]+\s*="#,
        r"(?i)\bjavascript\s*:",
        r"(?i)\bvbscript\s*:",
        // data: URLs carrying a media type, e.g. data:text/html;base64,...
        r"(?i)\bdata\s*:\s*[a-z]+/[a-z0-9.+-]+\s*[;,]",
        r"(?i)<\s*(iframe|object|embed)\b",
    ])
    .unwrap()
});

static SQLI_PATTERNS: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new([
        r"(?i)\bunion\s+(all\s+)?select\b",
        // quote-led tautology: ' OR 1=1, ' or 'a'='a
        r"(?i)'\s*(or|and)\s+'?\w+'?\s*(=|<|>|\blike\b)\s*'?\w+",
        r"(?i)\b(or|and)\s+1\s*=\s*1\b",
        // statement keyword sequence followed by a comment marker
        r"(?i)\b(select\s+[\w*,\s]+\s+from|insert\s+into|delete\s+from|drop\s+(table|database)|update\s+\w+\s+set)\b.*(--|/\*)",
        // stacked query after a quote or semicolon
        r"(?i)[;']\s*(drop\s+(table|database)|delete\s+from|truncate\s+table|alter\s+table|insert\s+into|update\s+\w+\s+set|exec(\s|\())",
        // quote immediately closed by a comment: admin'--
        r"(?i)'\s*(--|#|/\*)",
        r"(?i)\b(pg_sleep|benchmark)\s*\(|\bwaitfor\s+delay\s+'",
    ])
    .unwrap()
});

/// True if `input` matches any XSS pattern.
pub fn detect_xss(input: &str) -> bool {
    XSS_PATTERNS.is_match(input)
}

/// True if `input` matches any SQL-injection pattern.
pub fn detect_sql_injection(input: &str) -> bool {
    SQLI_PATTERNS.is_match(input)
}
