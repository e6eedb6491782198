//! HTML stripping and escaping for string leaves.
//!
//! Both modes are idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
//! Stripping runs to a fixed point (so `<scr<b>ipt>` cannot reassemble into a
//! tag), and escaping leaves existing entities alone (so `&lt;` never becomes
//! `&amp;lt;`).

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// `<script>`/`<style>` elements are dropped together with their content.
static DANGEROUS_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<\s*(script|style)\b[^>]*>.*?<\s*/\s*(script|style)\s*>").unwrap()
});

/// Any tag-like construct: `<b>`, `</div >`, `<img src=x>`, `<!-- c -->`.
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<\s*/?\s*[a-zA-Z!][^<>]*>").unwrap());

/// A well-formed entity at the start of the haystack.
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:[a-zA-Z][a-zA-Z0-9]{1,31}|#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6});").unwrap()
});

/// Removes every tag until none is left.
pub fn strip_tags(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let without_blocks = DANGEROUS_BLOCK.replace_all(&current, "");
        let next = TAG.replace_all(&without_blocks, "").into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

/// Entity-escapes markup characters, keeping entities that are already there.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for (i, ch) in input.char_indices() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '&' if ENTITY.is_match(&input[i..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Sanitizes one string: strip tags, then escape what remains when
/// `escape` is set.
pub fn sanitize_string(input: &str, escape: bool) -> String {
    let stripped = strip_tags(input);
    if escape {
        escape_html(&stripped)
    } else {
        stripped
    }
}

/// Sanitizes every string leaf and object key in place. Returns how many
/// of them changed. Keys that collide once cleaned keep the last value.
pub fn sanitize_value(value: &mut Value, escape: bool) -> usize {
    match value {
        Value::String(s) => {
            let cleaned = sanitize_string(s, escape);
            if cleaned != *s {
                *s = cleaned;
                1
            } else {
                0
            }
        }
        Value::Array(items) => items.iter_mut().map(|v| sanitize_value(v, escape)).sum(),
        Value::Object(map) => {
            let mut changed = 0;
            for (key, mut child) in std::mem::take(map) {
                changed += sanitize_value(&mut child, escape);
                let cleaned = sanitize_string(&key, escape);
                if cleaned != key {
                    changed += 1;
                }
                map.insert(cleaned, child);
            }
            changed
        }
        _ => 0,
    }
}
