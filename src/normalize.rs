//! Name and address canonicalization
//!
//! Both keys go through NFKC (which folds full-width Latin, digits and
//! half-width katakana), then lose all whitespace and a fixed set of
//! punctuation, bracket and dash characters. Name keys additionally lose
//! every legal-entity designator wherever it occurs in the string.
//!
//! The passes are repeated until nothing changes, so stripping can never
//! expose a new designator or a new composable sequence: the functions are
//! idempotent.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use unicode_normalization::{is_nfkc, UnicodeNormalization};

/// Comparison key produced by [`normalize_name`] or [`normalize_address`].
pub type NormalizedKey = String;

/// Legal-entity designators removed from names.
pub const CORP_TOKENS: &[&str] = &[
    "株式会社",
    "(株)",
    "（株）",
    "㈱",
    "有限会社",
    "(有)",
    "（有）",
    "㈲",
    "合同会社",
    "(同)",
    "（同）",
    "一般社団法人",
    "一般財団法人",
    "公益社団法人",
    "公益財団法人",
    "医療法人",
    "社会福祉法人",
    "学校法人",
    "宗教法人",
    "信用金庫",
    "信用組合",
    "農業協同組合",
    "漁業協同組合",
];

/// Punctuation, brackets and dashes removed from both keys.
pub const PUNCTUATION_CHARS: &str =
    " 　、。・.,，．/／()（）［］[]{}「」『』<>＜＞※＊*#＃$＄%％=＝_＿:：;；\"'`~ｰ－‐–—―-";

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("static pattern");
    static ref PUNCTUATION: HashSet<char> = PUNCTUATION_CHARS.chars().collect();
}

/// Canonical key for a company name.
pub fn normalize_name(raw: &str) -> NormalizedKey {
    canonicalize(raw, true)
}

/// Canonical key for an address. Entity designators are kept.
pub fn normalize_address(raw: &str) -> NormalizedKey {
    canonicalize(raw, false)
}

/// Key for an optional cell; a missing value yields the empty key.
pub fn normalize_name_opt(raw: Option<&str>) -> NormalizedKey {
    raw.map(normalize_name).unwrap_or_default()
}

pub fn normalize_address_opt(raw: Option<&str>) -> NormalizedKey {
    raw.map(normalize_address).unwrap_or_default()
}

fn canonicalize(raw: &str, strip_entity_tokens: bool) -> NormalizedKey {
    let mut current: String = raw.nfkc().collect();
    loop {
        let mut next = current.trim().to_string();
        if strip_entity_tokens {
            next = strip_corp_tokens(&next);
        }
        next = WHITESPACE.replace_all(&next, "").into_owned();
        next.retain(|c| !PUNCTUATION.contains(&c));
        if !is_nfkc(&next) {
            next = next.nfkc().collect();
        }

        let settled = next == current;
        current = next;
        if settled {
            return current;
        }
    }
}

fn strip_corp_tokens(s: &str) -> String {
    CORP_TOKENS
        .iter()
        .fold(s.to_string(), |acc, token| acc.replace(token, ""))
}
