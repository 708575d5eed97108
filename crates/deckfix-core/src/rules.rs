// ABOUTME: Offline proofreading rules: a fixed misspelling dictionary plus repeated-letter cleanup.
// ABOUTME: Used by the model-free `correct` command; produces the same Proposals the agent tools do.

use std::sync::LazyLock;

use regex::Regex;

use crate::correction::{CorrectionKind, Proposal};
use crate::deck::Deck;

/// Misspelling patterns (matched case-insensitively on word boundaries) and
/// their replacements, applied in order.
const SPELLING_RULES: &[(&str, &str)] = &[
    (r"\biss\b", "is"),
    (r"\bhavings\b", "has"),
    (r"\bhaveing\b", "having"),
    (r"\bissuess\b", "issues"),
    (r"\btestssss\b", "tests"),
    (r"\btestsss\b", "tests"),
    (r"\btestss\b", "tests"),
    (r"\bteh\b", "the"),
    (r"\brecieve\b", "receive"),
    (r"\boccured\b", "occurred"),
    (r"\bseperately\b", "separately"),
    (r"\bdefinate\b", "definite"),
    (r"\boccassion\b", "occasion"),
    (r"\buntill\b", "until"),
    (r"\bwich\b", "which"),
    (r"\bwih\b", "with"),
    (r"\bwiht\b", "with"),
    (r"\bthat\s+that\b", "that"),
    (r"\bthe\s+the\b", "the"),
];

static COMPILED_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    SPELLING_RULES
        .iter()
        .map(|(pattern, replacement)| {
            let re = Regex::new(&format!("(?i){}", pattern)).expect("spelling rule pattern is valid");
            (re, *replacement)
        })
        .collect()
});

static WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("word pattern is valid"));

/// Letters whose legitimate word endings are doubled (`ss`, `tt`, `ee`, `ll`).
const DOUBLED_ENDINGS: &[char] = &['s', 't', 'e', 'l'];

/// Run every rule over `text`. Returns the corrected text and a note per
/// rule that fired, or `None` when nothing changed.
pub fn proofread(text: &str) -> Option<(String, Vec<String>)> {
    let mut current = text.to_string();
    let mut notes = Vec::new();

    for (re, replacement) in COMPILED_RULES.iter() {
        let next = re.replace_all(&current, *replacement);
        if next != current {
            notes.push(format!("'{}' -> '{}'", re.as_str().trim_start_matches("(?i)"), replacement));
            current = next.into_owned();
        }
    }

    let fixed = fix_repeated_letters(&current);
    if fixed != current {
        notes.push("fixed repeated characters".to_string());
        current = fixed;
    }

    (current != text).then_some((current, notes))
}

/// Collapse a run of three or more identical letters ending a word: s, t, e
/// and l collapse to a double letter, anything else to a single one.
fn fix_repeated_letters(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for word in WORD_REGEX.find_iter(text) {
        out.push_str(&text[last..word.start()]);
        out.push_str(&collapse_trailing_run(word.as_str()));
        last = word.end();
    }
    out.push_str(&text[last..]);
    out
}

fn collapse_trailing_run(word: &str) -> String {
    let Some(tail) = word.chars().last().filter(|c| c.is_ascii_alphabetic()) else {
        return word.to_string();
    };
    let run = word.chars().rev().take_while(|c| *c == tail).count();
    if run < 3 {
        return word.to_string();
    }

    let prefix_len = word.len() - run * tail.len_utf8();
    let keep = if DOUBLED_ENDINGS.contains(&tail) { 2 } else { 1 };
    let mut fixed = word[..prefix_len].to_string();
    fixed.extend(std::iter::repeat_n(tail, keep));
    fixed
}

/// Spelling proposals for every text element in the deck.
pub fn propose_corrections(deck: &Deck) -> Vec<Proposal> {
    deck.elements()
        .filter(|e| !e.text.trim().is_empty())
        .filter_map(|e| {
            let (corrected, notes) = proofread(&e.text)?;
            Some(Proposal {
                target: e.id,
                kind: CorrectionKind::Spelling,
                original: e.text.clone(),
                replacement: corrected,
                rationale: Some(notes.join("; ")),
            })
        })
        .collect()
}
