//! Deterministic text transforms.
//!
//! Line-oriented transforms work on `(body, ending)` pairs so `\n`, `\r\n`
//! and `\r` survive untouched. Reordering transforms move bodies between
//! slots and leave each slot's ending in place, which keeps a final line
//! without a newline at the end.
use pastel_protocol::FailureKind;

use crate::{command::TextTransform, task::TaskResult};

/// Apply `transform` to `text`.
pub fn execute(text: &str, transform: TextTransform) -> TaskResult {
    if text.is_empty() {
        return TaskResult::failure(FailureKind::EmptyInput, "No text selected");
    }
    TaskResult::single(apply(text, transform))
}

/// Apply `transform`, returning the new text.
pub fn apply(text: &str, transform: TextTransform) -> String {
    match transform {
        TextTransform::Upper => text.to_uppercase(),
        TextTransform::Lower => text.to_lowercase(),
        TextTransform::Title => title_case(text),
        TextTransform::Capitalize => map_lines(text, capitalize),
        TextTransform::Strip => map_lines(text, |s| s.trim_end().to_string()),
        TextTransform::SortAscending => reorder(text, |b| b.sort()),
        TextTransform::SortDescending => reorder(text, |b| b.sort_by(|x, y| y.cmp(x))),
        TextTransform::Reverse => reorder(text, |b| b.reverse()),
        TextTransform::RemoveEmpty => split_lines(text)
            .into_iter()
            .filter(|(body, _)| !body.trim().is_empty())
            .map(|(body, end)| format!("{body}{end}"))
            .collect(),
        TextTransform::RemoveDuplicates => remove_duplicates(text),
    }
}

/// Split into `(body, ending)` pairs. An empty trailing line is not emitted.
pub fn split_lines(text: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let bytes = text.as_bytes();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                out.push((&text[start..i], &text[i..i + 1]));
                i += 1;
                start = i;
            }
            b'\r' => {
                let end = if bytes.get(i + 1) == Some(&b'\n') { i + 2 } else { i + 1 };
                out.push((&text[start..i], &text[i..end]));
                i = end;
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < text.len() {
        out.push((&text[start..], ""));
    }
    out
}

/// Split a line body into leading indentation (spaces and tabs) and the rest.
fn split_indent(body: &str) -> (&str, &str) {
    let rest = body.trim_start_matches([' ', '\t']);
    body.split_at(body.len() - rest.len())
}

/// Apply `f` to each line body after its indentation.
fn map_lines(text: &str, f: impl Fn(&str) -> String) -> String {
    split_lines(text)
        .into_iter()
        .map(|(body, end)| {
            let (indent, rest) = split_indent(body);
            format!("{indent}{}{end}", f(rest))
        })
        .collect()
}

/// Reorder line bodies with `f`; endings stay in their slots.
fn reorder(text: &str, f: impl FnOnce(&mut Vec<&str>)) -> String {
    let lines = split_lines(text);
    let mut bodies: Vec<&str> = lines.iter().map(|(b, _)| *b).collect();
    f(&mut bodies);
    bodies
        .into_iter()
        .zip(lines.iter().map(|(_, e)| *e))
        .map(|(b, e)| format!("{b}{e}"))
        .collect()
}

/// Drop consecutive repeats; the surviving line takes the ending of the last
/// line in its run.
fn remove_duplicates(text: &str) -> String {
    let mut kept: Vec<(&str, &str)> = Vec::new();
    for (body, end) in split_lines(text) {
        match kept.last_mut() {
            Some(last) if last.0 == body => last.1 = end,
            _ => kept.push((body, end)),
        }
    }
    kept.into_iter().map(|(b, e)| format!("{b}{e}")).collect()
}

/// Uppercase the first character and lowercase the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Uppercase letters that follow a non-letter, lowercase the others.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
