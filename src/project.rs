//! Image list files.
//!
//! A list is a line-oriented text file holding one `<SNAPEASE_IMAGELIST`
//! block. Each `IMAGE` (or `IMAGE_FULL`) line inside it carries one record;
//! trailing fields were added over time and are optional on read.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::geometry::{Rect, Rotation};
use crate::state::{COLOR_ADJUST_LEN, EditState};

pub const EXTENSION: &str = "SnapeaseList";

const LIST_TAG: &str = "<SNAPEASE_IMAGELIST";
const LIST_VERSION: &str = "0.0";

// Token counts (keyword included) at which optional fields appear.
const MIN_TOKENS: usize = 10;
const ADJUST_TOKENS: usize = 15;
const ROT_CHECK_TOKENS: usize = 16;
const TIMESTAMP_TOKENS: usize = 17;

/// One record as stored in a list file.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub path: PathBuf,
    pub display_name: String,
    pub edit: EditState,
    /// Global edit mode code stored on the line.
    pub edit_mode: i32,
    /// Written as `IMAGE_FULL`.
    pub fullscreen: bool,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Default)]
pub struct Parsed {
    pub entries: Vec<Entry>,
    /// The closing `>` of the list block was reached.
    pub complete: bool,
    pub found_list: bool,
}

/// Splits a line into tokens. A token that starts with `"`, `'` or `` ` ``
/// runs to the next occurrence of the same character. Returns `None` for an
/// unterminated quote.
fn tokenize(line: &str) -> Option<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(&first) = chars.peek() else {
            break;
        };
        let mut token = String::new();
        if matches!(first, '"' | '\'' | '`') {
            chars.next();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == first {
                    closed = true;
                    break;
                }
                token.push(c);
            }
            if !closed {
                return None;
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                token.push(c);
            }
        }
        tokens.push(token);
    }
    Some(tokens)
}

/// Leading integer of `s`, `0` when there is none.
fn lenient_int(s: &str) -> i64 {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    s[..end].parse().unwrap_or(0)
}

/// Longest leading float of `s`, `0.0` when there is none.
fn lenient_float(s: &str) -> f64 {
    let s = s.trim_start();
    if let Ok(v) = s.parse::<f64>() {
        return v;
    }
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .unwrap_or(s.len());
    (1..=end)
        .rev()
        .find_map(|n| s[..n].parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn is_open(tokens: &[String]) -> bool {
    tokens.first().is_some_and(|t| t.starts_with('<'))
}

fn is_close(tokens: &[String]) -> bool {
    tokens.first().is_some_and(|t| t.starts_with('>'))
}

/// Iterator over the non-empty, well-formed lines of a file.
struct Lines<'a> {
    inner: std::str::Lines<'a>,
}

impl Iterator for Lines<'_> {
    type Item = Vec<String>;

    fn next(&mut self) -> Option<Vec<String>> {
        for line in self.inner.by_ref() {
            match tokenize(line) {
                Some(tokens) if !tokens.is_empty() => return Some(tokens),
                _ => {}
            }
        }
        None
    }
}

/// Consumes lines up to the `>` matching a block that was just opened.
/// Returns `false` if the text ends first.
fn skip_block(lines: &mut Lines<'_>) -> bool {
    let mut depth = 1usize;
    for tokens in lines.by_ref() {
        if is_open(&tokens) {
            depth += 1;
        } else if is_close(&tokens) {
            depth -= 1;
            if depth == 0 {
                return true;
            }
        }
    }
    false
}

fn parse_entry(tokens: &[String], base_dir: &Path) -> Option<Entry> {
    let keyword = tokens.first()?;
    let fullscreen = if keyword.eq_ignore_ascii_case("IMAGE_FULL") {
        true
    } else if keyword.eq_ignore_ascii_case("IMAGE") {
        false
    } else {
        return None;
    };
    if tokens.len() < MIN_TOKENS {
        tracing::debug!(fields = tokens.len(), "skipping short image line");
        return None;
    }

    let int = |i: usize| lenient_int(&tokens[i]);
    let mut edit = EditState {
        grayscale: int(3) != 0,
        rotation: Rotation::from_steps(int(4) & 3),
        crop: Rect::new(int(6) as i32, int(7) as i32, int(8) as i32, int(9) as i32),
        ..EditState::default()
    };
    if tokens.len() >= ADJUST_TOKENS {
        for (slot, token) in edit.color_adjust.iter_mut().zip(&tokens[10..10 + COLOR_ADJUST_LEN]) {
            *slot = lenient_float(token) as f32;
        }
    }
    edit.need_rot_check = tokens.len() >= ROT_CHECK_TOKENS && int(15) != 0;
    let timestamp = if tokens.len() >= TIMESTAMP_TOKENS {
        Some(lenient_float(&tokens[16]) as i64).filter(|&t| t != 0)
    } else {
        None
    };

    Some(Entry {
        path: resolve_relative(base_dir, &tokens[1]),
        display_name: tokens[2].clone(),
        edit,
        edit_mode: int(5) as i32,
        fullscreen,
        timestamp,
    })
}

/// Parses list text. Relative paths are resolved against `base_dir`.
///
/// Parsing stops at the first list block's closing `>`; anything malformed
/// before it is skipped, and an unterminated block leaves `complete` false
/// with the entries read so far.
pub fn parse(text: &str, base_dir: &Path) -> Parsed {
    let mut parsed = Parsed::default();
    let mut lines = Lines { inner: text.lines() };
    let mut in_list = false;

    while let Some(tokens) = lines.next() {
        if in_list {
            if is_close(&tokens) {
                parsed.complete = true;
                break;
            }
            if is_open(&tokens) {
                if !skip_block(&mut lines) {
                    break;
                }
                continue;
            }
            if let Some(entry) = parse_entry(&tokens, base_dir) {
                parsed.entries.push(entry);
            }
        } else if is_open(&tokens) {
            if tokens[0].eq_ignore_ascii_case(LIST_TAG) {
                parsed.found_list = true;
                in_list = true;
            } else if !skip_block(&mut lines) {
                break;
            }
        }
    }
    parsed
}

/// Reads and parses the list file at `path`.
pub fn read(path: &Path) -> anyhow::Result<Parsed> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read image list {}", path.display()))?;
    let base_dir = path.parent().unwrap_or(Path::new(""));
    Ok(parse(&text, base_dir))
}

/// Quotes `text` with the first of `"`, `'` and `` ` `` it does not contain.
/// If it contains all three, backticks inside are turned into `'`.
pub fn escape_quoted(text: &str) -> String {
    let quote = ['"', '\'', '`'].into_iter().find(|q| !text.contains(*q));
    match quote {
        Some(q) => format!("{q}{text}{q}"),
        None => format!("`{}`", text.replace('`', "'")),
    }
}

/// `path` relative to `base_dir` when it lies inside it (compared without
/// regard to ASCII case), otherwise `path` unchanged.
pub fn make_relative(base_dir: &Path, path: &Path) -> String {
    let full = path.to_string_lossy();
    let lead = base_dir.to_string_lossy();
    let lead = lead.trim_end_matches(['/', '\\']);
    if lead.is_empty() || full.len() <= lead.len() + 1 {
        return full.into_owned();
    }
    let prefix_matches = full
        .get(..lead.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(lead));
    let at_separator = matches!(full.as_bytes()[lead.len()], b'/' | b'\\');
    if prefix_matches && at_separator {
        full[lead.len() + 1..].to_string()
    } else {
        full.into_owned()
    }
}

fn looks_absolute(token: &str) -> bool {
    let b = token.as_bytes();
    Path::new(token).is_absolute()
        || b.first() == Some(&b'/')
        || b.starts_with(b"\\\\")
        || (b.len() > 1 && b[1] == b':')
}

/// Path stored in a list file, turned back into a usable path. A relative
/// path that does not exist as given is tried against `base_dir`.
pub fn resolve_relative(base_dir: &Path, token: &str) -> PathBuf {
    let literal = PathBuf::from(token);
    if token.is_empty() || looks_absolute(token) || literal.exists() {
        return literal;
    }
    let candidate = base_dir.join(token);
    if candidate.exists() { candidate } else { literal }
}

/// Serialises `entries` as list text, paths relative to `base_dir` where
/// possible.
pub fn write(entries: &[Entry], base_dir: &Path) -> String {
    let mut out = format!("{LIST_TAG} {LIST_VERSION}\n");
    for e in entries {
        let adjust = e
            .edit
            .color_adjust
            .iter()
            .map(|v| format!("{v:.6}"))
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&format!(
            "  {} {} {} {} {} {} {} {} {} {} {} {} {}\n",
            if e.fullscreen { "IMAGE_FULL" } else { "IMAGE" },
            escape_quoted(&make_relative(base_dir, &e.path)),
            escape_quoted(&e.display_name),
            u8::from(e.edit.grayscale),
            e.edit.rotation.steps(),
            e.edit_mode,
            e.edit.crop.left,
            e.edit.crop.top,
            e.edit.crop.right,
            e.edit.crop.bottom,
            adjust,
            u8::from(e.edit.need_rot_check),
            e.timestamp.unwrap_or(0),
        ));
    }
    out.push_str(">\n");
    out
}

/// Writes `entries` to `path` and checks that the whole file landed on disk.
pub fn save(path: &Path, entries: &[Entry]) -> anyhow::Result<()> {
    let base_dir = path.parent().unwrap_or(Path::new(""));
    let text = write(entries, base_dir);
    std::fs::write(path, text.as_bytes())
        .with_context(|| format!("failed to write image list {}", path.display()))?;

    let written = std::fs::metadata(path)
        .with_context(|| format!("failed to stat image list {}", path.display()))?
        .len();
    if written != text.len() as u64 {
        anyhow::bail!(
            "image list {} is {} bytes on disk, expected {}",
            path.display(),
            written,
            text.len()
        );
    }
    Ok(())
}
