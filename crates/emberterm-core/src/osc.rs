//! OSC payload parsing.
//!
//! The parser hands over the raw bytes between `ESC ]` and the terminator;
//! this module classifies them into commands the stream dispatcher applies.
//! Unknown or malformed payloads classify as [`OscCommand::Ignored`] — OSC
//! is a compatibility minefield and silence is the correct failure mode.

/// Dynamic color slots settable via OSC 10/11/12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynamicColor {
    Foreground,
    Background,
    Cursor,
}

/// OSC 133 semantic prompt marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMark {
    /// `A` — start of prompt.
    PromptStart,
    /// `B` — start of user input.
    InputStart,
    /// `C` — start of command execution.
    CommandStart,
    /// `D` — end of command / start of output.
    CommandEnd,
}

/// A classified OSC payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OscCommand<'a> {
    /// OSC 0/1/2 — window/icon title.
    SetTitle(&'a str),
    /// OSC 4;index;spec — set one palette entry.
    SetPalette { index: u8, color: (u8, u8, u8) },
    /// OSC 4;index;? — report one palette entry.
    QueryPalette { index: u8 },
    /// OSC 7 — working directory (file:// URL).
    SetCwd(&'a str),
    /// OSC 8;params;uri — hyperlink anchor. An empty URI ends the anchor.
    Hyperlink { id: Option<&'a str>, uri: &'a str },
    /// OSC 10/11/12 with a color spec.
    SetDynamicColor {
        which: DynamicColor,
        color: (u8, u8, u8),
    },
    /// OSC 10/11/12 with `?`.
    QueryDynamicColor { which: DynamicColor },
    /// OSC 104 — reset palette entries (all when `None`).
    ResetPalette(Option<u8>),
    /// OSC 110/111/112.
    ResetDynamicColor(DynamicColor),
    /// OSC 52 — clipboard access. Payload is base64, or `?` for a read.
    Clipboard { selection: char, payload: &'a str },
    /// OSC 133 — semantic prompt marker.
    SemanticPrompt(PromptMark),
    /// Recognized-but-ignored (9, 777) and everything unknown.
    Ignored,
}

/// Classify an OSC payload.
pub fn parse(payload: &[u8]) -> OscCommand<'_> {
    let Ok(text) = core::str::from_utf8(payload) else {
        return OscCommand::Ignored;
    };
    let (code, rest) = match text.split_once(';') {
        Some((code, rest)) => (code, rest),
        None => (text, ""),
    };
    match code {
        "0" | "1" | "2" => OscCommand::SetTitle(rest),
        "4" => parse_palette(rest),
        "7" => OscCommand::SetCwd(rest),
        "8" => parse_hyperlink(rest),
        "10" => parse_dynamic(DynamicColor::Foreground, rest),
        "11" => parse_dynamic(DynamicColor::Background, rest),
        "12" => parse_dynamic(DynamicColor::Cursor, rest),
        "52" => parse_clipboard(rest),
        "104" => match rest.parse::<u16>() {
            Ok(n) if n <= 255 => OscCommand::ResetPalette(Some(n as u8)),
            _ if rest.is_empty() => OscCommand::ResetPalette(None),
            _ => OscCommand::Ignored,
        },
        "110" => OscCommand::ResetDynamicColor(DynamicColor::Foreground),
        "111" => OscCommand::ResetDynamicColor(DynamicColor::Background),
        "112" => OscCommand::ResetDynamicColor(DynamicColor::Cursor),
        "133" => match rest.as_bytes().first() {
            Some(b'A') => OscCommand::SemanticPrompt(PromptMark::PromptStart),
            Some(b'B') => OscCommand::SemanticPrompt(PromptMark::InputStart),
            Some(b'C') => OscCommand::SemanticPrompt(PromptMark::CommandStart),
            Some(b'D') => OscCommand::SemanticPrompt(PromptMark::CommandEnd),
            _ => OscCommand::Ignored,
        },
        _ => OscCommand::Ignored,
    }
}

fn parse_palette(rest: &str) -> OscCommand<'_> {
    let Some((index, spec)) = rest.split_once(';') else {
        return OscCommand::Ignored;
    };
    let Ok(index) = index.parse::<u16>() else {
        return OscCommand::Ignored;
    };
    if index > 255 {
        return OscCommand::Ignored;
    }
    let index = index as u8;
    if spec == "?" {
        return OscCommand::QueryPalette { index };
    }
    match parse_color_spec(spec) {
        Some(color) => OscCommand::SetPalette { index, color },
        None => OscCommand::Ignored,
    }
}

fn parse_hyperlink(rest: &str) -> OscCommand<'_> {
    let Some((params, uri)) = rest.split_once(';') else {
        return OscCommand::Ignored;
    };
    let id = params.split(':').find_map(|kv| kv.strip_prefix("id="));
    let id = match id {
        Some("") | None => None,
        Some(id) => Some(id),
    };
    OscCommand::Hyperlink { id, uri }
}

fn parse_dynamic(which: DynamicColor, rest: &str) -> OscCommand<'_> {
    if rest == "?" {
        return OscCommand::QueryDynamicColor { which };
    }
    match parse_color_spec(rest) {
        Some(color) => OscCommand::SetDynamicColor { which, color },
        None => OscCommand::Ignored,
    }
}

fn parse_clipboard(rest: &str) -> OscCommand<'_> {
    let Some((targets, payload)) = rest.split_once(';') else {
        return OscCommand::Ignored;
    };
    // The first listed target wins; an empty list means the clipboard.
    let selection = targets.chars().next().unwrap_or('c');
    OscCommand::Clipboard { selection, payload }
}

/// Parse an X11-style color: `rgb:RR/GG/BB` (1–4 hex digits per channel,
/// scaled) or `#RRGGBB`.
pub fn parse_color_spec(spec: &str) -> Option<(u8, u8, u8)> {
    if let Some(hex) = spec.strip_prefix('#') {
        if hex.len() != 6 {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        return Some((r, g, b));
    }
    let body = spec.strip_prefix("rgb:")?;
    let mut channels = body.split('/');
    let r = scale_channel(channels.next()?)?;
    let g = scale_channel(channels.next()?)?;
    let b = scale_channel(channels.next()?)?;
    if channels.next().is_some() {
        return None;
    }
    Some((r, g, b))
}

/// Scale a 1–4 hex digit channel to 8 bits, per XParseColor.
fn scale_channel(digits: &str) -> Option<u8> {
    if digits.is_empty() || digits.len() > 4 {
        return None;
    }
    let value = u16::from_str_radix(digits, 16).ok()?;
    let max = (1u32 << (4 * digits.len() as u32)) - 1;
    Some(((value as u32 * 255 + max / 2) / max) as u8)
}

/// Format a color in the `rgb:rrrr/gggg/bbbb` form used for query replies.
pub fn format_color((r, g, b): (u8, u8, u8)) -> String {
    format!(
        "rgb:{:04x}/{:04x}/{:04x}",
        r as u16 * 0x101,
        g as u16 * 0x101,
        b as u16 * 0x101
    )
}
