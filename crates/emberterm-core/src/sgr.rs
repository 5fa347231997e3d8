//! SGR (Select Graphic Rendition) parameter application.
//!
//! Handles the classic flag parameters, 8/16/256-color and 24-bit color in
//! both the semicolon form (`38;2;r;g;b`) and the ITU T.416 colon form
//! (`38:2::r:g:b`), underline styles via `4:n` subparameters, and underline
//! color (SGR 58/59).

use crate::parser::Params;
use crate::style::{Color, Style, StyleFlags, Underline};

/// Apply an SGR parameter list to a style. An empty list is a full reset.
pub fn apply(style: &mut Style, params: &Params) {
    if params.is_empty() {
        style.reset();
        return;
    }

    let mut i = 0;
    while i < params.len() {
        let sub = params.sub(i);
        let code = sub.first().copied().unwrap_or(0);
        match code {
            0 => style.reset(),
            1 => style.flags |= StyleFlags::BOLD,
            2 => style.flags |= StyleFlags::FAINT,
            3 => style.flags |= StyleFlags::ITALIC,
            4 => {
                // 4:x selects the underline shape; plain 4 is single.
                style.underline = match sub.get(1) {
                    None | Some(1) => Underline::Single,
                    Some(0) => Underline::None,
                    Some(2) => Underline::Double,
                    Some(3) => Underline::Curly,
                    Some(4) => Underline::Dotted,
                    Some(5) => Underline::Dashed,
                    Some(_) => Underline::Single,
                };
            }
            5 | 6 => style.flags |= StyleFlags::BLINK,
            7 => style.flags |= StyleFlags::INVERSE,
            8 => style.flags |= StyleFlags::INVISIBLE,
            9 => style.flags |= StyleFlags::STRIKETHROUGH,
            21 => style.underline = Underline::Double,
            22 => style.flags -= StyleFlags::BOLD | StyleFlags::FAINT,
            23 => style.flags -= StyleFlags::ITALIC,
            24 => style.underline = Underline::None,
            25 => style.flags -= StyleFlags::BLINK,
            27 => style.flags -= StyleFlags::INVERSE,
            28 => style.flags -= StyleFlags::INVISIBLE,
            29 => style.flags -= StyleFlags::STRIKETHROUGH,
            30..=37 => style.fg = Color::Palette((code - 30) as u8),
            38 => match extended_color(params, &mut i) {
                Some(color) => style.fg = color,
                None => return,
            },
            39 => style.fg = Color::Default,
            40..=47 => style.bg = Color::Palette((code - 40) as u8),
            48 => match extended_color(params, &mut i) {
                Some(color) => style.bg = color,
                None => return,
            },
            49 => style.bg = Color::Default,
            53 => style.flags |= StyleFlags::OVERLINE,
            55 => style.flags -= StyleFlags::OVERLINE,
            58 => match extended_color(params, &mut i) {
                Some(color) => style.underline_color = color,
                None => return,
            },
            59 => style.underline_color = Color::Default,
            90..=97 => style.fg = Color::Palette((code - 90 + 8) as u8),
            100..=107 => style.bg = Color::Palette((code - 100 + 8) as u8),
            _ => {} // unknown parameters are ignored
        }
        i += 1;
    }
}

/// Parse the color following a 38/48/58 introducer.
///
/// `i` points at the introducer and is left on the last consumed parameter.
/// Returns `None` on a malformed form (the rest of the list is dropped,
/// matching XTerm's recovery).
fn extended_color(params: &Params, i: &mut usize) -> Option<Color> {
    let sub = params.sub(*i);
    if sub.len() > 1 {
        // Colon form: everything rides in the subparameters.
        return match sub.get(1) {
            Some(5) => Some(Color::Palette(*sub.get(2)? as u8)),
            Some(2) => {
                // 38:2:r:g:b or 38:2::r:g:b (with color-space id).
                let (r, g, b) = match sub.len() {
                    5 => (sub[2], sub[3], sub[4]),
                    6 => (sub[3], sub[4], sub[5]),
                    _ => return None,
                };
                Some(Color::Rgb(clamp8(r), clamp8(g), clamp8(b)))
            }
            _ => None,
        };
    }

    // Semicolon form: the mode and channels are separate parameters.
    // Missing trailing channels read as zero, matching XTerm's tolerance.
    match params.get(*i + 1) {
        5 => {
            let index = params.get(*i + 2);
            *i = (*i + 2).min(params.len());
            Some(Color::Palette(clamp8(index)))
        }
        2 => {
            let r = params.get(*i + 2);
            let g = params.get(*i + 3);
            let b = params.get(*i + 4);
            *i = (*i + 4).min(params.len());
            Some(Color::Rgb(clamp8(r), clamp8(g), clamp8(b)))
        }
        _ => None,
    }
}

fn clamp8(v: u16) -> u8 {
    v.min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{Params, Parser, Perform};

    /// Run an SGR byte sequence through the real parser into a style.
    fn style_after(seq: &str) -> Style {
        struct S(Style);
        impl Perform for S {
            fn csi_dispatch(
                &mut self,
                params: &Params,
                _intermediates: &[u8],
                _marker: Option<u8>,
                action: char,
            ) {
                if action == 'm' {
                    apply(&mut self.0, params);
                }
            }
        }
        let mut parser = Parser::new();
        let mut s = S(Style::default());
        parser.advance_slice(&mut s, seq.as_bytes());
        s.0
    }

    #[test]
    fn reset_and_flags() {
        let style = style_after("\x1b[1;3;9m");
        assert!(style.flags.contains(StyleFlags::BOLD));
        assert!(style.flags.contains(StyleFlags::ITALIC));
        assert!(style.flags.contains(StyleFlags::STRIKETHROUGH));

        let style = style_after("\x1b[1m\x1b[0m");
        assert_eq!(style, Style::default());
    }

    #[test]
    fn empty_sgr_resets() {
        let style = style_after("\x1b[31m\x1b[m");
        assert_eq!(style, Style::default());
    }

    #[test]
    fn named_and_bright_colors() {
        assert_eq!(style_after("\x1b[31m").fg, Color::Palette(1));
        assert_eq!(style_after("\x1b[44m").bg, Color::Palette(4));
        assert_eq!(style_after("\x1b[95m").fg, Color::Palette(13));
        assert_eq!(style_after("\x1b[103m").bg, Color::Palette(11));
    }

    #[test]
    fn cancel_pairs() {
        let style = style_after("\x1b[1;2;22m");
        assert!(!style.flags.intersects(StyleFlags::BOLD | StyleFlags::FAINT));
        let style = style_after("\x1b[4;24m");
        assert_eq!(style.underline, Underline::None);
    }

    #[test]
    fn palette_256_semicolon_and_colon() {
        assert_eq!(style_after("\x1b[38;5;123m").fg, Color::Palette(123));
        assert_eq!(style_after("\x1b[48;5;200m").bg, Color::Palette(200));
        assert_eq!(style_after("\x1b[38:5:42m").fg, Color::Palette(42));
    }

    #[test]
    fn rgb_semicolon_and_colon() {
        assert_eq!(
            style_after("\x1b[38;2;10;20;30m").fg,
            Color::Rgb(10, 20, 30)
        );
        assert_eq!(
            style_after("\x1b[48:2:1:2:3m").bg,
            Color::Rgb(1, 2, 3)
        );
        // T.416 with color-space id.
        assert_eq!(
            style_after("\x1b[38:2::7:8:9m").fg,
            Color::Rgb(7, 8, 9)
        );
    }

    #[test]
    fn rgb_followed_by_more_params() {
        let style = style_after("\x1b[38;2;1;2;3;1m");
        assert_eq!(style.fg, Color::Rgb(1, 2, 3));
        assert!(style.flags.contains(StyleFlags::BOLD));
    }

    #[test]
    fn underline_styles() {
        assert_eq!(style_after("\x1b[4m").underline, Underline::Single);
        assert_eq!(style_after("\x1b[4:3m").underline, Underline::Curly);
        assert_eq!(style_after("\x1b[4:5m").underline, Underline::Dashed);
        assert_eq!(style_after("\x1b[21m").underline, Underline::Double);
        assert_eq!(style_after("\x1b[4:0m").underline, Underline::None);
    }

    #[test]
    fn underline_color() {
        assert_eq!(
            style_after("\x1b[58:2::255:0:128m").underline_color,
            Color::Rgb(255, 0, 128)
        );
        assert_eq!(
            style_after("\x1b[58;5;9m").underline_color,
            Color::Palette(9)
        );
        let style = style_after("\x1b[58;5;9;59m");
        assert_eq!(style.underline_color, Color::Default);
    }

    #[test]
    fn default_colors() {
        let style = style_after("\x1b[31;44m\x1b[39;49m");
        assert_eq!(style.fg, Color::Default);
        assert_eq!(style.bg, Color::Default);
    }

    #[test]
    fn unknown_params_are_ignored() {
        let style = style_after("\x1b[99;1m");
        assert!(style.flags.contains(StyleFlags::BOLD));
    }

    #[test]
    fn channel_values_clamp() {
        assert_eq!(
            style_after("\x1b[38;2;999;0;0m").fg,
            Color::Rgb(255, 0, 0)
        );
    }
}
