//! DEC private and ANSI mode state.
//!
//! Modes are a bitset plus the XTSAVE/XTRESTORE side map. The mapping from
//! wire numbers to bits lives here so DECSET/DECRST, DECRQM, and mode
//! save/restore all agree on one table.

use bitflags::bitflags;
use rustc_hash::FxHashMap;

bitflags! {
    /// Recognized terminal modes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modes: u32 {
        /// DECCKM (?1): arrow keys send application sequences.
        const APP_CURSOR_KEYS    = 1 << 0;
        /// DECCOLM (?3): 132-column mode.
        const COLUMN_132         = 1 << 1;
        /// DECOM (?6): origin mode.
        const ORIGIN             = 1 << 2;
        /// DECAWM (?7): autowrap.
        const AUTOWRAP           = 1 << 3;
        /// DECTCEM (?25): cursor visible.
        const CURSOR_VISIBLE     = 1 << 4;
        /// ?47 / ?1047 / ?1049: alternate screen active.
        const ALT_SCREEN         = 1 << 5;
        /// ?2004: bracketed paste.
        const BRACKETED_PASTE    = 1 << 6;
        /// ?1000: report button press/release.
        const MOUSE_CLICK        = 1 << 7;
        /// ?1002: report drag.
        const MOUSE_DRAG         = 1 << 8;
        /// ?1003: report all motion.
        const MOUSE_MOTION       = 1 << 9;
        /// ?1006: SGR mouse encoding.
        const MOUSE_SGR          = 1 << 10;
        /// ?2026: synchronized update (defer rendering).
        const SYNCHRONIZED       = 1 << 11;
        /// ?80: sixel scrolling.
        const SIXEL_SCROLL       = 1 << 12;
        /// ?1004: focus in/out reporting.
        const FOCUS_REPORT       = 1 << 13;
        /// ?69: DECLRMM, left/right margin mode.
        const LEFT_RIGHT_MARGIN  = 1 << 14;
        /// ANSI 4: IRM insert mode.
        const INSERT             = 1 << 15;
        /// ANSI 20: LNM, LF implies CR.
        const LINEFEED           = 1 << 16;
    }
}

impl Modes {
    /// Power-on defaults: autowrap on, cursor visible, sixel scrolling on.
    pub fn reset() -> Self {
        Modes::AUTOWRAP | Modes::CURSOR_VISIBLE | Modes::SIXEL_SCROLL
    }
}

/// Namespace of a mode number on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    /// `CSI Pm h/l`
    Ansi,
    /// `CSI ? Pm h/l`
    DecPrivate,
}

/// Map a wire mode number to its bit, if the mode is recognized.
///
/// The alt-screen trio (?47/?1047/?1049) and ?1048 are intentionally absent:
/// they trigger screen switches and cursor save/restore, not plain bit flips,
/// and are handled by the stream dispatcher.
pub fn lookup(kind: ModeKind, number: u16) -> Option<Modes> {
    match kind {
        ModeKind::Ansi => match number {
            4 => Some(Modes::INSERT),
            20 => Some(Modes::LINEFEED),
            _ => None,
        },
        ModeKind::DecPrivate => match number {
            1 => Some(Modes::APP_CURSOR_KEYS),
            3 => Some(Modes::COLUMN_132),
            6 => Some(Modes::ORIGIN),
            7 => Some(Modes::AUTOWRAP),
            25 => Some(Modes::CURSOR_VISIBLE),
            69 => Some(Modes::LEFT_RIGHT_MARGIN),
            80 => Some(Modes::SIXEL_SCROLL),
            1000 => Some(Modes::MOUSE_CLICK),
            1002 => Some(Modes::MOUSE_DRAG),
            1003 => Some(Modes::MOUSE_MOTION),
            1004 => Some(Modes::FOCUS_REPORT),
            1006 => Some(Modes::MOUSE_SGR),
            2004 => Some(Modes::BRACKETED_PASTE),
            2026 => Some(Modes::SYNCHRONIZED),
            _ => None,
        },
    }
}

/// Mode bitset plus the DECSET save/restore stack (XTSAVE `CSI ? Pm s`,
/// XTRESTORE `CSI ? Pm r`).
#[derive(Debug, Clone, Default)]
pub struct ModeState {
    modes: Modes,
    saved: FxHashMap<u16, bool>,
}

impl ModeState {
    pub fn new() -> Self {
        Self {
            modes: Modes::reset(),
            saved: FxHashMap::default(),
        }
    }

    pub fn get(&self) -> Modes {
        self.modes
    }

    pub fn contains(&self, mode: Modes) -> bool {
        self.modes.contains(mode)
    }

    pub fn set(&mut self, mode: Modes, enabled: bool) {
        self.modes.set(mode, enabled);
    }

    /// DECRQM answer for a wire number: 1 = set, 2 = reset, 0 = unrecognized.
    pub fn report(&self, kind: ModeKind, number: u16) -> u8 {
        match lookup(kind, number) {
            Some(mode) if self.modes.contains(mode) => 1,
            Some(_) => 2,
            None => 0,
        }
    }

    /// XTSAVE: remember the current value of a DEC private mode.
    pub fn save(&mut self, number: u16) {
        if let Some(mode) = lookup(ModeKind::DecPrivate, number) {
            self.saved.insert(number, self.modes.contains(mode));
        }
    }

    /// XTRESTORE: restore a previously saved value (no-op if never saved).
    ///
    /// Returns the restored value when the mode is recognized and was saved.
    pub fn restore(&mut self, number: u16) -> Option<bool> {
        let mode = lookup(ModeKind::DecPrivate, number)?;
        let value = self.saved.get(&number).copied()?;
        self.modes.set(mode, value);
        Some(value)
    }

    /// RIS/DECSTR: back to power-on defaults, dropping saved values.
    pub fn reset(&mut self) {
        self.modes = Modes::reset();
        self.saved.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_autowrap_and_cursor() {
        let state = ModeState::new();
        assert!(state.contains(Modes::AUTOWRAP));
        assert!(state.contains(Modes::CURSOR_VISIBLE));
        assert!(!state.contains(Modes::ORIGIN));
    }

    #[test]
    fn lookup_distinguishes_namespaces() {
        assert_eq!(lookup(ModeKind::Ansi, 4), Some(Modes::INSERT));
        assert_eq!(lookup(ModeKind::DecPrivate, 4), None);
        assert_eq!(lookup(ModeKind::DecPrivate, 25), Some(Modes::CURSOR_VISIBLE));
        assert_eq!(lookup(ModeKind::Ansi, 25), None);
    }

    #[test]
    fn report_follows_decrqm_values() {
        let mut state = ModeState::new();
        assert_eq!(state.report(ModeKind::DecPrivate, 7), 1);
        state.set(Modes::AUTOWRAP, false);
        assert_eq!(state.report(ModeKind::DecPrivate, 7), 2);
        assert_eq!(state.report(ModeKind::DecPrivate, 12345), 0);
    }

    #[test]
    fn save_restore_roundtrip() {
        let mut state = ModeState::new();
        state.set(Modes::BRACKETED_PASTE, true);
        state.save(2004);
        state.set(Modes::BRACKETED_PASTE, false);
        assert_eq!(state.restore(2004), Some(true));
        assert!(state.contains(Modes::BRACKETED_PASTE));
    }

    #[test]
    fn restore_without_save_is_noop() {
        let mut state = ModeState::new();
        assert_eq!(state.restore(2004), None);
        assert!(!state.contains(Modes::BRACKETED_PASTE));
    }
}
