//! Stream dispatch: parser callbacks → terminal operations.
//!
//! [`StreamHandler`] implements [`Perform`] over a mutable borrow of the
//! terminal plus a reply sink (bytes headed back to the pty) and a surface
//! event sink (bell, title, clipboard). It owns every policy decision the
//! model itself must not bake in: clipboard gating, response formatting,
//! which XTWINOPS forms are honored.
//!
//! The dispatch tables are closed `match`es — the set of operations is
//! fixed, so there is no trait-object indirection on the hot path.

use crate::charset::Charset;
use crate::cursor::CursorStyle;
use crate::image::{GraphicsAction, GraphicsCommand, Placement, PlacementAnchor};
use crate::modes::{ModeKind, Modes};
use crate::osc::{self, DynamicColor, OscCommand, PromptMark};
use crate::parser::{Params, Perform};
use crate::row::RowFlags;
use crate::style::{Color, Style, Underline};
use crate::terminal::Terminal;

/// Cap on buffered DCS payloads (DECRQSS requests are tiny).
const DCS_BUFFER_MAX: usize = 256;
/// Cap on an assembled APC payload (kitty image data arrives chunked).
const APC_BUFFER_MAX: usize = 1 << 20;

/// Out-of-band notifications for the surface thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Bell,
    TitleChanged(String),
    PwdChanged(String),
    /// OSC 52 write that passed the policy gate. Payload is still base64.
    ClipboardWrite { selection: char, data: Vec<u8> },
    /// OSC 52 read request that passed the policy gate.
    ClipboardRead { selection: char },
    /// A clipboard access was denied by policy.
    ClipboardDenied,
}

/// Policy knobs for the handler.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Allow OSC 52 clipboard writes.
    pub clipboard_write: bool,
    /// Allow OSC 52 clipboard reads (they leak data; default off).
    pub clipboard_read: bool,
    /// Surface the `ClipboardDenied` event on policy denials.
    pub notify_denied: bool,
    /// Name reported by XTVERSION.
    pub version_string: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            clipboard_write: true,
            clipboard_read: false,
            notify_denied: false,
            version_string: format!("emberterm {}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum DcsKind {
    #[default]
    Ignore,
    /// DECRQSS — collect the setting name, reply on unhook.
    RequestSetting,
    /// Sixel — passthrough to an external collaborator (a no-op here).
    Sixel,
}

/// A kitty transmission awaiting more chunks (`m=1`).
#[derive(Debug)]
struct PendingImage {
    command: GraphicsCommand,
}

/// Stream-level state that outlives a single dispatch batch.
#[derive(Debug, Default)]
pub struct StreamState {
    dcs_kind: DcsKind,
    dcs_buf: Vec<u8>,
    apc_buf: Vec<u8>,
    apc_overflow: bool,
    pending_image: Option<PendingImage>,
}

/// The dispatcher. Construct one per batch of parsed bytes; the borrows
/// keep it from outliving the lock on the terminal.
pub struct StreamHandler<'a> {
    pub term: &'a mut Terminal,
    pub replies: &'a mut Vec<u8>,
    pub events: &'a mut Vec<SurfaceEvent>,
    pub state: &'a mut StreamState,
    pub config: &'a HandlerConfig,
}

impl StreamHandler<'_> {
    fn reply(&mut self, bytes: &[u8]) {
        self.replies.extend_from_slice(bytes);
    }

    fn reply_str(&mut self, text: &str) {
        self.replies.extend_from_slice(text.as_bytes());
    }

    // ── CSI helpers ─────────────────────────────────────────────────

    fn set_modes(&mut self, params: &Params, kind: ModeKind, enable: bool) {
        for i in 0..params.len() {
            self.term.set_mode(kind, params.get(i), enable);
        }
    }

    fn device_status_report(&mut self, params: &Params) {
        match params.get(0) {
            5 => self.reply(b"\x1b[0n"),
            6 => {
                let (row, col) = self.term.cursor_report();
                self.reply_str(&format!("\x1b[{};{}R", row + 1, col + 1));
            }
            _ => {}
        }
    }

    fn device_attributes(&mut self, marker: Option<u8>) {
        match marker {
            // Primary DA: VT220-class with ANSI color.
            None => self.reply(b"\x1b[?62;22c"),
            // Secondary DA.
            Some(b'>') => self.reply(b"\x1b[>1;10;0c"),
            _ => {}
        }
    }

    fn xtversion(&mut self) {
        let version = self.config.version_string.clone();
        self.reply_str(&format!("\x1bP>|{version}\x1b\\"));
    }

    fn request_mode(&mut self, params: &Params, kind: ModeKind) {
        let number = params.get(0);
        let value = self.term.modes().report(kind, number);
        let prefix = match kind {
            ModeKind::DecPrivate => "?",
            ModeKind::Ansi => "",
        };
        self.reply_str(&format!("\x1b[{prefix}{number};{value}$y"));
    }

    fn window_op(&mut self, params: &Params) {
        match params.get(0) {
            // Report text area size in characters.
            18 => {
                let (rows, cols) = (self.term.rows(), self.term.cols());
                self.reply_str(&format!("\x1b[8;{rows};{cols}t"));
            }
            22 => self.term.push_title(),
            23 => self.term.pop_title(),
            // Resize-acting forms are deliberately not honored: resizing
            // is the surface's decision and arrives via the mailbox.
            _ => {}
        }
    }

    fn save_or_margins(&mut self, params: &Params, marker: Option<u8>) {
        match marker {
            // XTSAVE.
            Some(b'?') => {
                for i in 0..params.len() {
                    self.term.save_mode(params.get(i));
                }
            }
            // With DECLRMM enabled `CSI s` is DECSLRM, otherwise SCOSC.
            None if self.term.modes().contains(Modes::LEFT_RIGHT_MARGIN) => {
                self.term
                    .set_lr_margins(params.get_or(0, 1), params.get(1));
            }
            None => self.term.save_cursor(),
            _ => {}
        }
    }

    // ── OSC ─────────────────────────────────────────────────────────

    fn osc(&mut self, payload: &[u8], bell_terminated: bool) {
        let terminator: &str = if bell_terminated { "\x07" } else { "\x1b\\" };
        match osc::parse(payload) {
            OscCommand::SetTitle(title) => {
                self.term.set_title(title);
                self.events.push(SurfaceEvent::TitleChanged(title.to_string()));
            }
            OscCommand::SetPalette { index, color } => {
                self.term.colors.set_palette(index, color);
            }
            OscCommand::QueryPalette { index } => {
                let spec = osc::format_color(self.term.colors.palette(index));
                self.reply_str(&format!("\x1b]4;{index};{spec}{terminator}"));
            }
            OscCommand::SetCwd(pwd) => {
                self.term.set_pwd(pwd);
                self.events.push(SurfaceEvent::PwdChanged(pwd.to_string()));
            }
            OscCommand::Hyperlink { id, uri } => {
                self.term.set_hyperlink(uri, id);
            }
            OscCommand::SetDynamicColor { which, color } => {
                self.term.colors.set_dynamic(which, Some(color));
            }
            OscCommand::QueryDynamicColor { which } => {
                let color = self.term.colors.dynamic(which).unwrap_or(match which {
                    // Compiled-in defaults for the reply when unset.
                    DynamicColor::Foreground => (0xff, 0xff, 0xff),
                    DynamicColor::Background => (0x00, 0x00, 0x00),
                    DynamicColor::Cursor => (0xff, 0xff, 0xff),
                });
                let code = match which {
                    DynamicColor::Foreground => 10,
                    DynamicColor::Background => 11,
                    DynamicColor::Cursor => 12,
                };
                let spec = osc::format_color(color);
                self.reply_str(&format!("\x1b]{code};{spec}{terminator}"));
            }
            OscCommand::ResetPalette(index) => self.term.colors.reset_palette(index),
            OscCommand::ResetDynamicColor(which) => {
                self.term.colors.set_dynamic(which, None);
            }
            OscCommand::Clipboard { selection, payload } => {
                self.clipboard(selection, payload);
            }
            OscCommand::SemanticPrompt(mark) => {
                let flag = match mark {
                    PromptMark::PromptStart => RowFlags::PROMPT_START,
                    PromptMark::InputStart => RowFlags::INPUT_START,
                    PromptMark::CommandStart => RowFlags::COMMAND_START,
                    PromptMark::CommandEnd => RowFlags::OUTPUT_START,
                };
                self.term.mark_prompt(flag);
            }
            OscCommand::Ignored => {}
        }
    }

    fn clipboard(&mut self, selection: char, payload: &str) {
        if payload == "?" {
            if self.config.clipboard_read {
                self.events.push(SurfaceEvent::ClipboardRead { selection });
            } else if self.config.notify_denied {
                self.events.push(SurfaceEvent::ClipboardDenied);
            }
            return;
        }
        if self.config.clipboard_write {
            self.events.push(SurfaceEvent::ClipboardWrite {
                selection,
                data: payload.as_bytes().to_vec(),
            });
        } else {
            tracing::debug!("clipboard write denied by policy");
            if self.config.notify_denied {
                self.events.push(SurfaceEvent::ClipboardDenied);
            }
        }
    }

    // ── DECRQSS ─────────────────────────────────────────────────────

    fn request_setting(&mut self) {
        let request = std::mem::take(&mut self.state.dcs_buf);
        let reply = match request.as_slice() {
            b"m" => Some(format!("{}m", style_to_sgr(&self.term.screen().cursor.brush))),
            b"r" => {
                let screen = self.term.screen();
                Some(format!(
                    "{};{}r",
                    screen.scroll_top() + 1,
                    screen.scroll_bottom()
                ))
            }
            b" q" => Some(format!("{} q", decscusr_code(self.term.cursor_style()))),
            b"\"q" => Some("0\"q".to_string()),
            _ => None,
        };
        match reply {
            Some(body) => self.reply_str(&format!("\x1bP1$r{body}\x1b\\")),
            None => self.reply(b"\x1bP0$r\x1b\\"),
        }
    }

    // ── Kitty graphics ──────────────────────────────────────────────

    fn graphics(&mut self, body: &[u8]) {
        let Some(mut cmd) = GraphicsCommand::parse(body) else {
            tracing::debug!("malformed kitty graphics command dropped");
            return;
        };

        // Chunk reassembly: continuation commands only carry payload + m.
        if let Some(pending) = &mut self.state.pending_image {
            pending.command.payload.extend_from_slice(&cmd.payload);
            if cmd.more {
                return;
            }
            cmd = self.state.pending_image.take().unwrap().command;
        } else if cmd.more {
            self.state.pending_image = Some(PendingImage { command: cmd });
            return;
        }

        let quiet = cmd.quiet;
        let id = cmd.image_id;
        match cmd.action {
            GraphicsAction::Transmit | GraphicsAction::TransmitAndDisplay => {
                self.term.images_mut().add_image(
                    id,
                    cmd.image_format(),
                    cmd.width,
                    cmd.height,
                    cmd.payload.clone(),
                );
                if cmd.action == GraphicsAction::TransmitAndDisplay {
                    self.place_image(&cmd);
                }
                if quiet == 0 && id != 0 {
                    self.reply_str(&format!("\x1b_Gi={id};OK\x1b\\"));
                }
            }
            GraphicsAction::Put => {
                let placed = self.place_image(&cmd);
                if !placed && quiet < 2 && id != 0 {
                    self.reply_str(&format!("\x1b_Gi={id};ENOENT\x1b\\"));
                } else if placed && quiet == 0 && id != 0 {
                    self.reply_str(&format!("\x1b_Gi={id};OK\x1b\\"));
                }
            }
            GraphicsAction::Delete => {
                self.term.images_mut().delete(cmd.delete_criteria());
            }
            GraphicsAction::Query => {
                if quiet < 2 && id != 0 {
                    self.reply_str(&format!("\x1b_Gi={id};OK\x1b\\"));
                }
            }
        }
    }

    fn place_image(&mut self, cmd: &GraphicsCommand) -> bool {
        let screen = self.term.screen();
        let y = screen.cursor.y;
        let col = screen.cursor.x.min(screen.cols() - 1);
        let Some(row) = screen.row(y) else {
            return false;
        };
        let anchor = PlacementAnchor { row: row.id(), col };
        self.term.images_mut().add_placement(
            cmd.image_id,
            cmd.placement_id,
            Placement {
                anchor,
                cols: cmd.cols,
                rows: cmd.rows,
                z: cmd.z,
            },
        )
    }
}

impl Perform for StreamHandler<'_> {
    fn print(&mut self, ch: char) {
        self.term.print(ch);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x07 => self.events.push(SurfaceEvent::Bell),
            0x08 => self.term.backspace(),
            0x09 => self.term.tab(),
            0x0a | 0x0b | 0x0c => self.term.linefeed(),
            0x0d => self.term.carriage_return(),
            0x0e => self.term.invoke_charset(1, false), // SO
            0x0f => self.term.invoke_charset(0, false), // SI
            _ => {}
        }
    }

    fn csi_dispatch(
        &mut self,
        params: &Params,
        intermediates: &[u8],
        marker: Option<u8>,
        action: char,
    ) {
        match (action, intermediates, marker) {
            ('@', [], None) => self.term.insert_blanks(params.get_or(0, 1)),
            ('A', [], None) => self.term.cursor_up(params.get_or(0, 1)),
            ('B' | 'e', [], None) => self.term.cursor_down(params.get_or(0, 1)),
            ('C' | 'a', [], None) => self.term.cursor_forward(params.get_or(0, 1)),
            ('D', [], None) => self.term.cursor_back(params.get_or(0, 1)),
            ('E', [], None) => {
                self.term.cursor_down(params.get_or(0, 1));
                self.term.carriage_return();
            }
            ('F', [], None) => {
                self.term.cursor_up(params.get_or(0, 1));
                self.term.carriage_return();
            }
            ('G' | '`', [], None) => self.term.cursor_column(params.get_or(0, 1) - 1),
            ('H' | 'f', [], None) => {
                self.term
                    .cursor_goto(params.get_or(0, 1) - 1, params.get_or(1, 1) - 1);
            }
            ('I', [], None) => self.term.tab_forward(params.get_or(0, 1)),
            ('J', [], None) => self.term.erase_display(params.get(0), false),
            ('J', [], Some(b'?')) => self.term.erase_display(params.get(0), true),
            ('K', [], None) => self.term.erase_line(params.get(0), false),
            ('K', [], Some(b'?')) => self.term.erase_line(params.get(0), true),
            ('L', [], None) => self.term.insert_lines(params.get_or(0, 1)),
            ('M', [], None) => self.term.delete_lines(params.get_or(0, 1)),
            ('P', [], None) => self.term.delete_chars(params.get_or(0, 1)),
            ('S', [], None) => self.term.scroll_up(params.get_or(0, 1)),
            ('T', [], None) => self.term.scroll_down(params.get_or(0, 1)),
            ('X', [], None) => self.term.erase_chars(params.get_or(0, 1)),
            ('Z', [], None) => self.term.tab_backward(params.get_or(0, 1)),
            ('b', [], None) => self.term.repeat_last(params.get_or(0, 1)),
            ('c', [], None) => self.device_attributes(None),
            ('c', [], Some(b'>')) => self.device_attributes(Some(b'>')),
            ('d', [], None) => self.term.cursor_row(params.get_or(0, 1) - 1),
            ('g', [], None) => self.term.tab_clear(params.get(0)),
            ('h', [], None) => self.set_modes(params, ModeKind::Ansi, true),
            ('h', [], Some(b'?')) => self.set_modes(params, ModeKind::DecPrivate, true),
            ('l', [], None) => self.set_modes(params, ModeKind::Ansi, false),
            ('l', [], Some(b'?')) => self.set_modes(params, ModeKind::DecPrivate, false),
            ('m', [], None) => self.term.sgr(params),
            ('m', [], Some(b'>')) => {} // XTMODKEYS — input encoder concern
            ('n', [], None) => self.device_status_report(params),
            ('p', [b'$'], None) => self.request_mode(params, ModeKind::Ansi),
            ('p', [b'$'], Some(b'?')) => self.request_mode(params, ModeKind::DecPrivate),
            ('p', [b'!'], None) => self.term.soft_reset(),
            ('q', [b' '], None) => {
                self.term
                    .set_cursor_style(CursorStyle::from_decscusr(params.get(0)));
            }
            ('q', [b'"'], None) => self.term.set_protection(params.get(0) == 1),
            ('q', [], Some(b'>')) => self.xtversion(),
            ('r', [], None) => {
                self.term
                    .set_scroll_region(params.get_or(0, 1), params.get(1));
            }
            ('r', [], Some(b'?')) => {
                for i in 0..params.len() {
                    self.term.restore_mode(params.get(i));
                }
            }
            ('s', _, _) => self.save_or_margins(params, marker),
            ('t', [], None) => self.window_op(params),
            ('u', [], None) => self.term.restore_cursor(),
            _ => {
                tracing::trace!(action = %action, ?marker, "unhandled CSI");
            }
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], byte: u8) {
        match (intermediates, byte) {
            ([], b'D') => self.term.index(),
            ([], b'E') => self.term.next_line(),
            ([], b'H') => self.term.tab_set(),
            ([], b'M') => self.term.reverse_index(),
            ([], b'N') => self.term.single_shift(2),
            ([], b'O') => self.term.single_shift(3),
            ([], b'Z') => self.device_attributes(None),
            ([], b'7') => self.term.save_cursor(),
            ([], b'8') => self.term.restore_cursor(),
            ([], b'c') => self.term.full_reset(),
            ([], b'n') => self.term.invoke_charset(2, false),
            ([], b'o') => self.term.invoke_charset(3, false),
            ([], b'|') => self.term.invoke_charset(3, true),
            ([], b'}') => self.term.invoke_charset(2, true),
            ([], b'~') => self.term.invoke_charset(1, true),
            ([], b'=' | b'>') => {} // keypad modes — input encoder concern
            ([], b'\\') => {}       // stray ST
            ([b'#'], b'8') => self.term.alignment_test(),
            ([b'('], set) => self.term.designate_charset(0, Charset::from_designator(set)),
            ([b')'], set) => self.term.designate_charset(1, Charset::from_designator(set)),
            ([b'*'], set) => self.term.designate_charset(2, Charset::from_designator(set)),
            ([b'+'], set) => self.term.designate_charset(3, Charset::from_designator(set)),
            _ => {}
        }
    }

    fn osc_dispatch(&mut self, payload: &[u8], bell_terminated: bool) {
        self.osc(payload, bell_terminated);
    }

    fn hook(&mut self, _params: &Params, intermediates: &[u8], marker: Option<u8>, action: char) {
        self.state.dcs_buf.clear();
        self.state.dcs_kind = match (intermediates, marker, action) {
            ([b'$'], None, 'q') => DcsKind::RequestSetting,
            (_, _, 'q') => DcsKind::Sixel,
            _ => DcsKind::Ignore,
        };
    }

    fn put(&mut self, byte: u8) {
        match self.state.dcs_kind {
            DcsKind::RequestSetting => {
                if self.state.dcs_buf.len() < DCS_BUFFER_MAX {
                    self.state.dcs_buf.push(byte);
                }
            }
            // Sixel streams to an external collaborator; the core drops it.
            DcsKind::Sixel | DcsKind::Ignore => {}
        }
    }

    fn unhook(&mut self) {
        if self.state.dcs_kind == DcsKind::RequestSetting {
            self.request_setting();
        }
        self.state.dcs_kind = DcsKind::Ignore;
    }

    fn apc_start(&mut self) {
        self.state.apc_buf.clear();
        self.state.apc_overflow = false;
    }

    fn apc_put(&mut self, byte: u8) {
        if self.state.apc_buf.len() < APC_BUFFER_MAX {
            self.state.apc_buf.push(byte);
        } else {
            self.state.apc_overflow = true;
        }
    }

    fn apc_end(&mut self) {
        if self.state.apc_overflow {
            tracing::warn!("oversized APC payload dropped");
            self.state.apc_buf.clear();
            return;
        }
        let buf = std::mem::take(&mut self.state.apc_buf);
        if let Some(body) = buf.strip_prefix(b"G") {
            self.graphics(body);
        }
    }
}

/// Serialize a style as SGR parameters (for the DECRQSS `m` reply).
fn style_to_sgr(style: &Style) -> String {
    use crate::style::StyleFlags as F;
    let mut out = String::from("0");
    let mut push = |s: &str| {
        out.push(';');
        out.push_str(s);
    };
    if style.flags.contains(F::BOLD) {
        push("1");
    }
    if style.flags.contains(F::FAINT) {
        push("2");
    }
    if style.flags.contains(F::ITALIC) {
        push("3");
    }
    match style.underline {
        Underline::None => {}
        Underline::Single => push("4"),
        Underline::Double => push("21"),
        Underline::Curly => push("4:3"),
        Underline::Dotted => push("4:4"),
        Underline::Dashed => push("4:5"),
    }
    if style.flags.contains(F::BLINK) {
        push("5");
    }
    if style.flags.contains(F::INVERSE) {
        push("7");
    }
    if style.flags.contains(F::INVISIBLE) {
        push("8");
    }
    if style.flags.contains(F::STRIKETHROUGH) {
        push("9");
    }
    if style.flags.contains(F::OVERLINE) {
        push("53");
    }
    push_color(&mut out, style.fg, 30, 38);
    push_color(&mut out, style.bg, 40, 48);
    if style.underline_color != Color::Default {
        push_extended(&mut out, style.underline_color, 58);
    }
    out
}

fn push_color(out: &mut String, color: Color, named_base: u16, extended: u16) {
    match color {
        Color::Default => {}
        Color::Palette(i) if i < 8 => {
            out.push_str(&format!(";{}", named_base + i as u16));
        }
        Color::Palette(i) if i < 16 => {
            out.push_str(&format!(";{}", named_base + 60 + (i as u16 - 8)));
        }
        _ => push_extended(out, color, extended),
    }
}

fn push_extended(out: &mut String, color: Color, introducer: u16) {
    match color {
        Color::Palette(i) => out.push_str(&format!(";{introducer}:5:{i}")),
        Color::Rgb(r, g, b) => out.push_str(&format!(";{introducer}:2:{r}:{g}:{b}")),
        Color::Default => {}
    }
}

fn decscusr_code(style: CursorStyle) -> u16 {
    use crate::cursor::CursorShape;
    match (style.shape, style.blink) {
        (CursorShape::Block, true) => 1,
        (CursorShape::Block, false) => 2,
        (CursorShape::Underline, true) => 3,
        (CursorShape::Underline, false) => 4,
        (CursorShape::Bar, true) => 5,
        (CursorShape::Bar, false) => 6,
    }
}
