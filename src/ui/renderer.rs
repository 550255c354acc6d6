/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// This eliminates flicker caused by full-screen redraws.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::entity::Motion;
use crate::domain::grid::{GRID_HEIGHT, GRID_WIDTH};
use crate::domain::tile::Tile;
use crate::sim::records::CompletionRecord;
use crate::sim::world::{Attempt, Phase, Screen, WorldState};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct Cell {
    ch: [u8; 4],
    ch_len: u8,
    fg: Color,
    bg: Color,
    wide: bool,    // true = this char occupies 2 terminal columns
    cont: bool,    // true = continuation of previous wide char (skip render)
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells. Using the
    /// same RGB for `Clear` and every cell keeps inter-row gaps invisible.
    const BASE_BG: Color = Color::Rgb { r: 22, g: 22, b: 35 };

    const BLANK: Cell = Cell {
        ch: [b' ', 0, 0, 0],
        ch_len: 1,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: false,
    };

    const WIDE_CONT: Cell = Cell {
        ch: [0; 4],
        ch_len: 0,
        fg: Color::White,
        bg: Cell::BASE_BG,
        wide: false,
        cont: true,
    };

    /// Sentinel cell used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell {
        ch: [b'?', 0, 0, 0],
        ch_len: 1,
        fg: Color::Magenta,
        bg: Color::Magenta,
        wide: false,
        cont: false,
    };

    /// Normalize bg: Color::Reset → BASE_BG so that every cell gets an
    /// explicit background color (never terminal-default).
    #[inline]
    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn from_char(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::BLANK;
        cell.ch_len = c.encode_utf8(&mut cell.ch).len() as u8;
        cell.fg = fg;
        cell.bg = Self::norm_bg(bg);
        cell
    }

    fn from_char_wide(c: char, fg: Color, bg: Color) -> Self {
        let mut cell = Self::from_char(c, fg, bg);
        cell.wide = true;
        cell
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.ch[..self.ch_len as usize]).unwrap_or(" ")
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer {
            width: w,
            height: h,
            cells: vec![Cell::BLANK; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y) with given colors. Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::from_char(ch, fg, bg));
        }
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::from_char(' ', Color::White, bg));
        }
    }
}

// ── Renderer ──

/// Each game cell = 2 terminal columns.
const CELL_W: usize = 2;

/// Vertical offsets
const HUD_ROW: usize = 0;
const MAP_ROW: usize = 2;

/// Level select list
const LIST_TOP: usize = 5;
const LIST_MAX: usize = 16;

const HUD_BG: Color = Color::Rgb { r: 20, g: 20, b: 60 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };
const GOLD: Color = Color::Rgb { r: 255, g: 200, b: 50 };
const GREEN: Color = Color::Rgb { r: 80, g: 255, b: 80 };
const RED: Color = Color::Rgb { r: 255, g: 60, b: 60 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(&mut self, world: &mut WorldState) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // viewport = terminal cols / CELL_W wide, terminal rows - reserved rows high
        let reserved_rows = MAP_ROW + 4; // HUD + gap + msg + help
        world.camera.view_w = (self.term_w / CELL_W).min(GRID_WIDTH);
        world.camera.view_h = self.term_h.saturating_sub(reserved_rows).clamp(1, GRID_HEIGHT);

        // Detect phase change → clear for clean transition
        let phase = world.phase();
        if self.last_phase != Some(phase) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(phase);
        }

        if let Some(a) = world.screen.attempt() {
            world.camera.follow(a.player.x, a.player.y, a.grid.width(), a.grid.height());
        }

        self.front.clear();

        match phase {
            Phase::LevelSelect => self.compose_level_select(world),
            Phase::Playing => self.compose_game(world),
            Phase::Died => {
                self.compose_game(world);
                self.compose_died_overlay(world);
            }
            Phase::Complete => {
                self.compose_game(world);
                self.compose_complete_overlay(world);
            }
        }

        self.flush_diff()?;

        // Swap: current front becomes next back
        std::mem::swap(&mut self.front, &mut self.back);

        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Explicit base colors, never ResetColor: the terminal default may
        // differ from BASE_BG.
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            let mut x = 0;
            while x < self.front.width {
                let cell = self.front.get(x, y);
                let prev = self.back.get(x, y);

                // Skip continuation cells (right half of wide glyphs)
                if cell.cont {
                    if cell != prev { need_move = true; }
                    x += 1;
                    continue;
                }

                let cont_changed = cell.wide
                    && x + 1 < self.front.width
                    && self.front.get(x + 1, y) != self.back.get(x + 1, y);

                if cell == prev && !cont_changed {
                    need_move = true;
                    x += 1;
                    continue;
                }

                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }

                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                queue!(self.writer, Print(cell.as_str()))?;

                if cell.wide {
                    last_x = x + 1;
                    x += 2;
                } else {
                    last_x = x;
                    x += 1;
                }
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_game(&mut self, w: &WorldState) {
        let Some(a) = w.screen.attempt() else { return };
        let cam = w.camera.clone();

        // ── HUD row ──
        let hud = hud_line(a, w.best_for(&a.level_id), w.fps);
        self.front.fill_row(HUD_ROW, HUD_BG);
        self.front.put_str(0, HUD_ROW, &hud, Color::White, HUD_BG);

        // ── Map (camera viewport) ──
        for vy in 0..cam.view_h {
            let row = MAP_ROW + vy;
            if row >= self.front.height { break; }
            for vx in 0..cam.view_w {
                let col = vx * CELL_W;
                if col + 1 >= self.front.width { break; }
                let wx = cam.x + vx as i32;
                let wy = cam.y + vy as i32;
                if a.grid.in_bounds(wx, wy) {
                    self.compose_cell(a, wx as usize, wy as usize, col, row);
                }
            }
        }

        // ── Message bar ──
        let msg_row = MAP_ROW + cam.view_h + 1;
        if msg_row < self.front.height && !w.message.is_empty() {
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_str(0, msg_row, &format!(" ◈ {} ", w.message), Color::Black, MSG_BG);
        }

        // ── Help bar ──
        let help_row = MAP_ROW + cam.view_h + 3;
        if help_row < self.front.height {
            let help = " ←↑↓→/WASD: Move  R: Restart  ESC: Levels  Ctrl+C: Quit";
            self.front.put_str(0, help_row, help, Color::DarkGrey, Color::Reset);
        }
    }

    /// Write the visual for game cell (gx, gy) into the front buffer at (col, row).
    fn compose_cell(&mut self, a: &Attempt, gx: usize, gy: usize, col: usize, row: usize) {
        let p = &a.player;
        if p.x == gx && p.y == gy {
            let (ch, bg) = match p.motion() {
                Motion::Dead => ('✕', RED),
                Motion::Moving => ('◉', Color::Rgb { r: 60, g: 140, b: 255 }),
                Motion::Idle | Motion::Won => ('●', Color::Rgb { r: 60, g: 140, b: 255 }),
            };
            self.front.set(col, row, Cell::from_char(ch, Color::White, bg));
            self.front.set(col + 1, row, Cell::from_char(' ', Color::White, bg));
            return;
        }

        let tile = a.grid.get(gx, gy);
        let fading = tile == Tile::Transient && p.pending_removal.contains(&(gx, gy));
        let (left, right, fg, bg) = match tile {
            Tile::Empty => (' ', ' ', Color::White, Color::Reset),
            Tile::Wall => (' ', ' ', Color::White, Color::Rgb { r: 110, g: 110, b: 130 }),
            Tile::Hazard => ('▲', '▲', RED, Color::Reset),
            Tile::Collectible => ('◆', ' ', GOLD, Color::Reset),
            Tile::Softening => ('░', '░', Color::Rgb { r: 190, g: 140, b: 90 }, Color::Reset),
            Tile::Transient if fading => ('·', '·', Color::DarkCyan, Color::Reset),
            Tile::Transient => ('~', '~', Color::Cyan, Color::Reset),
            Tile::Goal => {
                self.front.set(col, row, Cell::from_char_wide('🏁', Color::Reset, Color::Reset));
                self.front.set(col + 1, row, Cell::WIDE_CONT);
                return;
            }
        };
        self.front.set(col, row, Cell::from_char(left, fg, bg));
        self.front.set(col + 1, row, Cell::from_char(right, fg, bg));
    }

    fn compose_level_select(&mut self, w: &mut WorldState) {
        let normal = Color::White;
        let dim = Color::DarkGrey;
        let cursor_bg = Color::Rgb { r: 30, g: 60, b: 30 };

        // Header
        self.front.put_str(2, 1, "╔═══════════════════════════════════════════╗", GOLD, Color::Reset);
        self.front.put_str(2, 2, "║             G R I D G L I D E             ║", GOLD, Color::Reset);
        self.front.put_str(2, 3, "╚═══════════════════════════════════════════╝", GOLD, Color::Reset);

        let total = w.level_count();
        let visible = LIST_MAX.min(self.front.height.saturating_sub(LIST_TOP + 5)).max(1);

        // Keep the cursor inside the visible window
        if w.select_cursor < w.select_scroll {
            w.select_scroll = w.select_cursor;
        } else if w.select_cursor >= w.select_scroll + visible {
            w.select_scroll = w.select_cursor + 1 - visible;
        }
        let scroll = w.select_scroll;

        if scroll > 0 {
            self.front.put_str(2, LIST_TOP - 1, "    ▲ ▲ ▲", dim, Color::Reset);
        }

        let ids = w.library.ids();
        for (i, id) in ids.iter().enumerate().skip(scroll).take(visible) {
            let row = LIST_TOP + (i - scroll);
            let unlocked = w.is_unlocked(i);
            let best = match w.best_for(id) {
                Some(rec) => format_record(rec, w.fps),
                None if unlocked => "--".to_string(),
                None => "locked".to_string(),
            };
            let line = format!("{:>3}. {:<20} {}", i + 1, truncate(id, 20), best);

            if i == w.select_cursor {
                let blink = (w.anim_tick / 5) % 2 == 0;
                let arrow = if blink { "▸" } else { " " };
                for x in 0..48.min(self.front.width) {
                    self.front.set(x, row, Cell::from_char(' ', normal, cursor_bg));
                }
                let fg = if unlocked { GREEN } else { dim };
                self.front.put_str(2, row, arrow, fg, cursor_bg);
                self.front.put_str(3, row, &line, fg, cursor_bg);
            } else {
                let fg = if unlocked { normal } else { dim };
                self.front.put_str(3, row, &line, fg, Color::Reset);
            }
        }

        if scroll + visible < total {
            self.front.put_str(2, LIST_TOP + visible, "    ▼ ▼ ▼", dim, Color::Reset);
        }

        // Footer
        let footer_row = LIST_TOP + visible + 2;
        self.front.put_str(2, footer_row, "  ENTER: Start   ↑↓: Select   X: Reset records   Q/ESC: Quit", dim, Color::Reset);
        let count_str = format!("  {}/{} levels", w.select_cursor + 1, total);
        self.front.put_str(2, footer_row + 1, &count_str, dim, Color::Reset);

        if !w.message.is_empty() {
            let msg_row = footer_row + 3;
            if msg_row < self.front.height {
                self.front.fill_row(msg_row, MSG_BG);
                self.front.put_str(0, msg_row, &format!(" ◈ {} ", w.message), Color::Black, MSG_BG);
            }
        }
    }

    /// Dark box centered on the map viewport. Returns (x, y) of its top-left.
    fn overlay_box(&mut self, w: &WorldState, box_w: usize, box_h: usize) -> (usize, usize) {
        let bg = Color::Rgb { r: 40, g: 40, b: 40 };
        let view_cols = (w.camera.view_w * CELL_W).max(box_w);
        let box_x = (view_cols - box_w) / 2;
        let box_y = MAP_ROW + w.camera.view_h.saturating_sub(box_h) / 2;
        for y in box_y..box_y + box_h {
            for x in box_x..box_x + box_w {
                self.front.set(x, y, Cell::from_char(' ', Color::Reset, bg));
            }
        }
        (box_x, box_y)
    }

    fn compose_died_overlay(&mut self, w: &WorldState) {
        let bg = Color::Rgb { r: 40, g: 40, b: 40 };
        let (x, y) = self.overlay_box(w, 34, 7);
        self.front.put_str(x + 2, y + 1, "╔══════════════════════════╗", RED, bg);
        self.front.put_str(x + 2, y + 2, "║       ✕  YOU DIED  ✕     ║", RED, bg);
        self.front.put_str(x + 2, y + 3, "╚══════════════════════════╝", RED, bg);
        let blink = (w.anim_tick / 8) % 2 == 0;
        if blink {
            self.front.put_str(x + 4, y + 4, "▸ <SPACE> to retry", GREEN, bg);
        }
        self.front.put_str(x + 4, y + 5, "▸ ESC: Level select", Color::DarkGrey, bg);
    }

    fn compose_complete_overlay(&mut self, w: &WorldState) {
        let Screen::Complete { attempt: a, new_best } = &w.screen else { return };
        let bg = Color::Rgb { r: 40, g: 40, b: 40 };
        let (x, y) = self.overlay_box(w, 34, 10);
        self.front.put_str(x + 2, y + 1, "╔══════════════════════════╗", GOLD, bg);
        self.front.put_str(x + 2, y + 2, "║    ★ LEVEL COMPLETE ★    ║", GOLD, bg);
        self.front.put_str(x + 2, y + 3, "╚══════════════════════════╝", GOLD, bg);

        let time = format!("◈ Time: {}s ({} ticks)", a.player.elapsed_seconds(w.fps), a.player.alive_ticks);
        let collected = format!("◈ Collected: {}/{}", a.player.collected, a.collectible_total);
        self.front.put_str(x + 4, y + 4, &time, Color::White, bg);
        self.front.put_str(x + 4, y + 5, &collected, Color::White, bg);
        if *new_best {
            self.front.put_str(x + 4, y + 6, "★ NEW BEST!", GREEN, bg);
        }
        let has_next = w.current_index() + 1 < w.level_count();
        let next = if has_next { "▸ ENTER: Next level" } else { "▸ ENTER: Level select" };
        self.front.put_str(x + 4, y + 7, next, GREEN, bg);
        self.front.put_str(x + 4, y + 8, "▸ ESC: Level select", Color::DarkGrey, bg);
    }
}

// ── Text helpers ──

fn hud_line(a: &Attempt, best: Option<&CompletionRecord>, fps: u32) -> String {
    let best = best.map_or_else(|| "--".to_string(), |r| format_record(r, fps));
    format!(
        " Level {}  Collected: {}/{}  Time: {}s  Best: {} ",
        a.level_id,
        a.player.collected, a.collectible_total,
        a.player.elapsed_seconds(fps),
        best,
    )
}

fn format_record(rec: &CompletionRecord, fps: u32) -> String {
    let secs = rec.timer as f64 / f64::from(fps.max(1));
    format!("{secs:.2}s ({} collected)", rec.collected)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 3).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::Player;
    use crate::domain::grid::TileGrid;

    #[test]
    fn hud_shows_collected_time_and_best() {
        let mut player = Player::new(0, 0, 1);
        player.collected = 2;
        player.alive_ticks = 150;
        let a = Attempt {
            level_id: "3".into(),
            grid: TileGrid::filled(Tile::Empty),
            player,
            collectible_total: 5,
        };
        let line = hud_line(&a, None, 60);
        assert!(line.contains("Level 3"));
        assert!(line.contains("Collected: 2/5"));
        assert!(line.contains("Time: 2s"));
        assert!(line.contains("Best: --"));

        let rec = CompletionRecord { timer: 90, collected: 4, completed_at: 0 };
        assert!(hud_line(&a, Some(&rec), 60).contains("Best: 1.50s (4 collected)"));
    }

    #[test]
    fn long_ids_are_truncated() {
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate("abcdefghijklmnopqrstuvwxyz", 10), "abcdefg...");
    }

    #[test]
    fn put_str_clips_at_edge() {
        let mut buf = FrameBuffer::new(4, 1);
        buf.put_str(2, 0, "hello", Color::White, Color::Reset);
        assert_eq!(buf.get(2, 0).as_str(), "h");
        assert_eq!(buf.get(3, 0).as_str(), "e");
        assert_eq!(buf.get(0, 0), Cell::BLANK);
    }
}
