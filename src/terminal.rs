// SPDX-License-Identifier: GPL-3.0-only

//! Terminal preview sink
//!
//! Pulls samples from a [`StreamAdapter`] at the stream's frame interval and
//! renders them with Unicode half-block characters for improved vertical
//! resolution. Effects are switched from the keyboard.

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::{FutureExt, StreamExt};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use crate::backends::camera::types::StreamGeometry;
use crate::media::formats::unpack_bgra;
use crate::pipelines::{FrameSample, StreamAdapter};
use crate::storage;

/// Run the terminal preview until the user quits
///
/// The stream must already be open. Returns the selected effect index so
/// the caller can persist it.
pub async fn run(stream: &mut StreamAdapter, snapshot_dir: PathBuf) -> Result<usize, Box<dyn std::error::Error>> {
    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, stream, snapshot_dir).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result?;
    Ok(stream.manager().current_index())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    stream: &mut StreamAdapter,
    snapshot_dir: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let geometry = stream
        .description()
        .map(|d| d.geometry)
        .ok_or("Stream is not open")?;

    let mut reports = stream.frame_rate_reports();
    let mut ticks = tokio::time::interval(stream.frame_interval());
    ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut frame_widget = FrameWidget::new(geometry);
    let mut fps = 0u64;
    let mut show_help = false;
    let mut notice: Option<String> = None;

    loop {
        ticks.tick().await;

        let sample = stream.get_sample().await;
        if !sample.is_empty() {
            frame_widget.update(stream, &sample);
        }

        if let Some(rx) = reports.as_mut() {
            while let Some(Some(report)) = rx.next().now_or_never() {
                fps = report.frames;
            }
        }

        let message = if show_help {
            build_help_message()
        } else {
            build_status_message(stream, fps, notice.as_deref())
        };

        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };
            f.render_widget(&frame_widget, camera_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(StatusBar { message: &message }, status_area);
        })?;

        // Drain input without stalling the pull loop
        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }

            match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Char('n') | KeyCode::Right => {
                    show_help = false;
                    notice = stream
                        .manager()
                        .select_next()
                        .await
                        .err()
                        .map(|e| format!("Error: {}", e));
                }
                KeyCode::Char('b') | KeyCode::Left => {
                    show_help = false;
                    notice = stream
                        .manager()
                        .select_previous()
                        .await
                        .err()
                        .map(|e| format!("Error: {}", e));
                }
                KeyCode::Char('s') => {
                    show_help = false;
                    notice = Some(match storage::save_snapshot(stream.arena(), &snapshot_dir).await {
                        Ok(path) => format!("Saved: {}", path.display()),
                        Err(e) => {
                            error!("Failed to save snapshot: {}", e);
                            format!("Error: {}", e)
                        }
                    });
                }
                KeyCode::Char('h') => show_help = !show_help,
                _ => {}
            }
        }
    }
}

fn build_status_message(stream: &StreamAdapter, fps: u64, notice: Option<&str>) -> String {
    let mut msg = format!("{} | {} fps", stream.manager().current_label(), fps);
    if let Some(status) = stream.status_message() {
        msg.push_str(" | ");
        msg.push_str(status);
    } else if let Some(notice) = notice {
        msg.push_str(" | ");
        msg.push_str(notice);
    }
    msg.push_str(" | 'n'/'b' effect | 's' snapshot | 'h' help | 'q' quit");
    msg
}

fn build_help_message() -> String {
    "n/→: Next effect | b/←: Previous effect | s: Save snapshot | h: Toggle help | q/Ctrl+C: Quit"
        .to_string()
}

/// Widget that renders a BGRA frame using half-block characters
struct FrameWidget {
    geometry: StreamGeometry,
    pixels: Vec<u32>,
}

impl FrameWidget {
    fn new(geometry: StreamGeometry) -> Self {
        Self {
            geometry,
            pixels: Vec::new(),
        }
    }

    /// Copy the sample's pixels out of the arena before the next pull
    fn update(&mut self, stream: &StreamAdapter, sample: &FrameSample) {
        match stream.arena().view(sample.buffer_offset, sample.length) {
            Ok(view) => {
                self.pixels.clear();
                self.pixels.extend_from_slice(view.pixels());
            }
            Err(e) => error!(error = %e, "Sample does not address the arena"),
        }
    }

    fn sample_pixel(&self, x: u32, y: u32) -> Color {
        let x = x.min(self.geometry.width - 1) as usize;
        let y = y.min(self.geometry.height - 1) as usize;
        let (r, g, b, _) = self
            .pixels
            .get(y * self.geometry.width as usize + x)
            .map(|&p| unpack_bgra(p))
            .unwrap_or((0, 0, 0, 0));
        Color::Rgb(r, g, b)
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if self.pixels.is_empty() {
            let msg = "Waiting for frames...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        }

        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = self.geometry.width as f64 / self.geometry.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = self.geometry.width as f64 / display_width as f64;
        let y_scale = self.geometry.height as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(self.sample_pixel(src_x, src_y_top));
                    cell.set_bg(self.sample_pixel(src_x, src_y_bottom));
                }
            }
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

/// Log where the preview ended up; terminal output is gone once the
/// alternate screen closes
pub fn log_summary(stream: &StreamAdapter) {
    let stats = stream.stats();
    info!(
        delivered = stats.delivered,
        dropped = stats.dropped,
        capture_failures = stats.capture_failures,
        render_failures = stats.render_failures,
        busy_skips = stats.busy_skips,
        effect = %stream.manager().current_effect_name(),
        "Preview finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_widget_renders_half_blocks() {
        let geometry = StreamGeometry::bgra(2, 2);
        let widget = FrameWidget {
            geometry,
            pixels: vec![0xFFFF_0000, 0xFFFF_0000, 0xFF00_00FF, 0xFF00_00FF],
        };

        let area = Rect::new(0, 0, 2, 1);
        let mut buf = Buffer::empty(area);
        (&widget).render(area, &mut buf);

        let cell = &buf[(0, 0)];
        assert_eq!(cell.symbol(), "▀");
        assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
        assert_eq!(cell.bg, Color::Rgb(0, 0, 255));
    }

    #[test]
    fn test_frame_widget_placeholder() {
        let widget = FrameWidget::new(StreamGeometry::bgra(4, 4));
        let area = Rect::new(0, 0, 30, 3);
        let mut buf = Buffer::empty(area);
        (&widget).render(area, &mut buf);

        let row: String = (0..30).map(|x| buf[(x, 1)].symbol().to_string()).collect();
        assert!(row.contains("Waiting for frames"));
    }

    #[test]
    fn test_status_bar_truncates() {
        let area = Rect::new(0, 0, 5, 1);
        let mut buf = Buffer::empty(area);
        StatusBar {
            message: "abcdefgh",
        }
        .render(area, &mut buf);
        let row: String = (0..5).map(|x| buf[(x, 0)].symbol().to_string()).collect();
        assert_eq!(row, "abcde");
    }
}
