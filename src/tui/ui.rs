//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use super::app::{DebuggerApp, MEM_ROW_WIDTH};

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Percentage(60),
        ])
        .split(frame.area());

    // Left side: code, registers and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(8),
            Constraint::Length(4),
        ])
        .split(chunks[0]);

    draw_disassembly(frame, left_chunks[0], app);
    draw_registers(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: memory and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(10),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_memory(frame, right_chunks[0], app);
    draw_help(frame, right_chunks[1]);
}

/// Draw disassembly from PC onwards.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.get_disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(line, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let has_bp = app.breakpoints.contains(&(line.addr as u16));
            let bp = if has_bp { "●" } else { " " };
            let text = format!("{}{:02X}: {}", prefix, line.addr, line.text);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if has_bp {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" Disassembly ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

/// Draw register state.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let regs = &app.cpu.regs;
    let pending: Vec<String> = app
        .cpu
        .pending_interrupts()
        .iter()
        .map(|irq| irq.name())
        .collect();

    let content = vec![
        Line::from(vec![
            Span::raw("A: "),
            Span::styled(format!("{:02X}", regs.a), Style::default().fg(Color::White)),
            Span::raw(format!(" ({:3})   B: ", regs.a)),
            Span::styled(format!("{:02X}", regs.b), Style::default().fg(Color::White)),
            Span::raw(format!(" ({:3})", regs.b)),
        ]),
        Line::from(vec![
            Span::raw("PC: "),
            Span::styled(format!("{:02X}", regs.pc), Style::default().fg(Color::Yellow)),
            Span::raw("   SP: "),
            Span::styled(format!("{:02X}", regs.sp), Style::default().fg(Color::Magenta)),
            Span::raw(format!("   IR: {:02X}", regs.ir)),
        ]),
        Line::from(vec![
            Span::raw(format!("MAR: {:02X}   MDR: {:02X}   IE: ", regs.mar, regs.mdr)),
            Span::styled(
                if regs.ie { "1" } else { "0" },
                if regs.ie {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::DarkGray)
                },
            ),
        ]),
        Line::from(vec![
            Span::raw("Pending: "),
            Span::styled(
                if pending.is_empty() { "-".to_string() } else { pending.join(", ") },
                Style::default().fg(Color::Red),
            ),
        ]),
        Line::from(vec![
            Span::raw("Ticks: "),
            Span::styled(format!("{}", app.cpu.cycles), Style::default().fg(Color::Cyan)),
            Span::raw(format!("   Rate: {}/s   State: ", app.rate)),
            Span::styled(format!("{:?}", app.cpu.state),
                if app.cpu.is_running() {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Red)
                }),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw memory grid, PC and SP cells highlighted.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let mem = &app.cpu.mem;
    let pc = app.cpu.regs.pc as usize;
    let sp = app.cpu.regs.sp as usize;

    let lines: Vec<Line> = (app.mem_scroll..)
        .take(visible_rows)
        .map(|row| mem.dump(row * MEM_ROW_WIDTH, MEM_ROW_WIDTH))
        .take_while(|cells| !cells.is_empty())
        .map(|cells| {
            let mut spans = vec![Span::styled(
                format!("{:02X}: ", cells[0].0),
                Style::default().fg(Color::DarkGray),
            )];

            for (addr, value) in cells {
                let style = if addr == pc {
                    Style::default().fg(Color::Black).bg(Color::Yellow)
                } else if addr == sp {
                    Style::default().fg(Color::Black).bg(Color::Magenta)
                } else if value != 0 {
                    Style::default().fg(Color::White)
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                spans.push(Span::styled(format!("{:02X}", value), style));
                spans.push(Span::raw(" "));
            }

            Line::from(spans)
        })
        .collect();

    let paragraph = Paragraph::new(lines)
        .block(Block::default()
            .title(" Memory ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(paragraph, area);
}

/// Draw status bar: CPU trace line plus the debugger's own message.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(vec![
        Line::from(app.cpu.status().to_string()),
        Line::from(Span::styled(app.message.clone(), Style::default().fg(Color::Gray))),
    ])
    .style(Style::default().fg(Color::White))
    .block(Block::default()
        .title(" Status ")
        .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  i: Interrupt  b: Breakpoint"),
        Line::from("+/-: Rate  x: Reset  ↑↓: Scroll memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
