use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Sparkline, Wrap};

use crate::app::{App, format_balance, format_hash_rate};
use crate::insight::Trend;
use crate::sim::Currency;
use crate::withdraw::{Field, Receipt, WithdrawStage};

pub fn draw(f: &mut Frame<'_>, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.size());

    draw_header(f, chunks[0], app);

    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(33),
            Constraint::Percentage(33),
            Constraint::Percentage(34),
        ])
        .split(chunks[1]);
    draw_balance(f, cards[0], app, Currency::Btc);
    draw_balance(f, cards[1], app, Currency::Eth);
    draw_hash_power(f, cards[2], app);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(chunks[2]);

    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(main_chunks[0]);
    let lower_left = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(left_chunks[1]);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(8),
            Constraint::Length(5),
            Constraint::Length(4),
        ])
        .split(main_chunks[1]);

    draw_chart(f, left_chunks[0], app);
    draw_log(f, lower_left[0], app);
    draw_receipts(f, lower_left[1], app);
    draw_insight(f, right_chunks[0], app);
    draw_projection(f, right_chunks[1], app);
    draw_security(f, right_chunks[2]);
    draw_footer(f, chunks[3], app);

    if app.withdraw.is_open() {
        draw_withdraw_modal(f, app);
    }
}

fn draw_header(f: &mut Frame<'_>, area: Rect, app: &App) {
    let mining = app.sim.snapshot().is_mining;
    let (dot, status) = if mining {
        (Style::default().fg(Color::Green), "ACTIVE")
    } else {
        (Style::default().fg(Color::Red), "IDLE")
    };
    let mut spans = vec![
        Span::styled(
            "HYPER",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "MINE",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(" PRO", Style::default().fg(Color::Yellow)),
        Span::raw("    "),
        Span::styled("● ", dot),
        Span::styled(
            format!("NETWORK: {}", status),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("  |  LATENCY: 12ms  |  NODES: 8,492"),
    ];
    if mining {
        spans.push(Span::styled(
            "   ● LIVE",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ));
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let paragraph = Paragraph::new(Line::from(spans)).block(block);
    f.render_widget(paragraph, area);
}

fn draw_balance(f: &mut Frame<'_>, area: Rect, app: &App, currency: Currency) {
    let (title, color, key) = match currency {
        Currency::Btc => ("Bitcoin Balance ₿", Color::Yellow, "[B] Withdraw BTC"),
        Currency::Eth => ("Ethereum Balance Ξ", Color::LightBlue, "[E] Withdraw ETH"),
    };
    let block = pane_block(title, color);
    let balance = app.sim.snapshot().wallet.balance(currency);
    let lines = vec![
        Line::from(Span::styled(
            format_balance(balance, currency),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(key, Style::default().fg(Color::Gray))),
    ];
    let paragraph = Paragraph::new(lines).block(block);
    f.render_widget(paragraph, area);
}

fn draw_hash_power(f: &mut Frame<'_>, area: Rect, app: &App) {
    let snapshot = app.sim.snapshot();
    let block = pane_block("Total Hash Power", Color::Cyan);
    f.render_widget(block.clone(), area);
    let inner = block.inner(area);
    let segments = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    let headline = Paragraph::new(Line::from(Span::styled(
        format_hash_rate(snapshot.hash_rate),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    )));
    f.render_widget(headline, segments[0]);

    let gauge = Gauge::default()
        .ratio(snapshot.efficiency)
        .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
        .label("");
    f.render_widget(gauge, segments[1]);

    let stats = Paragraph::new(Line::from(vec![
        Span::styled(
            format!("EFFICIENCY: {:.1}%", snapshot.efficiency * 100.0),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("   "),
        Span::styled(
            format!("TEMP: {:.1}°C", snapshot.temperature),
            Style::default().fg(Color::Cyan),
        ),
    ]));
    f.render_widget(stats, segments[2]);
}

fn draw_chart(f: &mut Frame<'_>, area: Rect, app: &App) {
    let title = match app.sim.history().back() {
        Some(last) => format!("Real-time Difficulty (last {})", last.timestamp.format("%H:%M:%S")),
        None => "Real-time Difficulty".to_string(),
    };
    let block = pane_block(&title, Color::DarkGray);
    let data: Vec<u64> = app
        .sim
        .history()
        .iter()
        .map(|sample| sample.rate.max(0.0) as u64)
        .collect();
    if data.is_empty() {
        let paragraph = Paragraph::new("No samples yet. Start mining to chart hash rate.")
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }
    let sparkline = Sparkline::default()
        .block(block)
        .data(&data)
        .max(app.sim.config().max_hash_rate as u64)
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(sparkline, area);
}

fn draw_log(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("AI System Log", Color::Cyan);
    let items: Vec<ListItem> = app
        .logs
        .iter()
        .map(|entry| {
            ListItem::new(Line::from(vec![
                Span::styled("> ", Style::default().fg(Color::DarkGray)),
                Span::styled(entry.render(), Style::default().fg(Color::Green)),
            ]))
        })
        .collect();
    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

fn draw_receipts(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("Transfers", Color::DarkGray);
    if app.receipts.is_empty() {
        let paragraph = Paragraph::new("No withdrawals yet.")
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }
    let items: Vec<ListItem> = app.receipts.iter().map(build_receipt_item).collect();
    let list = List::new(items).block(block);
    f.render_widget(list, area);
}

fn build_receipt_item(receipt: &Receipt) -> ListItem<'static> {
    let line = Line::from(vec![
        Span::styled(
            receipt.completed_at.format("%H:%M:%S").to_string(),
            Style::default().fg(Color::Gray),
        ),
        Span::raw("  "),
        Span::styled(receipt.id.clone(), Style::default().fg(Color::LightCyan)),
        Span::raw("  "),
        Span::styled(
            format!("{} {}", receipt.amount, receipt.currency),
            Style::default().fg(Color::White),
        ),
    ]);
    ListItem::new(vec![line])
}

fn draw_insight(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("Gemini AI Insights", Color::Cyan);
    let Some(insight) = &app.insight else {
        let paragraph = Paragraph::new(Line::from(Span::styled(
            "ANALYZING BLOCKCHAIN...",
            Style::default().fg(Color::DarkGray),
        )))
        .alignment(Alignment::Center)
        .block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let trend_color = match insight.trend {
        Trend::Bullish => Color::Green,
        Trend::Bearish | Trend::Neutral => Color::Red,
    };
    let lines = vec![
        Line::from(vec![
            Span::styled(
                format!("{} TREND", insight.trend.label()),
                Style::default()
                    .fg(trend_color)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("   VOLATILITY: "),
            Span::styled(
                format!("{}/100", insight.volatility_index),
                Style::default().fg(Color::White),
            ),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            format!("\"{}\"", insight.advice),
            Style::default().fg(Color::LightCyan),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Updated via Quantum Uplink • [R] refresh",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_projection(f: &mut Frame<'_>, area: Rect, app: &App) {
    let block = pane_block("Projected Hourly Yield", Color::DarkGray);
    let lines = vec![
        Line::from(vec![
            Span::styled(
                format!("~{:.2}", app.sim.projected_hourly(Currency::Btc)),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(" BTC", Style::default().fg(Color::Yellow)),
            Span::raw("   "),
            Span::styled(
                format!("~{:.2}", app.sim.projected_hourly(Currency::Eth)),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(" ETH", Style::default().fg(Color::LightBlue)),
        ]),
        Line::from(Span::styled(
            "↗ +420% Efficiency with Quantum Boost",
            Style::default().fg(Color::Green),
        )),
    ];
    let paragraph = Paragraph::new(lines).block(block);
    f.render_widget(paragraph, area);
}

fn draw_security(f: &mut Frame<'_>, area: Rect) {
    let block = pane_block("Secure Enclave", Color::DarkGray);
    let paragraph = Paragraph::new(Line::from(Span::styled(
        "AES-256 ENCRYPTION ACTIVE",
        Style::default().fg(Color::Cyan),
    )))
    .block(block);
    f.render_widget(paragraph, area);
}

fn draw_footer(f: &mut Frame<'_>, area: Rect, app: &App) {
    let action = if app.sim.is_mining() {
        "TERMINATE SEQUENCE"
    } else {
        "INITIATE MINING PROTOCOL"
    };
    let line = Line::from(vec![
        Span::styled(
            format!("[Space] {}", action),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  B/E withdraw  |  R refresh insight  |  Q quit"),
    ]);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Master Control")
        .border_style(Style::default().fg(Color::Gray));
    let paragraph = Paragraph::new(line).block(block);
    f.render_widget(paragraph, area);
}

fn draw_withdraw_modal(f: &mut Frame<'_>, app: &App) {
    let area = centered_rect(60, 50, f.size());
    f.render_widget(Clear, area);
    let block = Block::default()
        .title(Span::styled(
            "SECURE WITHDRAWAL",
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let balance = app.withdraw_balance().unwrap_or(0.0);
    let mut lines = match app.withdraw.stage() {
        WithdrawStage::Input {
            currency,
            address,
            amount,
            field,
        } => {
            let transfer_style = if app.withdraw.can_submit(balance) {
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            vec![
                Line::from(Span::styled(
                    "TARGET WALLET ADDRESS",
                    field_label_style(*field == Field::Address),
                )),
                Line::from(input_span(address, &format!("Enter {} Address", currency))),
                Line::from(""),
                Line::from(Span::styled(
                    format!("AMOUNT ({})", currency),
                    field_label_style(*field == Field::Amount),
                )),
                Line::from(input_span(amount, "0.0")),
                Line::from(Span::styled(
                    format!("Available: {:.4} {}", balance, currency),
                    Style::default().fg(Color::Gray),
                )),
                Line::from(""),
                Line::from(vec![
                    Span::styled("[Esc] Cancel", Style::default().fg(Color::Gray)),
                    Span::raw("    "),
                    Span::styled("[Enter] Transfer", transfer_style),
                    Span::raw("    "),
                    Span::styled("[Tab] next field", Style::default().fg(Color::Gray)),
                ]),
            ]
        }
        WithdrawStage::Processing { request, .. } => vec![
            Line::from(""),
            Line::from(Span::styled(
                "VERIFYING BLOCKS",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                format!(
                    "Hashing {} {} transaction to the ledger...",
                    request.amount, request.currency
                ),
                Style::default().fg(Color::Gray),
            )),
        ],
        WithdrawStage::Success { receipt } => vec![
            Line::from(""),
            Line::from(Span::styled(
                "✓ TRANSFER COMPLETE",
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from("Funds have been dispatched to your wallet."),
            Line::from(Span::styled(
                format!("Receipt {}", receipt.id),
                Style::default().fg(Color::LightCyan),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "[Enter] Close Receipt",
                Style::default().fg(Color::Cyan),
            )),
        ],
        WithdrawStage::Closed => Vec::new(),
    };

    if let Some(currency) = app.withdraw.currency() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(
                "⚠ Transactions are irreversible. Ensure the receiving address supports {} network withdrawals.",
                currency
            ),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let paragraph = Paragraph::new(lines).block(block).wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}

fn input_span(value: &str, placeholder: &str) -> Span<'static> {
    if value.is_empty() {
        Span::styled(placeholder.to_string(), Style::default().fg(Color::DarkGray))
    } else {
        Span::styled(value.to_string(), Style::default().fg(Color::White))
    }
}

fn field_label_style(focused: bool) -> Style {
    if focused {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn pane_block(title: &str, accent: Color) -> Block<'_> {
    Block::default()
        .title(Span::styled(title, Style::default().fg(Color::White)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent))
}
