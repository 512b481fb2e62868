pub mod review;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, AppState};
use crate::countdown::Urgency;
use crate::flow::{NoticeLevel, QuizFlow};
use crate::session::SubmitReason;
use crate::util::{format_duration, format_percent, format_time, option_label};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 2;

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match (&self.flow, self.state) {
            (Some(flow), AppState::Quiz) => render_quiz(self, flow, area, buf),
            (Some(flow), AppState::Results) => render_results(flow, area, buf),
            (Some(flow), AppState::Review) => review::render_review(self, flow, area, buf),
            _ => render_error(self, area, buf),
        }
    }
}

pub fn urgency_color(urgency: Urgency) -> Color {
    match urgency {
        Urgency::Normal => Color::Reset,
        Urgency::Warning => Color::Yellow,
        Urgency::Critical => Color::Red,
    }
}

fn render_quiz(app: &App, flow: &QuizFlow, area: Rect, buf: &mut Buffer) {
    let session = flow.session();
    let question = session.current_question();
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Length(1), // question i of n
            Constraint::Length(1), // gauge
            Constraint::Length(1), // padding
            Constraint::Min(3),    // question and options
            Constraint::Length(1), // hint / status
            Constraint::Length(1), // legend
        ])
        .split(area);

    // header
    let header = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(flow.quiz().title.clone(), bold_style));
    let inner = header.inner(chunks[0]);
    header.render(chunks[0], buf);

    let timer_text = session
        .countdown()
        .map(|c| (format_time(c.remaining_secs()), urgency_color(c.urgency())));
    let timer_width = timer_text
        .as_ref()
        .map(|(t, _)| t.width() as u16 + 2)
        .unwrap_or(0);
    let header_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(1), Constraint::Length(timer_width)])
        .split(inner);

    Paragraph::new(Line::from(vec![
        Span::raw(flow.course().title.clone()),
        Span::styled(
            format!("  ·  {} questions", session.question_count()),
            dim_style,
        ),
    ]))
    .render(header_chunks[0], buf);

    if let Some((text, color)) = timer_text {
        Paragraph::new(Span::styled(text, bold_style.fg(color)))
            .alignment(Alignment::Right)
            .render(header_chunks[1], buf);
    }

    // progress
    Paragraph::new(Span::styled(
        format!(
            "Question {} of {}",
            session.current() + 1,
            session.question_count()
        ),
        bold_style,
    ))
    .render(chunks[1], buf);

    let percent = session.progress_percent();
    Gauge::default()
        .gauge_style(Style::default().fg(Color::Cyan))
        .ratio((percent / 100.0).clamp(0.0, 1.0))
        .label(format!("{}% Complete", percent.round() as u32))
        .render(chunks[2], buf);

    // question
    let selected = session.answer_for(session.current());
    let mut lines = vec![
        Line::from(Span::styled(question.prompt.clone(), bold_style)),
        Line::default(),
    ];
    for (idx, option) in question.options.iter().enumerate() {
        let cursor = if idx == app.highlighted { "›" } else { " " };
        let mark = if selected == Some(idx) { "●" } else { "○" };
        let style = match (idx == app.highlighted, selected == Some(idx)) {
            (true, _) => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            (false, true) => Style::default().fg(Color::Green),
            (false, false) => Style::default(),
        };
        lines.push(Line::from(Span::styled(
            format!("{cursor} {mark} {}. {option}", option_label(idx)),
            style,
        )));
    }
    Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .render(chunks[4], buf);

    // status
    let status = match &app.hint {
        Some(hint) => Span::styled(hint.clone(), italic_style.fg(Color::Yellow)),
        None => Span::styled(
            format!(
                "{} of {} answered",
                session.answered_count(),
                session.question_count()
            ),
            dim_style,
        ),
    };
    Paragraph::new(status).render(chunks[5], buf);

    // legend; next is dimmed until the current question has an answer
    let mut legend = vec![Span::styled(
        "(↑/↓) move  (enter) select  (←) prev",
        italic_style,
    )];
    if !session.is_last_question() {
        let next_style = if selected.is_some() {
            italic_style
        } else {
            italic_style.add_modifier(Modifier::DIM)
        };
        legend.push(Span::styled("  (→) next", next_style));
    }
    if session.all_answered() {
        legend.push(Span::styled("  (s)ubmit", italic_style.fg(Color::Green)));
    }
    legend.push(Span::styled("  (esc)ape", italic_style));
    Paragraph::new(Line::from(legend)).render(chunks[6], buf);
}

fn render_results(flow: &QuizFlow, area: Rect, buf: &mut Buffer) {
    let Some(result) = flow.session().result() else {
        return;
    };
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(1), // headline
            Constraint::Length(1), // quiz title
            Constraint::Length(1), // padding
            Constraint::Length(1), // score
            Constraint::Length(1), // passing score
            Constraint::Length(1), // timing
            Constraint::Length(1), // history
            Constraint::Length(1), // padding
            Constraint::Min(0),    // notices
            Constraint::Length(1), // legend
        ])
        .split(area);

    let headline = if result.passed {
        Span::styled("Congratulations!", bold_style.fg(Color::Green))
    } else {
        Span::styled("Keep Learning", bold_style.fg(Color::Yellow))
    };
    Paragraph::new(headline)
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    Paragraph::new(flow.quiz().title.clone())
        .alignment(Alignment::Center)
        .render(chunks[1], buf);

    Paragraph::new(Span::styled(
        format!(
            "{}%   {} of {} correct",
            result.score.rounded(),
            result.score.correct,
            result.score.total
        ),
        bold_style,
    ))
    .alignment(Alignment::Center)
    .render(chunks[3], buf);

    // only quizzes with their own threshold mention it
    if flow.quiz().passing_score.is_some_and(|p| p > 0) {
        Paragraph::new(format!("Passing score: {}%", result.passing_score))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);
    }

    let timing = match result.reason {
        SubmitReason::TimeExpired => Span::styled(
            "Time's up! Your answers were submitted automatically.",
            italic_style.fg(Color::Red),
        ),
        SubmitReason::Manual => Span::styled(
            format!("Finished in {}", format_duration(result.elapsed)),
            italic_style,
        ),
    };
    Paragraph::new(timing)
        .alignment(Alignment::Center)
        .render(chunks[5], buf);

    if let Some(summary) = flow.summary() {
        let attempts = if summary.attempts == 1 {
            "1 attempt".to_string()
        } else {
            format!("{} attempts", summary.attempts)
        };
        Paragraph::new(Span::styled(
            format!(
                "Best: {} over {attempts}",
                format_percent(summary.best_percent)
            ),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[6], buf);
    }

    let notices: Vec<Line> = flow
        .notices()
        .iter()
        .map(|n| {
            let color = match n.level {
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Info => Color::Blue,
                NoticeLevel::Error => Color::Red,
            };
            Line::from(Span::styled(n.message.clone(), Style::default().fg(color)))
        })
        .collect();
    Paragraph::new(notices)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[8], buf);

    Paragraph::new(Span::styled(
        "(r)etake / (v)review / (esc)ape",
        italic_style,
    ))
    .render(chunks[9], buf);
}

fn render_error(app: &App, area: Rect, buf: &mut Buffer) {
    let message = app
        .load_error
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "Nothing to show".to_string());
    let retryable = app.load_error.as_ref().is_some_and(|e| e.is_retryable());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(message)
        .block(Block::default().borders(Borders::ALL).title("Error"))
        .style(Style::default().fg(Color::Red))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[1], buf);

    let legend = if retryable {
        "(r)etry / (esc)ape"
    } else {
        "(esc)ape"
    };
    Paragraph::new(Span::styled(
        legend,
        Style::default().add_modifier(Modifier::ITALIC),
    ))
    .render(chunks[3], buf);
}
