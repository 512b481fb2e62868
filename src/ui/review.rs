use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};

use crate::app::App;
use crate::catalog::Question;
use crate::flow::QuizFlow;
use crate::util::option_label;

/// Lines describing one reviewed question
pub fn present_question(
    number: usize,
    question: &Question,
    answer: Option<usize>,
) -> Vec<Line<'static>> {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let note_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::ITALIC);

    let mut lines = vec![Line::from(Span::styled(
        format!("{number}. {}", question.prompt),
        bold_style,
    ))];

    for (idx, option) in question.options.iter().enumerate() {
        let (mark, style) = if question.is_correct(idx) {
            ("✓", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        } else if answer == Some(idx) {
            ("✗", Style::default().fg(Color::Red))
        } else {
            (" ", Style::default())
        };
        let yours = if answer == Some(idx) {
            "  (your answer)"
        } else {
            ""
        };
        lines.push(Line::from(Span::styled(
            format!("  {mark} {}. {option}{yours}", option_label(idx)),
            style,
        )));
    }

    if answer.is_none() {
        lines.push(Line::from(Span::styled(
            "  Not answered",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::ITALIC),
        )));
    }

    // explain the chosen option, or the right one when nothing was chosen
    let explained = answer.unwrap_or(question.correct_answer);
    if let Some(text) = question.explanation(explained) {
        lines.push(Line::from(Span::styled(format!("  ↳ {text}"), note_style)));
    }

    lines.push(Line::default());
    lines
}

/// Renders every question with its correct option and the learner's choice
pub fn render_review(app: &App, flow: &QuizFlow, area: Rect, buf: &mut Buffer) {
    let session = flow.session();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Min(0),    // questions
            Constraint::Length(2), // instructions
        ])
        .split(area);

    let score = session
        .result()
        .map(|r| format!("  ({}%)", r.score.rounded()))
        .unwrap_or_default();
    Paragraph::new(format!("Review: {}{score}", flow.quiz().title))
        .block(Block::default().borders(Borders::ALL).title("Answers"))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let offset = app
        .review_state
        .scroll_offset
        .min(session.question_count().saturating_sub(1));
    let lines: Vec<Line> = session
        .questions()
        .iter()
        .enumerate()
        .skip(offset)
        .flat_map(|(idx, q)| present_question(idx + 1, q, session.answer_for(idx)))
        .collect();

    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(format!(
            "Question {} of {}",
            offset + 1,
            session.question_count()
        )))
        .wrap(Wrap { trim: false })
        .render(chunks[1], buf);

    Paragraph::new("(↑/↓) scroll  (PgUp/PgDn) page  (Home) top  (b/backspace) back  (r)etake")
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(chunks[2], buf);
}
