use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{backend::Backend, Terminal};
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::error::QuizError;
use crate::flow::{QuizFlow, QuizRequest, Services};
use crate::runtime::{QuizEvent, QuizEventSource, Runner, Ticker};
use crate::session::{SessionError, SubmitReason};
use crate::util::digit_to_index;

pub const REVIEW_PAGE: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    /// The quiz could not be loaded
    Error,
    Quiz,
    Results,
    Review,
}

#[derive(Debug, Default)]
pub struct ReviewState {
    /// Index of the first question shown
    pub scroll_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub struct App {
    pub catalog: Catalog,
    pub services: Services,
    pub request: QuizRequest,
    pub flow: Option<QuizFlow>,
    pub load_error: Option<QuizError>,
    pub state: AppState,
    /// Option under the cursor on the quiz screen
    pub highlighted: usize,
    pub review_state: ReviewState,
    /// One-shot message for the quiz screen, cleared on the next key
    pub hint: Option<String>,
}

impl App {
    pub fn new(catalog: Catalog, services: Services, request: QuizRequest) -> Self {
        let mut app = Self {
            catalog,
            services,
            request,
            flow: None,
            load_error: None,
            state: AppState::Error,
            highlighted: 0,
            review_state: ReviewState::default(),
            hint: None,
        };
        app.reload();
        app
    }

    /// (Re)loads the quiz, landing on either the quiz or the error screen
    pub fn reload(&mut self) {
        match QuizFlow::load(&self.catalog, &self.services, &self.request) {
            Ok(flow) => {
                self.flow = Some(flow);
                self.load_error = None;
                self.state = AppState::Quiz;
            }
            Err(err) => {
                warn!(error = %err, "could not load quiz");
                self.flow = None;
                self.load_error = Some(err);
                self.state = AppState::Error;
            }
        }
        self.highlighted = 0;
        self.review_state = ReviewState::default();
        self.hint = None;
    }

    /// Draws and handles events until the user quits. Each step feeds the
    /// measured wall time into the countdown.
    pub fn run<B: Backend, E: QuizEventSource, T: Ticker>(
        &mut self,
        terminal: &mut Terminal<B>,
        runner: &Runner<E, T>,
    ) -> io::Result<()> {
        terminal.draw(|f| f.render_widget(&*self, f.area()))?;
        let mut last = Instant::now();

        loop {
            let event = runner.step();
            let now = Instant::now();
            self.on_tick(now - last);
            last = now;

            if let QuizEvent::Key(key) = event {
                if self.on_key(key) == Control::Quit {
                    info!("quit requested");
                    return Ok(());
                }
            }
            terminal.draw(|f| f.render_widget(&*self, f.area()))?;
        }
    }

    pub fn on_tick(&mut self, elapsed: Duration) {
        let Some(flow) = self.flow.as_mut() else {
            return;
        };
        if flow.tick(elapsed, &mut self.services).is_some() && self.state == AppState::Quiz {
            self.hint = None;
            self.state = AppState::Results;
        }
    }

    pub fn on_key(&mut self, key: KeyEvent) -> Control {
        if key.kind != KeyEventKind::Press {
            return Control::Continue;
        }
        if key.code == KeyCode::Esc
            || (key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c'))
        {
            return Control::Quit;
        }

        self.hint = None;
        match self.state {
            AppState::Error => {
                if key.code == KeyCode::Char('r') {
                    self.reload();
                }
            }
            AppState::Quiz => self.on_quiz_key(key),
            AppState::Results => match key.code {
                KeyCode::Char('r') => self.retake(),
                KeyCode::Char('v') => {
                    self.review_state = ReviewState::default();
                    self.state = AppState::Review;
                }
                _ => {}
            },
            AppState::Review => self.on_review_key(key),
        }
        Control::Continue
    }

    fn on_quiz_key(&mut self, key: KeyEvent) {
        let Some(flow) = self.flow.as_mut() else {
            return;
        };
        let option_count = flow.session().current_question().option_count();

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.highlighted = self.highlighted.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.highlighted = (self.highlighted + 1).min(option_count.saturating_sub(1));
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.select(self.highlighted),
            KeyCode::Right | KeyCode::Tab | KeyCode::Char('n') => {
                match flow.session_mut().advance() {
                    Ok(_) => self.sync_highlight(),
                    Err(SessionError::Unanswered(_)) => {
                        self.hint = Some("Select an answer before moving on".to_string());
                    }
                    Err(err) => debug!(error = %err, "advance refused"),
                }
            }
            KeyCode::Left | KeyCode::Char('p') => {
                flow.session_mut().retreat();
                self.sync_highlight();
            }
            KeyCode::Char('s') => self.submit(),
            KeyCode::Char(c) => {
                if let Some(index) = digit_to_index(c).filter(|i| *i < option_count) {
                    self.highlighted = index;
                    self.select(index);
                }
            }
            _ => {}
        }
    }

    fn on_review_key(&mut self, key: KeyEvent) {
        let max_scroll = self
            .flow
            .as_ref()
            .map(|f| f.session().question_count().saturating_sub(1))
            .unwrap_or(0);
        let offset = &mut self.review_state.scroll_offset;

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => *offset = offset.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => *offset = (*offset + 1).min(max_scroll),
            KeyCode::PageUp => *offset = offset.saturating_sub(REVIEW_PAGE),
            KeyCode::PageDown => *offset = (*offset + REVIEW_PAGE).min(max_scroll),
            KeyCode::Home => *offset = 0,
            KeyCode::End => *offset = max_scroll,
            KeyCode::Char('b') | KeyCode::Backspace => self.state = AppState::Results,
            KeyCode::Char('r') => self.retake(),
            _ => {}
        }
    }

    fn select(&mut self, option: usize) {
        let Some(flow) = self.flow.as_mut() else {
            return;
        };
        if let Err(err) = flow.session_mut().select_current(option) {
            debug!(error = %err, "selection refused");
        }
    }

    fn submit(&mut self) {
        let Some(flow) = self.flow.as_mut() else {
            return;
        };
        let session = flow.session();
        if !session.all_answered() {
            self.hint = Some(format!(
                "Answer every question to submit ({} of {} answered)",
                session.answered_count(),
                session.question_count()
            ));
            return;
        }
        if flow.submit(SubmitReason::Manual, &mut self.services).is_some() {
            self.state = AppState::Results;
        }
    }

    fn retake(&mut self) {
        if let Some(flow) = self.flow.as_mut() {
            flow.retake();
            self.state = AppState::Quiz;
            self.highlighted = 0;
            self.review_state = ReviewState::default();
        }
    }

    /// Puts the cursor on the current question's answer, or the first option
    fn sync_highlight(&mut self) {
        self.highlighted = self
            .flow
            .as_ref()
            .and_then(|f| {
                let session = f.session();
                session.answer_for(session.current())
            })
            .unwrap_or(0);
    }
}
