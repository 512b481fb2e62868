use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    error::Error,
    fs::File,
    io::{self, stdin, BufWriter, Write},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

use tenta::{
    app::App,
    app_dirs::AppDirs,
    attempts::AttemptLog,
    catalog::Catalog,
    config::{Config, ConfigStore, FileConfigStore},
    enrollment::{fixture_enrollments, Enrollment, MemoryEnrollmentStore, SqliteEnrollmentStore},
    error::QuizError,
    flow::{QuizRequest, Services},
    logging,
    runtime::{CrosstermEventSource, FixedTicker, Runner},
    util::format_time,
};

/// take course quizzes in the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Take the quizzes of your enrolled courses in the terminal. Passing a quiz marks it completed on your enrollment and every attempt is kept in a local history."
)]
pub struct Cli {
    /// course the quiz belongs to
    #[clap(short = 'c', long = "course")]
    course_id: Option<u32>,

    /// quiz lesson to take (defaults to the first quiz of the course)
    #[clap(short = 'q', long = "quiz")]
    quiz_id: Option<u32>,

    /// user to take the quiz as
    #[clap(short = 'u', long = "user")]
    user_id: Option<u32>,

    /// passing score for quizzes that do not define one
    #[clap(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    passing_score: Option<u8>,

    /// directory holding courses.json, lessons.json and enrollments.json
    #[clap(long, value_name = "DIR")]
    catalog: Option<PathBuf>,

    /// list courses and their quizzes, then exit
    #[clap(long)]
    list: bool,

    /// enroll the user in the course first if needed
    #[clap(long)]
    enroll: bool,

    /// write the attempt history as CSV, then exit
    #[clap(long, value_name = "PATH")]
    export_history: Option<PathBuf>,
}

impl Cli {
    /// Command line flags win over the stored config
    fn apply(&self, mut config: Config) -> Config {
        if let Some(user_id) = self.user_id {
            config.user_id = user_id;
        }
        if let Some(score) = self.passing_score {
            config.default_passing_score = score;
        }
        if let Some(dir) = &self.catalog {
            config.catalog_dir = Some(dir.clone());
        }
        config
    }

    /// Picks the quiz to take. Unknown ids are kept as given (or zero) so the
    /// quiz screen can report them.
    fn request(&self, catalog: &Catalog, config: &Config) -> QuizRequest {
        let (course_id, quiz_id) = match (self.course_id, self.quiz_id) {
            (Some(course), Some(quiz)) => (course, quiz),
            (None, Some(quiz)) => (
                catalog
                    .get_quiz_by_id(quiz)
                    .map(|q| q.course_id)
                    .unwrap_or_default(),
                quiz,
            ),
            (Some(course), None) => (
                course,
                catalog
                    .quizzes_for_course(course)
                    .first()
                    .map(|l| l.id)
                    .unwrap_or_default(),
            ),
            (None, None) => catalog
                .first_quiz()
                .map(|l| (l.course_id, l.id))
                .unwrap_or_default(),
        };

        QuizRequest {
            user_id: config.user_id,
            course_id,
            quiz_id,
            default_passing_score: config.default_passing_score,
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let interactive = !cli.list && cli.export_history.is_none();
    init_logging(interactive);

    let config = cli.apply(FileConfigStore::new().load());
    let catalog = match &config.catalog_dir {
        Some(dir) => Catalog::from_dir(dir)?,
        None => Catalog::embedded()?,
    };

    if cli.list {
        list_catalog(&catalog, &mut io::stdout().lock())?;
        return Ok(());
    }

    if let Some(path) = &cli.export_history {
        let db = AppDirs::db_path().ok_or("no state directory for the attempt history")?;
        let count = export_history(&db, path)?;
        println!("exported {count} attempts to {}", path.display());
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let seed = fixture_enrollments(config.catalog_dir.as_deref())?;
    let mut services = open_services(AppDirs::db_path().as_deref(), seed);
    let request = cli.request(&catalog, &config);
    if cli.enroll {
        enroll(&catalog, &mut services, &request)?;
    }

    let mut app = App::new(catalog, services, request);
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::from_millis(config.tick_rate_ms),
    );

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = app.run(&mut terminal, &runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    Ok(result?)
}

fn init_logging(interactive: bool) {
    let to_file = AppDirs::log_path().map(|path| logging::init_file(&path));
    match to_file {
        Some(Ok(())) => {}
        // the quiz screen owns the terminal, so it goes without logs
        _ if interactive => {}
        _ => logging::init_stderr(),
    }
}

/// Enrollments and history in the state db, or in memory when it cannot be opened
fn open_services(db_path: Option<&Path>, seed: Vec<Enrollment>) -> Services {
    if let Some(path) = db_path {
        match open_db(path, &seed) {
            Ok(services) => return services,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "state db unavailable, using memory")
            }
        }
    }
    Services::new(Box::new(MemoryEnrollmentStore::new(seed)), None)
}

fn open_db(path: &Path, seed: &[Enrollment]) -> Result<Services, QuizError> {
    let mut store = SqliteEnrollmentStore::open(path)?;
    let seeded = store.seed(seed)?;
    if seeded > 0 {
        info!(seeded, "seeded enrollments");
    }
    let attempts = AttemptLog::open(path)?;
    Ok(Services::new(Box::new(store), Some(attempts)))
}

/// Enrolls only when the requested quiz exists in the requested course
fn enroll(
    catalog: &Catalog,
    services: &mut Services,
    request: &QuizRequest,
) -> Result<Option<Enrollment>, QuizError> {
    let known = catalog
        .get_quiz_by_id(request.quiz_id)
        .is_ok_and(|quiz| quiz.course_id == request.course_id);
    if !known {
        warn!(
            course_id = request.course_id,
            quiz_id = request.quiz_id,
            "not enrolling, quiz not in catalog"
        );
        return Ok(None);
    }
    let enrollment = services
        .enrollments
        .create(request.user_id, request.course_id)?;
    info!(enrollment_id = enrollment.id, "enrolled");
    Ok(Some(enrollment))
}

fn export_history(db: &Path, out: &Path) -> Result<usize, QuizError> {
    let log = AttemptLog::open(db)?;
    let writer = BufWriter::new(File::create(out)?);
    log.export_csv(writer)
}

fn list_catalog<W: Write>(catalog: &Catalog, out: &mut W) -> io::Result<()> {
    for course in catalog.courses() {
        writeln!(out, "{:>3}  {}", course.id, course.title)?;
        for lesson in catalog.quizzes_for_course(course.id) {
            let Some(quiz) = lesson.as_quiz() else {
                continue;
            };
            let limit = quiz
                .time_limit()
                .map(|d| format!("  {}", format_time(d.as_secs())))
                .unwrap_or_default();
            let pass = quiz
                .passing_score
                .map(|p| format!("  pass {p}%"))
                .unwrap_or_default();
            writeln!(
                out,
                "     {:>3}  {}  ({} questions{limit}{pass})",
                quiz.id,
                quiz.title,
                quiz.question_count()
            )?;
        }
    }
    Ok(())
}
