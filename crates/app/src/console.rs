//! Line-oriented rendering and input for the terminal quiz player.

use services::{QuizStats, SessionState};
use storage::repository::AttemptRow;
use study_core::model::{AttemptProgress, QuizAttempt, QuizDefinition, QuizId, QuizResult};

/// One line typed by the player, interpreted against the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Open the quiz card with this id.
    Open(QuizId),
    /// Confirm the open quiz card.
    Start,
    /// Close the quiz card or leave the results screen.
    Back,
    /// Pick the n-th option (1-based) of the current question.
    Choose(usize),
    Next,
    Previous,
    /// Jump to the n-th question (1-based).
    Jump(usize),
    Submit,
    List,
    Help,
    Quit,
    Unknown(String),
}

impl Input {
    /// Bare numbers open a quiz while browsing and choose an option during an attempt.
    #[must_use]
    pub fn parse(line: &str, state: SessionState) -> Self {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Self::Unknown(String::new());
        };
        let arg = words.next().and_then(|w| w.parse::<u64>().ok());

        match (head.to_ascii_lowercase().as_str(), arg) {
            ("q" | "quit" | "exit", _) => Self::Quit,
            ("h" | "help" | "?", _) => Self::Help,
            ("l" | "list", _) => Self::List,
            ("open" | "o", Some(id)) => Self::Open(QuizId::new(id)),
            ("start" | "y" | "yes", _) => Self::Start,
            ("back" | "b" | "cancel" | "c", _) => Self::Back,
            ("n" | "next", _) => Self::Next,
            ("p" | "prev" | "previous", _) => Self::Previous,
            ("j" | "jump" | "goto", Some(n)) => usize::try_from(n)
                .map_or_else(|_| Self::Unknown(line.to_owned()), Self::Jump),
            ("s" | "submit", _) => Self::Submit,
            (number, None) => match (number.parse::<u64>(), state) {
                (Ok(id), SessionState::Idle | SessionState::Selecting(_)) => {
                    Self::Open(QuizId::new(id))
                }
                (Ok(n), SessionState::Confirmed(_)) => usize::try_from(n)
                    .map_or_else(|_| Self::Unknown(line.to_owned()), Self::Choose),
                _ => Self::Unknown(line.to_owned()),
            },
            _ => Self::Unknown(line.to_owned()),
        }
    }
}

pub fn print_help() {
    println!("Commands:");
    println!("  list | l               show the quiz catalog");
    println!("  <id> | open <id>       open a quiz card");
    println!("  start | y              start the open quiz");
    println!("  back | b               close the card or the results screen");
    println!("  <n>                    pick option n for the current question");
    println!("  next | n               next question (submits on the last one)");
    println!("  prev | p               previous question");
    println!("  jump <n> | j <n>       go to question n");
    println!("  submit | s             submit now");
    println!("  quit | q               leave");
}

#[must_use]
pub fn format_clock(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

pub fn print_catalog(quizzes: &[QuizDefinition]) {
    if quizzes.is_empty() {
        println!("The catalog is empty. Import one with --catalog <file.json>.");
        return;
    }
    for quiz in quizzes {
        println!(
            "[{:>3}] {:<32} {:<14} {:<8} {:>2} questions  {:>4} min",
            quiz.id(),
            quiz.title(),
            quiz.subject(),
            quiz.difficulty().as_str(),
            quiz.question_count(),
            quiz.time_limit_minutes(),
        );
    }
}

pub fn print_card(quiz: &QuizDefinition) {
    println!();
    println!("{} ({})", quiz.title(), quiz.subject());
    println!(
        "  {} questions, {} minutes, difficulty {}",
        quiz.question_count(),
        quiz.time_limit_minutes(),
        quiz.difficulty().as_str()
    );
    if let Some(badge) = quiz.badge_reward() {
        println!("  Score 80% or more to earn \"{badge}\"");
    }
    println!("Type `start` to begin or `back` to return.");
}

pub fn print_question(attempt: &QuizAttempt) {
    let progress: AttemptProgress = attempt.progress();
    let question = attempt.current_question();
    let selected = attempt.answer_for(question.id());

    println!();
    println!(
        "Question {}/{}  ({} answered, {} left)",
        progress.current_index + 1,
        progress.total,
        progress.answered,
        format_clock(progress.remaining_secs)
    );
    println!("{}", question.prompt());
    for (i, option) in question.options().iter().enumerate() {
        let marker = if selected == Some(option.as_str()) { '*' } else { ' ' };
        println!("  {marker} {}. {option}", i + 1);
    }
}

pub fn print_result(result: &QuizResult) {
    println!();
    println!("Quiz complete!");
    println!(
        "  Score {}%  ({} correct, {} incorrect, {} unanswered)",
        result.score,
        result.correct,
        result.incorrect(),
        result.unanswered()
    );
    println!("  Time {}", format_clock(result.elapsed_secs));
    println!("  +{} XP", result.xp);
    if let Some(badge) = &result.badge {
        println!("  Badge earned: {badge}");
    }
    for (i, review) in result.review.iter().enumerate() {
        let mark = if review.is_correct { "ok" } else { "x " };
        let selected = review.selected.as_deref().unwrap_or("(no answer)");
        println!(
            "  {mark} {:>2}. {selected}  [answer: {}]",
            i + 1,
            review.correct_answer
        );
    }
    println!("Type `back` to return to the catalog.");
}

pub fn print_history(rows: &[AttemptRow]) {
    if rows.is_empty() {
        println!("No attempts recorded yet.");
        return;
    }
    for row in rows {
        println!(
            "#{:<5} quiz {:>3}  {:>3}%  {}",
            row.id,
            row.record.quiz_id,
            row.record.score,
            row.record.completed_at.to_rfc3339()
        );
    }
}

pub fn print_stats(stats: &QuizStats) {
    println!(
        "quiz {:>3}: {} attempts, best {}%, latest {}%, average {}%, last {}",
        stats.quiz_id,
        stats.attempts,
        stats.best_score,
        stats.latest_score,
        stats.average_score,
        stats.last_completed_at.to_rfc3339()
    );
}
