use std::collections::BTreeMap;

use crate::catalog::Question;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
    pub percent: f64,
}

impl Score {
    pub fn passes(&self, threshold: u8) -> bool {
        self.percent >= f64::from(threshold)
    }

    /// Whole percent for display
    pub fn rounded(&self) -> u32 {
        self.percent.round() as u32
    }
}

/// Percentage of questions whose selected option matches the key.
/// Unanswered questions count as wrong.
pub fn score(questions: &[Question], answers: &BTreeMap<usize, usize>) -> Score {
    let total = questions.len();
    let correct = questions
        .iter()
        .enumerate()
        .filter(|(idx, question)| answers.get(idx) == Some(&question.correct_answer))
        .count();

    let percent = match total {
        0 => 0.0,
        n => (correct as f64 / n as f64) * 100.0,
    };

    Score {
        correct,
        total,
        percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(keys: &[usize]) -> Vec<Question> {
        keys.iter()
            .map(|&k| Question {
                prompt: format!("question with key {k}"),
                options: vec!["a".into(), "b".into(), "c".into()],
                correct_answer: k,
                explanations: None,
            })
            .collect()
    }

    fn answers(selected: &[usize]) -> BTreeMap<usize, usize> {
        selected.iter().copied().enumerate().collect()
    }

    #[test]
    fn test_all_correct_is_100() {
        let s = score(&questions(&[0, 1, 2]), &answers(&[0, 1, 2]));
        assert_eq!(s.correct, 3);
        assert_eq!(s.percent, 100.0);
        assert!(s.passes(100));
    }

    #[test]
    fn test_all_incorrect_is_0() {
        let s = score(&questions(&[0, 1, 2]), &answers(&[1, 2, 0]));
        assert_eq!(s.correct, 0);
        assert_eq!(s.percent, 0.0);
    }

    #[test]
    fn test_two_of_three_fails_at_70() {
        let s = score(&questions(&[0, 1, 2]), &answers(&[0, 1, 1]));
        assert_eq!(s.correct, 2);
        assert_eq!((s.percent * 100.0).round() / 100.0, 66.67);
        assert!(!s.passes(70));
        assert!(s.passes(60));
        assert_eq!(s.rounded(), 67);
    }

    #[test]
    fn test_unanswered_questions_count_as_wrong() {
        let mut partial = BTreeMap::new();
        partial.insert(1, 1);
        let s = score(&questions(&[0, 1, 2, 0]), &partial);
        assert_eq!(s.correct, 1);
        assert_eq!(s.total, 4);
        assert_eq!(s.percent, 25.0);
    }

    #[test]
    fn test_no_questions() {
        let s = score(&[], &BTreeMap::new());
        assert_eq!(s.total, 0);
        assert_eq!(s.percent, 0.0);
    }

    #[test]
    fn test_passes_on_exact_threshold() {
        let s = score(&questions(&[0, 0, 0, 0]), &answers(&[0, 0, 0, 1]));
        assert_eq!(s.percent, 75.0);
        assert!(s.passes(75));
        assert!(!s.passes(76));
    }
}
