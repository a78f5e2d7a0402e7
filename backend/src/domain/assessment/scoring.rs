//! Scoring-table lookups.

use std::collections::BTreeMap;
use std::io::Read;

use serde::Deserialize;

use super::{Answer, PhaseScores, QuestionId, ScoringRow};

/// Errors raised while importing a scoring-map CSV.
#[derive(Debug, thiserror::Error)]
pub enum ScoringImportError {
    #[error("scoring csv is unreadable: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: unknown answer type {value:?}")]
    AnswerType { line: usize, value: String },
    #[error("question {question_id} maps answer {answer} twice")]
    DuplicateRow { question_id: QuestionId, answer: Answer },
}

#[derive(Debug, Deserialize)]
struct ScoringCsvRecord {
    question_id: QuestionId,
    answer_type: String,
    phase_1: i32,
    phase_2: i32,
    phase_3: i32,
    phase_4: i32,
}

/// Parse a scoring map with the header
/// `question_id,answer_type,phase_1,phase_2,phase_3,phase_4`.
pub fn parse_scoring_csv<R: Read>(reader: R) -> Result<Vec<ScoringRow>, ScoringImportError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows: BTreeMap<(QuestionId, Answer), ScoringRow> = BTreeMap::new();
    for (index, record) in csv.deserialize::<ScoringCsvRecord>().enumerate() {
        let record = record?;
        let answer = Answer::parse(&record.answer_type).ok_or_else(|| {
            ScoringImportError::AnswerType {
                line: index + 2,
                value: record.answer_type.clone(),
            }
        })?;
        let row = ScoringRow {
            question_id: record.question_id,
            answer,
            weights: PhaseScores([record.phase_1, record.phase_2, record.phase_3, record.phase_4]),
        };
        if rows.insert((row.question_id, answer), row).is_some() {
            return Err(ScoringImportError::DuplicateRow {
                question_id: row.question_id,
                answer,
            });
        }
    }
    Ok(rows.into_values().collect())
}

/// Weights for one answer to one question, if the table maps it.
pub fn weights_for(rows: &[ScoringRow], question_id: QuestionId, answer: Answer) -> Option<PhaseScores> {
    rows.iter()
        .find(|row| row.question_id == question_id && row.answer == answer)
        .map(|row| row.weights)
}

/// Per-phase maxima for a set of answered questions.
///
/// `rows` holds the yes and no rows of every answered question. For each
/// question the larger weight of the two answers counts towards a phase's
/// maximum.
pub fn phase_maxima(rows: &[ScoringRow]) -> PhaseScores {
    let mut per_question: BTreeMap<QuestionId, PhaseScores> = BTreeMap::new();
    for row in rows {
        per_question
            .entry(row.question_id)
            .and_modify(|best| *best = best.max(row.weights))
            .or_insert(row.weights);
    }
    per_question
        .into_values()
        .fold(PhaseScores::default(), |acc, best| acc + best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn row(question_id: QuestionId, answer: Answer, weights: [i32; 4]) -> ScoringRow {
        ScoringRow {
            question_id,
            answer,
            weights: PhaseScores(weights),
        }
    }

    #[rstest]
    fn looks_up_weights_by_answer() {
        let rows = [row(1, Answer::Yes, [2, 0, 0, 0]), row(1, Answer::No, [0, 0, 0, 1])];
        assert_eq!(weights_for(&rows, 1, Answer::No), Some(PhaseScores([0, 0, 0, 1])));
        assert_eq!(weights_for(&rows, 2, Answer::Yes), None);
    }

    #[rstest]
    fn maxima_take_the_larger_weight_per_question() {
        let rows = [
            row(1, Answer::Yes, [2, 0, 1, 0]),
            row(1, Answer::No, [0, 1, 0, 2]),
            row(2, Answer::Yes, [1, 1, 0, 0]),
            row(2, Answer::No, [0, 0, 0, 0]),
        ];
        assert_eq!(phase_maxima(&rows), PhaseScores([3, 2, 1, 2]));
    }

    #[rstest]
    fn no_answers_have_zero_maxima() {
        assert_eq!(phase_maxima(&[]), PhaseScores::default());
    }

    #[rstest]
    fn imports_scoring_csv() {
        let csv = "question_id,answer_type,phase_1,phase_2,phase_3,phase_4\n\
                   2, no ,0,0,1,0\n\
                   1,YES,2,0,0,0\n";
        let rows = parse_scoring_csv(csv.as_bytes()).expect("parsed");
        assert_eq!(
            rows,
            vec![row(1, Answer::Yes, [2, 0, 0, 0]), row(2, Answer::No, [0, 0, 1, 0])]
        );
    }

    #[rstest]
    #[case("question_id,answer_type,phase_1,phase_2,phase_3,phase_4\n1,maybe,0,0,0,0\n")]
    #[case("question_id,answer_type,phase_1,phase_2,phase_3,phase_4\n1,yes,0,0,0,0\n1,y,1,0,0,0\n")]
    #[case("question_id,answer_type,phase_1\n1,yes,0\n")]
    fn rejects_bad_scoring_csv(#[case] csv: &str) {
        assert!(parse_scoring_csv(csv.as_bytes()).is_err());
    }
}
