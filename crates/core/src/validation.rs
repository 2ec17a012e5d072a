//! Parse-or-reject boundary for model generated question batches.
//!
//! Model output is untrusted text. [`parse_batch`] either returns a
//! [`QuestionBatch`] that satisfies every structural rule or a
//! [`ValidationError`] naming the first rule that failed. Rules run in a fixed
//! order over the whole batch: entry count, entry shape, duplicate options,
//! difficulty mix.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{
    BATCH_SIZE, DIFFICULTY_MIX, Difficulty, OPTION_COUNT, Question, QuestionBatch, QuestionError,
    QuestionId, difficulty_counts, first_duplicate,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Why an entry failed the shape rule.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ShapeProblem {
    #[error("entry is not an object")]
    NotAnObject,
    #[error("missing id")]
    MissingId,
    #[error("missing or empty question text")]
    EmptyPrompt,
    #[error("expected 4 options, found {0}")]
    OptionCount(usize),
    #[error("options must all be text")]
    NonTextOption,
    #[error("correctOption must be an integer between 0 and 3")]
    CorrectOption,
    #[error("missing or empty explanation")]
    EmptyExplanation,
    #[error("difficulty must be easy, medium or hard")]
    Difficulty,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    /// The response is not a list of exactly five questions. `found` is
    /// `None` when the text did not decode as a JSON array at all.
    #[error("expected 5 questions, {}", describe_found(.found))]
    Count { found: Option<usize> },

    #[error("question {index} is malformed: {problem}")]
    Shape { index: usize, problem: ShapeProblem },

    #[error("question {index} repeats option {option:?}")]
    DuplicateOption { index: usize, option: String },

    #[error("question id {id:?} appears more than once")]
    DuplicateId { id: String },

    #[error("expected 2 easy, 2 medium and 1 hard question, got {easy}/{medium}/{hard}")]
    Distribution {
        easy: usize,
        medium: usize,
        hard: usize,
    },
}

fn describe_found(found: &Option<usize>) -> String {
    match found {
        Some(n) => format!("got {n}"),
        None => "response was not a JSON list".to_string(),
    }
}

//
// ─── PARSING ───────────────────────────────────────────────────────────────────
//

/// Entry that passed the shape rule but not yet the later ones.
struct ShapedEntry {
    id: String,
    prompt: String,
    options: [String; OPTION_COUNT],
    correct_option: u8,
    explanation: String,
    difficulty: Difficulty,
    topic: Option<String>,
}

/// Validate raw model text as a question batch.
///
/// Surrounding prose or markdown fences are tolerated; only the outermost
/// `[...]` span is decoded.
///
/// # Errors
///
/// Returns the `ValidationError` of the first rule that fails.
pub fn parse_batch(raw: &str) -> Result<QuestionBatch, ValidationError> {
    let json = extract_array(raw).ok_or(ValidationError::Count { found: None })?;
    let value: Value =
        serde_json::from_str(json).map_err(|_| ValidationError::Count { found: None })?;
    validate_value(&value)
}

/// Validate an already decoded JSON value as a question batch.
///
/// # Errors
///
/// Returns the `ValidationError` of the first rule that fails.
pub fn validate_value(value: &Value) -> Result<QuestionBatch, ValidationError> {
    let entries = value
        .as_array()
        .ok_or(ValidationError::Count { found: None })?;
    if entries.len() != BATCH_SIZE {
        return Err(ValidationError::Count {
            found: Some(entries.len()),
        });
    }

    let mut shaped = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            shape_entry(entry).map_err(|problem| ValidationError::Shape { index, problem })
        })
        .collect::<Result<Vec<_>, _>>()?;

    for (index, entry) in shaped.iter().enumerate() {
        if let Some(option) = first_duplicate(&entry.options) {
            return Err(ValidationError::DuplicateOption {
                index,
                option: option.to_string(),
            });
        }
    }

    check_distribution(shaped.iter().map(|e| e.difficulty))?;

    // Models often copy the example id into every entry; answers are keyed
    // by id, so fall back to positional ids when any repeat.
    let ids: Vec<&str> = shaped.iter().map(|e| e.id.as_str()).collect();
    if first_duplicate(&ids).is_some() {
        for (index, entry) in shaped.iter_mut().enumerate() {
            entry.id = (index + 1).to_string();
        }
    }

    let questions = shaped
        .into_iter()
        .enumerate()
        .map(|(index, entry)| build_question(index, entry))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(QuestionBatch::from_validated(questions))
}

/// Assemble a batch from questions built elsewhere (fixtures, stored quizzes).
///
/// # Errors
///
/// Returns `ValidationError::Count`, `ValidationError::Distribution` or
/// `ValidationError::DuplicateId`.
pub fn validate_questions(questions: Vec<Question>) -> Result<QuestionBatch, ValidationError> {
    if questions.len() != BATCH_SIZE {
        return Err(ValidationError::Count {
            found: Some(questions.len()),
        });
    }
    check_distribution(questions.iter().map(Question::difficulty))?;
    let ids: Vec<&str> = questions.iter().map(|q| q.id().as_str()).collect();
    if let Some(id) = first_duplicate(&ids) {
        return Err(ValidationError::DuplicateId { id: id.to_string() });
    }
    Ok(QuestionBatch::from_validated(questions))
}

fn check_distribution(
    difficulties: impl IntoIterator<Item = Difficulty>,
) -> Result<(), ValidationError> {
    let (easy, medium, hard) = difficulty_counts(difficulties);
    if (easy, medium, hard) != DIFFICULTY_MIX {
        return Err(ValidationError::Distribution { easy, medium, hard });
    }
    Ok(())
}

fn build_question(index: usize, entry: ShapedEntry) -> Result<Question, ValidationError> {
    let question = Question::new(
        QuestionId::new(entry.id),
        entry.prompt,
        entry.options,
        entry.correct_option,
        entry.explanation,
        entry.difficulty,
    )
    .map_err(|err| match err {
        QuestionError::DuplicateOption(option) => ValidationError::DuplicateOption { index, option },
        QuestionError::EmptyId => ValidationError::Shape {
            index,
            problem: ShapeProblem::MissingId,
        },
        QuestionError::EmptyPrompt => ValidationError::Shape {
            index,
            problem: ShapeProblem::EmptyPrompt,
        },
        QuestionError::EmptyExplanation => ValidationError::Shape {
            index,
            problem: ShapeProblem::EmptyExplanation,
        },
        _ => ValidationError::Shape {
            index,
            problem: ShapeProblem::CorrectOption,
        },
    })?;

    Ok(match entry.topic {
        Some(topic) => question.with_topic(topic),
        None => question,
    })
}

fn shape_entry(entry: &Value) -> Result<ShapedEntry, ShapeProblem> {
    let obj = entry.as_object().ok_or(ShapeProblem::NotAnObject)?;

    let id = read_id(obj).ok_or(ShapeProblem::MissingId)?;
    let prompt = non_empty_str(obj, "question").ok_or(ShapeProblem::EmptyPrompt)?;

    let raw_options = obj
        .get("options")
        .and_then(Value::as_array)
        .ok_or(ShapeProblem::OptionCount(0))?;
    if raw_options.len() != OPTION_COUNT {
        return Err(ShapeProblem::OptionCount(raw_options.len()));
    }
    let mut options: [String; OPTION_COUNT] = Default::default();
    for (slot, raw) in options.iter_mut().zip(raw_options) {
        *slot = raw.as_str().ok_or(ShapeProblem::NonTextOption)?.to_string();
    }

    let correct_option = obj
        .get("correctOption")
        .and_then(Value::as_u64)
        .filter(|i| *i < OPTION_COUNT as u64)
        .and_then(|i| u8::try_from(i).ok())
        .ok_or(ShapeProblem::CorrectOption)?;

    let explanation = non_empty_str(obj, "explanation").ok_or(ShapeProblem::EmptyExplanation)?;

    let difficulty = obj
        .get("difficulty")
        .and_then(Value::as_str)
        .and_then(|d| d.parse::<Difficulty>().ok())
        .ok_or(ShapeProblem::Difficulty)?;

    let topic = non_empty_str(obj, "topic");

    Ok(ShapedEntry {
        id,
        prompt,
        options,
        correct_option,
        explanation,
        difficulty,
        topic,
    })
}

fn read_id(obj: &Map<String, Value>) -> Option<String> {
    match obj.get("id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Slice from the first `[` to the last `]`, if both exist in that order.
fn extract_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    (start < end).then(|| &raw[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, difficulty: &str) -> Value {
        json!({
            "id": id,
            "question": format!("Question {id}"),
            "options": ["A", "B", "C", "D"],
            "correctOption": 1,
            "explanation": "Because B.",
            "difficulty": difficulty,
        })
    }

    fn valid_entries() -> Vec<Value> {
        vec![
            entry("1", "easy"),
            entry("2", "easy"),
            entry("3", "medium"),
            entry("4", "medium"),
            entry("5", "hard"),
        ]
    }

    #[test]
    fn accepts_well_formed_batch() {
        let raw = Value::Array(valid_entries()).to_string();
        let batch = parse_batch(&raw).unwrap();
        assert_eq!(batch.len(), 5);
        assert_eq!(batch.difficulty_counts(), (2, 2, 1));
        for q in batch.questions() {
            assert_eq!(q.options().len(), 4);
            assert!(q.correct_option() <= 3);
        }
    }

    #[test]
    fn tolerates_prose_and_fences_around_the_array() {
        let raw = format!(
            "Here are your questions:\n```json\n{}\n```\nGood luck!",
            Value::Array(valid_entries())
        );
        assert!(parse_batch(&raw).is_ok());
    }

    #[test]
    fn malformed_json_is_a_count_error() {
        assert_eq!(
            parse_batch("I cannot help with that").unwrap_err(),
            ValidationError::Count { found: None }
        );
        assert_eq!(
            parse_batch("[{\"id\": 1,]").unwrap_err(),
            ValidationError::Count { found: None }
        );
    }

    #[test]
    fn four_questions_is_a_count_error() {
        let mut entries = valid_entries();
        entries.pop();
        let err = validate_value(&Value::Array(entries)).unwrap_err();
        assert_eq!(err, ValidationError::Count { found: Some(4) });
    }

    #[test]
    fn shape_errors_name_the_entry() {
        let mut entries = valid_entries();
        entries[2]["options"] = json!(["A", "B", "C"]);
        let err = validate_value(&Value::Array(entries)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Shape {
                index: 2,
                problem: ShapeProblem::OptionCount(3)
            }
        );
    }

    #[test]
    fn correct_option_out_of_range_is_a_shape_error() {
        let mut entries = valid_entries();
        entries[0]["correctOption"] = json!(4);
        let err = validate_value(&Value::Array(entries)).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Shape {
                index: 0,
                problem: ShapeProblem::CorrectOption
            }
        ));
    }

    #[test]
    fn unknown_difficulty_is_a_shape_error() {
        let mut entries = valid_entries();
        entries[4]["difficulty"] = json!("expert");
        let err = validate_value(&Value::Array(entries)).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::Shape {
                index: 4,
                problem: ShapeProblem::Difficulty
            }
        ));
    }

    #[test]
    fn duplicate_options_reject_the_whole_batch() {
        let mut entries = valid_entries();
        entries[3]["options"] = json!(["A", "B", "B", "D"]);
        let err = validate_value(&Value::Array(entries)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::DuplicateOption {
                index: 3,
                option: "B".into()
            }
        );
    }

    #[test]
    fn shape_rule_runs_before_duplicate_rule() {
        let mut entries = valid_entries();
        entries[0]["options"] = json!(["A", "A", "C", "D"]);
        entries[4]["explanation"] = json!("");
        let err = validate_value(&Value::Array(entries)).unwrap_err();
        assert!(matches!(err, ValidationError::Shape { index: 4, .. }));
    }

    #[test]
    fn wrong_mix_is_a_distribution_error() {
        let mut entries = valid_entries();
        entries[4]["difficulty"] = json!("easy");
        let err = validate_value(&Value::Array(entries)).unwrap_err();
        assert_eq!(
            err,
            ValidationError::Distribution {
                easy: 3,
                medium: 2,
                hard: 0
            }
        );
    }

    #[test]
    fn numeric_ids_and_topics_are_kept() {
        let mut entries = valid_entries();
        entries[0]["id"] = json!(7);
        entries[0]["topic"] = json!("Algebra");
        let batch = validate_value(&Value::Array(entries)).unwrap();
        assert_eq!(batch.questions()[0].id().as_str(), "7");
        assert_eq!(batch.questions()[0].topic(), Some("Algebra"));
    }

    #[test]
    fn repeated_ids_fall_back_to_positions() {
        let entries: Vec<Value> = ["easy", "easy", "medium", "medium", "hard"]
            .iter()
            .map(|d| entry("1", d))
            .collect();
        let batch = validate_value(&Value::Array(entries)).unwrap();
        let ids: Vec<&str> = batch.questions().iter().map(|q| q.id().as_str()).collect();
        assert_eq!(ids, ["1", "2", "3", "4", "5"]);
    }

    #[test]
    fn distinct_ids_are_not_renumbered() {
        let mut entries = valid_entries();
        entries[0]["id"] = json!("q-9");
        let batch = validate_value(&Value::Array(entries)).unwrap();
        assert_eq!(batch.questions()[0].id().as_str(), "q-9");
        assert_eq!(batch.questions()[1].id().as_str(), "2");
    }

    #[test]
    fn prebuilt_questions_with_repeated_ids_are_rejected() {
        let mix = [
            Difficulty::Easy,
            Difficulty::Easy,
            Difficulty::Medium,
            Difficulty::Medium,
            Difficulty::Hard,
        ];
        let questions = ["1", "2", "3", "4", "1"]
            .iter()
            .zip(mix)
            .map(|(id, difficulty)| {
                Question::new(
                    QuestionId::new(*id),
                    "Prompt",
                    ["A".into(), "B".into(), "C".into(), "D".into()],
                    0,
                    "Because.",
                    difficulty,
                )
                .unwrap()
            })
            .collect();
        assert_eq!(
            validate_questions(questions).unwrap_err(),
            ValidationError::DuplicateId { id: "1".into() }
        );
    }
}
