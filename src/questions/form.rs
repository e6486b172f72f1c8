//! Dynamic security questions form.
//!
//! The form is rebuilt on every request: one slot per configured question,
//! each slot made of a question selector, a free-text override used by
//! "other" questions, and the answer itself. Field names follow the
//! `question_{i}`, `q_other_{i}` and `answer_{i}` pattern so submissions can
//! be posted as a flat url-encoded body.

use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use super::models::{AnswerSubmission, SecurityAnswer, SecurityQuestion};

/// Value of the "not selected" entry at the top of every selector.
pub const NOT_SELECTED: i64 = -1;

pub const FIELD_REQUIRED: &str = "This field is required.";
pub const NO_ANSWERS: &str = "Must submit at least one security answer.";

/// Key used for errors that belong to the form rather than to a field.
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Flat `name -> value` map, used both for submissions and initial data.
pub type FormData = HashMap<String, String>;

/// One entry of a question selector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuestionChoice {
    pub id: i64,
    pub label: String,
    pub is_other: bool,
}

impl From<&SecurityQuestion> for QuestionChoice {
    fn from(question: &SecurityQuestion) -> Self {
        Self {
            id: question.id,
            label: question.question.clone(),
            is_other: question.is_other,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Question,
    Other,
    Answer,
}

impl FieldKind {
    const fn prefix(self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Other => "q_other",
            Self::Answer => "answer",
        }
    }
}

/// Rendering-facing description of a generated field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
}

/// A question/override/answer triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    index: usize,
    required: bool,
}

impl Slot {
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Slots are required once the user already stored an answer for them.
    #[must_use]
    pub const fn required(&self) -> bool {
        self.required
    }

    #[must_use]
    pub fn field_name(&self, kind: FieldKind) -> String {
        format!("{}_{}", kind.prefix(), self.index)
    }

    #[must_use]
    pub fn question_label(&self) -> String {
        format!("Question {}", self.index + 1)
    }

    /// The "not selected" entry shown first in this slot's selector.
    #[must_use]
    pub fn sentinel(&self) -> QuestionChoice {
        QuestionChoice {
            id: NOT_SELECTED,
            label: format!("Select a question #{} ...", self.index + 1),
            is_other: false,
        }
    }

    #[must_use]
    pub fn fields(&self) -> [Field; 3] {
        [
            Field {
                name: self.field_name(FieldKind::Question),
                label: self.question_label(),
                kind: FieldKind::Question,
                required: self.required,
            },
            Field {
                name: self.field_name(FieldKind::Other),
                label: "Custom Question".to_string(),
                kind: FieldKind::Other,
                required: false,
            },
            Field {
                name: self.field_name(FieldKind::Answer),
                label: "Answer".to_string(),
                kind: FieldKind::Answer,
                required: false,
            },
        ]
    }
}

/// Validation messages keyed by field name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.fields.get(field).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn non_field(&self) -> &[String] {
        self.get(NON_FIELD_ERRORS)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields carrying at least one message.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} field(s) failed validation", self.fields.len())
    }
}

impl std::error::Error for FormErrors {}

#[derive(Clone, Debug, PartialEq, Eq)]
struct CleanedSlot {
    index: usize,
    question_id: i64,
    is_other: bool,
    question_other: String,
    answer: String,
}

/// Result of a successful validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedAnswers {
    selected: Vec<CleanedSlot>,
}

impl ValidatedAnswers {
    /// Accepted triples for every slot where a question was selected, in slot order.
    pub fn answers(&self) -> impl Iterator<Item = AnswerSubmission> + '_ {
        self.selected.iter().map(|slot| AnswerSubmission {
            question_id: slot.question_id,
            question_other: slot.question_other.clone(),
            answer: slot.answer.clone(),
        })
    }

    /// Slot indexes that produced an answer.
    pub fn slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.selected.iter().map(|slot| slot.index)
    }
}

#[derive(Clone, Debug)]
pub struct SecurityQuestionsForm {
    choices: Vec<QuestionChoice>,
    slots: Vec<Slot>,
    initial: FormData,
}

impl SecurityQuestionsForm {
    /// Build the form for `slot_count` slots.
    ///
    /// Inactive questions are dropped from the choices. Without any active
    /// question there is nothing to choose from, so no slot is generated.
    #[must_use]
    pub fn new(questions: &[SecurityQuestion], slot_count: usize, initial: FormData) -> Self {
        let choices: Vec<QuestionChoice> = questions
            .iter()
            .filter(|question| question.is_active)
            .map(QuestionChoice::from)
            .collect();

        let slots = if choices.is_empty() {
            Vec::new()
        } else {
            (0..slot_count)
                .map(|index| {
                    let mut slot = Slot {
                        index,
                        required: false,
                    };
                    slot.required = initial.contains_key(&slot.field_name(FieldKind::Question));
                    slot
                })
                .collect()
        };

        Self {
            choices,
            slots,
            initial,
        }
    }

    #[must_use]
    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Active question choices, without the per-slot sentinel.
    #[must_use]
    pub fn choices(&self) -> &[QuestionChoice] {
        &self.choices
    }

    /// Sentinel followed by the active questions, as offered by `slot`.
    #[must_use]
    pub fn slot_choices(&self, slot: &Slot) -> Vec<QuestionChoice> {
        std::iter::once(slot.sentinel())
            .chain(self.choices.iter().cloned())
            .collect()
    }

    /// Every generated field, three per slot.
    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        self.slots.iter().flat_map(Slot::fields).collect()
    }

    #[must_use]
    pub fn initial(&self) -> &FormData {
        &self.initial
    }

    #[must_use]
    pub fn initial_value(&self, name: &str) -> Option<&str> {
        self.initial.get(name).map(String::as_str)
    }

    /// Clean and validate a submission.
    ///
    /// # Errors
    /// Returns every per-field message when the submission is not acceptable.
    pub fn validate(&self, data: &FormData) -> Result<ValidatedAnswers, FormErrors> {
        let mut errors = FormErrors::default();
        let mut selected = Vec::new();

        for slot in &self.slots {
            match self.clean_question(slot, data) {
                Ok(Some(choice)) => selected.push(CleanedSlot {
                    index: slot.index,
                    question_id: choice.id,
                    is_other: choice.is_other,
                    question_other: clean_text(data, &slot.field_name(FieldKind::Other)),
                    answer: clean_text(data, &slot.field_name(FieldKind::Answer)),
                }),
                Ok(None) => {}
                Err(message) => errors.add(slot.field_name(FieldKind::Question), message),
            }
        }

        for cleaned in &selected {
            if cleaned.answer.is_empty() {
                errors.add(format!("answer_{}", cleaned.index), FIELD_REQUIRED);
            }
            if cleaned.is_other && cleaned.question_other.is_empty() {
                errors.add(format!("q_other_{}", cleaned.index), FIELD_REQUIRED);
            }
        }

        if selected.is_empty() {
            match self.slots.first() {
                Some(slot) => errors.add(slot.field_name(FieldKind::Question), NO_ANSWERS),
                None => errors.add(NON_FIELD_ERRORS, NO_ANSWERS),
            }
        }

        if errors.is_empty() {
            Ok(ValidatedAnswers { selected })
        } else {
            Err(errors)
        }
    }

    /// `Ok(None)` means the slot was left on the sentinel (or blank and optional).
    fn clean_question(&self, slot: &Slot, data: &FormData) -> Result<Option<&QuestionChoice>, String> {
        let raw = clean_text(data, &slot.field_name(FieldKind::Question));

        if raw.is_empty() {
            return if slot.required {
                Err(FIELD_REQUIRED.to_string())
            } else {
                Ok(None)
            };
        }

        let invalid =
            || format!("Select a valid choice. {raw} is not one of the available choices.");

        let id = raw.parse::<i64>().map_err(|_| invalid())?;
        if id == NOT_SELECTED {
            return Ok(None);
        }

        self.choices
            .iter()
            .find(|choice| choice.id == id)
            .map(Some)
            .ok_or_else(invalid)
    }
}

fn clean_text(data: &FormData, name: &str) -> String {
    data.get(name)
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

/// Initial form data from the answers a user already stored.
///
/// Answer texts are never sent back to the browser.
#[must_use]
pub fn initial_from_answers(answers: &[SecurityAnswer]) -> FormData {
    let mut initial = FormData::new();
    for (index, answer) in answers.iter().enumerate() {
        initial.insert(format!("question_{index}"), answer.question_id.to_string());
        if let Some(other) = answer
            .question_other
            .as_deref()
            .filter(|other| !other.is_empty())
        {
            initial.insert(format!("q_other_{index}"), other.to_string());
        }
    }
    initial
}
