use quiz_core::model::{
    AssessmentDefinition, AssessmentError, ChoiceOption, OptionId, Question, QuestionBody,
    QuestionId, QuizId,
};

/// A short mixed quiz used by `seed` and by `take` on an empty database.
pub fn demo_quiz(quiz_id: QuizId) -> Result<AssessmentDefinition, AssessmentError> {
    let options = |pairs: &[(u64, &str)]| {
        pairs
            .iter()
            .map(|(id, label)| ChoiceOption::new(OptionId::new(*id), *label))
            .collect::<Vec<_>>()
    };

    let questions = vec![
        Question::new(
            QuestionId::new(1),
            "Which keyword declares a mutable binding?",
            1,
            QuestionBody::SingleChoice {
                options: options(&[(11, "let mut"), (12, "var"), (13, "mut let")]),
            },
        )?,
        Question::new(
            QuestionId::new(2),
            "Which of these types are Copy?",
            2,
            QuestionBody::MultiChoice {
                options: options(&[(21, "u32"), (22, "String"), (23, "bool"), (24, "Vec<u8>")]),
            },
        )?,
        Question::new(
            QuestionId::new(3),
            "A value can have several mutable borrows at once.",
            1,
            QuestionBody::true_false(OptionId::new(31), OptionId::new(32)),
        )?,
        Question::new(
            QuestionId::new(4),
            "Name the trait used for fallible conversions.",
            1,
            QuestionBody::ShortText,
        )?,
        Question::new(
            QuestionId::new(5),
            "Explain what the borrow checker prevents.",
            4,
            QuestionBody::LongText,
        )?,
    ];

    AssessmentDefinition::new(quiz_id, "Rust Fundamentals", questions, Some(300))
}
