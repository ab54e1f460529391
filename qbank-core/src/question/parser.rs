use super::{ParsedQuestion, patterns::*};

/// An open question being accumulated line by line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub stem: String,
    pub options: Vec<String>,
    pub answer_index: usize,
    pub explanation: String,
}

impl Draft {
    fn new(stem: &str) -> Self {
        Self {
            stem: stem.to_string(),
            ..Default::default()
        }
    }

    fn into_question(self) -> Option<ParsedQuestion> {
        ParsedQuestion::new(self.stem, self.options, self.answer_index, self.explanation)
    }
}

/// Where the parser is inside the current question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ParserState {
    #[default]
    Idle,
    InStem(Draft),
    InOptions(Draft),
    InExplanation(Draft),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Stem,
    Options,
    Explanation,
}

impl Section {
    fn with(self, draft: Draft) -> ParserState {
        match self {
            Section::Stem => ParserState::InStem(draft),
            Section::Options => ParserState::InOptions(draft),
            Section::Explanation => ParserState::InExplanation(draft),
        }
    }
}

fn append(field: &mut String, separator: char, text: &str) {
    if text.is_empty() {
        return;
    }
    if !field.is_empty() {
        field.push(separator);
    }
    field.push_str(text);
}

/// Feed one line to the parser.
///
/// Returns the next state and the question closed by this line, if any.
pub fn step(state: ParserState, line: &str) -> (ParserState, Option<ParsedQuestion>) {
    let line = line.trim();
    if line.is_empty() || is_garbage(line) {
        return (state, None);
    }

    match state {
        ParserState::Idle => (start_question(line).unwrap_or_default(), None),
        ParserState::InStem(draft) => step_open(Section::Stem, draft, line),
        ParserState::InOptions(draft) => step_open(Section::Options, draft, line),
        ParserState::InExplanation(draft) => step_open(Section::Explanation, draft, line),
    }
}

fn start_question(line: &str) -> Option<ParserState> {
    let body = strip_question_number(line)?;
    // an inline answer marker on the question line is not trusted
    let stem = strip_trailing_answer(body);
    Some(ParserState::InStem(Draft::new(stem)))
}

fn step_open(
    section: Section,
    mut draft: Draft,
    line: &str,
) -> (ParserState, Option<ParsedQuestion>) {
    if let Some((index, rest)) = match_answer(line) {
        draft.answer_index = index;
        let rest = answer_remainder(rest);
        if rest.is_empty() {
            return (section.with(draft), None);
        }
        append(&mut draft.explanation, ' ', rest);
        return (ParserState::InExplanation(draft), None);
    }

    if let Some(rest) = strip_explanation_label(line) {
        append(&mut draft.explanation, ' ', rest);
        return (ParserState::InExplanation(draft), None);
    }

    if section == Section::Explanation && !is_question_start(line) {
        append(&mut draft.explanation, '\n', line);
        return (ParserState::InExplanation(draft), None);
    }

    if let Some(option) = strip_option(line) {
        draft.options.push(option.to_string());
        return (ParserState::InOptions(draft), None);
    }

    if let Some(next) = start_question(line) {
        return (next, draft.into_question());
    }

    if let Some(last) = draft.options.last_mut() {
        append(last, ' ', line);
    } else if !is_bare_answer_fragment(line) {
        append(&mut draft.stem, ' ', line);
    }
    (section.with(draft), None)
}

/// Close the parser at end of input.
pub fn finish(state: ParserState) -> Option<ParsedQuestion> {
    match state {
        ParserState::Idle => None,
        ParserState::InStem(draft)
        | ParserState::InOptions(draft)
        | ParserState::InExplanation(draft) => draft.into_question(),
    }
}

/// Parse line-oriented exam text into questions, in document order.
pub fn parse_text(text: &str) -> Vec<ParsedQuestion> {
    let (state, mut questions) = text.lines().fold(
        (ParserState::Idle, Vec::new()),
        |(state, mut questions), line| {
            let (state, emitted) = step(state, line);
            questions.extend(emitted);
            (state, questions)
        },
    );
    questions.extend(finish(state));
    questions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_formed_blocks() {
        let text = "\
1. What color is the sky?
A. Blue
B. Red
C. Green
答案：A
2. 水的化学式是
A、H2O
B、CO2
正确答案：A
3) Which planet is largest?
(A) Mars
(B) Jupiter
(C) Venus
Answer: B
";
        let questions = parse_text(text);

        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].stem, "What color is the sky?");
        assert_eq!(questions[0].options, vec!["Blue", "Red", "Green"]);
        assert_eq!(questions[0].answer_index, 0);
        assert_eq!(questions[1].stem, "水的化学式是");
        assert_eq!(questions[1].options, vec!["H2O", "CO2"]);
        assert_eq!(questions[2].stem, "Which planet is largest?");
        assert_eq!(questions[2].answer_index, 1);
        for question in &questions {
            assert!(question.options.len() >= 2);
            assert!(question.answer_index < question.options.len());
        }
    }

    #[test]
    fn test_wrapped_lines_merge() {
        let text = "\
1. A stem that wraps
onto a second line?
A. First option that
also wraps
B. Second
";
        let questions = parse_text(text);

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].stem, "A stem that wraps onto a second line?");
        assert_eq!(
            questions[0].options,
            vec!["First option that also wraps", "Second"]
        );
    }

    #[test]
    fn test_explanation_collects_until_next_question() {
        let text = "\
1. Why is the sky blue?
A. Scattering
B. Reflection
答案：A 解析：Rayleigh scattering
favours short wavelengths.
2. Next?
A. Yes
B. No
";
        let questions = parse_text(text);

        assert_eq!(questions.len(), 2);
        assert_eq!(
            questions[0].explanation,
            "Rayleigh scattering\nfavours short wavelengths."
        );
        assert_eq!(questions[1].stem, "Next?");
        assert_eq!(questions[1].explanation, "");
    }

    #[test]
    fn test_explanation_label_line() {
        let text = "\
Q1: 1 + 1 = ?
A. 1
B. 2
Answer: B
【解析】 One plus one
is two.
";
        let questions = parse_text(text);

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].answer_index, 1);
        assert_eq!(questions[0].explanation, "One plus one\nis two.");
    }

    #[test]
    fn test_inline_answer_is_discarded() {
        let text = "\
1. Sky color? (B)
A. Blue
B. Red
";
        let questions = parse_text(text);

        assert_eq!(questions[0].stem, "Sky color?");
        assert_eq!(questions[0].answer_index, 0);
    }

    #[test]
    fn test_garbage_and_incomplete_questions() {
        let text = "\
Page 1
1. Only one option
A. Lonely
- 2 -
2. Two options
A. Yes
B. No
3 / 10
";
        let questions = parse_text(text);

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].stem, "Two options");
        assert_eq!(questions[0].options, vec!["Yes", "No"]);
    }

    #[test]
    fn test_lowercase_answer_letter() {
        let text = "\
1. Sky?
A. Blue
B. Red
答案：b
2. Sea?
A. Green
B. Blue
C. Red
Answer: c
";
        let questions = parse_text(text);

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].options, vec!["Blue", "Red"]);
        assert_eq!(questions[0].answer_index, 1);
        assert_eq!(questions[1].options, vec!["Green", "Blue", "Red"]);
        assert_eq!(questions[1].answer_index, 2);
    }

    #[test]
    fn test_answer_with_full_stop_opens_no_explanation() {
        let (state, _) = step(ParserState::Idle, "1. Sky?");
        let (state, _) = step(state, "A. Blue");
        let (state, _) = step(state, "B. Red");
        let (state, _) = step(state, "答案：B。");

        assert!(matches!(state, ParserState::InOptions(_)));
        let questions = parse_text("1. Sky?\nA. Blue\nB. Red\n答案：B。\n");
        assert_eq!(questions[0].answer_index, 1);
        assert_eq!(questions[0].explanation, "");
    }

    #[test]
    fn test_no_questions() {
        assert!(parse_text("just some prose\nwithout numbering").is_empty());
        assert!(parse_text("").is_empty());
    }

    #[test]
    fn test_bare_answer_fragment_not_in_stem() {
        let (state, _) = step(ParserState::Idle, "1. Stem");
        let (state, _) = step(state, "正确的是哪个");

        assert_eq!(state, ParserState::InStem(Draft::new("Stem")));
    }

    #[test]
    fn test_step_transitions() {
        let (state, emitted) = step(ParserState::Idle, "stray text");
        assert_eq!(state, ParserState::Idle);
        assert!(emitted.is_none());

        let (state, _) = step(state, "1. Stem");
        assert!(matches!(state, ParserState::InStem(_)));
        let (state, _) = step(state, "A. one");
        let (state, _) = step(state, "B. two");
        assert!(matches!(state, ParserState::InOptions(_)));
        let (state, _) = step(state, "答案：B");
        assert!(matches!(state, ParserState::InOptions(_)));
        let (state, _) = step(state, "解析：because");
        assert!(matches!(state, ParserState::InExplanation(_)));

        let (state, emitted) = step(state, "2. Next");
        let emitted = emitted.expect("first question closes");
        assert_eq!(emitted.answer_index, 1);
        assert_eq!(emitted.explanation, "because");
        assert_eq!(state, ParserState::InStem(Draft::new("Next")));
    }

    #[test]
    fn test_empty_stem_filled_by_continuation() {
        let text = "\
1.
Which one?
A. x
B. y
";
        let questions = parse_text(text);

        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].stem, "Which one?");
    }
}
