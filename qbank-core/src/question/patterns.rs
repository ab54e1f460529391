use std::sync::LazyLock;

use regex::Regex;

use super::answer_index;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($re).expect(concat!("invalid pattern ", stringify!($name))));
    };
}

// page furniture: "Page 3", "第 3 页", "3 / 12", "3", "- 3 -"
pattern!(
    GARBAGE,
    r"^(?:(?i:page)\s*\d+.*|第\s*\d+\s*页.*|\d+\s*/\s*\d+|\d+|[-—]\s*\d+\s*[-—])$"
);
pattern!(
    ANSWER,
    r"(?:^|\s|[\(（【\[])(?i:答案|参考答案|正确答案|answer|ans)[\)）\]】]?[:：\s]*(?:是|为)?\s*([A-Ea-e1-4])"
);
pattern!(
    EXPLANATION_LABEL,
    r"^[\(（【\[]?(?i:解析|分析|解释|explanation|analysis)[\)）\]】]?[:：\s]*"
);
pattern!(OPTION, r"^[\(（\[【]?[A-E][\.、．\s\)）\]】:：]\s*");
pattern!(
    QUESTION_START,
    r"^(?:(?:\d+|[Qq]\d+)([\.、．\s\)）:：])|[\(（\[【]\d+[\)）\]】][\.、．\s]?)\s*"
);
pattern!(
    TRAILING_ANSWER,
    r"[\(（【\[]\s*(?:(?i:答案|参考答案|正确答案|answer|ans)\s*[:：]?)?\s*[A-E]\s*[\)）\]】]\s*$"
);
pattern!(ANSWER_REST_PREFIX, r"^[\)）\]】\.。、．:：,，;；!！\s]*");
// spreadsheet stems only lose numbering followed by punctuation or in brackets
pattern!(
    CELL_QUESTION_START,
    r"^(?:(?:\d+|[Qq]\d+)\s*([\.、．\)）:：])|[\(（\[【]\d+[\)）\]】])\s*"
);
pattern!(BARE_ANSWER_FRAGMENT, r"^(?i:答案|正确|correct)");
pattern!(
    CELL_ANSWER,
    r"^(?:(?i:答案|参考答案|正确答案|answer|ans)\s*[:：]?\s*)?([A-E](?:\s*[,，、]\s*[A-E])*)$"
);
pattern!(CELL_OPTION_MARKER, r"^[A-E][\.、．\s\)）]\s*");

pub fn is_garbage(line: &str) -> bool {
    GARBAGE.is_match(line)
}

/// Find an answer declaration, returning the option index and the text after it.
///
/// A captured letter directly followed by another ASCII letter or digit is part
/// of a word (`Answer: Because`), not an answer.
pub fn match_answer(line: &str) -> Option<(usize, &str)> {
    ANSWER.captures_iter(line).find_map(|caps| {
        let token = caps.get(1)?;
        let rest = &line[token.end()..];
        if rest.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some((answer_index(token.as_str()), rest))
    })
}

/// Text trailing an answer declaration with separators and labels removed.
pub fn answer_remainder(rest: &str) -> &str {
    let rest = ANSWER_REST_PREFIX
        .find(rest)
        .map_or(rest, |m| &rest[m.end()..]);
    strip_explanation_label(rest).unwrap_or(rest).trim()
}

/// Strip a leading explanation label, or `None` when the line has none.
pub fn strip_explanation_label(line: &str) -> Option<&str> {
    EXPLANATION_LABEL.find(line).map(|m| line[m.end()..].trim())
}

/// Strip a leading option marker, or `None` when the line is not an option.
pub fn strip_option(line: &str) -> Option<&str> {
    OPTION.find(line).map(|m| line[m.end()..].trim())
}

/// Strip leading question numbering, or `None` when the line does not start a
/// question. `3.5 kg` is a decimal, not question 3.
pub fn strip_question_number(line: &str) -> Option<&str> {
    let caps = QUESTION_START.captures(line)?;
    if let Some(sep) = caps.get(1) {
        let decimal = matches!(sep.as_str(), "." | "．")
            && line[sep.end()..].starts_with(|c: char| c.is_ascii_digit());
        if decimal {
            return None;
        }
    }
    let whole = caps.get(0)?;
    Some(line[whole.end()..].trim())
}

/// Strip `1.`, `2、`, `3)` or `(4)` numbering from a spreadsheet stem. A bare
/// leading number (`2024 was a leap year?`) is part of the stem.
pub fn strip_cell_question_number(cell: &str) -> &str {
    let Some(caps) = CELL_QUESTION_START.captures(cell) else {
        return cell;
    };
    let whole = &caps[0];
    let decimal = caps.get(1).is_some_and(|sep| {
        matches!(sep.as_str(), "." | "．")
            && cell[sep.end()..].starts_with(|c: char| c.is_ascii_digit())
    });
    if decimal {
        return cell;
    }
    cell[whole.len()..].trim()
}

pub fn is_question_start(line: &str) -> bool {
    strip_question_number(line).is_some()
}

/// Drop an inline answer marker such as `(A)` or `【答案：B】` from the end of a stem.
pub fn strip_trailing_answer(stem: &str) -> &str {
    TRAILING_ANSWER
        .find(stem)
        .map_or(stem, |m| &stem[..m.start()])
        .trim()
}

pub fn is_bare_answer_fragment(line: &str) -> bool {
    BARE_ANSWER_FRAGMENT.is_match(line)
}

/// Match a spreadsheet answer cell (`B`, `A,C`, `答案:A`), returning the letters.
pub fn cell_answer(cell: &str) -> Option<String> {
    let upper = cell.trim().to_uppercase();
    CELL_ANSWER
        .captures(&upper)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn strip_cell_option_marker(cell: &str) -> &str {
    CELL_OPTION_MARKER
        .find(cell)
        .map_or(cell, |m| &cell[m.end()..])
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage() {
        for line in ["Page 3", "page 12 of 40", "第 2 页", "3 / 12", "17", "- 4 -"] {
            assert!(is_garbage(line), "{line}");
        }
        for line in ["1. Which", "A. 3 / 4", "Pages are"] {
            assert!(!is_garbage(line), "{line}");
        }
    }

    #[test]
    fn test_answer_lines() {
        assert_eq!(match_answer("答案：B"), Some((1, "")));
        assert_eq!(match_answer("【参考答案】C 解析：略"), Some((2, " 解析：略")));
        assert_eq!(match_answer("Answer: 3"), Some((2, "")));
        assert_eq!(match_answer("(ans) D."), Some((3, ".")));
        assert_eq!(match_answer("正确答案为A"), Some((0, "")));
        assert_eq!(match_answer("答案：b"), Some((1, "")));
        assert_eq!(match_answer("Answer: c"), Some((2, "")));
        assert_eq!(match_answer("Answer: an apple"), None);
        assert_eq!(match_answer("Answer: Because it is"), None);
        assert_eq!(match_answer("The answers were mixed"), None);
        assert_eq!(match_answer("本题没有答"), None);
    }

    #[test]
    fn test_answer_remainder() {
        assert_eq!(answer_remainder(". 解析：光的散射"), "光的散射");
        assert_eq!(answer_remainder("  Because of scattering"), "Because of scattering");
        assert_eq!(answer_remainder(""), "");
        assert_eq!(answer_remainder("。"), "");
        assert_eq!(answer_remainder("！解析：略"), "略");
    }

    #[test]
    fn test_option_markers() {
        assert_eq!(strip_option("A. Blue"), Some("Blue"));
        assert_eq!(strip_option("(B) Red"), Some("Red"));
        assert_eq!(strip_option("【C】绿色"), Some("绿色"));
        assert_eq!(strip_option("D、黄色"), Some("黄色"));
        assert_eq!(strip_option("Apple"), None);
        assert_eq!(strip_option("a. lower"), None);
    }

    #[test]
    fn test_question_numbering() {
        assert_eq!(strip_question_number("1. What?"), Some("What?"));
        assert_eq!(strip_question_number("12、下列"), Some("下列"));
        assert_eq!(strip_question_number("Q3: Why"), Some("Why"));
        assert_eq!(strip_question_number("(4) How"), Some("How"));
        assert_eq!(strip_question_number("【5】哪个"), Some("哪个"));
        assert_eq!(strip_question_number("3.5 kg of sand"), None);
        assert_eq!(strip_question_number("2023年"), None);
    }

    #[test]
    fn test_cell_question_numbering() {
        assert_eq!(strip_cell_question_number("1. What color?"), "What color?");
        assert_eq!(strip_cell_question_number("12、下列"), "下列");
        assert_eq!(strip_cell_question_number("(3) Why"), "Why");
        assert_eq!(strip_cell_question_number("Q4: How"), "How");
        assert_eq!(strip_cell_question_number("2024 is a leap year?"), "2024 is a leap year?");
        assert_eq!(strip_cell_question_number("3 apples plus 4?"), "3 apples plus 4?");
        assert_eq!(strip_cell_question_number("3.14 is pi?"), "3.14 is pi?");
    }

    #[test]
    fn test_trailing_answer_stripped() {
        assert_eq!(strip_trailing_answer("Sky color? (A)"), "Sky color?");
        assert_eq!(strip_trailing_answer("天空的颜色（答案：B）"), "天空的颜色");
        assert_eq!(strip_trailing_answer("Pick (one)"), "Pick (one)");
    }

    #[test]
    fn test_cell_answers() {
        assert_eq!(cell_answer("b"), Some("B".to_string()));
        assert_eq!(cell_answer("A, C"), Some("A, C".to_string()));
        assert_eq!(cell_answer("答案:A"), Some("A".to_string()));
        assert_eq!(cell_answer("Blue"), None);
        assert_eq!(strip_cell_option_marker("A. Blue"), "Blue");
        assert_eq!(strip_cell_option_marker("Apple"), "Apple");
    }
}
