// src/utils/grade.rs

use crate::models::quiz::Quiz;

/// Shown instead of a grade that does not exist yet.
pub const NOT_YET_GRADED: &str = "Not yet graded";

/// Scales a raw attempt grade (sum of question marks) to the quiz grade.
///
/// A quiz whose questions add up to (almost) nothing scales everything to 0.
pub fn rescale_grade(raw_grade: Option<f64>, quiz: &Quiz) -> Option<f64> {
    let raw = raw_grade.filter(|g| !g.is_nan())?;

    match quiz.sumgrades {
        Some(sum) if sum >= 0.000005 => Some(raw * quiz.grade.unwrap_or(0.0) / sum),
        _ => Some(0.0),
    }
}

/// Decimal places used for per-question marks.
pub fn question_decimal_places(quiz: &Quiz) -> i64 {
    match quiz.questiondecimalpoints {
        Some(dp) if dp != -1 => dp,
        _ => quiz.decimalpoints.unwrap_or(0),
    }
}

/// Rounds `grade` to `decimals` places and drops trailing zeros.
pub fn format_grade(grade: Option<f64>, decimals: i64) -> String {
    let grade = match grade {
        Some(g) if !g.is_nan() && g != -1.0 => g,
        _ => return NOT_YET_GRADED.to_string(),
    };

    let formatted = format!("{:.*}", decimals.max(0) as usize, grade);
    if formatted.contains('.') {
        formatted.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        formatted
    }
}

/// Rescales and formats a raw grade with the quiz's decimal points.
pub fn formatted_quiz_grade(raw_grade: Option<f64>, quiz: &Quiz) -> String {
    format_grade(
        rescale_grade(raw_grade, quiz),
        quiz.decimalpoints.unwrap_or(0),
    )
}
