// src/services/review.rs

//! Who may review an attempt, and what they get to see.
//!
//! Everything here is a pure function of the quiz settings, the viewer's
//! capabilities, the attempt and the current time, except for the group
//! lookup needed when reviewing somebody else's attempt.

use crate::{
    models::{
        access::AccessInformation,
        attempt::{Attempt, AttemptState},
        display::{
            DisplayOptions, DisplayState, IMMEDIATELY_AFTER_PERIOD, MarksVisibility, Visibility,
        },
        quiz::Quiz,
    },
    site::groups::GroupProvider,
    utils::{grade::question_decimal_places, time::user_date},
};

/// Temporal phase of `attempt` at `now`.
///
/// The order of the checks matters: an attempt still in progress is
/// `During` even after the quiz closed, and a closed quiz wins over the
/// grace period after finishing.
pub fn attempt_state_display_option(quiz: &Quiz, attempt: &Attempt, now: i64) -> DisplayState {
    if attempt.state == AttemptState::InProgress {
        DisplayState::During
    } else if quiz.timeclose != 0 && now >= quiz.timeclose {
        DisplayState::AfterClose
    } else if now < attempt.timefinish + IMMEDIATELY_AFTER_PERIOD {
        DisplayState::ImmediatelyAfter
    } else {
        DisplayState::LaterWhileOpen
    }
}

fn visibility(setting: Option<i64>, state: DisplayState) -> Visibility {
    if state.is_set_in(setting) {
        Visibility::Visible
    } else {
        Visibility::Hidden
    }
}

/// Review options of `quiz` for an attempt in `state`.
pub fn display_options_for_quiz(quiz: &Quiz, state: DisplayState) -> DisplayOptions {
    let marks = if state.is_set_in(quiz.reviewmarks) {
        MarksVisibility::MarkAndMax
    } else {
        MarksVisibility::MaxOnly
    };
    // A defined max marks setting without the bit hides marks altogether.
    let marks = match quiz.reviewmaxmarks {
        Some(_) if !state.is_set_in(quiz.reviewmaxmarks) => MarksVisibility::Hidden,
        _ => marks,
    };

    DisplayOptions {
        attempt: state.is_set_in(quiz.reviewattempt),
        correctness: visibility(quiz.reviewcorrectness, state),
        marks,
        feedback: visibility(quiz.reviewspecificfeedback, state),
        general_feedback: visibility(quiz.reviewgeneralfeedback, state),
        right_answer: visibility(quiz.reviewrightanswer, state),
        overall_feedback: visibility(quiz.reviewoverallfeedback, state),
        num_parts_correct: visibility(quiz.reviewspecificfeedback, state),
        manual_comment: visibility(quiz.reviewspecificfeedback, state),
        mark_dp: question_decimal_places(quiz),
    }
}

/// Whether the viewer holds a capability that lets them review `attempt` at all.
pub fn has_review_capability_for_attempt(
    quiz: &Quiz,
    access_info: &AccessInformation,
    attempt: &Attempt,
    now: i64,
) -> bool {
    if access_info.canviewreports || access_info.canpreview {
        return true;
    }

    if attempt_state_display_option(quiz, attempt, now) == DisplayState::ImmediatelyAfter {
        access_info.canattempt
    } else {
        access_info.canreviewmyattempts
    }
}

/// Whether the viewer may review an attempt that belongs to another user.
///
/// Requires report access and, under separate groups, a shared group with
/// the attempt's owner. If the groups cannot be resolved the answer is no.
pub async fn can_review_other_user_attempt(
    quiz: &Quiz,
    access_info: &AccessInformation,
    attempt: &Attempt,
    groups: &dyn GroupProvider,
) -> bool {
    if !access_info.canviewreports {
        return false;
    }

    let info = match groups.activity_group_info(quiz.coursemodule).await {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(
                "Denying review of attempt {}: group info unavailable: {}",
                attempt.id,
                e
            );
            return false;
        }
    };

    if info.can_access_all_groups || !info.separate_groups {
        return true;
    }

    let owner_groups = match groups.user_groups_in_course(quiz.course, attempt.userid).await {
        Ok(owner_groups) => owner_groups,
        Err(e) => {
            tracing::warn!(
                "Denying review of attempt {}: groups of user {} unavailable: {}",
                attempt.id,
                attempt.userid,
                e
            );
            return false;
        }
    };

    owner_groups
        .iter()
        .any(|owner_group| info.groups.iter().any(|g| g.id == owner_group.id))
}

/// Whether `viewer_user_id` may review `attempt` at `now`.
pub async fn can_review_attempt(
    quiz: &Quiz,
    access_info: &AccessInformation,
    attempt: &Attempt,
    viewer_user_id: i64,
    now: i64,
    groups: &dyn GroupProvider,
) -> bool {
    if quiz.reviewattempt.is_none() {
        // Sites that do not send review settings check on the review call itself.
        return true;
    }

    if !has_review_capability_for_attempt(quiz, access_info, attempt, now) {
        return false;
    }

    if attempt.userid != viewer_user_id {
        return can_review_other_user_attempt(quiz, access_info, attempt, groups).await;
    }

    if !attempt.is_completed() {
        return false;
    }

    // Own previews are always reviewable by those who can preview.
    if attempt.preview && access_info.canpreview {
        return true;
    }

    // Report viewers see everything, except on previews.
    if !attempt.preview && access_info.canviewreports {
        return true;
    }

    let state = attempt_state_display_option(quiz, attempt, now);
    display_options_for_quiz(quiz, state).attempt
}

/// Explains why an attempt cannot be reviewed, or when it will be.
/// Empty while the attempt is in progress.
pub fn cannot_review_message(quiz: &Quiz, attempt: &Attempt, short: bool, now: i64) -> String {
    let state = attempt_state_display_option(quiz, attempt, now);

    let review_from = match state {
        DisplayState::During => return String::new(),
        DisplayState::ImmediatelyAfter
            if DisplayState::LaterWhileOpen.is_set_in(quiz.reviewattempt) =>
        {
            Some(attempt.timefinish + IMMEDIATELY_AFTER_PERIOD)
        }
        DisplayState::ImmediatelyAfter | DisplayState::LaterWhileOpen
            if quiz.timeclose != 0 && DisplayState::AfterClose.is_set_in(quiz.reviewattempt) =>
        {
            Some(quiz.timeclose)
        }
        _ => None,
    };

    match (review_from, short) {
        (Some(from), false) => format!(
            "You are not allowed to review this quiz until {}.",
            user_date(from, false)
        ),
        (Some(from), true) => format!("Available {}", user_date(from, true)),
        (None, false) => "You are not able to review this quiz attempt.".to_string(),
        (None, true) => "Not permitted".to_string(),
    }
}
