//! crates/sitepass_core/src/presenter.rs
//!
//! Turns a terminal check-in state into what the kiosk screen shows.

use chrono::{DateTime, Utc};

use crate::domain::BooksSigned;
use crate::machine::CheckinState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultView {
    CheckedIn {
        headline: String,
        worker_name: String,
        project_name: String,
        check_in_time: DateTime<Utc>,
        already_checked_in: bool,
        books: Vec<&'static str>,
        /// The server signed this worker's first orientation at the site.
        first_visit: bool,
        message: Option<String>,
    },
    Failed {
        message: String,
        can_retry: bool,
        /// The destructive "reset & create new passport" escape hatch.
        can_reset: bool,
    },
}

/// Presents terminal states. Everything else is still in progress and shows nothing.
pub fn present(state: &CheckinState) -> Option<ResultView> {
    match state {
        CheckinState::Success { site, result } => Some(ResultView::CheckedIn {
            headline: if result.already_checked_in {
                "Welcome back".to_string()
            } else {
                "Checked in".to_string()
            },
            worker_name: result.worker_name.clone(),
            project_name: result
                .project_name
                .clone()
                .unwrap_or_else(|| site.project_name.clone()),
            check_in_time: result.check_in_time,
            already_checked_in: result.already_checked_in,
            books: result.books_signed.map(signed_books).unwrap_or_default(),
            first_visit: result.books_signed.is_some_and(|b| b.first_visit),
            message: result.message.clone(),
        }),
        CheckinState::Error { tag_id, error, .. } => Some(ResultView::Failed {
            message: error.to_string(),
            can_retry: tag_id.is_some(),
            can_reset: true,
        }),
        _ => None,
    }
}

fn signed_books(books: BooksSigned) -> Vec<&'static str> {
    let mut signed = Vec::new();
    if books.daily_signin {
        signed.push("Daily sign-in");
    }
    if books.safety_meeting {
        signed.push("Safety meeting");
    }
    if books.site_orientation {
        signed.push("Site orientation");
    }
    signed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CheckinResult, SiteInfo};
    use crate::error::CheckinError;

    fn site() -> SiteInfo {
        SiteInfo {
            tag_id: "T1".into(),
            project_id: "proj-1".into(),
            project_name: "Tower A".into(),
            project_address: String::new(),
            location_description: String::new(),
        }
    }

    #[test]
    fn success_lists_signed_books() {
        let state = CheckinState::Success {
            site: site(),
            result: CheckinResult {
                checkin_id: "c1".into(),
                worker_name: "J. Rivera".into(),
                project_name: Some("Tower A".into()),
                check_in_time: Utc::now(),
                already_checked_in: false,
                books_signed: Some(BooksSigned {
                    daily_signin: true,
                    safety_meeting: true,
                    site_orientation: false,
                    first_visit: false,
                }),
                message: None,
            },
        };

        match present(&state) {
            Some(ResultView::CheckedIn { headline, worker_name, project_name, books, .. }) => {
                assert_eq!(headline, "Checked in");
                assert_eq!(worker_name, "J. Rivera");
                assert_eq!(project_name, "Tower A");
                assert_eq!(books, vec!["Daily sign-in", "Safety meeting"]);
            }
            other => panic!("unexpected view: {:?}", other),
        }
    }

    #[test]
    fn first_visit_is_shown_as_the_server_reported_it() {
        let result = |first_visit| CheckinResult {
            checkin_id: "c1".into(),
            worker_name: "J. Rivera".into(),
            project_name: None,
            check_in_time: Utc::now(),
            already_checked_in: false,
            books_signed: Some(BooksSigned {
                daily_signin: true,
                safety_meeting: true,
                site_orientation: true,
                first_visit,
            }),
            message: None,
        };

        for expected in [true, false] {
            let state = CheckinState::Success { site: site(), result: result(expected) };
            match present(&state) {
                Some(ResultView::CheckedIn { first_visit, project_name, .. }) => {
                    assert_eq!(first_visit, expected);
                    assert_eq!(project_name, "Tower A");
                }
                other => panic!("unexpected view: {:?}", other),
            }
        }
    }

    #[test]
    fn error_without_tag_cannot_retry() {
        let state = CheckinState::Error {
            tag_id: None,
            site: None,
            error: CheckinError::InvalidTag("no tag was read".into()),
        };
        assert_eq!(
            present(&state),
            Some(ResultView::Failed {
                message: "This tag is not linked to an active job site: no tag was read".into(),
                can_retry: false,
                can_reset: true,
            })
        );
    }

    #[test]
    fn in_progress_states_present_nothing() {
        assert_eq!(present(&CheckinState::Idle), None);
        assert_eq!(present(&CheckinState::CreatePassport { site: site() }), None);
    }
}
