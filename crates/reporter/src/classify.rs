//! Error clustering (spec §4.8): group `RowError`s by `ErrorCode` and
//! attach the one-line suggestion `ErrorCode::suggestion` already carries
//! for the known classes (missing reference, missing user/team, duplicate,
//! permission, required field).

use model::{ErrorCode, RowError};
use std::collections::HashMap;

pub struct ErrorClass {
    pub code: ErrorCode,
    pub count: usize,
    pub suggestion: Option<&'static str>,
}

/// Returns classes sorted by descending frequency.
pub fn classify(errors: &[RowError]) -> Vec<ErrorClass> {
    let mut counts: HashMap<ErrorCode, usize> = HashMap::new();
    for error in errors {
        *counts.entry(error.error_code).or_insert(0) += 1;
    }

    let mut classes: Vec<ErrorClass> = counts
        .into_iter()
        .map(|(code, count)| ErrorClass {
            code,
            count,
            suggestion: code.suggestion(),
        })
        .collect();
    classes.sort_by(|a, b| b.count.cmp(&a.count).then(format!("{:?}", a.code).cmp(&format!("{:?}", b.code))));
    classes
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::batch::RowRef;

    fn error(code: ErrorCode) -> RowError {
        RowError {
            row_ref: RowRef::Row(0),
            entity: "account".to_string(),
            field: None,
            error_code: code,
            message: "boom".to_string(),
            record_id: None,
        }
    }

    #[test]
    fn classify_groups_and_orders_by_count() {
        let errors = vec![
            error(ErrorCode::MissingReference),
            error(ErrorCode::MissingReference),
            error(ErrorCode::Duplicate),
        ];
        let classes = classify(&errors);
        assert_eq!(classes[0].code, ErrorCode::MissingReference);
        assert_eq!(classes[0].count, 2);
        assert!(classes[0].suggestion.is_some());
        assert_eq!(classes[1].code, ErrorCode::Duplicate);
        assert_eq!(classes[1].count, 1);
    }

    #[test]
    fn classify_handles_unknown_classes_without_suggestion() {
        let errors = vec![error(ErrorCode::Fatal)];
        let classes = classify(&errors);
        assert_eq!(classes.len(), 1);
        assert!(classes[0].suggestion.is_none());
    }
}
