mod common;

use common::{clean_file, CommitMode, FakeBackend};
use student_import::models::{CommitBlockReason, CompleteSelection};
use student_import::services::ImportFilePreparer;
use student_import::AppError;

fn selection(class_id: i64) -> CompleteSelection {
    CompleteSelection {
        level_id: 1,
        grade_id: 3,
        class_id,
        academic_year_id: 2024,
    }
}

#[tokio::test]
async fn test_preview_for_other_structure_does_not_authorize() {
    let backend = FakeBackend::new(CommitMode::Synchronous);
    let mut preparer = ImportFilePreparer::new(backend.clone());
    preparer.select_file(clean_file(3)).unwrap();

    preparer.preview(&selection(7)).await.unwrap();
    assert!(preparer.can_commit(&selection(7)));
    assert!(!preparer.can_commit(&selection(9)));
    assert!(matches!(
        preparer.authorize_commit(&selection(9)),
        Err(AppError::CommitBlocked {
            reason: CommitBlockReason::StalePreview
        })
    ));

    preparer.preview(&selection(9)).await.unwrap();
    assert!(preparer.can_commit(&selection(9)));
    assert!(!preparer.can_commit(&selection(7)));
    assert_eq!(FakeBackend::count(&backend.preview_calls), 2);
}

#[tokio::test]
async fn test_new_file_discards_preview() {
    let backend = FakeBackend::new(CommitMode::Synchronous);
    let mut preparer = ImportFilePreparer::new(backend);
    preparer.select_file(clean_file(3)).unwrap();
    preparer.preview(&selection(7)).await.unwrap();

    preparer.select_file(clean_file(4)).unwrap();
    assert!(preparer.preview_result().is_none());
    assert!(matches!(
        preparer.authorize_commit(&selection(7)),
        Err(AppError::CommitBlocked {
            reason: CommitBlockReason::NotPreviewed
        })
    ));
}
