mod common;

use std::sync::Arc;

use common::{MockBackend, PASSWORD, USERNAME};
use teamdir_core::storage::MemoryStore;
use teamdir_core::{ApiError, MemberRole, NewTeamMember, Session, ValidationErrors};

async fn signed_in() -> (Arc<MockBackend>, Session) {
    let mock = MockBackend::new();
    let base = common::spawn(mock.clone()).await;
    let mut session = common::session(&base, Arc::new(MemoryStore::new()));
    session.sign_in(USERNAME, PASSWORD).await.unwrap();
    (mock, session)
}

fn jane() -> NewTeamMember {
    NewTeamMember {
        first_name: "Jane".to_string(),
        last_name: "Roe".to_string(),
        phone_number: "5551234567".to_string(),
        email: "jane@example.com".to_string(),
        role: MemberRole::Regular,
    }
}

#[tokio::test]
async fn create_update_and_delete_member() {
    let (mock, mut session) = signed_in().await;

    let created = session.add_team_member(&jane()).await.unwrap();
    assert_eq!(created.id, 2);
    assert_eq!(created.full_name(), "Jane Roe");

    let mut changes = created.to_draft();
    changes.role = MemberRole::Admin;
    changes.phone_number = "5559876543".to_string();
    let updated = session.update_team_member(created.id, &changes).await.unwrap();
    assert!(updated.is_admin());
    assert_eq!(updated.phone_number, "5559876543");

    let fetched = session.team_member(created.id).await.unwrap();
    assert_eq!(fetched, updated);

    session.delete_team_member(created.id).await.unwrap();
    assert_eq!(session.team_members().await.unwrap().len(), 1);

    let methods: Vec<String> = mock
        .requests_to("/api/team-members/2/")
        .into_iter()
        .map(|r| r.method)
        .collect();
    assert_eq!(methods, vec!["PUT", "GET", "DELETE"]);
}

#[tokio::test]
async fn missing_member_is_a_named_failure() {
    let (_mock, mut session) = signed_in().await;

    let err = session.team_member(99).await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to fetch team member");
    assert!(err
        .chain()
        .any(|c| matches!(c.downcast_ref::<ApiError>(), Some(ApiError::NotFound(_)))));
    // Not an auth problem, so the user stays signed in
    assert!(session.is_signed_in());

    let err = session.delete_team_member(99).await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to delete team member");
}

#[tokio::test]
async fn invalid_member_is_never_sent() {
    let (mock, mut session) = signed_in().await;
    let before = mock.total_requests();

    let mut bad = jane();
    bad.email = "jane-at-example".to_string();
    bad.phone_number = "123".to_string();

    let err = session.add_team_member(&bad).await.unwrap_err();
    let errors = err.downcast_ref::<ValidationErrors>().unwrap();
    assert_eq!(errors.get("email"), Some("Invalid email address"));
    assert_eq!(errors.get("phone_number"), Some("Invalid phone number"));

    let err = session.update_team_member(1, &bad).await.unwrap_err();
    assert!(err.downcast_ref::<ValidationErrors>().is_some());

    assert_eq!(mock.total_requests(), before);
}
