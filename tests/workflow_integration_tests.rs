use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;
use wrytix::{
    AppError,
    ads,
    audit::{AuditLog, LogQuery, action},
    auth::AuthUser,
    models::{
        Ad, AdKind, CreateAdRequest, CreateDeletionRequest, CreateSubmissionRequest, CreateUserRequest,
        PendingDeletion, PendingUser, Post, PostSubmission, RegisterRequest, Role, SubmissionStatus,
        UpdateSubmissionRequest, User, UserStatus,
    },
    repository::Repository,
    storage::{Collection, MemoryStore, StoreState},
    workflow::{
        accounts::{self, LoginOutcome},
        deletion, registration,
        submission::{self, SubmissionOutcome},
    },
};

// --- TEST UTILITIES ---

const BCRYPT_COST: u32 = 4;

fn memory_repo() -> Repository {
    Repository::new(Arc::new(MemoryStore::new()) as StoreState)
}

fn actor(username: &str, role: Role) -> AuthUser {
    AuthUser {
        id: Uuid::new_v4(),
        username: username.to_string(),
        role,
    }
}

fn registration(username: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: format!("{username}@wrytix.test"),
        password: "secret-password".to_string(),
        role: Some(Role::Author),
        ..RegisterRequest::default()
    }
}

async fn create_user(repo: &Repository, username: &str, role: Role) -> User {
    accounts::create_user(
        repo,
        CreateUserRequest {
            username: username.to_string(),
            email: format!("{username}@wrytix.test"),
            password: "secret-password".to_string(),
            role,
            ..CreateUserRequest::default()
        },
        BCRYPT_COST,
    )
    .await
    .expect("user created")
}

fn submission_request(slug: &str) -> CreateSubmissionRequest {
    CreateSubmissionRequest {
        slug: slug.to_string(),
        title: format!("Story {slug}"),
        content: "Once upon a time".to_string(),
        category: "fiction".to_string(),
        ..CreateSubmissionRequest::default()
    }
}

// --- REGISTRATION ---

#[tokio::test]
async fn test_approval_moves_pending_user_into_users() {
    let repo = memory_repo();
    let admin = actor("root", Role::Admin);
    let pending = registration::register(&repo, registration("alice"), BCRYPT_COST)
        .await
        .unwrap();

    let user = registration::approve(&repo, pending.id, &admin).await.unwrap();

    assert_eq!(user.username, "alice");
    assert_eq!(user.status, UserStatus::Active);
    assert_eq!(user.approved_by.as_deref(), Some("root"));
    assert!(repo.find::<PendingUser>(&pending.id.to_string()).await.unwrap().is_none());
    assert_eq!(repo.all::<User>().await.unwrap().len(), 1);

    // The approved account can log in with the password chosen at registration.
    let outcome = accounts::authenticate(&repo, "alice", "secret-password").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::Success(_)));
}

#[tokio::test]
async fn test_approval_conflict_leaves_pending_user_in_place() {
    let repo = memory_repo();
    let admin = actor("root", Role::Admin);
    let pending = registration::register(&repo, registration("bob"), BCRYPT_COST)
        .await
        .unwrap();

    // An account with the same username lands in the user collection directly,
    // the way a concurrent approval of another registration would.
    let rival = User {
        id: Uuid::new_v4(),
        username: "bob".to_string(),
        email: "someone-else@wrytix.test".to_string(),
        password_hash: "hash".to_string(),
        role: Role::Editor,
        status: UserStatus::Active,
        created_at: Utc::now(),
        ..User::default()
    };
    repo.transaction(&[Collection::Users], |tx| tx.insert(&rival))
        .await
        .unwrap();

    let result = registration::approve(&repo, pending.id, &admin).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(repo.find::<PendingUser>(&pending.id.to_string()).await.unwrap().is_some());
    assert_eq!(repo.all::<User>().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_admin_role() {
    let repo = memory_repo();
    registration::register(&repo, registration("carol"), BCRYPT_COST)
        .await
        .unwrap();

    let mut same_email = registration("caroline");
    same_email.email = "CAROL@wrytix.test".to_string();
    let result = registration::register(&repo, same_email, BCRYPT_COST).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    let mut admin_role = registration("dave");
    admin_role.role = Some(Role::Admin);
    let result = registration::register(&repo, admin_role, BCRYPT_COST).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let mut missing = registration("erin");
    missing.password = String::new();
    let result = registration::register(&repo, missing, BCRYPT_COST).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    assert!(!registration::username_available(&repo, "carol").await.unwrap());
    assert!(registration::email_available(&repo, "new@wrytix.test").await.unwrap());
}

#[tokio::test]
async fn test_login_refuses_inactive_accounts() {
    let repo = memory_repo();
    let user = create_user(&repo, "frank", Role::Author).await;
    accounts::update_user(
        &repo,
        user.id,
        wrytix::models::UpdateUserRequest {
            status: Some(UserStatus::Suspended),
            ..Default::default()
        },
        BCRYPT_COST,
    )
    .await
    .unwrap();

    let outcome = accounts::authenticate(&repo, "frank", "secret-password").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::Inactive(UserStatus::Suspended)));

    let outcome = accounts::authenticate(&repo, "nobody", "x").await.unwrap();
    assert!(matches!(outcome, LoginOutcome::UnknownUser));
}

// --- DELETION REQUESTS ---

#[tokio::test]
async fn test_deletion_request_snapshots_target() {
    let repo = memory_repo();
    let editor = actor("ed", Role::Editor);
    let target = create_user(&repo, "gina", Role::Author).await;

    let request = deletion::request(
        &repo,
        &editor,
        CreateDeletionRequest {
            user_id: target.id,
            reason: "Spam".to_string(),
        },
    )
    .await
    .unwrap();

    assert_eq!(request.target_username, "gina");
    assert_eq!(request.target_role, Role::Author);
    assert_eq!(request.requested_by, "ed");

    let second = deletion::request(
        &repo,
        &editor,
        CreateDeletionRequest {
            user_id: target.id,
            reason: "Again".to_string(),
        },
    )
    .await;
    assert!(matches!(second, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_deletion_approval_is_all_or_nothing() {
    let repo = memory_repo();
    let editor = actor("ed", Role::Editor);
    let target = create_user(&repo, "hank", Role::Author).await;
    let request = deletion::request(
        &repo,
        &editor,
        CreateDeletionRequest {
            user_id: target.id,
            reason: "Left the team".to_string(),
        },
    )
    .await
    .unwrap();

    let (approved, deleted) = deletion::approve(&repo, request.id).await.unwrap();
    assert_eq!(approved.id, request.id);
    assert_eq!(deleted.id, target.id);
    assert!(repo.all::<User>().await.unwrap().is_empty());
    assert!(deletion::list(&repo).await.unwrap().is_empty());

    // A second approval of the same request finds nothing.
    let again = deletion::approve(&repo, request.id).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_deletion_approval_for_vanished_user_keeps_request() {
    let repo = memory_repo();
    let editor = actor("ed", Role::Editor);
    let target = create_user(&repo, "ivy", Role::Author).await;
    let request = deletion::request(
        &repo,
        &editor,
        CreateDeletionRequest {
            user_id: target.id,
            reason: "Inactive".to_string(),
        },
    )
    .await
    .unwrap();

    // Remove the user behind the workflow's back.
    repo.transaction(&[Collection::Users], |tx| tx.remove::<User>(&target.id.to_string()))
        .await
        .unwrap();

    let result = deletion::approve(&repo, request.id).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(repo.find::<PendingDeletion>(&request.id.to_string()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_only_requester_or_admin_may_cancel() {
    let repo = memory_repo();
    let requester = actor("ed", Role::Editor);
    let other_editor = actor("eve", Role::Editor);
    let admin = actor("root", Role::Admin);
    let target = create_user(&repo, "jack", Role::Author).await;
    let request = deletion::request(
        &repo,
        &requester,
        CreateDeletionRequest {
            user_id: target.id,
            reason: "Duplicate account".to_string(),
        },
    )
    .await
    .unwrap();

    let result = deletion::cancel(&repo, request.id, &other_editor).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert_eq!(deletion::list(&repo).await.unwrap().len(), 1);

    let cancelled = deletion::cancel(&repo, request.id, &admin).await.unwrap();
    assert_eq!(cancelled.id, request.id);
    assert!(deletion::list(&repo).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_ownership_follows_account_not_username() {
    let repo = memory_repo();
    let requester = actor("ed", Role::Editor);
    let target = create_user(&repo, "lena", Role::Author).await;
    let request = deletion::request(
        &repo,
        &requester,
        CreateDeletionRequest {
            user_id: target.id,
            reason: "Bounced email".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(request.requested_by_id, requester.id);

    // A different account that reuses the requester's username.
    let namesake = actor("ed", Role::Editor);
    let result = deletion::cancel(&repo, request.id, &namesake).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    // The requester still owns the request after being renamed.
    let renamed = AuthUser {
        username: "edward".to_string(),
        ..requester.clone()
    };
    let cancelled = deletion::cancel(&repo, request.id, &renamed).await.unwrap();
    assert_eq!(cancelled.requested_by, "ed");
    assert!(deletion::list(&repo).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_user_cascades_their_requests() {
    let repo = memory_repo();
    let editor = actor("ed", Role::Editor);
    let target = create_user(&repo, "kim", Role::Author).await;
    deletion::request(
        &repo,
        &editor,
        CreateDeletionRequest {
            user_id: target.id,
            reason: "Gone".to_string(),
        },
    )
    .await
    .unwrap();

    accounts::delete_user(&repo, target.id).await.unwrap();

    assert!(deletion::list(&repo).await.unwrap().is_empty());
}

// --- SUBMISSIONS ---

#[tokio::test]
async fn test_submission_approval_publishes_post() {
    let repo = memory_repo();
    let author = actor("anna", Role::Author);
    let editor = actor("ed", Role::Editor);
    let submitted = submission::submit(&repo, &author, submission_request("a-1")).await.unwrap();

    let outcome = submission::update(
        &repo,
        submitted.id,
        &editor,
        UpdateSubmissionRequest {
            status: Some(SubmissionStatus::Approved),
            ..UpdateSubmissionRequest::default()
        },
    )
    .await
    .unwrap();

    let SubmissionOutcome::Approved { post, submission } = outcome else {
        panic!("expected approval");
    };
    assert_eq!(post.slug, "a-1");
    assert_eq!(post.author, "anna");
    assert!(post.is_published, "Unscheduled submissions go live immediately");
    assert_eq!(submission.reviewed_by.as_deref(), Some("ed"));

    assert!(repo.find::<Post>("a-1").await.unwrap().is_some());
    assert!(repo.find::<PostSubmission>(&submitted.id.to_string()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_submission_approval_with_taken_slug_conflicts() {
    let repo = memory_repo();
    let author = actor("anna", Role::Author);
    let editor = actor("ed", Role::Editor);
    let first = submission::submit(&repo, &author, submission_request("dup")).await.unwrap();
    let second = submission::submit(&repo, &author, submission_request("dup")).await.unwrap();
    let approve = || UpdateSubmissionRequest {
        status: Some(SubmissionStatus::Approved),
        ..UpdateSubmissionRequest::default()
    };

    submission::update(&repo, first.id, &editor, approve()).await.unwrap();
    let result = submission::update(&repo, second.id, &editor, approve()).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(repo.find::<PostSubmission>(&second.id.to_string()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_rejected_submission_is_terminal() {
    let repo = memory_repo();
    let author = actor("anna", Role::Author);
    let editor = actor("ed", Role::Editor);
    let submitted = submission::submit(&repo, &author, submission_request("b-2")).await.unwrap();

    let outcome = submission::update(
        &repo,
        submitted.id,
        &editor,
        UpdateSubmissionRequest {
            status: Some(SubmissionStatus::Rejected),
            editor_comments: Some("Needs sources".to_string()),
            ..UpdateSubmissionRequest::default()
        },
    )
    .await
    .unwrap();
    assert!(matches!(outcome, SubmissionOutcome::Rejected(_)));

    let stored = submission::get(&repo, submitted.id, &author).await.unwrap();
    assert_eq!(stored.status, SubmissionStatus::Rejected);
    assert_eq!(stored.editor_comments, "Needs sources");

    let result = submission::update(
        &repo,
        submitted.id,
        &editor,
        UpdateSubmissionRequest {
            status: Some(SubmissionStatus::Approved),
            ..UpdateSubmissionRequest::default()
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
    assert!(repo.find::<Post>("b-2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_authors_cannot_review_or_see_others_work() {
    let repo = memory_repo();
    let anna = actor("anna", Role::Author);
    let ben = actor("ben", Role::Author);
    let submitted = submission::submit(&repo, &anna, submission_request("c-3")).await.unwrap();

    let result = submission::update(
        &repo,
        submitted.id,
        &anna,
        UpdateSubmissionRequest {
            status: Some(SubmissionStatus::Approved),
            ..UpdateSubmissionRequest::default()
        },
    )
    .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    assert!(submission::list(&repo, &ben).await.unwrap().is_empty());
    assert!(matches!(
        submission::get(&repo, submitted.id, &ben).await,
        Err(AppError::NotFound(_))
    ));

    // The owner may still edit content while pending.
    let outcome = submission::update(
        &repo,
        submitted.id,
        &anna,
        UpdateSubmissionRequest {
            title: Some("Better title".to_string()),
            ..UpdateSubmissionRequest::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(outcome.submission().title, "Better title");
}

// --- ADS ---

#[tokio::test]
async fn test_expired_ads_are_switched_off_on_read() {
    let repo = memory_repo();
    let now = Utc::now();
    let ad = ads::create_ad(
        &repo,
        CreateAdRequest {
            kind: AdKind::Text,
            category: "sidebar".to_string(),
            text: "Buy now".to_string(),
            start_date: Some(now - Duration::days(10)),
            end_date: Some(now - Duration::days(1)),
            active: true,
            ..CreateAdRequest::default()
        },
    )
    .await
    .unwrap();
    assert!(ad.active);

    let listed = ads::list_ads(&repo).await.unwrap();
    assert!(!listed[0].active);

    // The flip was persisted, not just applied to the response.
    let stored = repo.find::<Ad>(&ad.id.to_string()).await.unwrap().unwrap();
    assert!(!stored.active);
}

#[tokio::test]
async fn test_ad_window_must_be_ordered() {
    let repo = memory_repo();
    let now = Utc::now();
    let result = ads::create_ad(
        &repo,
        CreateAdRequest {
            start_date: Some(now),
            end_date: Some(now - Duration::hours(1)),
            ..CreateAdRequest::default()
        },
    )
    .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_sweep_logs_expired_ads() {
    let repo = memory_repo();
    let audit = AuditLog::new(repo.clone(), 100);
    ads::create_ad(
        &repo,
        CreateAdRequest {
            end_date: Some(Utc::now() - Duration::minutes(5)),
            active: true,
            ..CreateAdRequest::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(ads::sweep(&repo, &audit).await.unwrap(), 1);
    assert_eq!(ads::sweep(&repo, &audit).await.unwrap(), 0);

    let entries = audit
        .query(&LogQuery {
            action: Some(action::ADS_EXPIRED.to_string()),
            ..LogQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actor, "system");
}

#[tokio::test]
async fn test_audit_log_keeps_newest_entries_up_to_retention() {
    let repo = memory_repo();
    let audit = AuditLog::new(repo.clone(), 3);

    for n in 0..5 {
        audit.record_system(action::PING, format!("tick-{n}"), serde_json::json!({})).await;
    }

    let entries = audit.query(&LogQuery::default()).await.unwrap();
    let targets: Vec<&str> = entries.iter().map(|e| e.target.as_str()).collect();
    assert_eq!(targets, ["tick-4", "tick-3", "tick-2"]);
}
