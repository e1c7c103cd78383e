//! Behaviour every backend must share
//!
//! Each case creates its own natural keys and partitions so it can run on a
//! database other runs have already written to.

use agentledger::model::{
    hash_secret, ApiKey, Event, FavoriteTargetType, OAuthConnection, PasswordCredential,
    PlanDocument, PlanDocumentEvent, PlanDocumentEventType, PlanDocumentQuery, PlanStatus, Project,
    Session, SortField, User, UserFavorite, WebSession, DEFAULT_PROJECT_ID,
};
use agentledger::repository::{Page, PageRequest, Repositories};
use agentledger::StoreError;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use tokio::task::JoinSet;
use uuid::Uuid;

fn unique(label: &str) -> String {
    format!("{}-{}", label, Uuid::new_v4())
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

async fn fresh_project(repos: &Repositories) -> Project {
    let remote = format!("git@example.com:contract/{}.git", Uuid::new_v4());
    repos
        .projects
        .find_or_create_by_canonical_git_repository(&remote)
        .await
        .unwrap()
}

async fn fresh_session(repos: &Repositories, project_id: &str) -> Session {
    repos
        .sessions
        .create(Session::new(unique("claude")).with_project(project_id))
        .await
        .unwrap()
}

fn session_at(id: &str, project_id: &str, created: i64, updated: i64) -> Session {
    let mut session = Session::new(unique("claude")).with_project(project_id);
    session.id = id.to_string();
    session.created_at = at(created);
    session.updated_at = at(updated);
    session
}

fn ids<T>(page: &Page<T>, id: impl Fn(&T) -> &str) -> Vec<String> {
    page.items.iter().map(|item| id(item).to_string()).collect()
}

async fn all_session_ids(repos: &Repositories, project_id: &str, request: PageRequest) -> Vec<String> {
    let mut seen = Vec::new();
    let mut request = request;
    loop {
        let page = repos
            .sessions
            .find_by_project(project_id, &request)
            .await
            .unwrap();
        assert!(page.len() <= request.effective_limit());
        seen.extend(ids(&page, |s| &s.id));
        match page.next_cursor {
            Some(next) => request = request.clone().after(next),
            None => return seen,
        }
    }
}

pub async fn default_project_is_singleton(repos: &Repositories) {
    let first = repos.projects.default_project().await.unwrap();
    assert_eq!(first.id, DEFAULT_PROJECT_ID);
    assert!(first.canonical_git_url.is_empty());

    let again = repos.projects.default_project().await.unwrap();
    assert_eq!(first.id, again.id);

    let blank = repos
        .projects
        .find_or_create_by_canonical_git_repository("")
        .await
        .unwrap();
    assert!(blank.is_default());
}

pub async fn concurrent_project_find_or_create(repos: &Repositories) {
    let name = Uuid::new_v4();
    let spellings = [
        format!("git@github.com:contract/{}.git", name),
        format!("https://github.com/contract/{}", name),
        format!("ssh://git@github.com/contract/{}.git", name),
    ];

    let mut tasks = JoinSet::new();
    for n in 0..9 {
        let repos = repos.clone();
        let remote = spellings[n % spellings.len()].clone();
        tasks.spawn(async move {
            repos
                .projects
                .find_or_create_by_canonical_git_repository(&remote)
                .await
        });
    }

    let mut winners = Vec::new();
    while let Some(result) = tasks.join_next().await {
        winners.push(result.unwrap().unwrap().id);
    }
    winners.dedup();
    assert_eq!(winners.len(), 1, "every caller must see the same project");

    let canonical = format!("github.com/contract/{}", name);
    let found = repos
        .projects
        .find_by_canonical_git_repository(&canonical)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, winners[0]);
}

pub async fn concurrent_session_find_or_create(repos: &Repositories) {
    let claude_id = unique("claude");

    let mut tasks = JoinSet::new();
    for n in 0..8 {
        let repos = repos.clone();
        let template = Session::new(claude_id.clone()).with_cwd(format!("/work/{}", n));
        tasks.spawn(async move { repos.sessions.find_or_create_by_claude_session_id(template).await });
    }
    let mut winners = Vec::new();
    while let Some(result) = tasks.join_next().await {
        winners.push(result.unwrap().unwrap().id);
    }
    winners.dedup();
    assert_eq!(winners.len(), 1);

    let err = repos
        .sessions
        .create(Session::new(claude_id.clone()))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());

    let email = format!("{}@Example.COM", Uuid::new_v4());
    let mut tasks = JoinSet::new();
    for _ in 0..8 {
        let repos = repos.clone();
        let email = email.clone();
        tasks.spawn(async move { repos.users.find_or_create_by_email(&email, "Racer").await });
    }
    let mut users = Vec::new();
    while let Some(result) = tasks.join_next().await {
        users.push(result.unwrap().unwrap().id);
    }
    users.dedup();
    assert_eq!(users.len(), 1);
}

pub async fn event_uuid_is_unique_per_session(repos: &Repositories) {
    let project = fresh_project(repos).await;
    let first = fresh_session(repos, &project.id).await;
    let second = fresh_session(repos, &project.id).await;

    let event = repos
        .events
        .create(Event::new(&first.id, "PostToolUse", "Bash", json!({"cmd": "ls"})).with_uuid("u-1"))
        .await
        .unwrap();

    let err = repos
        .events
        .create(Event::new(&first.id, "PostToolUse", "Bash", json!({})).with_uuid("u-1"))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());

    // The same uuid is free in another session
    repos
        .events
        .create(Event::new(&second.id, "PostToolUse", "Bash", json!({})).with_uuid("u-1"))
        .await
        .unwrap();

    // Events without a uuid never collide
    for _ in 0..2 {
        repos
            .events
            .create(Event::new(&first.id, "Stop", "", json!(null)))
            .await
            .unwrap();
    }

    let found = repos
        .events
        .find_by_session_and_uuid(&first.id, "u-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, event.id);
    assert_eq!(found.payload, json!({"cmd": "ls"}));
    assert_eq!(repos.events.count_by_session(&first.id).await.unwrap(), 3);
    assert_eq!(repos.events.count_by_session(&second.id).await.unwrap(), 1);

    assert_eq!(repos.events.delete_by_session(&first.id).await.unwrap(), 3);
    assert_eq!(repos.events.count_by_session(&first.id).await.unwrap(), 0);
    assert!(repos
        .events
        .find_by_session_and_uuid(&first.id, "u-1")
        .await
        .unwrap()
        .is_none());
}

pub async fn event_create_advances_session(repos: &Repositories) {
    let project = fresh_project(repos).await;
    let session = repos
        .sessions
        .create(session_at(&unique("s"), &project.id, 0, 10))
        .await
        .unwrap();

    repos
        .events
        .create(Event::new(&session.id, "PreToolUse", "Read", json!({})).at(at(50)))
        .await
        .unwrap();
    let touched = repos.sessions.find_by_id(&session.id).await.unwrap().unwrap();
    assert_eq!(touched.updated_at, at(50));

    // An older event never moves it backwards
    repos
        .events
        .create(Event::new(&session.id, "PreToolUse", "Read", json!({})).at(at(20)))
        .await
        .unwrap();
    let kept = repos.sessions.find_by_id(&session.id).await.unwrap().unwrap();
    assert_eq!(kept.updated_at, at(50));
    assert_eq!(kept.created_at, at(0));
}

pub async fn session_listing_tie_break(repos: &Repositories) {
    let project = fresh_project(repos).await;
    let prefix = Uuid::new_v4().to_string();
    let a = format!("{}-a", prefix);
    let b = format!("{}-b", prefix);
    let c = format!("{}-c", prefix);

    for session in [
        session_at(&a, &project.id, 0, 100),
        session_at(&b, &project.id, 1, 100),
        session_at(&c, &project.id, 2, 50),
    ] {
        repos.sessions.create(session).await.unwrap();
    }

    let first = repos
        .sessions
        .find_by_project(&project.id, &PageRequest::new(2))
        .await
        .unwrap();
    assert_eq!(ids(&first, |s| &s.id), vec![b.clone(), a.clone()]);
    let next = first.next_cursor.clone().expect("more sessions remain");

    let second = repos
        .sessions
        .find_by_project(&project.id, &PageRequest::new(2).after(next))
        .await
        .unwrap();
    assert_eq!(ids(&second, |s| &s.id), vec![c.clone()]);
    assert!(second.is_last());
}

pub async fn pagination_is_complete(repos: &Repositories) {
    let project = fresh_project(repos).await;
    let mut expected = Vec::new();
    for n in 0..7 {
        let id = format!("{}-{}", Uuid::new_v4(), n);
        repos
            .sessions
            .create(session_at(&id, &project.id, 0, 30))
            .await
            .unwrap();
        expected.push(id);
    }
    expected.sort();
    expected.reverse();

    let seen = all_session_ids(repos, &project.id, PageRequest::new(3)).await;
    assert_eq!(seen, expected);

    let session = fresh_session(repos, &project.id).await;
    for _ in 0..5 {
        repos
            .events
            .create(Event::new(&session.id, "PostToolUse", "Edit", json!({})).at(at(7)))
            .await
            .unwrap();
    }
    let mut events = Vec::new();
    let mut request = PageRequest::new(2);
    loop {
        let page = repos
            .events
            .find_by_session(&session.id, &request)
            .await
            .unwrap();
        events.extend(ids(&page, |e| &e.id));
        match page.next_cursor {
            Some(next) => request = PageRequest::new(2).after(next),
            None => break,
        }
    }
    let mut distinct = events.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(events.len(), 5);
    assert_eq!(distinct.len(), 5);
}

pub async fn sort_field_selects_order(repos: &Repositories) {
    let project = fresh_project(repos).await;
    let old = unique("old");
    let new = unique("new");
    // Created first but active last
    repos
        .sessions
        .create(session_at(&old, &project.id, 0, 90))
        .await
        .unwrap();
    repos
        .sessions
        .create(session_at(&new, &project.id, 10, 20))
        .await
        .unwrap();

    let by_update = all_session_ids(repos, &project.id, PageRequest::new(1)).await;
    assert_eq!(by_update, vec![old.clone(), new.clone()]);

    let by_creation = all_session_ids(
        repos,
        &project.id,
        PageRequest::new(1).sorted_by(SortField::CreatedAt),
    )
    .await;
    assert_eq!(by_creation, vec![new, old]);
}

pub async fn unreadable_cursor_starts_over(repos: &Repositories) {
    let project = fresh_project(repos).await;
    let newest = unique("s");
    repos
        .sessions
        .create(session_at(&unique("s"), &project.id, 0, 1))
        .await
        .unwrap();
    repos
        .sessions
        .create(session_at(&newest, &project.id, 0, 2))
        .await
        .unwrap();

    for garbage in ["", "not a cursor", "e30"] {
        let page = repos
            .sessions
            .find_by_project(&project.id, &PageRequest::new(10).after(garbage))
            .await
            .unwrap();
        assert_eq!(page.len(), 2, "cursor {:?}", garbage);
        assert_eq!(page.items[0].id, newest);
    }
}

pub async fn timestamps_keep_nanoseconds(repos: &Repositories) {
    let project = fresh_project(repos).await;
    let precise = Utc.timestamp_opt(1_712_345_678, 123_456_789).unwrap();
    let session = repos
        .sessions
        .create(Session::new(unique("claude")).with_project(&project.id).started(precise))
        .await
        .unwrap();
    let event = repos
        .events
        .create(Event::new(&session.id, "PostToolUse", "Grep", json!({})).at(precise))
        .await
        .unwrap();

    let stored = repos.sessions.find_by_id(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.started_at, precise);
    let stored = repos.events.find_by_id(&event.id).await.unwrap().unwrap();
    assert_eq!(stored.created_at, precise);
}

pub async fn narrow_updates_report_missing_rows(repos: &Repositories) {
    let missing = unique("missing");
    assert!(repos.projects.find_by_id(&missing).await.unwrap().is_none());
    assert!(repos.sessions.find_by_id(&missing).await.unwrap().is_none());
    assert!(repos.events.find_by_id(&missing).await.unwrap().is_none());
    assert!(repos.users.find_by_id(&missing).await.unwrap().is_none());
    assert!(repos.plan_documents.find_by_id(&missing).await.unwrap().is_none());
    assert!(repos.web_sessions.find_by_id(&missing).await.unwrap().is_none());

    assert!(!repos
        .sessions
        .update_title(&missing, Some("t".into()))
        .await
        .unwrap());
    assert!(!repos.sessions.touch(&missing, at(0)).await.unwrap());
    assert!(!repos.plan_documents.update_body(&missing, "x", at(0)).await.unwrap());
    assert!(!repos
        .plan_documents
        .set_status(&missing, PlanStatus::Complete, at(0))
        .await
        .unwrap());
    assert!(!repos
        .users
        .update_display_name(&missing, "x", at(0))
        .await
        .unwrap());
    assert!(!repos.api_keys.update_last_used_at(&missing, at(0)).await.unwrap());
    assert!(!repos.sessions.delete(&missing).await.unwrap());
    assert!(!repos.password_credentials.delete(&missing).await.unwrap());

    let project = fresh_project(repos).await;
    let session = fresh_session(repos, &project.id).await;
    assert!(repos
        .sessions
        .update_title(&session.id, Some("Fix the cursor".into()))
        .await
        .unwrap());
    let user = repos
        .users
        .find_or_create_by_email(&format!("{}@example.com", Uuid::new_v4()), "")
        .await
        .unwrap();
    assert!(repos
        .sessions
        .assign_user(&session.id, Some(user.id.clone()))
        .await
        .unwrap());
    let stored = repos.sessions.find_by_id(&session.id).await.unwrap().unwrap();
    assert_eq!(stored.title.as_deref(), Some("Fix the cursor"));
    assert_eq!(stored.user_id.as_deref(), Some(user.id.as_str()));

    let mine = repos
        .sessions
        .find_by_user(&user.id, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ids(&mine, |s| &s.id), vec![session.id.clone()]);

    assert!(repos.sessions.assign_user(&session.id, None).await.unwrap());
    let mine = repos
        .sessions
        .find_by_user(&user.id, &PageRequest::default())
        .await
        .unwrap();
    assert!(mine.is_empty());
}

pub async fn project_delete_rules(repos: &Repositories) {
    repos.projects.default_project().await.unwrap();
    let err = repos.projects.delete(DEFAULT_PROJECT_ID).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(repos
        .projects
        .find_by_id(DEFAULT_PROJECT_ID)
        .await
        .unwrap()
        .is_some());

    let project = fresh_project(repos).await;
    let err = repos
        .projects
        .create(Project::new(&project.canonical_git_url))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());

    assert!(repos.projects.delete(&project.id).await.unwrap());
    assert!(!repos.projects.delete(&project.id).await.unwrap());
    assert!(repos
        .projects
        .find_by_canonical_git_repository(&project.canonical_git_url)
        .await
        .unwrap()
        .is_none());
}

pub async fn favorites_are_idempotent(repos: &Repositories) {
    let user = unique("user");
    let project = fresh_project(repos).await;
    let session = fresh_session(repos, &project.id).await;
    let plan = repos
        .plan_documents
        .create(PlanDocument::new(&project.id, "favorite plan"))
        .await
        .unwrap();

    let first = repos
        .favorites
        .add(UserFavorite::new(&user, FavoriteTargetType::Session, &session.id))
        .await
        .unwrap();
    let again = repos
        .favorites
        .add(UserFavorite::new(&user, FavoriteTargetType::Session, &session.id))
        .await
        .unwrap();
    assert_eq!(first.id, again.id);

    let err = repos
        .favorites
        .create(UserFavorite::new(&user, FavoriteTargetType::Session, &session.id))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());

    repos
        .favorites
        .add(UserFavorite::new(&user, FavoriteTargetType::Plan, &plan.id))
        .await
        .unwrap();

    let all = repos
        .favorites
        .list_by_user(&user, None, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
    let plans = repos
        .favorites
        .list_by_user(&user, Some(FavoriteTargetType::Plan), &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ids(&plans, |f| &f.target_id), vec![plan.id.clone()]);

    assert!(repos
        .favorites
        .remove(&user, FavoriteTargetType::Session, &session.id)
        .await
        .unwrap());
    assert!(!repos
        .favorites
        .remove(&user, FavoriteTargetType::Session, &session.id)
        .await
        .unwrap());
    assert!(repos
        .favorites
        .find(&user, FavoriteTargetType::Session, &session.id)
        .await
        .unwrap()
        .is_none());
}

pub async fn plan_document_query(repos: &Repositories) {
    let project = fresh_project(repos).await;
    let tag = Uuid::new_v4().simple().to_string();

    let literal = repos
        .plan_documents
        .create(
            PlanDocument::new(&project.id, format!("{} reach 100% Coverage", tag))
                .with_status(PlanStatus::Draft),
        )
        .await
        .unwrap();
    let lookalike = repos
        .plan_documents
        .create(
            PlanDocument::new(&project.id, format!("{} reach 1000 coverage", tag))
                .with_status(PlanStatus::Pending),
        )
        .await
        .unwrap();
    let mut others = Vec::new();
    for n in 0..5 {
        let plan = repos
            .plan_documents
            .create(
                PlanDocument::new(&project.id, format!("{} step {}", tag, n))
                    .with_status(PlanStatus::Scratch),
            )
            .await
            .unwrap();
        others.push(plan.id);
    }

    let query = PlanDocumentQuery::default().in_project(&project.id).describing("100% COVER");
    let page = repos
        .plan_documents
        .find(&query, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ids(&page, |p| &p.id), vec![literal.id.clone()]);

    let query = PlanDocumentQuery::default().in_project(&project.id).describing("1_0");
    let page = repos
        .plan_documents
        .find(&query, &PageRequest::default())
        .await
        .unwrap();
    assert!(page.is_empty());

    let query = PlanDocumentQuery::default()
        .in_project(&project.id)
        .with_statuses([PlanStatus::Draft, PlanStatus::Pending]);
    let page = repos
        .plan_documents
        .find(&query, &PageRequest::default())
        .await
        .unwrap();
    let mut found = ids(&page, |p| &p.id);
    found.sort();
    let mut expected = vec![literal.id.clone(), lookalike.id.clone()];
    expected.sort();
    assert_eq!(found, expected);

    let query = PlanDocumentQuery::default().with_ids(Vec::new());
    let page = repos
        .plan_documents
        .find(&query, &PageRequest::default())
        .await
        .unwrap();
    assert!(page.is_empty());

    let query = PlanDocumentQuery::default()
        .with_ids(vec![others[0].clone(), unique("missing")])
        .with_statuses([PlanStatus::Scratch]);
    let page = repos
        .plan_documents
        .find(&query, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ids(&page, |p| &p.id), vec![others[0].clone()]);

    // Filtered listings still page through every match exactly once
    let query = PlanDocumentQuery::default()
        .in_project(&project.id)
        .with_statuses([PlanStatus::Scratch]);
    let mut seen = Vec::new();
    let mut request = PageRequest::new(2);
    loop {
        let page = repos.plan_documents.find(&query, &request).await.unwrap();
        seen.extend(ids(&page, |p| &p.id));
        match page.next_cursor {
            Some(next) => request = PageRequest::new(2).after(next),
            None => break,
        }
    }
    seen.sort();
    others.sort();
    assert_eq!(seen, others);
}

pub async fn plan_document_updates_and_events(repos: &Repositories) {
    let project = fresh_project(repos).await;
    let plan = repos
        .plan_documents
        .create(PlanDocument::new(&project.id, "rollout").with_body("v1"))
        .await
        .unwrap();
    assert_eq!(plan.status, PlanStatus::Scratch);

    let later = plan.updated_at + Duration::seconds(30);
    assert!(repos.plan_documents.update_body(&plan.id, "v2", later).await.unwrap());
    assert!(repos
        .plan_documents
        .update_description(&plan.id, "rollout v2", later)
        .await
        .unwrap());
    assert!(repos
        .plan_documents
        .set_status(&plan.id, PlanStatus::Implementation, later)
        .await
        .unwrap());
    let stored = repos.plan_documents.find_by_id(&plan.id).await.unwrap().unwrap();
    assert_eq!(stored.body, "v2");
    assert_eq!(stored.description, "rollout v2");
    assert_eq!(stored.status, PlanStatus::Implementation);
    assert_eq!(stored.updated_at, later);
    assert_eq!(stored.created_at, plan.created_at);

    let other = repos
        .plan_documents
        .create(PlanDocument::new(&project.id, "other"))
        .await
        .unwrap();
    let alice = unique("alice");
    let bob = unique("bob");
    let carol = unique("carol");
    for (plan_id, user) in [(&plan.id, &alice), (&plan.id, &bob), (&other.id, &bob), (&plan.id, &alice)] {
        repos
            .plan_document_events
            .create(
                PlanDocumentEvent::new(plan_id, PlanDocumentEventType::BodyChange, "@@ -1 +1 @@")
                    .by_user(user)
                    .with_message("edit"),
            )
            .await
            .unwrap();
    }
    repos
        .plan_document_events
        .create(
            PlanDocumentEvent::new(&plan.id, PlanDocumentEventType::StatusChange, "implementation")
                .in_session(unique("session")),
        )
        .await
        .unwrap();

    let history = repos
        .plan_document_events
        .find_by_plan_document(&plan.id, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(history.len(), 4);
    let status_change = history
        .items
        .iter()
        .find(|event| event.event_type == PlanDocumentEventType::StatusChange)
        .unwrap();
    assert!(status_change.session_id.is_some());
    assert!(status_change.user_id.is_none());

    let mut expected = vec![plan.id.clone(), other.id.clone()];
    expected.sort();
    let touched = repos
        .plan_document_events
        .plan_document_ids_by_user_ids(&[alice.clone(), bob.clone(), carol.clone()])
        .await
        .unwrap();
    assert_eq!(touched, expected);
    assert_eq!(
        repos
            .plan_document_events
            .plan_document_ids_by_user_ids(&[alice])
            .await
            .unwrap(),
        vec![plan.id.clone()]
    );
    assert!(repos
        .plan_document_events
        .plan_document_ids_by_user_ids(&[carol])
        .await
        .unwrap()
        .is_empty());
    assert!(repos
        .plan_document_events
        .plan_document_ids_by_user_ids(&[])
        .await
        .unwrap()
        .is_empty());

    assert!(repos.plan_documents.delete(&other.id).await.unwrap());
    assert!(repos.plan_documents.find_by_id(&other.id).await.unwrap().is_none());
}

pub async fn users_by_email(repos: &Repositories) {
    let local = Uuid::new_v4();
    let user = repos
        .users
        .create(User::new(&format!("  {}@Example.COM ", local), "Ada"))
        .await
        .unwrap();
    let normalized = format!("{}@example.com", local);
    assert_eq!(user.email, normalized);

    let err = repos
        .users
        .create(User::new(&normalized.to_uppercase(), "Imposter"))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());

    let found = repos
        .users
        .find_by_email(&format!("{}@EXAMPLE.com", local))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, user.id);

    let later = user.updated_at + Duration::minutes(1);
    assert!(repos.users.update_display_name(&user.id, "Ada L.", later).await.unwrap());
    let stored = repos.users.find_by_id(&user.id).await.unwrap().unwrap();
    assert_eq!(stored.display_name, "Ada L.");
    assert_eq!(stored.updated_at, later);
    assert_eq!(stored.created_at, user.created_at);

    let again = repos.users.find_or_create_by_email(&normalized, "Other").await.unwrap();
    assert_eq!(again.id, user.id);

    assert!(repos.users.delete(&user.id).await.unwrap());
    assert!(repos.users.find_by_email(&normalized).await.unwrap().is_none());
}

pub async fn api_keys(repos: &Repositories) {
    let user = unique("user");
    let (mut older, _) = ApiKey::issue(&user, "laptop");
    older.created_at = at(0);
    let older = repos.api_keys.create(older).await.unwrap();
    let (newer, secret) = ApiKey::issue(&user, "ci");
    let newer = repos.api_keys.create(newer).await.unwrap();

    let found = repos
        .api_keys
        .find_by_key_hash(&hash_secret(&secret))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, newer.id);
    assert!(found.last_used_at.is_none());

    let mut clash = older.clone();
    clash.id = String::new();
    assert!(repos.api_keys.create(clash).await.unwrap_err().is_duplicate());

    let listed: Vec<String> = repos
        .api_keys
        .find_by_user(&user)
        .await
        .unwrap()
        .into_iter()
        .map(|key| key.id)
        .collect();
    assert_eq!(listed, vec![newer.id.clone(), older.id.clone()]);

    assert!(repos.api_keys.update_last_used_at(&older.id, at(500)).await.unwrap());
    let used = repos.api_keys.find_by_id(&older.id).await.unwrap().unwrap();
    assert_eq!(used.last_used_at, Some(at(500)));

    assert!(repos.api_keys.delete(&newer.id).await.unwrap());
    assert!(repos
        .api_keys
        .find_by_key_hash(&newer.key_hash)
        .await
        .unwrap()
        .is_none());
}

pub async fn web_session_expiry(repos: &Repositories) {
    let user = unique("user");
    let other = unique("user");
    let now = Utc::now();

    let expired = repos
        .web_sessions
        .create(WebSession::issue(&user, Duration::hours(1), now - Duration::hours(2)))
        .await
        .unwrap();
    let boundary = repos
        .web_sessions
        .create(WebSession::issue(&user, Duration::hours(1), now - Duration::hours(1)))
        .await
        .unwrap();
    let live = repos
        .web_sessions
        .create(WebSession::issue(&user, Duration::hours(1), now))
        .await
        .unwrap();
    let elsewhere = repos
        .web_sessions
        .create(WebSession::issue(&other, Duration::hours(1), now))
        .await
        .unwrap();

    let swept = repos.web_sessions.delete_expired(now).await.unwrap();
    assert!(swept >= 2);
    assert!(repos.web_sessions.find_by_id(&expired.id).await.unwrap().is_none());
    assert!(repos.web_sessions.find_by_id(&boundary.id).await.unwrap().is_none());
    assert!(repos.web_sessions.find_by_id(&live.id).await.unwrap().is_some());

    assert_eq!(repos.web_sessions.delete_by_user(&user).await.unwrap(), 1);
    assert!(repos.web_sessions.find_by_id(&live.id).await.unwrap().is_none());
    assert!(repos.web_sessions.find_by_id(&elsewhere.id).await.unwrap().is_some());

    assert!(repos.web_sessions.delete(&elsewhere.id).await.unwrap());
    assert!(!repos.web_sessions.delete(&elsewhere.id).await.unwrap());
}

pub async fn password_upsert_keeps_created_at(repos: &Repositories) {
    let user = unique("user");
    let first = repos
        .password_credentials
        .upsert(PasswordCredential::new(&user, "hash-1"))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = repos
        .password_credentials
        .upsert(PasswordCredential::new(&user, "hash-2"))
        .await
        .unwrap();
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at > first.updated_at);

    let stored = repos
        .password_credentials
        .find_by_user_id(&user)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.password_hash, "hash-2");
    assert_eq!(stored.created_at, first.created_at);

    assert!(repos.password_credentials.delete(&user).await.unwrap());
    assert!(repos
        .password_credentials
        .find_by_user_id(&user)
        .await
        .unwrap()
        .is_none());
}

pub async fn oauth_connections(repos: &Repositories) {
    let user = unique("user");
    let subject = unique("gh");
    let linked = repos
        .oauth_connections
        .create(OAuthConnection::new(&user, "github", &subject))
        .await
        .unwrap();

    let err = repos
        .oauth_connections
        .create(OAuthConnection::new(unique("user"), "github", &subject))
        .await
        .unwrap_err();
    assert!(err.is_duplicate());

    // The same subject at another provider is a different identity
    let google = repos
        .oauth_connections
        .create(OAuthConnection::new(&user, "google", &subject))
        .await
        .unwrap();

    let found = repos
        .oauth_connections
        .find_by_provider_identity("github", &subject)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, linked.id);
    assert_eq!(repos.oauth_connections.find_by_user(&user).await.unwrap().len(), 2);

    assert!(repos.oauth_connections.delete(&google.id).await.unwrap());
    assert!(repos
        .oauth_connections
        .find_by_provider_identity("google", &subject)
        .await
        .unwrap()
        .is_none());
}

pub async fn composite_keys_stay_distinct(repos: &Repositories) {
    let base = Uuid::new_v4().to_string();

    // (session "x#b", uuid "c") and (session "x", uuid "b#c")
    let project = fresh_project(repos).await;
    let nested = repos
        .sessions
        .create(session_at(&format!("{}#b", base), &project.id, 0, 1))
        .await
        .unwrap();
    let flat = repos
        .sessions
        .create(session_at(&base, &project.id, 0, 1))
        .await
        .unwrap();
    let first = repos
        .events
        .create(Event::new(&nested.id, "PostToolUse", "Bash", json!({})).with_uuid("c"))
        .await
        .unwrap();
    let second = repos
        .events
        .create(Event::new(&flat.id, "PostToolUse", "Bash", json!({})).with_uuid("b#c"))
        .await
        .unwrap();
    let found = repos
        .events
        .find_by_session_and_uuid(&flat.id, "b#c")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, second.id);
    let found = repos
        .events
        .find_by_session_and_uuid(&nested.id, "c")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);
    assert!(repos
        .events
        .find_by_session_and_uuid(&flat.id, "c")
        .await
        .unwrap()
        .is_none());

    // (provider "p#x", subject "1") and (provider "p", subject "x#1")
    let provider = format!("gh-{}", base);
    let joined = repos
        .oauth_connections
        .create(OAuthConnection::new(unique("user"), format!("{}#x", provider), "1"))
        .await
        .unwrap();
    let split = repos
        .oauth_connections
        .create(OAuthConnection::new(unique("user"), &provider, "x#1"))
        .await
        .unwrap();
    let found = repos
        .oauth_connections
        .find_by_provider_identity(&provider, "x#1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, split.id);
    let found = repos
        .oauth_connections
        .find_by_provider_identity(&format!("{}#x", provider), "1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, joined.id);

    // (user "u#session", plan "t") and (user "u", session "plan#t")
    let user = format!("user-{}", base);
    let typed_user = format!("{}#session", user);
    let plan_favorite = repos
        .favorites
        .create(UserFavorite::new(&typed_user, FavoriteTargetType::Plan, "t"))
        .await
        .unwrap();
    let session_favorite = repos
        .favorites
        .create(UserFavorite::new(&user, FavoriteTargetType::Session, "plan#t"))
        .await
        .unwrap();
    assert_ne!(plan_favorite.id, session_favorite.id);

    let listed = repos
        .favorites
        .list_by_user(&user, Some(FavoriteTargetType::Session), &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ids(&listed, |f| &f.id), vec![session_favorite.id.clone()]);
    let listed = repos
        .favorites
        .list_by_user(&typed_user, None, &PageRequest::default())
        .await
        .unwrap();
    assert_eq!(ids(&listed, |f| &f.id), vec![plan_favorite.id.clone()]);
    assert!(repos
        .favorites
        .find(&user, FavoriteTargetType::Plan, "t")
        .await
        .unwrap()
        .is_none());
}
