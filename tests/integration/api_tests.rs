//! Integration tests against an in-process fake of the library backend

mod fake_backend;

use axum::http::Method;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;
use tempfile::TempDir;

use biblio_desk::{
    config::{ApiConfig, AppConfig, LoggingConfig, SessionConfig},
    error::AppError,
    models::{Book, BookIssueRecord, Credentials, IssueStatus, NewUser, SearchCriteria, Token},
    repository::{FileTokenStorage, SessionStore},
    services::{
        catalog::SearchOutcome,
        issue::IssueState,
        ledger::LedgerOutcome,
        returns::{OpenOutcome, ReturnOutcome},
        session::StartupCheck,
    },
    AppState,
};
use fake_backend::{Backend, Shared};

struct Desk {
    state: AppState,
    backend: Shared,
    dir: TempDir,
}

impl Desk {
    async fn start(backend: Backend) -> Self {
        let (addr, backend) = fake_backend::spawn(backend).await;
        let dir = tempfile::tempdir().expect("temp dir");
        let config = AppConfig {
            api: ApiConfig {
                base_url: format!("http://{}", addr),
                timeout_secs: Some(5),
            },
            session: SessionConfig {
                path: dir.path().join("session.json"),
            },
            logging: LoggingConfig::default(),
        };
        let state = AppState::from_config(config).expect("app state");
        Self { state, backend, dir }
    }

    async fn sign_in(&self) {
        self.state
            .services
            .session
            .sign_in(Credentials {
                username: "marian".into(),
                password: "secret".into(),
            })
            .await
            .expect("sign in");
    }

    async fn copies_of(&self, book_id: i32) -> u32 {
        let books: Vec<Book> = self.state.services.catalog.all_books().await.expect("all books");
        books
            .into_iter()
            .find(|b| b.id == book_id)
            .map(|b| b.copies)
            .expect("book listed")
    }
}

fn token_expiring_at(exp: chrono::DateTime<Utc>) -> Token {
    let raw = encode(
        &Header::default(),
        &json!({ "sub": "marian", "exp": exp.timestamp() }),
        &EncodingKey::from_secret(b"fake-backend"),
    )
    .expect("encode token");
    Token::new(raw)
}

#[tokio::test]
async fn sign_in_persists_the_token() {
    let desk = Desk::start(Backend::seeded()).await;
    desk.sign_in().await;

    assert!(desk.state.services.session.is_valid());

    let reopened = SessionStore::new(FileTokenStorage::new(desk.dir.path().join("session.json")));
    assert_eq!(reopened.token(), desk.state.store.token());
}

#[tokio::test]
async fn rejected_credentials_store_nothing() {
    let desk = Desk::start(Backend::seeded()).await;

    let result = desk
        .state
        .services
        .session
        .sign_in(Credentials {
            username: "marian".into(),
            password: "wrong".into(),
        })
        .await;

    assert!(matches!(result, Err(AppError::Authentication(ref msg)) if msg == "Incorrect username or password"));
    assert!(desk.state.store.token().is_none());
    let notifications = desk.state.services.notifications.drain();
    assert_eq!(notifications.last().unwrap().message, "Error in user sign in process!");
}

#[tokio::test]
async fn search_dispatches_on_filled_fields() {
    let desk = Desk::start(Backend::seeded()).await;
    let form = desk.state.services.catalog.search_form();

    let outcome = form.search(&SearchCriteria::default().title("Dune")).await;
    assert!(matches!(outcome, SearchOutcome::Applied(ref books) if books.len() == 3));
    let issuable: Vec<i32> = form.issuable().iter().map(|b| b.id).collect();
    assert_eq!(issuable, vec![2, 3]);

    form.search(&SearchCriteria::default().title("Messiah").author("Frank Herbert"))
        .await;
    assert_eq!(form.results().len(), 1);

    form.search(&SearchCriteria::default().title("Dune").author("Herbert").publisher("Putnam"))
        .await;
    assert_eq!(form.results().len(), 2);

    let outcome = form
        .search(&SearchCriteria::default().author("Herbert").publisher("Putnam"))
        .await;
    assert!(matches!(outcome, SearchOutcome::NoQuery));

    let backend = desk.backend.lock();
    let paths: Vec<String> = backend
        .calls_to(Method::GET, "/bookSearch/")
        .into_iter()
        .map(|c| c.path)
        .collect();
    assert_eq!(
        paths,
        vec![
            "/bookSearch/get_book_by_title=Dune".to_string(),
            "/bookSearch/get_book_by_title_and_author/Messiah/Frank%20Herbert".to_string(),
            "/bookSearch/get_book_by_title_author_publisher/Dune/Herbert/Putnam".to_string(),
        ]
    );
}

#[tokio::test]
async fn issue_then_return_rereads_copies() {
    let desk = Desk::start(Backend::seeded()).await;
    let services = &desk.state.services;
    assert_eq!(desk.copies_of(2).await, 3);

    let mut issue = services.issue_workflow();
    issue.search(SearchCriteria::default().title("Messiah")).await.unwrap();
    issue.select(2).unwrap();
    issue.identify("paul").unwrap();
    let record_id = match issue.issue().await.unwrap() {
        IssueState::Done { record } => record.id,
        other => panic!("unexpected state {:?}", other),
    };
    assert_eq!(desk.copies_of(2).await, 2);

    let mut returns = services.return_workflow();
    assert!(matches!(returns.open("paul").await.unwrap(), OpenOutcome::Loaded(ref r) if r.len() == 1));
    assert!(matches!(returns.return_book(record_id).await.unwrap(), ReturnOutcome::Returned(_)));
    assert!(returns.outstanding().is_empty());

    // a second return of the same record is a no-op on the client
    assert_eq!(
        returns.return_book(record_id).await.unwrap(),
        ReturnOutcome::Ignored(IssueStatus::Returned)
    );
    assert_eq!(desk.copies_of(2).await, 3);

    let backend = desk.backend.lock();
    assert_eq!(backend.calls_to(Method::PUT, "/bookIssues/return_bookIssue=").len(), 1);
    let created = backend.calls_to(Method::POST, "/bookIssues/");
    assert_eq!(created.len(), 1);
    assert!(!created[0].bearer);
}

#[tokio::test]
async fn unknown_patron_is_registered_before_issuing() {
    let desk = Desk::start(Backend::seeded()).await;
    desk.sign_in().await;

    let mut issue = desk.state.services.issue_workflow();
    issue.search(SearchCriteria::default().title("Children")).await.unwrap();
    issue.select(3).unwrap();
    issue.identify("chani").unwrap();
    assert!(matches!(issue.issue().await.unwrap(), IssueState::RegistrationRequired { .. }));

    let state = issue
        .register(NewUser {
            username: "chani".into(),
            email: "chani@arrakis.test".into(),
            password: "sietch".into(),
            has_issued: false,
        })
        .await
        .unwrap();
    assert!(matches!(state, IssueState::Done { record } if record.book_id == 3));

    let backend = desk.backend.lock();
    let created = backend.calls_to(Method::POST, "/users/");
    assert_eq!(created.len(), 1);
    assert!(created[0].bearer);
    assert!(backend.users.iter().any(|u| u.username == "chani"));
    assert_eq!(backend.calls_to(Method::POST, "/bookIssues/").len(), 1);
}

#[tokio::test]
async fn refused_issue_shows_backend_detail() {
    let desk = Desk::start(Backend::seeded()).await;

    let mut issue = desk.state.services.issue_workflow();
    issue.search(SearchCriteria::default().title("Messiah")).await.unwrap();
    issue.select(2).unwrap();
    issue.identify("feyd").unwrap();
    assert!(issue.issue().await.is_err());

    assert_eq!(
        issue.state(),
        &IssueState::Failed {
            reason: "User is not valid to issue book!".into()
        }
    );
    assert_eq!(desk.copies_of(2).await, 3);
}

#[tokio::test]
async fn ledger_approves_and_removes() {
    let mut backend = Backend::seeded();
    backend.issues = vec![
        BookIssueRecord {
            id: 1,
            book_id: 2,
            user_id: 7,
            issued_by: None,
            issue_time: None,
            issue_status: IssueStatus::Pending,
        },
        BookIssueRecord {
            id: 2,
            book_id: 3,
            user_id: 7,
            issued_by: Some(1),
            issue_time: None,
            issue_status: IssueStatus::Returned,
        },
    ];
    let desk = Desk::start(backend).await;
    let ledger = &desk.state.services.ledger;

    ledger.refresh().await.unwrap();
    assert!(matches!(ledger.approve(1).await.unwrap(), LedgerOutcome::Updated(_)));
    assert!(ledger.with_status(IssueStatus::Pending).is_empty());

    assert!(matches!(ledger.remove_returned(2).await, Err(AppError::Authentication(_))));

    desk.sign_in().await;
    let outcome = ledger.remove_returned(2).await.unwrap();
    assert!(matches!(outcome, LedgerOutcome::Updated(ref records) if records.len() == 1));

    let backend = desk.backend.lock();
    let removed = backend.calls_to(Method::DELETE, "/bookIssues/delete_returned_book=");
    assert_eq!(removed.len(), 1);
    assert!(removed[0].bearer);
}

#[tokio::test]
async fn logout_clears_despite_backend_failure() {
    let mut backend = Backend::seeded();
    backend.fail_sign_out = true;
    let desk = Desk::start(backend).await;
    desk.sign_in().await;

    desk.state.services.session.logout().await.unwrap();

    assert!(desk.state.store.token().is_none());
    assert!(!desk.state.store.has_state());
    assert!(!desk.dir.path().join("session.json").exists());
}

#[tokio::test]
async fn stale_session_is_cleared_at_startup() {
    let desk = Desk::start(Backend::seeded()).await;
    desk.state
        .store
        .set_token(token_expiring_at(Utc::now() - Duration::minutes(1)))
        .unwrap();

    let check = desk.state.services.session.startup().await.unwrap();

    assert_eq!(check, StartupCheck::StaleCleared);
    assert!(desk.state.store.token().is_none());
    assert_eq!(desk.backend.lock().calls_to(Method::POST, "/librarians/sign_out").len(), 1);
}

#[tokio::test]
async fn librarian_only_reads_carry_the_token() {
    let desk = Desk::start(Backend::seeded()).await;
    let services = &desk.state.services;

    assert!(matches!(services.users.list().await, Err(AppError::Authentication(_))));
    assert!(desk.backend.lock().calls_to(Method::GET, "/users/get_users").is_empty());

    desk.sign_in().await;
    assert_eq!(services.users.list().await.unwrap().len(), 2);
    assert_eq!(services.session.current_librarian().await.unwrap().librarian_name, "marian");

    let backend = desk.backend.lock();
    assert!(backend.calls_to(Method::GET, "/users/").iter().all(|c| c.bearer));
}
