//! In-process library backend speaking the same REST dialect as the real one

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Form, Json, Path, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};

use biblio_desk::models::{Book, BookIssueDetails, BookIssueRecord, IssueStatus, User};

/// One request as the backend saw it
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub bearer: bool,
}

#[derive(Default)]
pub struct Backend {
    pub books: Vec<Book>,
    pub users: Vec<User>,
    pub issues: Vec<BookIssueRecord>,
    pub librarians: Vec<(String, String)>,
    pub tokens: Vec<String>,
    pub calls: Vec<Call>,
    pub fail_sign_out: bool,
}

pub type Shared = Arc<Mutex<Backend>>;

impl Backend {
    pub fn seeded() -> Self {
        let book = |id: i32, title: &str, author: &str, publisher: &str, copies: u32| Book {
            id,
            title: title.into(),
            author: author.into(),
            publisher: publisher.into(),
            category: "Fiction".into(),
            copies,
        };
        let user = |id: i32, username: &str, has_issued: bool| User {
            id,
            username: username.into(),
            email: format!("{}@arrakis.test", username),
            has_issued,
        };

        Self {
            books: vec![
                book(1, "Dune", "Frank Herbert", "Chilton", 0),
                book(2, "Dune Messiah", "Frank Herbert", "Putnam", 3),
                book(3, "Children of Dune", "Frank Herbert", "Putnam", 1),
            ],
            users: vec![user(7, "paul", false), user(9, "feyd", true)],
            librarians: vec![("marian".into(), "secret".into())],
            ..Default::default()
        }
    }

    pub fn calls_to(&self, method: Method, prefix: &str) -> Vec<Call> {
        self.calls
            .iter()
            .filter(|c| c.method == method && c.path.starts_with(prefix))
            .cloned()
            .collect()
    }

    fn is_authorized(&self, headers: &HeaderMap) -> bool {
        bearer(headers).is_some_and(|token| self.tokens.iter().any(|t| *t == token))
    }

    fn issue_token(&mut self, username: &str) -> String {
        let claims = json!({ "sub": username, "exp": Utc::now().timestamp() + 3600 });
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"fake-backend"))
            .unwrap_or_default();
        self.tokens.push(token.clone());
        token
    }

    fn details(&self, record: &BookIssueRecord) -> BookIssueDetails {
        let bookname = self
            .books
            .iter()
            .find(|b| b.id == record.book_id)
            .map(|b| b.title.clone())
            .unwrap_or_default();
        let username = self
            .users
            .iter()
            .find(|u| u.id == record.user_id)
            .map(|u| u.username.clone())
            .unwrap_or_default();
        BookIssueDetails {
            id: record.id,
            bookname,
            username,
            issued_by: record.issued_by,
            issue_time: record.issue_time,
            issue_status: record.issue_status,
        }
    }

    fn next_issue_id(&self) -> i32 {
        self.issues.iter().map(|i| i.id).max().unwrap_or(0) + 1
    }
}

/// Start the backend on an ephemeral port
pub async fn spawn(backend: Backend) -> (SocketAddr, Shared) {
    let state: Shared = Arc::new(Mutex::new(backend));

    let app = Router::new()
        .route("/token", post(sign_in))
        .route("/librarians/sign_up", post(sign_up))
        .route("/librarians/sign_out", post(sign_out))
        .route("/librariains/get_all", get(librarians))
        .route("/users/", post(create_user))
        .route("/users/:query", get(users_query))
        .route("/books/:query", get(books_query))
        .route("/bookSearch/:kind", get(search_one))
        .route("/bookSearch/:kind/:first/:second", get(search_two))
        .route("/bookSearch/:kind/:first/:second/:third", get(search_three))
        .route("/bookIssues/", post(create_issue))
        .route(
            "/bookIssues/:query",
            get(issues_query).put(return_issue).delete(remove_returned),
        )
        .fallback(root_level)
        .layer(middleware::from_fn_with_state(state.clone(), record))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake backend");
    let addr = listener.local_addr().expect("fake backend address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake backend stopped");
    });
    (addr, state)
}

async fn record(State(state): State<Shared>, request: Request, next: Next) -> Response {
    let call = Call {
        method: request.method().clone(),
        path: request.uri().path().to_string(),
        bearer: bearer(request.headers()).is_some(),
    };
    state.lock().calls.push(call);
    next.run(request).await
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn unauthorized() -> Response {
    detail(StatusCode::UNAUTHORIZED, "Could not validate credentials")
}

fn not_found() -> Response {
    detail(StatusCode::NOT_FOUND, "Not Found")
}

/// Split a `key=value` segment
fn keyed(segment: &str) -> (&str, Option<&str>) {
    match segment.split_once('=') {
        Some((key, value)) => (key, Some(value)),
        None => (segment, None),
    }
}

fn id_of(value: Option<&str>) -> Option<i32> {
    value.and_then(|v| v.parse().ok())
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

async fn sign_in(State(state): State<Shared>, Form(form): Form<LoginForm>) -> Response {
    let mut backend = state.lock();
    let known = backend
        .librarians
        .iter()
        .any(|(name, password)| *name == form.username && *password == form.password);
    if !known {
        return detail(StatusCode::UNAUTHORIZED, "Incorrect username or password");
    }
    let token = backend.issue_token(&form.username);
    Json(json!({ "access_token": token, "token_type": "bearer" })).into_response()
}

async fn sign_up(State(state): State<Shared>, Form(form): Form<LoginForm>) -> Response {
    let mut backend = state.lock();
    if backend.librarians.iter().any(|(name, _)| *name == form.username) {
        return detail(StatusCode::BAD_REQUEST, "Librarian already exists");
    }
    backend.librarians.push((form.username.clone(), form.password));
    let token = backend.issue_token(&form.username);
    Json(json!({ "access_token": token, "token_type": "bearer" })).into_response()
}

async fn sign_out(State(state): State<Shared>) -> Response {
    if state.lock().fail_sign_out {
        return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
    }
    Json(json!({ "message": "Librarian logged out successfully" })).into_response()
}

async fn librarians(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let backend = state.lock();
    if !backend.is_authorized(&headers) {
        return unauthorized();
    }
    let list: Vec<Value> = backend
        .librarians
        .iter()
        .enumerate()
        .map(|(i, (name, _))| json!({ "librarian_id": i + 1, "librarian_name": name, "active": true }))
        .collect();
    Json(list).into_response()
}

async fn create_user(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let mut backend = state.lock();
    if !backend.is_authorized(&headers) {
        return unauthorized();
    }
    let username = body["username"].as_str().unwrap_or_default().to_string();
    if backend.users.iter().any(|u| u.username == username) {
        return detail(StatusCode::BAD_REQUEST, "Username already registered");
    }
    let user = User {
        id: backend.users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
        username,
        email: body["email"].as_str().unwrap_or_default().to_string(),
        has_issued: false,
    };
    backend.users.push(user.clone());
    Json(user).into_response()
}

async fn users_query(State(state): State<Shared>, headers: HeaderMap, Path(query): Path<String>) -> Response {
    let backend = state.lock();
    match keyed(&query) {
        ("check_user_in_db", Some(name)) => {
            let id = backend.users.iter().find(|u| u.username == name).map_or(0, |u| u.id);
            Json(id).into_response()
        }
        ("me", None) => match bearer(&headers).filter(|_| backend.is_authorized(&headers)) {
            Some(_) => Json(json!({ "librarian_id": 1, "librarian_name": "marian", "active": true })).into_response(),
            None => unauthorized(),
        },
        ("get_users", None) if backend.is_authorized(&headers) => Json(backend.users.clone()).into_response(),
        ("get_users", None) => unauthorized(),
        _ => not_found(),
    }
}

async fn books_query(State(state): State<Shared>, Path(query): Path<String>) -> Response {
    let backend = state.lock();
    match keyed(&query) {
        ("get_details", None) => Json(backend.books.clone()).into_response(),
        ("get_book_by_id", id) => match backend.books.iter().find(|b| Some(b.id) == id_of(id)) {
            Some(book) => Json(book.clone()).into_response(),
            None => detail(StatusCode::NOT_FOUND, "Book not found"),
        },
        _ => not_found(),
    }
}

fn matching(backend: &Backend, title: Option<&str>, author: Option<&str>, publisher: Option<&str>) -> Vec<Book> {
    let contains = |field: &str, needle: Option<&str>| {
        needle.map_or(true, |n| field.to_lowercase().contains(&n.to_lowercase()))
    };
    backend
        .books
        .iter()
        .filter(|b| contains(&b.title, title) && contains(&b.author, author) && contains(&b.publisher, publisher))
        .cloned()
        .collect()
}

async fn search_one(State(state): State<Shared>, Path(kind): Path<String>) -> Response {
    let backend = state.lock();
    let books = match keyed(&kind) {
        ("get_book_by_title", Some(t)) => matching(&backend, Some(t), None, None),
        ("get_book_by_author", Some(a)) => matching(&backend, None, Some(a), None),
        ("get_book_by_publisher", Some(p)) => matching(&backend, None, None, Some(p)),
        _ => return not_found(),
    };
    Json(books).into_response()
}

async fn search_two(
    State(state): State<Shared>,
    Path((kind, first, second)): Path<(String, String, String)>,
) -> Response {
    let backend = state.lock();
    let books = match kind.as_str() {
        "get_book_by_title_and_author" => matching(&backend, Some(&first), Some(&second), None),
        "get_book_by_title_and_publisher" => matching(&backend, Some(&first), None, Some(&second)),
        _ => return not_found(),
    };
    Json(books).into_response()
}

async fn search_three(
    State(state): State<Shared>,
    Path((kind, title, author, publisher)): Path<(String, String, String, String)>,
) -> Response {
    if kind != "get_book_by_title_author_publisher" {
        return not_found();
    }
    let backend = state.lock();
    Json(matching(&backend, Some(&title), Some(&author), Some(&publisher))).into_response()
}

async fn create_issue(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let mut backend = state.lock();
    let book_id = body["book_id"].as_i64().unwrap_or_default() as i32;
    let user_id = body["user_id"].as_i64().unwrap_or_default() as i32;

    match backend.users.iter().find(|u| u.id == user_id) {
        Some(user) if !user.has_issued => {}
        _ => return detail(StatusCode::BAD_REQUEST, "User is not valid to issue book!"),
    }
    let Some(book) = backend.books.iter_mut().find(|b| b.id == book_id) else {
        return detail(StatusCode::NOT_FOUND, "Book not found");
    };
    if book.copies == 0 {
        return detail(StatusCode::BAD_REQUEST, "No copies left to issue");
    }
    book.copies -= 1;

    let record = BookIssueRecord {
        id: backend.next_issue_id(),
        book_id,
        user_id,
        issued_by: None,
        issue_time: Some(Utc::now().naive_utc()),
        issue_status: IssueStatus::Issued,
    };
    backend.issues.push(record.clone());
    Json(record).into_response()
}

async fn issues_query(State(state): State<Shared>, Path(query): Path<String>) -> Response {
    let backend = state.lock();
    match keyed(&query) {
        ("get_all", None) => {
            let all: Vec<BookIssueDetails> = backend.issues.iter().map(|r| backend.details(r)).collect();
            Json(all).into_response()
        }
        _ => not_found(),
    }
}

async fn return_issue(State(state): State<Shared>, Path(query): Path<String>) -> Response {
    let mut backend = state.lock();
    let ("return_bookIssue", id) = keyed(&query) else {
        return not_found();
    };
    let id = id_of(id);
    let Some(record) = backend.issues.iter_mut().find(|r| Some(r.id) == id) else {
        return detail(StatusCode::NOT_FOUND, "Book issue not found");
    };
    if record.issue_status != IssueStatus::Issued {
        return detail(StatusCode::BAD_REQUEST, "Book is not issued");
    }
    record.issue_status = IssueStatus::Returned;
    let book_id = record.book_id;
    if let Some(book) = backend.books.iter_mut().find(|b| b.id == book_id) {
        book.copies += 1;
    }
    Json(json!({ "message": "Book returned successfully" })).into_response()
}

async fn remove_returned(State(state): State<Shared>, headers: HeaderMap, Path(query): Path<String>) -> Response {
    let mut backend = state.lock();
    if !backend.is_authorized(&headers) {
        return unauthorized();
    }
    let ("delete_returned_book", id) = keyed(&query) else {
        return not_found();
    };
    let id = id_of(id);
    let before = backend.issues.len();
    backend
        .issues
        .retain(|r| !(Some(r.id) == id && r.issue_status == IssueStatus::Returned));
    if backend.issues.len() == before {
        return detail(StatusCode::BAD_REQUEST, "Only returned books can be removed");
    }
    Json(json!({ "message": "Returned book removed" })).into_response()
}

/// `/get_bookIssues_by_user={id}` and `/update_bookIssue={id}` live at the root
async fn root_level(State(state): State<Shared>, method: Method, request: Request) -> Response {
    let segment = request.uri().path().trim_start_matches('/').to_string();
    let mut backend = state.lock();

    let (key, id) = keyed(&segment);
    let id = id_of(id);

    if method == Method::GET && key == "get_bookIssues_by_user" {
        let list: Vec<BookIssueDetails> = backend
            .issues
            .iter()
            .filter(|r| Some(r.user_id) == id)
            .map(|r| backend.details(r))
            .collect();
        return Json(list).into_response();
    }
    if method == Method::PUT && key == "update_bookIssue" {
        let Some(record) = backend.issues.iter_mut().find(|r| Some(r.id) == id) else {
            return detail(StatusCode::NOT_FOUND, "Book issue not found");
        };
        if record.issue_status != IssueStatus::Pending {
            return detail(StatusCode::BAD_REQUEST, "Book issue is not pending");
        }
        record.issue_status = IssueStatus::Issued;
        record.issued_by = Some(1);
        return Json(record.clone()).into_response();
    }
    not_found()
}
