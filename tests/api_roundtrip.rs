use std::io::Read;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use blog_tui::api::{self, ApiError, NewPost};
use blog_tui::data::{classify, HttpPostService, PostService};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tiny_http::{Header, Method, Response, Server};

const PASSKEY: &str = "hunter2";

struct FakeBlog {
    server: Arc<Server>,
    worker: Option<JoinHandle<()>>,
    base_url: String,
    posts: Arc<Mutex<Vec<Value>>>,
}

impl FakeBlog {
    fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("bind fake blog"));
        let addr = server.server_addr().to_ip().expect("tcp listener");
        let posts = Arc::new(Mutex::new(vec![json!({
            "id": "srv-1",
            "tag": "LOG_001",
            "date": "2025.01.01",
            "title": "First",
            "teaser": "t",
            "content": "# First"
        })]));

        let worker = {
            let server = server.clone();
            let posts = posts.clone();
            thread::spawn(move || {
                for request in server.incoming_requests() {
                    handle(request, &posts);
                }
            })
        };

        Self {
            server,
            worker: Some(worker),
            base_url: format!("http://{addr}"),
            posts,
        }
    }

    fn stop(&mut self) {
        self.server.unblock();
        if let Some(worker) = self.worker.take() {
            worker.join().expect("fake blog thread");
        }
    }
}

impl Drop for FakeBlog {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle(mut request: tiny_http::Request, posts: &Mutex<Vec<Value>>) {
    let authorized = request
        .headers()
        .iter()
        .any(|header| header.field.equiv("Authorization") && header.value.as_str() == PASSKEY);
    let json_header =
        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).expect("header");

    let method = request.method().clone();
    let url = request.url().to_string();
    let response = match (method, url.as_str()) {
        (Method::Get, "/api/posts") => {
            Response::from_string(Value::Array(posts.lock().clone()).to_string())
                .with_header(json_header)
        }
        (Method::Get, "/api/timeline") => Response::from_string(
            json!([{ "year": "2024", "title": "The Spark", "desc": "Found my calling." }])
                .to_string(),
        )
        .with_header(json_header),
        (Method::Get, "/") => Response::from_string("<html>shell</html>"),
        (Method::Post, "/api/posts") if !authorized => {
            Response::from_string("Unauthorized").with_status_code(401)
        }
        (Method::Post, "/api/posts") => {
            let mut body = String::new();
            request
                .as_reader()
                .read_to_string(&mut body)
                .expect("read body");
            let mut post: Value = serde_json::from_str(&body).expect("json body");
            let tag = post["tag"].as_str().unwrap_or_default().to_lowercase();
            let mut posts = posts.lock();
            let duplicate = posts
                .iter()
                .any(|p| p["tag"].as_str().unwrap_or_default().to_lowercase() == tag);
            if duplicate {
                Response::from_string("Duplicate Tag").with_status_code(409)
            } else {
                post["id"] = json!(format!("srv-{}", posts.len() + 1));
                posts.insert(0, post);
                Response::from_string("Created").with_status_code(201)
            }
        }
        _ => Response::from_string("Not Found").with_status_code(404),
    };
    let _ = request.respond(response);
}

fn service(blog: &FakeBlog) -> HttpPostService {
    let client = api::Client::new(api::ClientConfig {
        base_url: blog.base_url.clone(),
        user_agent: "blog-tui-tests".into(),
        timeout: Some(Duration::from_secs(5)),
        http_client: None,
    })
    .expect("client");
    HttpPostService::new(Arc::new(client))
}

fn draft(tag: &str, title: &str) -> NewPost {
    NewPost {
        tag: tag.into(),
        date: "2025.10.01".into(),
        title: title.into(),
        teaser: "teaser".into(),
        content: "body".into(),
    }
}

#[test]
fn reads_posts_and_timeline() {
    let blog = FakeBlog::start();
    let service = service(&blog);

    let posts = service.list_posts().expect("list posts");
    assert!(!posts.is_offline());
    assert_eq!(posts.data.len(), 1);
    assert_eq!(posts.data[0].title, "First");

    let timeline = service.timeline().expect("timeline");
    assert_eq!(timeline.data[0].title, "The Spark");
    assert_eq!(service.precache(), 2);
}

#[test]
fn create_sends_passkey_and_reload_sees_server_id() {
    let blog = FakeBlog::start();
    let service = service(&blog);
    service.list_posts().expect("warm cache");

    service
        .create(&draft("LOG_002", "Second"), PASSKEY)
        .expect("create");
    let posts = service.list_posts().expect("reload").data;
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].title, "Second");
    assert_eq!(posts[0].id, "srv-2");
    assert_eq!(blog.posts.lock().len(), 2);
}

#[test]
fn rejected_writes_map_to_error_kinds() {
    let blog = FakeBlog::start();
    let service = service(&blog);

    let err = service
        .create(&draft("LOG_009", "Nope"), "wrong")
        .unwrap_err();
    assert_eq!(classify(&err), ApiError::Auth);

    let err = service
        .create(&draft("log_001", "Clash"), PASSKEY)
        .unwrap_err();
    assert_eq!(classify(&err), ApiError::Conflict("Duplicate Tag".into()));
    assert_eq!(blog.posts.lock().len(), 1);
}

#[test]
fn unreachable_backend_serves_cached_posts() {
    let mut blog = FakeBlog::start();
    let service = service(&blog);
    service.list_posts().expect("warm cache");

    blog.stop();
    drop(blog);

    let posts = service.list_posts().expect("cached copy");
    let cached_at = posts.cached_at.expect("offline copy carries its fetch time");
    assert!(cached_at <= chrono::Utc::now());
    assert_eq!(posts.data[0].id, "srv-1");

    let err = service.search_index().unwrap_err();
    assert!(classify(&err).is_network());
}
