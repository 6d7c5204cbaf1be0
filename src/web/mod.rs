pub mod api;
pub mod auth;
pub mod html;

pub(super) fn mount(app: &mut tide::Server<crate::State>) {
    app.with(auth::PasswordGate);
    auth::mount(app);
    html::mount(app);
    api::mount(app.at("/api"));
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{json, Value};
    use structopt::StructOpt;
    use tide::http::{mime, Method, Request, Response, StatusCode, Url};
    use time::UtcOffset;

    use super::auth::AUTH_COOKIE;
    use crate::cache::TimelineCache;
    use crate::db::comments::MemoryCommentStore;
    use crate::icloud::{StreamTransport, TransportResponse};
    use crate::sources::PhotoSource;
    use crate::{Args, State};

    const PASSWORD: &str = "open sesame";
    const PASSWORD_COOKIE: &str = "open%20sesame";

    #[derive(Debug)]
    struct UnavailableTransport;

    #[async_trait::async_trait]
    impl StreamTransport for UnavailableTransport {
        async fn post(&self, _url: &str, _body: Vec<u8>) -> Result<TransportResponse, isahc::Error> {
            Ok(TransportResponse {
                status: isahc::http::StatusCode::INTERNAL_SERVER_ERROR,
                body: Vec::new(),
            })
        }
    }

    fn photos_json() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("tempfile");
        let records = json!([
            {
                "id": "beach.jpg",
                "url": "/photos/beach.jpg",
                "date": "2021-07-14T16:00:00Z",
                "location": { "lat": 50.82, "lng": -0.13, "name": "Brighton" },
                "caption": "Memory: beach",
            },
            {
                "id": "snow.jpg",
                "url": "/photos/snow.jpg",
                "date": "2019-01-03T09:00:00Z",
                "location": { "lat": 51.5074, "lng": -0.1278 },
                "caption": "Memory: snow",
            },
        ]);
        write!(file, "{}", records).expect("write");
        file
    }

    fn app(photos: &tempfile::NamedTempFile) -> tide::Server<State> {
        app_with(local_source(photos), PASSWORD)
    }

    fn local_source(photos: &tempfile::NamedTempFile) -> PhotoSource {
        PhotoSource::LocalManifest {
            path: photos.path().to_path_buf(),
            offset: UtcOffset::UTC,
        }
    }

    fn app_with(source: PhotoSource, password: &str) -> tide::Server<State> {
        let args = Args::from_iter(vec![
            "memory-lane",
            "--base-url",
            "http://album.test",
            "--site-password",
            password,
        ]);
        let tera = tera::Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*.html"))
            .expect("templates");

        let state = State {
            args: Arc::new(args),
            comments: Arc::new(MemoryCommentStore::new()),
            source: Arc::new(source),
            timeline: Arc::new(TimelineCache::new(Duration::from_secs(60))),
            tera: Arc::new(tera),
        };

        let mut app = tide::with_state(state);
        super::mount(&mut app);
        app
    }

    fn request(method: Method, path: &str, cookie: Option<&str>) -> Request {
        let url = Url::parse(&format!("http://album.test{}", path)).expect("url");
        let mut req = Request::new(method, url);
        if let Some(cookie) = cookie {
            req.insert_header("Cookie", format!("{}={}", AUTH_COOKIE, cookie));
        }
        req
    }

    async fn send(app: &tide::Server<State>, req: Request) -> Response {
        app.respond(req).await.expect("response")
    }

    fn location(res: &Response) -> String {
        res.header("Location")
            .map(|values| values.last().as_str().to_string())
            .unwrap_or_default()
    }

    #[async_std::test]
    async fn pages_redirect_to_login_without_cookie() {
        let photos = photos_json();
        let app = app(&photos);

        let res = send(&app, request(Method::Get, "/", None)).await;
        assert_eq!(res.status(), StatusCode::Found);
        assert_eq!(location(&res), "/login");

        let res = send(&app, request(Method::Get, "/", Some("wrong"))).await;
        assert_eq!(location(&res), "/login");
    }

    #[async_std::test]
    async fn api_rejects_without_cookie() {
        let photos = photos_json();
        let app = app(&photos);

        let res = send(&app, request(Method::Get, "/api/v1/photos", None)).await;
        assert_eq!(res.status(), StatusCode::Unauthorized);
    }

    #[async_std::test]
    async fn login_sets_cookie_on_correct_password() {
        let photos = photos_json();
        let app = app(&photos);

        let res = send(&app, request(Method::Get, "/login", None)).await;
        assert_eq!(res.status(), StatusCode::Ok);

        let mut req = request(Method::Post, "/login", None);
        req.set_body("password=nope");
        req.set_content_type(mime::FORM);
        let mut res = send(&app, req).await;
        assert_eq!(res.status(), StatusCode::Unauthorized);
        assert!(res.body_string().await.expect("body").contains("Incorrect password"));

        let mut req = request(Method::Post, "/login", None);
        req.set_body("password=open+sesame");
        req.set_content_type(mime::FORM);
        let res = send(&app, req).await;
        assert_eq!(res.status(), StatusCode::Found);
        assert_eq!(location(&res), "/");
        let cookie = set_cookie(&res);
        assert!(cookie.starts_with(&format!("{}={};", AUTH_COOKIE, PASSWORD_COOKIE)));
        assert!(cookie.contains("HttpOnly"));
    }

    #[async_std::test]
    async fn login_page_redirects_home_once_authenticated() {
        let photos = photos_json();
        let app = app(&photos);

        let res = send(&app, request(Method::Get, "/login", Some(PASSWORD_COOKIE))).await;
        assert_eq!(res.status(), StatusCode::Found);
        assert_eq!(location(&res), "/");
    }

    #[async_std::test]
    async fn timeline_lists_years() {
        let photos = photos_json();
        let app = app(&photos);

        let mut res = send(&app, request(Method::Get, "/", Some(PASSWORD_COOKIE))).await;
        assert_eq!(res.status(), StatusCode::Ok);

        let body = res.body_string().await.expect("body");
        let newer = body.find("year-2021").expect("2021 section");
        let older = body.find("year-2019").expect("2019 section");
        assert!(newer < older);
        assert!(body.contains("/photos/beach.jpg"));
        assert!(body.contains("Brighton"));
    }

    #[async_std::test]
    async fn photos_api_returns_year_groups() {
        let photos = photos_json();
        let app = app(&photos);

        let mut res = send(&app, request(Method::Get, "/api/v1/photos", Some(PASSWORD_COOKIE))).await;
        assert_eq!(res.status(), StatusCode::Ok);

        let body: Value = res.body_json().await.expect("json");
        assert_eq!(body["2021"][0]["id"], "beach.jpg");
        assert_eq!(body["2019"][0]["id"], "snow.jpg");
    }

    #[async_std::test]
    async fn comments_round_trip() {
        let photos = photos_json();
        let app = app(&photos);
        let path = "/api/v1/photo/beach.jpg/comments";

        let mut res = send(&app, request(Method::Get, path, Some(PASSWORD_COOKIE))).await;
        let body: Value = res.body_json().await.expect("json");
        assert_eq!(body, json!([]));

        let mut req = request(Method::Post, path, Some(PASSWORD_COOKIE));
        req.set_body(json!({ "type": "reaction", "emoji": "❤️" }));
        let mut res = send(&app, req).await;
        assert_eq!(res.status(), StatusCode::Created);
        let body: Value = res.body_json().await.expect("json");
        assert_eq!(body["success"], true);
        assert_eq!(body["updated"][0]["emoji"], "❤️");

        let mut req = request(Method::Post, path, Some(PASSWORD_COOKIE));
        req.set_body(json!({ "type": "comment", "text": "  " }));
        let res = send(&app, req).await;
        assert_eq!(res.status(), StatusCode::BadRequest);

        let mut res = send(&app, request(Method::Get, path, Some(PASSWORD_COOKIE))).await;
        let body: Value = res.body_json().await.expect("json");
        assert_eq!(body.as_array().map(Vec::len), Some(1));
        assert_eq!(body[0]["type"], "reaction");
    }

    fn set_cookie(res: &Response) -> String {
        res.header("Set-Cookie")
            .map(|values| values.last().as_str().to_string())
            .expect("cookie")
    }

    #[async_std::test]
    async fn percent_signs_in_password_survive_the_cookie() {
        let photos = photos_json();
        let app = app_with(local_source(&photos), "100%25 sure");

        let mut req = request(Method::Post, "/login", None);
        req.set_body("password=100%2525+sure");
        req.set_content_type(mime::FORM);
        let res = send(&app, req).await;
        assert_eq!(res.status(), StatusCode::Found);

        let set_cookie = set_cookie(&res);
        let pair = set_cookie.split(';').next().expect("name=value");
        let mut req = request(Method::Get, "/", None);
        req.insert_header("Cookie", pair);
        let res = send(&app, req).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[async_std::test]
    async fn logout_clears_cookie() {
        let photos = photos_json();
        let app = app(&photos);

        let res = send(&app, request(Method::Get, "/logout", Some(PASSWORD_COOKIE))).await;
        assert_eq!(res.status(), StatusCode::Found);
        assert_eq!(location(&res), "/login");
        let cookie = set_cookie(&res);
        assert!(cookie.starts_with(&format!("{}=;", AUTH_COOKIE)));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[async_std::test]
    async fn failed_album_load_is_bad_gateway() {
        let source = PhotoSource::shared_album(
            UnavailableTransport,
            "stream",
            Duration::from_secs(5),
            UtcOffset::UTC,
        );
        let app = app_with(source, PASSWORD);

        let res = send(&app, request(Method::Get, "/", Some(PASSWORD_COOKIE))).await;
        assert_eq!(res.status(), StatusCode::BadGateway);

        let mut res = send(&app, request(Method::Get, "/api/v1/photos", Some(PASSWORD_COOKIE))).await;
        assert_eq!(res.status(), StatusCode::BadGateway);
        let body: Value = res.body_json().await.expect("json");
        assert_eq!(body["reason"], "resolving the shared album failed");
    }
}
