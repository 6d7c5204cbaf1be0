use serde::Deserialize;
use tide::http::{Cookie, StatusCode};
use tide::{Redirect, Request, Response};

use crate::web::html::utils::render;

pub const AUTH_COOKIE: &str = "memory-lane-auth";
pub const LOGIN_PATH: &str = "/login";

pub(super) fn mount(app: &mut tide::Server<crate::State>) {
    app.at(LOGIN_PATH).get(login_page).post(login);
    app.at("/logout").get(logout);
}

/// Redirects every page to the login form until the shared password has been
/// entered. API routes answer 401 instead.
#[derive(Debug, Default)]
pub(super) struct PasswordGate;

#[async_trait::async_trait]
impl tide::Middleware<crate::State> for PasswordGate {
    async fn handle(
        &self,
        req: Request<crate::State>,
        next: tide::Next<'_, crate::State>,
    ) -> tide::Result {
        let authenticated = is_authenticated(&req);
        let path = req.url().path();

        if path == LOGIN_PATH {
            if authenticated {
                return Ok(Redirect::new("/").into());
            }
        } else if !authenticated {
            if path.starts_with("/api/") {
                return Ok(Response::new(StatusCode::Unauthorized));
            }
            return Ok(Redirect::new(LOGIN_PATH).into());
        }

        Ok(next.run(req).await)
    }
}

pub(crate) fn is_authenticated(req: &Request<crate::State>) -> bool {
    match req.cookie(AUTH_COOKIE) {
        Some(cookie) => cookie.value() == req.state().args.site_password,
        None => false,
    }
}

fn auth_cookie(state: &crate::State) -> Cookie<'static> {
    Cookie::build(AUTH_COOKIE, state.args.site_password.clone())
        .path("/")
        .http_only(true)
        .secure(state.args.secure_cookies)
        .permanent()
        .finish()
}

fn login_response(state: &crate::State, error: Option<&str>, status: StatusCode) -> tide::Result {
    let mut context = tera::Context::new();
    context.insert("title", "private album");
    context.insert("canonical_href", &format!("{}{}", state.args.base_url, LOGIN_PATH));
    context.insert("error", &error);

    let body = render(state, "login.html", &context)?;
    Ok(Response::builder(status)
        .content_type("text/html")
        .body(body)
        .build())
}

async fn login_page(req: Request<crate::State>) -> tide::Result {
    login_response(req.state(), None, StatusCode::Ok)
}

#[derive(Deserialize)]
struct LoginForm {
    password: String,
}

async fn login(mut req: Request<crate::State>) -> tide::Result {
    let form: LoginForm = req.body_form().await?;
    let state = req.state();

    if form.password != state.args.site_password {
        tracing::info!("rejected login attempt");
        return login_response(state, Some("Incorrect password"), StatusCode::Unauthorized);
    }

    let mut res: Response = Redirect::new("/").into();
    res.insert_cookie(auth_cookie(state));
    Ok(res)
}

async fn logout(_req: Request<crate::State>) -> tide::Result {
    let mut res: Response = Redirect::new(LOGIN_PATH).into();
    res.remove_cookie(Cookie::build(AUTH_COOKIE, "").path("/").finish());
    Ok(res)
}
