use crate::server::middleware::{client_ip, found, session_id};
use crate::server::session::SESSION_COOKIE;
use crate::server::state::AppState;
use crate::server::views;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Response};
use axum::Form;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::net::SocketAddr;

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
}

pub async fn login_page(Query(query): Query<LoginQuery>) -> Html<String> {
    Html(views::login_page(query.error.as_deref()))
}

pub async fn login_submit(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));

    if form.password != state.settings.web_password {
        tracing::warn!("❌ Wrong password, login rejected. IP: {}", ip);
        return found("/login?error=Invalid%20password");
    }

    let id = state.sessions.create(&ip).await;
    let cookie = Cookie::build((SESSION_COOKIE, id))
        .path("/")
        .max_age(time::Duration::seconds(
            i64::try_from(state.settings.session_timeout).unwrap_or(i64::MAX),
        ))
        .http_only(true)
        .secure(state.settings.is_production())
        .same_site(SameSite::Lax)
        .build();

    (jar.add(cookie), found("/")).into_response()
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> Response {
    if let Some(id) = session_id(&headers) {
        state.sessions.remove(&id).await;
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, found("/login")).into_response()
}
