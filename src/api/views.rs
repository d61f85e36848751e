//! Server-rendered HTML views
//!
//! Every view is a plain function returning an HTML string. User-supplied
//! text goes through `html_escape` before it reaches the page.

use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};

use crate::data::{PublicRepository, RepositorySummary, User};

const APP_NAME: &str = "ConNix";

/// Signed-in user as shown in the page header
#[derive(Debug, Clone)]
pub struct ViewUser {
    pub name: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub unread_notifications: i64,
}

impl ViewUser {
    pub fn new(user: &User, unread_notifications: i64) -> Self {
        Self {
            name: user.name.clone(),
            username: user.username.clone(),
            avatar_url: user.github_avatar.clone(),
            unread_notifications,
        }
    }
}

/// Bare page shell
pub fn base(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="/static/app.css">
</head>
<body>
{body}
</body>
</html>
"#,
        title = text(title),
        body = body,
    )
}

/// Page shell with the signed-in navigation bar
pub fn layout(user: &ViewUser, title: &str, body: &str) -> String {
    let avatar = user
        .avatar_url
        .as_deref()
        .map(|url| {
            format!(
                r#"<img class="avatar" src="{}" alt="{}" width="32" height="32">"#,
                attr(url),
                attr(&user.username)
            )
        })
        .unwrap_or_default();

    let badge = if user.unread_notifications > 0 {
        format!(
            r#" <span class="badge" data-unread="{0}">{0}</span>"#,
            user.unread_notifications
        )
    } else {
        String::new()
    };

    let shell = format!(
        r#"<header class="navbar">
<a class="brand" href="/dashboard">{app}</a>
<nav>
<a href="/explore">Explore</a>
<a href="/feed">Feed</a>
<a href="/notifications">Notifications{badge}</a>
</nav>
<div class="account">
{avatar}
<a href="/users/{profile}">{name}</a>
<a href="/logout">Sign out</a>
</div>
</header>
<main>
{body}
</main>"#,
        app = APP_NAME,
        badge = badge,
        avatar = avatar,
        profile = attr(&urlencoding::encode(&user.username)),
        name = text(&user.name),
        body = body,
    );

    base(&format!("{} - {}", title, APP_NAME), &shell)
}

pub fn home() -> String {
    base(
        APP_NAME,
        &format!(
            r#"<main class="hero">
<h1>{APP_NAME}</h1>
<p>Host your code, follow other developers and build together.</p>
<a class="button" href="/login">Get started</a>
<a href="/explore">Explore repositories</a>
</main>"#
        ),
    )
}

pub fn login() -> String {
    base(
        &format!("Sign in - {}", APP_NAME),
        &format!(
            r#"<main class="login">
<h1>Sign in to {APP_NAME}</h1>
<a class="button" href="/auth/github">Sign in with GitHub</a>
</main>"#
        ),
    )
}

fn visibility(is_private: bool) -> &'static str {
    if is_private { "Private" } else { "Public" }
}

fn description(description: Option<&str>) -> String {
    match description.filter(|d| !d.is_empty()) {
        Some(d) => format!(r#"<p class="description">{}</p>"#, text(d)),
        None => r#"<p class="description empty">No description provided</p>"#.to_string(),
    }
}

fn repository_href(owner: &str, slug: &str) -> String {
    format!(
        "/{}/{}",
        urlencoding::encode(owner),
        urlencoding::encode(slug)
    )
}

/// Dashboard body: the user's most recently updated repositories
pub fn dashboard(user: &ViewUser, repositories: &[RepositorySummary]) -> String {
    let mut body = format!(
        r#"<h1>Welcome back, {}!</h1>
<section class="repositories">
<h2>Your Repositories</h2>
<a class="button" href="/repositories/create">New Repository</a>
"#,
        text(&user.name)
    );

    if repositories.is_empty() {
        body.push_str(r#"<p class="empty">No repositories yet</p>"#);
    } else {
        body.push_str("<ul>\n");
        for repository in repositories {
            body.push_str(&format!(
                r#"<li class="repository" data-id="{id}"><a href="{href}">{name}</a> <span class="visibility">{visibility}</span>{description}</li>
"#,
                id = repository.id,
                href = attr(&repository_href(&user.username, &repository.slug)),
                name = text(&repository.name),
                visibility = visibility(repository.is_private),
                description = description(repository.description.as_deref()),
            ));
        }
        body.push_str("</ul>\n");
    }

    body.push_str("</section>");
    body
}

/// Explore body: recent public repositories
pub fn explore(repositories: &[PublicRepository]) -> String {
    let mut body = String::from("<h1>Explore</h1>\n<section class=\"repositories\">\n");

    if repositories.is_empty() {
        body.push_str(r#"<p class="empty">No public repositories yet</p>"#);
    } else {
        body.push_str("<ul>\n");
        for repository in repositories {
            let owner = repository.owner_name.as_deref().unwrap_or_default();
            body.push_str(&format!(
                r#"<li class="repository" data-id="{id}"><a href="{href}">{owner}/{name}</a>{description}</li>
"#,
                id = repository.id,
                href = attr(&repository_href(owner, &repository.slug)),
                owner = text(owner),
                name = text(&repository.name),
                description = description(repository.description.as_deref()),
            ));
        }
        body.push_str("</ul>\n");
    }

    body.push_str("</section>");
    body
}
