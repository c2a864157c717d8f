//! HTML templates for the interaction pages.
//!
//! Login, consent and error pages are rendered server side with no
//! template engine. All interpolated values go through [`html_escape`].

use crate::grant::MissingGrants;
use crate::interaction::{ConsentView, LoginView};

const STYLES: &str = r#"
:root {
    --primary: #3b3fe3;
    --primary-light: #5e85ff;
    --danger: #ff4d3d;
    --danger-bg: rgba(255, 77, 61, 0.15);
    --surface: #141629;
    --card: rgba(20, 22, 41, 0.85);
    --border: rgba(255, 255, 255, 0.08);
    --text: #f8f9fe;
    --text-secondary: #adb5bd;
    --text-dimmed: #6c757d;
    --radius: 6px;
}

* { margin: 0; padding: 0; box-sizing: border-box; }

body {
    font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
    background: radial-gradient(circle at top left, #1c1f40, #0d0e1a);
    min-height: 100vh;
    display: flex;
    justify-content: center;
    align-items: center;
    color: var(--text);
    line-height: 1.5;
}

.container { width: 100%; max-width: 420px; padding: 1rem; }

.card {
    background: var(--card);
    border: 1px solid var(--border);
    border-radius: 12px;
    padding: 1.5rem;
}

.card-title { font-size: 1.25rem; font-weight: 600; margin-bottom: 1rem; }

.form-group { margin-bottom: 1rem; }

.form-label {
    display: block;
    font-size: 0.875rem;
    color: var(--text-secondary);
    margin-bottom: 0.25rem;
}

.form-input {
    width: 100%;
    padding: 0.625rem 0.75rem;
    background: var(--surface);
    border: 1px solid var(--border);
    border-radius: var(--radius);
    color: var(--text);
    font-size: 0.875rem;
}

.form-input:focus { outline: none; border-color: var(--primary); }

.btn {
    display: inline-flex;
    justify-content: center;
    width: 100%;
    padding: 0.625rem 1rem;
    border: none;
    border-radius: var(--radius);
    font-size: 0.875rem;
    cursor: pointer;
    text-decoration: none;
}

.btn-primary { background: var(--primary); color: white; }
.btn-primary:hover { background: var(--primary-light); }

.btn-secondary {
    background: transparent;
    border: 1px solid var(--border);
    color: var(--text-secondary);
}
.btn-secondary:hover { border-color: var(--danger); color: var(--danger); }

.btn-group { display: flex; gap: 0.75rem; margin-top: 1rem; }
.btn-group > * { flex: 1; }

.alert {
    padding: 0.75rem 1rem;
    border-radius: var(--radius);
    font-size: 0.875rem;
    margin-bottom: 1rem;
    background: var(--danger-bg);
    border: 1px solid var(--danger);
    color: var(--danger);
}

.section-title {
    font-size: 0.75rem;
    text-transform: uppercase;
    color: var(--text-dimmed);
    margin-top: 1rem;
}

.grant-list { list-style: none; margin: 0.5rem 0; }

.grant-list li {
    padding: 0.375rem 0;
    border-bottom: 1px solid var(--border);
    font-size: 0.875rem;
}

.grant-list li:last-child { border-bottom: none; }

.muted { font-size: 0.75rem; color: var(--text-dimmed); }

.error-code {
    font-family: "SF Mono", monospace;
    font-size: 0.75rem;
    color: var(--text-dimmed);
}
"#;

/// Wraps page content in the shared document shell.
fn html_page(title: &str, content: &str) -> String {
    let mut html = String::with_capacity(content.len() + 2500);
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("    <meta charset=\"UTF-8\">\n");
    html.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    html.push_str("    <title>");
    html.push_str(&html_escape(title));
    html.push_str("</title>\n    <style>");
    html.push_str(STYLES);
    html.push_str("</style>\n</head>\n<body>\n    <div class=\"container\">\n");
    html.push_str(content);
    html.push_str("\n    </div>\n</body>\n</html>");
    html
}

/// Renders the login form.
///
/// The email field is pre-filled from `login_hint` and the flash, if any,
/// is shown above the form.
pub fn render_login(view: &LoginView) -> String {
    let uid = html_escape(&view.uid);
    let mut content = String::with_capacity(2048);

    content.push_str("<div class=\"card\">\n<div class=\"card-title\">Sign in to ");
    content.push_str(&html_escape(&view.client_name));
    content.push_str("</div>\n\n");

    if let Some(flash) = &view.flash {
        content.push_str("<div class=\"alert\">");
        content.push_str(&html_escape(flash));
        content.push_str("</div>\n\n");
    }

    content.push_str("<form method=\"POST\" action=\"/interaction/");
    content.push_str(&uid);
    content.push_str("/login\" autocomplete=\"off\">\n");

    content.push_str("<div class=\"form-group\">\n");
    content.push_str("<label class=\"form-label\" for=\"email\">Email</label>\n");
    content.push_str("<input type=\"email\" id=\"email\" name=\"email\" class=\"form-input\" ");
    content.push_str("required autocomplete=\"username\"");
    match &view.login_hint {
        Some(hint) => {
            content.push_str(" value=\"");
            content.push_str(&html_escape(hint));
            content.push_str("\">\n");
        }
        None => content.push_str(" autofocus>\n"),
    }
    content.push_str("</div>\n\n");

    content.push_str("<div class=\"form-group\">\n");
    content.push_str("<label class=\"form-label\" for=\"password\">Password</label>\n");
    content.push_str(
        "<input type=\"password\" id=\"password\" name=\"password\" class=\"form-input\" ",
    );
    content.push_str("required autocomplete=\"current-password\"");
    if view.login_hint.is_some() {
        content.push_str(" autofocus");
    }
    content.push_str(">\n</div>\n\n");

    content.push_str("<button type=\"submit\" class=\"btn btn-primary\">Sign in</button>\n");
    content.push_str("</form>\n\n");

    content.push_str("<div class=\"btn-group\"><a class=\"btn btn-secondary\" href=\"/interaction/");
    content.push_str(&uid);
    content.push_str("/abort\">Cancel</a></div>\n</div>");

    html_page("Sign-in", &content)
}

fn push_list<'a>(content: &mut String, title: &str, items: impl IntoIterator<Item = &'a str>) {
    let mut items = items.into_iter().peekable();
    if items.peek().is_none() {
        return;
    }
    content.push_str("<div class=\"section-title\">");
    content.push_str(&html_escape(title));
    content.push_str("</div>\n<ul class=\"grant-list\">\n");
    for item in items {
        content.push_str("<li>");
        content.push_str(&html_escape(item));
        content.push_str("</li>\n");
    }
    content.push_str("</ul>\n");
}

fn push_missing(content: &mut String, missing: &MissingGrants) {
    if missing.is_empty() {
        content.push_str("<p class=\"muted\">No new permissions are requested.</p>\n");
        return;
    }

    push_list(
        content,
        "Scopes",
        missing.oidc_scope.iter().map(String::as_str),
    );
    push_list(
        content,
        "Claims",
        missing.oidc_claims.iter().map(String::as_str),
    );
    for (indicator, scopes) in &missing.resource_scopes {
        push_list(
            content,
            &format!("Access to {indicator}"),
            scopes.iter().map(String::as_str),
        );
    }
}

/// Renders the consent page listing what the client asks for.
pub fn render_consent(view: &ConsentView) -> String {
    let uid = html_escape(&view.uid);
    let mut content = String::with_capacity(2048);

    content.push_str("<div class=\"card\">\n<div class=\"card-title\">Authorize ");
    content.push_str(&html_escape(&view.client_name));
    content.push_str("</div>\n");
    content.push_str("<div class=\"muted\">Client ID: ");
    content.push_str(&html_escape(&view.client_id));
    content.push_str("</div>\n\n");

    push_missing(&mut content, &view.missing);

    content.push_str("\n<form method=\"POST\" action=\"/interaction/");
    content.push_str(&uid);
    content.push_str("/confirm\" autocomplete=\"off\">\n");
    content.push_str("<input type=\"hidden\" name=\"prompt\" value=\"");
    content.push_str(&html_escape(view.prompt.as_str()));
    content.push_str("\">\n<div class=\"btn-group\">\n");
    content.push_str("<a class=\"btn btn-secondary\" href=\"/interaction/");
    content.push_str(&uid);
    content.push_str("/abort\">Cancel</a>\n");
    content.push_str("<button type=\"submit\" class=\"btn btn-primary\" autofocus>Continue</button>\n");
    content.push_str("</div>\n</form>\n</div>");

    html_page("Authorize", &content)
}

/// Renders an error page.
///
/// # Arguments
///
/// * `error_code` - Short machine-readable code (e.g. `server_error`)
/// * `description` - Message shown to the end user
pub fn render_error_page(error_code: &str, description: &str) -> String {
    let mut content = String::with_capacity(512);
    content.push_str("<div class=\"card\" style=\"text-align: center;\">\n");
    content.push_str("<div class=\"card-title\">Something went wrong</div>\n");
    content.push_str("<p class=\"muted\">");
    content.push_str(&html_escape(description));
    content.push_str("</p>\n<p class=\"error-code\">");
    content.push_str(&html_escape(error_code));
    content.push_str("</p>\n</div>");
    html_page("Error", &content)
}

/// Escapes HTML special characters.
pub fn html_escape(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::interaction::{AuthorizationParams, PromptName};

    fn login_view() -> LoginView {
        LoginView {
            uid: "uid-1".into(),
            client_id: "foo".into(),
            client_name: "Foo <App>".into(),
            params: AuthorizationParams::default(),
            login_hint: None,
            flash: None,
        }
    }

    #[test]
    fn test_login_form_posts_to_login() {
        let html = render_login(&login_view());
        assert!(html.contains("action=\"/interaction/uid-1/login\""));
        assert!(html.contains("Foo &lt;App&gt;"));
        assert!(!html.contains("class=\"alert\""));
    }

    #[test]
    fn test_login_form_with_flash_and_hint() {
        let view = LoginView {
            login_hint: Some("a@x.com".into()),
            flash: Some("Invalid email or password.".into()),
            ..login_view()
        };
        let html = render_login(&view);
        assert!(html.contains("Invalid email or password."));
        assert!(html.contains("value=\"a@x.com\""));
    }

    #[test]
    fn test_consent_lists_missing_grants() {
        let view = ConsentView {
            uid: "uid-2".into(),
            client_id: "foo".into(),
            client_name: "Foo".into(),
            params: AuthorizationParams::default(),
            prompt: PromptName::Consent,
            missing: MissingGrants {
                oidc_scope: vec!["openid".into(), "email".into()],
                oidc_claims: vec!["email_verified".into()],
                resource_scopes: BTreeMap::from([(
                    "https://api.example.com".to_string(),
                    vec!["api:read".to_string()],
                )]),
            },
        };
        let html = render_consent(&view);
        assert!(html.contains("action=\"/interaction/uid-2/confirm\""));
        assert!(html.contains("href=\"/interaction/uid-2/abort\""));
        assert!(html.contains("<li>email</li>"));
        assert!(html.contains("<li>email_verified</li>"));
        assert!(html.contains("Access to https://api.example.com"));
        assert!(html.contains("<li>api:read</li>"));
    }

    #[test]
    fn test_error_page() {
        let html = render_error_page("server_error", "Interaction sequence violation");
        assert!(html.contains("server_error"));
        assert!(html.contains("Interaction sequence violation"));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<script>"), "&lt;script&gt;");
        assert_eq!(html_escape("a&b"), "a&amp;b");
        assert_eq!(html_escape("\"q\""), "&quot;q&quot;");
    }
}
