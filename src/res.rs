use axum::{http::header, response::IntoResponse};
use time::{macros::format_description, OffsetDateTime};

use crate::session::{Notification, NotificationKind};

#[macro_export]
macro_rules! include_res {
    (bytes, $p:expr) => {
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
    (str, $p:expr) => {
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/res", $p))
    };
}

/// Fills `{key}` placeholders in one pass over the template. Inserted values
/// are never scanned again, and braces that name no value stay as written.
pub struct Template<'a> {
    source: &'a str,
    values: Vec<(&'a str, &'a str)>,
}

impl<'a> Template<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, values: Vec::new() }
    }

    pub fn with(mut self, key: &'a str, value: &'a str) -> Self {
        self.values.push((key, value));
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.source.len());
        let mut rest = self.source;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after.find('}').and_then(|close| {
                let key = &after[..close];
                self.values.iter().find(|(k, _)| *k == key).map(|(_, v)| (*v, close))
            });
            match value {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                },
                None => {
                    out.push('{');
                    rest = after;
                },
            }
        }
        out.push_str(rest);
        out
    }
}

pub async fn stylesheet() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/css")], include_res!(str, "/style.css"))
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Renders a description written in Markdown. Raw HTML in the source is
/// escaped rather than passed through.
pub fn markdown(source: &str) -> String {
    use pulldown_cmark::{html, Event, Parser};

    let parser = Parser::new(source).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        event => event,
    });

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);
    html_output
}

pub fn date(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_else(|_| at.to_string())
}

/// Value for an `<input type="datetime-local">`.
pub fn date_input(at: OffsetDateTime) -> String {
    at.format(format_description!("[year]-[month]-[day]T[hour]:[minute]"))
        .unwrap_or_default()
}

pub fn flash(notification: Option<Notification>) -> String {
    let Some(notification) = notification else {
        return String::new();
    };
    let class = match notification.kind {
        NotificationKind::Success => "flash success",
        NotificationKind::Error => "flash error",
    };
    let description = notification
        .description
        .map(|d| format!("<p>{}</p>", escape(&d)))
        .unwrap_or_default();
    format!(
        r#"<div class="{class}" role="status"><strong>{}</strong>{description}</div>"#,
        escape(&notification.title)
    )
}

/// Wraps page content in the shared layout.
pub fn page(title: &str, nav: &str, notification: Option<Notification>, content: &str) -> String {
    Template::new(include_res!(str, "/pages/layout.html"))
        .with("title", &escape(title))
        .with("nav", nav)
        .with("flash", &flash(notification))
        .with("content", content)
        .render()
}

pub fn student_nav(name: &str) -> String {
    Template::new(include_res!(str, "/pages/nav_student.html")).with("name", &escape(name)).render()
}

pub fn admin_nav(name: &str) -> String {
    Template::new(include_res!(str, "/pages/nav_admin.html")).with("name", &escape(name)).render()
}

pub fn attachment_link(file_url: Option<&str>) -> String {
    match file_url {
        Some(url) if !url.is_empty() => format!(
            r#"<a class="attachment" href="{}" target="_blank" rel="noopener noreferrer">Download Attachment</a>"#,
            escape(url)
        ),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_in_values_stay_literal() {
        let html = Template::new("<h1>{name}</h1><p>{description}</p>")
            .with("name", "{description} night")
            .with("description", "Bring {snacks}")
            .render();
        assert_eq!(html, "<h1>{description} night</h1><p>Bring {snacks}</p>");
    }

    #[test]
    fn unknown_and_unclosed_braces_pass_through() {
        let html = Template::new("a {b} {c} {").with("c", "C").render();
        assert_eq!(html, "a {b} C {");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<b a="1">&'"#), "&lt;b a=&quot;1&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn markdown_does_not_pass_raw_html() {
        let html = markdown("**exam** <script>alert(1)</script>");
        assert!(html.contains("<strong>exam</strong>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn flash_renders_title_and_description() {
        let html = flash(Some(Notification::error("Login Failed").describe("nope")));
        assert!(html.contains("flash error"));
        assert!(html.contains("Login Failed"));
        assert!(html.contains("<p>nope</p>"));
        assert_eq!(flash(None), "");
    }
}
