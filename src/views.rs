//! Server-rendered HTML pages.

use crate::domain::{EventCatalog, Field, SignupForm, ValidationErrors};
use crate::model::SignupRecord;

const TITLE: &str = "Kansas City FIFA Fan Fest Signup";

/// Notice shown when a signup reuses a recently registered email
pub const DUPLICATE_NOTICE: &str = "This email has already been registered.";

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn page(title: &str, body: &str) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"UTF-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
    html.push_str("<style>\n");
    html.push_str("  body { font-family: system-ui, sans-serif; max-width: 640px; margin: 2rem auto; padding: 0 1rem; color: #1a1a1a; }\n");
    html.push_str("  label { display: block; font-weight: 600; margin-top: 1rem; }\n");
    html.push_str("  input[type=text], input[type=email], input[type=tel] { width: 100%; padding: 0.5rem; }\n");
    html.push_str("  .errors { color: #b00020; margin: 0.25rem 0; padding-left: 1rem; }\n");
    html.push_str("  .notice { background: #fff4e5; border: 1px solid #f0b429; padding: 0.75rem; }\n");
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");
    html.push_str(body);
    html.push_str("</body>\n</html>\n");
    html
}

fn field_errors(errors: Option<&ValidationErrors>, field: Field) -> String {
    let Some(messages) = errors.and_then(|errors| errors.get(field)) else {
        return String::new();
    };

    let mut html = format!("<ul class=\"errors\" id=\"{}-errors\">\n", field);
    for message in messages {
        html.push_str(&format!("<li>{}</li>\n", escape_html(&message.to_string())));
    }
    html.push_str("</ul>\n");
    html
}

fn text_input(
    field: Field,
    label: &str,
    kind: &str,
    value: &str,
    errors: Option<&ValidationErrors>,
) -> String {
    let mut html = format!("<label for=\"{0}\">{1}</label>\n", field, label);
    html.push_str(&format!(
        "<input type=\"{0}\" id=\"{1}\" name=\"{1}\" value=\"{2}\">\n",
        kind,
        field,
        escape_html(value)
    ));
    html.push_str(&field_errors(errors, field));
    html
}

/// Render the signup form.
///
/// `form` re-populates the inputs after a rejected submission; `notice` is shown above the form.
pub fn signup_form(
    catalog: &EventCatalog,
    form: &SignupForm,
    errors: Option<&ValidationErrors>,
    notice: Option<&str>,
) -> String {
    let mut body = format!("<h1>{}</h1>\n", TITLE);

    if let Some(notice) = notice {
        body.push_str(&format!(
            "<p class=\"notice\" role=\"alert\">{}</p>\n",
            escape_html(notice)
        ));
    }

    body.push_str("<form method=\"post\" action=\"/signup\">\n");
    body.push_str(&text_input(Field::Name, "Name", "text", &form.name, errors));
    body.push_str(&text_input(Field::Email, "Email", "email", &form.email, errors));
    body.push_str(&text_input(
        Field::Phone,
        "Phone (optional, for a text confirmation)",
        "tel",
        &form.phone,
        errors,
    ));
    body.push_str(&text_input(
        Field::ZipCode,
        "Zip code",
        "text",
        &form.zip_code,
        errors,
    ));

    body.push_str("<fieldset>\n<legend>Events you are interested in</legend>\n");
    for (i, label) in catalog.labels().enumerate() {
        let checked = if form.events_interested.iter().any(|selected| selected == label) {
            " checked"
        } else {
            ""
        };
        body.push_str(&format!(
            "<div><input type=\"checkbox\" id=\"{0}-{1}\" name=\"{0}\" value=\"{2}\"{3}> <label for=\"{0}-{1}\" style=\"display:inline\">{2}</label></div>\n",
            Field::EventsInterested,
            i,
            escape_html(label),
            checked
        ));
    }
    body.push_str(&field_errors(errors, Field::EventsInterested));
    body.push_str("</fieldset>\n");

    body.push_str("<button type=\"submit\">Sign up</button>\n</form>\n");

    page(TITLE, &body)
}

/// Confirmation page for a stored signup
pub fn success_page(record: &SignupRecord) -> String {
    let mut body = String::from("<h1>You're signed up!</h1>\n");
    body.push_str(&format!(
        "<p>Thanks, <strong>{}</strong>. We'll keep <strong>{}</strong> posted about the Kansas City FIFA Fan Fest.</p>\n",
        escape_html(&record.name),
        escape_html(&record.email)
    ));
    if record.phone.is_some() {
        body.push_str("<p>A confirmation text is on its way.</p>\n");
    }
    body.push_str("<p><a href=\"/\">Back to the signup form</a></p>\n");

    page(TITLE, &body)
}

pub fn not_found_page() -> String {
    page(
        TITLE,
        "<h1>Not found</h1>\n<p>We couldn't find that page.</p>\n<p><a href=\"/\">Back to the signup form</a></p>\n",
    )
}

pub fn error_page() -> String {
    page(
        TITLE,
        "<h1>Something went wrong</h1>\n<p>We couldn't complete your request. Please try again in a few minutes.</p>\n<p><a href=\"/\">Back to the signup form</a></p>\n",
    )
}

pub fn too_many_requests_page() -> String {
    page(
        TITLE,
        "<h1>Slow down</h1>\n<p>Too many requests. Please wait a minute and try again.</p>\n",
    )
}
