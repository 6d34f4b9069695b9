use askama::Template;
use chrono::NaiveDate;

use crate::models::OverdueCheckout;

struct ReportRow<'a> {
    user_name: &'a str,
    user_email: &'a str,
    book_name: &'a str,
    due_date: NaiveDate,
    days_overdue: i64,
}

#[derive(Template)]
#[template(path = "email/overdue_report.html")]
struct OverdueReportTemplate<'a> {
    as_of: NaiveDate,
    rows: Vec<ReportRow<'a>>,
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetTemplate<'a> {
    reset_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/temporary_password.html")]
struct TemporaryPasswordTemplate<'a> {
    password: &'a str,
}

#[derive(Template)]
#[template(path = "email/verify_email.html")]
struct VerifyEmailTemplate<'a> {
    verify_url: &'a str,
}

pub fn render_overdue_report(
    as_of: NaiveDate,
    checkouts: &[OverdueCheckout],
) -> Result<String, askama::Error> {
    let rows = checkouts
        .iter()
        .map(|c| ReportRow {
            user_name: &c.user_name,
            user_email: &c.user_email,
            book_name: &c.book_name,
            due_date: c.due_date,
            days_overdue: c.days_overdue(as_of),
        })
        .collect();
    OverdueReportTemplate { as_of, rows }.render()
}

pub fn render_password_reset(reset_url: &str) -> Result<String, askama::Error> {
    PasswordResetTemplate { reset_url }.render()
}

pub fn render_temporary_password(password: &str) -> Result<String, askama::Error> {
    TemporaryPasswordTemplate { password }.render()
}

pub fn render_verify_email(verify_url: &str) -> Result<String, askama::Error> {
    VerifyEmailTemplate { verify_url }.render()
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn overdue(user_name: &str, book_name: &str, due: &str) -> OverdueCheckout {
        OverdueCheckout {
            checkout_id: Uuid::now_v7(),
            checkout_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            due_date: NaiveDate::parse_from_str(due, "%Y-%m-%d").unwrap(),
            user_id: Uuid::now_v7(),
            user_name: user_name.to_string(),
            user_email: "reader@example.com".to_string(),
            book_id: Uuid::now_v7(),
            book_name: book_name.to_string(),
        }
    }

    #[test]
    fn overdue_report_lists_every_row() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let html = render_overdue_report(
            as_of,
            &[
                overdue("Ada", "Dune", "2024-05-20"),
                overdue("Grace", "Emma", "2024-06-01"),
            ],
        )
        .unwrap();
        assert!(html.contains("<td>Ada</td>"));
        assert!(html.contains("<td>Dune</td>"));
        assert!(html.contains("<td>2024-05-20</td><td>12</td>"));
        assert!(html.contains("<td>2024-06-01</td><td>0</td>"));
    }

    #[test]
    fn user_supplied_text_is_escaped() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let html = render_overdue_report(as_of, &[overdue("<script>", "A & B", "2024-05-01")])
            .unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("A &amp; B"));
    }

    #[test]
    fn links_are_embedded() {
        let html = render_password_reset("http://localhost/reset?token=abc").unwrap();
        assert!(html.contains("<a href=\""));
        assert!(html.contains("token=abc"));
        let html = render_verify_email("http://localhost/verify?token=xyz").unwrap();
        assert!(html.contains("token=xyz"));
    }

    #[test]
    fn temporary_password_is_shown() {
        let html = render_temporary_password("Abc123xyz789").unwrap();
        assert!(html.contains(">Abc123xyz789</p>"));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }
}
