//! Google Sheets tracker against a mock Sheets API.

use chrono::Utc;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use candidate_screener::channels::InboundEmail;
use candidate_screener::error::SheetError;
use candidate_screener::screening::{CandidateExtractor, CandidateStatus};
use candidate_screener::store::{CandidateSheet, GoogleSheetsSheet, HEADERS};

const VALUES: &str = "/v4/spreadsheets/sheet-1/values";

fn sheet(server: &MockServer) -> GoogleSheetsSheet {
    GoogleSheetsSheet::new(
        &server.uri(),
        "sheet-1",
        "Candidates",
        SecretString::from("test-token"),
    )
}

fn row(name: &str, email: &str, status: &str, sent: &str) -> serde_json::Value {
    json!([
        "2026-03-01T10:00:00+00:00",
        name,
        email,
        "Python Developer",
        "4 years",
        "Python, GenAI",
        "2",
        status,
        sent,
        "<m1@mail.test>"
    ])
}

#[tokio::test]
async fn append_posts_one_row_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{VALUES}/Candidates!A:J:append")))
        .and(header("authorization", "Bearer test-token"))
        .and(query_param("valueInputOption", "RAW"))
        .and(query_param("insertDataOption", "INSERT_ROWS"))
        .and(body_partial_json(json!({ "majorDimension": "ROWS" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "updates": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let email = InboundEmail {
        uid: "1".into(),
        message_id: None,
        sender: "jane@example.com".into(),
        sender_name: Some("Jane Smith".into()),
        subject: "Application for Python Developer".into(),
        body: "Python and GenAI, Mid-level.".into(),
        attachments: Vec::new(),
        received_at: Utc::now(),
    };
    let candidate = CandidateExtractor::new().extract(&email);

    sheet(&server).append_candidate(&candidate, true).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let cells = body["values"][0].as_array().unwrap();
    assert_eq!(cells.len(), HEADERS.len());
    assert_eq!(cells[1], "Jane Smith");
    assert_eq!(cells[2], "jane@example.com");
    assert_eq!(cells[8], "Yes");
}

#[tokio::test]
async fn formula_text_from_senders_is_appended_raw() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{VALUES}/Candidates!A:J:append")))
        .and(query_param("valueInputOption", "RAW"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "updates": {} })))
        .expect(1)
        .mount(&server)
        .await;

    let email = InboundEmail {
        uid: "1".into(),
        message_id: None,
        sender: "mallory@example.com".into(),
        sender_name: Some(r#"=IMPORTXML("http://evil.test","//a")"#.into()),
        subject: r#"Application for =HYPERLINK("http://evil.test") position"#.into(),
        body: "Python".into(),
        attachments: Vec::new(),
        received_at: Utc::now(),
    };
    let candidate = CandidateExtractor::new().extract(&email);
    sheet(&server).append_candidate(&candidate, false).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let query = requests[0].url.query().unwrap_or_default();
    assert!(!query.contains("USER_ENTERED"), "{query}");

    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["values"][0][1], r#"=IMPORTXML("http://evil.test","//a")"#);
}

#[tokio::test]
async fn list_rows_parses_and_skips_bad_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{VALUES}/Candidates!A2:J")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Candidates!A2:J100",
            "values": [
                row("Jane Smith", "jane@example.com", "Matched", "Yes"),
                ["2026-03-01", "No Email"],
                [],
                row("Bob Brown", "bob@example.org", "Rejected", "No"),
            ]
        })))
        .mount(&server)
        .await;

    let sheet = sheet(&server);
    let rows = sheet.list_rows().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].matched_keywords, vec!["Python", "GenAI"]);
    assert_eq!(rows[0].status, CandidateStatus::Matched);
    assert!(!rows[1].email_sent);

    let found = sheet.find_by_email("BOB@example.org").await.unwrap();
    assert_eq!(found.map(|r| r.name), Some("Bob Brown".to_string()));

    let stats = sheet.stats().await.unwrap();
    assert_eq!(stats.total_candidates, 2);
    assert_eq!(stats.matched, 1);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.emails_sent, 1);
}

#[tokio::test]
async fn empty_values_response_means_no_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{VALUES}/Candidates!A2:J")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "range": "Candidates!A2:J" })))
        .mount(&server)
        .await;

    assert!(sheet(&server).list_rows().await.unwrap().is_empty());
}

#[tokio::test]
async fn headers_are_written_to_an_empty_sheet() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{VALUES}/Candidates!A1:J1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "range": "Candidates!A1:J1" })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{VALUES}/Candidates!A1:J1")))
        .and(query_param("valueInputOption", "RAW"))
        .and(body_partial_json(json!({ "values": [HEADERS] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    sheet(&server).ensure_headers().await.unwrap();
}

#[tokio::test]
async fn existing_headers_are_left_alone() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{VALUES}/Candidates!A1:J1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "values": [HEADERS] })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    sheet(&server).ensure_headers().await.unwrap();
}

#[tokio::test]
async fn mark_email_sent_updates_first_unsent_row() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{VALUES}/Candidates!A2:J")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [
                row("Jane Smith", "jane@example.com", "Matched", "Yes"),
                row("Bob Brown", "bob@example.org", "Rejected", "No"),
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{VALUES}/Candidates!I3")))
        .and(body_partial_json(json!({ "values": [["Yes"]] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let sheet = sheet(&server);
    assert!(sheet.mark_email_sent("bob@example.org").await.unwrap());
    assert!(!sheet.mark_email_sent("nobody@example.org").await.unwrap());
}

#[tokio::test]
async fn api_errors_carry_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .mount(&server)
        .await;

    let sheet = sheet(&server);
    match sheet.list_rows().await {
        Err(SheetError::Api { status, body }) => {
            assert_eq!(status, 403);
            assert!(body.contains("PERMISSION_DENIED"));
        }
        other => panic!("expected API error, got {other:?}"),
    }
    assert!(sheet.health_check().await.is_err());
}

#[tokio::test]
async fn health_check_requests_spreadsheet_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v4/spreadsheets/sheet-1"))
        .and(query_param("fields", "spreadsheetId"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "spreadsheetId": "sheet-1" })))
        .expect(1)
        .mount(&server)
        .await;

    sheet(&server).health_check().await.unwrap();
}
