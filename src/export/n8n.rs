//! n8n workflow model and builder.
//!
//! `build_workflow()` emits the screening process as an importable n8n
//! graph: IMAP trigger → extract → screen → IF → Sheets row → reply.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::config::{Settings, TrackerConfig};
use crate::screening::templates::{EmailTemplates, Template};
use crate::store::HEADERS;

pub const EMAIL_TRIGGER: &str = "n8n-nodes-base.emailReadImap";
pub const CODE: &str = "n8n-nodes-base.code";
pub const IF: &str = "n8n-nodes-base.if";
pub const GOOGLE_SHEETS: &str = "n8n-nodes-base.googleSheets";
pub const EMAIL_SEND: &str = "n8n-nodes-base.emailSend";

/// Node types every screening export must contain.
pub const REQUIRED_NODE_TYPES: [&str; 5] = [EMAIL_TRIGGER, GOOGLE_SHEETS, EMAIL_SEND, CODE, IF];

pub const WORKFLOW_NAME: &str = "Automated Candidate Screening";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct N8nWorkflow {
    pub name: String,
    pub nodes: Vec<N8nNode>,
    pub connections: BTreeMap<String, NodeConnections>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub settings: Value,
    #[serde(default)]
    pub tags: Vec<N8nTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct N8nNode {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(rename = "typeVersion")]
    pub type_version: f64,
    pub position: [i32; 2],
    pub parameters: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Value>,
}

/// Outgoing edges of one node, indexed by output port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConnections {
    pub main: Vec<Vec<ConnectionTarget>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    pub node: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct N8nTag {
    pub name: String,
}

impl N8nWorkflow {
    pub fn node(&self, name: &str) -> Option<&N8nNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    fn connect(&mut self, from: &str, port: usize, to: &str) {
        let entry = self.connections.entry(from.to_string()).or_default();
        if entry.main.len() <= port {
            entry.main.resize_with(port + 1, Vec::new);
        }
        entry.main[port].push(ConnectionTarget {
            node: to.to_string(),
            kind: "main".into(),
            index: 0,
        });
    }
}

const EXTRACT_JS: &str = r#"const results = [];
for (const item of $input.all()) {
  const from = item.json.from || '';
  const match = from.match(/^\s*"?([^"<]*?)"?\s*<([^>]+)>\s*$/);
  const email = (match ? match[2] : from).trim().toLowerCase();
  let name = match && match[1].trim() ? match[1].trim() : '';
  if (!name) {
    name = email.split('@')[0].split(/[._\-+]/).filter(Boolean)
      .map(p => p.charAt(0).toUpperCase() + p.slice(1)).join(' ');
  }
  const subject = item.json.subject || '';
  const position = (subject.match(/application\s+(?:for|to)\s+(?:the\s+|a\s+|an\s+)?(.+?)(?:\s+(?:position|role|job|opening))?\s*[.!]*$/i) || [])[1] || '';
  const body = item.json.text || item.json.textPlain || '';
  const years = (body.match(/\b(\d{1,2})\s*\+?\s*(?:years?|yrs?)\b/i) || [])[1] || '';
  results.push({ json: {
    name,
    first_name: name.split(' ')[0],
    email,
    subject,
    position,
    experience: years ? `${years} years` : '',
    resume_text: body,
    message_id: item.json.messageId || '',
    timestamp: new Date().toISOString(),
  }});
}
return results;"#;

const SCREEN_JS: &str = r#"const keywords = __KEYWORDS__;
const minimum = __MINIMUM__;
const required = minimum === 0 ? keywords.length : minimum;
const escape = s => s.replace(/[.*+?^${}()|[\]\\]/g, '\\$&');
const pattern = k => {
  const body = k.trim().split(/[\s\-_]+/).map(escape).join('[\\s\\-_]*');
  const start = /^\w/.test(k) ? '\\b' : '';
  const end = /\w$/.test(k) ? '\\b' : '';
  return new RegExp(start + body + end, 'i');
};
return $input.all().map(item => {
  const text = item.json.resume_text || '';
  const matched = keywords.filter(k => pattern(k).test(text));
  const missing = keywords.filter(k => !matched.includes(k));
  const passed = matched.length >= required;
  return { json: {
    ...item.json,
    matched_keywords: matched.join(', '),
    missing_keywords: missing.join(', '),
    match_count: matched.length,
    status: passed ? 'Matched' : 'Rejected',
    is_match: passed,
  }};
});"#;

/// Rewrite `{placeholder}` template text into n8n expressions.
pub fn to_n8n_expression(text: &str, templates: &EmailTemplates) -> String {
    let body = text
        .replace("{company}", templates.company_name())
        .replace("{sender_name}", templates.sender_name())
        .replace("{first_name}", "{{ $json.first_name }}")
        .replace("{name}", "{{ $json.name }}")
        .replace("{position}", "{{ $json.position || 'open' }}")
        .replace("{matched_keywords}", "{{ $json.matched_keywords }}");
    format!("={body}")
}

fn sheets_target(settings: &Settings) -> (String, String) {
    match &settings.tracker {
        TrackerConfig::GoogleSheets {
            sheet_id,
            worksheet,
            ..
        } => (sheet_id.clone(), worksheet.clone()),
        TrackerConfig::Local { .. } => ("YOUR_SHEET_ID".into(), "Candidates".into()),
    }
}

fn sheets_node(id: &str, name: &str, position: [i32; 2], settings: &Settings) -> N8nNode {
    let (sheet_id, worksheet) = sheets_target(settings);
    let expressions = [
        "={{ $json.timestamp }}",
        "={{ $json.name }}",
        "={{ $json.email }}",
        "={{ $json.position }}",
        "={{ $json.experience }}",
        "={{ $json.matched_keywords }}",
        "={{ $json.match_count }}",
        "={{ $json.status }}",
        "Yes",
        "={{ $json.message_id }}",
    ];
    let columns: serde_json::Map<String, Value> = HEADERS
        .iter()
        .zip(expressions)
        .map(|(h, e)| (h.to_string(), Value::String(e.to_string())))
        .collect();

    N8nNode {
        id: id.into(),
        name: name.into(),
        node_type: GOOGLE_SHEETS.into(),
        type_version: 4.0,
        position,
        parameters: json!({
            "operation": "append",
            "documentId": { "__rl": true, "mode": "id", "value": sheet_id },
            "sheetName": { "__rl": true, "mode": "name", "value": worksheet },
            "columns": { "mappingMode": "defineBelow", "value": columns },
            "options": {},
        }),
        credentials: Some(json!({
            "googleSheetsOAuth2Api": { "id": "", "name": "Google Sheets account" }
        })),
    }
}

fn send_node(
    id: &str,
    name: &str,
    position: [i32; 2],
    template: &Template,
    settings: &Settings,
    templates: &EmailTemplates,
) -> N8nNode {
    let from = if settings.email.from_name.is_empty() {
        settings.email.from_address.clone()
    } else {
        format!("{} <{}>", settings.email.from_name, settings.email.from_address)
    };
    N8nNode {
        id: id.into(),
        name: name.into(),
        node_type: EMAIL_SEND.into(),
        type_version: 2.0,
        position,
        parameters: json!({
            "fromEmail": from,
            "toEmail": "={{ $json.email }}",
            "subject": to_n8n_expression(&template.subject, templates),
            "emailFormat": "text",
            "text": to_n8n_expression(&template.body, templates),
            "options": {},
        }),
        credentials: Some(json!({ "smtp": { "id": "", "name": "SMTP account" } })),
    }
}

/// The screening process as an importable n8n workflow.
///
/// Reply texts come from the configured templates; if a template file is
/// broken the built-in texts are used instead.
pub fn build_workflow(settings: &Settings) -> N8nWorkflow {
    let templates = EmailTemplates::from_config(&settings.templates).unwrap_or_else(|e| {
        warn!(error = %e, "Template override unusable, exporting built-in templates");
        EmailTemplates::new(
            &settings.templates.company_name,
            &settings.templates.hr_contact_name,
        )
    });
    build_workflow_with_templates(settings, &templates)
}

pub fn build_workflow_with_templates(settings: &Settings, templates: &EmailTemplates) -> N8nWorkflow {
    let keywords = serde_json::to_string(&settings.screening.required_keywords)
        .unwrap_or_else(|_| "[]".into());
    let screen_js = SCREEN_JS
        .replace("__KEYWORDS__", &keywords)
        .replace(
            "__MINIMUM__",
            &settings.screening.minimum_keyword_matches.to_string(),
        );

    let nodes = vec![
        N8nNode {
            id: "email-trigger".into(),
            name: "Email Trigger (IMAP)".into(),
            node_type: EMAIL_TRIGGER.into(),
            type_version: 2.0,
            position: [240, 300],
            parameters: json!({
                "mailbox": "INBOX",
                "postProcessAction": "read",
                "format": "resolved",
                "options": { "customEmailConfig": "[\"UNSEEN\"]" },
                "pollTimes": {
                    "item": [{ "mode": "custom", "cronExpression": cron_for(settings) }]
                },
            }),
            credentials: Some(json!({ "imap": { "id": "", "name": "IMAP account" } })),
        },
        N8nNode {
            id: "extract-candidate".into(),
            name: "Extract Candidate Data".into(),
            node_type: CODE.into(),
            type_version: 2.0,
            position: [460, 300],
            parameters: json!({ "jsCode": EXTRACT_JS }),
            credentials: None,
        },
        N8nNode {
            id: "keyword-screening".into(),
            name: "Keyword Screening".into(),
            node_type: CODE.into(),
            type_version: 2.0,
            position: [680, 300],
            parameters: json!({ "jsCode": screen_js }),
            credentials: None,
        },
        N8nNode {
            id: "check-match".into(),
            name: "Check Match".into(),
            node_type: IF.into(),
            type_version: 2.0,
            position: [900, 300],
            parameters: json!({
                "conditions": {
                    "options": { "caseSensitive": true, "typeValidation": "strict" },
                    "conditions": [{
                        "leftValue": "={{ $json.is_match }}",
                        "rightValue": true,
                        "operator": { "type": "boolean", "operation": "true" },
                    }],
                    "combinator": "and",
                },
            }),
            credentials: None,
        },
        sheets_node("log-matched", "Log Matched Candidate", [1120, 200], settings),
        sheets_node("log-rejected", "Log Rejected Candidate", [1120, 400], settings),
        send_node(
            "send-acceptance",
            "Send Acceptance Email",
            [1340, 200],
            templates.acceptance_template(),
            settings,
            templates,
        ),
        send_node(
            "send-rejection",
            "Send Rejection Email",
            [1340, 400],
            templates.rejection_template(),
            settings,
            templates,
        ),
    ];

    let mut workflow = N8nWorkflow {
        name: WORKFLOW_NAME.into(),
        nodes,
        connections: BTreeMap::new(),
        active: false,
        settings: json!({ "executionOrder": "v1" }),
        tags: ["recruitment", "automation", "candidate-screening"]
            .into_iter()
            .map(|name| N8nTag { name: name.into() })
            .collect(),
    };

    workflow.connect("Email Trigger (IMAP)", 0, "Extract Candidate Data");
    workflow.connect("Extract Candidate Data", 0, "Keyword Screening");
    workflow.connect("Keyword Screening", 0, "Check Match");
    workflow.connect("Check Match", 0, "Log Matched Candidate");
    workflow.connect("Check Match", 1, "Log Rejected Candidate");
    workflow.connect("Log Matched Candidate", 0, "Send Acceptance Email");
    workflow.connect("Log Rejected Candidate", 0, "Send Rejection Email");
    workflow
}

/// Poll schedule matching `CHECK_INTERVAL_SECONDS`, at minute granularity.
fn cron_for(settings: &Settings) -> String {
    let minutes = (settings.workflow.check_interval.as_secs() / 60).max(1);
    if minutes >= 60 {
        let hours = (minutes / 60).min(23);
        format!("0 0 */{hours} * * *")
    } else {
        format!("0 */{minutes} * * * *")
    }
}

/// One step of the tool-neutral workflow description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub step: u32,
    pub name: String,
    pub description: String,
}

/// Tool-neutral description of the screening workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSpec {
    pub workflow_name: String,
    pub description: String,
    pub workflow_steps: Vec<WorkflowStep>,
    pub configuration: Value,
}

pub fn build_spec(settings: &Settings) -> WorkflowSpec {
    let steps = [
        (
            "Monitor Inbox",
            "Poll the IMAP inbox for unseen application emails",
        ),
        (
            "Filter",
            "Skip bounces, auto-replies, self-sent mail and blocked senders",
        ),
        (
            "Extract Candidate Data",
            "Name, email, position, experience and résumé text",
        ),
        (
            "Keyword Screening",
            "Match résumé text against the required keyword list",
        ),
        (
            "Send Response",
            "Acceptance email for matches, rejection email otherwise",
        ),
        (
            "Log Candidate",
            "Append one row per candidate to the tracking sheet",
        ),
    ];

    let tracker = match &settings.tracker {
        TrackerConfig::GoogleSheets { .. } => "google_sheets",
        TrackerConfig::Local { .. } => "local",
    };

    WorkflowSpec {
        workflow_name: WORKFLOW_NAME.into(),
        description: "Screen application emails by keyword and reply automatically".into(),
        workflow_steps: steps
            .iter()
            .zip(1u32..)
            .map(|((name, description), step)| WorkflowStep {
                step,
                name: name.to_string(),
                description: description.to_string(),
            })
            .collect(),
        configuration: json!({
            "required_keywords": settings.screening.required_keywords,
            "minimum_keyword_matches": settings.screening.minimum_keyword_matches,
            "check_interval_seconds": settings.workflow.check_interval.as_secs(),
            "max_emails_per_run": settings.workflow.max_emails_per_run,
            "tracker": tracker,
            "sheet_columns": HEADERS,
            "company_name": settings.templates.company_name,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(extra: &[(&str, &str)]) -> Settings {
        let mut map: HashMap<String, String> = HashMap::from([
            ("EMAIL_USERNAME".to_string(), "hr@acme.test".to_string()),
            ("COMPANY_NAME".to_string(), "Acme".to_string()),
        ]);
        for (k, v) in extra {
            map.insert(k.to_string(), v.to_string());
        }
        Settings::from_lookup(&|key: &str| map.get(key).cloned()).unwrap()
    }

    fn workflow(settings: &Settings) -> N8nWorkflow {
        build_workflow(settings)
    }

    #[test]
    fn workflow_has_every_required_node_type() {
        let wf = workflow(&settings(&[]));
        assert_eq!(wf.nodes.len(), 8);
        for required in REQUIRED_NODE_TYPES {
            assert!(
                wf.nodes.iter().any(|n| n.node_type == required),
                "missing {required}"
            );
        }
    }

    #[test]
    fn if_node_branches_to_matched_and_rejected() {
        let wf = workflow(&settings(&[]));
        let branches = &wf.connections["Check Match"].main;
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0][0].node, "Log Matched Candidate");
        assert_eq!(branches[1][0].node, "Log Rejected Candidate");
        assert_eq!(
            wf.connections["Log Rejected Candidate"].main[0][0].node,
            "Send Rejection Email"
        );
    }

    #[test]
    fn keywords_and_minimum_are_embedded() {
        let wf = workflow(&settings(&[
            ("REQUIRED_KEYWORDS", "Rust, Tokio"),
            ("MINIMUM_KEYWORD_MATCHES", "1"),
        ]));
        let code = wf.node("Keyword Screening").unwrap().parameters["jsCode"]
            .as_str()
            .unwrap();
        assert!(code.contains(r#"const keywords = ["Rust","Tokio"];"#));
        assert!(code.contains("const minimum = 1;"));
    }

    #[test]
    fn sheets_nodes_use_configured_sheet() {
        let wf = workflow(&settings(&[
            ("CANDIDATE_TRACKER_SHEET_ID", "sheet-42"),
            ("GOOGLE_SHEETS_ACCESS_TOKEN", "tok"),
        ]));
        let node = wf.node("Log Matched Candidate").unwrap();
        assert_eq!(node.parameters["documentId"]["value"], "sheet-42");
        assert_eq!(node.parameters["sheetName"]["value"], "Candidates");
        assert_eq!(
            node.parameters["columns"]["value"]["Matched Keywords"],
            "={{ $json.matched_keywords }}"
        );
    }

    #[test]
    fn send_nodes_carry_rendered_templates() {
        let wf = workflow(&settings(&[]));
        let node = wf.node("Send Acceptance Email").unwrap();
        let subject = node.parameters["subject"].as_str().unwrap();
        assert_eq!(
            subject,
            "=Your application for {{ $json.position || 'open' }} at Acme"
        );
        let text = node.parameters["text"].as_str().unwrap();
        assert!(text.starts_with("=Dear {{ $json.first_name }},"));
    }

    #[test]
    fn custom_templates_flow_into_send_nodes() {
        let templates = EmailTemplates::new("Initech", "Bill");
        let wf = build_workflow_with_templates(&settings(&[]), &templates);
        let text = wf.node("Send Rejection Email").unwrap().parameters["text"]
            .as_str()
            .unwrap();
        assert!(text.contains("Initech"));
        assert!(text.contains("Bill"));
        assert!(!text.contains("{company}"));
    }

    #[test]
    fn static_placeholders_are_inlined() {
        let templates = EmailTemplates::new("Initech", "Bill Lumbergh");
        let expr = to_n8n_expression("Hi {first_name}, {sender_name} at {company}", &templates);
        assert_eq!(expr, "=Hi {{ $json.first_name }}, Bill Lumbergh at Initech");
    }

    #[test]
    fn serialized_shape_matches_n8n() {
        let value = serde_json::to_value(workflow(&settings(&[]))).unwrap();
        assert_eq!(value["nodes"][0]["type"], EMAIL_TRIGGER);
        assert!(value["nodes"][0]["typeVersion"].is_number());
        assert_eq!(
            value["connections"]["Email Trigger (IMAP)"]["main"][0][0]["node"],
            "Extract Candidate Data"
        );
        assert!(value["nodes"][1].get("credentials").is_none());
        assert_eq!(value["tags"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn cron_follows_check_interval() {
        assert_eq!(cron_for(&settings(&[])), "0 */5 * * * *");
        assert_eq!(
            cron_for(&settings(&[("CHECK_INTERVAL_SECONDS", "30")])),
            "0 */1 * * * *"
        );
        assert_eq!(
            cron_for(&settings(&[("CHECK_INTERVAL_SECONDS", "7200")])),
            "0 0 */2 * * *"
        );
    }

    #[test]
    fn spec_has_required_keys() {
        let value = serde_json::to_value(build_spec(&settings(&[]))).unwrap();
        for key in ["workflow_name", "workflow_steps", "configuration"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["workflow_steps"][0]["step"], 1);
        assert_eq!(
            value["configuration"]["required_keywords"],
            json!(["Python", "GenAI", "Mid-level"])
        );
    }
}
