use klaxon_common::types::{Alert, AlertCategory};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::DispatchPriority;

/// Subject/body pair with `{{placeholder}}` markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTemplate {
    pub subject: String,
    pub body: String,
}

/// A template rendered against one alert, ready for a channel transport.
#[derive(Debug, Clone)]
pub struct RenderedNotification {
    pub subject: String,
    pub body: String,
    pub priority: DispatchPriority,
}

/// Alert-type-keyed template table with a default fallback and a
/// dedicated escalation template.
#[derive(Debug, Clone)]
pub struct TemplateSet {
    by_category: HashMap<AlertCategory, NotificationTemplate>,
    default: NotificationTemplate,
    escalation: NotificationTemplate,
}

impl TemplateSet {
    pub fn new(
        by_category: HashMap<AlertCategory, NotificationTemplate>,
        default: NotificationTemplate,
        escalation: NotificationTemplate,
    ) -> Self {
        Self {
            by_category,
            default,
            escalation,
        }
    }

    /// Built-in templates. Deployments override through configuration.
    pub fn builtin() -> Self {
        let mut by_category = HashMap::new();
        by_category.insert(
            AlertCategory::Risk,
            NotificationTemplate {
                subject: "[klaxon][{{severity}}] Risk alert: {{title}}".into(),
                body: "{{message}}\nSource: {{source_id}}\nTriggered: {{triggered_at}}".into(),
            },
        );
        by_category.insert(
            AlertCategory::BatteryLow,
            NotificationTemplate {
                subject: "[klaxon][{{severity}}] Battery low on {{source_id}}".into(),
                body: "{{message}}\nTriggered: {{triggered_at}}".into(),
            },
        );
        by_category.insert(
            AlertCategory::CommunicationLoss,
            NotificationTemplate {
                subject: "[klaxon][{{severity}}] Lost contact with {{source_id}}".into(),
                body: "{{message}}\nLast heard: {{triggered_at}}".into(),
            },
        );

        Self {
            by_category,
            default: NotificationTemplate {
                subject: "[klaxon][{{severity}}] {{title}}".into(),
                body: "{{message}}\nCategory: {{category}}\nSource: {{source_id}}\nTriggered: {{triggered_at}}".into(),
            },
            escalation: NotificationTemplate {
                subject: "[klaxon][ESCALATION L{{level}}][{{severity}}] {{title}}".into(),
                body: "Alert has been open for {{age_minutes}} minutes without resolution (escalation level {{level}}).\n{{message}}\nSource: {{source_id}}".into(),
            },
        }
    }

    /// Renders the category's template, falling back to the default.
    pub fn render(&self, alert: &Alert) -> RenderedNotification {
        let template = self.by_category.get(&alert.category).unwrap_or(&self.default);
        RenderedNotification {
            subject: fill(&template.subject, alert, None, None),
            body: fill(&template.body, alert, None, None),
            priority: DispatchPriority::for_severity(alert.severity),
        }
    }

    /// Renders the escalation template, carrying level and alert age.
    pub fn render_escalation(
        &self,
        alert: &Alert,
        level: u32,
        age_minutes: i64,
    ) -> RenderedNotification {
        RenderedNotification {
            subject: fill(&self.escalation.subject, alert, Some(level), Some(age_minutes)),
            body: fill(&self.escalation.body, alert, Some(level), Some(age_minutes)),
            priority: DispatchPriority::for_severity(alert.severity),
        }
    }
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::builtin()
    }
}

fn fill(template: &str, alert: &Alert, level: Option<u32>, age_minutes: Option<i64>) -> String {
    let mut out = template
        .replace("{{title}}", &alert.title)
        .replace("{{message}}", &alert.message)
        .replace("{{severity}}", &alert.severity.to_string())
        .replace("{{category}}", alert.category.as_str())
        .replace(
            "{{source_id}}",
            alert.source_id.as_deref().unwrap_or("unknown"),
        )
        .replace("{{triggered_at}}", &alert.triggered_at.to_rfc3339());
    if let Some(level) = level {
        out = out.replace("{{level}}", &level.to_string());
    }
    if let Some(age) = age_minutes {
        out = out.replace("{{age_minutes}}", &age.to_string());
    }
    out
}
