use hrflow_core::config::NotificationConfig;
use hrflow_core::flows::{Recipient, WorkflowEvent};
use hrflow_core::notify::NotificationSink;
use tracing::info;

/// Delivers workflow events to the operator log. Delivery proper (email,
/// portal inbox) belongs to whatever tails these events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CliNotifier {
    Log,
    Silent,
}

impl CliNotifier {
    pub fn from_config(config: &NotificationConfig) -> Self {
        if config.enabled {
            Self::Log
        } else {
            Self::Silent
        }
    }
}

impl NotificationSink for CliNotifier {
    fn emit(&self, event: WorkflowEvent) {
        if *self == Self::Silent {
            return;
        }

        let recipients = match &event {
            WorkflowEvent::Submitted { recipients, .. } => recipients,
            WorkflowEvent::Decided(decided) => &decided.recipients,
        };
        info!(
            event_name = "notification.dispatched",
            source_event = event.event_name(),
            request_id = %event.request_id(),
            recipients = %recipient_list(recipients),
            "workflow notification queued"
        );
    }
}

pub fn recipient_list(recipients: &[Recipient]) -> String {
    recipients
        .iter()
        .map(|recipient| match recipient {
            Recipient::Subject(employee) => format!("subject:{employee}"),
            Recipient::Role(role) => format!("role:{role}"),
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use hrflow_core::config::NotificationConfig;
    use hrflow_core::domain::request::EmployeeId;
    use hrflow_core::domain::role::Role;
    use hrflow_core::flows::Recipient;

    use super::{recipient_list, CliNotifier};

    #[test]
    fn disabled_notifications_select_the_silent_sink() {
        assert_eq!(CliNotifier::from_config(&NotificationConfig { enabled: false }), CliNotifier::Silent);
        assert_eq!(CliNotifier::from_config(&NotificationConfig { enabled: true }), CliNotifier::Log);
    }

    #[test]
    fn recipients_render_as_a_flat_list() {
        let rendered = recipient_list(&[
            Recipient::Role(Role::Hod),
            Recipient::Subject(EmployeeId("E-9".to_string())),
        ]);
        assert_eq!(rendered, "role:hod,subject:E-9");
    }
}
