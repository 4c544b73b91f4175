use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event_type: String,
    pub invoice_id: Option<u64>,
    pub actor: Option<String>,
    pub amount: Option<String>,
    pub status: String,
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: &str, status: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event_type: event_type.to_string(),
            invoice_id: None,
            actor: None,
            amount: None,
            status: status.to_string(),
            error: None,
        }
    }

    pub fn with_invoice(mut self, invoice_id: u64) -> Self {
        self.invoice_id = Some(invoice_id);
        self
    }

    pub fn with_actor(mut self, actor: impl ToString) -> Self {
        self.actor = Some(actor.to_string());
        self
    }

    pub fn with_amount(mut self, amount: impl ToString) -> Self {
        self.amount = Some(amount.to_string());
        self
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Append-only JSON-lines log. A log without a path discards events.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn write(&self, event: &AuditEvent) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let json = serde_json::to_string(event)?;
        writeln!(file, "{}", json)?;
        tracing::debug!(event_type=%event.event_type, invoice_id=?event.invoice_id, "Audit event written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_one_line_per_event() {
        let dir = std::env::temp_dir().join(format!("automint-audit-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("audit.jsonl");
        let _ = std::fs::remove_file(&path);

        let log = AuditLog::new(&path);
        log.write(&AuditEvent::new("invoice_created", "unpaid").with_invoice(1))
            .unwrap();
        log.write(
            &AuditEvent::new("payment_failed", "unpaid")
                .with_invoice(1)
                .with_error("insufficient balance"),
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<AuditEvent> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].error.as_deref(), Some("insufficient balance"));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn disabled_log_is_silent() {
        assert!(AuditLog::disabled()
            .write(&AuditEvent::new("noop", "none"))
            .is_ok());
    }
}
