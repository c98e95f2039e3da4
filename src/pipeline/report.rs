//! Human-readable rendering of a processed receipt: mail subject, mail body and
//! the caller-facing status line.

use crate::pipeline::extraction::{ExtractedRecord, LineItems, StructuredRecord};
use crate::settings::ToggleState;

pub const SUCCESS_MESSAGE: &str = "Receipt processed successfully.";

/// Who sent the receipt and why, as entered on the upload form.
pub struct Submission<'a> {
    pub submitter: &'a str,
    pub category: &'a str,
    pub reason: &'a str,
}

/// Mail subject. Model-supplied values are folded onto one line.
pub fn subject(record: &ExtractedRecord) -> String {
    format!(
        "Expense Receipt - {} - {}",
        one_line(&record.fields.invoice_number),
        one_line(&record.fields.vendor)
    )
}

fn one_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn body(record: &ExtractedRecord, submission: &Submission<'_>) -> String {
    let details = match &record.extraction_error {
        Some(failure) => failure.raw_text.clone(),
        None => format_record(&record.fields),
    };
    format!(
        "A receipt has been processed.\n\n\
         Submitter: {}\n\
         Category: {}\n\
         Reason: {}\n\n\
         {details}\n",
        submission.submitter, submission.category, submission.reason
    )
}

/// The `=== Analysis Results ===` block.
pub fn format_record(record: &StructuredRecord) -> String {
    let mut lines = vec![
        "=== Analysis Results ===".to_string(),
        format!("Invoice Number: {}", record.invoice_number),
        format!("Date: {}", record.date),
        format!("Amount: ${}", record.amount),
        format!("Customer Name: {}", record.customer_name),
        format!("Vendor: {}", record.vendor),
        format!("Card (last 4): {}", record.masked_card_suffix),
        format!("Payment Method: {}", record.payment_method),
        format!("Billing Address: {}", record.billing_address),
        String::new(),
        "Items/Services:".to_string(),
        "----------------".to_string(),
    ];
    match &record.line_items {
        LineItems::List(items) => lines.extend(items.iter().map(|item| format!("- {item}"))),
        LineItems::Text(text) => lines.push(text.clone()),
    }
    lines.join("\n")
}

/// Status line, noting each sink that was switched off.
pub fn status_message(toggles: &ToggleState) -> String {
    let mut message = SUCCESS_MESSAGE.to_string();
    if !toggles.notifications_enabled {
        message.push_str(" (Notifications are disabled)");
    }
    if !toggles.automation_enabled {
        message.push_str(" (Automation is disabled)");
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::ExtractionError;

    fn record() -> StructuredRecord {
        StructuredRecord {
            invoice_number: "INV-9".into(),
            date: "2024-05-02".into(),
            amount: "42.10".into(),
            vendor: "Harbor Supply".into(),
            line_items: LineItems::List(vec!["Rope".into(), "Cleats".into()]),
            ..StructuredRecord::sentinel()
        }
    }

    fn submission() -> Submission<'static> {
        Submission {
            submitter: "Sam Lee",
            category: "card-1234",
            reason: "Dock repair",
        }
    }

    #[test]
    fn subject_uses_invoice_and_vendor() {
        let record = ExtractedRecord::from(record());
        assert_eq!(subject(&record), "Expense Receipt - INV-9 - Harbor Supply");
    }

    #[test]
    fn subject_folds_line_breaks() {
        let record = ExtractedRecord::from(StructuredRecord {
            vendor: "Acme\r\nBcc: thief@evil.example".into(),
            ..record()
        });
        let subject = subject(&record);
        assert!(!subject.contains('\r') && !subject.contains('\n'));
        assert_eq!(subject, "Expense Receipt - INV-9 - Acme Bcc: thief@evil.example");
    }

    #[test]
    fn degraded_subject_shows_sentinels() {
        let record = ExtractedRecord::from(&ExtractionError::UnsupportedFormat);
        assert_eq!(subject(&record), "Expense Receipt - N/A - N/A");
    }

    #[test]
    fn formatted_record_lists_items() {
        let text = format_record(&record());
        assert!(text.starts_with("=== Analysis Results ==="));
        assert!(text.contains("Amount: $42.10"));
        assert!(text.contains("Customer Name: N/A"));
        assert!(text.ends_with("----------------\n- Rope\n- Cleats"));
    }

    #[test]
    fn free_text_items_are_printed_verbatim() {
        let text = format_record(&StructuredRecord {
            line_items: LineItems::Text("Annual subscription".into()),
            ..record()
        });
        assert!(text.ends_with("----------------\nAnnual subscription"));
    }

    #[test]
    fn body_carries_submission_and_record() {
        let text = body(&ExtractedRecord::from(record()), &submission());
        assert!(text.contains("Submitter: Sam Lee"));
        assert!(text.contains("Category: card-1234"));
        assert!(text.contains("Reason: Dock repair"));
        assert!(text.contains("Vendor: Harbor Supply"));
    }

    #[test]
    fn degraded_body_carries_raw_text() {
        let err = ExtractionError::InvalidResponse {
            raw: "Total looks like 12.00 but I am not sure".into(),
            diagnostic: "expected value".into(),
        };
        let text = body(&ExtractedRecord::from(&err), &submission());
        assert!(text.contains("Total looks like 12.00 but I am not sure"));
        assert!(!text.contains("=== Analysis Results ==="));
    }

    #[test]
    fn status_message_notes_disabled_sinks() {
        let all_on = ToggleState::default();
        assert_eq!(status_message(&all_on), "Receipt processed successfully.");

        let all_off = ToggleState {
            notifications_enabled: false,
            automation_enabled: false,
        };
        assert_eq!(
            status_message(&all_off),
            "Receipt processed successfully. (Notifications are disabled) (Automation is disabled)"
        );
    }
}
