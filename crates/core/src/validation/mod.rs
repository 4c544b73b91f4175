mod rules;

use crate::models::CreateInvoiceRequest;

pub use rules::RESERVED_USERNAMES;

pub fn validate_invoice_request(req: &CreateInvoiceRequest) -> Result<(), Vec<String>> {
    let mut errs = Vec::new();
    rules::required_fields(req, &mut errs);
    rules::amount(&req.amount, &mut errs);
    rules::due_date(&req.due_date, &mut errs);
    if let Some(email) = req.email.as_deref().filter(|e| !e.trim().is_empty()) {
        rules::email(email, &mut errs);
    }
    if let Some(wallet) = req.client_wallet.as_deref().filter(|w| !w.trim().is_empty()) {
        rules::wallet(wallet, &mut errs);
    }
    if errs.is_empty() {
        Ok(())
    } else {
        Err(errs)
    }
}

pub fn validate_username(username: &str) -> Result<(), Vec<String>> {
    let errs = rules::username(username);
    if errs.is_empty() {
        Ok(())
    } else {
        Err(errs)
    }
}
