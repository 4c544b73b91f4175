use crate::models::CreateInvoiceRequest;
use crate::parsing::parse_eth_amount;
use alloy_primitives::Address;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use std::collections::HashSet;

pub const RESERVED_USERNAMES: &[&str] = &[
    "admin", "support", "automint", "payment", "invoice", "crypto", "web3", "blockchain", "api",
    "www", "app", "test", "demo", "help", "contact", "about", "terms", "privacy", "legal",
];

static RESERVED: Lazy<HashSet<&'static str>> =
    Lazy::new(|| RESERVED_USERNAMES.iter().copied().collect());

pub(super) fn required_fields(req: &CreateInvoiceRequest, errs: &mut Vec<String>) {
    if req.title.trim().is_empty() {
        errs.push("Title is required".to_string());
    }
    if req.billed_to.trim().is_empty() {
        errs.push("Billed-to is required".to_string());
    }
}

pub(super) fn amount(amount: &str, errs: &mut Vec<String>) {
    match parse_eth_amount(amount) {
        Ok(wei) if wei.is_zero() => errs.push("Amount must be greater than zero".to_string()),
        Ok(_) => {}
        Err(e) => errs.push(format!("Amount is invalid: {e}")),
    }
}

pub(super) fn due_date(date: &str, errs: &mut Vec<String>) {
    if NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").is_err() {
        errs.push("Due date must be YYYY-MM-DD".to_string());
    }
}

pub(super) fn email(email: &str, errs: &mut Vec<String>) {
    let valid = match email.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        errs.push(format!("Email is invalid: {email}"));
    }
}

pub(super) fn wallet(wallet: &str, errs: &mut Vec<String>) {
    if wallet.trim().parse::<Address>().is_err() {
        errs.push(format!("Client wallet is not an address: {wallet}"));
    }
}

pub(super) fn username(name: &str) -> Vec<String> {
    let mut errs = Vec::new();
    if !(3..=20).contains(&name.len()) {
        errs.push("Username must be 3-20 characters".to_string());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        errs.push("Username may only contain a-z, 0-9 and _".to_string());
    }
    if RESERVED.contains(name.to_lowercase().as_str()) {
        errs.push(format!("Username '{name}' is reserved"));
    }
    errs
}
