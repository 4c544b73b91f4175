use crate::models::InvoiceMetadata;
use alloy_primitives::U256;
use anyhow::{bail, Result};
use sha2::{Digest, Sha256};

const ETH_DECIMALS: usize = 18;
const WEI_PER_ETH: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

pub fn compute_sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn build_metadata_uri(metadata: &InvoiceMetadata) -> Result<String> {
    Ok(serde_json::to_string(metadata)?)
}

/// Decode a metadata URI. Anything that is not a JSON metadata object yields
/// `None`; callers fall back to their own defaults.
pub fn parse_metadata_uri(uri: &str) -> Option<InvoiceMetadata> {
    let trimmed = uri.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str(trimmed) {
        Ok(meta) => Some(meta),
        Err(e) => {
            tracing::warn!(error=%e, "unreadable invoice metadata");
            None
        }
    }
}

/// Parse a decimal ETH amount ("1.25") into wei.
pub fn parse_eth_amount(input: &str) -> Result<U256> {
    let s = input.trim();
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        bail!("empty amount");
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        bail!("invalid amount: {input}");
    }
    if frac.len() > ETH_DECIMALS {
        bail!("too many decimal places: {input}");
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let digits = format!("{whole}{frac:0<width$}", width = ETH_DECIMALS);
    U256::from_str_radix(&digits, 10).map_err(|e| anyhow::anyhow!("invalid amount {input}: {e}"))
}

/// Render wei as decimal ETH without trailing zeros.
pub fn format_eth_amount(wei: U256) -> String {
    let whole = wei / WEI_PER_ETH;
    let rem = wei % WEI_PER_ETH;
    if rem.is_zero() {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", rem.to_string(), width = ETH_DECIMALS);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_eth() {
        assert_eq!(parse_eth_amount("1").unwrap(), WEI_PER_ETH);
        assert_eq!(
            parse_eth_amount("0.5").unwrap(),
            U256::from(500_000_000_000_000_000u64)
        );
        assert_eq!(parse_eth_amount(".000000000000000001").unwrap(), U256::from(1u64));
        assert_eq!(
            parse_eth_amount("12.").unwrap(),
            U256::from(12u64) * WEI_PER_ETH
        );
    }

    #[test]
    fn rejects_malformed_amounts() {
        assert!(parse_eth_amount("").is_err());
        assert!(parse_eth_amount(".").is_err());
        assert!(parse_eth_amount("-1").is_err());
        assert!(parse_eth_amount("1.2.3").is_err());
        assert!(parse_eth_amount("abc").is_err());
        assert!(parse_eth_amount("0.0000000000000000001").is_err());
    }

    #[test]
    fn formats_without_trailing_zeros() {
        assert_eq!(format_eth_amount(U256::ZERO), "0");
        assert_eq!(format_eth_amount(WEI_PER_ETH), "1");
        assert_eq!(format_eth_amount(U256::from(1_500_000_000_000_000_000u64)), "1.5");
        assert_eq!(format_eth_amount(U256::from(1u64)), "0.000000000000000001");
    }

    #[test]
    fn metadata_uri_tolerates_garbage() {
        assert!(parse_metadata_uri("").is_none());
        assert!(parse_metadata_uri("ipfs://not-json").is_none());

        let meta = parse_metadata_uri(r#"{"title":"Hosting","billedTo":"Bob"}"#).unwrap();
        assert_eq!(meta.title, "Hosting");
        assert_eq!(meta.billed_to, "Bob");
        assert_eq!(meta.version, "1.0");
    }

    #[test]
    fn sha256_is_hex_encoded() {
        assert_eq!(
            compute_sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
