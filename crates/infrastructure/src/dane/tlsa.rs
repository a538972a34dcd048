use tlspol_domain::validators;
use x509_parser::prelude::parse_x509_certificate;

/// Whether a TLSA record can actually be matched against a presented
/// certificate. Postfix only honours DANE-TA(2) and DANE-EE(3) with full(0)
/// or SPKI(1) selectors, and the association data must parse for its
/// matching type: SHA-256/512 digests as hex of the right width, a full
/// certificate (matching type 0) as DER.
pub fn is_tlsa_usable(usage: u8, selector: u8, matching_type: u8, cert_data: &str) -> bool {
    if usage != 3 && usage != 2 {
        return false;
    }
    if selector != 1 && selector != 0 {
        return false;
    }
    match matching_type {
        1 => validators::is_sha256(cert_data),
        2 => validators::is_sha512(cert_data),
        0 => {
            let Ok(der) = hex::decode(cert_data) else {
                return false;
            };
            parse_x509_certificate(&der).is_ok()
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA256_HEX: &str = "8d02536c887482bc34ff54e41d2ba659bf85b341a0a20afadb5813dcfbcf286d";

    #[test]
    fn digest_records() {
        assert!(is_tlsa_usable(3, 1, 1, SHA256_HEX));
        assert!(is_tlsa_usable(2, 0, 1, SHA256_HEX));
        assert!(is_tlsa_usable(3, 0, 2, &"a".repeat(128)));
        // Digest of the wrong width for its matching type.
        assert!(!is_tlsa_usable(3, 1, 2, SHA256_HEX));
        assert!(!is_tlsa_usable(3, 1, 1, &"a".repeat(128)));
        assert!(!is_tlsa_usable(3, 1, 1, "not-hex"));
    }

    #[test]
    fn unsupported_usage_and_selector() {
        // PKIX-TA(0) and PKIX-CA(1) usages need PKIX validation we cannot do.
        assert!(!is_tlsa_usable(0, 1, 1, SHA256_HEX));
        assert!(!is_tlsa_usable(1, 1, 1, SHA256_HEX));
        assert!(!is_tlsa_usable(3, 2, 1, SHA256_HEX));
        assert!(!is_tlsa_usable(3, 1, 3, SHA256_HEX));
    }

    #[test]
    fn full_certificate_must_be_der() {
        assert!(!is_tlsa_usable(3, 0, 0, "zz"));
        assert!(!is_tlsa_usable(3, 0, 0, "deadbeef"));
    }
}
