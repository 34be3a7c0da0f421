//! Recipient overrides embedded in order notes.
//!
//! Billing staff type lines such as `Destinatario: Ana Pérez` or
//! `Teléfono: 300 000 0000` into the notes field when the parcel goes to
//! someone other than the customer on record.

use fulfil_core::Recipient;
use fulfil_shared::Masked;

use crate::methods::normalize_token;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecipientKey {
    Name,
    Phone,
    Address,
    City,
}

fn key_for(raw: &str) -> Option<RecipientKey> {
    match normalize_token(raw).as_str() {
        "destinatario" | "nombre" | "recibe" => Some(RecipientKey::Name),
        "telefono" | "celular" | "tel" => Some(RecipientKey::Phone),
        "direccion" => Some(RecipientKey::Address),
        "ciudad" | "municipio" => Some(RecipientKey::City),
        _ => None,
    }
}

/// Parse `key: value` lines. Unknown keys and blank values are ignored; the
/// last occurrence of a key wins.
pub fn parse_overrides(notes: &str) -> Recipient {
    let mut recipient = Recipient::default();

    for line in notes.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key_for(key) {
            Some(RecipientKey::Name) => recipient.name = Some(value.to_string()),
            Some(RecipientKey::Phone) => recipient.phone = Some(Masked::new(value.to_string())),
            Some(RecipientKey::Address) => recipient.address = Some(value.to_string()),
            Some(RecipientKey::City) => recipient.city = Some(value.to_string()),
            None => {}
        }
    }

    recipient
}

/// Overrides from the notes, with the customer reference as the name of last
/// resort.
pub fn resolve(notes: Option<&str>, customer_id: Option<&str>) -> Recipient {
    let mut recipient = notes.map(parse_overrides).unwrap_or_default();
    if recipient.name.is_none() {
        recipient.name = customer_id.map(str::to_string);
    }
    recipient
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overrides_accent_and_case_insensitive() {
        let notes = "Entregar en portería\nDESTINATARIO: Ana Pérez\nTeléfono: 3001234567\nDirección: Cra 7 # 12-30\nciudad : Medellín";
        let recipient = parse_overrides(notes);

        assert_eq!(recipient.name.as_deref(), Some("Ana Pérez"));
        assert_eq!(recipient.phone.as_ref().map(|p| p.expose().as_str()), Some("3001234567"));
        assert_eq!(recipient.address.as_deref(), Some("Cra 7 # 12-30"));
        assert_eq!(recipient.city.as_deref(), Some("Medellín"));
    }

    #[test]
    fn test_phone_is_masked_in_debug_output() {
        let recipient = parse_overrides("telefono: 3001234567");
        let rendered = format!("{:?}", recipient);
        assert!(!rendered.contains("3001234567"));
    }

    #[test]
    fn test_resolve_falls_back_to_customer() {
        let recipient = resolve(Some("ciudad: Cali\nhorario: mañana"), Some("C-77"));
        assert_eq!(recipient.name.as_deref(), Some("C-77"));
        assert_eq!(recipient.city.as_deref(), Some("Cali"));

        assert!(resolve(None, None).is_empty());
    }
}
