//! Payment and delivery method vocabulary.
//!
//! Billing staff and the invoicing system write these as free text
//! ("Efectivo", "Recoge en bodega", "pago-electrónico"). Everything is folded
//! through [`normalize_token`] and matched against explicit tables, so the
//! rest of the engine only ever sees the enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowercase, strip Spanish accents, and collapse separators to `_`.
pub fn normalize_token(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_sep = true;

    for ch in raw.trim().chars().flat_map(char::to_lowercase) {
        let folded = match ch {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            c if c.is_whitespace() || c == '-' || c == '_' || c == '/' => '_',
            c => c,
        };

        if folded == '_' {
            if !last_sep {
                out.push('_');
            }
            last_sep = true;
        } else {
            out.push(folded);
            last_sep = false;
        }
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PaymentMethod {
    Efectivo,
    Transferencia,
    PagoElectronico,
    Credito,
    Contraentrega,
    Publicidad,
    Reposicion,
    Other(String),
}

const PAYMENT_ALIASES: &[(&str, PaymentMethod)] = &[
    ("efectivo", PaymentMethod::Efectivo),
    ("cash", PaymentMethod::Efectivo),
    ("transferencia", PaymentMethod::Transferencia),
    ("transferencia_bancaria", PaymentMethod::Transferencia),
    ("pago_electronico", PaymentMethod::PagoElectronico),
    ("pse", PaymentMethod::PagoElectronico),
    ("credito", PaymentMethod::Credito),
    ("contraentrega", PaymentMethod::Contraentrega),
    ("contra_entrega", PaymentMethod::Contraentrega),
    ("publicidad", PaymentMethod::Publicidad),
    ("reposicion", PaymentMethod::Reposicion),
];

impl PaymentMethod {
    pub fn parse(raw: &str) -> Self {
        let token = normalize_token(raw);
        PAYMENT_ALIASES
            .iter()
            .find(|(alias, _)| *alias == token)
            .map(|(_, method)| method.clone())
            .unwrap_or(PaymentMethod::Other(token))
    }

    pub fn as_str(&self) -> &str {
        match self {
            PaymentMethod::Efectivo => "efectivo",
            PaymentMethod::Transferencia => "transferencia",
            PaymentMethod::PagoElectronico => "pago_electronico",
            PaymentMethod::Credito => "credito",
            PaymentMethod::Contraentrega => "contraentrega",
            PaymentMethod::Publicidad => "publicidad",
            PaymentMethod::Reposicion => "reposicion",
            PaymentMethod::Other(raw) => raw,
        }
    }

    /// Settled in physical currency at handoff.
    pub fn is_cash_like(&self) -> bool {
        matches!(self, PaymentMethod::Efectivo | PaymentMethod::Contraentrega)
    }

    pub fn is_transfer_like(&self) -> bool {
        matches!(self, PaymentMethod::Transferencia | PaymentMethod::PagoElectronico)
    }

    pub fn is_credit(&self) -> bool {
        matches!(self, PaymentMethod::Credito)
    }

    /// Dispatches that carry no charge to the customer.
    pub fn is_no_charge(&self) -> bool {
        matches!(self, PaymentMethod::Publicidad | PaymentMethod::Reposicion)
    }
}

impl From<String> for PaymentMethod {
    fn from(raw: String) -> Self {
        PaymentMethod::parse(&raw)
    }
}

impl From<PaymentMethod> for String {
    fn from(method: PaymentMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeliveryMethod {
    /// Customer or wallet staff collects at the warehouse
    Pickup,
    /// Own messengers, local/urban routes
    LocalMessenger,
    /// Third-party shipping carrier
    Carrier,
    Other(String),
}

const DELIVERY_ALIASES: &[(&str, DeliveryMethod)] = &[
    ("recoge_bodega", DeliveryMethod::Pickup),
    ("recogida_bodega", DeliveryMethod::Pickup),
    ("recoge_en_bodega", DeliveryMethod::Pickup),
    ("bodega", DeliveryMethod::Pickup),
    ("mensajeria_local", DeliveryMethod::LocalMessenger),
    ("mensajeria_urbana", DeliveryMethod::LocalMessenger),
    ("domicilio", DeliveryMethod::LocalMessenger),
    ("local", DeliveryMethod::LocalMessenger),
    ("transportadora", DeliveryMethod::Carrier),
    ("nacional", DeliveryMethod::Carrier),
    ("envio_nacional", DeliveryMethod::Carrier),
];

impl DeliveryMethod {
    pub fn parse(raw: &str) -> Self {
        let token = normalize_token(raw);
        DELIVERY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == token)
            .map(|(_, method)| method.clone())
            .unwrap_or(DeliveryMethod::Other(token))
    }

    pub fn as_str(&self) -> &str {
        match self {
            DeliveryMethod::Pickup => "recoge_bodega",
            DeliveryMethod::LocalMessenger => "mensajeria_local",
            DeliveryMethod::Carrier => "transportadora",
            DeliveryMethod::Other(raw) => raw,
        }
    }

    pub fn is_pickup(&self) -> bool {
        matches!(self, DeliveryMethod::Pickup)
    }

    pub fn is_local(&self) -> bool {
        matches!(self, DeliveryMethod::LocalMessenger)
    }
}

impl From<String> for DeliveryMethod {
    fn from(raw: String) -> Self {
        DeliveryMethod::parse(&raw)
    }
}

impl From<DeliveryMethod> for String {
    fn from(method: DeliveryMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
