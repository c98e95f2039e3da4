//! Fixed extraction instruction sent with every receipt image.

pub const EXTRACTION_INSTRUCTION: &str = r#"Extract the following from this invoice or receipt and return ONLY a JSON object:
{
    "invoice_number": "any invoice/order number",
    "date": "any date found",
    "amount": "total amount (no currency symbol)",
    "customer_name": "name if present",
    "vendor": "business name",
    "masked_card_suffix": "last 4 digits of the card if shown",
    "line_items": ["each item or service as a separate string"],
    "billing_address": "full address if shown",
    "payment_method": "payment type used"
}

Important:
1. Extract values EXACTLY as they appear
2. Use "N/A" if a value is not found
3. Remove currency symbols from amount
4. Include ONLY the last 4 digits of any card number"#;

/// Upper bound on the model's answer length.
pub const MAX_RESPONSE_TOKENS: u32 = 1500;
