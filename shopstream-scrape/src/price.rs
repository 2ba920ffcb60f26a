//! Price string normalisation shared by the storefront adapters.

/// Insert `.` thousands separators into a bare digit string.
///
/// `"1234567"` becomes `"1.234.567"`. Anything that is not a plain digit
/// string (including already-grouped prices) is returned unchanged.
pub fn group_thousands(price: &str) -> String {
    let price = price.trim();
    if price.len() <= 3 || !price.bytes().all(|b| b.is_ascii_digit()) {
        return price.to_owned();
    }

    let head = price.len() % 3;
    let mut out = String::with_capacity(price.len() + price.len() / 3);
    if head != 0 {
        out.push_str(&price[..head]);
    }
    for (i, chunk) in price.as_bytes()[head..].chunks(3).enumerate() {
        if head != 0 || i > 0 {
            out.push('.');
        }
        out.extend(chunk.iter().map(|b| char::from(*b)));
    }
    out
}

/// Normalise a currency-formatted price such as `"COP 12.345,67"` or
/// `"US $4,99"`.
///
/// Takes the amount token (the second whitespace-separated token when a
/// currency code leads), turns the first `,` into `.`, and strips any
/// leading currency symbol.
pub fn normalize_formatted(price: &str) -> String {
    let mut tokens = price.split_whitespace();
    let first = tokens.next().unwrap_or_default();
    let amount = tokens.next().unwrap_or(first);
    amount
        .replacen(',', ".", 1)
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .to_owned()
}

/// Extract the first amount from text like `"$24.99$24.99"`.
pub fn first_dollar_amount(text: &str) -> String {
    text.trim()
        .trim_start_matches('$')
        .split('$')
        .next()
        .unwrap_or_default()
        .trim()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_long_numbers() {
        assert_eq!(group_thousands("1234567"), "1.234.567");
        assert_eq!(group_thousands("123456"), "123.456");
        assert_eq!(group_thousands("12345"), "12.345");
    }

    #[test]
    fn short_or_dotted_prices_unchanged() {
        assert_eq!(group_thousands("999"), "999");
        assert_eq!(group_thousands("12.500"), "12.500");
        assert_eq!(group_thousands(""), "");
        assert_eq!(group_thousands("1234 pesos"), "1234 pesos");
    }

    #[test]
    fn formatted_price_with_currency_code() {
        assert_eq!(normalize_formatted("COP 45.900"), "45.900");
        assert_eq!(normalize_formatted("US $4,99"), "4.99");
    }

    #[test]
    fn formatted_price_without_currency_code() {
        assert_eq!(normalize_formatted("$12,50"), "12.50");
        assert_eq!(normalize_formatted(""), "");
    }

    #[test]
    fn dollar_amount_takes_first_value() {
        assert_eq!(first_dollar_amount("$24.99$24.99"), "24.99");
        assert_eq!(first_dollar_amount("$5"), "5");
        assert_eq!(first_dollar_amount(""), "");
    }
}
