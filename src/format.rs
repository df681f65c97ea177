//! Price formatting for notifications
//!
//! Copper amounts are displayed as gold/silver/copper denominations:
//! 1 gold = 10,000 copper, 1 silver = 100 copper.

/// Format a copper amount as a human-readable denomination string.
pub fn format_price(copper: u64) -> String {
    let gold = copper / 10_000;
    let silver = (copper / 100) % 100;
    let copper = copper % 100;

    let mut out = String::new();
    if gold > 0 {
        out.push_str(&format!("{}g ", group_thousands(gold)));
    }
    if gold > 0 || silver > 0 {
        out.push_str(&format!("{silver}s "));
    }
    out.push_str(&format!("{copper}c"));
    out
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
