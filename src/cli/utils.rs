use anyhow::Result;
use rust_decimal::Decimal;
use std::io::{self, Write};

/// Read a line of input from the terminal
pub fn read_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    // Trim whitespace and newlines
    Ok(input.trim().to_string())
}

/// Ask a yes/no question, defaulting to no
pub fn confirm(prompt: &str) -> Result<bool> {
    let answer = read_line(&format!("{} [y/N]: ", prompt))?;
    Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
}

/// Dollar amount rounded to cents for display
pub fn money(amount: Decimal) -> String {
    format!("${:.2}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_rounds_to_cents() {
        assert_eq!(money(dec!(1030.301)), "$1030.30");
        assert_eq!(money(dec!(5)), "$5.00");
        assert_eq!(money(dec!(0.125)), "$0.12");
    }
}
