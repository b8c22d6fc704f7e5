use rust_decimal::Decimal;

/// Satoshi to BTC/BCH, for log output
pub fn satoshi_to_btc(satoshi: u64) -> Decimal {
  Decimal::from(satoshi) / Decimal::from(100_000_000u64)
}
