use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeedParseError {
    #[error("no seeds given")]
    Empty,
    #[error("seed `{0}` is not a number")]
    NotANumber(String),
}

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Parse a comma-separated seed list. Accepts decimal or `0x` hex.
pub fn parse_seeds(s: &str) -> Result<Vec<u64>, SeedParseError> {
    let seeds = split_csv(s)
        .into_iter()
        .map(|token| {
            let parsed = match token.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => token.parse(),
            };
            parsed.map_err(|_| SeedParseError::NotANumber(token))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if seeds.is_empty() {
        return Err(SeedParseError::Empty);
    }
    Ok(seeds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" alpha, ,beta,  gamma ");
        assert_eq!(parts, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn parses_decimal_and_hex_seeds() {
        assert_eq!(parse_seeds("1337, 0x10").unwrap(), vec![1337, 16]);
    }

    #[test]
    fn rejects_bad_seed_lists() {
        assert_eq!(parse_seeds(" , "), Err(SeedParseError::Empty));
        assert_eq!(
            parse_seeds("12,abc"),
            Err(SeedParseError::NotANumber("abc".to_string()))
        );
    }
}
