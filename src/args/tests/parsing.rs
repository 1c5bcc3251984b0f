use super::*;

#[test]
fn parse_duration_arg_units() -> AppResult<()> {
    let cases = [
        ("250ms", Duration::from_millis(250)),
        ("10", Duration::from_secs(10)),
        ("10s", Duration::from_secs(10)),
        ("3m", Duration::from_secs(180)),
        ("1h", Duration::from_secs(3600)),
    ];
    for (input, expected) in cases {
        let parsed = parse_duration_arg(input)?;
        if parsed != expected {
            return Err(AppError::validation(format!(
                "'{}' parsed as {:?}",
                input, parsed
            )));
        }
    }
    Ok(())
}

#[test]
fn parse_duration_arg_rejects_garbage() -> AppResult<()> {
    for input in ["", "s", "0s", "5days", "99999999999999999999h"] {
        if parse_duration_arg(input).is_ok() {
            return Err(AppError::validation(format!("Expected Err for '{}'", input)));
        }
    }
    Ok(())
}

#[test]
fn parse_rate_accepts_fractions_and_rejects_negatives() -> AppResult<()> {
    let rate = parse_rate("2.5")?;
    if (rate - 2.5).abs() > f64::EPSILON {
        return Err(AppError::validation("Unexpected rate"));
    }
    for input in ["-1", "abc", "inf", "NaN"] {
        if parse_rate(input).is_ok() {
            return Err(AppError::validation(format!("Expected Err for '{}'", input)));
        }
    }
    Ok(())
}
