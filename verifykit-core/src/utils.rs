use crate::error::VerifyKitError;

/// Parses an ISO-8601 duration like `PT30S` or `P1DT2H` into whole seconds.
///
/// Week, day, hour, minute and second designators are supported. Years and months
/// have no fixed length and are rejected. Fractional seconds are truncated.
///
/// # Errors
///
/// Returns [`VerifyKitError::InvalidInput`] if the value is not a supported duration.
pub fn parse_iso8601_duration(value: &str) -> Result<u64, VerifyKitError> {
    let invalid = |reason: &str| VerifyKitError::InvalidInput {
        attribute: "duration".to_string(),
        reason: format!("`{value}`: {reason}"),
    };

    let rest = value
        .strip_prefix('P')
        .ok_or_else(|| invalid("missing `P` prefix"))?;
    let (date, time) = match rest.split_once('T') {
        Some((_, "")) => return Err(invalid("empty time part")),
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };
    if date.is_empty() && time.is_none() {
        return Err(invalid("no components"));
    }

    let mut seconds = 0_f64;
    for (amount, designator) in components(date).map_err(|e| invalid(&e))? {
        seconds += amount
            * match designator {
                'W' => 604_800.0,
                'D' => 86_400.0,
                other => return Err(invalid(&format!("unsupported date designator `{other}`"))),
            };
    }
    for (amount, designator) in components(time.unwrap_or_default()).map_err(|e| invalid(&e))? {
        seconds += amount
            * match designator {
                'H' => 3_600.0,
                'M' => 60.0,
                'S' => 1.0,
                other => return Err(invalid(&format!("unsupported time designator `{other}`"))),
            };
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(seconds.trunc() as u64)
}

/// Splits `5D3W` style input into `(5.0, 'D'), (3.0, 'W')`.
fn components(part: &str) -> Result<Vec<(f64, char)>, String> {
    let mut out = Vec::new();
    let mut number = String::new();
    for c in part.chars() {
        if c.is_ascii_digit() || c == '.' || c == ',' {
            number.push(if c == ',' { '.' } else { c });
            continue;
        }
        if number.is_empty() {
            return Err(format!("designator `{c}` without a value"));
        }
        let amount = number
            .parse::<f64>()
            .map_err(|_| format!("invalid number `{number}`"))?;
        out.push((amount, c));
        number.clear();
    }
    if number.is_empty() {
        Ok(out)
    } else {
        Err(format!("trailing value `{number}`"))
    }
}
