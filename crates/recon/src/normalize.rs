use crate::config::{KeySynonym, ReconConfig};
use crate::error::ReconError;
use crate::model::AttrMap;

/// Render a decimal or `numerator/denominator` string as a rounded decimal.
///
/// Trailing zeros and a trailing decimal point are dropped
/// (`"16/9"` -> `"1.78"`, `"2.00"` -> `"2"`). Anything that does not parse,
/// or divides by zero, comes back unchanged.
pub fn normalize_numeric(value: &str, decimals: u32) -> String {
    match parse_quotient(value) {
        Some(q) => render(q, decimals),
        None => value.to_string(),
    }
}

fn parse_quotient(value: &str) -> Option<f64> {
    let s = value.trim();
    if let Some((num, den)) = s.split_once('/') {
        let (num, den) = (num.trim(), den.trim());
        if !is_integer_literal(num, true) || !is_integer_literal(den, false) {
            return None;
        }
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den).filter(|q| q.is_finite());
    }

    if !is_decimal_literal(s) {
        return None;
    }
    s.parse::<f64>().ok().filter(|q| q.is_finite())
}

fn render(q: f64, decimals: u32) -> String {
    let text = format!("{:.*}", decimals as usize, q);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

fn strip_sign(s: &str) -> &str {
    s.strip_prefix(['+', '-']).unwrap_or(s)
}

fn is_integer_literal(s: &str, signed: bool) -> bool {
    let digits = if signed { strip_sign(s) } else { s };
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// `[+-]? (digits [. digits?] | . digits) ([eE] [+-]? digits)?`
///
/// Stricter than `f64::from_str`, which also takes `inf` and `NaN`.
fn is_decimal_literal(s: &str) -> bool {
    let body = strip_sign(s);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
        None => (body, None),
    };

    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (mantissa, None),
    };
    let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
    let mantissa_ok = all_digits(int_part)
        && frac_part.map_or(true, all_digits)
        && (!int_part.is_empty() || frac_part.is_some_and(|f| !f.is_empty()));

    mantissa_ok && exponent.map_or(true, |e| is_integer_literal(e, true))
}

/// Make every aliased key also available under its canonical name.
///
/// Fails when the canonical key is already present with a different value:
/// the scrape is internally inconsistent and cannot be compared.
pub fn apply_key_synonyms(attrs: &AttrMap, synonyms: &[KeySynonym]) -> Result<AttrMap, ReconError> {
    let mut out = attrs.clone();
    for syn in synonyms {
        let Some(alias_value) = attrs.get(&syn.alias) else {
            continue;
        };
        match attrs.get(&syn.canonical) {
            Some(canonical_value) if canonical_value != alias_value => {
                return Err(ReconError::DuplicateSynonymKey {
                    alias: syn.alias.clone(),
                    canonical: syn.canonical.clone(),
                    alias_value: alias_value.clone(),
                    canonical_value: canonical_value.clone(),
                });
            }
            _ => {
                out.insert(syn.canonical.clone(), alias_value.clone());
            }
        }
    }
    Ok(out)
}

/// Round every scraped value, then add synonym keys.
///
/// `integer_valued` enables the integer-key rounding (audio streams).
pub fn prepare_scraped_attrs(
    attrs: &AttrMap,
    integer_valued: bool,
    rules: &ReconConfig,
) -> Result<AttrMap, ReconError> {
    let rounded: AttrMap = attrs
        .iter()
        .map(|(key, value)| {
            let decimals = rules.decimals_for(key, integer_valued);
            (key.clone(), normalize_numeric(value, decimals))
        })
        .collect();
    apply_key_synonyms(&rounded, &rules.key_synonyms)
}
