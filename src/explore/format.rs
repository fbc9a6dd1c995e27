//! Display formatting for the explorer

use crate::index::apy_as_percent;

/// Human label for a chain slug; unknown slugs are capitalized.
pub fn chain_label(chain: Option<&str>) -> String {
    let slug = chain.map(|c| c.trim().to_lowercase()).unwrap_or_default();
    let label = match slug.as_str() {
        "" => "Unknown",
        "eth" | "ethereum" => "Ethereum",
        "arb" | "arbitrum" => "Arbitrum",
        "op" | "optimism" => "Optimism",
        "base" => "Base",
        "polygon" | "matic" => "Polygon",
        "hyper" | "hyperliquid" => "Hyper",
        "uni" | "unichain" => "Unichain",
        "global" => "Global",
        _ => {
            let mut chars = slug.chars();
            return match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => "Unknown".to_string(),
            };
        }
    };
    label.to_string()
}

fn trim_fraction(text: String) -> String {
    if !text.contains('.') {
        return text;
    }
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Compact dollars: `$1.2M`, `$950K`, `$12`.
///
/// One fraction digit below ten units, none above.
pub fn format_usd_compact(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    const UNITS: [(f64, &str); 5] = [(1e12, "T"), (1e9, "B"), (1e6, "M"), (1e3, "K"), (1.0, "")];

    let sign = if value < 0.0 { "-" } else { "" };
    let abs = value.abs();
    let (scale, suffix) = UNITS
        .into_iter()
        .find(|(scale, _)| abs >= *scale)
        .unwrap_or((1.0, ""));
    let scaled = abs / scale;
    let digits = if scaled < 10.0 { 1 } else { 0 };
    format!("{sign}${}{suffix}", trim_fraction(format!("{scaled:.digits$}")))
}

/// Fraction as a percentage with at most two decimals: `0.1234` → `12.34%`.
pub fn format_percent(fraction: f64) -> String {
    format!("{}%", trim_fraction(format!("{:.2}", fraction * 100.0)))
}

/// APY for display, reading values above 1 as already in percent.
pub fn format_apy(apy: Option<f64>) -> String {
    match apy {
        Some(apy) if apy.is_finite() => format!("{:.2}%", apy_as_percent(apy)),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_labels() {
        assert_eq!(chain_label(Some("ETH")), "Ethereum");
        assert_eq!(chain_label(Some(" arbitrum ")), "Arbitrum");
        assert_eq!(chain_label(Some("plasma")), "Plasma");
        assert_eq!(chain_label(Some("")), "Unknown");
        assert_eq!(chain_label(None), "Unknown");
    }

    #[test]
    fn compact_usd() {
        assert_eq!(format_usd_compact(1_234_567.0), "$1.2M");
        assert_eq!(format_usd_compact(950_000.0), "$950K");
        assert_eq!(format_usd_compact(2_000_000_000.0), "$2B");
        assert_eq!(format_usd_compact(-800.0), "-$800");
        assert_eq!(format_usd_compact(12.4), "$12");
        assert_eq!(format_usd_compact(3.21), "$3.2");
        assert_eq!(format_usd_compact(0.0), "$0");
    }

    #[test]
    fn percent_and_apy() {
        assert_eq!(format_percent(0.1234), "12.34%");
        assert_eq!(format_percent(0.5), "50%");
        assert_eq!(format_apy(Some(0.045)), "4.50%");
        assert_eq!(format_apy(Some(6.2)), "6.20%");
        assert_eq!(format_apy(None), "-");
    }
}
