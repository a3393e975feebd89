//! Configuration validation.
//!
//! Checks every section a run depends on before any provider is touched.

use std::str::FromStr;

use crate::domain::error::TradeLedgerError;
use crate::domain::universe::parse_assets;
use crate::ports::config_port::ConfigPort;

pub const LEDGER_BACKENDS: &[&str] = &["csv", "sqlite"];
pub const ORACLE_KINDS: &[&str] = &["csv", "command"];

pub fn validate_run_config(config: &dyn ConfigPort) -> Result<(), TradeLedgerError> {
    validate_assets(config)?;
    validate_initial_capital(config)?;
    validate_ledger(config)?;
    validate_prices(config)?;
    validate_oracle(config)?;
    Ok(())
}

/// Subset needed by commands that only read the ledger.
pub fn validate_ledger_config(config: &dyn ConfigPort) -> Result<(), TradeLedgerError> {
    validate_assets(config)?;
    validate_ledger(config)?;
    Ok(())
}

fn validate_assets(config: &dyn ConfigPort) -> Result<(), TradeLedgerError> {
    match config.get_string("portfolio", "assets") {
        Some(s) if !s.trim().is_empty() => {
            parse_assets(&s).map_err(|e| TradeLedgerError::ConfigInvalid {
                section: "portfolio".to_string(),
                key: "assets".to_string(),
                reason: e.to_string(),
            })?;
            Ok(())
        }
        _ => Err(TradeLedgerError::ConfigMissing {
            section: "portfolio".to_string(),
            key: "assets".to_string(),
        }),
    }
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), TradeLedgerError> {
    let Some(value) = parse_present::<f64>(config, "portfolio", "initial_capital")? else {
        return Ok(());
    };
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(
            "portfolio",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    Ok(())
}

fn validate_ledger(config: &dyn ConfigPort) -> Result<(), TradeLedgerError> {
    let backend = config
        .get_string("ledger", "backend")
        .unwrap_or_else(|| "csv".to_string());
    if !LEDGER_BACKENDS.contains(&backend.as_str()) {
        return Err(TradeLedgerError::ConfigInvalid {
            section: "ledger".to_string(),
            key: "backend".to_string(),
            reason: format!("unknown backend {backend:?}, expected csv or sqlite"),
        });
    }
    if backend == "sqlite" {
        require(config, "sqlite", "path")?;
        if parse_present::<u32>(config, "sqlite", "pool_size")? == Some(0) {
            return Err(invalid("sqlite", "pool_size", "pool_size must be at least 1"));
        }
    }
    Ok(())
}

fn validate_prices(config: &dyn ConfigPort) -> Result<(), TradeLedgerError> {
    require(config, "prices", "dir")?;
    validate_timeout(config, "prices")
}

fn validate_oracle(config: &dyn ConfigPort) -> Result<(), TradeLedgerError> {
    let kind = config
        .get_string("oracle", "kind")
        .unwrap_or_else(|| "csv".to_string());
    match kind.as_str() {
        "csv" => require(config, "oracle", "signals_file")?,
        "command" => require(config, "oracle", "command")?,
        _ => {
            return Err(TradeLedgerError::ConfigInvalid {
                section: "oracle".to_string(),
                key: "kind".to_string(),
                reason: format!("unknown oracle kind {kind:?}, expected csv or command"),
            })
        }
    }
    validate_timeout(config, "oracle")
}

fn validate_timeout(config: &dyn ConfigPort, section: &str) -> Result<(), TradeLedgerError> {
    if parse_present::<u64>(config, section, "timeout_secs")? == Some(0) {
        return Err(invalid(
            section,
            "timeout_secs",
            "timeout_secs must be a positive integer",
        ));
    }
    Ok(())
}

/// Parses a key when it is set. An absent key falls back to its default
/// elsewhere; a present one that does not parse is an error.
fn parse_present<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, TradeLedgerError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| invalid(section, key, &format!("cannot parse {raw:?}"))),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> TradeLedgerError {
    TradeLedgerError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), TradeLedgerError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(TradeLedgerError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const VALID: &str = r#"
[portfolio]
assets = AAPL,NVDA,MSFT
initial_capital = 10000.0

[ledger]
backend = csv
record_file = ledger.csv

[prices]
dir = prices
timeout_secs = 30

[oracle]
kind = csv
signals_file = signals.csv
"#;

    #[test]
    fn valid_config_passes() {
        assert!(validate_run_config(&make_config(VALID)).is_ok());
    }

    #[test]
    fn missing_assets_fails() {
        let config = make_config("[portfolio]\ninitial_capital = 10000\n");
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, TradeLedgerError::ConfigMissing { key, .. } if key == "assets"));
    }

    #[test]
    fn duplicate_assets_fail() {
        let config = make_config(&VALID.replace("AAPL,NVDA,MSFT", "AAPL,NVDA,aapl"));
        let err = validate_run_config(&config).unwrap_err();
        assert!(
            matches!(err, TradeLedgerError::ConfigInvalid { key, reason, .. } if key == "assets" && reason.contains("AAPL"))
        );
    }

    #[test]
    fn initial_capital_must_be_positive() {
        let config = make_config(&VALID.replace("initial_capital = 10000.0", "initial_capital = 0"));
        let err = validate_run_config(&config).unwrap_err();
        assert!(
            matches!(err, TradeLedgerError::ConfigInvalid { key, .. } if key == "initial_capital")
        );
    }

    #[test]
    fn unparseable_initial_capital_fails() {
        let config = make_config(&VALID.replace("initial_capital = 10000.0", "initial_capital = abc"));
        let err = validate_run_config(&config).unwrap_err();
        assert!(
            matches!(err, TradeLedgerError::ConfigInvalid { key, reason, .. } if key == "initial_capital" && reason.contains("abc"))
        );
    }

    #[test]
    fn absent_initial_capital_uses_default() {
        let config = make_config(&VALID.replace("initial_capital = 10000.0", ""));
        assert!(validate_run_config(&config).is_ok());
    }

    #[test]
    fn oversized_pool_size_fails() {
        let config = make_config(&VALID.replace(
            "backend = csv",
            "backend = sqlite\n\n[sqlite]\npath = t.db\npool_size = 4294967296",
        ));
        let err = validate_run_config(&config).unwrap_err();
        assert!(
            matches!(err, TradeLedgerError::ConfigInvalid { section, key, .. } if section == "sqlite" && key == "pool_size")
        );
    }

    #[test]
    fn zero_pool_size_fails() {
        let config = make_config(&VALID.replace(
            "backend = csv",
            "backend = sqlite\n\n[sqlite]\npath = t.db\npool_size = 0",
        ));
        assert!(validate_run_config(&config).is_err());
    }

    #[test]
    fn non_numeric_timeout_fails() {
        let config = make_config(&VALID.replace("timeout_secs = 30", "timeout_secs = soon"));
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, TradeLedgerError::ConfigInvalid { key, .. } if key == "timeout_secs"));
    }

    #[test]
    fn unknown_backend_fails() {
        let config = make_config(&VALID.replace("backend = csv", "backend = parquet"));
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, TradeLedgerError::ConfigInvalid { key, .. } if key == "backend"));
    }

    #[test]
    fn sqlite_backend_requires_path() {
        let config = make_config(&VALID.replace("backend = csv", "backend = sqlite"));
        let err = validate_run_config(&config).unwrap_err();
        assert!(
            matches!(err, TradeLedgerError::ConfigMissing { section, key } if section == "sqlite" && key == "path")
        );
    }

    #[test]
    fn missing_price_dir_fails() {
        let config = make_config(&VALID.replace("dir = prices", ""));
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, TradeLedgerError::ConfigMissing { key, .. } if key == "dir"));
    }

    #[test]
    fn command_oracle_requires_command() {
        let config = make_config(&VALID.replace("kind = csv", "kind = command"));
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, TradeLedgerError::ConfigMissing { key, .. } if key == "command"));
    }

    #[test]
    fn unknown_oracle_kind_fails() {
        let config = make_config(&VALID.replace("kind = csv", "kind = llm"));
        let err = validate_run_config(&config).unwrap_err();
        assert!(matches!(err, TradeLedgerError::ConfigInvalid { key, .. } if key == "kind"));
    }

    #[test]
    fn zero_timeout_fails() {
        let config = make_config(&VALID.replace("timeout_secs = 30", "timeout_secs = 0"));
        let err = validate_run_config(&config).unwrap_err();
        assert!(
            matches!(err, TradeLedgerError::ConfigInvalid { section, key, .. } if section == "prices" && key == "timeout_secs")
        );
    }

    #[test]
    fn ledger_only_validation_ignores_providers() {
        let config = make_config("[portfolio]\nassets = AAPL\n");
        assert!(validate_ledger_config(&config).is_ok());
    }
}
