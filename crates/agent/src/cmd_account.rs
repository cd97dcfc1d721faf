//! Account commands: `balance`, `register`, `burn`.

use anyhow::{bail, Result};
use recicla_chain::integration::{ChainWrite, Integration};
use recicla_common::types::{Address, BalanceSnapshot};

use crate::cmd_activity::report_tx;
use crate::{print_json, require_chain};

fn balance_table(wallet: &Address, b: &BalanceSnapshot) -> String {
    format!(
        "Wallet {}\n  balance:     {}\n  earned:      {}\n  spent:       {}\n  whitelisted: {}\n",
        wallet,
        b.current_balance,
        b.total_earned,
        b.total_spent,
        if b.is_whitelisted { "yes" } else { "no" }
    )
}

pub async fn handle_balance(integration: &Integration, wallet: &Address, json_output: bool) -> Result<()> {
    let chain = require_chain(integration)?;
    let Some(snapshot) = chain.accounts.get_user_balance(wallet).await else {
        bail!("balance of {} unavailable", wallet);
    };
    if json_output {
        print_json(&snapshot)?;
    } else {
        print!("{}", balance_table(wallet, &snapshot));
    }
    Ok(())
}

/// Goes through the signup path, so the configured registration policy
/// decides whether a failed send is an error.
pub async fn handle_register(
    integration: &Integration,
    wallet: &Address,
    national_id: &str,
    json_output: bool,
) -> Result<()> {
    require_chain(integration)?;
    match integration.register_user(wallet, national_id).await? {
        ChainWrite::Submitted(result) => {
            if !result.is_success() {
                // best effort: report, keep exit code clean
                if json_output {
                    print_json(&result)?;
                } else {
                    println!("⚠ registration failed, continuing: {}", result.error_message().unwrap_or_default());
                }
                return Ok(());
            }
            report_tx("registration", &result, json_output)
        }
        ChainWrite::Skipped { reason } => bail!("registration skipped: {}", reason),
    }
}

pub async fn handle_burn(
    integration: &Integration,
    wallet: &Address,
    amount: &str,
    description: &str,
    json_output: bool,
) -> Result<()> {
    require_chain(integration)?;
    match integration.redeem(Some(wallet), amount, description).await {
        ChainWrite::Submitted(result) => report_tx("burn", &result, json_output),
        ChainWrite::Skipped { reason } => bail!("burn skipped: {}", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recicla_common::units::{from_base_units, SCALE};

    #[test]
    fn balance_table_renders_decimals() {
        let snap = BalanceSnapshot {
            current_balance: from_base_units(30 * SCALE + SCALE / 4),
            total_earned: from_base_units(45 * SCALE),
            total_spent: from_base_units(15 * SCALE),
            is_whitelisted: true,
        };
        let t = balance_table(&Address::from_bytes([0x0B; 20]), &snap);
        assert!(t.contains("30.25"));
        assert!(t.contains("whitelisted: yes"));
    }
}
