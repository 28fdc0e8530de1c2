//! sBTC yield-rewards contract: enrollment status, cycles, reward lookups
//! and the enrollment transaction.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::identity::StacksWallet;
use crate::protocols::units::{self, SBTC_DECIMALS};
use crate::stacks::transaction::{ContractCall, ContractCallTransaction};
use crate::stacks::{split_contract_id, ClarityValue, HiroClient};

/// sBTC incentives client bound to one rewards contract.
#[derive(Debug, Clone)]
pub struct SbtcClient {
    hiro: HiroClient,
    contract_address: String,
    contract_name: String,
    default_fee: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub current_cycle: bool,
    pub next_cycle: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentStatus {
    pub current_cycle: bool,
    pub next_cycle: bool,
    pub formatted: String,
}

impl From<Enrollment> for EnrollmentStatus {
    fn from(e: Enrollment) -> Self {
        let yes_no = |b: bool| if b { "Yes" } else { "No" };
        Self {
            current_cycle: e.current_cycle,
            next_cycle: e.next_cycle,
            formatted: format!(
                "Enrolled for current cycle: {}, Enrolled for next cycle: {}",
                yes_no(e.current_cycle),
                yes_no(e.next_cycle)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentCycle {
    pub cycle_id: u64,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardAddress {
    pub address: String,
    pub reward_address: Option<String>,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleRewards {
    pub cycle: u64,
    pub address: String,
    pub rewards: f64,
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollResult {
    pub success: bool,
    pub txid: String,
    pub formatted: String,
}

/// Interpret a predicate result: `(ok bool)` or a bare bool. Anything else
/// (including `(err ..)`) counts as not enrolled.
fn predicate(value: ClarityValue) -> bool {
    value
        .into_ok()
        .ok()
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

impl SbtcClient {
    pub fn new(hiro: HiroClient, contract_id: &str, default_fee: u64) -> Result<Self> {
        let (contract_address, contract_name) = split_contract_id(contract_id)?;
        Ok(Self {
            hiro,
            contract_address: contract_address.to_string(),
            contract_name: contract_name.to_string(),
            default_fee,
        })
    }

    async fn read(&self, function: &str, args: &[ClarityValue], sender: &str) -> Result<ClarityValue> {
        self.hiro
            .call_read_only(&self.contract_address, &self.contract_name, function, args, sender)
            .await
    }

    /// Enrollment in the current and next cycle, queried independently.
    pub async fn enrollment(&self, address: &str) -> Result<EnrollmentStatus> {
        let who = [ClarityValue::principal(address)?];
        let (current, next) = futures::try_join!(
            self.read("is-enrolled-this-cycle", &who, address),
            self.read("is-enrolled-in-next-cycle", &who, address),
        )?;
        Ok(Enrollment {
            current_cycle: predicate(current),
            next_cycle: predicate(next),
        }
        .into())
    }

    /// Current rewards cycle id. Without a sender the contract itself is used.
    pub async fn current_cycle(&self, sender: Option<&str>) -> Result<CurrentCycle> {
        let sender = sender.unwrap_or(&self.contract_address);
        let value = self
            .read("current-cycle-id", &[], sender)
            .await?
            .into_ok()
            .map_err(|err| anyhow::anyhow!("current-cycle-id returned error: {}", err))?;
        let cycle_id = value
            .as_uint()
            .and_then(|v| u64::try_from(v).ok())
            .context("current-cycle-id did not return a uint")?;
        Ok(CurrentCycle {
            cycle_id,
            formatted: format!("Current sBTC rewards cycle ID: {}", cycle_id),
        })
    }

    /// Latest reward address registered for `address`.
    pub async fn reward_address(&self, address: &str) -> Result<RewardAddress> {
        let value = self
            .read(
                "get-latest-reward-address",
                &[ClarityValue::principal(address)?],
                address,
            )
            .await?
            .into_ok()
            .map_err(|err| anyhow::anyhow!("get-latest-reward-address returned error: {}", err))?;

        let reward_address = match value {
            ClarityValue::OptionalNone => None,
            ClarityValue::OptionalSome(inner) => Some(render_principal(*inner)),
            other => Some(render_principal(other)),
        };
        let formatted = match &reward_address {
            Some(reward) => format!("The reward address for {} is {}", address, reward),
            None => format!("No reward address is registered for {}", address),
        };
        Ok(RewardAddress {
            address: address.to_string(),
            reward_address,
            formatted,
        })
    }

    /// Rewards (in sBTC) earned by `address` in `cycle`.
    pub async fn rewards_by_cycle(&self, cycle: u64, address: &str) -> Result<CycleRewards> {
        let value = self
            .read(
                "reward-amount-for-cycle-and-address",
                &[
                    ClarityValue::UInt(cycle as u128),
                    ClarityValue::principal(address)?,
                ],
                address,
            )
            .await?
            .into_ok()
            .map_err(|err| anyhow::anyhow!("reward-amount-for-cycle-and-address returned error: {}", err))?;

        let raw = match &value {
            ClarityValue::OptionalNone => 0,
            ClarityValue::OptionalSome(inner) => inner.as_uint().context("Reward amount is not a uint")?,
            other => other.as_uint().context("Reward amount is not a uint")?,
        };
        let rewards = units::fixed_point_to_f64(raw, SBTC_DECIMALS)?;
        Ok(CycleRewards {
            cycle,
            address: address.to_string(),
            rewards,
            formatted: format!(
                "sBTC rewards for cycle {} and address {}: {} sBTC",
                cycle, address, rewards
            ),
        })
    }

    /// Build, sign and broadcast `enroll(principal self)` for the wallet.
    pub async fn enroll(&self, wallet: &StacksWallet) -> Result<EnrollResult> {
        let payload = ContractCall {
            contract_address: self.contract_address.clone(),
            contract_name: self.contract_name.clone(),
            function_name: "enroll".into(),
            function_args: vec![ClarityValue::principal(&wallet.address)?],
        };

        let nonce = self
            .hiro
            .next_nonce(&wallet.address)
            .await
            .context("Failed to fetch account nonce")?;

        let mut tx = ContractCallTransaction::new(wallet.network, wallet.hash160, nonce, 0, payload);
        let estimated_len = tx.serialize()?.len();
        tx.fee = match self
            .hiro
            .estimate_fee(&tx.payload.serialize()?, estimated_len)
            .await
        {
            Ok(fee) => fee,
            Err(e) => {
                warn!("Fee estimation failed, using default {}: {:#}", self.default_fee, e);
                self.default_fee
            }
        };

        tx.sign(wallet.signing_key())?;
        let local_txid = tx.txid()?;
        let txid = self.hiro.broadcast(tx.serialize()?).await?;
        let txid = if txid.is_empty() { local_txid } else { txid };
        info!("Broadcast sBTC enrollment {} (nonce {}, fee {})", txid, nonce, tx.fee);

        Ok(EnrollResult {
            success: true,
            formatted: format!(
                "Successfully enrolled in sBTC incentives. Transaction ID: {}",
                txid
            ),
            txid,
        })
    }
}

fn render_principal(value: ClarityValue) -> String {
    value.principal_string().unwrap_or_else(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enrollment_flags_are_independent() {
        for current in [false, true] {
            for next in [false, true] {
                let status: EnrollmentStatus = Enrollment {
                    current_cycle: current,
                    next_cycle: next,
                }
                .into();
                assert_eq!(status.current_cycle, current);
                assert_eq!(status.next_cycle, next);
            }
        }
        let status: EnrollmentStatus = Enrollment {
            current_cycle: false,
            next_cycle: true,
        }
        .into();
        assert_eq!(
            status.formatted,
            "Enrolled for current cycle: No, Enrolled for next cycle: Yes"
        );
    }

    #[test]
    fn predicate_reads_ok_bool_only() {
        assert!(predicate(ClarityValue::ResponseOk(Box::new(ClarityValue::Bool(true)))));
        assert!(predicate(ClarityValue::Bool(true)));
        assert!(!predicate(ClarityValue::ResponseErr(Box::new(ClarityValue::Bool(true)))));
        assert!(!predicate(ClarityValue::UInt(1)));
    }

    #[test]
    fn rejects_malformed_contract_id() {
        let hiro = HiroClient::new("http://127.0.0.1:9", None, reqwest::Client::new());
        assert!(SbtcClient::new(hiro, "no-dot-here", 1).is_err());
    }
}
