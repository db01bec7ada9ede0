//! Transaction assembly and signing.
//!
//! Every recipe follows the same steps:
//! 1. Validate amounts and recipients (no I/O has happened yet)
//! 2. Split the caller's UTXO snapshot into asset buckets and select coins
//! 3. Lay out outputs in a fixed order and drop native change below dust
//! 4. Sign each input against the script of the output it spends
//!
//! Recipes: plain transfer, colored transfer, burn, reissuable (`c1`) issue,
//! and the two legs of an outpoint-derived (`c2`/`c3`) issue.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use chroma_core::address::{Address, Network};
use chroma_core::constants::{
    DEFAULT_FEE_RATE, DUST_THRESHOLD, MAX_COLORED_AMOUNT, MAX_MONEY, estimated_fee,
};
use chroma_core::crypto::KeyPair;
use chroma_core::error::NetworkError;
use chroma_core::script::Script;
use chroma_core::traits::UtxoSource;
use chroma_core::transaction::{Transaction, TxIn, TxOut};
use chroma_core::types::{ColorId, OutPoint, Txid, Utxo};

use crate::coin_selection::{CoinSelection, CoinSelector, FeeModel};
use crate::color::PayToContract;
use crate::error::WalletError;
use crate::keys::KeyMaterial;

/// Outputs of a plain transfer: recipient and change.
const TRANSFER_OUTPUTS: u64 = 2;

/// Outputs assumed for a colored transfer: recipient, asset change, native change.
const ASSET_TRANSFER_OUTPUTS: u64 = 3;

/// Outputs of a funding transaction (P2C dust, change) and of an issue transaction
/// (colored output, change).
const ISSUANCE_OUTPUTS: u64 = 2;

/// Inputs of a funded issue transaction: P2C dust and funding change.
const ISSUE_INPUTS: u64 = 2;

/// A fully signed transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub tx: Transaction,
    pub hex: String,
    /// Locally computed txid.
    pub txid: Txid,
    /// Native value consumed by fees, including any change folded in below dust.
    pub fee: u64,
}

impl SignedTransaction {
    fn new(tx: Transaction, fee: u64) -> Self {
        Self {
            hex: tx.to_hex(),
            txid: tx.txid(),
            tx,
            fee,
        }
    }

    /// Submit to `source`, checking the returned id against the local one.
    pub async fn broadcast<S: UtxoSource + ?Sized>(&self, source: &S) -> Result<Txid, NetworkError> {
        let remote = source.broadcast(&self.hex).await?;
        if remote != self.txid {
            return Err(NetworkError::TxidMismatch {
                local: self.txid.to_string(),
                remote: remote.to_string(),
            });
        }
        info!(txid = %self.txid, fee = self.fee, bytes = self.hex.len() / 2, "broadcast transaction");
        Ok(remote)
    }
}

/// What happens to the selected colored coins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetAction {
    /// Pay `amount` to the address.
    Transfer(Address),
    /// Destroy `amount`; only the change survives.
    Burn,
}

/// Inputs available to the issue transaction of a funded issuance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IssueLeg {
    /// Dust output paid to the P2C address (funding output 0).
    pub p2c_input: Utxo,
    /// Funding change paid back to the issuer (funding output 1).
    pub change_input: Option<Utxo>,
}

impl IssueLeg {
    pub fn funding_outpoint(&self) -> OutPoint {
        self.p2c_input.outpoint
    }

    fn total(&self) -> u64 {
        self.p2c_input
            .value
            .saturating_add(self.change_input.as_ref().map_or(0, |u| u.value))
    }
}

/// Leg one of a funded issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingTransaction {
    pub signed: SignedTransaction,
    pub leg: IssueLeg,
    /// Fee reserved in the change for the issue transaction.
    pub issue_fee: u64,
}

/// One input to sign: the spent output, its locking script, and the signer.
struct Spend<'a> {
    outpoint: OutPoint,
    script_code: Script,
    keypair: &'a KeyPair,
}

/// Builds and signs transactions for one network at a fixed fee rate.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    network: Network,
    fee_rate: u64,
    dust_threshold: u64,
}

impl TransactionBuilder {
    /// Builder with the default fee rate and dust threshold.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            fee_rate: DEFAULT_FEE_RATE,
            dust_threshold: DUST_THRESHOLD,
        }
    }

    /// Override the fee rate (default: [`DEFAULT_FEE_RATE`]).
    pub fn set_fee_rate(&mut self, fee_rate: u64) -> &mut Self {
        self.fee_rate = fee_rate;
        self
    }

    /// Override the dust threshold (default: [`DUST_THRESHOLD`]).
    pub fn set_dust_threshold(&mut self, dust_threshold: u64) -> &mut Self {
        self.dust_threshold = dust_threshold;
        self
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn fee_rate(&self) -> u64 {
        self.fee_rate
    }

    pub fn dust_threshold(&self) -> u64 {
        self.dust_threshold
    }

    /// Validate a native amount: positive, within supply, not dust.
    pub fn check_native_amount(&self, amount: u64) -> Result<(), WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount("amount must be positive".into()));
        }
        if amount > MAX_MONEY {
            return Err(WalletError::InvalidAmount(format!(
                "{amount} exceeds maximum {MAX_MONEY}"
            )));
        }
        if amount < self.dust_threshold {
            return Err(WalletError::DustAmount {
                amount,
                threshold: self.dust_threshold,
            });
        }
        Ok(())
    }

    /// Validate a token amount: positive and within the colored bound.
    pub fn check_asset_amount(&self, amount: u64) -> Result<(), WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount("amount must be positive".into()));
        }
        if amount > MAX_COLORED_AMOUNT {
            return Err(WalletError::InvalidAmount(format!(
                "{amount} exceeds maximum {MAX_COLORED_AMOUNT}"
            )));
        }
        Ok(())
    }

    /// Pubkey hash of a recipient on this builder's network.
    pub fn check_recipient(&self, to: &Address, color: Option<&ColorId>) -> Result<[u8; 20], WalletError> {
        if to.network() != self.network {
            return Err(WalletError::InvalidAddress(format!(
                "{to} is not a {} address",
                self.network
            )));
        }
        match (to.color(), color) {
            (Some(_), None) => Err(WalletError::InvalidAddress(format!(
                "{to} is a colored address and cannot receive native coins"
            ))),
            (Some(found), Some(expected)) if found != expected => Err(WalletError::InvalidAddress(
                format!("{to} is bound to color {found}, not {expected}"),
            )),
            _ => Ok(*to.pubkey_hash()),
        }
    }

    /// Fee of an issue transaction spending the P2C dust and funding change.
    pub fn issue_fee(&self) -> u64 {
        estimated_fee(self.fee_rate, ISSUE_INPUTS, ISSUANCE_OUTPUTS)
    }

    /// Native value the funding change must carry for the issue transaction.
    pub fn funding_reserve(&self) -> u64 {
        self.issue_fee().max(self.dust_threshold)
    }

    /// Coin selection for a plain transfer, without building anything.
    pub fn estimate_transfer_fee(&self, utxos: &[Utxo], amount: u64) -> Result<CoinSelection, WalletError> {
        self.check_native_amount(amount)?;
        let native = native_utxos(utxos);
        CoinSelector::select(&native, amount, &FeeModel::new(self.fee_rate, TRANSFER_OUTPUTS))
    }

    /// Plain native transfer of `amount` to `to`, change back to the sender.
    pub fn build_transfer(
        &self,
        utxos: &[Utxo],
        key: &KeyMaterial,
        to: &Address,
        amount: u64,
    ) -> Result<SignedTransaction, WalletError> {
        self.check_native_amount(amount)?;
        let to_hash = self.check_recipient(to, None)?;

        let native = native_utxos(utxos);
        let selection =
            CoinSelector::select(&native, amount, &FeeModel::new(self.fee_rate, TRANSFER_OUTPUTS))?;

        let mut outputs = vec![TxOut {
            value: amount,
            script_pubkey: Script::p2pkh(&to_hash),
        }];
        let change = self.push_native_change(&mut outputs, key, selection.change);

        let spends = self.native_spends(&selection.selected, key);
        let fee = selection.total_input - amount - change;
        debug!(
            inputs = spends.len(),
            total_input = selection.total_input,
            amount,
            change,
            fee,
            "built transfer"
        );
        self.sign(&spends, outputs, fee)
    }

    /// Colored transfer or burn of `amount` units of `color`.
    ///
    /// Inputs are the selected colored coins followed by the native coins that
    /// pay the fee. Outputs: recipient (transfer only), asset change if any,
    /// native change if not dust. A burn that leaves no asset change keeps at
    /// least a dust-sized native change output.
    pub fn build_asset(
        &self,
        utxos: &[Utxo],
        key: &KeyMaterial,
        color: &ColorId,
        amount: u64,
        action: &AssetAction,
    ) -> Result<SignedTransaction, WalletError> {
        self.check_asset_amount(amount)?;
        let to_hash = match action {
            AssetAction::Transfer(to) => Some(self.check_recipient(to, Some(color))?),
            AssetAction::Burn => None,
        };

        let colored: Vec<Utxo> = utxos.iter().filter(|u| u.has_color(Some(color))).cloned().collect();
        if colored.is_empty() {
            return Err(WalletError::NoUtxosAvailable {
                asset: color.to_hex(),
            });
        }
        let native = native_utxos(utxos);
        if native.is_empty() {
            return Err(WalletError::NoFeeUtxos);
        }

        let asset = CoinSelector::select_asset(&colored, color, amount)?;
        let has_asset_change = asset.change > 0;
        let (output_count, native_target) = match action {
            AssetAction::Transfer(_) => (ASSET_TRANSFER_OUTPUTS, 0),
            AssetAction::Burn if has_asset_change => (2, 0),
            AssetAction::Burn => (1, self.dust_threshold),
        };
        let fee_model = FeeModel::new(self.fee_rate, output_count)
            .with_extra_inputs(asset.selected.len() as u64);
        let fees = CoinSelector::select(&native, native_target, &fee_model)?;

        let own_hash = *key.address().pubkey_hash();
        let mut outputs = Vec::with_capacity(3);
        if let Some(to_hash) = to_hash {
            outputs.push(TxOut {
                value: amount,
                script_pubkey: Script::cp2pkh(color, &to_hash),
            });
        }
        if has_asset_change {
            outputs.push(TxOut {
                value: asset.change,
                script_pubkey: Script::cp2pkh(color, &own_hash),
            });
        }
        let change = self.push_native_change(&mut outputs, key, native_target + fees.change);

        let mut spends: Vec<Spend<'_>> = asset
            .selected
            .iter()
            .map(|u| Spend {
                outpoint: u.outpoint,
                script_code: Script::cp2pkh(color, &own_hash),
                keypair: key.keypair(),
            })
            .collect();
        spends.extend(self.native_spends(&fees.selected, key));

        let fee = fees.total_input - change;
        debug!(
            color = %color,
            burn = to_hash.is_none(),
            asset_inputs = asset.selected.len(),
            native_inputs = fees.selected.len(),
            amount,
            asset_change = asset.change,
            change,
            fee,
            "built colored transaction"
        );
        self.sign(&spends, outputs, fee)
    }

    /// Single-transaction issue of a reissuable token to the issuer's colored address.
    pub fn build_reissuable_issue(
        &self,
        utxos: &[Utxo],
        key: &KeyMaterial,
        p2c: &PayToContract,
        amount: u64,
    ) -> Result<SignedTransaction, WalletError> {
        self.check_asset_amount(amount)?;
        let color = p2c.reissuable_color_id();
        let native = native_utxos(utxos);
        let selection =
            CoinSelector::select(&native, 0, &FeeModel::new(self.fee_rate, ISSUANCE_OUTPUTS))?;

        let mut outputs = vec![TxOut {
            value: amount,
            script_pubkey: Script::cp2pkh(&color, key.address().pubkey_hash()),
        }];
        let change = self.push_native_change(&mut outputs, key, selection.change);

        let spends = self.native_spends(&selection.selected, key);
        let fee = selection.total_input - change;
        debug!(color = %color, amount, change, fee, "built reissuable issue");
        self.sign(&spends, outputs, fee)
    }

    /// Leg one of a funded issue: dust to the P2C address, change reserved for leg two.
    ///
    /// Fails with `InsufficientFunds` unless the change covers the issue fee
    /// and is itself spendable.
    pub fn build_funding(
        &self,
        utxos: &[Utxo],
        key: &KeyMaterial,
        p2c: &PayToContract,
    ) -> Result<FundingTransaction, WalletError> {
        let dust = self.dust_threshold;
        let issue_fee = self.issue_fee();
        let reserve = self.funding_reserve();
        let target = dust.saturating_add(reserve);

        let native = native_utxos(utxos);
        let selection =
            CoinSelector::select(&native, target, &FeeModel::new(self.fee_rate, ISSUANCE_OUTPUTS))?;

        let funding_change = selection.total_input - dust - selection.fee;
        if funding_change < issue_fee || funding_change < dust {
            return Err(WalletError::InsufficientFunds {
                have: selection.total_input,
                need: target.saturating_add(selection.fee),
            });
        }

        let outputs = vec![
            TxOut {
                value: dust,
                script_pubkey: Script::p2pkh(&p2c.public_key().pubkey_hash()),
            },
            TxOut {
                value: funding_change,
                script_pubkey: Script::p2pkh(key.address().pubkey_hash()),
            },
        ];
        let spends = self.native_spends(&selection.selected, key);
        let signed = self.sign(&spends, outputs, selection.fee)?;

        let leg = IssueLeg {
            p2c_input: Utxo {
                outpoint: OutPoint::new(signed.txid, 0),
                value: dust,
                confirmed: false,
                color: None,
            },
            change_input: Some(Utxo {
                outpoint: OutPoint::new(signed.txid, 1),
                value: funding_change,
                confirmed: false,
                color: None,
            }),
        };
        debug!(
            txid = %signed.txid,
            fee = selection.fee,
            funding_change,
            issue_fee,
            "built funding transaction"
        );
        Ok(FundingTransaction {
            signed,
            leg,
            issue_fee,
        })
    }

    /// Leg two of a funded issue: mint `amount` of `color` to the issuer.
    ///
    /// Input 0 spends the P2C dust with the tweaked key; input 1, if present,
    /// spends the funding change with the base key.
    pub fn build_issue_leg(
        &self,
        leg: &IssueLeg,
        key: &KeyMaterial,
        p2c: &PayToContract,
        p2c_keypair: &KeyPair,
        color: &ColorId,
        amount: u64,
    ) -> Result<SignedTransaction, WalletError> {
        self.check_asset_amount(amount)?;
        let mut spends = vec![Spend {
            outpoint: leg.p2c_input.outpoint,
            script_code: Script::p2pkh(&p2c.public_key().pubkey_hash()),
            keypair: p2c_keypair,
        }];
        if let Some(change) = &leg.change_input {
            spends.push(Spend {
                outpoint: change.outpoint,
                script_code: Script::p2pkh(key.address().pubkey_hash()),
                keypair: key.keypair(),
            });
        }

        let total = leg.total();
        let fee = estimated_fee(self.fee_rate, spends.len() as u64, ISSUANCE_OUTPUTS);
        if total < fee {
            return Err(WalletError::InsufficientFunds { have: total, need: fee });
        }

        let mut outputs = vec![TxOut {
            value: amount,
            script_pubkey: Script::cp2pkh(color, key.address().pubkey_hash()),
        }];
        let change = self.push_native_change(&mut outputs, key, total - fee);
        debug!(color = %color, amount, change, fee = total - change, "built issue transaction");
        self.sign(&spends, outputs, total - change)
    }

    /// Append native change to the sender if it is not dust; returns the amount kept.
    fn push_native_change(&self, outputs: &mut Vec<TxOut>, key: &KeyMaterial, change: u64) -> u64 {
        if change >= self.dust_threshold {
            outputs.push(TxOut {
                value: change,
                script_pubkey: Script::p2pkh(key.address().pubkey_hash()),
            });
            change
        } else {
            0
        }
    }

    fn native_spends<'a>(&self, selected: &[Utxo], key: &'a KeyMaterial) -> Vec<Spend<'a>> {
        selected
            .iter()
            .map(|u| Spend {
                outpoint: u.outpoint,
                script_code: Script::p2pkh(key.address().pubkey_hash()),
                keypair: key.keypair(),
            })
            .collect()
    }

    fn sign(&self, spends: &[Spend<'_>], outputs: Vec<TxOut>, fee: u64) -> Result<SignedTransaction, WalletError> {
        if spends.is_empty() || outputs.is_empty() {
            return Err(WalletError::BuildError("transaction has no inputs or no outputs".into()));
        }
        let inputs = spends.iter().map(|s| TxIn::new(s.outpoint)).collect();
        let mut tx = Transaction::new(inputs, outputs);
        for (i, spend) in spends.iter().enumerate() {
            tx.sign_input(i, spend.keypair, &spend.script_code)?;
        }
        Ok(SignedTransaction::new(tx, fee))
    }
}

fn native_utxos(utxos: &[Utxo]) -> Vec<Utxo> {
    utxos.iter().filter(|u| u.is_native()).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chroma_core::crypto::sha256;
    use chroma_core::types::TokenType;

    use crate::metadata::Metadata;

    fn key(tag: &[u8]) -> KeyMaterial {
        KeyMaterial::from_keypair(KeyPair::from_secret_bytes(&sha256(tag)).unwrap(), Network::Dev)
    }

    fn native(n: u8, value: u64) -> Utxo {
        Utxo {
            outpoint: OutPoint::new(Txid::from_wire_bytes([n; 32]), 0),
            value,
            confirmed: true,
            color: None,
        }
    }

    fn colored(n: u8, value: u64, color: ColorId) -> Utxo {
        Utxo {
            color: Some(color),
            ..native(n, value)
        }
    }

    fn color() -> ColorId {
        ColorId::new(TokenType::NonReissuable, [0x42; 32])
    }

    fn builder() -> TransactionBuilder {
        TransactionBuilder::new(Network::Dev)
    }

    fn assert_signed(tx: &Transaction, codes: &[Script]) {
        for (i, code) in codes.iter().enumerate() {
            tx.verify_input(i, code).unwrap();
        }
    }

    #[test]
    fn transfer_single_input_with_change() {
        let owner = key(b"owner");
        let to = key(b"recipient");
        let signed = builder()
            .build_transfer(&[native(1, 100_000_000)], &owner, to.address(), 10_000_000)
            .unwrap();
        let tx = &signed.tx;
        assert_eq!(tx.inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[0].value, 10_000_000);
        assert_eq!(tx.outputs[0].script_pubkey, to.address().script_pubkey());
        assert_eq!(tx.outputs[1].value, 100_000_000 - 10_000_000 - 226);
        assert_eq!(signed.fee, 226);
        assert_eq!(signed.txid, tx.txid());
        assert_signed(tx, &[Script::p2pkh(owner.address().pubkey_hash())]);
    }

    #[test]
    fn transfer_folds_dust_change_into_fee() {
        let owner = key(b"owner");
        let to = key(b"recipient");
        let signed = builder()
            .build_transfer(&[native(1, 10_000 + 226 + 100)], &owner, to.address(), 10_000)
            .unwrap();
        assert_eq!(signed.tx.outputs.len(), 1);
        assert_eq!(signed.fee, 326);
    }

    #[test]
    fn transfer_ignores_colored_utxos() {
        let owner = key(b"owner");
        let to = key(b"recipient");
        let utxos = vec![colored(9, 1_000_000_000, color()), native(1, 50_000)];
        let signed = builder().build_transfer(&utxos, &owner, to.address(), 10_000).unwrap();
        assert_eq!(signed.tx.inputs.len(), 1);
        assert_eq!(signed.tx.inputs[0].previous_output, utxos[1].outpoint);
    }

    #[test]
    fn transfer_amount_validation() {
        let owner = key(b"owner");
        let to = key(b"recipient");
        let b = builder();
        assert_eq!(
            b.build_transfer(&[], &owner, to.address(), 100).unwrap_err(),
            WalletError::DustAmount { amount: 100, threshold: 546 }
        );
        assert_eq!(
            b.build_transfer(&[], &owner, to.address(), 0).unwrap_err().code(),
            "invalid_amount"
        );
        assert_eq!(
            b.build_transfer(&[], &owner, to.address(), MAX_MONEY + 1).unwrap_err().code(),
            "invalid_amount"
        );
    }

    #[test]
    fn transfer_rejects_foreign_network_and_colored_recipient() {
        let owner = key(b"owner");
        let prod = Address::from_pubkey_hash([1; 20], Network::Prod);
        assert_eq!(
            builder().build_transfer(&[native(1, 100_000)], &owner, &prod, 10_000).unwrap_err().code(),
            "invalid_address"
        );
        let colored_to = key(b"r").address().colored(color());
        assert!(builder().build_transfer(&[native(1, 100_000)], &owner, &colored_to, 10_000).is_err());
    }

    #[test]
    fn colored_transfer_layout() {
        let owner = key(b"owner");
        let to = key(b"recipient");
        let c = color();
        let utxos = vec![colored(1, 700, c), colored(2, 500, c), native(3, 100_000)];
        let signed = builder()
            .build_asset(&utxos, &owner, &c, 1_000, &AssetAction::Transfer(to.address().clone()))
            .unwrap();
        let tx = &signed.tx;

        assert_eq!(tx.inputs.len(), 3);
        assert_eq!(tx.inputs[2].previous_output, utxos[2].outpoint);
        assert_eq!(tx.outputs.len(), 3);
        assert_eq!(tx.outputs[0].value, 1_000);
        assert_eq!(tx.outputs[0].script_pubkey, Script::cp2pkh(&c, to.address().pubkey_hash()));
        assert_eq!(tx.outputs[1].value, 200);
        assert_eq!(tx.outputs[1].script_pubkey.color_id(), Some(c));
        let fee = estimated_fee(1, 3, 3);
        assert_eq!(signed.fee, fee);
        assert_eq!(tx.outputs[2].value, 100_000 - fee);

        let own = owner.address().pubkey_hash();
        assert_signed(
            tx,
            &[Script::cp2pkh(&c, own), Script::cp2pkh(&c, own), Script::p2pkh(own)],
        );
    }

    #[test]
    fn burn_has_one_fewer_colored_output() {
        let owner = key(b"owner");
        let to = key(b"recipient");
        let c = color();
        let utxos = vec![colored(1, 1_000, c), native(3, 100_000)];
        let transfer = builder()
            .build_asset(&utxos, &owner, &c, 400, &AssetAction::Transfer(to.address().clone()))
            .unwrap();
        let burn = builder().build_asset(&utxos, &owner, &c, 400, &AssetAction::Burn).unwrap();
        let count = |t: &SignedTransaction| t.tx.outputs.iter().filter(|o| o.is_colored()).count();
        assert_eq!(count(&transfer), count(&burn) + 1);
        assert_eq!(burn.fee, estimated_fee(1, 2, 2));
    }

    #[test]
    fn burn_full_balance_keeps_native_change() {
        let owner = key(b"owner");
        let c = color();
        let utxos = vec![colored(1, 1_000, c), native(3, 100_000)];
        let burn = builder().build_asset(&utxos, &owner, &c, 1_000, &AssetAction::Burn).unwrap();
        assert!(burn.tx.outputs.iter().all(|o| !o.is_colored()));
        assert_eq!(burn.tx.outputs.len(), 1);
        assert_eq!(burn.fee, estimated_fee(1, 2, 1));
        assert_eq!(burn.tx.outputs[0].value, 100_000 - burn.fee);
    }

    #[test]
    fn burn_full_balance_requires_spendable_change() {
        let owner = key(b"owner");
        let c = color();
        let fee = estimated_fee(1, 2, 1);
        let utxos = vec![colored(1, 1_000, c), native(3, fee + 100)];
        assert_eq!(
            builder().build_asset(&utxos, &owner, &c, 1_000, &AssetAction::Burn).unwrap_err().code(),
            "insufficient_funds"
        );
    }

    #[test]
    fn asset_errors() {
        let owner = key(b"owner");
        let to = key(b"recipient");
        let c = color();
        let send = AssetAction::Transfer(to.address().clone());
        let b = builder();
        assert_eq!(
            b.build_asset(&[native(1, 10_000)], &owner, &c, 10, &send).unwrap_err().code(),
            "no_utxos_available"
        );
        assert_eq!(
            b.build_asset(&[colored(1, 100, c)], &owner, &c, 10, &send).unwrap_err(),
            WalletError::NoFeeUtxos
        );
        assert_eq!(
            b.build_asset(&[colored(1, 100, c), native(2, 10_000)], &owner, &c, 101, &send)
                .unwrap_err(),
            WalletError::InsufficientAssetBalance { have: 100, need: 101 }
        );
        assert_eq!(
            b.build_asset(&[colored(1, 100, c)], &owner, &c, 0, &send).unwrap_err().code(),
            "invalid_amount"
        );
        let other = ColorId::new(TokenType::Nft, [1; 32]);
        let wrong = AssetAction::Transfer(to.address().colored(other));
        assert_eq!(
            b.build_asset(&[colored(1, 100, c), native(2, 10_000)], &owner, &c, 10, &wrong)
                .unwrap_err()
                .code(),
            "invalid_address"
        );
    }

    #[test]
    fn reissuable_issue_pays_colored_output_to_issuer() {
        let owner = key(b"owner");
        let p2c = PayToContract::derive(
            owner.public_key(),
            &Metadata::new("Gold", "GLD", TokenType::Reissuable),
        )
        .unwrap();
        let signed = builder()
            .build_reissuable_issue(&[native(1, 50_000)], &owner, &p2c, 1_000_000)
            .unwrap();
        let tx = &signed.tx;
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(
            tx.outputs[0].script_pubkey,
            Script::cp2pkh(&p2c.reissuable_color_id(), owner.address().pubkey_hash())
        );
        assert_eq!(tx.outputs[0].value, 1_000_000);
        assert_eq!(signed.fee, 226);
        assert_signed(tx, &[Script::p2pkh(owner.address().pubkey_hash())]);
    }

    #[test]
    fn funding_reserves_issue_fee() {
        let owner = key(b"owner");
        let p2c = PayToContract::derive(
            owner.public_key(),
            &Metadata::new("Share", "SHR", TokenType::NonReissuable),
        )
        .unwrap();
        let b = builder();
        assert_eq!(b.issue_fee(), 374);
        assert_eq!(b.funding_reserve(), 546);

        let funding = b.build_funding(&[native(1, 100_000)], &owner, &p2c).unwrap();
        let tx = &funding.signed.tx;
        assert_eq!(tx.outputs[0].value, 546);
        assert_eq!(tx.outputs[0].script_pubkey, p2c.address(Network::Dev).script_pubkey());
        assert_eq!(tx.outputs[1].value, 100_000 - 546 - 226);
        assert_eq!(funding.leg.funding_outpoint(), OutPoint::new(funding.signed.txid, 0));
        let change = funding.leg.change_input.as_ref().unwrap();
        assert_eq!(change.outpoint.index, 1);
        assert!(change.value >= funding.issue_fee);
    }

    #[test]
    fn funding_insufficient_before_anything_is_signed() {
        let owner = key(b"owner");
        let p2c = PayToContract::derive(
            owner.public_key(),
            &Metadata::new("Share", "SHR", TokenType::NonReissuable),
        )
        .unwrap();
        // dust + reserve + fee(1 input) = 546 + 546 + 226
        let err = builder().build_funding(&[native(1, 1_317)], &owner, &p2c).unwrap_err();
        assert_eq!(err, WalletError::InsufficientFunds { have: 1_317, need: 1_318 });
        builder().build_funding(&[native(1, 1_318)], &owner, &p2c).unwrap();
    }

    #[test]
    fn issue_leg_signs_with_both_keys() {
        let owner = key(b"owner");
        let p2c = PayToContract::derive(
            owner.public_key(),
            &Metadata::new("Share", "SHR", TokenType::NonReissuable),
        )
        .unwrap();
        let b = builder();
        let funding = b.build_funding(&[native(1, 100_000)], &owner, &p2c).unwrap();
        let color = ColorId::from_outpoint(TokenType::NonReissuable, &funding.leg.funding_outpoint()).unwrap();
        let p2c_key = p2c.keypair(owner.keypair()).unwrap();
        let issue = b
            .build_issue_leg(&funding.leg, &owner, &p2c, &p2c_key, &color, 5_000)
            .unwrap();
        let tx = &issue.tx;
        assert_eq!(tx.inputs[0].previous_output, OutPoint::new(funding.signed.txid, 0));
        assert_eq!(tx.inputs[1].previous_output, OutPoint::new(funding.signed.txid, 1));
        assert_eq!(tx.outputs[0].script_pubkey.color_id(), Some(color));
        assert_eq!(tx.outputs[0].value, 5_000);
        assert_eq!(issue.fee, 374);
        assert_eq!(tx.outputs[1].value, 546 + (100_000 - 546 - 226) - 374);
        assert_signed(
            tx,
            &[
                Script::p2pkh(&p2c.public_key().pubkey_hash()),
                Script::p2pkh(owner.address().pubkey_hash()),
            ],
        );
    }

    #[test]
    fn issue_leg_rejects_wrong_p2c_key() {
        let owner = key(b"owner");
        let p2c = PayToContract::derive(
            owner.public_key(),
            &Metadata::new("Share", "SHR", TokenType::NonReissuable),
        )
        .unwrap();
        let b = builder();
        let funding = b.build_funding(&[native(1, 100_000)], &owner, &p2c).unwrap();
        let color = ColorId::from_outpoint(TokenType::NonReissuable, &funding.leg.funding_outpoint()).unwrap();
        let err = b
            .build_issue_leg(&funding.leg, &owner, &p2c, owner.keypair(), &color, 5_000)
            .unwrap_err();
        assert_eq!(err.code(), "transaction_error");
    }

    #[test]
    fn estimate_transfer_fee_matches_build() {
        let owner = key(b"owner");
        let to = key(b"recipient");
        let utxos = vec![native(1, 30_000), native(2, 30_000)];
        let b = builder();
        let estimate = b.estimate_transfer_fee(&utxos, 40_000).unwrap();
        let built = b.build_transfer(&utxos, &owner, to.address(), 40_000).unwrap();
        assert_eq!(estimate.fee, built.fee);
        assert_eq!(estimate.selected.len(), 2);
    }

    #[test]
    fn fee_rate_scales_fee() {
        let owner = key(b"owner");
        let to = key(b"recipient");
        let mut b = builder();
        b.set_fee_rate(3);
        let signed = b.build_transfer(&[native(1, 100_000)], &owner, to.address(), 10_000).unwrap();
        assert_eq!(signed.fee, 3 * 226);
        assert_eq!(b.issue_fee(), 3 * 374);
        assert_eq!(b.funding_reserve(), 3 * 374);
    }
}
