//! Wallet key-material interface (spec §6 "Wallet interface"). The core
//! uses these only to sign assembled matching transactions; it never
//! manages key material itself.

pub trait Wallet: Send + Sync {
    /// Bech32 payment address.
    fn payment_address(&self) -> &str;
    /// Raw payment verification key bytes.
    fn payment_verification_key(&self) -> &[u8];
    /// Raw payment extended signing key bytes.
    fn payment_signing_key(&self) -> &[u8];
}
